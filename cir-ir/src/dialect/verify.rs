//! Per-kind semantic verify hooks
//!
//! Generic shape checks (arity, region counts, terminators, dominance) live
//! in the verifier. The hooks here only see operations whose shape already
//! matched their [`OpInfo`](super::OpInfo), so indexing operands and results
//! within the declared arity is safe.

use super::{BinOpKind, CastKind, CmpKind, OpKind, UnaryKind};
use crate::attrs::AttrKind;
use crate::context::{Context, Op, Region};
use crate::module::lookup_symbol;
use crate::types::Type;
use std::collections::HashSet;
use std::str::FromStr;

type Check = Result<(), String>;

fn ty(ctx: &Context, ty: Type) -> String {
    ctx.types.display(ty).to_string()
}

fn operand_ty(ctx: &Context, op: Op, index: usize) -> Type {
    ctx.value_type(ctx.operand(op, index))
}

fn result_ty(ctx: &Context, op: Op) -> Type {
    ctx.value_type(ctx.result(op, 0))
}

fn kind_attr<K: FromStr>(ctx: &Context, op: Op) -> Result<K, String> {
    let name = ctx
        .str_attr(op, "kind")
        .ok_or_else(|| "requires a 'kind' attribute".to_string())?;
    K::from_str(name).map_err(|_| format!("unknown kind '{}'", name))
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

fn pointee(ctx: &Context, ptr: Type, what: &str) -> Result<Type, String> {
    ctx.types
        .pointee(ptr)
        .ok_or_else(|| format!("{} must be a pointer, but found {}", what, ty(ctx, ptr)))
}

/// Function type of the referenced symbol, if it names a function
fn callee_type(ctx: &Context, op: Op, name: &str) -> Result<Type, String> {
    let target = lookup_symbol(ctx, op, name)
        .ok_or_else(|| format!("references undefined symbol '@{}'", name))?;
    if ctx.op_kind(target) != OpKind::Func {
        return Err(format!("'@{}' does not reference a function", name));
    }
    ctx.type_attr(target, "function_type")
        .ok_or_else(|| format!("'@{}' has no function type", name))
}

pub(super) fn module(ctx: &Context, op: Op) -> Check {
    let body = ctx.region(op, 0);
    require(ctx.region_blocks(body).len() <= 1, || {
        "body must consist of at most one block".to_string()
    })?;
    let mut seen = HashSet::new();
    for &block in ctx.region_blocks(body) {
        for &child in ctx.block_ops(block) {
            let kind = ctx.op_kind(child);
            require(matches!(kind, OpKind::Func | OpKind::Global), || {
                format!("'{}' is not allowed at module level", kind)
            })?;
            if let Some(name) = ctx.str_attr(child, "sym_name") {
                require(seen.insert(name), || format!("redefinition of symbol '@{}'", name))?;
            }
        }
    }
    Ok(())
}

pub(super) fn func(ctx: &Context, op: Op) -> Check {
    ctx.str_attr(op, "sym_name")
        .ok_or_else(|| "requires a 'sym_name' attribute".to_string())?;
    let fty = ctx
        .type_attr(op, "function_type")
        .ok_or_else(|| "requires a 'function_type' attribute".to_string())?;
    let (params, _, _) = ctx
        .types
        .func_info(fty)
        .ok_or_else(|| format!("'function_type' must be a function type, but found {}", ty(ctx, fty)))?;

    if let Some(entry) = ctx.entry_block(ctx.region(op, 0)) {
        let args: Vec<Type> = ctx
            .block_args(entry)
            .iter()
            .map(|&a| ctx.value_type(a))
            .collect();
        require(args == params, || {
            "entry block arguments do not match the function signature".to_string()
        })?;
    }
    Ok(())
}

pub(super) fn global(ctx: &Context, op: Op) -> Check {
    ctx.str_attr(op, "sym_name")
        .ok_or_else(|| "requires a 'sym_name' attribute".to_string())?;
    let global_ty = ctx
        .type_attr(op, "global_type")
        .ok_or_else(|| "requires a 'global_type' attribute".to_string())?;

    if let Some(init) = ctx.attr(op, "initial_value") {
        if let Some(init_ty) = ctx.attrs.typed_value_type(init) {
            require(init_ty == global_ty, || {
                format!(
                    "initial value of type {} does not match global type {}",
                    ty(ctx, init_ty),
                    ty(ctx, global_ty)
                )
            })?;
        }
        require(ctx.region_is_empty(ctx.region(op, 0)), || {
            "cannot have both an initial value and a constructor region".to_string()
        })?;
    }

    for (index, name) in ["ctor", "dtor"].iter().enumerate() {
        let region = ctx.region(op, index);
        let blocks = ctx.region_blocks(region);
        require(blocks.len() <= 1, || format!("'{}' region must have a single block", name))?;
        if let Some(&block) = blocks.first() {
            require(ctx.block_args(block).is_empty(), || {
                format!("'{}' region block must not have arguments", name)
            })?;
        }
    }
    if let Some(priority) = ctx.int_attr(op, "init_priority") {
        require((0..=65535).contains(&priority), || {
            format!("init_priority {} is out of range", priority)
        })?;
    }
    Ok(())
}

pub(super) fn return_op(ctx: &Context, op: Op) -> Check {
    let func = ctx
        .parent_of_kind(op, OpKind::Func)
        .ok_or_else(|| "must be nested in a 'cir.func'".to_string())?;
    let Some((_, ret, _)) = ctx
        .type_attr(func, "function_type")
        .and_then(|fty| ctx.types.func_info(fty))
    else {
        return Ok(());
    };

    let operands = ctx.operands(op);
    if ctx.types.is_void(ret) {
        require(operands.is_empty(), || {
            "returns a value from a function returning void".to_string()
        })
    } else {
        require(operands.len() == 1, || {
            format!("must return a value of type {}", ty(ctx, ret))
        })?;
        let actual = operand_ty(ctx, op, 0);
        require(actual == ret, || {
            format!(
                "returns {}, but the enclosing function returns {}",
                ty(ctx, actual),
                ty(ctx, ret)
            )
        })
    }
}

pub(super) fn br(ctx: &Context, op: Op) -> Check {
    let dest = ctx.successors(op)[0];
    let params: Vec<Type> = ctx
        .block_args(dest)
        .iter()
        .map(|&a| ctx.value_type(a))
        .collect();
    let args: Vec<Type> = ctx.operands(op).iter().map(|&v| ctx.value_type(v)).collect();
    require(params == args, || {
        format!(
            "passes {} argument(s) that do not match the {} argument(s) of its successor",
            args.len(),
            params.len()
        )
    })
}

pub(super) fn brcond(ctx: &Context, op: Op) -> Check {
    require(ctx.types.is_bool(operand_ty(ctx, op, 0)), || {
        "condition must be !cir.bool".to_string()
    })?;
    for &succ in ctx.successors(op) {
        require(ctx.block_args(succ).is_empty(), || {
            "successors must not take arguments".to_string()
        })?;
    }
    Ok(())
}

pub(super) fn yield_op(ctx: &Context, op: Op) -> Check {
    let parent = ctx
        .parent_op(op)
        .ok_or_else(|| "must be nested in an operation".to_string())?;
    match ctx.op_kind(parent) {
        OpKind::Ternary | OpKind::Scope => {
            let expected: Vec<Type> = ctx
                .results(parent)
                .iter()
                .map(|&v| ctx.value_type(v))
                .collect();
            let actual: Vec<Type> = ctx.operands(op).iter().map(|&v| ctx.value_type(v)).collect();
            require(expected == actual, || {
                format!(
                    "yields {} value(s) that do not match the {} result(s) of '{}'",
                    actual.len(),
                    expected.len(),
                    ctx.op_name(parent)
                )
            })
        }
        OpKind::Func | OpKind::Module => Err(format!("is not valid inside '{}'", ctx.op_name(parent))),
        _ => require(ctx.operands(op).is_empty(), || {
            format!("must not yield values inside '{}'", ctx.op_name(parent))
        }),
    }
}

/// Region of `parent` that holds the loop condition
fn condition_region(ctx: &Context, parent: Op) -> Option<Region> {
    match ctx.op_kind(parent) {
        OpKind::Do => Some(ctx.region(parent, 1)),
        OpKind::While => Some(ctx.region(parent, 0)),
        _ => None,
    }
}

pub(super) fn condition(ctx: &Context, op: Op) -> Check {
    require(ctx.types.is_bool(operand_ty(ctx, op, 0)), || {
        "condition must be !cir.bool".to_string()
    })?;
    let block = ctx.parent_block(op);
    let region = block.and_then(|b| ctx.block_parent(b));
    let parent = ctx.parent_op(op);
    let expected = parent.and_then(|p| condition_region(ctx, p));
    require(region.is_some() && region == expected, || {
        "must terminate the condition region of a loop".to_string()
    })
}

pub(super) fn constant(ctx: &Context, op: Op) -> Check {
    let value = ctx
        .attr(op, "value")
        .ok_or_else(|| "requires a 'value' attribute".to_string())?;
    let result = result_ty(ctx, op);
    let matches = match ctx.attrs.kind(value) {
        AttrKind::Bool(_) => ctx.types.is_bool(result),
        AttrKind::Int { ty, .. } => *ty == result && ctx.types.is_int(result),
        AttrKind::Float { ty, .. } => *ty == result && ctx.types.is_float(result),
        AttrKind::Zero(ty) | AttrKind::ConstArray { ty, .. } | AttrKind::ConstRecord { ty, .. } => {
            *ty == result
        }
        _ => return Err("'value' must be a typed constant".to_string()),
    };
    require(matches, || {
        format!(
            "value {} does not match result type {}",
            ctx.attrs.display(&ctx.types, value),
            ty(ctx, result)
        )
    })
}

pub(super) fn unary(ctx: &Context, op: Op) -> Check {
    let kind: UnaryKind = kind_attr(ctx, op)?;
    let input = operand_ty(ctx, op, 0);
    require(input == result_ty(ctx, op), || {
        "operand and result types must match".to_string()
    })?;
    let types = &ctx.types;
    let ok = match kind {
        UnaryKind::Not => types.is_int(input) || types.is_bool(input),
        UnaryKind::Minus | UnaryKind::Plus | UnaryKind::Inc | UnaryKind::Dec => {
            types.is_int(input) || types.is_float(input)
        }
    };
    require(ok, || format!("'{}' is not defined on {}", kind, ty(ctx, input)))
}

pub(super) fn binop(ctx: &Context, op: Op) -> Check {
    let kind: BinOpKind = kind_attr(ctx, op)?;
    let lhs = operand_ty(ctx, op, 0);
    require(lhs == operand_ty(ctx, op, 1) && lhs == result_ty(ctx, op), || {
        "operand and result types must match".to_string()
    })?;
    let types = &ctx.types;
    let ok = match kind {
        BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div => {
            types.is_int(lhs) || types.is_float(lhs)
        }
        BinOpKind::Rem | BinOpKind::Shl | BinOpKind::Shr => types.is_int(lhs),
        BinOpKind::And | BinOpKind::Or | BinOpKind::Xor => types.is_int(lhs) || types.is_bool(lhs),
    };
    require(ok, || format!("'{}' is not defined on {}", kind, ty(ctx, lhs)))
}

pub(super) fn cmp(ctx: &Context, op: Op) -> Check {
    let _: CmpKind = kind_attr(ctx, op)?;
    require(operand_ty(ctx, op, 0) == operand_ty(ctx, op, 1), || {
        "operands must have the same type".to_string()
    })?;
    require(ctx.types.is_bool(result_ty(ctx, op)), || {
        "result must be !cir.bool".to_string()
    })
}

/// Whether `kind` may convert `src` to `dst`
pub fn is_legal_cast(ctx: &Context, kind: CastKind, src: Type, dst: Type) -> bool {
    let t = &ctx.types;
    match kind {
        CastKind::IntToBool => t.is_int(src) && t.is_bool(dst),
        CastKind::BoolToInt => t.is_bool(src) && t.is_int(dst),
        CastKind::Integral => t.is_int(src) && t.is_int(dst),
        CastKind::ArrayToPtrdecay => {
            let elem = t
                .pointee(src)
                .and_then(|p| t.array_info(p))
                .map(|(elem, _)| elem);
            elem.is_some() && elem == t.pointee(dst)
        }
        CastKind::Bitcast => t.is_ptr(src) && t.is_ptr(dst),
        CastKind::PtrToBool => t.is_ptr(src) && t.is_bool(dst),
        CastKind::IntToPtr => t.is_int(src) && t.is_ptr(dst),
        CastKind::PtrToInt => t.is_ptr(src) && t.is_int(dst),
        CastKind::Floating => t.is_float(src) && t.is_float(dst),
        CastKind::IntToFloat => t.is_int(src) && t.is_float(dst),
        CastKind::FloatToInt => t.is_float(src) && t.is_int(dst),
    }
}

pub(super) fn cast(ctx: &Context, op: Op) -> Check {
    let kind: CastKind = kind_attr(ctx, op)?;
    let src = operand_ty(ctx, op, 0);
    let dst = result_ty(ctx, op);
    require(is_legal_cast(ctx, kind, src, dst), || {
        format!(
            "cast kind '{}' is not valid from {} to {}",
            kind,
            ty(ctx, src),
            ty(ctx, dst)
        )
    })
}

pub(super) fn select(ctx: &Context, op: Op) -> Check {
    require(ctx.types.is_bool(operand_ty(ctx, op, 0)), || {
        "condition must be !cir.bool".to_string()
    })?;
    let result = result_ty(ctx, op);
    require(
        operand_ty(ctx, op, 1) == result && operand_ty(ctx, op, 2) == result,
        || "true and false values must match the result type".to_string(),
    )
}

pub(super) fn ternary(ctx: &Context, op: Op) -> Check {
    require(ctx.types.is_bool(operand_ty(ctx, op, 0)), || {
        "condition must be !cir.bool".to_string()
    })?;
    for &region in ctx.regions(op) {
        require(!ctx.region_is_empty(region), || "regions must not be empty".to_string())?;
    }
    Ok(())
}

pub(super) fn alloca(ctx: &Context, op: Op) -> Check {
    let allocated = ctx
        .type_attr(op, "alloca_type")
        .ok_or_else(|| "requires an 'alloca_type' attribute".to_string())?;
    require(ctx.types.pointee(result_ty(ctx, op)) == Some(allocated), || {
        format!("result must be a pointer to {}", ty(ctx, allocated))
    })
}

pub(super) fn load(ctx: &Context, op: Op) -> Check {
    let elem = pointee(ctx, operand_ty(ctx, op, 0), "address")?;
    let result = result_ty(ctx, op);
    require(elem == result, || {
        format!("loads {} from a pointer to {}", ty(ctx, result), ty(ctx, elem))
    })
}

pub(super) fn store(ctx: &Context, op: Op) -> Check {
    let value = operand_ty(ctx, op, 0);
    let elem = pointee(ctx, operand_ty(ctx, op, 1), "address")?;
    require(elem == value, || {
        format!("stores {} through a pointer to {}", ty(ctx, value), ty(ctx, elem))
    })
}

pub(super) fn copy(ctx: &Context, op: Op) -> Check {
    let dst = pointee(ctx, operand_ty(ctx, op, 0), "destination")?;
    let src = pointee(ctx, operand_ty(ctx, op, 1), "source")?;
    require(dst == src, || {
        format!(
            "requires destination and source pointee types to match, but found {} and {}",
            ty(ctx, dst),
            ty(ctx, src)
        )
    })
}

pub(super) fn get_global(ctx: &Context, op: Op) -> Check {
    let name = ctx
        .attr(op, "name")
        .and_then(|a| ctx.attrs.as_symbol(a))
        .ok_or_else(|| "requires a symbol 'name' attribute".to_string())?;
    let elem = pointee(ctx, result_ty(ctx, op), "result")?;
    let target = lookup_symbol(ctx, op, name)
        .ok_or_else(|| format!("references undefined symbol '@{}'", name))?;
    let expected = match ctx.op_kind(target) {
        OpKind::Global => ctx.type_attr(target, "global_type"),
        OpKind::Func => ctx.type_attr(target, "function_type"),
        _ => None,
    };
    require(expected == Some(elem), || {
        format!("result type does not match the type of '@{}'", name)
    })
}

pub(super) fn ptr_stride(ctx: &Context, op: Op) -> Check {
    let base = operand_ty(ctx, op, 0);
    pointee(ctx, base, "base")?;
    require(ctx.types.is_int(operand_ty(ctx, op, 1)), || {
        "stride must be an integer".to_string()
    })?;
    require(result_ty(ctx, op) == base, || {
        "result type must match the base pointer type".to_string()
    })
}

pub(super) fn get_element(ctx: &Context, op: Op) -> Check {
    let base = pointee(ctx, operand_ty(ctx, op, 0), "base")?;
    let (elem, _) = ctx
        .types
        .array_info(base)
        .ok_or_else(|| format!("base must point to an array, but points to {}", ty(ctx, base)))?;
    require(ctx.types.is_int(operand_ty(ctx, op, 1)), || {
        "index must be an integer".to_string()
    })?;
    require(ctx.types.pointee(result_ty(ctx, op)) == Some(elem), || {
        format!("result must be a pointer to {}", ty(ctx, elem))
    })
}

pub(super) fn get_member(ctx: &Context, op: Op) -> Check {
    let record = pointee(ctx, operand_ty(ctx, op, 0), "base")?;
    require(ctx.types.is_record(record), || {
        format!("base must point to a record, but points to {}", ty(ctx, record))
    })?;
    require(ctx.types.is_complete(record), || {
        format!("base points to incomplete record {}", ty(ctx, record))
    })?;
    let index = ctx
        .int_attr(op, "index")
        .ok_or_else(|| "requires an integer 'index' attribute".to_string())?;
    let fields = ctx.types.record_fields(record);
    let field = usize::try_from(index)
        .ok()
        .and_then(|i| fields.get(i).copied())
        .ok_or_else(|| format!("member index {} is out of range", index))?;
    require(ctx.types.pointee(result_ty(ctx, op)) == Some(field), || {
        format!("result must be a pointer to {}", ty(ctx, field))
    })
}

pub(super) fn call(ctx: &Context, op: Op) -> Check {
    let name = ctx
        .attr(op, "callee")
        .and_then(|a| ctx.attrs.as_symbol(a))
        .ok_or_else(|| "requires a symbol 'callee' attribute".to_string())?;
    let fty = callee_type(ctx, op, name)?;
    let Some((params, ret, variadic)) = ctx.types.func_info(fty) else {
        return Err(format!("'@{}' has no function type", name));
    };

    let args = ctx.operands(op);
    let arity_ok = if variadic {
        args.len() >= params.len()
    } else {
        args.len() == params.len()
    };
    require(arity_ok, || {
        format!(
            "passes {} argument(s) to '@{}', which expects {}",
            args.len(),
            name,
            params.len()
        )
    })?;
    for (i, (&arg, &param)) in args.iter().zip(params).enumerate() {
        let actual = ctx.value_type(arg);
        require(actual == param, || {
            format!(
                "argument {} has type {}, but '@{}' expects {}",
                i,
                ty(ctx, actual),
                name,
                ty(ctx, param)
            )
        })?;
    }

    let results: Vec<Type> = ctx.results(op).iter().map(|&v| ctx.value_type(v)).collect();
    if ctx.types.is_void(ret) {
        require(results.is_empty(), || format!("'@{}' returns void", name))
    } else {
        require(results == [ret], || {
            format!("result must have type {}", ty(ctx, ret))
        })
    }
}

/// Element type addressed by an array ctor/dtor operand list
pub fn array_init_element(ctx: &Context, op: Op) -> Option<Type> {
    let base = ctx.types.pointee(operand_ty(ctx, op, 0))?;
    if ctx.operands(op).len() == 1 {
        ctx.types.array_info(base).map(|(elem, _)| elem)
    } else {
        Some(base)
    }
}

fn check_element_body(ctx: &Context, region: Region, elem: Type, allow_empty: bool) -> Check {
    let blocks = ctx.region_blocks(region);
    if blocks.is_empty() && allow_empty {
        return Ok(());
    }
    require(blocks.len() == 1, || "element region must have a single block".to_string())?;
    let args = ctx.block_args(blocks[0]);
    let arg_ok = args.len() == 1 && ctx.types.pointee(ctx.value_type(args[0])) == Some(elem);
    require(arg_ok, || {
        format!("element region must take one !cir.ptr<{}> argument", ty(ctx, elem))
    })
}

pub(super) fn array_init(ctx: &Context, op: Op) -> Check {
    let base = pointee(ctx, operand_ty(ctx, op, 0), "address")?;
    if ctx.operands(op).len() == 1 {
        require(ctx.types.array_info(base).is_some(), || {
            "single-operand form requires a pointer to an array".to_string()
        })?;
    } else {
        require(ctx.types.is_int(operand_ty(ctx, op, 1)), || {
            "element count must be an integer".to_string()
        })?;
    }
    let elem = array_init_element(ctx, op)
        .ok_or_else(|| "cannot determine the element type".to_string())?;
    check_element_body(ctx, ctx.region(op, 0), elem, false)
}

pub(super) fn array_new(ctx: &Context, op: Op) -> Check {
    require(ctx.types.is_int(operand_ty(ctx, op, 0)), || {
        "element count must be an integer".to_string()
    })?;
    pointee(ctx, result_ty(ctx, op), "result")?;
    if let Some(allocator) = ctx.attr(op, "allocator") {
        require(ctx.attrs.as_symbol(allocator).is_some(), || {
            "'allocator' must be a symbol".to_string()
        })?;
    }
    Ok(())
}

pub(super) fn array_delete(ctx: &Context, op: Op) -> Check {
    let elem = pointee(ctx, operand_ty(ctx, op, 0), "address")?;
    if let Some(deallocator) = ctx.attr(op, "deallocator") {
        require(ctx.attrs.as_symbol(deallocator).is_some(), || {
            "'deallocator' must be a symbol".to_string()
        })?;
    }
    check_element_body(ctx, ctx.region(op, 0), elem, true)
}

fn check_loop(ctx: &Context, op: Op, cond: Region, body: Region) -> Check {
    require(!ctx.region_is_empty(body) && !ctx.region_is_empty(cond), || {
        "loop regions must not be empty".to_string()
    })?;
    let ends_with_condition = ctx
        .region_blocks(cond)
        .iter()
        .filter_map(|&b| ctx.terminator(b))
        .any(|t| ctx.op_kind(t) == OpKind::Condition);
    require(ends_with_condition, || {
        format!("condition region of '{}' must end with 'cir.condition'", ctx.op_name(op))
    })
}

pub(super) fn do_loop(ctx: &Context, op: Op) -> Check {
    check_loop(ctx, op, ctx.region(op, 1), ctx.region(op, 0))
}

pub(super) fn while_loop(ctx: &Context, op: Op) -> Check {
    check_loop(ctx, op, ctx.region(op, 0), ctx.region(op, 1))
}

