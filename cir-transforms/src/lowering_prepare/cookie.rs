//! Heap array allocation and deallocation
//!
//! With a cookie, the allocation is laid out as
//!
//! ```text
//! | padding | count (u64) | element 0 | element 1 | ...
//! ^ allocation          ^ allocation + cookie
//! ```
//!
//! where the cookie is `max(8, alignof(E))` bytes and the count occupies its
//! last eight bytes. `cir.array.delete` reads the count back from there to
//! run the destructor loop, then frees the start of the allocation.

use super::ensure_function;
use cir_common::{CirError, SourceLocation};
use cir_ir::{BinOpKind, CastKind, Context, DataLayout, IrMapping, Module, Op, OpBuilder, OpKind, Type, Value};
use log::debug;

const DEFAULT_ALLOCATOR: &str = "_Znam";
const DEFAULT_DEALLOCATOR: &str = "_ZdaPv";
const COUNT_SIZE: u64 = 8;

fn has_cookie(ctx: &Context, op: Op) -> bool {
    ctx.attr(op, "cookie")
        .and_then(|attr| ctx.attrs.as_bool(attr))
        .unwrap_or(false)
}

fn cookie_size(ctx: &Context, layout: &DataLayout, elem: Type, location: &SourceLocation) -> Result<u64, CirError> {
    let align = layout
        .align_of(&ctx.types, elem)
        .ok_or_else(|| unsized_element(ctx, elem, location))?;
    Ok(align.max(COUNT_SIZE))
}

fn unsized_element(ctx: &Context, elem: Type, location: &SourceLocation) -> CirError {
    CirError::lowering_error(
        format!("cannot lay out array elements of type {}", ctx.types.display(elem)),
        location.clone(),
    )
}

fn offset(builder: &mut OpBuilder, ctx: &mut Context, base: Value, bytes: i128) -> Value {
    if bytes == 0 {
        return base;
    }
    let s64 = ctx.types.s64();
    let distance = builder.build_const_int(ctx, s64, bytes);
    builder.build_ptr_stride(ctx, base, distance)
}

pub(super) fn lower_array_new(ctx: &mut Context, module: Module, op: Op, layout: &DataLayout) -> Result<(), CirError> {
    let location = ctx.location(op).clone();
    let result_ty = ctx.value_type(ctx.result(op, 0));
    let elem = ctx.types.pointee(result_ty).ok_or_else(|| {
        CirError::lowering_error("'cir.array.new' must produce a pointer", location.clone())
    })?;
    let elem_size = layout
        .size_of(&ctx.types, elem)
        .ok_or_else(|| unsized_element(ctx, elem, &location))?;
    let cookie = if has_cookie(ctx, op) {
        Some(cookie_size(ctx, layout, elem, &location)?)
    } else {
        None
    };

    let allocator = ctx.str_attr(op, "allocator").unwrap_or(DEFAULT_ALLOCATOR).to_string();
    let u64_ty = ctx.types.u64();
    let u8_ty = ctx.types.u8();
    let void = ctx.types.void();
    let void_ptr = ctx.types.ptr(void);
    let allocator_ty = ctx.types.func(vec![u64_ty], void_ptr, false);
    ensure_function(ctx, module, &allocator, allocator_ty, &location)?;

    let mut builder = OpBuilder::before(ctx, op);
    let mut count = ctx.operand(op, 0);
    if ctx.value_type(count) != u64_ty {
        count = builder.build_cast(ctx, CastKind::Integral, count, u64_ty);
    }
    let elem_bytes = builder.build_const_int(ctx, u64_ty, i128::from(elem_size));
    let mut size = builder.build_binop(ctx, BinOpKind::Mul, count, elem_bytes);
    if let Some(cookie) = cookie {
        let extra = builder.build_const_int(ctx, u64_ty, i128::from(cookie));
        size = builder.build_binop(ctx, BinOpKind::Add, size, extra);
    }
    let allocation = builder
        .build_call(ctx, &allocator, &[size], Some(void_ptr))
        .ok_or_else(|| CirError::lowering_error("allocator call produced no value", location.clone()))?;

    let first = match cookie {
        Some(cookie) => {
            let bytes_ptr = ctx.types.ptr(u8_ty);
            let count_ptr = ctx.types.ptr(u64_ty);
            let bytes = builder.build_cast(ctx, CastKind::Bitcast, allocation, bytes_ptr);
            let slot = offset(&mut builder, ctx, bytes, i128::from(cookie - COUNT_SIZE));
            let slot = builder.build_cast(ctx, CastKind::Bitcast, slot, count_ptr);
            builder.build_store(ctx, count, slot);
            let first = offset(&mut builder, ctx, bytes, i128::from(cookie));
            builder.build_cast(ctx, CastKind::Bitcast, first, result_ty)
        }
        None => builder.build_cast(ctx, CastKind::Bitcast, allocation, result_ty),
    };
    debug!(
        "lowered 'cir.array.new' at {} to '@{}' ({} byte element(s), cookie {:?})",
        location, allocator, elem_size, cookie
    );
    ctx.replace_op(op, &[first]);
    Ok(())
}

pub(super) fn lower_array_delete(
    ctx: &mut Context,
    module: Module,
    op: Op,
    layout: &DataLayout,
) -> Result<(), CirError> {
    let location = ctx.location(op).clone();
    let ptr = ctx.operand(op, 0);
    let ptr_ty = ctx.value_type(ptr);
    let elem = ctx.types.pointee(ptr_ty).ok_or_else(|| {
        CirError::lowering_error("'cir.array.delete' needs a pointer operand", location.clone())
    })?;
    let body = ctx.region(op, 0);
    let destroys = !ctx.region_is_empty(body);
    let cookie = if has_cookie(ctx, op) {
        Some(cookie_size(ctx, layout, elem, &location)?)
    } else {
        None
    };
    if destroys && cookie.is_none() {
        return Err(CirError::lowering_error(
            "'cir.array.delete' with an element destructor requires an element count cookie",
            location,
        ));
    }

    let deallocator = ctx
        .str_attr(op, "deallocator")
        .unwrap_or(DEFAULT_DEALLOCATOR)
        .to_string();
    let void = ctx.types.void();
    let void_ptr = ctx.types.ptr(void);
    let deallocator_ty = ctx.types.func(vec![void_ptr], void, false);
    ensure_function(ctx, module, &deallocator, deallocator_ty, &location)?;

    let mut builder = OpBuilder::before(ctx, op);
    let freed = match cookie {
        Some(cookie) => {
            let u8_ty = ctx.types.u8();
            let u64_ty = ctx.types.u64();
            let bytes_ptr = ctx.types.ptr(u8_ty);
            let count_ptr = ctx.types.ptr(u64_ty);
            let bytes = builder.build_cast(ctx, CastKind::Bitcast, ptr, bytes_ptr);
            if destroys {
                let slot = offset(&mut builder, ctx, bytes, -i128::from(COUNT_SIZE));
                let slot = builder.build_cast(ctx, CastKind::Bitcast, slot, count_ptr);
                let count = builder.build_load(ctx, slot);
                let dtor = builder.build_region_op(ctx, OpKind::ArrayDtor, &[ptr, count], &[]);
                let mut mapping = IrMapping::new();
                let dest = ctx.region(dtor, 0);
                ctx.clone_region_into(body, dest, &mut mapping);
            }
            let start = offset(&mut builder, ctx, bytes, -i128::from(cookie));
            builder.build_cast(ctx, CastKind::Bitcast, start, void_ptr)
        }
        None => builder.build_cast(ctx, CastKind::Bitcast, ptr, void_ptr),
    };
    builder.build_call(ctx, &deallocator, &[freed], None);
    debug!(
        "lowered 'cir.array.delete' at {} to '@{}' (cookie {:?})",
        location, deallocator, cookie
    );
    ctx.erase_op(op);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::parse;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn find(ctx: &Context, module: Module, kind: OpKind) -> Op {
        ctx.walk(module.op())
            .into_iter()
            .find(|&op| ctx.op_kind(op) == kind)
            .unwrap()
    }

    #[test]
    fn test_array_new_without_cookie() {
        let source = indoc! {r#"
            builtin.module() {sym_name = "m"} ({
            ^bb0:
              cir.func() {function_type = !cir.func<(!s32i) -> !cir.ptr<!s64i>>, sym_name = "f"} ({
              ^bb1(%0 : !s32i):
                %1 = cir.array.new(%0 : !s32i) : !cir.ptr<!s64i>
                cir.return(%1 : !cir.ptr<!s64i>)
              })
            })
        "#};
        let (mut ctx, module) = parse(source);
        let op = find(&ctx, module, OpKind::ArrayNew);
        lower_array_new(&mut ctx, module, op, &DataLayout::default()).unwrap();
        cir_ir::verify(&ctx, module.op()).unwrap();

        let decl = module.lookup(&ctx, "_Znam").unwrap();
        assert_eq!(ctx.op_kind(decl), OpKind::Func);
        let call = find(&ctx, module, OpKind::Call);
        let size = ctx.defining_op(ctx.operand(call, 0)).unwrap();
        assert_eq!(ctx.op_kind(size), OpKind::BinOp);
        assert_eq!(ctx.str_attr(size, "kind"), Some("mul"));
        assert_eq!(crate::rewrite::constant_int(&ctx, ctx.operand(size, 1)), Some(8));
        assert!(ctx.walk(module.op()).iter().all(|&op| ctx.op_kind(op) != OpKind::Store));
    }

    #[test]
    fn test_array_new_with_cookie_stores_count() {
        let source = indoc! {r#"
            builtin.module() {sym_name = "m"} ({
            ^bb0:
              cir.func() {function_type = !cir.func<(!u64i) -> !cir.ptr<!s32i>>, sym_name = "f"} ({
              ^bb1(%0 : !u64i):
                %1 = cir.array.new(%0 : !u64i) : !cir.ptr<!s32i> {allocator = @alloc, cookie = #true}
                cir.return(%1 : !cir.ptr<!s32i>)
              })
            })
        "#};
        let (mut ctx, module) = parse(source);
        let op = find(&ctx, module, OpKind::ArrayNew);
        lower_array_new(&mut ctx, module, op, &DataLayout::default()).unwrap();
        cir_ir::verify(&ctx, module.op()).unwrap();

        assert!(module.lookup(&ctx, "_Znam").is_none());
        let call = find(&ctx, module, OpKind::Call);
        assert_eq!(ctx.str_attr(call, "callee"), Some("alloc"));
        let total = ctx.defining_op(ctx.operand(call, 0)).unwrap();
        assert_eq!(ctx.str_attr(total, "kind"), Some("add"));
        assert_eq!(crate::rewrite::constant_int(&ctx, ctx.operand(total, 1)), Some(8));

        let store = find(&ctx, module, OpKind::Store);
        let func = module.lookup(&ctx, "f").unwrap();
        let entry = cir_ir::func_entry(&ctx, func).unwrap();
        assert_eq!(ctx.operand(store, 0), ctx.block_arg(entry, 0));
    }

    #[test]
    fn test_array_delete_with_destructor_needs_cookie() {
        let source = indoc! {r#"
            builtin.module() {sym_name = "m"} ({
            ^bb0:
              cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "fini"} ({})
              cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "f"} ({
              ^bb1(%0 : !cir.ptr<!s32i>):
                cir.array.delete(%0 : !cir.ptr<!s32i>) ({
                ^bb2(%1 : !cir.ptr<!s32i>):
                  cir.call(%1 : !cir.ptr<!s32i>) {callee = @fini}
                  cir.yield()
                }) loc("del.cpp":4:3)
                cir.return()
              })
            })
        "#};
        let (mut ctx, module) = parse(source);
        let op = find(&ctx, module, OpKind::ArrayDelete);
        let err = lower_array_delete(&mut ctx, module, op, &DataLayout::default()).unwrap_err();
        assert!(err.to_string().contains("requires an element count cookie"));
        assert_eq!(err.location(), Some(&SourceLocation::new("del.cpp", 4, 3)));
        // Left untouched
        assert!(!ctx.is_erased(op));
        assert!(module.lookup(&ctx, "_ZdaPv").is_none());
    }

    #[test]
    fn test_array_delete_reads_cookie() {
        let source = indoc! {r#"
            builtin.module() {sym_name = "m"} ({
            ^bb0:
              cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "fini"} ({})
              cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "f"} ({
              ^bb1(%0 : !cir.ptr<!s32i>):
                cir.array.delete(%0 : !cir.ptr<!s32i>) {cookie = #true} ({
                ^bb2(%1 : !cir.ptr<!s32i>):
                  cir.call(%1 : !cir.ptr<!s32i>) {callee = @fini}
                  cir.yield()
                })
                cir.return()
              })
            })
        "#};
        let (mut ctx, module) = parse(source);
        let op = find(&ctx, module, OpKind::ArrayDelete);
        lower_array_delete(&mut ctx, module, op, &DataLayout::default()).unwrap();
        cir_ir::verify(&ctx, module.op()).unwrap();

        let dtor = find(&ctx, module, OpKind::ArrayDtor);
        let count = ctx.defining_op(ctx.operand(dtor, 1)).unwrap();
        assert_eq!(ctx.op_kind(count), OpKind::Load);
        let calls: Vec<_> = ctx
            .walk(module.op())
            .into_iter()
            .filter(|&op| ctx.op_kind(op) == OpKind::Call)
            .map(|op| ctx.str_attr(op, "callee").unwrap().to_string())
            .collect();
        assert_eq!(calls, vec!["fini", "_ZdaPv"]);
    }
}
