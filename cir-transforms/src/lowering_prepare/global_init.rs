//! Global initializer registration
//!
//! Each global with a constructor or destructor region gets its own
//! `__cxx_global_var_init` function right after it. The constructor region
//! moves into that function; a destructor region becomes a call to
//! `__cxa_atexit`. Globals without `init_priority` are initialized from a
//! single `_GLOBAL__sub_I_<module>` function in declaration order; the
//! others are listed individually. Everything ends up in the module's
//! `cir.global_ctors` attribute, sorted by priority.

use super::{ensure_function, Failures};
use cir_common::{CirError, SourceLocation};
use cir_ir::{func_entry, Attr, Block, CastKind, Context, InsertPoint, Module, Op, OpBuilder, OpKind, Type};
use log::debug;

const DEFAULT_PRIORITY: u32 = 65535;
const DSO_HANDLE: &str = "__dso_handle";
const ATEXIT: &str = "__cxa_atexit";

/// Lower every global initializer; returns how many were registered
pub(super) fn lower_global_initializers(ctx: &mut Context, module: Module, failures: &mut Failures<'_>) -> usize {
    let mut in_order = Vec::new();
    let mut prioritized = Vec::new();

    for global in module.globals(ctx) {
        let has_ctor = !ctx.region_is_empty(ctx.region(global, 0));
        let has_dtor = !ctx.region_is_empty(ctx.region(global, 1));
        if !has_ctor && !has_dtor {
            continue;
        }
        match lower_global(ctx, module, global) {
            Ok((init, Some(priority))) => prioritized.push((init, priority)),
            Ok((init, None)) => in_order.push(init),
            Err(err) => failures.record(err),
        }
    }

    let registered = in_order.len() + prioritized.len();
    if registered == 0 {
        return 0;
    }

    let mut entries = Vec::new();
    if !in_order.is_empty() {
        let name = module.unique_symbol(ctx, &format!("_GLOBAL__sub_I_{}", module.name(ctx)));
        build_aggregate(ctx, module, &name, &in_order);
        entries.push((name, DEFAULT_PRIORITY));
    }
    entries.extend(prioritized);

    // Entries already registered stay ahead of new ones with equal priority
    let mut list: Vec<Attr> = ctx
        .attr(module.op(), "cir.global_ctors")
        .and_then(|attr| ctx.attrs.as_array(attr))
        .map(|existing| existing.to_vec())
        .unwrap_or_default();
    for (name, priority) in &entries {
        list.push(ctx.attrs.global_ctor(name, *priority));
    }
    list.sort_by_key(|&entry| {
        ctx.attrs
            .as_global_ctor(entry)
            .map_or(u32::MAX, |(_, priority)| priority)
    });
    let list = ctx.attrs.array(list);
    ctx.set_attr(module.op(), "cir.global_ctors", list);
    registered
}

/// `name` calls every initializer in `inits`, in order
fn build_aggregate(ctx: &mut Context, module: Module, name: &str, inits: &[String]) {
    let void = ctx.types.void();
    let fty = ctx.types.func(vec![], void, false);
    let body = module.body(ctx);
    let func = OpBuilder::at_end(body).build_func(ctx, name, fty, true);
    let Some(entry) = func_entry(ctx, func) else {
        return;
    };
    let mut builder = OpBuilder::at_end(entry);
    for init in inits {
        builder.build_call(ctx, init, &[], None);
    }
    builder.build_return(ctx, None);
}

/// The destructor call found in a global's destructor region
struct Destructor {
    block: Block,
    callee: String,
    callee_ty: Type,
}

fn lower_global(ctx: &mut Context, module: Module, global: Op) -> Result<(String, Option<u32>), CirError> {
    let location = ctx.location(global).clone();
    let name = ctx
        .str_attr(global, "sym_name")
        .ok_or_else(|| CirError::lowering_error("global without a name", location.clone()))?
        .to_string();
    let global_ty = ctx
        .type_attr(global, "global_type")
        .ok_or_else(|| CirError::lowering_error(format!("'@{}' has no type", name), location.clone()))?;
    let priority = ctx
        .int_attr(global, "init_priority")
        .map(|p| {
            u32::try_from(p).map_err(|_| {
                CirError::lowering_error(format!("init_priority {} of '@{}' is out of range", p, name), location.clone())
            })
        })
        .transpose()?;
    let destructor = match ctx.entry_block(ctx.region(global, 1)) {
        Some(block) => Some(find_destructor(ctx, module, block, &name, &location)?),
        None => None,
    };

    let void = ctx.types.void();
    let void_ptr = ctx.types.ptr(void);
    let s32 = ctx.types.s32();
    let u8_ty = ctx.types.u8();
    let dtor_ty = ctx.types.func(vec![void_ptr], void, false);
    let dtor_ptr = ctx.types.ptr(dtor_ty);
    if destructor.is_some() {
        ensure_dso_handle(ctx, module, u8_ty, &location)?;
        let atexit_ty = ctx.types.func(vec![dtor_ptr, void_ptr, void_ptr], s32, false);
        ensure_function(ctx, module, ATEXIT, atexit_ty, &location)?;
    }

    let init_name = module.unique_symbol(ctx, "__cxx_global_var_init");
    let init_ty = ctx.types.func(vec![], void, false);
    let init = OpBuilder::new(InsertPoint::After(global), location.clone()).build_func(ctx, &init_name, init_ty, true);
    let entry = func_entry(ctx, init)
        .ok_or_else(|| CirError::lowering_error("initializer function has no body", location.clone()))?;

    if let Some(ctor) = ctx.entry_block(ctx.region(global, 0)) {
        for op in ctx.block_ops(ctor).to_vec() {
            if ctx.op_kind(op) != OpKind::Yield {
                ctx.move_op(op, InsertPoint::BlockEnd(entry));
            }
        }
        ctx.erase_block(ctor);
    }

    let mut builder = OpBuilder::new(InsertPoint::BlockEnd(entry), location.clone());
    if let Some(destructor) = destructor {
        let function = builder.build_get_global(ctx, &destructor.callee, destructor.callee_ty);
        let function = builder.build_cast(ctx, CastKind::Bitcast, function, dtor_ptr);
        let object = builder.build_get_global(ctx, &name, global_ty);
        let object = builder.build_cast(ctx, CastKind::Bitcast, object, void_ptr);
        let handle = builder.build_get_global(ctx, DSO_HANDLE, u8_ty);
        let handle = builder.build_cast(ctx, CastKind::Bitcast, handle, void_ptr);
        builder.build_call(ctx, ATEXIT, &[function, object, handle], Some(s32));
        ctx.erase_block(destructor.block);
    }
    builder.build_return(ctx, None);

    if ctx.attr(global, "initial_value").is_none() {
        let zero = ctx.attrs.zero(global_ty);
        ctx.set_attr(global, "initial_value", zero);
    }
    debug!("moved the initializer of '@{}' into '@{}'", name, init_name);
    Ok((init_name, priority))
}

/// A destructor region must be `get_global @g` followed by a call taking
/// that address
fn find_destructor(
    ctx: &Context,
    module: Module,
    block: Block,
    global: &str,
    location: &SourceLocation,
) -> Result<Destructor, CirError> {
    let unsupported = || {
        CirError::lowering_error(
            format!(
                "destructor region of '@{}' must be a single call taking the global's address",
                global
            ),
            location.clone(),
        )
    };
    let ops: Vec<Op> = ctx
        .block_ops(block)
        .iter()
        .copied()
        .filter(|&op| ctx.op_kind(op) != OpKind::Yield)
        .collect();
    let [address, call] = ops[..] else {
        return Err(unsupported());
    };
    let takes_address = ctx.op_kind(address) == OpKind::GetGlobal
        && ctx.str_attr(address, "name") == Some(global)
        && ctx.op_kind(call) == OpKind::Call
        && ctx.results(call).is_empty()
        && ctx.operands(call) == [ctx.result(address, 0)];
    if !takes_address {
        return Err(unsupported());
    }
    let callee = ctx.str_attr(call, "callee").ok_or_else(unsupported)?.to_string();
    let callee_ty = module
        .lookup(ctx, &callee)
        .filter(|&f| ctx.op_kind(f) == OpKind::Func)
        .and_then(|f| ctx.type_attr(f, "function_type"))
        .ok_or_else(unsupported)?;
    Ok(Destructor {
        block,
        callee,
        callee_ty,
    })
}

fn ensure_dso_handle(ctx: &mut Context, module: Module, u8_ty: Type, location: &SourceLocation) -> Result<(), CirError> {
    match module.lookup(ctx, DSO_HANDLE) {
        Some(existing)
            if ctx.op_kind(existing) == OpKind::Global && ctx.type_attr(existing, "global_type") == Some(u8_ty) =>
        {
            Ok(())
        }
        Some(_) => Err(CirError::lowering_error(
            format!("'@{}' is declared with an unexpected type", DSO_HANDLE),
            location.clone(),
        )),
        None => {
            let body = module.body(ctx);
            let handle =
                OpBuilder::new(InsertPoint::BlockStart(body), location.clone()).build_global(ctx, DSO_HANDLE, u8_ty);
            let linkage = ctx.attrs.string("external");
            ctx.set_attr(handle, "linkage", linkage);
            Ok(())
        }
    }
}
