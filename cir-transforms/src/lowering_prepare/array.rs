//! Expansion of `cir.array.ctor` and `cir.array.dtor`
//!
//! Construction visits elements in ascending address order, destruction in
//! descending order. A constant-length array (the single-operand form)
//! becomes a `cir.do` loop, or straight-line code when its length is within
//! the unroll threshold. A runtime count (the pointer plus count form) may be
//! zero, so it becomes a `cir.while` loop that tests before the first element.

use super::emit_element_body;
use crate::options::LoweringPrepareOptions;
use crate::rewrite::constant_int;
use cir_common::{CirError, SourceLocation};
use cir_ir::dialect::array_init_element;
use cir_ir::{add_region_block, Block, CastKind, CmpKind, Context, InsertPoint, Op, OpBuilder, OpKind, Type, Value};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Ascending,
    Descending,
}

pub(super) fn lower_array_init(ctx: &mut Context, op: Op, options: &LoweringPrepareOptions) -> Result<(), CirError> {
    let location = ctx.location(op).clone();
    let order = match ctx.op_kind(op) {
        OpKind::ArrayCtor => Order::Ascending,
        _ => Order::Descending,
    };
    let elem = array_init_element(ctx, op).ok_or_else(|| {
        CirError::lowering_error(
            format!("cannot determine the element type of '{}'", ctx.op_name(op)),
            location.clone(),
        )
    })?;
    let element_body = ctx.entry_block(ctx.region(op, 0)).ok_or_else(|| {
        CirError::lowering_error(
            format!("'{}' has no element body", ctx.op_name(op)),
            location.clone(),
        )
    })?;

    let base = ctx.operand(op, 0);
    let elem_ptr = ctx.types.ptr(elem);
    let mut builder = OpBuilder::new(InsertPoint::Before(op), location.clone());

    let (begin, count) = if ctx.operands(op).len() == 1 {
        let len = ctx
            .types
            .pointee(ctx.value_type(base))
            .and_then(|array| ctx.types.array_info(array))
            .map(|(_, len)| len)
            .ok_or_else(|| CirError::lowering_error("array operand does not point to an array", location.clone()))?;
        if len == 0 {
            debug!("erasing '{}' over an empty array at {}", ctx.op_name(op), location);
            ctx.erase_op(op);
            return Ok(());
        }
        if len <= options.unroll_threshold {
            let begin = builder.build_cast(ctx, CastKind::ArrayToPtrdecay, base, elem_ptr);
            unroll(ctx, op, element_body, begin, len, order);
            return Ok(());
        }
        let begin = builder.build_cast(ctx, CastKind::ArrayToPtrdecay, base, elem_ptr);
        let s64 = ctx.types.s64();
        let count = builder.build_const_int(ctx, s64, i128::from(len));
        (begin, Count::Static(count))
    } else {
        let count = ctx.operand(op, 1);
        match constant_int(ctx, count) {
            Some(0) => {
                debug!("erasing '{}' with a zero count at {}", ctx.op_name(op), location);
                ctx.erase_op(op);
                return Ok(());
            }
            Some(len) if len > 0 && len <= i128::from(options.unroll_threshold) => {
                let len = u64::try_from(len)
                    .map_err(|_| CirError::lowering_error("element count out of range", location.clone()))?;
                unroll(ctx, op, element_body, base, len, order);
                return Ok(());
            }
            _ => (base, Count::Dynamic(count)),
        }
    };

    let end = builder.build_ptr_stride(ctx, begin, count.value());
    let form = match count {
        Count::Static(_) => OpKind::Do,
        Count::Dynamic(_) => OpKind::While,
    };
    let cursor = cursor_slot(ctx, op, elem_ptr, &location);
    let start = match order {
        Order::Ascending => begin,
        Order::Descending => end,
    };
    builder.build_store(ctx, start, cursor);
    let bounds = Bounds { begin, end, cursor };
    let loop_op = build_loop(ctx, &mut builder, form, bounds, order, element_body);
    debug!(
        "expanded '{}' at {} into '{}' ({:?})",
        ctx.op_name(op),
        location,
        ctx.op_name(loop_op),
        order
    );
    ctx.erase_op(op);
    Ok(())
}

#[derive(Clone, Copy)]
enum Count {
    Static(Value),
    Dynamic(Value),
}

impl Count {
    fn value(self) -> Value {
        match self {
            Count::Static(v) | Count::Dynamic(v) => v,
        }
    }
}

#[derive(Clone, Copy)]
struct Bounds {
    begin: Value,
    end: Value,
    /// Slot holding the current element pointer
    cursor: Value,
}

/// Straight-line expansion, one copy of the element body per element
fn unroll(ctx: &mut Context, op: Op, element_body: Block, begin: Value, len: u64, order: Order) {
    let location = ctx.location(op).clone();
    let s64 = ctx.types.s64();
    let indices: Vec<u64> = match order {
        Order::Ascending => (0..len).collect(),
        Order::Descending => (0..len).rev().collect(),
    };
    for index in indices {
        let mut builder = OpBuilder::new(InsertPoint::Before(op), location.clone());
        let offset = builder.build_const_int(ctx, s64, i128::from(index));
        let addr = builder.build_ptr_stride(ctx, begin, offset);
        emit_element_body(ctx, element_body, addr, InsertPoint::Before(op));
    }
    debug!("unrolled '{}' at {} into {} element(s)", ctx.op_name(op), location, len);
    ctx.erase_op(op);
}

/// Stack slot for the loop cursor, at the top of the enclosing function
/// when there is one
fn cursor_slot(ctx: &mut Context, op: Op, elem_ptr: Type, location: &SourceLocation) -> Value {
    let ip = ctx
        .parent_of_kind(op, OpKind::Func)
        .and_then(|func| cir_ir::func_entry(ctx, func))
        .map(InsertPoint::BlockStart)
        .unwrap_or(InsertPoint::Before(op));
    OpBuilder::new(ip, location.clone()).build_alloca(ctx, elem_ptr, "__array_idx")
}

fn build_loop(
    ctx: &mut Context,
    builder: &mut OpBuilder,
    form: OpKind,
    bounds: Bounds,
    order: Order,
    element_body: Block,
) -> Op {
    let location = builder.location().clone();
    let loop_op = builder.build_region_op(ctx, form, &[], &[]);
    let (body_index, cond_index) = match form {
        OpKind::Do => (0, 1),
        _ => (1, 0),
    };
    let body = add_region_block(ctx, loop_op, body_index, &[]);
    let cond = add_region_block(ctx, loop_op, cond_index, &[]);
    let s64 = ctx.types.s64();

    let mut b = OpBuilder::new(InsertPoint::BlockEnd(body), location.clone());
    let current = b.build_load(ctx, bounds.cursor);
    match order {
        Order::Ascending => {
            emit_element_body(ctx, element_body, current, InsertPoint::BlockEnd(body));
            let one = b.build_const_int(ctx, s64, 1);
            let next = b.build_ptr_stride(ctx, current, one);
            b.build_store(ctx, next, bounds.cursor);
        }
        Order::Descending => {
            let minus_one = b.build_const_int(ctx, s64, -1);
            let prev = b.build_ptr_stride(ctx, current, minus_one);
            b.build_store(ctx, prev, bounds.cursor);
            emit_element_body(ctx, element_body, prev, InsertPoint::BlockEnd(body));
        }
    }
    b.build_yield(ctx, &[]);

    let stop = match order {
        Order::Ascending => bounds.end,
        Order::Descending => bounds.begin,
    };
    let mut c = OpBuilder::new(InsertPoint::BlockEnd(cond), location);
    let current = c.build_load(ctx, bounds.cursor);
    let more = c.build_cmp(ctx, CmpKind::Ne, current, stop);
    c.build_condition(ctx, more);
    loop_op
}
