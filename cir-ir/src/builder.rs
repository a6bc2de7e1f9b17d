//! IR Builder
//!
//! Provides utilities for constructing IR programmatically. The builder
//! carries an insertion point and a location; every `build_*` call creates
//! one operation there and returns its result.

use crate::attrs::Attr;
use crate::context::{Block, Context, InsertPoint, Op, OperationState, Value};
use crate::dialect::{BinOpKind, CastKind, CmpKind, OpKind, UnaryKind};
use crate::types::Type;
use cir_common::SourceLocation;

/// Builder for constructing IR at a cursor
#[derive(Debug, Clone)]
pub struct OpBuilder {
    ip: InsertPoint,
    location: SourceLocation,
}

impl OpBuilder {
    pub fn new(ip: InsertPoint, location: SourceLocation) -> Self {
        Self { ip, location }
    }

    pub fn at_end(block: Block) -> Self {
        Self::new(InsertPoint::BlockEnd(block), SourceLocation::unknown())
    }

    pub fn before(ctx: &Context, op: Op) -> Self {
        Self::new(InsertPoint::Before(op), ctx.location(op).clone())
    }

    pub fn insertion_point(&self) -> InsertPoint {
        self.ip
    }

    pub fn set_insertion_point(&mut self, ip: InsertPoint) {
        self.ip = ip;
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn set_location(&mut self, location: SourceLocation) {
        self.location = location;
    }

    /// Create `state` at the insertion point. Consecutive inserts keep
    /// program order.
    pub fn insert(&mut self, ctx: &mut Context, state: OperationState) -> Op {
        let op = ctx.create_op(state);
        ctx.insert_op(op, self.ip);
        match self.ip {
            InsertPoint::BlockStart(_) | InsertPoint::After(_) => self.ip = InsertPoint::After(op),
            InsertPoint::BlockEnd(_) | InsertPoint::Before(_) => {}
        }
        op
    }

    fn state(&self, kind: OpKind) -> OperationState {
        OperationState::new(kind, self.location.clone())
    }

    fn single(&mut self, ctx: &mut Context, state: OperationState) -> Value {
        let op = self.insert(ctx, state);
        ctx.result(op, 0)
    }

    pub fn build_const(&mut self, ctx: &mut Context, value: Attr, ty: Type) -> Value {
        let state = self.state(OpKind::Const).result(ty).attr("value", value);
        self.single(ctx, state)
    }

    pub fn build_const_int(&mut self, ctx: &mut Context, ty: Type, value: i128) -> Value {
        let attr = ctx.attrs.int(&ctx.types, value, ty);
        self.build_const(ctx, attr, ty)
    }

    pub fn build_const_bool(&mut self, ctx: &mut Context, value: bool) -> Value {
        let attr = ctx.attrs.bool(value);
        let ty = ctx.types.bool();
        self.build_const(ctx, attr, ty)
    }

    pub fn build_unary(&mut self, ctx: &mut Context, kind: UnaryKind, input: Value) -> Value {
        let ty = ctx.value_type(input);
        let kind = ctx.attrs.string(&kind.to_string());
        let state = self.state(OpKind::Unary).operand(input).result(ty).attr("kind", kind);
        self.single(ctx, state)
    }

    pub fn build_binop(&mut self, ctx: &mut Context, kind: BinOpKind, lhs: Value, rhs: Value) -> Value {
        let ty = ctx.value_type(lhs);
        let kind = ctx.attrs.string(&kind.to_string());
        let state = self
            .state(OpKind::BinOp)
            .operands([lhs, rhs])
            .result(ty)
            .attr("kind", kind);
        self.single(ctx, state)
    }

    pub fn build_cmp(&mut self, ctx: &mut Context, kind: CmpKind, lhs: Value, rhs: Value) -> Value {
        let ty = ctx.types.bool();
        let kind = ctx.attrs.string(&kind.to_string());
        let state = self
            .state(OpKind::Cmp)
            .operands([lhs, rhs])
            .result(ty)
            .attr("kind", kind);
        self.single(ctx, state)
    }

    pub fn build_cast(&mut self, ctx: &mut Context, kind: CastKind, input: Value, ty: Type) -> Value {
        let kind = ctx.attrs.string(&kind.to_string());
        let state = self.state(OpKind::Cast).operand(input).result(ty).attr("kind", kind);
        self.single(ctx, state)
    }

    pub fn build_select(&mut self, ctx: &mut Context, cond: Value, on_true: Value, on_false: Value) -> Value {
        let ty = ctx.value_type(on_true);
        let state = self
            .state(OpKind::Select)
            .operands([cond, on_true, on_false])
            .result(ty);
        self.single(ctx, state)
    }

    pub fn build_alloca(&mut self, ctx: &mut Context, ty: Type, name: &str) -> Value {
        let ptr = ctx.types.ptr(ty);
        let alloca_type = ctx.attrs.type_attr(ty);
        let name = ctx.attrs.string(name);
        let state = self
            .state(OpKind::Alloca)
            .result(ptr)
            .attr("alloca_type", alloca_type)
            .attr("name", name);
        self.single(ctx, state)
    }

    pub fn build_load(&mut self, ctx: &mut Context, addr: Value) -> Value {
        let ptr_ty = ctx.value_type(addr);
        let ty = ctx
            .types
            .pointee(ptr_ty)
            .unwrap_or_else(|| panic!("load from non-pointer {}", ctx.types.display(ptr_ty)));
        let state = self.state(OpKind::Load).operand(addr).result(ty);
        self.single(ctx, state)
    }

    pub fn build_store(&mut self, ctx: &mut Context, value: Value, addr: Value) -> Op {
        let state = self.state(OpKind::Store).operands([value, addr]);
        self.insert(ctx, state)
    }

    pub fn build_copy(&mut self, ctx: &mut Context, dst: Value, src: Value) -> Op {
        let state = self.state(OpKind::Copy).operands([dst, src]);
        self.insert(ctx, state)
    }

    pub fn build_get_global(&mut self, ctx: &mut Context, name: &str, ty: Type) -> Value {
        let ptr = ctx.types.ptr(ty);
        let name = ctx.attrs.symbol(name);
        let state = self.state(OpKind::GetGlobal).result(ptr).attr("name", name);
        self.single(ctx, state)
    }

    pub fn build_ptr_stride(&mut self, ctx: &mut Context, base: Value, stride: Value) -> Value {
        let ty = ctx.value_type(base);
        let state = self.state(OpKind::PtrStride).operands([base, stride]).result(ty);
        self.single(ctx, state)
    }

    /// Address of element `index` of the array `base` points to
    pub fn build_get_element(&mut self, ctx: &mut Context, base: Value, index: Value) -> Value {
        let base_ty = ctx.value_type(base);
        let elem = ctx
            .types
            .pointee(base_ty)
            .and_then(|arr| ctx.types.array_info(arr))
            .map(|(elem, _)| elem)
            .unwrap_or_else(|| panic!("get_element on {}", ctx.types.display(base_ty)));
        let ptr = ctx.types.ptr(elem);
        let state = self.state(OpKind::GetElement).operands([base, index]).result(ptr);
        self.single(ctx, state)
    }

    pub fn build_get_member(&mut self, ctx: &mut Context, base: Value, index: usize) -> Value {
        let base_ty = ctx.value_type(base);
        let record = ctx
            .types
            .pointee(base_ty)
            .unwrap_or_else(|| panic!("get_member on {}", ctx.types.display(base_ty)));
        let field = ctx.types.record_fields(record)[index];
        let ptr = ctx.types.ptr(field);
        let index_ty = ctx.types.u64();
        let index = ctx.attrs.int(&ctx.types, index as i128, index_ty);
        let state = self
            .state(OpKind::GetMember)
            .operand(base)
            .result(ptr)
            .attr("index", index);
        self.single(ctx, state)
    }

    pub fn build_call(&mut self, ctx: &mut Context, callee: &str, args: &[Value], ret: Option<Type>) -> Option<Value> {
        let callee = ctx.attrs.symbol(callee);
        let state = self
            .state(OpKind::Call)
            .operands(args.iter().copied())
            .results(ret)
            .attr("callee", callee);
        let op = self.insert(ctx, state);
        ctx.results(op).first().copied()
    }

    pub fn build_return(&mut self, ctx: &mut Context, value: Option<Value>) -> Op {
        let state = self.state(OpKind::Return).operands(value);
        self.insert(ctx, state)
    }

    pub fn build_yield(&mut self, ctx: &mut Context, values: &[Value]) -> Op {
        let state = self.state(OpKind::Yield).operands(values.iter().copied());
        self.insert(ctx, state)
    }

    pub fn build_condition(&mut self, ctx: &mut Context, cond: Value) -> Op {
        let state = self.state(OpKind::Condition).operand(cond);
        self.insert(ctx, state)
    }

    pub fn build_br(&mut self, ctx: &mut Context, dest: Block, args: &[Value]) -> Op {
        let state = self
            .state(OpKind::Br)
            .operands(args.iter().copied())
            .successor(dest);
        self.insert(ctx, state)
    }

    pub fn build_brcond(&mut self, ctx: &mut Context, cond: Value, on_true: Block, on_false: Block) -> Op {
        let state = self
            .state(OpKind::BrCond)
            .operand(cond)
            .successor(on_true)
            .successor(on_false);
        self.insert(ctx, state)
    }

    /// Create a structured op of `kind` with its regions left empty
    pub fn build_region_op(&mut self, ctx: &mut Context, kind: OpKind, operands: &[Value], results: &[Type]) -> Op {
        let state = self
            .state(kind)
            .operands(operands.iter().copied())
            .results(results.iter().copied());
        self.insert(ctx, state)
    }

    /// Create a function; `with_body` adds an entry block taking the parameters
    pub fn build_func(&mut self, ctx: &mut Context, name: &str, func_ty: Type, with_body: bool) -> Op {
        let sym_name = ctx.attrs.string(name);
        let function_type = ctx.attrs.type_attr(func_ty);
        let state = self
            .state(OpKind::Func)
            .attr("sym_name", sym_name)
            .attr("function_type", function_type);
        let op = self.insert(ctx, state);
        if with_body {
            let params = ctx
                .types
                .func_info(func_ty)
                .map(|(params, _, _)| params.to_vec())
                .unwrap_or_default();
            let entry = ctx.create_block(&params);
            let body = ctx.region(op, 0);
            ctx.append_block(body, entry);
        }
        op
    }

    pub fn build_global(&mut self, ctx: &mut Context, name: &str, ty: Type) -> Op {
        let sym_name = ctx.attrs.string(name);
        let global_type = ctx.attrs.type_attr(ty);
        let state = self
            .state(OpKind::Global)
            .attr("sym_name", sym_name)
            .attr("global_type", global_type);
        self.insert(ctx, state)
    }
}

/// Entry block of a function body
pub fn func_entry(ctx: &Context, func: Op) -> Option<Block> {
    ctx.entry_block(ctx.region(func, 0))
}

/// Append a fresh block with `args` to region `index` of `op`
pub fn add_region_block(ctx: &mut Context, op: Op, index: usize, args: &[Type]) -> Block {
    let block = ctx.create_block(args);
    let region = ctx.region(op, index);
    ctx.append_block(region, block);
    block
}
