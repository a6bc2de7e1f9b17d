//! Shared helpers for the integration tests
//!
//! [`Interpreter`] executes lowered CIR directly on the operation graph. It
//! knows just enough of the dialect to run what the pipeline produces:
//! scalar arithmetic, stack and global memory addressed by byte offsets,
//! structured control flow, and calls. Functions without a body are
//! recorded instead of executed, which is how the tests observe element
//! constructors, allocators and `__cxa_atexit` registrations.

#![allow(dead_code)]

use cir_common::DiagnosticEngine;
use cir_ir::attrs::wrap_int;
use cir_ir::{
    func_entry, parse_module, verify, BinOpKind, Block, CastKind, CmpKind, Context, DataLayout, Module, Op, OpKind,
    Region, Type, UnaryKind, Value,
};
use cir_transforms::rewrite::{binop_kind, cast_kind, cmp_kind, unary_kind};
use cir_transforms::PipelineOptions;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtVal {
    Int(i128),
    Bool(bool),
    /// Byte `offset` into allocation `alloc`
    Ptr { alloc: usize, offset: i64 },
    Func(String),
}

impl RtVal {
    pub fn int(&self) -> i128 {
        match self {
            RtVal::Int(v) => *v,
            other => panic!("expected an integer, got {:?}", other),
        }
    }

    pub fn bool(&self) -> bool {
        match self {
            RtVal::Bool(b) => *b,
            other => panic!("expected a boolean, got {:?}", other),
        }
    }

    pub fn ptr(&self) -> (usize, i64) {
        match self {
            RtVal::Ptr { alloc, offset } => (*alloc, *offset),
            other => panic!("expected a pointer, got {:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub callee: String,
    pub args: Vec<RtVal>,
}

enum Flow {
    Next,
    Yield(Vec<RtVal>),
    Condition(bool),
    Return(Option<RtVal>),
    Branch(Block, Vec<RtVal>),
}

type Env = HashMap<Value, RtVal>;

pub struct Interpreter<'c> {
    ctx: &'c Context,
    module: Module,
    layout: DataLayout,
    memory: Vec<HashMap<i64, RtVal>>,
    globals: HashMap<String, usize>,
    pub calls: Vec<CallRecord>,
}

impl<'c> Interpreter<'c> {
    pub fn new(ctx: &'c Context, module: Module) -> Self {
        Self {
            ctx,
            module,
            layout: DataLayout::default(),
            memory: Vec::new(),
            globals: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// Call `name` with `args`
    pub fn run(&mut self, name: &str, args: Vec<RtVal>) -> Option<RtVal> {
        let func = self
            .module
            .lookup(self.ctx, name)
            .unwrap_or_else(|| panic!("no function '@{}'", name));
        let ret = self
            .ctx
            .type_attr(func, "function_type")
            .and_then(|fty| self.ctx.types.func_info(fty).map(|(_, ret, _)| ret));
        self.call(name, args, ret)
    }

    /// Address of global `name`, allocated on first use
    pub fn global(&mut self, name: &str) -> RtVal {
        let alloc = match self.globals.get(name) {
            Some(&alloc) => alloc,
            None => {
                let alloc = self.allocate();
                self.globals.insert(name.to_string(), alloc);
                alloc
            }
        };
        RtVal::Ptr { alloc, offset: 0 }
    }

    pub fn calls_to(&self, callee: &str) -> Vec<&CallRecord> {
        self.calls.iter().filter(|c| c.callee == callee).collect()
    }

    /// Byte offsets of the pointer passed first to every call of `callee`
    pub fn offsets_for(&self, callee: &str) -> Vec<i64> {
        self.calls_to(callee).iter().map(|c| c.args[0].ptr().1).collect()
    }

    pub fn callees(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.callee.as_str()).collect()
    }

    fn allocate(&mut self) -> usize {
        self.memory.push(HashMap::new());
        self.memory.len() - 1
    }

    fn call(&mut self, callee: &str, args: Vec<RtVal>, ret: Option<Type>) -> Option<RtVal> {
        self.calls.push(CallRecord {
            callee: callee.to_string(),
            args: args.clone(),
        });
        let body = self
            .module
            .lookup(self.ctx, callee)
            .filter(|&f| self.ctx.op_kind(f) == OpKind::Func)
            .and_then(|f| func_entry(self.ctx, f).map(|_| self.ctx.region(f, 0)));
        let Some(body) = body else {
            return self.external_result(ret);
        };
        let mut env = Env::new();
        match self.run_region(&mut env, body, args) {
            Flow::Return(value) => value,
            _ => panic!("'@{}' finished without returning", callee),
        }
    }

    /// Result of a function without a body: fresh memory for pointers,
    /// zero for scalars
    fn external_result(&mut self, ret: Option<Type>) -> Option<RtVal> {
        let ty = ret?;
        let ctx = self.ctx;
        let types = &ctx.types;
        if types.pointee(ty).is_some() {
            let alloc = self.allocate();
            Some(RtVal::Ptr { alloc, offset: 0 })
        } else if types.int_info(ty).is_some() {
            Some(RtVal::Int(0))
        } else if types.is_bool(ty) {
            Some(RtVal::Bool(false))
        } else {
            None
        }
    }

    fn run_region(&mut self, env: &mut Env, region: Region, args: Vec<RtVal>) -> Flow {
        let Some(mut block) = self.ctx.entry_block(region) else {
            return Flow::Yield(Vec::new());
        };
        let mut args = args;
        loop {
            for (&param, value) in self.ctx.block_args(block).iter().zip(args) {
                env.insert(param, value);
            }
            match self.run_block(env, block) {
                Flow::Branch(next, values) => {
                    block = next;
                    args = values;
                }
                flow => return flow,
            }
        }
    }

    fn run_block(&mut self, env: &mut Env, block: Block) -> Flow {
        let ctx = self.ctx;
        for &op in ctx.block_ops(block) {
            match self.exec(env, op) {
                Flow::Next => {}
                flow => return flow,
            }
        }
        panic!("block fell off its end");
    }

    fn operand(&self, env: &Env, op: Op, index: usize) -> RtVal {
        let value = self.ctx.operand(op, index);
        env.get(&value)
            .cloned()
            .unwrap_or_else(|| panic!("use of an undefined value in '{}'", self.ctx.op_name(op)))
    }

    fn operands(&self, env: &Env, op: Op) -> Vec<RtVal> {
        (0..self.ctx.operands(op).len()).map(|i| self.operand(env, op, i)).collect()
    }

    fn result_type(&self, op: Op) -> Type {
        self.ctx.value_type(self.ctx.result(op, 0))
    }

    fn set_result(&self, env: &mut Env, op: Op, value: RtVal) {
        env.insert(self.ctx.result(op, 0), value);
    }

    fn wrap(&self, ty: Type, value: i128) -> RtVal {
        let (width, signed) = self
            .ctx
            .types
            .int_info(ty)
            .unwrap_or_else(|| panic!("not an integer type: {}", self.ctx.types.display(ty)));
        RtVal::Int(wrap_int(value, width, signed))
    }

    fn pointee_size(&self, ptr_ty: Type) -> i64 {
        let types = &self.ctx.types;
        let pointee = types.pointee(ptr_ty).expect("pointer type");
        let size = self.layout.size_of(types, pointee).expect("sized pointee");
        i64::try_from(size).expect("size fits")
    }

    fn exec(&mut self, env: &mut Env, op: Op) -> Flow {
        let ctx = self.ctx;
        match ctx.op_kind(op) {
            OpKind::Const => {
                let attr = ctx.attr(op, "value").expect("constant value");
                let value = match ctx.attrs.as_bool(attr) {
                    Some(b) => RtVal::Bool(b),
                    None => RtVal::Int(ctx.attrs.as_int(attr).expect("integer constant")),
                };
                self.set_result(env, op, value);
            }
            OpKind::Unary => {
                let input = self.operand(env, op, 0);
                let kind = unary_kind(ctx, op).expect("unary kind");
                let value = match input {
                    RtVal::Bool(b) => match kind {
                        UnaryKind::Not => RtVal::Bool(!b),
                        other => panic!("'{}' on a boolean", other),
                    },
                    RtVal::Int(v) => {
                        let ty = self.result_type(op);
                        match kind {
                            UnaryKind::Not => self.wrap(ty, !v),
                            UnaryKind::Minus => self.wrap(ty, -v),
                            UnaryKind::Plus => RtVal::Int(v),
                            UnaryKind::Inc => self.wrap(ty, v + 1),
                            UnaryKind::Dec => self.wrap(ty, v - 1),
                        }
                    }
                    other => panic!("unary on {:?}", other),
                };
                self.set_result(env, op, value);
            }
            OpKind::BinOp => {
                let kind = binop_kind(ctx, op).expect("binop kind");
                let value = match (self.operand(env, op, 0), self.operand(env, op, 1)) {
                    (RtVal::Bool(l), RtVal::Bool(r)) => RtVal::Bool(match kind {
                        BinOpKind::And => l & r,
                        BinOpKind::Or => l | r,
                        BinOpKind::Xor => l ^ r,
                        other => panic!("'{}' on booleans", other),
                    }),
                    (RtVal::Int(l), RtVal::Int(r)) => {
                        let ty = self.result_type(op);
                        let (width, _) = ctx.types.int_info(ty).expect("integer result");
                        let raw = kind
                            .evaluate(l, r, width)
                            .unwrap_or_else(|| panic!("undefined '{}' of {} and {}", kind, l, r));
                        self.wrap(ty, raw)
                    }
                    (l, r) => panic!("binop on {:?} and {:?}", l, r),
                };
                self.set_result(env, op, value);
            }
            OpKind::Cmp => {
                let kind = cmp_kind(ctx, op).expect("cmp kind");
                let result = match (self.operand(env, op, 0), self.operand(env, op, 1)) {
                    (RtVal::Int(l), RtVal::Int(r)) => kind.evaluate(l, r),
                    (RtVal::Bool(l), RtVal::Bool(r)) => kind.evaluate(i128::from(l), i128::from(r)),
                    (RtVal::Ptr { alloc: a, offset: l }, RtVal::Ptr { alloc: b, offset: r }) => match kind {
                        CmpKind::Eq => a == b && l == r,
                        CmpKind::Ne => a != b || l != r,
                        _ => {
                            assert_eq!(a, b, "ordering pointers into different allocations");
                            kind.evaluate(i128::from(l), i128::from(r))
                        }
                    },
                    (l, r) => panic!("cmp of {:?} and {:?}", l, r),
                };
                self.set_result(env, op, RtVal::Bool(result));
            }
            OpKind::Cast => {
                let input = self.operand(env, op, 0);
                let ty = self.result_type(op);
                let value = match cast_kind(ctx, op).expect("cast kind") {
                    CastKind::IntToBool => RtVal::Bool(input.int() != 0),
                    CastKind::BoolToInt => RtVal::Int(i128::from(input.bool())),
                    CastKind::Integral => self.wrap(ty, input.int()),
                    CastKind::ArrayToPtrdecay | CastKind::Bitcast => input,
                    other => panic!("unsupported cast '{}'", other),
                };
                self.set_result(env, op, value);
            }
            OpKind::Select => {
                let chosen = if self.operand(env, op, 0).bool() { 1 } else { 2 };
                let value = self.operand(env, op, chosen);
                self.set_result(env, op, value);
            }
            OpKind::Alloca => {
                let alloc = self.allocate();
                self.set_result(env, op, RtVal::Ptr { alloc, offset: 0 });
            }
            OpKind::Load => {
                let (alloc, offset) = self.operand(env, op, 0).ptr();
                let value = self.memory[alloc]
                    .get(&offset)
                    .cloned()
                    .unwrap_or_else(|| panic!("read of uninitialized memory at {}+{}", alloc, offset));
                self.set_result(env, op, value);
            }
            OpKind::Store => {
                let value = self.operand(env, op, 0);
                let (alloc, offset) = self.operand(env, op, 1).ptr();
                self.memory[alloc].insert(offset, value);
            }
            OpKind::Copy => {
                let (dst, dst_off) = self.operand(env, op, 0).ptr();
                let (src, src_off) = self.operand(env, op, 1).ptr();
                let size = self.pointee_size(ctx.value_type(ctx.operand(op, 0)));
                let copied: Vec<_> = self.memory[src]
                    .iter()
                    .filter(|(&off, _)| off >= src_off && off < src_off + size)
                    .map(|(&off, v)| (off - src_off, v.clone()))
                    .collect();
                for (delta, value) in copied {
                    self.memory[dst].insert(dst_off + delta, value);
                }
            }
            OpKind::GetGlobal => {
                let name = ctx.str_attr(op, "name").expect("symbol name");
                let target = self.module.lookup(ctx, name).expect("known symbol");
                let value = match ctx.op_kind(target) {
                    OpKind::Func => RtVal::Func(name.to_string()),
                    _ => self.global(name),
                };
                self.set_result(env, op, value);
            }
            OpKind::PtrStride => {
                let (alloc, offset) = self.operand(env, op, 0).ptr();
                let stride = i64::try_from(self.operand(env, op, 1).int()).expect("stride fits");
                let size = self.pointee_size(self.result_type(op));
                self.set_result(env, op, RtVal::Ptr { alloc, offset: offset + stride * size });
            }
            OpKind::GetElement => {
                let (alloc, offset) = self.operand(env, op, 0).ptr();
                let index = i64::try_from(self.operand(env, op, 1).int()).expect("index fits");
                let size = self.pointee_size(self.result_type(op));
                self.set_result(env, op, RtVal::Ptr { alloc, offset: offset + index * size });
            }
            OpKind::GetMember => {
                let (alloc, offset) = self.operand(env, op, 0).ptr();
                let index = usize::try_from(ctx.int_attr(op, "index").expect("member index")).expect("index fits");
                let record = ctx.types.pointee(ctx.value_type(ctx.operand(op, 0))).expect("record pointer");
                let field = self.layout.field_offset(&ctx.types, record, index).expect("field offset");
                let field = i64::try_from(field).expect("offset fits");
                self.set_result(env, op, RtVal::Ptr { alloc, offset: offset + field });
            }
            OpKind::Call => {
                let callee = ctx.str_attr(op, "callee").expect("callee").to_string();
                let args = self.operands(env, op);
                let ret = ctx.results(op).first().map(|&r| ctx.value_type(r));
                if let Some(value) = self.call(&callee, args, ret) {
                    if !ctx.results(op).is_empty() {
                        self.set_result(env, op, value);
                    }
                }
            }
            OpKind::Return => {
                let value = ctx.operands(op).first().map(|_| self.operand(env, op, 0));
                return Flow::Return(value);
            }
            OpKind::Yield => return Flow::Yield(self.operands(env, op)),
            OpKind::Condition => return Flow::Condition(self.operand(env, op, 0).bool()),
            OpKind::Br => return Flow::Branch(ctx.successors(op)[0], self.operands(env, op)),
            OpKind::BrCond => {
                let taken = if self.operand(env, op, 0).bool() { 0 } else { 1 };
                return Flow::Branch(ctx.successors(op)[taken], Vec::new());
            }
            OpKind::Scope => match self.run_region(env, ctx.region(op, 0), Vec::new()) {
                Flow::Yield(values) => self.bind_results(env, op, values),
                flow => return flow,
            },
            OpKind::Ternary => {
                let arm = if self.operand(env, op, 0).bool() { 0 } else { 1 };
                match self.run_region(env, ctx.region(op, arm), Vec::new()) {
                    Flow::Yield(values) => self.bind_results(env, op, values),
                    flow => return flow,
                }
            }
            OpKind::Do => loop {
                if let Flow::Return(value) = self.run_region(env, ctx.region(op, 0), Vec::new()) {
                    return Flow::Return(value);
                }
                if !self.loop_condition(env, ctx.region(op, 1)) {
                    break;
                }
            },
            OpKind::While => {
                while self.loop_condition(env, ctx.region(op, 0)) {
                    if let Flow::Return(value) = self.run_region(env, ctx.region(op, 1), Vec::new()) {
                        return Flow::Return(value);
                    }
                }
            }
            OpKind::Unreachable => panic!("reached cir.unreachable"),
            other => panic!("cannot interpret '{}'", other.name()),
        }
        Flow::Next
    }

    fn loop_condition(&mut self, env: &mut Env, region: Region) -> bool {
        match self.run_region(env, region, Vec::new()) {
            Flow::Condition(more) => more,
            _ => panic!("loop condition region did not end in cir.condition"),
        }
    }

    fn bind_results(&self, env: &mut Env, op: Op, values: Vec<RtVal>) {
        for (&result, value) in self.ctx.results(op).iter().zip(values) {
            env.insert(result, value);
        }
    }
}

pub fn parse(source: &str) -> (Context, Module) {
    let mut ctx = Context::new();
    let module = parse_module(&mut ctx, source, "input.cir").unwrap();
    verify(&ctx, module.op()).unwrap();
    (ctx, module)
}

/// Parse `source` and run the pipeline described by `options` over it
pub fn lower(source: &str, options: &PipelineOptions) -> (Context, Module) {
    let (mut ctx, module) = parse(source);
    let mut diags = DiagnosticEngine::new();
    let mut pm = options.build_pass_manager().unwrap();
    pm.run(&mut ctx, module, &mut diags).unwrap();
    assert!(!diags.has_errors());
    (ctx, module)
}

/// Options running only the given passes, verifying after each
pub fn pipeline(passes: &str) -> PipelineOptions {
    let mut options = PipelineOptions::default();
    options.set_passes(passes);
    options.verify_each = true;
    options
}

pub fn count_ops(ctx: &Context, module: Module, kind: OpKind) -> usize {
    ctx.walk(module.op())
        .into_iter()
        .filter(|&op| ctx.op_kind(op) == kind)
        .count()
}
