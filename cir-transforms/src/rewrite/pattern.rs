//! Rewrite patterns and the rewriter they mutate the IR through

use cir_ir::builder::OpBuilder;
use cir_ir::{Block, Context, Op, OpKind, Value};

/// A local rewrite rooted at one operation.
///
/// `match_and_rewrite` returns `None` when the pattern does not apply. All
/// matching must happen before the first mutation: once the rewriter has
/// been used to change the IR the pattern must return `Some(())`.
pub trait RewritePattern {
    fn name(&self) -> &'static str;

    /// Kind of operation the pattern is rooted at; `None` matches any kind
    fn root_kind(&self) -> Option<OpKind> {
        None
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()>;
}

/// Ordered collection of patterns; earlier patterns win
#[derive(Default)]
pub struct RewritePatternSet {
    patterns: Vec<Box<dyn RewritePattern>>,
}

impl RewritePatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: impl RewritePattern + 'static) -> &mut Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    /// Patterns that may apply to an operation of `kind`, in registration order
    pub fn for_kind(&self, kind: OpKind) -> impl Iterator<Item = &(dyn RewritePattern + 'static)> + '_ {
        self.patterns
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| p.root_kind().map_or(true, |root| root == kind))
    }
}

/// Mutation interface handed to patterns.
///
/// Besides forwarding to the [`Context`], it records the operations a
/// rewrite touched so the driver can revisit them.
pub struct PatternRewriter<'a> {
    ctx: &'a mut Context,
    touched: Vec<Op>,
}

impl<'a> PatternRewriter<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            touched: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &Context {
        self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut Context {
        self.ctx
    }

    /// Builder inserting right before `op`, at its location
    pub fn builder_before(&self, op: Op) -> OpBuilder {
        OpBuilder::before(self.ctx(), op)
    }

    /// Operations whose operands or surroundings changed
    pub fn into_touched(self) -> Vec<Op> {
        self.touched
    }

    fn touch_users(&mut self, value: Value) {
        let users = self.ctx.users(value);
        self.touched.extend(users);
    }

    fn touch_operand_defs(&mut self, op: Op) {
        for inner in self.ctx.walk(op) {
            for &operand in self.ctx.operands(inner) {
                if let Some(def) = self.ctx.defining_op(operand) {
                    self.touched.push(def);
                }
            }
        }
    }

    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) {
        self.touch_users(old);
        self.ctx.replace_all_uses_with(old, new);
    }

    /// Replace every result of `op` and erase it
    pub fn replace_op(&mut self, op: Op, values: &[Value]) {
        for &result in self.ctx.results(op).to_vec().iter() {
            self.touch_users(result);
        }
        self.touch_operand_defs(op);
        self.ctx.replace_op(op, values);
    }

    pub fn erase_op(&mut self, op: Op) {
        self.touch_operand_defs(op);
        self.ctx.erase_op(op);
    }

    /// Change `op` without replacing it
    pub fn modify_op_in_place(&mut self, op: Op, update: impl FnOnce(&mut Context)) {
        update(self.ctx);
        self.touched.push(op);
    }

    pub fn merge_blocks(&mut self, source: Block, dest: Block, args: &[Value]) {
        self.touched.extend_from_slice(self.ctx.block_ops(source));
        self.ctx.merge_blocks(source, dest, args);
    }

    pub fn inline_block_before(&mut self, source: Block, anchor: Op, args: &[Value]) {
        self.touched.extend_from_slice(self.ctx.block_ops(source));
        self.ctx.inline_block_before(source, anchor, args);
    }
}
