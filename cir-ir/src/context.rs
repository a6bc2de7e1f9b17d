//! Operation graph storage
//!
//! The [`Context`] owns everything that belongs to one translation unit: the
//! type and attribute interners and the arenas holding operations, values,
//! blocks and regions. Entities refer to one another through small `Copy`
//! handles. Every value keeps the list of operand slots that read it, so
//! `replace_all_uses_with` and dead-code checks cost O(uses).
//!
//! Erasing an entity leaves a tombstone in its arena; handles are never
//! reused while the context lives.

use crate::attrs::{Attr, AttrInterner};
use crate::dialect::OpKind;
use crate::types::{Type, TypeInterner};
use cir_common::SourceLocation;
use std::collections::{BTreeMap, HashMap};

macro_rules! entity_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

entity_handle!(
    /// Handle to an operation
    Op
);
entity_handle!(
    /// Handle to an SSA value (operation result or block argument)
    Value
);
entity_handle!(
    /// Handle to a basic block
    Block
);
entity_handle!(
    /// Handle to a region
    Region
);

/// One operand slot reading a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: Op,
    pub operand: usize,
}

/// Where a value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Result { op: Op, index: usize },
    BlockArg { block: Block, index: usize },
    /// Forward reference awaiting its definition (textual parsing only)
    Placeholder,
}

/// Cursor for inserting operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    BlockStart(Block),
    BlockEnd(Block),
    Before(Op),
    After(Op),
}

/// Everything needed to create one operation
#[derive(Debug, Clone)]
pub struct OperationState {
    pub kind: OpKind,
    pub location: SourceLocation,
    pub operands: Vec<Value>,
    pub result_types: Vec<Type>,
    pub attrs: BTreeMap<String, Attr>,
    pub num_regions: usize,
    pub successors: Vec<Block>,
}

impl OperationState {
    pub fn new(kind: OpKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            operands: Vec::new(),
            result_types: Vec::new(),
            attrs: BTreeMap::new(),
            num_regions: kind.info().num_regions,
            successors: Vec::new(),
        }
    }

    pub fn operand(mut self, value: Value) -> Self {
        self.operands.push(value);
        self
    }

    pub fn operands(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.operands.extend(values);
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.result_types.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = Type>) -> Self {
        self.result_types.extend(tys);
        self
    }

    pub fn attr(mut self, name: &str, attr: Attr) -> Self {
        self.attrs.insert(name.to_string(), attr);
        self
    }

    pub fn regions(mut self, count: usize) -> Self {
        self.num_regions = count;
        self
    }

    pub fn successor(mut self, block: Block) -> Self {
        self.successors.push(block);
        self
    }
}

/// Old-to-new correspondence threaded through a deep clone
#[derive(Debug, Clone, Default)]
pub struct IrMapping {
    values: HashMap<Value, Value>,
    blocks: HashMap<Block, Block>,
}

impl IrMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_value(&mut self, from: Value, to: Value) {
        self.values.insert(from, to);
    }

    pub fn map_block(&mut self, from: Block, to: Block) {
        self.blocks.insert(from, to);
    }

    /// Mapped value, or `value` itself when it was defined outside the clone
    pub fn lookup_value(&self, value: Value) -> Value {
        self.values.get(&value).copied().unwrap_or(value)
    }

    pub fn lookup_block(&self, block: Block) -> Block {
        self.blocks.get(&block).copied().unwrap_or(block)
    }

    pub fn contains_value(&self, value: Value) -> bool {
        self.values.contains_key(&value)
    }
}

#[derive(Debug, Clone)]
struct OpData {
    kind: OpKind,
    operands: Vec<Value>,
    results: Vec<Value>,
    attrs: BTreeMap<String, Attr>,
    regions: Vec<Region>,
    successors: Vec<Block>,
    location: SourceLocation,
    parent: Option<Block>,
    erased: bool,
}

#[derive(Debug, Clone)]
struct ValueData {
    ty: Type,
    def: ValueDef,
    uses: Vec<Use>,
}

#[derive(Debug, Clone, Default)]
struct BlockData {
    args: Vec<Value>,
    ops: Vec<Op>,
    parent: Option<Region>,
    erased: bool,
}

#[derive(Debug, Clone)]
struct RegionData {
    blocks: Vec<Block>,
    parent: Op,
}

/// Per translation unit IR storage
#[derive(Debug, Default)]
pub struct Context {
    pub types: TypeInterner,
    pub attrs: AttrInterner,
    ops: Vec<OpData>,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    regions: Vec<RegionData>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------

    /// Create a detached operation with empty regions
    pub fn create_op(&mut self, state: OperationState) -> Op {
        let op = Op(self.ops.len() as u32);

        let results = state
            .result_types
            .iter()
            .enumerate()
            .map(|(index, &ty)| self.new_value(ty, ValueDef::Result { op, index }))
            .collect();

        let regions = (0..state.num_regions)
            .map(|_| {
                let region = Region(self.regions.len() as u32);
                self.regions.push(RegionData {
                    blocks: Vec::new(),
                    parent: op,
                });
                region
            })
            .collect();

        self.ops.push(OpData {
            kind: state.kind,
            operands: Vec::new(),
            results,
            attrs: state.attrs,
            regions,
            successors: state.successors,
            location: state.location,
            parent: None,
            erased: false,
        });

        for value in state.operands {
            self.push_operand(op, value);
        }
        op
    }

    /// Number of operations ever created; used to find ops created after a mark
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Live operations created at or after `mark`
    pub fn ops_created_since(&self, mark: usize) -> Vec<Op> {
        (mark..self.ops.len())
            .map(|i| Op(i as u32))
            .filter(|&op| !self.is_erased(op))
            .collect()
    }

    pub fn insert_op(&mut self, op: Op, ip: InsertPoint) {
        assert!(
            self.ops[op.index()].parent.is_none(),
            "'{}' is already attached to a block",
            self.op_name(op)
        );
        let (block, position) = match ip {
            InsertPoint::BlockStart(block) => (block, 0),
            InsertPoint::BlockEnd(block) => (block, self.blocks[block.index()].ops.len()),
            InsertPoint::Before(anchor) => {
                let block = self.expect_parent(anchor);
                (block, self.op_position(anchor))
            }
            InsertPoint::After(anchor) => {
                let block = self.expect_parent(anchor);
                (block, self.op_position(anchor) + 1)
            }
        };
        self.blocks[block.index()].ops.insert(position, op);
        self.ops[op.index()].parent = Some(block);
    }

    fn expect_parent(&self, op: Op) -> Block {
        self.ops[op.index()]
            .parent
            .unwrap_or_else(|| panic!("'{}' has no parent block", self.op_name(op)))
    }

    /// Position of `op` within its parent block
    pub fn op_position(&self, op: Op) -> usize {
        let block = self.expect_parent(op);
        self.blocks[block.index()]
            .ops
            .iter()
            .position(|&o| o == op)
            .unwrap_or_else(|| panic!("'{}' missing from its parent block", self.op_name(op)))
    }

    /// Unlink `op` from its block without destroying it
    pub fn detach_op(&mut self, op: Op) {
        if let Some(block) = self.ops[op.index()].parent {
            let position = self.op_position(op);
            self.blocks[block.index()].ops.remove(position);
            self.ops[op.index()].parent = None;
        }
    }

    pub fn move_op(&mut self, op: Op, ip: InsertPoint) {
        self.detach_op(op);
        self.insert_op(op, ip);
    }

    pub fn op_kind(&self, op: Op) -> OpKind {
        self.ops[op.index()].kind
    }

    pub fn op_name(&self, op: Op) -> &'static str {
        self.ops[op.index()].kind.name()
    }

    pub fn is_erased(&self, op: Op) -> bool {
        self.ops[op.index()].erased
    }

    pub fn operands(&self, op: Op) -> &[Value] {
        &self.ops[op.index()].operands
    }

    pub fn operand(&self, op: Op, index: usize) -> Value {
        self.ops[op.index()].operands[index]
    }

    pub fn results(&self, op: Op) -> &[Value] {
        &self.ops[op.index()].results
    }

    pub fn result(&self, op: Op, index: usize) -> Value {
        self.ops[op.index()].results[index]
    }

    pub fn attr(&self, op: Op, name: &str) -> Option<Attr> {
        self.ops[op.index()].attrs.get(name).copied()
    }

    pub fn attrs_of(&self, op: Op) -> &BTreeMap<String, Attr> {
        &self.ops[op.index()].attrs
    }

    pub fn set_attr(&mut self, op: Op, name: &str, attr: Attr) {
        self.ops[op.index()].attrs.insert(name.to_string(), attr);
    }

    pub fn remove_attr(&mut self, op: Op, name: &str) -> Option<Attr> {
        self.ops[op.index()].attrs.remove(name)
    }

    /// Integer attribute value
    pub fn int_attr(&self, op: Op, name: &str) -> Option<i128> {
        self.attr(op, name).and_then(|a| self.attrs.as_int(a))
    }

    /// String or symbol attribute value
    pub fn str_attr(&self, op: Op, name: &str) -> Option<&str> {
        let attr = self.attr(op, name)?;
        self.attrs
            .as_str(attr)
            .or_else(|| self.attrs.as_symbol(attr))
    }

    pub fn type_attr(&self, op: Op, name: &str) -> Option<Type> {
        self.attr(op, name).and_then(|a| self.attrs.as_type(a))
    }

    pub fn regions(&self, op: Op) -> &[Region] {
        &self.ops[op.index()].regions
    }

    pub fn region(&self, op: Op, index: usize) -> Region {
        self.ops[op.index()].regions[index]
    }

    pub fn successors(&self, op: Op) -> &[Block] {
        &self.ops[op.index()].successors
    }

    pub fn set_successor(&mut self, op: Op, index: usize, block: Block) {
        self.ops[op.index()].successors[index] = block;
    }

    pub fn location(&self, op: Op) -> &SourceLocation {
        &self.ops[op.index()].location
    }

    pub fn set_location(&mut self, op: Op, location: SourceLocation) {
        self.ops[op.index()].location = location;
    }

    pub fn parent_block(&self, op: Op) -> Option<Block> {
        self.ops[op.index()].parent
    }

    /// Operation owning the region that contains `op`
    pub fn parent_op(&self, op: Op) -> Option<Op> {
        let block = self.parent_block(op)?;
        let region = self.block_parent(block)?;
        Some(self.region_parent(region))
    }

    /// Closest enclosing operation of the given kind
    pub fn parent_of_kind(&self, op: Op, kind: OpKind) -> Option<Op> {
        let mut current = self.parent_op(op);
        while let Some(parent) = current {
            if self.op_kind(parent) == kind {
                return Some(parent);
            }
            current = self.parent_op(parent);
        }
        None
    }

    /// The ancestor of `op` (possibly `op` itself) that lives directly in `block`
    pub fn ancestor_in_block(&self, op: Op, block: Block) -> Option<Op> {
        let mut current = op;
        loop {
            if self.parent_block(current) == Some(block) {
                return Some(current);
            }
            current = self.parent_op(current)?;
        }
    }

    /// Whether `ancestor` strictly encloses `op`
    pub fn is_proper_ancestor(&self, ancestor: Op, op: Op) -> bool {
        let mut current = self.parent_op(op);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_op(parent);
        }
        false
    }

    // ---------------------------------------------------------------
    // Operands and uses
    // ---------------------------------------------------------------

    fn push_operand(&mut self, op: Op, value: Value) {
        let operand = self.ops[op.index()].operands.len();
        self.ops[op.index()].operands.push(value);
        self.values[value.index()].uses.push(Use { user: op, operand });
    }

    fn remove_use(&mut self, value: Value, target: Use) {
        let uses = &mut self.values[value.index()].uses;
        if let Some(position) = uses.iter().position(|&u| u == target) {
            uses.swap_remove(position);
        }
    }

    pub fn set_operand(&mut self, op: Op, index: usize, value: Value) {
        let old = self.ops[op.index()].operands[index];
        if old == value {
            return;
        }
        self.remove_use(old, Use { user: op, operand: index });
        self.ops[op.index()].operands[index] = value;
        self.values[value.index()].uses.push(Use { user: op, operand: index });
    }

    /// Replace the whole operand list of `op`
    pub fn set_operands(&mut self, op: Op, values: Vec<Value>) {
        self.drop_operands(op);
        for value in values {
            self.push_operand(op, value);
        }
    }

    fn drop_operands(&mut self, op: Op) {
        let operands = std::mem::take(&mut self.ops[op.index()].operands);
        for (operand, value) in operands.into_iter().enumerate() {
            self.remove_use(value, Use { user: op, operand });
        }
    }

    pub fn value_type(&self, value: Value) -> Type {
        self.values[value.index()].ty
    }

    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value.index()].def
    }

    pub fn uses(&self, value: Value) -> &[Use] {
        &self.values[value.index()].uses
    }

    pub fn has_uses(&self, value: Value) -> bool {
        !self.values[value.index()].uses.is_empty()
    }

    /// Distinct operations using `value`
    pub fn users(&self, value: Value) -> Vec<Op> {
        let mut users: Vec<Op> = self.uses(value).iter().map(|u| u.user).collect();
        users.sort();
        users.dedup();
        users
    }

    pub fn defining_op(&self, value: Value) -> Option<Op> {
        match self.value_def(value) {
            ValueDef::Result { op, .. } => Some(op),
            _ => None,
        }
    }

    /// Whether `value` is produced by an operation of `kind`
    pub fn defined_by(&self, value: Value, kind: OpKind) -> Option<Op> {
        self.defining_op(value).filter(|&op| self.op_kind(op) == kind)
    }

    /// Block in which a value becomes available
    pub fn value_block(&self, value: Value) -> Option<Block> {
        match self.value_def(value) {
            ValueDef::Result { op, .. } => self.parent_block(op),
            ValueDef::BlockArg { block, .. } => Some(block),
            ValueDef::Placeholder => None,
        }
    }

    /// Rewrite every use of `old` to read `new`, in O(uses of `old`)
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) {
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.values[old.index()].uses);
        for u in &uses {
            self.ops[u.user.index()].operands[u.operand] = new;
        }
        self.values[new.index()].uses.extend(uses);
    }

    /// Replace all results of `op` with `values` and erase it
    pub fn replace_op(&mut self, op: Op, values: &[Value]) {
        let results = self.results(op).to_vec();
        assert_eq!(
            results.len(),
            values.len(),
            "replacement for '{}' has the wrong number of values",
            self.op_name(op)
        );
        for (old, &new) in results.into_iter().zip(values) {
            self.replace_all_uses_with(old, new);
        }
        self.erase_op(op);
    }

    /// Erase `op` and everything nested in it. Its results must be unused.
    pub fn erase_op(&mut self, op: Op) {
        for &result in self.results(op) {
            let uses = self.uses(result).len();
            assert!(
                uses == 0,
                "erasing '{}' at {} whose result still has {} use(s)",
                self.op_name(op),
                self.location(op),
                uses
            );
        }
        self.detach_op(op);
        self.destroy(op);
    }

    fn destroy(&mut self, op: Op) {
        let nested = self.walk(op);
        for &inner in &nested {
            self.drop_operands(inner);
        }
        for inner in nested {
            let regions = self.ops[inner.index()].regions.clone();
            for region in regions {
                for block in self.regions[region.index()].blocks.clone() {
                    self.blocks[block.index()].erased = true;
                }
            }
            self.ops[inner.index()].erased = true;
        }
    }

    // ---------------------------------------------------------------
    // Blocks and regions
    // ---------------------------------------------------------------

    fn new_value(&mut self, ty: Type, def: ValueDef) -> Value {
        let value = Value(self.values.len() as u32);
        self.values.push(ValueData {
            ty,
            def,
            uses: Vec::new(),
        });
        value
    }

    /// Value standing in for a not-yet-defined one
    pub fn create_placeholder(&mut self, ty: Type) -> Value {
        self.new_value(ty, ValueDef::Placeholder)
    }

    /// Create a detached block with the given argument types
    pub fn create_block(&mut self, arg_types: &[Type]) -> Block {
        let block = Block(self.blocks.len() as u32);
        self.blocks.push(BlockData::default());
        for &ty in arg_types {
            self.add_block_arg(block, ty);
        }
        block
    }

    pub fn add_block_arg(&mut self, block: Block, ty: Type) -> Value {
        let index = self.blocks[block.index()].args.len();
        let value = self.new_value(ty, ValueDef::BlockArg { block, index });
        self.blocks[block.index()].args.push(value);
        value
    }

    pub fn block_args(&self, block: Block) -> &[Value] {
        &self.blocks[block.index()].args
    }

    pub fn block_arg(&self, block: Block, index: usize) -> Value {
        self.blocks[block.index()].args[index]
    }

    pub fn block_ops(&self, block: Block) -> &[Op] {
        &self.blocks[block.index()].ops
    }

    pub fn block_parent(&self, block: Block) -> Option<Region> {
        self.blocks[block.index()].parent
    }

    pub fn is_block_erased(&self, block: Block) -> bool {
        self.blocks[block.index()].erased
    }

    /// Last operation of the block if it is a terminator
    pub fn terminator(&self, block: Block) -> Option<Op> {
        let last = *self.block_ops(block).last()?;
        self.op_kind(last).info().terminator.then_some(last)
    }

    pub fn append_block(&mut self, region: Region, block: Block) {
        assert!(self.blocks[block.index()].parent.is_none(), "block already attached");
        self.regions[region.index()].blocks.push(block);
        self.blocks[block.index()].parent = Some(region);
    }

    pub fn insert_block_after(&mut self, anchor: Block, block: Block) {
        let region = self
            .block_parent(anchor)
            .unwrap_or_else(|| panic!("anchor block is detached"));
        let position = self.block_position(anchor) + 1;
        self.regions[region.index()].blocks.insert(position, block);
        self.blocks[block.index()].parent = Some(region);
    }

    fn block_position(&self, block: Block) -> usize {
        let region = self
            .block_parent(block)
            .unwrap_or_else(|| panic!("block is detached"));
        self.regions[region.index()]
            .blocks
            .iter()
            .position(|&b| b == block)
            .unwrap_or_else(|| panic!("block missing from its region"))
    }

    /// Predecessors of `block` within its region, one entry per edge
    pub fn predecessors(&self, block: Block) -> Vec<Block> {
        let Some(region) = self.block_parent(block) else {
            return Vec::new();
        };
        let mut preds = Vec::new();
        for &candidate in self.region_blocks(region) {
            if let Some(term) = self.terminator(candidate) {
                for &succ in self.successors(term) {
                    if succ == block {
                        preds.push(candidate);
                    }
                }
            }
        }
        preds
    }

    /// Remove and destroy a block whose arguments are unused
    pub fn erase_block(&mut self, block: Block) {
        for &arg in self.block_args(block) {
            assert!(!self.has_uses(arg), "erasing block whose argument is still used");
        }
        for op in self.block_ops(block).to_vec().into_iter().rev() {
            self.detach_op(op);
            self.destroy(op);
        }
        if let Some(region) = self.blocks[block.index()].parent.take() {
            self.regions[region.index()].blocks.retain(|&b| b != block);
        }
        self.blocks[block.index()].erased = true;
    }

    pub fn region_blocks(&self, region: Region) -> &[Block] {
        &self.regions[region.index()].blocks
    }

    pub fn region_parent(&self, region: Region) -> Op {
        self.regions[region.index()].parent
    }

    pub fn entry_block(&self, region: Region) -> Option<Block> {
        self.regions[region.index()].blocks.first().copied()
    }

    /// Entry block of `region`, creating an argument-less one if empty
    pub fn ensure_entry_block(&mut self, region: Region) -> Block {
        if let Some(block) = self.entry_block(region) {
            return block;
        }
        let block = self.create_block(&[]);
        self.append_block(region, block);
        block
    }

    pub fn region_is_empty(&self, region: Region) -> bool {
        self.regions[region.index()].blocks.is_empty()
    }

    /// Move every operation of `source` to the end of `dest`, substituting
    /// `args` for the arguments of `source`, then erase `source`
    pub fn merge_blocks(&mut self, source: Block, dest: Block, args: &[Value]) {
        self.substitute_block_args(source, args);
        for op in self.block_ops(source).to_vec() {
            self.move_op(op, InsertPoint::BlockEnd(dest));
        }
        self.erase_block(source);
    }

    /// Move every operation of `source` before `anchor`, substituting `args`
    /// for its arguments. `source` is left empty.
    pub fn inline_block_before(&mut self, source: Block, anchor: Op, args: &[Value]) {
        self.substitute_block_args(source, args);
        for op in self.block_ops(source).to_vec() {
            self.move_op(op, InsertPoint::Before(anchor));
        }
    }

    fn substitute_block_args(&mut self, block: Block, args: &[Value]) {
        let block_args = self.block_args(block).to_vec();
        assert_eq!(
            block_args.len(),
            args.len(),
            "block argument substitution has the wrong arity"
        );
        for (old, &new) in block_args.into_iter().zip(args) {
            self.replace_all_uses_with(old, new);
        }
    }

    // ---------------------------------------------------------------
    // Traversal and cloning
    // ---------------------------------------------------------------

    /// Pre-order list of `root` and every operation nested in it
    pub fn walk(&self, root: Op) -> Vec<Op> {
        let mut out = Vec::new();
        self.walk_into(root, &mut out);
        out
    }

    fn walk_into(&self, op: Op, out: &mut Vec<Op>) {
        out.push(op);
        for &region in self.regions(op) {
            for &block in self.region_blocks(region) {
                for &inner in self.block_ops(block) {
                    self.walk_into(inner, out);
                }
            }
        }
    }

    /// Post-order list of `root` and every operation nested in it; nested
    /// operations come before the operation holding them
    pub fn walk_post_order(&self, root: Op) -> Vec<Op> {
        let mut out = Vec::new();
        self.walk_post_into(root, &mut out);
        out
    }

    fn walk_post_into(&self, op: Op, out: &mut Vec<Op>) {
        for &region in self.regions(op) {
            for &block in self.region_blocks(region) {
                for &inner in self.block_ops(block) {
                    self.walk_post_into(inner, out);
                }
            }
        }
        out.push(op);
    }

    /// Pre-order list of operations nested in `region`
    pub fn walk_region(&self, region: Region) -> Vec<Op> {
        let mut out = Vec::new();
        for &block in self.region_blocks(region) {
            for &op in self.block_ops(block) {
                self.walk_into(op, &mut out);
            }
        }
        out
    }

    /// Deep-copy `op` and its regions. Operands defined outside the cloned
    /// tree are kept unless `mapping` says otherwise.
    pub fn clone_op(&mut self, op: Op, mapping: &mut IrMapping) -> Op {
        let cloned = self.clone_op_inner(op, mapping);
        self.remap_operands(cloned, mapping);
        cloned
    }

    fn clone_op_inner(&mut self, op: Op, mapping: &mut IrMapping) -> Op {
        let data = &self.ops[op.index()];
        let state = OperationState {
            kind: data.kind,
            location: data.location.clone(),
            operands: data.operands.iter().map(|&v| mapping.lookup_value(v)).collect(),
            result_types: data.results.iter().map(|&v| self.value_type(v)).collect(),
            attrs: data.attrs.clone(),
            num_regions: data.regions.len(),
            successors: data.successors.iter().map(|&b| mapping.lookup_block(b)).collect(),
        };
        let old_regions = data.regions.clone();
        let old_results = data.results.clone();

        let cloned = self.create_op(state);
        for (old, new) in old_results.into_iter().zip(self.results(cloned).to_vec()) {
            mapping.map_value(old, new);
        }
        let new_regions = self.regions(cloned).to_vec();
        for (src, dest) in old_regions.into_iter().zip(new_regions) {
            self.clone_region_inner(src, dest, mapping);
        }
        cloned
    }

    /// Clone the blocks of `source` into the (empty) region `dest`
    pub fn clone_region_into(&mut self, source: Region, dest: Region, mapping: &mut IrMapping) {
        self.clone_region_inner(source, dest, mapping);
        for op in self.walk_region(dest) {
            self.remap_operands(op, mapping);
        }
    }

    fn clone_region_inner(&mut self, source: Region, dest: Region, mapping: &mut IrMapping) {
        let blocks = self.region_blocks(source).to_vec();
        for &block in &blocks {
            let arg_types: Vec<Type> = self
                .block_args(block)
                .iter()
                .map(|&a| self.value_type(a))
                .collect();
            let new_block = self.create_block(&arg_types);
            for (old, new) in self
                .block_args(block)
                .to_vec()
                .into_iter()
                .zip(self.block_args(new_block).to_vec())
            {
                mapping.map_value(old, new);
            }
            mapping.map_block(block, new_block);
            self.append_block(dest, new_block);
        }
        for block in blocks {
            let new_block = mapping.lookup_block(block);
            for op in self.block_ops(block).to_vec() {
                let cloned = self.clone_op_inner(op, mapping);
                self.insert_op(cloned, InsertPoint::BlockEnd(new_block));
            }
        }
    }

    /// Redirect operands of `root` and its nested ops through `mapping`
    fn remap_operands(&mut self, root: Op, mapping: &IrMapping) {
        for op in self.walk(root) {
            let operands = self.operands(op).to_vec();
            for (i, value) in operands.into_iter().enumerate() {
                let mapped = mapping.lookup_value(value);
                if mapped != value {
                    self.set_operand(op, i, mapped);
                }
            }
        }
    }
}
