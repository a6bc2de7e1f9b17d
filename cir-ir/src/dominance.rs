//! Dominance analysis
//!
//! Block dominance is computed per region over the CFG formed by terminator
//! successors, using the iterative algorithm of Cooper, Harvey and Kennedy
//! on a reverse post-order numbering. Blocks unreachable from the region
//! entry are treated as dominated by every block.
//!
//! Value dominance extends this to nested regions: a use inside a nested
//! operation is checked at the ancestor that shares the definition's region.

use crate::context::{Block, Context, Op, Region, Value, ValueDef};
use std::collections::HashMap;

/// Dominator tree of one region
#[derive(Debug, Clone)]
pub struct RegionDominance {
    /// Reverse post-order position of each reachable block
    rpo_index: HashMap<Block, usize>,
    /// Immediate dominator, indexed by RPO position
    idom: Vec<usize>,
    order: Vec<Block>,
}

impl RegionDominance {
    pub fn compute(ctx: &Context, region: Region) -> Self {
        let Some(entry) = ctx.entry_block(region) else {
            return Self {
                rpo_index: HashMap::new(),
                idom: Vec::new(),
                order: Vec::new(),
            };
        };

        let order = reverse_post_order(ctx, entry);
        let rpo_index: HashMap<Block, usize> =
            order.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        for (i, &block) in order.iter().enumerate() {
            for succ in successors(ctx, block) {
                if let Some(&j) = rpo_index.get(&succ) {
                    preds[j].push(i);
                }
            }
        }

        const UNDEF: usize = usize::MAX;
        let mut idom = vec![UNDEF; order.len()];
        idom[0] = 0;
        let mut changed = true;
        while changed {
            changed = false;
            for b in 1..order.len() {
                let mut new_idom = UNDEF;
                for &p in &preds[b] {
                    if idom[p] == UNDEF {
                        continue;
                    }
                    new_idom = if new_idom == UNDEF {
                        p
                    } else {
                        intersect(&idom, p, new_idom)
                    };
                }
                if new_idom != UNDEF && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }

        Self {
            rpo_index,
            idom,
            order,
        }
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.rpo_index.contains_key(&block)
    }

    /// Whether `a` dominates `b` (reflexive)
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        if a == b {
            return true;
        }
        let Some(&b_index) = self.rpo_index.get(&b) else {
            return true;
        };
        let Some(&a_index) = self.rpo_index.get(&a) else {
            return false;
        };
        let mut current = b_index;
        while current != 0 {
            current = self.idom[current];
            if current == a_index {
                return true;
            }
        }
        a_index == 0
    }

    /// Immediate dominator of a reachable, non-entry block
    pub fn immediate_dominator(&self, block: Block) -> Option<Block> {
        let &index = self.rpo_index.get(&block)?;
        if index == 0 {
            return None;
        }
        Some(self.order[self.idom[index]])
    }

    /// Reachable blocks in reverse post-order
    pub fn reverse_post_order(&self) -> &[Block] {
        &self.order
    }
}

fn intersect(idom: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = idom[a];
        }
        while b > a {
            b = idom[b];
        }
    }
    a
}

fn successors(ctx: &Context, block: Block) -> Vec<Block> {
    ctx.terminator(block)
        .map(|t| ctx.successors(t).to_vec())
        .unwrap_or_default()
}

fn reverse_post_order(ctx: &Context, entry: Block) -> Vec<Block> {
    let mut visited = std::collections::HashSet::new();
    let mut post_order = Vec::new();
    // Iterative DFS: (block, next successor index)
    let mut stack = vec![(entry, 0usize)];
    visited.insert(entry);
    while let Some((block, next)) = stack.pop() {
        let succs = successors(ctx, block);
        if next < succs.len() {
            stack.push((block, next + 1));
            let succ = succs[next];
            if visited.insert(succ) {
                stack.push((succ, 0));
            }
        } else {
            post_order.push(block);
        }
    }
    post_order.reverse();
    post_order
}

/// Lazily computed dominance for every region of an operation tree
#[derive(Debug, Default)]
pub struct DominanceInfo {
    regions: HashMap<Region, RegionDominance>,
    positions: HashMap<Block, HashMap<Op, usize>>,
}

impl DominanceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&mut self, ctx: &Context, region: Region) -> &RegionDominance {
        self.regions
            .entry(region)
            .or_insert_with(|| RegionDominance::compute(ctx, region))
    }

    fn position(&mut self, ctx: &Context, op: Op) -> usize {
        let Some(block) = ctx.parent_block(op) else {
            return 0;
        };
        let positions = self.positions.entry(block).or_insert_with(|| {
            ctx.block_ops(block)
                .iter()
                .enumerate()
                .map(|(i, &o)| (o, i))
                .collect()
        });
        positions.get(&op).copied().unwrap_or(0)
    }

    /// Whether block `a` dominates block `b`; both must share a region
    pub fn block_dominates(&mut self, ctx: &Context, a: Block, b: Block) -> bool {
        match ctx.block_parent(a) {
            Some(region) => self.region(ctx, region).dominates(a, b),
            None => a == b,
        }
    }

    /// Whether the definition of `value` is visible at `user`
    pub fn value_dominates(&mut self, ctx: &Context, value: Value, user: Op) -> bool {
        let (def_block, def_op) = match ctx.value_def(value) {
            ValueDef::Result { op, .. } => match ctx.parent_block(op) {
                Some(block) => (block, Some(op)),
                None => return false,
            },
            ValueDef::BlockArg { block, .. } => (block, None),
            ValueDef::Placeholder => return false,
        };

        // Ancestor of the user living directly in the defining block
        if let Some(ancestor) = ctx.ancestor_in_block(user, def_block) {
            return match def_op {
                Some(def) if def == ancestor => false,
                Some(def) => self.position(ctx, def) < self.position(ctx, ancestor),
                None => true,
            };
        }

        let Some(region) = ctx.block_parent(def_block) else {
            return false;
        };
        // Ancestor of the user in another block of the same region
        let mut current = user;
        loop {
            let Some(block) = ctx.parent_block(current) else {
                return false;
            };
            if ctx.block_parent(block) == Some(region) {
                return self.region(ctx, region).dominates(def_block, block);
            }
            match ctx.parent_op(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Drop cached results after the IR changes
    pub fn invalidate(&mut self) {
        self.regions.clear();
        self.positions.clear();
    }
}
