use super::*;
use crate::rewrite::RewriteStats;
use crate::test_util::{parse, rewrite, rewrite_text};
use cir_ir::{print_module, OpBuilder};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn remaining_kinds(ctx: &Context, module: Module, name: &str) -> Vec<OpKind> {
    let func = module.lookup(ctx, name).unwrap();
    ctx.walk(func).into_iter().skip(1).map(|op| ctx.op_kind(op)).collect()
}

#[test]
fn test_double_not_folds_to_input() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.bool>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            %1 = cir.unary(%0 : !cir.bool) : !cir.bool {kind = "not"}
            %2 = cir.unary(%1 : !cir.bool) : !cir.bool {kind = "not"}
            cir.return(%2 : !cir.bool)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.bool>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            cir.return(%0 : !cir.bool)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_mixed_unary_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.unary(%0 : !s32i) : !s32i {kind = "not"}
            %2 = cir.unary(%1 : !s32i) : !s32i {kind = "minus"}
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let stats = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert_eq!(stats, RewriteStats::default());
    assert_eq!(
        remaining_kinds(&ctx, module, "f"),
        vec![OpKind::Unary, OpKind::Unary, OpKind::Return]
    );
}

#[test]
fn test_int_to_bool_of_bool_to_int_folds() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.bool>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            %1 = cir.cast(%0 : !cir.bool) : !s32i {kind = "bool_to_int"}
            %2 = cir.cast(%1 : !s32i) : !cir.bool {kind = "int_to_bool"}
            cir.return(%2 : !cir.bool)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert_eq!(remaining_kinds(&ctx, module, "f"), vec![OpKind::Return]);
    let func = module.lookup(&ctx, "f").unwrap();
    let entry = cir_ir::func_entry(&ctx, func).unwrap();
    let ret = ctx.terminator(entry).unwrap();
    assert_eq!(ctx.operand(ret, 0), ctx.block_arg(entry, 0));
}

#[test]
fn test_bool_round_trip_to_same_type_folds() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.cast(%0 : !s32i) : !cir.bool {kind = "int_to_bool"}
            %2 = cir.cast(%1 : !cir.bool) : !s32i {kind = "bool_to_int"}
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert_eq!(remaining_kinds(&ctx, module, "f"), vec![OpKind::Return]);
}

#[test]
fn test_bool_round_trip_to_wider_type_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s64i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.cast(%0 : !s32i) : !cir.bool {kind = "int_to_bool"}
            %2 = cir.cast(%1 : !cir.bool) : !s64i {kind = "bool_to_int"}
            cir.return(%2 : !s64i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let before = print_module(&ctx, module);
    let stats = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert!(!stats.changed());
    assert_eq!(print_module(&ctx, module), before);
}

#[test]
fn test_round_trip_does_not_collapse_past_widening_cast() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s64i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.cast(%0 : !s32i) : !cir.bool {kind = "int_to_bool"}
            %2 = cir.cast(%1 : !cir.bool) : !s32i {kind = "bool_to_int"}
            %3 = cir.cast(%2 : !s32i) : !s64i {kind = "integral"}
            cir.return(%3 : !s64i)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s64i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.cast(%0 : !s32i) : !s64i {kind = "integral"}
            cir.return(%1 : !s64i)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_integral_chain_through_wider_type_collapses() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!u8i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !u8i):
            %1 = cir.cast(%0 : !u8i) : !u64i {kind = "integral"}
            %2 = cir.cast(%1 : !u64i) : !s32i {kind = "integral"}
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!u8i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !u8i):
            %1 = cir.cast(%0 : !u8i) : !s32i {kind = "integral"}
            cir.return(%1 : !s32i)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_truncate_then_extend_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            %1 = cir.cast(%0 : !s32i) : !u8i {kind = "integral"}
            %2 = cir.cast(%1 : !u8i) : !s32i {kind = "integral"}
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let stats = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert!(!stats.changed());
}

#[test]
fn test_identity_cast_removed() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.ptr<!s32i>>, sym_name = "f"} ({
          ^bb1(%0 : !cir.ptr<!s32i>):
            %1 = cir.cast(%0 : !cir.ptr<!s32i>) : !cir.ptr<!u8i> {kind = "bitcast"}
            %2 = cir.cast(%1 : !cir.ptr<!u8i>) : !cir.ptr<!s32i> {kind = "bitcast"}
            %3 = cir.cast(%2 : !cir.ptr<!s32i>) : !cir.ptr<!s32i> {kind = "bitcast"}
            cir.return(%3 : !cir.ptr<!s32i>)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert_eq!(remaining_kinds(&ctx, module, "f"), vec![OpKind::Return]);
}

#[test]
fn test_stride_over_decayed_array_becomes_get_element() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !s32i>, sym_name = "third"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.cast(%0 : !cir.ptr<!cir.array<!s32i x 4>>) : !cir.ptr<!s32i> {kind = "array_to_ptrdecay"}
            %2 = cir.const() : !s64i {value = #cir.int<2> : !s64i}
            %3 = cir.ptr_stride(%1 : !cir.ptr<!s32i>, %2 : !s64i) : !cir.ptr<!s32i>
            %4 = cir.load(%3 : !cir.ptr<!s32i>) : !s32i
            cir.return(%4 : !s32i)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !s32i>, sym_name = "third"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.const() : !s64i {value = #cir.int<2> : !s64i}
            %2 = cir.get_element(%0 : !cir.ptr<!cir.array<!s32i x 4>>, %1 : !s64i) : !cir.ptr<!s32i>
            %3 = cir.load(%2 : !cir.ptr<!s32i>) : !s32i
            cir.return(%3 : !s32i)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_out_of_bounds_stride_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !cir.ptr<!s32i>>, sym_name = "end"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.cast(%0 : !cir.ptr<!cir.array<!s32i x 4>>) : !cir.ptr<!s32i> {kind = "array_to_ptrdecay"}
            %2 = cir.const() : !s64i {value = #cir.int<4> : !s64i}
            %3 = cir.ptr_stride(%1 : !cir.ptr<!s32i>, %2 : !s64i) : !cir.ptr<!s32i>
            cir.return(%3 : !cir.ptr<!s32i>)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let stats = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert!(!stats.changed());
}

#[test]
fn test_stride_over_get_element_adds_indices() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !cir.ptr<!s32i>>, sym_name = "f"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.const() : !s64i {value = #cir.int<1> : !s64i}
            %2 = cir.get_element(%0 : !cir.ptr<!cir.array<!s32i x 4>>, %1 : !s64i) : !cir.ptr<!s32i>
            %3 = cir.const() : !s64i {value = #cir.int<2> : !s64i}
            %4 = cir.ptr_stride(%2 : !cir.ptr<!s32i>, %3 : !s64i) : !cir.ptr<!s32i>
            cir.return(%4 : !cir.ptr<!s32i>)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !cir.ptr<!s32i>>, sym_name = "f"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.const() : !s64i {value = #cir.int<3> : !s64i}
            %2 = cir.get_element(%0 : !cir.ptr<!cir.array<!s32i x 4>>, %1 : !s64i) : !cir.ptr<!s32i>
            cir.return(%2 : !cir.ptr<!s32i>)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_decay_used_by_load_becomes_first_element() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !s32i>, sym_name = "first"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.cast(%0 : !cir.ptr<!cir.array<!s32i x 4>>) : !cir.ptr<!s32i> {kind = "array_to_ptrdecay"}
            %2 = cir.load(%1 : !cir.ptr<!s32i>) : !s32i
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !s32i>, sym_name = "first"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.const() : !u64i {value = #cir.int<0> : !u64i}
            %2 = cir.get_element(%0 : !cir.ptr<!cir.array<!s32i x 4>>, %1 : !u64i) : !cir.ptr<!s32i>
            %3 = cir.load(%2 : !cir.ptr<!s32i>) : !s32i
            cir.return(%3 : !s32i)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_decay_that_escapes_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>) -> !cir.ptr<!s32i>>, sym_name = "f"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>):
            %1 = cir.cast(%0 : !cir.ptr<!cir.array<!s32i x 4>>) : !cir.ptr<!s32i> {kind = "array_to_ptrdecay"}
            cir.return(%1 : !cir.ptr<!s32i>)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    assert!(!rewrite(&mut ctx, module, populate_canonicalize_patterns).changed());
}

#[test]
fn test_constant_folding() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<() -> !cir.bool>, sym_name = "f"} ({
          ^bb1:
            %0 = cir.const() : !s32i {value = #cir.int<2> : !s32i}
            %1 = cir.const() : !s32i {value = #cir.int<3> : !s32i}
            %2 = cir.binop(%0 : !s32i, %1 : !s32i) : !s32i {kind = "add"}
            %3 = cir.const() : !s32i {value = #cir.int<5> : !s32i}
            %4 = cir.cmp(%2 : !s32i, %3 : !s32i) : !cir.bool {kind = "eq"}
            cir.return(%4 : !cir.bool)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<() -> !cir.bool>, sym_name = "f"} ({
          ^bb1:
            %0 = cir.const() : !cir.bool {value = #true}
            cir.return(%0 : !cir.bool)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_folding_wraps_and_skips_division_by_zero() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<() -> !u8i>, sym_name = "wrap"} ({
          ^bb1:
            %0 = cir.const() : !u8i {value = #cir.int<200> : !u8i}
            %1 = cir.const() : !u8i {value = #cir.int<100> : !u8i}
            %2 = cir.binop(%0 : !u8i, %1 : !u8i) : !u8i {kind = "add"}
            cir.return(%2 : !u8i)
          })
          cir.func() {function_type = !cir.func<() -> !s32i>, sym_name = "div"} ({
          ^bb2:
            %3 = cir.const() : !s32i {value = #cir.int<1> : !s32i}
            %4 = cir.const() : !s32i {value = #cir.int<0> : !s32i}
            %5 = cir.binop(%3 : !s32i, %4 : !s32i) : !s32i {kind = "div"}
            cir.return(%5 : !s32i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    rewrite(&mut ctx, module, populate_canonicalize_patterns);

    let wrap = module.lookup(&ctx, "wrap").unwrap();
    let entry = cir_ir::func_entry(&ctx, wrap).unwrap();
    let ret = ctx.terminator(entry).unwrap();
    assert_eq!(crate::rewrite::constant_int(&ctx, ctx.operand(ret, 0)), Some(44));
    assert_eq!(
        remaining_kinds(&ctx, module, "div"),
        vec![OpKind::Const, OpKind::Const, OpKind::BinOp, OpKind::Return]
    );
}

#[test]
fn test_branch_to_single_predecessor_merges() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            cir.br(%0 : !s32i) [^bb2]
          ^bb2(%1 : !s32i):
            cir.br(%1 : !s32i) [^bb3]
          ^bb3(%2 : !s32i):
            cir.return(%2 : !s32i)
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!s32i) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !s32i):
            cir.return(%0 : !s32i)
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_branch_to_join_block_is_kept() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.void>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            cir.brcond(%0 : !cir.bool) [^bb2, ^bb3]
          ^bb2:
            cir.br() [^bb4]
          ^bb3:
            cir.br() [^bb4]
          ^bb4:
            cir.return()
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    assert!(!rewrite(&mut ctx, module, populate_canonicalize_patterns).changed());
}

#[test]
fn test_empty_scope_removed() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<() -> !cir.void>, sym_name = "f"} ({
          ^bb1:
            cir.scope() ({
            ^bb2:
              cir.yield()
            })
            cir.scope() ({
            ^bb3:
              %0 = cir.alloca() : !cir.ptr<!s32i> {alloca_type = !s32i, name = "x"}
              cir.yield()
            })
            cir.return()
          })
        })
    "#};
    let expected = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<() -> !cir.void>, sym_name = "f"} ({
          ^bb1:
            cir.return()
          })
        })
    "#};
    assert_eq!(rewrite_text(source, populate_canonicalize_patterns), expected);
}

#[test]
fn test_second_run_is_a_no_op() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.ptr<!cir.array<!s32i x 4>>, !cir.bool) -> !s32i>, sym_name = "f"} ({
          ^bb1(%0 : !cir.ptr<!cir.array<!s32i x 4>>, %1 : !cir.bool):
            %2 = cir.unary(%1 : !cir.bool) : !cir.bool {kind = "not"}
            %3 = cir.unary(%2 : !cir.bool) : !cir.bool {kind = "not"}
            %4 = cir.cast(%3 : !cir.bool) : !s64i {kind = "bool_to_int"}
            %5 = cir.cast(%0 : !cir.ptr<!cir.array<!s32i x 4>>) : !cir.ptr<!s32i> {kind = "array_to_ptrdecay"}
            %6 = cir.ptr_stride(%5 : !cir.ptr<!s32i>, %4 : !s64i) : !cir.ptr<!s32i>
            %7 = cir.const() : !s64i {value = #cir.int<1> : !s64i}
            %8 = cir.ptr_stride(%5 : !cir.ptr<!s32i>, %7 : !s64i) : !cir.ptr<!s32i>
            %9 = cir.load(%6 : !cir.ptr<!s32i>) : !s32i
            %10 = cir.load(%8 : !cir.ptr<!s32i>) : !s32i
            %11 = cir.binop(%9 : !s32i, %10 : !s32i) : !s32i {kind = "add"}
            cir.br() [^bb2]
          ^bb2:
            cir.return(%11 : !s32i)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let first = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert!(first.changed());
    let once = print_module(&ctx, module);

    let second = rewrite(&mut ctx, module, populate_canonicalize_patterns);
    assert_eq!(second, RewriteStats::default());
    assert_eq!(print_module(&ctx, module), once);
}

struct Churn;

impl RewritePattern for Churn {
    fn name(&self) -> &'static str {
        "churn"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Unary)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let input = rewriter.ctx().operand(op, 0);
        let mut builder: OpBuilder = rewriter.builder_before(op);
        let fresh = builder.build_unary(rewriter.ctx_mut(), UnaryKind::Not, input);
        rewriter.replace_op(op, &[fresh]);
        Some(())
    }
}

#[test]
fn test_non_terminating_pattern_is_bounded() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.bool>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            %1 = cir.unary(%0 : !cir.bool) : !cir.bool {kind = "not"} loc("loop.cpp":3:7)
            cir.return(%1 : !cir.bool)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let mut patterns = RewritePatternSet::new();
    patterns.add(Churn);
    let config = GreedyRewriteConfig {
        max_rewrites_per_op: 3,
        erase_dead_ops: true,
    };
    let mut diags = DiagnosticEngine::new();
    let stats = apply_patterns_greedily(&mut ctx, module.op(), &patterns, &config, &mut diags);

    assert_eq!(stats.rewrites, 3);
    assert_eq!(stats.exhausted, 1);
    assert!(!diags.has_errors());
    assert_eq!(diags.warning_count(), 1);
    let warning = &diags.diagnostics()[0];
    assert_eq!(warning.message, "stopped rewriting 'cir.unary' after 3 rewrites");
    assert_eq!(warning.location, cir_common::SourceLocation::new("loop.cpp", 3, 7));
    assert_eq!(warning.notes, vec!["last applied pattern: 'churn'".to_string()]);
    cir_ir::verify(&ctx, module.op()).unwrap();
}

#[test]
fn test_canonicalize_pass_runs_to_fixed_point() {
    let source = indoc! {r#"
        builtin.module() {sym_name = "m"} ({
        ^bb0:
          cir.func() {function_type = !cir.func<(!cir.bool) -> !cir.bool>, sym_name = "f"} ({
          ^bb1(%0 : !cir.bool):
            %1 = cir.unary(%0 : !cir.bool) : !cir.bool {kind = "not"}
            %2 = cir.unary(%1 : !cir.bool) : !cir.bool {kind = "not"}
            %3 = cir.unary(%2 : !cir.bool) : !cir.bool {kind = "not"}
            %4 = cir.unary(%3 : !cir.bool) : !cir.bool {kind = "not"}
            cir.return(%4 : !cir.bool)
          })
        })
    "#};
    let (mut ctx, module) = parse(source);
    let mut pass = Canonicalize::new(GreedyRewriteConfig::default());
    let mut diags = DiagnosticEngine::new();
    pass.run(&mut ctx, module, &mut diags).unwrap();
    assert_eq!(remaining_kinds(&ctx, module, "f"), vec![OpKind::Return]);
}
