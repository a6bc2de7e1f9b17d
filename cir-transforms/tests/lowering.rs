//! End-to-end behavior of lowering-prepare: the lowered module is executed
//! and the calls it makes are compared with what the high-level operations
//! promised.

mod common;

use cir_ir::OpKind;
use common::{count_ops, lower, pipeline, Interpreter, RtVal};
use indoc::indoc;
use pretty_assertions::assert_eq;

const LOCAL_ARRAY: &str = indoc! {r#"
    !rec_S = !cir.record<struct "S" {!s32i, !s32i}>
    builtin.module() {sym_name = "m"} ({
    ^bb0:
      cir.func() {function_type = !cir.func<(!cir.ptr<!rec_S>) -> !cir.void>, sym_name = "S_ctor"} ({})
      cir.func() {function_type = !cir.func<(!cir.ptr<!rec_S>) -> !cir.void>, sym_name = "S_dtor"} ({})
      cir.func() {function_type = !cir.func<() -> !cir.void>, sym_name = "f"} ({
      ^bb1:
        %0 = cir.alloca() : !cir.ptr<!cir.array<!rec_S x 3>> {alloca_type = !cir.array<!rec_S x 3>, name = "arr"}
        cir.array.ctor(%0 : !cir.ptr<!cir.array<!rec_S x 3>>) ({
        ^bb2(%1 : !cir.ptr<!rec_S>):
          cir.call(%1 : !cir.ptr<!rec_S>) {callee = @S_ctor}
          cir.yield()
        })
        cir.array.dtor(%0 : !cir.ptr<!cir.array<!rec_S x 3>>) ({
        ^bb3(%2 : !cir.ptr<!rec_S>):
          cir.call(%2 : !cir.ptr<!rec_S>) {callee = @S_dtor}
          cir.yield()
        })
        cir.return()
      })
    })
"#};

#[test]
fn test_local_array_elements_are_visited_in_order() {
    let (ctx, module) = lower(LOCAL_ARRAY, &pipeline("lowering-prepare"));
    assert_eq!(count_ops(&ctx, module, OpKind::ArrayCtor), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::ArrayDtor), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::Do), 2);

    let mut interp = Interpreter::new(&ctx, module);
    interp.run("f", vec![]);
    assert_eq!(interp.offsets_for("S_ctor"), vec![0, 8, 16]);
    assert_eq!(interp.offsets_for("S_dtor"), vec![16, 8, 0]);

    // Every element pointer addresses the array itself
    let allocs: Vec<usize> = interp.calls[1..].iter().map(|c| c.args[0].ptr().0).collect();
    assert!(allocs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_unrolled_array_matches_loop() {
    let mut options = pipeline("lowering-prepare");
    options.lowering.unroll_threshold = 4;
    let (ctx, module) = lower(LOCAL_ARRAY, &options);
    assert_eq!(count_ops(&ctx, module, OpKind::Do), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::Call), 6);

    let mut interp = Interpreter::new(&ctx, module);
    interp.run("f", vec![]);
    assert_eq!(interp.offsets_for("S_ctor"), vec![0, 8, 16]);
    assert_eq!(interp.offsets_for("S_dtor"), vec![16, 8, 0]);
}

const GRID: &str = indoc! {r#"
    builtin.module() {sym_name = "m"} ({
    ^bb0:
      cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "cell_init"} ({})
      cir.func() {function_type = !cir.func<() -> !cir.void>, sym_name = "f"} ({
      ^bb1:
        %0 = cir.alloca() : !cir.ptr<!cir.array<!cir.array<!s32i x 2> x 3>> {alloca_type = !cir.array<!cir.array<!s32i x 2> x 3>, name = "grid"}
        cir.array.ctor(%0 : !cir.ptr<!cir.array<!cir.array<!s32i x 2> x 3>>) ({
        ^bb2(%1 : !cir.ptr<!cir.array<!s32i x 2>>):
          cir.array.ctor(%1 : !cir.ptr<!cir.array<!s32i x 2>>) ({
          ^bb3(%2 : !cir.ptr<!s32i>):
            cir.call(%2 : !cir.ptr<!s32i>) {callee = @cell_init}
            cir.yield()
          })
          cir.yield()
        })
        cir.return()
      })
    })
"#};

#[test]
fn test_nested_array_constructs_every_cell_in_order() {
    let (ctx, module) = lower(GRID, &pipeline("lowering-prepare"));
    assert_eq!(count_ops(&ctx, module, OpKind::ArrayCtor), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::Do), 2);

    let mut interp = Interpreter::new(&ctx, module);
    interp.run("f", vec![]);
    assert_eq!(interp.offsets_for("cell_init"), vec![0, 4, 8, 12, 16, 20]);
}

const HEAP_ARRAY: &str = indoc! {r#"
    !rec_S = !cir.record<struct "S" {!s32i, !s32i}>
    builtin.module() {sym_name = "m"} ({
    ^bb0:
      cir.func() {function_type = !cir.func<(!cir.ptr<!rec_S>) -> !cir.void>, sym_name = "S_ctor"} ({})
      cir.func() {function_type = !cir.func<(!cir.ptr<!rec_S>) -> !cir.void>, sym_name = "S_dtor"} ({})
      cir.func() {function_type = !cir.func<(!u64i) -> !cir.void>, sym_name = "churn"} ({
      ^bb1(%0 : !u64i):
        %1 = cir.array.new(%0 : !u64i) : !cir.ptr<!rec_S> {cookie = #true}
        cir.array.ctor(%1 : !cir.ptr<!rec_S>, %0 : !u64i) ({
        ^bb2(%2 : !cir.ptr<!rec_S>):
          cir.call(%2 : !cir.ptr<!rec_S>) {callee = @S_ctor}
          cir.yield()
        })
        cir.array.delete(%1 : !cir.ptr<!rec_S>) {cookie = #true} ({
        ^bb3(%3 : !cir.ptr<!rec_S>):
          cir.call(%3 : !cir.ptr<!rec_S>) {callee = @S_dtor}
          cir.yield()
        }) loc("churn.cpp":12:5)
        cir.return()
      })
    })
"#};

#[test]
fn test_heap_array_round_trips_through_cookie() {
    let (ctx, module) = lower(HEAP_ARRAY, &pipeline("lowering-prepare"));
    assert_eq!(count_ops(&ctx, module, OpKind::ArrayNew), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::ArrayDelete), 0);
    assert_eq!(count_ops(&ctx, module, OpKind::While), 2);

    let mut interp = Interpreter::new(&ctx, module);
    interp.run("churn", vec![RtVal::Int(3)]);
    assert_eq!(
        interp.callees(),
        vec!["churn", "_Znam", "S_ctor", "S_ctor", "S_ctor", "S_dtor", "S_dtor", "S_dtor", "_ZdaPv"]
    );

    // Three 8-byte elements behind an 8-byte cookie
    assert_eq!(interp.calls_to("_Znam")[0].args, vec![RtVal::Int(32)]);
    assert_eq!(interp.offsets_for("S_ctor"), vec![8, 16, 24]);
    assert_eq!(interp.offsets_for("S_dtor"), vec![24, 16, 8]);

    // The deallocator gets back the start of the allocation
    let (freed, offset) = interp.calls_to("_ZdaPv")[0].args[0].ptr();
    let (first, _) = interp.calls_to("S_ctor")[0].args[0].ptr();
    assert_eq!(freed, first);
    assert_eq!(offset, 0);
}

#[test]
fn test_heap_array_with_zero_elements() {
    let (ctx, module) = lower(HEAP_ARRAY, &pipeline("lowering-prepare"));
    let mut interp = Interpreter::new(&ctx, module);
    interp.run("churn", vec![RtVal::Int(0)]);
    assert_eq!(interp.callees(), vec!["churn", "_Znam", "_ZdaPv"]);
    assert_eq!(interp.calls_to("_Znam")[0].args, vec![RtVal::Int(8)]);
}

const GLOBALS: &str = indoc! {r#"
    builtin.module() {sym_name = "m"} ({
    ^bb0:
      cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "make"} ({})
      cir.func() {function_type = !cir.func<(!cir.ptr<!s32i>) -> !cir.void>, sym_name = "destroy"} ({})
      cir.global() {global_type = !s32i, sym_name = "a"} ({
      ^bb1:
        %0 = cir.get_global() : !cir.ptr<!s32i> {name = @a}
        cir.call(%0 : !cir.ptr<!s32i>) {callee = @make}
        cir.yield()
      }, {})
      cir.global() {global_type = !s32i, sym_name = "b"} ({
      ^bb2:
        %1 = cir.get_global() : !cir.ptr<!s32i> {name = @b}
        cir.call(%1 : !cir.ptr<!s32i>) {callee = @make}
        cir.yield()
      }, {
      ^bb3:
        %2 = cir.get_global() : !cir.ptr<!s32i> {name = @b}
        cir.call(%2 : !cir.ptr<!s32i>) {callee = @destroy}
        cir.yield()
      })
      cir.global() {global_type = !s32i, init_priority = #cir.int<200> : !u32i, sym_name = "late"} ({
      ^bb4:
        %3 = cir.get_global() : !cir.ptr<!s32i> {name = @late}
        cir.call(%3 : !cir.ptr<!s32i>) {callee = @make}
        cir.yield()
      }, {})
      cir.global() {global_type = !s32i, init_priority = #cir.int<101> : !u32i, sym_name = "early"} ({
      ^bb5:
        %4 = cir.get_global() : !cir.ptr<!s32i> {name = @early}
        cir.call(%4 : !cir.ptr<!s32i>) {callee = @make}
        cir.yield()
      }, {})
    })
"#};

/// Names listed in `cir.global_ctors`, in order
fn global_ctor_names(ctx: &cir_ir::Context, module: cir_ir::Module) -> Vec<String> {
    let list = ctx.attr(module.op(), "cir.global_ctors").unwrap();
    ctx.attrs
        .as_array(list)
        .unwrap()
        .iter()
        .map(|&entry| match ctx.attrs.kind(entry) {
            cir_ir::AttrKind::GlobalCtor { name, .. } => name.clone(),
            other => panic!("unexpected entry {:?}", other),
        })
        .collect()
}

#[test]
fn test_startup_runs_initializers_by_priority_then_declaration_order() {
    let (ctx, module) = lower(GLOBALS, &pipeline("lowering-prepare"));
    let ctors = global_ctor_names(&ctx, module);
    assert_eq!(ctors.len(), 3);
    assert_eq!(ctors[2], "_GLOBAL__sub_I_m");

    // Simulate program startup
    let mut interp = Interpreter::new(&ctx, module);
    for name in &ctors {
        interp.run(name, vec![]);
    }
    let constructed: Vec<RtVal> = interp.calls_to("make").iter().map(|c| c.args[0].clone()).collect();
    let expected = vec![
        interp.global("early"),
        interp.global("late"),
        interp.global("a"),
        interp.global("b"),
    ];
    assert_eq!(constructed, expected);
}

#[test]
fn test_destructor_is_registered_with_atexit() {
    let (ctx, module) = lower(GLOBALS, &pipeline("lowering-prepare"));
    assert!(module.lookup(&ctx, "__dso_handle").is_some());

    let mut interp = Interpreter::new(&ctx, module);
    interp.run("_GLOBAL__sub_I_m", vec![]);
    assert!(interp.calls_to("destroy").is_empty());
    let registrations = interp.calls_to("__cxa_atexit");
    assert_eq!(registrations.len(), 1);
    let args = registrations[0].args.clone();
    assert_eq!(
        args,
        vec![
            RtVal::Func("destroy".to_string()),
            interp.global("b"),
            interp.global("__dso_handle"),
        ]
    );
}
