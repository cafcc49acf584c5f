//! Integration tests for counterexample reconstruction
//!
//! These tests verify:
//! 1. Reply classification by verdict marker
//! 2. Trace reconstruction through the name mapping and the inline map
//! 3. Error codes come from the last action block, never defaulted

use cfa_core::automaton::InlineMap;
use cfa_core::verifier::{classify_output, CexError, CexReconstructor, CfaWriter, NameMapping, ReplyKind};
use cfa_core::{
    inline_calls, AutomataSystem, CfaId, Context, ExprBuilder, Literal, LocId, LocationRef,
    VariableAssignment,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

struct Fixture {
    ctx: Arc<Context>,
    mapping: NameMapping,
    x: cfa_core::Variable,
    err: cfa_core::Variable,
}

/// Mapping with `L0`, `L1`, `x : Int` and the error field `err : Bv8`
fn fixture() -> Fixture {
    let ctx = Arc::new(Context::new());
    let x = ctx.create_variable("main/x", ctx.int_type()).unwrap();
    let err = ctx.create_variable("main/err", ctx.bv_type(8)).unwrap();

    let mut mapping = NameMapping::new(InlineMap::new(CfaId(0)));
    mapping.insert_location("L0", LocId(0));
    mapping.insert_location("L1", LocId(2));
    mapping.insert_variable("x", x.clone());
    mapping.insert_variable("err", err.clone());
    mapping.set_error_field(err.clone());

    Fixture {
        ctx,
        mapping,
        x,
        err,
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

#[test]
fn test_safe_reply() {
    assert_eq!(classify_output("(SafetyResult Safe)"), ReplyKind::Safe);
}

#[test]
fn test_unsafe_reply_extracts_trace() {
    let reply = "(SafetyResult Unsafe (Trace (InitLoc L0) (CfaState L1 (ExplState (x 3) (err 2)))))";
    assert_eq!(
        classify_output(reply),
        ReplyKind::Unsafe(Some(
            "(Trace (InitLoc L0) (CfaState L1 (ExplState (x 3) (err 2)))))"
        ))
    );
}

// =============================================================================
// RECONSTRUCTION
// =============================================================================

#[test]
fn test_two_state_trace() {
    let f = fixture();
    let reply = "(SafetyResult Unsafe (Trace (InitLoc L0) (CfaState L1 (ExplState (x 3) (err 2)))))";
    let ReplyKind::Unsafe(Some(cex)) = classify_output(reply) else {
        panic!("expected an unsafe reply with a trace");
    };

    let rec = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct(cex)
        .unwrap();
    let b = ExprBuilder::new(f.ctx.clone());

    assert_eq!(
        rec.trace.states(),
        &[
            LocationRef::new(CfaId(0), LocId(0)),
            LocationRef::new(CfaId(0), LocId(2))
        ]
    );
    assert_eq!(
        rec.trace.actions(),
        &[vec![
            VariableAssignment::new(f.x.clone(), b.int_lit(3)),
            VariableAssignment::new(f.err.clone(), b.bv_lit(2u32, 8)),
        ]]
    );
    assert_eq!(rec.error_code, 2);
}

#[test]
fn test_missing_error_field_is_fatal() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (x 3))))")
        .unwrap_err();
    assert!(matches!(err, CexError::MissingErrorField { .. }));
}

#[test]
fn test_error_field_only_read_from_last_block() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct(
            "(Trace (InitLoc L0) (CfaState L1 (ExplState (err 2))) (CfaState L0 (ExplState (x 1))))",
        )
        .unwrap_err();
    assert!(matches!(err, CexError::MissingErrorField { .. }));
}

#[test]
fn test_no_state_blocks() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L0))")
        .unwrap_err();
    assert!(matches!(err, CexError::NoActions { .. }));
}

#[test]
fn test_unnamed_states_skipped() {
    let f = fixture();
    let rec = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct(
            "(Trace (InitLoc L0) (CfaState (ExplState (x 9))) (CfaState L1 (ExplState (err 5))))",
        )
        .unwrap();
    assert_eq!(rec.trace.len(), 2);
    assert_eq!(rec.trace.actions().len(), 1);
    assert_eq!(rec.error_code, 5);
}

#[test]
fn test_empty_explicit_state() {
    let f = fixture();
    let rec = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct(
            "(Trace (InitLoc L0) (CfaState L0 (ExplState)) (CfaState L1 (ExplState (err 1))))",
        )
        .unwrap();
    assert!(rec.trace.actions()[0].is_empty());
    assert_eq!(rec.error_code, 1);
}

#[test]
fn test_malformed_value_reports_fragment() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (x three) (err 1))))")
        .unwrap_err();
    match &err {
        CexError::InvalidValue { value, variable, .. } => {
            assert_eq!(value, "three");
            assert_eq!(variable, "main/x");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.raw().starts_with("(Trace"));
}

#[test]
fn test_unbalanced_text_fails() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (x 3)")
        .unwrap_err();
    assert!(matches!(err, CexError::Syntax { .. }));
}

#[test]
fn test_unknown_location() {
    let f = fixture();
    let err = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L7))")
        .unwrap_err();
    assert!(matches!(err, CexError::UnknownLocation { ref name, .. } if name == "L7"));
}

#[test]
fn test_bv_value_truncated_to_width() {
    let f = fixture();
    let rec = CexReconstructor::new(f.ctx.clone(), &f.mapping)
        .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (err 258))))")
        .unwrap();
    let value = rec.trace.last_action().unwrap()[0].value().clone();
    assert_eq!(
        value.as_literal(),
        Some(&Literal::Bv {
            width: 8,
            value: 2u32.into()
        })
    );
    assert_eq!(rec.error_code, 2);
}

// =============================================================================
// END TO END THROUGH INLINING
// =============================================================================

#[test]
fn test_inlined_names_resolve_to_callee() {
    let ctx = Arc::new(Context::new());
    let b = ExprBuilder::new(ctx.clone());
    let mut system = AutomataSystem::new(ctx.clone());
    let main = system.create_cfa("main");
    let f = system.create_cfa("f");
    system.set_main_automaton(main);

    let a = system.cfa_mut(f).create_input("a", ctx.int_type());
    let fc = system.cfa_mut(f);
    let (f_entry, f_exit) = (fc.entry(), fc.exit());
    let f_err = fc.create_error_location();
    fc.add_error_code(f_err, b.bv_lit(3u32, 8));
    let bad = b.gt(b.var_ref(&a), b.int_lit(2)).unwrap();
    fc.create_assume_transition(f_entry, f_err, bad.clone());
    fc.create_assume_transition(f_entry, f_exit, b.not(bad).unwrap());

    let (entry, exit) = (system.cfa(main).entry(), system.cfa(main).exit());
    system.create_call_transition(
        main,
        entry,
        exit,
        None,
        f,
        vec![VariableAssignment::new(a.clone(), b.int_lit(5))],
        vec![],
    );

    let mut flat = system.clone();
    let inline = inline_calls(&mut flat).unwrap();
    let mut model = String::new();
    let mapping = CfaWriter::new(&flat, inline).write(&mut model).unwrap();
    assert!(model.contains("var main_f0_a : int"));
    assert!(model.contains("var main___error_field : bv[8]"));

    let cex = "(Trace (InitLoc loc0) \
               (CfaState loc2 (ExplState (main_f0_a 5))) \
               (CfaState loc4 (ExplState (main_f0_a 5) (main___error_field 3))) \
               (CfaState __error (ExplState (main_f0_a 5) (main___error_field 3))))";
    let rec = CexReconstructor::new(ctx.clone(), &mapping)
        .reconstruct(cex)
        .unwrap();

    assert_eq!(
        rec.trace.states(),
        &[
            LocationRef::new(main, entry),
            LocationRef::new(f, f_entry),
            LocationRef::new(f, f_err),
        ]
    );
    assert_eq!(
        rec.trace.actions()[0],
        vec![VariableAssignment::new(a, b.int_lit(5))]
    );
    assert_eq!(rec.error_code, 3);
}

#[test]
fn test_nested_calls_flatten_and_resolve() {
    let ctx = Arc::new(Context::new());
    let b = ExprBuilder::new(ctx.clone());
    let mut system = AutomataSystem::new(ctx.clone());
    let main = system.create_cfa("main");
    let f = system.create_cfa("f");
    let g = system.create_cfa("g");
    system.set_main_automaton(main);

    // g(q): y := q + 1, fails with code 5 when q > 4
    let q = system.cfa_mut(g).create_input("q", ctx.int_type());
    let y = system.cfa_mut(g).create_local("y", ctx.int_type());
    system.cfa_mut(g).add_output(y.clone());
    let gc = system.cfa_mut(g);
    let (g_entry, g_exit) = (gc.entry(), gc.exit());
    let g_err = gc.create_error_location();
    gc.add_error_code(g_err, b.int_lit(5));
    let next = b.add(b.var_ref(&q), b.int_lit(1)).unwrap();
    gc.create_assign_transition(g_entry, g_exit, None, vec![VariableAssignment::new(y.clone(), next)]);
    gc.create_assume_transition(g_entry, g_err, b.gt(b.var_ref(&q), b.int_lit(4)).unwrap());

    // f(p): t := g(p + 1)
    let p = system.cfa_mut(f).create_input("p", ctx.int_type());
    let t = system.cfa_mut(f).create_local("t", ctx.int_type());
    system.cfa_mut(f).add_output(t.clone());
    let (f_entry, f_exit) = (system.cfa(f).entry(), system.cfa(f).exit());
    system.create_call_transition(
        f,
        f_entry,
        f_exit,
        None,
        g,
        vec![VariableAssignment::new(q.clone(), b.add(b.var_ref(&p), b.int_lit(1)).unwrap())],
        vec![VariableAssignment::new(t.clone(), b.var_ref(&y))],
    );

    // main: r := f(4)
    let r = system.cfa_mut(main).create_local("r", ctx.int_type());
    let (entry, exit) = (system.cfa(main).entry(), system.cfa(main).exit());
    system.create_call_transition(
        main,
        entry,
        exit,
        None,
        f,
        vec![VariableAssignment::new(p.clone(), b.int_lit(4))],
        vec![VariableAssignment::new(r.clone(), b.var_ref(&t))],
    );

    let mut flat = system.clone();
    let inline = inline_calls(&mut flat).unwrap();
    let cfa = flat.cfa(main);
    assert!(cfa.transitions().all(|e| !e.is_call()));
    assert_eq!(cfa.num_locations(), 7);
    assert_eq!(cfa.num_transitions(), 6);

    let f0_p = cfa.find_local_by_name("f0_p").unwrap();
    let f0_t = cfa.find_local_by_name("f0_t").unwrap();
    let g1_q = cfa.find_local_by_name("g1_q").unwrap();
    let g1_y = cfa.find_local_by_name("g1_y").unwrap();
    assert_eq!(inline.original_variable(&g1_q), q);
    assert_eq!(inline.original_variable(&f0_t), t);
    assert_eq!(inline.num_inlined_variables(), 4);

    let edge_into = |original: LocationRef| {
        cfa.transitions()
            .find(|e| e.target().map(|l| inline.original_location(l)) == Some(original))
            .unwrap()
    };
    let edge_from = |original: LocationRef| {
        cfa.transitions()
            .find(|e| e.source().map(|l| inline.original_location(l)) == Some(original))
            .unwrap()
    };

    // Arguments of the nested call are bound to the copies of g's inputs
    assert_eq!(
        edge_into(LocationRef::new(g, g_entry)).assignments(),
        &[VariableAssignment::new(
            g1_q.clone(),
            b.add(b.var_ref(&f0_p), b.int_lit(1)).unwrap()
        )]
    );
    assert_eq!(
        edge_into(LocationRef::new(f, f_entry)).assignments(),
        &[VariableAssignment::new(f0_p.clone(), b.int_lit(4))]
    );

    // Results flow back through the copy of f's output
    assert_eq!(
        edge_from(LocationRef::new(g, g_exit)).assignments(),
        &[VariableAssignment::new(f0_t.clone(), b.var_ref(&g1_y))]
    );
    assert_eq!(
        edge_from(LocationRef::new(f, f_exit)).assignments(),
        &[VariableAssignment::new(r, b.var_ref(&f0_t))]
    );

    let mut model = String::new();
    let mapping = CfaWriter::new(&flat, inline).write(&mut model).unwrap();
    assert!(model.contains("    error loc __error\n"));
    assert!(model.contains("        main___error_field := 5\n"));

    let cex = "(Trace (InitLoc loc0) \
               (CfaState loc2 (ExplState (main_f0_p 4))) \
               (CfaState loc4 (ExplState (main_f0_p 4) (main_g1_q 5))) \
               (CfaState loc6 (ExplState (main_g1_q 5) (main___error_field 5))) \
               (CfaState __error (ExplState (main_g1_q 5) (main___error_field 5))))";
    let rec = CexReconstructor::new(ctx.clone(), &mapping)
        .reconstruct(cex)
        .unwrap();

    assert_eq!(
        rec.trace.states(),
        &[
            LocationRef::new(main, entry),
            LocationRef::new(f, f_entry),
            LocationRef::new(g, g_entry),
            LocationRef::new(g, g_err),
        ]
    );
    assert_eq!(
        rec.trace.actions()[1],
        vec![
            VariableAssignment::new(p, b.int_lit(4)),
            VariableAssignment::new(q, b.int_lit(5)),
        ]
    );
    assert_eq!(rec.error_code, 5);
}
