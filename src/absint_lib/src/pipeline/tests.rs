use super::*;
use crate::abstract_domain::{Bound, ConstantDomain, IntervalDomain, Lattice};
use crate::analysis::interprocedural::ContextBasedAnalysis;
use crate::checkers::{LiteralDivisionByZero, PossibleDivisionByZero};
use crate::intermediate_representation::{
    CfgDescriptor, Constant, EdgeKind, StatementKind, SymbolicExpression, TypeSet, Variable,
};
use crate::test_helpers::*;
use crate::utils::log::LogThread;

/// `f(x) { return x + 1; }`
fn increment_cfg() -> Cfg {
    let mut cfg = Cfg::new(CfgDescriptor::new(
        "f",
        vec![Variable::new("x", TypeSet::of("int"))],
        Some(TypeSet::of("int")),
        location(1),
    ));
    let ret = push_stmt(
        &mut cfg,
        2,
        StatementKind::Return(Some(add(var("x"), int(1)))),
    );
    cfg.add_entry(ret);
    cfg.add_exit(ret);
    cfg
}

/// `f(n) { if (n <= 0) return 1; else return n * f(n - 1); }`
fn factorial_cfg() -> Cfg {
    let mut cfg = Cfg::new(CfgDescriptor::new(
        "f",
        vec![Variable::new("n", TypeSet::of("int"))],
        Some(TypeSet::of("int")),
        location(1),
    ));
    let guard = push_stmt(&mut cfg, 2, expression(le(var("n"), int(0))));
    let base = push_stmt(&mut cfg, 3, StatementKind::Return(Some(int(1))));
    let recurse = push_stmt(
        &mut cfg,
        4,
        call("f", vec![sub(var("n"), int(1))], Some("r")),
    );
    let combine = push_stmt(
        &mut cfg,
        5,
        StatementKind::Return(Some(mul(var("n"), var("r")))),
    );
    cfg.add_edge(guard, base, EdgeKind::TrueBranch);
    cfg.add_edge(guard, recurse, EdgeKind::FalseBranch);
    cfg.add_edge(recurse, combine, EdgeKind::Sequential);
    cfg.add_entry(guard);
    cfg.add_exit(base);
    cfg.add_exit(combine);
    cfg
}

fn driver_config(context_sensitivity: usize) -> InterproceduralConfig {
    InterproceduralConfig {
        fixpoint: FixpointConfig::default(),
        context_sensitivity,
        open_call_policy: OpenCallPolicy::default(),
    }
}

#[test]
fn context_sensitive_call_sites_get_separate_summaries() {
    // y1 = f(10); y2 = f(20); with k = 1
    let mut main = cfg_named("main");
    let first = push_stmt(&mut main, 10, call("f", vec![int(10)], Some("y1")));
    let second = push_stmt(&mut main, 11, call("f", vec![int(20)], Some("y2")));
    main.add_edge(first, second, EdgeKind::Sequential);
    main.add_entry(first);
    main.add_exit(second);

    let mut program = Program::new();
    program.add_cfg(main);
    program.add_cfg(increment_cfg());
    program.add_entry_point("main");
    program.finalize();

    let mut driver: ContextBasedAnalysis<TestState<ConstantDomain>> = ContextBasedAnalysis::new(
        &program,
        driver_config(1),
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    driver.fixpoint(&constant_state()).unwrap();
    assert!(driver.failures().is_empty());

    // one summary per call site
    assert_eq!(driver.analysis_results_of("f").len(), 2);

    let main_cfg = program.cfg("main").unwrap();
    let main_results = driver.analysis_results_of("main");
    assert_eq!(main_results.len(), 1);
    let exit = main_results[0].exit_state(main_cfg);
    assert_eq!(
        exit.state().value.get_state(&var_id("y1")),
        ConstantDomain::Value(Constant::Int(11))
    );
    assert_eq!(
        exit.state().value.get_state(&var_id("y2")),
        ConstantDomain::Value(Constant::Int(21))
    );
}

#[test]
fn context_insensitive_call_sites_share_one_summary() {
    let mut main = cfg_named("main");
    let first = push_stmt(&mut main, 10, call("f", vec![int(10)], Some("y1")));
    let second = push_stmt(&mut main, 11, call("f", vec![int(20)], Some("y2")));
    main.add_edge(first, second, EdgeKind::Sequential);
    main.add_entry(first);
    main.add_exit(second);

    let mut program = Program::new();
    program.add_cfg(main);
    program.add_cfg(increment_cfg());
    program.add_entry_point("main");
    program.finalize();

    let mut driver: ContextBasedAnalysis<TestState<ConstantDomain>> = ContextBasedAnalysis::new(
        &program,
        driver_config(0),
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    driver.fixpoint(&constant_state()).unwrap();

    // both call sites share the starting token
    assert_eq!(driver.analysis_results_of("f").len(), 1);
    // the shared entry joins both arguments, so the result degrades to top
    let main_cfg = program.cfg("main").unwrap();
    let exit = driver.analysis_results_of("main")[0].exit_state(main_cfg);
    assert_eq!(
        exit.state().value.get_state(&var_id("y2")),
        ConstantDomain::Top
    );
}

#[test]
fn recursion_stabilizes_under_intervals() {
    // x = f(5) with the recursive factorial-like callee
    let mut main = cfg_named("main");
    let entry = push_stmt(&mut main, 10, call("f", vec![int(5)], Some("x")));
    main.add_entry(entry);
    main.add_exit(entry);

    let mut program = Program::new();
    program.add_cfg(main);
    program.add_cfg(factorial_cfg());
    program.add_entry_point("main");
    program.finalize();

    let mut driver: ContextBasedAnalysis<TestState<IntervalDomain>> = ContextBasedAnalysis::new(
        &program,
        driver_config(1),
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    driver.fixpoint(&interval_state()).unwrap();
    assert!(driver.failures().is_empty());

    // the cycle was detected and recorded
    assert!(driver
        .recursions()
        .iter()
        .any(|recursion| recursion.head() == "f"));

    // the recursive summary converged to [1, +inf)
    let f_cfg = program.cfg("f").unwrap();
    let ret = f_cfg.descriptor().result_identifier();
    let expected = IntervalDomain::range(Bound::Int(1), Bound::PosInf);
    assert!(driver
        .analysis_results_of("f")
        .iter()
        .any(|analyzed| analyzed.exit_state(f_cfg).state().value.get_state(&ret) == expected));

    // the caller sees a sound approximation of the returned value
    let main_cfg = program.cfg("main").unwrap();
    let exit = driver.analysis_results_of("main")[0].exit_state(main_cfg);
    let result = exit.state().value.get_state(&var_id("x"));
    let (low, high) = result.bounds().expect("the result is reachable");
    assert_eq!(high, Bound::PosInf);
    assert!(Bound::Int(1) <= low && low <= Bound::Int(5));
}

fn open_call_program() -> Program {
    let mut main = cfg_named("main");
    let entry = push_stmt(&mut main, 10, call("library_fn", vec![int(1)], Some("y")));
    main.add_entry(entry);
    main.add_exit(entry);
    let mut program = Program::new();
    program.add_cfg(main);
    program.add_entry_point("main");
    program.finalize();
    program
}

#[test]
fn open_calls_return_top_by_default() {
    let program = open_call_program();
    let mut driver: ContextBasedAnalysis<TestState<ConstantDomain>> = ContextBasedAnalysis::new(
        &program,
        driver_config(1),
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    driver.fixpoint(&constant_state()).unwrap();
    let main_cfg = program.cfg("main").unwrap();
    let exit = driver.analysis_results_of("main")[0].exit_state(main_cfg);
    assert_eq!(
        exit.state().value.get_state(&var_id("y")),
        ConstantDomain::Top
    );
}

#[test]
fn open_calls_can_cut_the_continuation() {
    let program = open_call_program();
    let mut config = driver_config(1);
    config.open_call_policy = OpenCallPolicy::ReturnBottom;
    let mut driver: ContextBasedAnalysis<TestState<ConstantDomain>> = ContextBasedAnalysis::new(
        &program,
        config,
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    driver.fixpoint(&constant_state()).unwrap();
    let main_cfg = program.cfg("main").unwrap();
    let exit = driver.analysis_results_of("main")[0].exit_state(main_cfg);
    assert!(exit.is_bottom());
}

#[test]
fn open_calls_can_fail_the_cfg() {
    let program = open_call_program();
    let mut config = driver_config(1);
    config.open_call_policy = OpenCallPolicy::Fail;
    let mut driver: ContextBasedAnalysis<TestState<ConstantDomain>> = ContextBasedAnalysis::new(
        &program,
        config,
        CancellationToken::new(),
        LogThread::create_disconnected_sender(),
    );
    // the failure is recorded per CFG; the run itself continues
    driver.fixpoint(&constant_state()).unwrap();
    assert_eq!(driver.failures().len(), 1);
    assert!(driver.analysis_results_of("main").is_empty());
}

#[test]
fn analyzer_runs_checks_and_serializes_results() {
    // x = 0; y = 1 / x; z = 1 / 0;
    let mut main = cfg_named("main");
    let first = push_stmt(&mut main, 1, assign("x", int(0)));
    let second = push_stmt(
        &mut main,
        2,
        assign(
            "y",
            SymbolicExpression::binary(
                crate::intermediate_representation::BinaryOperator::Div,
                int(1),
                var("x"),
            ),
        ),
    );
    let third = push_stmt(
        &mut main,
        3,
        assign(
            "z",
            SymbolicExpression::binary(
                crate::intermediate_representation::BinaryOperator::Div,
                int(1),
                int(0),
            ),
        ),
    );
    main.add_edge(first, second, EdgeKind::Sequential);
    main.add_edge(second, third, EdgeKind::Sequential);
    main.add_entry(first);
    main.add_exit(third);
    let mut program = Program::new();
    program.add_cfg(main);
    program.add_entry_point("main");

    let config = AnalysisConfig {
        analysis_graphs: GraphFormat::Dot,
        serialize_results: true,
        ..AnalysisConfig::default()
    };
    let analyzer = Analyzer::new(config, constant_state())
        .unwrap()
        .with_syntactic_check(Box::new(LiteralDivisionByZero))
        .with_semantic_check(Box::new(PossibleDivisionByZero));
    let outcome = analyzer.run_with_outcome(&mut program).unwrap();

    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.check == "literal-div-by-zero" && warning.location == location(3)));
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.check == "div-by-zero" && warning.location == location(2)));

    assert_eq!(outcome.graphs.len(), 1);
    let graph = &outcome.graphs[0];
    assert_eq!(graph.name, "main");
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);
    assert!(graph.nodes.iter().all(|node| node.state.is_some()));
    let json = graph.to_json();
    assert_eq!(json["name"], "main");
    assert!(outcome.failures.is_empty());
}

#[test]
fn analyzer_rejects_invalid_configurations() {
    let config = AnalysisConfig {
        widening_threshold: 0,
        ..AnalysisConfig::default()
    };
    assert!(Analyzer::new(config, constant_state()).is_err());
}

#[test]
fn analyzer_rejects_programs_without_entry_points() {
    let analyzer = Analyzer::new(AnalysisConfig::default(), constant_state()).unwrap();
    let mut program = Program::new();
    assert!(matches!(
        analyzer.run(&mut program),
        Err(AnalysisError::Validation(_))
    ));
}

#[test]
fn cancellation_surfaces_from_run() {
    let mut main = cfg_named("main");
    let only = push_stmt(&mut main, 1, assign("x", int(1)));
    main.add_entry(only);
    main.add_exit(only);
    let mut program = Program::new();
    program.add_cfg(main);
    program.add_entry_point("main");

    let analyzer = Analyzer::new(AnalysisConfig::default(), constant_state()).unwrap();
    analyzer.cancellation_token().cancel();
    assert!(matches!(
        analyzer.run(&mut program),
        Err(AnalysisError::Cancelled)
    ));
}
