//! Span instrumentation of plan compilation and top-k execution.


use relax_db_query::{
    execute_plan, parse_query, EngineConfig, ExecutionContext, LogicalPlan, MemoryStore,
    VarRegistry,
};
use tracing_test_utils::init_test_tracing;

fn store() -> MemoryStore {
    let mut s = MemoryStore::new();
    s.insert("<alice>", "<type>", "<singer>", 10.0).unwrap();
    s.insert("<bob>", "<type>", "<singer>", 5.0).unwrap();
    s.insert("<alice>", "<bornIn>", "<Berlin>", 4.0).unwrap();
    s.insert("<bob>", "<bornIn>", "<Paris>", 2.0).unwrap();
    s
}

#[tokio::test(flavor = "current_thread")]
async fn join_plan_emits_compile_and_execute_spans() {
    let (spans, _guard) = init_test_tracing();

    let mut vars = VarRegistry::new();
    let q = parse_query("?x <type> <singer>; ?x <bornIn> ?c", &mut vars).unwrap();
    let config = EngineConfig::new().with_k(5);
    let ctx = ExecutionContext::from_config(&config).with_vars(&vars);
    let out = execute_plan(&store(), &LogicalPlan::original(&q), &config, &ctx)
        .await
        .unwrap();
    assert_eq!(out.len(), 2);

    let compile = spans.find_span("plan_compile").unwrap();
    assert_eq!(compile.level, tracing::Level::DEBUG);
    assert_eq!(compile.fields.get("atoms").map(String::as_str), Some("2"));

    let tree = spans.find_span("join_tree_build").unwrap();
    assert_eq!(tree.parent_name.as_deref(), Some("plan_compile"));
    assert_eq!(tree.fields.get("relations").map(String::as_str), Some("2"));

    let exec = spans.find_span("top_k_execute").unwrap();
    assert_eq!(exec.fields.get("k").map(String::as_str), Some("5"));
    assert_eq!(exec.fields.get("emitted").map(String::as_str), Some("2"));

    let opened = spans.events_with_message("rank join opened");
    assert_eq!(opened.len(), 1);
    assert_eq!(
        opened[0].fields.get("join_var").map(String::as_str),
        Some("?x")
    );

    let names = spans.span_names();
    let compile_pos = names.iter().position(|n| *n == "plan_compile").unwrap();
    let exec_pos = names.iter().position(|n| *n == "top_k_execute").unwrap();
    assert!(compile_pos < exec_pos);
}

#[tokio::test(flavor = "current_thread")]
async fn single_atom_plan_skips_join_tree_span() {
    let (spans, _guard) = init_test_tracing();

    let mut vars = VarRegistry::new();
    let q = parse_query("?x <type> <singer>", &mut vars).unwrap();
    let config = EngineConfig::new();
    let ctx = ExecutionContext::from_config(&config);
    execute_plan(&store(), &LogicalPlan::original(&q), &config, &ctx)
        .await
        .unwrap();

    assert_eq!(spans.count("plan_compile"), 1);
    assert!(!spans.has_span("join_tree_build"));
    assert!(spans.has_span("top_k_execute"));
}
