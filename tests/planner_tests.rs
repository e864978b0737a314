//! Planner integration tests

mod test_utils;

use std::io::Write;

use quarry::catalog::DataType;
use quarry::executor::{Datum, ExecutorError, NodeKind, PlanTree, Tuple};
use quarry::planner::{
    CostBasedJoinPlanner, ExplainOutput, Planner, PlannerConfig, PlannerError, RewindStrategy,
};
use quarry::sql::{BinaryOp, Expr, FromClause, JoinType, OrderByExpr, SelectClause, SelectValue};
use quarry::storage::MemoryStorage;
use quarry::tuple;

use test_utils::{drain, ints, load, r_and_s, sorted};

/// A(k) with 10 rows, B(k, j) with 100 rows and C(j) with 1000 rows;
/// A.k = B.k and B.j = C.j match on 1..=10
fn chain_tables() -> MemoryStorage {
    let storage = MemoryStorage::new();
    load(
        &storage,
        "a",
        &[("k", DataType::Int)],
        (1..=10).map(|i: i64| tuple![i]).collect(),
    );
    load(
        &storage,
        "b",
        &[("k", DataType::Int), ("j", DataType::Int)],
        (1..=100).map(|i: i64| tuple![i, i]).collect(),
    );
    load(
        &storage,
        "c",
        &[("j", DataType::Int)],
        (1..=1000).map(|i: i64| tuple![i]).collect(),
    );
    storage
}

fn chain_query() -> SelectClause {
    SelectClause {
        values: vec![
            SelectValue::expr(Expr::qualified("a", "k")),
            SelectValue::expr(Expr::qualified("c", "j")),
        ],
        from: Some(FromClause::join(
            FromClause::join(
                FromClause::table("a"),
                FromClause::table("c"),
                JoinType::Cross,
                None,
            ),
            FromClause::table("b"),
            JoinType::Inner,
            None,
        )),
        where_expr: Some(Expr::and(vec![
            Expr::eq(Expr::qualified("a", "k"), Expr::qualified("b", "k")),
            Expr::eq(Expr::qualified("b", "j"), Expr::qualified("c", "j")),
        ])),
        ..Default::default()
    }
}

fn r_join_s(join_type: JoinType) -> FromClause {
    FromClause::join(
        FromClause::table("r"),
        FromClause::table("s"),
        join_type,
        Some(Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a"))),
    )
}

fn operators(plan: &PlanTree) -> Vec<String> {
    plan.nodes()
        .iter()
        .map(|n| n.operator().to_string())
        .collect()
}

fn run(planner: &CostBasedJoinPlanner<'_>, query: &SelectClause) -> Vec<Tuple> {
    let mut plan = planner.make_plan(query).unwrap();
    drain(&mut plan)
}

// ============ Join Order Tests ============

#[test]
fn test_join_order_avoids_cross_product() {
    test_utils::init_tracing();
    let storage = chain_tables();
    let planner = CostBasedJoinPlanner::new(&storage);

    let plan = planner.make_plan(&chain_query()).unwrap();
    let ops = operators(&plan);
    assert!(ops.iter().all(|op| !op.contains("CROSS")), "{}", plan);
    assert_eq!(
        ops.iter().filter(|op| op.starts_with("NestedLoopJoin")).count(),
        2
    );

    let mut plan = plan;
    let rows = sorted(drain(&mut plan));
    let expected: Vec<Vec<i64>> = (1..=10).map(|i| vec![i, i]).collect();
    assert_eq!(ints(&rows), expected);
}

#[test]
fn test_join_order_is_deterministic() {
    let storage = chain_tables();
    let planner = CostBasedJoinPlanner::new(&storage);

    let first = planner.make_plan(&chain_query()).unwrap();
    for _ in 0..3 {
        let again = planner.make_plan(&chain_query()).unwrap();
        assert!(first.equivalent(&again));
        assert_eq!(ExplainOutput::format(&first), ExplainOutput::format(&again));
    }
}

#[test]
fn test_from_order_does_not_change_results() {
    let storage = chain_tables();
    let planner = CostBasedJoinPlanner::new(&storage);

    let mut reordered = chain_query();
    reordered.from = Some(FromClause::join(
        FromClause::join(
            FromClause::table("c"),
            FromClause::table("b"),
            JoinType::Cross,
            None,
        ),
        FromClause::table("a"),
        JoinType::Cross,
        None,
    ));
    assert_eq!(
        sorted(run(&planner, &chain_query())),
        sorted(run(&planner, &reordered))
    );
}

#[test]
fn test_select_star_keeps_from_order() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::Inner)),
        ..SelectClause::select_all()
    };

    let plan = planner.make_plan(&query).unwrap();
    let names: Vec<String> = plan
        .schema()
        .unwrap()
        .iter()
        .map(|c| c.column_name().to_string())
        .collect();
    assert_eq!(names, vec!["r.a", "r.b", "s.a", "s.c"]);
}

#[test]
fn test_reinitialize_rewind_matches_mark() {
    let storage = chain_tables();
    let mark = CostBasedJoinPlanner::new(&storage);
    let config = PlannerConfig {
        join_rewind: RewindStrategy::Reinitialize,
        ..Default::default()
    };
    let reinit = CostBasedJoinPlanner::with_config(&storage, config);

    let plan = reinit.make_plan(&chain_query()).unwrap();
    assert!(plan
        .nodes()
        .iter()
        .all(|n| n.operator().kind() != NodeKind::Materialize));

    assert_eq!(
        sorted(run(&mark, &chain_query())),
        sorted(run(&reinit, &chain_query()))
    );
}

#[test]
fn test_too_many_leaves_from_config() {
    let storage = chain_tables();
    let config = PlannerConfig {
        max_join_leaves: 2,
        ..Default::default()
    };
    let planner = CostBasedJoinPlanner::with_config(&storage, config);
    assert!(matches!(
        planner.make_plan(&chain_query()),
        Err(PlannerError::TooManyLeaves { leaves: 3, max: 2 })
    ));
}

// ============ Predicate Pushdown Tests ============

#[test]
fn test_where_pushed_to_scan() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::Inner)),
        where_expr: Some(Expr::eq(Expr::qualified("r", "b"), Expr::literal("y"))),
        ..SelectClause::select_all()
    };

    let mut plan = planner.make_plan(&query).unwrap();
    let ops = operators(&plan);
    assert!(
        ops.iter()
            .any(|op| op.starts_with("FileScan: r") && op.contains("filter=")),
        "{:?}",
        ops
    );
    assert!(ops.iter().all(|op| !op.starts_with("Filter")));
    assert_eq!(drain(&mut plan), vec![tuple![2, "y", 2, "q"]]);
}

#[test]
fn test_simple_select() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let predicate = Expr::binary(Expr::column("a"), BinaryOp::GtEq, Expr::literal(2));

    let mut plan = planner.make_simple_select("r", Some(predicate)).unwrap();
    assert_eq!(plan.kind(), NodeKind::Project);
    assert_eq!(drain(&mut plan), vec![tuple![2, "y"], tuple![3, "z"]]);
}

#[test]
fn test_unknown_column_rejected() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let predicate = Expr::eq(Expr::column("missing"), Expr::literal(1));
    assert!(planner.make_simple_select("r", Some(predicate)).is_err());
}

#[test]
fn test_ambiguous_where_column_rejected() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);

    // r JOIN s ON r.a = s.a WHERE a = 1
    let query = SelectClause {
        from: Some(r_join_s(JoinType::Inner)),
        where_expr: Some(Expr::eq(Expr::column("a"), Expr::literal(1))),
        ..SelectClause::select_all()
    };
    assert!(matches!(
        planner.make_plan(&query),
        Err(PlannerError::Executor(ExecutorError::AmbiguousColumn(_)))
    ));

    let query = SelectClause {
        where_expr: Some(Expr::eq(Expr::qualified("s", "a"), Expr::literal(1))),
        ..query
    };
    assert_eq!(run(&planner, &query), vec![tuple![1, "x", 1, "p"]]);
}

// ============ Outer Join Tests ============

#[test]
fn test_left_outer_join_keeps_unmatched() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::LeftOuter)),
        ..SelectClause::select_all()
    };

    let rows = run(&planner, &query);
    assert_eq!(rows.len(), 3);
    assert!(rows.contains(&tuple![3, "z", Datum::Null, Datum::Null]));
}

#[test]
fn test_right_outer_join_keeps_column_order() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(FromClause::join(
            FromClause::table("s"),
            FromClause::table("r"),
            JoinType::RightOuter,
            Some(Expr::eq(Expr::qualified("s", "a"), Expr::qualified("r", "a"))),
        )),
        ..SelectClause::select_all()
    };

    let rows = run(&planner, &query);
    assert_eq!(rows.len(), 3);
    assert!(rows.contains(&tuple![1, "p", 1, "x"]));
    assert!(rows.contains(&tuple![Datum::Null, Datum::Null, 3, "z"]));
}

#[test]
fn test_where_over_outer_join() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::LeftOuter)),
        where_expr: Some(Expr::is_null(Expr::qualified("s", "c"))),
        ..SelectClause::select_all()
    };
    assert_eq!(
        run(&planner, &query),
        vec![tuple![3, "z", Datum::Null, Datum::Null]]
    );
}

#[test]
fn test_full_outer_join_unsupported() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::FullOuter)),
        ..SelectClause::select_all()
    };
    assert!(matches!(
        planner.make_plan(&query),
        Err(PlannerError::UnsupportedOperation(_))
    ));
}

// ============ Derived Table Tests ============

#[test]
fn test_derived_table() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let inner = SelectClause {
        values: vec![SelectValue::expr(Expr::column("a"))],
        from: Some(FromClause::table("s")),
        where_expr: Some(Expr::eq(Expr::column("c"), Expr::literal("q"))),
        ..Default::default()
    };
    let query = SelectClause {
        values: vec![SelectValue::expr(Expr::qualified("r", "b"))],
        from: Some(FromClause::join(
            FromClause::table("r"),
            FromClause::derived(inner, "d"),
            JoinType::Inner,
            Some(Expr::eq(Expr::qualified("r", "a"), Expr::qualified("d", "a"))),
        )),
        ..Default::default()
    };
    assert_eq!(run(&planner, &query), vec![tuple!["y"]]);
}

// ============ Aggregate Tests ============

fn sales() -> MemoryStorage {
    let storage = MemoryStorage::new();
    load(
        &storage,
        "sales",
        &[("region", DataType::Text), ("amount", DataType::Int)],
        vec![
            tuple!["east", 10],
            tuple!["west", 5],
            tuple!["east", 30],
            tuple!["north", 7],
            tuple!["west", 15],
            tuple!["east", 20],
        ],
    );
    storage
}

#[test]
fn test_group_by_having_order_by() {
    let storage = sales();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        values: vec![
            SelectValue::expr(Expr::column("region")),
            SelectValue::aliased(
                Expr::function("SUM", vec![Expr::column("amount")]),
                "total",
            ),
        ],
        from: Some(FromClause::table("sales")),
        group_by: vec![Expr::column("region")],
        having: Some(Expr::binary(
            Expr::count_star(),
            BinaryOp::Gt,
            Expr::literal(1),
        )),
        order_by: vec![OrderByExpr::desc(Expr::function(
            "SUM",
            vec![Expr::column("amount")],
        ))],
        ..Default::default()
    };

    let mut plan = planner.make_plan(&query).unwrap();
    assert_eq!(
        drain(&mut plan),
        vec![tuple!["east", 60], tuple!["west", 20]]
    );
    let names: Vec<String> = plan
        .schema()
        .unwrap()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(names, vec!["region", "total"]);
}

#[test]
fn test_aggregate_without_group_by() {
    let storage = sales();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        values: vec![
            SelectValue::expr(Expr::count_star()),
            SelectValue::expr(Expr::function("MAX", vec![Expr::column("amount")])),
            SelectValue::expr(Expr::distinct_function(
                "COUNT",
                vec![Expr::column("region")],
            )),
        ],
        from: Some(FromClause::table("sales")),
        ..Default::default()
    };

    let mut plan = planner.make_plan(&query).unwrap();
    assert_eq!(drain(&mut plan), vec![tuple![6, 30, 3]]);
    assert_eq!(
        plan.schema().unwrap().column(0).unwrap().name,
        "COUNT(*)"
    );
}

#[test]
fn test_aggregate_over_empty_filter() {
    let storage = sales();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        values: vec![
            SelectValue::expr(Expr::count_star()),
            SelectValue::expr(Expr::function("SUM", vec![Expr::column("amount")])),
        ],
        from: Some(FromClause::table("sales")),
        where_expr: Some(Expr::eq(Expr::column("region"), Expr::literal("south"))),
        ..Default::default()
    };
    assert_eq!(run(&planner, &query), vec![tuple![0, Datum::Null]]);
}

#[test]
fn test_aggregate_errors() {
    let storage = sales();
    let planner = CostBasedJoinPlanner::new(&storage);

    let grouped_by_expr = SelectClause {
        values: vec![SelectValue::expr(Expr::count_star())],
        from: Some(FromClause::table("sales")),
        group_by: vec![Expr::binary(
            Expr::column("amount"),
            BinaryOp::Add,
            Expr::literal(1),
        )],
        ..Default::default()
    };
    assert!(matches!(
        planner.make_plan(&grouped_by_expr),
        Err(PlannerError::InvalidGroupBy(_))
    ));

    let wrong_arity = SelectClause {
        values: vec![SelectValue::expr(Expr::function(
            "SUM",
            vec![Expr::column("amount"), Expr::column("amount")],
        ))],
        from: Some(FromClause::table("sales")),
        ..Default::default()
    };
    assert!(matches!(
        planner.make_plan(&wrong_arity),
        Err(PlannerError::AggregateArity { got: 2, .. })
    ));

    let aggregate_in_where = SelectClause {
        where_expr: Some(Expr::binary(
            Expr::function("SUM", vec![Expr::column("amount")]),
            BinaryOp::Gt,
            Expr::literal(1),
        )),
        from: Some(FromClause::table("sales")),
        ..SelectClause::select_all()
    };
    assert!(matches!(
        planner.make_plan(&aggregate_in_where),
        Err(PlannerError::InvalidPlan(_))
    ));
}

#[test]
fn test_count_distinct_across_int_and_float() {
    let storage = MemoryStorage::new();
    load(
        &storage,
        "t",
        &[("a", DataType::Int)],
        vec![tuple![1], tuple![Datum::Null], tuple![2], tuple![Datum::Null]],
    );
    let planner = CostBasedJoinPlanner::new(&storage);

    // COUNT(DISTINCT COALESCE(a, 1.0)) sees 1, 1.0, 2, 1.0
    let query = SelectClause {
        values: vec![SelectValue::expr(Expr::distinct_function(
            "COUNT",
            vec![Expr::function(
                "COALESCE",
                vec![Expr::column("a"), Expr::literal(1.0)],
            )],
        ))],
        from: Some(FromClause::table("t")),
        ..Default::default()
    };
    assert_eq!(run(&planner, &query), vec![tuple![2]]);
}

// ============ Limit Tests ============

#[test]
fn test_order_by_limit_offset() {
    let storage = sales();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        values: vec![SelectValue::expr(Expr::column("amount"))],
        from: Some(FromClause::table("sales")),
        order_by: vec![OrderByExpr::asc(Expr::column("amount"))],
        limit: 2,
        offset: 1,
        ..Default::default()
    };
    let mut plan = planner.make_plan(&query).unwrap();
    assert_eq!(plan.kind(), NodeKind::LimitOffset);
    assert_eq!(ints(&drain(&mut plan)), vec![vec![7], vec![10]]);
}

// ============ Subquery Tests ============

fn select_column(column: &str, table: &str) -> SelectClause {
    SelectClause {
        values: vec![SelectValue::expr(Expr::column(column))],
        from: Some(FromClause::table(table)),
        ..Default::default()
    }
}

#[test]
fn test_scalar_subquery() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let max_s = SelectClause {
        values: vec![SelectValue::expr(Expr::function(
            "MAX",
            vec![Expr::column("a")],
        ))],
        from: Some(FromClause::table("s")),
        ..Default::default()
    };

    // SELECT a, (SELECT MAX(a) FROM s) FROM r WHERE a >= (SELECT MAX(a) FROM s)
    let query = SelectClause {
        values: vec![
            SelectValue::expr(Expr::column("a")),
            SelectValue::expr(Expr::subquery(max_s.clone())),
        ],
        where_expr: Some(Expr::binary(
            Expr::column("a"),
            BinaryOp::GtEq,
            Expr::subquery(max_s),
        )),
        ..select_column("a", "r")
    };
    let mut plan = planner.make_plan(&query).unwrap();
    assert_eq!(ints(&drain(&mut plan)), vec![vec![2, 2], vec![3, 2]]);
    assert_eq!(
        plan.schema().unwrap().column(1).unwrap().name,
        "(SELECT MAX(a) FROM s)"
    );
}

#[test]
fn test_scalar_subquery_shape() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let compare = |sub: SelectClause| SelectClause {
        where_expr: Some(Expr::eq(Expr::column("a"), Expr::subquery(sub))),
        ..select_column("a", "r")
    };

    let two_rows = select_column("a", "s");
    let no_rows = SelectClause {
        where_expr: Some(Expr::binary(Expr::column("a"), BinaryOp::Gt, Expr::literal(5))),
        ..select_column("a", "s")
    };
    let two_columns = SelectClause {
        from: Some(FromClause::table("s")),
        ..SelectClause::select_all()
    };
    for sub in [two_rows, no_rows, two_columns] {
        assert!(matches!(
            planner.make_plan(&compare(sub)),
            Err(PlannerError::SubqueryShape(_))
        ));
    }
}

#[test]
fn test_in_subquery() {
    let storage = r_and_s();
    load(
        &storage,
        "n",
        &[("v", DataType::Int)],
        vec![tuple![1], tuple![Datum::Null]],
    );
    let planner = CostBasedJoinPlanner::new(&storage);
    let filtered = |table: &str, negated: bool| SelectClause {
        where_expr: Some(Expr::in_subquery(
            Expr::column("a"),
            select_column(if table == "s" { "a" } else { "v" }, table),
            negated,
        )),
        ..select_column("b", "r")
    };

    assert_eq!(run(&planner, &filtered("s", false)), vec![tuple!["x"], tuple!["y"]]);
    assert_eq!(run(&planner, &filtered("s", true)), vec![tuple!["z"]]);
    // a NULL in the list makes NOT IN unknown for every non-matching row
    assert_eq!(run(&planner, &filtered("n", false)), vec![tuple!["x"]]);
    assert!(run(&planner, &filtered("n", true)).is_empty());
}

#[test]
fn test_exists_subquery() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let exists = |c: &str| SelectClause {
        where_expr: Some(Expr::exists(SelectClause {
            from: Some(FromClause::table("s")),
            where_expr: Some(Expr::eq(Expr::column("c"), Expr::literal(c))),
            ..SelectClause::select_all()
        })),
        ..select_column("a", "r")
    };
    assert_eq!(run(&planner, &exists("q")).len(), 3);
    assert!(run(&planner, &exists("none")).is_empty());

    let in_on = SelectClause {
        from: Some(FromClause::join(
            FromClause::table("r"),
            FromClause::table("s"),
            JoinType::Inner,
            Some(Expr::and(vec![
                Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a")),
                Expr::in_subquery(Expr::qualified("s", "c"), select_column("b", "r"), true),
            ])),
        )),
        ..select_column("c", "s")
    };
    assert_eq!(sorted(run(&planner, &in_on)), vec![tuple!["p"], tuple!["q"]]);
}

#[test]
fn test_subquery_errors() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);

    // the inner block cannot see r
    let correlated = SelectClause {
        where_expr: Some(Expr::exists(SelectClause {
            from: Some(FromClause::table("s")),
            where_expr: Some(Expr::eq(Expr::qualified("s", "a"), Expr::qualified("r", "a"))),
            ..SelectClause::select_all()
        })),
        ..select_column("a", "r")
    };
    assert!(matches!(
        planner.make_plan(&correlated),
        Err(PlannerError::Executor(ExecutorError::ColumnNotFound(_)))
    ));

    let scalar = Expr::subquery(select_column("a", "s"));
    let in_group_by = SelectClause {
        values: vec![SelectValue::expr(Expr::count_star())],
        group_by: vec![scalar.clone()],
        ..select_column("a", "r")
    };
    let in_order_by = SelectClause {
        order_by: vec![OrderByExpr::asc(scalar)],
        ..select_column("a", "r")
    };
    for query in [in_group_by, in_order_by] {
        assert!(matches!(
            planner.make_plan(&query),
            Err(PlannerError::InvalidPlan(_))
        ));
    }
}

// ============ Config Tests ============

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"join_rewind": "reinitialize", "max_join_leaves": 8, "log_plans": true}}"#
    )
    .unwrap();

    let config = PlannerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.join_rewind, RewindStrategy::Reinitialize);
    assert_eq!(config.max_join_leaves, 8);
    assert!(config.log_plans);

    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::with_config(&storage, config);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::Inner)),
        ..SelectClause::select_all()
    };
    assert_eq!(sorted(run(&planner, &query)).len(), 2);
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = PlannerConfig::from_file(dir.path().join("planner.json"));
    assert!(matches!(result, Err(PlannerError::Config(_))));
}

// ============ Explain Tests ============

#[test]
fn test_explain_join_plan() {
    let storage = r_and_s();
    let planner = CostBasedJoinPlanner::new(&storage);
    let query = SelectClause {
        from: Some(r_join_s(JoinType::Inner)),
        ..SelectClause::select_all()
    };
    let plan = planner.make_plan(&query).unwrap();
    let text = ExplainOutput::format(&plan);

    assert!(text.starts_with("Project:"), "{}", text);
    assert!(text.contains("NestedLoopJoin: INNER on r.a = s.a"));
    assert!(text.contains("left:"));
    assert!(text.contains("right:"));
    assert!(text.contains("cost:"));
}
