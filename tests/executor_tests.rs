//! Executor integration tests

mod test_utils;

use std::sync::Arc;

use quarry::catalog::DataType;
use quarry::executor::{
    execute_plan, AggregateCall, AggregateFunction, CollectingSink, Datum, ExecutorError,
    NestedLoopJoin, NodeKind, PlanTree, TuplePrinter,
};
use quarry::planner::RewindStrategy;
use quarry::sql::{BinaryOp, Expr, JoinType, OrderByExpr, SelectValue};
use quarry::storage::{MemoryStorage, TupleFile};
use quarry::tuple;

use test_utils::{drain, int_column, ints, load, r_and_s, sorted};

fn scan(file: &Arc<dyn TupleFile>) -> PlanTree {
    PlanTree::file_scan(Arc::clone(file), None)
}

fn on_a() -> Option<Expr> {
    Some(Expr::eq(Expr::qualified("r", "a"), Expr::qualified("s", "a")))
}

// ============ Join Tests ============

#[test]
fn test_inner_join_example() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut plan = PlanTree::nested_loop_join(scan(&r), scan(&s), JoinType::Inner, on_a());
    let rows = drain(&mut plan);
    assert_eq!(
        rows,
        vec![tuple![1, "x", 1, "p"], tuple![2, "y", 2, "q"]]
    );
}

#[test]
fn test_cross_join_cardinality() {
    let storage = MemoryStorage::new();
    let left = int_column(&storage, "l", &[1, 2, 3, 4]);
    let right = load(
        &storage,
        "r",
        &[("w", DataType::Int)],
        vec![tuple![10], tuple![20], tuple![30]],
    );

    let mut plan = PlanTree::nested_loop_join(scan(&left), scan(&right), JoinType::Cross, None);
    assert_eq!(drain(&mut plan).len(), 12);

    let pred = Expr::binary(Expr::column("v"), BinaryOp::Gt, Expr::literal(2));
    let mut plan =
        PlanTree::nested_loop_join(scan(&left), scan(&right), JoinType::Inner, Some(pred));
    assert_eq!(drain(&mut plan).len(), 6);
}

#[test]
fn test_rewind_strategies_agree() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut results = Vec::new();
    for rewind in [RewindStrategy::Mark, RewindStrategy::Reinitialize] {
        // Limit cannot mark, so the Mark strategy needs a Materialize
        let right = scan(&s).limit_offset(0, 0);
        let join = NestedLoopJoin::new(JoinType::Inner, on_a()).with_rewind(rewind);
        let mut plan = PlanTree::join(scan(&r), right, join);
        plan.ensure_marking();
        let has_materialize = plan
            .nodes()
            .iter()
            .any(|n| n.operator().kind() == NodeKind::Materialize);
        assert_eq!(has_materialize, rewind == RewindStrategy::Mark);
        results.push(drain(&mut plan));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), 2);
}

#[test]
fn test_swap_twice_restores_schema() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut plan = PlanTree::nested_loop_join(scan(&r), scan(&s), JoinType::Inner, on_a());
    plan.prepare().unwrap();
    let before = plan.schema().unwrap().clone();
    let root = plan.root();

    plan.swap(root).unwrap();
    plan.prepare().unwrap();
    assert_eq!(plan.schema().unwrap(), &before);
    let swapped_rows = drain(&mut plan);

    plan.swap(root).unwrap();
    plan.prepare().unwrap();
    assert_eq!(plan.schema().unwrap(), &before);
    assert_eq!(sorted(drain(&mut plan)), sorted(swapped_rows));
}

#[test]
fn test_left_outer_join() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut plan = PlanTree::nested_loop_join(scan(&r), scan(&s), JoinType::LeftOuter, on_a());
    let rows = drain(&mut plan);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], tuple![3, "z", Datum::Null, Datum::Null]);
}

// ============ Sort and Limit Tests ============

#[test]
fn test_limit_offset_over_sorted_input() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[40, 10, 50, 30, 20]);
    let mut plan = scan(&file)
        .sort(vec![OrderByExpr::asc(Expr::column("v"))])
        .limit_offset(2, 1);
    assert_eq!(ints(&drain(&mut plan)), vec![vec![20], vec![30]]);
}

#[test]
fn test_sort_is_stable() {
    let storage = MemoryStorage::new();
    let file = load(
        &storage,
        "t",
        &[("k", DataType::Int), ("seq", DataType::Int)],
        vec![tuple![2, 0], tuple![1, 1], tuple![2, 2], tuple![1, 3]],
    );
    let mut plan = scan(&file).sort(vec![OrderByExpr::desc(Expr::column("k"))]);
    assert_eq!(
        ints(&drain(&mut plan)),
        vec![vec![2, 0], vec![2, 2], vec![1, 1], vec![1, 3]]
    );
}

#[test]
fn test_exhaustion_is_sticky() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[1, 2]);
    let mut plan = scan(&file)
        .filter(Some(Expr::binary(
            Expr::column("v"),
            BinaryOp::GtEq,
            Expr::literal(1),
        )))
        .sort(vec![OrderByExpr::asc(Expr::column("v"))]);
    assert_eq!(drain(&mut plan).len(), 2);
    for _ in 0..3 {
        assert!(plan.next_tuple().unwrap().is_none());
    }
    plan.initialize().unwrap();
    assert!(plan.next_tuple().unwrap().is_some());
}

// ============ Projection Tests ============

#[test]
fn test_trivial_projection_is_identity() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;

    let mut direct = scan(&r);
    let mut projected = scan(&r).project(vec![SelectValue::wildcard()]);
    let expected = drain(&mut direct);
    assert_eq!(drain(&mut projected), expected);
    assert_eq!(projected.schema(), direct.schema());
}

#[test]
fn test_projection_expressions() {
    let storage = r_and_s();
    let r = storage.table("r").unwrap() as Arc<dyn TupleFile>;

    let mut plan = scan(&r).project(vec![
        SelectValue::aliased(
            Expr::binary(Expr::column("a"), BinaryOp::Mul, Expr::literal(10)),
            "ten_a",
        ),
        SelectValue::expr(Expr::function("UPPER", vec![Expr::column("b")])),
    ]);
    let rows = drain(&mut plan);
    assert_eq!(rows[0], tuple![10, "X"]);
    let schema = plan.schema().unwrap();
    assert_eq!(schema.column(0).unwrap().name, "ten_a");
}

// ============ Grouping Tests ============

#[test]
fn test_grouping_empty_input() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[]);

    let mut plan = scan(&file).group_aggregate(
        vec![],
        vec![
            ("n".to_string(), AggregateCall::count_star()),
            (
                "total".to_string(),
                AggregateCall::new(AggregateFunction::Sum, Expr::column("v")),
            ),
        ],
    );
    assert_eq!(drain(&mut plan), vec![tuple![0, Datum::Null]]);

    let mut plan = scan(&file).group_aggregate(
        vec![Expr::column("v")],
        vec![("n".to_string(), AggregateCall::count_star())],
    );
    assert!(drain(&mut plan).is_empty());
}

#[test]
fn test_grouping_distinct_keys() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[5, 3, 5, 1, 3, 5, 7]);

    let mut plan = scan(&file).group_aggregate(
        vec![Expr::column("v")],
        vec![("n".to_string(), AggregateCall::count_star())],
    );
    let rows = drain(&mut plan);
    assert_eq!(rows.len(), 4);
    assert_eq!(
        ints(&sorted(rows)),
        vec![vec![1, 1], vec![3, 2], vec![5, 3], vec![7, 1]]
    );
}

// ============ Marking Tests ============

#[test]
fn test_marking_misuse() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[1, 2, 3]);

    let mut plan = scan(&file);
    plan.prepare().unwrap();
    plan.initialize().unwrap();
    assert!(matches!(
        plan.reset_to_last_mark(),
        Err(ExecutorError::NoMark(_))
    ));
    assert!(matches!(
        plan.mark_current_position(),
        Err(ExecutorError::NoCurrentTuple(_))
    ));

    plan.next_tuple().unwrap();
    plan.mark_current_position().unwrap();
    plan.next_tuple().unwrap();
    plan.reset_to_last_mark().unwrap();
    assert_eq!(ints(&[plan.next_tuple().unwrap().unwrap()]), vec![vec![1]]);

    let mut limited = scan(&file).limit_offset(2, 0);
    drain(&mut limited);
    assert!(matches!(
        limited.mark_current_position(),
        Err(ExecutorError::MarkingUnsupported(_))
    ));
}

#[test]
fn test_initialize_requires_prepare() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[1]);
    let mut plan = scan(&file).materialize();
    assert!(matches!(
        plan.initialize(),
        Err(ExecutorError::NotPrepared(_))
    ));
}

// ============ Driver Tests ============

#[test]
fn test_execute_plan_collects() {
    test_utils::init_tracing();
    let storage = r_and_s();
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut plan = scan(&s);
    let mut sink = CollectingSink::new();
    let stats = execute_plan(&mut plan, &mut sink).unwrap();
    assert_eq!(stats.rows_produced, 2);
    assert!(sink.is_finished());
    assert_eq!(sink.schema().unwrap().len(), 2);
    assert_eq!(sink.into_tuples(), vec![tuple![1, "p"], tuple![2, "q"]]);
}

#[test]
fn test_execute_plan_prints() {
    let storage = r_and_s();
    let s = storage.table("s").unwrap() as Arc<dyn TupleFile>;

    let mut plan = scan(&s).limit_offset(1, 0);
    let mut printer = TuplePrinter::new(Vec::new());
    execute_plan(&mut plan, &mut printer).unwrap();
    let text = String::from_utf8(printer.into_inner()).unwrap();
    assert_eq!(text, "s.a | s.c\n1 | p\n(1 row)\n");
}

#[test]
fn test_execute_plan_reports_errors() {
    let storage = MemoryStorage::new();
    let file = int_column(&storage, "t", &[1, 0]);
    let pred = Expr::binary(
        Expr::binary(Expr::literal(1), BinaryOp::Div, Expr::column("v")),
        BinaryOp::Gt,
        Expr::literal(0),
    );
    let mut plan = scan(&file).filter(Some(pred));
    let mut sink = CollectingSink::new();
    assert!(execute_plan(&mut plan, &mut sink).is_err());
    assert_eq!(sink.tuples().len(), 1);
    assert!(!sink.is_finished());
}
