//! Intersect / except integration tests

mod common;

use std::sync::atomic::Ordering;

use cadence_core::prelude::{DataType, EngineConfig, ExecutionContext, Scalar};
use cadence_mem::MemoryBudgetImpl;
use cadence_operators::{RecordCursorFactory, SetOpFactory, SetOpKind};

use common::{column_table, drain, ordered_ts_long_table, FailingFactory, Tracked};

fn ints(values: &[i32]) -> Box<dyn RecordCursorFactory> {
    Box::new(column_table(
        DataType::Int32,
        values.iter().map(|&v| Scalar::I32(v)).collect(),
    ))
}

fn first_column(rows: Vec<Vec<Scalar>>) -> Vec<Scalar> {
    rows.into_iter().map(|mut r| r.remove(0)).collect()
}

#[test]
fn test_set_op_concrete_scenario() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    let ctx = ExecutionContext::new();

    for (kind, expected) in [
        (SetOpKind::Intersect, vec![Scalar::I32(2), Scalar::I32(3)]),
        (SetOpKind::Except, vec![Scalar::I32(1)]),
    ] {
        let mut factory =
            SetOpFactory::new(ints(&[1, 2, 3]), ints(&[2, 3, 4]), kind, &cfg, &budget).unwrap();
        assert_eq!(factory.kind(), kind);
        let mut cursor = factory.get_cursor(&ctx).unwrap();
        assert_eq!(first_column(drain(cursor.as_mut(), 1).unwrap()), expected);
    }
}

#[test]
fn test_intersect_and_except_partition_side_a() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    let ctx = ExecutionContext::new();
    let a: Vec<i32> = (0..1_000).map(|i| (i * 37) % 400).collect();
    let b: Vec<i32> = (0..300).map(|i| i * 2).collect();

    let mut intersect = SetOpFactory::intersect(ints(&a), ints(&b), &cfg, &budget).unwrap();
    let mut cursor = intersect.get_cursor(&ctx).unwrap();
    let kept = first_column(drain(cursor.as_mut(), 1).unwrap());
    drop(cursor);

    let mut except = SetOpFactory::except(ints(&a), ints(&b), &cfg, &budget).unwrap();
    let mut cursor = except.get_cursor(&ctx).unwrap();
    let dropped = first_column(drain(cursor.as_mut(), 1).unwrap());

    let mut seen = std::collections::HashSet::new();
    let distinct_a: Vec<i32> = a.iter().copied().filter(|v| seen.insert(*v)).collect();
    let expect_kept: Vec<Scalar> = distinct_a
        .iter()
        .filter(|v| b.contains(v))
        .map(|&v| Scalar::I32(v))
        .collect();
    let expect_dropped: Vec<Scalar> = distinct_a
        .iter()
        .filter(|v| !b.contains(v))
        .map(|&v| Scalar::I32(v))
        .collect();
    assert_eq!(kept, expect_kept);
    assert_eq!(dropped, expect_dropped);
}

#[test]
fn test_set_op_casts_heterogeneous_columns() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    let ctx = ExecutionContext::new();

    // SYMBOL against STRING.
    let symbols = column_table(
        DataType::Symbol,
        ["AAPL", "MSFT", "IBM"].iter().map(|s| Scalar::Str(s.to_string())).collect(),
    );
    let strings = column_table(
        DataType::Utf8,
        ["IBM", "AAPL", "ORCL"].iter().map(|s| Scalar::Str(s.to_string())).collect(),
    );
    let mut factory =
        SetOpFactory::intersect(Box::new(symbols), Box::new(strings), &cfg, &budget).unwrap();
    assert_eq!(factory.metadata().column_type(0), Some(DataType::Utf8));
    let mut cursor = factory.get_cursor(&ctx).unwrap();
    // The output column is text, not the input's dictionary.
    assert!(cursor.symbol_table(0).is_none());
    assert_eq!(
        first_column(drain(cursor.as_mut(), 1).unwrap()),
        vec![Scalar::Str("AAPL".into()), Scalar::Str("IBM".into())]
    );
    drop(cursor);

    // STRING timestamps against TIMESTAMP.
    let text_ts = column_table(
        DataType::Utf8,
        vec![
            Scalar::Str("1970-01-01T00:00:01".into()),
            Scalar::Str("1970-01-01T00:00:02".into()),
        ],
    );
    let real_ts = column_table(DataType::Timestamp, vec![Scalar::Ts(2_000_000)]);
    let mut factory =
        SetOpFactory::intersect(Box::new(real_ts), Box::new(text_ts), &cfg, &budget).unwrap();
    assert_eq!(factory.metadata().column_type(0), Some(DataType::Timestamp));
    let mut cursor = factory.get_cursor(&ctx).unwrap();
    assert_eq!(
        first_column(drain(cursor.as_mut(), 1).unwrap()),
        vec![Scalar::Ts(2_000_000)]
    );
}

#[test]
fn test_set_op_bad_text_timestamp_is_invalid_input() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    let ctx = ExecutionContext::new();
    let text_ts = column_table(DataType::Utf8, vec![Scalar::Str("soon".into())]);
    let real_ts = column_table(DataType::Timestamp, vec![Scalar::Ts(1)]);
    let mut factory =
        SetOpFactory::except(Box::new(real_ts), Box::new(text_ts), &cfg, &budget).unwrap();
    let err = factory.get_cursor(&ctx).err().expect("build must fail");
    assert!(err.to_string().contains("Invalid timestamp"));
    assert!(!err.is_cancellation());
}

#[test]
fn test_set_op_drops_side_b_after_build() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    let ctx = ExecutionContext::new();
    let a = Tracked::new(column_table(DataType::Int32, vec![Scalar::I32(1)]));
    let b = Tracked::new(column_table(DataType::Int32, vec![Scalar::I32(1)]));
    let live_a = a.live_cursors();
    let live_b = b.live_cursors();

    let mut factory = SetOpFactory::intersect(Box::new(a), Box::new(b), &cfg, &budget).unwrap();
    let mut cursor = factory.get_cursor(&ctx).unwrap();
    assert_eq!(live_a.load(Ordering::SeqCst), 1);
    assert_eq!(live_b.load(Ordering::SeqCst), 0);

    assert_eq!(drain(cursor.as_mut(), 1).unwrap().len(), 1);
    cursor.to_top().unwrap();
    assert_eq!(drain(cursor.as_mut(), 1).unwrap().len(), 1);
    drop(cursor);
    assert_eq!(live_a.load(Ordering::SeqCst), 0);
}

#[test]
fn test_set_op_releases_side_a_when_b_fails_to_bind() {
    let budget = MemoryBudgetImpl::unlimited();
    let a = Tracked::new(column_table(DataType::Int32, vec![Scalar::I32(1)]));
    let live = a.live_cursors();
    let b = FailingFactory::like(&column_table(DataType::Int32, vec![]));
    let mut factory =
        SetOpFactory::intersect(Box::new(a), Box::new(b), &EngineConfig::default(), &budget)
            .unwrap();
    assert!(factory.get_cursor(&ExecutionContext::new()).is_err());
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_set_op_reports_side_a_order() {
    let budget = MemoryBudgetImpl::unlimited();
    let cfg = EngineConfig::default();
    for descending in [false, true] {
        let factory = SetOpFactory::new(
            Box::new(ordered_ts_long_table(&[(3, 1), (2, 1)], descending)),
            Box::new(ordered_ts_long_table(&[(2, 1)], !descending)),
            SetOpKind::Intersect,
            &cfg,
            &budget,
        )
        .unwrap();
        assert_eq!(factory.has_descending_order(), descending);
    }
}
