use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cadence_core::config::MapConfig;
use cadence_core::prelude::{
    DataType, EngineConfig, ExecutionContext, Field, RecordMetadata, Scalar, Schema,
};
use cadence_mem::{FastMap, MemoryBudgetImpl};
use cadence_operators::{
    ColumnFilter, DistinctTimeSeriesFactory, InMemoryTable, LtJoinLightFactory, RecordCursor,
    RecordCursorFactory, SetOpFactory,
};

fn make_table(rows: usize, run: usize, keys: usize) -> InMemoryTable {
    let metadata = RecordMetadata::new(
        Schema::new(vec![
            Field::new("ts", DataType::Timestamp, false),
            Field::new("sym", DataType::Symbol, true),
            Field::new("price", DataType::Float64, true),
        ]),
        Some(0),
    )
    .unwrap();
    let symbols: Vec<String> = (0..keys).map(|k| format!("sym-{k}")).collect();
    InMemoryTable::builder(metadata)
        .symbols(1, symbols)
        .unwrap()
        .rows((0..rows).map(|i| {
            vec![
                Scalar::Ts((i / run) as i64),
                Scalar::Sym((i % keys) as i32),
                Scalar::F64((i % 7) as f64),
            ]
        }))
        .unwrap()
        .build()
}

fn count(cursor: &mut dyn RecordCursor) -> usize {
    let mut n = 0;
    while cursor.has_next().unwrap() {
        n += 1;
    }
    n
}

fn bench_map_create(c: &mut Criterion) {
    let budget = MemoryBudgetImpl::new(256 * 1024 * 1024);
    let mut map = FastMap::new(MapConfig::default(), 8, &budget).unwrap();
    c.bench_function("map_create_value_100k", |b| {
        b.iter(|| {
            map.clear();
            for i in 0..100_000i64 {
                let mut key = map.with_key();
                key.put_long(i % 10_000);
                key.create_value().unwrap().add_long(0, 1).unwrap();
            }
            black_box(map.size())
        })
    });
}

fn bench_distinct(c: &mut Criterion) {
    let budget = MemoryBudgetImpl::new(256 * 1024 * 1024);
    let mut factory = DistinctTimeSeriesFactory::new(
        Box::new(make_table(100_000, 16, 8)),
        &ColumnFilter::All,
        &EngineConfig::default(),
        &budget,
    )
    .unwrap();
    let ctx = ExecutionContext::new();
    c.bench_function("distinct_timeseries_100k", |b| {
        b.iter(|| {
            let mut cursor = factory.get_cursor(&ctx).unwrap();
            black_box(count(cursor.as_mut()))
        })
    });
}

fn bench_lt_join(c: &mut Criterion) {
    let budget = MemoryBudgetImpl::new(256 * 1024 * 1024);
    let key = ColumnFilter::columns([1]);
    let mut factory = LtJoinLightFactory::new(
        Box::new(make_table(50_000, 3, 32)),
        Box::new(make_table(100_000, 2, 32)),
        &key,
        &key,
        &EngineConfig::default(),
        &budget,
    )
    .unwrap();
    let ctx = ExecutionContext::new();
    c.bench_function("lt_join_50k_x_100k", |b| {
        b.iter(|| {
            let mut cursor = factory.get_cursor(&ctx).unwrap();
            black_box(count(cursor.as_mut()))
        })
    });
}

fn bench_intersect(c: &mut Criterion) {
    let budget = MemoryBudgetImpl::new(256 * 1024 * 1024);
    let mut factory = SetOpFactory::intersect(
        Box::new(make_table(50_000, 1, 64)),
        Box::new(make_table(50_000, 2, 64)),
        &EngineConfig::default(),
        &budget,
    )
    .unwrap();
    let ctx = ExecutionContext::new();
    c.bench_function("intersect_50k", |b| {
        b.iter(|| {
            let mut cursor = factory.get_cursor(&ctx).unwrap();
            black_box(count(cursor.as_mut()))
        })
    });
}

criterion_group!(
    operators,
    bench_map_create,
    bench_distinct,
    bench_lt_join,
    bench_intersect
);
criterion_main!(operators);
