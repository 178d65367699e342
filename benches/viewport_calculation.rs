use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use virtual_grid::model::{
    calculate_next_viewport, Axis, ClientSize, ColumnDescriptor, ContentSize, DimensionLedger,
    RowRecord, ScrollOffset, ValueType,
};

fn create_columns(count: usize) -> DimensionLedger<ColumnDescriptor> {
    let columns = (0..count)
        .map(|i| {
            // Mixed widths so offsets are not a simple multiple
            let width = 60.0 + (i % 7) as f64 * 12.0;
            ColumnDescriptor::new(i as u64, format!("col_{}", i), ValueType::Text, width)
        })
        .collect();
    DimensionLedger::from_items(Axis::Columns, columns)
}

fn create_rows(count: usize) -> DimensionLedger<RowRecord> {
    let rows = (0..count)
        .map(|i| {
            let height = if i % 10 == 0 { 44.0 } else { 22.0 };
            RowRecord::new(i as u64, (i + 1).to_string(), height, Vec::new())
        })
        .collect();
    DimensionLedger::from_items(Axis::Rows, rows)
}

fn benchmark_viewport(c: &mut Criterion) {
    let columns = create_columns(50);
    let client = ClientSize::new(1280.0, 720.0);

    let mut group = c.benchmark_group("calculate_next_viewport");

    for count in [10_000usize, 100_000, 1_000_000] {
        let rows = create_rows(count);
        let content = ContentSize::of(&columns, &rows);
        // Scroll to the middle of the dataset
        let scroll = ScrollOffset::new(content.width / 2.0, content.height / 2.0);

        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.iter(|| {
                let update = calculate_next_viewport(
                    None,
                    &columns,
                    rows,
                    black_box(scroll),
                    black_box(client),
                    content,
                );
                assert!(update.is_changed());
            });
        });
    }

    group.finish();
}

fn benchmark_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_resize");

    for count in [10_000usize, 100_000] {
        group.bench_function(BenchmarkId::new("first_row", count), |b| {
            let mut rows = create_rows(count);
            let mut toggle = false;
            b.iter(|| {
                toggle = !toggle;
                let height = if toggle { 30.0 } else { 22.0 };
                rows.resize(black_box(0), height).unwrap();
            });
        });

        group.bench_function(BenchmarkId::new("last_row", count), |b| {
            let mut rows = create_rows(count);
            b.iter(|| {
                rows.resize(black_box(count - 1), 30.0).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_viewport, benchmark_resize);
criterion_main!(benches);
