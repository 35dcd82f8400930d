mod common;

use common::{range_table, split_dataset, CountingSketch, DelayedSketch};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use prism_columnar::{Column, ColumnDescription, ColumnKind, Schema, Table};
use prism_dataset::{
    AggregateSource, BucketsDescription, DataSet, ExecutionOptions, HeatmapSketch,
    HistogramSketch, Result, Sketch, SketchError, SketchUpdate, SummarySketch, TableSummary,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn histogram_sketch() -> HistogramSketch {
    HistogramSketch::new("v", BucketsDescription::new(0.0, 100.0, 10).unwrap())
}

#[tokio::test]
async fn partitioned_histogram_matches_single_partition() {
    let sketch = Arc::new(histogram_sketch());
    let single = DataSet::local(range_table(0, 100));
    let split = split_dataset(&[10, 20, 30, 40]);

    let expected = single.sketch_final(Arc::clone(&sketch)).await.unwrap();
    let actual = split.sketch_final(sketch).await.unwrap();
    assert_eq!(actual, expected);
    assert_eq!(actual.counts, vec![10; 10]);
}

#[tokio::test]
async fn result_does_not_depend_on_tree_shape() {
    let sketch = Arc::new(DelayedSketch::new(
        HeatmapSketch::new(
            "v",
            BucketsDescription::new(0.0, 60.0, 6).unwrap(),
            "k",
            BucketsDescription::new(0.0, 7.0, 7).unwrap(),
        ),
        5,
    ));

    let flat = split_dataset(&[5, 5, 10, 10, 15, 15]);
    let nested = DataSet::parallel(vec![
        DataSet::local(range_table(0, 5)),
        DataSet::parallel(vec![
            DataSet::parallel(vec![DataSet::local(range_table(5, 5))]),
            DataSet::local(range_table(10, 10)),
            DataSet::parallel(vec![]),
        ]),
        DataSet::parallel(vec![
            DataSet::local(range_table(20, 10)),
            DataSet::local(range_table(30, 15)),
            DataSet::local(range_table(45, 15)),
        ]),
    ]);

    let a = flat.sketch_final(Arc::clone(&sketch)).await.unwrap();
    let b = nested.sketch_final(sketch).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.counts.iter().sum::<u64>(), 60);
}

#[tokio::test]
async fn empty_parallel_node_yields_zero() {
    let empty: DataSet<Table> = DataSet::parallel(vec![]);
    let summary = empty.sketch_final(Arc::new(SummarySketch)).await.unwrap();
    assert_eq!(summary, TableSummary::default());
}

#[tokio::test]
async fn summaries_combine_across_partitions() {
    let summary = split_dataset(&[10, 5])
        .sketch_final(Arc::new(SummarySketch))
        .await
        .unwrap();
    assert_eq!(summary.row_count, 15);
    assert_eq!(summary.schema.as_ref(), Some(range_table(0, 1).schema()));
}

#[tokio::test]
async fn schema_mismatch_fails_the_execution() {
    let other = Table::with_all_rows(vec![Column::strings("v", &["x"])]).unwrap();
    let dataset = DataSet::parallel(vec![
        DataSet::local(range_table(0, 10)),
        DataSet::local(other),
    ]);
    let err = dataset
        .sketch_final(Arc::new(SummarySketch))
        .await
        .unwrap_err();
    assert!(matches!(err, SketchError::Combine(_)), "{err}");
}

#[tokio::test]
async fn child_failure_fails_the_execution() {
    let no_v = Table::with_all_rows(vec![Column::integers("k", vec![1, 2])]).unwrap();
    let dataset = DataSet::parallel(vec![
        DataSet::local(range_table(0, 10)),
        DataSet::local(range_table(10, 10)),
        DataSet::local(no_v),
    ]);
    let err = dataset
        .sketch_final(Arc::new(histogram_sketch()))
        .await
        .unwrap_err();
    assert!(matches!(err, SketchError::Table(_)), "{err}");
}

struct Exploding;

impl Sketch<Table> for Exploding {
    type Output = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn add(&self, left: &u64, right: &u64) -> Result<u64> {
        Ok(left + right)
    }

    fn create(&self, table: &Table) -> Result<u64> {
        if table.row_count() == 3 {
            panic!("cannot handle three rows");
        }
        Ok(table.row_count() as u64)
    }
}

#[tokio::test]
async fn panicking_partition_is_a_local_error() {
    let err = split_dataset(&[2, 3, 4])
        .sketch_final(Arc::new(Exploding))
        .await
        .unwrap_err();
    match err {
        SketchError::Local(msg) => assert!(msg.contains("three rows")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn streams_partials_then_one_final() {
    let dataset = split_dataset(&[10, 10, 10, 10, 10]);
    let sketch = Arc::new(DelayedSketch::new(histogram_sketch(), 10));
    let mut stream = dataset.sketch(sketch, &ExecutionOptions::default());

    let mut updates = Vec::new();
    while let Some(update) = stream.next().await {
        updates.push(update.unwrap());
    }

    let (last, partials) = updates.split_last().unwrap();
    assert!(last.is_final());
    assert_eq!(last.value().in_range(), 50);
    assert!(!partials.is_empty());

    let mut previous = 0.0;
    for update in partials {
        assert!(!update.is_final());
        let progress = update.progress();
        assert!((0.0..=1.0).contains(&progress));
        assert!(progress >= previous);
        previous = progress;
        assert!(update.value().in_range() <= 50);
    }
}

#[tokio::test]
async fn emit_zero_off_still_finishes() {
    let options = ExecutionOptions {
        emit_zero: false,
        channel_capacity: 1,
    };
    let mut stream = DataSet::local(range_table(0, 4)).sketch(Arc::new(SummarySketch), &options);
    let first = stream.next_update().await.unwrap().unwrap();
    assert!(matches!(first, SketchUpdate::Final(ref s) if s.row_count == 4));
    assert!(stream.next_update().await.is_none());
}

#[tokio::test]
async fn cancelled_stream_stops_early() {
    let counting = CountingSketch::default();
    let created = Arc::clone(&counting.created);
    let sketch = Arc::new(DelayedSketch::new(counting, 20));
    let sizes = vec![1; 256];
    let dataset = split_dataset(&sizes);

    let mut stream = dataset.sketch(sketch, &ExecutionOptions::default());
    let first = stream.next_update().await.unwrap().unwrap();
    assert!(!first.is_final());
    stream.cancel();
    assert!(stream.is_cancelled());
    assert!(stream.next_update().await.is_none());

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(created.load(Ordering::SeqCst) < 256);
}

#[test]
fn blocking_sketch_outside_a_runtime() {
    let summary = split_dataset(&[3, 4])
        .blocking_sketch(Arc::new(SummarySketch))
        .unwrap();
    assert_eq!(summary.row_count, 7);
}

#[test]
fn streaming_requires_a_runtime() {
    let stream = DataSet::local(range_table(0, 1))
        .sketch(Arc::new(SummarySketch), &ExecutionOptions::default());
    let outcome = futures::executor::block_on(stream.final_result());
    assert!(matches!(outcome, Err(SketchError::Unsupported(_))));
}

#[tokio::test]
async fn aggregate_sources_combine_like_tables() {
    let sketch = Arc::new(histogram_sketch());
    let sources: Vec<DataSet<Arc<dyn AggregateSource>>> = [(0, 30), (30, 70)]
        .into_iter()
        .map(|(start, len)| {
            let source: Arc<dyn AggregateSource> = Arc::new(range_table(start, len));
            DataSet::local(source)
        })
        .collect();
    let from_sources = DataSet::parallel(sources)
        .sketch_final(Arc::clone(&sketch))
        .await
        .unwrap();
    let from_tables = split_dataset(&[30, 70]).sketch_final(sketch).await.unwrap();
    assert_eq!(from_sources, from_tables);

    let source: Arc<dyn AggregateSource> = Arc::new(range_table(0, 5));
    let summary = DataSet::local(source)
        .sketch_final(Arc::new(SummarySketch))
        .await
        .unwrap();
    let schema = Schema::new(vec![
        ColumnDescription::new("v", ColumnKind::Double),
        ColumnDescription::new("k", ColumnKind::Integer),
    ])
    .unwrap();
    assert_eq!(summary, TableSummary::new(schema, 5));
}
