use super::{DataSet, ExecContext};
use crate::error::{Result, SketchError};
use crate::sketch::Sketch;
use crate::stream::{SketchUpdate, UpdateReceiver, UpdateSender};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run `sketch` over every child and merge their streams through a balanced binary tree of
/// combiner tasks.
pub(super) fn execute<T, S>(
    children: &[DataSet<T>],
    sketch: Arc<S>,
    ctx: &ExecContext,
) -> UpdateReceiver<S::Output>
where
    T: Send + Sync + 'static,
    S: Sketch<T>,
{
    match children {
        [] => {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(Ok(SketchUpdate::Final(sketch.zero())));
            rx
        }
        [only] => only.execute(sketch, ctx),
        _ => {
            let (left, right) = children.split_at(children.len() / 2);
            let left = Side::new(execute(left, Arc::clone(&sketch), ctx), weight(left));
            let right = Side::new(execute(right, Arc::clone(&sketch), ctx), weight(right));
            let (tx, rx) = mpsc::channel(ctx.capacity());
            tokio::spawn(combine::<T, S>(left, right, sketch, tx, ctx.clone()));
            rx
        }
    }
}

fn weight<T>(children: &[DataSet<T>]) -> f64 {
    children
        .iter()
        .map(|child| child.partition_count().max(1))
        .sum::<usize>() as f64
}

/// Latest state of one input of a combiner.
struct Side<R> {
    rx: UpdateReceiver<R>,
    weight: f64,
    value: Option<R>,
    progress: f64,
    done: bool,
}

impl<R> Side<R> {
    fn new(rx: UpdateReceiver<R>, weight: f64) -> Self {
        Self {
            rx,
            weight,
            value: None,
            progress: 0.0,
            done: false,
        }
    }

    fn observe(&mut self, item: Option<Result<SketchUpdate<R>>>) -> Result<()> {
        match item {
            None => {
                self.done = true;
                Err(SketchError::Incomplete)
            }
            Some(Err(err)) => {
                self.done = true;
                Err(err)
            }
            Some(Ok(update)) => {
                self.progress = update.progress();
                self.done = update.is_final();
                self.value = Some(update.into_value());
                Ok(())
            }
        }
    }
}

async fn combine<T, S>(
    mut left: Side<S::Output>,
    mut right: Side<S::Output>,
    sketch: Arc<S>,
    tx: UpdateSender<S::Output>,
    ctx: ExecContext,
) where
    S: Sketch<T>,
{
    let total = left.weight + right.weight;
    while !(left.done && right.done) {
        let observed = tokio::select! {
            item = left.rx.recv(), if !left.done => left.observe(item),
            item = right.rx.recv(), if !right.done => right.observe(item),
            _ = tx.closed() => return,
        };

        let merged = match observed {
            Err(SketchError::Cancelled) => tokio::select! {
                cause = failure_cause(&mut left, &mut right) => Err(cause),
                _ = tx.closed() => return,
            },
            observed => observed.and_then(|()| match (&left.value, &right.value) {
                (Some(l), Some(r)) => sketch.add(l, r).map(Some).map_err(|err| {
                    log::warn!("combining partial results failed: {err}");
                    err
                }),
                _ => Ok(None),
            }),
        };

        let update = match merged {
            Ok(None) => continue,
            Ok(Some(value)) if left.done && right.done => SketchUpdate::Final(value),
            Ok(Some(value)) => SketchUpdate::Partial {
                progress: (left.progress * left.weight + right.progress * right.weight) / total,
                value,
            },
            Err(err) => {
                ctx.cancel.cancel();
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        if tx.send(Ok(update)).await.is_err() {
            return;
        }
    }
}

/// A cancelled input usually means some other partition failed and cancelled the execution.
/// Drain the still-open input so that failure, not the cancellation, is what gets reported.
async fn failure_cause<R>(left: &mut Side<R>, right: &mut Side<R>) -> SketchError {
    for side in [left, right] {
        while !side.done {
            match side.rx.recv().await {
                Some(Ok(update)) => side.done = update.is_final(),
                Some(Err(SketchError::Cancelled)) | None => side.done = true,
                Some(Err(err)) => return err,
            }
        }
    }
    SketchError::Cancelled
}
