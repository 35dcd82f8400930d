use super::ExecContext;
use crate::error::SketchError;
use crate::parallel::run_local;
use crate::sketch::Sketch;
use crate::stream::{SketchUpdate, UpdateReceiver};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run `sketch` over one in-memory partition.
///
/// Emits an optional `Partial(zero)` and then exactly one `Final` or error.
pub(super) fn execute<T, S>(
    data: Arc<T>,
    sketch: Arc<S>,
    ctx: &ExecContext,
) -> UpdateReceiver<S::Output>
where
    T: Send + Sync + 'static,
    S: Sketch<T>,
{
    let (tx, rx) = mpsc::channel(ctx.capacity());
    let cancel = ctx.cancel.clone();
    let emit_zero = ctx.options.emit_zero;

    tokio::spawn(async move {
        if emit_zero {
            let zero = SketchUpdate::Partial {
                progress: 0.0,
                value: sketch.zero(),
            };
            if tx.send(Ok(zero)).await.is_err() {
                return;
            }
        }

        let outcome = tokio::select! {
            outcome = run_local(&cancel, move || sketch.create(&data)) => outcome,
            _ = tx.closed() => return,
        };

        let update = match outcome {
            Ok(value) => Ok(SketchUpdate::Final(value)),
            Err(SketchError::Cancelled) => Err(SketchError::Cancelled),
            Err(err) => {
                log::warn!("partition computation failed: {err}");
                Err(err)
            }
        };
        let _ = tx.send(update).await;
    });
    rx
}
