//! Progressive result streams.
//!
//! An execution produces a sequence of [`SketchUpdate::Partial`] values, each covering more of
//! the data than the last, terminated by exactly one [`SketchUpdate::Final`] or by an error.

use crate::error::{Result, SketchError};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub(crate) type UpdateSender<R> = mpsc::Sender<Result<SketchUpdate<R>>>;
pub(crate) type UpdateReceiver<R> = mpsc::Receiver<Result<SketchUpdate<R>>>;

/// One emission of a running execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SketchUpdate<R> {
    /// A best-effort intermediate value; `progress` is the completed fraction in `[0, 1]`.
    Partial { progress: f64, value: R },
    /// The fully combined result. Nothing follows it.
    Final(R),
}

impl<R> SketchUpdate<R> {
    pub fn value(&self) -> &R {
        match self {
            Self::Partial { value, .. } | Self::Final(value) => value,
        }
    }

    pub fn into_value(self) -> R {
        match self {
            Self::Partial { value, .. } | Self::Final(value) => value,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    pub fn progress(&self) -> f64 {
        match self {
            Self::Partial { progress, .. } => *progress,
            Self::Final(_) => 1.0,
        }
    }
}

/// Shared stop signal for every task of one execution.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Consumer end of an execution.
///
/// Dropping the stream (or calling [`ResultStream::cancel`]) signals every outstanding task of
/// the execution to stop.
#[derive(Debug)]
pub struct ResultStream<R> {
    rx: UpdateReceiver<R>,
    cancel: CancellationToken,
    finished: bool,
}

impl<R> ResultStream<R> {
    pub(crate) fn new(rx: UpdateReceiver<R>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            finished: false,
        }
    }

    /// A stream that yields `err` and ends.
    pub(crate) fn failed(err: SketchError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // A fresh channel with capacity 1 always has room.
        let _ = tx.try_send(Err(err));
        Self::new(rx, CancellationToken::new())
    }

    /// The next emission, or `None` after the terminal one.
    pub async fn next_update(&mut self) -> Option<Result<SketchUpdate<R>>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        self.observe(&item);
        item
    }

    /// Skip intermediate values and wait for the terminal outcome.
    pub async fn final_result(mut self) -> Result<R> {
        while let Some(item) = self.next_update().await {
            if let SketchUpdate::Final(value) = item? {
                return Ok(value);
            }
        }
        Err(SketchError::Incomplete)
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        self.finished = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn observe(&mut self, item: &Option<Result<SketchUpdate<R>>>) {
        match item {
            Some(Ok(SketchUpdate::Partial { .. })) => {}
            Some(Ok(SketchUpdate::Final(_))) | Some(Err(_)) | None => self.finished = true,
        }
    }
}

impl<R> Stream for ResultStream<R> {
    type Item = Result<SketchUpdate<R>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        let item = futures::ready!(this.rx.poll_recv(cx));
        this.observe(&item);
        Poll::Ready(item)
    }
}

impl<R> Drop for ResultStream<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
