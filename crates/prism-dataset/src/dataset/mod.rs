//! Dataset trees and sketch execution over them.

mod local;
mod parallel;
mod remote;

pub use remote::{RemoteDataSet, Transport, WireReceiver, WireUpdate};

use crate::error::{Result, SketchError};
use crate::parallel::run_local;
use crate::sketch::{PartitionFlatMap, PartitionMap, Sketch};
use crate::stream::{CancellationToken, ResultStream, UpdateReceiver};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Knobs for one sketch execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Emit a synthetic `Partial(zero)` from every leaf before computing, so callers see
    /// progress immediately.
    pub emit_zero: bool,
    /// Capacity of the channel between each pair of tasks.
    pub channel_capacity: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            emit_zero: true,
            channel_capacity: 16,
        }
    }
}

/// State shared by every task of one execution.
#[derive(Clone, Debug)]
pub(crate) struct ExecContext {
    pub(crate) options: ExecutionOptions,
    pub(crate) cancel: CancellationToken,
}

impl ExecContext {
    pub(crate) fn capacity(&self) -> usize {
        self.options.channel_capacity.max(1)
    }
}

/// A tree of data partitions.
///
/// Trees are immutable and cheap to clone; partitions are shared, never copied. Any number of
/// executions may run over the same tree concurrently.
pub enum DataSet<T> {
    /// Exactly one in-memory partition.
    Local(Arc<T>),
    /// An ordered list of children, each local, parallel or remote.
    Parallel(Vec<DataSet<T>>),
    /// Partitions owned by a worker reached through a [`Transport`].
    Remote(RemoteDataSet<T>),
}

impl<T> Clone for DataSet<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Local(data) => Self::Local(Arc::clone(data)),
            Self::Parallel(children) => Self::Parallel(children.clone()),
            Self::Remote(remote) => Self::Remote(remote.clone()),
        }
    }
}

impl<T> fmt::Debug for DataSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local"),
            Self::Parallel(children) => f.debug_tuple("Parallel").field(children).finish(),
            Self::Remote(remote) => f.debug_tuple("Remote").field(remote).finish(),
        }
    }
}

impl<T> DataSet<T> {
    pub fn local(data: T) -> Self {
        Self::Local(Arc::new(data))
    }

    pub fn from_arc(data: Arc<T>) -> Self {
        Self::Local(data)
    }

    pub fn parallel(children: Vec<DataSet<T>>) -> Self {
        Self::Parallel(children)
    }

    pub fn remote(transport: Arc<dyn Transport>) -> Self {
        Self::Remote(RemoteDataSet::new(transport))
    }

    /// Number of leaves in the tree; a remote child counts as one.
    pub fn partition_count(&self) -> usize {
        match self {
            Self::Local(_) | Self::Remote(_) => 1,
            Self::Parallel(children) => children.iter().map(DataSet::partition_count).sum(),
        }
    }
}

impl<T: Send + Sync + 'static> DataSet<T> {
    /// Start running `sketch` over every partition.
    ///
    /// Must be called from within a tokio runtime; otherwise the returned stream yields a single
    /// [`SketchError::Unsupported`].
    pub fn sketch<S: Sketch<T>>(
        &self,
        sketch: Arc<S>,
        options: &ExecutionOptions,
    ) -> ResultStream<S::Output> {
        if tokio::runtime::Handle::try_current().is_err() {
            return ResultStream::failed(SketchError::Unsupported(
                "sketch execution requires a tokio runtime".to_string(),
            ));
        }
        let ctx = ExecContext {
            options: options.clone(),
            cancel: CancellationToken::new(),
        };
        log::debug!(
            "starting sketch over {} partition(s)",
            self.partition_count()
        );
        let rx = self.execute(sketch, &ctx);
        ResultStream::new(rx, ctx.cancel)
    }

    /// Run `sketch` and wait for the fully combined result only.
    pub async fn sketch_final<S: Sketch<T>>(&self, sketch: Arc<S>) -> Result<S::Output> {
        let options = ExecutionOptions {
            emit_zero: false,
            ..ExecutionOptions::default()
        };
        let result = self.sketch(sketch, &options).final_result().await;
        log::debug!("sketch finished: ok={}", result.is_ok());
        result
    }

    /// Synchronous [`DataSet::sketch_final`].
    ///
    /// Blocks on a private runtime, or in place on a multi-thread runtime. Inside async code
    /// prefer `sketch_final(..).await`; on a current-thread runtime this fails with
    /// [`SketchError::Unsupported`].
    pub fn blocking_sketch<S: Sketch<T>>(&self, sketch: Arc<S>) -> Result<S::Output> {
        block_on(self.sketch_final(sketch))
    }

    /// Apply `mapper` to every local partition, keeping the tree shape.
    pub fn map<U, M>(&self, mapper: Arc<M>) -> BoxFuture<'static, Result<DataSet<U>>>
    where
        U: Send + Sync + 'static,
        M: PartitionMap<T, U>,
    {
        let node = self.clone();
        async move {
            match node {
                Self::Local(data) => {
                    let mapped =
                        run_local(&CancellationToken::new(), move || mapper.apply(&data)).await?;
                    Ok(DataSet::Local(Arc::new(mapped)))
                }
                Self::Parallel(children) => {
                    let mapped =
                        try_join_all(children.iter().map(|child| child.map(Arc::clone(&mapper))))
                            .await?;
                    Ok(DataSet::Parallel(mapped))
                }
                Self::Remote(remote) => Ok(DataSet::Remote(remote.map(mapper.request()).await?)),
            }
        }
        .boxed()
    }

    /// Replace every local partition by zero or more new partitions.
    ///
    /// A partition mapped to exactly one value stays a leaf; any other count becomes a
    /// parallel node over the new leaves.
    pub fn flat_map<U, M>(&self, mapper: Arc<M>) -> BoxFuture<'static, Result<DataSet<U>>>
    where
        U: Send + Sync + 'static,
        M: PartitionFlatMap<T, U>,
    {
        let node = self.clone();
        async move {
            match node {
                Self::Local(data) => {
                    let mut parts =
                        run_local(&CancellationToken::new(), move || mapper.apply(&data)).await?;
                    if parts.len() == 1 {
                        if let Some(part) = parts.pop() {
                            return Ok(DataSet::local(part));
                        }
                    }
                    Ok(DataSet::Parallel(
                        parts.into_iter().map(DataSet::local).collect(),
                    ))
                }
                Self::Parallel(children) => {
                    let mapped = try_join_all(
                        children
                            .iter()
                            .map(|child| child.flat_map(Arc::clone(&mapper))),
                    )
                    .await?;
                    Ok(DataSet::Parallel(mapped))
                }
                Self::Remote(remote) => {
                    Ok(DataSet::Remote(remote.flat_map(mapper.request()).await?))
                }
            }
        }
        .boxed()
    }

    pub fn blocking_map<U, M>(&self, mapper: Arc<M>) -> Result<DataSet<U>>
    where
        U: Send + Sync + 'static,
        M: PartitionMap<T, U>,
    {
        block_on(self.map(mapper))
    }

    pub fn blocking_flat_map<U, M>(&self, mapper: Arc<M>) -> Result<DataSet<U>>
    where
        U: Send + Sync + 'static,
        M: PartitionFlatMap<T, U>,
    {
        block_on(self.flat_map(mapper))
    }

    pub(crate) fn execute<S: Sketch<T>>(
        &self,
        sketch: Arc<S>,
        ctx: &ExecContext,
    ) -> UpdateReceiver<S::Output> {
        match self {
            Self::Local(data) => local::execute(Arc::clone(data), sketch, ctx),
            Self::Parallel(children) => parallel::execute(children, sketch, ctx),
            Self::Remote(remote) => remote.execute(sketch, ctx),
        }
    }
}

/// Drives `future` to completion from synchronous code.
///
/// Outside a runtime a private current-thread runtime is used. On a multi-thread runtime the
/// worker is handed over with `block_in_place`. A current-thread runtime cannot block without
/// deadlocking, so the call fails with [`SketchError::Unsupported`]; await the async form there.
fn block_on<R>(future: impl Future<Output = Result<R>>) -> Result<R> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return match handle.runtime_flavor() {
            tokio::runtime::RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => Err(SketchError::Unsupported(
                "blocking calls cannot run on a current-thread runtime; await the async form"
                    .to_string(),
            )),
        };
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| SketchError::Unsupported(format!("cannot start runtime: {err}")))?;
    runtime.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_count_counts_leaves() {
        let tree = DataSet::parallel(vec![
            DataSet::local(1u32),
            DataSet::parallel(vec![DataSet::local(2), DataSet::local(3)]),
            DataSet::parallel(vec![]),
        ]);
        assert_eq!(tree.partition_count(), 3);
    }

    struct Count;

    impl Sketch<u32> for Count {
        type Output = u64;
        fn zero(&self) -> u64 {
            0
        }
        fn add(&self, a: &u64, b: &u64) -> Result<u64> {
            Ok(a + b)
        }
        fn create(&self, _: &u32) -> Result<u64> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn blocking_calls_refuse_a_current_thread_runtime() {
        let err = DataSet::local(1u32)
            .blocking_sketch(Arc::new(Count))
            .unwrap_err();
        assert!(matches!(err, SketchError::Unsupported(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_calls_block_in_place_on_a_multi_thread_runtime() {
        let tree = DataSet::parallel(vec![DataSet::local(1u32), DataSet::local(2u32)]);
        assert_eq!(tree.blocking_sketch(Arc::new(Count)).unwrap(), 2);
    }
}
