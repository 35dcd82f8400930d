use super::ExecContext;
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, Sketch};
use crate::stream::{SketchUpdate, UpdateReceiver};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving end of a remote execution.
pub type WireReceiver = mpsc::Receiver<Result<WireUpdate>>;

/// Transport-level form of a [`SketchUpdate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUpdate {
    pub progress: f64,
    pub is_final: bool,
    pub value: serde_json::Value,
}

impl WireUpdate {
    pub fn encode<R: Serialize>(update: &SketchUpdate<R>) -> Result<Self> {
        Ok(Self {
            progress: update.progress(),
            is_final: update.is_final(),
            value: serde_json::to_value(update.value())?,
        })
    }

    pub fn decode<R: DeserializeOwned>(self) -> Result<SketchUpdate<R>> {
        let value = serde_json::from_value(self.value)?;
        Ok(if self.is_final {
            SketchUpdate::Final(value)
        } else {
            SketchUpdate::Partial {
                progress: self.progress,
                value,
            }
        })
    }
}

/// The narrow interface through which remote partitions are reached.
///
/// Implementations own the connection plumbing; the execution engine only submits requests
/// and consumes update streams. Dropping a [`WireReceiver`] abandons the remote execution.
pub trait Transport: Send + Sync + fmt::Debug {
    fn sketch(&self, request: OperationRequest) -> Result<WireReceiver>;

    /// Apply a registered map remotely; resolves to the transport of the mapped dataset.
    fn map(&self, request: OperationRequest) -> BoxFuture<'static, Result<Arc<dyn Transport>>>;

    fn flat_map(&self, request: OperationRequest)
        -> BoxFuture<'static, Result<Arc<dyn Transport>>>;
}

/// Partitions of type `T` living behind a [`Transport`].
pub struct RemoteDataSet<T> {
    transport: Arc<dyn Transport>,
    _partition: PhantomData<fn() -> T>,
}

impl<T> Clone for RemoteDataSet<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.transport))
    }
}

impl<T> fmt::Debug for RemoteDataSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDataSet")
            .field("transport", &self.transport)
            .finish()
    }
}

impl<T> RemoteDataSet<T> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            _partition: PhantomData,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl<T: 'static> RemoteDataSet<T> {
    pub(super) fn execute<S: Sketch<T>>(
        &self,
        sketch: Arc<S>,
        ctx: &ExecContext,
    ) -> UpdateReceiver<S::Output> {
        let (tx, rx) = mpsc::channel(ctx.capacity());
        let wire = sketch
            .request()
            .ok_or_else(|| {
                SketchError::Unsupported("sketch cannot be sent to a remote worker".to_string())
            })
            .and_then(|request| {
                log::debug!("submitting `{}` to {:?}", request.kind, self.transport);
                self.transport.sketch(request)
            });
        let mut wire = match wire {
            Ok(wire) => wire,
            Err(err) => {
                log::warn!("remote submission failed: {err}");
                let _ = tx.try_send(Err(err));
                return rx;
            }
        };

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    item = wire.recv() => item,
                    _ = tx.closed() => return,
                };
                let update = match item {
                    None => return,
                    Some(Ok(update)) => update.decode::<S::Output>(),
                    Some(Err(err)) => Err(SketchError::Remote(err.to_string())),
                };
                let terminal = !matches!(&update, Ok(SketchUpdate::Partial { .. }));
                if tx.send(update).await.is_err() || terminal {
                    return;
                }
            }
        });
        rx
    }

    pub(super) fn map<U: 'static>(
        &self,
        request: Option<OperationRequest>,
    ) -> BoxFuture<'static, Result<RemoteDataSet<U>>> {
        let transport = Arc::clone(&self.transport);
        async move {
            let request = request.ok_or_else(|| {
                SketchError::Unsupported("map cannot be sent to a remote worker".to_string())
            })?;
            let mapped = transport.map(request).await?;
            Ok(RemoteDataSet::new(mapped))
        }
        .boxed()
    }

    pub(super) fn flat_map<U: 'static>(
        &self,
        request: Option<OperationRequest>,
    ) -> BoxFuture<'static, Result<RemoteDataSet<U>>> {
        let transport = Arc::clone(&self.transport);
        async move {
            let request = request.ok_or_else(|| {
                SketchError::Unsupported("flat map cannot be sent to a remote worker".to_string())
            })?;
            let mapped = transport.flat_map(request).await?;
            Ok(RemoteDataSet::new(mapped))
        }
        .boxed()
    }
}
