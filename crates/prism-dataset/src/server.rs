//! Worker side of the transport boundary.
//!
//! A [`SketchServer`] owns a local dataset and answers [`OperationRequest`]s by decoding them
//! through a [`SketchRegistry`]. Wrapped in an `Arc` it is itself a [`Transport`], which gives an
//! in-process loopback for remote execution.

use crate::dataset::{DataSet, ExecutionOptions, Transport, WireReceiver, WireUpdate};
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, PartitionFlatMap, PartitionMap, Sketch};
use crate::stream::ResultStream;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

type SketchRunner<T> = Box<
    dyn Fn(&DataSet<T>, &OperationRequest, &ExecutionOptions) -> Result<WireReceiver>
        + Send
        + Sync,
>;
type MapRunner<T> = Box<
    dyn Fn(&DataSet<T>, &OperationRequest) -> Result<BoxFuture<'static, Result<DataSet<T>>>>
        + Send
        + Sync,
>;

/// Operation kinds a worker knows how to decode.
pub struct SketchRegistry<T> {
    sketches: HashMap<String, SketchRunner<T>>,
    maps: HashMap<String, MapRunner<T>>,
    flat_maps: HashMap<String, MapRunner<T>>,
}

impl<T> Default for SketchRegistry<T> {
    fn default() -> Self {
        Self {
            sketches: HashMap::new(),
            maps: HashMap::new(),
            flat_maps: HashMap::new(),
        }
    }
}

impl<T> fmt::Debug for SketchRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sketches: Vec<_> = self.sketches.keys().collect();
        let mut maps: Vec<_> = self.maps.keys().chain(self.flat_maps.keys()).collect();
        sketches.sort();
        maps.sort();
        f.debug_struct("SketchRegistry")
            .field("sketches", &sketches)
            .field("maps", &maps)
            .finish()
    }
}

impl<T: Send + Sync + 'static> SketchRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept requests of `kind` as sketches of type `S`.
    pub fn register_sketch<S>(&mut self, kind: &str)
    where
        S: Sketch<T> + DeserializeOwned,
    {
        let runner: SketchRunner<T> = Box::new(
            |data: &DataSet<T>, request: &OperationRequest, options: &ExecutionOptions| {
                let sketch: S = request.decode()?;
                let stream = data.sketch(Arc::new(sketch), options);
                Ok(forward_to_wire(stream, options.channel_capacity))
            },
        );
        self.sketches.insert(kind.to_string(), runner);
    }

    pub fn register_map<M>(&mut self, kind: &str)
    where
        M: PartitionMap<T, T> + DeserializeOwned,
    {
        let runner: MapRunner<T> = Box::new(|data: &DataSet<T>, request: &OperationRequest| {
            let mapper: M = request.decode()?;
            Ok(data.map(Arc::new(mapper)))
        });
        self.maps.insert(kind.to_string(), runner);
    }

    pub fn register_flat_map<M>(&mut self, kind: &str)
    where
        M: PartitionFlatMap<T, T> + DeserializeOwned,
    {
        let runner: MapRunner<T> = Box::new(|data: &DataSet<T>, request: &OperationRequest| {
            let mapper: M = request.decode()?;
            Ok(data.flat_map(Arc::new(mapper)))
        });
        self.flat_maps.insert(kind.to_string(), runner);
    }

    pub fn has_sketch(&self, kind: &str) -> bool {
        self.sketches.contains_key(kind)
    }

    pub fn has_map(&self, kind: &str) -> bool {
        self.maps.contains_key(kind) || self.flat_maps.contains_key(kind)
    }
}

/// Serves sketch and map requests over one local dataset.
pub struct SketchServer<T> {
    data: DataSet<T>,
    registry: Arc<SketchRegistry<T>>,
    options: ExecutionOptions,
}

impl<T> fmt::Debug for SketchServer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SketchServer")
            .field("partitions", &self.data.partition_count())
            .field("registry", &self.registry)
            .finish()
    }
}

impl<T: Send + Sync + 'static> SketchServer<T> {
    pub fn new(data: DataSet<T>, registry: Arc<SketchRegistry<T>>) -> Self {
        Self {
            data,
            registry,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn data(&self) -> &DataSet<T> {
        &self.data
    }

    pub fn into_transport(self) -> Arc<dyn Transport> {
        Arc::new(self)
    }

    fn derived(
        &self,
        runners: &HashMap<String, MapRunner<T>>,
        request: OperationRequest,
    ) -> BoxFuture<'static, Result<Arc<dyn Transport>>> {
        log::debug!("serving map `{}`", request.kind);
        let registry = Arc::clone(&self.registry);
        let options = self.options.clone();
        let pending = runners
            .get(&request.kind)
            .ok_or_else(|| SketchError::UnknownOperation(request.kind.clone()))
            .and_then(|runner| runner(&self.data, &request));
        async move {
            let data = pending?.await?;
            let server = SketchServer {
                data,
                registry,
                options,
            };
            Ok(Arc::new(server) as Arc<dyn Transport>)
        }
        .boxed()
    }
}

impl<T: Send + Sync + 'static> Transport for SketchServer<T> {
    fn sketch(&self, request: OperationRequest) -> Result<WireReceiver> {
        log::debug!("serving sketch `{}`", request.kind);
        let runner = self
            .registry
            .sketches
            .get(&request.kind)
            .ok_or_else(|| SketchError::UnknownOperation(request.kind.clone()))?;
        runner(&self.data, &request, &self.options)
    }

    fn map(&self, request: OperationRequest) -> BoxFuture<'static, Result<Arc<dyn Transport>>> {
        self.derived(&self.registry.maps, request)
    }

    fn flat_map(
        &self,
        request: OperationRequest,
    ) -> BoxFuture<'static, Result<Arc<dyn Transport>>> {
        self.derived(&self.registry.flat_maps, request)
    }
}

/// Pump a local result stream into its wire form until the terminal update or until the
/// receiver goes away, which drops (and so cancels) the local execution.
fn forward_to_wire<R>(mut stream: ResultStream<R>, capacity: usize) -> WireReceiver
where
    R: Serialize + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                item = stream.next_update() => item,
                _ = tx.closed() => return,
            };
            let Some(item) = item else {
                return;
            };
            let wire = item.and_then(|update| WireUpdate::encode(&update));
            let terminal = !matches!(&wire, Ok(update) if !update.is_final);
            if tx.send(wire).await.is_err() || terminal {
                return;
            }
        }
    });
    rx
}
