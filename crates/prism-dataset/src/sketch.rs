use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A mergeable aggregation over partitions of type `T`.
///
/// Results form a commutative monoid: `add(zero(), a) == a`, and `add` is associative and
/// commutative. Where `add` guards a consistency condition (e.g. equal schemas) it must fail
/// regardless of argument order. Execution correctness relies only on these laws, never on the
/// order in which partitions finish.
pub trait Sketch<T>: Send + Sync + 'static {
    type Output: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

    fn zero(&self) -> Self::Output;

    fn add(&self, left: &Self::Output, right: &Self::Output) -> Result<Self::Output>;

    /// Summarize one partition. May be expensive; it never runs on the combining threads.
    fn create(&self, data: &T) -> Result<Self::Output>;

    /// Wire description of this sketch, for shipping it to remote workers.
    ///
    /// Sketches that return `None` can only run over local partitions.
    fn request(&self) -> Option<OperationRequest> {
        None
    }
}

/// A partition-wise transform producing one new partition per input partition.
pub trait PartitionMap<T, U>: Send + Sync + 'static {
    fn apply(&self, data: &T) -> Result<U>;

    fn request(&self) -> Option<OperationRequest> {
        None
    }
}

/// A partition-wise transform producing zero or more partitions per input partition.
pub trait PartitionFlatMap<T, U>: Send + Sync + 'static {
    fn apply(&self, data: &T) -> Result<Vec<U>>;

    fn request(&self) -> Option<OperationRequest> {
        None
    }
}

impl<T, U, F> PartitionMap<T, U> for F
where
    F: Fn(&T) -> Result<U> + Send + Sync + 'static,
{
    fn apply(&self, data: &T) -> Result<U> {
        self(data)
    }
}

impl<T, U, F> PartitionFlatMap<T, U> for F
where
    F: Fn(&T) -> Result<Vec<U>> + Send + Sync + 'static,
{
    fn apply(&self, data: &T) -> Result<Vec<U>> {
        self(data)
    }
}

/// Serialized form of a sketch or map: a registered kind plus its JSON arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: String,
    pub args: serde_json::Value,
}

impl OperationRequest {
    pub fn new(kind: impl Into<String>, args: &impl Serialize) -> Result<Self> {
        Ok(Self {
            kind: kind.into(),
            args: serde_json::to_value(args)?,
        })
    }

    pub fn decode<D: DeserializeOwned>(&self) -> Result<D> {
        Ok(serde_json::from_value(self.args.clone())?)
    }
}
