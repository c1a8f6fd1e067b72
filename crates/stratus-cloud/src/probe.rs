//! State prober contract
//!
//! A prober performs one read against the cloud API and reports what it saw.
//! Absence is an observation, not an error: kind-specific "not found" codes
//! must be mapped to [`Observation::NotFound`].

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Reserved label standing for "the resource does not exist".
///
/// Put it in the target set to wait for deletion, or in the pending set to
/// tolerate a freshly created resource that is not visible yet.
pub const ABSENT: &str = "<absent>";

/// Result of one successful probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// The resource exists; `state` is read from its snapshot.
    Found { snapshot: T, state: String },
    /// The API reports that the resource does not exist.
    NotFound,
}

impl<T> Observation<T> {
    pub fn found(snapshot: T, state: impl Into<String>) -> Self {
        Observation::Found {
            snapshot,
            state: state.into(),
        }
    }

    /// Lifecycle label of this observation, [`ABSENT`] when not found.
    pub fn state(&self) -> &str {
        match self {
            Observation::Found { state, .. } => state,
            Observation::NotFound => ABSENT,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Observation::NotFound)
    }

    pub fn snapshot(&self) -> Option<&T> {
        match self {
            Observation::Found { snapshot, .. } => Some(snapshot),
            Observation::NotFound => None,
        }
    }

    pub fn into_snapshot(self) -> Option<T> {
        match self {
            Observation::Found { snapshot, .. } => Some(snapshot),
            Observation::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Observation<U> {
        match self {
            Observation::Found { snapshot, state } => Observation::Found {
                snapshot: f(snapshot),
                state,
            },
            Observation::NotFound => Observation::NotFound,
        }
    }
}

/// Observes the lifecycle state of one kind of resource.
///
/// Implementations must be side-effect free: the poller may call `probe`
/// any number of times and may drop an in-flight call at its deadline.
#[async_trait]
pub trait StateProber: Send + Sync {
    type Snapshot: Send;

    async fn probe(&self, id: &str) -> Result<Observation<Self::Snapshot>>;
}

/// Prober backed by an async closure. See [`probe_fn`].
pub struct ProbeFn<F, T> {
    f: F,
    _snapshot: PhantomData<fn() -> T>,
}

/// Build a [`StateProber`] from a closure taking the resource identifier.
pub fn probe_fn<F, Fut, T>(f: F) -> ProbeFn<F, T>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>>> + Send,
    T: Send,
{
    ProbeFn {
        f,
        _snapshot: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> StateProber for ProbeFn<F, T>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>>> + Send,
    T: Send,
{
    type Snapshot = T;

    async fn probe(&self, id: &str) -> Result<Observation<T>> {
        (self.f)(id.to_string()).await
    }
}

#[async_trait]
impl<P: StateProber + ?Sized> StateProber for &P {
    type Snapshot = P::Snapshot;

    async fn probe(&self, id: &str) -> Result<Observation<P::Snapshot>> {
        (**self).probe(id).await
    }
}
