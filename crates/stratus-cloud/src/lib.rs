//! Stratus Cloud reconciliation core
//!
//! This crate provides the machinery every resource kind uses to converge
//! observed cloud state onto desired state against an eventually consistent
//! API.
//!
//! # Components
//!
//! - **State prober** ([`StateProber`]): one side-effect free read that yields
//!   a lifecycle label and snapshot, or "not found"
//! - **Retry classifier** ([`Classify`], [`RetryPolicy`]): decides from code and
//!   message whether an API error is transient
//! - **Convergence poller** ([`Poller`]): probes until a target state, a
//!   failure state, or a timeout
//! - **Mutation retry wrapper** ([`retry_mutation`]): resubmits one rejected
//!   command while the error stays transient
//! - **Keyed mutex** ([`KeyedMutex`]): serializes mutations on one named resource
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            Resource orchestrators                │
//! │        (create / update / delete per kind)       │
//! └───────┬─────────────────────────┬───────────────┘
//!         │ command                 │ identifier
//! ┌───────▼────────┐        ┌───────▼───────────────┐
//! │ retry_mutation │        │        Poller          │
//! │  + Classify    │        │  pending/target/failure│
//! └───────┬────────┘        └───────┬───────────────┘
//!         │                         │ probe
//! ┌───────▼─────────────────────────▼───────────────┐
//! │              Transport client (API)              │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stratus_cloud::{PollConfig, Poller, RetryConfig, RetryPolicy, retry_mutation};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::none()
//!     .on_code("Client.ResourceIncorrectState.DBSecurityGroup.Processing");
//! retry_mutation(|| api.create_db_instance(&input), &policy, &RetryConfig::default()).await?;
//!
//! let config = PollConfig::new(["creating", "modifying"], ["available"])
//!     .with_timeout(Duration::from_secs(40 * 60))
//!     .with_delay(Duration::from_secs(30))
//!     .with_min_interval(Duration::from_secs(10));
//! let outcome = Poller::new(&config).run("db01", &prober).await;
//! ```

pub mod classify;
pub mod error;
pub mod lock;
pub mod poller;
pub mod probe;
pub mod retry;

// Re-exports
pub use classify::{Classify, RetryDecision, RetryPolicy, RetryRule, is_api_error};
pub use error::{ApiError, CloudError, Result};
pub use lock::{KeyedGuard, KeyedMutex};
pub use poller::{PollConfig, PollFailure, PollOutcome, Poller, wait_for_state};
pub use probe::{ABSENT, Observation, ProbeFn, StateProber, probe_fn};
pub use retry::{RetryConfig, retry_mutation};
