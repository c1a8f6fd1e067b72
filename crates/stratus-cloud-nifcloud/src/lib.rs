//! NIFCLOUD provider for Stratus
//!
//! Wait-for-convergence orchestration for NIFCLOUD resources, built on the
//! poller and retry primitives from `stratus-cloud`.
//!
//! # Features
//!
//! - Instances (wait running, stop and terminate)
//! - Database instances (create, modify, delete)
//! - VPN gateways and routers
//! - Volumes
//! - Security groups and their ingress rules
//! - Elastic IP association
//!
//! # Requirements
//!
//! - An implementation of [`NifcloudApi`] (the signed HTTP client)
//! - Optional `stratus.yaml` with timeout and retry overrides
//!
//! # Example
//!
//! ```ignore
//! use stratus_cloud_nifcloud::{DeleteDbInstanceInput, NifcloudProvider};
//!
//! let provider = NifcloudProvider::from_config_file(api)?;
//!
//! provider
//!     .delete_db_instance(&DeleteDbInstanceInput {
//!         identifier: "db01".to_string(),
//!         skip_final_snapshot: true,
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod api;
pub mod error;
pub mod kinds;
pub mod probe;
pub mod provider;

pub use api::{
    ApiResult, CreateDbInstanceInput, DbEndpoint, DbInstanceInfo, DeleteDbInstanceInput,
    InstanceInfo, InstanceState, IpPermission, ModifyDbInstanceInput, NifcloudApi, RouterInfo,
    SecurityGroupInfo, VolumeInfo, VpnGatewayInfo,
};
pub use error::{NifcloudError, Result};
pub use kinds::{ResourceKind, WaitProfiles};
pub use probe::{
    DbInstanceProber, IngressRuleProber, InstanceProber, RouterProber, SecurityGroupProber,
    VolumeProber, VpnGatewayProber,
};
pub use provider::NifcloudProvider;
