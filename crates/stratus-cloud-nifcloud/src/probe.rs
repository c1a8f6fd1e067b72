//! State probers for each resource kind
//!
//! Each prober issues one describe call. The kind's "not found" code becomes
//! [`Observation::NotFound`]; a snapshot without its state field is a
//! malformed response, not an empty state.

use crate::api::{
    DbInstanceInfo, InstanceInfo, IpPermission, NifcloudApi, RouterInfo, SecurityGroupInfo,
    VolumeInfo, VpnGatewayInfo, codes,
};
use async_trait::async_trait;
use std::sync::Arc;
use stratus_cloud::{ApiError, CloudError, Observation, Result, StateProber};

fn observe<T>(
    id: &str,
    result: std::result::Result<T, ApiError>,
    not_found_code: &str,
    label: impl FnOnce(&T) -> Option<String>,
) -> Result<Observation<T>> {
    match result {
        Ok(snapshot) => match label(&snapshot) {
            Some(state) => Ok(Observation::found(snapshot, state)),
            None => Err(CloudError::MalformedResponse(format!(
                "{} was returned without a state",
                id
            ))),
        },
        Err(err) if err.code == not_found_code => {
            tracing::trace!("{} not found: {}", id, err.message);
            Ok(Observation::NotFound)
        }
        Err(err) => Err(err.into()),
    }
}

pub struct InstanceProber {
    api: Arc<dyn NifcloudApi>,
}

impl InstanceProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for InstanceProber {
    type Snapshot = InstanceInfo;

    async fn probe(&self, id: &str) -> Result<Observation<InstanceInfo>> {
        let result = self.api.describe_instance(id).await;
        observe(id, result, codes::INSTANCE_NOT_FOUND, |i| {
            i.state().map(str::to_string)
        })
    }
}

pub struct DbInstanceProber {
    api: Arc<dyn NifcloudApi>,
}

impl DbInstanceProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for DbInstanceProber {
    type Snapshot = DbInstanceInfo;

    async fn probe(&self, id: &str) -> Result<Observation<DbInstanceInfo>> {
        let result = self.api.describe_db_instance(id).await;
        observe(id, result, codes::DB_INSTANCE_NOT_FOUND, |db| {
            db.status.clone()
        })
    }
}

pub struct VpnGatewayProber {
    api: Arc<dyn NifcloudApi>,
}

impl VpnGatewayProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for VpnGatewayProber {
    type Snapshot = VpnGatewayInfo;

    async fn probe(&self, id: &str) -> Result<Observation<VpnGatewayInfo>> {
        let result = self.api.describe_vpn_gateway(id).await;
        observe(id, result, codes::VPN_GATEWAY_NOT_FOUND, |gw| {
            gw.state.clone()
        })
    }
}

pub struct RouterProber {
    api: Arc<dyn NifcloudApi>,
}

impl RouterProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for RouterProber {
    type Snapshot = RouterInfo;

    async fn probe(&self, id: &str) -> Result<Observation<RouterInfo>> {
        let result = self.api.describe_router(id).await;
        observe(id, result, codes::ROUTER_NOT_FOUND, |r| r.state.clone())
    }
}

pub struct VolumeProber {
    api: Arc<dyn NifcloudApi>,
}

impl VolumeProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for VolumeProber {
    type Snapshot = VolumeInfo;

    async fn probe(&self, id: &str) -> Result<Observation<VolumeInfo>> {
        let result = self.api.describe_volume(id).await;
        observe(id, result, codes::VOLUME_NOT_FOUND, |v| v.status.clone())
    }
}

/// Reports `exists` for any listed group.
pub struct SecurityGroupProber {
    api: Arc<dyn NifcloudApi>,
}

impl SecurityGroupProber {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StateProber for SecurityGroupProber {
    type Snapshot = SecurityGroupInfo;

    async fn probe(&self, id: &str) -> Result<Observation<SecurityGroupInfo>> {
        let result = self.api.describe_security_group(id).await;
        observe(id, result, codes::SECURITY_GROUP_NOT_FOUND, |_| {
            Some("exists".to_string())
        })
    }
}

/// Reports whether one ingress rule is `present` or `missing` in a group.
pub struct IngressRuleProber {
    api: Arc<dyn NifcloudApi>,
    rule: IpPermission,
}

impl IngressRuleProber {
    pub fn new(api: Arc<dyn NifcloudApi>, rule: IpPermission) -> Self {
        Self { api, rule }
    }
}

#[async_trait]
impl StateProber for IngressRuleProber {
    type Snapshot = SecurityGroupInfo;

    async fn probe(&self, id: &str) -> Result<Observation<SecurityGroupInfo>> {
        let result = self.api.describe_security_group(id).await;
        observe(id, result, codes::SECURITY_GROUP_NOT_FOUND, |group| {
            let label = if group.has_rule(&self.rule) {
                "present"
            } else {
                "missing"
            };
            Some(label.to_string())
        })
    }
}
