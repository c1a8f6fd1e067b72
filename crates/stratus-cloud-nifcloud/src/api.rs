//! NIFCLOUD API client boundary
//!
//! The HTTP/signing client lives outside this crate. Anything that can make
//! the calls below and classify failures into [`ApiError`] can drive the
//! provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratus_cloud::ApiError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error codes the provider reacts to
pub mod codes {
    pub const INSTANCE_NOT_FOUND: &str = "Client.InvalidParameterNotFound.Instance";
    pub const INSTANCE_STOP_PROCESSING: &str = "Server.ProcessingFailure.Instance.Stop";
    pub const DB_INSTANCE_NOT_FOUND: &str = "Client.InvalidParameterNotFound.DBInstance";
    pub const DB_SECURITY_GROUP_PROCESSING: &str =
        "Client.ResourceIncorrectState.DBSecurityGroup.Processing";
    pub const DB_PARAMETER_GROUP_APPLYING: &str =
        "Client.ResourceIncorrectState.DBParameterGroup.Applying";
    pub const VPN_GATEWAY_NOT_FOUND: &str = "Client.InvalidParameterNotFound.VpnGatewayId";
    pub const ROUTER_NOT_FOUND: &str = "Client.InvalidParameterNotFound.RouterId";
    pub const VOLUME_NOT_FOUND: &str = "Client.InvalidParameterNotFound.Volume";
    pub const SECURITY_GROUP_NOT_FOUND: &str = "Client.InvalidParameterNotFound.SecurityGroup";
    pub const SECURITY_GROUP_INGRESS_NOT_FOUND: &str =
        "Client.InvalidParameterNotFound.SecurityGroupIngress";
    pub const IP_ADDRESS_PROCESSING: &str = "Server.ResourceIncorrectState.IpAddress.Processing";

    /// Message fragment telling a repeated delete apart from a missing instance
    pub const ALREADY_BEING_DELETED: &str = "is already being deleted";
}

/// Calls the provider makes against the cloud API
#[async_trait]
pub trait NifcloudApi: Send + Sync {
    async fn describe_instance(&self, instance_id: &str) -> ApiResult<InstanceInfo>;
    async fn stop_instance(&self, instance_id: &str) -> ApiResult<()>;
    async fn terminate_instance(&self, instance_id: &str) -> ApiResult<()>;

    async fn describe_db_instance(&self, identifier: &str) -> ApiResult<DbInstanceInfo>;
    async fn create_db_instance(&self, input: &CreateDbInstanceInput) -> ApiResult<()>;
    async fn modify_db_instance(&self, input: &ModifyDbInstanceInput) -> ApiResult<()>;
    async fn delete_db_instance(&self, input: &DeleteDbInstanceInput) -> ApiResult<()>;

    async fn describe_vpn_gateway(&self, vpn_gateway_id: &str) -> ApiResult<VpnGatewayInfo>;
    async fn delete_vpn_gateway(&self, vpn_gateway_id: &str) -> ApiResult<()>;

    async fn describe_router(&self, router_id: &str) -> ApiResult<RouterInfo>;
    async fn delete_router(&self, router_id: &str) -> ApiResult<()>;

    async fn describe_volume(&self, volume_id: &str) -> ApiResult<VolumeInfo>;
    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> ApiResult<()>;
    async fn delete_volume(&self, volume_id: &str) -> ApiResult<()>;

    async fn describe_security_group(&self, group_name: &str) -> ApiResult<SecurityGroupInfo>;
    async fn delete_security_group(&self, group_name: &str) -> ApiResult<()>;
    async fn authorize_ingress(&self, group_name: &str, rule: &IpPermission) -> ApiResult<()>;
    async fn revoke_ingress(&self, group_name: &str, rule: &IpPermission) -> ApiResult<()>;

    async fn associate_address(&self, public_ip: &str, instance_id: &str) -> ApiResult<()>;
}

/// Server instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    #[serde(rename = "InstanceId")]
    pub instance_id: String,

    #[serde(rename = "InstanceState")]
    pub instance_state: Option<InstanceState>,

    #[serde(rename = "IpAddress")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Code")]
    pub code: Option<i64>,
}

impl InstanceInfo {
    pub fn state(&self) -> Option<&str> {
        self.instance_state.as_ref().map(|s| s.name.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.state() == Some("running")
    }
}

/// Database instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbInstanceInfo {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,

    #[serde(rename = "DBInstanceStatus")]
    pub status: Option<String>,

    #[serde(rename = "DBInstanceClass")]
    pub instance_class: Option<String>,

    #[serde(rename = "Endpoint")]
    pub endpoint: Option<DbEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbEndpoint {
    #[serde(rename = "Address")]
    pub address: Option<String>,

    #[serde(rename = "Port")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDbInstanceInput {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,

    #[serde(rename = "DBInstanceClass")]
    pub instance_class: String,

    #[serde(rename = "Engine")]
    pub engine: String,

    #[serde(rename = "AllocatedStorage")]
    pub allocated_storage: u32,

    #[serde(rename = "DBSecurityGroups", default)]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyDbInstanceInput {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,

    #[serde(rename = "DBInstanceClass")]
    pub instance_class: Option<String>,

    #[serde(rename = "AllocatedStorage")]
    pub allocated_storage: Option<u32>,

    #[serde(rename = "DBParameterGroupName")]
    pub parameter_group: Option<String>,

    #[serde(rename = "ApplyImmediately")]
    pub apply_immediately: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteDbInstanceInput {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,

    #[serde(rename = "SkipFinalSnapshot")]
    pub skip_final_snapshot: bool,

    #[serde(rename = "FinalDBSnapshotIdentifier")]
    pub final_snapshot_identifier: Option<String>,
}

/// VPN gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnGatewayInfo {
    #[serde(rename = "VpnGatewayId")]
    pub vpn_gateway_id: String,

    #[serde(rename = "State")]
    pub state: Option<String>,
}

/// Router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterInfo {
    #[serde(rename = "RouterId")]
    pub router_id: String,

    #[serde(rename = "State")]
    pub state: Option<String>,
}

/// Disk volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "VolumeId")]
    pub volume_id: String,

    #[serde(rename = "Status")]
    pub status: Option<String>,

    #[serde(rename = "Size")]
    pub size: Option<u32>,
}

/// Firewall (security group)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
    #[serde(rename = "GroupName")]
    pub group_name: String,

    #[serde(rename = "GroupStatus")]
    pub group_status: Option<String>,

    #[serde(rename = "IpPermissions", default)]
    pub ip_permissions: Vec<IpPermission>,
}

impl SecurityGroupInfo {
    pub fn has_rule(&self, rule: &IpPermission) -> bool {
        self.ip_permissions.iter().any(|p| p == rule)
    }
}

/// One ingress rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpPermission {
    #[serde(rename = "IpProtocol")]
    pub protocol: String,

    #[serde(rename = "FromPort")]
    pub from_port: Option<u16>,

    #[serde(rename = "ToPort")]
    pub to_port: Option<u16>,

    #[serde(rename = "CidrIp")]
    pub cidr_ip: Option<String>,

    #[serde(rename = "GroupName")]
    pub source_group: Option<String>,
}

impl IpPermission {
    pub fn tcp(port: u16, cidr_ip: impl Into<String>) -> Self {
        Self {
            protocol: "TCP".to_string(),
            from_port: Some(port),
            to_port: Some(port),
            cidr_ip: Some(cidr_ip.into()),
            source_group: None,
        }
    }
}
