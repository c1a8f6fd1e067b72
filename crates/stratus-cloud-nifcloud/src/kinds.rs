//! Resource kinds and the poll profile of each lifecycle transition

use std::time::Duration;
use stratus_cloud::{ABSENT, PollConfig};
use stratus_config::{Operation, ProviderConfig};

const MINUTE: u64 = 60;

/// Resource kinds managed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Instance,
    DbInstance,
    VpnGateway,
    Router,
    Volume,
    SecurityGroup,
}

impl ResourceKind {
    /// Key under `timeouts:` in the config file
    pub fn config_key(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::DbInstance => "db_instance",
            ResourceKind::VpnGateway => "vpn_gateway",
            ResourceKind::Router => "router",
            ResourceKind::Volume => "volume",
            ResourceKind::SecurityGroup => "security_group",
        }
    }

    pub fn default_timeout(&self, operation: Operation) -> Duration {
        let minutes = match (self, operation) {
            (ResourceKind::Instance, Operation::Delete) => 20,
            (ResourceKind::Instance, _) => 15,
            (ResourceKind::DbInstance, Operation::Update) => 80,
            (ResourceKind::DbInstance, _) => 40,
            (ResourceKind::VpnGateway | ResourceKind::Router, _) => 15,
            (ResourceKind::Volume, _) => 5,
            (ResourceKind::SecurityGroup, Operation::Create) => 20,
            (ResourceKind::SecurityGroup, _) => 10,
        };
        Duration::from_secs(minutes * MINUTE)
    }

    fn delay(&self) -> Duration {
        match self {
            ResourceKind::DbInstance => Duration::from_secs(30),
            ResourceKind::SecurityGroup => Duration::ZERO,
            _ => Duration::from_secs(10),
        }
    }

    fn min_interval(&self) -> Duration {
        match self {
            ResourceKind::Instance => Duration::from_secs(5),
            ResourceKind::DbInstance => Duration::from_secs(10),
            ResourceKind::VpnGateway | ResourceKind::Router | ResourceKind::Volume => {
                Duration::from_secs(3)
            }
            ResourceKind::SecurityGroup => Duration::from_secs(2),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Builds poll configurations, applying timeout overrides from the config file.
#[derive(Debug, Clone, Default)]
pub struct WaitProfiles {
    config: ProviderConfig,
}

impl WaitProfiles {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Effective timeout for one kind and operation.
    pub fn timeout(&self, kind: ResourceKind, operation: Operation) -> Duration {
        self.config
            .timeout(kind.config_key(), operation)
            .unwrap_or_else(|| kind.default_timeout(operation))
    }

    fn shaped(&self, kind: ResourceKind, operation: Operation, config: PollConfig) -> PollConfig {
        config
            .with_timeout(self.timeout(kind, operation))
            .with_delay(kind.delay())
            .with_min_interval(kind.min_interval())
    }

    pub fn instance_running(&self, operation: Operation) -> PollConfig {
        self.shaped(
            ResourceKind::Instance,
            operation,
            PollConfig::new(["pending"], ["running", "warning"]).with_failure(["terminated"]),
        )
    }

    pub fn instance_stopped(&self) -> PollConfig {
        self.shaped(
            ResourceKind::Instance,
            Operation::Update,
            PollConfig::new(["pending", "running"], ["stopped"]).with_failure(["warning"]),
        )
    }

    pub fn instance_terminated(&self) -> PollConfig {
        self.shaped(
            ResourceKind::Instance,
            Operation::Delete,
            PollConfig::new(["pending", "running", "stopped"], ["terminated", ABSENT]),
        )
    }

    pub fn db_instance_available(&self) -> PollConfig {
        self.shaped(
            ResourceKind::DbInstance,
            Operation::Create,
            PollConfig::new(
                ["backing-up", "creating", "modifying", "rebooting", "renaming"],
                ["available"],
            ),
        )
    }

    pub fn db_instance_modified(&self) -> PollConfig {
        self.shaped(
            ResourceKind::DbInstance,
            Operation::Update,
            PollConfig::new(
                [
                    "backing-up",
                    "creating",
                    "modifying",
                    "rebooting",
                    "renaming",
                    "storage-full",
                ],
                ["available", "storage-optimization"],
            ),
        )
    }

    pub fn db_instance_deleted(&self) -> PollConfig {
        self.shaped(
            ResourceKind::DbInstance,
            Operation::Delete,
            PollConfig::until_absent([
                "available",
                "failed",
                "backing-up",
                "creating",
                "deleting",
                "incompatible-parameters",
                "modifying",
                "storage-full",
            ]),
        )
    }

    /// VPN gateways and routers share one lifecycle.
    pub fn network_available(&self, kind: ResourceKind, operation: Operation) -> PollConfig {
        self.shaped(
            kind,
            operation,
            PollConfig::new(["pending", "warning"], ["available"]),
        )
    }

    pub fn network_deleted(&self, kind: ResourceKind) -> PollConfig {
        self.shaped(
            kind,
            Operation::Delete,
            PollConfig::until_absent(["available", "pending", "warning", "deleting"]),
        )
    }

    pub fn volume_ready(&self, operation: Operation) -> PollConfig {
        self.shaped(
            ResourceKind::Volume,
            operation,
            PollConfig::new(["creating", "configuring"], ["available", "in-use"]),
        )
    }

    pub fn volume_detached(&self) -> PollConfig {
        self.shaped(
            ResourceKind::Volume,
            Operation::Update,
            PollConfig::new(["in-use", "detaching", "configuring"], ["available"]),
        )
    }

    pub fn volume_deleted(&self) -> PollConfig {
        self.shaped(
            ResourceKind::Volume,
            Operation::Delete,
            PollConfig::until_absent(["available", "deleting"]),
        )
    }

    /// A freshly created group may not be listed yet.
    pub fn security_group_exists(&self) -> PollConfig {
        self.shaped(
            ResourceKind::SecurityGroup,
            Operation::Create,
            PollConfig::new([ABSENT], ["exists"]),
        )
    }

    /// Wait for an ingress rule to become `present` or `missing`.
    pub fn ingress_rule(&self, present: bool) -> PollConfig {
        let (pending, target) = if present {
            ("missing", "present")
        } else {
            ("present", "missing")
        };
        PollConfig::new([pending], [target])
            .with_timeout(Duration::from_secs(10 * MINUTE))
            .with_min_interval(Duration::from_secs(2))
    }
}
