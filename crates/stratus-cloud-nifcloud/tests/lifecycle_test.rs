//! Provider orchestration against a scripted NIFCLOUD API
//!
//! Every resource follows a timeline of (offset, state) steps scheduled by
//! the mutating calls. Tests run on paused time, so minute-long waits finish
//! instantly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratus_cloud::{ApiError, CloudError};
use stratus_cloud_nifcloud::api::codes;
use stratus_cloud_nifcloud::{
    ApiResult, CreateDbInstanceInput, DbInstanceInfo, DeleteDbInstanceInput, InstanceInfo,
    InstanceState, IpPermission, ModifyDbInstanceInput, NifcloudApi, NifcloudError,
    NifcloudProvider, RouterInfo, SecurityGroupInfo, VolumeInfo, VpnGatewayInfo,
};
use stratus_config::{Operation, ProviderConfig};
use tokio::time::Instant;

type Step = (u64, Option<&'static str>);

struct Rule {
    permission: IpPermission,
    added_at: Instant,
    removed_at: Option<Instant>,
}

#[derive(Default)]
struct FakeNifcloud {
    timelines: Mutex<HashMap<String, Vec<(Instant, Option<&'static str>)>>>,
    busy_until: Mutex<HashMap<String, Instant>>,
    rules: Mutex<HashMap<String, Vec<Rule>>>,
    calls: Mutex<Vec<(Instant, String)>>,
    db_lifecycle: Vec<Step>,
    stop_reports_processing: bool,
}

impl FakeNifcloud {
    fn new() -> Self {
        Self {
            db_lifecycle: vec![(0, None), (10, Some("creating")), (120, Some("available"))],
            ..Self::default()
        }
    }

    /// Replace whatever is scheduled after now with `steps`.
    fn schedule(&self, id: &str, steps: &[Step]) {
        let now = Instant::now();
        let mut timelines = self.timelines.lock().unwrap();
        let timeline = timelines.entry(id.to_string()).or_default();
        timeline.retain(|(at, _)| *at <= now);
        timeline.extend(
            steps
                .iter()
                .map(|(secs, state)| (now + Duration::from_secs(*secs), *state)),
        );
    }

    fn state(&self, id: &str) -> Option<&'static str> {
        let now = Instant::now();
        self.timelines.lock().unwrap().get(id).and_then(|steps| {
            steps
                .iter()
                .rev()
                .find(|(at, _)| *at <= now)
                .and_then(|(_, state)| *state)
        })
    }

    fn busy_for(&self, id: &str, duration: Duration) {
        self.busy_until
            .lock()
            .unwrap()
            .insert(id.to_string(), Instant::now() + duration);
    }

    fn is_busy(&self, id: &str) -> bool {
        self.busy_until
            .lock()
            .unwrap()
            .get(id)
            .is_some_and(|until| Instant::now() < *until)
    }

    fn record(&self, call: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), call.to_string()));
    }

    fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn calls_to(&self, call: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, name)| name == call)
            .map(|(at, _)| *at)
            .collect()
    }

    fn exists(&self, id: &str, not_found_code: &str) -> ApiResult<&'static str> {
        self.state(id)
            .ok_or_else(|| ApiError::new(not_found_code, format!("'{}' does not exist.", id)))
    }
}

#[async_trait]
impl NifcloudApi for FakeNifcloud {
    async fn describe_instance(&self, instance_id: &str) -> ApiResult<InstanceInfo> {
        self.record("describe_instance");
        let state = self.exists(instance_id, codes::INSTANCE_NOT_FOUND)?;
        Ok(InstanceInfo {
            instance_id: instance_id.to_string(),
            instance_state: Some(InstanceState {
                name: state.to_string(),
                code: None,
            }),
            ip_address: None,
        })
    }

    async fn stop_instance(&self, instance_id: &str) -> ApiResult<()> {
        self.record("stop_instance");
        self.exists(instance_id, codes::INSTANCE_NOT_FOUND)?;
        self.schedule(instance_id, &[(20, Some("stopped"))]);
        if self.stop_reports_processing {
            return Err(ApiError::new(
                codes::INSTANCE_STOP_PROCESSING,
                "The instance is being stopped.",
            ));
        }
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> ApiResult<()> {
        self.record("terminate_instance");
        self.exists(instance_id, codes::INSTANCE_NOT_FOUND)?;
        self.schedule(instance_id, &[(15, Some("terminated")), (300, None)]);
        Ok(())
    }

    async fn describe_db_instance(&self, identifier: &str) -> ApiResult<DbInstanceInfo> {
        self.record("describe_db_instance");
        let status = self.exists(identifier, codes::DB_INSTANCE_NOT_FOUND)?;
        Ok(DbInstanceInfo {
            identifier: identifier.to_string(),
            status: Some(status.to_string()),
            instance_class: None,
            endpoint: None,
        })
    }

    async fn create_db_instance(&self, input: &CreateDbInstanceInput) -> ApiResult<()> {
        self.record("create_db_instance");
        if self.is_busy(&input.identifier) {
            return Err(ApiError::new(
                codes::DB_SECURITY_GROUP_PROCESSING,
                "DBSecurityGroup is processing.",
            ));
        }
        self.schedule(&input.identifier, &self.db_lifecycle);
        Ok(())
    }

    async fn modify_db_instance(
        &self,
        input: &ModifyDbInstanceInput,
    ) -> ApiResult<()> {
        self.record("modify_db_instance");
        self.exists(&input.identifier, codes::DB_INSTANCE_NOT_FOUND)?;
        self.schedule(
            &input.identifier,
            &[(0, Some("modifying")), (60, Some("available"))],
        );
        Ok(())
    }

    async fn delete_db_instance(&self, input: &DeleteDbInstanceInput) -> ApiResult<()> {
        self.record("delete_db_instance");
        let state = self.exists(&input.identifier, codes::DB_INSTANCE_NOT_FOUND)?;
        if state == "deleting" {
            return Err(ApiError::new(
                codes::DB_INSTANCE_NOT_FOUND,
                format!("DBInstance {} is already being deleted.", input.identifier),
            ));
        }
        self.schedule(&input.identifier, &[(0, Some("deleting")), (60, None)]);
        Ok(())
    }

    async fn describe_vpn_gateway(&self, vpn_gateway_id: &str) -> ApiResult<VpnGatewayInfo> {
        self.record("describe_vpn_gateway");
        let state = self.exists(vpn_gateway_id, codes::VPN_GATEWAY_NOT_FOUND)?;
        Ok(VpnGatewayInfo {
            vpn_gateway_id: vpn_gateway_id.to_string(),
            state: Some(state.to_string()),
        })
    }

    async fn delete_vpn_gateway(&self, vpn_gateway_id: &str) -> ApiResult<()> {
        self.record("delete_vpn_gateway");
        self.exists(vpn_gateway_id, codes::VPN_GATEWAY_NOT_FOUND)?;
        self.schedule(vpn_gateway_id, &[(0, Some("deleting")), (30, None)]);
        Ok(())
    }

    async fn describe_router(&self, router_id: &str) -> ApiResult<RouterInfo> {
        self.record("describe_router");
        let state = self.exists(router_id, codes::ROUTER_NOT_FOUND)?;
        Ok(RouterInfo {
            router_id: router_id.to_string(),
            state: Some(state.to_string()),
        })
    }

    async fn delete_router(&self, router_id: &str) -> ApiResult<()> {
        self.record("delete_router");
        self.exists(router_id, codes::ROUTER_NOT_FOUND)?;
        if self.is_busy(router_id) {
            return Err(ApiError::new(
                "Server.ResourceIncorrectState.Router.Processing",
                "The router is being updated.",
            ));
        }
        self.schedule(router_id, &[(0, Some("deleting")), (30, None)]);
        Ok(())
    }

    async fn describe_volume(&self, volume_id: &str) -> ApiResult<VolumeInfo> {
        self.record("describe_volume");
        let status = self.exists(volume_id, codes::VOLUME_NOT_FOUND)?;
        Ok(VolumeInfo {
            volume_id: volume_id.to_string(),
            status: Some(status.to_string()),
            size: Some(100),
        })
    }

    async fn detach_volume(&self, volume_id: &str, _instance_id: &str) -> ApiResult<()> {
        self.record("detach_volume");
        self.exists(volume_id, codes::VOLUME_NOT_FOUND)?;
        self.schedule(volume_id, &[(0, Some("detaching")), (12, Some("available"))]);
        Ok(())
    }

    async fn delete_volume(&self, volume_id: &str) -> ApiResult<()> {
        self.record("delete_volume");
        self.exists(volume_id, codes::VOLUME_NOT_FOUND)?;
        self.schedule(volume_id, &[(0, Some("deleting")), (20, None)]);
        Ok(())
    }

    async fn describe_security_group(&self, group_name: &str) -> ApiResult<SecurityGroupInfo> {
        self.record("describe_security_group");
        let status = self.exists(group_name, codes::SECURITY_GROUP_NOT_FOUND)?;
        let now = Instant::now();
        let ip_permissions = self
            .rules
            .lock()
            .unwrap()
            .get(group_name)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|r| r.added_at <= now && r.removed_at.is_none_or(|at| now < at))
                    .map(|r| r.permission.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(SecurityGroupInfo {
            group_name: group_name.to_string(),
            group_status: Some(status.to_string()),
            ip_permissions,
        })
    }

    async fn delete_security_group(&self, group_name: &str) -> ApiResult<()> {
        self.record("delete_security_group");
        self.exists(group_name, codes::SECURITY_GROUP_NOT_FOUND)?;
        if self.is_busy(group_name) {
            return Err(ApiError::new(
                "Client.ResourceIncorrectState.SecurityGroup.InUse",
                "The security group is in use.",
            ));
        }
        self.schedule(group_name, &[(0, None)]);
        Ok(())
    }

    async fn authorize_ingress(&self, group_name: &str, rule: &IpPermission) -> ApiResult<()> {
        self.record("authorize_ingress");
        self.exists(group_name, codes::SECURITY_GROUP_NOT_FOUND)?;
        self.rules
            .lock()
            .unwrap()
            .entry(group_name.to_string())
            .or_default()
            .push(Rule {
                permission: rule.clone(),
                added_at: Instant::now() + Duration::from_secs(4),
                removed_at: None,
            });
        Ok(())
    }

    async fn revoke_ingress(&self, group_name: &str, rule: &IpPermission) -> ApiResult<()> {
        self.record("revoke_ingress");
        self.exists(group_name, codes::SECURITY_GROUP_NOT_FOUND)?;
        if self.is_busy(group_name) {
            return Err(ApiError::new(
                "Server.ResourceIncorrectState.SecurityGroup.Processing",
                "The security group is being processed.",
            ));
        }
        let mut rules = self.rules.lock().unwrap();
        let mut matched = false;
        for existing in rules.entry(group_name.to_string()).or_default() {
            if existing.permission == *rule && existing.removed_at.is_none() {
                existing.removed_at = Some(Instant::now() + Duration::from_secs(3));
                matched = true;
            }
        }
        if !matched {
            return Err(ApiError::new(
                codes::SECURITY_GROUP_INGRESS_NOT_FOUND,
                "The specified rule does not exist.",
            ));
        }
        Ok(())
    }

    async fn associate_address(&self, public_ip: &str, _instance_id: &str) -> ApiResult<()> {
        self.record("associate_address");
        if self.is_busy(public_ip) {
            return Err(ApiError::new(
                codes::IP_ADDRESS_PROCESSING,
                "The IP address is being processed.",
            ));
        }
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn provider(fake: &Arc<FakeNifcloud>) -> NifcloudProvider {
    NifcloudProvider::new(Arc::clone(fake) as Arc<dyn NifcloudApi>)
}

fn db_input(identifier: &str) -> CreateDbInstanceInput {
    CreateDbInstanceInput {
        identifier: identifier.to_string(),
        instance_class: "db.large8".to_string(),
        engine: "MySQL".to_string(),
        allocated_storage: 50,
        security_groups: vec!["dbsg".to_string()],
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_db_instance_waits_out_security_group_processing() {
    init_tracing();
    let fake = Arc::new(FakeNifcloud::new());
    fake.busy_for("db01", Duration::from_secs(20));
    let provider = provider(&fake);

    let db = provider.create_db_instance(&db_input("db01")).await.unwrap();

    assert_eq!(db.status.as_deref(), Some("available"));
    let creates = fake.calls_to("create_db_instance");
    assert!(creates.len() > 1);
    // the wait starts only after the create was accepted
    let first_describe = fake.calls_to("describe_db_instance")[0];
    assert!(first_describe >= *creates.last().unwrap() + Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_create_db_instance_fails_on_unknown_state() {
    let fake = Arc::new(FakeNifcloud {
        db_lifecycle: vec![
            (0, Some("creating")),
            (40, Some("incompatible-network")),
        ],
        ..FakeNifcloud::new()
    });
    let provider = provider(&fake);

    let err = provider
        .create_db_instance(&db_input("db02"))
        .await
        .unwrap_err();

    match err {
        NifcloudError::Cloud(CloudError::UnexpectedState {
            resource, state, ..
        }) => {
            assert!(resource.contains("db02"));
            assert_eq!(state, "incompatible-network");
        }
        other => panic!("Expected UnexpectedState error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_db_instance_rejects_empty_identifier() {
    let fake = Arc::new(FakeNifcloud::new());
    let provider = provider(&fake);

    let result = provider.create_db_instance(&db_input("")).await;

    assert!(matches!(result, Err(NifcloudError::InvalidInput(_))));
    assert!(fake.call_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_modify_db_instance_waits_for_available() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("db01", &[(0, Some("available"))]);
    let provider = provider(&fake);

    let db = provider
        .modify_db_instance(&ModifyDbInstanceInput {
            identifier: "db01".to_string(),
            instance_class: Some("db.large16".to_string()),
            apply_immediately: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(db.status.as_deref(), Some("available"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_db_instance_already_being_deleted() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("db01", &[(0, Some("deleting")), (90, None)]);
    let provider = provider(&fake);

    let started = Instant::now();
    provider
        .delete_db_instance(&DeleteDbInstanceInput {
            identifier: "db01".to_string(),
            skip_final_snapshot: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(90));
    assert!(fake.state("db01").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_missing_db_instance_is_done() {
    let fake = Arc::new(FakeNifcloud::new());
    let provider = provider(&fake);

    provider
        .delete_db_instance(&DeleteDbInstanceInput {
            identifier: "db-gone".to_string(),
            skip_final_snapshot: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(fake.call_names(), vec!["delete_db_instance"]);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_running_instance() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("web01", &[(0, Some("running"))]);
    let provider = provider(&fake);

    provider.terminate_instance("web01").await.unwrap();

    let mutations: Vec<String> = fake
        .call_names()
        .into_iter()
        .filter(|name| !name.starts_with("describe"))
        .collect();
    assert_eq!(mutations, vec!["stop_instance", "terminate_instance"]);

    // terminate is only issued once the instance reports stopped
    let stop = fake.calls_to("stop_instance")[0];
    let terminate = fake.calls_to("terminate_instance")[0];
    assert!(terminate >= stop + Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_terminate_tolerates_stop_in_progress() {
    let fake = Arc::new(FakeNifcloud {
        stop_reports_processing: true,
        ..FakeNifcloud::new()
    });
    fake.schedule("web02", &[(0, Some("running"))]);
    let provider = provider(&fake);

    provider.terminate_instance("web02").await.unwrap();

    assert_eq!(fake.calls_to("terminate_instance").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_stopped_instance_skips_stop() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("web03", &[(0, Some("stopped"))]);
    let provider = provider(&fake);

    provider.terminate_instance("web03").await.unwrap();

    assert!(fake.calls_to("stop_instance").is_empty());
    assert_eq!(fake.calls_to("terminate_instance").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_missing_vpn_gateway_is_done() {
    let fake = Arc::new(FakeNifcloud::new());
    let provider = provider(&fake);

    provider.delete_vpn_gateway("vpngw-gone").await.unwrap();

    assert_eq!(fake.call_names(), vec!["delete_vpn_gateway"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_vpn_gateway_waits_for_absence() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("vpngw01", &[(0, Some("available"))]);
    let provider = provider(&fake);

    provider.delete_vpn_gateway("vpngw01").await.unwrap();

    assert!(fake.state("vpngw01").is_none());
    assert!(!fake.calls_to("describe_vpn_gateway").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_router_retries_any_error() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("router01", &[(0, Some("available"))]);
    fake.busy_for("router01", Duration::from_secs(5));
    let provider = provider(&fake);

    provider.delete_router("router01").await.unwrap();

    assert!(fake.calls_to("delete_router").len() > 1);
    assert!(fake.state("router01").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_wait_router_available() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("router02", &[(0, Some("pending")), (25, Some("available"))]);
    let provider = provider(&fake);

    provider
        .wait_router_available("router02", Operation::Create)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_volume_wait_honors_configured_timeout() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("vol01", &[(0, Some("creating"))]);
    let config =
        ProviderConfig::from_yaml("timeouts:\n  volume:\n    create_secs: 60\n").unwrap();
    let provider =
        NifcloudProvider::with_config(Arc::clone(&fake) as Arc<dyn NifcloudApi>, config);

    let started = Instant::now();
    let err = provider
        .wait_volume_ready("vol01", Operation::Create)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let message = err.to_string();
    assert!(message.contains("vol01"));
    assert!(message.contains("creating"));
    assert!(started.elapsed() <= Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn test_delete_volume_detaches_first() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("vol02", &[(0, Some("in-use"))]);
    let provider = provider(&fake);

    provider.delete_volume("vol02", "web01").await.unwrap();

    let detach = fake.calls_to("detach_volume")[0];
    let delete = fake.calls_to("delete_volume")[0];
    assert!(delete >= detach + Duration::from_secs(12));
    assert!(fake.state("vol02").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_associate_address_retries_while_processing() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.busy_for("203.0.113.10", Duration::from_secs(10));
    let provider = provider(&fake);

    provider
        .associate_address("203.0.113.10", "web01")
        .await
        .unwrap();

    assert!(fake.calls_to("associate_address").len() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_security_group_exists() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("sgweb", &[(6, Some("applied"))]);
    let provider = provider(&fake);

    let group = provider.wait_security_group_exists("sgweb").await.unwrap();

    assert_eq!(group.group_name, "sgweb");
}

#[tokio::test(start_paused = true)]
async fn test_delete_security_group_in_use_is_retried() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("sgold", &[(0, Some("applied"))]);
    fake.busy_for("sgold", Duration::from_secs(8));
    let provider = provider(&fake);

    provider.delete_security_group("sgold").await.unwrap();
    provider.delete_security_group("sgold").await.unwrap();

    assert!(fake.state("sgold").is_none());
    assert_eq!(provider.locks().active_keys(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ingress_changes_are_serialized_per_group() {
    init_tracing();
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("sgweb", &[(0, Some("applied"))]);
    let provider = provider(&fake);

    let https = IpPermission::tcp(443, "0.0.0.0/0");
    let ssh = IpPermission::tcp(22, "198.51.100.0/24");

    let (a, b) = tokio::join!(
        provider.authorize_ingress("sgweb", &https),
        provider.authorize_ingress("sgweb", &ssh),
    );
    a.unwrap();
    b.unwrap();

    let group = fake.describe_security_group("sgweb").await.unwrap();
    assert!(group.has_rule(&https));
    assert!(group.has_rule(&ssh));

    // the second change waits for the first rule to become visible
    let authorizations = fake.calls_to("authorize_ingress");
    assert_eq!(authorizations.len(), 2);
    assert!(authorizations[1] >= authorizations[0] + Duration::from_secs(4));
    assert_eq!(provider.locks().active_keys(), 0);

    provider.revoke_ingress("sgweb", &ssh).await.unwrap();

    let group = fake.describe_security_group("sgweb").await.unwrap();
    assert!(group.has_rule(&https));
    assert!(!group.has_rule(&ssh));
}

#[tokio::test(start_paused = true)]
async fn test_revoke_missing_rule_is_done() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("sgweb", &[(0, Some("applied"))]);
    let provider = provider(&fake);

    let started = Instant::now();
    provider
        .revoke_ingress("sgweb", &IpPermission::tcp(22, "198.51.100.0/24"))
        .await
        .unwrap();

    assert_eq!(fake.call_names(), vec!["revoke_ingress"]);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(provider.locks().active_keys(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_revoke_ingress_retried_while_group_busy() {
    let fake = Arc::new(FakeNifcloud::new());
    fake.schedule("sgweb", &[(0, Some("applied"))]);
    let provider = provider(&fake);
    let ssh = IpPermission::tcp(22, "198.51.100.0/24");

    provider.authorize_ingress("sgweb", &ssh).await.unwrap();
    fake.busy_for("sgweb", Duration::from_secs(5));
    provider.revoke_ingress("sgweb", &ssh).await.unwrap();

    assert!(fake.calls_to("revoke_ingress").len() > 1);
    let group = fake.describe_security_group("sgweb").await.unwrap();
    assert!(!group.has_rule(&ssh));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_request_names_resource() {
    let fake = Arc::new(FakeNifcloud::new());
    let provider = provider(&fake);

    let err = provider
        .authorize_ingress("sgmissing", &IpPermission::tcp(443, "0.0.0.0/0"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("sgmissing"), "{}", err);
    assert_eq!(err.resource(), Some("security_group sgmissing"));
    assert_eq!(
        err.api_error().map(|e| e.code.as_str()),
        Some(codes::SECURITY_GROUP_NOT_FOUND)
    );
    assert_eq!(provider.locks().active_keys(), 0);
}
