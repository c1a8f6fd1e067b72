//! NIFCLOUD provider orchestrators
//!
//! Each operation issues its mutating call (retried on the transient errors
//! the API is known to return) and then waits for the resource to converge.

use crate::api::{
    ApiResult, CreateDbInstanceInput, DbInstanceInfo, DeleteDbInstanceInput, InstanceInfo,
    IpPermission, ModifyDbInstanceInput, NifcloudApi, SecurityGroupInfo, VolumeInfo, codes,
};
use crate::error::{NifcloudError, Result};
use crate::kinds::{ResourceKind, WaitProfiles};
use crate::probe::{
    DbInstanceProber, IngressRuleProber, InstanceProber, RouterProber, SecurityGroupProber,
    VolumeProber, VpnGatewayProber,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{
    CloudError, KeyedMutex, PollConfig, Poller, RetryConfig, RetryPolicy, StateProber,
    is_api_error, retry_mutation,
};
use stratus_config::{Operation, ProviderConfig};

const DEFAULT_RETRY_DURATION: Duration = Duration::from_secs(5 * 60);
const MODIFY_RETRY_DURATION: Duration = Duration::from_secs(2 * 60);

fn request_error(
    operation: &'static str,
    kind: ResourceKind,
    id: &str,
    err: impl Into<CloudError>,
) -> NifcloudError {
    NifcloudError::Request {
        operation,
        resource: format!("{} {}", kind, id),
        source: err.into(),
    }
}

/// NIFCLOUD provider
pub struct NifcloudProvider {
    api: Arc<dyn NifcloudApi>,
    locks: KeyedMutex,
    profiles: WaitProfiles,
    retry: RetryConfig,
}

impl NifcloudProvider {
    pub fn new(api: Arc<dyn NifcloudApi>) -> Self {
        Self::with_config(api, ProviderConfig::default())
    }

    pub fn with_config(api: Arc<dyn NifcloudApi>, config: ProviderConfig) -> Self {
        let mut retry =
            RetryConfig::new(config.retry_max_duration().unwrap_or(DEFAULT_RETRY_DURATION));
        if let Some(interval) = config.retry_interval() {
            retry = retry.with_interval(interval);
        }
        Self {
            api,
            locks: KeyedMutex::new(),
            profiles: WaitProfiles::new(config),
            retry,
        }
    }

    /// Load `stratus.yaml` (see [`ProviderConfig::load`]) and build a provider.
    pub fn from_config_file(api: Arc<dyn NifcloudApi>) -> Result<Self> {
        let config = ProviderConfig::load()?;
        if let Some(region) = &config.region {
            tracing::info!("Using NIFCLOUD region {}", region);
        }
        Ok(Self::with_config(api, config))
    }

    /// Share a lock registry with other providers in the same process.
    pub fn with_locks(mut self, locks: KeyedMutex) -> Self {
        self.locks = locks;
        self
    }

    pub fn profiles(&self) -> &WaitProfiles {
        &self.profiles
    }

    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }

    async fn wait<P: StateProber>(
        &self,
        kind: ResourceKind,
        id: &str,
        prober: &P,
        config: &PollConfig,
    ) -> Result<Option<P::Snapshot>> {
        tracing::info!("Waiting for {} {} to reach {:?}", kind, id, config.target());
        let resource = format!("{} {}", kind, id);
        let snapshot = Poller::new(config)
            .run(id, prober)
            .await
            .into_result(&resource, config)?;
        tracing::info!("{} {} converged", kind, id);
        Ok(snapshot)
    }

    async fn wait_found<P: StateProber>(
        &self,
        kind: ResourceKind,
        id: &str,
        prober: &P,
        config: &PollConfig,
    ) -> Result<P::Snapshot> {
        self.wait(kind, id, prober, config).await?.ok_or_else(|| {
            NifcloudError::Cloud(CloudError::MalformedResponse(format!(
                "{} {} converged without a snapshot",
                kind, id
            )))
        })
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Wait for a newly created or restarted instance to run.
    pub async fn wait_instance_running(&self, instance_id: &str) -> Result<InstanceInfo> {
        let prober = InstanceProber::new(Arc::clone(&self.api));
        let config = self.profiles.instance_running(Operation::Create);
        self.wait_found(ResourceKind::Instance, instance_id, &prober, &config)
            .await
    }

    /// Stop the instance if needed, then terminate it and wait until it is gone.
    pub async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        let prober = InstanceProber::new(Arc::clone(&self.api));

        let current = prober
            .probe(instance_id)
            .await
            .map_err(|err| request_error("describe", ResourceKind::Instance, instance_id, err))?;
        if current.is_not_found() {
            tracing::info!("Instance {} already gone", instance_id);
            return Ok(());
        }

        if current.state() == "terminated" {
            tracing::info!("Instance {} already terminated", instance_id);
            return Ok(());
        }

        if current.state() != "stopped" {
            tracing::info!("Stopping instance {}", instance_id);
            if let Err(err) = self.api.stop_instance(instance_id).await {
                let err = CloudError::from(err);
                if !is_api_error(&err, codes::INSTANCE_STOP_PROCESSING, "") {
                    return Err(request_error("stop", ResourceKind::Instance, instance_id, err));
                }
                tracing::warn!("Instance {} is already stopping: {}", instance_id, err);
            }
            let config = self.profiles.instance_stopped();
            self.wait(ResourceKind::Instance, instance_id, &prober, &config)
                .await?;
        }

        tracing::info!("Terminating instance {}", instance_id);
        if let Err(err) = self.api.terminate_instance(instance_id).await {
            let err = CloudError::from(err);
            if is_api_error(&err, codes::INSTANCE_NOT_FOUND, "") {
                tracing::info!("Instance {} already gone", instance_id);
                return Ok(());
            }
            return Err(request_error(
                "terminate",
                ResourceKind::Instance,
                instance_id,
                err,
            ));
        }

        let config = self.profiles.instance_terminated();
        self.wait(ResourceKind::Instance, instance_id, &prober, &config)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Database instances
    // ========================================================================

    /// Create a database instance and wait until it is available.
    ///
    /// The create call is resubmitted while its security group is still
    /// being processed.
    pub async fn create_db_instance(
        &self,
        input: &CreateDbInstanceInput,
    ) -> Result<DbInstanceInfo> {
        if input.identifier.is_empty() {
            return Err(NifcloudError::InvalidInput(
                "DB instance identifier is required".to_string(),
            ));
        }

        let api = &self.api;
        let policy = RetryPolicy::none().on_code(codes::DB_SECURITY_GROUP_PROCESSING);
        tracing::info!("Creating DB instance {}", input.identifier);
        retry_mutation(
            move || async move {
                api.create_db_instance(input)
                    .await
                    .map_err(CloudError::from)
            },
            &policy,
            &self.retry,
        )
        .await
        .map_err(|err| request_error("create", ResourceKind::DbInstance, &input.identifier, err))?;

        let prober = DbInstanceProber::new(Arc::clone(&self.api));
        let config = self.profiles.db_instance_available();
        self.wait_found(ResourceKind::DbInstance, &input.identifier, &prober, &config)
            .await
    }

    /// Modify a database instance and wait for the change to settle.
    pub async fn modify_db_instance(
        &self,
        input: &ModifyDbInstanceInput,
    ) -> Result<DbInstanceInfo> {
        let api = &self.api;
        let policy = RetryPolicy::none().on_code(codes::DB_PARAMETER_GROUP_APPLYING);
        let retry = RetryConfig {
            max_duration: MODIFY_RETRY_DURATION,
            ..self.retry.clone()
        };
        tracing::info!("Modifying DB instance {}", input.identifier);
        retry_mutation(
            move || async move {
                api.modify_db_instance(input)
                    .await
                    .map_err(CloudError::from)
            },
            &policy,
            &retry,
        )
        .await
        .map_err(|err| request_error("modify", ResourceKind::DbInstance, &input.identifier, err))?;

        let prober = DbInstanceProber::new(Arc::clone(&self.api));
        let config = self.profiles.db_instance_modified();
        self.wait_found(ResourceKind::DbInstance, &input.identifier, &prober, &config)
            .await
    }

    /// Delete a database instance and wait until it disappears.
    ///
    /// A repeated delete of an instance that is already being deleted still
    /// waits for it to go away.
    pub async fn delete_db_instance(&self, input: &DeleteDbInstanceInput) -> Result<()> {
        tracing::info!("Deleting DB instance {}", input.identifier);
        if let Err(err) = self.api.delete_db_instance(input).await {
            let err = CloudError::from(err);
            if is_api_error(&err, codes::DB_INSTANCE_NOT_FOUND, codes::ALREADY_BEING_DELETED) {
                tracing::info!("DB instance {} is already being deleted", input.identifier);
            } else if is_api_error(&err, codes::DB_INSTANCE_NOT_FOUND, "") {
                tracing::info!("DB instance {} already gone", input.identifier);
                return Ok(());
            } else {
                return Err(request_error(
                    "delete",
                    ResourceKind::DbInstance,
                    &input.identifier,
                    err,
                ));
            }
        }

        let prober = DbInstanceProber::new(Arc::clone(&self.api));
        let config = self.profiles.db_instance_deleted();
        self.wait(ResourceKind::DbInstance, &input.identifier, &prober, &config)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Network
    // ========================================================================

    pub async fn delete_vpn_gateway(&self, vpn_gateway_id: &str) -> Result<()> {
        let api = &self.api;
        tracing::info!("Deleting VPN gateway {}", vpn_gateway_id);
        let deleted = self
            .submit_tolerating_not_found(
                ResourceKind::VpnGateway,
                vpn_gateway_id,
                "delete",
                codes::VPN_GATEWAY_NOT_FOUND,
                &self.retry,
                move || async move { api.delete_vpn_gateway(vpn_gateway_id).await },
            )
            .await?;
        if !deleted {
            return Ok(());
        }

        let prober = VpnGatewayProber::new(Arc::clone(&self.api));
        let config = self.profiles.network_deleted(ResourceKind::VpnGateway);
        self.wait(ResourceKind::VpnGateway, vpn_gateway_id, &prober, &config)
            .await?;
        Ok(())
    }

    pub async fn delete_router(&self, router_id: &str) -> Result<()> {
        let api = &self.api;
        tracing::info!("Deleting router {}", router_id);
        let deleted = self
            .submit_tolerating_not_found(
                ResourceKind::Router,
                router_id,
                "delete",
                codes::ROUTER_NOT_FOUND,
                &self.retry,
                move || async move { api.delete_router(router_id).await },
            )
            .await?;
        if !deleted {
            return Ok(());
        }

        let prober = RouterProber::new(Arc::clone(&self.api));
        let config = self.profiles.network_deleted(ResourceKind::Router);
        self.wait(ResourceKind::Router, router_id, &prober, &config)
            .await?;
        Ok(())
    }

    /// Wait for a VPN gateway to become available after create or update.
    pub async fn wait_vpn_gateway_available(
        &self,
        vpn_gateway_id: &str,
        operation: Operation,
    ) -> Result<()> {
        let prober = VpnGatewayProber::new(Arc::clone(&self.api));
        let config = self
            .profiles
            .network_available(ResourceKind::VpnGateway, operation);
        self.wait(ResourceKind::VpnGateway, vpn_gateway_id, &prober, &config)
            .await?;
        Ok(())
    }

    /// Wait for a router to become available after create or update.
    pub async fn wait_router_available(&self, router_id: &str, operation: Operation) -> Result<()> {
        let prober = RouterProber::new(Arc::clone(&self.api));
        let config = self
            .profiles
            .network_available(ResourceKind::Router, operation);
        self.wait(ResourceKind::Router, router_id, &prober, &config)
            .await?;
        Ok(())
    }

    /// Issue a removal, retrying any error, and report whether the target
    /// still existed.
    async fn submit_tolerating_not_found<F, Fut>(
        &self,
        kind: ResourceKind,
        id: &str,
        operation: &'static str,
        not_found_code: &str,
        retry: &RetryConfig,
        mut submit: F,
    ) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<()>>,
    {
        let found = retry_mutation(
            || {
                let call = submit();
                async move {
                    match call.await {
                        Ok(()) => Ok(true),
                        Err(err) if err.code == not_found_code => Ok(false),
                        Err(err) => Err(CloudError::from(err)),
                    }
                }
            },
            &RetryPolicy::any(),
            retry,
        )
        .await
        .map_err(|err| request_error(operation, kind, id, err))?;
        if !found {
            tracing::info!("{} {} already gone", kind, id);
        }
        Ok(found)
    }

    // ========================================================================
    // Volumes
    // ========================================================================

    /// Wait for a volume to be usable after create or resize.
    pub async fn wait_volume_ready(
        &self,
        volume_id: &str,
        operation: Operation,
    ) -> Result<VolumeInfo> {
        let prober = VolumeProber::new(Arc::clone(&self.api));
        let config = self.profiles.volume_ready(operation);
        self.wait_found(ResourceKind::Volume, volume_id, &prober, &config)
            .await
    }

    /// Detach a volume from its instance, delete it and wait until it is gone.
    pub async fn delete_volume(&self, volume_id: &str, instance_id: &str) -> Result<()> {
        let prober = VolumeProber::new(Arc::clone(&self.api));

        tracing::info!("Detaching volume {} from {}", volume_id, instance_id);
        if let Err(err) = self.api.detach_volume(volume_id, instance_id).await {
            let err = CloudError::from(err);
            if is_api_error(&err, codes::VOLUME_NOT_FOUND, "") {
                return Ok(());
            }
            return Err(request_error("detach", ResourceKind::Volume, volume_id, err));
        }
        let config = self.profiles.volume_detached();
        self.wait(ResourceKind::Volume, volume_id, &prober, &config)
            .await?;

        tracing::info!("Deleting volume {}", volume_id);
        if let Err(err) = self.api.delete_volume(volume_id).await {
            let err = CloudError::from(err);
            if is_api_error(&err, codes::VOLUME_NOT_FOUND, "") {
                return Ok(());
            }
            return Err(request_error("delete", ResourceKind::Volume, volume_id, err));
        }

        let config = self.profiles.volume_deleted();
        self.wait(ResourceKind::Volume, volume_id, &prober, &config)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Addresses
    // ========================================================================

    /// Associate a public IP, retrying while the address is still processing.
    pub async fn associate_address(&self, public_ip: &str, instance_id: &str) -> Result<()> {
        let api = &self.api;
        let policy = RetryPolicy::none().on_code(codes::IP_ADDRESS_PROCESSING);
        tracing::info!("Associating {} with {}", public_ip, instance_id);
        retry_mutation(
            move || async move {
                api.associate_address(public_ip, instance_id)
                    .await
                    .map_err(CloudError::from)
            },
            &policy,
            &self.retry,
        )
        .await
        .map_err(|err| request_error("associate", ResourceKind::Instance, instance_id, err))?;
        Ok(())
    }

    // ========================================================================
    // Security groups
    // ========================================================================

    /// Wait for a newly created security group to be listed.
    pub async fn wait_security_group_exists(
        &self,
        group_name: &str,
    ) -> Result<SecurityGroupInfo> {
        let prober = SecurityGroupProber::new(Arc::clone(&self.api));
        let config = self.profiles.security_group_exists();
        self.wait_found(ResourceKind::SecurityGroup, group_name, &prober, &config)
            .await
    }

    /// Delete a security group, retrying while instances still reference it.
    pub async fn delete_security_group(&self, group_name: &str) -> Result<()> {
        let _guard = self.locks.lock(group_name).await;
        let api = &self.api;
        let retry = RetryConfig {
            max_duration: self
                .profiles
                .timeout(ResourceKind::SecurityGroup, Operation::Delete),
            ..self.retry.clone()
        };
        tracing::info!("Deleting security group {}", group_name);
        self.submit_tolerating_not_found(
            ResourceKind::SecurityGroup,
            group_name,
            "delete",
            codes::SECURITY_GROUP_NOT_FOUND,
            &retry,
            move || async move { api.delete_security_group(group_name).await },
        )
        .await?;
        Ok(())
    }

    /// Add an ingress rule and wait until the group reports it.
    ///
    /// Rule changes to one group are serialized.
    pub async fn authorize_ingress(
        &self,
        group_name: &str,
        rule: &IpPermission,
    ) -> Result<SecurityGroupInfo> {
        let _guard = self.locks.lock(group_name).await;

        tracing::info!("Authorizing {:?} on {}", rule, group_name);
        self.api
            .authorize_ingress(group_name, rule)
            .await
            .map_err(|err| {
                request_error("authorize ingress on", ResourceKind::SecurityGroup, group_name, err)
            })?;

        let prober = IngressRuleProber::new(Arc::clone(&self.api), rule.clone());
        let config = self.profiles.ingress_rule(true);
        self.wait_found(ResourceKind::SecurityGroup, group_name, &prober, &config)
            .await
    }

    /// Remove an ingress rule and wait until the group no longer reports it.
    ///
    /// The revoke is resubmitted on any error; a rule the group no longer
    /// has counts as removed.
    pub async fn revoke_ingress(&self, group_name: &str, rule: &IpPermission) -> Result<()> {
        let _guard = self.locks.lock(group_name).await;
        let api = &self.api;

        tracing::info!("Revoking {:?} on {}", rule, group_name);
        let found = self
            .submit_tolerating_not_found(
                ResourceKind::SecurityGroup,
                group_name,
                "revoke ingress on",
                codes::SECURITY_GROUP_INGRESS_NOT_FOUND,
                &self.retry,
                move || async move { api.revoke_ingress(group_name, rule).await },
            )
            .await?;
        if !found {
            return Ok(());
        }

        let prober = IngressRuleProber::new(Arc::clone(&self.api), rule.clone());
        let config = self.profiles.ingress_rule(false);
        self.wait(ResourceKind::SecurityGroup, group_name, &prober, &config)
            .await?;
        Ok(())
    }
}
