//! Instance pools backing `OCIMachinePool` objects.

use std::{future, time::Duration};

use capoci_core::{
    cloud::{
        compute::{
            CreateInstancePoolDetails, InstanceConfiguration, InstanceLaunchDetails, InstancePool,
            PlacementConfiguration,
        },
        optional, CloudError,
    },
    conditions::{
        ConditionSeverity, Conditions, INSTANCE_POOL_DELETION_IN_PROGRESS_REASON,
        INSTANCE_POOL_NOT_READY_REASON, INSTANCE_POOL_PROVISION_FAILED_REASON, INSTANCE_POOL_READY,
        LAUNCH_TEMPLATE_CREATE_FAILED_REASON, LAUNCH_TEMPLATE_READY,
        WAITING_FOR_BOOTSTRAP_DATA_REASON,
    },
    lifecycle::{InstancePoolLifecycleState, InstancePoolPhase, InstancePoolTeardown},
};
use data_encoding::BASE64;
use kube::runtime::{controller::Action, events::EventType};
use log::{error, info, warn};

use crate::{
    error::ReconcilerError,
    scope::{
        add_finalizer, machine_pool::PROVIDER_ID_PREFIX, remove_finalizer, MachinePoolScope,
        MACHINE_POOL_FINALIZER,
    },
};

use super::{delete_ignoring_missing, lookup, Lookup};

pub const MACHINE_POOL_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MACHINE_POOL_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
pub const INSTANCE_POOL_TEARDOWN_INTERVAL: Duration = Duration::from_secs(30);

pub const CREATE_MACHINE_ERROR: &str = "CreateMachineError";
pub const BOOTSTRAP_DATA_KEY: &str = "value";
pub const USER_DATA_METADATA_KEY: &str = "user_data";

/// failure domain new instance pools are placed in
const DEFAULT_FAILURE_DOMAIN: &str = "1";

async fn bootstrap_data(scope: &MachinePoolScope, secret_name: &str) -> Result<String, ReconcilerError> {
    let secret = scope
        .store
        .get_secret(scope.namespace(), secret_name)
        .await?
        .ok_or_else(|| ReconcilerError::MissingObjectData(format!("secret {secret_name}").into()))?;
    let value = secret
        .data
        .as_ref()
        .and_then(|data| data.get(BOOTSTRAP_DATA_KEY))
        .ok_or_else(|| {
            ReconcilerError::MissingObjectData(format!("secret {secret_name} key {BOOTSTRAP_DATA_KEY}").into())
        })?;

    Ok(BASE64.encode(&value.0))
}

fn launch_details(scope: &MachinePoolScope, user_data: String) -> Result<InstanceLaunchDetails, ReconcilerError> {
    let config = &scope.oci_machine_pool.spec.instance_configuration;
    let subnet_id = scope
        .worker_subnet_id()
        .ok_or_else(|| ReconcilerError::MissingObjectData("worker subnet id".into()))?;
    let mut metadata = config.metadata.clone().unwrap_or_default();
    metadata.insert(USER_DATA_METADATA_KEY.to_owned(), user_data);

    Ok(InstanceLaunchDetails {
        shape: config.shape.clone(),
        shape_config: config.shape_config.clone(),
        image_id: config.image_id.clone(),
        boot_volume_size_in_gbs: config.boot_volume_size_in_gbs,
        subnet_id: subnet_id.to_owned(),
        nsg_ids: scope.worker_nsg_id().map(str::to_owned).into_iter().collect(),
        assign_public_ip: config.assign_public_ip.unwrap_or(false),
        metadata,
    })
}

/// A stored id that can't be read for any reason is not reused, the lookup falls back to the name.
async fn find_instance_configuration(
    scope: &MachinePoolScope,
) -> Result<Lookup<InstanceConfiguration>, ReconcilerError> {
    let compute = &scope.clients.compute_management;
    let stored_id = scope
        .status()
        .and_then(|status| status.instance_configuration_id.as_deref());

    let stored = match stored_id {
        Some(id) => match compute.get_instance_configuration(id).await {
            Ok(configuration) => Some(configuration),
            Err(error) => {
                warn!(
                    "Couldn't get stored instance configuration '{id}', looking it up by name: {error}"
                );
                None
            }
        },
        None => None,
    };

    lookup(
        "instance configuration",
        scope.accessor.resource_identifier(),
        scope.name(),
        stored.map(|configuration| future::ready(Ok::<_, CloudError>(configuration))),
        || compute.list_instance_configurations(scope.compartment_id()),
    )
    .await
}

/// Returns the id of the launch template, creating it from the bootstrap data when needed.
async fn reconcile_instance_configuration(
    scope: &mut MachinePoolScope,
    secret_name: &str,
) -> Result<String, ReconcilerError> {
    let id = match find_instance_configuration(scope)
        .await?
        .owned("instance configuration")?
    {
        Some(existing) => existing.id,
        None => {
            let user_data = bootstrap_data(scope, secret_name).await?;
            let launch = launch_details(scope, user_data)?;
            let created = scope
                .clients
                .compute_management
                .create_instance_configuration(scope.resource_details(), launch)
                .await
                .map_err(ReconcilerError::cloud("create instance configuration"))?;
            info!(
                "Created instance configuration '{}' ({})",
                scope.name(),
                created.id
            );

            created.id
        }
    };

    let stored = scope
        .status()
        .and_then(|status| status.instance_configuration_id.as_deref());
    if stored != Some(id.as_str()) {
        scope.status_mut().instance_configuration_id = Some(id.clone());
        scope.patch_object().await?;
    }

    Ok(id)
}

async fn find_instance_pool(scope: &MachinePoolScope) -> Result<Lookup<InstancePool>, ReconcilerError> {
    let compute = &scope.clients.compute_management;

    lookup(
        "instance pool",
        scope.accessor.resource_identifier(),
        scope.name(),
        scope
            .instance_pool_id()
            .map(|id| compute.get_instance_pool(id)),
        || compute.list_instance_pools(scope.compartment_id(), scope.name()),
    )
    .await
}

async fn get_or_create_instance_pool(
    scope: &MachinePoolScope,
    instance_configuration_id: &str,
) -> Result<InstancePool, ReconcilerError> {
    if let Some(existing) = find_instance_pool(scope).await?.owned("instance pool")? {
        return Ok(existing);
    }

    let availability_domain = scope
        .failure_domain_availability_domain(DEFAULT_FAILURE_DOMAIN)
        .ok_or_else(|| {
            ReconcilerError::MissingObjectData(
                format!("failureDomains.{DEFAULT_FAILURE_DOMAIN}").into(),
            )
        })?;
    let subnet_id = scope
        .worker_subnet_id()
        .ok_or_else(|| ReconcilerError::MissingObjectData("worker subnet id".into()))?;

    let created = scope
        .clients
        .compute_management
        .create_instance_pool(CreateInstancePoolDetails {
            details: scope.resource_details(),
            instance_configuration_id: instance_configuration_id.to_owned(),
            size: 1,
            placement_configurations: vec![PlacementConfiguration {
                availability_domain: availability_domain.to_owned(),
                primary_subnet_id: subnet_id.to_owned(),
            }],
        })
        .await
        .map_err(ReconcilerError::cloud("create instance pool"))?;
    info!("Created instance pool '{}' ({})", scope.name(), created.id);

    Ok(created)
}

fn record_lifecycle_state(
    scope: &mut MachinePoolScope,
    pool: &InstancePool,
) -> InstancePoolLifecycleState {
    let state = InstancePoolLifecycleState::from(pool.lifecycle_state.as_str());
    let status = scope.status_mut();

    if let Some(previous) = status
        .lifecycle_state
        .as_deref()
        .map(InstancePoolLifecycleState::from)
    {
        if !previous.can_transition_to(&state) {
            warn!(
                "Instance pool {} moved from {previous} to {state}, which isn't a legal transition!",
                pool.id
            );
        }
    }
    status.lifecycle_state = Some(state.to_string());

    state
}

/// MachinePool replicas clamped to the pool's size bounds.
fn desired_size(scope: &MachinePoolScope) -> i32 {
    let spec = &scope.oci_machine_pool.spec;
    let mut size = scope.machine_pool.spec.replicas.unwrap_or(1);

    if let Some(max) = spec.max_size {
        size = size.min(max);
    }
    if let Some(min) = spec.min_size {
        size = size.max(min);
    }

    size
}

async fn reconcile_size(scope: &MachinePoolScope, pool: &InstancePool) -> Result<(), ReconcilerError> {
    let desired = desired_size(scope);

    if pool.size != desired {
        scope
            .clients
            .compute_management
            .update_instance_pool_size(&pool.id, desired)
            .await
            .map_err(ReconcilerError::cloud("update instance pool"))?;
        info!(
            "Resized instance pool {} from {} to {desired}",
            pool.id, pool.size
        );
    }

    Ok(())
}

/// Records the provider ids of the running instances of the pool.
async fn reconcile_instances(scope: &mut MachinePoolScope, pool: &InstancePool) -> Result<(), ReconcilerError> {
    let instance_ids = scope
        .clients
        .compute_management
        .list_instance_pool_instances(scope.compartment_id(), &pool.id)
        .await
        .map_err(ReconcilerError::cloud("list instance pool instances"))?;

    let mut provider_ids = Vec::with_capacity(instance_ids.len());
    for id in &instance_ids {
        let instance = optional(scope.clients.compute.get_instance(id).await)
            .map_err(ReconcilerError::cloud("get instance"))?;

        if let Some(instance) = instance.filter(|instance| instance.is_running()) {
            provider_ids.push(format!("{PROVIDER_ID_PREFIX}{}", instance.id));
        }
    }

    scope.status_mut().replicas = i32::try_from(provider_ids.len()).unwrap_or(i32::MAX);
    scope.oci_machine_pool.spec.provider_id_list = provider_ids;

    Ok(())
}

pub async fn reconcile_machine_pool(scope: &mut MachinePoolScope) -> Result<Action, ReconcilerError> {
    if scope.has_failed() {
        info!(
            "Machine pool {}/{} has failed, not reconciling it anymore",
            scope.namespace(),
            scope.name()
        );

        return Ok(Action::await_change());
    }

    if add_finalizer(&mut scope.oci_machine_pool.metadata, MACHINE_POOL_FINALIZER) {
        scope.patch_object().await?;
    }

    let infrastructure_ready = scope
        .cluster
        .status
        .as_ref()
        .is_some_and(|status| status.infrastructure_ready);
    if !infrastructure_ready {
        info!(
            "Cluster infrastructure of machine pool {}/{} isn't ready yet",
            scope.namespace(),
            scope.name()
        );

        return Ok(Action::requeue(MACHINE_POOL_POLL_INTERVAL));
    }

    let Some(secret_name) = scope
        .machine_pool
        .spec
        .template
        .spec
        .bootstrap
        .data_secret_name
        .clone()
    else {
        scope
            .publish(
                EventType::Normal,
                WAITING_FOR_BOOTSTRAP_DATA_REASON,
                "Bootstrap data secret reference is not yet available",
            )
            .await;
        scope.status_mut().mark_false(
            INSTANCE_POOL_READY,
            WAITING_FOR_BOOTSTRAP_DATA_REASON,
            ConditionSeverity::Info,
            "",
        );

        return Ok(Action::requeue(MACHINE_POOL_POLL_INTERVAL));
    };

    let instance_configuration_id = match reconcile_instance_configuration(scope, &secret_name).await {
        Ok(id) => {
            scope.status_mut().mark_true(LAUNCH_TEMPLATE_READY);
            id
        }
        Err(error) => {
            scope.status_mut().mark_false(
                LAUNCH_TEMPLATE_READY,
                LAUNCH_TEMPLATE_CREATE_FAILED_REASON,
                ConditionSeverity::Error,
                error.to_string(),
            );

            return Err(error);
        }
    };

    let pool = get_or_create_instance_pool(scope, &instance_configuration_id).await?;
    scope.oci_machine_pool.spec.provider_id = Some(format!("{PROVIDER_ID_PREFIX}{}", pool.id));
    let state = record_lifecycle_state(scope, &pool);

    match state.phase() {
        InstancePoolPhase::Pending => {
            scope.status_mut().mark_false(
                INSTANCE_POOL_READY,
                INSTANCE_POOL_NOT_READY_REASON,
                ConditionSeverity::Info,
                "",
            );

            Ok(Action::requeue(MACHINE_POOL_POLL_INTERVAL))
        }
        InstancePoolPhase::Ready => {
            if !scope
                .status()
                .is_some_and(|status| status.is_condition_true(INSTANCE_POOL_READY))
            {
                scope
                    .publish(EventType::Normal, INSTANCE_POOL_READY, "Instance pool is in ready state")
                    .await;
                scope.status_mut().mark_true(INSTANCE_POOL_READY);
            }
            scope.status_mut().ready = true;

            reconcile_size(scope, &pool).await?;
            reconcile_instances(scope, &pool).await?;

            Ok(Action::requeue(MACHINE_POOL_RESYNC_INTERVAL))
        }
        InstancePoolPhase::Fatal => {
            let message = format!("Instance Pool status \"{state}\" is unexpected");
            error!("Instance pool {} can't recover: {message}", pool.id);

            let status = scope.status_mut();
            status.ready = false;
            status.mark_false(
                INSTANCE_POOL_READY,
                INSTANCE_POOL_PROVISION_FAILED_REASON,
                ConditionSeverity::Error,
                "",
            );
            status.failure_reason = Some(CREATE_MACHINE_ERROR.to_owned());
            status.failure_message = Some(message.clone());

            scope
                .publish(
                    EventType::Warning,
                    INSTANCE_POOL_PROVISION_FAILED_REASON,
                    message.clone(),
                )
                .await;

            Err(ReconcilerError::UnexpectedLifecycleState(message))
        }
    }
}

fn mark_terminating(scope: &mut MachinePoolScope) -> Action {
    let status = scope.status_mut();
    status.ready = false;
    status.mark_false(
        INSTANCE_POOL_READY,
        INSTANCE_POOL_DELETION_IN_PROGRESS_REASON,
        ConditionSeverity::Warning,
        "",
    );

    Action::requeue(INSTANCE_POOL_TEARDOWN_INTERVAL)
}

/// Terminates the instance pool, then deletes its launch template and releases the finalizer.
pub async fn delete_machine_pool(scope: &mut MachinePoolScope) -> Result<Action, ReconcilerError> {
    if let Some(pool) = find_instance_pool(scope).await?.deletable("instance pool") {
        let state = record_lifecycle_state(scope, &pool);

        match state.teardown() {
            InstancePoolTeardown::Terminate => {
                delete_ignoring_missing(
                    "instance pool",
                    scope
                        .clients
                        .compute_management
                        .terminate_instance_pool(&pool.id),
                )
                .await?;
                info!("Terminating instance pool '{}' ({})", scope.name(), pool.id);

                return Ok(mark_terminating(scope));
            }
            InstancePoolTeardown::InProgress => return Ok(mark_terminating(scope)),
            InstancePoolTeardown::Done => (),
        }
    }

    if let Some(configuration) = find_instance_configuration(scope)
        .await?
        .deletable("instance configuration")
    {
        delete_ignoring_missing(
            "instance configuration",
            scope
                .clients
                .compute_management
                .delete_instance_configuration(&configuration.id),
        )
        .await?;
        info!(
            "Deleted instance configuration '{}' ({})",
            scope.name(),
            configuration.id
        );
    }

    remove_finalizer(&mut scope.oci_machine_pool.metadata, MACHINE_POOL_FINALIZER);

    Ok(Action::await_change())
}
