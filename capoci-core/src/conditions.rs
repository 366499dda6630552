use std::fmt::Display;

use k8s_openapi::chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub const READY: &str = "Ready";
pub const CLUSTER_READY: &str = "ClusterReady";

pub const CONTROL_PLANE_READY: &str = "ControlPlaneReady";
pub const CONTROL_PLANE_NOT_READY_REASON: &str = "ControlPlaneNotReady";
pub const CONTROL_PLANE_PROVISION_FAILED_REASON: &str = "ControlPlaneProvisionFailed";
pub const CONTROL_PLANE_DELETION_IN_PROGRESS_REASON: &str = "ControlPlaneDeletionInProgress";
pub const KUBECONFIG_RECONCILE_FAILED_REASON: &str = "KubeconfigReconcileFailed";

pub const INSTANCE_POOL_READY: &str = "InstancePoolReady";
pub const INSTANCE_POOL_NOT_FOUND_REASON: &str = "InstancePoolNotFound";
pub const INSTANCE_POOL_PROVISION_FAILED_REASON: &str = "InstancePoolProvisionFailed";
pub const INSTANCE_POOL_DELETION_IN_PROGRESS_REASON: &str = "InstancePoolDeletionInProgress";
pub const INSTANCE_POOL_NOT_READY_REASON: &str = "InstancePoolNotReady";

pub const LAUNCH_TEMPLATE_READY: &str = "LaunchTemplateReady";
pub const LAUNCH_TEMPLATE_NOT_FOUND_REASON: &str = "LaunchTemplateNotFound";
pub const LAUNCH_TEMPLATE_CREATE_FAILED_REASON: &str = "LaunchTemplateCreateFailed";

pub const WAITING_FOR_BOOTSTRAP_DATA_REASON: &str = "WaitingForBootstrapData";

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

impl Display for ConditionSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionSeverity::Error => f.write_str("Error"),
            ConditionSeverity::Warning => f.write_str("Warning"),
            ConditionSeverity::Info => f.write_str("Info"),
        }
    }
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// only set for conditions that are false
    pub severity: Option<ConditionSeverity>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Status types carrying a condition list.
///
/// The `mark_*` methods replace the condition of a given type in place and only bump
/// `lastTransitionTime` when the boolean status actually changes.
pub trait Conditions {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn get_condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions().iter().find(|c| c.type_ == type_)
    }

    fn is_condition_true(&self, type_: &str) -> bool {
        self.get_condition(type_)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }

    fn mark_true(&mut self, type_: &str) {
        set_condition(
            self.conditions_mut(),
            Condition {
                type_: type_.to_owned(),
                status: ConditionStatus::True,
                ..Default::default()
            },
        );
    }

    fn mark_false(
        &mut self,
        type_: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: impl Into<String>,
    ) {
        let message = message.into();
        set_condition(
            self.conditions_mut(),
            Condition {
                type_: type_.to_owned(),
                status: ConditionStatus::False,
                severity: Some(severity),
                reason: Some(reason.to_owned()),
                message: (!message.is_empty()).then_some(message),
                last_transition_time: None,
            },
        );
    }
}

fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time
            } else {
                Some(Utc::now())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(Utc::now());
            conditions.push(condition);
        }
    }
}
