use std::fmt::Display;

/// Lifecycle of a managed Kubernetes control plane as reported by the container engine.
///
/// Legal transitions: `Creating -> Active | Failed`, `Active -> Updating -> Active` and
/// any state `-> Deleting -> Deleted`. States the service reports but this enumeration
/// doesn't know land in `Unrecognized` and are handled as fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterLifecycleState {
    Creating,
    Active,
    Failed,
    Updating,
    Deleting,
    Deleted,
    Unrecognized(String),
}

/// what a reconcile pass should do with a control plane in a given state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlPlanePhase {
    Provisioning,
    Ready,
    Deleting,
    Gone,
    Fatal,
}

impl ClusterLifecycleState {
    pub fn phase(&self) -> ControlPlanePhase {
        match self {
            ClusterLifecycleState::Creating | ClusterLifecycleState::Updating => {
                ControlPlanePhase::Provisioning
            }
            ClusterLifecycleState::Active => ControlPlanePhase::Ready,
            ClusterLifecycleState::Deleting => ControlPlanePhase::Deleting,
            ClusterLifecycleState::Deleted => ControlPlanePhase::Gone,
            ClusterLifecycleState::Failed | ClusterLifecycleState::Unrecognized(_) => {
                ControlPlanePhase::Fatal
            }
        }
    }

    pub fn can_transition_to(&self, next: &ClusterLifecycleState) -> bool {
        use ClusterLifecycleState::*;

        if self == next || *next == Deleting {
            return true;
        }

        matches!(
            (self, next),
            (Creating, Active)
                | (Creating, Failed)
                | (Active, Updating)
                | (Updating, Active)
                | (Deleting, Deleted)
        )
    }
}

impl From<&str> for ClusterLifecycleState {
    fn from(value: &str) -> Self {
        match value {
            "CREATING" => ClusterLifecycleState::Creating,
            "ACTIVE" => ClusterLifecycleState::Active,
            "FAILED" => ClusterLifecycleState::Failed,
            "UPDATING" => ClusterLifecycleState::Updating,
            "DELETING" => ClusterLifecycleState::Deleting,
            "DELETED" => ClusterLifecycleState::Deleted,
            other => ClusterLifecycleState::Unrecognized(other.to_owned()),
        }
    }
}

impl Display for ClusterLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterLifecycleState::Creating => f.write_str("CREATING"),
            ClusterLifecycleState::Active => f.write_str("ACTIVE"),
            ClusterLifecycleState::Failed => f.write_str("FAILED"),
            ClusterLifecycleState::Updating => f.write_str("UPDATING"),
            ClusterLifecycleState::Deleting => f.write_str("DELETING"),
            ClusterLifecycleState::Deleted => f.write_str("DELETED"),
            ClusterLifecycleState::Unrecognized(state) => f.write_str(state),
        }
    }
}

/// Lifecycle of a compute instance pool.
///
/// `Provisioning -> Starting -> Running` is the happy path, `Running <-> Scaling` happens
/// on resize and `Terminating -> Terminated` on teardown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstancePoolLifecycleState {
    Provisioning,
    Starting,
    Running,
    Scaling,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
    Unrecognized(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstancePoolPhase {
    Pending,
    Ready,
    Fatal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstancePoolTeardown {
    /// pool still serves instances, termination has to be requested
    Terminate,
    InProgress,
    Done,
}

impl InstancePoolLifecycleState {
    pub fn phase(&self) -> InstancePoolPhase {
        use InstancePoolLifecycleState::*;

        match self {
            Provisioning | Starting | Scaling => InstancePoolPhase::Pending,
            Running => InstancePoolPhase::Ready,
            Stopping | Stopped | Terminating | Terminated | Unrecognized(_) => {
                InstancePoolPhase::Fatal
            }
        }
    }

    pub fn teardown(&self) -> InstancePoolTeardown {
        use InstancePoolLifecycleState::*;

        match self {
            Terminating => InstancePoolTeardown::InProgress,
            Terminated => InstancePoolTeardown::Done,
            Provisioning | Starting | Running | Scaling | Stopping | Stopped
            | Unrecognized(_) => InstancePoolTeardown::Terminate,
        }
    }

    pub fn can_transition_to(&self, next: &InstancePoolLifecycleState) -> bool {
        use InstancePoolLifecycleState::*;

        if self == next || *next == Terminating {
            return true;
        }

        matches!(
            (self, next),
            (Provisioning, Starting)
                | (Provisioning, Running)
                | (Starting, Running)
                | (Running, Scaling)
                | (Scaling, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Terminating, Terminated)
        )
    }
}

impl From<&str> for InstancePoolLifecycleState {
    fn from(value: &str) -> Self {
        match value {
            "PROVISIONING" => InstancePoolLifecycleState::Provisioning,
            "STARTING" => InstancePoolLifecycleState::Starting,
            "RUNNING" => InstancePoolLifecycleState::Running,
            "SCALING" => InstancePoolLifecycleState::Scaling,
            "STOPPING" => InstancePoolLifecycleState::Stopping,
            "STOPPED" => InstancePoolLifecycleState::Stopped,
            "TERMINATING" => InstancePoolLifecycleState::Terminating,
            "TERMINATED" => InstancePoolLifecycleState::Terminated,
            other => InstancePoolLifecycleState::Unrecognized(other.to_owned()),
        }
    }
}

impl Display for InstancePoolLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstancePoolLifecycleState::Provisioning => f.write_str("PROVISIONING"),
            InstancePoolLifecycleState::Starting => f.write_str("STARTING"),
            InstancePoolLifecycleState::Running => f.write_str("RUNNING"),
            InstancePoolLifecycleState::Scaling => f.write_str("SCALING"),
            InstancePoolLifecycleState::Stopping => f.write_str("STOPPING"),
            InstancePoolLifecycleState::Stopped => f.write_str("STOPPED"),
            InstancePoolLifecycleState::Terminating => f.write_str("TERMINATING"),
            InstancePoolLifecycleState::Terminated => f.write_str("TERMINATED"),
            InstancePoolLifecycleState::Unrecognized(state) => f.write_str(state),
        }
    }
}
