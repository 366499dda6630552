use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{
    runtime::events::{Event, EventType, Recorder, Reporter},
    Client,
};
use log::warn;

pub const CONTROLLER_NAME: &str = "capoci-controller-manager";

/// Publishes Kubernetes events about reconciled objects.
///
/// Events are informational, a failure to publish one is logged and never fails a pass.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, reference: ObjectReference, type_: EventType, reason: &str, note: String);
}

pub struct RecorderPublisher {
    client: Client,
    reporter: Reporter,
}

impl RecorderPublisher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: CONTROLLER_NAME.to_owned(),
                instance: std::env::var("POD_NAME").ok(),
            },
        }
    }
}

#[async_trait]
impl EventPublisher for RecorderPublisher {
    async fn publish(&self, reference: ObjectReference, type_: EventType, reason: &str, note: String) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), reference);
        let event = Event {
            type_,
            reason: reason.to_owned(),
            note: Some(note),
            action: "Reconciling".to_owned(),
            secondary: None,
        };

        if let Err(error) = recorder.publish(event).await {
            warn!("Couldn't publish '{reason}' event! {error}");
        }
    }
}
