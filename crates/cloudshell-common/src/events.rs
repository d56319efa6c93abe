//! Kubernetes Events emitted on CloudShell sessions
//!
//! Every event the operator emits is named by a [`Reason`], which fixes its
//! type (Normal or Warning) and its action, so call sites only pick the reason
//! and write a note. Events show up under `kubectl describe cloudshell`.
//!
//! Publishing is fire-and-forget: a failed event is logged and never fails
//! the reconciliation that emitted it.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Why an event was emitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// Session identifier derived and persisted
    IdentityAssigned,
    /// A child resource was created
    ChildCreated,
    /// A drifted child resource was patched back to its desired state
    ChildPatched,
    /// The session workload became available
    SessionReady,
    /// The session workload lost availability
    SessionNotReady,
    /// The session cannot be reconciled as given
    ValidationFailed,
}

impl Reason {
    /// Value of the event's `reason` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::IdentityAssigned => "IdentityAssigned",
            Reason::ChildCreated => "ChildCreated",
            Reason::ChildPatched => "ChildPatched",
            Reason::SessionReady => "SessionReady",
            Reason::SessionNotReady => "SessionNotReady",
            Reason::ValidationFailed => "ValidationFailed",
        }
    }

    /// Warning for conditions needing attention, Normal otherwise
    pub fn event_type(&self) -> EventType {
        match self {
            Reason::SessionNotReady | Reason::ValidationFailed => EventType::Warning,
            _ => EventType::Normal,
        }
    }

    /// Value of the event's `action` field
    pub fn action(&self) -> &'static str {
        match self {
            Reason::ChildCreated => "Create",
            Reason::ChildPatched => "Patch",
            _ => "Reconcile",
        }
    }
}

/// Sink for session events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Emit `reason` on `subject` with a human-readable note
    async fn publish(&self, subject: &ObjectReference, reason: Reason, note: String);
}

/// Publisher backed by `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`.
    ///
    /// The reporting instance is taken from `POD_NAME` when set.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, subject: &ObjectReference, reason: Reason, note: String) {
        let event = Event {
            type_: reason.event_type(),
            reason: reason.as_str().to_string(),
            note: Some(note),
            action: reason.action().to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, subject).await {
            warn!(
                reason = reason.as_str(),
                object = subject.name.as_deref().unwrap_or_default(),
                error = %e,
                "failed to publish event"
            );
        }
    }
}

/// Publisher that drops every event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _subject: &ObjectReference, _reason: Reason, _note: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_reserved_for_degraded_sessions() {
        let warnings: Vec<Reason> = [
            Reason::IdentityAssigned,
            Reason::ChildCreated,
            Reason::ChildPatched,
            Reason::SessionReady,
            Reason::SessionNotReady,
            Reason::ValidationFailed,
        ]
        .into_iter()
        .filter(|r| r.event_type() == EventType::Warning)
        .collect();
        assert_eq!(warnings, vec![Reason::SessionNotReady, Reason::ValidationFailed]);
    }

    #[test]
    fn child_writes_carry_their_action() {
        assert_eq!(Reason::ChildCreated.action(), "Create");
        assert_eq!(Reason::ChildPatched.action(), "Patch");
        assert_eq!(Reason::SessionReady.action(), "Reconcile");
        assert_eq!(Reason::ChildPatched.as_str(), "ChildPatched");
    }

    #[tokio::test]
    async fn noop_publisher_accepts_events() {
        NoopEventPublisher
            .publish(
                &ObjectReference::default(),
                Reason::ChildCreated,
                "Created Service cloudshell-abc".to_string(),
            )
            .await;
    }
}
