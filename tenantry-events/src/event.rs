//! Events and listeners

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use uuid::Uuid;

/// Something that can be published on an [`EventBus`](crate::EventBus).
///
/// Implementors only expose their metadata; name, id and timestamp are read
/// from it.
pub trait Event: Send + Sync + Debug + 'static {
    fn metadata(&self) -> &EventMetadata;

    fn as_any(&self) -> &dyn Any;

    fn event_name(&self) -> &str {
        &self.metadata().name
    }

    fn event_id(&self) -> Uuid {
        self.metadata().id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.metadata().timestamp
    }
}

/// Identity of a published event and its place in a causal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub id: Uuid,
    pub name: String,
    pub timestamp: DateTime<Utc>,

    /// Id of the first event of the chain
    pub correlation_id: Option<Uuid>,

    /// Id of the event that directly caused this one
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Metadata for an event caused by `cause`, sharing its correlation id.
    pub fn caused_by(name: impl Into<String>, cause: &EventMetadata) -> Self {
        Self {
            correlation_id: Some(cause.correlation_id.unwrap_or(cause.id)),
            causation_id: Some(cause.id),
            ..Self::new(name)
        }
    }

    /// Correlation id of the chain this event belongs to.
    pub fn chain_id(&self) -> Uuid {
        self.correlation_id.unwrap_or(self.id)
    }
}

/// Reacts to events of type `E`.
#[async_trait]
pub trait Listener<E: Event>: Send + Sync {
    async fn handle(&self, event: &E) -> Result<(), ListenerError>;
}

/// A listener gave up on an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Listener stored on the bus, with the concrete event type erased.
#[async_trait]
pub(crate) trait ErasedListener: Send + Sync {
    async fn handle_erased(&self, event: &dyn Event) -> Result<(), ListenerError>;
}

pub(crate) struct Typed<E, L> {
    listener: L,
    _event: PhantomData<fn(E)>,
}

impl<E, L> Typed<E, L> {
    pub(crate) fn new(listener: L) -> Self {
        Self {
            listener,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Event, L: Listener<E>> ErasedListener for Typed<E, L> {
    async fn handle_erased(&self, event: &dyn Event) -> Result<(), ListenerError> {
        match event.as_any().downcast_ref::<E>() {
            Some(event) => self.listener.handle(event).await,
            None => Err(ListenerError::new(format!(
                "expected {}, got {}",
                std::any::type_name::<E>(),
                event.event_name()
            ))),
        }
    }
}

/// Listener backed by an async closure that receives its own copy of the
/// event.
pub struct FnListener<E, F> {
    f: F,
    _event: PhantomData<fn(E)>,
}

impl<E, F> FnListener<E, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, F, Fut> Listener<E> for FnListener<E, F>
where
    E: Event + Clone,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ListenerError>> + Send,
{
    async fn handle(&self, event: &E) -> Result<(), ListenerError> {
        (self.f)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone)]
    struct Created(EventMetadata);

    impl Event for Created {
        fn metadata(&self) -> &EventMetadata {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Deleted(EventMetadata);

    impl Event for Deleted {
        fn metadata(&self) -> &EventMetadata {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_provided_accessors_read_metadata() {
        let event = Created(EventMetadata::new("tenancy.tenant_created"));

        assert_eq!(event.event_name(), "tenancy.tenant_created");
        assert_eq!(event.event_id(), event.0.id);
        assert_eq!(event.timestamp(), event.0.timestamp);
        assert_eq!(event.0.chain_id(), event.0.id);
    }

    #[test]
    fn test_caused_by_chains_correlation() {
        let root = EventMetadata::new("tenancy.tenant_created");
        let child = EventMetadata::caused_by("tenancy.database_created", &root);
        let grandchild = EventMetadata::caused_by("tenancy.database_migrated", &child);

        assert_eq!(child.causation_id, Some(root.id));
        assert_eq!(child.chain_id(), root.id);
        assert_eq!(grandchild.causation_id, Some(child.id));
        assert_eq!(grandchild.chain_id(), root.id);
        assert_ne!(grandchild.id, child.id);
    }

    #[tokio::test]
    async fn test_closure_listener_rejects_other_types() {
        let counter = Arc::new(AtomicU32::new(0));
        let seen = counter.clone();

        let listener = Typed::new(FnListener::new(move |_event: Created| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let created = Created(EventMetadata::new("tenancy.tenant_created"));
        listener.handle_erased(&created).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let deleted = Deleted(EventMetadata::new("tenancy.database_deleted"));
        let err = listener.handle_erased(&deleted).await.unwrap_err();
        assert!(err.0.contains("tenancy.database_deleted"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
