//! Event bus

use crate::event::{ErasedListener, Event, FnListener, Listener, ListenerError, Typed};
use dashmap::DashMap;
use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

#[derive(Clone)]
struct Subscription {
    /// Only events with this name are delivered, if set
    name: Option<String>,
    listener: Arc<dyn ErasedListener>,
}

impl Subscription {
    fn accepts(&self, event: &dyn Event) -> bool {
        self.name
            .as_deref()
            .is_none_or(|name| name == event.event_name())
    }
}

/// How [`EventBus::publish`] runs listeners.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Run listeners as concurrent tasks. `publish` waits for all of them
    /// either way.
    pub concurrent: bool,

    /// Stop at the first failing listener and return an error. Otherwise
    /// failures are logged and publishing succeeds.
    pub fail_fast: bool,

    /// Log every published event at info level
    pub log_events: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            concurrent: true,
            fail_fast: false,
            log_events: true,
        }
    }
}

impl EventBusConfig {
    /// Listeners run one after another, in subscription order.
    pub fn sequential() -> Self {
        Self {
            concurrent: false,
            ..Self::default()
        }
    }

    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }
}

/// In-process publish/subscribe bus keyed by event type.
///
/// Clones share their listeners.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<DashMap<TypeId, Vec<Subscription>>>,
    config: Arc<EventBusConfig>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Deliver every event of type `E` to `listener`.
    pub fn listen<E, L>(&self, listener: L)
    where
        E: Event,
        L: Listener<E> + 'static,
    {
        self.register::<E>(None, Arc::new(Typed::new(listener)));
    }

    /// Deliver events of type `E` named `name` to `listener`.
    pub fn listen_to<E, L>(&self, name: impl Into<String>, listener: L)
    where
        E: Event,
        L: Listener<E> + 'static,
    {
        self.register::<E>(Some(name.into()), Arc::new(Typed::new(listener)));
    }

    /// Subscribe an async closure to every event of type `E`.
    ///
    /// ```rust,ignore
    /// bus.on(|event: TenancyEvent| async move {
    ///     println!("{}", event.event_name());
    ///     Ok(())
    /// });
    /// ```
    pub fn on<E, F, Fut>(&self, f: F)
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        self.listen::<E, _>(FnListener::new(f));
    }

    /// Subscribe an async closure to events of type `E` named `name`.
    pub fn on_named<E, F, Fut>(&self, name: impl Into<String>, f: F)
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        self.listen_to::<E, _>(name, FnListener::new(f));
    }

    fn register<E: Event>(&self, name: Option<String>, listener: Arc<dyn ErasedListener>) {
        debug!(
            event_type = std::any::type_name::<E>(),
            name = name.as_deref().unwrap_or("*"),
            "Listener subscribed"
        );

        self.listeners
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription { name, listener });
    }

    /// Publish `event` and wait for every matching listener.
    pub async fn publish<E: Event>(&self, event: E) -> Result<(), EventBusError> {
        if self.config.log_events {
            info!(
                event = event.event_name(),
                id = %event.event_id(),
                "Publishing event"
            );
        }

        // Snapshot so no map guard is held across an await.
        let subscriptions: Vec<Subscription> = self
            .listeners
            .get(&TypeId::of::<E>())
            .map(|subs| subs.iter().filter(|s| s.accepts(&event)).cloned().collect())
            .unwrap_or_default();

        if subscriptions.is_empty() {
            trace!(event = event.event_name(), "No listeners");
            return Ok(());
        }

        let event: Arc<dyn Event> = Arc::new(event);
        let mut errors = Vec::new();

        if self.config.concurrent {
            let tasks: Vec<_> = subscriptions
                .into_iter()
                .map(|subscription| {
                    let event = event.clone();
                    tokio::spawn(async move { subscription.listener.handle_erased(event.as_ref()).await })
                })
                .collect();

            for task in tasks {
                let outcome = task
                    .await
                    .unwrap_or_else(|e| Err(ListenerError::new(e.to_string())));
                if let Err(e) = outcome {
                    error!(event = event.event_name(), error = %e, "Event listener failed");
                    errors.push(e);
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        } else {
            for subscription in subscriptions {
                if let Err(e) = subscription.listener.handle_erased(event.as_ref()).await {
                    error!(event = event.event_name(), error = %e, "Event listener failed");
                    errors.push(e);
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        if self.config.fail_fast && !errors.is_empty() {
            return Err(EventBusError::ListenersFailed {
                event: event.event_name().to_string(),
                errors,
            });
        }
        Ok(())
    }

    /// Drop every listener for events of type `E`.
    pub fn forget<E: Event>(&self) {
        self.listeners.remove(&TypeId::of::<E>());
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .get(&TypeId::of::<E>())
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("{} listener(s) failed for '{event}'", .errors.len())]
    ListenersFailed {
        event: String,
        errors: Vec<ListenerError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Ordered record of handled events.
    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        fn push(&self, entry: &str) {
            self.0.lock().unwrap().push(entry.to_string());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[derive(Debug, Clone)]
    struct Lifecycle(EventMetadata);

    impl Lifecycle {
        fn named(name: &str) -> Self {
            Self(EventMetadata::new(name))
        }
    }

    impl Event for Lifecycle {
        fn metadata(&self) -> &EventMetadata {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicU32>);

    impl Counter {
        fn count(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Listener<Lifecycle> for Counter {
        async fn handle(&self, _event: &Lifecycle) -> Result<(), ListenerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Refuses;

    #[async_trait]
    impl Listener<Lifecycle> for Refuses {
        async fn handle(&self, event: &Lifecycle) -> Result<(), ListenerError> {
            Err(ListenerError::new(format!("cannot handle {}", event.event_name())))
        }
    }

    #[tokio::test]
    async fn test_publish_waits_for_every_listener() {
        let bus = EventBus::new();
        let first = Counter::default();
        let second = Counter::default();

        bus.listen::<Lifecycle, _>(first.clone());
        bus.listen::<Lifecycle, _>(second.clone());
        bus.publish(Lifecycle::named("tenancy.tenant_created")).await.unwrap();

        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);
    }

    #[tokio::test]
    async fn test_named_subscription_filters() {
        let bus = EventBus::with_config(EventBusConfig::sequential());
        let log = Log::default();

        let sink = log.clone();
        bus.on_named("tenancy.database_created", move |event: Lifecycle| {
            let sink = sink.clone();
            async move {
                sink.push(event.event_name());
                Ok(())
            }
        });

        bus.publish(Lifecycle::named("tenancy.tenant_created")).await.unwrap();
        bus.publish(Lifecycle::named("tenancy.database_created")).await.unwrap();

        assert_eq!(log.entries(), vec!["tenancy.database_created"]);
    }

    #[tokio::test]
    async fn test_sequential_listeners_run_in_subscription_order() {
        let bus = EventBus::with_config(EventBusConfig::sequential());
        let log = Log::default();

        for label in ["first", "second", "third"] {
            let sink = log.clone();
            bus.on(move |_event: Lifecycle| {
                let sink = sink.clone();
                async move {
                    sink.push(label);
                    Ok(())
                }
            });
        }

        bus.publish(Lifecycle::named("tenancy.tenant_created")).await.unwrap();
        assert_eq!(log.entries(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_and_reports() {
        let bus = EventBus::with_config(EventBusConfig::sequential().fail_fast());
        let after = Counter::default();

        bus.listen::<Lifecycle, _>(Refuses);
        bus.listen::<Lifecycle, _>(after.clone());

        let result = bus.publish(Lifecycle::named("tenancy.migration_failed")).await;
        assert!(matches!(
            result,
            Err(EventBusError::ListenersFailed { ref event, ref errors })
                if event == "tenancy.migration_failed" && errors.len() == 1
        ));
        assert_eq!(after.count(), 0);
    }

    #[tokio::test]
    async fn test_failures_logged_by_default() {
        let bus = EventBus::new();
        let after = Counter::default();

        bus.listen::<Lifecycle, _>(Refuses);
        bus.listen::<Lifecycle, _>(after.clone());

        assert!(bus.publish(Lifecycle::named("tenancy.tenant_created")).await.is_ok());
        assert_eq!(after.count(), 1);
    }

    #[tokio::test]
    async fn test_listener_count_and_forget() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count::<Lifecycle>(), 0);

        bus.listen::<Lifecycle, _>(Counter::default());
        bus.listen_to::<Lifecycle, _>("tenancy.database_seeded", Counter::default());
        assert_eq!(bus.listener_count::<Lifecycle>(), 2);

        bus.forget::<Lifecycle>();
        assert_eq!(bus.listener_count::<Lifecycle>(), 0);
    }
}
