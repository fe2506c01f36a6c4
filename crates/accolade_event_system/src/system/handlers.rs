/// Event handler registration methods
use super::core::{EventSystem, Registration};
use crate::events::{
    DomainEvent, Event, EventError, EventHandler, EventKind, FnEventHandler, HandlerId,
    TypedEventHandler,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

impl EventSystem {
    /// Registers a handler that receives the whole [`DomainEvent`] for every
    /// future emission of `kind`.
    ///
    /// Useful when one handler serves several kinds, e.g. an achievement
    /// definition listening to more than one event.
    pub async fn on<F, Fut>(&self, kind: EventKind, name: &str, handler: F) -> HandlerId
    where
        F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        let handler_name = format!("{}::{}", kind, name);
        let handler = FnEventHandler::new(handler_name, handler);
        self.register_handler(kind, Arc::new(handler), false).await
    }

    /// Registers a handler for the payload type `T`.
    ///
    /// The handler is routed `T::KIND` events only and receives the concrete
    /// payload, so the payload shape is checked at compile time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use accolade_event_system::{EventSystem, BadgeSelectedEvent};
    ///
    /// # async fn example(events: &EventSystem) {
    /// events.on_typed("audit", |event: BadgeSelectedEvent| async move {
    ///     println!("{} picked {}", event.user_id, event.badge_id);
    ///     Ok(())
    /// }).await;
    /// # }
    /// ```
    pub async fn on_typed<T, F, Fut>(&self, name: &str, handler: F) -> HandlerId
    where
        T: Event,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        let handler_name = format!("{}::{}", T::KIND, name);
        let handler = TypedEventHandler::new(handler_name, handler);
        self.register_handler(T::KIND, Arc::new(handler), false).await
    }

    /// Single-fire variant of [`EventSystem::on`].
    ///
    /// The registration is detached at the moment an emission picks it up, so
    /// it runs at most once even when emissions race.
    pub async fn once<F, Fut>(&self, kind: EventKind, name: &str, handler: F) -> HandlerId
    where
        F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        let handler_name = format!("{}::{}", kind, name);
        let handler = FnEventHandler::new(handler_name, handler);
        self.register_handler(kind, Arc::new(handler), true).await
    }

    /// Single-fire variant of [`EventSystem::on_typed`].
    pub async fn once_typed<T, F, Fut>(&self, name: &str, handler: F) -> HandlerId
    where
        T: Event,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        let handler_name = format!("{}::{}", T::KIND, name);
        let handler = TypedEventHandler::new(handler_name, handler);
        self.register_handler(T::KIND, Arc::new(handler), true).await
    }

    /// Registers an already-built handler object.
    pub async fn register_handler(
        &self,
        kind: EventKind,
        handler: Arc<dyn EventHandler>,
        once: bool,
    ) -> HandlerId {
        let id = self.allocate_handler_id();
        let name = handler.handler_name().to_string();

        self.handlers.entry(kind).or_default().push(Registration {
            id,
            once,
            handler,
        });

        let mut stats = self.stats.write().await;
        stats.total_handlers += 1;

        info!("📝 Registered {} for {} as {}", name, kind, id);
        id
    }

    /// Removes a registration. Emissions already in flight are not affected.
    pub async fn off(&self, id: HandlerId) -> Result<(), EventError> {
        let mut removed = false;
        for mut entry in self.handlers.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|registration| registration.id != id);
            if entry.value().len() != before {
                removed = true;
                break;
            }
        }

        if !removed {
            return Err(EventError::HandlerNotFound(id));
        }

        let mut stats = self.stats.write().await;
        stats.total_handlers = stats.total_handlers.saturating_sub(1);
        debug!("🗑️ Removed {}", id);
        Ok(())
    }
}
