use std::sync::Arc;

use crate::services::{
    NotificationDispatcher, RedemptionCoordinator, TicketLifecycle, TicketRenderer,
};
use crate::store::{CounterStore, TicketStore};

/// Shared handles for the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<TicketLifecycle>,
    pub redemption: Arc<RedemptionCoordinator>,
    pub renderer: Arc<dyn TicketRenderer>,
}

impl AppState {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        counters: Arc<dyn CounterStore>,
        notifications: NotificationDispatcher,
        renderer: Arc<dyn TicketRenderer>,
    ) -> Self {
        let lifecycle = Arc::new(TicketLifecycle::new(tickets));
        let redemption = Arc::new(RedemptionCoordinator::new(
            Arc::clone(&lifecycle),
            counters,
            notifications,
        ));

        Self {
            lifecycle,
            redemption,
            renderer,
        }
    }
}
