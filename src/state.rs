use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::EngineConfig,
    notify::{LogNotifier, Notifier},
    store::OrderStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, config: EngineConfig) -> Self {
        Self {
            store,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
