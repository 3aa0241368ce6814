use std::{future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;

use crate::events::{BookingConfirmedEvent, EventHandler, EventProducer, Handler, ReconciliationRequiredEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub booking_confirmed_producer: Vec<EventProducer<BookingConfirmedEvent>>,
    pub reconciliation_required_producer: Vec<EventProducer<ReconciliationRequiredEvent>>,
}

impl EventProducers {
    pub async fn publish_booking_confirmed(&self, event: BookingConfirmedEvent) {
        for producer in &self.booking_confirmed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_reconciliation_required(&self, event: ReconciliationRequiredEvent) {
        for producer in &self.reconciliation_required_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_booking_confirmed: Option<EventHandler<BookingConfirmedEvent>>,
    pub on_reconciliation_required: Option<EventHandler<ReconciliationRequiredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_booking_confirmed = hooks.on_booking_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_reconciliation_required = hooks.on_reconciliation_required.map(|f| EventHandler::new(buffer_size, f));
        Self { on_booking_confirmed, on_reconciliation_required }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_booking_confirmed {
            result.booking_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_reconciliation_required {
            result.reconciliation_required_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one task per handler. Each task ends once every producer has been dropped and the events already
    /// published have been handled, so awaiting the returned handles flushes the handlers on shutdown.
    pub async fn start_handlers(self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(handler) = self.on_booking_confirmed {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_reconciliation_required {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        tasks
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_booking_confirmed: Option<Handler<BookingConfirmedEvent>>,
    pub on_reconciliation_required: Option<Handler<ReconciliationRequiredEvent>>,
}

impl EventHooks {
    pub fn on_booking_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BookingConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_booking_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_reconciliation_required<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReconciliationRequiredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_reconciliation_required = Some(Arc::new(f));
        self
    }
}
