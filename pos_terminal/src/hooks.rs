use log::*;
use pos_engine::events::{BookingConfirmedEvent, EventHandlers, EventHooks, ReconciliationRequiredEvent};

const TERMINAL_EVENT_BUFFER_SIZE: usize = 25;

/// Event handlers that report the outcome of queued bookings in the terminal log.
///
/// 1. BookingConfirmedEvent - a booking that could not be confirmed at the time has finally been accepted.
/// 2. ReconciliationRequiredEvent - a queued booking was rejected for good. The operator has to resolve it by hand
///    (see `pos-terminal reconcile`).
pub fn create_terminal_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_booking_confirmed(|ev| {
        let BookingConfirmedEvent { transaction, failed_attempts, confirmed_at } = ev;
        Box::pin(async move {
            info!(
                "📬️ Queued {} {} for {} was confirmed at {confirmed_at} after {failed_attempts} failed attempts. \
                 Balance {} -> {}",
                transaction.kind,
                transaction.idempotency_key,
                transaction.amount,
                transaction.old_balance,
                transaction.new_balance
            );
        })
    });
    hooks.on_reconciliation_required(|ev| {
        let ReconciliationRequiredEvent { request } = ev;
        Box::pin(async move {
            error!(
                "📬️ {} {} for {} on tag {} needs manual reconciliation. {}",
                request.kind, request.idempotency_key, request.intent.amount, request.intent.tag, request.reason
            );
        })
    });
    EventHandlers::new(TERMINAL_EVENT_BUFFER_SIZE, hooks)
}
