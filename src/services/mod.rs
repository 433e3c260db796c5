use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    machine::Transition,
    models::OrderAggregate,
    notify,
    state::AppState,
};

pub mod dispute_service;
pub mod escrow_service;
pub mod order_service;

/// Loads the order, evaluates `step` against it and commits the result.
///
/// A commit that loses a version race is re-evaluated from a fresh load, so
/// guards always see the state that actually won. Notifications go out only
/// after a successful commit.
pub(crate) async fn commit_with_retry<F>(
    state: &AppState,
    order_id: Uuid,
    mut step: F,
) -> AppResult<OrderAggregate>
where
    F: FnMut(&OrderAggregate, DateTime<Utc>) -> AppResult<Transition> + Send,
{
    let attempts = state.config.commit_attempts.max(1);
    let mut attempt = 1;
    loop {
        let current = state
            .store
            .load_order(order_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let transition = step(&current, state.clock.now())?;

        match state.store.commit(&transition).await {
            Ok(()) => {
                let Transition {
                    aggregate, notices, ..
                } = transition;
                notify::deliver(state.store.as_ref(), state.notifier.as_ref(), &notices).await;
                return Ok(aggregate);
            }
            Err(AppError::Conflict) if attempt < attempts => {
                tracing::debug!(order_id = %order_id, attempt, "commit conflicted, re-evaluating");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
