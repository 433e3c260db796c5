//! Periodic auto-release of escrow after the delivery grace period.

use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    escrow::ReleaseTrigger,
    middleware::auth::AuthUser,
    services::escrow_service,
    state::AppState,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    pub candidates: usize,
    pub released: usize,
    /// Candidates that were no longer due when re-checked (disputed,
    /// released concurrently, grace period still running).
    pub skipped: usize,
    pub failed: usize,
}

pub struct AutoReleaseSweeper {
    state: AppState,
}

impl AutoReleaseSweeper {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// One pass over every candidate. A failing order is logged and counted;
    /// it never stops the rest of the batch.
    pub async fn run_once(&self) -> AppResult<SweepReport> {
        let candidates = self.state.store.auto_release_candidates().await?;
        let system = AuthUser::system();
        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };

        for order_id in candidates {
            let outcome =
                escrow_service::release(&self.state, &system, order_id, ReleaseTrigger::Auto).await;
            match outcome {
                Ok(_) => report.released += 1,
                Err(AppError::InvalidStateTransition(reason)) => {
                    tracing::debug!(
                        order_id = %order_id,
                        reason = %reason,
                        "auto-release skipped"
                    );
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        order_id = %order_id,
                        error = %err,
                        retryable = err.is_retryable(),
                        "auto-release failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.candidates > 0 {
            tracing::info!(
                candidates = report.candidates,
                released = report.released,
                skipped = report.skipped,
                failed = report.failed,
                "auto-release sweep finished"
            );
        }
        Ok(report)
    }

    /// Runs [`run_once`](Self::run_once) on the configured interval until
    /// the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.state.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                every_secs = self.state.config.sweep_interval.as_secs(),
                "auto-release sweeper started"
            );
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once().await {
                    tracing::warn!(error = %err, "auto-release sweep could not load candidates");
                }
            }
        })
    }
}
