use anyhow::{Context, Result};
use time::Duration;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

/// Moves every in-progress attempt past its deadline (plus the submit grace) to `TimedOut`.
/// Answers saved before the deadline are kept but never graded.
pub(crate) async fn close_expired_attempts(state: &AppState) -> Result<u64> {
    let now = primitive_now_utc();
    let grace = state.settings().attempts().submit_grace_seconds;
    let cutoff = now - Duration::seconds(grace as i64);
    let closed = repositories::attempts::expire_overdue(state.db(), cutoff, now)
        .await
        .context("Failed to expire overdue attempts")?;

    if closed > 0 {
        tracing::info!(closed, "Timed out overdue attempts");
    } else {
        tracing::debug!("No overdue attempts");
    }
    metrics::attempts_timed_out(closed);

    Ok(closed)
}
