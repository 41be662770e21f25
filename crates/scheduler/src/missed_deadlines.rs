//! Daily missed-deadline sweep.
//!
//! Selects incomplete items whose due date was yesterday (UTC) and reports
//! them as one aggregate message: the first ten rendered, the remainder
//! counted.

use chrono::{NaiveDate, Utc};

use herald_common::types::{NotificationEvent, TaskSummary};
use herald_engine::router::MISSED_RENDER_LIMIT;

use crate::SweepContext;

/// Incomplete items whose due date equals the day before `today`.
pub fn select_missed(items: &[TaskSummary], today: NaiveDate) -> Vec<TaskSummary> {
    let Some(yesterday) = today.checked_sub_days(chrono::Days::new(1)) else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|t| !t.completed && t.due_moment().map(|m| m.date_naive()) == Some(yesterday))
        .cloned()
        .collect()
}

/// Run one sweep. Returns the number of missed items found.
pub async fn run_sweep(ctx: &SweepContext) -> anyhow::Result<usize> {
    let items = ctx.items.list_items(None).await?;
    let missed = select_missed(&items, Utc::now().date_naive());

    if missed.is_empty() {
        tracing::info!("No missed deadlines");
        return Ok(0);
    }

    let total = missed.len();
    let rendered: Vec<TaskSummary> = missed.into_iter().take(MISSED_RENDER_LIMIT).collect();

    ctx.router
        .deliver(&NotificationEvent::MissedDeadlines {
            items: rendered,
            total,
        })
        .await;

    tracing::info!(missed = total, "Missed-deadline sweep complete");
    Ok(total)
}

/// Run the sweep once per day at the given UTC hour, indefinitely.
pub async fn run_daily(ctx: SweepContext, hour_utc: u32) {
    loop {
        let wait = until_next_occurrence(Utc::now(), hour_utc);
        tracing::debug!(wait_secs = wait.as_secs(), "Next missed-deadline sweep scheduled");
        tokio::time::sleep(wait).await;

        if let Err(e) = run_sweep(&ctx).await {
            tracing::warn!(error = %e, "Missed-deadline sweep failed, skipping tick");
        }
    }
}

/// Duration until the next occurrence of `hour` (UTC), always in the future.
fn until_next_occurrence(now: chrono::DateTime<Utc>, hour: u32) -> std::time::Duration {
    let today_at = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .expect("valid wall-clock hour")
        .and_utc();

    let next = if today_at > now {
        today_at
    } else {
        today_at + chrono::Duration::days(1)
    };

    (next - now).to_std().unwrap_or_default()
}
