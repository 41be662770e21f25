//! Hourly due-soon sweep.
//!
//! Every incomplete item with a future due moment is claimed by the
//! tightest window that contains it (1 hour, then 1 day, then 1 week) and
//! becomes one personalized reminder candidate for its assignee. The
//! aggregate digest independently broadcasts everything due within the
//! next 24 hours.
//!
//! Candidates are recomputed from the live item list on every tick and
//! nothing records what was already sent, so an item keeps being re-flagged
//! each hour until its due moment passes or it completes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use herald_common::types::{NotificationEvent, ReminderCandidate, ReminderInterval, TaskSummary};

use crate::SweepContext;

/// Counters reported after one due-soon sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    pub candidates: usize,
    pub delivered: usize,
    pub digest_items: usize,
}

/// The tightest reminder window containing the item's due moment, if the
/// item is incomplete and due in the future.
pub fn tightest_interval(task: &TaskSummary, now: DateTime<Utc>) -> Option<ReminderInterval> {
    if task.completed {
        return None;
    }
    let due = task.due_moment()?;
    if due <= now {
        return None;
    }
    ReminderInterval::IN_PRIORITY_ORDER
        .iter()
        .copied()
        .find(|interval| due <= now + interval.duration())
}

/// Personalized candidates, grouped by assignee, one per qualifying item.
/// Unassigned items never produce candidates (they still appear in the
/// digest).
pub fn build_candidates(items: &[TaskSummary], now: DateTime<Utc>) -> Vec<ReminderCandidate> {
    let mut by_assignee: BTreeMap<String, Vec<(TaskSummary, ReminderInterval)>> = BTreeMap::new();

    for task in items {
        let Some(assignee_gid) = task.assignee_gid.clone() else {
            continue;
        };
        let Some(interval) = tightest_interval(task, now) else {
            continue;
        };
        by_assignee
            .entry(assignee_gid)
            .or_default()
            .push((task.clone(), interval));
    }

    by_assignee
        .into_iter()
        .flat_map(|(assignee_gid, tasks)| {
            tasks
                .into_iter()
                .map(move |(task, interval)| ReminderCandidate {
                    assignee_gid: assignee_gid.clone(),
                    task,
                    interval,
                })
        })
        .collect()
}

/// Incomplete items due within the next 24 hours, for the aggregate digest.
pub fn select_digest(items: &[TaskSummary], now: DateTime<Utc>) -> Vec<TaskSummary> {
    let horizon = now + chrono::Duration::hours(24);
    items
        .iter()
        .filter(|t| {
            !t.completed
                && t.due_moment()
                    .map(|due| due > now && due <= horizon)
                    .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Run one sweep: personalized candidates through the preference resolver,
/// then the aggregate digest through the router.
pub async fn run_sweep(ctx: &SweepContext) -> anyhow::Result<SweepOutcome> {
    let items = ctx.items.list_items(None).await?;
    let now = Utc::now();

    let candidates = build_candidates(&items, now);
    let mut delivered = 0usize;
    for candidate in &candidates {
        if ctx.resolver.resolve_and_maybe_send(candidate).await {
            delivered += 1;
        }
    }

    let digest = select_digest(&items, now);
    let digest_items = digest.len();
    if !digest.is_empty() {
        ctx.router
            .deliver(&NotificationEvent::DueSoonDigest { items: digest })
            .await;
    }

    let outcome = SweepOutcome {
        candidates: candidates.len(),
        delivered,
        digest_items,
    };
    tracing::info!(
        candidates = outcome.candidates,
        delivered = outcome.delivered,
        digest_items = outcome.digest_items,
        "Due-soon sweep complete"
    );
    Ok(outcome)
}

/// Run the sweep on a fixed interval, indefinitely.
pub async fn run_interval(ctx: SweepContext, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = run_sweep(&ctx).await {
            tracing::warn!(error = %e, "Due-soon sweep failed, skipping tick");
        }
    }
}
