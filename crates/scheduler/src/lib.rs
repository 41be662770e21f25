//! Reminder scheduler — two independently timed sweeps over the live item
//! list.
//!
//! The daily sweep reports yesterday's missed deadlines as one aggregate
//! channel message. The hourly sweep derives personalized due-soon
//! reminders per assignee plus an aggregate 24-hour digest. Both sweeps
//! only read the item list and send notifications; a failed tick logs and
//! yields zero reminders without stopping the loop.

pub mod due_soon;
pub mod missed_deadlines;

use std::sync::Arc;

use herald_engine::resolver::PreferenceResolver;
use herald_engine::router::NotificationRouter;
use herald_platform::WorkItemClient;

/// Shared handles a sweep needs to run.
#[derive(Clone)]
pub struct SweepContext {
    pub items: Arc<dyn WorkItemClient>,
    pub router: Arc<NotificationRouter>,
    pub resolver: Arc<PreferenceResolver>,
}
