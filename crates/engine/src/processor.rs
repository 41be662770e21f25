//! Webhook batch pipeline.
//!
//! One pass per inbound webhook call: classify each raw record, deliver the
//! resulting event through the router, and fire the assignment notification
//! for reassignments. Records are independent; no per-record failure can
//! abort the batch, and nothing here surfaces an error to the HTTP layer.

use std::sync::Arc;

use herald_classifier::EventClassifier;
use herald_common::types::{NotificationEvent, UserRef, WebhookPayload};

use crate::resolver::PreferenceResolver;
use crate::router::NotificationRouter;

/// Counters reported after one webhook batch.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct BatchOutcome {
    pub records: usize,
    pub events: usize,
    pub assignment_attempts: usize,
}

pub struct WebhookProcessor {
    classifier: EventClassifier,
    router: Arc<NotificationRouter>,
    resolver: Arc<PreferenceResolver>,
}

impl WebhookProcessor {
    pub fn new(
        classifier: EventClassifier,
        router: Arc<NotificationRouter>,
        resolver: Arc<PreferenceResolver>,
    ) -> Self {
        Self {
            classifier,
            router,
            resolver,
        }
    }

    /// Process one webhook batch sequentially.
    pub async fn process_batch(&self, payload: &WebhookPayload) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            records: payload.events.len(),
            ..Default::default()
        };

        for record in &payload.events {
            let Some(event) = self.classifier.classify_record(record).await else {
                continue;
            };
            outcome.events += 1;

            self.router.deliver(&event).await;

            if let NotificationEvent::TaskReassigned {
                task,
                new_assignee:
                    Some(UserRef {
                        gid: Some(assignee_gid),
                        ..
                    }),
                ..
            } = &event
            {
                outcome.assignment_attempts += 1;
                self.resolver.notify_assignment(assignee_gid, task).await;
            }
        }

        tracing::info!(
            records = outcome.records,
            events = outcome.events,
            assignment_attempts = outcome.assignment_attempts,
            "Webhook batch processed"
        );
        outcome
    }
}
