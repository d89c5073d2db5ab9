/// Bulk operations over a watch list

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;

use crate::reconcile::ClassifiedWatch;

/// Outcome of a "mark all as viewed" run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkAllSummary {
    pub attempted: usize,
    pub marked: Vec<String>,
}

impl MarkAllSummary {
    pub fn succeeded(&self) -> usize {
        self.marked.len()
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.attempted
    }

    /// Status line shown on the mark-all button
    pub fn label(&self) -> String {
        if self.attempted == 0 {
            "✓ All watched".to_string()
        } else if self.is_complete() {
            format!("✓ Marked {} as watched", self.succeeded())
        } else {
            format!("✓ Marked {}/{}", self.succeeded(), self.attempted)
        }
    }
}

/// Ids of the watches flagged unread, in list order
pub fn unread_uuids(watches: &[ClassifiedWatch]) -> Vec<String> {
    watches
        .iter()
        .filter(|w| w.unread)
        .filter_map(|w| w.watch.uuid.clone())
        .collect()
}

/// Mark each watch viewed, one request at a time. A failure is logged and
/// the run moves on to the next id.
pub async fn mark_all_viewed<F, Fut, E>(uuids: &[String], mut mark: F) -> MarkAllSummary
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut summary = MarkAllSummary {
        attempted: uuids.len(),
        marked: Vec::new(),
    };

    for uuid in uuids {
        match mark(uuid.clone()).await {
            Ok(()) => summary.marked.push(uuid.clone()),
            Err(e) => log::error!("Error marking watch as read: {} {}", uuid, e),
        }
    }

    summary
}

/// Copy of `watches` with the given ids flipped to viewed
pub fn mark_locally(
    watches: &[ClassifiedWatch],
    uuids: &[String],
    now: DateTime<Utc>,
) -> Vec<ClassifiedWatch> {
    watches
        .iter()
        .cloned()
        .map(|mut w| {
            if w.watch.uuid.as_ref().is_some_and(|id| uuids.contains(id)) {
                w.watch.mark_viewed_locally(now);
                w.unread = false;
            }
            w
        })
        .collect()
}
