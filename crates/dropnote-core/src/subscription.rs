//! Unsubscribe handle for live watches.

use tokio::task::JoinHandle;

/// Handle to one or more background watch tasks.
///
/// [`unsubscribe`](Self::unsubscribe) stops future pipeline invocations for
/// the subscription; handlers already in flight run to completion. Dropping
/// the handle without unsubscribing leaves the tasks running.
#[derive(Debug, Default)]
#[must_use = "dropping a Subscription does not stop it; call `unsubscribe`"]
pub struct Subscription {
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn from_task(task: JoinHandle<()>) -> Self {
        Self { tasks: vec![task] }
    }

    /// Combine several subscriptions into one handle.
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        Self {
            tasks: subscriptions.into_iter().flat_map(|s| s.tasks).collect(),
        }
    }

    /// Number of background tasks still running.
    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Tear down every underlying subscription.
    pub fn unsubscribe(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
