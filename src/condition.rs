//! Single-slot coalesced signal used to wake a sending loop without
//! queueing redundant wakeups.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Wraps [`tokio::sync::Notify`], which already has exactly the semantics
/// we want: `notify_one()` stores at most one permit, so any number of
/// signals raised while nobody is waiting coalesce into a single wakeup.
#[derive(Clone, Default)]
pub struct Condition(Arc<Notify>);

impl Condition {
    pub fn new() -> Self {
        Self(Arc::new(Notify::new()))
    }

    /// Raises the signal. Never blocks.
    pub fn signal(&self) {
        self.0.notify_one();
    }

    /// Waits for a signal, or for `cancel` to fire. Returns `true` if
    /// signalled, `false` if cancelled first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = self.0.notified() => true,
            _ = cancel.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_before_wait_is_not_lost() {
        let cond = Condition::new();
        cond.signal();
        let cancel = CancellationToken::new();
        assert!(cond.wait(&cancel).await);
    }

    #[tokio::test]
    async fn repeated_signals_coalesce_to_one_wakeup() {
        let cond = Condition::new();
        cond.signal();
        cond.signal();
        cond.signal();
        let cancel = CancellationToken::new();
        assert!(cond.wait(&cancel).await);

        // the three signals above collapsed into a single stored permit;
        // nothing else is pending.
        let cancel2 = CancellationToken::new();
        cancel2.cancel();
        assert!(!cond.wait(&cancel2).await);
    }

    #[tokio::test]
    async fn cancellation_wins_when_never_signalled() {
        let cond = Condition::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!cond.wait(&cancel).await);
    }

    #[tokio::test]
    async fn signal_from_another_task_wakes_waiter() {
        let cond = Condition::new();
        let cancel = CancellationToken::new();
        let cond2 = cond.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cond2.signal();
        });
        assert!(cond.wait(&cancel).await);
        handle.await.unwrap();
    }
}
