use tokio::sync::oneshot;

use crate::error::{Result, StoreError};

/// Completion handle for a queued fetch, entity fetch or label push.
///
/// Dropping the handle does not cancel the work.
#[derive(Debug)]
pub struct FetchHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl FetchHandle {
    pub(crate) fn channel() -> (oneshot::Sender<Result<()>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that is already resolved; used when nothing has to be fetched.
    pub fn ready() -> Self {
        Self::resolved(Ok(()))
    }

    pub(crate) fn resolved(result: Result<()>) -> Self {
        let (tx, handle) = Self::channel();
        // The receiver lives in `handle`, so the send cannot fail.
        let _ = tx.send(result);
        handle
    }

    /// Waits for the work to finish.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.map_err(|_| StoreError::Dropped)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_handle_resolves_immediately() {
        assert_eq!(FetchHandle::ready().wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_dropped_sender_reports_dropped() {
        let (tx, handle) = FetchHandle::channel();
        drop(tx);
        assert_eq!(handle.wait().await, Err(StoreError::Dropped));
    }
}
