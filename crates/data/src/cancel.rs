//! Cancellation for store reads and commits.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Race a store future against a [`CancellationToken`].
#[async_trait]
pub(crate) trait OrCancelExt: Sized {
    type Output;

    /// Resolve to `StoreError::Cancelled` if `token` is (or becomes)
    /// cancelled before this future completes.
    ///
    /// An already-cancelled token wins without polling the future, so no
    /// backend work starts.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, StoreError>;
}

#[async_trait]
impl<F, T> OrCancelExt for F
where
    F: Future<Output = Result<T, StoreError>> + Send,
    T: Send,
{
    type Output = T;

    async fn or_cancel(self, token: &CancellationToken) -> Result<T, StoreError> {
        if token.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        tokio::select! {
            biased;
            () = token.cancelled() => Err(StoreError::Cancelled),
            res = self => res,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_passes_through_when_not_cancelled() {
        let token = CancellationToken::new();
        let value = async { Ok::<_, StoreError>(7) }.or_cancel(&token).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_passes_through_errors() {
        let token = CancellationToken::new();
        let err = async { Err::<(), _>(StoreError::ConstraintViolation("x".to_owned())) }
            .or_cancel(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_the_future() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&polled);

        let err = async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, StoreError>(())
        }
        .or_cancel(&token)
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::Cancelled));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, StoreError>(())
        }
        .or_cancel(&token)
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::Cancelled));
    }
}
