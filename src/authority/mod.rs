//! The token authority: PAT issuance and validation, session issuance, and the
//! validation endpoint that composes them.

use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;

pub mod admin;
pub mod endpoint;
pub mod issuer;
pub mod session;
pub mod validator;

/// Run `fut` under a deadline. Elapsed deadlines surface as [`AppError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AppError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, AppError>(7) }).await;
        assert_eq!(tokio_test::assert_ok!(ok), 7);

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(AppError::NotFound)
        })
        .await;
        assert!(matches!(tokio_test::assert_err!(err), AppError::NotFound));
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let res = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AppError>(())
        })
        .await;
        assert!(matches!(res, Err(AppError::Timeout)));
    }
}
