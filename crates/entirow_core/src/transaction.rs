//! Driver transaction scope.

use crate::error::CoreResult;
use entirow_storage::Driver;

/// Runs `f` inside a driver transaction.
///
/// Commits if `f` succeeds. Otherwise rolls back and returns the error from
/// `f` unchanged; a rollback failure is logged, never returned. A failed
/// commit is rolled back the same way.
pub(crate) fn in_transaction<F, T>(driver: &dyn Driver, f: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T>,
{
    driver.transaction_begin()?;

    match f() {
        Ok(result) => {
            if let Err(e) = driver.commit() {
                abort(driver);
                return Err(e.into());
            }
            Ok(result)
        }
        Err(e) => {
            abort(driver);
            Err(e)
        }
    }
}

fn abort(driver: &dyn Driver) {
    if let Err(e) = driver.rollback() {
        tracing::warn!(error = %e, "rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use entirow_codec::columns;
    use entirow_storage::{DriverOp, FailPoint, InMemoryDriver, StorageError};

    fn driver() -> InMemoryDriver {
        let driver = InMemoryDriver::new();
        driver.create_table("t", "id", ["v"]).unwrap();
        driver
    }

    #[test]
    fn commits_on_success() {
        let d = driver();
        let id = in_transaction(&d, || Ok(d.insert("t", &columns! { "v" => 1 })?)).unwrap();

        assert!(d.row("t", id).is_some());
        assert!(!d.in_transaction());
        assert_eq!(d.stats().snapshot().transactions_committed, 1);
    }

    #[test]
    fn rolls_back_and_keeps_original_error() {
        let d = driver();
        let result: CoreResult<()> = in_transaction(&d, || {
            d.insert("t", &columns! { "v" => 1 })?;
            Err(CoreError::schema("boom"))
        });

        assert!(matches!(result, Err(CoreError::Schema { .. })));
        assert_eq!(d.row_count("t"), 0);
        assert!(!d.in_transaction());
    }

    #[test]
    fn failed_commit_rolls_back() {
        let d = driver();
        d.fail_on(FailPoint::new(DriverOp::Commit));
        let result = in_transaction(&d, || Ok(d.insert("t", &columns! { "v" => 1 })?));

        assert!(matches!(
            result,
            Err(CoreError::Storage(StorageError::Injected { .. }))
        ));
        assert_eq!(d.row_count("t"), 0);
        assert!(!d.in_transaction());
    }

    #[test]
    fn nested_begin_is_rejected() {
        let d = driver();
        let result = in_transaction(&d, || in_transaction(&d, || Ok(())));

        assert!(matches!(
            result,
            Err(CoreError::Storage(StorageError::TransactionActive))
        ));
        assert!(!d.in_transaction());
    }
}
