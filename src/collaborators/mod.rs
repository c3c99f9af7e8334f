//! Interfaces the pipeline needs from the outside world, with file-backed
//! implementations.

mod profiler;
mod registry;
mod tracking;
mod warehouse;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::CollaboratorError;

pub use profiler::{HtmlProfiler, ReportGenerator};
pub use registry::{FsModelRegistry, ModelRegistry, RegisteredModel};
pub use tracking::{FsTracker, NullTracker, TrackingConfig, TrackingSink};
pub use warehouse::{CsvWarehouse, InMemoryWarehouse, Warehouse, WarehouseQuery};

/// Run `op` on a worker thread and give up after `timeout`.
///
/// A timed-out worker is detached; its result is discarded.
pub(crate) fn with_deadline<T, F>(operation: &str, timeout: Duration, op: F) -> Result<T, CollaboratorError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("collab-{operation}"))
        .spawn(move || {
            let _ = tx.send(op());
        })?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CollaboratorError::Timeout {
            operation: operation.to_string(),
            after: timeout,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(CollaboratorError::Connection(format!("{operation} worker exited without a result")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_passes_result_through() {
        let v = with_deadline("add", Duration::from_secs(5), || Ok(2 + 2)).unwrap();
        assert_eq!(v, 4);
    }

    #[test]
    fn test_deadline_times_out() {
        let err = with_deadline("sleep", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout { ref operation, .. } if operation == "sleep"));
    }
}
