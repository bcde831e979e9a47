//! Concurrent bulk execution
//!
//! Runs independent per-item mutations with a bound on in-flight requests.
//! A failing item is logged and recorded; it never cancels its siblings.

use crate::error::HaltError;
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;

/// In-flight bound used for permission grants and revokes
pub const MAX_IN_FLIGHT: usize = 150;

/// Outcome of a bulk run
#[derive(Debug)]
pub struct BulkReport<K> {
    pub succeeded: Vec<K>,
    pub failed: Vec<(K, HaltError)>,
}

impl<K> BulkReport<K> {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Apply `op` to every item with at most `limit` calls in flight.
///
/// Completion order is unspecified. Every item ends up in exactly one of
/// `succeeded` or `failed`.
pub async fn run_bulk<K, I, F, Fut>(items: I, limit: usize, op: F) -> BulkReport<K>
where
    I: IntoIterator<Item = K>,
    K: Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<(), HaltError>>,
{
    let results: Vec<(K, Result<(), HaltError>)> = stream::iter(items)
        .map(|item| {
            let fut = op(item.clone());
            async move { (item, fut.await) }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut report = BulkReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    for (item, result) in results {
        match result {
            Ok(()) => report.succeeded.push(item),
            Err(err) => {
                tracing::warn!(item = %item, error = %err, "Bulk operation failed");
                report.failed.push((item, err));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn failures_do_not_stop_siblings() {
        let report = run_bulk(1..=4i64, 2, |id| async move {
            if id == 2 {
                Err(HaltError::Http {
                    status: 500,
                    method: "DELETE".into(),
                    url: format!("/principals/{id}"),
                })
            } else {
                Ok(())
            }
        })
        .await;

        let mut ok = report.succeeded.clone();
        ok.sort();
        assert_eq!(ok, vec![1, 3, 4]);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failed[0].0, 2);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = run_bulk(0..40u32, 5, |_| {
            let current = current.clone();
            let peak = peak.clone();
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(report.success_count(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 5);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn empty_input_is_empty_report() {
        let report = run_bulk(Vec::<String>::new(), MAX_IN_FLIGHT, |_| async { Ok(()) }).await;
        assert_eq!(report.success_count(), 0);
        assert_eq!(report.failure_count(), 0);
    }
}
