use crate::types::BatchProgress;
use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

/// Receives one snapshot per settled batch, in batch order.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &BatchProgress);
}

/// Discards progress.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: &BatchProgress) {}
}

impl ProgressObserver for UnboundedSender<BatchProgress> {
    fn on_progress(&self, progress: &BatchProgress) {
        if self.send(progress.clone()).is_err() {
            debug!("Progress receiver dropped, snapshot discarded");
        }
    }
}

pub struct ProgressReporter;

impl ProgressReporter {
    pub fn snapshot(completed: u32, total: u32, success_count: u32, error_count: u32) -> BatchProgress {
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };

        BatchProgress {
            percent,
            completed,
            total,
            success_count,
            error_count,
        }
    }

    pub fn report(
        observer: &dyn ProgressObserver,
        completed: u32,
        total: u32,
        success_count: u32,
        error_count: u32,
    ) -> BatchProgress {
        let progress = Self::snapshot(completed, total, success_count, error_count);

        info!(
            "📊 Progress: {:.1}% ({}/{})",
            progress.percent, progress.completed, progress.total
        );
        observer.on_progress(&progress);

        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn percent_of_total() {
        let progress = ProgressReporter::snapshot(5, 12, 4, 1);
        assert!((progress.percent - 41.666).abs() < 0.01);

        let done = ProgressReporter::snapshot(12, 12, 12, 0);
        assert_eq!(done.percent, 100.0);
    }

    #[test]
    fn zero_total_does_not_divide() {
        assert_eq!(ProgressReporter::snapshot(0, 0, 0, 0).percent, 0.0);
    }

    #[tokio::test]
    async fn forwards_to_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        ProgressReporter::report(&tx, 10, 20, 9, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.completed, 10);
        assert_eq!(received.percent, 50.0);
        assert_eq!(received.error_count, 1);
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        ProgressReporter::report(&tx, 1, 1, 1, 0);
    }
}
