//! Fixed-interval job scheduling on the shared tokio runtime.
//!
//! Each job is a spawned loop around a [`tokio::time::interval`]. The job
//! body is awaited inline, so an invocation can never overlap the next one;
//! if a tick overruns its interval the missed fires are skipped
//! ([`MissedTickBehavior::Skip`]) and the cadence resumes from there.
//! Distinct jobs run concurrently with each other. Errors never escape the
//! loop: a failed tick is logged and the next one starts over from current
//! state.

use crate::error::ManagerError;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

/// Handle to a running job loop.
#[derive(Debug)]
pub struct JobHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the loop; in-flight tick included.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a job loop firing every `period`, starting one period from now.
pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> JobHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ManagerError>> + Send,
{
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick of a tokio interval fires immediately; jobs start
        // one full period after boot instead
        interval.tick().await;

        loop {
            interval.tick().await;
            trace!("Job {} tick", name);
            if let Err(err) = job().await {
                warn!("Job {} failed, retrying on next tick: {}", name, err);
            }
        }
    });

    JobHandle { name, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_job_fires_once_per_period() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let handle = spawn("counter", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.abort();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap_themselves() {
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let (running_job, overlapped_job) = (running.clone(), overlapped.clone());

        let handle = spawn("slow", Duration::from_secs(10), move || {
            let running = running_job.clone();
            let overlapped = overlapped_job.clone();
            async move {
                if running.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                // three times the interval
                tokio::time::sleep(Duration::from_secs(30)).await;
                running.store(false, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(120)).await;
        handle.abort();
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_its_cadence() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let handle = spawn("flaky", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ManagerError::Dns("still broken".to_owned()))
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.abort();
        assert_eq!(count.load(Ordering::SeqCst), 3, "errors do not stop the loop");
    }
}
