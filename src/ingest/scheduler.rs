use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Runs one job on a fixed interval, or on demand through its handle.
///
/// Runs never overlap: ticks and triggers that arrive while the job is busy
/// are coalesced into at most one follow-up run.
pub struct Scheduler<F> {
    interval: Duration,
    job: F,
    shutdown: watch::Sender<bool>,
}

impl<F, Fut> Scheduler<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(interval: Duration, job: F) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            interval,
            job,
            shutdown,
        }
    }

    /// Use an existing shutdown channel, so the job can watch the same
    /// signal and exit early.
    pub fn with_shutdown(mut self, shutdown: watch::Sender<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Spawn the timer loop. The first scheduled run happens one interval
    /// after start.
    pub fn start(self) -> SchedulerHandle {
        let (trigger, mut trigger_rx) = mpsc::channel::<()>(1);
        let mut shutdown_rx = self.shutdown.subscribe();
        let interval = self.interval;
        let job = self.job;

        let task = tokio::spawn(async move {
            tracing::info!("Scheduler started, running every {:?}", interval);

            let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        tracing::debug!("Scheduled run");
                    }
                    Some(()) = trigger_rx.recv() => {
                        tracing::debug!("Manual run");
                    }
                    _ = shutdown_rx.changed() => break,
                }

                if *shutdown_rx.borrow() {
                    break;
                }

                job().await;
            }

            tracing::info!("Scheduler stopped");
        });

        SchedulerHandle {
            trigger,
            shutdown: self.shutdown,
            task,
        }
    }
}

pub struct SchedulerHandle {
    trigger: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request a run now. A request made while one is already pending is
    /// dropped.
    pub fn trigger(&self) {
        if self.trigger.try_send(()).is_err() {
            tracing::debug!("Run already pending, ignoring trigger");
        }
    }

    /// Signal shutdown and wait for the in-flight run, if any, to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::error!("Scheduler task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<()> + Send + Sync {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    async fn wait_for(counter: &AtomicUsize, at_least: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < at_least {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn runs_on_every_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = Scheduler::new(Duration::from_millis(20), counting_job(runs.clone())).start();

        assert!(wait_for(&runs, 2).await);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn first_run_waits_one_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = Scheduler::new(Duration::from_secs(3600), counting_job(runs.clone())).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn trigger_runs_immediately() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = Scheduler::new(Duration::from_secs(3600), counting_job(runs.clone())).start();

        handle.trigger();
        assert!(wait_for(&runs, 1).await);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_further_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (tx, signal) = watch::channel(false);
        let handle = Scheduler::new(Duration::from_millis(10), counting_job(runs.clone()))
            .with_shutdown(tx)
            .start();

        assert!(wait_for(&runs, 1).await);
        handle.shutdown().await;
        assert!(*signal.borrow());

        let after = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn runs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let job = {
            let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
            move || {
                let (active, peak, runs) = (active.clone(), peak.clone(), runs.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        let handle = Scheduler::new(Duration::from_millis(5), job).start();
        handle.trigger();
        handle.trigger();

        assert!(wait_for(&runs, 3).await);
        handle.shutdown().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
