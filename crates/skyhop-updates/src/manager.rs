//! Periodic update manager
//!
//! Owns one scheduling loop per registered resource. Per key, at most
//! one update attempt runs at a time: a forced call arriving while a
//! periodic attempt is in flight waits for it, and a periodic attempt
//! that finds a forced run just satisfied its cadence is skipped.

use crate::spec::{PeriodicActionResult, PeriodicUpdateSpec};
use parking_lot::Mutex as SyncMutex;
use skyhop_common::ApiResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type TypedAction<R> = Arc<dyn Fn() -> BoxFuture<PeriodicActionResult<R>> + Send + Sync>;
type ErasedAction = Arc<dyn Fn() -> BoxFuture<AttemptOutcome> + Send + Sync>;

struct AttemptOutcome {
    success: bool,
    next_delay_override: Option<Duration>,
}

#[derive(Default)]
struct SchedState {
    last_attempt: Option<Instant>,
    failing: bool,
    next_override: Option<Duration>,
}

enum NextDue {
    /// No spec's liveness signals currently hold
    Gated,
    Now,
    At(Instant),
}

struct Registration {
    id: String,
    specs: Vec<PeriodicUpdateSpec>,
    action: ErasedAction,
    /// Serializes forced and periodic attempts for this key
    run_lock: Mutex<()>,
    sched: SyncMutex<SchedState>,
    /// Woken whenever scheduling state changes out of band
    rearm: Notify,
}

impl Registration {
    fn all_signals(&self) -> Vec<watch::Receiver<bool>> {
        self.specs
            .iter()
            .flat_map(|spec| spec.signals.iter().cloned())
            .collect()
    }

    /// First spec whose signals all hold decides the active cadence
    fn next_due(&self) -> NextDue {
        let Some(spec) = self.specs.iter().find(|spec| spec.is_active()) else {
            return NextDue::Gated;
        };
        let sched = self.sched.lock();
        let delay = sched.next_override.unwrap_or(if sched.failing {
            spec.retry_interval.unwrap_or(spec.interval)
        } else {
            spec.interval
        });
        match sched.last_attempt {
            None => NextDue::Now,
            Some(last) => NextDue::At(last + delay),
        }
    }

    fn finish_attempt(&self, success: bool, next_override: Option<Duration>) {
        let mut sched = self.sched.lock();
        sched.last_attempt = Some(Instant::now());
        sched.failing = !success;
        sched.next_override = next_override;
        drop(sched);
        self.rearm.notify_waiters();
    }
}

/// Registration/execution entry point for refreshable resources
#[derive(Default)]
pub struct PeriodicUpdateManager {
    registrations: SyncMutex<Vec<Arc<Registration>>>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

/// Handle returned by registration; needed for forced execution
pub struct UpdateHandle<R> {
    reg: Arc<Registration>,
    typed: TypedAction<R>,
}

impl<R> Clone for UpdateHandle<R> {
    fn clone(&self) -> Self {
        Self {
            reg: self.reg.clone(),
            typed: self.typed.clone(),
        }
    }
}

impl<R> UpdateHandle<R> {
    pub fn id(&self) -> &str {
        &self.reg.id
    }
}

impl PeriodicUpdateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary update action under a stable key
    pub fn register<R, F, Fut>(
        &self,
        id: &str,
        action: F,
        specs: Vec<PeriodicUpdateSpec>,
    ) -> UpdateHandle<R>
    where
        R: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PeriodicActionResult<R>> + Send + 'static,
    {
        let typed: TypedAction<R> = Arc::new(move || Box::pin(action()) as BoxFuture<_>);
        let erased: ErasedAction = {
            let typed = typed.clone();
            Arc::new(move || {
                let fut = typed();
                Box::pin(async move {
                    let result = fut.await;
                    AttemptOutcome {
                        success: result.success,
                        next_delay_override: result.next_call_delay_override,
                    }
                }) as BoxFuture<_>
            })
        };

        let reg = Arc::new(Registration {
            id: id.to_string(),
            specs,
            action: erased,
            run_lock: Mutex::new(()),
            sched: SyncMutex::new(SchedState::default()),
            rearm: Notify::new(),
        });
        self.registrations.lock().push(reg.clone());
        if self.started.load(Ordering::Acquire) {
            self.spawn_loop(reg.clone());
        }
        UpdateHandle { reg, typed }
    }

    /// Register an API-backed update; API failure selects the retry cadence
    pub fn register_api_call<T, F, Fut>(
        &self,
        id: &str,
        action: F,
        specs: Vec<PeriodicUpdateSpec>,
    ) -> UpdateHandle<ApiResult<T>>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.register(
            id,
            move || {
                let fut = action();
                async move {
                    let result = fut.await;
                    let success = result.is_ok();
                    PeriodicActionResult {
                        result,
                        success,
                        next_call_delay_override: None,
                    }
                }
            },
            specs,
        )
    }

    /// Start the scheduling loops. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let registrations = self.registrations.lock().clone();
        for reg in registrations {
            self.spawn_loop(reg);
        }
    }

    /// Tear down all scheduling loops. Forced execution keeps working.
    pub fn stop(&self) {
        self.started.store(false, Ordering::Release);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Run the update immediately, ignoring liveness signals.
    ///
    /// Waits for any in-flight attempt for the same key before running,
    /// and its completion re-arms the periodic cadence.
    pub async fn execute_now<R>(&self, handle: &UpdateHandle<R>) -> R {
        let _guard = handle.reg.run_lock.lock().await;
        debug!(id = %handle.reg.id, "forced update");
        let result = (handle.typed)().await;
        handle
            .reg
            .finish_attempt(result.success, result.next_call_delay_override);
        result.result
    }

    fn spawn_loop(&self, reg: Arc<Registration>) {
        if reg.specs.is_empty() {
            return;
        }
        self.tasks.lock().push(tokio::spawn(run_loop(reg)));
    }
}

async fn run_loop(reg: Arc<Registration>) {
    loop {
        // Clone signal receivers before reading them so a flip between
        // the read and the await is still observed as a change.
        let mut signals = reg.all_signals();
        match reg.next_due() {
            NextDue::Gated => {
                tokio::select! {
                    _ = any_signal_change(&mut signals) => {}
                    _ = reg.rearm.notified() => {}
                }
            }
            NextDue::Now => run_periodic(&reg).await,
            NextDue::At(due) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(due) => run_periodic(&reg).await,
                    _ = any_signal_change(&mut signals) => {}
                    _ = reg.rearm.notified() => {}
                }
            }
        }
    }
}

async fn run_periodic(reg: &Arc<Registration>) {
    let _guard = reg.run_lock.lock().await;
    // A forced run may have completed while we waited for the lock.
    match reg.next_due() {
        NextDue::Now => {}
        NextDue::At(due) if due <= Instant::now() => {}
        _ => return,
    }
    debug!(id = %reg.id, "periodic update");
    let outcome = (reg.action)().await;
    if !outcome.success {
        warn!(id = %reg.id, "periodic update failed, switching to retry cadence");
    }
    reg.finish_attempt(outcome.success, outcome.next_delay_override);
}

/// Resolves when any live signal changes; pends forever without signals
async fn any_signal_change(signals: &mut Vec<watch::Receiver<bool>>) {
    signals.retain(|signal| signal.has_changed().is_ok());
    if signals.is_empty() {
        std::future::pending::<()>().await;
    }
    let mut futures: Vec<_> = signals
        .iter_mut()
        .map(|signal| Box::pin(signal.changed()))
        .collect();
    std::future::poll_fn(|cx| {
        for fut in futures.iter_mut() {
            if fut.as_mut().poll(cx).is_ready() {
                return Poll::Ready(());
            }
        }
        Poll::Pending
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_action(
        counter: Arc<AtomicU32>,
    ) -> impl Fn() -> BoxFuture<PeriodicActionResult<u32>> + Send + Sync {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                PeriodicActionResult::ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_cadence() {
        let manager = PeriodicUpdateManager::new();
        let counter = Arc::new(AtomicU32::new(0));
        let _handle = manager.register(
            "cadence",
            counting_action(counter.clone()),
            vec![PeriodicUpdateSpec::new(Duration::from_secs(60), vec![])],
        );
        manager.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cadence_until_success() {
        let manager = PeriodicUpdateManager::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let action = {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        PeriodicActionResult::failure(n)
                    } else {
                        PeriodicActionResult::ok(n)
                    }
                }
            }
        };
        let _handle = manager.register(
            "retry",
            action,
            vec![PeriodicUpdateSpec::with_retry(
                Duration::from_secs(600),
                Duration::from_secs(30),
                vec![],
            )],
        );
        manager.start();

        // Two failures retried at the short cadence, then success.
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        // After success the long cadence applies again.
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_gating() {
        let manager = PeriodicUpdateManager::new();
        let counter = Arc::new(AtomicU32::new(0));
        let (gate_tx, gate_rx) = watch::channel(false);
        let _handle = manager.register(
            "gated",
            counting_action(counter.clone()),
            vec![PeriodicUpdateSpec::new(Duration::from_secs(60), vec![gate_rx])],
        );
        manager.start();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Overdue resource runs promptly once the gate flips.
        gate_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        gate_tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_run_is_serialized_with_periodic() {
        let manager = Arc::new(PeriodicUpdateManager::new());
        let running = Arc::new(AtomicU32::new(0));
        let overlapped = Arc::new(AtomicU32::new(0));
        let action = {
            let running = running.clone();
            let overlapped = overlapped.clone();
            move || {
                let running = running.clone();
                let overlapped = overlapped.clone();
                async move {
                    if running.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlapped.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    PeriodicActionResult::ok(())
                }
            }
        };
        let handle = manager.register(
            "exclusive",
            action,
            vec![PeriodicUpdateSpec::new(Duration::from_secs(1), vec![])],
        );
        manager.start();

        let forced = {
            let manager = manager.clone();
            let handle = handle.clone();
            tokio::spawn(async move { manager.execute_now(&handle).await })
        };
        let forced2 = {
            let manager = manager.clone();
            let handle = handle.clone();
            tokio::spawn(async move { manager.execute_now(&handle).await })
        };
        forced.await.unwrap();
        forced2.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_now_returns_typed_result() {
        let manager = PeriodicUpdateManager::new();
        let handle = manager.register_api_call(
            "api",
            || async { Ok::<_, skyhop_common::ApiError>(42u32) },
            vec![PeriodicUpdateSpec::new(Duration::from_secs(60), vec![])],
        );
        let result = manager.execute_now(&handle).await;
        assert_eq!(result, Ok(42));
    }
}
