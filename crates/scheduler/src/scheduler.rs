//! The bounded scheduler: a lazily started worker pool draining a priority queue.

use async_trait::async_trait;
use futures::FutureExt;
use ragloom_config::SchedulerConfig;
use ragloom_core::Operation;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ScheduleError;
use crate::queue::{CallQueue, Ranked, Rejected};
use crate::signal::CancelSignal;

type Reply<O> = Result<<O as Operation>::Output, ScheduleError<<O as Operation>::Error>>;

/// Per-call scheduling options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Lower runs first; the configured default when `None`
    pub priority: Option<i64>,
    /// Limit on execution time, measured from the moment a worker takes the call
    pub execution_timeout: Option<Duration>,
    /// Limit on waiting for a queue slot; waits forever when `None`
    pub queue_timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }
}

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub live_workers: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub reinit_count: u64,
    pub shutting_down: bool,
}

// ── Queued call ─────────────────────────────────────────────────────────────

struct QueuedCall<O: Operation> {
    priority: i64,
    sequence: u64,
    input: O::Input,
    reply: oneshot::Sender<Reply<O>>,
    signal: Arc<CancelSignal>,
    execution_timeout: Option<Duration>,
}

impl<O: Operation> Ranked for QueuedCall<O> {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }
}

// ── Shared state ────────────────────────────────────────────────────────────

/// State reachable from workers. Holds no worker handles, so workers never
/// keep the pool itself alive.
struct Shared<O: Operation> {
    operation: O,
    config: SchedulerConfig,
    queue: CallQueue<QueuedCall<O>>,
    shutdown: CancelSignal,
    /// Cancel signals of calls whose handle is still alive, by sequence.
    registry: Mutex<HashMap<u64, Arc<CancelSignal>>>,
    sequence: AtomicU64,
    in_flight: AtomicUsize,
}

impl<O: Operation> Shared<O> {
    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<CancelSignal>>> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, sequence: u64, signal: Arc<CancelSignal>) {
        self.registry().insert(sequence, signal);
    }

    fn unregister(&self, sequence: u64) {
        self.registry().remove(&sequence);
    }

    /// Cancel every registered call. Returns how many were cancelled.
    fn cancel_registered(&self) -> usize {
        let signals: Vec<Arc<CancelSignal>> = self.registry().drain().map(|(_, s)| s).collect();
        signals.iter().filter(|s| s.cancel()).count()
    }
}

struct PoolState {
    workers: Vec<JoinHandle<()>>,
    health: Option<JoinHandle<()>>,
    initialized: bool,
    next_worker_id: usize,
}

struct Inner<O: Operation> {
    shared: Arc<Shared<O>>,
    pool: tokio::sync::Mutex<PoolState>,
    started: AtomicBool,
    reinit_count: AtomicU64,
}

impl<O: Operation> Inner<O> {
    fn target_size(&self) -> usize {
        self.shared.config.max_async.max(1)
    }

    /// Start the workers and the health loop on first use.
    async fn ensure_workers(self: &Arc<Self>) {
        if self.started.load(Ordering::Acquire) {
            return;
        }

        let mut pool = self.pool.lock().await;
        if pool.initialized || self.shared.shutdown.is_cancelled() {
            return;
        }

        let spawned = self.spawn_missing(&mut pool);
        pool.health = Some(tokio::spawn(health_loop(
            Arc::downgrade(self),
            self.shared.clone(),
        )));
        pool.initialized = true;
        self.started.store(true, Ordering::Release);

        info!(
            operation = self.shared.operation.name(),
            workers = spawned,
            queue_size = self.shared.config.max_queue_size,
            "Scheduler started"
        );
    }

    fn spawn_missing(&self, pool: &mut PoolState) -> usize {
        let mut spawned = 0;
        while pool.workers.len() < self.target_size() {
            let worker_id = pool.next_worker_id;
            pool.next_worker_id += 1;
            pool.workers
                .push(tokio::spawn(worker_loop(self.shared.clone(), worker_id)));
            spawned += 1;
        }
        spawned
    }

    /// Drop finished worker handles and spawn replacements.
    async fn top_up(&self) {
        let mut pool = self.pool.lock().await;
        if self.shared.shutdown.is_cancelled() {
            return;
        }

        let before = pool.workers.len();
        pool.workers.retain(|handle| !handle.is_finished());
        let finished = before - pool.workers.len();

        if pool.workers.len() < self.target_size() {
            let spawned = self.spawn_missing(&mut pool);
            let reinit = self.reinit_count.fetch_add(1, Ordering::SeqCst) + 1;
            warn!(
                operation = self.shared.operation.name(),
                finished, spawned, reinit, "Worker pool topped up"
            );
        }
    }
}

impl<O: Operation> Drop for Inner<O> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        let pool = self.pool.get_mut();
        for worker in pool.workers.drain(..) {
            worker.abort();
        }
        if let Some(health) = pool.health.take() {
            health.abort();
        }
    }
}

// ── Scheduler ───────────────────────────────────────────────────────────────

/// Runs an operation with at most `max_async` calls in flight.
///
/// Cloning is cheap and every clone drives the same queue and workers.
/// Workers start on the first submission. Dropping the last clone without
/// calling [`shutdown`](Self::shutdown) aborts the workers.
pub struct BoundedScheduler<O: Operation> {
    inner: Arc<Inner<O>>,
}

impl<O: Operation> Clone for BoundedScheduler<O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<O: Operation> BoundedScheduler<O> {
    pub fn new(operation: O, config: SchedulerConfig) -> Self {
        let queue = CallQueue::new(config.max_queue_size);
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    operation,
                    config,
                    queue,
                    shutdown: CancelSignal::new(),
                    registry: Mutex::new(HashMap::new()),
                    sequence: AtomicU64::new(0),
                    in_flight: AtomicUsize::new(0),
                }),
                pool: tokio::sync::Mutex::new(PoolState {
                    workers: Vec::new(),
                    health: None,
                    initialized: false,
                    next_worker_id: 0,
                }),
                started: AtomicBool::new(false),
                reinit_count: AtomicU64::new(0),
            }),
        }
    }

    /// The wrapped operation.
    pub fn operation(&self) -> &O {
        &self.inner.shared.operation
    }

    /// Queue a call and return a handle to its result.
    ///
    /// Returns once the call is in the queue, so calls enqueued one after
    /// another keep their submission order among equal priorities.
    pub async fn enqueue(
        &self,
        input: O::Input,
        options: CallOptions,
    ) -> Result<PendingCall<O>, ScheduleError<O::Error>> {
        let shared = &self.inner.shared;
        if shared.shutdown.is_cancelled() {
            return Err(ScheduleError::ShuttingDown);
        }
        self.inner.ensure_workers().await;

        let sequence = shared.sequence.fetch_add(1, Ordering::SeqCst);
        let priority = options.priority.unwrap_or(shared.config.default_priority);
        let signal = Arc::new(CancelSignal::new());
        let (reply, receiver) = oneshot::channel();

        shared.register(sequence, signal.clone());
        let pending = PendingCall {
            sequence,
            receiver,
            signal: signal.clone(),
            shared: shared.clone(),
        };

        let call = QueuedCall {
            priority,
            sequence,
            input,
            reply,
            signal,
            execution_timeout: options.execution_timeout,
        };

        match shared
            .queue
            .put(call, options.queue_timeout, &shared.shutdown)
            .await
        {
            Ok(()) => {
                debug!(sequence, priority, "Call queued");
                Ok(pending)
            }
            Err(Rejected::Full) => {
                warn!(
                    operation = shared.operation.name(),
                    queue_size = shared.config.max_queue_size,
                    "Queue full, call rejected"
                );
                Err(ScheduleError::QueueFull)
            }
            Err(Rejected::Closed) => Err(ScheduleError::ShuttingDown),
        }
    }

    /// Queue a call and wait for its result.
    pub async fn submit(
        &self,
        input: O::Input,
        options: CallOptions,
    ) -> Result<O::Output, ScheduleError<O::Error>> {
        self.enqueue(input, options).await?.wait().await
    }

    /// Stop accepting calls, cancel everything pending, and stop the workers.
    ///
    /// Waits up to the configured grace period for cancelled work to wind
    /// down before aborting the workers. Later calls return immediately.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let shared = &inner.shared;
        if !shared.shutdown.cancel() {
            debug!("Scheduler shutdown already requested");
            return;
        }
        info!(operation = shared.operation.name(), "Shutting down scheduler");

        let cancelled = shared.cancel_registered();
        let dropped = shared.queue.drain();
        let dropped_count = dropped.len();
        for call in dropped {
            let _ = call.reply.send(Err(ScheduleError::Cancelled));
        }
        debug!(cancelled, dropped = dropped_count, "Pending calls cancelled");

        if tokio::time::timeout(shared.config.shutdown_grace(), shared.queue.join())
            .await
            .is_err()
        {
            warn!(
                grace_ms = shared.config.shutdown_grace_ms,
                "Queue did not drain within the shutdown grace period"
            );
        }

        let (workers, health) = {
            let mut pool = inner.pool.lock().await;
            (std::mem::take(&mut pool.workers), pool.health.take())
        };
        for worker in &workers {
            worker.abort();
        }
        for worker in workers {
            let _ = worker.await;
        }
        if let Some(health) = health {
            health.abort();
            let _ = health.await;
        }

        info!(operation = shared.operation.name(), "Scheduler shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shared.shutdown.is_cancelled()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let pool = self.inner.pool.lock().await;
        let shared = &self.inner.shared;
        SchedulerStats {
            live_workers: pool.workers.iter().filter(|h| !h.is_finished()).count(),
            queued: shared.queue.len(),
            in_flight: shared.in_flight.load(Ordering::SeqCst),
            reinit_count: self.inner.reinit_count.load(Ordering::SeqCst),
            shutting_down: shared.shutdown.is_cancelled(),
        }
    }
}

#[async_trait]
impl<O: Operation> Operation for BoundedScheduler<O> {
    type Input = O::Input;
    type Output = O::Output;
    type Error = ScheduleError<O::Error>;

    fn name(&self) -> &str {
        self.inner.shared.operation.name()
    }

    async fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.submit(input, CallOptions::default()).await
    }
}

// ── Pending call ────────────────────────────────────────────────────────────

/// Handle to a queued call. Dropping it cancels the call.
pub struct PendingCall<O: Operation> {
    sequence: u64,
    receiver: oneshot::Receiver<Reply<O>>,
    signal: Arc<CancelSignal>,
    shared: Arc<Shared<O>>,
}

impl<O: Operation> PendingCall<O> {
    /// Submission order of this call.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Cancel the call; a worker running it stops at its next await point.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub async fn wait(mut self) -> Result<O::Output, ScheduleError<O::Error>> {
        match (&mut self.receiver).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScheduleError::Cancelled),
        }
    }
}

impl<O: Operation> Drop for PendingCall<O> {
    fn drop(&mut self) {
        self.signal.cancel();
        self.shared.unregister(self.sequence);
    }
}

// ── Background tasks ────────────────────────────────────────────────────────

async fn worker_loop<O: Operation>(shared: Arc<Shared<O>>, worker_id: usize) {
    debug!(worker_id, operation = shared.operation.name(), "Worker started");
    let poll = shared.config.poll_interval();

    loop {
        // Wake periodically even when idle so shutdown is always observed.
        let call = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            popped = tokio::time::timeout(poll, shared.queue.pop()) => match popped {
                Ok(call) => call,
                Err(_) => continue,
            },
        };

        let _running = Running::start(&shared);
        execute(&shared, call).await;
    }

    debug!(worker_id, "Worker stopped");
}

/// Marks one dequeued call as in flight until dropped.
///
/// Released on drop so an aborted worker still settles `in_flight` and the
/// queue's unfinished count that `shutdown` waits on.
struct Running<'a, O: Operation>(&'a Shared<O>);

impl<'a, O: Operation> Running<'a, O> {
    fn start(shared: &'a Shared<O>) -> Self {
        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(shared)
    }
}

impl<O: Operation> Drop for Running<'_, O> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.queue.task_done();
    }
}

/// Run one call and deliver its outcome to the caller's handle.
///
/// A panicking operation is caught here and reported as a worker fault so
/// the worker keeps serving the queue.
async fn execute<O: Operation>(shared: &Shared<O>, call: QueuedCall<O>) {
    let QueuedCall {
        sequence,
        input,
        reply,
        signal,
        execution_timeout,
        ..
    } = call;

    if signal.is_cancelled() || reply.is_closed() {
        debug!(sequence, "Skipping cancelled call");
        let _ = reply.send(Err(ScheduleError::Cancelled));
        return;
    }

    let name = shared.operation.name();
    let work = AssertUnwindSafe(shared.operation.call(input)).catch_unwind();
    let guarded = async {
        match execution_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(finished) => settle(finished, name, sequence),
                Err(_) => {
                    warn!(
                        operation = name,
                        sequence,
                        timeout_ms = limit.as_millis() as u64,
                        "Call exceeded its execution timeout"
                    );
                    Err(ScheduleError::Timeout(limit))
                }
            },
            None => settle(work.await, name, sequence),
        }
    };

    let outcome = tokio::select! {
        _ = signal.cancelled() => {
            debug!(sequence, "Call cancelled while running");
            Err(ScheduleError::Cancelled)
        }
        outcome = guarded => outcome,
    };

    if reply.send(outcome).is_err() {
        debug!(sequence, "Caller went away before the result was delivered");
    }
}

fn settle<T, E>(
    finished: Result<Result<T, E>, Box<dyn Any + Send>>,
    operation: &str,
    sequence: u64,
) -> Result<T, ScheduleError<E>> {
    match finished {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ScheduleError::Operation(e)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(operation, sequence, panic = %message, "Operation panicked, worker continues");
            Err(ScheduleError::WorkerFault(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn health_loop<O: Operation>(inner: Weak<Inner<O>>, shared: Arc<Shared<O>>) {
    let mut ticker = tokio::time::interval(shared.config.health_check_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.top_up().await;
    }

    debug!("Health check loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    #[derive(Debug, thiserror::Error)]
    #[error("job failed: {0}")]
    struct JobError(String);

    enum Work {
        Sleep(Duration),
        Gate(Arc<Notify>),
        Fail,
        Panic,
    }

    struct Job {
        label: &'static str,
        work: Work,
    }

    fn job(label: &'static str, work: Work) -> Job {
        Job { label, work }
    }

    fn sleep_ms(ms: u64) -> Work {
        Work::Sleep(Duration::from_millis(ms))
    }

    #[derive(Default)]
    struct JobLog {
        started: Mutex<Vec<&'static str>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl JobLog {
        fn started(&self) -> Vec<&'static str> {
            self.started.lock().unwrap().clone()
        }
    }

    struct ActiveGuard<'a>(&'a AtomicUsize);

    impl Drop for ActiveGuard<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct Recorder(Arc<JobLog>);

    #[async_trait]
    impl Operation for Recorder {
        type Input = Job;
        type Output = &'static str;
        type Error = JobError;

        fn name(&self) -> &str {
            "recorder"
        }

        async fn call(&self, job: Job) -> Result<&'static str, JobError> {
            self.0.started.lock().unwrap().push(job.label);
            let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            let _active = ActiveGuard(&self.0.active);

            match job.work {
                Work::Sleep(d) => tokio::time::sleep(d).await,
                Work::Gate(gate) => gate.notified().await,
                Work::Fail => return Err(JobError(job.label.to_string())),
                Work::Panic => panic!("job panic"),
            }
            Ok(job.label)
        }
    }

    fn test_config(max_async: usize, max_queue_size: usize) -> SchedulerConfig {
        SchedulerConfig {
            max_async,
            max_queue_size,
            poll_interval_ms: 20,
            health_check_interval_ms: 50,
            shutdown_grace_ms: 500,
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(max_async: usize, max_queue_size: usize) -> (BoundedScheduler<Recorder>, Arc<JobLog>) {
        let state = Arc::new(JobLog::default());
        let sched = BoundedScheduler::new(Recorder(state.clone()), test_config(max_async, max_queue_size));
        (sched, state)
    }

    async fn wait_for_start(state: &JobLog, label: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !state.started().iter().any(|s| *s == label) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("call never started");
    }

    #[tokio::test]
    async fn completions_follow_priority_then_submission_order() {
        let (sched, state) = scheduler(1, 16);
        let gate = Arc::new(Notify::new());
        let opts = CallOptions::default();

        let blocker = sched
            .enqueue(job("blocker", Work::Gate(gate.clone())), opts.with_priority(0))
            .await
            .unwrap();

        let mut pending = Vec::new();
        for (label, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 3), ("e", 1)] {
            pending.push(
                sched
                    .enqueue(job(label, sleep_ms(1)), opts.with_priority(priority))
                    .await
                    .unwrap(),
            );
        }

        gate.notify_one();
        assert_eq!(blocker.wait().await.unwrap(), "blocker");
        for call in pending {
            call.wait().await.unwrap();
        }

        assert_eq!(state.started(), vec!["blocker", "b", "e", "d", "a", "c"]);
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn never_exceeds_max_async() {
        let (sched, state) = scheduler(3, 64);

        let calls = (0..12).map(|_| sched.submit(job("burst", sleep_ms(20)), CallOptions::default()));
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        let peak = state.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded the limit");
        assert!(peak > 1, "calls never overlapped");
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn overflow_submission_gets_queue_full() {
        let (sched, state) = scheduler(1, 2);
        let gate = Arc::new(Notify::new());
        let opts = CallOptions::default();

        let blocker = sched
            .enqueue(job("blocker", Work::Gate(gate.clone())), opts)
            .await
            .unwrap();
        wait_for_start(&state, "blocker").await;

        let first = sched.enqueue(job("q1", sleep_ms(1)), opts).await.unwrap();
        let second = sched.enqueue(job("q2", sleep_ms(1)), opts).await.unwrap();

        let overflow = sched
            .enqueue(
                job("q3", sleep_ms(1)),
                opts.with_queue_timeout(Duration::from_millis(30)),
            )
            .await;
        assert!(matches!(overflow, Err(ScheduleError::QueueFull)));

        gate.notify_one();
        blocker.wait().await.unwrap();
        assert_eq!(first.wait().await.unwrap(), "q1");
        assert_eq!(second.wait().await.unwrap(), "q2");
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_fails_only_the_slow_call() {
        let (sched, _state) = scheduler(2, 16);

        let slow = sched.submit(
            job("slow", sleep_ms(500)),
            CallOptions::default().with_execution_timeout(Duration::from_millis(50)),
        );
        let fast = sched.submit(job("fast", sleep_ms(10)), CallOptions::default());
        let (slow, fast) = tokio::join!(slow, fast);

        assert!(matches!(slow, Err(ScheduleError::Timeout(_))));
        assert_eq!(fast.unwrap(), "fast");
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn operation_error_is_returned_unchanged() {
        let (sched, _state) = scheduler(1, 4);
        let err = sched
            .submit(job("bad", Work::Fail), CallOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "job failed: bad");
        let inner = err.into_operation_error().unwrap();
        assert_eq!(inner.0, "bad");
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_call_does_not_kill_worker() {
        let (sched, _state) = scheduler(1, 4);

        let err = sched
            .submit(job("boom", Work::Panic), CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::WorkerFault(ref m) if m == "job panic"));

        let ok = sched
            .submit(job("after", sleep_ms(1)), CallOptions::default())
            .await
            .unwrap();
        assert_eq!(ok, "after");
        assert_eq!(sched.stats().await.live_workers, 1);
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_and_rejects_new_calls() {
        let (sched, state) = scheduler(1, 8);
        let gate = Arc::new(Notify::new());
        let opts = CallOptions::default();

        let running = sched
            .enqueue(job("running", Work::Gate(gate)), opts)
            .await
            .unwrap();
        wait_for_start(&state, "running").await;
        let queued = sched.enqueue(job("queued", sleep_ms(1)), opts).await.unwrap();

        sched.shutdown().await;

        assert!(matches!(running.wait().await, Err(ScheduleError::Cancelled)));
        assert!(matches!(queued.wait().await, Err(ScheduleError::Cancelled)));
        assert!(!state.started().contains(&"queued"));

        let late = sched.submit(job("late", sleep_ms(1)), opts).await;
        assert!(matches!(late, Err(ScheduleError::ShuttingDown)));

        let stats = sched.stats().await;
        assert!(stats.shutting_down);
        assert_eq!(stats.live_workers, 0);

        // Second shutdown is a no-op.
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_settles_a_running_call_without_waiting_out_the_grace() {
        let state = Arc::new(JobLog::default());
        let config = SchedulerConfig {
            shutdown_grace_ms: 2_000,
            ..test_config(1, 4)
        };
        let sched = BoundedScheduler::new(Recorder(state.clone()), config);
        let gate = Arc::new(Notify::new());

        let running = sched
            .enqueue(job("running", Work::Gate(gate)), CallOptions::default())
            .await
            .unwrap();
        wait_for_start(&state, "running").await;
        assert_eq!(sched.stats().await.in_flight, 1);

        let started = std::time::Instant::now();
        sched.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(matches!(running.wait().await, Err(ScheduleError::Cancelled)));
        assert_eq!(sched.stats().await.in_flight, 0);
        assert_eq!(state.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn aborted_worker_releases_its_call() {
        let state = Arc::new(JobLog::default());
        let config = SchedulerConfig {
            shutdown_grace_ms: 2_000,
            ..test_config(1, 4)
        };
        let sched = BoundedScheduler::new(Recorder(state.clone()), config);
        let never = Arc::new(Notify::new());

        let stuck = sched
            .enqueue(job("stuck", Work::Gate(never)), CallOptions::default())
            .await
            .unwrap();
        wait_for_start(&state, "stuck").await;

        sched.inner.pool.lock().await.workers[0].abort();
        assert!(matches!(stuck.wait().await, Err(ScheduleError::Cancelled)));
        assert_eq!(sched.stats().await.in_flight, 0);

        let started = std::time::Instant::now();
        sched.shutdown().await;
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "shutdown waited for a call that no worker was running"
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_the_running_call() {
        let (sched, state) = scheduler(1, 4);
        let never = Arc::new(Notify::new());

        let stuck = sched
            .enqueue(job("stuck", Work::Gate(never)), CallOptions::default())
            .await
            .unwrap();
        wait_for_start(&state, "stuck").await;
        drop(stuck);

        let next = tokio::time::timeout(
            Duration::from_secs(2),
            sched.submit(job("next", sleep_ms(1)), CallOptions::default()),
        )
        .await
        .expect("worker stayed busy with a dropped call");
        assert_eq!(next.unwrap(), "next");
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn health_check_replaces_dead_workers() {
        let (sched, _state) = scheduler(2, 4);
        sched
            .submit(job("warmup", sleep_ms(1)), CallOptions::default())
            .await
            .unwrap();

        sched.inner.pool.lock().await.workers[0].abort();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = sched.stats().await;
        assert_eq!(stats.live_workers, 2);
        assert!(stats.reinit_count >= 1);
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_first_submissions_start_one_pool() {
        let (sched, _state) = scheduler(2, 32);

        let calls = (0..8).map(|_| sched.submit(job("first", sleep_ms(5)), CallOptions::default()));
        futures::future::join_all(calls).await;

        let stats = sched.stats().await;
        assert_eq!(stats.live_workers, 2);
        assert_eq!(stats.reinit_count, 0);
        assert_eq!(stats.queued, 0);
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn scheduler_is_itself_an_operation() {
        let (sched, _state) = scheduler(1, 4);
        assert_eq!(Operation::name(&sched), "recorder");
        let out = Operation::call(&sched, job("via-trait", sleep_ms(1))).await.unwrap();
        assert_eq!(out, "via-trait");
        sched.shutdown().await;
    }
}
