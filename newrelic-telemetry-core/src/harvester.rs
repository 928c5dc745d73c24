//! The background thread that periodically flushes batches and sends them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::transport::{BatchSnapshot, Flush, Transport};
use crate::utils::lock;
use crate::{ClientOptions, Error, Response};

const THREAD_NAME: &str = "newrelic-harvester";

/// The lifecycle of a [`Harvester`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HarvesterState {
    /// Pipelines can be registered; no thread is running.
    Created,
    /// The worker thread harvests on every tick.
    Running,
    /// A stop was requested; the worker is doing its final harvest.
    Stopping,
    /// The worker has exited and every client was closed.
    Stopped,
}

impl fmt::Display for HarvesterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HarvesterState::Created => "created",
            HarvesterState::Running => "running",
            HarvesterState::Stopping => "stopping",
            HarvesterState::Stopped => "stopped",
        })
    }
}

/// A batch paired with the client that delivers its snapshots.
trait Harvest: Send + Sync {
    fn name(&self) -> &'static str;
    fn harvest(&self) -> Result<Option<Response>, Error>;
    fn close(&self);
}

struct Pipeline<B, C> {
    batch: Arc<B>,
    client: Arc<C>,
}

impl<B, C> Harvest for Pipeline<B, C>
where
    B: Flush,
    C: Transport<B::Snapshot>,
{
    fn name(&self) -> &'static str {
        B::NAME
    }

    fn harvest(&self) -> Result<Option<Response>, Error> {
        let snapshot = self.batch.flush();
        if snapshot.is_empty() {
            return Ok(None);
        }
        log::debug!(
            "[Harvester({})] Sending {} items (batch {})",
            B::NAME,
            snapshot.len(),
            snapshot.batch_id()
        );
        self.client.send_batch(&snapshot).map(Some)
    }

    fn close(&self) {
        self.client.close();
    }
}

type SharedState = Arc<(Mutex<HarvesterState>, Condvar)>;

fn lock_state(lock: &Mutex<HarvesterState>) -> MutexGuard<'_, HarvesterState> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Flushes registered batches on a fixed interval and sends their snapshots.
///
/// A harvester owns one background thread.  Every tick, each pipeline is
/// flushed and its snapshot handed to the pipeline's transport; failures are
/// logged and never stop the loop.  Stopping performs a final harvest and
/// closes every transport.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use newrelic_telemetry_core::{
///     ClientOptions, Error, Harvester, MetricBatch, MetricSnapshot, Response, Transport,
/// };
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl Transport<MetricSnapshot> for Counter {
///     fn send_batch(&self, snapshot: &MetricSnapshot) -> Result<Response, Error> {
///         self.0.fetch_add(snapshot.len(), Ordering::SeqCst);
///         Ok(Response::new(202, ""))
///     }
/// }
///
/// let batch = Arc::new(MetricBatch::new());
/// let transport = Arc::new(Counter::default());
///
/// let harvester = Harvester::new(&ClientOptions::default());
/// harvester.register(batch.clone(), transport.clone()).unwrap();
/// harvester.start().unwrap();
///
/// batch.record_gauge("queue.depth", 3.0, Default::default()).unwrap();
/// assert!(harvester.stop());
/// assert_eq!(transport.0.load(Ordering::SeqCst), 1);
/// ```
pub struct Harvester {
    interval: Duration,
    shutdown_timeout: Duration,
    pipelines: Mutex<Vec<Arc<dyn Harvest>>>,
    state: SharedState,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Harvester {
    /// Creates a harvester using the interval and shutdown timeout of the
    /// options.
    pub fn new(options: &ClientOptions) -> Self {
        Harvester {
            interval: options.harvest_interval,
            shutdown_timeout: options.shutdown_timeout,
            pipelines: Mutex::new(Vec::new()),
            state: Arc::new((Mutex::new(HarvesterState::Created), Condvar::new())),
            worker: Mutex::new(None),
        }
    }

    /// Overrides the harvest interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides how long [`stop`](Self::stop) waits.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Adds a batch and the transport for its snapshots.
    ///
    /// Only possible before the harvester is started.
    pub fn register<B, C>(&self, batch: Arc<B>, client: Arc<C>) -> Result<(), Error>
    where
        B: Flush,
        C: Transport<B::Snapshot>,
    {
        let state = lock_state(&self.state.0);
        if *state != HarvesterState::Created {
            return Err(Error::InvalidState {
                operation: "register a pipeline on",
                state: *state,
            });
        }
        lock(&self.pipelines).push(Arc::new(Pipeline { batch, client }));
        Ok(())
    }

    /// Spawns the worker thread.
    ///
    /// Fails with [`Error::InvalidConfig`] for a zero harvest interval.  If
    /// the thread cannot be spawned the harvester stays created, keeps its
    /// pipelines and may be started again.
    pub fn start(&self) -> Result<(), Error> {
        self.start_with(thread::Builder::new().name(THREAD_NAME.into()))
    }

    fn start_with(&self, builder: thread::Builder) -> Result<(), Error> {
        let mut state = lock_state(&self.state.0);
        if *state != HarvesterState::Created {
            return Err(Error::InvalidState {
                operation: "start",
                state: *state,
            });
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig(
                "harvest interval must be greater than zero".into(),
            ));
        }

        let mut registered = lock(&self.pipelines);
        let pipelines = registered.clone();
        let worker_state = self.state.clone();
        let interval = self.interval;
        let worker = builder
            .spawn(move || run(pipelines, worker_state, interval))
            .map_err(Error::Spawn)?;
        registered.clear();
        drop(registered);

        *state = HarvesterState::Running;
        *lock(&self.worker) = Some(worker);
        log::debug!("[Harvester] Started with an interval of {:?}", self.interval);
        Ok(())
    }

    /// Stops the worker, waiting up to the shutdown timeout for the final
    /// harvest.
    ///
    /// Returns `true` once the harvester is stopped.  Calling `stop` while a
    /// stop is already in progress returns `false` immediately; use
    /// [`join`](Self::join) to keep waiting.
    pub fn stop(&self) -> bool {
        let (state_lock, cvar) = self.state.as_ref();
        let mut state = lock_state(state_lock);
        match *state {
            HarvesterState::Created => {
                *state = HarvesterState::Stopped;
                cvar.notify_all();
                return true;
            }
            HarvesterState::Stopped => return true,
            HarvesterState::Stopping => return false,
            HarvesterState::Running => {
                *state = HarvesterState::Stopping;
                cvar.notify_all();
            }
        }
        drop(state);

        let stopped = self.join(self.shutdown_timeout);
        if !stopped {
            log::warn!(
                "[Harvester] Final harvest did not finish within {:?}",
                self.shutdown_timeout
            );
        }
        stopped
    }

    /// Waits up to `timeout` for the harvester to be stopped.
    pub fn join(&self, timeout: Duration) -> bool {
        let (state_lock, cvar) = self.state.as_ref();
        let (state, _) = cvar
            .wait_timeout_while(lock_state(state_lock), timeout, |state| {
                *state != HarvesterState::Stopped
            })
            .unwrap_or_else(PoisonError::into_inner);
        if *state != HarvesterState::Stopped {
            return false;
        }
        drop(state);

        if let Some(worker) = lock(&self.worker).take() {
            if worker.join().is_err() {
                log::error!("[Harvester] Worker thread panicked");
            }
        }
        true
    }

    pub fn state(&self) -> HarvesterState {
        *lock_state(&self.state.0)
    }

    /// Whether the worker thread is running or finishing its final harvest.
    pub fn is_alive(&self) -> bool {
        matches!(
            self.state(),
            HarvesterState::Running | HarvesterState::Stopping
        )
    }

    /// The name of the worker thread.
    pub fn name(&self) -> &'static str {
        THREAD_NAME
    }

    /// The id of the worker thread, once started and until joined.
    pub fn thread_id(&self) -> Option<ThreadId> {
        lock(&self.worker).as_ref().map(|w| w.thread().id())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for Harvester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvester")
            .field("state", &self.state())
            .field("interval", &self.interval)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Drop for Harvester {
    fn drop(&mut self) {
        if self.is_alive() {
            self.stop();
        }
    }
}

fn run(pipelines: Vec<Arc<dyn Harvest>>, state: SharedState, interval: Duration) {
    let (state_lock, cvar) = state.as_ref();

    let mut last_harvest = Instant::now();
    loop {
        let timeout = interval
            .checked_sub(last_harvest.elapsed())
            .unwrap_or_default();

        let stopping = {
            let (state, _) = cvar
                .wait_timeout_while(lock_state(state_lock), timeout, |state| {
                    *state == HarvesterState::Running
                })
                .unwrap_or_else(PoisonError::into_inner);
            *state != HarvesterState::Running
        };
        if stopping {
            break;
        }

        if last_harvest.elapsed() < interval {
            continue;
        }
        last_harvest = Instant::now();
        harvest_all(&pipelines);
    }

    harvest_all(&pipelines);
    for pipeline in &pipelines {
        pipeline.close();
    }

    *lock_state(state_lock) = HarvesterState::Stopped;
    cvar.notify_all();
    log::debug!("[Harvester] Stopped");
}

fn harvest_all(pipelines: &[Arc<dyn Harvest>]) {
    for pipeline in pipelines {
        let name = pipeline.name();
        match panic::catch_unwind(AssertUnwindSafe(|| pipeline.harvest())) {
            Ok(Ok(Some(response))) if !response.ok() => {
                log::error!(
                    "[Harvester({name})] send_batch failed with status code: {}",
                    response.status()
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                log::error!("[Harvester({name})] send_batch failed: {err}");
            }
            Err(_) => {
                log::error!("[Harvester({name})] harvest panicked");
            }
        }
    }
}
