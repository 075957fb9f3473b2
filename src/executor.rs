//! Dedicated worker loops that run submitted tasks one at a time.
//!
//! Each [`SerialExecutor`] owns one OS thread running a single-threaded tokio
//! runtime. Tasks are queued on an unbounded channel and awaited strictly in
//! submission order, so a task observes the effects of every task submitted
//! before it to the same executor. Tasks on different executors have no
//! relative ordering.
//!
//! Submitting never blocks: the caller receives an [`AsyncResult`] (or
//! registers a callback) and the work happens on the loop.
//!
//! [`Executors`] holds exactly one executor per [`Subsystem`], started lazily
//! on first [`acquire`](Executors::acquire). The acquiring caller waits until
//! the loop signals readiness. A loop that cannot be started is reported as
//! an [`ErrorKind::Unavailable`](crate::error::ErrorKind::Unavailable) error.
//!
//! # Failure isolation
//!
//! A task that returns an error or panics does not stop its loop; the loop
//! logs the failure and carries on with the next task.
//!
//! # Example
//!
//! ```rust
//! use mcremote::executor::{Executors, Subsystem};
//!
//! let executors = Executors::new();
//! let control = executors.acquire(Subsystem::Control)?;
//! let result = control.submit(|| async { Ok(1 + 1) });
//! assert_eq!(result.await?, 2);
//! ```

use std::{any::Any, fmt, future::Future, panic::AssertUnwindSafe, sync::mpsc as std_mpsc, thread};

use futures_util::{future::BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    response::{AsyncResult, Responder},
};

type Task = BoxFuture<'static, ()>;

/// The subsystems that each get their own worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subsystem {
    /// Playback commands and state queries.
    Control,
    /// Library queries and playlist mutation.
    Music,
    /// Thumbnail downloads from the media center.
    Download,
    /// Memory tier lookups of the thumbnail cache.
    MemoryCache,
    /// Disk tier lookups of the thumbnail cache.
    DiskCache,
}

impl Subsystem {
    pub const ALL: [Self; 5] = [
        Self::Control,
        Self::Music,
        Self::Download,
        Self::MemoryCache,
        Self::DiskCache,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Music => "music",
            Self::Download => "download",
            Self::MemoryCache => "memcache",
            Self::DiskCache => "diskcache",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single worker loop executing tasks in submission order.
pub struct SerialExecutor {
    name: &'static str,
    tx: mpsc::UnboundedSender<Task>,
    shutdown: CancellationToken,
}

impl SerialExecutor {
    /// Spawns the worker thread and waits until its loop accepts work.
    ///
    /// # Errors
    ///
    /// Returns an `Unavailable` error if the thread cannot be spawned, its
    /// runtime cannot be built, or it exits before signalling readiness.
    pub fn start(name: &'static str) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<()>>(1);
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        thread::Builder::new()
            .name(format!("{}-{name}", env!("CARGO_PKG_NAME")))
            .spawn(move || Self::run(name, rx, token, &ready_tx))
            .map_err(|e| Error::unavailable(format!("cannot spawn {name} loop: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("{name} loop ready");
                Ok(Self { name, tx, shutdown })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::unavailable(format!(
                "{name} loop exited before signalling readiness"
            ))),
        }
    }

    fn run(
        name: &'static str,
        mut rx: mpsc::UnboundedReceiver<Task>,
        shutdown: CancellationToken,
        ready: &std_mpsc::SyncSender<Result<()>>,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                // The starter is blocked on the readiness channel and will
                // report this as its own error.
                let _ = ready.send(Err(Error::unavailable(format!(
                    "cannot build {name} runtime: {e}"
                ))));
                return;
            }
        };

        runtime.block_on(async move {
            if ready.send(Ok(())).is_err() {
                return;
            }

            loop {
                let task = tokio::select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    task = rx.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };

                if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                    error!("{name} task panicked: {}", panic_message(panic.as_ref()));
                }
            }

            // Dropping the receiver drops every queued task, which cancels
            // their results.
            rx.close();
            debug!("{name} loop stopped");
        });
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the loop has been asked to stop.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }

    /// Queues a raw task on the loop.
    ///
    /// Used by services that hand a [`Responder`] from one loop to another.
    /// If the loop has stopped, the task is dropped, which cancels any
    /// responder it owns.
    pub fn post<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(task.boxed()).is_err() {
            warn!("{} loop has stopped; dropping task", self.name);
        }
    }

    /// Queues `task` and returns a handle to its result.
    pub fn submit<F, Fut, T>(&self, task: F) -> AsyncResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (responder, result) = AsyncResult::pair();
        self.submit_to(task, responder);
        result
    }

    /// Queues `task` and delivers its result by invoking `callback` on the
    /// loop.
    ///
    /// The callback is typically a send onto the caller's own event channel.
    pub fn submit_with<F, Fut, T, C>(&self, task: F, callback: C)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(Result<T>) + Send + 'static,
    {
        self.submit_to(task, Responder::from_callback(callback));
    }

    /// Queues `task` under a cancellation token.
    ///
    /// If `token` is cancelled before the task starts, the task is skipped.
    /// If it is cancelled while the task runs, the task is abandoned at its
    /// next suspension point. Either way the result is a `Cancelled` error.
    pub fn submit_scoped<F, Fut, T>(&self, token: &CancellationToken, task: F) -> AsyncResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let token = token.clone();
        let name = self.name;
        self.submit(move || async move {
            if token.is_cancelled() {
                debug!("{name} task cancelled before it started");
                return Err(Error::cancelled("cancelled before start"));
            }

            tokio::select! {
                biased;

                () = token.cancelled() => {
                    debug!("{name} task cancelled while running");
                    Err(Error::cancelled("cancelled while running"))
                }
                result = task() => result,
            }
        })
    }

    fn submit_to<F, Fut, T>(&self, task: F, responder: Responder<T>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let name = self.name;
        self.post(async move {
            let result = task().await;
            if let Err(ref e) = result {
                debug!("{name} task failed: {e}");
            }
            responder.done(result);
        });
    }

    /// Stops the loop once the current task completes.
    ///
    /// Queued tasks are dropped and resolve to `Cancelled`; so do tasks
    /// submitted afterwards.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("shutting down {} loop", self.name);
            self.shutdown.cancel();
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// One lazily started executor per subsystem.
#[derive(Debug, Default)]
pub struct Executors {
    loops: [OnceCell<SerialExecutor>; Subsystem::ALL.len()],
}

impl Executors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the executor for `subsystem`, starting it on first use.
    ///
    /// Concurrent first callers block until the single start attempt
    /// finishes. A started loop is never restarted.
    ///
    /// # Errors
    ///
    /// Returns an `Unavailable` error if the loop cannot be started. The next
    /// call makes a fresh attempt.
    pub fn acquire(&self, subsystem: Subsystem) -> Result<&SerialExecutor> {
        self.loops[subsystem.index()].get_or_try_init(|| {
            info!("starting {subsystem} loop");
            SerialExecutor::start(subsystem.name()).inspect_err(|e| {
                error!("{subsystem} loop failed to start: {e}");
            })
        })
    }

    /// Runs `task` on the subsystem's loop, reporting a startup failure
    /// through the returned result.
    pub fn submit<F, Fut, T>(&self, subsystem: Subsystem, task: F) -> AsyncResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.acquire(subsystem) {
            Ok(executor) => executor.submit(task),
            Err(e) => AsyncResult::ready(Err(e)),
        }
    }

    /// Whether the subsystem's loop has been started.
    #[must_use]
    pub fn is_started(&self, subsystem: Subsystem) -> bool {
        self.loops[subsystem.index()].get().is_some()
    }

    /// Stops every started loop.
    pub fn shutdown(&self) {
        for executor in self.loops.iter().filter_map(OnceCell::get) {
            executor.shutdown();
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
