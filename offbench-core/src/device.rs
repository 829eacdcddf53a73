//! Offload Device
//!
//! The execution context that dispatch strategies route work into. A
//! [`Device`] owns device-side memory (a resident buffer plus transient
//! allocations) and a team pool for grouped execution. Tasks are submitted
//! with [`Device::launch`], which returns a [`Completion`] to wait on.
//!
//! ## Kinds
//!
//! - **Thread** (default): tasks run on a dedicated device thread, so work
//!   observably leaves the caller's context.
//! - **Inline**: tasks run synchronously on the caller's thread. Useful only to
//!   demonstrate that the context-divergence gate rejects a non-offloading
//!   backend.
//!
//! ```text
//!  caller ── launch(task) ──► [queue] ──► device thread ── task(&mut DeviceContext)
//!     │                                                        │
//!     └──────────── Completion::wait() ◄──── oneshot ◄─────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread::{JoinHandle, ThreadId};
use thiserror::Error;
use tokio::sync::oneshot;

type Task = Box<dyn FnOnce(&mut DeviceContext) + Send + 'static>;

/// Where device tasks execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Dedicated device thread
    #[default]
    Thread,
    /// Caller's own thread (no offload)
    Inline,
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(DeviceKind::Thread),
            "inline" => Ok(DeviceKind::Inline),
            other => Err(format!("Unknown device kind: {}", other)),
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Thread => write!(f, "thread"),
            DeviceKind::Inline => write!(f, "inline"),
        }
    }
}

/// Device construction parameters
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Execution kind
    pub kind: DeviceKind,
    /// Team pool width (defaults to available parallelism)
    pub threads: Option<usize>,
}

/// Device failures
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to spawn device thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("failed to build device team pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("device has shut down")]
    ShutDown,

    #[error("device task panicked before completing")]
    TaskLost,
}

/// Device-side state visible to running tasks
pub struct DeviceContext {
    resident: Vec<f64>,
    pool: rayon::ThreadPool,
    tasks_run: u64,
}

impl DeviceContext {
    fn new(pool: rayon::ThreadPool) -> Self {
        Self {
            resident: Vec::new(),
            pool,
            tasks_run: 0,
        }
    }

    /// The device-resident buffer, grown (zero-filled) to at least `len` elements
    pub fn resident(&mut self, len: usize) -> &mut [f64] {
        if self.resident.len() < len {
            self.resident.resize(len, 0.0);
        }
        &mut self.resident[..len]
    }

    /// Resident buffer together with the team pool
    pub fn resident_with_pool(&mut self, len: usize) -> (&mut [f64], &rayon::ThreadPool) {
        if self.resident.len() < len {
            self.resident.resize(len, 0.0);
        }
        (&mut self.resident[..len], &self.pool)
    }

    /// A fresh zeroed device allocation
    pub fn allocate(&self, len: usize) -> Vec<f64> {
        vec![0.0; len]
    }

    /// Team pool for grouped execution
    pub fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }

    /// Number of tasks this device has run, including the current one
    pub fn tasks_run(&self) -> u64 {
        self.tasks_run
    }
}

/// Handle to a launched task
#[must_use = "a launched task must be waited on"]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Block until the task finishes and return its output
    pub fn wait(self) -> Result<T, DeviceError> {
        self.rx.blocking_recv().map_err(|_| DeviceError::TaskLost)
    }
}

enum Backend {
    Thread {
        sender: Option<mpsc::Sender<Task>>,
        handle: Option<JoinHandle<()>>,
        thread_id: ThreadId,
    },
    Inline {
        context: Mutex<DeviceContext>,
    },
}

/// An offload execution context
pub struct Device {
    kind: DeviceKind,
    threads: usize,
    backend: Backend,
}

impl Device {
    /// Create a device from configuration
    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let threads = config
            .threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("offbench-team-{}", i))
            .build()?;
        let context = DeviceContext::new(pool);

        let backend = match config.kind {
            DeviceKind::Thread => {
                let (sender, receiver) = mpsc::channel::<Task>();
                let handle = std::thread::Builder::new()
                    .name("offbench-device".to_string())
                    .spawn(move || device_main(receiver, context))?;
                let thread_id = handle.thread().id();
                Backend::Thread {
                    sender: Some(sender),
                    handle: Some(handle),
                    thread_id,
                }
            }
            DeviceKind::Inline => Backend::Inline {
                context: Mutex::new(context),
            },
        };

        tracing::debug!(kind = %config.kind, threads, "device started");

        Ok(Self {
            kind: config.kind,
            threads,
            backend,
        })
    }

    /// Device with a dedicated thread and default pool width
    pub fn spawn() -> Result<Self, DeviceError> {
        Self::new(&DeviceConfig::default())
    }

    /// Device that runs tasks on the caller's thread
    pub fn inline() -> Result<Self, DeviceError> {
        Self::new(&DeviceConfig {
            kind: DeviceKind::Inline,
            threads: Some(1),
        })
    }

    /// Execution kind
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Team pool width
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Thread that runs device tasks, if the device owns one
    pub fn device_thread(&self) -> Option<ThreadId> {
        match &self.backend {
            Backend::Thread { thread_id, .. } => Some(*thread_id),
            Backend::Inline { .. } => None,
        }
    }

    /// Submit a task without waiting for it.
    ///
    /// Inline devices run the task before returning; the completion is then
    /// already resolved.
    pub fn launch<T, F>(&self, f: F) -> Result<Completion<T>, DeviceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceContext) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: Task = Box::new(move |ctx| {
            let _ = tx.send(f(ctx));
        });

        match &self.backend {
            Backend::Thread { sender, .. } => {
                sender
                    .as_ref()
                    .ok_or(DeviceError::ShutDown)?
                    .send(task)
                    .map_err(|_| DeviceError::ShutDown)?;
            }
            Backend::Inline { context } => {
                let mut ctx = context.lock().unwrap_or_else(|e| e.into_inner());
                run_task(task, &mut ctx);
            }
        }

        Ok(Completion { rx })
    }

    /// Submit a task and block until it completes
    pub fn execute<T, F>(&self, f: F) -> Result<T, DeviceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceContext) -> T + Send + 'static,
    {
        self.launch(f)?.wait()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Backend::Thread { sender, handle, .. } = &mut self.backend {
            // Closing the queue ends the device loop
            sender.take();
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind)
            .field("threads", &self.threads)
            .field("device_thread", &self.device_thread())
            .finish()
    }
}

fn device_main(receiver: mpsc::Receiver<Task>, mut context: DeviceContext) {
    while let Ok(task) = receiver.recv() {
        run_task(task, &mut context);
    }
    tracing::debug!(tasks = context.tasks_run, "device stopped");
}

/// A panicking task drops its completion sender, which the waiter sees as
/// [`DeviceError::TaskLost`]. The device itself keeps running.
fn run_task(task: Task, context: &mut DeviceContext) {
    context.tasks_run += 1;
    if catch_unwind(AssertUnwindSafe(|| task(context))).is_err() {
        tracing::warn!("device task panicked");
    }
}
