//! Layout execution host
//!
//! Runs the numeric kernels on a dedicated worker thread so the thread that
//! asked for a layout (typically a render loop) never blocks on the O(n²)
//! simulation. Communication is message based: a request carrying copies of
//! the nodes, edges, algorithm and options goes in over a channel, exactly one
//! reply comes back over a oneshot.
//!
//! The host accepts one request at a time. A request that arrives while
//! another is dispatched or running is rejected with
//! [`LayoutError::HostBusy`]; nothing is queued.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{LayoutError, LayoutResult, panic_message};
use crate::kernel::{self, Algorithm, KernelReport};
use crate::options::LayoutOptions;
use crate::types::{EdgeRef, NodePosition};

/// Lifecycle of the host's current (or last) request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Nothing has been requested yet
    Idle,
    /// A request was accepted and is waiting for the worker
    Dispatched,
    /// The worker is computing
    Running,
    /// The last request produced positions
    Completed,
    /// The last request produced an error
    Failed,
}

impl HostState {
    /// True while a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, HostState::Dispatched | HostState::Running)
    }
}

/// Everything the worker needs for one run, owned by value
#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub algorithm: Algorithm,
    pub nodes: Vec<NodePosition>,
    pub edges: Vec<EdgeRef>,
    pub options: LayoutOptions,
}

struct Job {
    request: LayoutRequest,
    reply: oneshot::Sender<LayoutResult<KernelReport>>,
}

/// Handle to a layout worker thread
///
/// Clones share the same worker, so the one-request-at-a-time rule holds
/// across all of them. The worker exits once every handle is dropped.
#[derive(Clone)]
pub struct LayoutHost {
    requests: mpsc::Sender<Job>,
    state: Arc<watch::Sender<HostState>>,
}

impl LayoutHost {
    /// Start a worker thread and return a handle to it
    pub fn spawn() -> std::io::Result<Self> {
        let (requests, inbox) = mpsc::channel::<Job>(1);
        let state = Arc::new(watch::Sender::new(HostState::Idle));

        let worker_state = Arc::clone(&state);
        thread::Builder::new()
            .name("layout-worker".to_string())
            .spawn(move || worker_loop(inbox, worker_state))?;

        Ok(Self { requests, state })
    }

    /// Current state of the host
    pub fn state(&self) -> HostState {
        *self.state.borrow()
    }

    /// Wait until no request is in flight
    pub async fn wait_idle(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = state.wait_for(|s| !s.is_busy()).await;
    }

    /// Run a request on the worker and wait for its single reply
    pub async fn run(&self, request: LayoutRequest) -> LayoutResult<KernelReport> {
        let claimed = self.state.send_if_modified(|state| {
            if state.is_busy() {
                false
            } else {
                *state = HostState::Dispatched;
                true
            }
        });
        if !claimed {
            tracing::debug!(algorithm = %request.algorithm, "rejecting request, host busy");
            return Err(LayoutError::HostBusy);
        }

        let (reply, response) = oneshot::channel();
        if self.requests.try_send(Job { request, reply }).is_err() {
            self.state.send_replace(HostState::Failed);
            return Err(LayoutError::execution(
                "layout worker is not accepting requests",
            ));
        }

        response
            .await
            .map_err(|_| LayoutError::execution("layout worker dropped the request"))?
    }

    /// Like [`LayoutHost::run`], failing if no reply arrives within `timeout`
    ///
    /// On timeout the computation is not interrupted; its result is discarded
    /// and the host stays busy until the worker finishes.
    pub async fn run_with_timeout(
        &self,
        request: LayoutRequest,
        timeout: Duration,
    ) -> LayoutResult<KernelReport> {
        tokio::time::timeout(timeout, self.run(request))
            .await
            .map_err(|_| {
                LayoutError::execution(format!(
                    "layout host did not respond within {} ms",
                    timeout.as_millis()
                ))
            })?
    }
}

fn worker_loop(mut inbox: mpsc::Receiver<Job>, state: Arc<watch::Sender<HostState>>) {
    while let Some(Job { request, reply }) = inbox.blocking_recv() {
        state.send_replace(HostState::Running);
        let algorithm = request.algorithm;

        let outcome = execute(request);

        state.send_replace(if outcome.is_ok() {
            HostState::Completed
        } else {
            HostState::Failed
        });
        if reply.send(outcome).is_err() {
            tracing::warn!(%algorithm, "caller stopped waiting, discarding layout result");
        }
    }
    tracing::debug!("layout worker shutting down");
}

/// Run the kernel, turning a panic into an ordinary error
fn execute(request: LayoutRequest) -> LayoutResult<KernelReport> {
    let LayoutRequest {
        algorithm,
        nodes,
        edges,
        options,
    } = request;

    panic::catch_unwind(AssertUnwindSafe(|| {
        kernel::run(algorithm, &nodes, &edges, &options)
    }))
    .unwrap_or_else(|payload| {
        Err(LayoutError::execution(format!(
            "{algorithm} kernel panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}
