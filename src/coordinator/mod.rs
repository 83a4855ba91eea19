//! Execution coordination.
//!
//! A [`Slot`] is one logical request tab. It runs at most one execution at a
//! time: sending while an execution is in flight cancels that execution and
//! starts the new one. The superseded execution still finishes with a
//! `Cancelled` outcome and is still recorded.
//!
//! Every execution, whatever its outcome, is appended to history exactly once.
//! Progress is observed through [`Slot::subscribe`]; the only ways to act on a
//! slot are [`Slot::send`] and [`Slot::cancel`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rappit_core::coordinator::Coordinator;
//! use rappit_core::executor::HttpExecutor;
//! use rappit_core::history::{HistoryConfig, HistoryStore};
//! use rappit_core::models::{HttpMethod, RequestSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpExecutor::from_global_config()?);
//! let history = Arc::new(HistoryStore::in_memory(HistoryConfig::default()));
//! let coordinator = Coordinator::new(transport, history);
//!
//! let slot = coordinator.open_slot();
//! let spec = RequestSpec::builder(HttpMethod::GET, "https://api.example.com/status").build()?;
//! let completion = slot.send(spec).await?;
//! println!("{}", completion.outcome.summary());
//! # Ok(())
//! # }
//! ```

pub mod retry;
pub mod state;

pub use retry::{execute_with_retry, RetryPolicy};
pub use state::SlotState;

use crate::executor::Transport;
use crate::formatter::{process, FormattedResponse};
use crate::history::{HistoryEntry, HistoryError, HistoryStore, PendingEntry};
use crate::models::{ExecutionOutcome, OutcomeKind, RequestSpec};
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Errors surfaced by an [`Execution`] handle.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The task running the execution panicked or was aborted.
    #[error("execution task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Result of one execution.
#[derive(Debug)]
pub struct Completion {
    /// Per-slot execution number.
    pub execution: u64,
    pub outcome: ExecutionOutcome,
    /// Present only for successful outcomes.
    pub formatted: Option<FormattedResponse>,
    /// The appended history entry, or why it could not be persisted.
    pub history: Result<Arc<HistoryEntry>, HistoryError>,
}

/// Shared entry point that hands out slots.
pub struct Coordinator<T> {
    transport: Arc<T>,
    history: Arc<HistoryStore>,
    retry: RetryPolicy,
}

impl<T> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            history: Arc::clone(&self.history),
            retry: self.retry.clone(),
        }
    }
}

impl<T: Transport + 'static> Coordinator<T> {
    pub fn new(transport: Arc<T>, history: Arc<HistoryStore>) -> Self {
        Self {
            transport,
            history,
            retry: RetryPolicy::none(),
        }
    }

    /// Replaces the retry policy applied to every execution.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Creates a new, idle slot.
    pub fn open_slot(&self) -> Slot<T> {
        let (state, _) = watch::channel(SlotState::Idle);
        let slot = Slot {
            id: Uuid::new_v4(),
            coordinator: self.clone(),
            inner: Arc::new(SlotInner {
                state,
                current: Mutex::new(None),
                next_execution: AtomicU64::new(1),
            }),
        };
        debug!("opened slot {}", slot.id);
        slot
    }

    async fn run(
        self,
        slot: Arc<SlotInner>,
        slot_id: Uuid,
        execution: u64,
        spec: RequestSpec,
        cancel: CancellationToken,
    ) -> Completion {
        let (outcome, attempts) =
            execute_with_retry(self.transport.as_ref(), &spec, &self.retry, &cancel).await;
        if attempts > 1 {
            debug!("slot {} execution #{} took {} attempts", slot_id, execution, attempts);
        }

        let formatted = match &outcome {
            ExecutionOutcome::Success {
                status_code,
                headers,
                body,
                ..
            } => Some(process(*status_code, headers, body)),
            _ => None,
        };

        let history = self
            .history
            .append(PendingEntry::new(spec, outcome.clone(), formatted.clone()))
            .await;
        if let Err(e) = &history {
            warn!(
                "slot {} execution #{} not recorded in history: {}",
                slot_id, execution, e
            );
        }

        slot.finish(slot_id, execution, outcome.kind());

        Completion {
            execution,
            outcome,
            formatted,
            history,
        }
    }
}

struct InFlight {
    execution: u64,
    cancel: CancellationToken,
}

struct SlotInner {
    state: watch::Sender<SlotState>,
    current: Mutex<Option<InFlight>>,
    next_execution: AtomicU64,
}

impl SlotInner {
    fn current(&self) -> MutexGuard<'_, Option<InFlight>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Publishes the end of `execution`, unless a newer one has replaced it.
    fn finish(&self, slot_id: Uuid, execution: u64, outcome: OutcomeKind) {
        let mut current = self.current();
        if current.as_ref().map(|c| c.execution) != Some(execution) {
            debug!("slot {} execution #{} finished after being superseded", slot_id, execution);
            return;
        }
        *current = None;

        let state = match outcome {
            OutcomeKind::Cancelled => SlotState::Cancelled { execution },
            outcome => SlotState::Completed { execution, outcome },
        };
        debug!("slot {} -> {}", slot_id, state);
        self.state.send_replace(state);
    }
}

/// One logical request tab.
///
/// Cloning a slot yields another handle to the same slot.
pub struct Slot<T> {
    id: Uuid,
    coordinator: Coordinator<T>,
    inner: Arc<SlotInner>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            coordinator: self.coordinator.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl<T: Transport + 'static> Slot<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Starts executing `spec`, cancelling any execution still in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send(&self, spec: RequestSpec) -> Execution {
        let execution = self.inner.next_execution.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        {
            let mut current = self.inner.current();
            let previous = current.replace(InFlight {
                execution,
                cancel: cancel.clone(),
            });
            if let Some(previous) = previous {
                debug!(
                    "slot {} execution #{} superseded by #{}",
                    self.id, previous.execution, execution
                );
                previous.cancel.cancel();
            }
            self.inner.state.send_replace(SlotState::Sending { execution });
        }
        debug!("slot {} -> sending #{}: {}", self.id, execution, spec);

        let handle = tokio::spawn(self.coordinator.clone().run(
            Arc::clone(&self.inner),
            self.id,
            execution,
            spec,
            cancel.clone(),
        ));

        Execution {
            id: execution,
            cancel,
            handle,
        }
    }

    /// Cancels the execution in flight.
    ///
    /// Returns `false` if there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        match self.inner.current().as_ref() {
            Some(in_flight) => {
                debug!("slot {} cancelling #{}", self.id, in_flight.execution);
                in_flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SlotState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SlotState> {
        self.inner.state.subscribe()
    }
}

/// Handle to a running execution. Await it for the [`Completion`].
///
/// Dropping the handle does not cancel the execution.
#[derive(Debug)]
pub struct Execution {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Completion>,
}

impl Execution {
    /// Per-slot execution number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancels this execution. No effect once its response has been read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for Execution {
    type Output = Result<Completion, CoordinatorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.map_err(CoordinatorError::from))
    }
}
