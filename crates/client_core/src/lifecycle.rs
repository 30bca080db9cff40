//! Single-flight controller that drives one cancellable, timeout-bounded
//! operation at a time and exposes its outcome as an [`OperationState`].
//!
//! Every `execute` call gets a fresh run id and [`CancellationToken`]. Starting
//! a run cancels the previous token, and a settlement is applied only while
//! its run id is still the active one. A late response can therefore never
//! overwrite the state produced by a newer call.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    config::{ClientSettings, ErrorMessages},
    error::OperationError,
    notifier::NotificationDispatcher,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Loading,
    Success,
    Empty,
    Error,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// What a view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSnapshot<T> {
    pub state: OperationState,
    pub data: Option<T>,
    pub error_message: Option<String>,
}

impl<T> Default for LifecycleSnapshot<T> {
    fn default() -> Self {
        Self {
            state: OperationState::Idle,
            data: None,
            error_message: None,
        }
    }
}

/// Default emptiness test used to classify a resolved value as `Empty`.
pub trait IsEmpty {
    fn is_empty_result(&self) -> bool;
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for VecDeque<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> IsEmpty for HashMap<K, V, S> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsEmpty for BTreeMap<K, V> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> IsEmpty for HashSet<T, S> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for String {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}

type EmptyCheck<T> = Box<dyn Fn(&T) -> bool + Send>;
type ValueCallback<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorCallback = Box<dyn FnOnce(&OperationError, &str) + Send>;

pub struct ExecuteOptions<T> {
    empty_check: EmptyCheck<T>,
    on_success: Option<ValueCallback<T>>,
    on_empty: Option<ValueCallback<T>>,
    on_error: Option<ErrorCallback>,
    show_notification_on_error: bool,
}

impl<T: IsEmpty + 'static> Default for ExecuteOptions<T> {
    fn default() -> Self {
        Self::with_empty_check(Box::new(|value: &T| value.is_empty_result()))
    }
}

impl<T: 'static> ExecuteOptions<T> {
    /// Options for payloads that are never classified as `Empty`.
    pub fn never_empty() -> Self {
        Self::with_empty_check(Box::new(|_: &T| false))
    }

    fn with_empty_check(empty_check: EmptyCheck<T>) -> Self {
        Self {
            empty_check,
            on_success: None,
            on_empty: None,
            on_error: None,
            show_notification_on_error: true,
        }
    }

    pub fn empty_when(mut self, check: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.empty_check = Box::new(check);
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_empty(mut self, callback: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_empty = Some(Box::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl FnOnce(&OperationError, &str) + Send + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn notify_on_error(mut self, enabled: bool) -> Self {
        self.show_notification_on_error = enabled;
        self
    }
}

enum RunOutcome<T> {
    Resolved(T),
    Failed(OperationError),
    Cancelled,
}

struct ActiveRun {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RunSlot {
    last_run_id: u64,
    active: Option<ActiveRun>,
    disposed: bool,
}

struct Shared<T> {
    timeout: Duration,
    dispatcher: Arc<NotificationDispatcher>,
    messages: ErrorMessages,
    slot: Mutex<RunSlot>,
    view: watch::Sender<LifecycleSnapshot<T>>,
}

impl<T: Clone> Shared<T> {
    fn lock_slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Option<(u64, CancellationToken)> {
        let mut slot = self.lock_slot();
        if slot.disposed {
            warn!("execute called on a disposed controller; ignoring");
            return None;
        }
        if let Some(previous) = slot.active.take() {
            debug!(run_id = previous.id, "superseding outstanding operation");
            previous.token.cancel();
        }
        slot.last_run_id += 1;
        let run_id = slot.last_run_id;
        let token = CancellationToken::new();
        slot.active = Some(ActiveRun {
            id: run_id,
            token: token.clone(),
        });
        self.view.send_modify(|view| {
            view.state = OperationState::Loading;
            view.error_message = None;
        });
        trace!(run_id, "operation started");
        Some((run_id, token))
    }

    /// Takes the active run if `run_id` still owns the slot.
    fn claim(slot: &mut RunSlot, run_id: u64) -> Option<ActiveRun> {
        if slot.disposed {
            return None;
        }
        if slot.active.as_ref().is_some_and(|run| run.id == run_id) {
            slot.active.take()
        } else {
            None
        }
    }

    fn settle(
        &self,
        run_id: u64,
        outcome: RunOutcome<T>,
        options: ExecuteOptions<T>,
    ) -> Result<Option<T>, OperationError> {
        let mut slot = self.lock_slot();
        let Some(run) = Self::claim(&mut slot, run_id) else {
            trace!(run_id, "discarding stale settlement");
            return Ok(None);
        };

        match outcome {
            RunOutcome::Cancelled | RunOutcome::Failed(OperationError::Cancelled) => {
                run.token.cancel();
                self.view.send_modify(|view| {
                    view.state = OperationState::Idle;
                    view.error_message = None;
                });
                drop(slot);
                debug!(run_id, "operation aborted; returning to idle");
                Ok(None)
            }
            RunOutcome::Resolved(value) => {
                let empty = (options.empty_check)(&value);
                let state = if empty {
                    OperationState::Empty
                } else {
                    OperationState::Success
                };
                self.view.send_modify(|view| {
                    view.state = state;
                    view.data = Some(value.clone());
                    view.error_message = None;
                });
                drop(slot);
                debug!(run_id, state = %state, "operation settled");

                let callback = if empty {
                    options.on_empty
                } else {
                    options.on_success
                };
                if let Some(callback) = callback {
                    callback(&value);
                }
                Ok(Some(value))
            }
            RunOutcome::Failed(err) => {
                if matches!(err, OperationError::Timeout(_)) {
                    run.token.cancel();
                }
                let message = err.user_message(&self.messages);
                self.view.send_modify(|view| {
                    view.state = OperationState::Error;
                    view.error_message = Some(message.clone());
                });
                drop(slot);
                warn!(run_id, kind = ?err.kind(), error = %err, "operation failed");

                if options.show_notification_on_error {
                    self.dispatcher.error(message.clone());
                }
                if let Some(callback) = options.on_error {
                    callback(&err, &message);
                }
                Err(err)
            }
        }
    }

    /// Called when an execute future is dropped before settling.
    fn abandon(&self, run_id: u64) {
        let mut slot = self.lock_slot();
        if let Some(run) = Self::claim(&mut slot, run_id) {
            run.token.cancel();
            self.view.send_modify(|view| view.state = OperationState::Idle);
            debug!(run_id, "operation dropped before settling; returning to idle");
        }
    }

    fn cancel_active(&self, slot: &mut RunSlot) {
        if let Some(run) = slot.active.take() {
            debug!(run_id = run.id, "cancelling outstanding operation");
            run.token.cancel();
        }
    }
}

/// Cancels and idles its run if the execute future is dropped mid-flight.
struct RunGuard<T: Clone> {
    shared: Arc<Shared<T>>,
    run_id: u64,
    armed: bool,
}

impl<T: Clone> Drop for RunGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon(self.run_id);
        }
    }
}

/// Owned by exactly one view. Dropping it cancels the outstanding operation
/// and freezes the observable state.
pub struct AsyncLifecycleController<T: Clone> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for AsyncLifecycleController<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl<T> AsyncLifecycleController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Controller reporting to the global dispatcher with default messages.
    pub fn new(timeout: Duration) -> Self {
        Self::with_dispatcher(
            timeout,
            NotificationDispatcher::global(),
            ErrorMessages::default(),
        )
    }

    pub fn with_dispatcher(
        timeout: Duration,
        dispatcher: Arc<NotificationDispatcher>,
        messages: ErrorMessages,
    ) -> Self {
        let (view, _) = watch::channel(LifecycleSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                timeout,
                dispatcher,
                messages,
                slot: Mutex::new(RunSlot::default()),
                view,
            }),
        }
    }

    pub fn from_settings(settings: &ClientSettings, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self::with_dispatcher(
            settings.request_timeout(),
            dispatcher,
            settings.messages.clone(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    pub fn state(&self) -> OperationState {
        self.shared.view.borrow().state
    }

    pub fn data(&self) -> Option<T> {
        self.shared.view.borrow().data.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared.view.borrow().error_message.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state() == OperationState::Loading
    }

    pub fn snapshot(&self) -> LifecycleSnapshot<T> {
        self.shared.view.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot<T>> {
        self.shared.view.subscribe()
    }

    /// Runs `operation`, swallowing failures into the `Error` state.
    ///
    /// Resolves to the payload on `Success`/`Empty`, and to `None` on failure,
    /// cancellation, or when the run was superseded.
    pub fn execute<F, Fut>(
        &self,
        operation: F,
        options: ExecuteOptions<T>,
    ) -> impl Future<Output = Option<T>> + Send + 'static
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let run = self.try_execute(operation, options);
        async move { run.await.ok().flatten() }
    }

    /// Like [`execute`](Self::execute) but hands timeouts and failures back to
    /// the caller after the state transition. Cancellation still resolves to
    /// `Ok(None)`.
    ///
    /// The run starts, supersedes any earlier one, and its timeout begins when
    /// this is called, not when the returned future is first polled.
    pub fn try_execute<F, Fut>(
        &self,
        operation: F,
        options: ExecuteOptions<T>,
    ) -> impl Future<Output = Result<Option<T>, OperationError>> + Send + 'static
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let deadline = crate::deadline_after(shared.timeout);
        let started = shared.begin().map(|(run_id, token)| {
            let guard = RunGuard {
                shared: Arc::clone(&shared),
                run_id,
                armed: true,
            };
            (guard, token.clone(), operation(token))
        });

        async move {
            let Some((mut guard, token, pending)) = started else {
                return Ok(None);
            };
            let run_id = guard.run_id;

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => RunOutcome::Cancelled,
                settled = tokio::time::timeout_at(deadline, pending) => match settled {
                    Ok(Ok(value)) => RunOutcome::Resolved(value),
                    Ok(Err(err)) => RunOutcome::Failed(err),
                    Err(_) => RunOutcome::Failed(OperationError::Timeout(shared.timeout)),
                },
            };

            guard.armed = false;
            shared.settle(run_id, outcome, options)
        }
    }

    /// Cancels any outstanding run and returns to `Idle` with cleared data.
    pub fn reset(&self) {
        let mut slot = self.shared.lock_slot();
        self.shared.cancel_active(&mut slot);
        self.shared.view.send_replace(LifecycleSnapshot::default());
    }

    /// Overrides the observable state without touching the active run.
    pub fn set_state(&self, state: OperationState) {
        let _slot = self.shared.lock_slot();
        self.shared.view.send_modify(|view| {
            view.state = state;
            if state != OperationState::Error {
                view.error_message = None;
            }
        });
    }

    /// Cancels the outstanding run and rejects every later mutation. Called
    /// on drop; views that keep the controller alive past unmount call it
    /// directly.
    pub fn dispose(&self) {
        let mut slot = self.shared.lock_slot();
        if slot.disposed {
            return;
        }
        slot.disposed = true;
        self.shared.cancel_active(&mut slot);
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock_slot().disposed
    }
}

impl<T: Clone> Drop for AsyncLifecycleController<T> {
    fn drop(&mut self) {
        let mut slot = self.shared.lock_slot();
        slot.disposed = true;
        self.shared.cancel_active(&mut slot);
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
