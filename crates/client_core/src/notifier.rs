//! Process-wide toast dispatcher with text-keyed deduplication and a cap on
//! simultaneously visible messages.
//!
//! The dispatcher only tracks logical visibility. Drawing is delegated to a
//! [`ToastSurface`]. Surfaces are called while the registry lock is held and
//! must not call back into the dispatcher.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak},
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info};

use crate::config::ClientSettings;

static GLOBAL_DISPATCHER: OnceLock<Arc<NotificationDispatcher>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Error,
    Info,
    Loading,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Loading => "loading",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedMessage {
    pub text: String,
    pub kind: Severity,
    pub handle: ToastHandle,
}

pub trait ToastSurface: Send + Sync {
    fn present(&self, message: &DispatchedMessage, duration: Duration);
    fn withdraw(&self, message: &DispatchedMessage);
}

/// Surface that writes toasts to the log. Used by the global dispatcher
/// until an application installs its own.
pub struct TracingToastSurface;

impl ToastSurface for TracingToastSurface {
    fn present(&self, message: &DispatchedMessage, duration: Duration) {
        info!(
            kind = %message.kind,
            duration_ms = duration.as_millis() as u64,
            "toast: {}",
            message.text
        );
    }

    fn withdraw(&self, message: &DispatchedMessage) {
        debug!(kind = %message.kind, "toast withdrawn: {}", message.text);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShowOptions {
    /// Overrides the per-kind dwell time.
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub max_visible: usize,
    pub duration: Duration,
    pub error_duration: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for DispatcherConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            max_visible: settings.max_toasts.max(1),
            duration: settings.toast_duration(),
            error_duration: settings.error_toast_duration(),
        }
    }
}

impl DispatcherConfig {
    fn duration_for(&self, kind: Severity) -> Duration {
        match kind {
            Severity::Error => self.error_duration,
            Severity::Success | Severity::Info | Severity::Loading => self.duration,
        }
    }
}

struct Entry {
    message: DispatchedMessage,
    expires_at: Instant,
    expiry_task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, Entry>,
    next_handle: u64,
}

pub struct NotificationDispatcher {
    config: DispatcherConfig,
    surface: Arc<dyn ToastSurface>,
    registry: Mutex<Registry>,
    this: Weak<NotificationDispatcher>,
}

impl NotificationDispatcher {
    pub fn new(config: DispatcherConfig, surface: Arc<dyn ToastSurface>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config: DispatcherConfig {
                max_visible: config.max_visible.max(1),
                ..config
            },
            surface,
            registry: Mutex::new(Registry::default()),
            this: this.clone(),
        })
    }

    /// The process-wide dispatcher. Lazily created with default settings and
    /// a [`TracingToastSurface`] unless [`install_global`](Self::install_global)
    /// ran first.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_DISPATCHER.get_or_init(|| {
            Self::new(DispatcherConfig::default(), Arc::new(TracingToastSurface))
        }))
    }

    /// Installs `dispatcher` as the process-wide instance. Fails, handing the
    /// dispatcher back, once [`global`](Self::global) has been initialized.
    pub fn install_global(dispatcher: Arc<Self>) -> Result<(), Arc<Self>> {
        GLOBAL_DISPATCHER.set(dispatcher)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn show(&self, text: impl Into<String>, kind: Severity, options: ShowOptions) -> ToastHandle {
        let text = text.into();
        let mut registry = self.lock_registry();
        self.prune_expired(&mut registry);

        if let Some(existing) = registry.entries.get(&text) {
            debug!(kind = %kind, "toast already visible; collapsing duplicate");
            return existing.message.handle;
        }

        if registry.entries.len() >= self.config.max_visible {
            self.withdraw_all(&mut registry);
        }

        registry.next_handle += 1;
        let handle = ToastHandle(registry.next_handle);
        let duration = options
            .duration
            .unwrap_or_else(|| self.config.duration_for(kind));
        let expires_at = crate::deadline_after(duration);
        let message = DispatchedMessage {
            text: text.clone(),
            kind,
            handle,
        };

        self.surface.present(&message, duration);
        let expiry_task = self.schedule_expiry(text.clone(), handle, expires_at);
        registry.entries.insert(
            text,
            Entry {
                message,
                expires_at,
                expiry_task,
            },
        );
        handle
    }

    pub fn success(&self, text: impl Into<String>) -> ToastHandle {
        self.show(text, Severity::Success, ShowOptions::default())
    }

    pub fn error(&self, text: impl Into<String>) -> ToastHandle {
        self.show(text, Severity::Error, ShowOptions::default())
    }

    pub fn info(&self, text: impl Into<String>) -> ToastHandle {
        self.show(text, Severity::Info, ShowOptions::default())
    }

    pub fn loading(&self, text: impl Into<String>) -> ToastHandle {
        self.show(text, Severity::Loading, ShowOptions::default())
    }

    /// Hides the message with exactly this text. Returns whether one was visible.
    pub fn dismiss(&self, text: &str) -> bool {
        let mut registry = self.lock_registry();
        self.prune_expired(&mut registry);
        match registry.entries.remove(text) {
            Some(entry) => {
                self.retire(entry);
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        let mut registry = self.lock_registry();
        self.withdraw_all(&mut registry);
    }

    pub fn is_active(&self, text: &str) -> bool {
        let mut registry = self.lock_registry();
        self.prune_expired(&mut registry);
        registry.entries.contains_key(text)
    }

    pub fn active_count(&self) -> usize {
        let mut registry = self.lock_registry();
        self.prune_expired(&mut registry);
        registry.entries.len()
    }

    fn expire(&self, text: &str, handle: ToastHandle) {
        let mut registry = self.lock_registry();
        let matches = registry
            .entries
            .get(text)
            .is_some_and(|entry| entry.message.handle == handle);
        if !matches {
            return;
        }
        if let Some(mut entry) = registry.entries.remove(text) {
            // Running inside this task; aborting it would be a no-op anyway.
            entry.expiry_task = None;
            self.retire(entry);
        }
    }

    fn schedule_expiry(
        &self,
        text: String,
        handle: ToastHandle,
        expires_at: Instant,
    ) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!("no tokio runtime; toast expiry is checked lazily");
                return None;
            }
        };
        let this = self.this.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            if let Some(dispatcher) = this.upgrade() {
                dispatcher.expire(&text, handle);
            }
        }))
    }

    /// Removes entries whose dwell time has passed but whose timer has not
    /// run yet, so introspection never reports a stale message.
    fn prune_expired(&self, registry: &mut Registry) {
        let now = Instant::now();
        let expired: Vec<String> = registry
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(text, _)| text.clone())
            .collect();
        for text in expired {
            if let Some(entry) = registry.entries.remove(&text) {
                self.retire(entry);
            }
        }
    }

    fn withdraw_all(&self, registry: &mut Registry) {
        for (_, entry) in registry.entries.drain() {
            self.retire(entry);
        }
    }

    fn retire(&self, entry: Entry) {
        if let Some(task) = entry.expiry_task {
            task.abort();
        }
        self.surface.withdraw(&entry.message);
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/notifier_tests.rs"]
mod tests;
