//! Client-side core of the youth agenda: the single-flight operation
//! controller, the process-wide toast dispatcher, and the REST client the
//! views feed into them.

pub mod api;
pub mod config;
pub mod debounce;
pub mod error;
pub mod lifecycle;
pub mod notifier;

pub use api::AgendaApi;
pub use config::{load_settings, load_settings_from, ClientSettings, ErrorMessages, SettingsError};
pub use debounce::Debouncer;
pub use error::{ErrorKind, OperationError};
pub use lifecycle::{
    AsyncLifecycleController, ExecuteOptions, IsEmpty, LifecycleSnapshot, OperationState,
    DEFAULT_TIMEOUT,
};
pub use notifier::{
    DispatchedMessage, DispatcherConfig, NotificationDispatcher, Severity, ShowOptions,
    ToastHandle, ToastSurface, TracingToastSurface,
};
pub use tokio_util::sync::CancellationToken;

/// Roughly thirty years; stands in for durations too large to add to `Instant`.
const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);

/// `now + duration`, saturating to a far-future deadline instead of panicking.
pub(crate) fn deadline_after(duration: std::time::Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}
