use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, load_settings_from, AgendaApi, AsyncLifecycleController, ClientSettings,
    DispatchedMessage, DispatcherConfig, ExecuteOptions, IsEmpty, LifecycleSnapshot,
    NotificationDispatcher, OperationError, OperationState, Severity, ToastSurface,
};
use serde::Serialize;
use shared::domain::{EventId, UserId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Fetch agenda data through the client lifecycle controller")]
struct Args {
    /// Backend base URL, e.g. http://127.0.0.1:3000/api
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Users,
    Events,
    Event { id: i64 },
    Confirmations { event_id: i64 },
    Notifications { user_id: i64 },
}

/// Prints toasts to stderr so they do not mix with the JSON on stdout.
struct TerminalToastSurface;

impl ToastSurface for TerminalToastSurface {
    fn present(&self, message: &DispatchedMessage, _duration: Duration) {
        let marker = match message.kind {
            Severity::Success => "ok",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Loading => "...",
        };
        eprintln!("[{marker}] {}", message.text);
    }

    fn withdraw(&self, _message: &DispatchedMessage) {}
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings(),
    };
    if let Some(url) = &args.server_url {
        settings.server_url = url.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.request_timeout_ms = timeout_ms;
    }

    let dispatcher = NotificationDispatcher::new(
        DispatcherConfig::from(&settings),
        Arc::new(TerminalToastSurface),
    );
    if NotificationDispatcher::install_global(Arc::clone(&dispatcher)).is_err() {
        warn!("global dispatcher already initialized; toasts go to the existing instance");
    }

    let api = AgendaApi::from_settings(&settings).context("building api client")?;
    info!(server_url = %api.base_url(), command = ?args.command, "fetching");

    let state = match args.command {
        Command::Users => {
            fetch(&settings, &dispatcher, move |token| async move {
                api.list_users(&token).await
            })
            .await?
        }
        Command::Events => {
            fetch(&settings, &dispatcher, move |token| async move {
                api.list_events(&token).await
            })
            .await?
        }
        Command::Event { id } => {
            fetch(&settings, &dispatcher, move |token| async move {
                api.get_event(EventId(id), &token).await.map(Some)
            })
            .await?
        }
        Command::Confirmations { event_id } => {
            fetch(&settings, &dispatcher, move |token| async move {
                api.list_confirmations(EventId(event_id), &token).await
            })
            .await?
        }
        Command::Notifications { user_id } => {
            fetch(&settings, &dispatcher, move |token| async move {
                api.list_notifications(UserId(user_id), &token).await
            })
            .await?
        }
    };

    Ok(match state {
        OperationState::Error => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Runs one fetch through a fresh controller, resetting it on Ctrl-C, and
/// prints the final snapshot.
async fn fetch<T, F, Fut>(
    settings: &ClientSettings,
    dispatcher: &Arc<NotificationDispatcher>,
    operation: F,
) -> Result<OperationState>
where
    T: Serialize + IsEmpty + Clone + Send + Sync + 'static,
    F: FnOnce(client_core::CancellationToken) -> Fut,
    Fut: std::future::Future<Output = Result<T, OperationError>> + Send + 'static,
{
    let controller = AsyncLifecycleController::from_settings(settings, Arc::clone(dispatcher));
    let run = controller.execute(operation, ExecuteOptions::default());

    tokio::select! {
        _ = run => {}
        _ = tokio::signal::ctrl_c() => {
            controller.reset();
            info!("interrupted; request cancelled");
        }
    }

    let snapshot = controller.snapshot();
    render(&snapshot)?;
    Ok(snapshot.state)
}

fn render<T: Serialize>(snapshot: &LifecycleSnapshot<T>) -> Result<()> {
    match snapshot.state {
        OperationState::Success => {
            println!("{}", serde_json::to_string_pretty(&snapshot.data)?);
        }
        OperationState::Empty => println!("(nothing to show)"),
        OperationState::Error => {
            let message = snapshot.error_message.as_deref().unwrap_or_default();
            eprintln!("failed: {message}");
        }
        OperationState::Idle | OperationState::Loading => {
            eprintln!("no result ({})", snapshot.state);
        }
    }
    Ok(())
}
