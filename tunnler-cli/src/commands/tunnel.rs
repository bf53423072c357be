//! Tunnel command

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::console::style;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tunnler_core::{
    CredentialSource, RawCredentials, TunnelController, TunnelEvent, TunnelRegistry,
};

use super::setup::print_error;

/// How long the exit hook waits for tunnels to close
const EXIT_BUDGET: Duration = Duration::from_secs(5);

/// Arguments for the tunnel command
#[derive(Debug, Clone, Args)]
pub struct TunnelArgs {
    /// Local port to expose (1-65535)
    #[arg(short, long, required = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Subdomain to publish under (random if omitted)
    #[arg(short, long)]
    pub subdomain: Option<String>,

    /// Zone to create the DNS record in (defaults to the saved zone)
    #[arg(short, long)]
    pub zone: Option<String>,

    /// Local service scheme and host, without port
    #[arg(short = 'e', long)]
    pub service: Option<String>,

    /// Cloudflare API token
    #[arg(short = 'a', long)]
    pub api_key: Option<String>,

    /// Cloudflare account ID
    #[arg(short = 'i', long)]
    pub account_id: Option<String>,
}

impl TunnelArgs {
    fn explicit_credentials(&self) -> RawCredentials {
        RawCredentials {
            api_key: self.api_key.clone(),
            account_id: self.account_id.clone(),
            default_zone: None,
        }
    }
}

/// Run the tunnel command until interrupted or the tunnel closes
pub async fn run(args: TunnelArgs) -> Result<()> {
    let port = args.port.context("--port is required")?;

    let credentials = CredentialSource::default()
        .resolve(args.explicit_credentials())?
        .require()
        .context("Run 'tunnler init' or pass --api-key and --account-id")?;

    let registry = TunnelRegistry::new();
    let controller = TunnelController::from_credentials(&credentials, registry.clone())?;
    let spec = controller
        .spec(port)
        .subdomain(args.subdomain)
        .zone(args.zone)
        .service(args.service)
        .build()?;

    let handle = controller.create(&spec).await?;
    let printer = EventPrinter::spawn(handle.subscribe());

    if let Err(e) = handle.connect().await {
        shutdown(&registry).await;
        printer.finish().await;
        return Err(e.into());
    }

    let result = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutting down tunnel...");
            shutdown(&registry).await;
            Ok(())
        }
        closed = handle.closed() => closed.map_err(Into::into),
    };

    printer.finish().await;
    result
}

/// Exit hook: close every registered tunnel within the budget
async fn shutdown(registry: &TunnelRegistry) {
    let report = registry.close_all(EXIT_BUDGET).await;
    if !report.is_clean() {
        print_error(&format!(
            "{} tunnel(s) may still exist in Cloudflare",
            report.failed + report.timed_out
        ));
        warn!(
            closed = report.closed,
            failed = report.failed,
            timed_out = report.timed_out,
            "Some tunnels were not cleaned up"
        );
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}

/// Prints tunnel events to stdout from a background task
struct EventPrinter {
    task: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

impl EventPrinter {
    fn spawn(events: Receiver<TunnelEvent>) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            print_events_to(&mut io::stdout(), events, stop_rx).await;
        });
        Self { task, stop }
    }

    /// Print whatever was already sent, then stop
    async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

async fn print_events_to<W: Write>(
    w: &mut W,
    mut events: Receiver<TunnelEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let _ = print_event_to(w, &event);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return,
            },
            _ = &mut stop => break,
        }
    }

    // Events sent before the stop request are still queued
    loop {
        match events.try_recv() {
            Ok(event) => {
                let _ = print_event_to(w, &event);
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

/// Status lines for connect and close events
fn print_event_to<W: Write>(w: &mut W, event: &TunnelEvent) -> io::Result<()> {
    match event {
        TunnelEvent::Connected { domain, service } => {
            writeln!(w, "{} Connection established", style("[Tunnel]").cyan().bold())?;
            writeln!(w, "{} -> {}", style(domain).green(), service)
        }
        TunnelEvent::Closed { .. } => {
            writeln!(w, "{} Connection closed", style("[Tunnel]").cyan().bold())
        }
        TunnelEvent::Failed { error, .. } => {
            writeln!(w, "{} {}", style("[Tunnel]").red().bold(), error)
        }
    }
}
