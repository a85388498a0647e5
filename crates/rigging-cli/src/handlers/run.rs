//! Run command handler.
//!
//! Each `--phase` becomes one locally spawned process. Phases start in the
//! order given and stop in reverse once every process has exited or the
//! user presses Ctrl-C. A second Ctrl-C while stopping abandons the
//! graceful stop.

use std::sync::Arc;

use anyhow::Result;
use rigging_core::{Description, Group, RiggingConfig, SharedUnit};
use rigging_runtime::{Application, ConsoleWaitStrategy};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{CliContext, CliError};

/// Turn a whitespace-separated command line into a description.
///
/// No quoting is supported; wrap complex commands in a script.
pub fn describe(phase: &str) -> Result<Description, CliError> {
    let mut words = phase.split_whitespace();
    let executable = words
        .next()
        .ok_or_else(|| CliError::Arguments("phase command is empty".to_string()))?;
    Ok(Description::new(executable).with_args(words))
}

/// Build one application per phase, all sharing `cancel`.
pub fn applications(
    phases: &[String],
    ready: Option<&str>,
    config: &RiggingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Arc<Application>>> {
    phases
        .iter()
        .map(|phase| -> Result<Arc<Application>> {
            let description = describe(phase)?;
            let app = match ready {
                Some(pattern) => {
                    Application::local(description, ConsoleWaitStrategy::new(pattern)?, config)
                }
                None => Application::local_unchecked(description, config),
            };
            Ok(Arc::new(app.with_cancellation(cancel.clone())))
        })
        .collect()
}

/// One phase per application, in order.
pub fn group(apps: &[Arc<Application>]) -> Group {
    let mut units = apps.iter().map(|app| Arc::clone(app) as SharedUnit);
    let mut group = Group::of(units.next());
    for unit in units {
        group = group.then([unit]);
    }
    group
}

/// Execute the run command.
pub async fn execute(ctx: &CliContext, phases: &[String], ready: Option<&str>) -> Result<()> {
    let cancel = CancellationToken::new();
    let apps = applications(phases, ready, &ctx.config, &cancel)?;
    let group = group(&apps);

    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let started = group.start().await;
    interrupt.abort();
    started?;

    for app in &apps {
        match app.console() {
            Ok(console) => info!(
                unit = %app,
                stdout = %console.output_file().display(),
                "Running"
            ),
            Err(_) => info!(unit = %app, "Running"),
        }
    }

    tokio::select! {
        result = group.await_stop() => {
            result?;
            info!("All processes exited");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
        }
    }

    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let stopped = group.stop().await;
    interrupt.abort();

    for app in &apps {
        match app.exit_code() {
            Ok(code) => println!("{app}: exit code {code}"),
            Err(e) => warn!(unit = %app, error = %e, "No exit code"),
        }
    }

    stopped?;
    Ok(())
}

fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            cancel.cancel();
        }
    })
}
