// ABOUTME: Interactive session loop over input lines, interrupts and pipeline health.
// ABOUTME: Always shuts the event pipeline down before returning, also when the loop fails.

use anyhow::Result;
use chatline_core::{HealthState, PipelineHandle, PipelineReport};
use std::future::Future;
use std::io::Write;
use tokio::sync::mpsc;

use crate::compose::{Action, Composer};
use crate::view::ChatView;

/// Run the session until `/quit`, end of input or `interrupt` fires, then
/// shut the pipeline down. A loop error is returned after the shutdown.
pub async fn run<W: Write + Send>(
    pipeline: PipelineHandle,
    composer: &mut Composer<W>,
    view: &ChatView<W>,
    lines: &mut mpsc::Receiver<String>,
    interrupt: impl Future<Output = ()>,
) -> Result<PipelineReport> {
    let outcome = input_loop(&pipeline, composer, view, lines, interrupt).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %format!("{:#}", e), "Session failed, shutting down");
    }
    let report = pipeline.shutdown().await;
    outcome?;
    report
}

async fn input_loop<W: Write + Send>(
    pipeline: &PipelineHandle,
    composer: &mut Composer<W>,
    view: &ChatView<W>,
    lines: &mut mpsc::Receiver<String>,
    interrupt: impl Future<Output = ()>,
) -> Result<()> {
    let mut health_rx = pipeline.health().subscribe();
    tokio::pin!(interrupt);

    view.notice("welcome to chatline, /help for commands")?;
    composer.list_chats().await?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::info!("Input closed");
                    return Ok(());
                };
                if composer.handle_line(&line).await? == Action::Quit {
                    return Ok(());
                }
            }
            _ = &mut interrupt => {
                tracing::info!("Interrupted");
                return Ok(());
            }
            changed = health_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = health_rx.borrow_and_update().clone();
                if let HealthState::Stalled { reason } = state {
                    tracing::error!(reason = %reason, "Message delivery stopped");
                    view.notice(&format!("message delivery stopped: {}", reason))?;
                }
            }
        }
    }
}
