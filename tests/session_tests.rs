// ABOUTME: Tests for the interactive session loop against the in-memory account
// ABOUTME: The event pipeline must be shut down however the session ends

use chatline::compose::Composer;
use chatline::session;
use chatline::view::ChatView;
use chatline_account::backends::memory::MemoryAccount;
use chatline_account::AccountService;
use chatline_core::{ConsumerExit, HealthState, Pipeline, PipelineConfig};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Terminal that has gone away
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval_ms: 10,
        ..Default::default()
    }
}

fn account() -> Arc<dyn AccountService> {
    Arc::new(MemoryAccount::new().configured_as("me@example.org"))
}

#[tokio::test]
async fn test_quit_ends_session_and_stops_pipeline() {
    let account = account();
    let out = SharedBuffer::default();
    let view = Arc::new(ChatView::new(Arc::clone(&account), out.clone()));
    let mut composer = Composer::new(Arc::clone(&account), Arc::clone(&view));
    let pipeline = Pipeline::builder(Arc::clone(&account))
        .config(&fast_config())
        .start()
        .unwrap();
    let health = pipeline.health();

    let (tx, mut lines) = mpsc::channel(4);
    tx.send("/quit".to_string()).await.unwrap();
    let report = session::run(
        pipeline,
        &mut composer,
        &*view,
        &mut lines,
        std::future::pending(),
    )
    .await
    .unwrap();

    assert_eq!(report.consumer, ConsumerExit::Cancelled);
    assert_eq!(health.current(), HealthState::Stopped);
    assert!(out.contents().starts_with("-- welcome to chatline"));
}

#[tokio::test]
async fn test_interrupt_ends_session() {
    let account = account();
    let view = Arc::new(ChatView::new(Arc::clone(&account), SharedBuffer::default()));
    let mut composer = Composer::new(Arc::clone(&account), Arc::clone(&view));
    let pipeline = Pipeline::builder(Arc::clone(&account))
        .config(&fast_config())
        .start()
        .unwrap();

    let (_tx, mut lines) = mpsc::channel::<String>(4);
    let report = session::run(pipeline, &mut composer, &*view, &mut lines, async {})
        .await
        .unwrap();
    assert_eq!(report.consumer, ConsumerExit::Cancelled);
}

#[tokio::test]
async fn test_output_failure_still_shuts_pipeline_down() {
    let account = account();
    let view = Arc::new(ChatView::new(Arc::clone(&account), BrokenPipe));
    let mut composer = Composer::new(Arc::clone(&account), Arc::clone(&view));
    let pipeline = Pipeline::builder(Arc::clone(&account))
        .config(&fast_config())
        .start()
        .unwrap();
    let health = pipeline.health();

    let (_tx, mut lines) = mpsc::channel::<String>(4);
    let err = session::run(
        pipeline,
        &mut composer,
        &*view,
        &mut lines,
        std::future::pending(),
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to write to terminal"));
    assert_eq!(health.current(), HealthState::Stopped);
}
