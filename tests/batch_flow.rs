use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telecloner::core::engine::Engine;
use telecloner::core::events::EngineEvent;
use telecloner::core::extract::extract_batch;
use telecloner::core::model::{Classification, JobBatch, SpanKind, TextSpan};
use telecloner::core::notify::{MessageRef, StatusSink};
use telecloner::core::runner::{SyncTool, TransferHandle};
use tokio::sync::{mpsc, oneshot};

struct Script {
    lines: Vec<&'static str>,
    exit_code: i32,
}

/// Stand-in for gclone: replays a scripted line stream per identifier and
/// records every start call.
#[derive(Default)]
struct ScriptedTool {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTool {
    fn with(mut self, identifier: &str, lines: Vec<&'static str>, exit_code: i32) -> Self {
        self.scripts
            .insert(identifier.to_string(), Script { lines, exit_code });
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTool for ScriptedTool {
    async fn start(
        &self,
        identifier: &str,
        destination_path: &str,
    ) -> anyhow::Result<TransferHandle> {
        self.calls
            .lock()
            .unwrap()
            .push((identifier.to_string(), destination_path.to_string()));

        let script = self
            .scripts
            .get(identifier)
            .unwrap_or_else(|| panic!("no script for {identifier}"));

        let (tx, rx) = mpsc::channel(64);
        for line in &script.lines {
            tx.send(line.to_string()).await.unwrap();
        }
        let (exit_tx, exit_rx) = oneshot::channel();
        exit_tx.send(script.exit_code).unwrap();

        Ok(TransferHandle {
            lines: rx,
            exit: exit_rx,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    sends: Mutex<Vec<String>>,
    edits: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    fn last_edit(&self) -> String {
        self.edits.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn send(&self, text: &str) -> anyhow::Result<MessageRef> {
        self.sends.lock().unwrap().push(text.to_string());
        Ok(MessageRef {
            chat_id: 1,
            message_id: 100,
        })
    }

    async fn edit(&self, _message: &MessageRef, text: &str) -> anyhow::Result<()> {
        self.edits.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl StatusSink for FailingSink {
    async fn send(&self, _text: &str) -> anyhow::Result<MessageRef> {
        anyhow::bail!("chat unreachable")
    }

    async fn edit(&self, _message: &MessageRef, _text: &str) -> anyhow::Result<()> {
        anyhow::bail!("chat unreachable")
    }
}

fn engine(tool: Arc<ScriptedTool>, sink: Arc<dyn StatusSink>) -> Engine {
    // A zero interval keeps the throttle out of the way of these tests.
    Engine::new(tool, sink, "My Drive".to_string(), Duration::ZERO, None)
}

fn url_span(offset: usize, length: usize) -> TextSpan {
    TextSpan {
        offset,
        length,
        kind: SpanKind::Url,
        url: None,
    }
}

fn finalizations(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<(String, Classification)> {
    let mut out = vec![];
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::JobFinalized {
            identifier, result, ..
        } = event
        {
            out.push((identifier, result.classification));
        }
    }
    out
}

#[tokio::test]
async fn message_batch_runs_every_job_sequentially() {
    let text = "Archive\nhttps://drive.google.com/drive/folders/ABC123 https://drive.google.com/open?id=XYZ789";
    let batch = extract_batch(text, &[url_span(8, 45), url_span(54, 39)]);
    assert_eq!(batch.title, "Archive");
    assert!(batch.is_multi());

    let tool = Arc::new(
        ScriptedTool::default()
            .with(
                "ABC123",
                vec![
                    "Checks:               0 / 10",
                    "Transferred:            5 / 10, 50%",
                    "Transferred:   1.2 GBytes / 2.4 GBytes, 50%, 12.3 MBytes/s, ETA 1m30s",
                    "Transferred:           10 / 10, 100%",
                ],
                0,
            )
            .with("XYZ789", vec!["Checks:               3 / 3"], 0),
    );
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(tool.clone(), sink.clone());
    let mut events = engine.subscribe();

    let batch_id = engine.dispatch(batch).await.expect("dispatched");
    engine.wait_batch(batch_id).await;

    // One transfer per job, in map order, with the multi-job paths.
    assert_eq!(
        tool.calls(),
        vec![
            ("ABC123".to_string(), "Archive/file000".to_string()),
            ("XYZ789".to_string(), "Archive/file001".to_string()),
        ]
    );

    // Exactly one status message, edited in place.
    assert_eq!(sink.send_count(), 1);

    assert_eq!(
        finalizations(&mut events),
        vec![
            ("ABC123".to_string(), Classification::Success),
            ("XYZ789".to_string(), Classification::AlreadyPresent),
        ]
    );

    let final_text = sink.last_edit();
    assert!(final_text.contains("Saving <b>[Archive]</b> to <b>[My Drive]</b>"));
    assert!(final_text.contains("✅ <b>file000</b>"));
    assert!(final_text.contains("☑️ <b>file001</b>"));
    assert!(final_text.trim_end().ends_with("All transfers finished."));
}

#[tokio::test]
async fn empty_batch_is_not_dispatched() {
    let tool = Arc::new(ScriptedTool::default());
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(tool.clone(), sink.clone());

    assert!(engine.dispatch(JobBatch::new("t".to_string())).await.is_none());
    assert!(tool.calls().is_empty());
    assert_eq!(sink.send_count(), 0);
}

#[tokio::test]
async fn failed_job_does_not_abort_the_rest_of_the_batch() {
    let mut batch = JobBatch::new("Archive".to_string());
    batch.insert("BAD".to_string(), "file000".to_string());
    batch.insert("GOOD".to_string(), "file001".to_string());

    let tool = Arc::new(
        ScriptedTool::default()
            .with("BAD", vec!["Transferred:            8 / 10, 80%"], 2)
            .with("GOOD", vec!["Transferred:            9 / 9, 100%"], 0),
    );
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(tool.clone(), sink.clone());
    let mut events = engine.subscribe();

    let batch_id = engine.dispatch(batch).await.expect("dispatched");
    engine.wait_batch(batch_id).await;

    assert_eq!(tool.calls().len(), 2);
    assert_eq!(
        finalizations(&mut events),
        vec![
            ("BAD".to_string(), Classification::Failure),
            ("GOOD".to_string(), Classification::Success),
        ]
    );

    let final_text = sink.last_edit();
    assert!(final_text.contains("❌ <b>file000</b>"));
    assert!(final_text.contains("✅ <b>file001</b>"));
}

#[tokio::test]
async fn worker_failure_is_surfaced_as_an_event() {
    let mut batch = JobBatch::new("t".to_string());
    batch.insert("A".to_string(), "file000".to_string());

    let tool = Arc::new(ScriptedTool::default().with("A", vec![], 0));
    let engine = engine(tool, Arc::new(FailingSink));
    let mut events = engine.subscribe();

    let batch_id = engine.dispatch(batch).await.expect("dispatched");
    engine.wait_batch(batch_id).await;

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, EngineEvent::WorkerFailed { .. }) {
            saw_failure = true;
        }
    }
    assert!(saw_failure, "worker failure must not be swallowed");
}
