use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Consecutive failed reads tolerated before a stream is treated as ended.
/// Keeps a transient read error from spinning the pump forever.
const MAX_READ_FAILURES: u32 = 32;

/// Extensions worth copying server-side; everything else is filtered out.
const INCLUDE_GLOB: &str =
    "*.{mkv,mp4,avi,mov,m2ts,ts,iso,wmv,flv,webm,mka,mks,mp3,flac,aac,ass,srt,ssa,sup}";

/// A running transfer: the merged stdout/stderr line stream plus the exit
/// code, delivered once the process finishes.
pub struct TransferHandle {
    pub lines: mpsc::Receiver<String>,
    pub exit: oneshot::Receiver<i32>,
}

/// Seam over the external sync tool so the engine can be driven by a
/// scripted implementation in tests.
#[async_trait]
pub trait SyncTool: Send + Sync {
    async fn start(&self, identifier: &str, destination_path: &str)
        -> anyhow::Result<TransferHandle>;
}

/// Launches gclone copy processes against a fixed remote.
pub struct GcloneTool {
    binary: PathBuf,
    config: Option<PathBuf>,
    remote: String,
    destination_folder: String,
}

impl GcloneTool {
    pub fn new(
        binary: PathBuf,
        config: Option<PathBuf>,
        remote: String,
        destination_folder: String,
    ) -> Self {
        Self {
            binary,
            config,
            remote,
            destination_folder,
        }
    }

    /// gclone addresses folders by id inside literal braces.
    fn source_arg(&self, identifier: &str) -> String {
        format!("{}:{{{}}}", self.remote, identifier)
    }

    fn destination_arg(&self, destination_path: &str) -> String {
        format!(
            "{}:{{{}}}/{}",
            self.remote, self.destination_folder, destination_path
        )
    }

    fn build_args(&self, identifier: &str, destination_path: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "copy",
            "--drive-server-side-across-configs",
            "-v",
            "--transfers",
            "6",
            "--tpslimit",
            "6",
            "--ignore-existing",
            "--stats",
            "5s",
            "--include",
            INCLUDE_GLOB,
        ]
        .into_iter()
        .map(String::from)
        .collect();

        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }

        args.push(self.source_arg(identifier));
        args.push(self.destination_arg(destination_path));
        args
    }
}

#[async_trait]
impl SyncTool for GcloneTool {
    async fn start(
        &self,
        identifier: &str,
        destination_path: &str,
    ) -> anyhow::Result<TransferHandle> {
        let args = self.build_args(identifier, destination_path);
        debug!(binary = %self.binary.display(), ?args, "spawning gclone");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", self.binary.display()))?;

        let stdout = child.stdout.take().context("child stdout not piped")?;
        let stderr = child.stderr.take().context("child stderr not piped")?;

        let (line_tx, line_rx) = mpsc::channel(256);
        tokio::spawn(pump_lines(stdout, line_tx.clone()));
        tokio::spawn(pump_lines(stderr, line_tx));

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(error = %e, "wait on sync process failed");
                    -1
                }
            };
            let _ = exit_tx.send(code);
        });

        Ok(TransferHandle {
            lines: line_rx,
            exit: exit_rx,
        })
    }
}

/// Forward one output stream into the merged line channel. A transient
/// read error retries with a bounded budget; end-of-stream or a closed
/// receiver stops the pump.
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut failures = 0u32;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                failures = 0;
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "transient read failure on sync output");
                if failures >= MAX_READ_FAILURES {
                    break;
                }
            }
        }
    }
}
