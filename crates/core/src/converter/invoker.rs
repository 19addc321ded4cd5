//! Runs the external conversion engine as a subprocess.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace, warn};

use super::error::ConverterError;
use super::types::ConversionProgress;
use crate::metrics::{ActiveEngineGuard, ENGINE_TIMEOUTS};

/// Where engine output lines go while the process runs.
pub struct EngineOutput<'a> {
    /// Job the lines belong to.
    pub job_id: &'a str,
    /// Combined stdout and stderr, in arrival order.
    pub log: &'a mut Vec<String>,
    /// Best-effort progress updates.
    pub progress_tx: Option<&'a mpsc::Sender<ConversionProgress>>,
}

/// Spawns the engine and waits for it, one process per call.
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    engine_path: PathBuf,
    progress_regex: Option<Regex>,
}

impl EngineInvoker {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            // Engine progress lines look like "34% Running transforms on ebook"
            progress_regex: Regex::new(r"^\s*(\d{1,3})%\s+(.*)$").ok(),
        }
    }

    pub fn engine_path(&self) -> &Path {
        &self.engine_path
    }

    /// Runs the engine inside `workdir` and returns once it exits.
    ///
    /// On timeout the process is killed and [`ConverterError::Timeout`] is
    /// returned. A non-zero exit yields [`ConverterError::EngineFailed`] carrying
    /// the captured stderr. Output captured before either failure stays in the log.
    pub async fn run(
        &self,
        args: &[String],
        workdir: &Path,
        limit: Duration,
        output: EngineOutput<'_>,
    ) -> Result<ExitStatus, ConverterError> {
        debug!(
            job_id = output.job_id,
            engine = %self.engine_path.display(),
            "Spawning engine with {} arguments",
            args.len()
        );

        let mut command = Command::new(&self.engine_path);
        command
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so workers forked by the engine can be signalled with it.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::EngineNotFound {
                    path: self.engine_path.clone(),
                }
            } else {
                ConverterError::Io(e)
            }
        })?;
        // Declared after `child` so the group is signalled before the leader is dropped.
        let mut group = EngineGroup::new(&child);
        let _active = ActiveEngineGuard::new();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("engine stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("engine stderr was not captured"))?;
        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');

        let EngineOutput {
            job_id,
            log,
            progress_tx,
        } = output;
        let mut stderr_lines: Vec<String> = Vec::new();

        let result = timeout(limit, async {
            let mut stdout_open = true;
            let mut stderr_open = true;

            while stdout_open || stderr_open {
                tokio::select! {
                    line = next_line(&mut stdout), if stdout_open => match line? {
                        Some(line) => self.capture(job_id, line, log, progress_tx),
                        None => stdout_open = false,
                    },
                    line = next_line(&mut stderr), if stderr_open => match line? {
                        Some(line) => {
                            stderr_lines.push(line.clone());
                            self.capture(job_id, line, log, progress_tx);
                        }
                        None => stderr_open = false,
                    },
                }
            }

            child.wait().await
        })
        .await;

        if let Ok(Ok(_)) = &result {
            // The leader has been reaped; its group id may be reused from here on.
            group.disarm();
        }

        match result {
            Ok(Ok(status)) if status.success() => Ok(status),
            Ok(Ok(status)) => {
                warn!(job_id = %job_id, "Engine exited with {}", status);
                Err(ConverterError::EngineFailed {
                    exit_code: status.code(),
                    stderr: if stderr_lines.is_empty() {
                        None
                    } else {
                        Some(stderr_lines.join("\n"))
                    },
                })
            }
            Ok(Err(e)) => Err(ConverterError::Io(e)),
            Err(_) => {
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(job_id = %job_id, "Failed to kill timed out engine: {}", e);
                }
                ENGINE_TIMEOUTS.inc();
                Err(ConverterError::Timeout {
                    timeout_secs: limit.as_secs(),
                })
            }
        }
    }

    fn capture(
        &self,
        job_id: &str,
        line: String,
        log: &mut Vec<String>,
        progress_tx: Option<&mpsc::Sender<ConversionProgress>>,
    ) {
        trace!(job_id = %job_id, "engine: {}", line);

        if let (Some(tx), Some(progress)) = (progress_tx, self.parse_progress(job_id, &line)) {
            // Non-blocking send
            let _ = tx.try_send(progress);
        }

        log.push(line);
    }

    /// Parses an engine progress line.
    pub fn parse_progress(&self, job_id: &str, line: &str) -> Option<ConversionProgress> {
        let caps = self.progress_regex.as_ref()?.captures(line)?;
        let percent = caps.get(1)?.as_str().parse::<f32>().ok()?;
        Some(ConversionProgress {
            job_id: job_id.to_string(),
            percent: percent.min(100.0),
            message: caps.get(2).map(|m| m.as_str().trim().to_string())?,
        })
    }
}

/// The engine's process group, killed on timeout and when a job is dropped mid-run.
struct EngineGroup {
    pgid: Option<i32>,
}

impl EngineGroup {
    fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            if let Err(e) = kill_group(pgid) {
                warn!("Failed to kill engine process group {}: {}", pgid, e);
            }
        }
    }
}

impl Drop for EngineGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) -> std::io::Result<()> {
    // SAFETY: killpg only sends a signal. The group leader is not yet reaped,
    // so `pgid` still names the engine's group.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) -> std::io::Result<()> {
    Ok(())
}

/// Reads one line, tolerating invalid UTF-8 and CRLF endings.
async fn next_line<R>(reader: &mut Split<BufReader<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    Ok(reader.next_segment().await?.map(|bytes| {
        let line = String::from_utf8_lossy(&bytes);
        line.trim_end_matches('\r').to_string()
    }))
}
