//! Supervised execution of the benchmark process.
//!
//! Spawns one benchmark instance with piped output, drains stdout and
//! stderr into line channels, and signals the terminal exit status.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Exit value reported when the process did not exit with a real code
/// (terminated by a signal, or could not be reaped).
pub const EXIT_ABNORMAL: i32 = -1;

/// Live handles for one benchmark process execution.
///
/// The line channels close when their stream does; the exit signal fires
/// exactly once, after the process has fully exited.
pub struct RunningBench {
    pub stdout: mpsc::Receiver<String>,
    pub stderr: mpsc::Receiver<String>,
    pub exit: oneshot::Receiver<i32>,
}

/// Start the benchmark binary with the given arguments.
///
/// Failure to spawn the process or open its pipes is configuration-class
/// and bubbles up as a fatal error.
pub fn spawn_bench(binary: &Path, args: &[String]) -> Result<RunningBench> {
    info!("Starting {} {}", binary.display(), args.join(" "));

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("could not start {}", binary.display()))?;

    let stdout = child.stdout.take().context("stdout pipe was not opened")?;
    let stderr = child.stderr.take().context("stderr pipe was not opened")?;

    let (stdout_tx, stdout_rx) = mpsc::channel(1);
    let (stderr_tx, stderr_rx) = mpsc::channel(1);
    let (exit_tx, exit_rx) = oneshot::channel();

    tokio::spawn(drain_lines(stdout, stdout_tx));
    tokio::spawn(drain_lines(stderr, stderr_tx));
    tokio::spawn(async move {
        let code = match child.wait().await {
            Ok(status) => match status.code() {
                Some(0) => {
                    info!("Process exited cleanly");
                    0
                }
                Some(code) => {
                    error!("Process exited with code {}", code);
                    code
                }
                None => {
                    error!("Process terminated by signal");
                    EXIT_ABNORMAL
                }
            },
            Err(err) => {
                error!("Failed to reap process: {}", err);
                EXIT_ABNORMAL
            }
        };
        let _ = exit_tx.send(code);
    });

    Ok(RunningBench {
        stdout: stdout_rx,
        stderr: stderr_rx,
        exit: exit_rx,
    })
}

/// Forward lines from an output stream until it closes or the receiver
/// loses interest.
async fn drain_lines<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!("Output stream closed: {}", err);
                break;
            }
        }
    }
}
