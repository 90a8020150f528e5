// mongovault/src/runner/mod.rs
pub mod diagnostics;

pub use diagnostics::classify;

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::CommandOutcome;
use crate::utils::find_executable;

/// Runs `argv` to completion and returns the merged output with diagnostics.
///
/// Never fails across its boundary: a missing executable or a spawn failure
/// comes back as an unsuccessful outcome with `error` populated.
pub async fn run_command(argv: &[String], log_file: Option<&Path>) -> CommandOutcome {
    run_command_streaming(argv, log_file, None).await
}

/// Same as [`run_command`], additionally forwarding every output line to
/// `observer` as soon as it is read.
///
/// stdout and stderr share one pipe, so lines keep the order the process
/// wrote them in. Diagnostics are computed after the process exits.
pub async fn run_command_streaming(
    argv: &[String],
    log_file: Option<&Path>,
    observer: Option<UnboundedSender<String>>,
) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::failed("No command given");
    };

    let program_path = match find_executable(program) {
        Ok(path) => path,
        Err(e) => {
            warn!(program = %program, "{:#}", e);
            return CommandOutcome::failed(format!("{:#}", e));
        }
    };

    let spawn_failed = |e: io::Error| {
        warn!(program = %program, error = %e, "Failed to start external process");
        CommandOutcome::failed(
            AppError::Command {
                program: program.clone(),
                message: e.to_string(),
            }
            .to_string(),
        )
    };

    let (reader, writer) = match io::pipe() {
        Ok(pair) => pair,
        Err(e) => return spawn_failed(e),
    };
    let stderr_writer = match writer.try_clone() {
        Ok(clone) => clone,
        Err(e) => return spawn_failed(e),
    };

    debug!(program = %program_path.display(), args = args.len(), "Spawning external process");
    let mut command = Command::new(&program_path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer);
    let spawned = command.spawn();
    // Our copies of the write end must close or the reader never sees EOF.
    drop(command);
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return spawn_failed(e),
    };

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let reader_task = tokio::task::spawn_blocking(move || forward_lines(reader, line_tx));

    let mut output = String::new();
    while let Some(line) = line_rx.recv().await {
        output.push_str(&line);
        output.push('\n');
        if let Some(observer) = &observer {
            let _ = observer.send(line);
        }
    }

    if let Err(e) = reader_task.await {
        warn!(error = %e, "Output reader task failed");
    }
    let waited = child.wait().await;

    if let Some(log_path) = log_file {
        match tokio::fs::write(log_path, output.as_bytes()).await {
            Ok(()) => debug!(log_file = %log_path.display(), "Persisted command output"),
            Err(e) => warn!(log_file = %log_path.display(), error = %e, "Failed to write log file"),
        }
    }

    let status = match waited {
        Ok(status) => status,
        Err(e) => {
            warn!(program = %program, error = %e, "Failed to wait for external process");
            let mut outcome = CommandOutcome::failed(format!("Failed to wait for {}: {}", program, e));
            outcome.diagnostics = classify(&output);
            outcome.output = output;
            return outcome;
        }
    };

    let exit_code = status.code();
    info!(program = %program, exit_code = ?exit_code, "External process finished");

    CommandOutcome {
        success: status.success(),
        exit_code,
        diagnostics: classify(&output),
        output,
        error: if status.success() {
            None
        } else {
            Some(format!("{} exited with status {}", program, status))
        },
    }
}

fn forward_lines<R: Read>(reader: R, tx: UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read process output");
                break;
            }
        }
    }
}
