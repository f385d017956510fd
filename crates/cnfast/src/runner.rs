//! Child-process execution with live, redacted output streaming.
//!
//! stdout and stderr are drained by two independent tokio tasks, each
//! copying fixed-size chunks to the matching terminal stream. Both tasks are
//! joined before the exit status is returned, so no output is lost relative
//! to termination and no task outlives its child.
//!
//! Redaction works per chunk: a token split across a chunk boundary is not
//! guaranteed to be masked.

use std::borrow::Cow;
use std::fmt;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::Instrument;

use crate::error::RunError;

/// Replacement written in place of every redacted token occurrence.
pub const MASK: &[u8] = b"***";

/// Read size for each stream copy loop.
pub const CHUNK_SIZE: usize = 1024;

/// A fully constructed external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Masks one sensitive byte sequence in streamed output.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    token: Option<Vec<u8>>,
}

impl Redactor {
    /// An empty or absent token disables redaction.
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token
                .filter(|t| !t.is_empty())
                .map(|t| t.as_bytes().to_vec()),
        }
    }

    /// Replace every occurrence of the token in `chunk` with [`MASK`].
    pub fn redact<'a>(&self, chunk: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(token) = self.token.as_deref() else {
            return Cow::Borrowed(chunk);
        };
        if !chunk.windows(token.len()).any(|w| w == token) {
            return Cow::Borrowed(chunk);
        }

        let mut out = Vec::with_capacity(chunk.len());
        let mut i = 0;
        while i < chunk.len() {
            if chunk[i..].starts_with(token) {
                out.extend_from_slice(MASK);
                i += token.len();
            } else {
                out.push(chunk[i]);
                i += 1;
            }
        }
        Cow::Owned(out)
    }
}

/// Copy `reader` to `writer` chunk by chunk, redacting each chunk and
/// flushing after every write.
///
/// A failing writer does not stop the loop: the reader is drained to EOF so
/// the child never blocks on a full pipe. Returns the number of bytes read.
pub async fn copy_redacted<R, W>(
    mut reader: R,
    mut writer: W,
    redactor: &Redactor,
    chunk_size: usize,
    label: &'static str,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    let mut sink_open = true;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;

        if !sink_open {
            continue;
        }
        let chunk = redactor.redact(&buf[..n]);
        let written = match writer.write_all(&chunk).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(stream = label, error = %e, "Terminal write failed, discarding further output");
            sink_open = false;
        }
    }

    Ok(total)
}

/// Spawn a copy task for one child pipe.
fn spawn_copy<R, W>(
    pipe: Option<R>,
    writer: W,
    redactor: Redactor,
    label: &'static str,
) -> Option<tokio::task::JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let pipe = pipe?;
    Some(tokio::spawn(async move {
        if let Err(e) = copy_redacted(pipe, writer, &redactor, CHUNK_SIZE, label).await {
            tracing::warn!(stream = label, error = %e, "Error reading child output");
        }
    }))
}

/// Run `command` with inherited stdin and redacted, live stdout/stderr.
///
/// Returns `Ok(())` only when the child exits successfully.
pub async fn run(command: &CommandSpec, redact: Option<&str>) -> Result<(), RunError> {
    let span = cnfast_tracing::child_process_span!(&command.program);
    let start = Instant::now();

    async {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let redactor = Redactor::new(redact);
        let copiers = [
            spawn_copy(child.stdout.take(), tokio::io::stdout(), redactor.clone(), "stdout"),
            spawn_copy(child.stderr.take(), tokio::io::stderr(), redactor, "stderr"),
        ];

        let status = child.wait().await;

        for copier in copiers.into_iter().flatten() {
            if let Err(e) = copier.await {
                tracing::warn!(error = %e, "Output copy task failed");
            }
        }

        let status = status.map_err(|source| RunError::Wait {
            program: command.program.clone(),
            source,
        })?;

        let span = tracing::Span::current();
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        if let Some(code) = status.code() {
            span.record("exit_code", code);
        }

        if status.success() {
            Ok(())
        } else {
            Err(RunError::Exit {
                program: command.program.clone(),
                status,
            })
        }
    }
    .instrument(span)
    .await
}

/// Something that can execute a command with redacted output.
///
/// The retry controller is generic over this so its state machine can be
/// driven without spawning processes.
pub trait Execute {
    async fn execute(&self, command: &CommandSpec, redact: Option<&str>) -> Result<(), RunError>;
}

/// Executes commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl Execute for ProcessRunner {
    async fn execute(&self, command: &CommandSpec, redact: Option<&str>) -> Result<(), RunError> {
        run(command, redact).await
    }
}
