//! Interactive retry confirmation on the controlling terminal.

use std::io::{BufRead, Write};

use crate::endpoint::Endpoint;
use crate::error::RunError;
use crate::retry::{Decision, RetryDecider};

/// `y`/`yes` in any case are affirmative; everything else, including an
/// empty line, is negative.
pub fn parse_answer(line: &str) -> Decision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Retry,
        _ => Decision::Abort,
    }
}

/// Asks on `output` and reads one line from `input` per failed endpoint.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl LinePrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on stdout, answer on stdin.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, failed: &Endpoint, error: &RunError) -> std::io::Result<Decision> {
        write!(
            self.output,
            "\nEndpoint {} failed: {error}\nTry another endpoint? (only helps with proxy problems) (y/n): ",
            failed.id
        )?;
        self.output.flush()?;

        let mut line = String::new();
        // EOF answers negative.
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Decision::Abort);
        }
        Ok(parse_answer(&line))
    }
}

impl<R: BufRead, W: Write> RetryDecider for LinePrompt<R, W> {
    /// Blocks on the terminal read. On a multi-thread runtime the worker is
    /// handed off first so other tasks keep running.
    fn decide(&mut self, failed: &Endpoint, error: &RunError) -> Decision {
        match tokio::task::block_in_place(|| self.ask(failed, error)) {
            Ok(Decision::Retry) => Decision::Retry,
            Ok(Decision::Abort) => {
                let _ = writeln!(self.output, "Cancelled.");
                Decision::Abort
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read retry answer, aborting");
                Decision::Abort
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::endpoint::endpoint;

    fn failure() -> RunError {
        RunError::Spawn {
            program: "git".to_string(),
            source: std::io::Error::other("boom"),
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Decision::Retry);
        assert_eq!(parse_answer("  YES \r\n"), Decision::Retry);
        assert_eq!(parse_answer("Yes"), Decision::Retry);
        assert_eq!(parse_answer("\n"), Decision::Abort);
        assert_eq!(parse_answer("n"), Decision::Abort);
        assert_eq!(parse_answer("yep"), Decision::Abort);
    }

    #[test]
    fn test_prompt_reads_one_line_per_question() {
        let mut output = Vec::new();
        let mut prompt = LinePrompt::new(Cursor::new("y\nno\n"), &mut output);
        let e = endpoint("p1", "https://a.example", 1);

        assert_eq!(prompt.decide(&e, &failure()), Decision::Retry);
        assert_eq!(prompt.decide(&e, &failure()), Decision::Abort);

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("(y/n)").count(), 2);
        assert!(text.contains("Endpoint p1 failed"));
        assert!(!text.contains("a.example"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prompt_inside_runtime_worker() {
        let handle = tokio::spawn(async {
            let mut output = Vec::new();
            let mut prompt = LinePrompt::new(Cursor::new("yes\n"), &mut output);
            let e = endpoint("p1", "https://a.example", 1);
            prompt.decide(&e, &failure())
        });
        assert_eq!(handle.await.unwrap(), Decision::Retry);
    }

    #[test]
    fn test_closed_input_aborts() {
        let mut prompt = LinePrompt::new(Cursor::new(""), Vec::new());
        let e = endpoint("p1", "https://a.example", 1);
        assert_eq!(prompt.decide(&e, &failure()), Decision::Abort);
    }
}
