//! Runs an external program once per input.
//!
//! `{output}` names a file inside a hidden staging directory next to the
//! real output. It is renamed onto the output path only after the program
//! exits 0, so a failed or killed run never leaves a completion marker.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use docket_config::CommandProcessorConfig;
use docket_watch::CompletionOracle;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::JobProcessor;
use crate::error::ProcessError;

/// Bytes of stdout/stderr kept for failure messages
const OUTPUT_TAIL: usize = 2048;

pub struct CommandProcessor {
    config: CommandProcessorConfig,
    oracle: CompletionOracle,
}

impl CommandProcessor {
    pub fn new(config: CommandProcessorConfig, oracle: CompletionOracle) -> Self {
        Self { config, oracle }
    }

    /// Arguments with `{input}`, `{output}`, `{stem}` and `{dir}` filled in.
    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = input
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let input = input.display().to_string();
        let output = output.display().to_string();

        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{stem}", &stem)
                    .replace("{dir}", &dir)
            })
            .collect()
    }
}

#[async_trait]
impl JobProcessor for CommandProcessor {
    fn name(&self) -> &str {
        "command"
    }

    async fn process(&self, input: &Path) -> Result<(), ProcessError> {
        let output = self.oracle.output_path_for(input);
        // Removed on drop, taking any partial output of a failed run with it
        let staging = staging_dir(&output)?;
        let staged = staged_path(&staging, &output);

        let args = self.render_args(input, &staged);
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match (&self.config.working_dir, input.parent()) {
            (Some(dir), _) => {
                cmd.current_dir(dir);
            }
            (None, Some(dir)) if !dir.as_os_str().is_empty() => {
                cmd.current_dir(dir);
            }
            _ => {}
        }

        debug!(program = %self.config.program, ?args, "Spawning processor command");
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdout = collect(child.stdout.take());
        let stderr = collect(child.stderr.take());

        let timeout = self.config.timeout();
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ProcessError::Spawn {
                    program: self.config.program.clone(),
                    source,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(program = %self.config.program, error = %e, "Failed to kill timed out command");
                }
                return Err(ProcessError::Timeout(timeout));
            }
        };

        let stdout = stdout.await.unwrap_or_default();
        let stderr = stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(ProcessError::CommandFailed {
                status: status.to_string(),
                stdout: tail(&stdout, OUTPUT_TAIL).to_string(),
                stderr: tail(&stderr, OUTPUT_TAIL).to_string(),
            });
        }

        if !staged.is_file() {
            return Err(ProcessError::MissingOutput(output));
        }
        tokio::fs::rename(&staged, &output)
            .await
            .map_err(|source| ProcessError::Write {
                path: output.clone(),
                source,
            })?;
        debug!(output = %output.display(), "Command output moved into place");
        Ok(())
    }
}

/// Hidden directory beside `output`, on the same filesystem so the final
/// rename is atomic. Its parent is never the target directory name, so
/// sweeps and the event filter skip whatever the program writes there.
fn staging_dir(output: &Path) -> Result<TempDir, ProcessError> {
    let parent = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".docket-")
        .tempdir_in(parent)
        .map_err(|source| ProcessError::Write {
            path: parent.to_path_buf(),
            source,
        })
}

/// Same file name as the real output, so programs that key on the
/// extension behave the same.
fn staged_path(staging: &TempDir, output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    staging.path().join(name)
}

/// Read a child pipe to the end in the background.
fn collect<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Last `max` bytes of `text`, moved forward to a char boundary.
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn staging_leftovers(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(".docket-"))
            })
            .collect()
    }

    fn processor(program: &str, args: &[&str], timeout_secs: u64) -> CommandProcessor {
        CommandProcessor::new(
            CommandProcessorConfig {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                working_dir: None,
                timeout_secs,
            },
            CompletionOracle::new("docx"),
        )
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let p = processor("render", &["--in={input}", "{output}", "{stem}", "{dir}"], 1);
        let args = p.render_args(
            Path::new("/srv/docket/qwerty/a.json"),
            Path::new("/srv/docket/qwerty/a.docx"),
        );
        assert_eq!(
            args,
            vec![
                "--in=/srv/docket/qwerty/a.json",
                "/srv/docket/qwerty/a.docx",
                "a",
                "/srv/docket/qwerty",
            ]
        );
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
        // 'é' is two bytes; cutting inside it moves forward
        assert_eq!(tail("aé", 1), "");
        assert_eq!(tail("aéb", 2), "b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_requires_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();

        let touch = processor("sh", &["-c", "touch \"$0\"", "{output}"], 5);
        touch.process(&input).await.unwrap();
        assert!(dir.path().join("a.docx").exists());
        assert!(staging_leftovers(dir.path()).is_empty());

        let other = dir.path().join("b.json");
        fs::write(&other, "{}").unwrap();
        let noop = processor("true", &[], 5);
        let err = noop.process(&other).await.unwrap_err();
        assert!(matches!(err, ProcessError::MissingOutput(_)));
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();

        let partial = processor("sh", &["-c", "printf partial > \"$0\"; exit 1", "{output}"], 5);
        let err = partial.process(&input).await.unwrap_err();
        assert!(matches!(err, ProcessError::CommandFailed { .. }));

        assert!(!dir.path().join("a.docx").exists());
        assert!(!CompletionOracle::new("docx").is_complete(&input));
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_command_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();

        let partial = processor(
            "sh",
            &["-c", "printf partial > \"$0\"; exec sleep 30", "{output}"],
            1,
        );
        let err = partial.process(&input).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout(_)));

        assert!(!dir.path().join("a.docx").exists());
        assert!(!CompletionOracle::new("docx").is_complete(&input));
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();

        let failing = processor("sh", &["-c", "echo broken template >&2; exit 3"], 5);
        match failing.process(&input).await.unwrap_err() {
            ProcessError::CommandFailed { stderr, .. } => {
                assert!(stderr.contains("broken template"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("a.docx").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_is_killed() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        fs::write(&input, "{}").unwrap();

        let slow = processor("sleep", &["30"], 1);
        let started = std::time::Instant::now();
        let err = slow.process(&input).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.json");
        let p = processor("docket-no-such-program", &[], 5);
        assert!(matches!(
            p.process(&input).await,
            Err(ProcessError::Spawn { .. })
        ));
    }
}
