//! Built-in renderer: JSON record + optional companion file -> text output.
//!
//! Placeholders are `{{path.to.field}}`, resolved by dotted path into the
//! selected record. Arrays render one element per line and missing values
//! render empty. A record that names a companion file (`filename`, or
//! `meta.filename`) also gets `{{companion.name}}`, `{{companion.size}}` and
//! `{{companion.body}}` once that file shows up next to the input.
//!
//! The output is plain text written under the configured output extension.
//! The companion body is the raw file, decoded lossily. Binary formats such
//! as `.docx`, or parsed message bodies and attachment lists, need the
//! `command` processor driving a real converter.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docket_config::TemplateProcessorConfig;
use docket_watch::CompletionOracle;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::JobProcessor;
use crate::error::ProcessError;

/// Human-readable byte count: whole bytes, otherwise two
/// decimals in KB, MB or GB.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

#[derive(Debug, Clone, PartialEq)]
struct Companion {
    name: String,
    size: u64,
    body: String,
}

pub struct TemplateProcessor {
    config: TemplateProcessorConfig,
    oracle: CompletionOracle,
}

impl TemplateProcessor {
    pub fn new(config: TemplateProcessorConfig, oracle: CompletionOracle) -> Self {
        Self { config, oracle }
    }

    /// Wait for the companion, then read it. `None` means render without it.
    async fn load_companion(&self, input: &Path, name: &str) -> Option<Companion> {
        // Companions live next to the input; ignore any directories in the name
        let file_name = Path::new(name).file_name()?;
        let path = input
            .parent()
            .map(|dir| dir.join(file_name))
            .unwrap_or_else(|| PathBuf::from(file_name));

        if !self.wait_for(&path).await {
            warn!(
                path = %path.display(),
                waited_secs = self.config.companion_timeout_secs,
                "Companion not found, rendering without it"
            );
            return None;
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(Companion {
                name: file_name.to_string_lossy().into_owned(),
                size: bytes.len() as u64,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read companion, rendering without it");
                None
            }
        }
    }

    /// Poll for `path` until it exists or the companion timeout passes.
    async fn wait_for(&self, path: &Path) -> bool {
        let deadline = Instant::now() + self.config.companion_timeout();
        let mut announced = false;
        loop {
            if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file()) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if !announced {
                info!(path = %path.display(), "Waiting for companion");
                announced = true;
            }
            tokio::time::sleep(self.config.companion_poll().min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl JobProcessor for TemplateProcessor {
    fn name(&self) -> &str {
        "template"
    }

    async fn process(&self, input: &Path) -> Result<(), ProcessError> {
        info!(path = %input.display(), "Processing");

        let bytes = tokio::fs::read(input)
            .await
            .map_err(|source| ProcessError::Read {
                path: input.to_path_buf(),
                source,
            })?;
        let document: Value =
            serde_json::from_slice(&bytes).map_err(|e| ProcessError::InvalidInput {
                path: input.to_path_buf(),
                message: format!("not valid JSON: {e}"),
            })?;
        let record =
            document
                .pointer(&self.config.record_pointer)
                .ok_or_else(|| ProcessError::InvalidInput {
                    path: input.to_path_buf(),
                    message: format!("no record at {}", self.config.record_pointer),
                })?;

        let companion = match companion_name(record) {
            Some(name) => self.load_companion(input, &name).await,
            None => None,
        };

        let template = tokio::fs::read_to_string(&self.config.template)
            .await
            .map_err(|source| ProcessError::Template {
                path: self.config.template.clone(),
                source,
            })?;
        let rendered = render(&template, record, companion.as_ref());

        let output = self.oracle.output_path_for(input);
        let target = output.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, rendered.as_bytes()))
            .await
            .map_err(|e| ProcessError::Panicked(e.to_string()))??;

        info!(path = %output.display(), "Saved");
        Ok(())
    }
}

/// `filename`, falling back to `meta.filename`; first element of a list.
fn companion_name(record: &Value) -> Option<String> {
    fn named(value: Option<&Value>) -> Option<String> {
        let name = match value? {
            Value::String(s) => s.as_str(),
            Value::Array(items) => items.first()?.as_str()?,
            _ => return None,
        };
        (!name.is_empty()).then(|| name.to_string())
    }
    named(record.get("filename")).or_else(|| named(record.pointer("/meta/filename")))
}

fn render(template: &str, record: &Value, companion: Option<&Companion>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&resolve(after[..end].trim(), record, companion));
                rest = &after[end + 2..];
            }
            None => {
                // unterminated: keep as literal text
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(key: &str, record: &Value, companion: Option<&Companion>) -> String {
    if let Some(field) = key.strip_prefix("companion.") {
        return match (companion, field) {
            (Some(c), "name") => c.name.clone(),
            (Some(c), "size") => human_size(c.size),
            (Some(c), "body") => c.body.clone(),
            _ => String::new(),
        };
    }

    let mut current = record;
    for part in key.split('.') {
        let next = match current {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return String::new(),
        }
    }
    display(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

/// Write `content` to a temp file beside `output`, then rename it into
/// place. The temp file is removed on any failure.
fn write_atomically(output: &Path, content: &[u8]) -> Result<(), ProcessError> {
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let write_error = |source: std::io::Error| ProcessError::Write {
        path: output.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".docket-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;
    tmp.write_all(content).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(output).map_err(|e| write_error(e.error))?;
    Ok(())
}
