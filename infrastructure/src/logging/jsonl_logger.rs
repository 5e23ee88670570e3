//! JSONL file writer for activity events.
//!
//! Each [`ActivityEvent`] is serialized as a single JSON line with a `type`
//! field and the event's `timestamp`, appended through a buffered writer.

use blockhand_application::ports::activity_logger::{ActivityEvent, ActivityLogger};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Activity logger that writes one JSON object per line.
///
/// Several agents may share one logger; lines never interleave.
pub struct JsonlActivityLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlActivityLogger {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create activity log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open activity log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_record(event: ActivityEvent) -> Value {
    let timestamp = event
        .at
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    match event.payload {
        Value::Object(mut map) => {
            map.insert("type".to_string(), Value::String(event.event_type.to_string()));
            map.insert("timestamp".to_string(), Value::String(timestamp));
            Value::Object(map)
        }
        other => serde_json::json!({
            "type": event.event_type,
            "timestamp": timestamp,
            "data": other,
        }),
    }
}

impl ActivityLogger for JsonlActivityLogger {
    fn log(&self, event: ActivityEvent) {
        let Ok(line) = serde_json::to_string(&to_record(event)) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }
}

impl Drop for JsonlActivityLogger {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}
