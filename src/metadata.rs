//! Sidecar JSON metadata for generated images.
//!
//! For an image `X.png` the worker may write `X.json` next to it. The record is
//! free-form; a few keys are promoted to the top of the rendered text and two
//! optional nested maps (`params`, `extra`) are rendered as sorted blocks.

use crate::config::{IMAGE_EXTENSION, METADATA_EXTENSION};
use crate::file_utils::has_extension;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys rendered first, in this order, when present.
const PROMOTED_KEYS: [&str; 4] = ["plot_type", "timestamp", "metric", "png"];

/// Text shown when an image has no usable sidecar.
pub const NO_METADATA_TEXT: &str = "No metadata available for this image.";

/// Parsed sidecar record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SidecarMetadata {
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    extra: Option<Value>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl SidecarMetadata {
    /// Parses a sidecar from JSON text. Anything other than a JSON object is rejected.
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Top-level field other than `params` / `extra`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `params` block, if it is a non-empty object.
    pub fn params(&self) -> Option<&Map<String, Value>> {
        non_empty_object(self.params.as_ref())
    }

    /// The `extra` block, if it is a non-empty object.
    pub fn extra(&self) -> Option<&Map<String, Value>> {
        non_empty_object(self.extra.as_ref())
    }

    /// Renders the record as display text.
    pub fn format(&self) -> String {
        let mut lines: Vec<String> = PROMOTED_KEYS
            .iter()
            .filter_map(|key| {
                self.field(key)
                    .map(|value| format!("{}: {}", key, display_value(value)))
            })
            .collect();

        for (title, block) in [("params", self.params()), ("extra", self.extra())] {
            if let Some(block) = block {
                lines.push(String::new());
                lines.push(format!("{}:", title));
                let mut entries: Vec<(&String, &Value)> = block.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (key, value) in entries {
                    lines.push(format!("  {}: {}", key, display_value(value)));
                }
            }
        }

        lines.join("\n")
    }
}

fn non_empty_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value
        .and_then(Value::as_object)
        .filter(|map| !map.is_empty())
}

/// Strings print without quotes; everything else prints as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Location of the sidecar for an image, or `None` if the path is not an image.
pub fn sidecar_path(image_path: &Path) -> Option<PathBuf> {
    if has_extension(image_path, IMAGE_EXTENSION) {
        Some(image_path.with_extension(METADATA_EXTENSION))
    } else {
        None
    }
}

/// Loads the sidecar for an image. Missing or malformed sidecars yield `None`.
pub fn load_sidecar(image_path: &Path) -> Option<SidecarMetadata> {
    let path = sidecar_path(image_path)?;
    let text = fs::read_to_string(&path).ok()?;
    let metadata = SidecarMetadata::from_json(&text);
    if metadata.is_none() {
        debug!("Ignoring unparseable sidecar {}", path.display());
    }
    metadata
}

/// Display text for an optional sidecar.
pub fn format_metadata(metadata: Option<&SidecarMetadata>) -> String {
    match metadata {
        Some(metadata) => {
            let text = metadata.format();
            if text.is_empty() {
                NO_METADATA_TEXT.to_string()
            } else {
                text
            }
        }
        None => NO_METADATA_TEXT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promoted_keys_come_first_then_sorted_blocks() {
        let metadata = SidecarMetadata::from_json(
            r#"{
                "extra": {"note": "warm start"},
                "params": {"y": 2.5, "x": 1},
                "metric": 0.25,
                "plot_type": "scan",
                "ignored": true
            }"#,
        )
        .unwrap();

        assert_eq!(
            metadata.format(),
            "plot_type: scan\nmetric: 0.25\n\nparams:\n  x: 1\n  y: 2.5\n\nextra:\n  note: warm start"
        );
    }

    #[test]
    fn empty_or_non_object_blocks_are_skipped() {
        let metadata =
            SidecarMetadata::from_json(r#"{"timestamp": "12:00", "params": {}, "extra": [1]}"#)
                .unwrap();

        assert_eq!(metadata.format(), "timestamp: 12:00");
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(SidecarMetadata::from_json("[1, 2]").is_none());
        assert!(SidecarMetadata::from_json("{not json").is_none());
    }

    #[test]
    fn load_sidecar_reads_same_basename() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("b.png");
        fs::write(&image, b"").unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"plot_type":"scan","params":{"x":1}}"#,
        )
        .unwrap();

        let text = format_metadata(load_sidecar(&image).as_ref());

        assert_eq!(text, "plot_type: scan\n\nparams:\n  x: 1");
    }

    #[test]
    fn missing_or_malformed_sidecar_renders_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a.png");
        let broken = dir.path().join("c.png");
        fs::write(dir.path().join("c.json"), "{\"plot_type\": ").unwrap();

        assert!(load_sidecar(&missing).is_none());
        assert!(load_sidecar(&broken).is_none());
        assert_eq!(format_metadata(None), NO_METADATA_TEXT);
    }

    #[test]
    fn non_image_paths_have_no_sidecar() {
        assert_eq!(sidecar_path(Path::new("/w/plots/readme.txt")), None);
        assert_eq!(
            sidecar_path(Path::new("/w/plots/a.png")),
            Some(PathBuf::from("/w/plots/a.json"))
        );
    }
}
