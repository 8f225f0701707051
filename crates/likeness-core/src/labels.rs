//! Subject names and the accept/reject decision for predictions.
//!
//! The label file holds one `{id},{name}` record per line with no header.

use crate::types::Prediction;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Maximum accepted distance, in LBPH chi-square units.
pub const DEFAULT_THRESHOLD: f64 = 90.0;

/// Name shown for accepted predictions whose id has no label.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("cannot read label file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: duplicate subject id {id}")]
    DuplicateId { line: usize, id: i32 },
}

/// Subject id → display name. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    names: HashMap<i32, String>,
}

impl LabelMap {
    /// Load a label file from disk.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::parse(&text)?;
        tracing::info!(path = %path.display(), subjects = map.len(), "loaded label map");
        Ok(map)
    }

    /// Parse label records. A leading byte-order mark and blank lines are
    /// skipped; the name is everything after the first comma.
    pub fn parse(text: &str) -> Result<Self, LabelError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut names = HashMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let (id, name) = raw.split_once(',').ok_or_else(|| LabelError::Malformed {
                line,
                reason: "missing ',' between id and name".into(),
            })?;
            let id: i32 = id.trim().parse().map_err(|_| LabelError::Malformed {
                line,
                reason: format!("subject id {:?} is not an integer", id.trim()),
            })?;

            if names.insert(id, name.trim().to_string()).is_some() {
                return Err(LabelError::DuplicateId { line, id });
            }
        }

        Ok(Self { names })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(id, name)| (id, name.into())).collect(),
        }
    }

    pub fn get(&self, id: i32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Text drawn next to an accepted face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLabel {
    pub text: String,
}

/// Turn a raw prediction into a display label.
///
/// Returns `None` when `distance >= threshold`: the face is left unlabeled.
/// An accepted id missing from `labels` is shown as [`UNKNOWN_NAME`].
pub fn resolve(
    prediction: &Prediction,
    labels: &LabelMap,
    threshold: f64,
) -> Option<AnnotatedLabel> {
    if prediction.distance.is_nan() || prediction.distance >= threshold {
        return None;
    }

    let name = labels.get(prediction.label).unwrap_or(UNKNOWN_NAME);
    Some(AnnotatedLabel {
        text: format!("{name} - {:.2}", prediction.distance),
    })
}
