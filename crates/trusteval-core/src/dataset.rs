//! Line-delimited JSON loading for questions, predictions and sources.
//!
//! Records are self-describing and accept several field spellings. For each
//! logical field the first alias holding a usable value wins; `null`, empty
//! strings and empty lists fall through to the next alias.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field aliases for the record identifier.
pub const ID_FIELDS: &[&str] = &["id", "qid", "question_id"];

/// Field aliases for the gold answer list.
pub const GOLD_FIELDS: &[&str] = &["answers", "gold"];

/// Field aliases for the predicted answer.
pub const ANSWER_FIELDS: &[&str] = &["answer", "prediction"];

/// Errors that can occur when loading input records.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON at {}:{line}: {source}", .path.display())]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record at {}:{line}: {reason}", .path.display())]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// A question with its acceptable gold answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,

    /// Acceptable answers; order is irrelevant and the list may be empty
    pub answers: Vec<String>,
}

/// A model answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub answer: String,
}

/// Predictions keyed by question id. Later records overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct PredictionIndex {
    by_id: HashMap<String, String>,
}

impl PredictionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prediction: Prediction) {
        self.by_id.insert(prediction.id, prediction.answer);
    }

    /// The predicted answer for a question, or `""` when none was submitted.
    pub fn answer_for(&self, id: &str) -> &str {
        self.by_id.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<Prediction> for PredictionIndex {
    fn from_iter<I: IntoIterator<Item = Prediction>>(iter: I) -> Self {
        let mut index = Self::new();
        for prediction in iter {
            index.insert(prediction);
        }
        index
    }
}

/// Read every non-blank line of a JSONL file as a JSON value.
///
/// The returned values carry their 1-based line number.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<(usize, Value)>, DatasetError> {
    let path = path.as_ref();
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut rows = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value = serde_json::from_str(line).map_err(|source| DatasetError::Json {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        rows.push((index + 1, value));
    }

    tracing::debug!(path = %path.display(), records = rows.len(), "Loaded JSONL");
    Ok(rows)
}

/// Load question records.
pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<Question>, DatasetError> {
    let path = path.as_ref();
    read_jsonl(path)?
        .into_iter()
        .map(|(line, value)| question_from_value(&value).map_err(|reason| invalid(path, line, reason)))
        .collect()
}

/// Load prediction records into an index keyed by question id.
pub fn load_predictions(path: impl AsRef<Path>) -> Result<PredictionIndex, DatasetError> {
    let path = path.as_ref();
    read_jsonl(path)?
        .into_iter()
        .map(|(line, value)| {
            prediction_from_value(&value).map_err(|reason| invalid(path, line, reason))
        })
        .collect()
}

/// Load the sources collection. Sources are validated as JSON but not scored.
pub fn load_sources(path: impl AsRef<Path>) -> Result<Vec<Value>, DatasetError> {
    Ok(read_jsonl(path)?.into_iter().map(|(_, value)| value).collect())
}

/// Build a question from a decoded record.
pub fn question_from_value(value: &Value) -> Result<Question, String> {
    let record = as_object(value)?;
    let id = record_id(record)?;

    let answers = match first_present(record, GOLD_FIELDS) {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(format!("gold answer must be a string, got {}", other)),
            })
            .collect::<Result<_, _>>()?,
        Some(other) => return Err(format!("gold answers must be a list, got {}", other)),
    };

    Ok(Question { id, answers })
}

/// Build a prediction from a decoded record.
pub fn prediction_from_value(value: &Value) -> Result<Prediction, String> {
    let record = as_object(value)?;
    let id = record_id(record)?;

    let answer = match first_present(record, ANSWER_FIELDS) {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(format!("answer must be a string, got {}", other)),
    };

    Ok(Prediction { id, answer })
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| "record must be a JSON object".to_string())
}

fn record_id(record: &Map<String, Value>) -> Result<String, String> {
    match first_present(record, ID_FIELDS) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(format!("identifier must be a string or number, got {}", other)),
        None => Err(format!("missing identifier (expected one of {})", ID_FIELDS.join(", "))),
    }
}

/// The first alias whose value is present and non-empty.
fn first_present<'a>(record: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|field| record.get(*field))
        .find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn invalid(path: &Path, line: usize, reason: String) -> DatasetError {
    DatasetError::InvalidRecord {
        path: path.to_path_buf(),
        line,
        reason,
    }
}
