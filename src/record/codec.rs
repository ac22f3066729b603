//! Serialized-record codec.
//!
//! A serialized record is a flat token stream of alternating column and value
//! markers: `COL title VAL iphone 13 COL price VAL 699`. A record pair line
//! holds two records and a match label separated by tabs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Marker that opens a column name.
pub const COL_MARKER: &str = "COL";
/// Marker that opens a column value.
pub const VAL_MARKER: &str = "VAL";

// Markers only count as standalone words, so values like "COLOR" or "VALVE"
// are left alone.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:COL|VAL)\b").expect("marker pattern should compile"));

/// Errors from parsing serialized records and pair lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected a multiple of 4 marker-delimited segments, found {0}")]
    SegmentCount(usize),

    #[error("marker {index} is {found}, expected {expected}")]
    MarkerOrder {
        index: usize,
        found: String,
        expected: &'static str,
    },

    #[error("expected 3 tab-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid match label {0:?}")]
    Label(String),
}

/// One `(column, value)` pair of a serialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A parsed serialized record, fields in original column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedRecord {
    fields: Vec<Field>,
}

impl SerializedRecord {
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Tokenize a record on its `COL`/`VAL` markers.
    ///
    /// Text before the first marker is ignored. Names and values are trimmed.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let markers: Vec<regex::Match<'_>> = MARKER.find_iter(text).collect();

        let segments = markers.len() * 2;
        if segments % 4 != 0 {
            return Err(RecordError::SegmentCount(segments));
        }

        for (index, marker) in markers.iter().enumerate() {
            let expected = if index % 2 == 0 {
                COL_MARKER
            } else {
                VAL_MARKER
            };
            if marker.as_str() != expected {
                return Err(RecordError::MarkerOrder {
                    index,
                    found: marker.as_str().to_string(),
                    expected,
                });
            }
        }

        let fields = markers
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let (col, val) = (pair[0], pair[1]);
                let value_end = markers
                    .get(i * 2 + 2)
                    .map(|next| next.start())
                    .unwrap_or(text.len());
                Field::new(
                    text[col.end()..val.start()].trim(),
                    text[val.end()..value_end].trim(),
                )
            })
            .collect();

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Value of the first field with the given column name.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == column)
            .map(|f| f.value.as_str())
    }

    /// Re-serialize as `COL <name> VAL <value>` segments joined by single spaces.
    pub fn emit(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{} {} {} {}", COL_MARKER, f.name, VAL_MARKER, f.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for SerializedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.emit())
    }
}

/// Borrowed view of a record pair line split on tabs.
///
/// `label` is passed through verbatim, including any trailing newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairLine<'a> {
    pub left: &'a str,
    pub right: &'a str,
    pub label: &'a str,
}

impl<'a> PairLine<'a> {
    /// Split a line into exactly three tab-separated fields.
    pub fn split(line: &'a str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            [left, right, label] => Ok(Self {
                left: *left,
                right: *right,
                label: *label,
            }),
            _ => Err(RecordError::FieldCount(fields.len())),
        }
    }
}

/// A fully parsed record pair with its numeric match label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPair {
    pub left: SerializedRecord,
    pub right: SerializedRecord,
    pub label: i64,
}

impl SerializedPair {
    /// Strict parse used where a malformed line must abort the run.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let parts = PairLine::split(line)?;
        let label_text = parts.label.trim();
        let label = label_text
            .parse::<i64>()
            .map_err(|_| RecordError::Label(label_text.to_string()))?;

        Ok(Self {
            left: SerializedRecord::parse(parts.left)?,
            right: SerializedRecord::parse(parts.right)?,
            label,
        })
    }

    /// Canonical line form, newline-terminated.
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}\n", self.left, self.right, self.label)
    }
}
