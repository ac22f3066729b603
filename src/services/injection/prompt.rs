//! Prompt templates for embedding predicted column types into cells.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::InjectionError;
use crate::record::{COL_MARKER, VAL_MARKER};

/// How a predicted type is written into a serialized cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PromptType {
    /// `COL <head>{column}</head> <tail>{type}</tail> VAL {value}`
    HeadTail,
    /// `COL {column} {type} VAL {value}`
    #[default]
    Spaced,
    /// `COL {column} /{type} VAL {value}`
    Slashed,
}

impl PromptType {
    pub fn from_code(code: i64) -> Result<Self, InjectionError> {
        match code {
            0 => Ok(PromptType::HeadTail),
            1 => Ok(PromptType::Spaced),
            2 => Ok(PromptType::Slashed),
            other => Err(InjectionError::InvalidPromptType(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            PromptType::HeadTail => 0,
            PromptType::Spaced => 1,
            PromptType::Slashed => 2,
        }
    }

    /// Serialize one cell with its column's predicted type.
    pub fn format_cell(&self, column: &str, predicted_type: &str, value: &str) -> String {
        match self {
            PromptType::HeadTail => format!(
                "{COL_MARKER} <head>{column}</head> <tail>{predicted_type}</tail> {VAL_MARKER} {value}"
            ),
            PromptType::Spaced => {
                format!("{COL_MARKER} {column} {predicted_type} {VAL_MARKER} {value}")
            }
            PromptType::Slashed => {
                format!("{COL_MARKER} {column} /{predicted_type} {VAL_MARKER} {value}")
            }
        }
    }
}

impl TryFrom<i64> for PromptType {
    type Error = InjectionError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<PromptType> for i64 {
    fn from(prompt: PromptType) -> Self {
        i64::from(prompt.code())
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
