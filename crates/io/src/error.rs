use std::fmt;

use serde::Serialize;

/// Whole-file structural failure. The file yields no records at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedFileError {
    /// Not a workbook calamine can open (wrong type or corrupt container).
    #[error("not a spreadsheet file: {0}")]
    NotASpreadsheet(String),
    #[error("workbook contains no worksheets")]
    NoWorksheet,
    #[error("file contains no rows")]
    EmptyFile,
    /// A configured column is absent from the header row.
    #[error("missing column '{column}' in header row")]
    MissingColumn { column: String },
    #[error("cannot read file contents: {0}")]
    Unreadable(String),
    /// The sheet is longer than the reader accepts; nothing is parsed.
    #[error("sheet has more than {limit} rows")]
    TooManyRows { limit: usize },
    /// Delimited text whose header splits equally well on two delimiters.
    #[error("ambiguous column delimiter: {0}")]
    AmbiguousDelimiter(String),
}

impl MalformedFileError {
    /// True when the container itself was wrong, as opposed to a readable
    /// sheet with the wrong layout.
    pub fn is_wrong_file_type(&self) -> bool {
        matches!(self, Self::NotASpreadsheet(_) | Self::NoWorksheet)
    }
}

/// Why a single data row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RowErrorReason {
    MissingOrderNumber,
    InvalidOrderNumber,
    MissingField { column: String },
    InvalidAmount { column: String },
    InvalidNumber { column: String },
    InvalidDate { column: String },
}

impl fmt::Display for RowErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOrderNumber => write!(f, "order number is missing"),
            Self::InvalidOrderNumber => write!(f, "order number is not an integer"),
            Self::MissingField { column } => write!(f, "'{column}' is required"),
            Self::InvalidAmount { column } => write!(f, "'{column}' is not an amount"),
            Self::InvalidNumber { column } => write!(f, "'{column}' is not a number"),
            Self::InvalidDate { column } => write!(f, "'{column}' is not a date"),
        }
    }
}

/// A rejected data row: sheet row number, reason, and the raw cell values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub reason: RowErrorReason,
    pub values: Vec<String>,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {} [{}]", self.row, self.reason, self.values.join(" | "))
    }
}
