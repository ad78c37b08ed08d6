/*!
 * Error handling for registry gap analysis
 *
 * Every stage of the pipeline reports structural problems eagerly through
 * `GapError`. None of these conditions are transient: they call for a
 * different file or a different sheet selection, so nothing is retried.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

use crate::data_types::{Origin, Role};

/// Gap analysis result type
pub type Result<T> = std::result::Result<T, GapError>;

/// Error taxonomy for loading, locating, flattening and exporting
#[derive(Error, Debug)]
pub enum GapError {
    /// Source file unreadable or not a valid spreadsheet
    #[error("Cannot read '{}': {message}", path.display())]
    FileRead {
        path: PathBuf,
        message: String,
    },

    /// Workbook contains no worksheets at all
    #[error("Workbook '{}' contains no worksheets", path.display())]
    EmptyWorkbook {
        path: PathBuf,
    },

    /// Automatic sheet indexing needs at least two sheets
    #[error("Workbook has {found} sheet(s); at least {required} are needed (refusals and active registry)")]
    InsufficientSheets {
        found: usize,
        required: usize,
    },

    /// Explicitly selected sheet does not exist
    #[error("Sheet '{name}' not found")]
    SheetNotFound {
        name: String,
        available: Vec<String>,
    },

    /// No header row within the scan window
    #[error("No header row found in the first {scanned_rows} rows of the {origin} table (looked for {keywords:?})")]
    HeaderNotFound {
        origin: Origin,
        scanned_rows: usize,
        keywords: Vec<String>,
    },

    /// Header found, but required roles did not resolve
    #[error("Required columns {missing:?} not found in the {origin} table; columns found: {found_columns:?}")]
    ColumnsUnresolved {
        origin: Origin,
        missing: Vec<Role>,
        found_columns: Vec<String>,
    },

    /// A resolved table produced no drug records
    #[error("{}", empty_table_message(*origin))]
    EmptyFlattenedTable {
        origin: Origin,
    },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
    },
}

/// Serialized row format for result downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "CSV"),
            ExportFormat::Json => write!(f, "JSON"),
        }
    }
}

fn empty_table_message(origin: Origin) -> &'static str {
    match origin {
        Origin::Refusal => "No data found in the refusal table (check the selected refusal sheet or file)",
        Origin::ActiveRegistry => "No data found in the active registry table (check the selected active registry sheet or file)",
    }
}

impl GapError {
    /// Wrap any reader failure as a `FileRead` for the given path
    pub fn file_read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::FileRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Suggested corrective action, if one applies
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::FileRead { .. } => Some(
                "Make sure the file is an .xlsx, .xls, .ods or .csv file and is not open in another program".to_string()
            ),
            Self::EmptyWorkbook { .. } => Some("Upload a workbook with at least two sheets".to_string()),
            Self::InsufficientSheets { .. } => Some(
                "Put refusals on the first sheet and the active registry on the third (or second) sheet, \
                or select both sheets by name".to_string()
            ),
            Self::SheetNotFound { available, .. } => Some(format!("Available sheets: {}", available.join(", "))),
            Self::HeaderNotFound { .. } => Some(
                "Check that the header row names the drug list and manufacturer columns".to_string()
            ),
            Self::ColumnsUnresolved { found_columns, .. } => Some(format!(
                "Rename the matching columns; discovered columns are: {}",
                found_columns.join(", ")
            )),
            Self::EmptyFlattenedTable { .. } => Some(
                "Every row was filtered out; check that manufacturer and drug cells are filled".to_string()
            ),
            Self::Configuration { suggestion, .. } => suggestion.clone(),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nSuggestion: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for GapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<csv::Error> for GapError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);
        Self::CsvParse {
            message: err.to_string(),
            line,
        }
    }
}

impl From<serde_json::Error> for GapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
        }
    }
}
