/*!
 * Data type definitions for registry reconciliation
 *
 * Raw worksheet grids, tables with resolved column roles, flattened
 * single-drug records and the classified reconciliation output.
 */

use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

/// One worksheet cell as loaded, before any normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Spreadsheet date rendered as `DD.MM.YYYY`
    DateLike(String),
}

impl Cell {
    /// Render the cell as text; `None` for empty cells
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) | Cell::DateLike(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// Untyped grid of cells with no guaranteed header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Build a grid from string literals; empty strings become `Cell::Empty`
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|s| Cell::from(s.as_ref())).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row in the grid
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Semantic column roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Manufacturer,
    DrugList,
    ValidityText,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manufacturer => write!(f, "manufacturer"),
            Role::DrugList => write!(f, "drug list"),
            Role::ValidityText => write!(f, "validity"),
        }
    }
}

/// A raw table with its header row located and column roles resolved
///
/// Manufacturer and DrugList always resolve; a table missing either is
/// rejected by the locator and never constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    /// Index of the header row in the source grid
    pub header_row: usize,
    /// Header text of every column, in physical order
    pub columns: Vec<String>,
    /// Role → physical column index
    pub roles: HashMap<Role, usize>,
    /// Rows strictly below the header
    pub rows: Vec<Vec<Cell>>,
}

impl ResolvedTable {
    pub fn column_for(&self, role: Role) -> Option<usize> {
        self.roles.get(&role).copied()
    }

    /// Cell of `row` in the column holding `role`, if that role resolved
    pub fn cell<'a>(&self, row: &'a [Cell], role: Role) -> Option<&'a Cell> {
        self.column_for(role)
            .map(|idx| row.get(idx).unwrap_or(&EMPTY_CELL))
    }
}

/// Tri-state validity signal plus missing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidityState {
    Active,
    Expired,
    Unknown,
    NoData,
}

impl fmt::Display for ValidityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityState::Active => write!(f, "Active"),
            ValidityState::Expired => write!(f, "Expired"),
            ValidityState::Unknown => write!(f, "Unknown"),
            ValidityState::NoData => write!(f, "No data"),
        }
    }
}

/// Parsed validity cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub state: ValidityState,
    pub expiry_date: Option<NaiveDate>,
}

impl Validity {
    pub const NO_DATA: Validity = Validity { state: ValidityState::NoData, expiry_date: None };

    pub fn new(state: ValidityState, expiry_date: Option<NaiveDate>) -> Self {
        Self { state, expiry_date }
    }
}

/// Which registry a record was flattened from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Refusal,
    ActiveRegistry,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Refusal => write!(f, "refusal"),
            Origin::ActiveRegistry => write!(f, "active registry"),
        }
    }
}

/// One drug of one source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub manufacturer_original: String,
    pub manufacturer_normalized: String,
    pub drug_original: String,
    pub drug_normalized: String,
    pub validity: ValidityState,
    pub expiry_date: Option<NaiveDate>,
    pub origin: Origin,
}

/// Reconciliation outcome for one refused drug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Registered,
    ExpiredFound,
    NotRegistered,
}

impl Classification {
    /// Anything short of a valid registration still needs action
    pub fn is_gap(&self) -> bool {
        !matches!(self, Classification::Registered)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Registered => "OK: Registered",
            Classification::ExpiredFound => "WARNING: Expired",
            Classification::NotRegistered => "CRITICAL: Not Registered",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classified result for one refusal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub manufacturer: String,
    pub refused_drug: String,
    pub classification: Classification,
    pub detail: String,
    /// Expiry date of the matched active record, when one was parsed
    pub expiry_date: Option<NaiveDate>,
    /// Drug text of the matched active record
    pub matched_drug: Option<String>,
}
