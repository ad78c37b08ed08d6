/*!
 * # gapscan: Registry Gap Analysis Library
 *
 * Reconciles a registry of *refused* drug registrations against a registry
 * of *active* (or expired) licenses, both extracted from spreadsheet
 * uploads, and reports which refused drug/manufacturer pairs still need
 * regulatory action.
 *
 * ## Pipeline
 *
 * 1. **Locate**: find the header row of each raw sheet by keyword and
 *    resolve the manufacturer, drug-list and validity columns.
 * 2. **Flatten**: split multi-drug cells into one record per drug,
 *    normalizing manufacturer names and parsing validity text.
 * 3. **Reconcile**: fuzzy-join every refused drug against the active
 *    registry (manufacturer prefix, then drug-name prefix, first match
 *    wins) and classify it as Registered / ExpiredFound / NotRegistered.
 * 4. **Report**: summary counts, the gap subset, and a per-manufacturer
 *    ranking, exportable as CSV or JSON.
 *
 * ## Quick Start
 *
 * ```no_run
 * use gapscan::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let report = GapAnalysisBuilder::new()
 *     .workbook("registries.xlsx")
 *     .build()?
 *     .run()?;
 *
 * report.summary.print_summary();
 * for (manufacturer, gaps) in report.top_manufacturers(10) {
 *     println!("{manufacturer}: {gaps}");
 * }
 *
 * CsvExporter::new().export_to_path(&report.gap_results(), "gap_analysis_report.csv")?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Working with in-memory tables
 *
 * ```
 * use gapscan::prelude::*;
 * use chrono::NaiveDate;
 *
 * # fn main() -> Result<()> {
 * let refusals = RawTable::from_strings(vec![
 *     vec!["Производитель", "Перечень препаратов"],
 *     vec!["BioVet LLC", "1) VaccineA\n2) VaccineB"],
 * ]);
 * let active = RawTable::from_strings(vec![
 *     vec!["Производитель", "Перечень", "Срок действия"],
 *     vec!["biovet llc international", "VaccineA", "до 01.01.2030"],
 * ]);
 *
 * let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
 * let report = GapAnalysis::from_tables(refusals, active, GapConfig::default())
 *     .with_reference_time(as_of)
 *     .run()?;
 *
 * assert_eq!(report.summary.total, 2);
 * assert_eq!(report.summary.registered, 1);
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * Matching thresholds and keyword vocabulary live in [`config::GapConfig`];
 * see [`constants`] for the defaults.
 */

// Re-export error types from root
pub use error::{GapError, Result, ExportFormat};

// Public modules
pub mod data_types;
pub mod text;
pub mod drugs;
pub mod validity;
pub mod locator;
pub mod registry;
pub mod reconcile;
pub mod report;
pub mod export;
pub mod reader;
pub mod analysis;
pub mod config;
pub mod error;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use gapscan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::drugs::{split_drugs, DrugListParser};
    pub use crate::validity::ValidityParser;
    pub use crate::locator::{RoleKeywords, TableLocator};
    pub use crate::registry::RegistryBuilder;
    pub use crate::reconcile::ReconciliationEngine;
    pub use crate::report::{GapSummary, ReportAssembler};
    pub use crate::export::{CsvExporter, JsonExporter, ResultExporter};
    pub use crate::reader::{SheetSelection, Workbook, WorkbookCache, WorkbookReader};
    pub use crate::analysis::{AnalysisReport, GapAnalysis, GapAnalysisBuilder};
    pub use crate::config::{ConfigBuilder, GapConfig};
    pub use crate::error::{GapError, Result};
    pub use crate::ExportFormat;
}

/// Matching and parsing constants
pub mod constants {
    /// Header keyword for the drug list ("list/nomenclature")
    pub const KEYWORD_DRUG_LIST: &str = "перечень";

    /// Header keyword for the manufacturer column
    pub const KEYWORD_MANUFACTURER: &str = "производител";

    /// Header keyword for the validity/term column
    pub const KEYWORD_VALIDITY: &str = "срок";

    /// Validity text marker meaning "expired"
    pub const KEYWORD_EXPIRED: &str = "истек";

    /// Manufacturer prefix length of the primary workflow
    pub const MANUFACTURER_PREFIX_LEN: usize = 10;

    /// Manufacturer prefix length of the alternate workflow
    pub const ALTERNATE_MANUFACTURER_PREFIX_LEN: usize = 15;

    /// Drug-name prefix length
    pub const DRUG_PREFIX_LEN: usize = 10;

    /// Rows searched for a header
    pub const HEADER_SCAN_ROWS: usize = 20;

    /// Tokens of this many characters or fewer carry no meaning
    pub const MIN_TOKEN_LEN: usize = 2;

    /// Manufacturers shown in the gap ranking
    pub const TOP_MANUFACTURERS: usize = 10;

    /// Date format inside validity cells
    pub const DATE_FORMAT: &str = "%d.%m.%Y";

    /// Date format in result details and exports
    pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_default_keywords_match_constants() {
        let keywords = RoleKeywords::default();
        assert_eq!(keywords.drug_list, crate::constants::KEYWORD_DRUG_LIST);
        assert_eq!(keywords.header_markers(), vec!["перечень", "производител"]);
    }
}
