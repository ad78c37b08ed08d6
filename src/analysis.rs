/*!
 * Unified pipeline API for registry gap analysis
 *
 * Loads the two registries, locates and flattens them, reconciles refusals
 * against the active registry and assembles the report. Every stage fails
 * fast: a table that cannot be located or flattens to nothing aborts the
 * run before reconciliation starts.
 */

use std::path::{Path, PathBuf};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use crate::{GapError, Result};
use crate::config::GapConfig;
use crate::data_types::*;
use crate::locator::TableLocator;
use crate::reader::{SheetSelection, WorkbookReader};
use crate::reconcile::ReconciliationEngine;
use crate::registry::RegistryBuilder;
use crate::report::{GapSummary, ReportAssembler};
use crate::validity::ValidityParser;

/// Builder for loading both registries from files
///
/// # Example
/// ```no_run
/// # use gapscan::analysis::GapAnalysisBuilder;
/// # use gapscan::reader::SheetSelection;
/// let analysis = GapAnalysisBuilder::new()
///     .workbook("data/registries.xlsx")
///     .selection(SheetSelection::Named {
///         refusal: "Отказы".to_string(),
///         active: "Иностранные".to_string(),
///     })
///     .build()?;
/// # Ok::<(), gapscan::GapError>(())
/// ```
#[derive(Debug, Default)]
pub struct GapAnalysisBuilder {
    workbook_path: Option<PathBuf>,
    refusal_path: Option<PathBuf>,
    active_path: Option<PathBuf>,
    selection: SheetSelection,
    config: Option<GapConfig>,
    reference_time: Option<NaiveDateTime>,
}

impl GapAnalysisBuilder {
    /// Create a new analysis builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Read both registries from one workbook
    pub fn workbook<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.workbook_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read refusals from the first sheet of a separate file
    pub fn refusal_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.refusal_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read the active registry from the first sheet of a separate file
    pub fn active_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.active_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// How sheets are chosen inside a single workbook
    pub fn selection(mut self, selection: SheetSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn config(mut self, config: GapConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Evaluate validity dates against this instant instead of now
    pub fn reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    /// Load the selected sheets
    pub fn build(self) -> Result<GapAnalysis> {
        let reader = WorkbookReader::new();
        let config = self.config.unwrap_or_else(crate::config::global_config);

        let (refusal, active) = match (self.workbook_path, self.refusal_path, self.active_path) {
            (_, Some(refusal_path), Some(active_path)) => {
                let refusal = reader.open(&refusal_path)?.first_sheet()?.table.clone();
                let active = reader.open(&active_path)?.first_sheet()?.table.clone();
                (refusal, active)
            }
            (Some(workbook_path), None, active_path) => {
                let workbook = reader.open(&workbook_path)?;
                match active_path {
                    // refusals from the workbook's first sheet, active list from its own file
                    Some(active_path) => {
                        let refusal = workbook.first_sheet()?.table.clone();
                        let active = reader.open(&active_path)?.first_sheet()?.table.clone();
                        (refusal, active)
                    }
                    None => {
                        let (refusal, active) = workbook.select(&self.selection)?;
                        info!(refusal = %refusal.name, active = %active.name, "selected sheets");
                        (refusal.table.clone(), active.table.clone())
                    }
                }
            }
            (Some(workbook_path), Some(refusal_path), None) => {
                let refusal = reader.open(&refusal_path)?.first_sheet()?.table.clone();
                let workbook = reader.open(&workbook_path)?;
                let (_, active) = workbook.select(&self.selection)?;
                (refusal, active.table.clone())
            }
            _ => {
                return Err(GapError::Configuration {
                    message: "No input files specified".to_string(),
                    suggestion: Some(
                        "Use .workbook() for a single workbook, or .refusal_file() and .active_file()".to_string()
                    ),
                })
            }
        };

        let mut analysis = GapAnalysis::from_tables(refusal, active, config);
        if let Some(reference_time) = self.reference_time {
            analysis = analysis.with_reference_time(reference_time);
        }
        Ok(analysis)
    }
}

/// Both raw registries plus everything needed to reconcile them
#[derive(Debug, Clone)]
pub struct GapAnalysis {
    pub refusal: RawTable,
    pub active: RawTable,
    pub config: GapConfig,
    reference_time: Option<NaiveDateTime>,
}

impl GapAnalysis {
    /// Analyse raw grids the caller already holds
    pub fn from_tables(refusal: RawTable, active: RawTable, config: GapConfig) -> Self {
        Self {
            refusal,
            active,
            config,
            reference_time: None,
        }
    }

    /// Evaluate validity dates against `reference_time` instead of now
    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    fn locator(&self) -> TableLocator {
        TableLocator::new(self.config.keywords.clone())
            .with_scan_rows(self.config.header_scan_rows)
    }

    fn registry_builder(&self, reference_time: NaiveDateTime) -> RegistryBuilder {
        let validity = ValidityParser::new(reference_time)
            .with_expired_marker(&self.config.expired_marker);
        RegistryBuilder::new(validity).with_min_token_len(self.config.min_token_len)
    }

    fn engine(&self) -> ReconciliationEngine {
        let engine = ReconciliationEngine::new()
            .with_manufacturer_prefix_len(self.config.manufacturer_prefix_len)
            .with_drug_prefix_len(self.config.drug_prefix_len)
            .with_parallel(self.config.parallel);
        #[cfg(feature = "progress")]
        let engine = engine.with_progress_bar(self.config.enable_progress_bar);
        engine
    }

    /// Flatten one raw registry, rejecting tables that yield no records
    pub fn flatten(&self, raw: &RawTable, origin: Origin, reference_time: NaiveDateTime) -> Result<Vec<DrugRecord>> {
        let resolved = self.locator().locate(raw, origin)?;
        let records = self.registry_builder(reference_time).flatten(&resolved, origin);
        if records.is_empty() {
            return Err(GapError::EmptyFlattenedTable { origin });
        }
        info!(%origin, records = records.len(), "registry flattened");
        Ok(records)
    }

    /// Run the full pipeline
    pub fn run(&self) -> Result<AnalysisReport> {
        let reference_time = self
            .reference_time
            .unwrap_or_else(|| Local::now().naive_local());

        let refusals = self.flatten(&self.refusal, Origin::Refusal, reference_time)?;
        let active = self.flatten(&self.active, Origin::ActiveRegistry, reference_time)?;

        let results = self.engine().reconcile(&refusals, &active);
        let summary = ReportAssembler::new(&results).summary();

        Ok(AnalysisReport {
            results,
            summary,
            reference_time,
        })
    }
}

/// Terminal artifact of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// One result per refused drug, in refusal order
    pub results: Vec<ReconciliationResult>,
    pub summary: GapSummary,
    /// Instant validity dates were compared against
    pub reference_time: NaiveDateTime,
}

impl AnalysisReport {
    /// Gap results (action list) in refusal order
    pub fn gaps(&self) -> Vec<&ReconciliationResult> {
        ReportAssembler::new(&self.results).gaps()
    }

    /// Owned copy of the gap subset, ready for export
    pub fn gap_results(&self) -> Vec<ReconciliationResult> {
        self.gaps().into_iter().cloned().collect()
    }

    /// Manufacturers ranked by gap count
    pub fn top_manufacturers(&self, limit: usize) -> Vec<(String, usize)> {
        ReportAssembler::new(&self.results).top_manufacturers(limit)
    }
}
