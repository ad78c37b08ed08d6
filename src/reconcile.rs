/*!
 * Two-stage fuzzy join of refusal records against the active registry
 *
 * For each refused drug:
 *
 * 1. keep active records whose normalized manufacturer contains the first
 *    `manufacturer_prefix_len` characters of the refusal's manufacturer;
 * 2. among those, keep records whose normalized drug name contains the
 *    first `drug_prefix_len` characters of the refused drug;
 * 3. the first survivor in registry order decides the classification.
 *
 * There is no scoring: first match wins. Each refusal record is classified
 * independently, so the work parallelizes without changing the output.
 */

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::constants::*;
use crate::data_types::*;
use crate::text::prefix;

pub const DETAIL_NOT_FOUND: &str = "Not found in active list";
pub const DETAIL_DATE_OK: &str = "Date OK";

/// Classifies refusal records against active registry records
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    manufacturer_prefix_len: usize,
    drug_prefix_len: usize,
    parallel: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self {
            manufacturer_prefix_len: MANUFACTURER_PREFIX_LEN,
            drug_prefix_len: DRUG_PREFIX_LEN,
            parallel: true,
            #[cfg(feature = "progress")]
            show_progress: false,
        }
    }

    /// Manufacturer prefix length (10 in the primary workflow, 15 in the alternate one)
    pub fn with_manufacturer_prefix_len(mut self, len: usize) -> Self {
        self.manufacturer_prefix_len = len;
        self
    }

    pub fn with_drug_prefix_len(mut self, len: usize) -> Self {
        self.drug_prefix_len = len;
        self
    }

    /// Enable or disable parallel classification (needs the `parallel` feature)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable or disable the progress bar
    #[cfg(feature = "progress")]
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Classify every refusal record; output order follows `refusals`.
    pub fn reconcile(&self, refusals: &[DrugRecord], active: &[DrugRecord]) -> Vec<ReconciliationResult> {
        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(refusals.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} refused drugs")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let classify = |record: &DrugRecord| {
            let result = self.classify(record, active);
            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
            result
        };

        #[cfg(feature = "parallel")]
        let results: Vec<ReconciliationResult> = if self.parallel {
            use rayon::prelude::*;
            refusals.par_iter().map(classify).collect()
        } else {
            refusals.iter().map(classify).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<ReconciliationResult> = refusals.iter().map(classify).collect();

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message("Reconciliation complete");
        }

        let registered = results
            .iter()
            .filter(|r| r.classification == Classification::Registered)
            .count();
        info!(
            refusals = refusals.len(),
            active = active.len(),
            registered,
            gaps = results.len() - registered,
            "reconciliation finished"
        );

        results
    }

    /// Classify a single refusal record
    pub fn classify(&self, refusal: &DrugRecord, active: &[DrugRecord]) -> ReconciliationResult {
        let manufacturer_key = prefix(&refusal.manufacturer_normalized, self.manufacturer_prefix_len);
        let drug_key = prefix(&refusal.drug_normalized, self.drug_prefix_len);

        let best = active
            .iter()
            .filter(|candidate| candidate.manufacturer_normalized.contains(manufacturer_key))
            .find(|candidate| candidate.drug_normalized.contains(drug_key));

        let Some(best) = best else {
            return ReconciliationResult {
                manufacturer: refusal.manufacturer_original.clone(),
                refused_drug: refusal.drug_original.clone(),
                classification: Classification::NotRegistered,
                detail: DETAIL_NOT_FOUND.to_string(),
                expiry_date: None,
                matched_drug: None,
            };
        };

        let expiry = best.expiry_date.map(|d| d.format(REPORT_DATE_FORMAT).to_string());
        let (classification, detail) = match best.validity {
            ValidityState::Active => (
                Classification::Registered,
                format!("Active until {}", expiry.as_deref().unwrap_or(DETAIL_DATE_OK)),
            ),
            ValidityState::Expired | ValidityState::Unknown | ValidityState::NoData => (
                Classification::ExpiredFound,
                match expiry {
                    Some(date) => format!("Found but certificate expired ({date})"),
                    None => "Found but certificate expired or unresolved".to_string(),
                },
            ),
        };

        ReconciliationResult {
            manufacturer: refusal.manufacturer_original.clone(),
            refused_drug: refusal.drug_original.clone(),
            classification,
            detail,
            expiry_date: best.expiry_date,
            matched_drug: Some(best.drug_original.clone()),
        }
    }
}
