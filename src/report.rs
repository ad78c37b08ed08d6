/*!
 * Aggregation of reconciliation results
 *
 * Summary counts for the headline metrics, the gap subset that forms the
 * action list, and gap counts per manufacturer for charting.
 */

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::data_types::*;

/// Headline counts of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapSummary {
    /// Refusal records processed
    pub total: usize,
    pub registered: usize,
    /// Everything not `Registered`
    pub gaps: usize,
    pub expired_found: usize,
    pub not_registered: usize,
}

impl GapSummary {
    /// Share of refused drugs that are now validly registered, in percent
    pub fn coverage_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.registered as f64 / self.total as f64) * 100.0
        }
    }

    /// Print a formatted summary of the counts
    pub fn print_summary(&self) {
        println!("=== Registry Gap Analysis ===");
        println!("Total analysed: {}", self.total);
        println!("Active registrations: {} ({:.1}%)", self.registered, self.coverage_percent());
        println!("Require registration (gaps): {}", self.gaps);
        if self.gaps > 0 {
            println!("  Expired or unresolved: {}", self.expired_found);
            println!("  Not registered: {}", self.not_registered);
        }
    }
}

/// Builds report views over a result set
pub struct ReportAssembler<'a> {
    results: &'a [ReconciliationResult],
}

impl<'a> ReportAssembler<'a> {
    pub fn new(results: &'a [ReconciliationResult]) -> Self {
        Self { results }
    }

    /// Count results per classification
    pub fn summary(&self) -> GapSummary {
        let mut summary = GapSummary {
            total: self.results.len(),
            ..Default::default()
        };

        for result in self.results {
            match result.classification {
                Classification::Registered => summary.registered += 1,
                Classification::ExpiredFound => summary.expired_found += 1,
                Classification::NotRegistered => summary.not_registered += 1,
            }
        }
        summary.gaps = summary.expired_found + summary.not_registered;
        summary
    }

    /// Gap results in input order
    pub fn gaps(&self) -> Vec<&'a ReconciliationResult> {
        self.results
            .iter()
            .filter(|r| r.classification.is_gap())
            .collect()
    }

    /// Results with a given classification
    pub fn by_classification(&self, classification: Classification) -> Vec<&'a ReconciliationResult> {
        self.results
            .iter()
            .filter(|r| r.classification == classification)
            .collect()
    }

    /// Gap counts per manufacturer, largest first, ties by name
    pub fn top_manufacturers(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for result in self.gaps() {
            *counts.entry(result.manufacturer.as_str()).or_insert(0) += 1;
        }

        let mut ranking: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking.truncate(limit);
        ranking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(manufacturer: &str, drug: &str, classification: Classification) -> ReconciliationResult {
        ReconciliationResult {
            manufacturer: manufacturer.to_string(),
            refused_drug: drug.to_string(),
            classification,
            detail: String::new(),
            expiry_date: None,
            matched_drug: None,
        }
    }

    fn sample() -> Vec<ReconciliationResult> {
        vec![
            result("Zoetis", "Rabisin", Classification::Registered),
            result("Zoetis", "Nobivac", Classification::NotRegistered),
            result("Merial", "Frontline", Classification::ExpiredFound),
            result("Bayer", "Advocate", Classification::NotRegistered),
            result("Merial", "Eurican", Classification::NotRegistered),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let results = sample();
        let summary = ReportAssembler::new(&results).summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.registered, 1);
        assert_eq!(summary.gaps, 4);
        assert_eq!(summary.expired_found, 1);
        assert_eq!(summary.not_registered, 3);
        assert!((summary.coverage_percent() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gaps_keep_order() {
        let results = sample();
        let gaps: Vec<&str> = ReportAssembler::new(&results)
            .gaps()
            .iter()
            .map(|r| r.refused_drug.as_str())
            .collect();
        assert_eq!(gaps, vec!["Nobivac", "Frontline", "Advocate", "Eurican"]);
    }

    #[test]
    fn test_top_manufacturers_ranked() {
        let results = sample();
        let ranking = ReportAssembler::new(&results).top_manufacturers(10);
        assert_eq!(
            ranking,
            vec![
                ("Merial".to_string(), 2),
                ("Bayer".to_string(), 1),
                ("Zoetis".to_string(), 1),
            ]
        );
        assert_eq!(ReportAssembler::new(&results).top_manufacturers(1).len(), 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ReportAssembler::new(&[]).summary();
        assert_eq!(summary, GapSummary::default());
        assert_eq!(summary.coverage_percent(), 0.0);
    }
}
