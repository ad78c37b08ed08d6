/*!
 * Header row discovery and column role resolution
 *
 * Uploaded sheets carry titles, notes and merged banners above the real
 * header, so the header row is found by keyword rather than assumed to be
 * the first row. All keyword knowledge lives in [`RoleKeywords`]; swapping
 * locale or deployment vocabulary never touches the matching code.
 */

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{GapError, Result};
use crate::constants::*;
use crate::data_types::{Origin, RawTable, ResolvedTable, Role};
use crate::text::{fold, normalize};

/// Keyword table mapping each semantic role to its header token
///
/// Matching is case-insensitive substring containment. Header detection
/// tries the drug-list keyword first, then the manufacturer keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeywords {
    #[serde(default = "default_drug_list")]
    pub drug_list: String,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_validity")]
    pub validity: String,
}

fn default_drug_list() -> String {
    KEYWORD_DRUG_LIST.to_string()
}

fn default_manufacturer() -> String {
    KEYWORD_MANUFACTURER.to_string()
}

fn default_validity() -> String {
    KEYWORD_VALIDITY.to_string()
}

impl Default for RoleKeywords {
    fn default() -> Self {
        Self {
            drug_list: default_drug_list(),
            manufacturer: default_manufacturer(),
            validity: default_validity(),
        }
    }
}

impl RoleKeywords {
    /// `(role, keyword)` pairs, lower-cased, in resolution order
    pub fn pairs(&self) -> Vec<(Role, String)> {
        vec![
            (Role::Manufacturer, fold(&self.manufacturer)),
            (Role::DrugList, fold(&self.drug_list)),
            (Role::ValidityText, fold(&self.validity)),
        ]
    }

    /// Keywords that mark a header row, primary first
    pub fn header_markers(&self) -> Vec<String> {
        vec![fold(&self.drug_list), fold(&self.manufacturer)]
    }
}

/// Finds the header row of a raw grid and resolves column roles
#[derive(Debug, Clone)]
pub struct TableLocator {
    keywords: RoleKeywords,
    scan_rows: usize,
}

impl Default for TableLocator {
    fn default() -> Self {
        Self::new(RoleKeywords::default())
    }
}

impl TableLocator {
    pub fn new(keywords: RoleKeywords) -> Self {
        Self {
            keywords,
            scan_rows: HEADER_SCAN_ROWS,
        }
    }

    /// Limit how many leading rows are searched for the header
    pub fn with_scan_rows(mut self, rows: usize) -> Self {
        self.scan_rows = rows;
        self
    }

    pub fn keywords(&self) -> &RoleKeywords {
        &self.keywords
    }

    /// Locate the header row and resolve the manufacturer, drug-list and
    /// (optional) validity columns.
    ///
    /// `origin` only labels errors and logs.
    pub fn locate(&self, raw: &RawTable, origin: Origin) -> Result<ResolvedTable> {
        let markers = self.keywords.header_markers();

        let header_row = self
            .find_header_row(raw, &markers)
            .ok_or_else(|| GapError::HeaderNotFound {
                origin,
                scanned_rows: self.scan_rows.min(raw.len()),
                keywords: markers.clone(),
            })?;

        let columns: Vec<String> = raw.rows[header_row]
            .iter()
            .map(normalize)
            .collect();

        let mut roles = HashMap::new();
        for (role, keyword) in self.keywords.pairs() {
            if let Some(idx) = resolve_column(&columns, &keyword) {
                roles.insert(role, idx);
            }
        }

        let missing: Vec<Role> = [Role::Manufacturer, Role::DrugList]
            .into_iter()
            .filter(|role| !roles.contains_key(role))
            .collect();
        if !missing.is_empty() {
            return Err(GapError::ColumnsUnresolved {
                origin,
                missing,
                found_columns: columns,
            });
        }

        debug!(
            %origin,
            header_row,
            columns = columns.len(),
            has_validity = roles.contains_key(&Role::ValidityText),
            "resolved table layout"
        );

        Ok(ResolvedTable {
            header_row,
            columns,
            roles,
            rows: raw.rows[header_row + 1..].to_vec(),
        })
    }

    /// First row within the scan window that contains any header marker
    fn find_header_row(&self, raw: &RawTable, markers: &[String]) -> Option<usize> {
        raw.rows
            .iter()
            .take(self.scan_rows)
            .position(|row| {
                let cells: Vec<String> = row.iter().map(|c| fold(&normalize(c))).collect();
                markers
                    .iter()
                    .any(|marker| cells.iter().any(|cell| cell.contains(marker.as_str())))
            })
    }
}

/// First column whose header contains `keyword` (already lower-cased)
fn resolve_column(columns: &[String], keyword: &str) -> Option<usize> {
    columns.iter().position(|header| fold(header).contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refusal_sheet() -> RawTable {
        RawTable::from_strings(vec![
            vec!["Реестр отказов", "", ""],
            vec!["", "", ""],
            vec!["№", "Наименование производителя", "Перечень препаратов"],
            vec!["1", "BioVet LLC", "VaccineA"],
            vec!["2", "Zoetis", "Rabisin"],
        ])
    }

    #[test]
    fn test_header_found_below_title() {
        let table = TableLocator::default().locate(&refusal_sheet(), Origin::Refusal).unwrap();
        assert_eq!(table.header_row, 2);
        assert_eq!(table.column_for(Role::Manufacturer), Some(1));
        assert_eq!(table.column_for(Role::DrugList), Some(2));
        assert_eq!(table.column_for(Role::ValidityText), None);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_manufacturer_keyword_alone_marks_header() {
        let raw = RawTable::from_strings(vec![
            vec!["ПРОИЗВОДИТЕЛЬ", "Препараты"],
            vec!["Zoetis", "Rabisin"],
        ]);
        let err = TableLocator::default().locate(&raw, Origin::Refusal).unwrap_err();
        match err {
            GapError::ColumnsUnresolved { missing, found_columns, .. } => {
                assert_eq!(missing, vec![Role::DrugList]);
                assert_eq!(found_columns, vec!["ПРОИЗВОДИТЕЛЬ", "Препараты"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_first_matching_column_wins() {
        let raw = RawTable::from_strings(vec![
            vec!["Производитель", "Страна производителя", "Перечень", "Срок действия", "Срок ввоза"],
        ]);
        let table = TableLocator::default().locate(&raw, Origin::ActiveRegistry).unwrap();
        assert_eq!(table.column_for(Role::Manufacturer), Some(0));
        assert_eq!(table.column_for(Role::ValidityText), Some(3));
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_header_not_found_within_window() {
        let mut rows = vec![vec!["примечание"]; 20];
        rows.push(vec!["Перечень"]);
        let raw = RawTable::from_strings(rows);
        let err = TableLocator::default().locate(&raw, Origin::Refusal).unwrap_err();
        assert!(matches!(err, GapError::HeaderNotFound { scanned_rows: 20, .. }));

        let table = TableLocator::default().with_scan_rows(21).locate(&raw, Origin::Refusal);
        assert!(matches!(table, Err(GapError::ColumnsUnresolved { .. })));
    }

    #[test]
    fn test_custom_keywords() {
        let keywords = RoleKeywords {
            drug_list: "Products".into(),
            manufacturer: "Maker".into(),
            validity: "Valid".into(),
        };
        let raw = RawTable::from_strings(vec![
            vec!["Maker name", "Product list", "Valid until"],
            vec!["Acme", "Aspirin", "01.01.2030"],
        ]);
        let err = TableLocator::new(keywords.clone()).locate(&raw, Origin::Refusal).unwrap_err();
        assert!(matches!(err, GapError::ColumnsUnresolved { .. }));

        let keywords = RoleKeywords { drug_list: "product".into(), ..keywords };
        let table = TableLocator::new(keywords).locate(&raw, Origin::Refusal).unwrap();
        assert_eq!(table.column_for(Role::DrugList), Some(1));
        assert_eq!(table.column_for(Role::ValidityText), Some(2));
    }
}
