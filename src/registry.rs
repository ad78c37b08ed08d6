/*!
 * Flattening of resolved tables into single-drug records
 *
 * One spreadsheet row may list many drugs; each becomes its own
 * [`DrugRecord`] carrying the row's manufacturer and validity.
 */

use tracing::{debug, trace, warn};

use crate::data_types::*;
use crate::drugs::DrugListParser;
use crate::text::{char_len, fold, normalize};
use crate::validity::ValidityParser;
use crate::constants::MIN_TOKEN_LEN;

/// Expands resolved tables into flat drug record sets
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    drugs: DrugListParser,
    validity: ValidityParser,
    min_token_len: usize,
}

impl RegistryBuilder {
    pub fn new(validity: ValidityParser) -> Self {
        Self {
            drugs: DrugListParser::new(),
            validity,
            min_token_len: MIN_TOKEN_LEN,
        }
    }

    /// Set the minimum meaningful token length for manufacturers and drugs
    pub fn with_min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self.drugs = self.drugs.with_min_token_len(len);
        self
    }

    pub fn validity_parser(&self) -> &ValidityParser {
        &self.validity
    }

    /// Flatten every data row of `table` into drug records.
    ///
    /// Rows with no usable manufacturer or drug list contribute nothing.
    pub fn flatten(&self, table: &ResolvedTable, origin: Origin) -> Vec<DrugRecord> {
        let mut records = Vec::new();
        let mut skipped_rows = 0usize;

        if origin == Origin::ActiveRegistry && table.column_for(Role::ValidityText).is_none() {
            warn!(columns = ?table.columns, "active registry has no validity column; matches cannot count as registered");
        }

        for row in &table.rows {
            let manufacturer = table
                .cell(row, Role::Manufacturer)
                .map(normalize)
                .unwrap_or_default();
            let drug_text = table
                .cell(row, Role::DrugList)
                .map(normalize)
                .filter(|text| !text.is_empty());

            if char_len(&manufacturer) <= self.min_token_len || drug_text.is_none() {
                skipped_rows += 1;
                continue;
            }

            let validity = match table.cell(row, Role::ValidityText) {
                Some(cell) => {
                    let text = normalize(cell);
                    self.validity.parse((!text.is_empty()).then_some(text.as_str()))
                }
                None => Validity::NO_DATA,
            };

            let manufacturer_normalized = fold(&manufacturer);
            for drug in self.drugs.split_drugs(drug_text.as_deref()) {
                trace!(%origin, manufacturer = %manufacturer, drug = %drug, "flattened drug");
                records.push(DrugRecord {
                    manufacturer_original: manufacturer.clone(),
                    manufacturer_normalized: manufacturer_normalized.clone(),
                    drug_normalized: fold(&drug),
                    drug_original: drug,
                    validity: validity.state,
                    expiry_date: validity.expiry_date,
                    origin,
                });
            }
        }

        debug!(
            %origin,
            rows = table.rows.len(),
            skipped_rows,
            records = records.len(),
            "flattened table"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::TableLocator;
    use chrono::NaiveDate;

    fn builder() -> RegistryBuilder {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        RegistryBuilder::new(ValidityParser::new(now))
    }

    fn resolve(rows: Vec<Vec<&str>>, origin: Origin) -> ResolvedTable {
        TableLocator::default().locate(&RawTable::from_strings(rows), origin).unwrap()
    }

    #[test]
    fn test_one_record_per_drug() {
        let table = resolve(
            vec![
                vec!["Производитель", "Перечень", "Срок действия"],
                vec![" BioVet LLC ", "1) VaccineA\n2) VaccineB", "до 01.01.2030"],
            ],
            Origin::ActiveRegistry,
        );
        let records = builder().flatten(&table, Origin::ActiveRegistry);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].manufacturer_original, "BioVet LLC");
        assert_eq!(records[0].manufacturer_normalized, "biovet llc");
        assert_eq!(records[0].drug_original, "VaccineA");
        assert_eq!(records[1].drug_normalized, "vaccineb");
        assert!(records.iter().all(|r| r.validity == ValidityState::Active));
        assert_eq!(records[1].expiry_date, NaiveDate::from_ymd_opt(2030, 1, 1));
    }

    #[test]
    fn test_rows_without_manufacturer_or_drugs_skipped() {
        let table = resolve(
            vec![
                vec!["Производитель", "Перечень"],
                vec!["", "Rabisin"],
                vec!["Zoetis", ""],
                vec!["AB", "Rabisin"],
                vec!["Zoetis", "1) 2)"],
                vec!["Merial", "Rabisin"],
            ],
            Origin::Refusal,
        );
        let records = builder().flatten(&table, Origin::Refusal);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].manufacturer_original, "Merial");
        assert_eq!(records[0].validity, ValidityState::NoData);
        assert_eq!(records[0].origin, Origin::Refusal);
    }

    #[test]
    fn test_blank_validity_is_no_data() {
        let table = resolve(
            vec![
                vec!["Производитель", "Перечень", "Срок"],
                vec!["Zoetis", "Rabisin", "  "],
                vec!["Zoetis", "Nobivac", "уточняется"],
            ],
            Origin::ActiveRegistry,
        );
        let records = builder().flatten(&table, Origin::ActiveRegistry);
        assert_eq!(records[0].validity, ValidityState::NoData);
        assert_eq!(records[1].validity, ValidityState::Unknown);
    }

    #[test]
    fn test_normalized_fields_longer_than_min_token() {
        let table = resolve(
            vec![
                vec!["Производитель", "Перечень"],
                vec!["Zoetis", "ab; Rabisin; x"],
            ],
            Origin::Refusal,
        );
        let records = builder().flatten(&table, Origin::Refusal);
        assert!(records.iter().all(|r| {
            r.manufacturer_normalized.chars().count() > 2 && r.drug_normalized.chars().count() > 2
        }));
        assert_eq!(records.len(), 1);
    }
}
