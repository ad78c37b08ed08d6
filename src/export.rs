/*!
 * Export functionality for reconciliation results
 *
 * Serializes result rows (manufacturer, refused drug, classification,
 * detail) as CSV or JSON, either to a file or to an in-memory payload for
 * download.
 */

use std::path::Path;
use std::fs::File;
use std::io::{Write, BufWriter};
use serde::Serialize;

use crate::{Result, GapError, ExportFormat};
use crate::constants::REPORT_DATE_FORMAT;
use crate::data_types::ReconciliationResult;

/// Column headers of the tabular export
pub const EXPORT_HEADERS: [&str; 4] = ["Manufacturer", "Drug Name (Refused)", "Current Status", "Details"];

/// Trait for implementing result exporters
pub trait ResultExporter {
    /// Write the results to any writer
    fn export_to_writer(&self, results: &[ReconciliationResult], writer: &mut dyn Write) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;

    /// Write the results to a file
    fn export_to_path(&self, results: &[ReconciliationResult], path: impl AsRef<Path>) -> Result<()>
    where
        Self: Sized,
    {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.export_to_writer(results, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the results into a download payload
    fn to_bytes(&self, results: &[ReconciliationResult]) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.export_to_writer(results, &mut buffer)?;
        Ok(buffer)
    }
}

/// Flat export row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Manufacturer")]
    manufacturer: &'a str,
    #[serde(rename = "Drug Name (Refused)")]
    refused_drug: &'a str,
    #[serde(rename = "Current Status")]
    status: &'static str,
    #[serde(rename = "Details")]
    detail: &'a str,
    #[serde(rename = "Expiry Date", skip_serializing_if = "Option::is_none")]
    expiry_date: Option<String>,
}

impl<'a> From<&'a ReconciliationResult> for ExportRow<'a> {
    fn from(result: &'a ReconciliationResult) -> Self {
        Self {
            manufacturer: &result.manufacturer,
            refused_drug: &result.refused_drug,
            status: result.classification.label(),
            detail: &result.detail,
            expiry_date: result.expiry_date.map(|d| d.format(REPORT_DATE_FORMAT).to_string()),
        }
    }
}

/// CSV exporter for result rows
pub struct CsvExporter {
    /// Whether to include headers
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write the header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

impl ResultExporter for CsvExporter {
    fn export_to_writer(&self, results: &[ReconciliationResult], writer: &mut dyn Write) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(writer);

        if self.include_headers {
            csv_writer.write_record(EXPORT_HEADERS)?;
        }

        for result in results {
            csv_writer.write_record([
                result.manufacturer.as_str(),
                result.refused_drug.as_str(),
                result.classification.label(),
                result.detail.as_str(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// JSON exporter for result rows
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty_print: true }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }
}

impl ResultExporter for JsonExporter {
    fn export_to_writer(&self, results: &[ReconciliationResult], writer: &mut dyn Write) -> Result<()> {
        let rows: Vec<ExportRow<'_>> = results.iter().map(ExportRow::from).collect();
        if self.pretty_print {
            serde_json::to_writer_pretty(&mut *writer, &rows)?;
        } else {
            serde_json::to_writer(&mut *writer, &rows)?;
        }
        writer.flush().map_err(|e| GapError::Export {
            message: e.to_string(),
            format: ExportFormat::Json,
        })
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// Exporter for a format
pub fn exporter_for(format: ExportFormat) -> Box<dyn ResultExporter> {
    match format {
        ExportFormat::Csv => Box::new(CsvExporter::new()),
        ExportFormat::Json => Box::new(JsonExporter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::Classification;
    use chrono::NaiveDate;

    fn results() -> Vec<ReconciliationResult> {
        vec![
            ReconciliationResult {
                manufacturer: "Zoetis, Inc.".to_string(),
                refused_drug: "Rabisin".to_string(),
                classification: Classification::NotRegistered,
                detail: "Not found in active list".to_string(),
                expiry_date: None,
                matched_drug: None,
            },
            ReconciliationResult {
                manufacturer: "Merial".to_string(),
                refused_drug: "Frontline".to_string(),
                classification: Classification::ExpiredFound,
                detail: "Found but certificate expired (2020-05-01)".to_string(),
                expiry_date: NaiveDate::from_ymd_opt(2020, 5, 1),
                matched_drug: Some("Frontline Combo".to_string()),
            },
        ]
    }

    #[test]
    fn test_csv_export() {
        let bytes = CsvExporter::new().to_bytes(&results()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Manufacturer,Drug Name (Refused),Current Status,Details");
        assert_eq!(lines[1], "\"Zoetis, Inc.\",Rabisin,CRITICAL: Not Registered,Not found in active list");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_without_headers_and_custom_delimiter() {
        let bytes = CsvExporter::new()
            .with_headers(false)
            .with_delimiter(b';')
            .to_bytes(&results()[1..])
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text.trim_end(),
            "Merial;Frontline;WARNING: Expired;Found but certificate expired (2020-05-01)"
        );
    }

    #[test]
    fn test_json_export() {
        let bytes = JsonExporter::new().with_pretty_print(false).to_bytes(&results()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Current Status"], "CRITICAL: Not Registered");
        assert!(rows[0].get("Expiry Date").is_none());
        assert_eq!(rows[1]["Expiry Date"], "2020-05-01");
    }

    #[test]
    fn test_export_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        CsvExporter::new().export_to_path(&results(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Frontline"));
        assert_eq!(exporter_for(ExportFormat::Json).format(), ExportFormat::Json);
    }
}
