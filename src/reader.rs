/*!
 * Workbook loading for registry uploads
 *
 * Reads `.xlsx`, `.xlsm`, `.xls` and `.ods` workbooks through `calamine`
 * and `.csv` files through `csv`, producing header-less raw grids. Also
 * implements the sheet selection conventions: automatic indexing (first
 * sheet refusals, third sheet active registry, second as fallback) or
 * explicit selection by name.
 */

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1251};
use tracing::{debug, info};

use crate::{GapError, Result};
use crate::constants::DATE_FORMAT;
use crate::data_types::{Cell, RawTable};

/// One named worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: RawTable,
}

/// All sheets of one uploaded file, in workbook order
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Pick the refusal and active registry sheets
    pub fn select(&self, selection: &SheetSelection) -> Result<(&Sheet, &Sheet)> {
        match selection {
            SheetSelection::Automatic => {
                let (refusal_idx, active_idx) = automatic_indices(self.sheets.len())
                    .map_err(|e| match e {
                        GapError::EmptyWorkbook { .. } => GapError::EmptyWorkbook { path: self.path.clone() },
                        other => other,
                    })?;
                Ok((&self.sheets[refusal_idx], &self.sheets[active_idx]))
            }
            SheetSelection::Named { refusal, active } => {
                let find = |name: &str| {
                    self.sheet(name).ok_or_else(|| GapError::SheetNotFound {
                        name: name.to_string(),
                        available: self.sheets.iter().map(|s| s.name.clone()).collect(),
                    })
                };
                Ok((find(refusal)?, find(active)?))
            }
        }
    }

    /// First sheet of the workbook
    pub fn first_sheet(&self) -> Result<&Sheet> {
        self.sheets
            .first()
            .ok_or_else(|| GapError::EmptyWorkbook { path: self.path.clone() })
    }
}

/// How the refusal and active registry sheets are chosen
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SheetSelection {
    /// 1st sheet = refusals; 3rd sheet = active registry (2nd if fewer than 3)
    #[default]
    Automatic,
    /// Explicit sheet names
    Named { refusal: String, active: String },
}

/// Sheet indices under the automatic convention
pub fn automatic_indices(sheet_count: usize) -> Result<(usize, usize)> {
    match sheet_count {
        0 => Err(GapError::EmptyWorkbook { path: PathBuf::new() }),
        1 => Err(GapError::InsufficientSheets { found: 1, required: 2 }),
        2 => Ok((0, 1)),
        _ => Ok((0, 2)),
    }
}

/// Loads workbooks and CSV files into raw grids
#[derive(Debug, Clone, Default)]
pub struct WorkbookReader;

impl WorkbookReader {
    pub fn new() -> Self {
        Self
    }

    /// Open any supported file, dispatching on its extension
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Workbook> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GapError::file_read(path, "file does not exist"));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let workbook = match extension.as_str() {
            "csv" => self.open_csv(path)?,
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => self.open_spreadsheet(path)?,
            other => {
                return Err(GapError::file_read(
                    path,
                    format!("unsupported file type '{}'", other),
                ))
            }
        };

        info!(
            path = %path.display(),
            sheets = workbook.sheets.len(),
            "loaded workbook"
        );
        Ok(workbook)
    }

    /// Read a CSV file as a single sheet named after the file
    ///
    /// UTF-8 (with or without BOM) is tried first; anything else is read as
    /// Windows-1251, the usual encoding of CSV saved by Russian Excel.
    pub fn open_csv(&self, path: &Path) -> Result<Workbook> {
        let bytes = std::fs::read(path).map_err(|e| GapError::file_read(path, e))?;
        let text = decode_csv_text(&bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| GapError::file_read(path, e))?;
            rows.push(record.iter().map(Cell::from).collect());
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("csv")
            .to_string();

        Ok(Workbook {
            path: path.to_path_buf(),
            sheets: vec![Sheet { name, table: RawTable::new(rows) }],
        })
    }

    /// Read every worksheet of a spreadsheet workbook
    pub fn open_spreadsheet(&self, path: &Path) -> Result<Workbook> {
        let mut workbook = open_workbook_auto(path).map_err(|e| GapError::file_read(path, e))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| GapError::file_read(path, format!("sheet '{}': {}", name, e)))?;
            let rows: Vec<Vec<Cell>> = range
                .rows()
                .map(|row| row.iter().map(convert_cell).collect())
                .collect();
            debug!(sheet = %name, rows = rows.len(), "read worksheet");
            sheets.push(Sheet { name, table: RawTable::new(rows) });
        }

        if sheets.is_empty() {
            return Err(GapError::EmptyWorkbook { path: path.to_path_buf() });
        }

        Ok(Workbook {
            path: path.to_path_buf(),
            sheets,
        })
    }
}

/// Decode raw CSV bytes: BOM-declared encoding, then strict UTF-8, then Windows-1251
fn decode_csv_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding.decode_without_bom_handling(&bytes[bom_len..]).0;
    }
    match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => {
            debug!("CSV is not valid UTF-8, decoding as windows-1251");
            WINDOWS_1251.decode_without_bom_handling(bytes).0
        }
    }
}

/// Convert a spreadsheet value into a pipeline cell
fn convert_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        // honours the workbook's 1900/1904 date system
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Cell::DateLike(d.format(DATE_FORMAT).to_string()))
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d")
            .map(|d| Cell::DateLike(d.format(DATE_FORMAT).to_string()))
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Size and modification time of a file when it was read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct CacheEntry {
    stamp: FileStamp,
    workbook: Arc<Workbook>,
}

/// Memoized workbook reads, one entry per canonical path
///
/// A file whose size or modification time changed is read again and
/// replaces its previous entry.
#[derive(Debug, Default)]
pub struct WorkbookCache {
    reader: WorkbookReader,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl WorkbookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached workbook for `path`, reading it on a miss
    pub fn get_or_open<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Workbook>> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|e| GapError::file_read(path, e))?;
        let stamp = FileStamp::of(&canonical).map_err(|e| GapError::file_read(path, e))?;

        if let Some(hit) = self.lock().get(&canonical).filter(|entry| entry.stamp == stamp) {
            debug!(path = %path.display(), "workbook cache hit");
            return Ok(Arc::clone(&hit.workbook));
        }

        let workbook = Arc::new(self.reader.open(&canonical)?);
        self.lock().insert(
            canonical,
            CacheEntry { stamp, workbook: Arc::clone(&workbook) },
        );
        Ok(workbook)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use std::io::Write;

    fn workbook(names: &[&str]) -> Workbook {
        Workbook {
            path: PathBuf::from("upload.xlsx"),
            sheets: names
                .iter()
                .map(|n| Sheet { name: n.to_string(), table: RawTable::default() })
                .collect(),
        }
    }

    #[test]
    fn test_automatic_selection() {
        let book = workbook(&["Отказы", "Отечественные", "Иностранные"]);
        let (refusal, active) = book.select(&SheetSelection::Automatic).unwrap();
        assert_eq!(refusal.name, "Отказы");
        assert_eq!(active.name, "Иностранные");

        let book = workbook(&["Отказы", "Действующие"]);
        let (_, active) = book.select(&SheetSelection::Automatic).unwrap();
        assert_eq!(active.name, "Действующие");
    }

    #[test]
    fn test_automatic_selection_errors() {
        let err = workbook(&["Отказы"]).select(&SheetSelection::Automatic).unwrap_err();
        assert!(matches!(err, GapError::InsufficientSheets { found: 1, required: 2 }));

        let err = workbook(&[]).select(&SheetSelection::Automatic).unwrap_err();
        match err {
            GapError::EmptyWorkbook { path } => assert_eq!(path, PathBuf::from("upload.xlsx")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_named_selection() {
        let book = workbook(&["A", "B", "C"]);
        let selection = SheetSelection::Named { refusal: "C".into(), active: "A".into() };
        let (refusal, active) = book.select(&selection).unwrap();
        assert_eq!((refusal.name.as_str(), active.name.as_str()), ("C", "A"));

        let selection = SheetSelection::Named { refusal: "C".into(), active: "Z".into() };
        match book.select(&selection).unwrap_err() {
            GapError::SheetNotFound { name, available } => {
                assert_eq!(name, "Z");
                assert_eq!(available, vec!["A", "B", "C"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_open_csv_without_header_assumption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refusals.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Реестр отказов").unwrap();
        writeln!(file, "Производитель,Перечень").unwrap();
        writeln!(file, "Zoetis,\"Rabisin; Nobivac\"").unwrap();
        drop(file);

        let book = WorkbookReader::new().open(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["refusals"]);
        let table = &book.sheets[0].table;
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0], vec![Cell::Text("Реестр отказов".into())]);
        assert_eq!(table.rows[2][1], Cell::Text("Rabisin; Nobivac".into()));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(matches!(WorkbookReader::new().open(&path), Err(GapError::FileRead { .. })));
        assert!(matches!(
            WorkbookReader::new().open(dir.path().join("missing.xlsx")),
            Err(GapError::FileRead { .. })
        ));
    }

    #[test]
    fn test_corrupt_spreadsheet_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(matches!(WorkbookReader::new().open(&path), Err(GapError::FileRead { .. })));
    }

    #[test]
    fn test_date_cells_follow_workbook_date_system() {
        let cell_1900 = Data::DateTime(ExcelDateTime::new(47484.0, ExcelDateTimeType::DateTime, false));
        assert_eq!(convert_cell(&cell_1900), Cell::DateLike("01.01.2030".into()));

        // same serial in a 1904-based workbook lands four years later
        let cell_1904 = Data::DateTime(ExcelDateTime::new(45658.0, ExcelDateTimeType::DateTime, true));
        assert_eq!(convert_cell(&cell_1904), Cell::DateLike("02.01.2029".into()));

        assert_eq!(
            convert_cell(&Data::DateTimeIso("2030-01-01T00:00:00".into())),
            Cell::DateLike("01.01.2030".into())
        );
    }

    #[test]
    fn test_cache_reuses_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.csv");
        std::fs::write(&path, "Производитель,Перечень\nZoetis,Rabisin\n").unwrap();

        let cache = WorkbookCache::new();
        let first = cache.get_or_open(&path).unwrap();
        let second = cache.get_or_open(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        for extra in 1..=4 {
            let mut content = String::from("Производитель,Перечень\nZoetis,Rabisin\n");
            for i in 0..extra {
                content.push_str(&format!("Merial,Nobivac {i}\n"));
            }
            std::fs::write(&path, content).unwrap();
            let reread = cache.get_or_open(&path).unwrap();
            assert_eq!(reread.sheets[0].table.len(), 2 + extra);
            assert_eq!(cache.len(), 1);
        }
    }

    #[test]
    fn test_windows_1251_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let (bytes, _, _) = WINDOWS_1251.encode("Производитель,Перечень\nZoetis,Rabisin\n");
        std::fs::write(&path, &bytes).unwrap();

        let book = WorkbookReader::new().open(&path).unwrap();
        let table = &book.sheets[0].table;
        assert_eq!(table.rows[0], vec![Cell::Text("Производитель".into()), Cell::Text("Перечень".into())]);
        assert_eq!(table.rows[1][1], Cell::Text("Rabisin".into()));
    }

    #[test]
    fn test_utf8_bom_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Производитель,Перечень\n".as_bytes());
        std::fs::write(&path, bytes).unwrap();

        let book = WorkbookReader::new().open(&path).unwrap();
        assert_eq!(book.sheets[0].table.rows[0][0], Cell::Text("Производитель".into()));
    }
}
