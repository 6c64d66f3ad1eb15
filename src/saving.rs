//! Spreadsheet persistence.
//!
//! Every uploaded spreadsheet lives in the store's directory under an opaque
//! [`DocumentId`]. Each call opens the file again; nothing is cached between
//! requests, so concurrent saves are last-writer-wins.

use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{NaiveDateTime, Timelike};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::cell::{Cell, Scalar};
use crate::error::{GridError, Result};
use crate::grid::{SaveRequest, project, reconcile_request};
use crate::spreadsheet::{MAX_COLUMNS, MergeRange, Worksheet, check_extent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Xlsx,
    Csv,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => Some(DocumentFormat::Xlsx),
            "csv" => Some(DocumentFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Csv => "csv",
        }
    }
}

/// Handle to one stored spreadsheet: `<uuid>.<xlsx|csv>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate(format: DocumentFormat) -> Self {
        DocumentId(format!("{}.{}", Uuid::new_v4(), format.extension()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn format(&self) -> DocumentFormat {
        self.0
            .rsplit_once('.')
            .and_then(|(_, ext)| DocumentFormat::from_extension(ext))
            .unwrap_or(DocumentFormat::Xlsx)
    }
}

impl FromStr for DocumentId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || GridError::NotFound(format!("no document named '{}'", s));
        let (stem, ext) = s.rsplit_once('.').ok_or_else(unknown)?;
        let format = DocumentFormat::from_extension(ext).ok_or_else(unknown)?;
        let uuid = Uuid::parse_str(stem).map_err(|_| unknown())?;
        Ok(DocumentId(format!("{}.{}", uuid, format.extension())))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory-backed spreadsheet storage.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DocumentStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Stores uploaded bytes under a fresh id. The format comes from the
    /// original file name; a file that cannot be read back is discarded.
    pub fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<DocumentId> {
        let format = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentFormat::from_extension)
            .ok_or_else(|| {
                GridError::Format(format!(
                    "'{}' is not an .xlsx or .csv file",
                    original_name
                ))
            })?;

        let id = DocumentId::generate(format);
        let path = self.path(&id);
        write_atomic(&path, bytes)?;

        let rows = match self.open(&id) {
            Ok(sheet) => project(&sheet).data.len(),
            Err(e) => {
                warn!("rejecting upload '{}': {}", original_name, e);
                fs::remove_file(&path)?;
                return Err(GridError::Format(format!(
                    "'{}' could not be read: {}",
                    original_name, e
                )));
            }
        };

        info!(
            "stored upload '{}' as {} ({} bytes, {} rows)",
            original_name,
            id,
            bytes.len(),
            rows
        );
        Ok(id)
    }

    pub fn open(&self, id: &DocumentId) -> Result<Worksheet> {
        let path = self.path(id);
        if !path.is_file() {
            return Err(GridError::NotFound(format!("document {} does not exist", id)));
        }
        match id.format() {
            DocumentFormat::Xlsx => read_xlsx(&path),
            DocumentFormat::Csv => read_csv(&path),
        }
    }

    pub fn save(&self, id: &DocumentId, sheet: &Worksheet) -> Result<()> {
        let bytes = match id.format() {
            DocumentFormat::Xlsx => write_xlsx(sheet)?,
            DocumentFormat::Csv => {
                csv_bytes(sheet.rows().iter().map(|row| row.iter().map(Cell::extract)))?
            }
        };
        write_atomic(&self.path(id), &bytes)?;
        debug!("saved {} ({} bytes)", id, bytes.len());
        Ok(())
    }

    /// Opens the document (or starts an empty worksheet when the file is
    /// gone), reconciles the posted grid into it and writes it back.
    pub fn save_grid(&self, id: &DocumentId, request: &SaveRequest) -> Result<()> {
        let mut sheet = match self.open(id) {
            Ok(sheet) => sheet,
            Err(GridError::NotFound(_)) => Worksheet::default(),
            Err(e) => return Err(e),
        };
        reconcile_request(&mut sheet, request)?;
        self.save(id, &sheet)?;
        info!(
            "saved {}: {} rows, {} merges",
            id,
            sheet.rows().len(),
            sheet.merges().len()
        );
        Ok(())
    }
}

/// Replaces `path` with `bytes` through a temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| GridError::Io(e.error))?;
    Ok(())
}

fn format_datetime(value: NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn scalar_from_data(data: &Data) -> Option<Scalar> {
    match data {
        Data::Empty => None,
        Data::Int(i) => Some(Scalar::Number(*i as f64)),
        Data::Float(f) => Some(Scalar::Number(*f)),
        Data::Bool(b) => Some(Scalar::Bool(*b)),
        Data::String(s) => Some(Scalar::Text(s.clone())),
        Data::DateTime(dt) => Some(Scalar::Text(match dt.as_datetime() {
            Some(value) => format_datetime(value),
            None => dt.as_f64().to_string(),
        })),
        other => Some(Scalar::Text(other.to_string())),
    }
}

/// Reads the first worksheet of an xlsx file.
pub fn read_xlsx(path: &Path) -> Result<Worksheet> {
    let storage = |e: calamine::XlsxError| {
        GridError::Storage(format!("failed to read {}: {}", path.display(), e))
    };

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(storage)?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| GridError::NotFound(format!("{} has no worksheets", path.display())))?;

    // Streamed cell by cell; extents are capped before anything is allocated.
    let mut sheet = Worksheet::new(name.as_str());
    let mut extent = (0usize, 0usize);
    let declared = {
        let mut reader = workbook.worksheet_cells_reader(&name).map_err(storage)?;
        let declared = reader.dimensions();
        while let Some(cell) = reader.next_cell().map_err(storage)? {
            let (row, col) = cell.get_position();
            let data = Data::from(cell.get_value().clone());
            if let Some(value) = scalar_from_data(&data) {
                extent = (extent.0.max(row as usize + 1), extent.1.max(col as usize + 1));
                check_extent(extent.0, extent.1)?;
                sheet.set_cell(row + 1, col + 1, Cell::Literal(value))?;
            }
        }
        declared
    };

    {
        let mut reader = workbook.worksheet_cells_reader(&name).map_err(storage)?;
        while let Some(formula) = reader.next_formula().map_err(storage)? {
            if formula.get_value().is_empty() {
                continue;
            }
            let (row, col) = formula.get_position();
            check_extent(
                extent.0.max(row as usize + 1),
                extent.1.max(col as usize + 1),
            )?;
            let (row, col) = (row + 1, col + 1);
            let cached = match sheet.cell(row, col) {
                Some(Cell::Literal(value)) => Some(value.clone()),
                _ => None,
            };
            sheet.set_cell(row, col, Cell::formula(formula.get_value().as_str(), cached))?;
        }
    }

    // Trailing blank columns only survive in the declared dimension.
    let declared_cols = declared.end.1 as usize + 1;
    if sheet.row_count() > 0
        && declared_cols > sheet.column_count()
        && declared_cols <= MAX_COLUMNS
    {
        check_extent(sheet.row_count(), declared_cols)?;
        sheet.set_cell(1, declared_cols as u32, Cell::text(""))?;
    }

    workbook.load_merged_regions().map_err(storage)?;
    let merged = workbook
        .worksheet_merge_cells(&name)
        .transpose()
        .map_err(storage)?
        .unwrap_or_default();
    for dims in merged {
        let range = MergeRange::new(
            dims.start.0 + 1,
            dims.start.1 + 1,
            dims.end.0 + 1,
            dims.end.1 + 1,
        )
        .and_then(|range| sheet.add_merge(range));
        if let Err(e) = range {
            warn!("ignoring merge in {}: {}", path.display(), e);
        }
    }

    sheet.check_size()?;
    debug!(
        "read {}: {} rows, {} merges",
        path.display(),
        sheet.row_count(),
        sheet.merges().len()
    );
    Ok(sheet)
}

/// Reads a CSV file. Records may be ragged and every field is text.
pub fn read_csv(path: &Path) -> Result<Worksheet> {
    let storage = |e: csv::Error| GridError::Storage(format!("failed to read {}: {}", path.display(), e));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(storage)?;

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Sheet1");
    let mut sheet = Worksheet::new(name);
    for record in reader.records() {
        let record = record.map_err(storage)?;
        sheet.push_row(record.iter().map(Cell::text).collect());
    }
    sheet.check_size()?;
    Ok(sheet)
}

/// Serializes rows of strings as CSV.
pub fn csv_bytes<R, S>(rows: impl IntoIterator<Item = R>) -> Result<Vec<u8>>
where
    R: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let storage = |e: csv::Error| GridError::Storage(format!("failed to write csv: {}", e));
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).map_err(storage)?;
    }
    writer
        .into_inner()
        .map_err(|e| GridError::Storage(format!("failed to write csv: {}", e)))
}

/// Serializes a worksheet as an xlsx workbook with a single sheet.
///
/// Cells covered by a merge other than its anchor are not written.
pub fn write_xlsx(sheet: &Worksheet) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, XlsxError};

    let storage = |e: XlsxError| GridError::Storage(format!("failed to write xlsx: {}", e));

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    if !sheet.name.is_empty() {
        worksheet.set_name(&sheet.name).map_err(storage)?;
    }

    let merge_format = Format::new();
    // Unformatted blanks write no cell but still widen the sheet dimension.
    let blank = Format::new();
    for range in sheet.merges().iter().filter(|range| !range.is_single_cell()) {
        let anchor = sheet
            .cell(range.top, range.left)
            .map(Cell::extract)
            .unwrap_or_default();
        worksheet
            .merge_range(
                range.top - 1,
                (range.left - 1) as u16,
                range.bottom - 1,
                (range.right - 1) as u16,
                &anchor,
                &merge_format,
            )
            .map_err(storage)?;
    }

    for (row, col, cell) in sheet.cells() {
        let covered = sheet
            .merges()
            .iter()
            .any(|m| m.contains(row, col) && (m.top, m.left) != (row, col));
        if covered {
            continue;
        }

        let (row, col) = (row - 1, (col - 1) as u16);
        match cell {
            Cell::Empty => {}
            Cell::Literal(Scalar::Text(s)) if s.is_empty() => {
                worksheet.write_blank(row, col, &blank).map_err(storage)?;
            }
            Cell::Literal(Scalar::Text(s)) => {
                worksheet.write_string(row, col, s).map_err(storage)?;
            }
            Cell::Literal(Scalar::Number(n)) => {
                worksheet.write_number(row, col, *n).map_err(storage)?;
            }
            Cell::Literal(Scalar::Bool(b)) => {
                worksheet.write_boolean(row, col, *b).map_err(storage)?;
            }
            Cell::Formula { expression, cached } => {
                worksheet
                    .write_formula(row, col, expression.as_str())
                    .map_err(storage)?;
                if let Some(value) = cached {
                    worksheet.set_formula_result(row, col, value.to_string());
                }
            }
            Cell::RichText(_) => {
                worksheet
                    .write_string(row, col, cell.extract())
                    .map_err(storage)?;
            }
        }
    }

    workbook.save_to_buffer().map_err(storage)
}
