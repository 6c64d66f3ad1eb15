//! Projection of a [`Worksheet`] into a dense grid of display strings, and the
//! reverse trip from an edited grid back into worksheet rows and merges.

use crate::cell::Cell;
use crate::error::{GridError, Result};
use crate::spreadsheet::{
    MAX_COLUMNS, MAX_ROWS, MergeRange, Worksheet, check_extent, get_cell_name,
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rectangular rows of display strings.
pub type Grid = Vec<Vec<String>>;

/// Column count used when a worksheet reports none.
pub const DEFAULT_COLUMN_COUNT: usize = 10;

/// Width of the row handed out for a worksheet with nothing in it.
pub const PLACEHOLDER_WIDTH: usize = 4;

/// Grid as served to the editor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GridPayload {
    pub data: Grid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_cells: Option<Vec<MergeRange>>,
}

/// Grid as posted back by the editor. `data` stays untyped until
/// [`parse_rows`] has checked its shape.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub data: Value,
    #[serde(default)]
    pub merged_cells: Option<Vec<MergeRange>>,
}

fn placeholder() -> Grid {
    vec![vec![String::new(); PLACEHOLDER_WIDTH]]
}

fn is_empty_row(row: &[String]) -> bool {
    row.iter().all(|value| value.is_empty())
}

/// Dense `row_count x column_count` grid with merges filled down, blank rows
/// still in place.
fn dense_grid(sheet: &Worksheet) -> Grid {
    let rows = sheet.row_count();
    let cols = match sheet.column_count() {
        0 => DEFAULT_COLUMN_COUNT,
        n => n,
    };
    let mut grid = vec![vec![String::new(); cols]; rows];

    for (row, col, cell) in sheet.cells() {
        grid[row as usize - 1][col as usize - 1] = cell.extract();
    }

    // Fill-down reads anchors only after every cell value is in place.
    for range in sheet.merges() {
        fill_down(&mut grid, range);
    }
    grid
}

fn fill_down(grid: &mut Grid, range: &MergeRange) {
    let anchor = grid
        .get(range.top as usize - 1)
        .and_then(|row| row.get(range.left as usize - 1))
        .cloned()
        .unwrap_or_default();

    for r in range.top..=range.bottom {
        let Some(row) = grid.get_mut(r as usize - 1) else {
            break;
        };
        for c in range.left..=range.right {
            if let Some(slot) = row.get_mut(c as usize - 1) {
                slot.clone_from(&anchor);
            }
        }
    }
}

/// Removes the rows matching `blank` and returns the kept rows with a shift
/// table: `shift[i]` is the number of rows dropped before row `i`, or `None`
/// when row `i` itself was dropped.
fn drop_rows<T>(
    rows: Vec<Vec<T>>,
    blank: impl Fn(&[T]) -> bool,
) -> (Vec<Vec<T>>, Vec<Option<u32>>) {
    let mut shift = Vec::with_capacity(rows.len());
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = 0u32;
    for row in rows {
        if blank(&row) {
            shift.push(None);
            dropped += 1;
        } else {
            shift.push(Some(dropped));
            kept.push(row);
        }
    }
    (kept, shift)
}

/// Moves `range` up past the dropped rows above it. `None` when the range
/// runs past the shift table or covers a dropped row.
fn shift_range(range: &MergeRange, shift: &[Option<u32>]) -> Option<MergeRange> {
    let rows = shift.get(range.top as usize - 1..range.bottom as usize)?;
    let offset = rows.first().copied().flatten()?;
    if rows.iter().any(Option::is_none) {
        return None;
    }
    Some(MergeRange {
        top: range.top - offset,
        bottom: range.bottom - offset,
        ..*range
    })
}

/// Flattens a worksheet into a rectangular grid of display strings.
///
/// Merged ranges carry their anchor value in every covered cell, rows where
/// every value is `""` are dropped, and an empty result becomes a single row
/// of four empty strings.
pub fn flatten(sheet: &Worksheet) -> Grid {
    project(sheet).data
}

/// Like [`flatten`], also returning the worksheet's merges re-addressed to the
/// flattened rows. A merge touching a dropped row is left out.
pub fn project(sheet: &Worksheet) -> GridPayload {
    let dense = dense_grid(sheet);
    let total = dense.len();

    let (data, shift) = drop_rows(dense, is_empty_row);

    if data.is_empty() {
        debug!("worksheet '{}' has no content, serving placeholder row", sheet.name);
        return GridPayload {
            data: placeholder(),
            merged_cells: Some(Vec::new()),
        };
    }

    let merged_cells = sheet
        .merges()
        .iter()
        .filter_map(|range| shift_range(range, &shift))
        .collect();

    debug!(
        "flattened '{}': {} of {} rows kept, {} columns",
        sheet.name,
        data.len(),
        total,
        data[0].len()
    );
    GridPayload {
        data,
        merged_cells: Some(merged_cells),
    }
}

fn scalar_cell(value: &Value) -> Option<Cell> {
    match value {
        Value::Null => Some(Cell::Empty),
        Value::Bool(b) => Some(Cell::boolean(*b)),
        Value::Number(n) => n.as_f64().map(Cell::number),
        Value::String(s) => Some(Cell::text(s.as_str())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Checks that `data` is an array of arrays of scalars and converts it into
/// worksheet cells.
pub fn parse_rows(data: &Value) -> Result<Vec<Vec<Cell>>> {
    let rows = data
        .as_array()
        .ok_or_else(|| GridError::Format("data must be an array of rows".to_string()))?;
    if rows.len() > MAX_ROWS {
        return Err(GridError::Format(format!(
            "{} rows exceeds the limit of {}",
            rows.len(),
            MAX_ROWS
        )));
    }

    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let values = row
                .as_array()
                .ok_or_else(|| GridError::Format(format!("row {} is not an array", r + 1)))?;
            if values.len() > MAX_COLUMNS {
                return Err(GridError::Format(format!(
                    "row {} has {} cells, the limit is {}",
                    r + 1,
                    values.len(),
                    MAX_COLUMNS
                )));
            }
            values
                .iter()
                .enumerate()
                .map(|(c, value)| {
                    scalar_cell(value).ok_or_else(|| {
                        GridError::Format(format!(
                            "cell {} is not a scalar",
                            get_cell_name(r as u32 + 1, c as u32 + 1)
                        ))
                    })
                })
                .collect()
        })
        .collect()
}

/// Converts a grid of display strings into text cells.
pub fn rows_from_grid(grid: &Grid) -> Vec<Vec<Cell>> {
    grid.iter()
        .map(|row| row.iter().map(|value| Cell::text(value.as_str())).collect())
        .collect()
}

/// Rejects ranges that are malformed, fall outside a `rows x cols` grid, or
/// overlap one another.
pub fn validate_merges(ranges: &[MergeRange], rows: usize, cols: usize) -> Result<()> {
    for (i, range) in ranges.iter().enumerate() {
        range.validate()?;
        if range.bottom as usize > rows || range.right as usize > cols {
            return Err(GridError::Validation(format!(
                "{} lies outside the {}x{} grid",
                range, rows, cols
            )));
        }
        if let Some(other) = ranges[..i].iter().find(|other| other.overlaps(range)) {
            return Err(GridError::Validation(format!(
                "{} overlaps {}",
                range, other
            )));
        }
    }
    Ok(())
}

/// Replaces the worksheet's content with `rows`.
///
/// Rows that are empty or whitespace-only are skipped. When `merges` is given
/// it replaces the worksheet's merges; ranges address the rows as posted and
/// are moved up past skipped rows, and a range covering a skipped row is a
/// validation error. When absent the old merges are cleared since they
/// address rows that no longer exist. On error the worksheet is left untouched.
pub fn reconcile(
    sheet: &mut Worksheet,
    rows: Vec<Vec<Cell>>,
    merges: Option<&[MergeRange]>,
) -> Result<()> {
    if let Some(row) = rows.iter().position(|row| row.len() > MAX_COLUMNS) {
        return Err(GridError::Format(format!(
            "row {} exceeds {} columns",
            row + 1,
            MAX_COLUMNS
        )));
    }
    let posted = rows.len();
    let (rows, shift) = drop_rows(rows, |row| row.iter().all(Cell::is_blank));

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    check_extent(rows.len(), width)?;

    let merges = match merges {
        Some(ranges) => {
            let mut shifted = Vec::with_capacity(ranges.len());
            for range in ranges {
                range.validate()?;
                if range.bottom as usize > posted {
                    return Err(GridError::Validation(format!(
                        "{} lies outside the {}x{} grid",
                        range, posted, width
                    )));
                }
                let moved = shift_range(range, &shift).ok_or_else(|| {
                    GridError::Validation(format!("{} covers a blank row", range))
                })?;
                shifted.push(moved);
            }
            validate_merges(&shifted, rows.len(), width)?;
            shifted
        }
        None => Vec::new(),
    };

    debug!(
        "reconciling '{}': {} of {} rows kept x {} columns, {} merges",
        sheet.name,
        rows.len(),
        posted,
        width,
        merges.len()
    );

    sheet.clear_rows();
    sheet.clear_merges();
    for row in rows {
        sheet.push_row(row);
    }
    for range in merges {
        sheet.add_merge(range)?;
    }
    Ok(())
}

/// Shape-checks a posted grid and reconciles it into `sheet`.
pub fn reconcile_request(sheet: &mut Worksheet, request: &SaveRequest) -> Result<()> {
    let rows = parse_rows(&request.data)?;
    reconcile(sheet, rows, request.merged_cells.as_deref())
}
