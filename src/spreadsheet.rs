use crate::cell::Cell;
use crate::error::{GridError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref CELL_NAME_REGEX: Regex = Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").unwrap();
}

/// Largest column count a worksheet can hold (column XFD).
pub const MAX_COLUMNS: usize = 16_384;
/// Largest row count a worksheet can hold.
pub const MAX_ROWS: usize = 1_048_576;
/// Largest dense grid (rows x columns) a worksheet may span.
pub const MAX_GRID_CELLS: usize = 2_000_000;

/// Rejects a `rows x cols` extent that would not fit in a dense grid.
pub fn check_extent(rows: usize, cols: usize) -> Result<()> {
    if rows.saturating_mul(cols) > MAX_GRID_CELLS {
        return Err(GridError::Format(format!(
            "a {}x{} grid exceeds the limit of {} cells",
            rows, cols, MAX_GRID_CELLS
        )));
    }
    Ok(())
}

/// A merged rectangle, 1-based and inclusive on both ends.
///
/// Deserializes from `{top, left, bottom, right}` or from a reference string
/// such as `"A1:C3"`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "MergeRangeRepr")]
pub struct MergeRange {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MergeRangeRepr {
    Reference(String),
    Bounds {
        top: u32,
        left: u32,
        bottom: u32,
        right: u32,
    },
}

// Object bounds are not validated here; `validate` runs where the range is applied.
impl TryFrom<MergeRangeRepr> for MergeRange {
    type Error = GridError;

    fn try_from(repr: MergeRangeRepr) -> Result<Self> {
        match repr {
            MergeRangeRepr::Reference(reference) => reference.parse(),
            MergeRangeRepr::Bounds {
                top,
                left,
                bottom,
                right,
            } => Ok(MergeRange {
                top,
                left,
                bottom,
                right,
            }),
        }
    }
}

impl MergeRange {
    pub fn new(top: u32, left: u32, bottom: u32, right: u32) -> Result<Self> {
        let range = MergeRange {
            top,
            left,
            bottom,
            right,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top == 0 || self.left == 0 {
            return Err(GridError::Validation(format!(
                "{:?} is not 1-based",
                self
            )));
        }
        if self.top > self.bottom || self.left > self.right {
            return Err(GridError::Validation(format!(
                "{:?} has inverted bounds",
                self
            )));
        }
        Ok(())
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.top..=self.bottom).contains(&row) && (self.left..=self.right).contains(&col)
    }

    pub fn overlaps(&self, other: &MergeRange) -> bool {
        self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    pub fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }
}

impl fmt::Display for MergeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            get_cell_name(self.top, self.left),
            get_cell_name(self.bottom, self.right)
        )
    }
}

impl FromStr for MergeRange {
    type Err = GridError;

    /// Parses `A1:C3`. A single reference (`B2`) yields a one-cell range.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(2, ':');
        let start = parts.next().unwrap_or_default();
        let (top, left) = parse_cell_name(start)
            .ok_or_else(|| GridError::Validation(format!("bad cell reference '{}'", start)))?;
        let (bottom, right) = match parts.next() {
            Some(end) => parse_cell_name(end)
                .ok_or_else(|| GridError::Validation(format!("bad cell reference '{}'", end)))?,
            None => (top, left),
        };
        MergeRange::new(top, left, bottom, right)
    }
}

pub fn col_to_letter(col: u32) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

pub fn letter_to_col(letters: &str) -> u32 {
    letters
        .chars()
        .fold(0, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
}

pub fn get_cell_name(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letter(col), row)
}

/// `"B12"` -> `(12, 2)`. Absolute markers (`$B$12`) are accepted.
pub fn parse_cell_name(cell_name: &str) -> Option<(u32, u32)> {
    let caps = CELL_NAME_REGEX.captures(cell_name.trim())?;
    let col = letter_to_col(&caps[1]);
    let row = caps[2].parse::<u32>().ok()?;
    if row == 0 || row as usize > MAX_ROWS || col as usize > MAX_COLUMNS {
        return None;
    }
    Some((row, col))
}

/// In-memory worksheet: ragged rows of cells plus merged ranges.
///
/// Rows and columns are addressed 1-based, matching [`MergeRange`].
#[derive(Clone, Debug, PartialEq)]
pub struct Worksheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
    merges: Vec<MergeRange>,
}

impl Default for Worksheet {
    fn default() -> Self {
        Worksheet::new("Sheet1")
    }
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Worksheet {
            name: name.into(),
            rows: Vec::new(),
            merges: Vec::new(),
        }
    }

    /// Builds a worksheet from literal text rows, mostly for tests and CSV.
    pub fn from_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sheet = Worksheet::default();
        for row in rows {
            sheet.push_row(row.into_iter().map(|v| Cell::text(v)).collect());
        }
        sheet
    }

    /// Rows covered by cells or merges.
    pub fn row_count(&self) -> usize {
        let merged = self
            .merges
            .iter()
            .map(|m| m.bottom as usize)
            .max()
            .unwrap_or(0);
        self.rows.len().max(merged)
    }

    /// Widest row, or the right edge of the widest merge.
    pub fn column_count(&self) -> usize {
        let widest = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let merged = self
            .merges
            .iter()
            .map(|m| m.right as usize)
            .max()
            .unwrap_or(0);
        widest.max(merged)
    }

    /// Fails when the rows and merges span more than [`MAX_GRID_CELLS`].
    pub fn check_size(&self) -> Result<()> {
        check_extent(self.row_count(), self.column_count().max(1))
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn merges(&self) -> &[MergeRange] {
        &self.merges
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        if row == 0 || col == 0 {
            return None;
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
    }

    /// Sets a cell, growing the row list and the row itself as needed.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) -> Result<()> {
        if row == 0 || col == 0 || row as usize > MAX_ROWS || col as usize > MAX_COLUMNS {
            return Err(GridError::Format(format!(
                "cell ({}, {}) is outside the worksheet",
                row, col
            )));
        }
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let target = &mut self.rows[r];
        if target.len() <= c {
            target.resize_with(c + 1, Cell::default);
        }
        target[c] = cell;
        Ok(())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Populated cells as `(row, col, cell)`, 1-based, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !matches!(cell, Cell::Empty))
                .map(move |(c, cell)| (r as u32 + 1, c as u32 + 1, cell))
        })
    }

    /// Drops every row. Merges are left alone.
    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn clear_merges(&mut self) {
        self.merges.clear();
    }

    pub fn add_merge(&mut self, range: MergeRange) -> Result<()> {
        range.validate()?;
        if let Some(existing) = self.merges.iter().find(|m| m.overlaps(&range)) {
            return Err(GridError::Validation(format!(
                "{} overlaps {}",
                range, existing
            )));
        }
        self.merges.push(range);
        Ok(())
    }
}
