//! Paginated table layout.
//!
//! Turns a flattened [`Grid`] into pages of positioned text runs. The first
//! grid row is the header and is repeated on every page. Coordinates are PDF
//! points with the origin at the bottom-left corner of the page.

use crate::grid::Grid;
use chrono::{DateTime, Local};
use serde::Serialize;

pub const MARGIN: f32 = 40.0;
pub const LINE_HEIGHT: f32 = 16.0;
pub const PER_CHAR_WIDTH: f32 = 6.0;
pub const COLUMN_PADDING: f32 = 10.0;
pub const MAX_COLUMN_WIDTH: f32 = 150.0;

pub const HEADER_CHAR_LIMIT: usize = 15;
pub const DATA_CHAR_LIMIT: usize = 20;

pub const TITLE_FONT_SIZE: f32 = 16.0;
pub const DATE_FONT_SIZE: f32 = 9.0;
pub const HEADER_FONT_SIZE: f32 = 10.0;
pub const DATA_FONT_SIZE: f32 = 9.0;
pub const NOTICE_FONT_SIZE: f32 = 11.0;

pub const DEFAULT_ROWS_PER_PAGE: usize = 30;
pub const NO_DATA_TEXT: &str = "No data available";

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: 595.28,
        height: 841.89,
    };
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn landscape(self) -> Self {
        PageSize {
            width: self.height,
            height: self.width,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutOptions {
    pub page_size: PageSize,
    pub rows_per_page: usize,
    pub title: String,
    pub generated_at: DateTime<Local>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            page_size: PageSize::A4,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            title: "Spreadsheet Export".to_string(),
            generated_at: Local::now(),
        }
    }
}

/// One text draw call. `font_size` is a hint in points.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextInstruction {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

/// Horizontal separator under the header row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rule {
    pub x1: f32,
    pub x2: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page {
    pub number: usize,
    pub title: String,
    pub size: PageSize,
    pub texts: Vec<TextInstruction>,
    pub rules: Vec<Rule>,
}

impl Page {
    fn push_text(&mut self, text: String, x: f32, y: f32, font_size: f32) {
        if text.trim().is_empty() {
            return;
        }
        self.texts.push(TextInstruction {
            text,
            x,
            y,
            font_size,
        });
    }
}

/// Width of each column from the longest value it holds in any row, capped at
/// [`MAX_COLUMN_WIDTH`].
pub fn column_widths(grid: &Grid) -> Vec<f32> {
    let columns = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut longest = vec![0usize; columns];
    for row in grid {
        for (col, value) in row.iter().enumerate() {
            longest[col] = longest[col].max(value.chars().count());
        }
    }
    longest
        .into_iter()
        .map(|chars| (chars as f32 * PER_CHAR_WIDTH + COLUMN_PADDING).min(MAX_COLUMN_WIDTH))
        .collect()
}

/// Truncates to `limit` characters and blanks anything outside printable ASCII.
pub fn printable(value: &str, limit: usize) -> String {
    value
        .chars()
        .take(limit)
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect()
}

struct PageCursor<'a> {
    options: &'a LayoutOptions,
    widths: Vec<f32>,
}

impl PageCursor<'_> {
    /// Opens a page with its title block; returns the page and the y of the
    /// next free line.
    fn open(&self, number: usize) -> (Page, f32) {
        let size = self.options.page_size;
        let title = if number == 1 {
            self.options.title.clone()
        } else {
            format!("{} (continued)", self.options.title)
        };
        let mut page = Page {
            number,
            title: title.clone(),
            size,
            texts: Vec::new(),
            rules: Vec::new(),
        };

        let mut y = size.height - MARGIN;
        page.push_text(printable(&title, usize::MAX), MARGIN, y, TITLE_FONT_SIZE);
        y -= LINE_HEIGHT * 1.5;
        if number == 1 {
            let generated = format!(
                "Generated: {}",
                self.options.generated_at.format("%Y-%m-%d %H:%M")
            );
            page.push_text(generated, MARGIN, y, DATE_FONT_SIZE);
            y -= LINE_HEIGHT * 1.5;
        }
        page.push_text(format!("Page {}", number), MARGIN, MARGIN / 2.0, DATE_FONT_SIZE);
        (page, y)
    }

    fn row(&self, page: &mut Page, row: &[String], y: f32, limit: usize, font_size: f32) {
        let mut x = MARGIN;
        for (value, width) in row.iter().zip(&self.widths) {
            page.push_text(printable(value, limit), x, y, font_size);
            x += width;
        }
    }

    fn header(&self, page: &mut Page, header: &[String], y: f32) -> f32 {
        self.row(page, header, y, HEADER_CHAR_LIMIT, HEADER_FONT_SIZE);
        let rule_y = y - LINE_HEIGHT / 3.0;
        page.rules.push(Rule {
            x1: MARGIN,
            x2: MARGIN + self.widths.iter().sum::<f32>(),
            y: rule_y,
        });
        y - LINE_HEIGHT
    }
}

/// Lays the grid out as a table over as many pages as `rows_per_page`
/// requires. A grid with no visible content yields one page carrying only the
/// "no data" line.
pub fn layout(grid: &Grid, options: &LayoutOptions) -> Vec<Page> {
    let rows_per_page = options.rows_per_page.max(1);
    let cursor = PageCursor {
        options,
        widths: column_widths(grid),
    };

    let blank = grid.iter().flatten().all(|value| value.trim().is_empty());
    let Some((header, body)) = grid.split_first().filter(|_| !blank) else {
        let (mut page, y) = cursor.open(1);
        page.push_text(NO_DATA_TEXT.to_string(), MARGIN, y, NOTICE_FONT_SIZE);
        return vec![page];
    };

    if body.is_empty() {
        let (mut page, y) = cursor.open(1);
        cursor.header(&mut page, header, y);
        return vec![page];
    }

    body.chunks(rows_per_page)
        .enumerate()
        .map(|(index, rows)| {
            let (mut page, y) = cursor.open(index + 1);
            let mut y = cursor.header(&mut page, header, y);
            for row in rows {
                cursor.row(&mut page, row, y, DATA_CHAR_LIMIT, DATA_FONT_SIZE);
                y -= LINE_HEIGHT;
            }
            page
        })
        .collect()
}
