/*!
# Spreadsheet Grid Editor

A browser-based editor for uploaded spreadsheets with PDF export, built in Rust.

## Overview

A user uploads an `.xlsx` or `.csv` file, edits it in a browser grid, saves the
edits back into the file and exports the current data as a paginated PDF table.
The interesting part is the grid engine in the middle: the browser only ever
sees a rectangle of plain strings, while the file keeps its own cell model with
formulas, rich text and merged ranges.

## Architecture

### Grid engine
- **Cell Value Extractor** (`cell`) - one native cell to one display string
- **Grid Flattener** (`grid::flatten`) - worksheet to dense grid, merges filled
  down, blank rows dropped
- **Grid Reconciler** (`grid::reconcile`) - edited grid back into worksheet rows
  and merges, replacing prior content
- **Table Layout** (`layout`) - grid to pages of positioned text runs

### Collaborators
- **Persistence** (`saving`) - documents addressed by `DocumentId`, xlsx read
  with calamine and written with rust_xlsxwriter, csv through the csv crate
- **PDF Canvas** (`downloader`) - printpdf-backed drawing surface, plus CSV and
  XLSX downloads
- **HTTP** (`app`, `web` feature) - axum routes for upload, data, save and export

## Data flow

upload -> store -> flatten -> JSON grid -> browser edits -> reconcile -> store;
export: store -> flatten -> layout -> canvas -> PDF bytes.

## REST API Endpoints

- `POST /upload` - multipart field `file`, answers `{status, id}`
- `GET /data/{id}` - `{data, mergedCells}`
- `POST /save/{id}` - body `{data, mergedCells?}`
- `GET /export/{id}` - PDF attachment
- `GET /download/{id}?format=csv|xlsx` - grid download
*/

pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod grid;
pub mod layout;
pub mod saving;
pub mod spreadsheet;

#[cfg(feature = "web")]
pub mod app;

pub use cell::*;
pub use error::*;
pub use grid::*;
pub use layout::*;
pub use saving::*;
pub use spreadsheet::*;
