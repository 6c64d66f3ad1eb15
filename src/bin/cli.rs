#![cfg(not(tarpaulin_include))]

use clap::{Parser, ValueEnum};
use log::info;
use sheetgrid::downloader::{export_pdf, to_csv};
use sheetgrid::layout::{DEFAULT_ROWS_PER_PAGE, LayoutOptions, PageSize};
use sheetgrid::saving::{read_csv, read_xlsx};
use sheetgrid::{GridError, project};
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Paper {
    A4,
    Letter,
}

/// Flatten a spreadsheet and print or export its grid.
#[derive(Parser, Debug)]
#[command(name = "sheetgrid-cli")]
struct Args {
    /// .xlsx or .csv file to read
    input: PathBuf,

    /// Write the grid as a PDF table
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Write the grid as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_ROWS_PER_PAGE)]
    rows_per_page: usize,

    #[arg(long, value_enum, default_value_t = Paper::A4)]
    paper: Paper,

    /// Lay the PDF out on landscape pages
    #[arg(long)]
    landscape: bool,

    /// PDF title; defaults to the worksheet name
    #[arg(long)]
    title: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let extension = args
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    let sheet = match extension.as_deref() {
        Some("xlsx") => read_xlsx(&args.input)?,
        Some("csv") => read_csv(&args.input)?,
        _ => {
            return Err(GridError::Format(format!(
                "{} is not an .xlsx or .csv file",
                args.input.display()
            ))
            .into());
        }
    };
    let payload = project(&sheet);

    if let Some(path) = &args.pdf {
        let page_size = match args.paper {
            Paper::A4 => PageSize::A4,
            Paper::Letter => PageSize::LETTER,
        };
        let options = LayoutOptions {
            page_size: if args.landscape {
                page_size.landscape()
            } else {
                page_size
            },
            rows_per_page: args.rows_per_page,
            title: args.title.clone().unwrap_or_else(|| sheet.name.clone()),
            ..LayoutOptions::default()
        };
        fs::write(path, export_pdf(&payload.data, &options)?)?;
        info!("wrote {}", path.display());
    }
    if let Some(path) = &args.csv {
        fs::write(path, to_csv(&payload.data)?)?;
        info!("wrote {}", path.display());
    }
    if args.pdf.is_none() && args.csv.is_none() {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}
