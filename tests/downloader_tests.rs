use chrono::Local;
use sheetgrid::downloader::{PdfCanvas, PrintPdfCanvas, export_pdf, render, to_csv, to_xlsx};
use sheetgrid::error::{DrawError, Result};
use sheetgrid::grid::flatten;
use sheetgrid::layout::{LayoutOptions, PageSize, Rule, TextInstruction, layout, Page};
use sheetgrid::saving::read_xlsx;
use sheetgrid::spreadsheet::MergeRange;
use std::fs;
use tempfile::tempdir;

/// Records draw calls and refuses any text containing "boom".
#[derive(Default)]
struct RecordingCanvas {
    pages: Vec<(f32, f32)>,
    drawn: Vec<(usize, String)>,
    rules: usize,
}

impl PdfCanvas for RecordingCanvas {
    type Page = usize;

    fn new_page(&mut self, width: f32, height: f32) -> Result<usize> {
        self.pages.push((width, height));
        Ok(self.pages.len() - 1)
    }

    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        _x: f32,
        _y: f32,
        _size: f32,
    ) -> std::result::Result<(), DrawError> {
        if text.contains("boom") {
            return Err(DrawError {
                text: text.to_string(),
                reason: "unsupported".to_string(),
            });
        }
        self.drawn.push((page, text.to_string()));
        Ok(())
    }

    fn draw_rule(&mut self, _page: usize, _rule: &Rule) -> std::result::Result<(), DrawError> {
        self.rules += 1;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (page, text) in &self.drawn {
            out.extend_from_slice(format!("{}:{}\n", page, text).as_bytes());
        }
        Ok(out)
    }
}

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

#[test]
fn draw_errors_are_skipped_not_fatal() {
    let page = Page {
        number: 1,
        title: "t".to_string(),
        size: PageSize::LETTER,
        texts: ["before", "boom", "after"]
            .iter()
            .map(|t| TextInstruction {
                text: t.to_string(),
                x: 10.0,
                y: 10.0,
                font_size: 9.0,
            })
            .collect(),
        rules: vec![Rule {
            x1: 0.0,
            x2: 10.0,
            y: 5.0,
        }],
    };
    let out = render(RecordingCanvas::default(), &[page]).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "0:before\n0:after\n");
}

#[test]
fn renderer_opens_one_canvas_page_per_layout_page() {
    let mut rows = vec![vec!["h".to_string()]];
    rows.extend((0..25).map(|i| vec![format!("r{}", i)]));
    let options = LayoutOptions {
        rows_per_page: 10,
        ..LayoutOptions::default()
    };
    let pages = layout(&rows, &options);

    struct Counting(RecordingCanvas, std::rc::Rc<std::cell::Cell<usize>>);
    impl PdfCanvas for Counting {
        type Page = usize;
        fn new_page(&mut self, w: f32, h: f32) -> Result<usize> {
            self.1.set(self.1.get() + 1);
            self.0.new_page(w, h)
        }
        fn draw_text(
            &mut self,
            page: usize,
            text: &str,
            x: f32,
            y: f32,
            size: f32,
        ) -> std::result::Result<(), DrawError> {
            self.0.draw_text(page, text, x, y, size)
        }
        fn draw_rule(&mut self, page: usize, rule: &Rule) -> std::result::Result<(), DrawError> {
            self.0.draw_rule(page, rule)
        }
        fn finish(self) -> Result<Vec<u8>> {
            self.0.finish()
        }
    }

    let opened = std::rc::Rc::new(std::cell::Cell::new(0));
    render(Counting(RecordingCanvas::default(), opened.clone()), &pages).unwrap();
    assert_eq!(opened.get(), 3);
}

#[test]
fn printpdf_canvas_rejects_non_ascii() {
    let mut canvas = PrintPdfCanvas::new("test");
    let page = canvas.new_page(PageSize::A4.width, PageSize::A4.height).unwrap();
    assert!(canvas.draw_text(page, "plain", 40.0, 40.0, 9.0).is_ok());
    assert!(canvas.draw_text(page, "snow ☃", 40.0, 60.0, 9.0).is_err());
    assert!(canvas.draw_text(page + 1, "plain", 40.0, 40.0, 9.0).is_err());
}

#[test]
fn export_pdf_produces_a_pdf_document() {
    let mut rows = grid(&[&["Name", "Score"]]);
    rows.extend((0..61).map(|i| vec![format!("player {}", i), (i * 3).to_string()]));
    let options = LayoutOptions {
        page_size: PageSize::A4,
        rows_per_page: 30,
        title: "Scores".to_string(),
        generated_at: Local::now(),
    };
    let bytes = export_pdf(&rows, &options).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn export_pdf_handles_empty_grid() {
    let bytes = export_pdf(&Vec::new(), &LayoutOptions::default()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn csv_export_quotes_when_needed() {
    let csv = to_csv(&grid(&[&["a", "b,c"], &["say \"hi\"", ""]])).unwrap();
    assert_eq!(csv, "a,\"b,c\"\n\"say \"\"hi\"\"\",\n");
}

#[test]
fn xlsx_export_reads_back() {
    let data = grid(&[&["Team", "Team", "Pts"], &["Red", "Blue", "3"]]);
    let bytes = to_xlsx(&data, &[MergeRange::new(1, 1, 1, 2).unwrap()]).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("export.xlsx");
    fs::write(&path, bytes).unwrap();

    let sheet = read_xlsx(&path).unwrap();
    assert_eq!(sheet.merges().len(), 1);
    assert_eq!(flatten(&sheet), data);
}
