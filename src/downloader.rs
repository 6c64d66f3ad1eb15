use crate::error::{DrawError, GridError, Result};
use crate::grid::{Grid, reconcile, rows_from_grid};
use crate::layout::{LayoutOptions, Page, Rule, layout};
use crate::saving::{csv_bytes, write_xlsx};
use crate::spreadsheet::{MergeRange, Worksheet};
use log::{info, warn};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

/// Drawing surface that turns laid-out pages into document bytes.
///
/// Coordinates are PDF points from the bottom-left corner.
pub trait PdfCanvas {
    type Page: Copy;

    fn new_page(&mut self, width: f32, height: f32) -> Result<Self::Page>;

    fn draw_text(
        &mut self,
        page: Self::Page,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
    ) -> std::result::Result<(), DrawError>;

    fn draw_rule(&mut self, page: Self::Page, rule: &Rule) -> std::result::Result<(), DrawError>;

    fn finish(self) -> Result<Vec<u8>>;
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

struct OpenDocument {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
}

/// [`PdfCanvas`] backed by printpdf and the built-in Helvetica face.
pub struct PrintPdfCanvas {
    title: String,
    document: Option<OpenDocument>,
    layers: Vec<PdfLayerReference>,
}

impl PrintPdfCanvas {
    pub fn new(title: impl Into<String>) -> Self {
        PrintPdfCanvas {
            title: title.into(),
            document: None,
            layers: Vec::new(),
        }
    }

    fn layer(&self, page: usize, text: &str) -> std::result::Result<&PdfLayerReference, DrawError> {
        self.layers.get(page).ok_or_else(|| DrawError {
            text: text.to_string(),
            reason: format!("page {} was never opened", page + 1),
        })
    }
}

impl PdfCanvas for PrintPdfCanvas {
    type Page = usize;

    fn new_page(&mut self, width: f32, height: f32) -> Result<usize> {
        let layer = match &self.document {
            Some(open) => {
                let (page, layer) = open.doc.add_page(mm(width), mm(height), "Layer 1");
                open.doc.get_page(page).get_layer(layer)
            }
            None => {
                let (doc, page, layer) =
                    PdfDocument::new(&self.title, mm(width), mm(height), "Layer 1");
                let font = doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| GridError::Export(e.to_string()))?;
                let layer = doc.get_page(page).get_layer(layer);
                self.document = Some(OpenDocument { doc, font });
                layer
            }
        };
        self.layers.push(layer);
        Ok(self.layers.len() - 1)
    }

    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
    ) -> std::result::Result<(), DrawError> {
        // Built-in fonts only carry the WinAnsi glyph set.
        if let Some(bad) = text.chars().find(|c| !(' '..='~').contains(c)) {
            return Err(DrawError {
                text: text.to_string(),
                reason: format!("no glyph for {:?}", bad),
            });
        }
        let layer = self.layer(page, text)?;
        let Some(open) = &self.document else {
            return Err(DrawError {
                text: text.to_string(),
                reason: "document is not open".to_string(),
            });
        };
        layer.use_text(text, size, mm(x), mm(y), &open.font);
        Ok(())
    }

    fn draw_rule(&mut self, page: usize, rule: &Rule) -> std::result::Result<(), DrawError> {
        let layer = self.layer(page, "")?;
        layer.set_outline_thickness(0.5);
        layer.add_line(Line {
            points: vec![
                (Point::new(mm(rule.x1), mm(rule.y)), false),
                (Point::new(mm(rule.x2), mm(rule.y)), false),
            ],
            is_closed: false,
        });
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let open = self
            .document
            .ok_or_else(|| GridError::Export("document has no pages".to_string()))?;
        open.doc
            .save_to_bytes()
            .map_err(|e| GridError::Export(e.to_string()))
    }
}

/// Draws every page onto `canvas`. A text run the canvas rejects is logged
/// and skipped; the rest of the document is still produced.
pub fn render<C: PdfCanvas>(mut canvas: C, pages: &[Page]) -> Result<Vec<u8>> {
    let mut skipped = 0usize;
    for page in pages {
        let handle = canvas.new_page(page.size.width, page.size.height)?;
        for text in &page.texts {
            if let Err(e) = canvas.draw_text(handle, &text.text, text.x, text.y, text.font_size) {
                warn!("page {}: {}", page.number, e);
                skipped += 1;
            }
        }
        for rule in &page.rules {
            if let Err(e) = canvas.draw_rule(handle, rule) {
                warn!("page {}: {}", page.number, e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("{} draw calls skipped", skipped);
    }
    canvas.finish()
}

/// Lays out `grid` and renders it to PDF bytes.
pub fn export_pdf(grid: &Grid, options: &LayoutOptions) -> Result<Vec<u8>> {
    let pages = layout(grid, options);
    let bytes = render(PrintPdfCanvas::new(options.title.as_str()), &pages)?;
    info!(
        "exported '{}': {} rows over {} pages, {} bytes",
        options.title,
        grid.len(),
        pages.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Grid as CSV text.
pub fn to_csv(grid: &Grid) -> Result<String> {
    let bytes = csv_bytes(grid)?;
    String::from_utf8(bytes).map_err(|e| GridError::Export(e.to_string()))
}

/// Grid as an xlsx workbook, with `merges` applied.
pub fn to_xlsx(grid: &Grid, merges: &[MergeRange]) -> Result<Vec<u8>> {
    let mut sheet = Worksheet::default();
    reconcile(&mut sheet, rows_from_grid(grid), Some(merges))?;
    write_xlsx(&sheet)
}
