//! # PDF Rendering
//!
//! A4 portrait, built-in Helvetica. Coordinates are millimetres from the
//! bottom-left corner, so `y` counts down as rows are written.
//!
//! Built-in fonts have no euro sign; amounts are written `12,50 EUR`.

use std::fs;
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use tracing::{debug, info};

use panier_core::Money;

use crate::error::{ExportError, ExportResult};
use crate::snapshot::ListSnapshot;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 20.0;
const RIGHT: f32 = 190.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 25.0;
const ROW_HEIGHT: f32 = 7.0;

// Column x positions: Produit, Prix unitaire, Quantité, Total
const COLUMNS: [f32; 4] = [LEFT, 105.0, 140.0, 165.0];
const MAX_NAME_CHARS: usize = 45;

/// Renders a snapshot to PDF bytes.
///
/// ## Returns
/// * `Err(EmptyList)` - the snapshot has no lines
pub fn render(snapshot: &ListSnapshot) -> ExportResult<Vec<u8>> {
    if snapshot.lines.is_empty() {
        return Err(ExportError::EmptyList);
    }

    let (doc, page, layer) = PdfDocument::new(
        "Liste de courses",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );

    {
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let mut page = PageWriter {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: TOP,
            font,
            bold,
            pages: 1,
        };

        page.text("Liste de courses", 20.0, 78.0, true);
        page.y -= 15.0;
        page.text(&format!("Magasin: {}", snapshot.store_name), 12.0, LEFT, false);
        page.y -= 7.0;
        page.text(
            &format!("Date: {}", snapshot.date.format("%d/%m/%Y")),
            12.0,
            LEFT,
            false,
        );
        page.y -= 13.0;
        page.table_header();

        for line in &snapshot.lines {
            page.ensure_room();
            page.row([
                truncate(&line.name),
                euros(line.unit_price),
                line.quantity.to_string(),
                euros(line.total()),
            ]);
        }

        page.ensure_room();
        page.rule(130.0);
        page.y -= 8.0;
        page.text(
            &format!("Total: {}", euros(snapshot.total())),
            12.0,
            135.0,
            true,
        );

        debug!(
            lines = snapshot.lines.len(),
            pages = page.pages,
            "Shopping list rendered"
        );
    }

    Ok(doc.save_to_bytes()?)
}

/// Renders a snapshot and writes it into `dir` under its file name.
///
/// The directory is created if missing. Returns the written path.
pub fn write_to_dir(snapshot: &ListSnapshot, dir: &Path) -> ExportResult<PathBuf> {
    let bytes = render(snapshot)?;

    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot.file_name());
    fs::write(&path, bytes)?;

    info!(path = %path.display(), "Shopping list exported");
    Ok(path)
}

// =============================================================================
// Page Writer
// =============================================================================

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    pages: usize,
}

impl PageWriter<'_> {
    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn rule(&self, from_x: f32) {
        let line = Line {
            points: vec![
                (Point::new(Mm(from_x), Mm(self.y)), false),
                (Point::new(Mm(RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn table_header(&mut self) {
        for (title, x) in ["Produit", "Prix unitaire", "Quantité", "Total"]
            .iter()
            .zip(COLUMNS)
        {
            self.text(title, 10.0, x, true);
        }
        self.y -= 3.0;
        self.rule(LEFT);
        self.y -= ROW_HEIGHT;
    }

    fn row(&mut self, cells: [String; 4]) {
        for (cell, x) in cells.iter().zip(COLUMNS) {
            self.text(cell, 10.0, x, false);
        }
        self.y -= ROW_HEIGHT;
    }

    /// Starts a new page (with the table header) when the next row would
    /// run into the bottom margin.
    fn ensure_room(&mut self) {
        if self.y >= BOTTOM {
            return;
        }

        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages + 1));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
        self.y = TOP;
        self.table_header();
    }
}

fn euros(amount: Money) -> String {
    format!("{} EUR", amount.format_amount())
}

fn truncate(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }
    let mut short: String = name.chars().take(MAX_NAME_CHARS - 3).collect();
    short.push_str("...");
    short
}

// =============================================================================
// Unit Tests
// =============================================================================
