//! MuPDF document backend

use std::path::Path;

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::types::{DocumentBackend, PageBitmap, PageSource, RenderFault};
use crate::reader::PageSize;

#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfBackend;

impl DocumentBackend for MupdfBackend {
    fn open(&mut self, path: &Path) -> Result<Box<dyn PageSource>, RenderFault> {
        let doc = Document::open(path.to_string_lossy().as_ref())?;
        let page_count = doc.page_count()?;
        Ok(Box::new(MupdfDocument {
            doc,
            page_count: usize::try_from(page_count).unwrap_or(0),
        }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load(&self, page: usize) -> Result<mupdf::Page, RenderFault> {
        if page == 0 || page > self.page_count {
            return Err(RenderFault::generic(format!(
                "page {page} is outside 1..={}",
                self.page_count
            )));
        }
        Ok(self.doc.load_page((page - 1) as i32)?)
    }
}

impl PageSource for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, RenderFault> {
        let bounds = self.load(page)?.bounds()?;
        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    fn render(&self, page: usize, scale: f32) -> Result<PageBitmap, RenderFault> {
        let loaded = self.load(page)?;
        let transform = Matrix::new_scale(scale, scale);
        let pixmap = loaded.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;
        let pixels = pixmap_to_rgb(&pixmap)?;
        PageBitmap::from_rgb(page, pixmap.width(), pixmap.height(), scale, pixels)
            .ok_or_else(|| RenderFault::generic("Pixmap buffer size mismatch"))
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderFault::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
