//! Core types for page rendering

use std::path::Path;

use crate::fetch::FetchError;
use crate::reader::PageSize;

/// Paper color multiplied into every rendered page
pub const PAPER_TINT: [u8; 3] = [250, 248, 245];
/// Strength of the paper tint
pub const PAPER_TINT_STRENGTH: f32 = 0.03;

/// Rendered page as packed RGB pixels (3 bytes per pixel)
#[derive(Clone, PartialEq)]
pub struct PageBitmap {
    /// Page number (1-indexed)
    pub page: usize,
    pub width: u32,
    pub height: u32,
    /// Scale the page was rasterized at, in pixels per point
    pub scale: f32,
    pub pixels: Vec<u8>,
}

impl PageBitmap {
    /// Returns `None` when `pixels` does not hold `width * height` RGB pixels
    pub fn from_rgb(page: usize, width: u32, height: u32, scale: f32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            page,
            width,
            height,
            scale,
            pixels,
        })
    }

    /// White page of the given size
    pub fn blank(page: usize, width: u32, height: u32) -> Self {
        Self::solid(page, width, height, [255, 255, 255])
    }

    pub fn solid(page: usize, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            page,
            width,
            height,
            scale: 1.0,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    /// Multiply the page with a faint paper color
    pub fn apply_paper_tint(&mut self) {
        let factors = PAPER_TINT.map(|c| 1.0 - PAPER_TINT_STRENGTH + PAPER_TINT_STRENGTH * f32::from(c) / 255.0);
        for px in self.pixels.chunks_exact_mut(3) {
            for (channel, factor) in px.iter_mut().zip(factors) {
                *channel = (f32::from(*channel) * factor) as u8;
            }
        }
    }
}

impl std::fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBitmap")
            .field("page", &self.page)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Errors from the rendering backend and the render worker
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Opens documents for the render worker
pub trait DocumentBackend: Send {
    fn open(&mut self, path: &Path) -> Result<Box<dyn PageSource>, RenderFault>;
}

/// An open document. Pages are 1-indexed.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, RenderFault>;

    /// Rasterize `page` at `scale` pixels per point
    fn render(&self, page: usize, scale: f32) -> Result<PageBitmap, RenderFault>;
}
