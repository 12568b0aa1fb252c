//! Cover thumbnails: page 1 of every PDF in a directory, saved as JPEG

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use log::{info, warn};
use walkdir::WalkDir;

use crate::pdf::{DocumentBackend, RenderFault};

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 400;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Clone, Copy, Debug)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub quality: u8,
    /// Regenerate thumbnails that already exist
    pub overwrite: bool,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_THUMBNAIL_WIDTH,
            quality: DEFAULT_JPEG_QUALITY,
            overwrite: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderFault),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("document has no pages")]
    NoPages,
}

#[derive(Debug, Default)]
pub struct ThumbnailReport {
    pub generated: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Thumbnail path for a document: `<out_dir>/<stem>.jpg`
pub fn thumbnail_path(pdf: &Path, out_dir: &Path) -> Option<PathBuf> {
    let stem = pdf.file_stem()?;
    Some(out_dir.join(format!("{}.jpg", stem.to_string_lossy())))
}

/// PDFs directly inside `dir`, sorted by name
pub fn find_documents(dir: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    documents.sort();
    documents
}

pub fn generate_thumbnails(
    backend: &mut dyn DocumentBackend,
    pdf_dir: &Path,
    out_dir: &Path,
    options: &ThumbnailOptions,
) -> Result<ThumbnailReport, ThumbnailError> {
    fs::create_dir_all(out_dir).map_err(|source| ThumbnailError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut report = ThumbnailReport::default();
    for pdf in find_documents(pdf_dir) {
        let Some(target) = thumbnail_path(&pdf, out_dir) else {
            continue;
        };
        if target.exists() && !options.overwrite {
            report.skipped.push(target);
            continue;
        }
        match render_thumbnail(backend, &pdf, &target, options) {
            Ok(()) => {
                info!("Thumbnail {} -> {}", pdf.display(), target.display());
                report.generated.push(target);
            }
            Err(e) => {
                warn!("Thumbnail for {} failed: {e}", pdf.display());
                report.failed.push((pdf, e.to_string()));
            }
        }
    }
    Ok(report)
}

/// Render page 1 of `pdf` at `options.width` pixels wide into `target`
pub fn render_thumbnail(
    backend: &mut dyn DocumentBackend,
    pdf: &Path,
    target: &Path,
    options: &ThumbnailOptions,
) -> Result<(), ThumbnailError> {
    let document = backend.open(pdf)?;
    if document.page_count() == 0 {
        return Err(ThumbnailError::NoPages);
    }
    let size = document.page_size(1)?;
    if size.width <= 0.0 {
        return Err(RenderFault::generic("page has no width").into());
    }

    let bitmap = document.render(1, options.width as f32 / size.width)?;
    let image = RgbImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels)
        .ok_or_else(|| RenderFault::generic("rendered buffer does not match its size"))?;

    let file = File::create(target).map_err(|source| ThumbnailError::Io {
        path: target.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, options.quality).encode_image(&image)?;
    Ok(())
}
