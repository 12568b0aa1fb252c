//! Downloading Issuu documents page by page and assembling them into PDFs
//!
//! The reader service publishes one JSON file per document listing a JPEG
//! for every page. Pages are fetched with the shared `Fetcher`, normalized
//! to RGB JPEG and written as one image per PDF page.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use log::{info, warn};
use lopdf::{Document, Object, Stream, dictionary};
use serde::Deserialize;

use crate::catalog::{DownloadResults, DownloadedItem, FailedItem, Publication};
use crate::fetch::{FetchError, Fetcher, Location};

pub const DEFAULT_READER_BASE: &str = "https://reader3.isu.pub";
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);
pub const RESULTS_FILENAME: &str = "download_results.json";

const PAGE_JPEG_QUALITY: u8 = 95;
/// Page images are laid out at this resolution
const PAGE_DPI: i64 = 96;
const MAX_STEM_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("not an Issuu document URL: {0}")]
    NotIssuu(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unusable reader data from {url}: {detail}")]
    Reader { url: String, detail: String },

    #[error("no page of {0} could be downloaded")]
    NoPages(String),

    #[error("page image: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot write {path}: {detail}")]
    Pdf { path: PathBuf, detail: String },

    #[error("cannot create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A document addressed as `issuu.com/<user>/docs/<slug>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuuDoc {
    pub user: String,
    pub slug: String,
}

impl IssuuDoc {
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let path = rest.split(['?', '#']).next().unwrap_or(rest);

        // First segment is the host
        let mut segments = path.split('/').filter(|s| !s.is_empty()).skip(1);
        let user = segments.next()?;
        if segments.next()? != "docs" {
            return None;
        }
        let slug = segments.next()?;
        Some(Self {
            user: user.to_string(),
            slug: slug.to_string(),
        })
    }

    pub fn reader_url(&self, reader_base: &str) -> String {
        format!(
            "{}/{}/{}/reader3_4.json",
            reader_base.trim_end_matches('/'),
            self.user,
            self.slug
        )
    }

    /// Slug with path-hostile characters replaced, at most 100 characters
    pub fn pdf_file_name(&self) -> String {
        let stem: String = self
            .slug
            .chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                c => c,
            })
            .take(MAX_STEM_CHARS)
            .collect();
        format!("{stem}.pdf")
    }
}

/// Page image URIs in the reader data come without a scheme
pub fn page_image_url(uri: &str) -> String {
    if uri.starts_with("http") {
        uri.to_string()
    } else {
        format!("https://{uri}")
    }
}

#[derive(Deserialize)]
struct ReaderData {
    status: Option<i64>,
    document: Option<ReaderDocument>,
}

#[derive(Deserialize)]
struct ReaderDocument {
    #[serde(default)]
    pages: Vec<ReaderPage>,
}

#[derive(Deserialize)]
struct ReaderPage {
    #[serde(rename = "imageUri")]
    image_uri: Option<String>,
}

/// Image URI of every page, in order. Pages without one are `None`.
pub fn parse_reader_data(url: &str, json: &str) -> Result<Vec<Option<String>>, DownloadError> {
    let reader_error = |detail: String| DownloadError::Reader {
        url: url.to_string(),
        detail,
    };
    let data: ReaderData = serde_json::from_str(json).map_err(|e| reader_error(e.to_string()))?;
    if data.status != Some(0) {
        return Err(reader_error(format!("status {:?}", data.status)));
    }
    let document = data
        .document
        .ok_or_else(|| reader_error("no document".to_string()))?;
    if document.pages.is_empty() {
        return Err(reader_error("document lists no pages".to_string()));
    }
    Ok(document.pages.into_iter().map(|p| p.image_uri).collect())
}

/// One page re-encoded as RGB JPEG
pub struct PageImage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl PageImage {
    /// Decode any supported image format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DownloadError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        Self::from_rgb(&rgb)
    }

    pub fn from_rgb(rgb: &RgbImage) -> Result<Self, DownloadError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, PAGE_JPEG_QUALITY).encode_image(rgb)?;
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            jpeg,
        })
    }

    fn size_in_points(&self) -> (i64, i64) {
        let points = |px: u32| (i64::from(px) * 72 / PAGE_DPI).max(1);
        (points(self.width), points(self.height))
    }
}

/// Write `pages` as a PDF with one full-page image per page
pub fn write_pdf(pages: Vec<PageImage>, path: &Path) -> Result<(), DownloadError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (width, height) = page.size_in_points();
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(page.width),
                "Height" => i64::from(page.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image);

        let media_box: Vec<Object> = vec![0_i64.into(), 0_i64.into(), width.into(), height.into()];
        let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).map_err(|e| DownloadError::Pdf {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(())
}

/// Fetches documents through the reader service
pub struct Downloader {
    fetcher: Fetcher,
    reader_base: String,
    page_delay: Duration,
}

impl Downloader {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            reader_base: DEFAULT_READER_BASE.to_string(),
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn with_reader_base(mut self, reader_base: impl Into<String>) -> Self {
        self.reader_base = reader_base.into();
        self
    }

    /// Pause between page requests
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Download the document at `url` into `<out_dir>/<slug>.pdf`. Pages that
    /// fail to download or decode are left out.
    pub fn download(&self, url: &str, out_dir: &Path) -> Result<PathBuf, DownloadError> {
        let doc = IssuuDoc::parse(url).ok_or_else(|| DownloadError::NotIssuu(url.to_string()))?;
        let reader_url = doc.reader_url(&self.reader_base);
        info!("Fetching {reader_url}");
        let json = self
            .fetcher
            .read_to_string(&Location::Remote(reader_url.clone()))?;
        let uris = parse_reader_data(&reader_url, &json)?;
        info!("{}: {} pages", doc.slug, uris.len());

        let mut pages = Vec::with_capacity(uris.len());
        for (idx, uri) in uris.iter().enumerate() {
            let number = idx + 1;
            let Some(uri) = uri else {
                warn!("{} page {number} has no image, skipping", doc.slug);
                continue;
            };
            if idx > 0 && !self.page_delay.is_zero() {
                thread::sleep(self.page_delay);
            }
            match self.fetch_page(uri) {
                Ok(page) => pages.push(page),
                Err(e) => warn!("{} page {number}: {e}", doc.slug),
            }
        }
        if pages.is_empty() {
            return Err(DownloadError::NoPages(doc.slug));
        }

        fs::create_dir_all(out_dir).map_err(|source| DownloadError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;
        let path = out_dir.join(doc.pdf_file_name());
        info!("Writing {} pages to {}", pages.len(), path.display());
        write_pdf(pages, &path)?;
        Ok(path)
    }

    fn fetch_page(&self, uri: &str) -> Result<PageImage, DownloadError> {
        let bytes = self
            .fetcher
            .read_bytes(&Location::Remote(page_image_url(uri)))?;
        PageImage::from_bytes(&bytes)
    }
}

/// A document to download and the title recorded for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    pub title: String,
    pub url: String,
}

impl DownloadTarget {
    /// Titled by its slug when given as a bare URL
    pub fn from_url(url: &str) -> Self {
        let title = IssuuDoc::parse(url).map_or_else(|| url.to_string(), |doc| doc.slug);
        Self {
            title,
            url: url.to_string(),
        }
    }

    pub fn from_publication(publication: &Publication) -> Option<Self> {
        publication.issuu_url.as_ref().map(|url| Self {
            title: publication.title.clone(),
            url: url.clone(),
        })
    }
}

/// Download every target in turn, pausing between documents. `report` sees
/// each outcome as it happens.
pub fn download_all(
    downloader: &Downloader,
    targets: &[DownloadTarget],
    out_dir: &Path,
    pause: Duration,
    mut report: impl FnMut(usize, &DownloadTarget, &Result<PathBuf, DownloadError>),
) -> DownloadResults {
    let mut results = DownloadResults::default();
    for (idx, target) in targets.iter().enumerate() {
        if idx > 0 && !pause.is_zero() {
            thread::sleep(pause);
        }
        let outcome = downloader.download(&target.url, out_dir);
        report(idx, target, &outcome);
        match outcome {
            Ok(path) => results.downloaded.push(DownloadedItem {
                title: target.title.clone(),
                path: path.display().to_string(),
            }),
            Err(e) => {
                warn!("Download of {} failed: {e}", target.url);
                results.failed.push(FailedItem {
                    title: target.title.clone(),
                    url: target.url.clone(),
                    reason: Some(e.to_string()),
                });
            }
        }
    }
    info!(
        "Downloaded {} of {} documents",
        results.downloaded.len(),
        targets.len()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;

    use image::{DynamicImage, ImageFormat, Rgb};
    use tempfile::TempDir;

    use crate::catalog::Category;

    /// Serves fixed bodies by path until the test ends
    fn serve(listener: TcpListener, routes: HashMap<String, Vec<u8>>) {
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut request = [0u8; 2048];
                let n = stream.read(&mut request).unwrap_or(0);
                let request = String::from_utf8_lossy(&request[..n]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = match routes.get(&path) {
                    Some(body) => ("200 OK", body.as_slice()),
                    None => ("404 Not Found", &b""[..]),
                };
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            }
        });
    }

    fn jpeg_page(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 180, 150]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageFormat::Jpeg)
            .unwrap();
        bytes.into_inner()
    }

    fn fast_downloader(base: &str) -> Downloader {
        Downloader::new(Fetcher::new(Duration::from_secs(5)))
            .with_reader_base(base)
            .with_page_delay(Duration::ZERO)
    }

    #[test]
    fn parses_document_urls() {
        let doc = IssuuDoc::parse("https://issuu.com/lpmhimmahuii/docs/muhibbah_4_1971").unwrap();
        assert_eq!(doc.user, "lpmhimmahuii");
        assert_eq!(doc.slug, "muhibbah_4_1971");

        let with_query = IssuuDoc::parse("https://issuu.com/lpm/docs/jagad_maal/?ff=true#p2");
        assert_eq!(with_query.map(|d| d.slug).as_deref(), Some("jagad_maal"));

        assert_eq!(IssuuDoc::parse("https://issuu.com/lpmhimmahuii"), None);
        assert_eq!(IssuuDoc::parse("https://issuu.com/lpm/stacks/abc"), None);
        assert_eq!(IssuuDoc::parse("https://issuu.com/lpm/docs/"), None);
    }

    #[test]
    fn reader_url_and_file_name_follow_the_slug() {
        let doc = IssuuDoc {
            user: "lpmhimmahuii".into(),
            slug: "edisi_pesta:2012?".into(),
        };
        assert_eq!(
            doc.reader_url("https://reader3.isu.pub/"),
            "https://reader3.isu.pub/lpmhimmahuii/edisi_pesta:2012?/reader3_4.json"
        );
        assert_eq!(doc.pdf_file_name(), "edisi_pesta_2012_.pdf");

        let long = IssuuDoc {
            user: "u".into(),
            slug: "x".repeat(150),
        };
        assert_eq!(long.pdf_file_name().len(), MAX_STEM_CHARS + ".pdf".len());
    }

    #[test]
    fn page_urls_get_a_scheme() {
        assert_eq!(
            page_image_url("image.isu.pub/abc/jpg/page_1.jpg"),
            "https://image.isu.pub/abc/jpg/page_1.jpg"
        );
        assert_eq!(page_image_url("http://127.0.0.1/p.jpg"), "http://127.0.0.1/p.jpg");
    }

    #[test]
    fn reader_data_requires_status_zero_and_pages() {
        let uris = parse_reader_data(
            "r",
            r#"{"status":0,"document":{"pages":[{"imageUri":"a/1.jpg"},{"width":10}]}}"#,
        )
        .unwrap();
        assert_eq!(uris, [Some("a/1.jpg".to_string()), None]);

        for bad in [
            r#"{"status":1,"document":{"pages":[{"imageUri":"a"}]}}"#,
            r#"{"status":0}"#,
            r#"{"status":0,"document":{"pages":[]}}"#,
            "<html>",
        ] {
            assert!(
                matches!(parse_reader_data("r", bad), Err(DownloadError::Reader { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn pdf_has_one_page_per_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        let pages = vec![
            PageImage::from_rgb(&RgbImage::new(96, 192)).unwrap(),
            PageImage::from_rgb(&RgbImage::new(192, 96)).unwrap(),
        ];
        write_pdf(pages, &path).unwrap();

        let written = fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF-1.5"));
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn downloads_pages_and_records_results() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let reader_json = format!(
            r#"{{"status":0,"document":{{"pages":[
                {{"imageUri":"{base}/p1.jpg"}},
                {{"imageUri":"{base}/broken.jpg"}},
                {{"imageUri":"{base}/p3.jpg"}}
            ]}}}}"#
        );
        let routes = HashMap::from([
            (
                "/lpmhimmahuii/kobar_133/reader3_4.json".to_string(),
                reader_json.into_bytes(),
            ),
            ("/p1.jpg".to_string(), jpeg_page(40, 60)),
            ("/broken.jpg".to_string(), b"not an image".to_vec()),
            ("/p3.jpg".to_string(), jpeg_page(40, 60)),
        ]);
        serve(listener, routes);

        let out = TempDir::new().unwrap();
        let targets = [
            DownloadTarget::from_publication(&Publication {
                id: "kobar_133".into(),
                title: "Buletin KOBARKobari Edisi 133".into(),
                category: Category::Kobarkobari,
                year: 2008,
                pages: None,
                issuu_url: Some("https://issuu.com/lpmhimmahuii/docs/kobar_133".into()),
                pdf_file: None,
            })
            .unwrap(),
            DownloadTarget::from_url("https://issuu.com/lpmhimmahuii/docs/missing"),
            DownloadTarget::from_url("https://example.org/not-issuu"),
        ];

        let mut seen = Vec::new();
        let results = download_all(
            &fast_downloader(&base),
            &targets,
            out.path(),
            Duration::ZERO,
            |idx, _, outcome| seen.push((idx, outcome.is_ok())),
        );

        assert_eq!(seen, [(0, true), (1, false), (2, false)]);
        let pdf = out.path().join("kobar_133.pdf");
        assert_eq!(
            results.downloaded,
            [DownloadedItem {
                title: "Buletin KOBARKobari Edisi 133".into(),
                path: pdf.display().to_string(),
            }]
        );
        // The undecodable page is left out
        assert_eq!(Document::load(&pdf).unwrap().get_pages().len(), 2);

        let failed: Vec<&str> = results.failed.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(failed, ["missing", "https://example.org/not-issuu"]);
        assert!(results.failed[1].reason.as_deref().unwrap().contains("not an Issuu"));

        // Written file is what `arsip sync` reads back
        let reread = DownloadResults::from_json(&results.to_json().unwrap()).unwrap();
        assert_eq!(reread, results);
    }
}
