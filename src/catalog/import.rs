//! Building `publications.json` from a downloader's results file

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Catalog, CatalogError, Category, Publication};

const FALLBACK_YEAR: i32 = 2000;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})").expect("year pattern is valid"));

/// `download_results.json` as written by `arsip download`
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResults {
    #[serde(default)]
    pub downloaded: Vec<DownloadedItem>,
    #[serde(default)]
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedItem {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DownloadedItem {
    fn file_name(&self) -> Option<&str> {
        Path::new(&self.path).file_name().and_then(|n| n.to_str())
    }

    fn stem(&self) -> Option<&str> {
        Path::new(&self.path).file_stem().and_then(|n| n.to_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("malformed download results: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("download entry `{0}` has no usable file name")]
    NoFileName(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DownloadResults {
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ImportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Guess category and year from an issue title
pub fn classify_title(title: &str) -> (Category, i32) {
    let category = if title.to_uppercase().contains("MUHIBBAH") {
        Category::Muhibbah
    } else if title.contains("KOBAR") {
        Category::Kobarkobari
    } else {
        Category::Himmah
    };

    let year = YEAR_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(FALLBACK_YEAR);

    (category, year)
}

/// Build a fresh catalog from downloaded files, newest year first, then title
pub fn rebuild_from_downloads(
    results: &DownloadResults,
    issuu_profile: &str,
) -> Result<Vec<Publication>, ImportError> {
    let profile = issuu_profile.trim_end_matches('/');
    let mut publications = Vec::with_capacity(results.downloaded.len());

    for item in &results.downloaded {
        let (Some(id), Some(file_name)) = (item.stem(), item.file_name()) else {
            return Err(ImportError::NoFileName(item.path.clone()));
        };
        let (category, year) = classify_title(&item.title);
        debug!("{id}: {category} {year}");

        publications.push(Publication {
            id: id.to_string(),
            title: item.title.clone(),
            category,
            year,
            pages: None,
            issuu_url: Some(format!("{profile}/{id}")),
            pdf_file: Some(format!("./pdfs/{file_name}")),
        });
    }

    publications.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.title.cmp(&b.title)));

    // Reject duplicate ids the same way a loaded catalog would.
    Catalog::new(publications.clone())?;
    info!("Rebuilt {} publications from download results", publications.len());
    Ok(publications)
}

/// Point existing publications at their downloaded files, matching by exact
/// title. Returns how many entries were updated.
pub fn attach_local_files(publications: &mut [Publication], results: &DownloadResults) -> usize {
    let by_title: HashMap<&str, &DownloadedItem> = results
        .downloaded
        .iter()
        .map(|item| (item.title.as_str(), item))
        .collect();

    let mut updated = 0;
    for publication in publications.iter_mut() {
        let Some(file_name) = by_title
            .get(publication.title.as_str())
            .and_then(|item| item.file_name())
        else {
            debug!("Not found in downloads: {}", publication.title);
            continue;
        };
        publication.pdf_file = Some(format!("./pdfs/{file_name}"));
        updated += 1;
    }
    updated
}
