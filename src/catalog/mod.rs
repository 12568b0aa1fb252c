//! Publication catalog: records, filtering and search

mod import;
mod source;

pub use import::{
    DownloadResults, DownloadedItem, FailedItem, ImportError, attach_local_files,
    rebuild_from_downloads,
};
pub use source::{
    CatalogLoader, CatalogSource, FetchedCatalog, FixtureCatalog, LoadedCatalog, spawn_load,
};

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Magazine line a publication belongs to. Names outside the three known
/// lines are kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Muhibbah,
    Himmah,
    Kobarkobari,
    Other(String),
}

impl Category {
    /// Categories offered in the filter bar, in display order
    pub const FILTERABLE: [Category; 3] =
        [Category::Muhibbah, Category::Himmah, Category::Kobarkobari];

    /// Name as it appears in the data file
    pub fn as_str(&self) -> &str {
        match self {
            Category::Muhibbah => "muhibbah",
            Category::Himmah => "himmah",
            Category::Kobarkobari => "kobarkobari",
            Category::Other(name) => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Muhibbah => "MUHIBBAH",
            Category::Himmah => "HIMMAH",
            Category::Kobarkobari => "KOBARKobari",
            Category::Other(name) => name,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Muhibbah => "📖",
            Category::Himmah => "📰",
            Category::Kobarkobari => "📋",
            Category::Other(_) => "📄",
        }
    }

    /// Known names match case-insensitively; anything else non-empty is
    /// taken as an `Other` name
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Category::from(name.to_string()))
        }
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        match name.to_lowercase().as_str() {
            "muhibbah" => Category::Muhibbah,
            "himmah" => Category::Himmah,
            "kobarkobari" => Category::Kobarkobari,
            _ => Category::Other(name),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scanned magazine issue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuu_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_file: Option<String>,
}

impl Publication {
    fn matches_query(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.year.to_string().contains(query_lower)
            || self.category.as_str().to_lowercase().contains(query_lower)
    }
}

/// Category selection in the filter bar
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn admits(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Only(category) => category.label(),
        }
    }

    /// Tabs shown in the filter bar, "All" first
    pub fn tabs() -> Vec<CategoryFilter> {
        std::iter::once(CategoryFilter::All)
            .chain(Category::FILTERABLE.iter().cloned().map(CategoryFilter::Only))
            .collect()
    }

    /// Next tab in the filter bar, wrapping around
    pub fn next(&self) -> CategoryFilter {
        let tabs = Self::tabs();
        let idx = tabs.iter().position(|t| t == self).unwrap_or(0);
        tabs[(idx + 1) % tabs.len()].clone()
    }

    pub fn parse(name: &str) -> Option<Self> {
        if name.trim().eq_ignore_ascii_case("all") {
            Some(CategoryFilter::All)
        } else {
            Category::parse(name).map(CategoryFilter::Only)
        }
    }
}

/// Current filter bar and search box contents
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub category: CategoryFilter,
    pub query: String,
}

impl FilterState {
    pub fn new(category: CategoryFilter, query: impl Into<String>) -> Self {
        Self {
            category,
            query: query.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] crate::fetch::FetchError),

    #[error("malformed catalog from {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate publication id `{0}`")]
    DuplicateId(String),
}

/// Immutable in-memory list of publications
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    publications: Vec<Publication>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids
    pub fn new(publications: Vec<Publication>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(publications.len());
        for publication in &publications {
            if !seen.insert(publication.id.as_str()) {
                return Err(CatalogError::DuplicateId(publication.id.clone()));
            }
        }
        Ok(Self { publications })
    }

    pub fn from_json(origin: &str, json: &str) -> Result<Self, CatalogError> {
        let publications: Vec<Publication> =
            serde_json::from_str(json).map_err(|source| CatalogError::Malformed {
                origin: origin.to_string(),
                source,
            })?;
        Self::new(publications)
    }

    pub fn len(&self) -> usize {
        self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Publication> {
        self.publications.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Publication> {
        self.publications.iter()
    }

    /// Publications passing the category and query filters, newest year first.
    /// Equal years are ordered by id.
    pub fn filter(&self, category: &CategoryFilter, query: &str) -> Vec<&Publication> {
        let query_lower = query.trim().to_lowercase();

        let mut matches: Vec<&Publication> = self
            .publications
            .iter()
            .filter(|p| category.admits(&p.category))
            .filter(|p| query_lower.is_empty() || p.matches_query(&query_lower))
            .collect();

        matches.sort_by(|a, b| {
            Reverse(a.year)
                .cmp(&Reverse(b.year))
                .then_with(|| a.id.cmp(&b.id))
        });
        matches
    }

    pub fn apply(&self, filter: &FilterState) -> Vec<&Publication> {
        self.filter(&filter.category, &filter.query)
    }
}
