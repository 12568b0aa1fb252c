//! Catalog sources and the degraded-mode loader

use std::thread;

use flume::Receiver;
use log::{info, warn};

use super::{Catalog, CatalogError, Category, Publication};
use crate::fetch::{Fetcher, Location};

/// Something that can produce the publication list
pub trait CatalogSource: Send {
    /// Human-readable origin, used in logs and notices
    fn describe(&self) -> String;

    fn load(&self) -> Result<Catalog, CatalogError>;
}

/// Catalog read from a URL or a local JSON file
pub struct FetchedCatalog {
    location: Location,
    fetcher: Fetcher,
}

impl FetchedCatalog {
    pub fn new(location: Location, fetcher: Fetcher) -> Self {
        Self { location, fetcher }
    }
}

impl CatalogSource for FetchedCatalog {
    fn describe(&self) -> String {
        self.location.describe()
    }

    fn load(&self) -> Result<Catalog, CatalogError> {
        let body = self.fetcher.read_to_string(&self.location)?;
        Catalog::from_json(&self.describe(), &body)
    }
}

/// Fixed in-memory catalog
pub struct FixtureCatalog {
    name: String,
    publications: Vec<Publication>,
}

impl FixtureCatalog {
    pub fn new(name: impl Into<String>, publications: Vec<Publication>) -> Self {
        Self {
            name: name.into(),
            publications,
        }
    }

    /// Sample shown when the real catalog cannot be loaded
    pub fn builtin() -> Self {
        Self::new(
            "built-in sample",
            vec![Publication {
                id: "majalah_muhibbah_no._1_th._ke_xv_1981_reuni_nu".to_string(),
                title: "Majalah MUHIBBAH No. 01/Thn. XV/1981 – Reuni NU".to_string(),
                category: Category::Muhibbah,
                year: 1981,
                pages: Some(40),
                issuu_url: Some(
                    "https://issuu.com/lpmhimmahuii/docs/majalah_muhibbah_no._1_th._ke_xv_1981_reuni_nu"
                        .to_string(),
                ),
                pdf_file: None,
            }],
        )
    }
}

impl CatalogSource for FixtureCatalog {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<Catalog, CatalogError> {
        Catalog::new(self.publications.clone())
    }
}

/// Result of a load, remembering whether the fallback had to be used
#[derive(Debug)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub origin: String,
    /// Set when the primary source failed; holds its error message
    pub degraded: Option<String>,
}

impl LoadedCatalog {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Primary source with an explicit fallback, chosen at construction
pub struct CatalogLoader {
    primary: Box<dyn CatalogSource>,
    fallback: Box<dyn CatalogSource>,
}

impl CatalogLoader {
    pub fn new(primary: Box<dyn CatalogSource>, fallback: Box<dyn CatalogSource>) -> Self {
        Self { primary, fallback }
    }

    /// Loader that falls back to the built-in sample
    pub fn with_builtin_fallback(primary: Box<dyn CatalogSource>) -> Self {
        Self::new(primary, Box::new(FixtureCatalog::builtin()))
    }

    pub fn load(&self) -> LoadedCatalog {
        match self.primary.load() {
            Ok(catalog) => {
                info!(
                    "Loaded {} publications from {}",
                    catalog.len(),
                    self.primary.describe()
                );
                LoadedCatalog {
                    catalog,
                    origin: self.primary.describe(),
                    degraded: None,
                }
            }
            Err(e) => {
                warn!(
                    "Catalog load from {} failed: {e}; using {}",
                    self.primary.describe(),
                    self.fallback.describe()
                );
                let catalog = self.fallback.load().unwrap_or_else(|fallback_err| {
                    warn!("Fallback catalog unusable: {fallback_err}");
                    Catalog::default()
                });
                LoadedCatalog {
                    catalog,
                    origin: self.fallback.describe(),
                    degraded: Some(e.to_string()),
                }
            }
        }
    }
}

/// Load on a background thread; the receiver yields exactly one result
pub fn spawn_load(loader: CatalogLoader) -> Receiver<LoadedCatalog> {
    let (tx, rx) = flume::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(loader.load());
    });
    rx
}
