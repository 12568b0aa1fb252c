use std::fs::{self, File};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, WriteLogger};

use arsip::app::{App, run_app_with_event_source};
use arsip::catalog::{
    Catalog, CatalogLoader, CategoryFilter, DownloadResults, FetchedCatalog, Publication,
    attach_local_files, rebuild_from_downloads,
};
use arsip::download::{DownloadTarget, Downloader, RESULTS_FILENAME, download_all};
use arsip::event_source::TerminalEventSource;
use arsip::fetch::{Fetcher, Location, write_file};
use arsip::link_opener::SystemLinkOpener;
use arsip::panic_handler;
use arsip::paths::resolve_log_path;
use arsip::pdf::default_backend;
use arsip::settings::{Settings, load_settings};
use arsip::thumbnails::{ThumbnailOptions, generate_thumbnails};

#[derive(Parser)]
#[command(name = "arsip", version, about = "Browse and read a scanned magazine archive")]
struct Cli {
    /// Config file (default: <config dir>/arsip/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog URL or path, overriding the config
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Directory relative asset paths resolve against
    #[arg(long, global = true)]
    asset_root: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Network timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Browse the archive in the terminal (default)
    Browse,

    /// Print the filtered catalog
    List {
        /// all, muhibbah, himmah, kobarkobari or any other category name
        #[arg(long, default_value = "all")]
        category: String,

        /// Matches title, year or category
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Download Issuu documents as PDFs and record the outcome for `sync`
    Download {
        /// Issuu document URLs (default: every catalog entry with an Issuu link)
        urls: Vec<String>,

        #[arg(long, default_value = "pdfs")]
        out_dir: PathBuf,

        /// Results file (default: <out-dir>/download_results.json)
        #[arg(long)]
        results: Option<PathBuf>,
    },

    /// Build publications.json from a download results file
    Sync {
        #[arg(long, default_value = "pdfs/download_results.json")]
        results: PathBuf,

        /// Catalog file to write (default: the configured catalog path)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Only point existing entries at downloaded files, matched by title
        #[arg(long)]
        merge: bool,
    },

    /// Render a JPEG cover for every PDF in a directory
    Thumbnails {
        #[arg(long, default_value = "pdfs")]
        pdf_dir: PathBuf,

        #[arg(long, default_value = "thumbnails")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = arsip::thumbnails::DEFAULT_THUMBNAIL_WIDTH)]
        width: u32,

        #[arg(long, default_value_t = arsip::thumbnails::DEFAULT_JPEG_QUALITY)]
        quality: u8,

        /// Regenerate existing thumbnails
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = load_settings(self.config.as_deref());
        if let Some(catalog) = &self.catalog {
            settings.catalog = catalog.clone();
        }
        if let Some(root) = &self.asset_root {
            settings.asset_root = root.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.fetch_timeout_secs = timeout;
        }
        settings
    }
}

fn init_logging(settings: &Settings) -> Result<()> {
    let log_path = resolve_log_path()?;
    WriteLogger::init(
        settings.log_level_filter(),
        Config::default(),
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file {log_path:?}"))?,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings();
    init_logging(&settings)?;
    info!("Starting arsip {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Cmd::Browse) {
        Cmd::Browse => browse(&settings),
        Cmd::List { category, query } => list(&settings, &category, &query),
        Cmd::Download {
            urls,
            out_dir,
            results,
        } => {
            let results = results.unwrap_or_else(|| out_dir.join(RESULTS_FILENAME));
            download(&settings, &urls, &out_dir, &results)
        }
        Cmd::Sync {
            results,
            output,
            merge,
        } => sync(&settings, &results, output, merge),
        Cmd::Thumbnails {
            pdf_dir,
            out_dir,
            width,
            quality,
            force,
        } => thumbnails(
            &pdf_dir,
            &out_dir,
            &ThumbnailOptions {
                width,
                quality,
                overwrite: force,
            },
        ),
    }
}

fn catalog_loader(settings: &Settings) -> CatalogLoader {
    let location = Location::parse(&settings.catalog, &settings.asset_root);
    let fetcher = Fetcher::new(settings.fetch_timeout());
    CatalogLoader::with_builtin_fallback(Box::new(FetchedCatalog::new(location, fetcher)))
}

fn browse(settings: &Settings) -> Result<()> {
    panic_handler::initialize_panic_handler();

    let mut app = App::new(
        settings,
        catalog_loader(settings),
        default_backend(),
        Box::new(SystemLinkOpener),
    );

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut TerminalEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    info!("Shutting down arsip");
    res
}

fn list(settings: &Settings, category: &str, query: &str) -> Result<()> {
    let Some(category) = CategoryFilter::parse(category) else {
        bail!("Empty category; expected all, muhibbah, himmah, kobarkobari or another name");
    };

    let loaded = catalog_loader(settings).load();
    if let Some(reason) = &loaded.degraded {
        eprintln!("Archive unavailable ({reason}); listing the built-in sample");
    }

    let matches = loaded.catalog.filter(&category, query);
    for publication in &matches {
        let pages = publication
            .pages
            .map(|n| format!("{n:>4} pages"))
            .unwrap_or_default();
        println!(
            "{:<6} {:<12} {:<40} {}",
            publication.year,
            publication.category.label(),
            publication.title,
            pages
        );
    }
    println!("{} of {} publications", matches.len(), loaded.catalog.len());
    Ok(())
}

/// Pause between documents
const DOCUMENT_PAUSE: Duration = Duration::from_secs(2);

fn download(settings: &Settings, urls: &[String], out_dir: &Path, results: &Path) -> Result<()> {
    let targets: Vec<DownloadTarget> = if urls.is_empty() {
        let loaded = catalog_loader(settings).load();
        if let Some(reason) = &loaded.degraded {
            bail!("Archive unavailable ({reason}); pass document URLs instead");
        }
        loaded
            .catalog
            .iter()
            .filter_map(DownloadTarget::from_publication)
            .collect()
    } else {
        urls.iter().map(|url| DownloadTarget::from_url(url)).collect()
    };
    if targets.is_empty() {
        bail!("Nothing to download");
    }

    let total = targets.len();
    let downloader = Downloader::new(Fetcher::new(settings.fetch_timeout()));
    let outcome = download_all(
        &downloader,
        &targets,
        out_dir,
        DOCUMENT_PAUSE,
        |idx, target, outcome| match outcome {
            Ok(path) => println!("[{}/{total}] ✓ {} -> {}", idx + 1, target.title, path.display()),
            Err(e) => eprintln!("[{}/{total}] ✗ {}: {e}", idx + 1, target.title),
        },
    );

    write_file(results, &outcome.to_json()?)
        .with_context(|| format!("Failed to write {}", results.display()))?;
    println!(
        "Downloaded: {}, Failed: {}",
        outcome.downloaded.len(),
        outcome.failed.len()
    );
    println!("Results saved to {}", results.display());
    Ok(())
}

fn sync(settings: &Settings, results: &Path, output: Option<PathBuf>, merge: bool) -> Result<()> {
    let json = fs::read_to_string(results)
        .with_context(|| format!("Failed to read {}", results.display()))?;
    let downloads = DownloadResults::from_json(&json)?;

    let output = match output {
        Some(path) => path,
        None => match Location::parse(&settings.catalog, &settings.asset_root) {
            Location::Local(path) => path,
            Location::Remote(url) => {
                bail!("Configured catalog {url} is remote; pass --output")
            }
        },
    };

    let publications = if merge {
        let existing = fs::read_to_string(&output)
            .with_context(|| format!("Failed to read {}", output.display()))?;
        let mut publications: Vec<Publication> = serde_json::from_str(&existing)
            .with_context(|| format!("Malformed catalog {}", output.display()))?;
        let updated = attach_local_files(&mut publications, &downloads);
        println!(
            "Updated {updated} of {} publications with local files",
            publications.len()
        );
        publications
    } else {
        let publications = rebuild_from_downloads(&downloads, &settings.issuu_profile)?;
        println!("Created {} publications", publications.len());
        publications
    };

    // Never write a catalog the browser would reject
    Catalog::new(publications.clone())?;
    let json = serde_json::to_string_pretty(&publications)?;
    write_file(&output, &json).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {} publications to {}", publications.len(), output.display());
    println!("Saved to {}", output.display());
    Ok(())
}

fn thumbnails(pdf_dir: &Path, out_dir: &Path, options: &ThumbnailOptions) -> Result<()> {
    if !pdf_dir.is_dir() {
        bail!("{} is not a directory", pdf_dir.display());
    }

    let mut backend = default_backend();
    let report = generate_thumbnails(backend.as_mut(), pdf_dir, out_dir, options)?;
    for (pdf, reason) in &report.failed {
        eprintln!("  [FAIL] {}: {reason}", pdf.display());
    }
    println!(
        "Generated: {}, Skipped: {}, Failed: {}",
        report.generated.len(),
        report.skipped.len(),
        report.failed.len()
    );
    println!("Thumbnails saved to {}", out_dir.display());
    Ok(())
}
