//! Page rendering infrastructure
//!
//! A single worker thread owns the open document. `RenderService` feeds it
//! the effects produced by `ReaderController` and hands results back as
//! commands.

#[cfg(feature = "pdf")]
mod mupdf_backend;
mod request;
mod service;
mod types;
mod worker;

#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;
pub use request::{RenderRequest, RenderResponse};
pub use service::RenderService;
pub use types::*;
pub use worker::render_page;

use std::path::Path;

/// Backend used by the application binary
pub fn default_backend() -> Box<dyn DocumentBackend> {
    #[cfg(feature = "pdf")]
    {
        Box::new(MupdfBackend)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(NoPdfSupport)
    }
}

/// Stand-in when built without the `pdf` feature; every open fails
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPdfSupport;

impl DocumentBackend for NoPdfSupport {
    fn open(&mut self, path: &Path) -> Result<Box<dyn PageSource>, RenderFault> {
        Err(RenderFault::generic(format!(
            "cannot open {}: built without PDF support",
            path.display()
        )))
    }
}
