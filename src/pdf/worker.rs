//! Render worker - owns the open document on a dedicated thread

use std::path::PathBuf;
use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::request::{RenderRequest, RenderResponse};
use super::types::{DocumentBackend, PageBitmap, PageSource, RenderFault};
use crate::fetch::{Fetcher, LocalCopy, Location};
use crate::reader::{FitPolicy, RenderJob, SessionId, effective_scale};

/// Everything the worker needs, moved into its thread
pub struct WorkerContext {
    pub backend: Box<dyn DocumentBackend>,
    pub fetcher: Fetcher,
    /// Relative document paths resolve against this directory
    pub asset_root: PathBuf,
    pub policy: FitPolicy,
}

struct OpenDocument {
    session: SessionId,
    // Declared before `copy` so the document is closed before its file goes away
    source: Box<dyn PageSource>,
    copy: LocalCopy,
}

/// Main worker loop. Requests are handled strictly in order, so at most one
/// render runs at a time.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    mut ctx: WorkerContext,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let mut current: Option<OpenDocument> = None;

    for request in requests {
        let response = match request {
            RenderRequest::Open { session, document } => {
                // Release the previous document before fetching the next one
                current = None;
                match open_document(&mut ctx, session, &document) {
                    Ok(doc) => {
                        let page_count = doc.source.page_count();
                        info!(
                            "Opened {document} ({page_count} pages) from {}",
                            doc.copy.path().display()
                        );
                        current = Some(doc);
                        RenderResponse::Loaded {
                            session,
                            page_count,
                        }
                    }
                    Err(e) => RenderResponse::LoadFailed {
                        session,
                        reason: e.to_string(),
                    },
                }
            }

            RenderRequest::Page(job) => {
                let result = match current.as_ref() {
                    Some(doc) if doc.session == job.session => {
                        render_page(doc.source.as_ref(), &job, &ctx.policy)
                    }
                    _ => Err(RenderFault::generic("document is not open")),
                };
                match result {
                    Ok(bitmap) => RenderResponse::Rendered {
                        session: job.session,
                        page: job.page,
                        bitmap,
                    },
                    Err(e) => RenderResponse::RenderFailed {
                        session: job.session,
                        page: job.page,
                        reason: e.to_string(),
                    },
                }
            }

            RenderRequest::Close(session) => {
                if current.as_ref().is_some_and(|doc| doc.session == session) {
                    debug!("Releasing document for {session:?}");
                    current = None;
                }
                continue;
            }

            RenderRequest::Shutdown => break,
        };

        if responses.send(response).is_err() {
            break;
        }
    }
}

fn open_document(
    ctx: &mut WorkerContext,
    session: SessionId,
    document: &str,
) -> Result<OpenDocument, RenderFault> {
    let location = Location::parse(document, &ctx.asset_root);
    let copy = ctx.fetcher.materialize(&location)?;
    let source = ctx.backend.open(copy.path()).inspect_err(|e| {
        warn!("Cannot open {}: {e}", location.describe());
    })?;
    Ok(OpenDocument {
        session,
        source,
        copy,
    })
}

/// Render a single page at the fitted scale, with the paper tint applied
pub fn render_page(
    source: &dyn PageSource,
    job: &RenderJob,
    policy: &FitPolicy,
) -> Result<Arc<PageBitmap>, RenderFault> {
    let size = source.page_size(job.page)?;
    let scale = effective_scale(job.viewport, size, policy, job.zoom);
    let mut bitmap = source.render(job.page, scale)?;
    bitmap.apply_paper_tint();
    Ok(Arc::new(bitmap))
}
