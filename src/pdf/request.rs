//! Render request and response types

use std::sync::Arc;

use super::types::PageBitmap;
use crate::reader::{Command, RenderJob, SessionId};

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Fetch and open a document, replacing any open one
    Open { session: SessionId, document: String },

    /// Render a page of the open document
    Page(RenderJob),

    /// Drop the document for this session
    Close(SessionId),

    /// Shutdown the worker
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    Loaded {
        session: SessionId,
        page_count: usize,
    },

    LoadFailed {
        session: SessionId,
        reason: String,
    },

    Rendered {
        session: SessionId,
        page: usize,
        bitmap: Arc<PageBitmap>,
    },

    RenderFailed {
        session: SessionId,
        page: usize,
        reason: String,
    },
}

impl From<RenderResponse> for Command {
    fn from(response: RenderResponse) -> Self {
        match response {
            RenderResponse::Loaded {
                session,
                page_count,
            } => Command::DocumentLoaded {
                session,
                page_count,
            },
            RenderResponse::LoadFailed { session, reason } => {
                Command::DocumentFailed { session, reason }
            }
            RenderResponse::Rendered {
                session,
                page,
                bitmap,
            } => Command::PageRendered {
                session,
                page,
                bitmap,
            },
            RenderResponse::RenderFailed {
                session,
                page,
                reason,
            } => Command::PageFailed {
                session,
                page,
                reason,
            },
        }
    }
}
