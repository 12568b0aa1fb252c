//! Reader session state machine
//!
//! `ReaderController` owns at most one `ReaderSession`. All transitions go
//! through [`ReaderController::apply`], which returns the effects the render
//! service must carry out. Results coming back from the service carry the
//! session id they were issued for; results for any other session are
//! dropped, so a render finishing after `Close` cannot touch a new session.

mod input;
mod scheduler;
mod zoom;

pub use input::{CellMetrics, InputBridge, PageInput};
pub use scheduler::{
    Dispatch, FitPolicy, MIN_RENDER_SCALE, PageSize, RenderScheduler, Viewport, effective_scale,
};
pub use zoom::{Pan, Zoom};

use std::sync::Arc;

use log::{debug, info, warn};

use crate::assets::AssetLocator;
use crate::catalog::Publication;
use crate::pdf::PageBitmap;

/// Identifies one open/close cycle of the reader
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Externally visible reader phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderPhase {
    Closed,
    Opening,
    Ready,
    /// Document could not be loaded; terminal for this session
    Failed(LoadFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadFailure {
    pub message: String,
    /// Raw document address, offered as a direct link
    pub document: String,
    /// External viewer, when the publication has one
    pub fallback_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SessionPhase {
    Opening,
    Ready { total_pages: usize },
    Failed(LoadFailure),
}

/// Everything known about the open document
#[derive(Debug)]
pub struct ReaderSession {
    id: SessionId,
    publication: Publication,
    document: String,
    phase: SessionPhase,
    current_page: usize,
    zoom: Zoom,
    pan: Pan,
    scheduler: RenderScheduler,
    frame: Option<Arc<PageBitmap>>,
    page_error: Option<String>,
}

impl ReaderSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn publication(&self) -> &Publication {
        &self.publication
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Unknown until the document has loaded
    pub fn total_pages(&self) -> Option<usize> {
        match self.phase {
            SessionPhase::Ready { total_pages } => Some(total_pages),
            SessionPhase::Opening | SessionPhase::Failed(_) => None,
        }
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn pan(&self) -> Pan {
        self.pan
    }

    pub fn frame(&self) -> Option<&Arc<PageBitmap>> {
        self.frame.as_ref()
    }

    pub fn page_error(&self) -> Option<&str> {
        self.page_error.as_deref()
    }

    pub fn is_rendering(&self) -> bool {
        self.scheduler.is_rendering()
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }
}

/// Commands accepted by the controller
#[derive(Clone, Debug)]
pub enum Command {
    Open(Publication),
    DocumentLoaded { session: SessionId, page_count: usize },
    DocumentFailed { session: SessionId, reason: String },
    GoToPage(usize),
    NextPage,
    PrevPage,
    SetZoom(f32),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    WheelZoom { up: bool },
    PanBy { dx: i32, dy: i32 },
    SetViewport(Viewport),
    PageRendered {
        session: SessionId,
        page: usize,
        bitmap: Arc<PageBitmap>,
    },
    PageFailed {
        session: SessionId,
        page: usize,
        reason: String,
    },
    Close,
}

/// Work for the render service
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    LoadDocument { session: SessionId, document: String },
    RenderPage(RenderJob),
    ReleaseDocument(SessionId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderJob {
    pub session: SessionId,
    pub page: usize,
    pub zoom: f32,
    pub viewport: Viewport,
}

pub struct ReaderController {
    locator: AssetLocator,
    viewport: Viewport,
    session: Option<ReaderSession>,
    next_session: u64,
}

impl ReaderController {
    pub fn new(locator: AssetLocator) -> Self {
        Self {
            locator,
            viewport: Viewport::default(),
            session: None,
            next_session: 1,
        }
    }

    pub fn session(&self) -> Option<&ReaderSession> {
        self.session.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn phase(&self) -> ReaderPhase {
        match &self.session {
            None => ReaderPhase::Closed,
            Some(session) => match &session.phase {
                SessionPhase::Opening => ReaderPhase::Opening,
                SessionPhase::Ready { .. } => ReaderPhase::Ready,
                SessionPhase::Failed(failure) => ReaderPhase::Failed(failure.clone()),
            },
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Whether navigation input should reach the session
    pub fn accepts_input(&self) -> bool {
        matches!(
            self.session.as_ref().map(|s| &s.phase),
            Some(SessionPhase::Opening | SessionPhase::Ready { .. })
        )
    }

    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Open(publication) => self.open(publication),
            Command::DocumentLoaded {
                session,
                page_count,
            } => self.document_loaded(session, page_count),
            Command::DocumentFailed { session, reason } => self.document_failed(session, reason),
            Command::GoToPage(page) => self.go_to(page),
            Command::NextPage => match self.session.as_ref().map(|s| s.current_page) {
                Some(current) => self.go_to(current + 1),
                None => vec![],
            },
            Command::PrevPage => match self.session.as_ref().map(|s| s.current_page) {
                Some(current) if current > 1 => self.go_to(current - 1),
                _ => vec![],
            },
            Command::SetZoom(factor) => self.set_zoom(Zoom::new(factor)),
            Command::ZoomIn => self.adjust_zoom(|z| z.step_in()),
            Command::ZoomOut => self.adjust_zoom(|z| z.step_out()),
            Command::ResetZoom => self.set_zoom(Zoom::default()),
            Command::WheelZoom { up } => self.adjust_zoom(|z| z.wheel(up)),
            Command::PanBy { dx, dy } => {
                self.pan_by(dx, dy);
                vec![]
            }
            Command::SetViewport(viewport) => self.set_viewport(viewport),
            Command::PageRendered {
                session,
                page,
                bitmap,
            } => self.page_rendered(session, page, bitmap),
            Command::PageFailed {
                session,
                page,
                reason,
            } => self.page_failed(session, page, reason),
            Command::Close => self.close(),
        }
    }

    fn open(&mut self, publication: Publication) -> Vec<Effect> {
        let mut effects = self.close();

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let document = self.locator.document(&publication);
        info!("Opening {} from {document}", publication.id);

        self.session = Some(ReaderSession {
            id,
            publication,
            document: document.clone(),
            phase: SessionPhase::Opening,
            current_page: 1,
            zoom: Zoom::default(),
            pan: Pan::default(),
            scheduler: RenderScheduler::new(),
            frame: None,
            page_error: None,
        });

        effects.push(Effect::LoadDocument {
            session: id,
            document,
        });
        effects
    }

    fn active(&mut self, id: SessionId) -> Option<&mut ReaderSession> {
        match self.session.as_mut() {
            Some(session) if session.id == id => Some(session),
            _ => {
                debug!("Dropping result for stale session {id:?}");
                None
            }
        }
    }

    fn document_loaded(&mut self, id: SessionId, page_count: usize) -> Vec<Effect> {
        let Some(session) = self.active(id) else {
            return vec![];
        };
        if session.phase != SessionPhase::Opening {
            return vec![];
        }
        if page_count == 0 {
            return self.document_failed(id, "document has no pages".to_string());
        }

        session.phase = SessionPhase::Ready {
            total_pages: page_count,
        };
        session.current_page = 1;
        info!("Loaded {} ({page_count} pages)", session.publication.id);
        self.request_current()
    }

    fn document_failed(&mut self, id: SessionId, reason: String) -> Vec<Effect> {
        let Some(session) = self.active(id) else {
            return vec![];
        };
        warn!("Failed to load {}: {reason}", session.document);
        session.scheduler.reset();
        session.phase = SessionPhase::Failed(LoadFailure {
            message: reason,
            document: session.document.clone(),
            fallback_url: session.publication.issuu_url.clone(),
        });
        vec![]
    }

    /// Rejected unless the document is ready and `page` is within `[1, total]`
    fn go_to(&mut self, page: usize) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return vec![];
        };
        let Some(total) = session.total_pages() else {
            return vec![];
        };
        if page < 1 || page > total {
            debug!("Rejected page {page} (document has {total})");
            return vec![];
        }
        let showing = session.frame.as_ref().is_some_and(|f| f.page == page);
        if page == session.current_page && showing && !session.scheduler.is_rendering() {
            return vec![];
        }

        session.current_page = page;
        session.pan = Pan::default();
        self.request_current()
    }

    fn adjust_zoom(&mut self, step: impl FnOnce(Zoom) -> Zoom) -> Vec<Effect> {
        match self.session.as_ref().map(|s| s.zoom) {
            Some(zoom) => self.set_zoom(step(zoom)),
            None => vec![],
        }
    }

    fn set_zoom(&mut self, zoom: Zoom) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return vec![];
        };
        if session.zoom == zoom {
            return vec![];
        }
        session.zoom = zoom;
        if !zoom.is_magnified() {
            session.pan = Pan::default();
        }
        self.request_current()
    }

    fn pan_by(&mut self, dx: i32, dy: i32) {
        let viewport = self.viewport;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.zoom.is_magnified() {
            return;
        }
        let Some(frame) = session.frame.as_ref() else {
            return;
        };
        session.pan = session.pan.shifted(dx, dy, pan_limit(frame, viewport));
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Vec<Effect> {
        if self.viewport == viewport {
            return vec![];
        }
        self.viewport = viewport;
        self.request_current()
    }

    fn page_rendered(&mut self, id: SessionId, page: usize, bitmap: Arc<PageBitmap>) -> Vec<Effect> {
        let viewport = self.viewport;
        let Some(session) = self.active(id) else {
            return vec![];
        };
        debug!(
            "Page {page} rendered at {}x{} (scale {:.3})",
            bitmap.width, bitmap.height, bitmap.scale
        );
        session.pan = session.pan.clamped(pan_limit(&bitmap, viewport));
        session.frame = Some(bitmap);
        session.page_error = None;
        self.start_pending(id)
    }

    fn page_failed(&mut self, id: SessionId, page: usize, reason: String) -> Vec<Effect> {
        let Some(session) = self.active(id) else {
            return vec![];
        };
        warn!("Page {page} of {} failed to render: {reason}", session.publication.id);
        session.page_error = Some(format!("Page {page}: {reason}"));
        self.start_pending(id)
    }

    fn close(&mut self) -> Vec<Effect> {
        match self.session.take() {
            Some(session) => {
                info!("Closing {}", session.publication.id);
                vec![Effect::ReleaseDocument(session.id)]
            }
            None => vec![],
        }
    }

    /// Ask the scheduler for the current page; only ready sessions render
    fn request_current(&mut self) -> Vec<Effect> {
        let viewport = self.viewport;
        let Some(session) = self.session.as_mut() else {
            return vec![];
        };
        if session.total_pages().is_none() {
            return vec![];
        }
        match session.scheduler.request(session.current_page) {
            Dispatch::Start(page) => vec![Effect::RenderPage(job(session, page, viewport))],
            Dispatch::Deferred => vec![],
        }
    }

    fn start_pending(&mut self, id: SessionId) -> Vec<Effect> {
        let viewport = self.viewport;
        let Some(session) = self.active(id) else {
            return vec![];
        };
        match session.scheduler.complete() {
            Some(page) => vec![Effect::RenderPage(job(session, page, viewport))],
            None => vec![],
        }
    }
}

fn job(session: &ReaderSession, page: usize, viewport: Viewport) -> RenderJob {
    RenderJob {
        session: session.id,
        page,
        zoom: session.zoom.factor(),
        viewport,
    }
}

fn pan_limit(frame: &PageBitmap, viewport: Viewport) -> (u32, u32) {
    (
        frame.width.saturating_sub(viewport.width),
        frame.height.saturating_sub(viewport.height),
    )
}
