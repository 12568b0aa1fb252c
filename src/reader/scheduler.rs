//! Page render scheduling and scale fitting
//!
//! The rendering backend draws into one surface per session and must not be
//! asked to render twice at once. The scheduler keeps at most one render in
//! flight and one pending page; a newer request replaces the pending one.

/// Outcome of asking for a page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing in flight, render this page now
    Start(usize),
    /// Parked in the pending slot until the in-flight render completes
    Deferred,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderScheduler {
    in_flight: Option<usize>,
    pending: Option<usize>,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, page: usize) -> Dispatch {
        if self.in_flight.is_some() {
            self.pending = Some(page);
            Dispatch::Deferred
        } else {
            self.in_flight = Some(page);
            Dispatch::Start(page)
        }
    }

    /// Mark the in-flight render finished (successfully or not). Returns the
    /// pending page, which is now in flight, if there was one.
    pub fn complete(&mut self) -> Option<usize> {
        self.in_flight = self.pending.take();
        self.in_flight
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
        self.pending = None;
    }
}

/// Size of the area pages are fitted into, in surface pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Intrinsic page size, in PDF points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Fit-to-width parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitPolicy {
    pub margin_x: f32,
    pub margin_y: f32,
    /// Page height may exceed the viewport height by this ratio
    pub max_height_ratio: f32,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self {
            margin_x: 4.0,
            margin_y: 2.0,
            max_height_ratio: 1.5,
        }
    }
}

/// Smallest scale ever handed to the backend
pub const MIN_RENDER_SCALE: f32 = 0.01;

/// Fit the page to the viewport width, cap it so it is at most
/// `max_height_ratio` viewports tall, then apply the user zoom.
pub fn effective_scale(viewport: Viewport, page: PageSize, policy: &FitPolicy, zoom: f32) -> f32 {
    if !(page.width > 0.0 && page.height > 0.0) {
        return zoom.max(MIN_RENDER_SCALE);
    }

    let usable_width = (viewport.width as f32 - policy.margin_x).max(1.0);
    let usable_height = (viewport.height as f32 - policy.margin_y).max(1.0);

    let fit_width = usable_width / page.width;
    let max_height = usable_height * policy.max_height_ratio / page.height;

    (fit_width.min(max_height) * zoom).max(MIN_RENDER_SCALE)
}
