//! Translates terminal events into reader commands
//!
//! An `InputBridge` is created when a session opens and dropped when it
//! closes, so a drag or a half-typed page number never outlives its session.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use log::debug;

use super::{Command, Zoom};

/// Pan distance is the drag distance times this factor
pub const DRAG_MULTIPLIER: f32 = 1.5;

const MAX_PAGE_DIGITS: usize = 6;

/// Surface pixels covered by one terminal cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellMetrics {
    pub px_per_col: u32,
    pub px_per_row: u32,
}

impl Default for CellMetrics {
    // Half-block rendering: one pixel per column, two per row
    fn default() -> Self {
        Self {
            px_per_col: 1,
            px_per_row: 2,
        }
    }
}

/// Page number being typed after `g`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageInput {
    digits: String,
}

impl PageInput {
    pub fn text(&self) -> &str {
        &self.digits
    }

    fn push(&mut self, c: char) {
        if self.digits.len() < MAX_PAGE_DIGITS {
            self.digits.push(c);
        }
    }

    fn backspace(&mut self) {
        self.digits.pop();
    }

    /// Parsed page number; range checks are left to the controller
    fn submit(&self) -> Option<usize> {
        self.digits.parse().ok()
    }
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    anchor: (u16, u16),
    /// Pan already emitted for this drag, in pixels
    emitted: (i32, i32),
}

#[derive(Debug, Default)]
pub struct InputBridge {
    metrics: CellMetrics,
    drag: Option<Drag>,
    page_input: Option<PageInput>,
}

impl InputBridge {
    pub fn new(metrics: CellMetrics) -> Self {
        Self {
            metrics,
            drag: None,
            page_input: None,
        }
    }

    pub fn page_input(&self) -> Option<&PageInput> {
        self.page_input.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Forget any gesture in progress
    pub fn detach(&mut self) {
        self.drag = None;
        self.page_input = None;
    }

    pub fn translate(&mut self, event: &Event, zoom: Zoom) -> Vec<Command> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.key(*key),
            Event::Mouse(mouse) => self.mouse(*mouse, zoom),
            _ => vec![],
        }
    }

    fn key(&mut self, key: KeyEvent) -> Vec<Command> {
        if let Some(input) = self.page_input.as_mut() {
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => input.push(c),
                KeyCode::Backspace => input.backspace(),
                KeyCode::Enter => {
                    let page = input.submit();
                    self.page_input = None;
                    return page.map(Command::GoToPage).into_iter().collect();
                }
                KeyCode::Esc => self.page_input = None,
                _ => {}
            }
            return vec![];
        }

        let command = match key.code {
            KeyCode::Left | KeyCode::Up => Command::PrevPage,
            KeyCode::Right | KeyCode::Down | KeyCode::Char(' ') => Command::NextPage,
            KeyCode::Char('+') | KeyCode::Char('=') => Command::ZoomIn,
            KeyCode::Char('-') => Command::ZoomOut,
            KeyCode::Char('0') => Command::ResetZoom,
            KeyCode::Esc => {
                self.detach();
                Command::Close
            }
            KeyCode::Char('g') => {
                self.page_input = Some(PageInput::default());
                return vec![];
            }
            _ => return vec![],
        };
        vec![command]
    }

    fn mouse(&mut self, mouse: MouseEvent, zoom: Zoom) -> Vec<Command> {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if zoom.is_magnified() {
                    self.drag = Some(Drag {
                        anchor: (mouse.column, mouse.row),
                        emitted: (0, 0),
                    });
                }
                vec![]
            }
            MouseEventKind::Drag(MouseButton::Left) => self.drag_to(mouse.column, mouse.row),
            MouseEventKind::Up(MouseButton::Left) => {
                self.drag = None;
                vec![]
            }
            MouseEventKind::ScrollUp => vec![Command::WheelZoom { up: true }],
            MouseEventKind::ScrollDown => vec![Command::WheelZoom { up: false }],
            _ => vec![],
        }
    }

    fn drag_to(&mut self, column: u16, row: u16) -> Vec<Command> {
        let Some(drag) = self.drag.as_mut() else {
            return vec![];
        };

        // Dragging right reveals the left part of the page, so pan moves opposite.
        let walk = |now: u16, anchor: u16, px: u32| -> i32 {
            let cells = i32::from(now) - i32::from(anchor);
            -((cells as f32 * px as f32 * DRAG_MULTIPLIER).round() as i32)
        };
        let total = (
            walk(column, drag.anchor.0, self.metrics.px_per_col),
            walk(row, drag.anchor.1, self.metrics.px_per_row),
        );
        let (dx, dy) = (total.0 - drag.emitted.0, total.1 - drag.emitted.1);
        drag.emitted = total;

        if dx == 0 && dy == 0 {
            return vec![];
        }
        debug!("Drag pan by ({dx}, {dy})");
        vec![Command::PanBy { dx, dy }]
    }
}
