//! Reader overlay: page display, controls bar and the load-failure panel

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::page_view::PageView;
use crate::reader::{InputBridge, LoadFailure, ReaderController, ReaderPhase, ReaderSession, Viewport};
use crate::theme::Palette;

/// Areas of the reader overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderLayout {
    pub frame: Rect,
    pub page: Rect,
    pub controls: Rect,
}

impl ReaderLayout {
    pub fn new(area: Rect) -> Self {
        let inner = Block::default().borders(Borders::ALL).inner(area);
        let [page, controls] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
        Self {
            frame: area,
            page,
            controls,
        }
    }

    /// Page area in surface pixels: one per column, two per row
    pub fn viewport(&self) -> Viewport {
        Viewport::new(u32::from(self.page.width), u32::from(self.page.height) * 2)
    }
}

pub fn render_reader(
    f: &mut Frame,
    layout: &ReaderLayout,
    controller: &ReaderController,
    bridge: Option<&InputBridge>,
    palette: &Palette,
) {
    let Some(session) = controller.session() else {
        return;
    };

    let publication = session.publication();
    let title = format!(
        " {} {} ({}) ",
        publication.category.icon(),
        publication.title,
        publication.year
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border_focused))
        .title(Span::styled(title, Style::default().fg(palette.bright)))
        .style(Style::default().bg(palette.panel));

    f.render_widget(Clear, layout.frame);
    f.render_widget(block, layout.frame);

    match controller.phase() {
        ReaderPhase::Closed => {}
        ReaderPhase::Opening => {
            let text = Paragraph::new("Loading document...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(palette.muted));
            f.render_widget(text, centered_line(layout.page));
            render_controls(f, layout.controls, session, bridge, palette);
        }
        ReaderPhase::Ready => {
            if let Some(frame) = session.frame() {
                f.render_widget(PageView::new(frame, session.pan(), palette.panel), layout.page);
            }
            render_controls(f, layout.controls, session, bridge, palette);
        }
        ReaderPhase::Failed(failure) => render_failure(f, layout.page, &failure, palette),
    }
}

fn centered_line(area: Rect) -> Rect {
    let [_, line, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);
    line
}

fn render_controls(
    f: &mut Frame,
    area: Rect,
    session: &ReaderSession,
    bridge: Option<&InputBridge>,
    palette: &Palette,
) {
    let key = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
    let muted = Style::default().fg(palette.muted);

    let total = session
        .total_pages()
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let page = match bridge.and_then(InputBridge::page_input) {
        Some(input) => Span::styled(
            format!(" Go to page: {}_ / {total} ", input.text()),
            Style::default().fg(palette.bright).bg(palette.selection_bg),
        ),
        None => Span::styled(
            format!(" Page {} / {total} ", session.current_page()),
            Style::default().fg(palette.text),
        ),
    };

    let mut spans = vec![
        Span::styled("◀", key),
        page,
        Span::styled("▶", key),
        Span::styled(format!("  Zoom {}%", session.zoom().percent()), muted),
    ];
    if session.is_rendering() {
        spans.push(Span::styled("  rendering…", muted));
    }
    if let Some(error) = session.page_error() {
        spans.push(Span::styled(format!("  {error}"), Style::default().fg(palette.error)));
    }
    spans.extend([
        Span::styled("  [g]", key),
        Span::styled(" page", muted),
        Span::styled("  [o]", key),
        Span::styled(" download PDF", muted),
        Span::styled("  [Esc]", key),
        Span::styled(" close", muted),
    ]);

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_failure(f: &mut Frame, area: Rect, failure: &LoadFailure, palette: &Palette) {
    let key = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(Span::styled(
            "Could not load this document",
            Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(failure.message.clone(), Style::default().fg(palette.muted))),
        Line::from(""),
        Line::from(vec![
            Span::styled("[o] ", key),
            Span::styled("Open PDF directly: ", Style::default().fg(palette.text)),
            Span::styled(failure.document.clone(), Style::default().fg(palette.muted)),
        ]),
    ];
    if let Some(url) = &failure.fallback_url {
        lines.push(Line::from(vec![
            Span::styled("[i] ", key),
            Span::styled("Read on Issuu: ", Style::default().fg(palette.text)),
            Span::styled(url.clone(), Style::default().fg(palette.muted)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[Esc] ", key),
        Span::styled("Back to the archive", Style::default().fg(palette.text)),
    ]));

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}
