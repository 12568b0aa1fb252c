//! Application state and the terminal event loop
//!
//! `App` binds the catalog, the card grid and the reader controller to
//! ratatui/crossterm. All state changes of the reader go through
//! `ReaderController::apply`; the effects it returns are handed to the
//! `RenderService`, whose results come back on each tick.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use flume::{Receiver, TryRecvError};
use log::{debug, info, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
};

use crate::assets::AssetLocator;
use crate::cards::{CardGrid, GridView, build_grid};
use crate::catalog::{Catalog, CatalogLoader, CategoryFilter, FilterState, LoadedCatalog, spawn_load};
use crate::event_source::EventSource;
use crate::fetch::{Fetcher, Location};
use crate::link_opener::LinkOpener;
use crate::pdf::{DocumentBackend, RenderService};
use crate::reader::{CellMetrics, Command, InputBridge, ReaderController, ReaderPhase};
use crate::settings::Settings;
use crate::theme::{Palette, current_theme};
use crate::widget::{HudMessage, ReaderLayout, render_reader};

/// Typing pauses this long before the query is applied
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Grid,
    Search,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

/// Search box text, applied to the filter after a quiet period
#[derive(Debug, Default)]
struct SearchBox {
    text: String,
    edited_at: Option<Instant>,
}

impl SearchBox {
    fn edit(&mut self, now: Instant, change: impl FnOnce(&mut String)) {
        change(&mut self.text);
        self.edited_at = Some(now);
    }

    /// Returns the text once the debounce period has passed
    fn settled(&mut self, now: Instant) -> Option<String> {
        let edited = self.edited_at?;
        if now.duration_since(edited) < SEARCH_DEBOUNCE {
            return None;
        }
        self.edited_at = None;
        Some(self.text.clone())
    }

    fn flush(&mut self) -> String {
        self.edited_at = None;
        self.text.clone()
    }
}

pub struct App {
    palette: &'static Palette,
    locator: AssetLocator,
    asset_root: PathBuf,
    catalog_rx: Option<Receiver<LoadedCatalog>>,
    catalog: Option<Catalog>,
    degraded: bool,
    filter: FilterState,
    search: SearchBox,
    focus: Focus,
    grid: CardGrid,
    reader: ReaderController,
    render_service: RenderService,
    input: Option<InputBridge>,
    hud: Option<HudMessage>,
    pub link_opener: Box<dyn LinkOpener>,
}

impl App {
    pub fn new(
        settings: &Settings,
        loader: CatalogLoader,
        backend: Box<dyn DocumentBackend>,
        link_opener: Box<dyn LinkOpener>,
    ) -> Self {
        let render_service = RenderService::spawn(
            backend,
            Fetcher::new(settings.fetch_timeout()),
            settings.asset_root.clone(),
            settings.fit_policy(),
        );
        let locator = settings.asset_locator();

        Self {
            palette: current_theme(),
            reader: ReaderController::new(locator.clone()),
            locator,
            asset_root: settings.asset_root.clone(),
            catalog_rx: Some(spawn_load(loader)),
            catalog: None,
            degraded: false,
            filter: FilterState::default(),
            search: SearchBox::default(),
            focus: Focus::Grid,
            grid: CardGrid::new(),
            render_service,
            input: None,
            hud: None,
            link_opener,
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn search_text(&self) -> &str {
        &self.search.text
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn grid(&self) -> &CardGrid {
        &self.grid
    }

    pub fn reader(&self) -> &ReaderController {
        &self.reader
    }

    pub fn input_bridge(&self) -> Option<&InputBridge> {
        self.input.as_ref()
    }

    pub fn hud(&self) -> Option<&HudMessage> {
        self.hud.as_ref()
    }

    /// Block until the catalog load finishes
    pub fn wait_for_catalog(&mut self, timeout: Duration) -> bool {
        let received = match &self.catalog_rx {
            Some(rx) => rx.recv_timeout(timeout).ok(),
            None => return self.catalog.is_some(),
        };
        match received {
            Some(loaded) => {
                self.catalog_rx = None;
                self.install_catalog(loaded);
                true
            }
            None => false,
        }
    }

    /// Process render results until the reader is idle or `timeout` passes
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.reader_idle() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            match self.render_service.wait(remaining) {
                Some(cmd) => self.apply_render_result(cmd),
                None => return self.reader_idle(),
            }
        }
    }

    fn reader_idle(&self) -> bool {
        match self.reader.phase() {
            ReaderPhase::Opening => false,
            ReaderPhase::Ready => self.reader.session().is_some_and(|s| !s.is_rendering()),
            ReaderPhase::Closed | ReaderPhase::Failed(_) => true,
        }
    }

    /// Periodic work; returns true when the screen needs a redraw
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        let mut changed = self.poll_catalog();

        if let Some(query) = self.search.settled(now) {
            self.set_query(query);
            changed = true;
        }

        for cmd in self.render_service.poll() {
            self.apply_render_result(cmd);
            changed = true;
        }

        if self.hud.as_ref().is_some_and(HudMessage::is_expired) {
            self.hud = None;
            changed = true;
        }
        changed
    }

    fn poll_catalog(&mut self) -> bool {
        let Some(rx) = &self.catalog_rx else {
            return false;
        };
        match rx.try_recv() {
            Ok(loaded) => {
                self.catalog_rx = None;
                self.install_catalog(loaded);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                warn!("Catalog loader exited without a result");
                self.catalog_rx = None;
                self.install_catalog(LoadedCatalog {
                    catalog: Catalog::default(),
                    origin: "nothing".into(),
                    degraded: Some("catalog loader stopped".into()),
                });
                true
            }
        }
    }

    fn install_catalog(&mut self, loaded: LoadedCatalog) {
        info!(
            "Catalog ready: {} publications from {}",
            loaded.catalog.len(),
            loaded.origin
        );
        if let Some(reason) = &loaded.degraded {
            self.hud = Some(HudMessage::error(format!(
                "Archive unavailable ({reason}), showing sample data"
            )));
        }
        self.degraded = loaded.is_degraded();
        self.catalog = Some(loaded.catalog);
        self.refresh_grid();
    }

    fn refresh_grid(&mut self) {
        let view = match &self.catalog {
            Some(catalog) => build_grid(&catalog.apply(&self.filter), &self.locator),
            None => GridView::Loading,
        };
        self.grid.set_view(view);
    }

    fn set_query(&mut self, query: String) {
        if self.filter.query != query {
            debug!("Search query: {query:?}");
            self.filter.query = query;
            self.refresh_grid();
        }
    }

    fn set_category(&mut self, category: CategoryFilter) {
        self.filter.category = category;
        self.refresh_grid();
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<AppAction> {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return None;
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Some(AppAction::Quit);
            }
        }

        if self.reader.is_open() {
            self.handle_reader_event(event);
            return None;
        }

        match event {
            Event::Key(key) => self.handle_browse_key(*key),
            _ => None,
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        let now = Instant::now();
        match self.focus {
            Focus::Search => match key.code {
                KeyCode::Char(c) => self.search.edit(now, |text| text.push(c)),
                KeyCode::Backspace => self.search.edit(now, |text| {
                    text.pop();
                }),
                KeyCode::Enter | KeyCode::Esc | KeyCode::Down => {
                    let query = self.search.flush();
                    self.set_query(query);
                    self.focus = Focus::Grid;
                }
                KeyCode::Tab => self.set_category(self.filter.category.next()),
                _ => {}
            },
            Focus::Grid => match key.code {
                KeyCode::Char('q') => return Some(AppAction::Quit),
                KeyCode::Char('/') => self.focus = Focus::Search,
                KeyCode::Tab => self.set_category(self.filter.category.next()),
                KeyCode::Char('j') | KeyCode::Down => self.grid.move_down(),
                KeyCode::Char('k') | KeyCode::Up => self.grid.move_up(),
                KeyCode::Enter => self.open_selected(),
                _ => {}
            },
        }
        None
    }

    fn open_selected(&mut self) {
        let Some(id) = self.grid.activate() else {
            return;
        };
        let Some(publication) = self.catalog.as_ref().and_then(|c| c.get(&id)).cloned() else {
            warn!("Selected publication {id} is not in the catalog");
            return;
        };
        self.input = Some(InputBridge::new(CellMetrics::default()));
        self.dispatch(Command::Open(publication));
    }

    fn handle_reader_event(&mut self, event: &Event) {
        if let ReaderPhase::Failed(failure) = self.reader.phase() {
            if let Event::Key(key) = event {
                match key.code {
                    KeyCode::Esc => self.dispatch(Command::Close),
                    KeyCode::Char('o') => self.open_link(&failure.document),
                    KeyCode::Char('i') => {
                        if let Some(url) = &failure.fallback_url {
                            self.open_link(url);
                        }
                    }
                    _ => {}
                }
            }
            return;
        }

        let prompting = self.input.as_ref().is_some_and(|b| b.page_input().is_some());
        if let Event::Key(key) = event {
            if key.code == KeyCode::Char('o') && !prompting {
                if let Some(document) = self.reader.session().map(|s| s.document().to_string()) {
                    self.open_link(&document);
                }
                return;
            }
        }

        let Some(zoom) = self.reader.session().map(|s| s.zoom()) else {
            return;
        };
        let commands = match self.input.as_mut() {
            Some(bridge) => bridge.translate(event, zoom),
            None => return,
        };
        for cmd in commands {
            self.dispatch(cmd);
        }
    }

    /// Apply a command to the reader and run the resulting effects
    fn dispatch(&mut self, cmd: Command) {
        let effects = self.reader.apply(cmd);
        self.render_service.execute(effects);
        if !self.reader.accepts_input() {
            // The bridge only lives while a session can take input
            self.input = None;
        }
    }

    fn apply_render_result(&mut self, cmd: Command) {
        if let Command::PageFailed { page, reason, .. } = &cmd {
            if self.reader.is_open() {
                self.hud = Some(HudMessage::error(format!(
                    "Page {page} failed to render: {reason}"
                )));
            }
        }
        self.dispatch(cmd);
    }

    fn open_link(&mut self, target: &str) {
        let resolved = match Location::parse(target, &self.asset_root) {
            Location::Remote(url) => url,
            Location::Local(path) => path.display().to_string(),
        };
        match self.link_opener.open(&resolved) {
            Ok(()) => self.hud = Some(HudMessage::info(format!("Opened {resolved}"))),
            Err(e) => {
                warn!("{e:#}");
                self.hud = Some(HudMessage::error(format!("{e:#}")));
            }
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let palette = self.palette;
        f.render_widget(
            Block::default().style(Style::default().bg(palette.background)),
            area,
        );

        let [header, tabs, search, grid, hud] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(f, header);
        self.render_tabs(f, tabs);
        self.render_search(f, search);
        let grid_focused = self.focus == Focus::Grid && !self.reader.is_open();
        self.grid.render(f, grid, palette, grid_focused);

        let reader_area = Rect {
            height: area.height.saturating_sub(hud.height),
            ..area
        };
        let layout = ReaderLayout::new(reader_area);
        self.dispatch_viewport(&layout);
        render_reader(f, &layout, &self.reader, self.input.as_ref(), palette);

        if let Some(message) = &self.hud {
            f.render_widget(Paragraph::new(message.styled_line(palette)), hud);
        }
    }

    fn dispatch_viewport(&mut self, layout: &ReaderLayout) {
        let viewport = layout.viewport();
        if self.reader.viewport() != viewport {
            let effects = self.reader.apply(Command::SetViewport(viewport));
            self.render_service.execute(effects);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let palette = self.palette;
        let count = match &self.catalog {
            Some(catalog) => format!("{}+ publications", catalog.len()),
            None => "loading…".to_string(),
        };
        let mut spans = vec![
            Span::styled(
                " ARSIP ",
                Style::default()
                    .fg(palette.background)
                    .bg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" Digital Magazine Archive  ", Style::default().fg(palette.text)),
            Span::styled(count, Style::default().fg(palette.muted)),
        ];
        if self.degraded {
            spans.push(Span::styled("  (offline sample)", Style::default().fg(palette.error)));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_tabs(&self, f: &mut Frame, area: Rect) {
        let palette = self.palette;
        let tabs = CategoryFilter::tabs();
        let selected = tabs.iter().position(|t| *t == self.filter.category);
        let titles: Vec<Line> = tabs.iter().map(|t| Line::from(t.label())).collect();
        let widget = Tabs::new(titles)
            .select(selected)
            .style(Style::default().fg(palette.muted))
            .highlight_style(
                Style::default()
                    .fg(palette.bright)
                    .bg(palette.selection_bg)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(widget, area);
    }

    fn render_search(&self, f: &mut Frame, area: Rect) {
        let palette = self.palette;
        let focused = self.focus == Focus::Search && !self.reader.is_open();
        let border = if focused { palette.border_focused } else { palette.border };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Search [/] ");

        let line = if self.search.text.is_empty() && !focused {
            Line::from(Span::styled(
                "title, year or category",
                Style::default().fg(palette.muted),
            ))
        } else if focused {
            Line::from(vec![
                Span::styled(self.search.text.clone(), Style::default().fg(palette.text)),
                Span::styled("_", Style::default().fg(palette.accent)),
            ])
        } else {
            Line::from(Span::styled(self.search.text.clone(), Style::default().fg(palette.text)))
        };
        f.render_widget(Paragraph::new(line).block(block), area);
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut first_render = true;

    loop {
        let mut events_processed = 0;
        let mut should_quit = false;

        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;
            if app.handle_event(&event) == Some(AppAction::Quit) {
                should_quit = true;
                break;
            }
        }

        if should_quit {
            return Ok(());
        }

        let mut needs_redraw = events_processed > 0 || first_render;
        first_render = false;

        if last_tick.elapsed() >= tick_rate {
            needs_redraw |= app.tick();
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }

        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            if event_source.poll(timeout)? {
                continue;
            }
        }
    }
}
