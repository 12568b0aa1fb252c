pub mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use crate::app::App;
    use crate::catalog::{CatalogLoader, Category, FixtureCatalog, Publication};
    use crate::event_source::{Event, KeyCode, MouseButton, MouseEventKind, SimulatedEventSource};
    use crate::link_opener::MockLinkOpener;
    use crate::pdf::{DocumentBackend, PageBitmap, PageSource, RenderFault};
    use crate::reader::PageSize;
    use crate::settings::Settings;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::key(code));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press(KeyCode::Enter)
        }

        pub fn press_tab(self) -> Self {
            self.press(KeyCode::Tab)
        }

        pub fn press_esc(self) -> Self {
            self.press(KeyCode::Esc)
        }

        /// Type text character by character
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events.push(SimulatedEventSource::char_key(c));
            }
            self
        }

        /// Open the search box, type `query` and submit it
        pub fn search(self, query: &str) -> Self {
            self.press_char('/').type_text(query).press_enter()
        }

        /// Navigate down n times (press 'j' n times)
        pub fn navigate_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        /// Navigate up n times (press 'k' n times)
        pub fn navigate_up(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('k'));
            }
            self
        }

        /// Left-button drag from one cell to another
        pub fn drag(mut self, from: (u16, u16), to: (u16, u16)) -> Self {
            self.events.push(SimulatedEventSource::mouse(
                MouseEventKind::Down(MouseButton::Left),
                from.0,
                from.1,
            ));
            self.events.push(SimulatedEventSource::mouse(
                MouseEventKind::Drag(MouseButton::Left),
                to.0,
                to.1,
            ));
            self.events.push(SimulatedEventSource::mouse(
                MouseEventKind::Up(MouseButton::Left),
                to.0,
                to.1,
            ));
            self
        }

        pub fn scroll_up(mut self) -> Self {
            self.events
                .push(SimulatedEventSource::mouse(MouseEventKind::ScrollUp, 0, 0));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(self) -> Self {
            self.press_char('q')
        }

        pub fn events(&self) -> &[Event] {
            &self.events
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// In-memory document backend producing solid-color pages
    #[derive(Clone)]
    pub struct FixtureBackend {
        page_count: usize,
        page_size: PageSize,
        failing_page: Option<usize>,
        render_delay: Duration,
        opened: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl FixtureBackend {
        /// A4-sized pages
        pub fn new(page_count: usize) -> Self {
            Self {
                page_count,
                page_size: PageSize {
                    width: 595.0,
                    height: 842.0,
                },
                failing_page: None,
                render_delay: Duration::ZERO,
                opened: Arc::default(),
            }
        }

        pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
            self.page_size = PageSize { width, height };
            self
        }

        /// Rendering this page always fails
        pub fn failing_on(mut self, page: usize) -> Self {
            self.failing_page = Some(page);
            self
        }

        pub fn with_render_delay(mut self, delay: Duration) -> Self {
            self.render_delay = delay;
            self
        }

        /// Paths passed to `open`, shared across clones
        pub fn opened(&self) -> Vec<PathBuf> {
            self.opened
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }

        /// Color of every pixel of `page`
        pub fn page_color(page: usize) -> [u8; 3] {
            let shade = (page * 20 % 200) as u8;
            [shade, 255 - shade, 128]
        }
    }

    impl DocumentBackend for FixtureBackend {
        fn open(&mut self, path: &Path) -> Result<Box<dyn PageSource>, RenderFault> {
            self.opened
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(path.to_path_buf());
            Ok(Box::new(self.clone()))
        }
    }

    impl PageSource for FixtureBackend {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_size(&self, page: usize) -> Result<PageSize, RenderFault> {
            if page == 0 || page > self.page_count {
                return Err(RenderFault::generic(format!("no page {page}")));
            }
            Ok(self.page_size)
        }

        fn render(&self, page: usize, scale: f32) -> Result<PageBitmap, RenderFault> {
            if !self.render_delay.is_zero() {
                thread::sleep(self.render_delay);
            }
            if self.failing_page == Some(page) {
                return Err(RenderFault::generic("corrupt page stream"));
            }
            let width = (self.page_size.width * scale).round().max(1.0) as u32;
            let height = (self.page_size.height * scale).round().max(1.0) as u32;
            let mut bitmap = PageBitmap::solid(page, width, height, Self::page_color(page));
            bitmap.scale = scale;
            Ok(bitmap)
        }
    }

    pub fn publication(id: &str, title: &str, category: Category, year: i32) -> Publication {
        Publication {
            id: id.to_string(),
            title: title.to_string(),
            category,
            year,
            pages: Some(24),
            issuu_url: Some(format!("https://issuu.com/lpmhimmahuii/docs/{id}")),
            pdf_file: None,
        }
    }

    /// Small mixed catalog used across integration tests
    pub fn sample_publications() -> Vec<Publication> {
        vec![
            publication("himmah-2020", "HIMMAH Edisi Reformasi", Category::Himmah, 2020),
            publication("muhibbah-1981", "MUHIBBAH No. 1 Th. XI", Category::Muhibbah, 1981),
            publication("kobar-1999", "KOBARkobari Edisi 12", Category::Kobarkobari, 1999),
            publication("himmah-2003", "HIMMAH Kampus dan Kita", Category::Himmah, 2003),
        ]
    }

    /// Settings rooted at `root` with a placeholder document for every
    /// publication under `root/pdfs`
    pub fn fixture_settings(root: &Path, publications: &[Publication]) -> Settings {
        let pdfs = root.join("pdfs");
        std::fs::create_dir_all(&pdfs).unwrap();
        for publication in publications {
            std::fs::write(pdfs.join(format!("{}.pdf", publication.id)), b"%PDF-1.4 fixture")
                .unwrap();
        }
        Settings {
            asset_root: root.to_path_buf(),
            pdf_base: "pdfs".to_string(),
            thumbnail_base: "thumbs".to_string(),
            fetch_timeout_secs: 2,
            ..Settings::default()
        }
    }

    /// App over a fixture catalog, backend and link opener. Catalog loading
    /// has finished when this returns.
    pub fn test_app(
        publications: Vec<Publication>,
        settings: &Settings,
        backend: FixtureBackend,
    ) -> App {
        let loader = CatalogLoader::with_builtin_fallback(Box::new(FixtureCatalog::new(
            "fixture",
            publications,
        )));
        let mut app = App::new(
            settings,
            loader,
            Box::new(backend),
            Box::new(MockLinkOpener::new()),
        );
        assert!(app.wait_for_catalog(Duration::from_secs(5)));
        app
    }

    /// Links recorded by the app's `MockLinkOpener`
    pub fn opened_links(app: &App) -> Vec<String> {
        app.link_opener
            .as_any()
            .downcast_ref::<MockLinkOpener>()
            .map(MockLinkOpener::opened)
            .unwrap_or_default()
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .search("1981")
            .navigate_down(2)
            .press_enter()
            .drag((10, 10), (5, 5))
            .quit();

        // '/', four digits, Enter, two moves, Enter, three mouse events, 'q'
        assert_eq!(scenario.events().len(), 13);
    }
}
