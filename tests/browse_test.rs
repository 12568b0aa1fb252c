use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use arsip::app::{Focus, SEARCH_DEBOUNCE};
use arsip::cards::GridView;
use arsip::catalog::{CatalogLoader, Category, CategoryFilter, FetchedCatalog};
use arsip::event_source::SimulatedEventSource;
use arsip::fetch::{Fetcher, Location};
use arsip::link_opener::MockLinkOpener;
use arsip::reader::ReaderPhase;
use arsip::run_app_with_event_source;
use arsip::test_utils::test_helpers::*;
use arsip::widget::HudMode;
use arsip::App;
use tempfile::TempDir;

fn sample_app() -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let publications = sample_publications();
    let settings = fixture_settings(dir.path(), &publications);
    let app = test_app(publications, &settings, FixtureBackend::new(4));
    (dir, app)
}

fn card_ids(app: &App) -> Vec<String> {
    match app.grid().view() {
        GridView::Cards(cards) => cards.iter().map(|c| c.id.clone()).collect(),
        other => panic!("expected cards, got {other:?}"),
    }
}

fn run(app: &mut App, scenario: TestScenarioBuilder) -> String {
    let mut terminal = create_test_terminal(80, 30);
    let mut event_source = scenario.build();
    run_app_with_event_source(&mut terminal, app, &mut event_source).unwrap();
    terminal.draw(|f| app.draw(f)).unwrap();
    capture_terminal_state(&terminal)
}

#[test]
fn grid_lists_newest_first_with_header_count() {
    let (_dir, mut app) = sample_app();
    let screen = run(&mut app, TestScenarioBuilder::new());

    assert_eq!(
        card_ids(&app),
        ["himmah-2020", "himmah-2003", "kobar-1999", "muhibbah-1981"]
    );
    assert!(screen.contains("4+ publications"), "screen:\n{screen}");
    assert!(screen.contains("HIMMAH Edisi Reformasi"));
    assert!(screen.contains("[MUHIBBAH]  1981  24 pages"));
    assert!(!screen.contains("offline sample"));
}

#[test]
fn grid_footer_shows_cover_of_selected_card() {
    let (_dir, mut app) = sample_app();
    let screen = run(&mut app, TestScenarioBuilder::new().navigate_down(2));
    assert!(screen.contains("cover thumbs/kobar-1999.jpg"), "screen:\n{screen}");
    assert!(!screen.contains("thumbs/himmah-2020.jpg"));
}

#[test]
fn search_by_year_narrows_grid() {
    let (_dir, mut app) = sample_app();
    let screen = run(&mut app, TestScenarioBuilder::new().search("1981"));

    assert_eq!(app.filter().query, "1981");
    assert_eq!(app.focus(), Focus::Grid);
    assert_eq!(card_ids(&app), ["muhibbah-1981"]);
    assert!(screen.contains("MUHIBBAH No. 1 Th. XI"));
    assert!(!screen.contains("KOBARkobari Edisi 12"));
}

#[test]
fn search_matches_category_name_case_insensitively() {
    let (_dir, mut app) = sample_app();
    run(&mut app, TestScenarioBuilder::new().search("KOBAR"));
    assert_eq!(card_ids(&app), ["kobar-1999"]);
}

#[test]
fn no_matches_shows_empty_state_not_loading() {
    let (_dir, mut app) = sample_app();
    let screen = run(&mut app, TestScenarioBuilder::new().search("majalah tempo"));

    assert_eq!(app.grid().view(), &GridView::Empty);
    assert!(screen.contains("No publications found"));
    assert!(!screen.contains("Loading archive"));
}

#[test]
fn q_typed_into_search_does_not_quit() {
    let (_dir, mut app) = sample_app();
    run(
        &mut app,
        TestScenarioBuilder::new()
            .press_char('/')
            .type_text("q")
            .press_enter(),
    );
    assert_eq!(app.filter().query, "q");
}

#[test]
fn tab_cycles_categories_and_combines_with_search() {
    let (_dir, mut app) = sample_app();

    run(&mut app, TestScenarioBuilder::new().press_tab().press_tab());
    assert_eq!(app.filter().category, CategoryFilter::Only(Category::Himmah));
    assert_eq!(card_ids(&app), ["himmah-2020", "himmah-2003"]);

    let screen = run(&mut app, TestScenarioBuilder::new().search("2003"));
    assert_eq!(card_ids(&app), ["himmah-2003"]);
    assert!(screen.contains("HIMMAH Kampus dan Kita"));

    // Back around to "All"
    run(&mut app, TestScenarioBuilder::new().press_tab().press_tab());
    assert_eq!(app.filter().category, CategoryFilter::All);
    assert_eq!(card_ids(&app), ["himmah-2003"]);
}

#[test]
fn typing_applies_after_debounce() {
    let (_dir, mut app) = sample_app();
    app.handle_event(&SimulatedEventSource::char_key('/'));
    for c in "1999".chars() {
        app.handle_event(&SimulatedEventSource::char_key(c));
    }
    assert_eq!(app.search_text(), "1999");
    assert_eq!(app.focus(), Focus::Search);

    let now = Instant::now();
    app.tick_at(now);
    assert_eq!(app.filter().query, "");
    assert_eq!(card_ids(&app).len(), 4);

    app.tick_at(now + SEARCH_DEBOUNCE + Duration::from_millis(10));
    assert_eq!(app.filter().query, "1999");
    assert_eq!(card_ids(&app), ["kobar-1999"]);
    assert_eq!(app.focus(), Focus::Search);
}

#[test]
fn selection_follows_navigation_and_enter_opens_reader() {
    let (_dir, mut app) = sample_app();
    run(
        &mut app,
        TestScenarioBuilder::new().navigate_down(3).navigate_up(1),
    );
    assert_eq!(app.grid().selected_id(), Some("kobar-1999"));

    run(&mut app, TestScenarioBuilder::new().press_enter());
    let session = app.reader().session().unwrap();
    assert_eq!(session.publication().id, "kobar-1999");
    assert_eq!(session.document(), "pdfs/kobar-1999.pdf");

    assert!(app.settle(Duration::from_secs(5)));
    assert_eq!(app.reader().phase(), ReaderPhase::Ready);
    let screen = run(&mut app, TestScenarioBuilder::new());
    assert!(screen.contains("Page 1 / 4"), "screen:\n{screen}");
    assert!(screen.contains("Zoom 100%"));
    assert!(screen.contains("download PDF"));
}

#[test]
fn unreachable_catalog_falls_back_to_sample() {
    let dir = TempDir::new().unwrap();
    let settings = fixture_settings(dir.path(), &[]);
    let primary = FetchedCatalog::new(
        Location::parse("missing/publications.json", dir.path()),
        Fetcher::new(Duration::from_secs(1)),
    );
    let mut app = App::new(
        &settings,
        CatalogLoader::with_builtin_fallback(Box::new(primary)),
        Box::new(FixtureBackend::new(1)),
        Box::new(MockLinkOpener::new()),
    );
    assert!(app.wait_for_catalog(Duration::from_secs(5)));

    assert!(app.is_degraded());
    assert_eq!(app.catalog().unwrap().len(), 1);
    assert_eq!(app.hud().unwrap().mode, HudMode::Error);

    let screen = run(&mut app, TestScenarioBuilder::new());
    assert!(screen.contains("1+ publications"));
    assert!(screen.contains("(offline sample)"));
    assert!(screen.contains("Reuni NU"));
}

#[test]
fn stalled_catalog_server_degrades_within_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/publications.json", listener.local_addr().unwrap());
    thread::spawn(move || {
        // Hold the connection open without answering
        if let Ok((_stream, _)) = listener.accept() {
            thread::sleep(Duration::from_secs(10));
        }
    });

    let dir = TempDir::new().unwrap();
    let settings = fixture_settings(dir.path(), &[]);
    let primary = FetchedCatalog::new(Location::Remote(url), Fetcher::new(Duration::from_secs(1)));
    let started = Instant::now();
    let mut app = App::new(
        &settings,
        CatalogLoader::with_builtin_fallback(Box::new(primary)),
        Box::new(FixtureBackend::new(1)),
        Box::new(MockLinkOpener::new()),
    );
    assert!(app.wait_for_catalog(Duration::from_secs(5)));

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(app.is_degraded());
    assert_eq!(app.catalog().unwrap().len(), 1);
    assert_eq!(app.hud().unwrap().mode, HudMode::Error);
}

#[test]
fn local_catalog_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("publications.json"),
        r#"[
            {"id": "himmah-1990", "title": "HIMMAH 1990", "category": "himmah", "year": 1990},
            {"id": "buletin-1", "title": "Buletin", "category": "buletin", "year": 1995, "pages": 8}
        ]"#,
    )
    .unwrap();
    let settings = fixture_settings(dir.path(), &[]);
    let primary = FetchedCatalog::new(
        Location::parse("./publications.json", dir.path()),
        Fetcher::new(Duration::from_secs(1)),
    );
    let mut app = App::new(
        &settings,
        CatalogLoader::with_builtin_fallback(Box::new(primary)),
        Box::new(FixtureBackend::new(1)),
        Box::new(MockLinkOpener::new()),
    );
    assert!(app.wait_for_catalog(Duration::from_secs(5)));

    assert!(!app.is_degraded());
    assert_eq!(card_ids(&app), ["buletin-1", "himmah-1990"]);
    let catalog = app.catalog().unwrap();
    assert_eq!(
        catalog.get("buletin-1").unwrap().category,
        Category::Other("buletin".into())
    );

    // Unknown categories appear under "All" only
    run(&mut app, TestScenarioBuilder::new().press_tab().press_tab());
    assert_eq!(card_ids(&app), ["himmah-1990"]);

    // Searched and labelled by their own name
    run(&mut app, TestScenarioBuilder::new().press_tab().press_tab());
    let screen = run(&mut app, TestScenarioBuilder::new().search("buletin"));
    assert_eq!(card_ids(&app), ["buletin-1"]);
    assert!(screen.contains("[buletin]  1995  8 pages"), "screen:\n{screen}");
}
