use std::time::Duration;

use arsip::catalog::{Category, Publication};
use arsip::event_source::{KeyCode, MouseButton, MouseEventKind, SimulatedEventSource};
use arsip::reader::{ReaderPhase, Viewport, Zoom};
use arsip::test_utils::test_helpers::*;
use arsip::widget::HudMode;
use arsip::{App, AppAction};
use tempfile::TempDir;

const SETTLE: Duration = Duration::from_secs(5);

fn press(app: &mut App, code: KeyCode) -> Option<AppAction> {
    app.handle_event(&SimulatedEventSource::key(code))
}

fn type_keys(app: &mut App, keys: &str) {
    for c in keys.chars() {
        app.handle_event(&SimulatedEventSource::char_key(c));
    }
}

/// App with a single publication selected and opened
fn open_single(publication: Publication, backend: FixtureBackend) -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let settings = fixture_settings(dir.path(), std::slice::from_ref(&publication));
    let mut app = test_app(vec![publication], &settings, backend);
    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE), "reader did not settle");
    (dir, app)
}

fn current_page(app: &App) -> usize {
    app.reader().session().unwrap().current_page()
}

fn shown_page(app: &App) -> Option<usize> {
    app.reader().session().unwrap().frame().map(|f| f.page)
}

#[test]
fn opening_a_card_renders_first_page() {
    let backend = FixtureBackend::new(12);
    let (dir, app) = open_single(
        publication("himmah-2020", "HIMMAH Edisi Reformasi", Category::Himmah, 2020),
        backend.clone(),
    );

    assert_eq!(app.reader().phase(), ReaderPhase::Ready);
    let session = app.reader().session().unwrap();
    assert_eq!(session.total_pages(), Some(12));
    assert_eq!(shown_page(&app), Some(1));
    // Fixture color [20, 235, 128] under the paper tint
    assert_eq!(session.frame().unwrap().pixel(0, 0), Some([19, 234, 127]));
    assert_eq!(backend.opened(), [dir.path().join("pdfs/himmah-2020.pdf")]);
    assert!(app.input_bridge().is_some());
}

#[test]
fn paging_stays_within_document() {
    let (_dir, mut app) = open_single(
        publication("kobar-1999", "KOBARkobari Edisi 12", Category::Kobarkobari, 1999),
        FixtureBackend::new(3),
    );

    press(&mut app, KeyCode::Left);
    assert!(app.settle(SETTLE));
    assert_eq!(current_page(&app), 1);

    for _ in 0..5 {
        press(&mut app, KeyCode::Right);
        assert!(app.settle(SETTLE));
    }
    assert_eq!(current_page(&app), 3);
    assert_eq!(shown_page(&app), Some(3));

    press(&mut app, KeyCode::Up);
    assert!(app.settle(SETTLE));
    assert_eq!(shown_page(&app), Some(2));
}

#[test]
fn go_to_page_prompt_ignores_out_of_range_numbers() {
    let (_dir, mut app) = open_single(
        publication("muhibbah-1981", "MUHIBBAH No. 1", Category::Muhibbah, 1981),
        FixtureBackend::new(40),
    );

    type_keys(&mut app, "g25");
    assert_eq!(
        app.input_bridge().and_then(|b| b.page_input()).map(|p| p.text()),
        Some("25")
    );
    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));
    assert_eq!(shown_page(&app), Some(25));

    type_keys(&mut app, "g41");
    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));
    assert_eq!(current_page(&app), 25);

    type_keys(&mut app, "g0");
    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));
    assert_eq!(current_page(&app), 25);
}

#[test]
fn rapid_paging_renders_only_the_latest_request() {
    let backend = FixtureBackend::new(20).with_render_delay(Duration::from_millis(30));
    let (_dir, mut app) = open_single(
        publication("himmah-2003", "HIMMAH Kampus dan Kita", Category::Himmah, 2003),
        backend,
    );

    for _ in 0..6 {
        press(&mut app, KeyCode::Right);
    }
    let scheduler = app.reader().session().unwrap().scheduler();
    assert_eq!(scheduler.in_flight(), Some(2));
    assert_eq!(scheduler.pending(), Some(7));

    assert!(app.settle(SETTLE));
    assert_eq!(current_page(&app), 7);
    assert_eq!(shown_page(&app), Some(7));
}

#[test]
fn zoom_keys_and_wheel_stay_in_bounds() {
    let (_dir, mut app) = open_single(
        publication("himmah-2020", "HIMMAH Edisi Reformasi", Category::Himmah, 2020),
        FixtureBackend::new(2),
    );
    let zoom = |app: &App| app.reader().session().unwrap().zoom();

    for _ in 0..20 {
        press(&mut app, KeyCode::Char('+'));
    }
    assert!(app.settle(SETTLE));
    assert_eq!(zoom(&app), Zoom::new(Zoom::MAX_FACTOR));

    press(&mut app, KeyCode::Char('0'));
    assert!(app.settle(SETTLE));
    assert_eq!(zoom(&app), Zoom::default());

    for _ in 0..20 {
        app.handle_event(&SimulatedEventSource::mouse(MouseEventKind::ScrollDown, 5, 5));
    }
    assert!(app.settle(SETTLE));
    assert_eq!(zoom(&app), Zoom::new(Zoom::MIN_FACTOR));
}

#[test]
fn dragging_a_magnified_page_pans_it() {
    let dir = TempDir::new().unwrap();
    let publication = publication("kobar-1999", "KOBARkobari", Category::Kobarkobari, 1999);
    let settings = fixture_settings(dir.path(), std::slice::from_ref(&publication));
    // Landscape pages overflow the viewport both ways once magnified
    let backend = FixtureBackend::new(4).with_page_size(842.0, 595.0);
    let mut app = test_app(vec![publication], &settings, backend);

    let mut terminal = create_test_terminal(80, 24);
    press(&mut app, KeyCode::Enter);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(app.settle(SETTLE));
    assert_ne!(app.reader().viewport(), Viewport::default());

    press(&mut app, KeyCode::Char('+'));
    press(&mut app, KeyCode::Char('+'));
    assert!(app.settle(SETTLE));

    app.handle_event(&SimulatedEventSource::mouse(
        MouseEventKind::Down(MouseButton::Left),
        40,
        12,
    ));
    app.handle_event(&SimulatedEventSource::mouse(
        MouseEventKind::Drag(MouseButton::Left),
        36,
        10,
    ));
    app.handle_event(&SimulatedEventSource::mouse(
        MouseEventKind::Up(MouseButton::Left),
        36,
        10,
    ));

    let pan = app.reader().session().unwrap().pan();
    assert_eq!((pan.x, pan.y), (6, 6));
    assert!(!app.input_bridge().unwrap().is_dragging());
}

#[test]
fn render_failure_shows_notice_and_keeps_session() {
    let (_dir, mut app) = open_single(
        publication("himmah-2020", "HIMMAH Edisi Reformasi", Category::Himmah, 2020),
        FixtureBackend::new(5).failing_on(2),
    );

    press(&mut app, KeyCode::Right);
    assert!(app.settle(SETTLE));

    let session = app.reader().session().unwrap();
    assert_eq!(app.reader().phase(), ReaderPhase::Ready);
    assert_eq!(session.current_page(), 2);
    assert!(!session.is_rendering());
    assert!(session.page_error().unwrap().contains("corrupt page stream"));
    // Previous frame stays on screen
    assert_eq!(shown_page(&app), Some(1));

    let hud = app.hud().unwrap();
    assert_eq!(hud.mode, HudMode::Error);
    assert!(hud.message.contains("Page 2"));

    press(&mut app, KeyCode::Right);
    assert!(app.settle(SETTLE));
    assert_eq!(shown_page(&app), Some(3));
    assert!(app.reader().session().unwrap().page_error().is_none());
}

#[test]
fn escape_closes_reader_and_returns_to_grid() {
    let (_dir, mut app) = open_single(
        publication("himmah-2020", "HIMMAH Edisi Reformasi", Category::Himmah, 2020),
        FixtureBackend::new(5),
    );

    // 'q' does not quit from inside the reader
    assert_eq!(press(&mut app, KeyCode::Char('q')), None);
    assert!(app.reader().is_open());

    press(&mut app, KeyCode::Esc);
    assert_eq!(app.reader().phase(), ReaderPhase::Closed);
    assert!(app.input_bridge().is_none());
    assert_eq!(app.grid().selected_id(), Some("himmah-2020"));

    assert_eq!(press(&mut app, KeyCode::Char('q')), Some(AppAction::Quit));
}

#[test]
fn missing_document_offers_direct_and_issuu_links() {
    let dir = TempDir::new().unwrap();
    let settings = fixture_settings(dir.path(), &[]);
    let publication = publication("muhibbah-1981", "MUHIBBAH No. 1", Category::Muhibbah, 1981);
    let mut app = test_app(vec![publication], &settings, FixtureBackend::new(10));

    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));

    let ReaderPhase::Failed(failure) = app.reader().phase() else {
        panic!("expected a load failure, got {:?}", app.reader().phase());
    };
    assert_eq!(failure.document, "pdfs/muhibbah-1981.pdf");
    assert!(app.input_bridge().is_none());

    // Navigation does nothing on the failure panel
    press(&mut app, KeyCode::Right);
    assert!(matches!(app.reader().phase(), ReaderPhase::Failed(_)));

    press(&mut app, KeyCode::Char('o'));
    press(&mut app, KeyCode::Char('i'));
    assert_eq!(
        opened_links(&app),
        [
            dir.path().join("pdfs/muhibbah-1981.pdf").display().to_string(),
            "https://issuu.com/lpmhimmahuii/docs/muhibbah-1981".to_string(),
        ]
    );

    press(&mut app, KeyCode::Esc);
    assert!(!app.reader().is_open());
}

#[test]
fn download_key_opens_document_unless_typing_a_page() {
    let (dir, mut app) = open_single(
        publication("himmah-2003", "HIMMAH Kampus dan Kita", Category::Himmah, 2003),
        FixtureBackend::new(5),
    );

    type_keys(&mut app, "g");
    press(&mut app, KeyCode::Char('o'));
    assert!(opened_links(&app).is_empty());
    press(&mut app, KeyCode::Esc);
    assert!(app.reader().is_open());

    press(&mut app, KeyCode::Char('o'));
    assert_eq!(
        opened_links(&app),
        [dir.path().join("pdfs/himmah-2003.pdf").display().to_string()]
    );
    assert_eq!(app.hud().unwrap().mode, HudMode::Normal);
}

#[test]
fn reopening_starts_a_fresh_session() {
    let dir = TempDir::new().unwrap();
    let publications = sample_publications();
    let settings = fixture_settings(dir.path(), &publications);
    let mut app = test_app(publications, &settings, FixtureBackend::new(8));

    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));
    let first = app.reader().session().unwrap().id();
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Char('+'));
    press(&mut app, KeyCode::Esc);

    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert!(app.settle(SETTLE));
    // Late results from the first session must not leak in
    app.tick();

    let session = app.reader().session().unwrap();
    assert_ne!(session.id(), first);
    assert_eq!(session.publication().id, "himmah-2003");
    assert_eq!(session.current_page(), 1);
    assert_eq!(session.zoom(), Zoom::default());
    assert_eq!(shown_page(&app), Some(1));
}
