// Export modules for use in tests and the binary
pub mod app;
pub mod assets;
pub mod cards;
pub mod catalog;
pub mod download;
pub mod event_source;
pub mod fetch;
pub mod link_opener;
pub mod panic_handler;
pub mod paths;
pub mod pdf;
pub mod reader;
pub mod settings;
pub mod theme;
pub mod thumbnails;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use app::{App, AppAction, Focus, run_app_with_event_source};
