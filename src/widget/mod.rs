pub mod hud_message;
pub mod page_view;
pub mod reader_view;

pub use hud_message::{HudMessage, HudMode};
pub use page_view::PageView;
pub use reader_view::{ReaderLayout, render_reader};
