use ratatui::style::Color;

use crate::catalog::Category;

// Colors used by the browse view, the reader overlay and the HUD
#[derive(Clone, Debug)]
pub struct Palette {
    pub background: Color,
    pub panel: Color,    // Reader desk background
    pub border: Color,   // Unfocused borders
    pub border_focused: Color,
    pub muted: Color,    // Secondary text
    pub text: Color,
    pub bright: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub error: Color,
    pub accent: Color,
    pub muhibbah: Color,
    pub himmah: Color,
    pub kobarkobari: Color,
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// Oceanic Next
pub const OCEANIC_NEXT: Palette = Palette {
    background: rgb(0x1B2B34),
    panel: rgb(0x343D46),
    border: rgb(0x65737E),
    border_focused: rgb(0xA7ADBA),
    muted: rgb(0x65737E),
    text: rgb(0xC0C5CE),
    bright: rgb(0xF0F4F8),
    selection_bg: rgb(0x4F5B66),
    selection_fg: rgb(0xCDD3DE),
    error: rgb(0xEC5F67),
    accent: rgb(0x6699CC),
    muhibbah: rgb(0xFAC863),
    himmah: rgb(0x99C794),
    kobarkobari: rgb(0xF99157),
};

impl Palette {
    pub fn category(&self, category: &Category) -> Color {
        match category {
            Category::Muhibbah => self.muhibbah,
            Category::Himmah => self.himmah,
            Category::Kobarkobari => self.kobarkobari,
            Category::Other(_) => self.muted,
        }
    }
}

pub fn current_theme() -> &'static Palette {
    &OCEANIC_NEXT
}
