//! Half-block page display
//!
//! Each terminal cell shows two vertically stacked pixels: the upper one as
//! the foreground of `▀`, the lower one as the background.

use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

use crate::pdf::PageBitmap;
use crate::reader::Pan;

const UPPER_HALF: &str = "▀";

pub struct PageView<'a> {
    bitmap: &'a PageBitmap,
    pan: Pan,
    background: Color,
}

impl<'a> PageView<'a> {
    pub fn new(bitmap: &'a PageBitmap, pan: Pan, background: Color) -> Self {
        Self {
            bitmap,
            pan,
            background,
        }
    }
}

fn to_color(rgb: [u8; 3]) -> Color {
    Color::Rgb(rgb[0], rgb[1], rgb[2])
}

impl Widget for PageView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let columns = u32::from(area.width);
        let visible = self.bitmap.width.saturating_sub(self.pan.x).min(columns);
        // Pages narrower than the area are centered
        let left = (columns - visible) / 2;

        for row in 0..area.height {
            let top_y = self.pan.y + u32::from(row) * 2;
            for col in 0..visible {
                let x = self.pan.x + col;
                let top = self.bitmap.pixel(x, top_y);
                let bottom = self.bitmap.pixel(x, top_y + 1);
                if top.is_none() && bottom.is_none() {
                    continue;
                }
                let position = (area.x + (left + col) as u16, area.y + row);
                if let Some(cell) = buf.cell_mut(position) {
                    cell.set_symbol(UPPER_HALF)
                        .set_fg(top.map_or(self.background, to_color))
                        .set_bg(bottom.map_or(self.background, to_color));
                }
            }
        }
    }
}
