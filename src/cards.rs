//! Card grid: the browse view of the filtered catalog

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::assets::AssetLocator;
use crate::catalog::{Category, Publication};
use crate::theme::Palette;

/// Display data for one publication
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub year: i32,
    pub pages: Option<u32>,
    pub thumbnail_url: String,
}

impl Card {
    pub fn label(&self) -> &str {
        self.category.label()
    }

    pub fn icon(&self) -> &'static str {
        self.category.icon()
    }

    pub fn pages_label(&self) -> Option<String> {
        self.pages.map(|n| format!("{n} pages"))
    }
}

/// What the grid area shows. `Loading` and `Empty` never coexist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridView {
    Loading,
    Empty,
    Cards(Vec<Card>),
}

/// Turn a filtered list into cards; an empty list is `Empty`, never `Loading`
pub fn build_grid(publications: &[&Publication], locator: &AssetLocator) -> GridView {
    if publications.is_empty() {
        return GridView::Empty;
    }
    GridView::Cards(
        publications
            .iter()
            .map(|p| Card {
                id: p.id.clone(),
                title: p.title.clone(),
                category: p.category.clone(),
                year: p.year,
                pages: p.pages,
                thumbnail_url: locator.thumbnail(p),
            })
            .collect(),
    )
}

/// Grid view plus cursor; activating a card yields its publication id
pub struct CardGrid {
    view: GridView,
    state: ListState,
}

impl Default for CardGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl CardGrid {
    pub fn new() -> Self {
        Self {
            view: GridView::Loading,
            state: ListState::default(),
        }
    }

    pub fn view(&self) -> &GridView {
        &self.view
    }

    /// Replace the cards, keeping the cursor on the same id when it survives
    pub fn set_view(&mut self, view: GridView) {
        let previous = self.selected_id().map(str::to_string);
        self.view = view;

        let selected = match &self.view {
            GridView::Cards(cards) => Some(
                previous
                    .and_then(|id| cards.iter().position(|c| c.id == id))
                    .unwrap_or(0),
            ),
            GridView::Loading | GridView::Empty => None,
        };
        self.state.select(selected);
    }

    fn cards(&self) -> &[Card] {
        match &self.view {
            GridView::Cards(cards) => cards,
            GridView::Loading | GridView::Empty => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.cards().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards().is_empty()
    }

    pub fn selected(&self) -> Option<&Card> {
        self.state.selected().and_then(|i| self.cards().get(i))
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected().map(|c| c.id.as_str())
    }

    pub fn move_down(&mut self) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let next = self.state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.state.select(Some(next));
    }

    pub fn move_up(&mut self) {
        if self.is_empty() {
            return;
        }
        let prev = self.state.selected().map_or(0, |i| i.saturating_sub(1));
        self.state.select(Some(prev));
    }

    /// Id of the card under the cursor, to be opened by the caller
    pub fn activate(&self) -> Option<String> {
        self.selected_id().map(str::to_string)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Palette, focused: bool) {
        let border = if focused { palette.border_focused } else { palette.border };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Publications ");

        match &self.view {
            GridView::Loading => {
                let text = Paragraph::new("Loading archive...")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(palette.muted))
                    .block(block);
                f.render_widget(text, area);
            }
            GridView::Empty => {
                let text = Paragraph::new(vec![
                    Line::from("No publications found"),
                    Line::from(Span::styled(
                        "Try another keyword or category",
                        Style::default().fg(palette.muted),
                    )),
                ])
                .alignment(Alignment::Center)
                .block(block);
                f.render_widget(text, area);
            }
            GridView::Cards(cards) => {
                // Borders, highlight symbol and icon
                let title_width = usize::from(area.width.saturating_sub(7));
                let block = match self.selected() {
                    Some(card) => block.title_bottom(Span::styled(
                        format!(" cover {} ", fit_title(&card.thumbnail_url, title_width)),
                        Style::default().fg(palette.muted),
                    )),
                    None => block,
                };
                let items: Vec<ListItem> = cards
                    .iter()
                    .map(|c| card_item(c, title_width, palette))
                    .collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_style(
                        Style::default()
                            .bg(palette.selection_bg)
                            .fg(palette.selection_fg)
                            .add_modifier(Modifier::BOLD),
                    )
                    .highlight_symbol("▶ ");
                f.render_stateful_widget(list, area, &mut self.state);
            }
        }
    }
}

/// Cut `title` to at most `max_width` columns, ending in an ellipsis when cut
pub fn fit_title(title: &str, max_width: usize) -> String {
    if title.width() <= max_width {
        return title.to_string();
    }
    let budget = max_width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in title.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    if max_width > 0 {
        out.push('…');
    }
    out
}

fn card_item(card: &Card, title_width: usize, palette: &Palette) -> ListItem<'static> {
    let mut meta = vec![
        Span::raw("   "),
        Span::styled(
            format!("[{}]", card.label()),
            Style::default().fg(palette.category(&card.category)),
        ),
        Span::styled(format!("  {}", card.year), Style::default().fg(palette.muted)),
    ];
    if let Some(pages) = card.pages_label() {
        meta.push(Span::styled(format!("  {pages}"), Style::default().fg(palette.muted)));
    }

    ListItem::new(vec![
        Line::from(vec![
            Span::raw(format!("{} ", card.icon())),
            Span::styled(fit_title(&card.title, title_width), Style::default().fg(palette.text)),
        ]),
        Line::from(meta),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(id: &str, year: i32) -> Publication {
        Publication {
            id: id.to_string(),
            title: format!("Issue {id}"),
            category: Category::Kobarkobari,
            year,
            pages: Some(12),
            issuu_url: None,
            pdf_file: None,
        }
    }

    fn locator() -> AssetLocator {
        AssetLocator::new("https://cdn.example.org", "https://cdn.example.org/thumbnails")
    }

    #[test]
    fn long_titles_are_cut_to_display_width() {
        assert_eq!(fit_title("HIMMAH", 10), "HIMMAH");
        assert_eq!(fit_title("Majalah MUHIBBAH", 8), "Majalah…");
        // Wide characters count double
        assert_eq!(fit_title("雑誌雑誌", 5), "雑誌…");
        assert_eq!(fit_title("abc", 0), "");
    }

    #[test]
    fn empty_result_is_distinct_from_loading() {
        assert_eq!(build_grid(&[], &locator()), GridView::Empty);
        assert_eq!(CardGrid::new().view(), &GridView::Loading);
    }

    #[test]
    fn cards_carry_labels_and_thumbnail() {
        let p = publication("k1", 1995);
        let GridView::Cards(cards) = build_grid(&[&p], &locator()) else {
            panic!("expected cards");
        };
        assert_eq!(cards[0].label(), "KOBARKobari");
        assert_eq!(cards[0].pages_label().as_deref(), Some("12 pages"));
        assert_eq!(cards[0].thumbnail_url, "https://cdn.example.org/thumbnails/k1.jpg");
    }

    #[test]
    fn selection_survives_refilter_when_card_remains() {
        let (a, b, c) = (publication("a", 2000), publication("b", 1999), publication("c", 1998));
        let mut grid = CardGrid::new();
        grid.set_view(build_grid(&[&a, &b, &c], &locator()));
        grid.move_down();
        assert_eq!(grid.activate().as_deref(), Some("b"));

        grid.set_view(build_grid(&[&b, &c], &locator()));
        assert_eq!(grid.selected_id(), Some("b"));

        grid.set_view(build_grid(&[&c], &locator()));
        assert_eq!(grid.selected_id(), Some("c"));
    }

    #[test]
    fn cursor_is_bounded() {
        let (a, b) = (publication("a", 2000), publication("b", 1999));
        let mut grid = CardGrid::new();
        grid.set_view(build_grid(&[&a, &b], &locator()));
        grid.move_up();
        assert_eq!(grid.selected_id(), Some("a"));
        grid.move_down();
        grid.move_down();
        assert_eq!(grid.selected_id(), Some("b"));
    }

    #[test]
    fn empty_grid_activates_nothing() {
        let mut grid = CardGrid::new();
        grid.set_view(GridView::Empty);
        grid.move_down();
        assert_eq!(grid.activate(), None);
    }
}
