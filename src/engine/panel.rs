use super::dom::{NodeId, Rect, Viewport};
use crate::config::RecallConfig;
use crate::storage::Snippet;

pub const NO_RESULTS_LABEL: &str = "No matching snippets.";
pub const UNTITLED: &str = "Untitled";
const BOOKMARK_MARK: &str = "★ ";
const EDGE_MARGIN: f32 = 4.0;
const ANCHOR_GAP: f32 = 5.0;
const FLIP_SLACK: f32 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelRow {
    Item { index: usize, label: String },
    More(usize),
    NoResults,
}

impl PanelRow {
    pub fn text(&self) -> String {
        match self {
            PanelRow::Item { label, .. } => label.clone(),
            PanelRow::More(n) => format!("+ {n} more"),
            PanelRow::NoResults => NO_RESULTS_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    Moved(usize),
    Insert(usize),
    Close,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelLayout {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelStyle {
    pub max_displayed: usize,
    pub max_height: f32,
    pub min_width: f32,
    pub row_height: f32,
    pub title_limit: usize,
    pub content_limit: usize,
}

impl From<&RecallConfig> for PanelStyle {
    fn from(config: &RecallConfig) -> Self {
        Self {
            max_displayed: config.max_displayed_items,
            max_height: config.panel_max_height,
            min_width: config.panel_min_width,
            row_height: config.row_height,
            title_limit: config.title_preview_limit,
            content_limit: config.content_preview_limit,
        }
    }
}

impl Default for PanelStyle {
    fn default() -> Self {
        Self::from(&RecallConfig::default())
    }
}

/// Strips markup brackets and script schemes and collapses whitespace.
pub fn sanitize_for_display(input: &str) -> String {
    const SCHEME: &str = "javascript:";

    let bracketless: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let mut cleaned = String::with_capacity(bracketless.len());
    let mut rest = bracketless.as_str();
    while let Some(pos) = rest.to_ascii_lowercase().find(SCHEME) {
        cleaned.push_str(&rest[..pos]);
        rest = &rest[pos + SCHEME.len()..];
    }
    cleaned.push_str(rest);

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate(text: &str, limit: usize) -> String {
    if limit == 0 || text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push('…');
    out
}

pub fn row_label(snippet: &Snippet, style: &PanelStyle) -> String {
    let title = if snippet.title.is_empty() { UNTITLED } else { &snippet.title };
    let title = truncate(&sanitize_for_display(title), style.title_limit);
    let preview = truncate(&sanitize_for_display(&snippet.content), style.content_limit);

    let mut label = String::new();
    if snippet.is_bookmarked {
        label.push_str(BOOKMARK_MARK);
    }
    label.push_str(&title);
    if !preview.is_empty() {
        label.push_str(" - ");
        label.push_str(&preview);
    }
    label
}

/// Places a `width` × `height` panel under the anchor, or above it when the
/// space below is short, keeping it horizontally on screen.
pub fn compute_layout(anchor: Rect, viewport: Viewport, width: f32, height: f32) -> PanelLayout {
    let space_below = viewport.height - anchor.bottom();
    let space_above = anchor.top();
    let placement = if space_below < height + FLIP_SLACK && space_above >= space_below {
        Placement::Above
    } else {
        Placement::Below
    };

    let top = match placement {
        Placement::Above => viewport.scroll_y + anchor.top() - height - ANCHOR_GAP,
        Placement::Below => viewport.scroll_y + anchor.bottom() + ANCHOR_GAP,
    };

    let min_left = viewport.scroll_x + EDGE_MARGIN;
    let max_left = viewport.scroll_x + viewport.width - width - EDGE_MARGIN;
    let mut left = viewport.scroll_x + anchor.left();
    if left < min_left {
        left = min_left;
    }
    if left > max_left {
        left = min_left.max(max_left);
    }

    PanelLayout {
        top,
        left,
        width,
        height,
        placement,
    }
}

#[derive(Debug, Clone)]
pub struct SuggestionPanel {
    anchor: NodeId,
    query: String,
    items: Vec<Snippet>,
    rows: Vec<PanelRow>,
    selected: Option<usize>,
    scroll_top: usize,
    layout: Option<PanelLayout>,
    style: PanelStyle,
}

impl SuggestionPanel {
    pub fn new(anchor: NodeId, query: &str, items: &[Snippet], style: PanelStyle) -> Self {
        let shown = items.len().min(style.max_displayed);
        let mut rows: Vec<PanelRow> = items[..shown]
            .iter()
            .enumerate()
            .map(|(index, snippet)| PanelRow::Item {
                index,
                label: row_label(snippet, &style),
            })
            .collect();
        if items.len() > shown {
            rows.push(PanelRow::More(items.len() - shown));
        }
        if rows.is_empty() {
            rows.push(PanelRow::NoResults);
        }

        Self {
            anchor,
            query: query.to_string(),
            items: items[..shown].to_vec(),
            rows,
            selected: None,
            scroll_top: 0,
            layout: None,
            style,
        }
    }

    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn items(&self) -> &[Snippet] {
        &self.items
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_snippet(&self) -> Option<&Snippet> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn layout(&self) -> Option<PanelLayout> {
        self.layout
    }

    /// Rows that fit in the panel without scrolling.
    pub fn window_rows(&self) -> usize {
        ((self.style.max_height / self.style.row_height).floor() as usize).max(1)
    }

    pub fn select_next(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let next = self.selected.map_or(0, |i| (i + 1) % len);
        self.select(next)
    }

    pub fn select_previous(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let previous = self.selected.map_or(len - 1, |i| (i + len - 1) % len);
        self.select(previous)
    }

    fn select(&mut self, index: usize) -> Option<usize> {
        self.selected = Some(index);
        let window = self.window_rows();
        if index < self.scroll_top {
            self.scroll_top = index;
        } else if index >= self.scroll_top + window {
            self.scroll_top = index + 1 - window;
        }
        self.selected
    }

    pub fn handle_key(&mut self, key: Key) -> PanelCommand {
        match key {
            Key::ArrowDown => self.select_next().map_or(PanelCommand::Ignore, PanelCommand::Moved),
            Key::ArrowUp => self.select_previous().map_or(PanelCommand::Ignore, PanelCommand::Moved),
            Key::Enter => match self.selected {
                Some(index) => PanelCommand::Insert(index),
                None => PanelCommand::Close,
            },
            Key::Escape => PanelCommand::Close,
            Key::Other => PanelCommand::Ignore,
        }
    }

    pub fn position(&mut self, anchor: Rect, viewport: Viewport) -> PanelLayout {
        let height = (self.rows.len() as f32 * self.style.row_height).min(self.style.max_height);
        let width = self.style.min_width.max(anchor.width);
        let layout = compute_layout(anchor, viewport, width, height);
        self.layout = Some(layout);
        layout
    }
}
