//! A text area wired to the recall engine, standing in for a web page.
//!
//! egui owns the widget; the document model mirrors its value, caret and
//! geometry so the engine sees the same thing it would on a page. Engine
//! edits flow back into the widget at the end of each frame.

use std::time::Instant;

use egui::text::{CCursor, CCursorRange};
use egui::text_edit::TextEditState;

use super::suggestions::{show_notice, show_panel};
use crate::engine::dom::{Rect, Viewport};
use crate::engine::{Document, Key, KeyOutcome, NodeId, PointerHit, RecallContext};
use crate::storage::StoreChannel;

const FIELD_ID: &str = "recall_playground";

pub struct Playground {
    doc: Document,
    field: NodeId,
    buffer: String,
    panel_rect: Option<egui::Rect>,
    field_rect: Option<egui::Rect>,
    shown_selection: Option<usize>,
}

impl Default for Playground {
    fn default() -> Self {
        Self::new()
    }
}

impl Playground {
    pub fn new() -> Self {
        let mut doc = Document::new();
        let field = doc.create_element("textarea");
        doc.append_child(doc.root(), field);
        Self {
            doc,
            field,
            buffer: String::new(),
            panel_rect: None,
            field_rect: None,
            shown_selection: None,
        }
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    fn field_id() -> egui::Id {
        egui::Id::new(FIELD_ID)
    }

    /// Keys the panel wants must be taken before the text area sees them.
    fn forward_keys<C: StoreChannel>(&mut self, ctx: &egui::Context, engine: &mut RecallContext<C>) {
        let Some(panel) = engine.panel() else {
            return;
        };
        let mut keys = vec![
            (egui::Key::ArrowDown, Key::ArrowDown),
            (egui::Key::ArrowUp, Key::ArrowUp),
            (egui::Key::Escape, Key::Escape),
        ];
        if panel.selected().is_some() {
            keys.push((egui::Key::Enter, Key::Enter));
        }

        for (pressed, key) in keys {
            if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, pressed)) {
                if engine.on_keydown(&mut self.doc, key) == KeyOutcome::Ignored {
                    log::debug!("Panel ignored {:?}", key);
                }
            }
        }
    }

    fn inserted_text(ctx: &egui::Context) -> Option<String> {
        let text: String = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Text(t) | egui::Event::Paste(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect()
        });
        (!text.is_empty()).then_some(text)
    }

    fn sync_geometry<C: StoreChannel>(&mut self, ctx: &egui::Context, rect: egui::Rect, engine: &mut RecallContext<C>) {
        let screen = ctx.screen_rect();
        let viewport = Viewport {
            width: screen.width(),
            height: screen.height(),
            scroll_x: 0.0,
            scroll_y: 0.0,
        };
        let moved = self.field_rect != Some(rect) || self.doc.viewport != viewport;
        self.doc
            .set_rect(self.field, Rect::new(rect.min.x, rect.min.y, rect.width(), rect.height()));
        self.doc.viewport = viewport;
        self.field_rect = Some(rect);
        if moved {
            engine.on_viewport_change(&self.doc);
        }
    }

    fn pointer_over_panel(&self, ctx: &egui::Context) -> bool {
        let pos = ctx.input(|i| i.pointer.interact_pos());
        matches!((self.panel_rect, pos), (Some(rect), Some(pos)) if rect.contains(pos))
    }

    /// Copies engine edits back into the widget and its cursor state.
    fn write_back(&mut self, ctx: &egui::Context) {
        let id = Self::field_id();
        let value = self.doc.value(self.field).unwrap_or_default();
        let selection = self.doc.selection_range(self.field);

        let Some(mut state) = TextEditState::load(ctx, id) else {
            return;
        };
        let current = state
            .cursor
            .char_range()
            .map(|r| (r.primary.index.min(r.secondary.index), r.primary.index.max(r.secondary.index)));

        if value != self.buffer || current != selection {
            self.buffer = value.to_string();
            if let Some((start, end)) = selection {
                state.cursor.set_char_range(Some(CCursorRange::two(CCursor::new(start), CCursor::new(end))));
                state.store(ctx, id);
            }
        }
        if self.doc.focused() == Some(self.field) {
            ctx.memory_mut(|m| m.request_focus(id));
        }
    }

    pub fn show<C: StoreChannel>(&mut self, ctx: &egui::Context, engine: &mut RecallContext<C>, now: Instant) {
        self.forward_keys(ctx, engine);
        let prefix = engine.config().trigger_prefix.clone();
        let enabled = engine.enabled();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Recall");
            ui.label(format!("Type {prefix} followed by a query to recall a saved snippet."));
            ui.add_space(10.0);

            let output = egui::TextEdit::multiline(&mut self.buffer)
                .id(Self::field_id())
                .desired_width(f32::INFINITY)
                .desired_rows(12)
                .show(ui);
            let response = output.response;
            self.sync_geometry(ctx, response.rect, engine);

            if response.gained_focus() {
                self.doc.focus(self.field);
                engine.on_focus_in(&mut self.doc, self.field);
            }

            let caret = output
                .state
                .cursor
                .char_range()
                .map(|r| (r.primary.index.min(r.secondary.index), r.primary.index.max(r.secondary.index)));
            if response.changed() {
                self.doc.set_value(self.field, &self.buffer);
                if let Some((start, end)) = caret {
                    self.doc.set_selection_range(self.field, start, end);
                }
                engine.on_input(&mut self.doc, self.field, Self::inserted_text(ctx).as_deref(), now);
            } else if caret.is_some() && caret != self.doc.selection_range(self.field) {
                if let Some((start, end)) = caret {
                    self.doc.set_selection_range(self.field, start, end);
                }
                engine.on_selection_change(&mut self.doc);
            }

            if response.lost_focus() && !self.pointer_over_panel(ctx) {
                self.doc.blur();
                engine.on_blur(&mut self.doc);
            }

            ui.add_space(6.0);
            ui.weak(if enabled {
                "Inline recall on (Ctrl+Super+/ to toggle, Ctrl+Super+PageUp to add a snippet)"
            } else {
                "Inline recall off (Ctrl+Super+/ to toggle)"
            });
        });

        engine.tick(&mut self.doc, now);
        engine.on_animation_frame(&mut self.doc);

        let selected = engine.panel().and_then(|p| p.selected());
        let scroll_to = selected.filter(|_| selected != self.shown_selection);
        self.shown_selection = selected;

        let row_height = engine.config().row_height;
        let response = engine
            .panel()
            .and_then(|panel| show_panel(ctx, panel, row_height, scroll_to));
        self.panel_rect = response.as_ref().map(|r| r.rect);

        let pressed = ctx.input(|i| i.pointer.any_pressed().then(|| i.pointer.interact_pos()).flatten());
        match (response.and_then(|r| r.hit), pressed) {
            (Some(hit), _) => engine.on_pointer_down(&mut self.doc, hit),
            (None, Some(pos)) if !self.pointer_over_panel(ctx) => {
                let hit = if self.field_rect.is_some_and(|r| r.contains(pos)) {
                    PointerHit::Element(self.field)
                } else {
                    PointerHit::Outside
                };
                engine.on_pointer_down(&mut self.doc, hit);
            }
            _ => {}
        }

        if let Some(notice) = engine.notice() {
            if show_notice(ctx, &notice) {
                engine.dismiss_notice();
            }
        }

        for event in self.doc.take_events() {
            log::trace!("Dispatched {:?}", event);
        }
        self.write_back(ctx);
    }
}
