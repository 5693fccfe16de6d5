use crate::storage::SnippetDraft;

pub enum AddWindowAction {
    Save(SnippetDraft),
    Cancel,
}

#[derive(Default)]
pub struct AddWindowState {
    title: String,
    content: String,
    tags: String,
    bookmarked: bool,
    first_frame: bool,
}

/// Comma separated tags, trimmed, blanks dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

impl AddWindowState {
    pub fn new() -> Self {
        Self {
            first_frame: true,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn take_draft(&mut self) -> SnippetDraft {
        let draft = SnippetDraft {
            title: std::mem::take(&mut self.title),
            content: std::mem::take(&mut self.content),
            tags: parse_tags(&self.tags),
            is_bookmarked: self.bookmarked,
        };
        self.reset();
        draft
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Option<AddWindowAction> {
        let mut save_triggered = false;
        let mut close_triggered = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Add New Snippet");
            ui.add_space(10.0);

            egui::Grid::new("snippet_fields")
                .num_columns(2)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Title");
                    let title = ui.add(
                        egui::TextEdit::singleline(&mut self.title)
                            .hint_text("Defaults to the start of the content")
                            .desired_width(f32::INFINITY),
                    );
                    if self.first_frame {
                        title.request_focus();
                        self.first_frame = false;
                    }
                    ui.end_row();

                    ui.label("Tags");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.tags)
                            .hint_text("comma, separated")
                            .desired_width(f32::INFINITY),
                    );
                    ui.end_row();
                });

            ui.checkbox(&mut self.bookmarked, "★ Bookmark");
            ui.add_space(6.0);

            egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut self.content)
                        .hint_text("Snippet content")
                        .desired_width(f32::INFINITY)
                        .desired_rows(8),
                );
            });

            ui.add_space(10.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                let can_save = !self.content.trim().is_empty();
                if ui
                    .add_enabled(can_save, egui::Button::new("Save and Close (Ctrl+Enter)"))
                    .clicked()
                {
                    save_triggered = true;
                }
                if ui.button("Cancel (Esc)").clicked() {
                    close_triggered = true;
                }
            });
        });

        ctx.input_mut(|i| {
            if i.consume_key(egui::Modifiers::CTRL, egui::Key::Enter) {
                save_triggered = true;
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::Escape) {
                close_triggered = true;
            }
        });

        if save_triggered && !self.content.trim().is_empty() {
            Some(AddWindowAction::Save(self.take_draft()))
        } else if close_triggered {
            self.reset();
            Some(AddWindowAction::Cancel)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(parse_tags(" work, notes ,,q1 "), vec!["work", "notes", "q1"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn taking_a_draft_clears_the_form() {
        let mut state = AddWindowState::new();
        state.title = "Report".into();
        state.content = "Report Q1".into();
        state.tags = "work".into();
        state.bookmarked = true;

        let draft = state.take_draft();
        assert_eq!(draft.title, "Report");
        assert_eq!(draft.tags, vec!["work"]);
        assert!(draft.is_bookmarked);
        assert!(state.content.is_empty());
        assert!(!state.bookmarked);
        assert!(state.first_frame);
    }
}
