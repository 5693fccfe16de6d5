use egui_extras::{Column, TableBuilder};

use crate::engine::context::Notice;
use crate::engine::panel::{PanelRow, SuggestionPanel};
use crate::engine::PointerHit;

pub struct PanelResponse {
    pub hit: Option<PointerHit>,
    pub rect: egui::Rect,
}

/// Draws the suggestion list at its computed layout. `scroll_to` brings a
/// freshly selected row into view.
pub fn show_panel(
    ctx: &egui::Context,
    panel: &SuggestionPanel,
    row_height: f32,
    scroll_to: Option<usize>,
) -> Option<PanelResponse> {
    let layout = panel.layout()?;
    let mut hit = None;

    let area = egui::Area::new(egui::Id::new("recall_suggestions"))
        .order(egui::Order::Foreground)
        .fixed_pos(egui::pos2(layout.left, layout.top))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_width(layout.width);

                let mut table = TableBuilder::new(ui)
                    .striped(true)
                    .sense(egui::Sense::click())
                    .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                    .column(Column::remainder())
                    .max_scroll_height(layout.height);
                if let Some(row) = scroll_to {
                    table = table.scroll_to_row(row, None);
                }

                table.body(|body| {
                    body.rows(row_height, panel.rows().len(), |mut row| {
                        let entry = &panel.rows()[row.index()];
                        let item = match entry {
                            PanelRow::Item { index, .. } => Some(*index),
                            PanelRow::More(_) | PanelRow::NoResults => None,
                        };
                        row.set_selected(item.is_some() && item == panel.selected());

                        row.col(|ui| match entry {
                            PanelRow::Item { label, .. } => {
                                ui.add(egui::Label::new(label.as_str()).truncate());
                            }
                            PanelRow::More(_) | PanelRow::NoResults => {
                                ui.weak(entry.text());
                            }
                        });

                        if let Some(index) = item {
                            if row.response().clicked() {
                                hit = Some(PointerHit::Row(index));
                            }
                        }
                    });
                });
            });
        });

    let rect = area.response.rect;
    if hit.is_none() && area.response.clicked() {
        hit = Some(PointerHit::Panel);
    }
    Some(PanelResponse { hit, rect })
}

/// Bottom banner for the current notice. Returns true when dismissed.
pub fn show_notice(ctx: &egui::Context, notice: &Notice) -> bool {
    let mut dismissed = false;
    egui::Area::new(egui::Id::new("recall_notice"))
        .order(egui::Order::Foreground)
        .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(8.0, -8.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(notice.message());
                    if ui.small_button("✕").clicked() {
                        dismissed = true;
                    }
                });
            });
        });
    dismissed
}
