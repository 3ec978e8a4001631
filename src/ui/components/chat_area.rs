use eframe::egui;

use crate::sync::transcript::TranscriptEntry;
use crate::sync::{Side, Transcript};

pub fn render(ui: &mut egui::Ui, transcript: &mut Transcript) {
    let scroll_to_bottom = transcript.take_scroll_request();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if transcript.is_empty() {
                ui.label(egui::RichText::new("No messages yet").weak());
            }
            for entry in transcript.entries() {
                let time = entry.rendered_at.format("%H:%M:%S").to_string();
                match entry.side {
                    Side::Own => {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                            ui.label(egui::RichText::new(time).weak());
                            ui.colored_label(egui::Color32::LIGHT_BLUE, entry.to_string())
                                .on_hover_text(token_hint(entry));
                        });
                    }
                    Side::Other => {
                        ui.horizontal(|ui| {
                            ui.label(entry.to_string()).on_hover_text(token_hint(entry));
                            ui.label(egui::RichText::new(time).weak());
                        });
                    }
                }
            }

            if scroll_to_bottom {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });
}

fn token_hint(entry: &TranscriptEntry) -> String {
    match &entry.sent_at {
        Some(token) => format!("sent at {token}"),
        None => "no ordering token".to_string(),
    }
}
