use eframe::egui;

/// Trả về true khi người dùng bấm Send hoặc Enter. Việc xoá ô nhập do
/// đường gửi quyết định, không phải widget.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> bool {
    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add_enabled(enabled, egui::TextEdit::singleline(input_text));
        if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
            response.request_focus();
        }
    });

    send && enabled
}
