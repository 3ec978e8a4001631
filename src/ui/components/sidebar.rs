use eframe::egui;

use crate::common::UserRef;
use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub open_peer: Option<i64>,
    pub start_chat: Option<UserRef>,
    pub query_changed: bool,
}

pub fn render(ui: &mut egui::Ui, state: &mut AppState, search_enabled: bool) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.heading("Chats");
    ui.separator();

    ui.label("Open chat with user id:");
    ui.horizontal(|ui| {
        let response = ui.text_edit_singleline(&mut state.peer_input);
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if ui.button("Open").clicked() || submitted {
            match state.peer_input.trim().parse::<i64>() {
                Ok(peer_id) => {
                    actions.open_peer = Some(peer_id);
                    state.peer_input.clear();
                }
                Err(_) => state.status = Some(format!("`{}` is not a user id", state.peer_input.trim())),
            }
        }
    });

    if !state.recent_peers.is_empty() {
        ui.separator();
        ui.label("Recent:");
        let current = state.session.as_ref().map(|session| session.view().peer_id());
        for peer_id in &state.recent_peers {
            let selected = current == Some(*peer_id);
            if ui.selectable_label(selected, format!("user {peer_id}")).clicked() && !selected {
                actions.open_peer = Some(*peer_id);
            }
        }
    }

    if search_enabled {
        ui.separator();
        ui.label("Search users:");
        if ui.text_edit_singleline(&mut state.search_query).changed() {
            actions.query_changed = true;
        }
        for user in &state.search_results {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::GREEN, "●");
                if ui.link(user.username.as_str()).clicked() {
                    actions.start_chat = Some(user.clone());
                }
            });
        }
    }

    actions
}
