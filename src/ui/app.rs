use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::common::{ChannelState, UserRef};
use crate::config::{self, AppConfig};
use crate::network::UserDirectory;
use crate::sync::{ChatSession, SubmitOutcome};

use super::components::{
    chat_area, input_bar,
    sidebar::{self, SidebarActions},
};
use super::state::{AppState, UiEvent};

pub struct ChatApp {
    state: AppState,
    config: AppConfig,
    config_path: String,
    directory: Option<UserDirectory>,
    runtime: Handle,
    ui_sender: mpsc::UnboundedSender<UiEvent>,
    ui_receiver: mpsc::UnboundedReceiver<UiEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        config_path: String,
        runtime: Handle,
        initial_peer: Option<i64>,
    ) -> Self {
        let directory = config.directory_url.as_deref().map(|base_url| {
            UserDirectory::new(
                base_url,
                &config.search_path,
                &config.start_chat_path,
                config.search_min_chars,
            )
        });
        let (ui_sender, ui_receiver) = mpsc::unbounded_channel();

        let mut app = Self {
            state: AppState::new(config.recent_peers.clone()),
            config,
            config_path,
            directory,
            runtime,
            ui_sender,
            ui_receiver,
        };
        if let Some(peer_id) = initial_peer {
            app.open_chat(peer_id);
        }
        app
    }

    /// Mở view mới cho `peer_id`; view cũ (nếu có) bị đóng và bỏ đi.
    fn open_chat(&mut self, peer_id: i64) {
        if let Some(previous) = self.state.session.take() {
            previous.close();
        }

        let address = self.config.channel_address(peer_id);
        // Connection tasks need the runtime context of this thread.
        let _guard = self.runtime.enter();
        match ChatSession::open(self.config.local_user_id, peer_id, &address) {
            Ok(session) => {
                self.state.session = Some(session);
                self.state.status = None;
                self.state.recent_peers = config::persist_recent_peer(&self.config_path, peer_id);
            }
            Err(err) => {
                log::error!("Cannot open chat with {peer_id}: {err}");
                self.state.status = Some(err.to_string());
            }
        }
    }

    fn handle_connection_events(&mut self) {
        if let Some(session) = self.state.session.as_mut() {
            session.pump();
        }
    }

    fn handle_ui_events(&mut self) {
        while let Ok(event) = self.ui_receiver.try_recv() {
            match event {
                UiEvent::SearchResults { seq, users } => {
                    self.state.apply_search_results(seq, users)
                }
                UiEvent::ChatReady(peer_id) => self.open_chat(peer_id),
                UiEvent::DirectoryError(message) => self.state.status = Some(message),
            }
        }
    }

    fn search(&mut self) {
        let Some(directory) = self.directory.clone() else {
            return;
        };
        if !directory.should_search(&self.state.search_query) {
            self.state.clear_search();
            return;
        }

        let seq = self.state.next_search();
        let query = self.state.search_query.clone();
        let sender = self.ui_sender.clone();
        self.runtime.spawn(async move {
            let event = match directory.search(&query).await {
                Ok(users) => UiEvent::SearchResults { seq, users },
                Err(err) => {
                    log::warn!("User search failed: {err}");
                    UiEvent::DirectoryError(err.to_string())
                }
            };
            let _ = sender.send(event);
        });
    }

    fn start_chat(&mut self, user: UserRef) {
        let Some(directory) = self.directory.clone() else {
            self.open_chat(user.id);
            return;
        };
        let sender = self.ui_sender.clone();
        self.runtime.spawn(async move {
            let event = match directory.start_chat(user.id).await {
                Ok(()) => UiEvent::ChatReady(user.id),
                Err(err) => {
                    log::warn!("Cannot start chat with {}: {err}", user.username);
                    UiEvent::DirectoryError(err.to_string())
                }
            };
            let _ = sender.send(event);
        });
    }

    fn submit(&mut self) {
        let Some(session) = self.state.session.as_mut() else {
            return;
        };
        if session.submit() == SubmitOutcome::Enqueued {
            self.state.status = None;
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_connection_events();
        self.handle_ui_events();

        let search_enabled = self.directory.is_some();
        egui::SidePanel::left("chat_sidebar")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                let actions: SidebarActions = sidebar::render(ui, &mut self.state, search_enabled);
                if actions.query_changed {
                    self.search();
                }
                if let Some(user) = actions.start_chat {
                    self.start_chat(user);
                }
                if let Some(peer_id) = actions.open_peer {
                    self.open_chat(peer_id);
                }
            });

        egui::TopBottomPanel::bottom("compose_bar").show(ctx, |ui| {
            if let Some(status) = &self.state.status {
                ui.colored_label(egui::Color32::LIGHT_RED, status);
            }
            let mut submitted = false;
            if let Some(session) = self.state.session.as_mut() {
                if let Some(error) = session.compose().error() {
                    ui.colored_label(
                        egui::Color32::LIGHT_RED,
                        format!("Message not sent: {error}"),
                    );
                }
                let enabled = session.channel_state() == ChannelState::Open;
                submitted = input_bar::render(ui, session.compose_mut().input_mut(), enabled);
            }
            if submitted {
                self.submit();
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = self.state.session.as_mut() else {
                ui.heading(format!("Signed in as {}", self.config.local_username));
                ui.label("Pick someone on the left to start chatting.");
                return;
            };

            let view = session.view_mut();
            ui.horizontal(|ui| {
                ui.heading(format!("Chat with user {}", view.peer_id()));
                let state = view.channel_state();
                let color = match state {
                    ChannelState::Connecting => egui::Color32::YELLOW,
                    ChannelState::Open => egui::Color32::GREEN,
                    ChannelState::Closed => egui::Color32::RED,
                };
                ui.colored_label(color, state.to_string());
            });
            if let Some(reason) = view.connection_lost() {
                ui.colored_label(
                    egui::Color32::LIGHT_RED,
                    format!("{reason}. Reopen the chat to reconnect."),
                );
            }
            ui.separator();
            chat_area::render(ui, view.transcript_mut());
        });

        ctx.request_repaint();
    }
}
