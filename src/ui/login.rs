use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError, channel};

use egui::{Color32, RichText, TextEdit};
use log::debug;

use crate::api::{ApiClient, LoginResponse};
use crate::errors::VisualizerError;
use crate::session::{Session, SessionStore};

use super::PALETTE_ORANGE;

// The server-side failure detail is deliberately not surfaced here.
const LOGIN_FAILED_MESSAGE: &str = "Invalid credentials. Please try again.";

pub(crate) enum LoginEvent {
    LoggedIn,
}

#[derive(Default)]
pub(crate) struct LoginView {
    username: String,
    password: String,
    error: Option<String>,
    pending: Option<Receiver<Result<LoginResponse, VisualizerError>>>,
}

impl LoginView {
    pub(crate) fn show(
        &mut self,
        ctx: &egui::Context,
        api: &Arc<ApiClient>,
        sessions: &Arc<dyn SessionStore>,
        runtime: &tokio::runtime::Handle,
    ) -> Option<LoginEvent> {
        let mut event = None;

        if let Some(rx) = &self.pending {
            match rx.try_recv() {
                Ok(Ok(response)) => {
                    self.pending = None;
                    let session = Session {
                        token: response.token,
                        username: response.username,
                    };
                    match sessions.save(&session) {
                        Ok(()) => event = Some(LoginEvent::LoggedIn),
                        Err(e) => self.error = Some(e.to_string()),
                    }
                }
                Ok(Err(e)) => {
                    debug!("Login failed: {}", e);
                    self.pending = None;
                    self.error = Some(LOGIN_FAILED_MESSAGE.to_string());
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.pending = None;
                    self.error = Some(LOGIN_FAILED_MESSAGE.to_string());
                }
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.25);
                ui.heading(
                    RichText::new("Chemical Equipment Visualizer")
                        .color(Color32::WHITE)
                        .strong(),
                );
                ui.add_space(20.);

                ui.add(
                    TextEdit::singleline(&mut self.username)
                        .hint_text("Username")
                        .desired_width(240.),
                );
                ui.add_space(5.);
                ui.add(
                    TextEdit::singleline(&mut self.password)
                        .hint_text("Password")
                        .password(true)
                        .desired_width(240.),
                );
                ui.add_space(10.);

                let can_submit = !self.username.is_empty()
                    && !self.password.is_empty()
                    && self.pending.is_none();
                let label = if self.pending.is_some() {
                    "Logging in..."
                } else {
                    "Login"
                };
                if ui.add_enabled(can_submit, egui::Button::new(label)).clicked() {
                    self.start_login(api, runtime);
                }

                if let Some(error) = &self.error {
                    ui.add_space(10.);
                    ui.colored_label(PALETTE_ORANGE, error);
                }
            });
        });

        if self.pending.is_some() {
            ctx.request_repaint();
        }
        event
    }

    fn start_login(&mut self, api: &Arc<ApiClient>, runtime: &tokio::runtime::Handle) {
        let (tx, rx) = channel();
        self.pending = Some(rx);
        self.error = None;

        let api = api.clone();
        let username = self.username.clone();
        let password = self.password.clone();
        runtime.spawn(async move {
            let result = api.login(&username, &password).await;
            let _ = tx.send(result);
        });
    }
}
