use std::sync::Arc;

use egui::{Color32, Visuals, style::Widgets};
use log::error;

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::session::SessionStore;

mod dashboard;
mod login;

use dashboard::{DashboardEvent, DashboardView};
use login::{LoginEvent, LoginView};

pub(crate) const PALETTE_BLACK: Color32 = Color32::from_rgb(12, 12, 12);
pub(crate) const PALETTE_BROWN: Color32 = Color32::from_rgb(72, 30, 20);
pub(crate) const PALETTE_MAROON: Color32 = Color32::from_rgb(155, 57, 34);
pub(crate) const PALETTE_ORANGE: Color32 = Color32::from_rgb(242, 97, 63);

/// Root application: switches between the login and dashboard screens.
///
/// The initial screen is decided by probing the session store for a token;
/// only its presence is checked, expiry is the server's concern.
pub struct VisualizerApp {
    api: Arc<ApiClient>,
    sessions: Arc<dyn SessionStore>,
    runtime: tokio::runtime::Handle,
    app_config: AppConfig,
    screen: Screen,
}

enum Screen {
    Login(LoginView),
    Dashboard(DashboardView),
}

impl VisualizerApp {
    pub fn new(
        api: Arc<ApiClient>,
        sessions: Arc<dyn SessionStore>,
        runtime: tokio::runtime::Handle,
        app_config: AppConfig,
        cc: &eframe::CreationContext<'_>,
    ) -> Self {
        let default_visuals = Visuals {
            dark_mode: true,
            hyperlink_color: PALETTE_MAROON,
            faint_bg_color: PALETTE_BLACK,
            extreme_bg_color: PALETTE_BROWN,
            panel_fill: PALETTE_BLACK,
            button_frame: true,
            widgets: Widgets::dark(),
            striped: true,
            ..Default::default()
        };
        cc.egui_ctx.set_visuals(default_visuals);

        let screen = if sessions.load().is_some() {
            Screen::Dashboard(DashboardView::new())
        } else {
            Screen::Login(LoginView::default())
        };

        Self {
            api,
            sessions,
            runtime,
            app_config,
            screen,
        }
    }
}

impl eframe::App for VisualizerApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = self.app_config.save() {
            error!("Error while saving config file: {}", e);
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(outer_rect) = ctx.input(|is| is.viewport().outer_rect) {
            self.app_config.window_position = outer_rect.min.into();
        }

        match &mut self.screen {
            Screen::Login(view) => {
                if let Some(LoginEvent::LoggedIn) =
                    view.show(ctx, &self.api, &self.sessions, &self.runtime)
                {
                    self.screen = Screen::Dashboard(DashboardView::new());
                }
            }
            Screen::Dashboard(view) => {
                if let Some(DashboardEvent::Logout) =
                    view.show(ctx, &self.api, &self.sessions, &self.runtime)
                {
                    if let Err(e) = self.sessions.clear() {
                        error!("Error clearing session: {}", e);
                    }
                    // dropping the dashboard also drops its result channels,
                    // so any in-flight response lands nowhere
                    self.screen = Screen::Login(LoginView::default());
                }
            }
        }
    }
}

/// Blocking modal dialog, the only surfaced failure channel besides the log.
pub(crate) struct AlertDialog {
    title: String,
    message: String,
    is_error: bool,
}

impl AlertDialog {
    pub(crate) fn info(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            is_error: false,
        }
    }

    pub(crate) fn error(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            is_error: true,
        }
    }

    /// Returns true once the user dismisses the dialog. The modal backdrop
    /// swallows clicks, so the controls underneath stay inert until then.
    pub(crate) fn show(&self, ctx: &egui::Context) -> bool {
        let mut dismissed = false;
        let modal = egui::Modal::new(egui::Id::new("alert_dialog")).show(ctx, |ui| {
            ui.set_width(300.);
            ui.strong(&self.title);
            ui.separator();
            let color = if self.is_error {
                PALETTE_ORANGE
            } else {
                Color32::WHITE
            };
            ui.colored_label(color, &self.message);
            ui.add_space(8.);
            ui.vertical_centered(|ui| {
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        });
        dismissed || modal.should_close()
    }
}
