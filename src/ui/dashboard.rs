use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

use egui::{Align, Button, Color32, Layout, RichText, ScrollArea};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, Legend, Plot};
use itertools::Itertools;
use log::error;

use crate::api::{ApiClient, EquipmentRecord, HistoryEntry, UploadResult};
use crate::errors::VisualizerError;
use crate::session::SessionStore;

use super::{AlertDialog, PALETTE_ORANGE};

pub(crate) enum DashboardEvent {
    Logout,
}

/// Explicit per-operation request state. `Loading` and `Failed` carry the
/// previously loaded value so a failed refresh leaves the displayed data
/// unchanged, and a stuck loading flag has no representation to get stuck in.
#[derive(Debug)]
pub(crate) enum RequestState<T> {
    Idle,
    Loading { last: Option<T> },
    Loaded(T),
    Failed { error: String, last: Option<T> },
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> RequestState<T> {
    fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    fn data(&self) -> Option<&T> {
        match self {
            Self::Idle => None,
            Self::Loading { last } | Self::Failed { last, .. } => last.as_ref(),
            Self::Loaded(value) => Some(value),
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }

    fn into_data(self) -> Option<T> {
        match self {
            Self::Idle => None,
            Self::Loading { last } | Self::Failed { last, .. } => last,
            Self::Loaded(value) => Some(value),
        }
    }

    fn begin(&mut self) {
        let last = std::mem::take(self).into_data();
        *self = Self::Loading { last };
    }

    fn settle_ok(&mut self, value: T) {
        *self = Self::Loaded(value);
    }

    fn settle_err(&mut self, error: String) {
        let last = std::mem::take(self).into_data();
        *self = Self::Failed { error, last };
    }
}

enum DashboardMsg {
    UploadFinished(Result<UploadResult, VisualizerError>),
    HistoryFinished(Result<Vec<HistoryEntry>, VisualizerError>),
    ReportSaved(Result<PathBuf, VisualizerError>),
}

pub(crate) struct DashboardView {
    selected_file: Option<PathBuf>,
    upload: RequestState<UploadResult>,
    history: RequestState<Vec<HistoryEntry>>,
    alert: Option<AlertDialog>,
    tx: Sender<DashboardMsg>,
    rx: Receiver<DashboardMsg>,
}

impl DashboardView {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            selected_file: None,
            upload: RequestState::Idle,
            history: RequestState::Idle,
            alert: None,
            tx,
            rx,
        }
    }

    pub(crate) fn show(
        &mut self,
        ctx: &egui::Context,
        api: &Arc<ApiClient>,
        sessions: &Arc<dyn SessionStore>,
        runtime: &tokio::runtime::Handle,
    ) -> Option<DashboardEvent> {
        self.drain_messages();
        let mut event = None;
        let busy = self.upload.is_loading() || self.history.is_loading();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(
                    RichText::new("Equipment Parameter Visualizer").color(Color32::WHITE),
                );
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if ui.button("Logout").clicked() {
                        event = Some(DashboardEvent::Logout);
                    }
                    // read on every frame so the header always reflects the store
                    let username = sessions
                        .load()
                        .map(|session| session.username)
                        .unwrap_or_default();
                    ui.label(format!("Welcome, {username}"));
                });
            });
        });

        // clone the loaded values out so the render helpers can borrow self
        let result = self.upload.data().cloned();
        let history = self.history.data().cloned();

        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                self.show_upload_section(ui, api, runtime, busy);
                if let Some(result) = &result {
                    ui.add_space(10.);
                    self.show_results(ui, result, api, runtime);
                }
                ui.add_space(10.);
                self.show_history_section(ui, history.as_deref(), api, runtime, busy);
            });
        });

        let dismissed = self
            .alert
            .as_ref()
            .is_some_and(|alert| alert.show(ctx));
        if dismissed {
            self.alert = None;
        }

        if busy {
            ctx.request_repaint();
        } else {
            // pick up late report-download results without user interaction
            ctx.request_repaint_after(Duration::from_millis(250));
        }
        event
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                DashboardMsg::UploadFinished(Ok(result)) => {
                    self.upload.settle_ok(result);
                    self.alert = Some(AlertDialog::info(
                        "Success",
                        "CSV uploaded and analyzed successfully!",
                    ));
                }
                DashboardMsg::UploadFinished(Err(e)) => {
                    error!("Upload failed: {}", e);
                    self.alert = Some(AlertDialog::error("Upload failed", &e.to_string()));
                    self.upload.settle_err(e.to_string());
                }
                DashboardMsg::HistoryFinished(Ok(entries)) => {
                    self.history.settle_ok(entries);
                }
                DashboardMsg::HistoryFinished(Err(e)) => {
                    error!("History fetch failed: {}", e);
                    self.alert = Some(AlertDialog::error("History", &e.to_string()));
                    self.history.settle_err(e.to_string());
                }
                DashboardMsg::ReportSaved(Ok(path)) => {
                    self.alert = Some(AlertDialog::info(
                        "Success",
                        &format!("PDF saved to {}", path.display()),
                    ));
                }
                DashboardMsg::ReportSaved(Err(e)) => {
                    error!("Report download failed: {}", e);
                    self.alert = Some(AlertDialog::error("Report download", &e.to_string()));
                }
            }
        }
    }

    fn show_upload_section(
        &mut self,
        ui: &mut egui::Ui,
        api: &Arc<ApiClient>,
        runtime: &tokio::runtime::Handle,
        busy: bool,
    ) {
        ui.group(|ui| {
            ui.strong("Upload CSV File");
            ui.horizontal(|ui| {
                if ui.button("Browse...").clicked()
                    && let Some(path) = rfd::FileDialog::new()
                        .add_filter("CSV Files", &["csv"])
                        .pick_file()
                {
                    self.selected_file = Some(path);
                }

                match &self.selected_file {
                    Some(path) => {
                        let name = path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .unwrap_or("selected file");
                        ui.label(name);
                    }
                    None => {
                        ui.label(RichText::new("No file selected").italics());
                    }
                }

                let upload_label = if self.upload.is_loading() {
                    "Uploading..."
                } else {
                    "Upload & Analyze"
                };
                if ui.add_enabled(!busy, Button::new(upload_label)).clicked() {
                    self.start_upload(api, runtime);
                }
            });
            if let Some(error) = self.upload.error() {
                ui.colored_label(PALETTE_ORANGE, RichText::new(error).small());
            }
        });
    }

    fn show_results(
        &mut self,
        ui: &mut egui::Ui,
        result: &UploadResult,
        api: &Arc<ApiClient>,
        runtime: &tokio::runtime::Handle,
    ) {
        ui.group(|ui| {
            ui.strong("Analysis Results");
            ui.horizontal(|ui| {
                ui.strong("Total Equipment:");
                ui.label(result.total_count.to_string());
            });
            ui.horizontal(|ui| {
                ui.strong("Average Flowrate:");
                ui.label(format!("{:.2}", result.averages.flowrate));
            });
            ui.horizontal(|ui| {
                ui.strong("Average Pressure:");
                ui.label(format!("{:.2}", result.averages.pressure));
            });
            ui.horizontal(|ui| {
                ui.strong("Average Temperature:");
                ui.label(format!("{:.2}", result.averages.temperature));
            });

            if !result.type_distribution.is_empty() {
                ui.add_space(8.);
                ui.strong("Equipment Type Distribution:");
                for (equipment_type, count) in ordered_distribution(&result.type_distribution) {
                    ui.label(format!("{equipment_type}: {count}"));
                }
                ui.add_space(8.);
                show_distribution_chart(ui, &result.type_distribution);
            }

            if !result.data.is_empty() {
                ui.add_space(8.);
                show_equipment_table(ui, &result.data);
            }

            ui.add_space(8.);
            if ui.button("Download PDF Report").clicked() {
                self.start_report_download(result.id, api, runtime);
            }
        });
    }

    fn show_history_section(
        &mut self,
        ui: &mut egui::Ui,
        history: Option<&[HistoryEntry]>,
        api: &Arc<ApiClient>,
        runtime: &tokio::runtime::Handle,
        busy: bool,
    ) {
        ui.group(|ui| {
            ui.strong("Upload History");
            let label = if self.history.is_loading() {
                "Loading..."
            } else {
                "Load Upload History"
            };
            if ui.add_enabled(!busy, Button::new(label)).clicked() {
                self.start_history_fetch(api, runtime);
            }
            if let Some(error) = self.history.error() {
                ui.colored_label(PALETTE_ORANGE, RichText::new(error).small());
            }

            let Some(entries) = history else { return };
            if entries.is_empty() {
                return;
            }

            ui.separator();
            for entry in entries {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.label(
                            RichText::new(format!(
                                "{} | {}",
                                entry.filename,
                                format_upload_date(&entry.upload_date)
                            ))
                            .strong(),
                        );
                        if let Some(summary) = &entry.summary {
                            ui.label(
                                RichText::new(format!(
                                    "Total: {} | Avg Flow: {:.2} | Avg Press: {:.2} | Avg Temp: {:.2}",
                                    summary.total_count,
                                    summary.avg_flowrate,
                                    summary.avg_pressure,
                                    summary.avg_temperature
                                ))
                                .small(),
                            );
                            let types = ordered_distribution(&summary.type_distribution)
                                .into_iter()
                                .map(|(equipment_type, count)| {
                                    format!("{equipment_type}: {count}")
                                })
                                .join(", ");
                            ui.label(RichText::new(format!("Types: {types}")).small());
                        }
                    });
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.button("Download PDF").clicked() {
                            self.start_report_download(entry.id, api, runtime);
                        }
                    });
                });
                ui.separator();
            }
        });
    }

    fn start_upload(&mut self, api: &Arc<ApiClient>, runtime: &tokio::runtime::Handle) {
        let Some(path) = self.selected_file.clone() else {
            self.alert = Some(AlertDialog::info("Upload", "Please select a CSV file"));
            return;
        };

        self.upload.begin();
        let tx = self.tx.clone();
        let api = api.clone();
        runtime.spawn(async move {
            let result = api.upload_csv(&path).await;
            let _ = tx.send(DashboardMsg::UploadFinished(result));
        });
    }

    fn start_history_fetch(&mut self, api: &Arc<ApiClient>, runtime: &tokio::runtime::Handle) {
        self.history.begin();
        let tx = self.tx.clone();
        let api = api.clone();
        runtime.spawn(async move {
            let result = api.get_history().await;
            let _ = tx.send(DashboardMsg::HistoryFinished(result));
        });
    }

    fn start_report_download(
        &mut self,
        id: i64,
        api: &Arc<ApiClient>,
        runtime: &tokio::runtime::Handle,
    ) {
        let Some(target) = rfd::FileDialog::new()
            .set_file_name(format!("report_{id}.pdf"))
            .add_filter("PDF Files", &["pdf"])
            .save_file()
        else {
            return;
        };

        let tx = self.tx.clone();
        let api = api.clone();
        runtime.spawn(async move {
            let result = match api.download_report(id).await {
                Ok(bytes) => std::fs::write(&target, bytes)
                    .map(|()| target)
                    .map_err(|e| VisualizerError::ReportWrite { source: e }),
                Err(e) => Err(e),
            };
            let _ = tx.send(DashboardMsg::ReportSaved(result));
        });
    }
}

/// Type/count pairs ordered by descending count, ties broken by name.
fn ordered_distribution(distribution: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    distribution
        .iter()
        .map(|(equipment_type, count)| (equipment_type.as_str(), *count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .collect()
}

fn show_distribution_chart(ui: &mut egui::Ui, distribution: &BTreeMap<String, u64>) {
    let ordered = ordered_distribution(distribution);
    let labels = ordered
        .iter()
        .map(|(equipment_type, _)| equipment_type.to_string())
        .collect_vec();
    let bars = ordered
        .iter()
        .enumerate()
        .map(|(index, (equipment_type, count))| {
            Bar::new(index as f64, *count as f64)
                .name(*equipment_type)
                .width(0.6)
        })
        .collect();
    let chart = BarChart::new("Equipment count by type", bars).color(PALETTE_ORANGE);

    Plot::new("type_distribution")
        .height(260.)
        .show_background(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .include_y(0.)
        .legend(Legend::default())
        .x_axis_formatter(move |mark, _range| {
            let index = mark.value.round();
            if index < 0. || (mark.value - index).abs() > 0.3 {
                return String::new();
            }
            labels.get(index as usize).cloned().unwrap_or_default()
        })
        .show(ui, |plot_ui| plot_ui.bar_chart(chart));
}

fn show_equipment_table(ui: &mut egui::Ui, records: &[EquipmentRecord]) {
    TableBuilder::new(ui)
        .striped(true)
        .vscroll(false)
        .column(Column::remainder().at_least(140.))
        .column(Column::remainder().at_least(90.))
        .column(Column::remainder().at_least(80.))
        .column(Column::remainder().at_least(80.))
        .column(Column::remainder().at_least(80.))
        .header(20., |mut header| {
            for title in [
                "Equipment Name",
                "Type",
                "Flowrate",
                "Pressure",
                "Temperature",
            ] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for record in records {
                body.row(18., |mut row| {
                    row.col(|ui| {
                        ui.label(&record.equipment_name);
                    });
                    row.col(|ui| {
                        ui.label(&record.equipment_type);
                    });
                    row.col(|ui| {
                        ui.label(format!("{}", record.flowrate));
                    });
                    row.col(|ui| {
                        ui.label(format!("{}", record.pressure));
                    });
                    row.col(|ui| {
                        ui.label(format!("{}", record.temperature));
                    });
                });
            }
        });
}

/// Format the server's ISO-8601 upload date as local date/time, falling back
/// to the raw string when it does not parse.
fn format_upload_date(raw: &str) -> String {
    if let Ok(date) = chrono::DateTime::parse_from_rfc3339(raw) {
        return date
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
    }
    // the backend omits the offset when timezone support is disabled
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Averages;

    fn sample_result(id: i64) -> UploadResult {
        UploadResult {
            id,
            total_count: 3,
            averages: Averages {
                flowrate: 10.,
                pressure: 5.,
                temperature: 20.,
            },
            type_distribution: BTreeMap::from([
                ("Pump".to_string(), 2),
                ("Valve".to_string(), 1),
            ]),
            data: vec![],
        }
    }

    #[test]
    fn request_state_keeps_data_visible_while_loading() {
        let mut state = RequestState::Loaded(sample_result(1));
        state.begin();
        assert!(state.is_loading());
        assert_eq!(state.data().unwrap().id, 1);
    }

    #[test]
    fn request_state_preserves_data_on_failure() {
        let mut state = RequestState::Loaded(sample_result(1));
        state.begin();
        state.settle_err("boom".to_string());
        assert!(!state.is_loading());
        assert_eq!(state.data().unwrap().id, 1);
        assert_eq!(state.error(), Some("boom"));
    }

    #[test]
    fn request_state_replaces_data_on_success() {
        let mut state = RequestState::Loaded(sample_result(1));
        state.begin();
        state.settle_ok(sample_result(2));
        assert_eq!(state.data().unwrap().id, 2);
    }

    #[test]
    fn request_state_starts_empty() {
        let state: RequestState<UploadResult> = RequestState::default();
        assert!(state.data().is_none());
        assert!(!state.is_loading());
    }

    #[test]
    fn upload_without_file_never_starts_a_request() {
        use crate::session::{MemorySessionStore, SessionStore};

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let sessions: Arc<dyn SessionStore> =
            Arc::new(MemorySessionStore::logged_in("abc123", "alice"));
        // unroutable on purpose: a request here would fail loudly, but the
        // guard must bail out before anything is spawned
        let api = Arc::new(ApiClient::new("http://127.0.0.1:9", sessions).unwrap());

        let mut view = DashboardView::new();
        assert!(view.selected_file.is_none());
        view.start_upload(&api, runtime.handle());

        assert!(view.alert.is_some());
        assert!(matches!(view.upload, RequestState::Idle));
    }

    #[test]
    fn distribution_ordered_by_descending_count() {
        let distribution = BTreeMap::from([
            ("Valve".to_string(), 1),
            ("Pump".to_string(), 2),
            ("Reactor".to_string(), 2),
        ]);
        let ordered = ordered_distribution(&distribution);
        assert_eq!(
            ordered,
            vec![("Pump", 2), ("Reactor", 2), ("Valve", 1)]
        );
    }

    #[test]
    fn upload_date_formats_rfc3339() {
        let formatted = format_upload_date("2024-01-15T10:30:00Z");
        assert_eq!(formatted.len(), "2024-01-15 10:30".len());
        assert!(formatted.starts_with("2024-01-1"));
    }

    #[test]
    fn upload_date_formats_naive_timestamp() {
        assert_eq!(
            format_upload_date("2024-01-15T10:30:00.123456"),
            "2024-01-15 10:30"
        );
    }

    #[test]
    fn upload_date_falls_back_to_raw_string() {
        assert_eq!(format_upload_date("not a date"), "not a date");
    }
}
