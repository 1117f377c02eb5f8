use std::sync::Arc;

use clap::Parser;
use egui::Vec2;

use equipviz::api::ApiClient;
use equipviz::config::AppConfig;
use equipviz::session::{FileSessionStore, SessionStore};
use equipviz::ui::VisualizerApp;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the analysis API server, overriding the config file
    #[arg(short, long)]
    server: Option<String>,
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let args = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    let mut app_config = AppConfig::from_local_file().unwrap_or_default();
    if let Some(server) = args.server {
        app_config.api_base_url = server;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("could not start async runtime");

    let sessions: Arc<dyn SessionStore> = Arc::new(
        FileSessionStore::from_config_dir().expect("could not locate config directory"),
    );
    let api = Arc::new(
        ApiClient::new(&app_config.api_base_url, sessions.clone())
            .expect("invalid API server URL"),
    );

    let window_position = app_config.window_position.clone();
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = native_options
        .viewport
        .with_inner_size(Vec2::new(1000., 760.))
        .with_position(window_position);

    let handle = runtime.handle().clone();
    eframe::run_native(
        "Equipment Parameter Visualizer",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(VisualizerApp::new(
                api, sessions, handle, app_config, cc,
            )))
        }),
    )
    .expect("could not start app");
}
