mod app;
mod assistant;
mod chat;
mod config;
mod error;
mod event;
mod export;
mod project;
mod selection;
mod snapshot;
mod theme;
mod usage;
mod workspace;

use app::PagesmithApp;
use assistant::AssistantClient;
use config::AppConfig;
use eframe::egui;
use snapshot::{JsonFilePersistence, SnapshotStore};
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagesmith=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let workspace = std::env::current_dir()?;
    let (config, mut warnings) = AppConfig::load(&workspace);
    tracing::info!(data_dir = %config.data_dir.display(), model = %config.model, "starting pagesmith");

    let (store, load_warning) =
        SnapshotStore::open(Box::new(JsonFilePersistence::new(config.data_dir.clone())));
    warnings.extend(load_warning);

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pagesmith-runtime")
        .build()?;
    let assistant = AssistantClient::new(tx, runtime.handle().clone());

    let app = PagesmithApp::new(rx, assistant, config, store, warnings);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1440.0, 860.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Pagesmith",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
