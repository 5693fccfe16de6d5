use eframe::egui;
use std::sync::mpsc;

use recall::app::RecallApp;
use recall::config::RecallConfig;
use recall::hotkeys;
use recall::storage::{SnippetStore, WorkerChannel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config_path = RecallConfig::default_path();
    let config = RecallConfig::load(&config_path)?;
    let store = SnippetStore::new(config.store_path())?;
    log::info!("Snippets stored at {}", store.path.display());
    let channel = WorkerChannel::spawn(store.clone());

    let (hotkey_tx, hotkey_rx) = mpsc::channel();
    let _hotkeys = match hotkeys::spawn_listener(hotkey_tx) {
        Ok(manager) => Some(manager),
        Err(e) => {
            log::warn!("Global hotkeys unavailable: {}", e);
            None
        }
    };

    let app = RecallApp::new(config, config_path, store, channel, hotkey_rx)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Recall")
            .with_resizable(true)
            .with_inner_size([640.0, 420.0])
            .with_min_inner_size([360.0, 240.0]),
        ..Default::default()
    };

    eframe::run_native("Recall", options, Box::new(move |_cc| Ok(Box::new(app))))?;

    Ok(())
}
