use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use eframe::egui;

use crate::config::{ConfigWatcher, RecallConfig};
use crate::engine::RecallContext;
use crate::error::ConfigError;
use crate::hotkeys::HotkeyEvent;
use crate::storage::{SnippetStore, StoreChannel};
use crate::ui::{AddWindowAction, AddWindowState, Playground};

const IDLE_REPAINT: Duration = Duration::from_millis(50);

#[derive(Default)]
pub enum AppMode {
    #[default]
    Playground,
    AddingSnippet,
}

pub struct RecallApp<C> {
    mode: AppMode,
    add_window: AddWindowState,
    playground: Playground,
    engine: RecallContext<C>,

    store: SnippetStore,
    hotkey_receiver: mpsc::Receiver<HotkeyEvent>,
    config_path: PathBuf,
    config_watcher: Option<ConfigWatcher>,
}

impl<C: StoreChannel> RecallApp<C> {
    pub fn new(
        config: RecallConfig,
        config_path: PathBuf,
        store: SnippetStore,
        channel: C,
        hotkey_rx: mpsc::Receiver<HotkeyEvent>,
    ) -> Result<Self, ConfigError> {
        let config_watcher = match ConfigWatcher::new(&config_path) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log::warn!("Config changes will not be picked up: {}", e);
                None
            }
        };

        Ok(Self {
            mode: AppMode::Playground,
            add_window: AddWindowState::new(),
            playground: Playground::new(),
            engine: RecallContext::new(config, channel)?,
            store,
            hotkey_receiver: hotkey_rx,
            config_path,
            config_watcher,
        })
    }

    fn handle_hotkeys(&mut self, now: Instant) {
        while let Ok(event) = self.hotkey_receiver.try_recv() {
            match event {
                HotkeyEvent::ToggleAutoComplete => {
                    let enabled = !self.engine.enabled();
                    self.engine.set_enabled(self.playground.document_mut(), enabled, now);
                }
                HotkeyEvent::AddSnippet => {
                    self.add_window.reset();
                    self.mode = AppMode::AddingSnippet;
                }
            }
        }
    }

    fn reload_config(&mut self, now: Instant) {
        let changed = self.config_watcher.as_ref().is_some_and(|w| w.changed());
        if !changed {
            return;
        }
        let result = RecallConfig::load(&self.config_path)
            .and_then(|config| self.engine.reconfigure(self.playground.document_mut(), config, now));
        match result {
            Ok(()) => log::info!("Reloaded config from {}", self.config_path.display()),
            Err(e) => log::warn!("Keeping previous config: {}", e),
        }
    }
}

impl<C: StoreChannel> eframe::App for RecallApp<C> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_hotkeys(now);
        self.reload_config(now);

        match self.mode {
            AppMode::Playground => {
                self.playground.show(ctx, &mut self.engine, now);
            }
            AppMode::AddingSnippet => {
                if let Some(action) = self.add_window.show(ctx) {
                    if let AddWindowAction::Save(draft) = action {
                        match self.store.save_snippet(draft) {
                            Ok(snippet) => {
                                self.engine.invalidate_cache();
                                log::info!("Snippet {} saved successfully", snippet.id);
                            }
                            Err(e) => {
                                log::error!("Failed to save snippet: {}", e);
                            }
                        }
                    }

                    self.mode = AppMode::Playground;
                }
            }
        }

        let wait = self
            .engine
            .next_wakeup()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_REPAINT);
        ctx.request_repaint_after(wait.min(IDLE_REPAINT));
    }
}
