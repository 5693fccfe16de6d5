//! The recall engine as seen by its host.

use std::time::{Duration, Instant};

use super::dispatch::{DispatchFailure, DispatchOutcome, DispatchTimings, QueryDispatcher};
use super::dom::{Document, NodeId};
use super::editor::insertion_text;
use super::panel::{Key, PanelCommand, PanelStyle, SuggestionPanel};
use super::rank::DefaultLimits;
use super::surface::{classify, locate_hosted_editor, EditableSurface, Surface};
use super::trigger::{TriggerDetector, TriggerSession};
use crate::config::RecallConfig;
use crate::error::{ConfigError, DetectionError};
use crate::storage::{Snippet, StoreChannel};

const CHANNEL_NOTICE_TTL: Duration = Duration::from_secs(10);
const TOGGLE_NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    ChannelUnavailable,
    AutoCompleteToggled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self.kind {
            NoticeKind::ChannelUnavailable => "Snippet store is unavailable. Suggestions are paused.",
            NoticeKind::AutoCompleteToggled(true) => "Inline recall enabled",
            NoticeKind::AutoCompleteToggled(false) => "Inline recall disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    /// The engine used the key; the host should suppress its default action.
    Consumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerHit {
    Row(usize),
    Panel,
    Element(NodeId),
    Outside,
}

#[derive(Debug, Clone, Copy)]
struct CaretRestore {
    surface: Surface,
    offset: usize,
}

pub struct RecallContext<C> {
    config: RecallConfig,
    detector: TriggerDetector,
    dispatcher: QueryDispatcher<C>,
    style: PanelStyle,
    enabled: bool,
    surface: Option<Surface>,
    session: Option<TriggerSession>,
    active_query: Option<String>,
    panel: Option<SuggestionPanel>,
    last_caret: Option<usize>,
    notice: Option<Notice>,
    notice_raised: bool,
    caret_restore: Option<CaretRestore>,
    hosted: Vec<Surface>,
}

fn default_limits(config: &RecallConfig) -> DefaultLimits {
    DefaultLimits {
        bookmarked: config.default_bookmark_limit,
        recent: config.default_recent_limit,
        max_displayed: config.max_displayed_items,
    }
}

impl<C: StoreChannel> RecallContext<C> {
    pub fn new(config: RecallConfig, channel: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = TriggerDetector::new(&config.trigger_prefix)?;
        let dispatcher = QueryDispatcher::new(
            channel,
            DispatchTimings::from(&config),
            default_limits(&config),
            config.cache_capacity,
        );

        Ok(Self {
            detector,
            dispatcher,
            style: PanelStyle::from(&config),
            enabled: config.auto_complete_enabled,
            surface: None,
            session: None,
            active_query: None,
            panel: None,
            last_caret: None,
            notice: None,
            notice_raised: false,
            caret_restore: None,
            hosted: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn session(&self) -> Option<TriggerSession> {
        self.session
    }

    pub fn surface(&self) -> Option<Surface> {
        self.surface
    }

    pub fn panel(&self) -> Option<&SuggestionPanel> {
        self.panel.as_ref()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn dispatcher(&self) -> &QueryDispatcher<C> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut QueryDispatcher<C> {
        &mut self.dispatcher
    }

    pub fn hosted_surfaces(&self) -> &[Surface] {
        &self.hosted
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        let notice = self.notice.map(|n| n.expires_at);
        notice.into_iter().chain(self.dispatcher.next_wakeup()).min()
    }

    /// Applies a reloaded config. An invalid config is rejected whole and
    /// the current one stays in effect.
    pub fn reconfigure(&mut self, doc: &mut Document, config: RecallConfig, now: Instant) -> Result<(), ConfigError> {
        config.validate()?;
        let detector = TriggerDetector::new(&config.trigger_prefix)?;

        if detector.prefix() != self.detector.prefix() {
            self.teardown(doc);
        }
        self.detector = detector;
        self.dispatcher.set_timings(DispatchTimings::from(&config));
        self.dispatcher.set_limits(default_limits(&config));
        self.style = PanelStyle::from(&config);

        let enabled = config.auto_complete_enabled;
        self.config = config;
        self.set_enabled(doc, enabled, now);
        Ok(())
    }

    pub fn set_enabled(&mut self, doc: &mut Document, enabled: bool, now: Instant) {
        if self.enabled == enabled {
            return;
        }
        log::info!("Inline recall {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
        self.config.auto_complete_enabled = enabled;
        if !enabled {
            self.teardown(doc);
        }
        self.notice = Some(Notice {
            kind: NoticeKind::AutoCompleteToggled(enabled),
            expires_at: now + TOGGLE_NOTICE_TTL,
        });
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn invalidate_cache(&mut self) {
        self.dispatcher.invalidate_cache();
    }

    pub fn on_focus_in(&mut self, doc: &mut Document, target: NodeId) {
        let surface = classify(doc, target, &self.config.shadow_hosts);
        let element = surface.map(|s| s.element());
        if self.session.is_some_and(|s| Some(s.element) != element) {
            log::debug!("Focus moved away from the trigger session");
            self.teardown(doc);
        }
        if self.surface.map(|s| s.element()) != element {
            self.last_caret = surface.and_then(|s| s.caret(doc));
        }
        self.surface = surface;
    }

    fn resolve_surface(&self, doc: &Document, target: NodeId) -> Result<Surface, DetectionError> {
        classify(doc, target, &self.config.shadow_hosts).ok_or(DetectionError::NotEditable)
    }

    pub fn on_blur(&mut self, doc: &mut Document) {
        self.teardown(doc);
        self.surface = None;
    }

    pub fn on_input(&mut self, doc: &mut Document, target: NodeId, data: Option<&str>, now: Instant) {
        if !self.enabled {
            return;
        }
        let surface = match self.resolve_surface(doc, target) {
            Ok(surface) => surface,
            Err(e) => {
                log::debug!("Ignoring input: {}", e);
                return;
            }
        };
        let element = surface.element();
        if self.session.is_some_and(|s| s.element != element) {
            self.teardown(doc);
        }
        self.surface = Some(surface);

        if !self.detector.should_evaluate(data, self.session.is_some()) {
            self.active_query = None;
            self.dispatcher.cancel();
            return;
        }

        let detection = match self.detector.detect(doc, &surface, self.last_caret) {
            Ok(detection) => detection,
            Err(e) => {
                log::debug!("Detection aborted: {}", e);
                self.teardown(doc);
                return;
            }
        };
        self.last_caret = Some(detection.caret);

        let Some(found) = detection.found else {
            if self.session.is_some() {
                log::debug!("Trigger token ended");
            }
            self.teardown(doc);
            return;
        };

        if self.session.is_none() {
            self.notice_raised = false;
        }
        self.session = Some(TriggerSession {
            element,
            start: found.start,
            end: found.end,
        });
        let query = found.query.trim().to_string();
        log::debug!("Trigger query {:?} at [{}, {})", query, found.start, found.end);
        self.dispatcher.schedule(&query, element, now);
        self.active_query = Some(query);
    }

    pub fn on_selection_change(&mut self, doc: &mut Document) {
        let Some(surface) = self.surface else {
            return;
        };
        let Some(caret) = surface.caret(doc) else {
            return;
        };
        self.last_caret = Some(caret);
        if self
            .session
            .is_some_and(|s| s.element == surface.element() && !s.covers(caret))
        {
            log::debug!("Caret left the trigger token");
            self.teardown(doc);
        }
    }

    pub fn on_keydown(&mut self, doc: &mut Document, key: Key) -> KeyOutcome {
        let Some(panel) = self.panel.as_mut() else {
            return KeyOutcome::Ignored;
        };
        match panel.handle_key(key) {
            PanelCommand::Moved(_) => KeyOutcome::Consumed,
            PanelCommand::Insert(index) => {
                self.select(doc, index);
                KeyOutcome::Consumed
            }
            PanelCommand::Close => {
                self.teardown(doc);
                if key == Key::Enter {
                    KeyOutcome::Ignored
                } else {
                    KeyOutcome::Consumed
                }
            }
            PanelCommand::Ignore => KeyOutcome::Ignored,
        }
    }

    pub fn on_pointer_down(&mut self, doc: &mut Document, hit: PointerHit) {
        let Some(anchor) = self.panel.as_ref().map(|p| p.anchor()) else {
            return;
        };
        match hit {
            PointerHit::Row(index) => self.select(doc, index),
            PointerHit::Panel => {}
            PointerHit::Element(node) if doc.contains(anchor, node) => {}
            PointerHit::Element(_) | PointerHit::Outside => self.teardown(doc),
        }
    }

    /// Registers the editor inside a freshly inserted shadow host. Returns
    /// the surface the host should start forwarding events for, or `None`
    /// when it is unknown or already registered.
    pub fn on_surface_appeared(&mut self, doc: &Document, host: NodeId) -> Option<Surface> {
        let surface = locate_hosted_editor(doc, host, &self.config.shadow_hosts)?;
        self.hosted.retain(|s| s.is_connected(doc));
        if self.hosted.contains(&surface) {
            return None;
        }
        log::debug!("Editor registered inside shadow host {:?}", host);
        self.hosted.push(surface);
        Some(surface)
    }

    pub fn on_viewport_change(&mut self, doc: &Document) {
        if let Some(panel) = self.panel.as_mut() {
            panel.position(doc.rect(panel.anchor()), doc.viewport);
        }
    }

    pub fn on_animation_frame(&mut self, doc: &mut Document) {
        let Some(restore) = self.caret_restore.take() else {
            return;
        };
        if restore.surface.is_connected(doc) {
            restore.surface.set_caret(doc, restore.offset);
        } else {
            log::debug!("Skipping caret restore on a detached element");
        }
    }

    pub fn tick(&mut self, doc: &mut Document, now: Instant) {
        if self.notice.is_some_and(|n| n.expires_at <= now) {
            self.notice = None;
        }

        let enabled = self.enabled;
        let session = self.session;
        let surface = self.surface;
        let active = self.active_query.clone();
        let connected = |origin: NodeId| match surface.filter(|s| s.element() == origin) {
            Some(s) => s.is_connected(doc),
            None => doc.is_connected(origin),
        };
        let is_current = |origin: NodeId, query: &str| {
            enabled
                && session.is_some_and(|s| s.element == origin)
                && connected(origin)
                && active.as_deref() == Some(query)
        };

        let outcomes = self.dispatcher.tick(now, &is_current);
        let current: Vec<bool> = outcomes
            .iter()
            .map(|outcome| match outcome {
                DispatchOutcome::Results { .. } => true,
                DispatchOutcome::Failed { origin, query, .. } => is_current(*origin, query.as_str()),
            })
            .collect();

        for (outcome, current) in outcomes.into_iter().zip(current) {
            self.apply(doc, outcome, current, now);
        }
    }

    fn apply(&mut self, doc: &mut Document, outcome: DispatchOutcome, current: bool, now: Instant) {
        match outcome {
            DispatchOutcome::Results { origin, query, items } => {
                if self.notice.is_some_and(|n| n.kind == NoticeKind::ChannelUnavailable) {
                    self.notice = None;
                }
                self.notice_raised = false;
                self.show_results(doc, origin, &query, &items);
            }
            DispatchOutcome::Failed { origin, query, failure } => {
                log::warn!("Query {:?} failed: {:?}", query, failure);
                if !current {
                    return;
                }
                if let DispatchFailure::Transport(_) = failure {
                    self.raise_channel_notice(now);
                }
                self.show_results(doc, origin, &query, &[]);
            }
        }
    }

    fn raise_channel_notice(&mut self, now: Instant) {
        if self.notice_raised {
            return;
        }
        self.notice_raised = true;
        self.notice = Some(Notice {
            kind: NoticeKind::ChannelUnavailable,
            expires_at: now + CHANNEL_NOTICE_TTL,
        });
    }

    fn show_results(&mut self, doc: &Document, origin: NodeId, query: &str, items: &[Snippet]) {
        let mut panel = SuggestionPanel::new(origin, query, items, self.style);
        panel.position(doc.rect(origin), doc.viewport);
        self.panel = Some(panel);
    }

    pub fn select(&mut self, doc: &mut Document, index: usize) {
        let Some(snippet) = self.panel.as_ref().and_then(|p| p.items().get(index)).cloned() else {
            return;
        };
        self.insert(doc, &snippet);
    }

    fn insert(&mut self, doc: &mut Document, snippet: &Snippet) {
        let Some(surface) = self.surface else {
            self.teardown(doc);
            return;
        };
        if !surface.is_connected(doc) {
            log::warn!("Target element detached before insertion");
            self.teardown(doc);
            return;
        }

        let text = insertion_text(snippet);
        let element = surface.element();
        let result = match self.session.filter(|s| s.element == element) {
            Some(session) => surface.replace_range(doc, session.start, session.end, &text),
            None => {
                let caret = surface.caret(doc).or(self.last_caret);
                let token = caret.and_then(|caret| self.detector.find(&surface.text(doc), caret));
                match token {
                    Some(token) => surface.replace_range(doc, token.start, token.end, &text),
                    None => surface.insert_at_caret(doc, &text),
                }
            }
        };

        match result {
            Ok(replacement) => {
                log::debug!("Inserted snippet {:?} via {:?}", snippet.id, replacement.path);
                self.last_caret = Some(replacement.caret);
                if surface.is_rich() {
                    self.caret_restore = Some(CaretRestore {
                        surface,
                        offset: replacement.caret,
                    });
                }
            }
            Err(e) => log::error!("Snippet insertion failed: {}", e),
        }
        self.teardown(doc);
    }

    fn hide_panel(&mut self, doc: &mut Document) {
        if self.panel.take().is_none() {
            return;
        }
        let (Some(surface), Some(caret)) = (self.surface, self.last_caret) else {
            return;
        };
        if doc.focused() == Some(surface.element()) && surface.is_connected(doc) {
            surface.set_caret(doc, caret);
        }
    }

    fn teardown(&mut self, doc: &mut Document) {
        self.hide_panel(doc);
        self.session = None;
        self.active_query = None;
        self.dispatcher.cancel();
    }
}
