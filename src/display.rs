//! Live Display.
//!
//! Subscribes to `agent:<provider>` topics for the active provider set and
//! maintains a render-ready snapshot per provider. Actual terminal painting
//! is left to the CLI binary; this module owns only the subscribe-and-fold
//! loop and the layout/state types it produces.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::bus::{Event, EventBus};
use crate::provider::ProviderId;

/// Pane arrangement. Three or more active providers force `Stacked`
/// regardless of what's configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Stacked,
    SideBySide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    Default,
    Monochrome,
    HighContrast,
}

/// Rendering parameters, loaded from the `display` key of [`crate::config::Configuration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_layout")]
    pub layout: Layout,
    #[serde(default)]
    pub show_timestamps: bool,
    #[serde(default = "default_true")]
    pub show_token_count: bool,
    #[serde(default = "default_color_scheme")]
    pub color_scheme: ColorScheme,
    #[serde(default = "default_max_pane_height")]
    pub max_pane_height: u16,
    #[serde(default = "default_refresh_rate_ms")]
    pub refresh_rate_ms: u64,
    #[serde(default = "default_true")]
    pub show_progress: bool,
    #[serde(default)]
    pub compact_mode: bool,
}

fn default_layout() -> Layout {
    Layout::Stacked
}
fn default_true() -> bool {
    true
}
fn default_color_scheme() -> ColorScheme {
    ColorScheme::Default
}
fn default_max_pane_height() -> u16 {
    20
}
fn default_refresh_rate_ms() -> u64 {
    100
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            show_timestamps: false,
            show_token_count: true,
            color_scheme: default_color_scheme(),
            max_pane_height: default_max_pane_height(),
            refresh_rate_ms: default_refresh_rate_ms(),
            show_progress: true,
            compact_mode: false,
        }
    }
}

impl DisplayConfig {
    /// The effective layout for `active_count` providers: ≥3 always stacks.
    pub fn effective_layout(&self, active_count: usize) -> Layout {
        if active_count >= 3 {
            Layout::Stacked
        } else {
            self.layout
        }
    }
}

/// Per-provider render state, folded from bus events.
#[derive(Debug, Clone)]
pub struct PaneState {
    pub provider: ProviderId,
    pub status: PaneStatus,
    pub accumulated_content: String,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneStatus {
    Idle,
    Working,
    Complete,
    Error,
}

/// Folds bus events for a set of providers into render-ready pane state,
/// throttling redraws to `config.refresh_rate_ms`.
pub struct LiveDisplay {
    config: DisplayConfig,
    panes: HashMap<ProviderId, PaneState>,
    last_redraw: Option<Instant>,
}

impl LiveDisplay {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            config,
            panes: HashMap::new(),
            last_redraw: None,
        }
    }

    /// Fold one bus event into pane state. Returns `true` if a redraw is
    /// due (event arrived and the refresh-rate throttle has elapsed).
    pub fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::AgentStarted { provider, .. } => {
                self.panes.insert(
                    *provider,
                    PaneState {
                        provider: *provider,
                        status: PaneStatus::Working,
                        accumulated_content: String::new(),
                        started_at: Instant::now(),
                    },
                );
            }
            Event::AgentToken { provider, token, .. } => {
                if let Some(pane) = self.panes.get_mut(provider) {
                    pane.accumulated_content.push_str(token);
                }
            }
            Event::AgentCompleted { provider, .. } => {
                if let Some(pane) = self.panes.get_mut(provider) {
                    pane.status = PaneStatus::Complete;
                }
            }
            Event::AgentFailed { provider, .. } => {
                if let Some(pane) = self.panes.get_mut(provider) {
                    pane.status = PaneStatus::Error;
                }
            }
            _ => return false,
        }
        self.should_redraw()
    }

    fn should_redraw(&mut self) -> bool {
        let now = Instant::now();
        let due = match self.last_redraw {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_millis(self.config.refresh_rate_ms),
        };
        if due {
            self.last_redraw = Some(now);
        }
        due
    }

    pub fn layout(&self) -> Layout {
        self.config.effective_layout(self.panes.len())
    }

    pub fn panes(&self) -> impl Iterator<Item = &PaneState> {
        self.panes.values()
    }

    /// Run the subscribe-and-fold loop against `bus`'s wildcard topic,
    /// invoking `on_redraw` whenever a redraw is due. Returns when the
    /// underlying channel closes.
    pub async fn run(mut self, bus: &EventBus, mut on_redraw: impl FnMut(&LiveDisplay)) {
        let mut rx = bus.subscribe("*").await;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if self.apply(&event) {
                        on_redraw(&self);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
