//! Injected configuration context.
//!
//! Both the tunable settings and the worker registry are an explicit,
//! constructed-once context struct passed around as `Arc<Settings>` rather
//! than a global -- concurrency safety then falls out of ordinary borrow
//! checking instead of being a convention callers must remember.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-channel display/reference policy flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ChannelDisplayPolicy {
    /// Include channels with no backing raw signal in responses, zero-filled.
    pub show_missing: bool,
    /// Include channels the montage marks hidden/invisible in responses.
    pub show_hidden: bool,
}

/// Settings recognized by the montage core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MontageSettings {
    /// Seconds of symmetric padding added around a requested window before
    /// filtering; must be non-negative.
    pub filter_padding_seconds: f64,
    /// If true, `get_signals` may reuse the processor's output cache instead
    /// of recomputing when it already covers the request.
    pub pre_cache: bool,
    pub display: ChannelDisplayPolicy,
}

impl Default for MontageSettings {
    fn default() -> Self {
        Self {
            filter_padding_seconds: 1.0,
            pre_cache: true,
            display: ChannelDisplayPolicy::default(),
        }
    }
}

impl MontageSettings {
    /// Panics in debug builds on an invalid (negative) padding value rather
    /// than silently clamping it; this is a configuration error, not a
    /// run-time one.
    pub fn validate(&self) -> Result<(), String> {
        if self.filter_padding_seconds < 0.0 {
            return Err(format!(
                "filter_padding_seconds must be >= 0, got {}",
                self.filter_padding_seconds
            ));
        }
        Ok(())
    }
}

/// Read-mostly snapshot shared by every worker/client constructed from the
/// same `init` call, in place of a process-wide settings/worker global.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub settings: Arc<MontageSettings>,
    /// Namespace tag used as the `log` target for every message this
    /// worker/client logs.
    pub namespace: Arc<str>,
}

impl WorkerContext {
    /// Single entry point constructing a context; there is deliberately no
    /// way to mutate a shared global afterward. Callers that need updated
    /// settings call `update_settings` which produces a new context, they don't mutate this one.
    pub fn init(namespace: impl Into<Arc<str>>, settings: MontageSettings) -> Result<Self, String> {
        settings.validate()?;
        Ok(Self {
            settings: Arc::new(settings),
            namespace: namespace.into(),
        })
    }

    pub fn with_settings(&self, settings: MontageSettings) -> Result<Self, String> {
        settings.validate()?;
        Ok(Self {
            settings: Arc::new(settings),
            namespace: self.namespace.clone(),
        })
    }
}
