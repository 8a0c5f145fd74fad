//! Editor tuning knobs, read from the environment with defaults.
//!
//! Every key is optional. Values that fail to parse, or that are negative or
//! non-finite, fall back to the default and log a warning.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::consts::{
    ALIGN_MARGIN_PX, DEFAULT_THROTTLE, DRAG_EPSILON_PX, FRAME_INTERVAL, HISTORY_CAPACITY, MIN_PAGE_SIZE,
    PASTE_OFFSET,
};

const SNAP_TOLERANCE_KEY: &str = "EDITOR_SNAP_TOLERANCE_PX";
const DRAG_EPSILON_KEY: &str = "EDITOR_DRAG_EPSILON_PX";
const FRAME_INTERVAL_KEY: &str = "EDITOR_FRAME_INTERVAL_MS";
const THROTTLE_KEY: &str = "EDITOR_THROTTLE_MS";
const HISTORY_CAPACITY_KEY: &str = "EDITOR_HISTORY_CAPACITY";
const PASTE_OFFSET_KEY: &str = "EDITOR_PASTE_OFFSET";
const MIN_PAGE_SIZE_KEY: &str = "EDITOR_MIN_PAGE_SIZE";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    /// Snap tolerance in screen pixels.
    pub snap_tolerance_px: f64,
    /// Pointer travel before an armed gesture becomes active.
    pub drag_epsilon_px: f64,
    /// Minimum spacing between gesture updates.
    pub frame_interval: Duration,
    /// Coalescing window for throttled commands.
    pub throttle: Duration,
    pub history_capacity: usize,
    /// Offset applied to pasted and duplicated layers.
    pub paste_offset: f64,
    /// Smallest page width or height accepted.
    pub min_page_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_px: ALIGN_MARGIN_PX,
            drag_epsilon_px: DRAG_EPSILON_PX,
            frame_interval: FRAME_INTERVAL,
            throttle: DEFAULT_THROTTLE,
            history_capacity: HISTORY_CAPACITY,
            paste_offset: PASTE_OFFSET,
            min_page_size: MIN_PAGE_SIZE,
        }
    }
}

impl EditorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let millis = |key: &str, default: Duration| {
            let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(parse_or(key, lookup(key), default_ms))
        };
        Self {
            snap_tolerance_px: parse_distance(SNAP_TOLERANCE_KEY, lookup(SNAP_TOLERANCE_KEY), d.snap_tolerance_px),
            drag_epsilon_px: parse_distance(DRAG_EPSILON_KEY, lookup(DRAG_EPSILON_KEY), d.drag_epsilon_px),
            frame_interval: millis(FRAME_INTERVAL_KEY, d.frame_interval),
            throttle: millis(THROTTLE_KEY, d.throttle),
            history_capacity: parse_or(HISTORY_CAPACITY_KEY, lookup(HISTORY_CAPACITY_KEY), d.history_capacity),
            paste_offset: parse_or(PASTE_OFFSET_KEY, lookup(PASTE_OFFSET_KEY), d.paste_offset),
            min_page_size: parse_distance(MIN_PAGE_SIZE_KEY, lookup(MIN_PAGE_SIZE_KEY), d.min_page_size),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable config value");
            default
        }
    }
}

/// Like [`parse_or`], but the value must also be finite and non-negative.
fn parse_distance(key: &str, raw: Option<String>, default: f64) -> f64 {
    let value = parse_or(key, raw, default);
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(key, value, "ignoring out-of-range config value");
        default
    }
}
