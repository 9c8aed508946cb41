//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::ease::Ease;

/// Tuning knobs for one engine instance. Every field has a default, so hosts can
/// pass a partial JSON object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Writes smaller than this are skipped while a channel is still moving.
    /// A channel that comes to rest always receives its exact final value.
    pub value_epsilon: f32,

    /// Frame deltas above this (seconds) are treated as a stall...
    pub lag_threshold: f32,
    /// ...and replaced by this delta so clocks do not jump after a stall.
    pub lag_adjusted_dt: f32,

    /// Duration used when a tween does not declare one.
    pub default_duration: f32,
    /// Ease used when a tween does not declare one.
    pub default_ease: Ease,

    /// Maximum events to retain per tick; extras are dropped and logged.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            value_epsilon: 1e-4,
            lag_threshold: 0.5,
            lag_adjusted_dt: 0.033,
            default_duration: 0.5,
            default_ease: Ease::default(),
            max_events_per_tick: 1024,
        }
    }
}

impl Config {
    /// Frame delta after lag smoothing. Negative or NaN deltas count as zero.
    pub fn effective_dt(&self, dt: f32) -> f32 {
        if dt.is_nan() || dt <= 0.0 {
            0.0
        } else if dt > self.lag_threshold {
            self.lag_adjusted_dt
        } else {
            dt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "valueEpsilon": 0.01 }"#).unwrap();
        assert_eq!(cfg.value_epsilon, 0.01);
        assert_eq!(cfg.lag_threshold, 0.5);
        assert_eq!(cfg.max_events_per_tick, 1024);
    }

    #[test]
    fn stalls_are_smoothed() {
        let cfg = Config::default();
        assert_eq!(cfg.effective_dt(0.016), 0.016);
        assert_eq!(cfg.effective_dt(2.0), 0.033);
        assert_eq!(cfg.effective_dt(-1.0), 0.0);
        assert_eq!(cfg.effective_dt(f32::NAN), 0.0);
    }
}
