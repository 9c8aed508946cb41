//! Stagger offsets for one template applied to many targets.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{EngineError, EngineResult};

/// Which element starts first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaggerFrom {
    #[default]
    Start,
    End,
    Center,
    Edges,
    Index(usize),
}

/// `each` is the delay between neighbours; `amount` is the total spread, split
/// across the group. `each` wins if both are given.
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize)]
pub struct StaggerConfig {
    pub each: Option<f32>,
    pub amount: Option<f32>,
    pub from: StaggerFrom,
}

impl StaggerConfig {
    pub fn each(each: f32) -> Self {
        Self {
            each: Some(each),
            ..Self::default()
        }
    }
}

impl<'de> Deserialize<'de> for StaggerConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            #[serde(default)]
            each: Option<f32>,
            #[serde(default)]
            amount: Option<f32>,
            #[serde(default)]
            from: StaggerFrom,
        }
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Each(f32),
            Full(Full),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Each(each) if each.is_finite() => Ok(StaggerConfig::each(each)),
            Raw::Each(each) => Err(de::Error::custom(format!("invalid stagger {each}"))),
            Raw::Full(f) => Ok(StaggerConfig {
                each: f.each,
                amount: f.amount,
                from: f.from,
            }),
        }
    }
}

pub struct StaggerPlanner;

impl StaggerPlanner {
    /// `i * base` for each of `count` elements.
    pub fn plan(count: usize, base: f32) -> Vec<f32> {
        (0..count).map(|i| i as f32 * base).collect()
    }

    /// Offsets from an arbitrary function of the element index.
    pub fn plan_with(count: usize, f: impl Fn(usize) -> f32) -> Vec<f32> {
        (0..count).map(f).collect()
    }

    pub fn plan_config(count: usize, cfg: &StaggerConfig) -> EngineResult<Vec<f32>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = (count - 1) as f32;
        let mid = last / 2.0;
        let distance = |i: usize| -> f32 {
            let i = i as f32;
            match cfg.from {
                StaggerFrom::Start => i,
                StaggerFrom::End => last - i,
                StaggerFrom::Center => (i - mid).abs(),
                StaggerFrom::Edges => mid - (i - mid).abs(),
                StaggerFrom::Index(k) => (i - k.min(count - 1) as f32).abs(),
            }
        };
        let max_distance = (0..count).map(distance).fold(0.0f32, f32::max);
        let each = match (cfg.each, cfg.amount) {
            (Some(each), _) => each,
            (None, Some(amount)) if max_distance > 0.0 => amount / max_distance,
            _ => 0.0,
        };
        if !each.is_finite() || each < 0.0 {
            return Err(EngineError::InvalidTiming(format!("stagger {each}")));
        }
        Ok(Self::plan_with(count, |i| distance(i) * each))
    }
}
