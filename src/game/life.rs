use log::info;
use serde::{Deserialize, Serialize};

pub const LIFE_MAX: f64 = 100.0;
pub const LIFE_INITIAL: f64 = 50.0;
pub const LIFE_HIT: f64 = 2.0;
pub const LIFE_MISS: f64 = -5.0;
pub const LIFE_HIT_MINE: f64 = -10.0;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifeRules {
    pub max: f64,
    pub initial: f64,
    pub hit: f64,
    pub miss: f64,
    pub mine_hit: f64,
}

impl Default for LifeRules {
    fn default() -> Self {
        Self {
            max: LIFE_MAX,
            initial: LIFE_INITIAL,
            hit: LIFE_HIT,
            miss: LIFE_MISS,
            mine_hit: LIFE_HIT_MINE,
        }
    }
}

/// Health bar. Reaching zero flags the player as failed; play goes on.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifeMeter {
    pub value: f64,
    pub failed: bool,
    max: f64,
}

impl LifeMeter {
    pub fn new(rules: &LifeRules) -> Self {
        Self {
            value: rules.initial.clamp(0.0, rules.max),
            failed: false,
            max: rules.max,
        }
    }

    pub fn apply(&mut self, delta: f64) {
        if self.failed {
            return;
        }
        self.value = (self.value + delta).clamp(0.0, self.max);
        if self.value <= 0.0 {
            self.failed = true;
            info!("Player has failed!");
        }
    }
}
