// Shared judgement window definitions, so judging, autoplay and miss
// detection all agree on the same tolerances.
use crate::game::judgment::Judgement;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Beat-delta windows, narrowest first.
pub const BASE_MARVELOUS_BEATS: f64 = 0.05;
pub const BASE_PERFECT_BEATS: f64 = 0.10;
pub const BASE_GREAT_BEATS: f64 = 0.20;
pub const BASE_GOOD_BEATS: f64 = 0.30;
pub const BASE_BOO_BEATS: f64 = 0.40;

// ITG tap windows in seconds, used when judging by time instead of beats.
pub const TIMING_WINDOW_ADD_S: f64 = 0.0015; // +1.5ms padding applied by ITG/SM
pub const BASE_W1_S: f64 = 0.0215;
pub const BASE_W2_S: f64 = 0.0430;
pub const BASE_W3_S: f64 = 0.1020;
pub const BASE_W4_S: f64 = 0.1350;
pub const BASE_W5_S: f64 = 0.1800;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowUnit {
    /// Compare `|note.beat - input_beat|`.
    Beats,
    /// Compare `|note.sec - input_sec|`.
    Seconds,
}

impl WindowUnit {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beats => "Beats",
            Self::Seconds => "Seconds",
        }
    }
}

impl FromStr for WindowUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beats" | "beat" => Ok(Self::Beats),
            "seconds" | "second" | "secs" => Ok(Self::Seconds),
            _ => Err(()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingProfile {
    pub unit: WindowUnit,
    // Marvelous, Perfect, Great, Good, Boo.
    pub windows: [f64; 5],
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::beats()
    }
}

impl TimingProfile {
    pub const fn beats() -> Self {
        Self {
            unit: WindowUnit::Beats,
            windows: [
                BASE_MARVELOUS_BEATS,
                BASE_PERFECT_BEATS,
                BASE_GREAT_BEATS,
                BASE_GOOD_BEATS,
                BASE_BOO_BEATS,
            ],
        }
    }

    pub fn itg_seconds() -> Self {
        Self {
            unit: WindowUnit::Seconds,
            windows: [
                BASE_W1_S + TIMING_WINDOW_ADD_S,
                BASE_W2_S + TIMING_WINDOW_ADD_S,
                BASE_W3_S + TIMING_WINDOW_ADD_S,
                BASE_W4_S + TIMING_WINDOW_ADD_S,
                BASE_W5_S + TIMING_WINDOW_ADD_S,
            ],
        }
    }

    /// Windows must be positive, finite and widen monotonically.
    pub fn is_well_ordered(&self) -> bool {
        self.windows.iter().all(|w| w.is_finite() && *w > 0.0)
            && self.windows.windows(2).all(|pair| pair[0] <= pair[1])
    }

    #[inline(always)]
    pub fn widest(&self) -> f64 {
        self.windows[4]
    }

    /// Mines only bite inside the narrowest window.
    #[inline(always)]
    pub fn mine_window(&self) -> f64 {
        self.windows[0]
    }

    /// Signed distance between a note and an input sample in this profile's unit.
    /// Positive means the input came late.
    #[inline(always)]
    pub fn delta(&self, note_beat: f64, note_sec: f64, now_beat: f64, now_sec: f64) -> f64 {
        match self.unit {
            WindowUnit::Beats => now_beat - note_beat,
            WindowUnit::Seconds => now_sec - note_sec,
        }
    }

    /// Narrowest window that contains `delta`, or `None` beyond the widest one
    /// (no note there at all, which is not the same as a miss).
    #[inline(always)]
    pub fn classify_delta(&self, delta: f64) -> Option<Judgement> {
        const ORDER: [Judgement; 5] = [
            Judgement::Marvelous,
            Judgement::Perfect,
            Judgement::Great,
            Judgement::Good,
            Judgement::Boo,
        ];
        let abs = delta.abs();
        self.windows
            .iter()
            .zip(ORDER)
            .find(|(w, _)| abs <= **w)
            .map(|(_, judgement)| judgement)
    }
}
