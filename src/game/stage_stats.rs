use crate::game::chart::NoteCounts;
use crate::game::gameplay::{Counters, JudgementEngine};
use crate::game::judgment::{Judgement, JudgementCounts};
use crate::game::timing_stats::{self, ScatterPoint, TimingStats};
use serde::{Deserialize, Serialize};

/// End-of-session report, ready to print or persist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub title: String,
    pub difficulty: String,
    pub notes: NoteCounts,
    pub score: u64,
    pub accuracy: f64,
    pub max_combo: u32,
    pub health: f64,
    pub failed: bool,
    pub mines_hit: u32,
    pub counts: JudgementCounts,
    pub timing: TimingStats,
    /// Per-tap offsets for the evaluation scatter plot.
    pub scatter: Vec<ScatterPoint>,
    pub full_combo: bool,
}

impl StageSummary {
    pub fn from_engine(engine: &JudgementEngine) -> Self {
        let Counters {
            score,
            max_combo,
            health,
            accuracy,
            counts,
            mines_hit,
            failed,
            ..
        } = engine.counters();
        let notes = engine.schedule().notes();
        let note_counts = NoteCounts::of(notes);
        let timing = timing_stats::compute_note_timing_stats(notes, engine.note_states(), engine.offsets());
        let scatter = timing_stats::build_scatter_points(notes, engine.note_states(), engine.offsets());
        Self {
            title: engine.chart().metadata.title.clone(),
            difficulty: engine.key().to_string(),
            notes: note_counts,
            score,
            accuracy,
            max_combo,
            health,
            failed,
            mines_hit,
            counts,
            timing,
            scatter,
            full_combo: counts.get(Judgement::Miss) == 0 && counts.total() == note_counts.scorable(),
        }
    }
}
