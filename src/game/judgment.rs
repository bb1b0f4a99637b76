use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Judgement {
    Marvelous,
    Perfect,
    Great,
    Good,
    Boo,
    Miss,
}

impl Judgement {
    pub const ALL: [Judgement; 6] = [
        Judgement::Marvelous,
        Judgement::Perfect,
        Judgement::Great,
        Judgement::Good,
        Judgement::Boo,
        Judgement::Miss,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn is_hit(self) -> bool {
        !matches!(self, Judgement::Miss)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Judgement::Marvelous => "Marvelous",
            Judgement::Perfect => "Perfect",
            Judgement::Great => "Great",
            Judgement::Good => "Good",
            Judgement::Boo => "Boo",
            Judgement::Miss => "Miss",
        }
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Histogram of judgements, indexed by `Judgement::index`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementCounts([u32; 6]);

impl JudgementCounts {
    #[inline(always)]
    pub fn add(&mut self, judgement: Judgement) {
        let slot = &mut self.0[judgement.index()];
        *slot = slot.saturating_add(1);
    }

    #[inline(always)]
    pub fn get(&self, judgement: Judgement) -> u32 {
        self.0[judgement.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Judgement, u32)> + '_ {
        Judgement::ALL.iter().map(|&j| (j, self.get(j)))
    }
}

/// Fixed score and accuracy weight per judgement.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub scores: [u32; 6],
    pub weights: [f64; 6],
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            scores: [1000, 800, 500, 200, 50, 0],
            weights: [1.0, 1.0, 0.8, 0.5, 0.25, 0.0],
        }
    }
}

impl ScoreTable {
    #[inline(always)]
    pub fn score_for(&self, judgement: Judgement) -> u32 {
        self.scores[judgement.index()]
    }

    #[inline(always)]
    pub fn weight_for(&self, judgement: Judgement) -> f64 {
        self.weights[judgement.index()]
    }

    /// Total score, rebuilt from the histogram.
    pub fn score(&self, counts: &JudgementCounts) -> u64 {
        counts
            .iter()
            .map(|(j, n)| u64::from(self.score_for(j)) * u64::from(n))
            .sum()
    }

    /// Weighted accuracy in percent over every scorable note in the chart.
    /// Notes not judged yet count as weight 0. Rebuilt from the histogram on
    /// every call so repeated updates never drift.
    pub fn accuracy(&self, counts: &JudgementCounts, total_scorable: u32) -> f64 {
        if total_scorable == 0 {
            return 0.0;
        }
        let achieved: f64 = counts
            .iter()
            .map(|(j, n)| self.weight_for(j) * f64::from(n))
            .sum();
        (achieved / f64::from(total_scorable) * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Judgement, JudgementCounts, ScoreTable};

    #[test]
    fn counts_accumulate_per_judgement() {
        let mut counts = JudgementCounts::default();
        counts.add(Judgement::Great);
        counts.add(Judgement::Great);
        counts.add(Judgement::Miss);
        assert_eq!(counts.get(Judgement::Great), 2);
        assert_eq!(counts.get(Judgement::Miss), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn score_is_the_sum_of_fixed_values() {
        let table = ScoreTable::default();
        let mut counts = JudgementCounts::default();
        counts.add(Judgement::Marvelous);
        counts.add(Judgement::Good);
        counts.add(Judgement::Miss);
        assert_eq!(table.score(&counts), 1200);
    }

    #[test]
    fn remaining_notes_weigh_zero() {
        let table = ScoreTable::default();
        let mut counts = JudgementCounts::default();
        counts.add(Judgement::Marvelous);
        assert!((table.accuracy(&counts, 4) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn accuracy_is_100_only_for_marvelous_or_perfect() {
        let table = ScoreTable::default();
        let mut counts = JudgementCounts::default();
        counts.add(Judgement::Marvelous);
        counts.add(Judgement::Perfect);
        assert_eq!(table.accuracy(&counts, 2), 100.0);
        counts.add(Judgement::Great);
        let acc = table.accuracy(&counts, 3);
        assert!(acc < 100.0 && acc > 0.0);
    }

    #[test]
    fn empty_chart_has_zero_accuracy() {
        let table = ScoreTable::default();
        assert_eq!(table.accuracy(&JudgementCounts::default(), 0), 0.0);
    }
}
