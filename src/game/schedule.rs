use crate::game::note::{LANE_COUNT, Note};
use crate::game::timing_windows::{TimingProfile, WindowUnit};
use std::sync::Arc;

/// Read view over one difficulty's notes, with a per-column index so
/// candidate lookup is a binary search instead of a scan.
///
/// Notes are addressed by their position in the shared slice; runtime state
/// is kept elsewhere under the same index.
#[derive(Clone, Debug)]
pub struct NoteSchedule {
    notes: Arc<[Note]>,
    by_column: [Vec<usize>; LANE_COUNT],
}

impl NoteSchedule {
    pub fn new(notes: Arc<[Note]>) -> Self {
        let mut by_column: [Vec<usize>; LANE_COUNT] = Default::default();
        for (i, note) in notes.iter().enumerate() {
            if let Some(col) = by_column.get_mut(note.column as usize) {
                col.push(i);
            }
        }
        Self { notes, by_column }
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub fn column(&self, column: usize) -> &[usize] {
        self.by_column.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indices of notes in `column` whose beat lies within `window` of `beat`,
    /// in beat order.
    pub fn notes_near(&self, beat: f64, column: usize, window: f64) -> impl Iterator<Item = usize> + '_ {
        self.near_by(column, beat, window, |n| n.beat)
    }

    /// Same as `notes_near`, measured in seconds.
    pub fn notes_near_sec(&self, sec: f64, column: usize, window: f64) -> impl Iterator<Item = usize> + '_ {
        self.near_by(column, sec, window, |n| n.sec)
    }

    /// Dispatches on the profile's unit.
    pub fn candidates<'a>(
        &'a self,
        profile: &TimingProfile,
        column: usize,
        now_beat: f64,
        now_sec: f64,
        window: f64,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        match profile.unit {
            WindowUnit::Beats => Box::new(self.notes_near(now_beat, column, window)),
            WindowUnit::Seconds => Box::new(self.notes_near_sec(now_sec, column, window)),
        }
    }

    fn near_by<'a>(
        &'a self,
        column: usize,
        center: f64,
        window: f64,
        key: fn(&Note) -> f64,
    ) -> impl Iterator<Item = usize> + 'a {
        let indices = self.column(column);
        let lo = center - window;
        let hi = center + window;
        let start = indices.partition_point(|&i| key(&self.notes[i]) < lo);
        indices[start..]
            .iter()
            .copied()
            .take_while(move |&i| key(&self.notes[i]) <= hi)
    }
}
