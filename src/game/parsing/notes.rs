use crate::game::note::{LANE_COUNT, Note, NoteKind, Sustain, SustainKind};
use crate::game::parsing::ChartError;
use crate::game::timing::{BEATS_PER_MEASURE, TimingData};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NoteChar {
    Empty,
    Tap,
    HoldStart,
    HoldEnd,
    RollStart,
    Mine,
}

impl TryFrom<char> for NoteChar {
    type Error = char;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0' => Ok(Self::Empty),
            '1' => Ok(Self::Tap),
            '2' => Ok(Self::HoldStart),
            '3' => Ok(Self::HoldEnd),
            '4' => Ok(Self::RollStart),
            'M' => Ok(Self::Mine),
            other => Err(other),
        }
    }
}

#[inline(always)]
fn row_beat(measure: usize, row: usize, rows: usize) -> f64 {
    (measure as f64 + row as f64 / rows as f64) * BEATS_PER_MEASURE
}

/// Turns the comma-separated measure grid of one `#NOTES` block into a
/// beat-ordered note list with resolved times.
///
/// Line breaks are gone by the time this runs, so a measure is one run of
/// characters; any whitespace inside it is dropped. An empty measure is a
/// blank bar: it still advances the beat but holds no notes.
pub fn parse_measures(data: &str, timing: &TimingData) -> Result<Vec<Note>, ChartError> {
    let measures: Vec<String> = data
        .split(',')
        .map(|m| m.chars().filter(|c| !c.is_whitespace()).collect())
        .collect();

    let mut notes: Vec<Note> = Vec::new();
    let mut open_holds: [Option<usize>; LANE_COUNT] = [None; LANE_COUNT];

    for (m, measure) in measures.iter().enumerate() {
        let chars: Vec<char> = measure.chars().collect();
        if chars.is_empty() {
            continue;
        }
        if chars.len() % LANE_COUNT != 0 {
            return Err(ChartError::InvalidMeasureLength {
                measure: m,
                length: chars.len(),
            });
        }

        let rows = chars.len() / LANE_COUNT;
        for (l, row) in chars.chunks_exact(LANE_COUNT).enumerate() {
            let beat = row_beat(m, l, rows);
            // Only rows that actually hold something pay for the time lookup.
            let mut row_sec = None;
            for (column, &c) in row.iter().enumerate() {
                let kind = NoteChar::try_from(c).map_err(|found| ChartError::UnknownNoteChar {
                    measure: m,
                    row: l,
                    column,
                    found,
                })?;
                if kind == NoteChar::Empty {
                    continue;
                }
                let sec = *row_sec.get_or_insert_with(|| timing.beat_to_sec(beat));
                let mut push = |kind: NoteKind| {
                    notes.push(Note {
                        kind,
                        beat,
                        sec,
                        column: column as u8,
                    });
                };

                match kind {
                    NoteChar::Empty => {}
                    NoteChar::Tap => push(NoteKind::Tap),
                    NoteChar::Mine => push(NoteKind::Mine),
                    NoteChar::HoldStart | NoteChar::RollStart => {
                        if open_holds[column].is_some() {
                            return Err(ChartError::OverlappingHold {
                                measure: m,
                                row: l,
                                column,
                            });
                        }
                        let sustain_kind = if kind == NoteChar::HoldStart {
                            SustainKind::Hold
                        } else {
                            SustainKind::Roll
                        };
                        push(NoteKind::Sustain(Sustain {
                            kind: sustain_kind,
                            beat_length: 0.0,
                            sec_length: 0.0,
                        }));
                        open_holds[column] = Some(notes.len() - 1);
                    }
                    NoteChar::HoldEnd => {
                        let Some(head_idx) = open_holds[column].take() else {
                            return Err(ChartError::UnmatchedHoldEnd {
                                measure: m,
                                row: l,
                                column,
                            });
                        };
                        let head = &mut notes[head_idx];
                        let (head_beat, head_sec) = (head.beat, head.sec);
                        if let NoteKind::Sustain(s) = &mut head.kind {
                            s.beat_length = beat - head_beat;
                            s.sec_length = sec - head_sec;
                        }
                    }
                }
            }
        }
    }

    if let Some((column, idx)) = open_holds
        .iter()
        .enumerate()
        .find_map(|(col, idx)| idx.map(|i| (col, i)))
    {
        return Err(ChartError::UnterminatedHold {
            column,
            beat: notes[idx].beat,
        });
    }

    Ok(notes)
}
