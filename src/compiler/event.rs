use crate::score::song::{NoteLength, PalmMute, StringCell, Stroke, STRING_COUNT};

/// Source notation of a compiled note.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notation {
    Tab,
    Strum,
}

/// Notation-agnostic playable column.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackNote {
    pub notation: Notation,
    pub strings: [StringCell; STRING_COUNT],
    pub stroke: Stroke,
    pub palm_mute: PalmMute,
    pub note_length: NoteLength,
    /// Resolved tempo
    pub bpm: u32,
    /// Chord played by a strum, none for tab columns and rests
    pub chord_name: Option<String>,
}

impl PlaybackNote {
    pub fn beats(&self) -> f64 {
        self.note_length.beats()
    }

    pub fn sounded_strings(&self) -> usize {
        self.strings.iter().filter(|s| s.is_sounded()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Note(PlaybackNote),
    MeasureLine { palm_mute_active: bool },
    /// Zero-duration end of track marker
    Terminal,
}

impl PlaybackEvent {
    pub const fn as_note(&self) -> Option<&PlaybackNote> {
        match self {
            Self::Note(note) => Some(note),
            _ => None,
        }
    }

    pub const fn is_note(&self) -> bool {
        matches!(self, Self::Note(_))
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// Position of an event in the score tree, repeat indices included.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub progression_index: usize,
    pub section_index: usize,
    pub section_repeat_index: usize,
    pub sub_section_index: usize,
    pub sub_section_repeat_index: usize,
    pub chord_sequence_index: Option<usize>,
    pub chord_sequence_repeat_index: Option<usize>,
    pub column_index: usize,
}

impl Location {
    /// Same enclosing sub-section pass or chord sequence pass, any column.
    pub fn same_block(&self, other: &Self) -> bool {
        Self {
            column_index: 0,
            ..*self
        } == Self {
            column_index: 0,
            ..*other
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Metadata {
    pub location: Location,
    pub bpm: u32,
    /// Duration of the event in quarter-note beats
    pub note_length_multiplier: f64,
    pub elapsed_seconds: f64,
}

impl Metadata {
    /// End of track entry following this one.
    pub const fn terminal(&self, elapsed_seconds: f64) -> Self {
        let mut location = self.location;
        location.column_index += 1;
        Self {
            location,
            bpm: self.bpm,
            note_length_multiplier: self.note_length_multiplier,
            elapsed_seconds,
        }
    }

    pub fn rebased(&self, base_seconds: f64) -> Self {
        Self {
            elapsed_seconds: self.elapsed_seconds - base_seconds,
            ..*self
        }
    }
}

/// Compact event sequence and its index-aligned metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub events: Vec<PlaybackEvent>,
    pub metadata: Vec<Metadata>,
    /// Playback speed baked into the elapsed times
    pub speed: f64,
}

impl Compilation {
    pub const fn empty(speed: f64) -> Self {
        Self {
            events: Vec::new(),
            metadata: Vec::new(),
            speed,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of entries before the terminal one.
    pub fn playable_len(&self) -> usize {
        match self.events.last() {
            Some(PlaybackEvent::Terminal) => self.events.len() - 1,
            _ => self.events.len(),
        }
    }

    pub fn has_notes(&self) -> bool {
        self.events.iter().any(PlaybackEvent::is_note)
    }

    pub fn total_seconds(&self) -> f64 {
        self.metadata.last().map_or(0.0, |m| m.elapsed_seconds)
    }

    /// Time until the next entry starts.
    pub fn duration_of(&self, index: usize) -> f64 {
        match (self.metadata.get(index), self.metadata.get(index + 1)) {
            (Some(current), Some(next)) => next.elapsed_seconds - current.elapsed_seconds,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(column_index: usize, elapsed_seconds: f64) -> Metadata {
        Metadata {
            location: Location {
                column_index,
                ..Location::default()
            },
            bpm: 100,
            note_length_multiplier: 1.0,
            elapsed_seconds,
        }
    }

    #[test]
    fn test_terminal_follows_last_entry() {
        let last = metadata(3, 1.5);
        let terminal = last.terminal(2.1);
        assert_eq!(terminal.location.column_index, 4);
        assert_eq!(terminal.bpm, 100);
        assert_eq!(terminal.elapsed_seconds, 2.1);
    }

    #[test]
    fn test_same_block_ignores_column() {
        let a = Location {
            sub_section_index: 1,
            column_index: 2,
            ..Location::default()
        };
        let b = Location {
            column_index: 7,
            ..a
        };
        let c = Location {
            sub_section_repeat_index: 1,
            ..a
        };
        assert!(a.same_block(&b));
        assert!(!a.same_block(&c));
    }

    #[test]
    fn test_compilation_lengths() {
        let compilation = Compilation {
            events: vec![
                PlaybackEvent::MeasureLine {
                    palm_mute_active: false,
                },
                PlaybackEvent::Terminal,
            ],
            metadata: vec![metadata(0, 0.0), metadata(1, 0.0)],
            speed: 1.0,
        };
        assert_eq!(compilation.len(), 2);
        assert_eq!(compilation.playable_len(), 1);
        assert!(!compilation.has_notes());
        assert_eq!(compilation.duration_of(0), 0.0);
        assert_eq!(compilation.duration_of(5), 0.0);
        assert!(Compilation::empty(1.0).is_empty());
    }
}
