use crate::score::notation_parser::{parse_cell, parse_stroke};
use crate::TabError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Number of strings on the instrument
pub const STRING_COUNT: usize = 6;

/// Highest fret reachable on the neck
pub const MAX_FRET: u8 = 22;

/// Baseline tempo used when a song does not carry one
pub const DEFAULT_BPM: u32 = 75;

/// E2 A2 D3 G3 B3 E4, lowest string first
pub const STANDARD_TUNING: [u8; STRING_COUNT] = [40, 45, 50, 55, 59, 64];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default = "default_bpm")]
    pub bpm: u32,
    #[serde(default)]
    pub tuning: Tuning,
    #[serde(default)]
    pub capo: u8,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub section_progression: Vec<SectionProgression>,
    #[serde(default)]
    pub chords: Vec<Chord>,
}

const fn default_bpm() -> u32 {
    DEFAULT_BPM
}

impl Song {
    pub fn from_json(data: &str) -> Result<Self, TabError> {
        let song: Self = serde_json::from_str(data)?;
        log::debug!(
            "loaded song {:?} with {} sections",
            song.title,
            song.sections.len()
        );
        Ok(song)
    }

    pub fn from_file(path: &Path) -> Result<Self, TabError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Song tempo, the default one when unset.
    pub const fn baseline_bpm(&self) -> u32 {
        if self.bpm == 0 {
            DEFAULT_BPM
        } else {
            self.bpm
        }
    }

    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }
}

/// Open string MIDI keys, index 0 is the lowest string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuning {
    keys: [u8; STRING_COUNT],
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(STANDARD_TUNING)
    }
}

impl Tuning {
    pub const fn new(keys: [u8; STRING_COUNT]) -> Self {
        Self { keys }
    }

    pub const fn key(&self, string_index: usize) -> u8 {
        self.keys[string_index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sub_sections: Vec<SubSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubSection {
    Tab(TabSubSection),
    Chord(ChordSubSection),
}

impl SubSection {
    pub const fn repetitions(&self) -> Option<u32> {
        match self {
            Self::Tab(tab) => tab.repetitions,
            Self::Chord(chord) => chord.repetitions,
        }
    }

    pub const fn bpm(&self) -> Option<u32> {
        match self {
            Self::Tab(tab) => tab.bpm,
            Self::Chord(chord) => chord.bpm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSubSection {
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub repetitions: Option<u32>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSubSection {
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub repetitions: Option<u32>,
    #[serde(default)]
    pub sequences: Vec<ChordSequence>,
}

/// One time-slice of a tab sub-section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Column {
    Note(NoteColumn),
    #[serde(rename_all = "camelCase")]
    MeasureLine {
        /// Tempo applied from this line on
        #[serde(default)]
        bpm: Option<u32>,
        #[serde(default)]
        palm_mute_active: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteColumn {
    #[serde(default)]
    pub palm_mute: PalmMute,
    pub strings: [StringCell; STRING_COUNT],
    #[serde(default)]
    pub stroke: Stroke,
    pub note_length: NoteLength,
    #[serde(default)]
    pub note_length_modified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSequence {
    /// Chord names aligned with the strums, empty means "inherit previous"
    #[serde(default)]
    pub chords: Vec<String>,
    pub strumming_pattern: StrummingPattern,
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub repetitions: Option<u32>,
}

impl ChordSequence {
    pub fn chord_at(&self, index: usize) -> Option<&str> {
        self.chords
            .get(index)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrummingPattern {
    pub note_length: NoteLength,
    #[serde(default)]
    pub strums: Vec<Strum>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strum {
    #[serde(default)]
    pub stroke: Stroke,
    #[serde(default)]
    pub palm_mute: PalmMute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub name: String,
    pub frets: [StringCell; STRING_COUNT],
    #[serde(default)]
    pub color: String,
}

pub fn find_chord<'a>(chords: &'a [Chord], name: &str) -> Option<&'a Chord> {
    chords.iter().find(|c| c.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgression {
    pub section_id: String,
    #[serde(default)]
    pub repetitions: Option<u32>,
}

/// Every section once, in document order.
pub fn default_progression(sections: &[Section]) -> Vec<SectionProgression> {
    sections
        .iter()
        .map(|section| SectionProgression {
            section_id: section.id.clone(),
            repetitions: None,
        })
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PalmMute {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "-")]
    Continuation,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
}

impl PalmMute {
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteLength {
    #[serde(rename = "1")]
    Whole,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1/4th")]
    Quarter,
    #[serde(rename = "1/8th")]
    Eighth,
    #[serde(rename = "1/16th")]
    Sixteenth,
    #[serde(rename = "1/4th triplet")]
    QuarterTriplet,
    #[serde(rename = "1/8th triplet")]
    EighthTriplet,
    #[serde(rename = "1/16th triplet")]
    SixteenthTriplet,
}

impl NoteLength {
    /// Duration expressed in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            Self::Whole => 4.0,
            Self::Half => 2.0,
            Self::Quarter => 1.0,
            Self::Eighth => 0.5,
            Self::Sixteenth => 0.25,
            Self::QuarterTriplet => 2.0 / 3.0,
            Self::EighthTriplet => 1.0 / 3.0,
            Self::SixteenthTriplet => 1.0 / 6.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlideDirection {
    Up,
    Down,
}

impl SlideDirection {
    pub const fn symbol(self) -> char {
        match self {
            Self::Up => '/',
            Self::Down => '\\',
        }
    }
}

/// Symbol tying two adjacent fretted notes on the same string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tie {
    HammerOn,
    PullOff,
    Slide(SlideDirection),
}

impl Tie {
    pub const fn symbol(self) -> char {
        match self {
            Self::HammerOn => 'h',
            Self::PullOff => 'p',
            Self::Slide(direction) => direction.symbol(),
        }
    }

    pub const fn is_slide(self) -> bool {
        matches!(self, Self::Slide(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Bend {
    pub target_fret: Option<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FrettedNote {
    pub fret: u8,
    pub slide_in: Option<SlideDirection>,
    pub bend: Option<Bend>,
    pub vibrato: bool,
    pub accent: bool,
    pub staccato: bool,
    pub tie: Option<Tie>,
}

impl FrettedNote {
    pub const fn new(fret: u8) -> Self {
        Self {
            fret,
            slide_in: None,
            bend: None,
            vibrato: false,
            accent: false,
            staccato: false,
            tie: None,
        }
    }
}

/// Content of one string within a column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StringCell {
    #[default]
    Empty,
    Dead,
    Tie(Tie),
    Fret(FrettedNote),
}

impl StringCell {
    pub const fn fret(fret: u8) -> Self {
        Self::Fret(FrettedNote::new(fret))
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the cell produces a voice on its own.
    pub const fn is_sounded(&self) -> bool {
        matches!(self, Self::Dead | Self::Fret(_))
    }

    pub const fn as_fretted(&self) -> Option<&FrettedNote> {
        match self {
            Self::Fret(note) => Some(note),
            _ => None,
        }
    }
}

impl TryFrom<String> for StringCell {
    type Error = TabError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_cell(&value)
    }
}

impl From<StringCell> for String {
    fn from(cell: StringCell) -> Self {
        cell.to_string()
    }
}

impl Display for StringCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Dead => write!(f, "x"),
            Self::Tie(tie) => write!(f, "{}", tie.symbol()),
            Self::Fret(note) => {
                if let Some(direction) = note.slide_in {
                    write!(f, "{}", direction.symbol())?;
                }
                write!(f, "{}", note.fret)?;
                if let Some(bend) = note.bend {
                    write!(f, "b")?;
                    if let Some(target) = bend.target_fret {
                        write!(f, "{target}")?;
                    }
                }
                if note.vibrato {
                    write!(f, "~")?;
                }
                if note.accent {
                    write!(f, ">")?;
                }
                if note.staccato {
                    write!(f, ".")?;
                }
                if let Some(tie) = note.tie {
                    write!(f, "{}", tie.symbol())?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StrokeKind {
    Down,
    Up,
    /// Muted percussive strum
    Rest,
}

/// Direction and accent symbol of a strum or tab articulation slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stroke {
    pub kind: Option<StrokeKind>,
    pub accent: bool,
    pub staccato: bool,
}

impl Stroke {
    pub const fn down() -> Self {
        Self {
            kind: Some(StrokeKind::Down),
            accent: false,
            staccato: false,
        }
    }

    pub const fn up() -> Self {
        Self {
            kind: Some(StrokeKind::Up),
            accent: false,
            staccato: false,
        }
    }

    pub const fn rest() -> Self {
        Self {
            kind: Some(StrokeKind::Rest),
            accent: false,
            staccato: false,
        }
    }

    pub const fn accented(mut self) -> Self {
        self.accent = true;
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.kind.is_none() && !self.accent && !self.staccato
    }

    pub const fn is_rest(&self) -> bool {
        matches!(self.kind, Some(StrokeKind::Rest))
    }

    pub const fn is_up(&self) -> bool {
        matches!(self.kind, Some(StrokeKind::Up))
    }
}

impl TryFrom<String> for Stroke {
    type Error = TabError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_stroke(&value)
    }
}

impl From<Stroke> for String {
    fn from(stroke: Stroke) -> Self {
        stroke.to_string()
    }
}

impl Display for Stroke {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Some(StrokeKind::Down) => write!(f, "v")?,
            Some(StrokeKind::Up) => write!(f, "^")?,
            Some(StrokeKind::Rest) => write!(f, "s")?,
            None => {}
        }
        if self.accent {
            write!(f, ">")?;
        } else if self.staccato {
            write!(f, ".")?;
        }
        Ok(())
    }
}
