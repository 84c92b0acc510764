//! Visualization pass over a compilation.
//!
//! The expanded sequence is never played: it adds spacers where the
//! rendering changes notation or tempo, realizes the delay before a loop
//! restarts, and repeats the looped block until it covers twice the visible
//! width so a scrolling view never shows a seam.

use crate::compiler::event::{Compilation, Location, Metadata, Notation, PlaybackEvent, PlaybackNote};
use crate::compiler::loop_window::LoopWindow;
use crate::compiler::tempo::event_seconds;

const MEASURE_LINE_WIDTH: f64 = 2.0;
const TAB_NOTE_WIDTH: f64 = 35.0;
const STRUM_NOTE_WIDTH: f64 = 40.0;
const SPACER_WIDTH: f64 = 16.0;

/// Beat subdivisions tracked for labels, 12 covers sixteenths and triplets.
const LABEL_TICKS_PER_BEAT: f64 = 12.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ExpanderSettings {
    pub loop_window: LoopWindow,
    /// Ignore the loop window while its bounds are being dragged
    pub editing_loop_range: bool,
    pub loop_delay_seconds: f64,
    pub visible_width: f64,
}

impl Default for ExpanderSettings {
    fn default() -> Self {
        Self {
            loop_window: LoopWindow::FULL,
            editing_loop_range: false,
            loop_delay_seconds: 0.0,
            visible_width: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedEvent {
    Note(PlaybackNote),
    MeasureLine { palm_mute_active: bool },
    /// Separates notation or tempo changes
    Spacer,
    /// One beat of silence before the loop restarts
    DelaySpacer,
    Terminal,
}

impl ExpandedEvent {
    /// Estimated rendering width.
    pub const fn width(&self) -> f64 {
        match self {
            Self::Note(note) => match note.notation {
                Notation::Tab => TAB_NOTE_WIDTH,
                Notation::Strum => STRUM_NOTE_WIDTH,
            },
            Self::MeasureLine { .. } => MEASURE_LINE_WIDTH,
            Self::Spacer | Self::DelaySpacer => SPACER_WIDTH,
            Self::Terminal => 0.0,
        }
    }

    fn from_playback(event: &PlaybackEvent) -> Self {
        match event {
            PlaybackEvent::Note(note) => Self::Note(note.clone()),
            PlaybackEvent::MeasureLine { palm_mute_active } => Self::MeasureLine {
                palm_mute_active: *palm_mute_active,
            },
            PlaybackEvent::Terminal => Self::Terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayHints {
    /// Count within the measure: "1", "&", "e", "a"
    pub beat_label: Option<String>,
    pub show_bpm: bool,
    /// Lift the bpm label above a chord name
    pub raised: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackMetadata {
    pub metadata: Metadata,
    pub hints: DisplayHints,
}

impl PlaybackMetadata {
    fn plain(metadata: Metadata) -> Self {
        Self {
            metadata,
            hints: DisplayHints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expansion {
    pub events: Vec<ExpandedEvent>,
    pub metadata: Vec<PlaybackMetadata>,
    pub total_width: f64,
}

impl Expansion {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub struct PlaybackExpander {
    settings: ExpanderSettings,
}

impl PlaybackExpander {
    /// Non-finite delay or width settings are replaced by zero.
    pub fn new(settings: ExpanderSettings) -> Self {
        let settings = ExpanderSettings {
            loop_delay_seconds: finite_or_zero("loop delay", settings.loop_delay_seconds),
            visible_width: finite_or_zero("visible width", settings.visible_width),
            ..settings
        };
        Self { settings }
    }

    pub fn expand(&self, compilation: &Compilation) -> Expansion {
        if compilation.is_empty() {
            return Expansion::default();
        }
        let windowed = if self.settings.editing_loop_range {
            compilation.clone()
        } else {
            self.settings.loop_window.apply(compilation)
        };
        let playable_len = windowed.playable_len();

        let mut block_events = Vec::with_capacity(playable_len);
        let mut block_metadata = Vec::with_capacity(playable_len);
        let mut hints = HintTracker::default();
        for (index, (event, metadata)) in windowed
            .events
            .iter()
            .zip(&windowed.metadata)
            .take(playable_len)
            .enumerate()
        {
            if index > 0 && needs_spacer(&windowed.events[index - 1], event) {
                block_events.push(ExpandedEvent::Spacer);
                block_metadata.push(PlaybackMetadata::plain(*metadata));
            }
            block_events.push(ExpandedEvent::from_playback(event));
            block_metadata.push(PlaybackMetadata {
                metadata: *metadata,
                hints: hints.hints_for(event, &metadata.location),
            });
        }

        let mut block_seconds = windowed.total_seconds();
        if self.settings.loop_delay_seconds > 0.0 && playable_len > 0 {
            let last = windowed.metadata[playable_len - 1];
            let spacer_seconds = event_seconds(last.bpm, 1.0, windowed.speed);
            let count = (self.settings.loop_delay_seconds / spacer_seconds).ceil() as usize;
            log::debug!("adding {count} delay spacers of {spacer_seconds:.3}s");
            for i in 0..count {
                block_events.push(ExpandedEvent::DelaySpacer);
                block_metadata.push(PlaybackMetadata::plain(Metadata {
                    location: last.location,
                    bpm: last.bpm,
                    note_length_multiplier: 1.0,
                    elapsed_seconds: block_seconds + i as f64 * spacer_seconds,
                }));
            }
            block_seconds += count as f64 * spacer_seconds;
        }

        let block_width: f64 = block_events.iter().map(ExpandedEvent::width).sum();
        let target_width = 2.0 * self.settings.visible_width;
        let mut events = block_events.clone();
        let mut metadata = block_metadata.clone();
        let mut total_width = block_width;
        let mut copies = 1;
        while block_width > 0.0 && total_width < target_width {
            let offset = copies as f64 * block_seconds;
            events.extend(block_events.iter().cloned());
            metadata.extend(block_metadata.iter().map(|m| PlaybackMetadata {
                metadata: Metadata {
                    elapsed_seconds: m.metadata.elapsed_seconds + offset,
                    ..m.metadata
                },
                hints: m.hints.clone(),
            }));
            total_width += block_width;
            copies += 1;
        }

        if let Some(terminal) = windowed.metadata.last() {
            events.push(ExpandedEvent::Terminal);
            metadata.push(PlaybackMetadata::plain(Metadata {
                elapsed_seconds: copies as f64 * block_seconds,
                ..*terminal
            }));
        }
        log::debug!(
            "expanded {} events into {} ({copies} copies, width {total_width})",
            windowed.len(),
            events.len()
        );
        Expansion {
            events,
            metadata,
            total_width,
        }
    }
}

/// Adjacent notes switching notation, or changing tempo without a measure line.
fn needs_spacer(previous: &PlaybackEvent, current: &PlaybackEvent) -> bool {
    match (previous.as_note(), current.as_note()) {
        (Some(previous), Some(current)) => {
            previous.notation != current.notation || previous.bpm != current.bpm
        }
        _ => false,
    }
}

#[derive(Default)]
struct HintTracker {
    beat_ticks: u64,                // position within the measure
    block: Option<Location>,        // sub-section or chord sequence pass
    last_bpm: Option<u32>,
    last_chord: Option<String>,
}

impl HintTracker {
    fn hints_for(&mut self, event: &PlaybackEvent, location: &Location) -> DisplayHints {
        let note = match event {
            PlaybackEvent::Note(note) => note,
            PlaybackEvent::MeasureLine { .. } => {
                self.beat_ticks = 0;
                return DisplayHints::default();
            }
            PlaybackEvent::Terminal => return DisplayHints::default(),
        };
        if !self.block.is_some_and(|block| block.same_block(location)) {
            self.block = Some(*location);
            self.beat_ticks = 0;
            self.last_chord = None;
        }
        let beat_label = beat_label(self.beat_ticks);
        self.beat_ticks += (note.beats() * LABEL_TICKS_PER_BEAT).round() as u64;

        let show_bpm = self.last_bpm != Some(note.bpm);
        self.last_bpm = Some(note.bpm);

        let new_chord = note.chord_name.is_some() && note.chord_name != self.last_chord;
        if note.chord_name.is_some() {
            self.last_chord.clone_from(&note.chord_name);
        }
        DisplayHints {
            beat_label,
            show_bpm,
            raised: show_bpm && new_chord,
        }
    }
}

fn beat_label(ticks: u64) -> Option<String> {
    let ticks_per_beat = LABEL_TICKS_PER_BEAT as u64;
    let beat = ticks / ticks_per_beat;
    match ticks % ticks_per_beat {
        0 => Some((beat + 1).to_string()),
        3 => Some("e".to_string()),
        6 => Some("&".to_string()),
        9 => Some("a".to_string()),
        _ => None,
    }
}

fn finite_or_zero(name: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        log::warn!("invalid {name} {value}, using 0");
        0.0
    }
}
