//! Tabplay - guitar tab and strummed chord playback engine
//!
//! This library provides:
//! - Loading of songs made of tab and chord sub-sections from JSON
//! - Compilation of a song into a time-stamped event sequence
//! - A visualization pass adding spacers, loop delays and display hints
//! - A scheduler driving guitar articulations on an audio backend
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tabplay::{AudioOutput, PlayRequest, Scheduler, Song, SynthBackend};
//!
//! # async fn run() -> Result<(), tabplay::TabError> {
//! let song = Song::from_file(Path::new("song.json"))?;
//! let backend = Arc::new(SynthBackend::new(Path::new("guitar.sf2"))?);
//! let _output = AudioOutput::start(backend.clone())?;
//! let mut scheduler = Scheduler::new(backend);
//! scheduler.play(PlayRequest::for_song(&song)).await;
//! scheduler.wait_until_stopped().await;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod compiler;
pub mod error;
pub mod score;

// Re-export main types for convenience
pub use audio::{
    backend::{AudioBackend, Filter, PitchRamp, Slap, Vibrato, Voice},
    effects::{EffectsEngine, NoteContext, VoiceCommand},
    playback_state::PlaybackStatus,
    scheduler::{PlayRequest, Scheduler},
    synth_backend::{AudioOutput, SynthBackend},
};
pub use compiler::{
    event::{Compilation, Location, Metadata, Notation, PlaybackEvent, PlaybackNote},
    expander::{
        DisplayHints, ExpandedEvent, ExpanderSettings, Expansion, PlaybackExpander,
        PlaybackMetadata,
    },
    loop_window::LoopWindow,
    tab_compiler::{CompileSettings, SubtreeSelector, TabCompiler},
    tempo::{resolve_bpm, resolve_repetitions},
};
pub use error::TabError;
pub use score::notation_parser::{parse_cell, parse_stroke};
pub use score::song::{
    Chord, ChordSequence, ChordSubSection, Column, NoteColumn, NoteLength, PalmMute, Section,
    SectionProgression, Song, StringCell, Stroke, Strum, StrummingPattern, SubSection,
    TabSubSection, Tuning, DEFAULT_BPM, STRING_COUNT,
};
