//! Voices handed to an audio backend by the effects engine.

use crate::score::song::Tie;

/// Slap voices are stopped after this many seconds.
pub const SLAP_SECONDS: f64 = 0.25;

/// Pitch automation relative to the voice's own key, in cents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PitchRamp {
    pub from_cents: f64,
    pub to_cents: f64,
    /// Delay after the voice start before the ramp begins
    pub delay_seconds: f64,
    /// Zero means an instant jump
    pub ramp_seconds: f64,
}

impl PitchRamp {
    /// Pitch at `seconds` after the voice start.
    pub fn cents_at(&self, seconds: f64) -> f64 {
        if seconds <= self.delay_seconds {
            return if self.ramp_seconds > 0.0 || seconds < self.delay_seconds {
                self.from_cents
            } else {
                self.to_cents
            };
        }
        let progress = if self.ramp_seconds > 0.0 {
            ((seconds - self.delay_seconds) / self.ramp_seconds).min(1.0)
        } else {
            1.0
        };
        self.from_cents + (self.to_cents - self.from_cents) * progress
    }

    pub fn end_seconds(&self) -> f64 {
        self.delay_seconds + self.ramp_seconds
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vibrato {
    pub rate_hz: f64,
    pub depth_cents: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Filter {
    LowPass { frequency: f64, q: f64 },
    BassBoost { frequency: f64, gain_db: f64 },
}

/// One sounding string.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub string_index: usize,
    /// Capo already applied
    pub fret: u8,
    /// MIDI key of the sounding pitch
    pub key: u8,
    /// Seconds after dispatch
    pub start_offset: f64,
    /// Ring until the string is stopped when `None`
    pub duration: Option<f64>,
    pub gain: f64,
    /// Fraction of the sample skipped at start, non-zero for tethered voices
    pub sample_start: f64,
    pub tether: Option<Tie>,
    pub pitch_ramps: Vec<PitchRamp>,
    pub vibrato: Option<Vibrato>,
    pub filters: Vec<Filter>,
}

impl Voice {
    pub const fn new(string_index: usize, fret: u8, key: u8) -> Self {
        Self {
            string_index,
            fret,
            key,
            start_offset: 0.0,
            duration: None,
            gain: 1.0,
            sample_start: 0.0,
            tether: None,
            pitch_ramps: Vec::new(),
            vibrato: None,
            filters: Vec::new(),
        }
    }

    /// Sum of every ramp at `seconds` after the voice start.
    pub fn cents_at(&self, seconds: f64) -> f64 {
        self.pitch_ramps.iter().map(|r| r.cents_at(seconds)).sum()
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }
}

/// Percussive voice played by a rest strum.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Slap {
    pub start_offset: f64,
    pub gain: f64,
    pub duration: f64,
}

impl Slap {
    pub const fn new(gain: f64) -> Self {
        Self {
            start_offset: 0.0,
            gain,
            duration: SLAP_SECONDS,
        }
    }
}

/// Sound output driven by the scheduler.
///
/// Every call is fire-and-forget: timing inside a voice is relative to the
/// moment the call is made.
pub trait AudioBackend: Send + Sync {
    /// Playback operations are no-ops until this returns true.
    fn is_ready(&self) -> bool;

    fn resume(&self);

    fn suspend(&self);

    fn start_voice(&self, voice: &Voice);

    fn start_slap(&self, slap: &Slap);

    /// Release the voice ringing on a string after `delay_seconds`.
    fn stop_string(&self, string_index: usize, delay_seconds: f64);

    /// Release every voice, letting them decay.
    fn stop_all(&self);
}

#[cfg(test)]
pub mod recording {
    use super::{AudioBackend, Slap, Voice};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum BackendCall {
        Resume,
        Suspend,
        Voice(Voice),
        Slap(Slap),
        StopString(usize),
        StopAll,
    }

    /// Test double keeping every call in order.
    pub struct RecordingBackend {
        ready: AtomicBool,
        calls: Mutex<Vec<BackendCall>>,
    }

    impl RecordingBackend {
        pub fn new(ready: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<BackendCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn voices(&self) -> Vec<Voice> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    BackendCall::Voice(voice) => Some(voice),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: BackendCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AudioBackend for RecordingBackend {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn resume(&self) {
            self.record(BackendCall::Resume);
        }

        fn suspend(&self) {
            self.record(BackendCall::Suspend);
        }

        fn start_voice(&self, voice: &Voice) {
            self.record(BackendCall::Voice(voice.clone()));
        }

        fn start_slap(&self, slap: &Slap) {
            self.record(BackendCall::Slap(*slap));
        }

        fn stop_string(&self, string_index: usize, _delay_seconds: f64) {
            self.record(BackendCall::StopString(string_index));
        }

        fn stop_all(&self) {
            self.record(BackendCall::StopAll);
        }
    }
}
