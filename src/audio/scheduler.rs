//! Play/pause/seek/loop state machine driving an [`AudioBackend`].
//!
//! A single tokio task walks the compact sequence. It re-reads the shared
//! [`PlaybackState`] before every event and after every wait, so setters
//! issued while playing take effect on the next event. Cancellation wakes
//! the in-flight wait: at most one event duration elapses before playback
//! actually stops, and the cursor never advances past a cancelled event.

use crate::audio::backend::AudioBackend;
use crate::audio::effects::{EffectsEngine, NoteContext};
use crate::audio::playback_state::{PlaybackState, PlaybackStatus};
use crate::compiler::event::{Compilation, PlaybackEvent};
use crate::compiler::loop_window::LoopWindow;
use crate::compiler::tab_compiler::{CompileSettings, SubtreeSelector, TabCompiler};
use crate::compiler::tempo::event_seconds;
use crate::score::song::Song;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Let the last voice ring before stopping at the end of the track.
const END_GRACE_SECONDS: f64 = 1.0;

/// What to play.
#[derive(Debug, Clone, Copy)]
pub struct PlayRequest<'a> {
    pub song: &'a Song,
    /// Overrides the selection held by the scheduler
    pub location: Option<SubtreeSelector>,
}

impl<'a> PlayRequest<'a> {
    pub const fn for_song(song: &'a Song) -> Self {
        Self {
            song,
            location: None,
        }
    }

    pub const fn with_location(mut self, location: SubtreeSelector) -> Self {
        self.location = Some(location);
        self
    }
}

struct SharedPlayback {
    state: Mutex<PlaybackState>,
    cancel: Notify,
    status: watch::Sender<PlaybackStatus>,
}

impl SharedPlayback {
    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, f: impl FnOnce(&mut PlaybackState) -> T) -> T {
        let mut state = self.lock();
        let result = f(&mut state);
        let status = state.status();
        drop(state);
        self.status.send_if_modified(|current| {
            let modified = *current != status;
            *current = status;
            modified
        });
        result
    }

    fn cancel_requested(&self) -> bool {
        self.lock().is_cancel_requested()
    }

    /// Sleep for `seconds`, returns false if cancelled first.
    async fn wait(&self, seconds: f64) -> bool {
        let notified = self.cancel.notified();
        tokio::pin!(notified);
        // register before checking the flag so no wake-up is lost
        notified.as_mut().enable();
        if self.cancel_requested() {
            return false;
        }
        let duration = Duration::try_from_secs_f64(seconds).unwrap_or_else(|_| {
            log::warn!("invalid wait of {seconds}s, not waiting");
            Duration::ZERO
        });
        tokio::select! {
            () = tokio::time::sleep(duration) => !self.cancel_requested(),
            () = &mut notified => false,
        }
    }
}

pub struct Scheduler<B: AudioBackend + 'static> {
    backend: Arc<B>,
    shared: Arc<SharedPlayback>,
    task: Option<JoinHandle<()>>, // at most one playback task
}

impl<B: AudioBackend + 'static> Scheduler<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let state = PlaybackState::default();
        let (status, _) = watch::channel(state.status());
        Self {
            backend,
            shared: Arc::new(SharedPlayback {
                state: Mutex::new(state),
                cancel: Notify::new(),
                status,
            }),
            task: None,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.lock().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.shared.status.subscribe()
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.update(|state| state.set_looping(looping));
    }

    pub fn set_loop_window(&self, loop_window: LoopWindow) {
        self.shared.update(|state| state.set_loop_window(loop_window));
    }

    pub fn set_editing_loop_range(&self, editing: bool) {
        self.shared
            .update(|state| state.set_editing_loop_range(editing));
    }

    pub fn set_selection(&self, selection: Option<SubtreeSelector>) {
        self.shared.update(|state| state.set_selection(selection));
    }

    pub fn set_speed(&self, speed: f64) {
        if !self.shared.update(|state| state.set_speed(speed)) {
            log::warn!("ignoring invalid playback speed {speed}");
        }
    }

    /// Compile the requested scope at the current speed, loop window not applied.
    pub fn compile(&self, request: &PlayRequest<'_>) -> Compilation {
        let (speed, selection) = {
            let state = self.shared.lock();
            (state.speed(), request.location.or(state.selection()))
        };
        let song = request.song;
        let settings = CompileSettings::new(song.baseline_bpm(), speed);
        let compiler = TabCompiler::new(settings, &song.chords);
        match selection {
            Some(selector) => compiler.compile_subtree(&song.sections, selector),
            None => compiler.compile_full(&song.sections, &song.section_progression),
        }
    }

    /// Start playing from the cursor, replacing any playback in flight.
    ///
    /// The cursor indexes the full compilation of the requested scope. A
    /// cursor outside the active loop window starts from the window start.
    pub async fn play(&mut self, request: PlayRequest<'_>) {
        if !self.backend.is_ready() {
            log::info!("audio backend not ready, ignoring play");
            return;
        }
        self.stop_task().await;

        let compilation = self.compile(&request);
        let range = {
            let state = self.shared.lock();
            active_range(&compilation, &state)
        };
        let Some(range) = range.filter(|range| has_notes(&compilation, range)) else {
            log::info!("nothing to play");
            self.shared.update(|state| state.set_playing(false));
            return;
        };
        self.backend.resume();

        let cursor = self.shared.update(|state| {
            if !range.contains(&state.cursor()) {
                state.set_cursor(range.start);
            }
            state.clear_cancel();
            state.set_playing(true);
            state.cursor()
        });
        log::info!("playing events {range:?} from {cursor}");

        let engine = EffectsEngine::new(request.song.tuning, request.song.capo);
        let task = tokio::spawn(run_playback(
            self.shared.clone(),
            self.backend.clone(),
            compilation,
            engine,
        ));
        self.task = Some(task);
    }

    /// Stop voices and suspend the backend, optionally rewinding to the start.
    pub fn pause(&self, reset_to_start: bool) {
        if !self.backend.is_ready() {
            log::info!("audio backend not ready, ignoring pause");
            return;
        }
        let running = self.task.as_ref().is_some_and(|task| !task.is_finished());
        self.shared.update(|state| {
            if running {
                state.request_cancel();
            }
            state.set_playing(false);
            if reset_to_start {
                state.set_cursor(0);
            }
        });
        self.shared.cancel.notify_waiters();
        self.backend.stop_all();
        self.backend.suspend();
        log::info!("paused (reset to start: {reset_to_start})");
    }

    /// Move the cursor, only while not playing.
    pub fn seek(&self, index: usize) -> bool {
        if !self.backend.is_ready() {
            log::info!("audio backend not ready, ignoring seek");
            return false;
        }
        self.shared.update(|state| {
            if state.is_playing() {
                log::warn!("cannot seek to {index} while playing");
                false
            } else {
                state.set_cursor(index);
                true
            }
        })
    }

    /// Resolve once the playback task, if any, has returned.
    pub async fn wait_until_stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::error!("playback task failed: {err}");
            }
        }
    }

    async fn stop_task(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if !task.is_finished() {
            log::debug!("cancelling playback in flight");
            self.shared.update(PlaybackState::request_cancel);
            self.shared.cancel.notify_waiters();
        }
        if let Err(err) = task.await {
            log::error!("playback task failed: {err}");
        }
        self.shared.update(PlaybackState::clear_cancel);
    }
}

/// Entries eligible for playback under the current loop settings.
fn active_range(compilation: &Compilation, state: &PlaybackState) -> Option<Range<usize>> {
    let playable_len = compilation.playable_len();
    if state.is_editing_loop_range() {
        Some(0..playable_len).filter(|range| !range.is_empty())
    } else {
        state.loop_window().bounds(playable_len)
    }
}

fn has_notes(compilation: &Compilation, range: &Range<usize>) -> bool {
    compilation.events[range.clone()]
        .iter()
        .any(PlaybackEvent::is_note)
}

async fn run_playback<B: AudioBackend>(
    shared: Arc<SharedPlayback>,
    backend: Arc<B>,
    compilation: Compilation,
    engine: EffectsEngine,
) {
    loop {
        let (cursor, looping, speed, cancelled, range) = {
            let state = shared.lock();
            (
                state.cursor(),
                state.is_looping(),
                state.speed(),
                state.is_cancel_requested(),
                active_range(&compilation, &state).unwrap_or(0..0),
            )
        };
        if cancelled {
            stop_cancelled(&shared, backend.as_ref());
            return;
        }
        if cursor < range.start {
            log::debug!("cursor {cursor} before loop window, jumping to {}", range.start);
            shared.update(|state| state.set_cursor(range.start));
            continue;
        }
        if cursor >= range.end {
            // a window without notes would spin without ever waiting
            if looping && has_notes(&compilation, &range) {
                log::debug!("looping back to {}", range.start);
                shared.update(|state| state.set_cursor(range.start));
                continue;
            }
            if !shared.wait(END_GRACE_SECONDS).await {
                stop_cancelled(&shared, backend.as_ref());
                return;
            }
            shared.update(|state| {
                state.set_playing(false);
                state.set_cursor(0);
            });
            backend.stop_all();
            log::info!("end of track");
            return;
        }
        match &compilation.events[cursor] {
            PlaybackEvent::MeasureLine { .. } | PlaybackEvent::Terminal => {
                shared.update(PlaybackState::advance);
            }
            PlaybackEvent::Note(note) => {
                let seconds = event_seconds(note.bpm, note.beats(), speed);
                if let Some(context) = NoteContext::within(&compilation, cursor, range) {
                    log::debug!("event {cursor} for {seconds:.3}s");
                    engine.perform(backend.as_ref(), &NoteContext { speed, ..context });
                }
                if !shared.wait(seconds).await {
                    stop_cancelled(&shared, backend.as_ref());
                    return;
                }
                shared.update(PlaybackState::advance);
            }
        }
    }
}

fn stop_cancelled<B: AudioBackend + ?Sized>(shared: &SharedPlayback, backend: &B) {
    backend.stop_all();
    let cursor = shared.update(|state| {
        state.set_playing(false);
        state.clear_cancel();
        state.cursor()
    });
    log::info!("playback cancelled at {cursor}");
}
