use crate::compiler::loop_window::LoopWindow;
use crate::compiler::tab_compiler::SubtreeSelector;

/// Hold values changed during playback, shared with the playback task.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    cursor: usize,                       // index of the next compact event
    playing: bool,                       // a playback task is driving the backend
    looping: bool,                       // restart at the terminal event
    loop_window: LoopWindow,             // range eligible for playback
    editing_loop_range: bool,            // ignore the loop window
    selection: Option<SubtreeSelector>,  // compile scope, whole song if none
    speed: f64,                          // playback speed multiplier
    cancel_requested: bool,              // stop at the next wait boundary
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            cursor: 0,
            playing: false,
            looping: false,
            loop_window: LoopWindow::FULL,
            editing_loop_range: false,
            selection: None,
            speed: 1.0,
            cancel_requested: false,
        }
    }
}

impl PlaybackState {
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub const fn loop_window(&self) -> LoopWindow {
        self.loop_window
    }

    pub fn set_loop_window(&mut self, loop_window: LoopWindow) {
        self.loop_window = loop_window;
    }

    pub const fn is_editing_loop_range(&self) -> bool {
        self.editing_loop_range
    }

    pub fn set_editing_loop_range(&mut self, editing: bool) {
        self.editing_loop_range = editing;
    }

    pub const fn selection(&self) -> Option<SubtreeSelector> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<SubtreeSelector>) {
        self.selection = selection;
    }

    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Non-positive or non-finite speeds are ignored.
    pub fn set_speed(&mut self, speed: f64) -> bool {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
            true
        } else {
            false
        }
    }

    pub const fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub fn clear_cancel(&mut self) {
        self.cancel_requested = false;
    }

    /// Move to the next event unless a cancellation arrived meanwhile.
    pub fn advance(&mut self) -> bool {
        if self.cancel_requested {
            false
        } else {
            self.cursor += 1;
            true
        }
    }

    pub const fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            playing: self.playing,
            cursor: self.cursor,
        }
    }
}

/// What observers such as a play button or a scrub bar need.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub cursor: usize,
}
