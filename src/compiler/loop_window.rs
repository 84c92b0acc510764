use crate::compiler::event::{Compilation, Metadata, PlaybackEvent};
use std::ops::Range;

/// `[start, end)` range of the compact sequence eligible for looped playback.
/// An `end` of `None` runs to the end of the track.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct LoopWindow {
    pub start: usize,
    pub end: Option<usize>,
}

impl LoopWindow {
    pub const FULL: Self = Self::new(0, None);

    pub const fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Clamp the window to `playable_len` entries.
    ///
    /// A window that clamps to nothing falls back to the single entry
    /// right before it, so a non-empty track always yields a non-empty slice.
    pub fn bounds(&self, playable_len: usize) -> Option<Range<usize>> {
        if playable_len == 0 {
            return None;
        }
        let end = self.end.map_or(playable_len, |end| end.min(playable_len));
        let start = self.start.min(playable_len);
        if start < end {
            Some(start..end)
        } else {
            let seed = start.saturating_sub(1).min(playable_len - 1);
            log::debug!(
                "empty loop window [{}, {:?}) seeded from entry {seed}",
                self.start,
                self.end
            );
            Some(seed..seed + 1)
        }
    }

    /// Slice the compilation to this window and rebase elapsed time to zero.
    pub fn apply(&self, compilation: &Compilation) -> Compilation {
        let Some(range) = self.bounds(compilation.playable_len()) else {
            return compilation.clone();
        };
        let base_seconds = compilation.metadata[range.start].elapsed_seconds;
        // entry right after the window, the terminal one at worst
        let end_seconds = compilation.metadata[range.end].elapsed_seconds - base_seconds;
        let mut events = compilation.events[range.clone()].to_vec();
        let mut metadata: Vec<Metadata> = compilation.metadata[range]
            .iter()
            .map(|m| m.rebased(base_seconds))
            .collect();
        if let Some(last) = metadata.last() {
            let terminal = last.terminal(end_seconds);
            metadata.push(terminal);
            events.push(PlaybackEvent::Terminal);
        }
        Compilation {
            events,
            metadata,
            speed: compilation.speed,
        }
    }
}
