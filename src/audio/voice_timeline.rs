/// Raw MIDI message understood by the synthesizer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MidiMessage {
    NoteOn { channel: i32, key: i32, velocity: i32 },
    NoteOff { channel: i32, key: i32 },
    /// channel, command, data1, data2
    Raw(i32, i32, i32, i32),
}

impl MidiMessage {
    pub const fn channel(&self) -> i32 {
        match self {
            Self::NoteOn { channel, .. } | Self::NoteOff { channel, .. } => *channel,
            Self::Raw(channel, _, _, _) => *channel,
        }
    }

    pub const fn control_change(channel: i32, controller: i32, value: i32) -> Self {
        Self::Raw(channel, 0xB0, controller, value)
    }

    pub const fn program_change(channel: i32, program: i32) -> Self {
        Self::Raw(channel, 0xC0, program, 0)
    }

    /// 14 bits pitch bend, 8192 is the center.
    pub const fn pitch_bend(channel: i32, value: i32) -> Self {
        // the bend value must be split into two bytes
        let data1 = value & 0x7F;
        let data2 = value >> 7;
        Self::Raw(channel, 0xE0, data1, data2)
    }

    /// Release every note on the channel.
    pub const fn all_notes_off(channel: i32) -> Self {
        Self::control_change(channel, 0x7B, 0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ScheduledMessage {
    /// Output frame at which the message is due
    pub frame: u64,
    pub message: MidiMessage,
}

/// Frame ordered queue of pending MIDI messages.
///
/// Messages scheduled for the same frame keep their insertion order.
#[derive(Debug, Default)]
pub struct VoiceTimeline {
    current_frame: u64,                     // frames rendered so far
    sorted_messages: Vec<ScheduledMessage>, // sorted by frame
}

impl VoiceTimeline {
    pub const fn new() -> Self {
        Self {
            current_frame: 0,
            sorted_messages: Vec::new(),
        }
    }

    pub const fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn len(&self) -> usize {
        self.sorted_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_messages.is_empty()
    }

    /// Schedule `message` `offset_frames` after the current frame.
    pub fn push(&mut self, offset_frames: u64, message: MidiMessage) {
        let frame = self.current_frame + offset_frames;
        let position = self.sorted_messages.partition_point(|m| m.frame <= frame);
        self.sorted_messages
            .insert(position, ScheduledMessage { frame, message });
    }

    /// Drain messages due before `current_frame + frames`, in order.
    pub fn for_each_due(&mut self, frames: u64, mut apply: impl FnMut(MidiMessage)) {
        let end_frame = self.current_frame + frames;
        let due = self.sorted_messages.partition_point(|m| m.frame < end_frame);
        for scheduled in self.sorted_messages.drain(..due) {
            apply(scheduled.message);
        }
    }

    pub fn advance(&mut self, frames: u64) {
        self.current_frame += frames;
    }

    /// Drop pending messages for `channel` scheduled at or after `offset_frames` from now.
    pub fn cancel_channel_from(&mut self, channel: i32, offset_frames: u64) {
        let from_frame = self.current_frame + offset_frames;
        self.sorted_messages
            .retain(|m| m.frame < from_frame || m.message.channel() != channel);
    }

    pub fn clear(&mut self) {
        self.sorted_messages.clear();
    }
}
