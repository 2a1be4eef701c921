//! Channel-voice MIDI messages.

/// A decoded channel message.
///
/// Data bytes are masked to seven bits on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEvent {
    /// `0x8n`.
    NoteOff {
        /// Channel 0-15.
        channel: u8,
        /// Note number.
        note: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// `0x9n`. Velocity 0 is delivered as-is; the renderer treats it as note-off.
    NoteOn {
        /// Channel 0-15.
        channel: u8,
        /// Note number.
        note: u8,
        /// Strike velocity.
        velocity: u8,
    },
    /// `0xAn`.
    KeyPressure {
        /// Channel 0-15.
        channel: u8,
        /// Note number.
        note: u8,
        /// Pressure amount.
        pressure: u8,
    },
    /// `0xBn`.
    ControlChange {
        /// Channel 0-15.
        channel: u8,
        /// Controller number.
        controller: u8,
        /// Controller value.
        value: u8,
    },
    /// `0xCn`.
    ProgramChange {
        /// Channel 0-15.
        channel: u8,
        /// Program number.
        program: u8,
    },
    /// `0xDn`.
    ChannelPressure {
        /// Channel 0-15.
        channel: u8,
        /// Pressure amount.
        pressure: u8,
    },
    /// `0xEn`.
    PitchBend {
        /// Channel 0-15.
        channel: u8,
        /// Low seven bits.
        lsb: u8,
        /// High seven bits.
        msb: u8,
    },
}

impl MidiEvent {
    /// Decode a status byte and its data bytes.
    ///
    /// Returns `None` for system messages and running-status data bytes.
    ///
    /// ```rust
    /// use tonebank_synth::MidiEvent;
    ///
    /// let ev = MidiEvent::parse(0x93, 60, 100);
    /// assert_eq!(ev, Some(MidiEvent::NoteOn { channel: 3, note: 60, velocity: 100 }));
    /// assert_eq!(MidiEvent::parse(0xF0, 0, 0), None);
    /// ```
    pub fn parse(status: u8, data1: u8, data2: u8) -> Option<Self> {
        let channel = status & 0x0F;
        let (d1, d2) = (data1 & 0x7F, data2 & 0x7F);
        let event = match status & 0xF0 {
            0x80 => Self::NoteOff {
                channel,
                note: d1,
                velocity: d2,
            },
            0x90 => Self::NoteOn {
                channel,
                note: d1,
                velocity: d2,
            },
            0xA0 => Self::KeyPressure {
                channel,
                note: d1,
                pressure: d2,
            },
            0xB0 => Self::ControlChange {
                channel,
                controller: d1,
                value: d2,
            },
            0xC0 => Self::ProgramChange {
                channel,
                program: d1,
            },
            0xD0 => Self::ChannelPressure {
                channel,
                pressure: d1,
            },
            0xE0 => Self::PitchBend {
                channel,
                lsb: d1,
                msb: d2,
            },
            _ => return None,
        };
        Some(event)
    }

    /// Channel the message addresses.
    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOff { channel, .. }
            | Self::NoteOn { channel, .. }
            | Self::KeyPressure { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PitchBend { channel, .. } => channel,
        }
    }
}
