//! Per-channel MIDI controller state.

/// Number of MIDI channels.
pub const MAX_CHANNELS: usize = 16;

/// Null RPN/NRPN selection.
pub const RPN_RESET: u16 = 0x3FFF;

/// Pitch-bend sensitivity parameter number.
pub const RPN_PITCH_SENS: u16 = 0;

/// Centered pitch wheel.
pub const PITCH_CENTER: u16 = 0x2000;

/// Controller numbers the renderer acts on.
pub mod controller {
    /// Bank select, coarse.
    pub const BANK_SELECT: u8 = 0;
    /// Data entry, coarse.
    pub const DATA_ENTRY: u8 = 6;
    /// Channel volume.
    pub const VOLUME: u8 = 7;
    /// Pan.
    pub const PAN: u8 = 10;
    /// Expression.
    pub const EXPRESSION: u8 = 11;
    /// Bank select, fine.
    pub const BANK_SELECT_FINE: u8 = 32;
    /// Data entry, fine.
    pub const DATA_ENTRY_FINE: u8 = 38;
    /// Sustain pedal.
    pub const SUSTAIN: u8 = 64;
    /// NRPN select, fine.
    pub const NRPN_LSB: u8 = 98;
    /// NRPN select, coarse.
    pub const NRPN_MSB: u8 = 99;
    /// RPN select, fine.
    pub const RPN_LSB: u8 = 100;
    /// RPN select, coarse.
    pub const RPN_MSB: u8 = 101;
    /// All sounds off.
    pub const ALL_SOUNDS_OFF: u8 = 120;
    /// Reset all controllers.
    pub const RESET_CONTROLLERS: u8 = 121;
    /// All notes off.
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Controller state of one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Channel {
    /// Tone bank, or drum set on drum channels.
    pub bank: u8,
    /// Program; `None` plays the default instrument.
    pub program: Option<u8>,
    /// Controller 7.
    pub volume: u8,
    /// Controller 11.
    pub expression: u8,
    /// Sustain pedal down.
    pub sustain: bool,
    /// 14-bit pitch wheel.
    pub pitchbend: u16,
    /// Cached bend ratio; `None` until the next bend needs it.
    pub pitchfactor: Option<f64>,
    /// Bend range in cents.
    pub pitchsens: u16,
    /// Channel pan; `None` uses each sample's own pan.
    pub panning: Option<u8>,
    /// Mono mode: a new note kills every voice on the channel.
    pub mono: bool,
    /// Selected RPN.
    pub rpn: u16,
    /// Selected NRPN.
    pub nrpn: u16,
    /// Data entry targets the NRPN.
    pub nrpn_mode: bool,
}

impl Default for Channel {
    fn default() -> Self {
        let mut ch = Self {
            bank: 0,
            program: Some(0),
            volume: 0,
            expression: 0,
            sustain: false,
            pitchbend: PITCH_CENTER,
            pitchfactor: None,
            pitchsens: 200,
            panning: None,
            mono: false,
            rpn: RPN_RESET,
            nrpn: RPN_RESET,
            nrpn_mode: false,
        };
        ch.reset_controllers();
        ch
    }
}

impl Channel {
    /// Reset-all-controllers: program, bank, pan and bend range survive.
    pub fn reset_controllers(&mut self) {
        self.volume = 100;
        self.expression = 127;
        self.sustain = false;
        self.pitchbend = PITCH_CENTER;
        self.pitchfactor = None;
        self.mono = false;
        self.rpn = RPN_RESET;
        self.nrpn = RPN_RESET;
    }

    /// Full reset.
    pub fn reset(&mut self, default_program: Option<u8>) {
        self.reset_controllers();
        self.program = default_program;
        self.panning = None;
        self.pitchsens = 200;
        self.bank = 0;
    }

    /// Set the 14-bit pitch wheel from its two data bytes.
    pub fn set_pitchbend(&mut self, lsb: u8, msb: u8) {
        self.pitchbend = u16::from(lsb & 0x7f) | (u16::from(msb & 0x7f) << 7);
        self.pitchfactor = None;
    }

    /// Select an RPN byte; `coarse` picks the MSB.
    pub fn select_rpn(&mut self, value: u8, coarse: bool) {
        self.rpn = merge_param(self.rpn, value, coarse);
        self.nrpn_mode = false;
    }

    /// Select an NRPN byte; `coarse` picks the MSB.
    pub fn select_nrpn(&mut self, value: u8, coarse: bool) {
        self.nrpn = merge_param(self.nrpn, value, coarse);
        self.nrpn_mode = true;
    }

    /// Data entry. Returns true if the pitch-bend range changed.
    ///
    /// NRPN data entry is accepted and ignored.
    pub fn data_entry(&mut self, value: u8, coarse: bool) -> bool {
        if self.nrpn_mode || self.rpn != RPN_PITCH_SENS {
            return false;
        }
        let value = u16::from(value & 0x7f);
        self.pitchsens = if coarse {
            self.pitchsens % 100 + value * 100
        } else {
            self.pitchsens / 100 * 100 + value
        };
        self.pitchfactor = None;
        true
    }

    /// Frequency multiplier for the current pitch wheel, or `None` when centered.
    ///
    /// The ratio depends only on the wheel's distance from center; callers
    /// divide for downward bends.
    pub fn bend_ratio(&mut self) -> Option<(f64, bool)> {
        let pb = self.pitchbend;
        if pb == PITCH_CENTER || pb > 0x3FFF {
            return None;
        }
        let distance = (i32::from(pb) - i32::from(PITCH_CENTER)).unsigned_abs();
        let sens = self.pitchsens;
        let factor = *self.pitchfactor.get_or_insert_with(|| {
            libm::pow(
                2.0,
                (f64::from(distance) * f64::from(sens)) / (8191.0 * 1200.0),
            )
        });
        Some((factor, pb < PITCH_CENTER))
    }
}

fn merge_param(current: u16, value: u8, coarse: bool) -> u16 {
    let value = u16::from(value & 0x7f);
    if coarse {
        (current & 0x007F) | (value << 7)
    } else {
        (current & 0x3F80) | value
    }
}
