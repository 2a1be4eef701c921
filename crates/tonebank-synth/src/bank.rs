//! Tone banks and drum sets.
//!
//! Each of the 128 tone banks maps a program to an instrument; each of the 128
//! drum sets maps a note to one. Bank 0 of each kind always exists and is the
//! fallback for every other bank.
//!
//! Slots move through [`SlotState`]: configuration defines names, a usage
//! scan marks slots `Pending`, and [`BankRegistry::load_missing`] resolves
//! every pending slot through an [`InstrumentSource`] before playback.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::instrument::Instrument;
use crate::output::OutputSpec;
use crate::records::PatchOverrides;
use crate::source::{InstrumentSource, LoadRequest};

/// Banks per kind, and slots per bank.
pub const MAX_BANKS: usize = 128;

/// Program or drum slots per bank.
pub const MAX_PROGRAMS: usize = 128;

/// Tone bank or drum set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BankKind {
    /// Melodic programs.
    Tone,
    /// Percussion, indexed by note.
    Drum,
}

impl BankKind {
    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tone => "tone bank",
            Self::Drum => "drum set",
        }
    }
}

/// Load state of one slot.
#[derive(Clone, Debug, Default)]
pub enum SlotState {
    /// Nothing requested.
    #[default]
    Empty,
    /// Needed; resolved by the next load pass.
    Pending,
    /// Ready to play.
    Loaded(Arc<Instrument>),
    /// A load was attempted and failed.
    Failed,
}

impl SlotState {
    /// The instrument, if loaded.
    pub fn instrument(&self) -> Option<&Arc<Instrument>> {
        match self {
            Self::Loaded(inst) => Some(inst),
            _ => None,
        }
    }
}

/// Configuration of one slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToneEntry {
    /// Instrument name a source resolves.
    pub name: Option<String>,
    /// Adjustments applied during conversion.
    pub overrides: PatchOverrides,
}

impl ToneEntry {
    /// Entry with a name and no overrides.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            overrides: PatchOverrides::default(),
        }
    }
}

/// One tone bank or drum set.
#[derive(Clone, Debug)]
pub struct ToneBank {
    entries: Vec<ToneEntry>,
    slots: Vec<SlotState>,
}

impl Default for ToneBank {
    fn default() -> Self {
        let mut entries = Vec::with_capacity(MAX_PROGRAMS);
        entries.resize_with(MAX_PROGRAMS, ToneEntry::default);
        let mut slots = Vec::with_capacity(MAX_PROGRAMS);
        slots.resize_with(MAX_PROGRAMS, SlotState::default);
        Self { entries, slots }
    }
}

impl ToneBank {
    /// Configuration of `program`.
    pub fn entry(&self, program: u8) -> &ToneEntry {
        &self.entries[usize::from(program & 0x7f)]
    }

    /// State of `program`.
    pub fn slot(&self, program: u8) -> &SlotState {
        &self.slots[usize::from(program & 0x7f)]
    }

    /// Programs with a configured name.
    pub fn named(&self) -> impl Iterator<Item = (u8, &ToneEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name.is_some())
            .map(|(i, e)| (i as u8, e))
    }
}

/// All tone banks and drum sets.
#[derive(Clone, Debug)]
pub struct BankRegistry {
    tone: Vec<Option<ToneBank>>,
    drum: Vec<Option<ToneBank>>,
}

impl Default for BankRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply drum defaults: fixed at the slot's note, no loop, flat envelope.
fn effective_overrides(kind: BankKind, program: u8, entry: &ToneEntry) -> PatchOverrides {
    let mut o = entry.overrides;
    if kind == BankKind::Drum {
        o.note.get_or_insert(program);
        o.strip_loop.get_or_insert(true);
        o.strip_envelope.get_or_insert(true);
    }
    o
}

impl BankRegistry {
    /// Registry with empty bank 0 of each kind.
    pub fn new() -> Self {
        let mut tone = Vec::with_capacity(MAX_BANKS);
        tone.resize_with(MAX_BANKS, || None);
        let mut drum = Vec::with_capacity(MAX_BANKS);
        drum.resize_with(MAX_BANKS, || None);
        tone[0] = Some(ToneBank::default());
        drum[0] = Some(ToneBank::default());
        Self { tone, drum }
    }

    fn banks(&self, kind: BankKind) -> &[Option<ToneBank>] {
        match kind {
            BankKind::Tone => &self.tone,
            BankKind::Drum => &self.drum,
        }
    }

    fn banks_mut(&mut self, kind: BankKind) -> &mut [Option<ToneBank>] {
        match kind {
            BankKind::Tone => &mut self.tone,
            BankKind::Drum => &mut self.drum,
        }
    }

    /// A bank, if defined.
    pub fn bank(&self, kind: BankKind, bank: u8) -> Option<&ToneBank> {
        self.banks(kind)[usize::from(bank & 0x7f)].as_ref()
    }

    /// Define a bank if needed.
    pub fn define_bank(&mut self, kind: BankKind, bank: u8) -> &mut ToneBank {
        self.banks_mut(kind)[usize::from(bank & 0x7f)].get_or_insert_with(ToneBank::default)
    }

    /// Numbers of every defined bank of `kind`, ascending.
    pub fn defined(&self, kind: BankKind) -> impl Iterator<Item = u8> + '_ {
        self.banks(kind)
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| i as u8)
    }

    /// Configure a slot, defining its bank.
    pub fn set_entry(&mut self, kind: BankKind, bank: u8, program: u8, entry: ToneEntry) {
        let b = self.define_bank(kind, bank);
        b.entries[usize::from(program & 0x7f)] = entry;
    }

    /// Install an already-built instrument.
    pub fn insert(&mut self, kind: BankKind, bank: u8, program: u8, instrument: Instrument) {
        let b = self.define_bank(kind, bank);
        b.slots[usize::from(program & 0x7f)] = SlotState::Loaded(Arc::new(instrument));
    }

    /// State of a slot, `None` if the bank is undefined.
    pub fn slot(&self, kind: BankKind, bank: u8, program: u8) -> Option<&SlotState> {
        self.bank(kind, bank).map(|b| b.slot(program))
    }

    /// Instrument for a slot, falling back to bank 0.
    ///
    /// Never loads anything.
    pub fn resolve(&self, kind: BankKind, bank: u8, program: u8) -> Option<Arc<Instrument>> {
        self.slot(kind, bank, program)
            .and_then(SlotState::instrument)
            .or_else(|| self.slot(kind, 0, program).and_then(SlotState::instrument))
            .cloned()
    }

    /// Mark a slot as needed.
    ///
    /// Empty slots become `Pending`. A non-zero bank also marks bank 0 so the
    /// fallback is available. Undefined banks are left alone.
    pub fn mark(&mut self, kind: BankKind, bank: u8, program: u8) {
        if bank != 0 {
            self.mark(kind, 0, program);
        }
        let Some(b) = self.banks_mut(kind)[usize::from(bank & 0x7f)].as_mut() else {
            return;
        };
        let slot = &mut b.slots[usize::from(program & 0x7f)];
        if matches!(slot, SlotState::Empty) {
            *slot = SlotState::Pending;
        }
    }

    /// Mark packed slot references: bits 0-6 program, 7-13 bank, bit 14 drum.
    pub fn precache(&mut self, packed: &[u16]) {
        for &p in packed {
            let program = (p & 0x7f) as u8;
            let bank = ((p >> 7) & 0x7f) as u8;
            let kind = if p & (1 << 14) != 0 {
                BankKind::Drum
            } else {
                BankKind::Tone
            };
            self.mark(kind, bank, program);
        }
    }

    /// Slots still waiting for a load.
    pub fn pending(&self) -> usize {
        [BankKind::Tone, BankKind::Drum]
            .iter()
            .flat_map(|&k| self.banks(k).iter().flatten())
            .flat_map(|b| b.slots.iter())
            .filter(|s| matches!(s, SlotState::Pending))
            .count()
    }

    /// Resolve every pending slot through `source`.
    ///
    /// Banks are visited from 127 down to 0 so bank-0 fallbacks marked by a
    /// failure load in the same pass. Returns the number of failures.
    pub fn load_missing(&mut self, source: &mut dyn InstrumentSource, output: &OutputSpec) -> usize {
        let mut errors = 0;
        for bank in (0..MAX_BANKS as u8).rev() {
            errors += self.fill_bank(source, BankKind::Tone, bank, output);
            errors += self.fill_bank(source, BankKind::Drum, bank, output);
        }
        errors
    }

    fn fill_bank(
        &mut self,
        source: &mut dyn InstrumentSource,
        kind: BankKind,
        bank: u8,
        output: &OutputSpec,
    ) -> usize {
        let mut errors = 0;
        for program in 0..MAX_PROGRAMS as u8 {
            let Some(b) = self.bank(kind, bank) else {
                return errors;
            };
            if !matches!(b.slot(program), SlotState::Pending) {
                continue;
            }
            let entry = b.entry(program);
            let request = LoadRequest {
                kind,
                bank,
                program,
                name: entry.name.as_deref(),
                overrides: effective_overrides(kind, program, entry),
                output: *output,
            };

            let result = source.load(&request);
            let state = match result {
                Ok(Some(inst)) if !inst.is_empty() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        kind = kind.label(),
                        bank,
                        program,
                        regions = inst.len(),
                        "loaded instrument"
                    );
                    SlotState::Loaded(Arc::new(inst))
                }
                Ok(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        kind = kind.label(),
                        bank,
                        program,
                        "no instrument mapped"
                    );
                    SlotState::Failed
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        kind = kind.label(),
                        bank,
                        program,
                        error = %_e,
                        "couldn't load instrument"
                    );
                    SlotState::Failed
                }
            };

            let failed = matches!(state, SlotState::Failed);
            self.define_bank(kind, bank).slots[usize::from(program)] = state;
            if failed {
                errors += 1;
                if bank != 0 {
                    self.mark(kind, 0, program);
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::sample::{Sample, SampleKind};
    use alloc::vec;
    use tonebank_core::note_to_freq;

    fn instrument() -> Instrument {
        Instrument::new(vec![Sample::new(
            &[0.0; 8],
            44100,
            note_to_freq(60.0),
            SampleKind::Sf2,
        )])
    }

    /// Loads programs below `limit`, records what it was asked for.
    struct Recorder {
        limit: u8,
        seen: Vec<(BankKind, u8, u8, PatchOverrides)>,
    }

    impl InstrumentSource for Recorder {
        fn load(&mut self, r: &LoadRequest<'_>) -> Result<Option<Instrument>, LoadError> {
            self.seen.push((r.kind, r.bank, r.program, r.overrides));
            if r.bank != 0 && r.program >= self.limit {
                return Err(LoadError::Source("missing".into()));
            }
            Ok((r.program < self.limit || r.bank == 0).then(instrument))
        }
    }

    #[test]
    fn test_bank_zero_always_defined() {
        let reg = BankRegistry::new();
        assert!(reg.bank(BankKind::Tone, 0).is_some());
        assert!(reg.bank(BankKind::Drum, 0).is_some());
        assert!(reg.bank(BankKind::Tone, 1).is_none());
        assert_eq!(reg.defined(BankKind::Tone).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_resolve_falls_back_to_bank_zero() {
        let mut reg = BankRegistry::new();
        reg.insert(BankKind::Tone, 0, 5, instrument());
        reg.define_bank(BankKind::Tone, 8);
        assert!(reg.resolve(BankKind::Tone, 8, 5).is_some());
        assert!(reg.resolve(BankKind::Tone, 9, 5).is_some());
        assert!(reg.resolve(BankKind::Tone, 8, 6).is_none());
        assert!(reg.resolve(BankKind::Drum, 0, 5).is_none());
    }

    #[test]
    fn test_mark_also_marks_bank_zero() {
        let mut reg = BankRegistry::new();
        reg.define_bank(BankKind::Tone, 3);
        reg.mark(BankKind::Tone, 3, 10);
        assert!(matches!(reg.slot(BankKind::Tone, 3, 10), Some(SlotState::Pending)));
        assert!(matches!(reg.slot(BankKind::Tone, 0, 10), Some(SlotState::Pending)));
        // Undefined banks only mark the fallback.
        reg.mark(BankKind::Tone, 4, 11);
        assert!(reg.slot(BankKind::Tone, 4, 11).is_none());
        assert!(matches!(reg.slot(BankKind::Tone, 0, 11), Some(SlotState::Pending)));
        assert_eq!(reg.pending(), 3);
    }

    #[test]
    fn test_precache_unpacks() {
        let mut reg = BankRegistry::new();
        reg.define_bank(BankKind::Drum, 2);
        reg.precache(&[(1 << 14) | (2 << 7) | 36, 40]);
        assert!(matches!(reg.slot(BankKind::Drum, 2, 36), Some(SlotState::Pending)));
        assert!(matches!(reg.slot(BankKind::Drum, 0, 36), Some(SlotState::Pending)));
        assert!(matches!(reg.slot(BankKind::Tone, 0, 40), Some(SlotState::Pending)));
    }

    #[test]
    fn test_load_missing_applies_drum_defaults() {
        let mut reg = BankRegistry::new();
        reg.set_entry(BankKind::Drum, 0, 38, ToneEntry::named("snare"));
        reg.mark(BankKind::Drum, 0, 38);
        let mut src = Recorder {
            limit: 128,
            seen: Vec::new(),
        };
        let errors = reg.load_missing(&mut src, &OutputSpec::default());
        assert_eq!(errors, 0);
        let (kind, _, program, o) = src.seen[0];
        assert_eq!((kind, program), (BankKind::Drum, 38));
        assert_eq!(o.note, Some(38));
        assert_eq!(o.strip_loop, Some(true));
        assert_eq!(o.strip_envelope, Some(true));
        assert!(reg.resolve(BankKind::Drum, 0, 38).is_some());
        assert_eq!(reg.pending(), 0);
    }

    #[test]
    fn test_failed_load_marks_fallback_once() {
        let mut reg = BankRegistry::new();
        reg.define_bank(BankKind::Tone, 5);
        reg.insert(BankKind::Tone, 0, 20, instrument());
        reg.banks_mut(BankKind::Tone)[5]
            .as_mut()
            .unwrap()
            .slots[20] = SlotState::Pending;
        reg.banks_mut(BankKind::Tone)[5]
            .as_mut()
            .unwrap()
            .slots[30] = SlotState::Pending;

        let mut src = Recorder {
            limit: 10,
            seen: Vec::new(),
        };
        let errors = reg.load_missing(&mut src, &OutputSpec::default());
        assert_eq!(errors, 2);
        assert!(matches!(reg.slot(BankKind::Tone, 5, 20), Some(SlotState::Failed)));
        // Bank 0 already had program 20; program 30 was marked and loaded.
        assert!(reg.resolve(BankKind::Tone, 5, 20).is_some());
        assert!(reg.resolve(BankKind::Tone, 5, 30).is_some());

        // A second pass does not retry failed slots.
        src.seen.clear();
        assert_eq!(reg.load_missing(&mut src, &OutputSpec::default()), 0);
        assert!(src.seen.is_empty());
    }
}
