//! Instruments: ordered sample lists for one program or drum note.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tonebank_core::freq_to_note;

use crate::sample::{Sample, SampleKind};

/// The samples of one MIDI program or one drum note.
#[derive(Clone, Debug, Default)]
pub struct Instrument {
    /// Regions in declaration order. Order matters for hardware patches.
    pub samples: Vec<Arc<Sample>>,
}

impl Instrument {
    /// Wrap already-built samples.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the instrument has no regions.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Format of the first region, which decides region selection and pitch scaling.
    pub fn kind(&self) -> Option<SampleKind> {
        self.samples.first().map(|s| s.kind)
    }

    /// Frequency a note triggers at, in milli-Hertz.
    ///
    /// Hardware patches scale pitch from the first region only.
    pub fn note_frequency(&self, note: u8) -> f64 {
        match self.samples.first() {
            Some(first) if first.kind == SampleKind::Gus && first.scale_factor != 1024 => {
                first.scaled_frequency(note)
            }
            _ => tonebank_core::note_to_freq(f64::from(note)),
        }
    }

    /// Pick the single region a hardware patch plays at `freq`.
    ///
    /// A lone region always plays. Otherwise the first matching region wins,
    /// unless its successor also matches, in which case the last region of
    /// that contiguous matching run wins. With no match, the region whose root
    /// is closest in note space is used.
    pub fn select_gus_region(&self, freq: f64) -> Option<&Arc<Sample>> {
        if self.samples.len() <= 1 {
            return self.samples.first();
        }
        let n = self.samples.len();
        for (i, sp) in self.samples.iter().enumerate() {
            if !sp.matches_freq(freq) {
                continue;
            }
            if i + 1 < n && self.samples[i + 1].matches_freq(freq) {
                continue;
            }
            return Some(sp);
        }

        let want = freq_to_note(freq);
        let mut closest = &self.samples[0];
        let mut best = f64::INFINITY;
        for sp in &self.samples {
            let diff = (freq_to_note(sp.root_freq) - want).abs();
            if diff < best {
                best = diff;
                closest = sp;
            }
        }
        Some(closest)
    }

    /// Every region answering to `velocity` at `freq`, in order.
    pub fn matching_regions(&self, velocity: u8, freq: f64) -> impl Iterator<Item = &Arc<Sample>> {
        self.samples.iter().filter(move |s| s.matches(velocity, freq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonebank_core::note_to_freq;

    fn region(lo: f64, hi: f64, root: f64) -> Sample {
        let mut s = Sample::new(&[0.0; 16], 44100, note_to_freq(root), SampleKind::Gus);
        s.low_freq = note_to_freq(lo);
        s.high_freq = note_to_freq(hi);
        s
    }

    #[test]
    fn test_single_region_always_plays() {
        let inst = Instrument::new(alloc::vec![region(60.0, 61.0, 60.0)]);
        let chosen = inst.select_gus_region(note_to_freq(20.0));
        assert!(chosen.is_some());
    }

    #[test]
    fn test_last_of_contiguous_run_wins() {
        let inst = Instrument::new(alloc::vec![
            region(40.0, 70.0, 50.0),
            region(50.0, 80.0, 65.0),
            region(90.0, 100.0, 95.0),
        ]);
        let chosen = inst.select_gus_region(note_to_freq(60.0)).unwrap();
        assert!(Arc::ptr_eq(chosen, &inst.samples[1]));

        let chosen = inst.select_gus_region(note_to_freq(45.0)).unwrap();
        assert!(Arc::ptr_eq(chosen, &inst.samples[0]));
    }

    #[test]
    fn test_closest_root_fallback() {
        let inst = Instrument::new(alloc::vec![region(40.0, 50.0, 45.0), region(60.0, 70.0, 65.0)]);
        let chosen = inst.select_gus_region(note_to_freq(80.0)).unwrap();
        assert!(Arc::ptr_eq(chosen, &inst.samples[1]));
        let chosen = inst.select_gus_region(note_to_freq(52.0)).unwrap();
        assert!(Arc::ptr_eq(chosen, &inst.samples[0]));
    }

    #[test]
    fn test_note_frequency_scaling() {
        let mut s = region(0.0, 127.0, 60.0);
        s.scale_factor = 0;
        s.scale_note = 40;
        let inst = Instrument::new(alloc::vec![s]);
        assert!((inst.note_frequency(90) - note_to_freq(40.0)).abs() < 1e-6);
        assert_eq!(inst.kind(), Some(SampleKind::Gus));
    }
}
