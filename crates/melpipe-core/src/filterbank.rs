//! Mel-scale filterbank tables.
//!
//! The filterbank is stored as two parallel per-bin tables rather than a
//! weight matrix: `bin[k]` names the Mel channel just below FFT bin `k` on
//! the Mel axis and `weight[k]` is the bin's share for that channel, with
//! `1 - weight[k]` going to the channel above. Accumulating every spectrum
//! bin into its two neighbours this way is equivalent to a bank of
//! triangular filters with unit crossover, at a fraction of the storage.
//!
//! Channel centers are spaced uniformly on the Mel axis between 0 Hz and
//! Nyquist, using the 1127*ln(1 + f/700) Mel map.

use crate::types::{FeatError, FeatResult};

/// Convert a frequency in Hz to the Mel scale.
pub fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

/// Convert a Mel-scale value back to Hz.
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Triangular Mel filterbank over the first half of an FFT spectrum.
#[derive(Debug, Clone)]
pub struct FilterBank {
    num_bins: usize,
    /// Mel channel index in `0..=num_bins` for each FFT bin.
    bin: Vec<usize>,
    /// Share of each FFT bin assigned to the channel below it.
    weight: Vec<f32>,
}

impl FilterBank {
    /// Build tables for an FFT of `fft_len` points at `sample_rate` Hz,
    /// splitting the spectrum into `num_bins` Mel channels.
    pub fn new(fft_len: usize, sample_rate: u32, num_bins: usize) -> FeatResult<Self> {
        if num_bins == 0 {
            return Err(FeatError::InvalidSize(num_bins));
        }
        if fft_len < 2 {
            return Err(FeatError::InvalidSize(fft_len));
        }
        let half = fft_len / 2;
        let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
        // channel c is centered at c*step on the Mel axis, c in 1..=num_bins
        let step = mel_max / (num_bins + 1) as f64;

        let mut bin = Vec::with_capacity(half);
        let mut weight = Vec::with_capacity(half);
        for k in 0..half {
            let freq = k as f64 * sample_rate as f64 / fft_len as f64;
            let mel = hz_to_mel(freq);
            let chan = ((mel / step) as usize).min(num_bins);
            bin.push(chan);
            weight.push(((chan + 1) as f64 - mel / step) as f32);
        }
        Ok(FilterBank {
            num_bins,
            bin,
            weight,
        })
    }

    /// Number of Mel channels.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Accumulate a magnitude spectrum into per-channel totals.
    ///
    /// `spectrum` must cover the first `fft_len/2` bins; bin 0 is skipped.
    pub fn apply(&self, spectrum: &[f32], out: &mut [f32]) -> FeatResult<()> {
        if spectrum.len() != self.bin.len() {
            return Err(FeatError::DataSizeMismatch {
                left: spectrum.len(),
                right: self.bin.len(),
            });
        }
        if out.len() != self.num_bins {
            return Err(FeatError::DataSizeMismatch {
                left: out.len(),
                right: self.num_bins,
            });
        }

        out.fill(0.0);
        for k in 1..spectrum.len() {
            let a = spectrum[k];
            let chan = self.bin[k];
            let w = self.weight[k];
            if chan > 0 {
                out[chan - 1] += w * a;
            }
            if chan < self.num_bins {
                out[chan] += (1.0 - w) * a;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_conversion_roundtrip() {
        for &freq in &[0.0, 100.0, 700.0, 4000.0, 8000.0] {
            let roundtrip = mel_to_hz(hz_to_mel(freq));
            assert!(
                (roundtrip - freq).abs() < 1e-6,
                "freq={} roundtrip={}",
                freq,
                roundtrip
            );
        }
    }

    #[test]
    fn test_mel_of_700hz() {
        // 1127 * ln(2)
        assert!((hz_to_mel(700.0) - 781.177).abs() < 1e-2);
    }

    #[test]
    fn test_tables_cover_half_spectrum() {
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        assert_eq!(fb.num_bins(), 20);
        assert_eq!(fb.bin.len(), 256);
        assert_eq!(fb.weight.len(), 256);
    }

    #[test]
    fn test_weights_in_unit_interval() {
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        for (k, &w) in fb.weight.iter().enumerate() {
            assert!((0.0..=1.0).contains(&w), "weight[{}]={}", k, w);
        }
    }

    #[test]
    fn test_channel_indices_monotonic() {
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        for pair in fb.bin.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(fb.bin[0], 0);
        assert_eq!(*fb.bin.last().unwrap(), 20);
    }

    #[test]
    fn test_interior_bins_conserve_energy() {
        // a bin assigned strictly inside the bank contributes its full
        // magnitude, split across two adjacent channels
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        let half = 256;
        let mut spectrum = vec![0.0f32; half];
        let k = 100;
        spectrum[k] = 2.0;
        let mut out = vec![0.0f32; 20];
        fb.apply(&spectrum, &mut out).unwrap();
        let total: f32 = out.iter().sum();
        assert!((total - 2.0).abs() < 1e-5, "total={}", total);
        // exactly two adjacent channels are hit
        let hit: Vec<usize> = (0..20).filter(|&c| out[c] != 0.0).collect();
        assert!(hit.len() <= 2, "channels hit: {:?}", hit);
        if hit.len() == 2 {
            assert_eq!(hit[0] + 1, hit[1]);
        }
    }

    #[test]
    fn test_dc_bin_ignored() {
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        let mut spectrum = vec![0.0f32; 256];
        spectrum[0] = 1000.0;
        let mut out = vec![0.0f32; 20];
        fb.apply(&spectrum, &mut out).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_size_checks() {
        let fb = FilterBank::new(512, 16000, 20).unwrap();
        let mut out = vec![0.0f32; 20];
        assert!(matches!(
            fb.apply(&[0.0; 100], &mut out),
            Err(FeatError::DataSizeMismatch { .. })
        ));
        let mut short = vec![0.0f32; 10];
        assert!(matches!(
            fb.apply(&[0.0; 256], &mut short),
            Err(FeatError::DataSizeMismatch { .. })
        ));
        assert!(matches!(
            FilterBank::new(512, 16000, 0),
            Err(FeatError::InvalidSize(0))
        ));
    }
}
