//! Real-input FFT on power-of-two lengths with a shared sine table.
//!
//! [`RealFft`] owns a quarter-wave-extended sine table sized for a maximum
//! transform length `M` and serves every power-of-two length `m <= M` from
//! that one table by striding through it with step `M/m`. The table stores
//! `sin(2*pi*i/M)` for `i` in `0..=3M/4`; a cosine at the same angle is the
//! sine a quarter period later, so both twiddle components come from single
//! lookups and the table is immutable after construction.
//!
//! [`RealFft::fftr`] computes the DFT of a real sequence at half cost: the
//! input is deinterleaved into a half-length complex signal, transformed with
//! the in-place radix-2 kernel, and the real spectrum is recovered with the
//! standard split recombination. Outputs land in the caller's `real`/`imag`
//! arrays as a full-length spectrum with exact conjugate symmetry
//! (`real[k] == real[m-k]`, `imag[k] == -imag[m-k]`).
//!
//! ## Example
//!
//! ```
//! use melpipe_core::fft::RealFft;
//!
//! let fft = RealFft::new(16).unwrap();
//! let mut real = [0.0f32; 16];
//! let mut imag = [0.0f32; 16];
//! real[0] = 1.0; // unit impulse
//! fft.fftr(&mut real, &mut imag).unwrap();
//! // the spectrum of an impulse is flat
//! for k in 0..16 {
//!     assert!((real[k] - 1.0).abs() < 1e-6);
//!     assert!(imag[k].abs() < 1e-6);
//! }
//! ```

use std::f64::consts::PI;

use crate::types::{FeatError, FeatResult};

/// FFT kernel with a precomputed sine table shared across sub-sizes.
#[derive(Debug, Clone)]
pub struct RealFft {
    max_len: usize,
    /// `sin(2*pi*i/max_len)` for `i` in `0..=3*max_len/4`.
    sine: Vec<f32>,
}

impl RealFft {
    /// Build the kernel for transforms up to `max_len` (a power of two).
    pub fn new(max_len: usize) -> FeatResult<Self> {
        if !max_len.is_power_of_two() || max_len < 4 {
            return Err(FeatError::InvalidSize(max_len));
        }
        let size = max_len - max_len / 4 + 1;
        let mut sine = Vec::with_capacity(size);
        for i in 0..size {
            sine.push((2.0 * PI * i as f64 / max_len as f64).sin() as f32);
        }
        sine[0] = 0.0;
        Ok(RealFft { max_len, sine })
    }

    /// Largest transform length this kernel serves.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    #[inline]
    fn sin_at(&self, i: usize) -> f32 {
        self.sine[i]
    }

    #[inline]
    fn cos_at(&self, i: usize) -> f32 {
        self.sine[i + self.max_len / 4]
    }

    /// In-place DFT of a real sequence of power-of-two length.
    ///
    /// On entry only `real` is read; `imag` contents are ignored. On return
    /// both arrays hold the full-length complex spectrum.
    pub fn fftr(&self, real: &mut [f32], imag: &mut [f32]) -> FeatResult<()> {
        let m = real.len();
        if imag.len() != m {
            return Err(FeatError::DataSizeMismatch {
                left: m,
                right: imag.len(),
            });
        }
        if !m.is_power_of_two() || m < 2 || m > self.max_len {
            return Err(FeatError::InvalidSize(m));
        }
        let half = m / 2;

        // deinterleave: even samples into real[..half], odd into imag[..half]
        for i in 0..m {
            if i % 2 == 0 {
                real[i / 2] = real[i];
            } else {
                imag[(i - 1) / 2] = real[i];
            }
        }

        self.fft(&mut real[..half], &mut imag[..half])?;

        // split recombination recovering the m-point real-input DFT; the
        // twiddle walks the table top-down, so the cosine arrives negated
        let step = self.max_len / m;
        for i in 1..half {
            let s = self.sin_at((half - i) * step);
            let c = self.cos_at((half - i) * step);
            let ti = imag[half - i] + imag[i];
            let tr = real[half - i] - real[i];
            real[half + i] = 0.5 * (real[half - i] + real[i] + c * ti - s * tr);
            imag[half + i] = 0.5 * (imag[i] - imag[half - i] + s * ti + c * tr);
        }
        let r0 = real[0];
        let i0 = imag[0];
        real[half] = r0 - i0;
        imag[half] = 0.0;
        real[0] = r0 + i0;
        imag[0] = 0.0;

        // conjugate symmetry fills the first half from the second
        for i in 1..half {
            real[i] = real[m - i];
            imag[i] = -imag[m - i];
        }
        Ok(())
    }

    /// In-place iterative radix-2 decimation-in-frequency complex FFT.
    pub fn fft(&self, real: &mut [f32], imag: &mut [f32]) -> FeatResult<()> {
        let n = real.len();
        if imag.len() != n {
            return Err(FeatError::DataSizeMismatch {
                left: n,
                right: imag.len(),
            });
        }
        if !n.is_power_of_two() || n > self.max_len {
            return Err(FeatError::InvalidSize(n));
        }
        if n <= 1 {
            return Ok(());
        }

        // butterfly passes with shrinking stride
        let mut m = n;
        while m > 2 {
            let half = m / 2;
            let step = self.max_len / m;
            let mut base = 0;
            while base < n {
                for j in 0..half {
                    let s = self.sin_at(j * step);
                    let c = self.cos_at(j * step);
                    let a = base + j;
                    let b = a + half;
                    let tr = real[a] - real[b];
                    let ti = imag[a] - imag[b];
                    real[a] += real[b];
                    imag[a] += imag[b];
                    real[b] = tr * c + ti * s;
                    imag[b] = ti * c - tr * s;
                }
                base += m;
            }
            m = half;
        }

        // final twiddle-free pass over adjacent pairs
        let mut base = 0;
        while base < n {
            let tr = real[base] - real[base + 1];
            let ti = imag[base] - imag[base + 1];
            real[base] += real[base + 1];
            imag[base] += imag[base + 1];
            real[base + 1] = tr;
            imag[base + 1] = ti;
            base += 2;
        }

        // bit-reversal permutation over the low log2(n) bits
        let bits = n.trailing_zeros();
        for i in 0..n {
            let j = ((i as u32).reverse_bits() >> (32 - bits)) as usize;
            if i < j {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }
        Ok(())
    }
}
