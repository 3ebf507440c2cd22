//! DCT-II kernel over a complex-packed buffer.
//!
//! [`Dct`] transforms a length-`n` complex sequence packed as `2n` floats
//! (first the `n` real parts, then the `n` imaginary parts). The input is
//! mirrored into an even-symmetric extension of length `2n`, pushed through
//! a forward DFT, and the first `n` outputs are rotated by a precomputed
//! quarter-sample twiddle. For a real input this yields the orthonormal
//! DCT-II in the real half of the output; for the feature pipeline the
//! imaginary half is zero on the way in and carries only rounding noise on
//! the way out.
//!
//! The inner DFT is delegated to `rustfft` in double precision with an owned
//! scratch buffer, so `apply` needs `&mut self` and a kernel must not be
//! shared across threads without synchronization.

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::types::{FeatError, FeatResult};

/// DCT-II kernel for length-`n` inputs in the packed `2n` layout.
pub struct Dct {
    n: usize,
    w_real: Vec<f64>,
    w_imag: Vec<f64>,
    dft: Arc<dyn Fft<f64>>,
    work: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for Dct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dct").field("n", &self.n).finish()
    }
}

impl Dct {
    /// Build the kernel for inputs of `n` values (buffer length `2n`).
    pub fn new(n: usize) -> FeatResult<Self> {
        if n == 0 {
            return Err(FeatError::InvalidSize(0));
        }
        let norm = 1.0 / ((2 * n) as f64).sqrt();
        let mut w_real = Vec::with_capacity(n);
        let mut w_imag = Vec::with_capacity(n);
        for k in 0..n {
            let angle = k as f64 * PI / (2 * n) as f64;
            w_real.push(angle.cos() * norm);
            w_imag.push(-angle.sin() * norm);
        }
        // extra 1/sqrt(2) on the DC term makes the transform orthonormal
        w_real[0] *= FRAC_1_SQRT_2;
        w_imag[0] *= FRAC_1_SQRT_2;

        let mut planner = FftPlanner::new();
        let dft = planner.plan_fft_forward(2 * n);
        let scratch = vec![Complex64::default(); dft.get_inplace_scratch_len()];
        Ok(Dct {
            n,
            w_real,
            w_imag,
            dft,
            work: vec![Complex64::default(); 2 * n],
            scratch,
        })
    }

    /// Number of values per transform (`data` buffers are twice this).
    pub fn input_len(&self) -> usize {
        self.n
    }

    /// Transform `data` in place.
    ///
    /// `data` must hold `2n` floats: `n` real parts followed by `n`
    /// imaginary parts. The result uses the same layout.
    pub fn apply(&mut self, data: &mut [f32]) -> FeatResult<()> {
        let n = self.n;
        if data.len() != 2 * n {
            return Err(FeatError::InvalidSize(data.len()));
        }

        // even-symmetric extension: x[0] .. x[n-1], x[n-1] .. x[0]
        for i in 0..n {
            self.work[i] = Complex64::new(data[i] as f64, data[i + n] as f64);
            self.work[i + n] =
                Complex64::new(data[n - 1 - i] as f64, data[2 * n - 1 - i] as f64);
        }
        self.dft.process_with_scratch(&mut self.work, &mut self.scratch);

        for k in 0..n {
            let t = self.work[k];
            data[k] = (t.re * self.w_real[k] - t.im * self.w_imag[k]) as f32;
            data[k + n] = (t.re * self.w_imag[k] + t.im * self.w_real[k]) as f32;
        }
        Ok(())
    }
}
