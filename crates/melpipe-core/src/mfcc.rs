//! Mel-filterbank and MFCC feature extraction.
//!
//! [`MfccExtractor`] drives the per-frame DSP chain over any frame source:
//!
//! 1. acquire one frame, zero-padded up to the FFT length
//! 2. dither with deterministic Gaussian noise
//! 3. remove the DC offset
//! 4. capture the log frame energy
//! 5. pre-emphasis high-pass
//! 6. multiply by the analysis window
//! 7. magnitude spectrum via the real-input FFT
//! 8. triangular Mel filterbank, floored and logged
//! 9. optionally DCT-II + liftering for cepstral coefficients
//!
//! Each output vector carries the selected base features (log Mel energies
//! or MFCCs) followed by the optional C0 and log-energy tail values.
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use melpipe_core::mfcc::{MelConfig, MfccExtractor};
//! use melpipe_core::raw::RawFrames;
//!
//! // one 256-sample frame of silence
//! let bytes = vec![0u8; 256 * 4];
//! let source = RawFrames::new(Cursor::new(bytes), 256);
//!
//! let cfg = MelConfig {
//!     dither: 0.0,
//!     ..MelConfig::default()
//! };
//! let mut extractor = MfccExtractor::new(source, cfg).unwrap();
//!
//! let mut feats = vec![0.0f32; extractor.feat_len()];
//! assert!(extractor.read_frame(&mut feats).unwrap());
//! assert!(!extractor.read_frame(&mut feats).unwrap());
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dct::Dct;
use crate::dither::GaussianNoise;
use crate::fft::RealFft;
use crate::filterbank::FilterBank;
use crate::types::{FeatError, FeatResult, FrameRead, Sample};
use crate::window::{build_window, WindowKind};

/// Feature flavour emitted per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Log Mel-filterbank energies.
    MelEnergy,
    /// Mel-frequency cepstral coefficients.
    Mfcc,
}

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelConfig {
    /// Samples per analysis frame.
    pub frame_length: usize,
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Subtract the frame mean before analysis.
    pub remove_dc_offset: bool,
    /// Standard deviation of the Gaussian dither, 0 to disable.
    pub dither: f32,
    /// Pre-emphasis coefficient, 0 to disable.
    pub preemph_coeff: f32,
    /// Cepstral liftering coefficient, 0 to disable.
    pub lifter_coeff: f32,
    /// First coefficient of the Blackman window.
    pub blackman_coeff: f32,
    /// Analysis window shape.
    pub window: WindowKind,
    /// Lower clamp applied to each Mel channel before the log.
    pub filterbank_floor: f32,
    /// Number of Mel filterbank channels.
    pub num_bins: usize,
    /// Number of cepstral coefficients kept (C0 excluded).
    pub mfcc_order: usize,
    /// Base feature flavour.
    pub output: OutputKind,
    /// Append the log frame energy to each vector.
    pub output_energy: bool,
    /// Append C0 to each vector.
    pub output_c0: bool,
}

impl Default for MelConfig {
    fn default() -> Self {
        MelConfig {
            frame_length: 256,
            sample_rate: 16000,
            remove_dc_offset: true,
            dither: 1.0,
            preemph_coeff: 0.97,
            lifter_coeff: 22.0,
            blackman_coeff: 0.42,
            window: WindowKind::Povey,
            filterbank_floor: 1.0,
            num_bins: 20,
            mfcc_order: 12,
            output: OutputKind::Mfcc,
            output_energy: true,
            output_c0: false,
        }
    }
}

impl MelConfig {
    /// FFT length backing the spectrum: the next power of two above the
    /// frame length, or twice the frame length when it already is one.
    pub fn fft_frame_length(&self) -> usize {
        if self.frame_length.is_power_of_two() {
            2 * self.frame_length
        } else {
            self.frame_length.next_power_of_two()
        }
    }

    /// Values per output feature vector.
    pub fn feat_len(&self) -> usize {
        let base = match self.output {
            OutputKind::MelEnergy => self.num_bins,
            OutputKind::Mfcc => self.mfcc_order,
        };
        base + usize::from(self.output_c0) + usize::from(self.output_energy)
    }
}

/// Streaming feature extractor over a frame source.
#[derive(Debug)]
pub struct MfccExtractor<S> {
    cfg: MelConfig,
    source: S,
    fft: RealFft,
    dct: Dct,
    fbank: FilterBank,
    window: Vec<f32>,
    noise: GaussianNoise,
    /// Frame staging area, `frame_length` long.
    frame: Vec<f32>,
    /// FFT working arrays, `fft_frame_length` long.
    real: Vec<f32>,
    imag: Vec<f32>,
    /// Magnitude spectrum, first half of the FFT length.
    spectrum: Vec<f32>,
    /// Per-channel filterbank totals.
    mel: Vec<f32>,
    /// DCT buffer in the packed complex layout.
    cep: Vec<f32>,
    /// Scratch vector backing the byte-oriented `read`.
    feat: Vec<f32>,
    done: bool,
    failed: bool,
}

impl<S: FrameRead<f32>> MfccExtractor<S> {
    pub fn new(source: S, cfg: MelConfig) -> FeatResult<Self> {
        let l = cfg.frame_length;
        if l < 2 {
            return Err(FeatError::InvalidSize(l));
        }
        if source.frame_len() != l {
            return Err(FeatError::IncorrectFrameSize {
                expected: l,
                actual: source.frame_len(),
            });
        }
        if cfg.num_bins == 0 {
            return Err(FeatError::InvalidSize(0));
        }
        if cfg.output == OutputKind::Mfcc
            && (cfg.mfcc_order == 0 || cfg.mfcc_order >= cfg.num_bins)
        {
            return Err(FeatError::InvalidSize(cfg.mfcc_order));
        }

        let n = cfg.fft_frame_length();
        let fft = RealFft::new(n)?;
        let dct = Dct::new(cfg.num_bins)?;
        let fbank = FilterBank::new(n, cfg.sample_rate, cfg.num_bins)?;
        let window = build_window(cfg.window, l, cfg.blackman_coeff);
        debug!(
            frame_length = l,
            fft_length = n,
            num_bins = cfg.num_bins,
            feat_len = cfg.feat_len(),
            "feature pipeline ready"
        );

        let feat_len = cfg.feat_len();
        Ok(MfccExtractor {
            source,
            fft,
            dct,
            fbank,
            window,
            noise: GaussianNoise::new(0),
            frame: vec![0.0; l],
            real: vec![0.0; n],
            imag: vec![0.0; n],
            spectrum: vec![0.0; n / 2],
            mel: vec![0.0; cfg.num_bins],
            cep: vec![0.0; 2 * cfg.num_bins],
            feat: vec![0.0; feat_len],
            done: false,
            failed: false,
            cfg,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &MelConfig {
        &self.cfg
    }

    /// Values per output feature vector.
    pub fn feat_len(&self) -> usize {
        self.cfg.feat_len()
    }

    /// Fill `dst` with the next feature vector. Returns `false` on a clean
    /// end of stream.
    pub fn read_frame(&mut self, dst: &mut [f32]) -> FeatResult<bool> {
        if self.failed {
            return Err(FeatError::BadState);
        }
        match self.next_feature(dst) {
            Ok(more) => Ok(more),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Fill `buf` with the next feature vector's little-endian byte image.
    ///
    /// Returns the number of bytes written, or 0 on a clean end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> FeatResult<usize> {
        if self.failed {
            return Err(FeatError::BadState);
        }
        let need = self.cfg.feat_len() * f32::BYTES;
        if buf.len() < need {
            self.failed = true;
            return Err(FeatError::BufferTooShort {
                needed: need,
                actual: buf.len(),
            });
        }

        let mut feat = std::mem::take(&mut self.feat);
        let result = self.read_frame(&mut feat);
        let more = match result {
            Ok(m) => m,
            Err(e) => {
                self.feat = feat;
                return Err(e);
            }
        };
        if more {
            for (i, v) in feat.iter().enumerate() {
                v.to_le(&mut buf[i * 4..(i + 1) * 4]);
            }
        }
        self.feat = feat;
        Ok(if more { need } else { 0 })
    }

    fn next_feature(&mut self, dst: &mut [f32]) -> FeatResult<bool> {
        let feat_len = self.cfg.feat_len();
        if dst.len() != feat_len {
            return Err(FeatError::IncorrectFrameSize {
                expected: feat_len,
                actual: dst.len(),
            });
        }
        if self.done {
            return Ok(false);
        }
        if !self.source.read_frame(&mut self.frame)? {
            self.done = true;
            return Ok(false);
        }

        let l = self.cfg.frame_length;
        self.real[..l].copy_from_slice(&self.frame);
        self.real[l..].fill(0.0);

        if self.cfg.dither != 0.0 {
            for x in &mut self.real[..l] {
                *x += self.cfg.dither * self.noise.sample();
            }
        }

        if self.cfg.remove_dc_offset {
            let mean = self.real[..l].iter().sum::<f32>() / l as f32;
            for x in &mut self.real[..l] {
                *x -= mean;
            }
        }

        let mut log_energy = 0.0f32;
        if self.cfg.output_energy {
            let energy = self.real[..l].iter().map(|x| x * x).sum::<f32>();
            log_energy = if energy > 0.0 { energy.ln() } else { -1.0e10 };
        }

        let coeff = self.cfg.preemph_coeff;
        if coeff != 0.0 {
            for i in (1..l).rev() {
                self.real[i] -= coeff * self.real[i - 1];
            }
            self.real[0] -= coeff * self.real[0];
        }

        for (x, w) in self.real[..l].iter_mut().zip(self.window.iter()) {
            *x *= w;
        }

        self.imag.fill(0.0);
        self.fft.fftr(&mut self.real, &mut self.imag)?;
        let half = self.real.len() / 2;
        self.spectrum[0] = 0.0;
        for k in 1..half {
            self.spectrum[k] =
                (self.real[k] * self.real[k] + self.imag[k] * self.imag[k]).sqrt();
        }

        self.fbank.apply(&self.spectrum, &mut self.mel)?;
        let floor = self.cfg.filterbank_floor;
        for ch in &mut self.mel {
            *ch = ch.max(floor).ln();
        }

        let mut c0 = 0.0f32;
        if self.cfg.output_c0 {
            c0 = (2.0 / self.cfg.num_bins as f32).sqrt() * self.mel.iter().sum::<f32>();
        }

        let mut at = match self.cfg.output {
            OutputKind::MelEnergy => {
                dst[..self.cfg.num_bins].copy_from_slice(&self.mel);
                self.cfg.num_bins
            }
            OutputKind::Mfcc => {
                let nb = self.cfg.num_bins;
                self.cep[..nb].copy_from_slice(&self.mel);
                self.cep[nb..].fill(0.0);
                self.dct.apply(&mut self.cep)?;

                let lift = self.cfg.lifter_coeff;
                if lift != 0.0 {
                    for (i, c) in self.cep.iter_mut().enumerate().take(self.cfg.mfcc_order + 1) {
                        let w = 1.0 + 0.5 * lift as f64 * (PI * i as f64 / lift as f64).sin();
                        *c *= w as f32;
                    }
                }
                let order = self.cfg.mfcc_order;
                dst[..order].copy_from_slice(&self.cep[1..=order]);
                order
            }
        };

        if self.cfg.output_c0 {
            dst[at] = c0;
            at += 1;
        }
        if self.cfg.output_energy {
            dst[at] = log_energy;
        }
        Ok(true)
    }
}
