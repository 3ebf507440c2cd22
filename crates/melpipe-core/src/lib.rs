//! # melpipe core
//!
//! A streaming audio feature-extraction pipeline: WAVE bytes in, acoustic
//! feature vectors out. The chain is a sequence of pull-driven stages, each
//! owning its buffers and borrowing its upstream source:
//!
//! ```text
//! WAVE bytes -> WavReader -> FrameMaker -> MfccExtractor -> feature vectors
//!                (decode)     (overlap)     (window, FFT, Mel, DCT)
//! ```
//!
//! Stages connect through two small traits: [`SampleRead`] for decoded
//! sample streams and [`FrameRead`] for fixed-length frames. Either side of
//! a seam can be swapped for a raw little-endian byte stream via the
//! adapters in [`raw`], so every stage also works standalone on piped bytes.
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use melpipe_core::{FrameConfig, FrameMaker, MelConfig, MfccExtractor, WavReader};
//!
//! # fn wav_fixture() -> Vec<u8> {
//! #     let mut data = Vec::new();
//! #     for i in 0..4000i32 {
//! #         let s = ((i as f64 * 0.2).sin() * 12000.0) as i16;
//! #         data.extend_from_slice(&s.to_le_bytes());
//! #     }
//! #     let mut out = Vec::new();
//! #     out.extend_from_slice(b"RIFF");
//! #     out.extend_from_slice(&((36 + data.len()) as u32).to_le_bytes());
//! #     out.extend_from_slice(b"WAVE");
//! #     out.extend_from_slice(b"fmt ");
//! #     out.extend_from_slice(&16u32.to_le_bytes());
//! #     out.extend_from_slice(&1u16.to_le_bytes());
//! #     out.extend_from_slice(&1u16.to_le_bytes());
//! #     out.extend_from_slice(&16000u32.to_le_bytes());
//! #     out.extend_from_slice(&32000u32.to_le_bytes());
//! #     out.extend_from_slice(&2u16.to_le_bytes());
//! #     out.extend_from_slice(&16u16.to_le_bytes());
//! #     out.extend_from_slice(b"data");
//! #     out.extend_from_slice(&(data.len() as u32).to_le_bytes());
//! #     out.extend_from_slice(&data);
//! #     out
//! # }
//! let wav_bytes = wav_fixture();
//!
//! let reader = WavReader::<_, f32>::new(Cursor::new(wav_bytes));
//! let frames = FrameMaker::new(reader, FrameConfig::default())?;
//! let mut extractor = MfccExtractor::new(frames, MelConfig::default())?;
//!
//! let mut features = vec![0.0f32; extractor.feat_len()];
//! while extractor.read_frame(&mut features)? {
//!     // one vector per 100-sample hop
//! }
//! # Ok::<(), melpipe_core::FeatError>(())
//! ```

pub mod dct;
pub mod dither;
pub mod fft;
pub mod filterbank;
pub mod frame_maker;
pub mod g711;
pub mod mfcc;
pub mod raw;
pub mod types;
pub mod wav_reader;
pub mod window;

pub use crate::dct::Dct;
pub use crate::fft::RealFft;
pub use crate::filterbank::FilterBank;
pub use crate::frame_maker::{FrameConfig, FrameMaker};
pub use crate::mfcc::{MelConfig, MfccExtractor, OutputKind};
pub use crate::raw::{RawFrames, RawSamples};
pub use crate::types::{FeatError, FeatResult, FrameRead, Sample, SampleRead};
pub use crate::wav_reader::{FormatCode, WavHeader, WavReader};
pub use crate::window::WindowKind;
