//! Overlapping frame producer.
//!
//! Cuts a sample stream into fixed-length frames that overlap by
//! `length - shift` samples. The first frame is padded on the left with half
//! a frame of zeros, so frame `i` begins at input index `i*shift - length/2`;
//! after the input ends, one final frame is padded on the right with zeros.
//!
//! Internally the producer keeps a ring buffer of one frame. Each step pulls
//! just the new samples (half a frame for the very first step, `shift`
//! thereafter) and re-emits the overlap from the ring, so no sample is read
//! from the source twice.
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use melpipe_core::frame_maker::{FrameConfig, FrameMaker};
//! use melpipe_core::raw::RawSamples;
//!
//! let bytes: Vec<u8> = (0..400u32)
//!     .flat_map(|i| (i as f32).to_le_bytes())
//!     .collect();
//! let source = RawSamples::<_, f32>::new(Cursor::new(bytes));
//! let mut maker = FrameMaker::new(source, FrameConfig::default()).unwrap();
//!
//! let mut frame = [0.0f32; 256];
//! assert!(maker.read_frame(&mut frame).unwrap());
//! // half a frame of leading zeros, then the input
//! assert_eq!(frame[127], 0.0);
//! assert_eq!(frame[128], 0.0); // input sample 0
//! assert_eq!(frame[129], 1.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{FeatError, FeatResult, FrameRead, Sample, SampleRead};

/// Framing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Samples per frame.
    pub length: usize,
    /// Samples to advance between frames. Must be in `1..length`.
    pub shift: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            length: 256,
            shift: 100,
        }
    }
}

/// Produces overlapping frames of `T` from a sample source.
#[derive(Debug)]
pub struct FrameMaker<S, T: Sample> {
    source: S,
    length: usize,
    shift: usize,
    ring: Vec<T>,
    /// Ring index of the next frame's first sample.
    read_pos: usize,
    /// Ring index where the next source sample lands.
    write_pos: usize,
    /// Staging area for source reads.
    chunk: Vec<T>,
    /// Scratch frame backing the byte-oriented `read`.
    frame: Vec<T>,
    started: bool,
    /// The zero-padded final frame has been emitted.
    terminal: bool,
    done: bool,
    failed: bool,
}

impl<S: SampleRead<T>, T: Sample> FrameMaker<S, T> {
    pub fn new(source: S, cfg: FrameConfig) -> FeatResult<Self> {
        if cfg.length < 2 {
            return Err(FeatError::InvalidSize(cfg.length));
        }
        if cfg.shift == 0 || cfg.shift >= cfg.length {
            return Err(FeatError::InvalidSize(cfg.shift));
        }
        let first_fill = cfg.length.div_ceil(2);
        let lead_zeros = cfg.length - first_fill;
        Ok(FrameMaker {
            source,
            length: cfg.length,
            shift: cfg.shift,
            ring: vec![T::default(); cfg.length],
            read_pos: 0,
            write_pos: lead_zeros,
            chunk: vec![T::default(); first_fill.max(cfg.shift)],
            frame: vec![T::default(); cfg.length],
            started: false,
            terminal: false,
            done: false,
            failed: false,
        })
    }

    /// Samples per frame.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Samples advanced between frames.
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Fill `dst` with the next frame. Returns `false` on a clean end of
    /// stream.
    pub fn read_frame(&mut self, dst: &mut [T]) -> FeatResult<bool> {
        if self.failed {
            return Err(FeatError::BadState);
        }
        match self.next_frame(dst) {
            Ok(more) => Ok(more),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Fill `buf` with the next frame's little-endian byte image.
    ///
    /// Returns the number of bytes written, or 0 on a clean end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> FeatResult<usize> {
        if self.failed {
            return Err(FeatError::BadState);
        }
        let need = self.length * T::BYTES;
        if buf.len() < need {
            self.failed = true;
            return Err(FeatError::BufferTooShort {
                needed: need,
                actual: buf.len(),
            });
        }

        let mut frame = std::mem::take(&mut self.frame);
        let result = self.read_frame(&mut frame);
        let more = match result {
            Ok(m) => m,
            Err(e) => {
                self.frame = frame;
                return Err(e);
            }
        };
        if more {
            for (i, s) in frame.iter().enumerate() {
                s.to_le(&mut buf[i * T::BYTES..(i + 1) * T::BYTES]);
            }
        }
        self.frame = frame;
        Ok(if more { need } else { 0 })
    }

    fn next_frame(&mut self, dst: &mut [T]) -> FeatResult<bool> {
        if dst.len() != self.length {
            return Err(FeatError::IncorrectFrameSize {
                expected: self.length,
                actual: dst.len(),
            });
        }
        if self.done {
            return Ok(false);
        }
        if self.terminal {
            self.done = true;
            return Ok(false);
        }

        let want = if self.started {
            self.shift
        } else {
            self.length.div_ceil(2)
        };
        self.started = true;

        let got = self.fill_chunk(want)?;
        if got == 0 {
            self.done = true;
            return Ok(false);
        }
        if got < want {
            for slot in &mut self.chunk[got..want] {
                *slot = T::default();
            }
            self.terminal = true;
        }

        for i in 0..want {
            self.ring[(self.write_pos + i) % self.length] = self.chunk[i];
        }
        self.write_pos = (self.write_pos + want) % self.length;

        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = self.ring[(self.read_pos + i) % self.length];
        }
        self.read_pos = (self.read_pos + self.shift) % self.length;
        Ok(true)
    }

    /// Read exactly `want` samples from the source, stopping early at EOS.
    fn fill_chunk(&mut self, want: usize) -> FeatResult<usize> {
        let mut got = 0;
        while got < want {
            let n = self.source.read_samples(&mut self.chunk[got..want])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        Ok(got)
    }
}

impl<S: SampleRead<T>, T: Sample> FrameRead<T> for FrameMaker<S, T> {
    fn frame_len(&self) -> usize {
        self.length
    }

    fn read_frame(&mut self, dst: &mut [T]) -> FeatResult<bool> {
        FrameMaker::read_frame(self, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawSamples;
    use std::io::Cursor;

    fn f32_source(samples: &[f32]) -> RawSamples<Cursor<Vec<u8>>, f32> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        RawSamples::new(Cursor::new(bytes))
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 + 1.0).collect()
    }

    fn collect_frames(input: &[f32], length: usize, shift: usize) -> Vec<Vec<f32>> {
        let mut maker =
            FrameMaker::new(f32_source(input), FrameConfig { length, shift }).unwrap();
        let mut frames = Vec::new();
        let mut frame = vec![0.0f32; length];
        while maker.read_frame(&mut frame).unwrap() {
            frames.push(frame.clone());
        }
        frames
    }

    #[test]
    fn test_first_frame_layout() {
        let input = ramp(300);
        let frames = collect_frames(&input, 256, 100);
        let first = &frames[0];
        // leading half frame of zeros
        for (i, v) in first[..128].iter().enumerate() {
            assert_eq!(*v, 0.0, "expected zero at {}", i);
        }
        // then the first half frame of input
        assert_eq!(&first[128..], &input[..128]);
    }

    #[test]
    fn test_frames_overlap_by_length_minus_shift() {
        let input = ramp(1000);
        let frames = collect_frames(&input, 256, 100);
        for pair in frames.windows(2) {
            // the last length-shift samples of frame i lead frame i+1
            assert_eq!(&pair[0][100..], &pair[1][..156]);
        }
    }

    #[test]
    fn test_frame_count() {
        // first step consumes ceil(L/2) samples, later steps consume S;
        // the step that drains the input pads with zeros and ends the stream
        for (n, expected) in [(1000usize, 10usize), (128, 1), (129, 2), (10, 1), (228, 2)] {
            let frames = collect_frames(&ramp(n), 256, 100);
            assert_eq!(frames.len(), expected, "input of {} samples", n);
        }
    }

    #[test]
    fn test_short_input_single_padded_frame() {
        let input = ramp(10);
        let frames = collect_frames(&input, 256, 100);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert!(frame[..128].iter().all(|&v| v == 0.0));
        assert_eq!(&frame[128..138], &input[..]);
        assert!(frame[138..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_input_no_frames() {
        let frames = collect_frames(&[], 256, 100);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_eos_is_stable() {
        let mut maker =
            FrameMaker::new(f32_source(&ramp(50)), FrameConfig::default()).unwrap();
        let mut frame = [0.0f32; 256];
        assert!(maker.read_frame(&mut frame).unwrap());
        assert!(!maker.read_frame(&mut frame).unwrap());
        assert!(!maker.read_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_frame_content_matches_nominal_indices() {
        // frame i spans input indices i*shift - length/2 .. i*shift + length/2
        let input = ramp(500);
        let (length, shift) = (64usize, 20usize);
        let frames = collect_frames(&input, length, shift);
        for (i, frame) in frames.iter().enumerate() {
            for (j, &v) in frame.iter().enumerate() {
                let idx = (i * shift + j) as isize - (length / 2) as isize;
                let expected = if idx < 0 || idx >= input.len() as isize {
                    0.0
                } else {
                    input[idx as usize]
                };
                assert_eq!(v, expected, "frame {} offset {}", i, j);
            }
        }
    }

    #[test]
    fn test_incorrect_frame_size() {
        let mut maker =
            FrameMaker::new(f32_source(&ramp(300)), FrameConfig::default()).unwrap();
        let mut small = [0.0f32; 100];
        let err = maker.read_frame(&mut small).unwrap_err();
        assert!(matches!(err, FeatError::IncorrectFrameSize { .. }), "{err:?}");
        // the failure is sticky
        let mut frame = [0.0f32; 256];
        let err = maker.read_frame(&mut frame).unwrap_err();
        assert!(matches!(err, FeatError::BadState), "{err:?}");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            FrameMaker::new(f32_source(&[]), FrameConfig { length: 0, shift: 1 }),
            Err(FeatError::InvalidSize(_))
        ));
        assert!(matches!(
            FrameMaker::new(f32_source(&[]), FrameConfig { length: 256, shift: 0 }),
            Err(FeatError::InvalidSize(_))
        ));
        assert!(matches!(
            FrameMaker::new(f32_source(&[]), FrameConfig { length: 256, shift: 256 }),
            Err(FeatError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_byte_read_matches_frame_read() {
        let input = ramp(300);
        let cfg = FrameConfig::default();
        let mut by_frame = FrameMaker::new(f32_source(&input), cfg).unwrap();
        let mut by_bytes = FrameMaker::new(f32_source(&input), cfg).unwrap();

        let mut frame = [0.0f32; 256];
        let mut bytes = [0u8; 256 * 4];
        loop {
            let more = by_frame.read_frame(&mut frame).unwrap();
            let n = by_bytes.read(&mut bytes).unwrap();
            if !more {
                assert_eq!(n, 0);
                break;
            }
            assert_eq!(n, bytes.len());
            for (i, v) in frame.iter().enumerate() {
                let raw = f32::from_le_bytes([
                    bytes[i * 4],
                    bytes[i * 4 + 1],
                    bytes[i * 4 + 2],
                    bytes[i * 4 + 3],
                ]);
                assert_eq!(raw, *v);
            }
        }
    }

    #[test]
    fn test_byte_read_buffer_too_short() {
        let mut maker =
            FrameMaker::new(f32_source(&ramp(300)), FrameConfig::default()).unwrap();
        let mut buf = [0u8; 100];
        let err = maker.read(&mut buf).unwrap_err();
        assert!(matches!(err, FeatError::BufferTooShort { .. }), "{err:?}");
    }

    #[test]
    fn test_truncated_byte_source_fails() {
        // a byte source ending mid-sample surfaces as UnexpectedEof
        let mut bytes: Vec<u8> = ramp(200).iter().flat_map(|s| s.to_le_bytes()).collect();
        bytes.truncate(bytes.len() - 2);
        let source = RawSamples::<_, f32>::new(Cursor::new(bytes));
        let mut maker = FrameMaker::new(source, FrameConfig::default()).unwrap();
        let mut frame = [0.0f32; 256];
        assert!(maker.read_frame(&mut frame).unwrap());
        let err = maker.read_frame(&mut frame).unwrap_err();
        assert!(matches!(err, FeatError::UnexpectedEof(_)), "{err:?}");
    }
}
