//! Byte-stream adapters between pipeline stages.
//!
//! Each pipeline stage pulls from a structured source when one is available
//! and from a plain byte stream otherwise. These adapters provide the byte
//! side of that split: they reinterpret a little-endian byte stream as
//! samples ([`RawSamples`]) or as whole fixed-length frames ([`RawFrames`]),
//! so the downstream stage never needs to know which kind of upstream it was
//! composed with.

use std::io::Read;
use std::marker::PhantomData;

use crate::types::{FeatError, FeatResult, FrameRead, Sample, SampleRead};

/// Adapter exposing a byte stream as a stream of samples.
///
/// Bytes are consumed in whole little-endian samples of `T`. A stream that
/// ends in the middle of a sample is a truncation error.
#[derive(Debug)]
pub struct RawSamples<R: Read, T: Sample> {
    reader: R,
    buf: Vec<u8>,
    _sample: PhantomData<T>,
}

impl<R: Read, T: Sample> RawSamples<R, T> {
    pub fn new(reader: R) -> Self {
        RawSamples {
            reader,
            buf: Vec::new(),
            _sample: PhantomData,
        }
    }
}

impl<R: Read, T: Sample> SampleRead<T> for RawSamples<R, T> {
    fn read_samples(&mut self, dst: &mut [T]) -> FeatResult<usize> {
        let want = dst.len() * T::BYTES;
        if self.buf.len() < want {
            self.buf.resize(want, 0);
        }

        let mut filled = 0;
        while filled < want {
            let n = self.reader.read(&mut self.buf[filled..want])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled % T::BYTES != 0 {
            return Err(FeatError::UnexpectedEof("sample bytes"));
        }

        for (out, raw) in dst.iter_mut().zip(self.buf[..filled].chunks_exact(T::BYTES)) {
            *out = T::from_le(raw);
        }
        Ok(filled / T::BYTES)
    }
}

/// Adapter exposing a byte stream as fixed-length `f32` frames.
///
/// Used when the upstream already produced whole frames (for example the
/// output of the framing tool piped into the feature extractor). A stream
/// that ends inside a frame is a truncation error.
#[derive(Debug)]
pub struct RawFrames<R: Read> {
    reader: R,
    frame_len: usize,
    buf: Vec<u8>,
}

impl<R: Read> RawFrames<R> {
    pub fn new(reader: R, frame_len: usize) -> Self {
        RawFrames {
            reader,
            frame_len,
            buf: vec![0; frame_len * f32::BYTES],
        }
    }
}

impl<R: Read> FrameRead<f32> for RawFrames<R> {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn read_frame(&mut self, dst: &mut [f32]) -> FeatResult<bool> {
        if dst.len() != self.frame_len {
            return Err(FeatError::IncorrectFrameSize {
                expected: self.frame_len,
                actual: dst.len(),
            });
        }

        let want = self.buf.len();
        let mut filled = 0;
        while filled < want {
            let n = self.reader.read(&mut self.buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(false);
        }
        if filled < want {
            return Err(FeatError::UnexpectedEof("frame bytes"));
        }

        for (out, raw) in dst.iter_mut().zip(self.buf.chunks_exact(f32::BYTES)) {
            *out = f32::from_le(raw);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_raw_samples_decodes_f32() {
        let samples = [0.0f32, 1.5, -2.25, 1e-3];
        let mut src = RawSamples::<_, f32>::new(Cursor::new(f32_bytes(&samples)));
        let mut dst = [0.0f32; 4];
        assert_eq!(src.read_samples(&mut dst).unwrap(), 4);
        assert_eq!(dst, samples);
        assert_eq!(src.read_samples(&mut dst).unwrap(), 0);
    }

    #[test]
    fn test_raw_samples_decodes_i16() {
        let bytes = vec![0x01, 0x00, 0xFF, 0xFF];
        let mut src = RawSamples::<_, i16>::new(Cursor::new(bytes));
        let mut dst = [0i16; 2];
        assert_eq!(src.read_samples(&mut dst).unwrap(), 2);
        assert_eq!(dst, [1, -1]);
    }

    #[test]
    fn test_raw_samples_short_read() {
        // a stream can end between calls without error
        let samples = [1.0f32, 2.0, 3.0];
        let mut src = RawSamples::<_, f32>::new(Cursor::new(f32_bytes(&samples)));
        let mut dst = [0.0f32; 8];
        assert_eq!(src.read_samples(&mut dst).unwrap(), 3);
        assert_eq!(&dst[..3], &samples);
    }

    #[test]
    fn test_raw_samples_partial_sample_is_eof() {
        let mut bytes = f32_bytes(&[1.0]);
        bytes.extend_from_slice(&[0x12, 0x34]); // half a sample
        let mut src = RawSamples::<_, f32>::new(Cursor::new(bytes));
        let mut dst = [0.0f32; 4];
        let err = src.read_samples(&mut dst).unwrap_err();
        assert!(matches!(err, FeatError::UnexpectedEof(_)), "{err:?}");
    }

    #[test]
    fn test_raw_frames_reads_whole_frames() {
        let frame_a = [1.0f32, 2.0, 3.0, 4.0];
        let frame_b = [5.0f32, 6.0, 7.0, 8.0];
        let mut bytes = f32_bytes(&frame_a);
        bytes.extend_from_slice(&f32_bytes(&frame_b));

        let mut src = RawFrames::new(Cursor::new(bytes), 4);
        assert_eq!(src.frame_len(), 4);

        let mut dst = [0.0f32; 4];
        assert!(src.read_frame(&mut dst).unwrap());
        assert_eq!(dst, frame_a);
        assert!(src.read_frame(&mut dst).unwrap());
        assert_eq!(dst, frame_b);
        assert!(!src.read_frame(&mut dst).unwrap());
    }

    #[test]
    fn test_raw_frames_partial_frame_is_eof() {
        let bytes = f32_bytes(&[1.0, 2.0]); // half of a 4-sample frame
        let mut src = RawFrames::new(Cursor::new(bytes), 4);
        let mut dst = [0.0f32; 4];
        let err = src.read_frame(&mut dst).unwrap_err();
        assert!(matches!(err, FeatError::UnexpectedEof(_)), "{err:?}");
    }

    #[test]
    fn test_raw_frames_wrong_dst_len() {
        let mut src = RawFrames::new(Cursor::new(Vec::new()), 4);
        let mut dst = [0.0f32; 3];
        let err = src.read_frame(&mut dst).unwrap_err();
        assert!(matches!(err, FeatError::IncorrectFrameSize { .. }), "{err:?}");
    }
}
