//! Streaming WAVE decoder.
//!
//! Parses a RIFF/WAVE byte stream and decodes the data chunk into normalized
//! samples. Five sub-formats are supported: 8/16/24/32-bit PCM, 32-bit IEEE
//! float, and the two G.711 companded encodings (µ-law and A-law). The
//! WAVE_FORMAT_EXTENSIBLE container is unwrapped to its sub-format.
//!
//! The reader is pull-driven and never seeks: chunks ahead of "data" are
//! consumed or skipped in order, so any `Read` source works (a file, a pipe,
//! stdin). The header is parsed lazily on the first call that needs it.
//!
//! Decoding goes through a canonical left-aligned signed 32-bit intermediate
//! (see [`Sample`]), so every sub-format converts to the caller's output
//! type (`i16` or `f32`) with the same two final rules.
//!
//! ## Example
//!
//! ```
//! use melpipe_core::wav_reader::WavReader;
//!
//! # fn wav_fixture() -> Vec<u8> {
//! #     let mut d = Vec::new();
//! #     d.extend_from_slice(b"RIFF\x28\x00\x00\x00WAVE");
//! #     d.extend_from_slice(b"fmt \x10\x00\x00\x00");
//! #     d.extend_from_slice(&1u16.to_le_bytes());
//! #     d.extend_from_slice(&1u16.to_le_bytes());
//! #     d.extend_from_slice(&16000u32.to_le_bytes());
//! #     d.extend_from_slice(&32000u32.to_le_bytes());
//! #     d.extend_from_slice(&2u16.to_le_bytes());
//! #     d.extend_from_slice(&16u16.to_le_bytes());
//! #     d.extend_from_slice(b"data\x04\x00\x00\x00");
//! #     d.extend_from_slice(&1000i16.to_le_bytes());
//! #     d.extend_from_slice(&(-1000i16).to_le_bytes());
//! #     d
//! # }
//! let bytes = wav_fixture();
//! let mut reader = WavReader::<_, f32>::new(std::io::Cursor::new(bytes));
//!
//! let header = reader.header().unwrap();
//! assert_eq!(header.sample_rate, 16000);
//!
//! let mut samples = [0.0f32; 16];
//! let n = reader.read_samples(&mut samples).unwrap();
//! assert_eq!(n, 2);
//! ```

use std::io::Read;
use std::marker::PhantomData;

use tracing::debug;

use crate::g711::{ALAW_TO_LINEAR, ULAW_TO_LINEAR};
use crate::types::{FeatError, FeatResult, Sample, SampleRead};

/// WAVE format codes from the wave-format-ex registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FormatCode {
    Pcm = 0x0001,
    IeeeFloat = 0x0003,
    Alaw = 0x0006,
    Ulaw = 0x0007,
    Extensible = 0xFFFE,
}

impl FormatCode {
    /// Map a raw format code, rejecting unknown values.
    pub fn from_u16(code: u16) -> FeatResult<Self> {
        match code {
            0x0001 => Ok(FormatCode::Pcm),
            0x0003 => Ok(FormatCode::IeeeFloat),
            0x0006 => Ok(FormatCode::Alaw),
            0x0007 => Ok(FormatCode::Ulaw),
            0xFFFE => Ok(FormatCode::Extensible),
            other => Err(FeatError::UnsupportedFormat(other)),
        }
    }
}

/// Sub-format descriptor carried by WAVE_FORMAT_EXTENSIBLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubFormat {
    /// Effective format code (same registry as [`FormatCode`]).
    pub format: u16,
    /// Remaining 14 GUID bytes.
    pub guid: [u8; 14],
}

/// Optional fmt-chunk extension (present when the chunk is 40 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtExtension {
    pub size: u16,
    pub valid_bits: u16,
    pub channel_mask: u32,
    pub sub_format: SubFormat,
}

/// Parsed "fmt " chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavHeader {
    pub format: FormatCode,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extension: Option<FmtExtension>,
}

impl WavHeader {
    /// The format that actually describes the sample encoding. For
    /// `Extensible` headers this is the sub-format code.
    pub fn effective_format(&self) -> u16 {
        match (self.format, self.extension) {
            (FormatCode::Extensible, Some(ext)) => ext.sub_format.format,
            _ => self.format as u16,
        }
    }
}

/// Per-sample decoder resolved from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Pcm8,
    Pcm16,
    Pcm24,
    Pcm32,
    Float32,
    Ulaw,
    Alaw,
}

impl Codec {
    fn resolve(format: u16, bits: u16) -> FeatResult<Self> {
        match (format, bits) {
            (0x0001, 8) => Ok(Codec::Pcm8),
            (0x0001, 16) => Ok(Codec::Pcm16),
            (0x0001, 24) => Ok(Codec::Pcm24),
            (0x0001, 32) => Ok(Codec::Pcm32),
            (0x0003, 32) => Ok(Codec::Float32),
            (0x0006, 8) => Ok(Codec::Alaw),
            (0x0007, 8) => Ok(Codec::Ulaw),
            (0x0001 | 0x0003 | 0x0006 | 0x0007, bits) => {
                Err(FeatError::UnsupportedSampleType { format, bits })
            }
            (other, _) => Err(FeatError::UnsupportedFormat(other)),
        }
    }

    fn bytes(self) -> usize {
        match self {
            Codec::Pcm8 | Codec::Ulaw | Codec::Alaw => 1,
            Codec::Pcm16 => 2,
            Codec::Pcm24 => 3,
            Codec::Pcm32 | Codec::Float32 => 4,
        }
    }

    /// Decode one sample into the canonical left-aligned i32.
    #[inline]
    fn decode(self, b: &[u8]) -> i32 {
        match self {
            // XOR flips the sign bit, centering the unsigned byte at zero
            Codec::Pcm8 => (((b[0] as u32) << 24) ^ 0x8000_0000) as i32,
            Codec::Pcm16 => (i16::from_le_bytes([b[0], b[1]]) as i32) << 16,
            Codec::Pcm24 => {
                let raw = (b[0] as u32) | ((b[1] as u32) << 8) | ((b[2] as u32) << 16);
                (raw << 8) as i32
            }
            Codec::Pcm32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Codec::Float32 => {
                let f = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                // scale by 1 + i32::MAX, round half away from zero, saturate
                let scaled = f as f64 * 2_147_483_648.0;
                let rounded = if scaled < 0.0 { scaled - 0.5 } else { scaled + 0.5 };
                rounded.clamp(i32::MIN as f64, i32::MAX as f64) as i32
            }
            Codec::Ulaw => (ULAW_TO_LINEAR[b[0] as usize] as i32) << 16,
            Codec::Alaw => (ALAW_TO_LINEAR[b[0] as usize] as i32) << 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Fresh,
    HeaderOk,
    Draining,
    Eof,
    Bad,
}

/// Streaming WAVE reader producing samples of type `T`.
#[derive(Debug)]
pub struct WavReader<R: Read, T: Sample> {
    reader: R,
    state: ReaderState,
    header: Option<WavHeader>,
    codec: Option<Codec>,
    /// Bytes of the data chunk not yet consumed.
    data_remaining: u64,
    scratch: Vec<u8>,
    _sample: PhantomData<T>,
}

impl<R: Read, T: Sample> WavReader<R, T> {
    pub fn new(reader: R) -> Self {
        WavReader {
            reader,
            state: ReaderState::Fresh,
            header: None,
            codec: None,
            data_remaining: 0,
            scratch: Vec::new(),
            _sample: PhantomData,
        }
    }

    /// Force the header parse and return a copy of the parsed header.
    pub fn header(&mut self) -> FeatResult<WavHeader> {
        self.ensure_header()?;
        match self.header {
            Some(h) => Ok(h),
            None => Err(FeatError::BadState),
        }
    }

    /// Sample rate in Hz. Available once the header is parsed.
    pub fn sample_rate(&self) -> Option<u32> {
        self.header.map(|h| h.sample_rate)
    }

    /// Number of interleaved channels. Available once the header is parsed.
    pub fn channels(&self) -> Option<u16> {
        self.header.map(|h| h.channels)
    }

    /// Bits per encoded sample. Available once the header is parsed.
    pub fn bits_per_sample(&self) -> Option<u16> {
        self.header.map(|h| h.bits_per_sample)
    }

    /// Fill `dst` with decoded samples.
    ///
    /// Parses the header on the first call. Returns the number of samples
    /// written; 0 only on a clean end of the data chunk.
    pub fn read_samples(&mut self, dst: &mut [T]) -> FeatResult<usize> {
        self.ensure_header()?;
        if self.state == ReaderState::Eof || dst.is_empty() {
            return Ok(0);
        }

        let codec = match self.codec {
            Some(c) => c,
            None => return Err(self.fail(FeatError::BadState)),
        };
        let bps = codec.bytes() as u64;

        if self.data_remaining == 0 {
            self.state = ReaderState::Eof;
            return Ok(0);
        }
        // the data chunk must hold a whole number of samples
        if self.data_remaining < bps {
            return Err(self.fail(FeatError::UnexpectedEof("sample data")));
        }

        let max_samples = (self.data_remaining / bps).min(dst.len() as u64) as usize;
        let want = max_samples * codec.bytes();
        if self.scratch.len() < want {
            self.scratch.resize(want, 0);
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.read_exact_or(&mut scratch[..want], "sample data");
        if let Err(e) = result {
            self.scratch = scratch;
            return Err(self.fail(e));
        }
        for (out, raw) in dst[..max_samples]
            .iter_mut()
            .zip(scratch[..want].chunks_exact(codec.bytes()))
        {
            *out = T::from_canonical(codec.decode(raw));
        }
        self.scratch = scratch;

        self.data_remaining -= want as u64;
        self.state = if self.data_remaining == 0 {
            ReaderState::Eof
        } else {
            ReaderState::Draining
        };
        Ok(max_samples)
    }

    fn ensure_header(&mut self) -> FeatResult<()> {
        match self.state {
            ReaderState::Bad => Err(FeatError::BadState),
            ReaderState::Fresh => {
                match self.parse_header() {
                    Ok((header, codec, data_size)) => {
                        self.header = Some(header);
                        self.codec = Some(codec);
                        self.data_remaining = data_size;
                        self.state = ReaderState::HeaderOk;
                        Ok(())
                    }
                    Err(e) => Err(self.fail(e)),
                }
            }
            _ => Ok(()),
        }
    }

    fn parse_header(&mut self) -> FeatResult<(WavHeader, Codec, u64)> {
        let mut riff = [0u8; 8];
        self.read_exact_or(&mut riff, "RIFF header")?;
        if &riff[..4] != b"RIFF" {
            return Err(FeatError::BadHeader("missing RIFF tag"));
        }
        let mut wave = [0u8; 4];
        self.read_exact_or(&mut wave, "WAVE tag")?;
        if &wave != b"WAVE" {
            return Err(FeatError::BadHeader("missing WAVE tag"));
        }

        let mut parsed: Option<(WavHeader, Codec)> = None;
        loop {
            let mut chunk = [0u8; 8];
            self.read_exact_or(&mut chunk, "chunk header")?;
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as usize;

            match &chunk[..4] {
                b"fmt " => {
                    if !(16..=40).contains(&size) {
                        return Err(FeatError::BadHeader("fmt chunk size out of range"));
                    }
                    let mut raw = [0u8; 40];
                    self.read_exact_or(&mut raw[..size], "fmt chunk")?;
                    parsed = Some(Self::unmarshal_fmt(&raw, size)?);
                }
                b"data" => {
                    let (header, codec) = match parsed {
                        Some(p) => p,
                        None => return Err(FeatError::BadHeader("data chunk before fmt")),
                    };
                    debug!(
                        format_code = header.effective_format(),
                        channels = header.channels,
                        sample_rate = header.sample_rate,
                        bits = header.bits_per_sample,
                        data_bytes = size,
                        "wave header parsed"
                    );
                    return Ok((header, codec, size as u64));
                }
                _ => self.skip(size)?,
            }
        }
    }

    fn unmarshal_fmt(raw: &[u8; 40], size: usize) -> FeatResult<(WavHeader, Codec)> {
        let format_code = u16::from_le_bytes([raw[0], raw[1]]);
        let format = FormatCode::from_u16(format_code)?;

        let extension = if format == FormatCode::Extensible {
            if size < 40 {
                return Err(FeatError::BadHeader("extensible fmt chunk too short"));
            }
            let mut guid = [0u8; 14];
            guid.copy_from_slice(&raw[26..40]);
            Some(FmtExtension {
                size: u16::from_le_bytes([raw[16], raw[17]]),
                valid_bits: u16::from_le_bytes([raw[18], raw[19]]),
                channel_mask: u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]),
                sub_format: SubFormat {
                    format: u16::from_le_bytes([raw[24], raw[25]]),
                    guid,
                },
            })
        } else {
            None
        };

        let header = WavHeader {
            format,
            channels: u16::from_le_bytes([raw[2], raw[3]]),
            sample_rate: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            byte_rate: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            block_align: u16::from_le_bytes([raw[12], raw[13]]),
            bits_per_sample: u16::from_le_bytes([raw[14], raw[15]]),
            extension,
        };
        let codec = Codec::resolve(header.effective_format(), header.bits_per_sample)?;
        Ok((header, codec))
    }

    /// Skip exactly `count` bytes of an unknown chunk.
    fn skip(&mut self, mut count: usize) -> FeatResult<()> {
        let mut junk = [0u8; 512];
        while count > 0 {
            let step = count.min(junk.len());
            self.read_exact_or(&mut junk[..step], "chunk body")?;
            count -= step;
        }
        Ok(())
    }

    fn read_exact_or(&mut self, buf: &mut [u8], what: &'static str) -> FeatResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(FeatError::UnexpectedEof(what));
            }
            filled += n;
        }
        Ok(())
    }

    fn fail(&mut self, e: FeatError) -> FeatError {
        self.state = ReaderState::Bad;
        e
    }
}

impl<R: Read, T: Sample> SampleRead<T> for WavReader<R, T> {
    fn read_samples(&mut self, dst: &mut [T]) -> FeatResult<usize> {
        WavReader::read_samples(self, dst)
    }
}
