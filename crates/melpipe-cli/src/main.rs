//! melpipe: streaming audio feature-extraction tools.
//!
//! Four subcommands, each a thin adapter from stdin to stdout around one
//! pipeline stage:
//!
//! - `wav2raw`: WAVE bytes -> raw little-endian samples
//! - `frame`:   raw float32 samples -> concatenated overlapping frames
//! - `fftr`:    one float32 frame -> real then imaginary spectrum halves
//! - `mfcc`:    WAVE bytes or float32 frames -> feature vectors
//!
//! Every tool exits 0 on a clean end of stream and non-zero with a message
//! on stderr otherwise.

use std::io::{self, BufWriter, Read, Write};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use melpipe_core::{
    FrameConfig, FrameMaker, FrameRead, MelConfig, MfccExtractor, OutputKind, RawFrames,
    RawSamples, RealFft, Sample, WavReader, WindowKind,
};

/// Streaming audio feature extraction over stdin/stdout.
#[derive(Parser)]
#[command(name = "melpipe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a WAVE byte stream to raw little-endian samples
    Wav2raw {
        /// Output sample encoding
        #[arg(long, value_enum, default_value_t = SampleFormat::F32)]
        format: SampleFormat,
    },
    /// Cut a raw float32 sample stream into overlapping frames
    Frame {
        /// Samples per frame
        #[arg(long, default_value_t = 256)]
        length: usize,
        /// Samples to advance between frames
        #[arg(long, default_value_t = 100)]
        shift: usize,
    },
    /// Transform one float32 frame; emits the real then imaginary halves
    Fftr {
        /// Frame length (a power of two)
        #[arg(long, default_value_t = 256)]
        length: usize,
    },
    /// Extract MFCC or Mel-filterbank features
    Mfcc(MfccArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SampleFormat {
    F32,
    I16,
}

#[derive(Args)]
struct MfccArgs {
    /// Samples per analysis frame
    #[arg(long, default_value_t = 256)]
    length: usize,
    /// Samples to advance between frames (WAVE input only)
    #[arg(long, default_value_t = 100)]
    shift: usize,
    /// Input sample rate in Hz
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,
    /// Number of Mel filterbank channels
    #[arg(long, default_value_t = 20)]
    num_bins: usize,
    /// Number of cepstral coefficients
    #[arg(long, default_value_t = 12)]
    order: usize,
    /// Gaussian dither standard deviation, 0 to disable
    #[arg(long, default_value_t = 1.0)]
    dither: f32,
    /// Pre-emphasis coefficient, 0 to disable
    #[arg(long, default_value_t = 0.97)]
    preemph: f32,
    /// Cepstral liftering coefficient, 0 to disable
    #[arg(long, default_value_t = 22.0)]
    lifter: f32,
    /// Blackman window coefficient
    #[arg(long, default_value_t = 0.42)]
    blackman_coeff: f32,
    /// Lower clamp for Mel channels before the log
    #[arg(long, default_value_t = 1.0)]
    filterbank_floor: f32,
    /// Analysis window: hanning, hamming, rectangular, blackman, povey
    #[arg(long, default_value = "povey")]
    window: String,
    /// Emit log Mel-filterbank energies instead of cepstra
    #[arg(long)]
    mel_energy: bool,
    /// Keep the DC offset (skip mean removal)
    #[arg(long)]
    keep_dc: bool,
    /// Drop the trailing log-energy value
    #[arg(long)]
    no_energy: bool,
    /// Drop the trailing C0 value (emitted by default)
    #[arg(long)]
    no_c0: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());

    match cli.command {
        Commands::Wav2raw { format } => match format {
            SampleFormat::F32 => wav2raw::<f32>(stdin, stdout),
            SampleFormat::I16 => wav2raw::<i16>(stdin, stdout),
        },
        Commands::Frame { length, shift } => frame(stdin, stdout, length, shift),
        Commands::Fftr { length } => fftr(stdin, stdout, length),
        Commands::Mfcc(args) => mfcc(stdin, stdout, &args),
    }
}

fn wav2raw<T: Sample>(reader: impl Read, mut out: impl Write) -> Result<()> {
    let mut wav = WavReader::<_, T>::new(reader);
    let mut samples = vec![T::default(); 4096];
    let mut bytes = vec![0u8; 4096 * T::BYTES];
    loop {
        let n = wav.read_samples(&mut samples).context("decoding WAVE input")?;
        if n == 0 {
            break;
        }
        for (i, s) in samples[..n].iter().enumerate() {
            s.to_le(&mut bytes[i * T::BYTES..(i + 1) * T::BYTES]);
        }
        out.write_all(&bytes[..n * T::BYTES])?;
    }
    out.flush()?;
    Ok(())
}

fn frame(reader: impl Read, mut out: impl Write, length: usize, shift: usize) -> Result<()> {
    let source = RawSamples::<_, f32>::new(reader);
    let mut maker = FrameMaker::new(source, FrameConfig { length, shift })
        .context("invalid framing parameters")?;
    let mut buf = vec![0u8; length * f32::BYTES];
    loop {
        let n = maker.read(&mut buf).context("framing input stream")?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    out.flush()?;
    Ok(())
}

fn fftr(mut reader: impl Read, mut out: impl Write, length: usize) -> Result<()> {
    let mut bytes = vec![0u8; length * f32::BYTES];
    reader
        .read_exact(&mut bytes)
        .context("reading one input frame")?;

    let mut real: Vec<f32> = bytes
        .chunks_exact(f32::BYTES)
        .map(f32::from_le)
        .collect();
    let mut imag = vec![0.0f32; length];

    let fft = RealFft::new(length).context("invalid frame length")?;
    fft.fftr(&mut real, &mut imag).context("transforming frame")?;

    for v in real.iter().chain(imag.iter()) {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()?;
    Ok(())
}

fn mfcc(mut reader: impl Read, out: impl Write, args: &MfccArgs) -> Result<()> {
    let cfg = MelConfig {
        frame_length: args.length,
        sample_rate: args.sample_rate,
        remove_dc_offset: !args.keep_dc,
        dither: args.dither,
        preemph_coeff: args.preemph,
        lifter_coeff: args.lifter,
        blackman_coeff: args.blackman_coeff,
        window: args
            .window
            .parse::<WindowKind>()
            .map_err(|e| anyhow!(e))?,
        filterbank_floor: args.filterbank_floor,
        num_bins: args.num_bins,
        mfcc_order: args.order,
        output: if args.mel_energy {
            OutputKind::MelEnergy
        } else {
            OutputKind::Mfcc
        },
        output_energy: !args.no_energy,
        output_c0: !args.no_c0,
    };
    debug!(?cfg, "feature configuration");

    // sniff the stream: WAVE input starts with the RIFF magic, anything
    // else is treated as pre-cut float32 frames
    let mut magic = [0u8; 4];
    let mut got = 0;
    while got < magic.len() {
        let n = reader.read(&mut magic[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    let head = io::Cursor::new(magic[..got].to_vec());
    let chained = head.chain(reader);

    if got < 4 || &magic == b"RIFF" {
        let wav = WavReader::<_, f32>::new(chained);
        let frames = FrameMaker::new(
            wav,
            FrameConfig {
                length: args.length,
                shift: args.shift,
            },
        )
        .context("invalid framing parameters")?;
        emit_features(frames, cfg, out)
    } else {
        let frames = RawFrames::new(chained, args.length);
        emit_features(frames, cfg, out)
    }
}

fn emit_features<S: FrameRead<f32>>(source: S, cfg: MelConfig, mut out: impl Write) -> Result<()> {
    let mut extractor =
        MfccExtractor::new(source, cfg).context("invalid feature parameters")?;
    let mut buf = vec![0u8; extractor.feat_len() * f32::BYTES];
    loop {
        let n = extractor.read(&mut buf).context("extracting features")?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    out.flush()?;
    Ok(())
}
