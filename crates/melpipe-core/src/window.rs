//! Analysis window functions.
//!
//! All windows are evaluated over `i` in `0..length` with the angular step
//! `a = 2*pi/(length - 1)`, so the first and last samples sit on the window
//! edges. The Povey window is the Hanning window raised to 0.85, which keeps
//! the taper but lifts the edge attenuation.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Window function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hanning,
    Hamming,
    Rectangular,
    Blackman,
    Povey,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindowKind::Hanning => "hanning",
            WindowKind::Hamming => "hamming",
            WindowKind::Rectangular => "rectangular",
            WindowKind::Blackman => "blackman",
            WindowKind::Povey => "povey",
        };
        f.write_str(name)
    }
}

impl FromStr for WindowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hanning" | "hann" => Ok(WindowKind::Hanning),
            "hamming" => Ok(WindowKind::Hamming),
            "rectangular" | "rect" | "none" => Ok(WindowKind::Rectangular),
            "blackman" => Ok(WindowKind::Blackman),
            "povey" => Ok(WindowKind::Povey),
            other => Err(format!("unknown window function: {}", other)),
        }
    }
}

/// Evaluate a window of `length` samples.
///
/// `blackman_coeff` is only read by the Blackman window.
pub fn build_window(kind: WindowKind, length: usize, blackman_coeff: f32) -> Vec<f32> {
    if length == 1 {
        return vec![1.0];
    }
    let a = 2.0 * PI / (length - 1) as f64;
    let b = blackman_coeff as f64;
    (0..length)
        .map(|i| {
            let x = a * i as f64;
            let w = match kind {
                WindowKind::Hanning => 0.5 - 0.5 * x.cos(),
                WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                WindowKind::Rectangular => 1.0,
                WindowKind::Blackman => b - 0.5 * x.cos() + (0.5 - b) * (2.0 * x).cos(),
                WindowKind::Povey => (0.5 - 0.5 * x.cos()).powf(0.85),
            };
            w as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_hanning_endpoints_and_peak() {
        let w = build_window(WindowKind::Hanning, 255, 0.42);
        assert!(w[0].abs() < EPSILON);
        assert!(w[254].abs() < EPSILON);
        assert!((w[127] - 1.0).abs() < EPSILON, "peak {}", w[127]);
    }

    #[test]
    fn test_hamming_endpoints() {
        let w = build_window(WindowKind::Hamming, 256, 0.42);
        assert!((w[0] - 0.08).abs() < EPSILON);
        assert!((w[255] - 0.08).abs() < EPSILON);
    }

    #[test]
    fn test_rectangular_is_flat() {
        let w = build_window(WindowKind::Rectangular, 64, 0.42);
        assert!(w.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_blackman_endpoints_near_zero() {
        // b - 0.5 + (0.5 - b) cancels exactly at the edges
        let w = build_window(WindowKind::Blackman, 256, 0.42);
        assert!(w[0].abs() < 1e-5, "w[0]={}", w[0]);
        assert!(w[255].abs() < 1e-5, "w[255]={}", w[255]);
    }

    #[test]
    fn test_povey_is_hanning_to_the_085() {
        let hann = build_window(WindowKind::Hanning, 128, 0.42);
        let povey = build_window(WindowKind::Povey, 128, 0.42);
        for (h, p) in hann.iter().zip(povey.iter()) {
            assert!((h.powf(0.85) - p).abs() < 1e-5);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("povey".parse::<WindowKind>().unwrap(), WindowKind::Povey);
        assert_eq!("Hamming".parse::<WindowKind>().unwrap(), WindowKind::Hamming);
        assert_eq!("hann".parse::<WindowKind>().unwrap(), WindowKind::Hanning);
        assert!("triangle".parse::<WindowKind>().is_err());
    }
}
