// Spectral and temporal building blocks for per-hop analysis
//
// Module organization:
// - fft: Hann-windowed FFT with a pre-planned transform
// - spectral: centroid, 85% rolloff, H1–H2 harmonic ratio
// - temporal: RMS and DC removal
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

mod fft;
mod spectral;
mod temporal;

pub use fft::{hann_window, FftProcessor};
pub use spectral::SpectralFeatures;
pub use temporal::{compute_rms, remove_dc};
