// Text normalisation, canonical concept keys and language detection.
// Everything here is pure and synchronous.

pub mod canonical;
pub mod language;
pub mod normalize;
