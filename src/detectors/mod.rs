//! Pattern detectors
//!
//! Every detector is a pure function of a candle window and its swing points.
//! Detectors never error on short input; they return no patterns instead.
//!
//! # Pattern Families
//!
//! - **Reversal**: Engulfing, Double Top / Double Bottom
//! - **Harmonic**: AB=CD, Gartley
//! - **Candlestick**: Hammer, Morning Star, Piercing Line, Three White Soldiers
//! - **Chart**: Cup and Handle, Inverse Head and Shoulders, Falling Wedge, Bull Flag,
//!   Ascending Triangle

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod candlestick;
pub mod chart;
pub mod harmonic;
pub mod reversal;

// Re-export all detectors for convenience
pub use candlestick::*;
pub use chart::*;
pub use harmonic::*;
pub use reversal::*;
