#![deny(unsafe_op_in_unsafe_fn)]

pub mod biquad;
pub mod delay;
pub mod envelope;
pub mod gain;
pub mod pan;

pub use biquad::Biquad;
pub use delay::DelayLine;
pub use envelope::EnvelopeFollower;
