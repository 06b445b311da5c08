//! Integration test crate for chime.
//!
//! This crate exists solely to hold cross-crate integration tests that drive
//! the engine through `AudioManager`.

#[cfg(test)]
mod support;

#[cfg(test)]
mod playback;

#[cfg(test)]
mod handles;

#[cfg(test)]
mod threads;
