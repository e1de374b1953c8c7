//! The wire codec (spec.md §4.C): restartable encoder, chunk-tolerant
//! decoder, and the MQTT 5 property block (de)serialization they share.

pub mod decoder;
pub mod encoder;
pub mod properties_codec;

#[cfg(test)]
mod tests;

pub use decoder::Decoder;
pub use encoder::{EncodeStatus, Encoder};
