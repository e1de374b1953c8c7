//! Sans-I/O MQTT 3.1.1 / 5.0 client protocol engine: state machine, wire
//! codec, and validators, with no internal timers, threads, or I/O of its
//! own. A transport adapter owns the socket and drives the engine through
//! its four entry points.

pub mod codec;
pub mod contract;
pub mod engine;
pub mod error;
pub mod heap;
pub mod operation;
pub mod packet;
pub mod packet_id;
pub mod settings;
pub mod types;
pub mod validate;
pub mod vli;

pub use error::{Error, ErrorKind, ValidationError};
pub use types::{Pid, QoS, TopicFilter, TopicName, Version};
