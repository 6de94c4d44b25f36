//! Message-bus domain logic: inbound command decoding and session upkeep.
//!
//! The MQTT client itself lives in [`crate::adapters::mqtt`].

pub mod broker;
pub mod dispatch;
