//! Application core: pure domain logic, zero I/O.
//!
//! Mode arbitration, switch/relay policy, status reporting, and bus
//! command handling for the DuoRelay module.  All interaction with hardware
//! and the network happens through **port traits** defined in [`ports`].

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
