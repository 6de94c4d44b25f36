//! Unified error type for the DuoRelay firmware.
//!
//! Every port-level error converts into [`Error`], so setup code in `main`
//! and the adapters can use a single `?` chain.  All variants are `Copy`.

use core::fmt;

use crate::app::ports::{BusError, ConfigError, ConnectivityError, StorageError, UpdateError};

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Config(ConfigError),
    Storage(StorageError),
    Bus(BusError),
    Connectivity(ConnectivityError),
    Update(UpdateError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

impl From<UpdateError> for Error {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
