mod error;
mod reader;

pub mod common;
pub mod config;
pub mod device;
pub mod l1;
pub mod l2;
pub mod l3;
pub mod vfs0097;

pub use config::{DriverConfig, DriverConfigBuilder};
pub use device::{FpDevice, Print};
pub use vfs0097::{CancelHandle, Error, InitState, Vfs0097};
