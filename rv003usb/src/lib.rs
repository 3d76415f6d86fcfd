//! Host side programmer for CH32V003 parts running the rv003usb bootloader.
//!
//! The bootloader exposes a single HID feature report. Every command is a
//! small RISC-V routine framed into a 128 byte report, executed by the target
//! and acknowledged by rewriting the report. Flashing is built entirely out of
//! those routines: halt, word reads and writes into the flash controller,
//! 64 byte page writes and a final jump into the application.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use rv003usb::{flash_bin, utils::open_device, Status, TargetConfig};
//!
//! let binary = std::fs::read("firmware.bin")?;
//! let api = hidapi::HidApi::new()?;
//! let config = TargetConfig::ch32v003();
//!
//! flash_bin(&binary, &config, &mut |s: Status| println!("{}", s), |config| {
//!     open_device(&api, config)
//! })?;
//! # Ok(())
//! # }
//! ```

/// Payload framing and the feature report transport.
mod command;
pub use command::*;

/// USB ids, flash geometry, register map and retry limits of a target.
mod config;
pub use config::*;

/// Flash unlock, sector erase and program, and the whole image loop.
mod flash;
pub use flash::*;

/// Stop the target core and park it in the bootloader.
mod haltwait;
pub use haltwait::*;

/// Firmware image staging.
mod image;
pub use image::*;

/// Read words from memory. Address and size must be 4 byte aligned, which also covers reading IO registers.
mod readwords;
pub use readwords::*;

/// Leave the bootloader and start the application. No response arrives for this command.
mod runapp;
pub use runapp::*;

/// Progress checkpoints reported while flashing.
mod status;
pub use status::*;

/// Program one 64 byte flash page from the page buffer.
mod writeflashpage;
pub use writeflashpage::*;

/// Dual of READ WORDS, with the same constraints.
mod writewords;
pub use writewords::*;

/// ELF conversion and device lookup.
pub mod utils;

/// Closure driven device for tests.
pub mod mock;

/// Simulated target that runs the command routines against emulated flash.
#[cfg(test)]
mod sim;

#[cfg(feature = "hidapi")]
mod hidapi_trait;

/// Everything that can stop a flashing run.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Command body does not fit between the framing prefix and suffix.
    #[error("payload body of {len} bytes does not fit a 128 byte command")]
    PayloadOverflow { len: usize },
    #[error("address {address:#010x} or size {size} is not 4 byte aligned")]
    Misaligned { address: u32, size: u32 },
    /// Page writes take exactly one sector.
    #[error("page data of {len} bytes is not one 64 byte sector")]
    SectorLength { len: usize },
    /// Checked before any device I/O.
    #[error("image of {size} bytes exceeds flash capacity of {capacity} bytes")]
    OversizeImage { size: usize, capacity: usize },
    #[error("no HID device {vid:04x}:{pid:04x} found, is the bootloader running?")]
    NotFound { vid: u16, pid: u16 },
    #[error("could not open device: {0}")]
    DeviceOpenFailure(String),
    #[error("target did not acknowledge halt")]
    HaltFailure,
    #[error("flash still locked after writing keys, CTLR = {ctlr:#010x}")]
    UnlockFailure { ctlr: u32 },
    #[error("flash is read protected (OBR = {obr:#010x}), cannot program until unlocked")]
    ReadProtected { obr: u32 },
    #[error("sending feature report failed, retries exceeded")]
    TransportSendFailure,
    #[error("receiving feature report failed, retries exceeded")]
    TransportReceiveFailure,
    #[error("timed out waiting for the target to acknowledge")]
    TransportTimeout,
    #[error("erase of page {address:#010x} timed out, STATR = {statr:#010x}")]
    EraseTimeout { address: u32, statr: u32 },
    #[error("memory protection error erasing page {address:#010x}, STATR = {statr:#010x}")]
    MemoryProtectionError { address: u32, statr: u32 },
    #[error("flash content still differs after {passes} passes")]
    PersistentVerifyMismatch { passes: usize },
    /// Sector address does not fit the 32-bit address space.
    #[error("image offset {offset:#x} past flash base {base:#010x} overflows the address space")]
    AddressOverflow { base: u32, offset: usize },
    #[error("flash content differs at {address:#010x}")]
    VerifyMismatch { address: u32 },
    #[error("failed to start the application")]
    LaunchFailure,
    /// Response too short to hold the requested data.
    #[error("malformed response")]
    Parse,
    /// A single HID transfer failed. Retried by the transport.
    #[error("HID transfer failed: {0}")]
    Transmission(String),
    #[error("unusable ELF file: {0}")]
    Elf(String),
}

impl From<scroll::Error> for Error {
    fn from(_err: scroll::Error) -> Self {
        Error::Parse
    }
}

/// Shorthand for a Result with the crate's own Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait to implement HID devices speaking feature reports.
///
/// Buffers start with the report id on both directions.
pub trait FeatureReport {
    fn send_feature(&self, data: &[u8]) -> Result<()>;
    fn get_feature(&self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: FeatureReport + ?Sized> FeatureReport for &T {
    fn send_feature(&self, data: &[u8]) -> Result<()> {
        (**self).send_feature(data)
    }
    fn get_feature(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).get_feature(buf)
    }
}
