use core::str::FromStr;

/// Flash programming granularity of the bootloader protocol.
pub const SECTOR_SIZE: usize = 64;

/// pid.codes vendor id used by rv003usb.
pub const USB_VID: u16 = 0x1209;
/// rv003usb bootloader product id.
pub const USB_PID: u16 = 0xb003;

/// Memory mapped registers of the flash controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashRegisters {
    pub keyr: u32,
    pub obkeyr: u32,
    pub statr: u32,
    pub ctlr: u32,
    pub addr: u32,
    pub obr: u32,
    pub modekeyr: u32,
}

impl FlashRegisters {
    /// Register block shared by the CH32V00x family.
    pub const CH32V00X: FlashRegisters = FlashRegisters {
        keyr: 0x4002_2004,
        obkeyr: 0x4002_2008,
        statr: 0x4002_200c,
        ctlr: 0x4002_2010,
        addr: 0x4002_2014,
        obr: 0x4002_201c,
        modekeyr: 0x4002_2024,
    };
}

/// Attempt bounds for every retried step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryLimits {
    /// Extra attempts after a failed feature report send.
    pub send_retries: usize,
    /// Extra attempts after a failed feature report read.
    pub receive_retries: usize,
    /// Feature report reads before giving up on an acknowledgement.
    pub receive_polls: usize,
    /// STATR reads while waiting for a page erase.
    pub erase_polls: usize,
    /// Full verify and program sweeps over the image.
    pub image_passes: usize,
}

impl Default for RetryLimits {
    fn default() -> Self {
        RetryLimits {
            send_retries: 10,
            receive_retries: 10,
            receive_polls: 20,
            erase_polls: 1000,
            image_passes: 5,
        }
    }
}

/// Everything the programmer needs to know about one target variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub flash_base: u32,
    /// Flash capacity in bytes.
    pub flash_size: usize,
    pub registers: FlashRegisters,
    pub limits: RetryLimits,
}

impl TargetConfig {
    pub fn ch32v003() -> Self {
        TargetConfig {
            vendor_id: USB_VID,
            product_id: USB_PID,
            flash_base: 0x0800_0000,
            flash_size: 16 * 1024,
            registers: FlashRegisters::CH32V00X,
            limits: RetryLimits::default(),
        }
    }

    /// CH32V006, same core and flash controller with 62 KiB of flash.
    pub fn ch32v006() -> Self {
        TargetConfig {
            flash_size: 62 * 1024,
            ..TargetConfig::ch32v003()
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::ch32v003()
    }
}

/// Supported target presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Ch32v003,
    Ch32v006,
}

impl Variant {
    pub fn config(self) -> TargetConfig {
        match self {
            Variant::Ch32v003 => TargetConfig::ch32v003(),
            Variant::Ch32v006 => TargetConfig::ch32v006(),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v003" | "ch32v003" => Ok(Variant::Ch32v003),
            "v006" | "ch32v006" => Ok(Variant::Ch32v006),
            _ => Err(format!("unknown variant {:?}, expected v003 or v006", s)),
        }
    }
}
