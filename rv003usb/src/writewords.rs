use crate::command::{communicate, Payload};
use crate::readwords::check_aligned;
use crate::{FeatureReport, Result, RetryLimits};

/// Copies the data area of the report word by word to `address`. No readback.
pub(crate) const WORD_WRITE: [u8; 48] = [
    0x23, 0xa0, 0x05, 0x00, 0x13, 0x07, 0x45, 0x03, 0x0c, 0x43, 0x50, 0x43, //
    0x2e, 0x96, 0x21, 0x07, 0x14, 0x43, 0x94, 0xc1, 0x91, 0x05, 0x11, 0x07, //
    0xe3, 0xcc, 0xc5, 0xfe, 0x93, 0x06, 0xf0, 0xff, 0x14, 0xc1, 0x82, 0x80, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
];

pub fn write_words_payload(address: u32, data: &[u8]) -> Result<Payload> {
    let size = data.len() as u32;
    check_aligned(address, size)?;
    Payload::routine(&WORD_WRITE, &[address, size], data)
}

/// Writes a single 32-bit register and returns the acknowledgement word.
///
/// The acknowledgement is whatever the target left in the data area, not a
/// readback of the register.
pub fn write_word<D: FeatureReport + ?Sized>(
    d: &D,
    limits: &RetryLimits,
    address: u32,
    value: u32,
) -> Result<u32> {
    log::trace!("write {:#010x} = {:#010x}", address, value);
    let payload = write_words_payload(address, &value.to_le_bytes())?;
    communicate(d, &payload, limits)?.word()
}
