use crate::command::{communicate, Payload};
use crate::{Error, FeatureReport, Result, RetryLimits};

/// Copies `size` bytes at `address` word by word into the data area of the report.
pub(crate) const WORD_READ: [u8; 48] = [
    0x23, 0xa0, 0x05, 0x00, 0x13, 0x07, 0x45, 0x03, 0x0c, 0x43, 0x50, 0x43, //
    0x2e, 0x96, 0x21, 0x07, 0x94, 0x41, 0x14, 0xc3, 0x91, 0x05, 0x11, 0x07, //
    0xe3, 0xcc, 0xc5, 0xfe, 0x93, 0x06, 0xf0, 0xff, 0x14, 0xc1, 0x82, 0x80, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
];

pub(crate) fn check_aligned(address: u32, size: u32) -> Result<()> {
    if address % 4 != 0 || size % 4 != 0 {
        return Err(Error::Misaligned { address, size });
    }
    Ok(())
}

pub fn read_words_payload(address: u32, size: u32) -> Result<Payload> {
    check_aligned(address, size)?;
    Payload::routine(&WORD_READ, &[address, size], &[])
}

/// Reads `size` bytes from memory. At most 64 bytes come back in one report.
pub fn read_words<D: FeatureReport + ?Sized>(
    d: &D,
    limits: &RetryLimits,
    address: u32,
    size: u32,
) -> Result<Vec<u8>> {
    let response = communicate(d, &read_words_payload(address, size)?, limits)?;
    Ok(response.data(size as usize)?.to_vec())
}

/// Reads a single 32-bit register.
pub fn read_word<D: FeatureReport + ?Sized>(
    d: &D,
    limits: &RetryLimits,
    address: u32,
) -> Result<u32> {
    let response = communicate(d, &read_words_payload(address, 4)?, limits)?;
    let word = response.word()?;
    log::trace!("read {:#010x} = {:#010x}", address, word);
    Ok(word)
}

/// Compares the memory at `address` with `expected`, byte for byte.
///
/// Ok(false) on the first difference, an error only if the read itself fails.
pub fn verify_sector<D: FeatureReport + ?Sized>(
    d: &D,
    limits: &RetryLimits,
    address: u32,
    expected: &[u8],
) -> Result<bool> {
    let actual = read_words(d, limits, address, expected.len() as u32)?;

    match actual.iter().zip(expected).position(|(a, e)| a != e) {
        Some(index) => {
            log::debug!(
                "{:#010x} differs: {:#04x} != {:#04x} expected",
                address + index as u32,
                actual[index],
                expected[index]
            );
            Ok(false)
        }
        None => Ok(true),
    }
}
