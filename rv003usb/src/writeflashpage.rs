use crate::command::{communicate, Payload};
use crate::readwords::check_aligned;
use crate::{Error, FeatureReport, Result, TargetConfig, SECTOR_SIZE};

/// Fills the flash page buffer from the data area, starts programming and
/// waits on STATR. The flash controller must already be in page program mode.
pub(crate) const WRITE64_FLASH: [u8; 48] = [
    0x13, 0x07, 0x45, 0x03, 0x0c, 0x43, 0x13, 0x86, 0x05, 0x04, 0x5c, 0x43, //
    0x8c, 0xc7, 0x14, 0x47, 0x94, 0xc1, 0xb7, 0x06, 0x05, 0x00, 0xd4, 0xc3, //
    0x94, 0x41, 0x91, 0x05, 0x11, 0x07, 0xe3, 0xc8, 0xc5, 0xfe, 0xc1, 0x66, //
    0x93, 0x86, 0x06, 0x04, 0xd4, 0xc3, 0xfd, 0x56, 0x14, 0xc1, 0x82, 0x80, //
];

/// Parameters are the page address, the STATR address and one sector of data.
pub fn write_flash_page_payload(address: u32, statr: u32, data: &[u8]) -> Result<Payload> {
    if data.len() != SECTOR_SIZE {
        return Err(Error::SectorLength { len: data.len() });
    }
    check_aligned(address, data.len() as u32)?;
    Payload::routine(&WRITE64_FLASH, &[address, statr], data)
}

/// Programs one already erased sector. Unlike [`write_word`](crate::write_word)
/// nothing is read back here; the caller verifies.
pub fn write_flash_page<D: FeatureReport + ?Sized>(
    d: &D,
    config: &TargetConfig,
    address: u32,
    data: &[u8],
) -> Result<()> {
    let payload = write_flash_page_payload(address, config.registers.statr, data)?;
    communicate(d, &payload, &config.limits).map(|_| ())
}
