use crate::{Error, Result};
use goblin::elf::program_header::*;

/// Returns a contiguous bin, starting at the flash base, from the loadable
/// segments of an elf. Gaps between segments are filled with zeros.
///
/// Segments may be linked either at `flash_base` or at the 0x0 alias of
/// flash; anything else is rejected.
pub fn elf_to_bin(buffer: &[u8], flash_base: u32, flash_size: usize) -> Result<Vec<u8>> {
    let binary = goblin::elf::Elf::parse(buffer).map_err(|e| Error::Elf(e.to_string()))?;

    let mut segments = vec![];
    for ph in binary
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD && ph.p_filesz > 0)
    {
        log::debug!("{:?}", ph);

        let data = buffer
            .get(ph.p_offset as usize..)
            .and_then(|rest| rest.get(..ph.p_filesz as usize))
            .ok_or_else(|| Error::Elf("segment outside of file".into()))?;

        segments.push((ph.p_paddr, data));
    }

    flatten(&segments, flash_base, flash_size)
}

/// Lays out `(load address, data)` segments relative to flash.
fn flatten(segments: &[(u64, &[u8])], flash_base: u32, flash_size: usize) -> Result<Vec<u8>> {
    let mut placed = vec![];

    for (address, data) in segments {
        let offset = if *address >= u64::from(flash_base) {
            address - u64::from(flash_base)
        } else {
            *address
        };

        if offset + data.len() as u64 > flash_size as u64 {
            return Err(Error::Elf(format!(
                "segment at {:#010x} is not in flash",
                address
            )));
        }
        placed.push((offset as usize, *data));
    }

    placed.sort_by_key(|(offset, _)| *offset);

    let mut bin = vec![];
    for (offset, data) in placed {
        if offset < bin.len() {
            return Err(Error::Elf(format!(
                "overlapping segments at flash offset {:#x}",
                offset
            )));
        }
        bin.resize(offset, 0x0);
        bin.extend_from_slice(data);
    }

    Ok(bin)
}

/// Opens the first HID device matching the configured vendor and product id.
#[cfg(feature = "hidapi")]
pub fn open_device(
    api: &hidapi::HidApi,
    config: &crate::TargetConfig,
) -> Result<hidapi::HidDevice> {
    let (vid, pid) = (config.vendor_id, config.product_id);

    let info = api
        .device_list()
        .find(|info| info.vendor_id() == vid && info.product_id() == pid)
        .ok_or(Error::NotFound { vid, pid })?;

    info.open_device(api).map_err(|e| {
        log::error!("device.open() failed: {}", e);
        Error::DeviceOpenFailure(e.to_string())
    })
}
