use crate::{
    halt_wait, read_word, run_app, verify_sector, write_flash_page, write_word, Error,
    FeatureReport, FlashImage, Result, Status, StatusObserver, Step, TargetConfig,
};
use std::convert::TryFrom;

/// CTLR lock bits: LOCK and FLOCK (fast programming lock).
pub const CTLR_LOCK: u32 = 0x0000_8080;
/// CTLR fast page erase.
pub const CTLR_PAGE_ER: u32 = 0x0002_0000;
/// CTLR start erase.
pub const CTLR_STRT: u32 = 0x0000_0040;
/// CTLR fast page programming.
pub const CTLR_PAGE_PG: u32 = 0x0001_0000;
/// CTLR page buffer reset.
pub const CTLR_BUF_RST: u32 = 0x0008_0000;

/// STATR busy and write busy.
pub const STATR_BUSY: u32 = 0x0000_0003;
/// STATR write protection error.
pub const STATR_WRPRTERR: u32 = 0x0000_0010;

/// OBR read protection active.
pub const OBR_RDPRT: u32 = 0x0000_0002;

/// Written in order to KEYR, OBKEYR and MODEKEYR to lift the locks.
pub const FLASH_KEYS: [u32; 2] = [0x4567_0123, 0xcdef_89ab];

/// Unlocks the flash controller if needed and makes sure the part is not
/// read protected.
pub fn unlock<D: FeatureReport + ?Sized>(d: &D, config: &TargetConfig) -> Result<()> {
    let regs = &config.registers;
    let limits = &config.limits;

    let ctlr = read_word(d, limits, regs.ctlr)?;
    if ctlr & CTLR_LOCK != 0 {
        log::debug!("flash locked, CTLR = {:#010x}", ctlr);

        for register in &[regs.keyr, regs.obkeyr, regs.modekeyr] {
            for key in &FLASH_KEYS {
                write_word(d, limits, *register, *key)?;
            }
        }

        let ctlr = read_word(d, limits, regs.ctlr)?;
        if ctlr & CTLR_LOCK != 0 {
            log::error!("Flash unlock failure {:#010x}", ctlr);
            return Err(Error::UnlockFailure { ctlr });
        }
    }

    let obr = read_word(d, limits, regs.obr)?;
    if obr & OBR_RDPRT != 0 {
        log::error!("part appears to have flash [read] locked, cannot program unless unlocked");
        return Err(Error::ReadProtected { obr });
    }

    Ok(())
}

/// Erases the sector at `address` and waits for the controller to finish.
pub fn erase_sector<D: FeatureReport + ?Sized>(
    d: &D,
    config: &TargetConfig,
    address: u32,
) -> Result<()> {
    let regs = &config.registers;
    let limits = &config.limits;

    write_word(d, limits, regs.ctlr, CTLR_PAGE_ER)?;
    write_word(d, limits, regs.addr, address)?;
    write_word(d, limits, regs.ctlr, CTLR_PAGE_ER | CTLR_STRT)?;

    let mut statr = STATR_BUSY;
    for _ in 0..limits.erase_polls {
        statr = read_word(d, limits, regs.statr)?;
        if statr & STATR_BUSY == 0 {
            break;
        }
    }

    if statr & STATR_BUSY != 0 {
        log::error!("flash erase timed out, STATR = {:#010x}", statr);
        return Err(Error::EraseTimeout { address, statr });
    }
    if statr & STATR_WRPRTERR != 0 {
        log::error!("memory protection error at {:#010x}", address);
        return Err(Error::MemoryProtectionError { address, statr });
    }

    Ok(())
}

/// Erases and programs one sector. `data` must be exactly one sector.
pub fn write_sector<D: FeatureReport + ?Sized>(
    d: &D,
    config: &TargetConfig,
    address: u32,
    data: &[u8],
) -> Result<()> {
    erase_sector(d, config, address)?;

    let regs = &config.registers;
    write_word(d, &config.limits, regs.ctlr, CTLR_PAGE_PG)?;
    write_word(d, &config.limits, regs.ctlr, CTLR_PAGE_PG | CTLR_BUF_RST)?;

    write_flash_page(d, config, address, data)
}

/// Flash address of the sector at `offset` into the image.
fn sector_address(config: &TargetConfig, offset: usize) -> Result<u32> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| config.flash_base.checked_add(offset))
        .ok_or(Error::AddressOverflow {
            base: config.flash_base,
            offset,
        })
}

/// Verifies every sector and rewrites the ones that differ, sweeping the
/// whole image again until a pass finds no differences. A sector that cannot
/// be read back counts as different.
pub fn write_image<D, O>(
    d: &D,
    image: &FlashImage,
    config: &TargetConfig,
    observer: &mut O,
) -> Result<()>
where
    D: FeatureReport + ?Sized,
    O: StatusObserver + ?Sized,
{
    let passes = config.limits.image_passes;

    for pass in 1..=passes {
        let mut differences = false;

        for (offset, sector) in image.sectors() {
            let address = sector_address(config, offset)?;

            let matches =
                verify_sector(d, &config.limits, address, sector).unwrap_or_else(|e| {
                    log::warn!("reading back {:#010x} failed, rewriting it: {}", address, e);
                    false
                });
            if matches {
                log::debug!("not updating sector {:#010x}", address);
                observer.status(Status::new(Step::Matches, offset, image.len()));
                continue;
            }

            observer.status(Status::new(Step::Programming, offset, image.len()));
            differences = true;

            write_sector(d, config, address, sector).map_err(|e| {
                log::error!("unable to write flash at {:#010x}: {}", address, e);
                e
            })?;
        }

        if !differences {
            log::debug!("image verified on pass {}", pass);
            return Ok(());
        }
    }

    log::error!("unable to write flash with correct content after {} passes", passes);
    Err(Error::PersistentVerifyMismatch { passes })
}

/// Halt, unlock, write and verify, then start the application.
pub fn program<D, O>(
    d: &D,
    image: &FlashImage,
    config: &TargetConfig,
    observer: &mut O,
) -> Result<()>
where
    D: FeatureReport + ?Sized,
    O: StatusObserver + ?Sized,
{
    let size = image.len();

    halt_wait(d, &config.limits)?;
    observer.status(Status::new(Step::Halted, 0, size));

    unlock(d, config)?;
    observer.status(Status::new(Step::Unlocked, 0, size));

    write_image(d, image, config, observer)?;
    observer.status(Status::new(Step::Verified, size, size));

    run_app(d, &config.limits)?;
    observer.status(Status::new(Step::Launched, size, size));

    Ok(())
}

/// Halts and unlocks the target, then compares flash with the image without
/// writing anything.
pub fn verify_bin<D: FeatureReport + ?Sized>(
    d: &D,
    image: &FlashImage,
    config: &TargetConfig,
) -> Result<()> {
    halt_wait(d, &config.limits)?;
    unlock(d, config)?;

    for (offset, sector) in image.sectors() {
        let address = sector_address(config, offset)?;
        if !verify_sector(d, &config.limits, address, sector)? {
            return Err(Error::VerifyMismatch { address });
        }
    }

    Ok(())
}

/// Flash, verify and restart into app.
///
/// The image is padded, reported as staged and checked against the flash
/// capacity before `open` is called, so an oversized image never touches the
/// device.
pub fn flash_bin<D, F, O>(
    binary: &[u8],
    config: &TargetConfig,
    observer: &mut O,
    open: F,
) -> Result<()>
where
    D: FeatureReport,
    F: FnOnce(&TargetConfig) -> Result<D>,
    O: StatusObserver + ?Sized,
{
    let image = FlashImage::pad(binary);
    observer.status(Status::new(Step::Staged, 0, image.len()));
    image.check_capacity(config.flash_size)?;

    observer.status(Status::new(Step::SelectingDevice, 0, image.len()));
    let d = open(config)?;

    program(&d, &image, config, observer)
}
