use crate::{Error, Result, SECTOR_SIZE};

/// Value of erased flash, used to fill the last sector.
pub const FILL_BYTE: u8 = 0xff;

/// Pads `binary` up to the next whole sector with [`FILL_BYTE`].
pub fn pad_to_sector(binary: &[u8]) -> Vec<u8> {
    let padded_size = (binary.len() + SECTOR_SIZE - 1) / SECTOR_SIZE * SECTOR_SIZE;
    let mut padded = binary.to_vec();
    padded.resize(padded_size, FILL_BYTE);
    padded
}

/// A firmware image padded to whole sectors and known to fit the flash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashImage {
    data: Vec<u8>,
}

impl FlashImage {
    /// Pads `binary` and checks it against `capacity` bytes of flash.
    pub fn new(binary: &[u8], capacity: usize) -> Result<Self> {
        let image = FlashImage::pad(binary);
        image.check_capacity(capacity)?;
        Ok(image)
    }

    /// Pads `binary` without looking at any flash size.
    pub fn pad(binary: &[u8]) -> Self {
        let data = pad_to_sector(binary);
        log::debug!(
            "binary is {} bytes, padding to {} bytes",
            binary.len(),
            data.len()
        );
        FlashImage { data }
    }

    pub fn check_capacity(&self, capacity: usize) -> Result<()> {
        if self.data.len() > capacity {
            log::error!("ROM size too large!");
            return Err(Error::OversizeImage {
                size: self.data.len(),
                capacity,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Sector offsets from the start of flash with their content.
    pub fn sectors(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        self.data
            .chunks(SECTOR_SIZE)
            .enumerate()
            .map(|(index, sector)| (index * SECTOR_SIZE, sector))
    }
}
