use crate::command::{communicate, Payload};
use crate::{Error, FeatureReport, Result, RetryLimits};

/// Parks the core in the bootloader and acknowledges.
pub(crate) const HALT_WAIT: [u8; 10] = [0x81, 0x46, 0x94, 0xc1, 0xfd, 0x56, 0x14, 0xc1, 0x82, 0x80];

pub fn halt_wait_payload() -> Result<Payload> {
    Payload::routine(&HALT_WAIT, &[], &[])
}

/// Halts the target. Any transport failure is reported as [`Error::HaltFailure`].
pub fn halt_wait<D: FeatureReport + ?Sized>(d: &D, limits: &RetryLimits) -> Result<()> {
    let payload = halt_wait_payload()?;

    communicate(d, &payload, limits)
        .map(|_| ())
        .map_err(|e| {
            log::error!("halt failed: {}", e);
            Error::HaltFailure
        })
}
