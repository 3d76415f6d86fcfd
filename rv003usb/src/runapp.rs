use crate::command::{xmit, Payload};
use crate::{Error, FeatureReport, Result, RetryLimits};

/// Jumps into the application.
///
/// Tries the reboot vector stored (with an xor check) in the bootloader's
/// secret area first. If the check fails it falls back to unlocking the
/// flash boot mode key, clearing STATR, requesting a boot mode switch and
/// resetting through PFIC.
pub(crate) const RUN_APP: [u8; 120] = [
    0xb7, 0xf5, 0xff, 0x1f, 0x93, 0x87, 0xc5, 0x77, 0x03, 0xa7, 0x07, 0x00, //
    0x13, 0x57, 0x07, 0x01, 0x83, 0x96, 0x07, 0x00, 0x93, 0xc7, 0xc6, 0x77, //
    0x63, 0x16, 0xf7, 0x00, 0x33, 0x87, 0xb6, 0x00, 0x67, 0x00, 0x07, 0x00, //
    0xb7, 0x27, 0x02, 0x40, 0x93, 0x87, 0x87, 0x02, 0x37, 0x07, 0x67, 0x45, //
    0x13, 0x07, 0x37, 0x12, 0x23, 0xa0, 0xe7, 0x00, 0xb7, 0x27, 0x02, 0x40, //
    0x93, 0x87, 0x87, 0x02, 0x37, 0x97, 0xef, 0xcd, 0x13, 0x07, 0xb7, 0x9a, //
    0x23, 0xa0, 0xe7, 0x00, 0xb7, 0x27, 0x02, 0x40, 0x93, 0x87, 0xc7, 0x00, //
    0x23, 0xa0, 0x07, 0x00, 0xb7, 0x27, 0x02, 0x40, 0x93, 0x87, 0x07, 0x01, //
    0x13, 0x07, 0x00, 0x08, 0x23, 0xa0, 0xe7, 0x00, 0xb7, 0xf7, 0x00, 0xe0, //
    0x93, 0x87, 0x07, 0xd1, 0x37, 0x07, 0x00, 0x80, 0x23, 0xa0, 0xe7, 0x00, //
];

pub fn run_app_payload() -> Result<Payload> {
    Payload::routine(&RUN_APP, &[], &[])
}

/// Starts the application. The target leaves the bootloader while executing
/// this, so no acknowledgement is awaited.
pub fn run_app<D: FeatureReport + ?Sized>(d: &D, limits: &RetryLimits) -> Result<()> {
    let payload = run_app_payload()?;

    xmit(d, &payload, limits).map_err(|e| {
        log::error!("run app failed: {}", e);
        Error::LaunchFailure
    })
}
