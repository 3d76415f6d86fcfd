use crate::{Error, FeatureReport, Result, RetryLimits};
use scroll::{Pread, Pwrite, LE};

/// Every command travels as exactly this many bytes, report id included.
pub const PAYLOAD_SIZE: usize = 128;

/// Framing prefix. The first byte doubles as the HID report id.
pub const PAYLOAD_PREFIX: [u8; 4] = [0xaa, 0x00, 0x00, 0x00];

/// Framing suffix, always the last four bytes of a payload.
pub const PAYLOAD_SUFFIX: [u8; 4] = [0xcd, 0xab, 0x34, 0x12];

/// Largest body that fits between prefix and suffix.
pub const MAX_BODY_SIZE: usize = PAYLOAD_SIZE - PAYLOAD_PREFIX.len() - PAYLOAD_SUFFIX.len();

/// Offset of the data area in both requests and responses.
pub const DATA_OFFSET: usize = 60;

/// Byte 1 of a response once the target has run the routine.
pub const STATUS_DONE: u8 = 0xff;

/// A framed command: prefix, machine code and parameters, zero fill, suffix.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload([u8; PAYLOAD_SIZE]);

impl Payload {
    /// Frames `body`, failing with [`Error::PayloadOverflow`] if it does not fit.
    pub fn new(body: &[u8]) -> Result<Self> {
        if body.len() > MAX_BODY_SIZE {
            return Err(Error::PayloadOverflow { len: body.len() });
        }

        let mut buf = [0_u8; PAYLOAD_SIZE];
        buf[..PAYLOAD_PREFIX.len()].copy_from_slice(&PAYLOAD_PREFIX);
        buf[PAYLOAD_PREFIX.len()..][..body.len()].copy_from_slice(body);
        buf[PAYLOAD_SIZE - PAYLOAD_SUFFIX.len()..].copy_from_slice(&PAYLOAD_SUFFIX);

        Ok(Payload(buf))
    }

    /// Frames a machine code routine followed by little endian parameters and raw data.
    pub fn routine(code: &[u8], params: &[u32], data: &[u8]) -> Result<Self> {
        let mut body = vec![0_u8; code.len() + params.len() * 4 + data.len()];
        body[..code.len()].copy_from_slice(code);

        let mut offset = code.len();
        for param in params {
            body.gwrite_with(*param, &mut offset, LE)?;
        }
        body[offset..].copy_from_slice(data);

        Payload::new(&body)
    }

    pub fn report_id(&self) -> u8 {
        self.0[0]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Everything between prefix and suffix.
    pub fn body(&self) -> &[u8] {
        &self.0[PAYLOAD_PREFIX.len()..PAYLOAD_SIZE - PAYLOAD_SUFFIX.len()]
    }
}

/// An acknowledged report as read back from the target.
#[derive(Clone, Debug, PartialEq)]
pub struct Response(Vec<u8>);

impl Response {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The 32-bit result word at the data offset.
    pub fn word(&self) -> Result<u32> {
        if self.0.len() < DATA_OFFSET + 4 {
            return Err(Error::Parse);
        }
        Ok(self.0.pread_with::<u32>(DATA_OFFSET, LE)?)
    }

    /// `len` bytes of data starting at the data offset.
    pub fn data(&self, len: usize) -> Result<&[u8]> {
        self.0.get(DATA_OFFSET..DATA_OFFSET + len).ok_or(Error::Parse)
    }
}

/// Sends a payload as a feature report, retrying failed sends.
pub fn xmit<D: FeatureReport + ?Sized>(d: &D, payload: &Payload, limits: &RetryLimits) -> Result<()> {
    (0..=limits.send_retries)
        .find_map(|attempt| match d.send_feature(payload.as_bytes()) {
            Ok(()) => Some(()),
            Err(e) => {
                log::warn!("send attempt {} failed: {}", attempt + 1, e);
                None
            }
        })
        .ok_or_else(|| {
            log::error!("sendFeatureReport retries exceeded");
            Error::TransportSendFailure
        })
}

/// Polls the feature report of `request` until the target has executed it.
///
/// A frame of the wrong length or without the done marker means the target
/// is still busy and costs one poll. I/O errors are counted separately.
pub fn rx<D: FeatureReport + ?Sized>(
    d: &D,
    request: &Payload,
    limits: &RetryLimits,
) -> Result<Response> {
    let expected = request.as_bytes().len();
    let mut polls = 0;
    let mut failures = 0;

    while polls < limits.receive_polls {
        let mut buf = vec![0_u8; expected];
        buf[0] = request.report_id();

        match d.get_feature(&mut buf) {
            Ok(len) => {
                polls += 1;
                if len == expected && buf[1] == STATUS_DONE {
                    return Ok(Response(buf));
                }
                log::trace!("poll {}: target busy ({} bytes)", polls, len);
            }
            Err(e) => {
                failures += 1;
                if failures > limits.receive_retries {
                    log::error!("receiveFeatureReport retries exceeded: {}", e);
                    return Err(Error::TransportReceiveFailure);
                }
                log::warn!("receive attempt {} failed: {}", failures, e);
            }
        }
    }

    log::error!("receiveFeatureReport timeout after {} polls", polls);
    Err(Error::TransportTimeout)
}

/// Sends a payload and waits for its acknowledgement.
pub fn communicate<D: FeatureReport + ?Sized>(
    d: &D,
    payload: &Payload,
    limits: &RetryLimits,
) -> Result<Response> {
    xmit(d, payload, limits)?;
    rx(d, payload, limits)
}
