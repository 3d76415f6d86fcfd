use crate::{Error, FeatureReport};
use hidapi::HidDevice;

impl FeatureReport for HidDevice {
    fn send_feature(&self, data: &[u8]) -> Result<(), Error> {
        self.send_feature_report(data).map_err(|e| e.into())
    }
    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.get_feature_report(buf).map_err(|e| e.into())
    }
}

impl From<hidapi::HidError> for Error {
    fn from(err: hidapi::HidError) -> Self {
        Error::Transmission(err.to_string())
    }
}
