use crate::{FeatureReport, Result};

/// Device whose reads and writes are plain closures.
pub struct MyMock<R, W>
where
    R: Fn(&mut [u8]) -> Result<usize>,
    W: Fn(&[u8]) -> Result<()>,
{
    pub reader: R,
    pub writer: W,
}

impl<R, W> FeatureReport for MyMock<R, W>
where
    R: Fn(&mut [u8]) -> Result<usize>,
    W: Fn(&[u8]) -> Result<()>,
{
    fn send_feature(&self, data: &[u8]) -> Result<()> {
        (self.writer)(data)
    }
    fn get_feature(&self, buf: &mut [u8]) -> Result<usize> {
        (self.reader)(buf)
    }
}
