use core::fmt;

/// Checkpoints of a flashing run, in the order they are normally reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Step {
    /// Image padded and accepted.
    Staged = 0,
    SelectingDevice = 1,
    /// Device opened and halted.
    Halted = 2,
    Unlocked = 3,
    /// Sector differs and is being erased and programmed.
    Programming = 4,
    /// Sector already holds the expected content.
    Matches = 5,
    Verified = 6,
    Launched = 7,
}

impl Step {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Staged => "Staged",
            Step::SelectingDevice => "Selecting",
            Step::Halted => "Halted",
            Step::Unlocked => "Unlocked",
            Step::Programming => "Writing",
            Step::Matches => "Matches",
            Step::Verified => "Verified",
            Step::Launched => "Launched",
        };
        f.pad(label)
    }
}

/// One checkpoint: the step plus progress through the padded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    pub step: Step,
    pub offset: usize,
    pub size: usize,
}

impl Status {
    pub fn new(step: Step, offset: usize, size: usize) -> Self {
        Status { step, offset, size }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10} {}/{} bytes", self.step, self.offset, self.size)
    }
}

/// Receives checkpoints synchronously, in order, from the flashing thread.
/// Implementations should return quickly; the run waits on them.
pub trait StatusObserver {
    fn status(&mut self, status: Status);
}

impl<F: FnMut(Status)> StatusObserver for F {
    fn status(&mut self, status: Status) {
        self(status)
    }
}
