use crate::command::{DATA_OFFSET, PAYLOAD_PREFIX, PAYLOAD_SIZE, STATUS_DONE};
use crate::flash::{
    CTLR_LOCK, CTLR_PAGE_ER, CTLR_PAGE_PG, CTLR_STRT, FLASH_KEYS, STATR_WRPRTERR,
};
use crate::haltwait::HALT_WAIT;
use crate::readwords::WORD_READ;
use crate::runapp::RUN_APP;
use crate::writeflashpage::WRITE64_FLASH;
use crate::writewords::WORD_WRITE;
use crate::{Error, FeatureReport, FlashRegisters, Result, TargetConfig, SECTOR_SIZE};
use scroll::{Pread, Pwrite, LE};
use std::cell::{Ref, RefCell, RefMut};

// Parameter offsets within the body, after the 48 byte routines.
const PARAM0: usize = 48;
const PARAM1: usize = 52;
const PARAM_DATA: usize = 56;

const LOCK: u32 = 0x0000_0080;
const FLOCK: u32 = 0x0000_8000;
const STATR_BSY: u32 = 0x0000_0001;

/// Memory, flash controller and fault knobs of a [`SimTarget`].
#[derive(Debug)]
pub struct SimState {
    pub flash: Vec<u8>,
    pub ctlr: u32,
    pub addr: u32,
    pub statr: u32,
    pub obr: u32,

    /// Sector addresses erased, in order.
    pub erased: Vec<u32>,
    /// Sector addresses programmed, in order.
    pub programmed: Vec<u32>,
    /// Read routines that touched flash.
    pub flash_reads: usize,
    pub statr_reads: usize,
    pub halted: bool,
    pub launched: bool,

    /// Polls answered with a busy frame before each acknowledgement.
    pub busy_polls: usize,
    /// STATR reads that report busy after an erase starts.
    pub erase_busy_reads: usize,
    pub erase_never_finishes: bool,
    /// Erases set the write protection error instead of erasing.
    pub write_protected: bool,
    pub ignore_keys: bool,
    /// Sectors whose page writes are silently lost.
    pub stuck_sectors: Vec<u32>,
    /// Number of upcoming page writes to lose.
    pub dropped_programs: usize,
    /// The run app report cannot be sent.
    pub refuse_launch: bool,
    /// Number of upcoming flash reads that never acknowledge.
    pub stalled_reads: usize,

    flash_base: u32,
    registers: FlashRegisters,
    busy_left: usize,
    armed: Vec<u32>,
    pending: Option<Vec<u8>>,
    polls_left: usize,
    stall: bool,
}

impl SimState {
    fn flash_offset(&self, address: u32, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.flash_base)? as usize;
        if offset + len <= self.flash.len() {
            Some(offset)
        } else {
            None
        }
    }

    fn read_reg(&mut self, address: u32) -> u32 {
        let regs = self.registers;
        if address == regs.ctlr {
            self.ctlr
        } else if address == regs.addr {
            self.addr
        } else if address == regs.obr {
            self.obr
        } else if address == regs.statr {
            self.statr_reads += 1;
            if self.erase_never_finishes {
                self.statr | STATR_BSY
            } else if self.busy_left > 0 {
                self.busy_left -= 1;
                self.statr | STATR_BSY
            } else {
                self.statr
            }
        } else {
            0
        }
    }

    fn write_reg(&mut self, address: u32, value: u32) {
        let regs = self.registers;
        if address == regs.keyr || address == regs.obkeyr || address == regs.modekeyr {
            self.key(address, value);
        } else if address == regs.addr {
            self.addr = value;
        } else if address == regs.ctlr {
            // locked controller ignores writes
            if self.ctlr & CTLR_LOCK != 0 {
                return;
            }
            self.ctlr = value;
            if value & CTLR_PAGE_ER != 0 && value & CTLR_STRT != 0 {
                self.erase();
            }
        }
    }

    fn key(&mut self, register: u32, value: u32) {
        let armed = self.armed.contains(&register);
        self.armed.retain(|r| *r != register);

        if value == FLASH_KEYS[0] {
            self.armed.push(register);
        } else if value == FLASH_KEYS[1] && armed && !self.ignore_keys {
            if register == self.registers.keyr {
                self.ctlr &= !LOCK;
            } else if register == self.registers.modekeyr {
                self.ctlr &= !FLOCK;
            }
        }
    }

    fn erase(&mut self) {
        let address = self.addr & !(SECTOR_SIZE as u32 - 1);
        if self.write_protected {
            self.statr |= STATR_WRPRTERR;
            return;
        }
        if let Some(offset) = self.flash_offset(address, SECTOR_SIZE) {
            self.flash[offset..offset + SECTOR_SIZE]
                .iter_mut()
                .for_each(|b| *b = 0xff);
            self.erased.push(address);
            self.busy_left = self.erase_busy_reads;
        }
    }

    fn program(&mut self, address: u32, data: &[u8]) {
        if self.ctlr & CTLR_PAGE_PG == 0 {
            return;
        }
        if self.dropped_programs > 0 {
            self.dropped_programs -= 1;
            return;
        }
        if self.stuck_sectors.contains(&address) {
            return;
        }
        if let Some(offset) = self.flash_offset(address, data.len()) {
            // programming only clears bits
            for (cell, byte) in self.flash[offset..].iter_mut().zip(data) {
                *cell &= *byte;
            }
            self.programmed.push(address);
        }
    }

    /// Runs the routine in `request` and returns the acknowledged report,
    /// or None for routines that never answer.
    fn execute(&mut self, request: &[u8]) -> Result<Option<Vec<u8>>> {
        let body = &request[PAYLOAD_PREFIX.len()..];
        let mut response = request.to_vec();
        response[1..5].copy_from_slice(&[STATUS_DONE; 4]);

        if body.starts_with(&RUN_APP) {
            self.launched = true;
            return Ok(None);
        } else if body.starts_with(&WORD_READ) {
            let address: u32 = body.pread_with(PARAM0, LE)?;
            let size: u32 = body.pread_with(PARAM1, LE)?;
            if DATA_OFFSET + size as usize > PAYLOAD_SIZE - 4 {
                return Err(Error::Parse);
            }

            if let Some(offset) = self.flash_offset(address, size as usize) {
                self.flash_reads += 1;
                if self.stalled_reads > 0 {
                    self.stalled_reads -= 1;
                    self.stall = true;
                }
                response[DATA_OFFSET..][..size as usize]
                    .copy_from_slice(&self.flash[offset..offset + size as usize]);
            } else {
                for i in 0..size / 4 {
                    let word = self.read_reg(address + i * 4);
                    response.pwrite_with(word, DATA_OFFSET + i as usize * 4, LE)?;
                }
            }
        } else if body.starts_with(&WORD_WRITE) {
            let address: u32 = body.pread_with(PARAM0, LE)?;
            let size: u32 = body.pread_with(PARAM1, LE)?;

            for i in 0..size / 4 {
                let value: u32 = body.pread_with(PARAM_DATA + i as usize * 4, LE)?;
                self.write_reg(address + i * 4, value);
            }
        } else if body.starts_with(&WRITE64_FLASH) {
            let address: u32 = body.pread_with(PARAM0, LE)?;
            let data = &body[PARAM_DATA..PARAM_DATA + SECTOR_SIZE];
            self.program(address, data);
        } else if body.starts_with(&HALT_WAIT) {
            self.halted = true;
        } else {
            return Err(Error::Transmission("unknown routine".into()));
        }

        Ok(Some(response))
    }
}

/// A CH32V003 behind the rv003usb bootloader, decoding the routines it is sent.
pub struct SimTarget {
    state: RefCell<SimState>,
}

impl SimTarget {
    /// Erased, unlocked, unprotected part.
    pub fn new(config: &TargetConfig) -> Self {
        SimTarget {
            state: RefCell::new(SimState {
                flash: vec![0xff; config.flash_size],
                ctlr: 0,
                addr: 0,
                statr: 0,
                obr: 0,
                erased: vec![],
                programmed: vec![],
                flash_reads: 0,
                statr_reads: 0,
                halted: false,
                launched: false,
                busy_polls: 1,
                erase_busy_reads: 0,
                erase_never_finishes: false,
                write_protected: false,
                ignore_keys: false,
                stuck_sectors: vec![],
                dropped_programs: 0,
                refuse_launch: false,
                stalled_reads: 0,
                flash_base: config.flash_base,
                registers: config.registers,
                busy_left: 0,
                armed: vec![],
                pending: None,
                polls_left: 0,
                stall: false,
            }),
        }
    }

    pub fn state(&self) -> Ref<'_, SimState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SimState> {
        self.state.borrow_mut()
    }
}

impl FeatureReport for SimTarget {
    fn send_feature(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();

        if data.len() != PAYLOAD_SIZE || !data.starts_with(&PAYLOAD_PREFIX) {
            return Err(Error::Transmission("malformed report".into()));
        }
        if data[PAYLOAD_PREFIX.len()..].starts_with(&RUN_APP) && state.refuse_launch {
            return Err(Error::Transmission("pipe error".into()));
        }

        state.stall = false;
        state.pending = state.execute(data)?;
        state.polls_left = if state.stall {
            usize::MAX
        } else {
            state.busy_polls
        };
        Ok(())
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.borrow_mut();

        let response = match &state.pending {
            Some(response) => response.clone(),
            None => return Err(Error::Transmission("no report".into())),
        };

        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);

        if state.polls_left > 0 {
            state.polls_left -= 1;
            buf[1] = 0;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{read_word, write_word, RetryLimits};

    #[test]
    fn keys_unlock_controller() {
        let config = TargetConfig::ch32v003();
        let sim = SimTarget::new(&config);
        sim.state_mut().ctlr = CTLR_LOCK;
        let limits = RetryLimits::default();

        for key in &FLASH_KEYS {
            write_word(&sim, &limits, config.registers.keyr, *key).unwrap();
        }
        assert_eq!(read_word(&sim, &limits, config.registers.ctlr), Ok(FLOCK));

        write_word(&sim, &limits, config.registers.modekeyr, FLASH_KEYS[1]).unwrap();
        assert_eq!(read_word(&sim, &limits, config.registers.ctlr), Ok(FLOCK));
    }

    #[test]
    fn busy_frame_before_acknowledgement() {
        let config = TargetConfig::ch32v003();
        let sim = SimTarget::new(&config);
        sim.state_mut().busy_polls = 3;
        let payload = crate::halt_wait_payload().unwrap();

        sim.send_feature(payload.as_bytes()).unwrap();
        let mut buf = vec![0; PAYLOAD_SIZE];
        for _ in 0..3 {
            sim.get_feature(&mut buf).unwrap();
            assert_ne!(buf[1], STATUS_DONE);
        }
        sim.get_feature(&mut buf).unwrap();
        assert_eq!(buf[1], STATUS_DONE);
        assert!(sim.state().halted);
    }
}
