pub mod bios;
mod conversions;
pub mod devices;
pub mod fields;
mod instructions;
pub mod memory;
mod parser;
pub mod pc;
pub mod processor;

use devices::{Device, HostPtr, HostState, Signal, VideoPtr};
use log::{info, warn};
use memory::{Bus, DeviceId, MEM_SIZE};
use processor::{Flags, Reg16, Reg8, SegReg, CPU};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Boot sectors load at 0000:7C00 and execution starts there.
pub const BOOT_OFFSET: u16 = 0x7c00;
const BOOT_SECTOR_SIZE: usize = 512;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xaa];

// Instruction allowance for a synchronous run; a guest that spins this
// long without halting is not going to.
const DEFAULT_BUDGET: i64 = 100_000_000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("boot image is only {0} bytes, a boot sector needs 512")]
    ImageTooShort(usize),
    #[error("boot sector signature is {found:02x?}, expected [55, aa]")]
    BootSignatureMismatch { found: [u8; 2] },
    #[error("device memory range {0:#07x}..{1:#07x} overlaps an attached device")]
    DeviceRangeConflict(usize, usize),
    #[error("interrupt {int_no:#04x} selector {selector:?} is already registered")]
    DeviceServiceConflict { int_no: u8, selector: Option<u8> },
    #[error("address {0:#07x} is outside the 1 MiB address space")]
    MemoryOutOfRange(usize),
}

pub struct Configuration {
    /// Skip the 0x55AA boot signature check.
    pub ignore_magic: bool,
    /// Suppress informational logs.
    pub silent: bool,
    /// Run the scheduler synchronously: `boot` returns once the guest
    /// halts or the instruction budget runs out.
    pub sync: bool,
    /// Instructions per scheduler tick when the host drives `tick`.
    pub clocks_per_tick: i64,
    pub bus: Bus,
    pub video: VideoPtr,
}

pub struct Emulator {
    pub cpu: CPU,
    ignore_magic: bool,
    sync: bool,
    silent: bool,
    clocks_per_tick: i64,
    clocks_budget: i64,
    video: VideoPtr,
}

impl Emulator {
    pub fn new(config: Configuration) -> Emulator {
        let host = HostState::new();
        Emulator {
            cpu: CPU::new(config.bus, host),
            ignore_magic: config.ignore_magic,
            sync: config.sync,
            silent: config.silent,
            clocks_per_tick: config.clocks_per_tick.max(1),
            clocks_budget: DEFAULT_BUDGET,
            video: config.video,
        }
    }

    /// Load a boot image at 0000:7C00 and start executing it. In sync
    /// mode this returns once the machine halts; otherwise the host is
    /// expected to drive `tick` and pump its own event loop.
    pub fn boot(&mut self, image: &[u8]) -> Result<(), Error> {
        if !self.ignore_magic {
            if image.len() < BOOT_SECTOR_SIZE {
                return Err(Error::ImageTooShort(image.len()));
            }
            let found = [image[BOOT_SECTOR_SIZE - 2], image[BOOT_SECTOR_SIZE - 1]];
            if found != BOOT_SIGNATURE {
                return Err(Error::BootSignatureMismatch { found });
            }
        }
        let length = image.len().min(BOOT_SECTOR_SIZE);
        self.cpu.reset();
        self.cpu.mem.load(BOOT_OFFSET as usize, &image[..length])?;
        if !self.silent {
            info!("boot: {} byte image, first sector at 0000:{:04x}", image.len(), BOOT_OFFSET);
        }
        if self.sync {
            self.run();
        }
        Ok(())
    }

    /// One scheduler tick: up to `clocks_per_tick` instructions.
    pub fn tick(&mut self) -> Signal {
        for _ in 0..self.clocks_per_tick {
            if self.clocks_budget <= 0 {
                warn!("instruction budget exhausted, stopping");
                return Signal::Quit;
            }
            match self.cpu.step() {
                Signal::Ok => self.clocks_budget -= 1,
                other => return other,
            }
        }
        Signal::Ok
    }

    /// Synchronous scheduler loop: ticks until the guest halts, the
    /// budget runs out or the host calls `stop`. While the machine is
    /// paused the loop naps so the host timer threads can make progress.
    pub fn run(&mut self) -> Signal {
        loop {
            match self.tick() {
                Signal::Ok => {}
                Signal::NoOp => std::thread::sleep(std::time::Duration::from_micros(200)),
                signal => return signal,
            }
        }
    }

    pub fn stop(&mut self) {
        self.cpu.halted = true;
        self.cpu.host.stop();
    }

    pub fn attach(&mut self, device: Box<dyn Device>) -> Result<DeviceId, Error> {
        self.cpu.bus.attach(device)
    }
    pub fn detach(&mut self, id: DeviceId) {
        self.cpu.bus.detach(id);
    }

    pub fn host(&self) -> HostPtr {
        Arc::clone(&self.cpu.host)
    }
    pub fn video(&self) -> VideoPtr {
        Rc::clone(&self.video)
    }
    pub fn set_budget(&mut self, clocks: i64) {
        self.clocks_budget = clocks;
    }

    // Observable state for assertions and front-ends.
    pub fn reg16(&self, reg: Reg16) -> u16 {
        self.cpu.regs.get16(reg)
    }
    pub fn reg8(&self, reg: Reg8) -> u8 {
        self.cpu.regs.get8(reg)
    }
    pub fn seg(&self, reg: SegReg) -> u16 {
        self.cpu.regs.seg(reg)
    }
    pub fn ip(&self) -> u16 {
        self.cpu.regs.ip
    }
    pub fn flags(&self) -> Flags {
        self.cpu.flags
    }
    pub fn mem8(&mut self, address: usize) -> Result<u8, Error> {
        if address >= MEM_SIZE {
            return Err(Error::MemoryOutOfRange(address));
        }
        Ok(self.cpu.read8(address))
    }
    pub fn mem16(&mut self, address: usize) -> Result<u16, Error> {
        if address + 1 >= MEM_SIZE {
            return Err(Error::MemoryOutOfRange(address));
        }
        Ok(self.cpu.read16(address))
    }
}
