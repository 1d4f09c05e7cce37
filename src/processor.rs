// This is the place for the basic processor implementation: the register
// file and its byte/word/dword views, the status flags, the fetch loop
// and the interrupt machinery. Instruction semantics live in the
// instructions module, operand plumbing in fields.

use crate::devices::{HostPtr, Signal, IRQ};
use crate::fields::{Size, Value};
use crate::memory::{linear, Bus, Memory};
use crate::parser::parse_instruction;
use bitflags::bitflags;
use log::{trace, warn};
use std::collections::VecDeque;
use std::fmt;

/// General purpose byte registers in ModR/M encoding order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Reg8 {
    AL = 0,
    CL = 1,
    DL = 2,
    BL = 3,
    AH = 4,
    CH = 5,
    DH = 6,
    BH = 7,
}

/// General purpose word registers in ModR/M encoding order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Reg16 {
    AX = 0,
    CX = 1,
    DX = 2,
    BX = 3,
    SP = 4,
    BP = 5,
    SI = 6,
    DI = 7,
}

/// The doubleword aliases the emulator models. The core is 16-bit; these
/// exist for the 32-bit logical operations only.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Reg32 {
    EAX = 0,
    ECX = 1,
    EDX = 2,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SegReg {
    ES = 0,
    CS = 1,
    SS = 2,
    DS = 3,
}

impl Reg8 {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::AL,
            1 => Self::CL,
            2 => Self::DL,
            3 => Self::BL,
            4 => Self::AH,
            5 => Self::CH,
            6 => Self::DH,
            _ => Self::BH,
        }
    }
}

impl Reg16 {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::AX,
            1 => Self::CX,
            2 => Self::DX,
            3 => Self::BX,
            4 => Self::SP,
            5 => Self::BP,
            6 => Self::SI,
            _ => Self::DI,
        }
    }
}

impl Reg32 {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 7 {
            0 => Some(Self::EAX),
            1 => Some(Self::ECX),
            2 => Some(Self::EDX),
            _ => None,
        }
    }
}

impl SegReg {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::ES,
            1 => Self::CS,
            2 => Self::SS,
            _ => Self::DS,
        }
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"][*self as usize];
        write!(f, "{}", name)
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"][*self as usize];
        write!(f, "{}", name)
    }
}

impl fmt::Display for Reg32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ["eax", "ecx", "edx"][*self as usize];
        write!(f, "{}", name)
    }
}

impl fmt::Display for SegReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ["es", "cs", "ss", "ds"][*self as usize];
        write!(f, "{}", name)
    }
}

/// One backing store for every register view. The eight general
/// registers live in a flat byte array so that AL/AH and friends are
/// plain offset+width lookups; the 32-bit aliases keep their upper
/// halves in a side table that only the dword accessors touch.
pub struct RegisterFile {
    bytes: [u8; 16],
    segs: [u16; 4],
    high: [u16; 3],
    pub ip: u16,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile { bytes: [0; 16], segs: [0; 4], high: [0; 3], ip: 0 }
    }
    pub fn reset(&mut self) {
        self.bytes = [0; 16];
        self.segs = [0; 4];
        self.high = [0; 3];
        self.ip = crate::BOOT_OFFSET;
    }
    pub fn get8(&self, reg: Reg8) -> u8 {
        self.bytes[Self::byte_offset(reg)]
    }
    pub fn set8(&mut self, reg: Reg8, value: u8) {
        self.bytes[Self::byte_offset(reg)] = value;
    }
    pub fn get16(&self, reg: Reg16) -> u16 {
        let at = 2 * reg as usize;
        u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]])
    }
    pub fn set16(&mut self, reg: Reg16, value: u16) {
        let at = 2 * reg as usize;
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
    pub fn get32(&self, reg: Reg32) -> u32 {
        let low = self.get16(Reg16::from_bits(reg as u8));
        (self.high[reg as usize] as u32) << 16 | low as u32
    }
    pub fn set32(&mut self, reg: Reg32, value: u32) {
        self.set16(Reg16::from_bits(reg as u8), value as u16);
        self.high[reg as usize] = (value >> 16) as u16;
    }
    pub fn seg(&self, reg: SegReg) -> u16 {
        self.segs[reg as usize]
    }
    pub fn set_seg(&mut self, reg: SegReg, value: u16) {
        self.segs[reg as usize] = value;
    }
    // AL..BL occupy the even bytes of AX..BX, AH..BH the odd ones.
    fn byte_offset(reg: Reg8) -> usize {
        let index = reg as usize;
        if index < 4 {
            2 * index
        } else {
            2 * (index - 4) + 1
        }
    }
}

bitflags! {
    /// Status and control bits at their architectural positions. Bit 1
    /// is reserved and reads as set.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Flags: u16 {
        const CF = 1 << 0;
        const RESERVED1 = 1 << 1;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const TF = 1 << 8;
        const IF = 1 << 9;
        const DF = 1 << 10;
        const OF = 1 << 11;
    }
}

impl Flags {
    pub fn reset() -> Self {
        Flags::RESERVED1
    }
    /// The 16-bit image PUSHF produces.
    pub fn image(&self) -> u16 {
        (*self | Flags::RESERVED1).bits()
    }
    /// The inverse of `image`, used by POPF and IRET.
    pub fn from_image(image: u16) -> Self {
        Flags::from_bits_truncate(image) | Flags::RESERVED1
    }
}

/// A partial flag assignment produced by one ALU operation. Flags the
/// operation does not define stay `None` and survive `apply` untouched.
#[derive(Debug)]
pub struct FlagUpdate {
    pub cf: Option<bool>,
    pub pf: Option<bool>,
    pub af: Option<bool>,
    pub zf: Option<bool>,
    pub sf: Option<bool>,
    pub of: Option<bool>,
}

impl FlagUpdate {
    pub fn new() -> FlagUpdate {
        FlagUpdate { cf: None, pf: None, af: None, zf: None, sf: None, of: None }
    }
    pub fn apply(&self, flags: &mut Flags) {
        if let Some(value) = self.cf {
            flags.set(Flags::CF, value);
        }
        if let Some(value) = self.pf {
            flags.set(Flags::PF, value);
        }
        if let Some(value) = self.af {
            flags.set(Flags::AF, value);
        }
        if let Some(value) = self.zf {
            flags.set(Flags::ZF, value);
        }
        if let Some(value) = self.sf {
            flags.set(Flags::SF, value);
        }
        if let Some(value) = self.of {
            flags.set(Flags::OF, value);
        }
    }
}

/// What a paused CPU is waiting for. Keyboard waits are satisfied by the
/// scheduler as soon as the host queue holds a key; timer waits end when
/// the host callback clears the pause flag.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WaitKind {
    None,
    Keyboard,
    Timer,
}

pub struct CPU {
    pub regs: RegisterFile,
    pub flags: Flags,
    pub mem: Memory,
    pub bus: Bus,
    pub halted: bool,
    pub wait: WaitKind,
    pub host: HostPtr,
    pub irq: VecDeque<IRQ>,
    pub last_instr_ip: u16,
}

impl CPU {
    pub fn new(bus: Bus, host: HostPtr) -> Self {
        let mut cpu = CPU {
            regs: RegisterFile::new(),
            flags: Flags::reset(),
            mem: Memory::new(),
            bus,
            halted: false,
            wait: WaitKind::None,
            host,
            irq: VecDeque::new(),
            last_instr_ip: 0,
        };
        cpu.reset();
        cpu
    }
    pub fn reset(&mut self) {
        self.regs.reset();
        self.flags = Flags::reset();
        self.halted = false;
        self.wait = WaitKind::None;
        self.irq.clear();
        self.last_instr_ip = self.regs.ip;
    }

    // Memory plumbing. Every access goes through the device bus first;
    // unclaimed addresses land in flat RAM. Multi-byte accesses are done
    // bytewise so that wrapping at the top of the address space and
    // device region boundaries behave identically.
    pub fn read8(&mut self, address: usize) -> u8 {
        match self.bus.read(address, Size::Byte) {
            Some(value) => value.inner() as u8,
            None => self.mem.read8(address),
        }
    }
    pub fn read16(&mut self, address: usize) -> u16 {
        let low = self.read8(address);
        let high = self.read8(address.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }
    pub fn read32(&mut self, address: usize) -> u32 {
        let low = self.read16(address);
        let high = self.read16(address.wrapping_add(2));
        (high as u32) << 16 | low as u32
    }
    pub fn write8(&mut self, address: usize, value: u8) {
        match self.bus.write(address, Value::Byte(value)) {
            Some(Signal::Quit) => {
                self.halted = true;
                self.host.stop();
            }
            Some(_) => {}
            None => self.mem.write8(address, value),
        }
    }
    pub fn write16(&mut self, address: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.write8(address, bytes[0]);
        self.write8(address.wrapping_add(1), bytes[1]);
    }
    pub fn write32(&mut self, address: usize, value: u32) {
        self.write16(address, value as u16);
        self.write16(address.wrapping_add(2), (value >> 16) as u16);
    }
    pub fn read_seg(&mut self, seg: u16, off: u16, size: Size) -> Value {
        let address = linear(seg, off);
        match size {
            Size::Byte => Value::Byte(self.read8(address)),
            Size::Word => Value::Word(self.read16(address)),
            Size::Long => Value::Long(self.read32(address)),
        }
    }
    pub fn write_seg(&mut self, seg: u16, off: u16, value: Value) {
        let address = linear(seg, off);
        match value {
            Value::Byte(b) => self.write8(address, b),
            Value::Word(w) => self.write16(address, w),
            Value::Long(l) => self.write32(address, l),
        }
    }

    pub fn fetch8(&mut self) -> u8 {
        let address = linear(self.regs.seg(SegReg::CS), self.regs.ip);
        self.regs.ip = self.regs.ip.wrapping_add(1);
        self.read8(address)
    }
    pub fn fetch16(&mut self) -> u16 {
        let low = self.fetch8();
        let high = self.fetch8();
        u16::from_le_bytes([low, high])
    }

    pub fn push16(&mut self, value: u16) {
        let sp = self.regs.get16(Reg16::SP).wrapping_sub(2);
        self.regs.set16(Reg16::SP, sp);
        let address = linear(self.regs.seg(SegReg::SS), sp);
        self.write16(address, value);
    }
    pub fn pop16(&mut self) -> u16 {
        let sp = self.regs.get16(Reg16::SP);
        let address = linear(self.regs.seg(SegReg::SS), sp);
        self.regs.set16(Reg16::SP, sp.wrapping_add(2));
        self.read16(address)
    }

    /// The single entry point for interrupts: guest `INT n`, internal
    /// faults and device IRQs all come through here. Device-registered
    /// services shadow the interrupt vector table; their register and
    /// flag effects stick, while the pushed return state is unwound and
    /// IF/TF are restored since CS:IP never left the interrupted flow.
    pub fn raise(&mut self, vector: u8) {
        let saved = self.flags;
        self.push16(saved.image());
        self.flags.remove(Flags::IF | Flags::TF);
        self.push16(self.regs.seg(SegReg::CS));
        self.push16(self.regs.ip);
        let selector = self.regs.get8(Reg8::AH);
        if let Some((id, mut device)) = self.bus.take_service(vector, selector) {
            device.interrupt(self, vector, selector);
            self.bus.restore(id, device);
            self.unwind_interrupt_frame();
            self.flags.set(Flags::IF, saved.contains(Flags::IF));
            self.flags.set(Flags::TF, saved.contains(Flags::TF));
            return;
        }
        let offset = self.read16(4 * vector as usize);
        let segment = self.read16(4 * vector as usize + 2);
        if offset == 0 && segment == 0 {
            warn!("int {:#04x} ah={:#04x}: no handler and empty vector", vector, selector);
            self.unwind_interrupt_frame();
            self.flags = saved | Flags::CF;
        } else {
            self.regs.ip = offset;
            self.regs.set_seg(SegReg::CS, segment);
        }
    }
    fn unwind_interrupt_frame(&mut self) {
        let sp = self.regs.get16(Reg16::SP).wrapping_add(6);
        self.regs.set16(Reg16::SP, sp);
    }

    pub fn serve_interrupt_requests(&mut self) {
        self.irq.extend(self.bus.interrupt_requests());
        if self.flags.contains(Flags::IF) {
            if let Some(irq) = self.irq.pop_front() {
                self.halted = false;
                self.raise(irq.vector);
            }
        }
    }

    /// Satisfy a pending wait without touching anything a host thread
    /// could be writing concurrently: keyboard delivery happens here on
    /// the scheduler thread, timer expiry is observed via the shared
    /// pause flag.
    pub fn poll_waits(&mut self) {
        match self.wait {
            WaitKind::None => {}
            WaitKind::Keyboard => {
                if let Some(key) = self.host.pop_key() {
                    self.regs.set16(Reg16::AX, key.ax());
                    self.host.resume();
                    self.wait = WaitKind::None;
                }
            }
            WaitKind::Timer => {
                if !self.host.paused() {
                    self.flags.remove(Flags::CF);
                    self.wait = WaitKind::None;
                }
            }
        }
    }

    /// One scheduler step: at most one instruction is executed.
    pub fn step(&mut self) -> Signal {
        if self.host.stopped() {
            return Signal::Quit;
        }
        self.poll_waits();
        if self.host.paused() {
            return Signal::NoOp;
        }
        self.serve_interrupt_requests();
        if self.halted {
            return Signal::Halt;
        }
        self.last_instr_ip = self.regs.ip;
        match parse_instruction(self) {
            Some(instruction) => {
                trace!(
                    "{:04x}:{:04x}  {}",
                    self.regs.seg(SegReg::CS),
                    self.last_instr_ip,
                    instruction
                );
                instruction.execute(self)
            }
            None => {
                warn!(
                    "invalid opcode at {:04x}:{:04x}",
                    self.regs.seg(SegReg::CS),
                    self.last_instr_ip
                );
                self.regs.ip = self.last_instr_ip;
                self.raise(6);
                Signal::Ok
            }
        }
    }
}

impl fmt::Display for CPU {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ax={:04x} bx={:04x} cx={:04x} dx={:04x} si={:04x} di={:04x} bp={:04x} sp={:04x}",
            self.regs.get16(Reg16::AX),
            self.regs.get16(Reg16::BX),
            self.regs.get16(Reg16::CX),
            self.regs.get16(Reg16::DX),
            self.regs.get16(Reg16::SI),
            self.regs.get16(Reg16::DI),
            self.regs.get16(Reg16::BP),
            self.regs.get16(Reg16::SP),
        )?;
        let flag = |bit, ch| if self.flags.contains(bit) { ch } else { '.' };
        write!(
            f,
            "cs={:04x} ds={:04x} es={:04x} ss={:04x} ip={:04x} [{}{}{}{}{}{}{}{}{}]",
            self.regs.seg(SegReg::CS),
            self.regs.seg(SegReg::DS),
            self.regs.seg(SegReg::ES),
            self.regs.seg(SegReg::SS),
            self.regs.ip,
            flag(Flags::OF, 'o'),
            flag(Flags::DF, 'd'),
            flag(Flags::IF, 'i'),
            flag(Flags::TF, 't'),
            flag(Flags::SF, 's'),
            flag(Flags::ZF, 'z'),
            flag(Flags::AF, 'a'),
            flag(Flags::PF, 'p'),
            flag(Flags::CF, 'c'),
        )
    }
}
