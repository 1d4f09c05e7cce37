// The boot-time BIOS. It owns the screen mode table and the floppy
// geometry, and services the classic software interrupts by operating
// directly on the borrowed CPU register file. Video state is shared
// with the Vga bus device through the VideoPtr handle.

use crate::devices::{Device, ScreenMode, Signal, VideoPtr};
use crate::memory::linear;
use crate::processor::{Flags, Reg16, Reg8, SegReg, WaitKind, CPU};
use chrono::Duration;
use log::{debug, warn};
use std::sync::Arc;

pub const TEXT_40X25: ScreenMode = ScreenMode {
    number: 0x01,
    text: true,
    cols: 40,
    rows: 25,
    width: 320,
    height: 200,
    base: 0xb8000,
    page_size: 0x800,
    pages: 8,
};

pub const TEXT_80X25: ScreenMode = ScreenMode {
    number: 0x03,
    text: true,
    cols: 80,
    rows: 25,
    width: 640,
    height: 400,
    base: 0xb8000,
    page_size: 0x1000,
    pages: 8,
};

/// Every mode INT 10h/AH=00 accepts. Modes 0/2 are the monochrome
/// variants of 1/3 and share their layout.
pub const SCREEN_MODES: [ScreenMode; 8] = [
    ScreenMode { number: 0x00, ..TEXT_40X25 },
    TEXT_40X25,
    ScreenMode { number: 0x02, ..TEXT_80X25 },
    TEXT_80X25,
    ScreenMode {
        number: 0x04,
        text: false,
        cols: 40,
        rows: 25,
        width: 320,
        height: 200,
        base: 0xb8000,
        page_size: 0x4000,
        pages: 1,
    },
    ScreenMode {
        number: 0x11,
        text: false,
        cols: 80,
        rows: 30,
        width: 640,
        height: 480,
        base: 0xa0000,
        page_size: 0x9600,
        pages: 1,
    },
    ScreenMode {
        number: 0x12,
        text: false,
        cols: 80,
        rows: 30,
        width: 640,
        height: 480,
        base: 0xa0000,
        page_size: 0x9600,
        pages: 1,
    },
    ScreenMode {
        number: 0x13,
        text: false,
        cols: 40,
        rows: 25,
        width: 320,
        height: 200,
        base: 0xa0000,
        page_size: 0xfa00,
        pages: 1,
    },
];

// 1.44 MB diskette geometry.
const SECTOR_SIZE: usize = 512;
const SECTORS_PER_TRACK: u16 = 18;
const HEADS: u16 = 2;
const CYLINDERS: u16 = 80;

// Diskette drive installed, initial video mode 80x25 colour.
const EQUIPMENT: u16 = 0x0021;
const MEMORY_KB: u16 = 640;

const STATUS_OK: u8 = 0x00;
const STATUS_OUT_OF_RANGE: u8 = 0xbb;

pub struct Bios {
    video: VideoPtr,
    disk: Vec<u8>,
    timer: timer::Timer,
}

impl Bios {
    pub fn new(video: VideoPtr, disk: Vec<u8>) -> Box<Self> {
        Box::new(Bios { video, disk, timer: timer::Timer::new() })
    }

    fn video_service(&mut self, cpu: &mut CPU) {
        let selector = cpu.regs.get8(Reg8::AH);
        let mut video = self.video.borrow_mut();
        match selector {
            0x00 => {
                let request = cpu.regs.get8(Reg8::AL);
                let number = request & 0x7f;
                match SCREEN_MODES.iter().find(|mode| mode.number == number) {
                    Some(mode) => video.set_mode(*mode, request & 0x80 == 0),
                    None => warn!("set mode {:#04x}: no such screen mode", number),
                }
            }
            0x01 => {
                video.cursor_shape = (cpu.regs.get8(Reg8::CH), cpu.regs.get8(Reg8::CL));
            }
            0x02 => {
                let page = cpu.regs.get8(Reg8::BH);
                video.set_cursor(page, cpu.regs.get8(Reg8::DH), cpu.regs.get8(Reg8::DL));
            }
            0x03 => {
                let (row, col) = video.cursor(cpu.regs.get8(Reg8::BH));
                cpu.regs.set8(Reg8::DH, row);
                cpu.regs.set8(Reg8::DL, col);
                cpu.regs.set8(Reg8::CH, video.cursor_shape.0);
                cpu.regs.set8(Reg8::CL, video.cursor_shape.1);
            }
            0x05 => {
                let page = cpu.regs.get8(Reg8::AL);
                if page < video.mode.pages {
                    video.active_page = page;
                }
            }
            0x06 => {
                let lines = cpu.regs.get8(Reg8::AL);
                let attr = cpu.regs.get8(Reg8::BH);
                let window = (
                    cpu.regs.get8(Reg8::CH),
                    cpu.regs.get8(Reg8::CL),
                    cpu.regs.get8(Reg8::DH),
                    cpu.regs.get8(Reg8::DL),
                );
                let page = video.active_page;
                video.scroll_up(page, window, lines, attr);
            }
            0x08 => {
                let page = cpu.regs.get8(Reg8::BH);
                let (row, col) = video.cursor(page);
                let (ch, attr) = video.cell(page, row, col);
                cpu.regs.set8(Reg8::AL, ch);
                cpu.regs.set8(Reg8::AH, attr);
            }
            0x09 | 0x0a => {
                let page = cpu.regs.get8(Reg8::BH);
                let ch = cpu.regs.get8(Reg8::AL);
                let attr = cpu.regs.get8(Reg8::BL);
                let count = cpu.regs.get16(Reg16::CX);
                let (row, col) = video.cursor(page);
                let cols = video.mode.cols;
                let rows = video.mode.rows;
                let mut cell = row as u16 * cols + col as u16;
                for _ in 0..count {
                    if cell >= rows * cols {
                        break;
                    }
                    let (r, c) = ((cell / cols) as u8, (cell % cols) as u8);
                    if selector == 0x09 {
                        video.put_cell(page, r, c, ch, attr);
                    } else {
                        video.put_char(page, r, c, ch);
                    }
                    cell += 1;
                }
            }
            0x0e => {
                let page = cpu.regs.get8(Reg8::BH);
                video.teletype(page, cpu.regs.get8(Reg8::AL));
            }
            0x0f => {
                cpu.regs.set8(Reg8::AL, video.mode.number);
                cpu.regs.set8(Reg8::AH, video.mode.cols as u8);
                cpu.regs.set8(Reg8::BH, video.active_page);
            }
            0x11 => match cpu.regs.get8(Reg8::AL) {
                // 8x8 font doubles the text rows, 8x16 restores them.
                0x12 => video.mode.rows = 50,
                0x14 => video.mode.rows = 25,
                0x30 => {
                    cpu.regs.set16(Reg16::CX, 16);
                    cpu.regs.set8(Reg8::DL, video.mode.rows as u8 - 1);
                }
                other => debug!("font service {:#04x} ignored", other),
            },
            0x13 => {
                let page = cpu.regs.get8(Reg8::BH);
                let mode = cpu.regs.get8(Reg8::AL);
                let attr = cpu.regs.get8(Reg8::BL);
                let count = cpu.regs.get16(Reg16::CX);
                let source_seg = cpu.regs.seg(SegReg::ES);
                let mut source_off = cpu.regs.get16(Reg16::BP);
                let saved_cursor = video.cursor(page);
                video.set_cursor(page, cpu.regs.get8(Reg8::DH), cpu.regs.get8(Reg8::DL));
                drop(video);
                for _ in 0..count {
                    let ch = cpu.read8(linear(source_seg, source_off));
                    source_off = source_off.wrapping_add(1);
                    let attr = if mode & 0x02 != 0 {
                        let a = cpu.read8(linear(source_seg, source_off));
                        source_off = source_off.wrapping_add(1);
                        a
                    } else {
                        attr
                    };
                    let mut video = self.video.borrow_mut();
                    if !matches!(ch, 0x07 | 0x08 | 0x0a | 0x0d) {
                        let (row, col) = video.cursor(page);
                        video.put_attr(page, row, col, attr);
                    }
                    video.teletype(page, ch);
                }
                if mode & 0x01 == 0 {
                    self.video.borrow_mut().set_cursor(page, saved_cursor.0, saved_cursor.1);
                }
            }
            other => warn!("video service ah={:#04x} not implemented", other),
        }
    }

    fn disk_service(&mut self, cpu: &mut CPU) {
        match cpu.regs.get8(Reg8::AH) {
            0x00 => {
                cpu.flags.remove(Flags::CF);
                cpu.regs.set8(Reg8::AH, STATUS_OK);
            }
            _ => self.read_sectors(cpu),
        }
    }

    /// INT 13h/AH=02: CH holds the low eight cylinder bits, the top two
    /// sit in bits 7..6 of CL, the sector (1-based) in its low six.
    fn read_sectors(&mut self, cpu: &mut CPU) {
        let cl = cpu.regs.get8(Reg8::CL) as u16;
        let cylinder = cpu.regs.get8(Reg8::CH) as u16 | (cl & 0xc0) << 2;
        let sector = cl & 0x3f;
        let head = cpu.regs.get8(Reg8::DH) as u16;
        let drive = cpu.regs.get8(Reg8::DL);
        let count = cpu.regs.get8(Reg8::AL) as u16;
        let in_range = drive == 0
            && sector >= 1
            && sector + count.saturating_sub(1) <= SECTORS_PER_TRACK
            && head < HEADS
            && cylinder < CYLINDERS;
        if !in_range {
            warn!(
                "disk read rejected: drive {} chs {}/{}/{} count {}",
                drive, cylinder, head, sector, count
            );
            cpu.flags.insert(Flags::CF);
            cpu.regs.set8(Reg8::AH, STATUS_OUT_OF_RANGE);
            return;
        }
        let lba = (cylinder * HEADS + head) * SECTORS_PER_TRACK + (sector - 1);
        let start = lba as usize * SECTOR_SIZE;
        let length = count as usize * SECTOR_SIZE;
        if start + length > self.disk.len() {
            cpu.flags.insert(Flags::CF);
            cpu.regs.set8(Reg8::AH, STATUS_OUT_OF_RANGE);
            return;
        }
        let segment = cpu.regs.seg(SegReg::ES);
        let offset = cpu.regs.get16(Reg16::BX);
        for i in 0..length {
            let byte = self.disk[start + i];
            cpu.write8(linear(segment, offset.wrapping_add(i as u16)), byte);
        }
        debug!("disk read: lba {} x{} sectors to {:04x}:{:04x}", lba, count, segment, offset);
        cpu.flags.remove(Flags::CF);
        cpu.regs.set8(Reg8::AH, STATUS_OK);
    }

    /// INT 15h/AH=86: suspend execution for CX:DX microseconds. The
    /// carry flag signals the wait in progress; a host timer clears the
    /// pause and the scheduler drops CF when it observes the expiry.
    fn wait_service(&mut self, cpu: &mut CPU) {
        let micros =
            (cpu.regs.get16(Reg16::CX) as i64) << 16 | cpu.regs.get16(Reg16::DX) as i64;
        cpu.flags.insert(Flags::CF);
        cpu.wait = WaitKind::Timer;
        cpu.host.pause();
        let host = Arc::clone(&cpu.host);
        let guard = self.timer.schedule_with_delay(Duration::microseconds(micros), move || {
            // Runs on the timer thread; may fire after stop(), which is fine.
            host.resume();
        });
        guard.ignore();
    }

    fn keyboard_service(&mut self, cpu: &mut CPU) {
        match cpu.regs.get8(Reg8::AH) {
            0x00 | 0x10 => match cpu.host.pop_key() {
                Some(key) => cpu.regs.set16(Reg16::AX, key.ax()),
                None => {
                    cpu.wait = WaitKind::Keyboard;
                    cpu.host.pause();
                }
            },
            0x01 => match cpu.host.peek_key() {
                Some(key) => {
                    cpu.flags.remove(Flags::ZF);
                    cpu.regs.set16(Reg16::AX, key.ax());
                }
                None => cpu.flags.insert(Flags::ZF),
            },
            _ => {
                let state = cpu.host.shift_state();
                cpu.regs.set8(Reg8::AL, state);
            }
        }
    }
}

impl Device for Bios {
    fn services(&self) -> Vec<(u8, Option<u8>)> {
        let mut services: Vec<(u8, Option<u8>)> =
            [0x00, 0x01, 0x02, 0x03, 0x05, 0x06, 0x08, 0x09, 0x0a, 0x0e, 0x0f, 0x11, 0x13]
                .iter()
                .map(|&ah| (0x10, Some(ah)))
                .collect();
        services.push((0x11, None));
        services.push((0x12, None));
        services.push((0x13, Some(0x00)));
        services.push((0x13, Some(0x02)));
        services.push((0x15, Some(0x86)));
        services.push((0x16, Some(0x00)));
        services.push((0x16, Some(0x01)));
        services.push((0x16, Some(0x02)));
        services.push((0x16, Some(0x10)));
        services
    }

    fn interrupt(&mut self, cpu: &mut CPU, int_no: u8, _selector: u8) -> Signal {
        match int_no {
            0x10 => self.video_service(cpu),
            0x11 => cpu.regs.set16(Reg16::AX, EQUIPMENT),
            0x12 => cpu.regs.set16(Reg16::AX, MEMORY_KB),
            0x13 => self.disk_service(cpu),
            0x15 => self.wait_service(cpu),
            _ => self.keyboard_service(cpu),
        }
        Signal::Ok
    }
}
