use em8086::devices::{KeyStroke, Signal, Video};
use em8086::pc::ibm_pc;
use em8086::Emulator;
use minifb::{InputCallback, Key, KeyRepeat, Window, WindowOptions};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::sync::Arc;
use termion::{clear, color, cursor};

const WINDOW_WIDTH: usize = 640;
const WINDOW_HEIGHT: usize = 480;

const EGA_PALETTE: [u32; 16] = [
    0x000000, 0x0000aa, 0x00aa00, 0x00aaaa, 0xaa0000, 0xaa00aa, 0xaa5500, 0xaaaaaa, 0x555555,
    0x5555ff, 0x55ff55, 0x55ffff, 0xff5555, 0xff55ff, 0xffff55, 0xffffff,
];

const CGA_PALETTE: [u32; 4] = [0x000000, 0x55ffff, 0xff55ff, 0xffffff];

// font8x8 (public domain), printable ASCII only; bit 0 is the leftmost
// pixel of a row.
#[rustfmt::skip]
const FONT_8X8: [[u8; 8]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x18, 0x3c, 0x3c, 0x18, 0x18, 0x00, 0x18, 0x00], // !
    [0x36, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // "
    [0x36, 0x36, 0x7f, 0x36, 0x7f, 0x36, 0x36, 0x00], // #
    [0x0c, 0x3e, 0x03, 0x1e, 0x30, 0x1f, 0x0c, 0x00], // $
    [0x00, 0x63, 0x33, 0x18, 0x0c, 0x66, 0x63, 0x00], // %
    [0x1c, 0x36, 0x1c, 0x6e, 0x3b, 0x33, 0x6e, 0x00], // &
    [0x06, 0x06, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00], // '
    [0x18, 0x0c, 0x06, 0x06, 0x06, 0x0c, 0x18, 0x00], // (
    [0x06, 0x0c, 0x18, 0x18, 0x18, 0x0c, 0x06, 0x00], // )
    [0x00, 0x66, 0x3c, 0xff, 0x3c, 0x66, 0x00, 0x00], // *
    [0x00, 0x0c, 0x0c, 0x3f, 0x0c, 0x0c, 0x00, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c, 0x06], // ,
    [0x00, 0x00, 0x00, 0x3f, 0x00, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c, 0x00], // .
    [0x60, 0x30, 0x18, 0x0c, 0x06, 0x03, 0x01, 0x00], // /
    [0x3e, 0x63, 0x73, 0x7b, 0x6f, 0x67, 0x3e, 0x00], // 0
    [0x0c, 0x0e, 0x0c, 0x0c, 0x0c, 0x0c, 0x3f, 0x00], // 1
    [0x1e, 0x33, 0x30, 0x1c, 0x06, 0x33, 0x3f, 0x00], // 2
    [0x1e, 0x33, 0x30, 0x1c, 0x30, 0x33, 0x1e, 0x00], // 3
    [0x38, 0x3c, 0x36, 0x33, 0x7f, 0x30, 0x78, 0x00], // 4
    [0x3f, 0x03, 0x1f, 0x30, 0x30, 0x33, 0x1e, 0x00], // 5
    [0x1c, 0x06, 0x03, 0x1f, 0x33, 0x33, 0x1e, 0x00], // 6
    [0x3f, 0x33, 0x30, 0x18, 0x0c, 0x0c, 0x0c, 0x00], // 7
    [0x1e, 0x33, 0x33, 0x1e, 0x33, 0x33, 0x1e, 0x00], // 8
    [0x1e, 0x33, 0x33, 0x3e, 0x30, 0x18, 0x0e, 0x00], // 9
    [0x00, 0x0c, 0x0c, 0x00, 0x00, 0x0c, 0x0c, 0x00], // :
    [0x00, 0x0c, 0x0c, 0x00, 0x00, 0x0c, 0x0c, 0x06], // ;
    [0x18, 0x0c, 0x06, 0x03, 0x06, 0x0c, 0x18, 0x00], // <
    [0x00, 0x00, 0x3f, 0x00, 0x00, 0x3f, 0x00, 0x00], // =
    [0x06, 0x0c, 0x18, 0x30, 0x18, 0x0c, 0x06, 0x00], // >
    [0x1e, 0x33, 0x30, 0x18, 0x0c, 0x00, 0x0c, 0x00], // ?
    [0x3e, 0x63, 0x7b, 0x7b, 0x7b, 0x03, 0x1e, 0x00], // @
    [0x0c, 0x1e, 0x33, 0x33, 0x3f, 0x33, 0x33, 0x00], // A
    [0x3f, 0x66, 0x66, 0x3e, 0x66, 0x66, 0x3f, 0x00], // B
    [0x3c, 0x66, 0x03, 0x03, 0x03, 0x66, 0x3c, 0x00], // C
    [0x1f, 0x36, 0x66, 0x66, 0x66, 0x36, 0x1f, 0x00], // D
    [0x7f, 0x46, 0x16, 0x1e, 0x16, 0x46, 0x7f, 0x00], // E
    [0x7f, 0x46, 0x16, 0x1e, 0x16, 0x06, 0x0f, 0x00], // F
    [0x3c, 0x66, 0x03, 0x03, 0x73, 0x66, 0x7c, 0x00], // G
    [0x33, 0x33, 0x33, 0x3f, 0x33, 0x33, 0x33, 0x00], // H
    [0x1e, 0x0c, 0x0c, 0x0c, 0x0c, 0x0c, 0x1e, 0x00], // I
    [0x78, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1e, 0x00], // J
    [0x67, 0x66, 0x36, 0x1e, 0x36, 0x66, 0x67, 0x00], // K
    [0x0f, 0x06, 0x06, 0x06, 0x46, 0x66, 0x7f, 0x00], // L
    [0x63, 0x77, 0x7f, 0x7f, 0x6b, 0x63, 0x63, 0x00], // M
    [0x63, 0x67, 0x6f, 0x7b, 0x73, 0x63, 0x63, 0x00], // N
    [0x1c, 0x36, 0x63, 0x63, 0x63, 0x36, 0x1c, 0x00], // O
    [0x3f, 0x66, 0x66, 0x3e, 0x06, 0x06, 0x0f, 0x00], // P
    [0x1e, 0x33, 0x33, 0x33, 0x3b, 0x1e, 0x38, 0x00], // Q
    [0x3f, 0x66, 0x66, 0x3e, 0x36, 0x66, 0x67, 0x00], // R
    [0x1e, 0x33, 0x07, 0x0e, 0x38, 0x33, 0x1e, 0x00], // S
    [0x3f, 0x2d, 0x0c, 0x0c, 0x0c, 0x0c, 0x1e, 0x00], // T
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3f, 0x00], // U
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x1e, 0x0c, 0x00], // V
    [0x63, 0x63, 0x63, 0x6b, 0x7f, 0x77, 0x63, 0x00], // W
    [0x63, 0x63, 0x36, 0x1c, 0x1c, 0x36, 0x63, 0x00], // X
    [0x33, 0x33, 0x33, 0x1e, 0x0c, 0x0c, 0x1e, 0x00], // Y
    [0x7f, 0x63, 0x31, 0x18, 0x4c, 0x66, 0x7f, 0x00], // Z
    [0x1e, 0x06, 0x06, 0x06, 0x06, 0x06, 0x1e, 0x00], // [
    [0x03, 0x06, 0x0c, 0x18, 0x30, 0x60, 0x40, 0x00], // backslash
    [0x1e, 0x18, 0x18, 0x18, 0x18, 0x18, 0x1e, 0x00], // ]
    [0x08, 0x1c, 0x36, 0x63, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff], // _
    [0x0c, 0x0c, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x1e, 0x30, 0x3e, 0x33, 0x6e, 0x00], // a
    [0x07, 0x06, 0x06, 0x3e, 0x66, 0x66, 0x3b, 0x00], // b
    [0x00, 0x00, 0x1e, 0x33, 0x03, 0x33, 0x1e, 0x00], // c
    [0x38, 0x30, 0x30, 0x3e, 0x33, 0x33, 0x6e, 0x00], // d
    [0x00, 0x00, 0x1e, 0x33, 0x3f, 0x03, 0x1e, 0x00], // e
    [0x1c, 0x36, 0x06, 0x0f, 0x06, 0x06, 0x0f, 0x00], // f
    [0x00, 0x00, 0x6e, 0x33, 0x33, 0x3e, 0x30, 0x1f], // g
    [0x07, 0x06, 0x36, 0x6e, 0x66, 0x66, 0x67, 0x00], // h
    [0x0c, 0x00, 0x0e, 0x0c, 0x0c, 0x0c, 0x1e, 0x00], // i
    [0x30, 0x00, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1e], // j
    [0x07, 0x06, 0x66, 0x36, 0x1e, 0x36, 0x67, 0x00], // k
    [0x0e, 0x0c, 0x0c, 0x0c, 0x0c, 0x0c, 0x1e, 0x00], // l
    [0x00, 0x00, 0x33, 0x7f, 0x7f, 0x6b, 0x63, 0x00], // m
    [0x00, 0x00, 0x1f, 0x33, 0x33, 0x33, 0x33, 0x00], // n
    [0x00, 0x00, 0x1e, 0x33, 0x33, 0x33, 0x1e, 0x00], // o
    [0x00, 0x00, 0x3b, 0x66, 0x66, 0x3e, 0x06, 0x0f], // p
    [0x00, 0x00, 0x6e, 0x33, 0x33, 0x3e, 0x30, 0x78], // q
    [0x00, 0x00, 0x3b, 0x6e, 0x66, 0x06, 0x0f, 0x00], // r
    [0x00, 0x00, 0x3e, 0x03, 0x1e, 0x30, 0x1f, 0x00], // s
    [0x08, 0x0c, 0x3e, 0x0c, 0x0c, 0x2c, 0x18, 0x00], // t
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x33, 0x6e, 0x00], // u
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x1e, 0x0c, 0x00], // v
    [0x00, 0x00, 0x63, 0x6b, 0x7f, 0x7f, 0x36, 0x00], // w
    [0x00, 0x00, 0x63, 0x36, 0x1c, 0x36, 0x63, 0x00], // x
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x3e, 0x30, 0x1f], // y
    [0x00, 0x00, 0x3f, 0x19, 0x0c, 0x26, 0x3f, 0x00], // z
    [0x38, 0x0c, 0x0c, 0x07, 0x0c, 0x0c, 0x38, 0x00], // {
    [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00], // |
    [0x07, 0x0c, 0x0c, 0x38, 0x0c, 0x0c, 0x07, 0x00], // }
    [0x6e, 0x3b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ~
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // del
];

fn glyph(ch: u8) -> &'static [u8; 8] {
    FONT_8X8.get(ch.wrapping_sub(0x20) as usize).unwrap_or(&FONT_8X8[0])
}

/// PC scan code (set 1) for the keys the input callback can deliver.
fn scancode(ascii: u8) -> u8 {
    match ascii.to_ascii_lowercase() {
        b'1'..=b'9' => ascii - b'1' + 0x02,
        b'0' => 0x0b,
        b'q' => 0x10,
        b'w' => 0x11,
        b'e' => 0x12,
        b'r' => 0x13,
        b't' => 0x14,
        b'y' => 0x15,
        b'u' => 0x16,
        b'i' => 0x17,
        b'o' => 0x18,
        b'p' => 0x19,
        b'a' => 0x1e,
        b's' => 0x1f,
        b'd' => 0x20,
        b'f' => 0x21,
        b'g' => 0x22,
        b'h' => 0x23,
        b'j' => 0x24,
        b'k' => 0x25,
        b'l' => 0x26,
        b'z' => 0x2c,
        b'x' => 0x2d,
        b'c' => 0x2e,
        b'v' => 0x2f,
        b'b' => 0x30,
        b'n' => 0x31,
        b'm' => 0x32,
        b' ' => 0x39,
        0x0d => 0x1c,
        0x08 => 0x0e,
        0x09 => 0x0f,
        0x1b => 0x01,
        _ => 0,
    }
}

struct CharInput {
    host: em8086::devices::HostPtr,
}

impl InputCallback for CharInput {
    fn add_char(&mut self, uni_char: u32) {
        if (0x20..0x7f).contains(&uni_char) {
            let ascii = uni_char as u8;
            self.host.push_key(KeyStroke { scancode: scancode(ascii), ascii });
        }
    }
}

fn pump_special_keys(window: &Window, host: &em8086::devices::HostPtr) {
    for &(key, ascii) in
        &[(Key::Enter, 0x0du8), (Key::Backspace, 0x08), (Key::Tab, 0x09)]
    {
        if window.is_key_pressed(key, KeyRepeat::Yes) {
            host.push_key(KeyStroke { scancode: scancode(ascii), ascii });
        }
    }
    let mut shift_state = 0u8;
    if window.is_key_down(Key::RightShift) {
        shift_state |= 0x01;
    }
    if window.is_key_down(Key::LeftShift) {
        shift_state |= 0x02;
    }
    if window.is_key_down(Key::LeftCtrl) || window.is_key_down(Key::RightCtrl) {
        shift_state |= 0x04;
    }
    if window.is_key_down(Key::LeftAlt) || window.is_key_down(Key::RightAlt) {
        shift_state |= 0x08;
    }
    host.set_shift_state(shift_state);
}

fn render(video: &Video, blink_phase: bool, buffer: &mut [u32]) {
    for pixel in buffer.iter_mut() {
        *pixel = 0;
    }
    if video.mode.text {
        render_text(video, blink_phase, buffer);
    } else {
        render_graphics(video, buffer);
    }
}

fn render_text(video: &Video, blink_phase: bool, buffer: &mut [u32]) {
    let mode = video.mode;
    let page = video.active_page;
    // 8x8 glyphs, rows doubled so 25 lines fill 400 of the 480 window
    // lines; 40-column modes also double horizontally.
    let scale_x = (WINDOW_WIDTH / (mode.cols as usize * 8)).max(1);
    let scale_y = (WINDOW_HEIGHT / (mode.rows as usize * 8)).max(1);
    let cursor = video.cursor(page);
    for row in 0..mode.rows as usize {
        for col in 0..mode.cols as usize {
            let (ch, attr) = video.cell(page, row as u8, col as u8);
            let fg = EGA_PALETTE[(attr & 0x0f) as usize];
            let bg = EGA_PALETTE[(attr >> 4 & 0x07) as usize];
            let hidden = attr & 0x80 != 0 && blink_phase;
            let bitmap = glyph(ch);
            for y in 0..8 * scale_y {
                let line = bitmap[y / scale_y];
                for x in 0..8 * scale_x {
                    let lit = !hidden && line >> (x / scale_x) & 1 != 0;
                    let px = col * 8 * scale_x + x;
                    let py = row * 8 * scale_y + y;
                    buffer[py * WINDOW_WIDTH + px] = if lit { fg } else { bg };
                }
            }
            if blink_phase && (row as u8, col as u8) == cursor {
                for y in 8 * scale_y - 2..8 * scale_y {
                    for x in 0..8 * scale_x {
                        let px = col * 8 * scale_x + x;
                        let py = row * 8 * scale_y + y;
                        buffer[py * WINDOW_WIDTH + px] = fg;
                    }
                }
            }
        }
    }
}

fn render_graphics(video: &Video, buffer: &mut [u32]) {
    let mode = video.mode;
    let base = mode.base - em8086::devices::VRAM_BASE;
    let scale = (WINDOW_WIDTH / mode.width as usize).max(1);
    for y in 0..mode.height as usize {
        for x in 0..mode.width as usize {
            let color = match mode.number {
                // CGA 320x200x4: two bits per pixel, interleaved scanlines
                0x04 => {
                    let offset = base + (y & 1) * 0x2000 + y / 2 * 80 + x / 4;
                    let shift = 6 - 2 * (x % 4);
                    CGA_PALETTE[(video.vram[offset] >> shift & 3) as usize]
                }
                // 320x200x256, one byte per pixel
                0x13 => {
                    let index = video.vram[base + y * 320 + x];
                    if index < 16 {
                        EGA_PALETTE[index as usize]
                    } else {
                        let level = index as u32;
                        level << 16 | level << 8 | level
                    }
                }
                // 640x480 bitmap modes, plane 0 rendered monochrome
                _ => {
                    let offset = base + y * 80 + x / 8;
                    let bit = video.vram[offset] >> (7 - x % 8) & 1;
                    if bit != 0 {
                        0xffffff
                    } else {
                        0x000000
                    }
                }
            };
            for sy in 0..scale {
                for sx in 0..scale {
                    let px = x * scale + sx;
                    let py = y * scale + sy;
                    if px < WINDOW_WIDTH && py < WINDOW_HEIGHT {
                        buffer[py * WINDOW_WIDTH + px] = color;
                    }
                }
            }
        }
    }
}

#[derive(PartialEq, Clone)]
enum DebugCommand {
    Quit,
    Step,
    Continue,
    SetBreakpoint(Option<String>),
    DeleteBreakpoint(Option<String>),
}

struct Debugger {
    code_running: bool,
    breakpoints: HashSet<u16>,
    last_cmd: DebugCommand,
}

impl Debugger {
    fn new() -> Self {
        Debugger { code_running: false, breakpoints: HashSet::new(), last_cmd: DebugCommand::Step }
    }
    fn draw_user_interface(&self, emulator: &Emulator) {
        print!("{}{}", clear::All, cursor::Goto(1, 1));
        println!("{}", emulator.cpu);
        println!(
            "{}Debugger attached.{} Enter n to single step, c to continue, b/d <addr> to set/delete a breakpoint, q to quit.",
            color::Fg(color::Green),
            color::Fg(color::Reset),
        );
        if !self.breakpoints.is_empty() {
            let mut sorted: Vec<&u16> = self.breakpoints.iter().collect();
            sorted.sort();
            let list: Vec<String> = sorted.iter().map(|bp| format!("{:04x}", bp)).collect();
            println!("Breakpoints: {}", list.join(" "));
        }
        print!("> ");
        io::stdout().flush().expect("");
    }
    fn get_command(&mut self) -> DebugCommand {
        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap();
        let mut cmd = input.split_whitespace();
        match cmd.next() {
            Some("q") => DebugCommand::Quit,
            Some("s") | Some("n") => DebugCommand::Step,
            Some("c") => DebugCommand::Continue,
            Some("b") => DebugCommand::SetBreakpoint(cmd.next().map(String::from)),
            Some("d") => DebugCommand::DeleteBreakpoint(cmd.next().map(String::from)),
            _ => self.last_cmd.clone(),
        }
    }
    fn update(&mut self, emulator: &mut Emulator) -> Signal {
        if self.code_running && !self.breakpoints.contains(&emulator.ip()) {
            return emulator.cpu.step();
        }
        self.code_running = false;
        self.draw_user_interface(emulator);
        let cmd = self.get_command();
        match &cmd {
            DebugCommand::Quit => Signal::Quit,
            DebugCommand::Step => {
                self.last_cmd = cmd;
                emulator.cpu.step()
            }
            DebugCommand::Continue => {
                self.code_running = true;
                emulator.cpu.step()
            }
            DebugCommand::SetBreakpoint(addr) => {
                if let Some(addr) = parse_address(addr) {
                    self.breakpoints.insert(addr);
                } else {
                    println!("Invalid address!");
                }
                Signal::NoOp
            }
            DebugCommand::DeleteBreakpoint(addr) => {
                if let Some(addr) = parse_address(addr) {
                    self.breakpoints.remove(&addr);
                } else {
                    println!("Invalid address!");
                }
                Signal::NoOp
            }
        }
    }
}

fn parse_address(address: &Option<String>) -> Option<u16> {
    match address {
        Some(addr) => u16::from_str_radix(addr, 16).ok(),
        None => None,
    }
}

fn main() {
    env_logger::init();
    let mut debug = false;
    let mut ignore_magic = false;
    let mut image_path = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--debug" => debug = true,
            "--ignore-magic" => ignore_magic = true,
            path => image_path = Some(path.to_string()),
        }
    }
    let image_path = image_path.unwrap_or_else(|| {
        eprintln!("usage: mypc [--debug] [--ignore-magic] <boot image>");
        std::process::exit(2);
    });
    let image = fs::read(&image_path).expect("Boot image does not exist!");

    let mut config = ibm_pc(image.clone());
    config.ignore_magic = ignore_magic;
    let mut emulator = Emulator::new(config);
    if let Err(error) = emulator.boot(&image) {
        eprintln!("boot failed: {}", error);
        std::process::exit(1);
    }

    let host = emulator.host();
    let video = emulator.video();

    let blink_timer = timer::Timer::new();
    let blink_host = Arc::clone(&host);
    let blink_guard = blink_timer
        .schedule_repeating(chrono::Duration::milliseconds(250), move || blink_host.toggle_blink());

    let mut window =
        Window::new("mypc - ESC to exit", WINDOW_WIDTH, WINDOW_HEIGHT, WindowOptions::default())
            .unwrap_or_else(|e| {
                panic!("{}", e);
            });
    window.set_input_callback(Box::new(CharInput { host: Arc::clone(&host) }));
    let mut buffer: Vec<u32> = vec![0; WINDOW_WIDTH * WINDOW_HEIGHT];
    let mut debugger = if debug { Some(Debugger::new()) } else { None };

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let signal = match debugger.as_mut() {
            Some(debugger) => debugger.update(&mut emulator),
            None => emulator.tick(),
        };
        match signal {
            Signal::Quit => break,
            // A halted or paused machine still pumps the window so the
            // screen stays visible and keys keep flowing in.
            _ => {}
        }
        pump_special_keys(&window, &host);
        render(&video.borrow(), host.blink_phase(), &mut buffer);
        window
            .update_with_buffer(&buffer, WINDOW_WIDTH, WINDOW_HEIGHT)
            .expect("Error updating screen!");
    }
    emulator.stop();
    drop(blink_guard);
}
