use crate::devices::Signal;
use crate::fields::{Condition, Operand, Size, Value};
use crate::processor::{Flags, Reg16, Reg8, SegReg, CPU};
use log::debug;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
}

#[derive(Debug, Copy, Clone)]
pub enum ShiftCount {
    One,
    Cl,
    Imm(u8),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StringOp {
    Movs,
    Cmps,
    Stos,
    Lods,
    Scas,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LoopKind {
    Loop,
    Loope,
    Loopne,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Rep {
    Rep,
    RepNe,
}

/// One decoded instruction. The decoder has already resolved operands,
/// displacements and segment overrides, so execution is a flat match.
pub enum Instruction {
    Alu { op: AluOp, dest: Operand, src: Operand },
    Test { a: Operand, b: Operand },
    Mov { dest: Operand, src: Operand },
    Xchg { a: Operand, b: Operand },
    Inc(Operand),
    Dec(Operand),
    Push(Operand),
    Pop(Operand),
    PushF,
    PopF,
    PushA,
    PopA,
    Lahf,
    Sahf,
    Lea { reg: Reg16, off: u16 },
    Lptr { reg: Reg16, seg: SegReg, mem: Operand },
    Xlat { seg: u16 },
    Cbw,
    Cwd,
    Shift { op: ShiftOp, dest: Operand, count: ShiftCount },
    Not(Operand),
    Neg(Operand),
    Mul { src: Operand, signed: bool },
    Div { src: Operand, signed: bool },
    Movx { reg: Reg16, src: Operand, sign: bool },
    Jcc { cond: Condition, disp: i16 },
    Jcxz { disp: i8 },
    JmpNear { disp: i16 },
    JmpFar { seg: u16, off: u16 },
    JmpInd { target: Operand },
    JmpFarInd { mem: Operand },
    CallNear { disp: i16 },
    CallFar { seg: u16, off: u16 },
    CallInd { target: Operand },
    CallFarInd { mem: Operand },
    RetNear { pop: u16 },
    RetFar { pop: u16 },
    Int { vector: u8 },
    Into,
    Iret,
    Loop { kind: LoopKind, disp: i8 },
    Str { op: StringOp, size: Size, rep: Option<Rep>, seg: u16 },
    Leave,
    SetFlag { flag: Flags, value: bool },
    Cmc,
    Hlt,
    In { dest: Operand, port: Operand },
    Out { port: Operand, src: Operand },
    Nop,
}

impl Instruction {
    pub fn execute(&self, cpu: &mut CPU) -> Signal {
        match self {
            Self::Alu { op, dest, src } => {
                let a = dest.read(cpu);
                let b = src.read(cpu);
                let carry = cpu.flags.contains(Flags::CF);
                let (result, flags) = match op {
                    AluOp::Add => a.add(b, false),
                    AluOp::Adc => a.add(b, carry),
                    AluOp::Sub | AluOp::Cmp => a.sub(b, false),
                    AluOp::Sbb => a.sub(b, carry),
                    AluOp::And => a.and(b),
                    AluOp::Or => a.or(b),
                    AluOp::Xor => a.xor(b),
                };
                if *op != AluOp::Cmp {
                    dest.write(cpu, result);
                }
                flags.apply(&mut cpu.flags);
            }
            Self::Test { a, b } => {
                let lhs = a.read(cpu);
                let rhs = b.read(cpu);
                lhs.and(rhs).1.apply(&mut cpu.flags);
            }
            Self::Mov { dest, src } => {
                let value = src.read(cpu);
                dest.write(cpu, value);
            }
            Self::Xchg { a, b } => {
                let left = a.read(cpu);
                let right = b.read(cpu);
                a.write(cpu, right);
                b.write(cpu, left);
            }
            Self::Inc(dest) => {
                let (result, flags) = dest.read(cpu).inc();
                dest.write(cpu, result);
                flags.apply(&mut cpu.flags);
            }
            Self::Dec(dest) => {
                let (result, flags) = dest.read(cpu).dec();
                dest.write(cpu, result);
                flags.apply(&mut cpu.flags);
            }
            Self::Push(source) => {
                let value = source.read(cpu).inner() as u16;
                cpu.push16(value);
            }
            Self::Pop(dest) => {
                let value = cpu.pop16();
                dest.write(cpu, Value::Word(value));
            }
            Self::PushF => {
                let image = cpu.flags.image();
                cpu.push16(image);
            }
            Self::PopF => {
                let image = cpu.pop16();
                cpu.flags = Flags::from_image(image);
            }
            Self::PushA => {
                let original_sp = cpu.regs.get16(Reg16::SP);
                for reg in &[Reg16::AX, Reg16::CX, Reg16::DX, Reg16::BX] {
                    let value = cpu.regs.get16(*reg);
                    cpu.push16(value);
                }
                cpu.push16(original_sp);
                for reg in &[Reg16::BP, Reg16::SI, Reg16::DI] {
                    let value = cpu.regs.get16(*reg);
                    cpu.push16(value);
                }
            }
            Self::PopA => {
                for reg in &[Reg16::DI, Reg16::SI, Reg16::BP] {
                    let value = cpu.pop16();
                    cpu.regs.set16(*reg, value);
                }
                let _discarded_sp = cpu.pop16();
                for reg in &[Reg16::BX, Reg16::DX, Reg16::CX, Reg16::AX] {
                    let value = cpu.pop16();
                    cpu.regs.set16(*reg, value);
                }
            }
            Self::Lahf => {
                cpu.regs.set8(Reg8::AH, cpu.flags.image() as u8);
            }
            Self::Sahf => {
                let image = (cpu.flags.image() & 0xff00) | cpu.regs.get8(Reg8::AH) as u16;
                cpu.flags = Flags::from_image(image);
            }
            Self::Lea { reg, off } => {
                cpu.regs.set16(*reg, *off);
            }
            Self::Lptr { reg, seg, mem } => {
                if let Operand::Mem { seg: base, off, .. } = mem {
                    let offset = cpu.read_seg(*base, *off, Size::Word).inner() as u16;
                    let segment =
                        cpu.read_seg(*base, off.wrapping_add(2), Size::Word).inner() as u16;
                    cpu.regs.set16(*reg, offset);
                    cpu.regs.set_seg(*seg, segment);
                }
            }
            Self::Xlat { seg } => {
                let index = cpu.regs.get16(Reg16::BX).wrapping_add(cpu.regs.get8(Reg8::AL) as u16);
                let value = cpu.read_seg(*seg, index, Size::Byte).inner() as u8;
                cpu.regs.set8(Reg8::AL, value);
            }
            Self::Cbw => {
                let extended = cpu.regs.get8(Reg8::AL) as i8 as i16 as u16;
                cpu.regs.set16(Reg16::AX, extended);
            }
            Self::Cwd => {
                let sign = cpu.regs.get16(Reg16::AX) & 0x8000 != 0;
                cpu.regs.set16(Reg16::DX, if sign { 0xffff } else { 0 });
            }
            Self::Shift { op, dest, count } => {
                let count = match count {
                    ShiftCount::One => 1,
                    ShiftCount::Cl => cpu.regs.get8(Reg8::CL) as u32,
                    ShiftCount::Imm(n) => *n as u32,
                } & 0x1f;
                let value = dest.read(cpu);
                let carry = cpu.flags.contains(Flags::CF);
                let (result, flags) = match op {
                    ShiftOp::Rol => value.rol(count),
                    ShiftOp::Ror => value.ror(count),
                    ShiftOp::Rcl => value.rcl(count, carry),
                    ShiftOp::Rcr => value.rcr(count, carry),
                    ShiftOp::Shl => value.shl(count),
                    ShiftOp::Shr => value.shr(count),
                    ShiftOp::Sar => value.sar(count),
                };
                dest.write(cpu, result);
                flags.apply(&mut cpu.flags);
            }
            Self::Not(dest) => {
                let result = dest.read(cpu).not();
                dest.write(cpu, result);
            }
            Self::Neg(dest) => {
                let (result, flags) = dest.read(cpu).neg();
                dest.write(cpu, result);
                flags.apply(&mut cpu.flags);
            }
            Self::Mul { src, signed } => execute_mul(cpu, src, *signed),
            Self::Div { src, signed } => execute_div(cpu, src, *signed),
            Self::Movx { reg, src, sign } => {
                let value = src.read(cpu);
                let extended =
                    if *sign { value.sign_extend() as u16 } else { value.inner() as u16 };
                cpu.regs.set16(*reg, extended);
            }
            Self::Jcc { cond, disp } => {
                if cond.evaluate(cpu.flags) {
                    cpu.regs.ip = cpu.regs.ip.wrapping_add(*disp as u16);
                }
            }
            Self::Jcxz { disp } => {
                if cpu.regs.get16(Reg16::CX) == 0 {
                    cpu.regs.ip = cpu.regs.ip.wrapping_add(*disp as i16 as u16);
                }
            }
            Self::JmpNear { disp } => {
                cpu.regs.ip = cpu.regs.ip.wrapping_add(*disp as u16);
            }
            Self::JmpFar { seg, off } => {
                cpu.regs.set_seg(SegReg::CS, *seg);
                cpu.regs.ip = *off;
            }
            Self::JmpInd { target } => {
                cpu.regs.ip = target.read(cpu).inner() as u16;
            }
            Self::JmpFarInd { mem } => {
                if let Operand::Mem { seg: base, off, .. } = mem {
                    let offset = cpu.read_seg(*base, *off, Size::Word).inner() as u16;
                    let segment =
                        cpu.read_seg(*base, off.wrapping_add(2), Size::Word).inner() as u16;
                    cpu.regs.set_seg(SegReg::CS, segment);
                    cpu.regs.ip = offset;
                }
            }
            Self::CallNear { disp } => {
                let next = cpu.regs.ip;
                cpu.push16(next);
                cpu.regs.ip = next.wrapping_add(*disp as u16);
            }
            Self::CallFar { seg, off } => {
                let cs = cpu.regs.seg(SegReg::CS);
                cpu.push16(cs);
                let next = cpu.regs.ip;
                cpu.push16(next);
                cpu.regs.set_seg(SegReg::CS, *seg);
                cpu.regs.ip = *off;
            }
            Self::CallInd { target } => {
                let dest = target.read(cpu).inner() as u16;
                let next = cpu.regs.ip;
                cpu.push16(next);
                cpu.regs.ip = dest;
            }
            Self::CallFarInd { mem } => {
                if let Operand::Mem { seg: base, off, .. } = mem {
                    let offset = cpu.read_seg(*base, *off, Size::Word).inner() as u16;
                    let segment =
                        cpu.read_seg(*base, off.wrapping_add(2), Size::Word).inner() as u16;
                    let cs = cpu.regs.seg(SegReg::CS);
                    cpu.push16(cs);
                    let next = cpu.regs.ip;
                    cpu.push16(next);
                    cpu.regs.set_seg(SegReg::CS, segment);
                    cpu.regs.ip = offset;
                }
            }
            Self::RetNear { pop } => {
                cpu.regs.ip = cpu.pop16();
                let sp = cpu.regs.get16(Reg16::SP).wrapping_add(*pop);
                cpu.regs.set16(Reg16::SP, sp);
            }
            Self::RetFar { pop } => {
                cpu.regs.ip = cpu.pop16();
                let cs = cpu.pop16();
                cpu.regs.set_seg(SegReg::CS, cs);
                let sp = cpu.regs.get16(Reg16::SP).wrapping_add(*pop);
                cpu.regs.set16(Reg16::SP, sp);
            }
            Self::Int { vector } => {
                cpu.raise(*vector);
            }
            Self::Into => {
                if cpu.flags.contains(Flags::OF) {
                    cpu.raise(4);
                }
            }
            Self::Iret => {
                cpu.regs.ip = cpu.pop16();
                let cs = cpu.pop16();
                cpu.regs.set_seg(SegReg::CS, cs);
                let image = cpu.pop16();
                cpu.flags = Flags::from_image(image);
            }
            Self::Loop { kind, disp } => {
                let cx = cpu.regs.get16(Reg16::CX).wrapping_sub(1);
                cpu.regs.set16(Reg16::CX, cx);
                let zf = cpu.flags.contains(Flags::ZF);
                let taken = match kind {
                    LoopKind::Loop => cx != 0,
                    LoopKind::Loope => cx != 0 && zf,
                    LoopKind::Loopne => cx != 0 && !zf,
                };
                if taken {
                    cpu.regs.ip = cpu.regs.ip.wrapping_add(*disp as i16 as u16);
                }
            }
            Self::Str { op, size, rep, seg } => execute_string(cpu, *op, *size, *rep, *seg),
            Self::Leave => {
                let bp = cpu.regs.get16(Reg16::BP);
                cpu.regs.set16(Reg16::SP, bp);
                let saved = cpu.pop16();
                cpu.regs.set16(Reg16::BP, saved);
            }
            Self::SetFlag { flag, value } => {
                cpu.flags.set(*flag, *value);
            }
            Self::Cmc => {
                cpu.flags.toggle(Flags::CF);
            }
            Self::Hlt => {
                cpu.halted = true;
            }
            // There is no port hardware behind the bus; reads float low,
            // writes are dropped.
            Self::In { dest, port } => {
                let port = port.read(cpu).inner();
                debug!("in from unwired port {:#06x}", port);
                dest.write(cpu, dest.size().zero());
            }
            Self::Out { port, src } => {
                let port = port.read(cpu).inner();
                let value = src.read(cpu);
                debug!("out {} to unwired port {:#06x}", value, port);
            }
            Self::Nop => {}
        }
        Signal::Ok
    }
}

fn execute_mul(cpu: &mut CPU, src: &Operand, signed: bool) {
    let value = src.read(cpu);
    let mut flags = crate::processor::FlagUpdate::new();
    match value.size() {
        Size::Byte => {
            let al = cpu.regs.get8(Reg8::AL);
            let product = if signed {
                ((al as i8 as i16) * (value.inner() as u8 as i8 as i16)) as u16
            } else {
                al as u16 * value.inner() as u16
            };
            cpu.regs.set16(Reg16::AX, product);
            let significant = if signed {
                product as i16 != product as u8 as i8 as i16
            } else {
                product > 0xff
            };
            flags.cf = Some(significant);
            flags.of = Some(significant);
        }
        _ => {
            let ax = cpu.regs.get16(Reg16::AX);
            let product = if signed {
                ((ax as i16 as i32) * (value.inner() as u16 as i16 as i32)) as u32
            } else {
                ax as u32 * value.inner()
            };
            cpu.regs.set16(Reg16::AX, product as u16);
            cpu.regs.set16(Reg16::DX, (product >> 16) as u16);
            let significant = if signed {
                product as i32 != product as u16 as i16 as i32
            } else {
                product > 0xffff
            };
            flags.cf = Some(significant);
            flags.of = Some(significant);
        }
    }
    flags.apply(&mut cpu.flags);
}

/// DIV/IDIV; a zero divisor or a quotient that does not fit the target
/// register raises the divide error interrupt and leaves the registers
/// untouched.
fn execute_div(cpu: &mut CPU, src: &Operand, signed: bool) {
    let value = src.read(cpu);
    match value.size() {
        Size::Byte => {
            let dividend = cpu.regs.get16(Reg16::AX);
            if signed {
                let divisor = value.inner() as u8 as i8 as i32;
                if divisor == 0 {
                    return cpu.raise(0);
                }
                let quotient = dividend as i16 as i32 / divisor;
                let remainder = dividend as i16 as i32 % divisor;
                if quotient > i8::max_value() as i32 || quotient < i8::min_value() as i32 {
                    return cpu.raise(0);
                }
                cpu.regs.set8(Reg8::AL, quotient as u8);
                cpu.regs.set8(Reg8::AH, remainder as u8);
            } else {
                let divisor = value.inner();
                if divisor == 0 {
                    return cpu.raise(0);
                }
                let quotient = dividend as u32 / divisor;
                if quotient > 0xff {
                    return cpu.raise(0);
                }
                cpu.regs.set8(Reg8::AL, quotient as u8);
                cpu.regs.set8(Reg8::AH, (dividend as u32 % divisor) as u8);
            }
        }
        _ => {
            let dividend =
                (cpu.regs.get16(Reg16::DX) as u32) << 16 | cpu.regs.get16(Reg16::AX) as u32;
            if signed {
                let divisor = value.inner() as u16 as i16 as i64;
                if divisor == 0 {
                    return cpu.raise(0);
                }
                let quotient = dividend as i32 as i64 / divisor;
                let remainder = dividend as i32 as i64 % divisor;
                if quotient > i16::max_value() as i64 || quotient < i16::min_value() as i64 {
                    return cpu.raise(0);
                }
                cpu.regs.set16(Reg16::AX, quotient as u16);
                cpu.regs.set16(Reg16::DX, remainder as u16);
            } else {
                let divisor = value.inner();
                if divisor == 0 {
                    return cpu.raise(0);
                }
                let quotient = dividend / divisor;
                if quotient > 0xffff {
                    return cpu.raise(0);
                }
                cpu.regs.set16(Reg16::AX, quotient as u16);
                cpu.regs.set16(Reg16::DX, (dividend % divisor) as u16);
            }
        }
    }
}

fn accumulator(size: Size) -> Operand {
    match size {
        Size::Byte => Operand::Reg8(Reg8::AL),
        _ => Operand::Reg16(Reg16::AX),
    }
}

fn string_step(cpu: &mut CPU, op: StringOp, size: Size, seg: u16) {
    let delta = if cpu.flags.contains(Flags::DF) {
        (size as u16).wrapping_neg()
    } else {
        size as u16
    };
    let si = cpu.regs.get16(Reg16::SI);
    let di = cpu.regs.get16(Reg16::DI);
    let es = cpu.regs.seg(SegReg::ES);
    match op {
        StringOp::Movs => {
            let value = cpu.read_seg(seg, si, size);
            cpu.write_seg(es, di, value);
            cpu.regs.set16(Reg16::SI, si.wrapping_add(delta));
            cpu.regs.set16(Reg16::DI, di.wrapping_add(delta));
        }
        StringOp::Cmps => {
            let a = cpu.read_seg(seg, si, size);
            let b = cpu.read_seg(es, di, size);
            a.sub(b, false).1.apply(&mut cpu.flags);
            cpu.regs.set16(Reg16::SI, si.wrapping_add(delta));
            cpu.regs.set16(Reg16::DI, di.wrapping_add(delta));
        }
        StringOp::Stos => {
            let value = accumulator(size).read(cpu);
            cpu.write_seg(es, di, value);
            cpu.regs.set16(Reg16::DI, di.wrapping_add(delta));
        }
        StringOp::Lods => {
            let value = cpu.read_seg(seg, si, size);
            accumulator(size).write(cpu, value);
            cpu.regs.set16(Reg16::SI, si.wrapping_add(delta));
        }
        StringOp::Scas => {
            let a = accumulator(size).read(cpu);
            let b = cpu.read_seg(es, di, size);
            a.sub(b, false).1.apply(&mut cpu.flags);
            cpu.regs.set16(Reg16::DI, di.wrapping_add(delta));
        }
    }
}

/// String primitives. A repeat prefix turns the primitive into a loop
/// over CX that re-checks the pause flag between iterations; when a
/// device pauses the machine mid-string, IP is rewound to the prefix
/// byte so the instruction resumes where it left off.
fn execute_string(cpu: &mut CPU, op: StringOp, size: Size, rep: Option<Rep>, seg: u16) {
    let rep = match rep {
        None => {
            string_step(cpu, op, size, seg);
            return;
        }
        Some(rep) => rep,
    };
    loop {
        if cpu.regs.get16(Reg16::CX) == 0 {
            break;
        }
        if cpu.host.paused() {
            cpu.regs.ip = cpu.last_instr_ip;
            break;
        }
        string_step(cpu, op, size, seg);
        let cx = cpu.regs.get16(Reg16::CX).wrapping_sub(1);
        cpu.regs.set16(Reg16::CX, cx);
        if matches!(op, StringOp::Cmps | StringOp::Scas) {
            let zf = cpu.flags.contains(Flags::ZF);
            let done = match rep {
                Rep::Rep => !zf,
                Rep::RepNe => zf,
            };
            if done {
                break;
            }
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Or => "or",
            Self::Adc => "adc",
            Self::Sbb => "sbb",
            Self::And => "and",
            Self::Sub => "sub",
            Self::Xor => "xor",
            Self::Cmp => "cmp",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rol => "rol",
            Self::Ror => "ror",
            Self::Rcl => "rcl",
            Self::Rcr => "rcr",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Sar => "sar",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for StringOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Movs => "movs",
            Self::Cmps => "cmps",
            Self::Stos => "stos",
            Self::Lods => "lods",
            Self::Scas => "scas",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alu { op, dest, src } => write!(f, "{} {}, {}", op, dest, src),
            Self::Test { a, b } => write!(f, "test {}, {}", a, b),
            Self::Mov { dest, src } => write!(f, "mov {}, {}", dest, src),
            Self::Xchg { a, b } => write!(f, "xchg {}, {}", a, b),
            Self::Inc(dest) => write!(f, "inc {}", dest),
            Self::Dec(dest) => write!(f, "dec {}", dest),
            Self::Push(source) => write!(f, "push {}", source),
            Self::Pop(dest) => write!(f, "pop {}", dest),
            Self::PushF => write!(f, "pushf"),
            Self::PopF => write!(f, "popf"),
            Self::PushA => write!(f, "pusha"),
            Self::PopA => write!(f, "popa"),
            Self::Lahf => write!(f, "lahf"),
            Self::Sahf => write!(f, "sahf"),
            Self::Lea { reg, off } => write!(f, "lea {}, [0x{:04x}]", reg, off),
            Self::Lptr { reg, seg, mem } => write!(f, "l{} {}, {}", seg, reg, mem),
            Self::Xlat { .. } => write!(f, "xlat"),
            Self::Cbw => write!(f, "cbw"),
            Self::Cwd => write!(f, "cwd"),
            Self::Shift { op, dest, count } => match count {
                ShiftCount::One => write!(f, "{} {}, 1", op, dest),
                ShiftCount::Cl => write!(f, "{} {}, cl", op, dest),
                ShiftCount::Imm(n) => write!(f, "{} {}, {}", op, dest, n),
            },
            Self::Not(dest) => write!(f, "not {}", dest),
            Self::Neg(dest) => write!(f, "neg {}", dest),
            Self::Mul { src, signed: false } => write!(f, "mul {}", src),
            Self::Mul { src, signed: true } => write!(f, "imul {}", src),
            Self::Div { src, signed: false } => write!(f, "div {}", src),
            Self::Div { src, signed: true } => write!(f, "idiv {}", src),
            Self::Movx { reg, src, sign } => {
                write!(f, "mov{}x {}, {}", if *sign { 's' } else { 'z' }, reg, src)
            }
            Self::Jcc { cond, disp } => write!(f, "j{} {:+}", cond, disp),
            Self::Jcxz { disp } => write!(f, "jcxz {:+}", disp),
            Self::JmpNear { disp } => write!(f, "jmp {:+}", disp),
            Self::JmpFar { seg, off } => write!(f, "jmp {:04x}:{:04x}", seg, off),
            Self::JmpInd { target } => write!(f, "jmp {}", target),
            Self::JmpFarInd { mem } => write!(f, "jmp far {}", mem),
            Self::CallNear { disp } => write!(f, "call {:+}", disp),
            Self::CallFar { seg, off } => write!(f, "call {:04x}:{:04x}", seg, off),
            Self::CallInd { target } => write!(f, "call {}", target),
            Self::CallFarInd { mem } => write!(f, "call far {}", mem),
            Self::RetNear { pop: 0 } => write!(f, "ret"),
            Self::RetNear { pop } => write!(f, "ret {}", pop),
            Self::RetFar { pop: 0 } => write!(f, "retf"),
            Self::RetFar { pop } => write!(f, "retf {}", pop),
            Self::Int { vector } => write!(f, "int 0x{:02x}", vector),
            Self::Into => write!(f, "into"),
            Self::Iret => write!(f, "iret"),
            Self::Loop { kind, disp } => {
                let name = match kind {
                    LoopKind::Loop => "loop",
                    LoopKind::Loope => "loope",
                    LoopKind::Loopne => "loopne",
                };
                write!(f, "{} {:+}", name, disp)
            }
            Self::Str { op, size, rep, .. } => {
                let prefix = match rep {
                    Some(Rep::Rep) => "rep ",
                    Some(Rep::RepNe) => "repne ",
                    None => "",
                };
                let width = if *size == Size::Byte { 'b' } else { 'w' };
                write!(f, "{}{}{}", prefix, op, width)
            }
            Self::Leave => write!(f, "leave"),
            Self::SetFlag { flag, value } => {
                let name = if *flag == Flags::CF {
                    if *value { "stc" } else { "clc" }
                } else if *flag == Flags::IF {
                    if *value { "sti" } else { "cli" }
                } else if *value {
                    "std"
                } else {
                    "cld"
                };
                write!(f, "{}", name)
            }
            Self::Cmc => write!(f, "cmc"),
            Self::Hlt => write!(f, "hlt"),
            Self::In { dest, port } => write!(f, "in {}, {}", dest, port),
            Self::Out { port, src } => write!(f, "out {}, {}", port, src),
            Self::Nop => write!(f, "nop"),
        }
    }
}
