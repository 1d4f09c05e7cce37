// This is where the dirty grunt work of making sense of our binary input
// happens: prefixes, the primary opcode map, ModR/M and the group
// sub-tables keyed on its reg field.
//
// 0x00..0x3F  ALU families interleaved with segment prefixes and
//             PUSH/POP of segment registers
// 0x40..0x5F  INC/DEC/PUSH/POP on word registers
// 0x60..0x6F  PUSHA/POPA, push immediate
// 0x70..0x7F  Jcc short
// 0x80..0x8F  immediate groups, TEST/XCHG/MOV, LEA, POP r/m
// 0x90..0x9F  XCHG with AX, CBW/CWD, CALL far, PUSHF/POPF, SAHF/LAHF
// 0xA0..0xAF  accumulator moves, string primitives, TEST
// 0xB0..0xBF  MOV register, immediate
// 0xC0..0xCF  shift group, RET/RETF, LES/LDS, MOV r/m imm, INT/IRET
// 0xD0..0xDF  shift group, XLAT (BCD and FPU escapes are invalid here)
// 0xE0..0xEF  LOOP/JCXZ, IN/OUT, CALL/JMP
// 0xF0..0xFF  prefixes, HLT/CMC, unary and inc/dec groups, flag ops

use crate::fields::{Condition, Operand, Size, Value};
use crate::instructions::{AluOp, Instruction, LoopKind, Rep, ShiftCount, ShiftOp, StringOp};
use crate::processor::{Flags, Reg16, Reg32, Reg8, SegReg, CPU};

#[derive(Default)]
struct Prefixes {
    seg: Option<SegReg>,
    rep: Option<Rep>,
    opsize: bool,
}

struct ModRm {
    md: u8,
    reg: u8,
    rm: u8,
}

fn modrm(cpu: &mut CPU) -> ModRm {
    let byte = cpu.fetch8();
    ModRm { md: byte >> 6, reg: (byte >> 3) & 7, rm: byte & 7 }
}

/// Resolve a memory-form ModR/M to a (segment value, offset) pair per
/// the canonical 16-bit effective address table. The default segment is
/// SS for any base involving BP, DS otherwise; an override prefix wins.
fn effective_address(cpu: &mut CPU, m: &ModRm, pfx: &Prefixes) -> (u16, u16) {
    let bx = cpu.regs.get16(Reg16::BX);
    let bp = cpu.regs.get16(Reg16::BP);
    let si = cpu.regs.get16(Reg16::SI);
    let di = cpu.regs.get16(Reg16::DI);
    let (base, uses_bp) = match m.rm {
        0 => (bx.wrapping_add(si), false),
        1 => (bx.wrapping_add(di), false),
        2 => (bp.wrapping_add(si), true),
        3 => (bp.wrapping_add(di), true),
        4 => (si, false),
        5 => (di, false),
        6 if m.md == 0 => (0, false),
        6 => (bp, true),
        _ => (bx, false),
    };
    let displacement = match m.md {
        0 if m.rm == 6 => cpu.fetch16(),
        0 => 0,
        1 => cpu.fetch8() as i8 as i16 as u16,
        _ => cpu.fetch16(),
    };
    let default = if uses_bp { SegReg::SS } else { SegReg::DS };
    let segment = cpu.regs.seg(pfx.seg.unwrap_or(default));
    (segment, base.wrapping_add(displacement))
}

/// The register-or-memory operand. Doubleword width is only valid for
/// the three dword register aliases; anything else is undecodable.
fn rm_operand(cpu: &mut CPU, m: &ModRm, size: Size, pfx: &Prefixes) -> Option<Operand> {
    if m.md == 3 {
        match size {
            Size::Byte => Some(Operand::Reg8(Reg8::from_bits(m.rm))),
            Size::Word => Some(Operand::Reg16(Reg16::from_bits(m.rm))),
            Size::Long => Reg32::from_bits(m.rm).map(Operand::Reg32),
        }
    } else if size == Size::Long {
        None
    } else {
        let (seg, off) = effective_address(cpu, m, pfx);
        Some(Operand::Mem { seg, off, size })
    }
}

fn fetch32(cpu: &mut CPU) -> u32 {
    let low = cpu.fetch16();
    let high = cpu.fetch16();
    (high as u32) << 16 | low as u32
}

fn imm_operand(cpu: &mut CPU, size: Size) -> Operand {
    match size {
        Size::Byte => Operand::Imm(Value::Byte(cpu.fetch8())),
        Size::Word => Operand::Imm(Value::Word(cpu.fetch16())),
        Size::Long => Operand::Imm(Value::Long(fetch32(cpu))),
    }
}

/// The eight-way ALU family shared by opcode rows 0x00..0x3D. `form` is
/// the low octal digit: r/m,r and r,r/m in both widths, then
/// accumulator-immediate. The 0x66 prefix is honoured for the logical
/// subset only.
fn alu_instruction(cpu: &mut CPU, pfx: &Prefixes, op: AluOp, form: u8) -> Option<Instruction> {
    let long = pfx.opsize && matches!(op, AluOp::And | AluOp::Or | AluOp::Xor);
    if pfx.opsize && !long {
        return None;
    }
    let word = if long { Size::Long } else { Size::Word };
    let (dest, src) = match form {
        0 | 2 => {
            let m = modrm(cpu);
            let rm = rm_operand(cpu, &m, Size::Byte, pfx)?;
            let reg = Operand::Reg8(Reg8::from_bits(m.reg));
            if form == 0 { (rm, reg) } else { (reg, rm) }
        }
        1 | 3 => {
            let m = modrm(cpu);
            let rm = rm_operand(cpu, &m, word, pfx)?;
            let reg = if long {
                Operand::Reg32(Reg32::from_bits(m.reg)?)
            } else {
                Operand::Reg16(Reg16::from_bits(m.reg))
            };
            if form == 1 { (rm, reg) } else { (reg, rm) }
        }
        4 => (Operand::Reg8(Reg8::AL), imm_operand(cpu, Size::Byte)),
        _ => {
            let acc = if long { Operand::Reg32(Reg32::EAX) } else { Operand::Reg16(Reg16::AX) };
            (acc, imm_operand(cpu, word))
        }
    };
    Some(Instruction::Alu { op, dest, src })
}

const GRP1_OPS: [AluOp; 8] =
    [AluOp::Add, AluOp::Or, AluOp::Adc, AluOp::Sbb, AluOp::And, AluOp::Sub, AluOp::Xor, AluOp::Cmp];

const GRP2_OPS: [ShiftOp; 8] = [
    ShiftOp::Rol,
    ShiftOp::Ror,
    ShiftOp::Rcl,
    ShiftOp::Rcr,
    ShiftOp::Shl,
    ShiftOp::Shr,
    // reg=6 is the undocumented SAL alias
    ShiftOp::Shl,
    ShiftOp::Sar,
];

fn group1(cpu: &mut CPU, pfx: &Prefixes, opcode: u8) -> Option<Instruction> {
    let m = modrm(cpu);
    let op = GRP1_OPS[m.reg as usize];
    let long = pfx.opsize && matches!(op, AluOp::And | AluOp::Or | AluOp::Xor);
    if pfx.opsize && !long {
        return None;
    }
    let (size, imm_size) = match opcode {
        0x80 | 0x82 => (Size::Byte, Size::Byte),
        0x81 if long => (Size::Long, Size::Long),
        0x81 => (Size::Word, Size::Word),
        _ if long => (Size::Long, Size::Byte),
        _ => (Size::Word, Size::Byte),
    };
    let dest = rm_operand(cpu, &m, size, pfx)?;
    let src = match (opcode, imm_size) {
        // 0x83 sign-extends its byte immediate to the operand width
        (0x83, _) => {
            let byte = cpu.fetch8() as i8 as i32;
            Operand::Imm(size.from(byte))
        }
        (_, imm) => imm_operand(cpu, imm),
    };
    Some(Instruction::Alu { op, dest, src })
}

fn group2(cpu: &mut CPU, pfx: &Prefixes, opcode: u8) -> Option<Instruction> {
    if pfx.opsize {
        return None;
    }
    let m = modrm(cpu);
    let size = if opcode & 1 == 0 { Size::Byte } else { Size::Word };
    let dest = rm_operand(cpu, &m, size, pfx)?;
    let count = match opcode {
        0xc0 | 0xc1 => ShiftCount::Imm(cpu.fetch8()),
        0xd0 | 0xd1 => ShiftCount::One,
        _ => ShiftCount::Cl,
    };
    Some(Instruction::Shift { op: GRP2_OPS[m.reg as usize], dest, count })
}

fn group3(cpu: &mut CPU, pfx: &Prefixes, opcode: u8) -> Option<Instruction> {
    if pfx.opsize {
        return None;
    }
    let m = modrm(cpu);
    let size = if opcode == 0xf6 { Size::Byte } else { Size::Word };
    let rm = rm_operand(cpu, &m, size, pfx)?;
    Some(match m.reg {
        0 | 1 => Instruction::Test { a: rm, b: imm_operand(cpu, size) },
        2 => Instruction::Not(rm),
        3 => Instruction::Neg(rm),
        4 => Instruction::Mul { src: rm, signed: false },
        5 => Instruction::Mul { src: rm, signed: true },
        6 => Instruction::Div { src: rm, signed: false },
        _ => Instruction::Div { src: rm, signed: true },
    })
}

fn group4(cpu: &mut CPU, pfx: &Prefixes) -> Option<Instruction> {
    let m = modrm(cpu);
    let rm = rm_operand(cpu, &m, Size::Byte, pfx)?;
    match m.reg {
        0 => Some(Instruction::Inc(rm)),
        1 => Some(Instruction::Dec(rm)),
        _ => None,
    }
}

fn group5(cpu: &mut CPU, pfx: &Prefixes) -> Option<Instruction> {
    let m = modrm(cpu);
    // The far forms need a memory operand holding offset:segment.
    let far = m.reg == 3 || m.reg == 5;
    if far && m.md == 3 {
        return None;
    }
    let rm = rm_operand(cpu, &m, Size::Word, pfx)?;
    match m.reg {
        0 => Some(Instruction::Inc(rm)),
        1 => Some(Instruction::Dec(rm)),
        2 => Some(Instruction::CallInd { target: rm }),
        3 => Some(Instruction::CallFarInd { mem: rm }),
        4 => Some(Instruction::JmpInd { target: rm }),
        5 => Some(Instruction::JmpFarInd { mem: rm }),
        6 => Some(Instruction::Push(rm)),
        _ => None,
    }
}

fn two_byte(cpu: &mut CPU, pfx: &Prefixes) -> Option<Instruction> {
    let opcode = cpu.fetch8();
    match opcode {
        0x80..=0x8f => {
            let disp = cpu.fetch16() as i16;
            Some(Instruction::Jcc { cond: Condition::from(opcode & 0xf), disp })
        }
        0xb6 | 0xbe => {
            let m = modrm(cpu);
            let src = rm_operand(cpu, &m, Size::Byte, pfx)?;
            Some(Instruction::Movx { reg: Reg16::from_bits(m.reg), src, sign: opcode == 0xbe })
        }
        0xb7 | 0xbf => {
            let m = modrm(cpu);
            let src = rm_operand(cpu, &m, Size::Word, pfx)?;
            Some(Instruction::Movx { reg: Reg16::from_bits(m.reg), src, sign: opcode == 0xbf })
        }
        _ => None,
    }
}

fn string_instruction(cpu: &CPU, pfx: &Prefixes, op: StringOp, size: Size) -> Instruction {
    let segment = cpu.regs.seg(pfx.seg.unwrap_or(SegReg::DS));
    Instruction::Str { op, size, rep: pfx.rep, seg: segment }
}

pub fn parse_instruction(cpu: &mut CPU) -> Option<Instruction> {
    let mut pfx = Prefixes::default();
    let opcode = loop {
        match cpu.fetch8() {
            0x26 => pfx.seg = Some(SegReg::ES),
            0x2e => pfx.seg = Some(SegReg::CS),
            0x36 => pfx.seg = Some(SegReg::SS),
            0x3e => pfx.seg = Some(SegReg::DS),
            // LOCK has no meaning on a single-core machine; the 0x67
            // address-size toggle never changes 16-bit addressing here.
            0xf0 | 0x67 => {}
            0xf2 => pfx.rep = Some(Rep::RepNe),
            0xf3 => pfx.rep = Some(Rep::Rep),
            0x66 => pfx.opsize = true,
            byte => break byte,
        }
    };
    match opcode {
        0x00..=0x05 => alu_instruction(cpu, &pfx, AluOp::Add, opcode & 7),
        0x06 => Some(Instruction::Push(Operand::Seg(SegReg::ES))),
        0x07 => Some(Instruction::Pop(Operand::Seg(SegReg::ES))),
        0x08..=0x0d => alu_instruction(cpu, &pfx, AluOp::Or, opcode & 7),
        0x0e => Some(Instruction::Push(Operand::Seg(SegReg::CS))),
        0x0f => two_byte(cpu, &pfx),
        0x10..=0x15 => alu_instruction(cpu, &pfx, AluOp::Adc, opcode & 7),
        0x16 => Some(Instruction::Push(Operand::Seg(SegReg::SS))),
        0x17 => Some(Instruction::Pop(Operand::Seg(SegReg::SS))),
        0x18..=0x1d => alu_instruction(cpu, &pfx, AluOp::Sbb, opcode & 7),
        0x1e => Some(Instruction::Push(Operand::Seg(SegReg::DS))),
        0x1f => Some(Instruction::Pop(Operand::Seg(SegReg::DS))),
        0x20..=0x25 => alu_instruction(cpu, &pfx, AluOp::And, opcode & 7),
        0x28..=0x2d => alu_instruction(cpu, &pfx, AluOp::Sub, opcode & 7),
        0x30..=0x35 => alu_instruction(cpu, &pfx, AluOp::Xor, opcode & 7),
        0x38..=0x3d => alu_instruction(cpu, &pfx, AluOp::Cmp, opcode & 7),
        0x40..=0x47 => Some(Instruction::Inc(Operand::Reg16(Reg16::from_bits(opcode)))),
        0x48..=0x4f => Some(Instruction::Dec(Operand::Reg16(Reg16::from_bits(opcode)))),
        0x50..=0x57 => Some(Instruction::Push(Operand::Reg16(Reg16::from_bits(opcode)))),
        0x58..=0x5f => Some(Instruction::Pop(Operand::Reg16(Reg16::from_bits(opcode)))),
        0x60 => Some(Instruction::PushA),
        0x61 => Some(Instruction::PopA),
        0x68 => Some(Instruction::Push(imm_operand(cpu, Size::Word))),
        0x6a => {
            let byte = cpu.fetch8() as i8 as i16;
            Some(Instruction::Push(Operand::Imm(Value::Word(byte as u16))))
        }
        0x70..=0x7f => {
            let disp = cpu.fetch8() as i8 as i16;
            Some(Instruction::Jcc { cond: Condition::from(opcode & 0xf), disp })
        }
        0x80..=0x83 => group1(cpu, &pfx, opcode),
        0x84 | 0x85 => {
            let m = modrm(cpu);
            let size = if opcode == 0x84 { Size::Byte } else { Size::Word };
            let rm = rm_operand(cpu, &m, size, &pfx)?;
            let reg = if size == Size::Byte {
                Operand::Reg8(Reg8::from_bits(m.reg))
            } else {
                Operand::Reg16(Reg16::from_bits(m.reg))
            };
            Some(Instruction::Test { a: rm, b: reg })
        }
        0x86 | 0x87 => {
            let m = modrm(cpu);
            let size = if opcode == 0x86 { Size::Byte } else { Size::Word };
            let rm = rm_operand(cpu, &m, size, &pfx)?;
            let reg = if size == Size::Byte {
                Operand::Reg8(Reg8::from_bits(m.reg))
            } else {
                Operand::Reg16(Reg16::from_bits(m.reg))
            };
            Some(Instruction::Xchg { a: reg, b: rm })
        }
        0x88..=0x8b => {
            let m = modrm(cpu);
            let size = if opcode & 1 == 0 { Size::Byte } else { Size::Word };
            let rm = rm_operand(cpu, &m, size, &pfx)?;
            let reg = if size == Size::Byte {
                Operand::Reg8(Reg8::from_bits(m.reg))
            } else {
                Operand::Reg16(Reg16::from_bits(m.reg))
            };
            let (dest, src) = if opcode & 2 == 0 { (rm, reg) } else { (reg, rm) };
            Some(Instruction::Mov { dest, src })
        }
        0x8c => {
            let m = modrm(cpu);
            let rm = rm_operand(cpu, &m, Size::Word, &pfx)?;
            Some(Instruction::Mov { dest: rm, src: Operand::Seg(SegReg::from_bits(m.reg)) })
        }
        0x8d => {
            let m = modrm(cpu);
            if m.md == 3 {
                return None;
            }
            let (_, off) = effective_address(cpu, &m, &pfx);
            Some(Instruction::Lea { reg: Reg16::from_bits(m.reg), off })
        }
        0x8e => {
            let m = modrm(cpu);
            let rm = rm_operand(cpu, &m, Size::Word, &pfx)?;
            Some(Instruction::Mov { dest: Operand::Seg(SegReg::from_bits(m.reg)), src: rm })
        }
        0x8f => {
            let m = modrm(cpu);
            let rm = rm_operand(cpu, &m, Size::Word, &pfx)?;
            Some(Instruction::Pop(rm))
        }
        0x90 => Some(Instruction::Nop),
        0x91..=0x97 => Some(Instruction::Xchg {
            a: Operand::Reg16(Reg16::AX),
            b: Operand::Reg16(Reg16::from_bits(opcode)),
        }),
        0x98 => Some(Instruction::Cbw),
        0x99 => Some(Instruction::Cwd),
        0x9a => {
            let off = cpu.fetch16();
            let seg = cpu.fetch16();
            Some(Instruction::CallFar { seg, off })
        }
        // WAIT is a no-op without an FPU to synchronise with.
        0x9b => Some(Instruction::Nop),
        0x9c => Some(Instruction::PushF),
        0x9d => Some(Instruction::PopF),
        0x9e => Some(Instruction::Sahf),
        0x9f => Some(Instruction::Lahf),
        0xa0..=0xa3 => {
            let off = cpu.fetch16();
            let seg = cpu.regs.seg(pfx.seg.unwrap_or(SegReg::DS));
            let size = if opcode & 1 == 0 { Size::Byte } else { Size::Word };
            let mem = Operand::Mem { seg, off, size };
            let acc = if size == Size::Byte {
                Operand::Reg8(Reg8::AL)
            } else {
                Operand::Reg16(Reg16::AX)
            };
            let (dest, src) = if opcode & 2 == 0 { (acc, mem) } else { (mem, acc) };
            Some(Instruction::Mov { dest, src })
        }
        0xa4 => Some(string_instruction(cpu, &pfx, StringOp::Movs, Size::Byte)),
        0xa5 => Some(string_instruction(cpu, &pfx, StringOp::Movs, Size::Word)),
        0xa6 => Some(string_instruction(cpu, &pfx, StringOp::Cmps, Size::Byte)),
        0xa7 => Some(string_instruction(cpu, &pfx, StringOp::Cmps, Size::Word)),
        0xa8 => Some(Instruction::Test {
            a: Operand::Reg8(Reg8::AL),
            b: imm_operand(cpu, Size::Byte),
        }),
        0xa9 => Some(Instruction::Test {
            a: Operand::Reg16(Reg16::AX),
            b: imm_operand(cpu, Size::Word),
        }),
        0xaa => Some(string_instruction(cpu, &pfx, StringOp::Stos, Size::Byte)),
        0xab => Some(string_instruction(cpu, &pfx, StringOp::Stos, Size::Word)),
        0xac => Some(string_instruction(cpu, &pfx, StringOp::Lods, Size::Byte)),
        0xad => Some(string_instruction(cpu, &pfx, StringOp::Lods, Size::Word)),
        0xae => Some(string_instruction(cpu, &pfx, StringOp::Scas, Size::Byte)),
        0xaf => Some(string_instruction(cpu, &pfx, StringOp::Scas, Size::Word)),
        0xb0..=0xb7 => {
            let imm = imm_operand(cpu, Size::Byte);
            Some(Instruction::Mov { dest: Operand::Reg8(Reg8::from_bits(opcode)), src: imm })
        }
        0xb8..=0xbf => {
            let imm = imm_operand(cpu, Size::Word);
            Some(Instruction::Mov { dest: Operand::Reg16(Reg16::from_bits(opcode)), src: imm })
        }
        0xc0 | 0xc1 => group2(cpu, &pfx, opcode),
        0xc2 => Some(Instruction::RetNear { pop: cpu.fetch16() }),
        0xc3 => Some(Instruction::RetNear { pop: 0 }),
        0xc4 | 0xc5 => {
            let m = modrm(cpu);
            if m.md == 3 {
                return None;
            }
            let mem = rm_operand(cpu, &m, Size::Word, &pfx)?;
            let seg = if opcode == 0xc4 { SegReg::ES } else { SegReg::DS };
            Some(Instruction::Lptr { reg: Reg16::from_bits(m.reg), seg, mem })
        }
        0xc6 | 0xc7 => {
            let m = modrm(cpu);
            let size = if opcode == 0xc6 { Size::Byte } else { Size::Word };
            let rm = rm_operand(cpu, &m, size, &pfx)?;
            let imm = imm_operand(cpu, size);
            Some(Instruction::Mov { dest: rm, src: imm })
        }
        0xc9 => Some(Instruction::Leave),
        0xca => Some(Instruction::RetFar { pop: cpu.fetch16() }),
        0xcb => Some(Instruction::RetFar { pop: 0 }),
        0xcc => Some(Instruction::Int { vector: 3 }),
        0xcd => Some(Instruction::Int { vector: cpu.fetch8() }),
        0xce => Some(Instruction::Into),
        0xcf => Some(Instruction::Iret),
        0xd0..=0xd3 => group2(cpu, &pfx, opcode),
        0xd7 => {
            let seg = cpu.regs.seg(pfx.seg.unwrap_or(SegReg::DS));
            Some(Instruction::Xlat { seg })
        }
        0xe0 => Some(Instruction::Loop { kind: LoopKind::Loopne, disp: cpu.fetch8() as i8 }),
        0xe1 => Some(Instruction::Loop { kind: LoopKind::Loope, disp: cpu.fetch8() as i8 }),
        0xe2 => Some(Instruction::Loop { kind: LoopKind::Loop, disp: cpu.fetch8() as i8 }),
        0xe3 => Some(Instruction::Jcxz { disp: cpu.fetch8() as i8 }),
        0xe4 => Some(Instruction::In {
            dest: Operand::Reg8(Reg8::AL),
            port: imm_operand(cpu, Size::Byte),
        }),
        0xe5 => Some(Instruction::In {
            dest: Operand::Reg16(Reg16::AX),
            port: imm_operand(cpu, Size::Byte),
        }),
        0xe6 => Some(Instruction::Out {
            port: imm_operand(cpu, Size::Byte),
            src: Operand::Reg8(Reg8::AL),
        }),
        0xe7 => Some(Instruction::Out {
            port: imm_operand(cpu, Size::Byte),
            src: Operand::Reg16(Reg16::AX),
        }),
        0xe8 => Some(Instruction::CallNear { disp: cpu.fetch16() as i16 }),
        0xe9 => Some(Instruction::JmpNear { disp: cpu.fetch16() as i16 }),
        0xea => {
            let off = cpu.fetch16();
            let seg = cpu.fetch16();
            Some(Instruction::JmpFar { seg, off })
        }
        0xeb => Some(Instruction::JmpNear { disp: cpu.fetch8() as i8 as i16 }),
        0xec => Some(Instruction::In {
            dest: Operand::Reg8(Reg8::AL),
            port: Operand::Reg16(Reg16::DX),
        }),
        0xed => Some(Instruction::In {
            dest: Operand::Reg16(Reg16::AX),
            port: Operand::Reg16(Reg16::DX),
        }),
        0xee => Some(Instruction::Out {
            port: Operand::Reg16(Reg16::DX),
            src: Operand::Reg8(Reg8::AL),
        }),
        0xef => Some(Instruction::Out {
            port: Operand::Reg16(Reg16::DX),
            src: Operand::Reg16(Reg16::AX),
        }),
        0xf4 => Some(Instruction::Hlt),
        0xf5 => Some(Instruction::Cmc),
        0xf6 | 0xf7 => group3(cpu, &pfx, opcode),
        0xf8 => Some(Instruction::SetFlag { flag: Flags::CF, value: false }),
        0xf9 => Some(Instruction::SetFlag { flag: Flags::CF, value: true }),
        0xfa => Some(Instruction::SetFlag { flag: Flags::IF, value: false }),
        0xfb => Some(Instruction::SetFlag { flag: Flags::IF, value: true }),
        0xfc => Some(Instruction::SetFlag { flag: Flags::DF, value: false }),
        0xfd => Some(Instruction::SetFlag { flag: Flags::DF, value: true }),
        0xfe => group4(cpu, &pfx),
        0xff => group5(cpu, &pfx),
        _ => None,
    }
}
