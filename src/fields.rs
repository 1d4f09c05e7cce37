// Rich types for operand fields and ALU results; rather than have magic
// numbers everywhere, we opt for tagged values wherever it is not too
// ridiculous. The parser is the naturally messy code responsible for
// constructing said rich types, the executor consumes them.
//
// All flag math lives here as methods on Value, so every arithmetic
// instruction derives its flag tuple from the same routines.

use crate::conversions::Truncate;
use crate::processor::{FlagUpdate, Flags, Reg16, Reg32, Reg8, SegReg, CPU};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Size {
    Byte = 1,
    Word = 2,
    Long = 4,
}

impl Size {
    pub fn from<T>(&self, res: T) -> Value
    where
        T: Truncate<u8> + Truncate<u16> + Truncate<u32>,
    {
        match *self {
            Self::Byte => Value::Byte(res.truncate()),
            Self::Word => Value::Word(res.truncate()),
            Self::Long => Value::Long(res.truncate()),
        }
    }
    pub fn zero(&self) -> Value {
        self.from(0u8)
    }
    pub fn bits(&self) -> u32 {
        match *self {
            Self::Byte => 8,
            Self::Word => 16,
            Self::Long => 32,
        }
    }
    pub fn mask(&self) -> u32 {
        match *self {
            Self::Byte => 0xff,
            Self::Word => 0xffff,
            Self::Long => 0xffff_ffff,
        }
    }
    pub fn sign_bit(&self) -> u32 {
        1 << (self.bits() - 1)
    }
}

/// Even parity of the low byte, i.e. the value of PF.
pub fn parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 0
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Word(u16),
    Long(u32),
}

impl Value {
    pub fn inner(&self) -> u32 {
        match *self {
            Self::Byte(b) => b as u32,
            Self::Word(w) => w as u32,
            Self::Long(l) => l,
        }
    }
    pub fn sign_extend(&self) -> i32 {
        match *self {
            Self::Byte(b) => b as i8 as i32,
            Self::Word(w) => w as i16 as i32,
            Self::Long(l) => l as i32,
        }
    }
    pub fn size(&self) -> Size {
        match self {
            Self::Byte(_) => Size::Byte,
            Self::Word(_) => Size::Word,
            Self::Long(_) => Size::Long,
        }
    }
    fn msb(&self) -> bool {
        self.inner() & self.size().sign_bit() != 0
    }

    /// ZF/SF/PF tuple every arithmetic result carries.
    fn result_flags(result: Value) -> FlagUpdate {
        let mut flags = FlagUpdate::new();
        flags.zf = Some(result.inner() == 0);
        flags.sf = Some(result.msb());
        flags.pf = Some(parity(result.inner() as u8));
        flags
    }

    pub fn add(&self, other: Value, carry: bool) -> (Value, FlagUpdate) {
        let size = self.size();
        let a = self.inner();
        let b = other.inner();
        let wide = a as u64 + b as u64 + carry as u64;
        let result = size.from(wide);
        let res = result.inner();
        let mut flags = Self::result_flags(result);
        flags.cf = Some(wide > size.mask() as u64);
        flags.of = Some((a ^ res) & (b ^ res) & size.sign_bit() != 0);
        flags.af = Some((a ^ b ^ res) & 0x10 != 0);
        (result, flags)
    }
    pub fn sub(&self, other: Value, borrow: bool) -> (Value, FlagUpdate) {
        let size = self.size();
        let a = self.inner();
        let b = other.inner();
        let result = size.from(a.wrapping_sub(b).wrapping_sub(borrow as u32));
        let res = result.inner();
        let mut flags = Self::result_flags(result);
        flags.cf = Some(b as u64 + borrow as u64 > a as u64);
        flags.of = Some((a ^ b) & (a ^ res) & size.sign_bit() != 0);
        flags.af = Some((a ^ b ^ res) & 0x10 != 0);
        (result, flags)
    }
    // INC/DEC leave the carry flag alone.
    pub fn inc(&self) -> (Value, FlagUpdate) {
        let (result, mut flags) = self.add(self.size().from(1u8), false);
        flags.cf = None;
        (result, flags)
    }
    pub fn dec(&self) -> (Value, FlagUpdate) {
        let (result, mut flags) = self.sub(self.size().from(1u8), false);
        flags.cf = None;
        (result, flags)
    }
    pub fn neg(&self) -> (Value, FlagUpdate) {
        let (result, mut flags) = self.size().zero().sub(*self, false);
        flags.cf = Some(self.inner() != 0);
        flags.of = Some(self.inner() == self.size().sign_bit());
        (result, flags)
    }
    pub fn and(&self, other: Value) -> (Value, FlagUpdate) {
        self.bitwise_op(other, |a, b| a & b)
    }
    pub fn or(&self, other: Value) -> (Value, FlagUpdate) {
        self.bitwise_op(other, |a, b| a | b)
    }
    pub fn xor(&self, other: Value) -> (Value, FlagUpdate) {
        self.bitwise_op(other, |a, b| a ^ b)
    }
    pub fn not(&self) -> Value {
        self.size().from(!self.inner())
    }
    fn bitwise_op<T>(&self, other: Value, fun: T) -> (Value, FlagUpdate)
    where
        T: Fn(u32, u32) -> u32,
    {
        let result = self.size().from(fun(self.inner(), other.inner()));
        let mut flags = Self::result_flags(result);
        flags.cf = Some(false);
        flags.of = Some(false);
        (result, flags)
    }

    // Shift counts arrive already masked to five bits; a zero count
    // leaves both the value and the flags untouched.
    pub fn shl(&self, count: u32) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        let a = self.inner();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let result = if count < bits { size.from(a << count) } else { size.zero() };
        let carry = count <= bits && (a >> (bits - count)) & 1 != 0;
        let mut flags = Self::result_flags(result);
        flags.cf = Some(carry);
        if count == 1 {
            flags.of = Some(result.msb() != carry);
        }
        (result, flags)
    }
    pub fn shr(&self, count: u32) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        let a = self.inner();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let result = if count < bits { size.from(a >> count) } else { size.zero() };
        let carry = count <= bits && (a >> (count - 1)) & 1 != 0;
        let mut flags = Self::result_flags(result);
        flags.cf = Some(carry);
        if count == 1 {
            flags.of = Some(self.msb());
        }
        (result, flags)
    }
    pub fn sar(&self, count: u32) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        let a = self.sign_extend();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let (result, carry) = if count < bits {
            (size.from(a >> count), (a >> (count - 1)) & 1 != 0)
        } else {
            (size.from(a >> (bits - 1)), a < 0)
        };
        let mut flags = Self::result_flags(result);
        flags.cf = Some(carry);
        if count == 1 {
            flags.of = Some(false);
        }
        (result, flags)
    }
    // Rotates touch only CF and, for single-bit rotates, OF.
    pub fn rol(&self, count: u32) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        let a = self.inner();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let n = count % bits;
        let result = if n == 0 { *self } else { size.from((a << n) | (a >> (bits - n))) };
        let carry = result.inner() & 1 != 0;
        let mut flags = FlagUpdate::new();
        flags.cf = Some(carry);
        if count == 1 {
            flags.of = Some(result.msb() != carry);
        }
        (result, flags)
    }
    pub fn ror(&self, count: u32) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        let a = self.inner();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let n = count % bits;
        let result = if n == 0 { *self } else { size.from((a >> n) | (a << (bits - n))) };
        let mut flags = FlagUpdate::new();
        flags.cf = Some(result.msb());
        if count == 1 {
            let top_two = result.inner() >> (bits - 2);
            flags.of = Some((top_two ^ (top_two >> 1)) & 1 != 0);
        }
        (result, flags)
    }
    pub fn rcl(&self, count: u32, carry_in: bool) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        // One rotation through a width+1 bit window including CF.
        let span = bits + 1;
        let window = (1u64 << span) - 1;
        let mut wide = ((carry_in as u64) << bits) | self.inner() as u64;
        let n = count % span;
        if n != 0 {
            wide = ((wide << n) | (wide >> (span - n))) & window;
        }
        let carry = wide >> bits & 1 != 0;
        let result = size.from(wide);
        let mut flags = FlagUpdate::new();
        flags.cf = Some(carry);
        if count == 1 {
            flags.of = Some(result.msb() != carry);
        }
        (result, flags)
    }
    pub fn rcr(&self, count: u32, carry_in: bool) -> (Value, FlagUpdate) {
        let size = self.size();
        let bits = size.bits();
        if count == 0 {
            return (*self, FlagUpdate::new());
        }
        let span = bits + 1;
        let window = (1u64 << span) - 1;
        let mut wide = ((carry_in as u64) << bits) | self.inner() as u64;
        let n = count % span;
        if n != 0 {
            wide = ((wide >> n) | (wide << (span - n))) & window;
        }
        let carry = wide >> bits & 1 != 0;
        let result = size.from(wide);
        let mut flags = FlagUpdate::new();
        flags.cf = Some(carry);
        if count == 1 {
            let top_two = result.inner() >> (bits - 2);
            flags.of = Some((top_two ^ (top_two >> 1)) & 1 != 0);
        }
        (result, flags)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Byte(b) => write!(f, "0x{:02x}", b),
            Value::Word(w) => write!(f, "0x{:04x}", w),
            Value::Long(l) => write!(f, "0x{:08x}", l),
        }
    }
}

/// A resolved instruction operand. Memory operands carry the segment
/// value (override already applied) and the effective offset, so the
/// executor never has to re-derive addressing state.
#[derive(Debug, Copy, Clone)]
pub enum Operand {
    Reg8(Reg8),
    Reg16(Reg16),
    Reg32(Reg32),
    Seg(SegReg),
    Mem { seg: u16, off: u16, size: Size },
    Imm(Value),
}

impl Operand {
    pub fn size(&self) -> Size {
        match *self {
            Self::Reg8(_) => Size::Byte,
            Self::Reg16(_) | Self::Seg(_) => Size::Word,
            Self::Reg32(_) => Size::Long,
            Self::Mem { size, .. } => size,
            Self::Imm(v) => v.size(),
        }
    }
    pub fn read(&self, cpu: &mut CPU) -> Value {
        match *self {
            Self::Reg8(r) => Value::Byte(cpu.regs.get8(r)),
            Self::Reg16(r) => Value::Word(cpu.regs.get16(r)),
            Self::Reg32(r) => Value::Long(cpu.regs.get32(r)),
            Self::Seg(s) => Value::Word(cpu.regs.seg(s)),
            Self::Mem { seg, off, size } => cpu.read_seg(seg, off, size),
            Self::Imm(v) => v,
        }
    }
    pub fn write(&self, cpu: &mut CPU, value: Value) {
        match *self {
            Self::Reg8(r) => cpu.regs.set8(r, value.inner() as u8),
            Self::Reg16(r) => cpu.regs.set16(r, value.inner() as u16),
            Self::Reg32(r) => cpu.regs.set32(r, value.inner()),
            Self::Seg(s) => cpu.regs.set_seg(s, value.inner() as u16),
            Self::Mem { seg, off, .. } => cpu.write_seg(seg, off, value),
            Self::Imm(_) => panic!("write to immediate operand"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Reg8(r) => write!(f, "{}", r),
            Self::Reg16(r) => write!(f, "{}", r),
            Self::Reg32(r) => write!(f, "{}", r),
            Self::Seg(s) => write!(f, "{}", s),
            Self::Mem { seg, off, size } => {
                let width = if size == Size::Byte { "byte" } else { "word" };
                write!(f, "{} [{:04x}:{:04x}]", width, seg, off)
            }
            Self::Imm(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Condition {
    O = 0,
    No = 1,
    B = 2,
    Nb = 3,
    E = 4,
    Ne = 5,
    Be = 6,
    Nbe = 7,
    S = 8,
    Ns = 9,
    P = 10,
    Np = 11,
    L = 12,
    Nl = 13,
    Le = 14,
    Nle = 15,
}

impl Condition {
    pub fn from(condition: u8) -> Self {
        match condition & 0xf {
            0 => Self::O,
            1 => Self::No,
            2 => Self::B,
            3 => Self::Nb,
            4 => Self::E,
            5 => Self::Ne,
            6 => Self::Be,
            7 => Self::Nbe,
            8 => Self::S,
            9 => Self::Ns,
            10 => Self::P,
            11 => Self::Np,
            12 => Self::L,
            13 => Self::Nl,
            14 => Self::Le,
            _ => Self::Nle,
        }
    }
    pub fn evaluate(&self, flags: Flags) -> bool {
        let cf = flags.contains(Flags::CF);
        let zf = flags.contains(Flags::ZF);
        let sf = flags.contains(Flags::SF);
        let of = flags.contains(Flags::OF);
        let pf = flags.contains(Flags::PF);
        match *self {
            Self::O => of,
            Self::No => !of,
            Self::B => cf,
            Self::Nb => !cf,
            Self::E => zf,
            Self::Ne => !zf,
            Self::Be => cf || zf,
            Self::Nbe => !cf && !zf,
            Self::S => sf,
            Self::Ns => !sf,
            Self::P => pf,
            Self::Np => !pf,
            Self::L => sf != of,
            Self::Nl => sf == of,
            Self::Le => zf || sf != of,
            Self::Nle => !zf && sf == of,
        }
    }
    pub fn as_asm(&self) -> &'static str {
        match *self {
            Self::O => "o",
            Self::No => "no",
            Self::B => "b",
            Self::Nb => "nb",
            Self::E => "e",
            Self::Ne => "ne",
            Self::Be => "be",
            Self::Nbe => "nbe",
            Self::S => "s",
            Self::Ns => "ns",
            Self::P => "p",
            Self::Np => "np",
            Self::L => "l",
            Self::Nl => "nl",
            Self::Le => "le",
            Self::Nle => "nle",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_asm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference flag derivation for byte-width additions, kept deliberately
    // naive so the ALU has something independent to be checked against.
    fn check_add8(a: u8, b: u8) {
        let (result, flags) = Value::Byte(a).add(Value::Byte(b), false);
        let expected = a.wrapping_add(b);
        assert_eq!(result, Value::Byte(expected));
        assert_eq!(flags.cf, Some(a as u16 + b as u16 > 0xff));
        assert_eq!(flags.zf, Some(expected == 0));
        assert_eq!(flags.sf, Some(expected & 0x80 != 0));
        assert_eq!(flags.pf, Some(expected.count_ones() % 2 == 0));
        let signed = (a as i8).checked_add(b as i8).is_none();
        assert_eq!(flags.of, Some(signed));
    }

    fn check_sub8(a: u8, b: u8) {
        let (result, flags) = Value::Byte(a).sub(Value::Byte(b), false);
        let expected = a.wrapping_sub(b);
        assert_eq!(result, Value::Byte(expected));
        assert_eq!(flags.cf, Some(b > a));
        assert_eq!(flags.zf, Some(expected == 0));
        assert_eq!(flags.sf, Some(expected & 0x80 != 0));
        let signed = (a as i8).checked_sub(b as i8).is_none();
        assert_eq!(flags.of, Some(signed));
    }

    #[test]
    fn add_flags_match_reference() {
        for &a in &[0u8, 1, 2, 0x0f, 0x7f, 0x80, 0xaa, 0xfe, 0xff] {
            for &b in &[0u8, 1, 2, 0x0f, 0x7f, 0x80, 0xaa, 0xfe, 0xff] {
                check_add8(a, b);
                check_sub8(a, b);
            }
        }
    }

    #[test]
    fn adc_carries_through() {
        let (result, flags) = Value::Byte(0xff).add(Value::Byte(0x00), true);
        assert_eq!(result, Value::Byte(0x00));
        assert_eq!(flags.cf, Some(true));
        assert_eq!(flags.zf, Some(true));
    }

    #[test]
    fn word_overflow_sets_zf_cf_of() {
        // 0x8000 + 0x8000 wraps to zero with both carry and overflow.
        let (result, flags) = Value::Word(0x8000).add(Value::Word(0x8000), false);
        assert_eq!(result, Value::Word(0));
        assert_eq!(flags.cf, Some(true));
        assert_eq!(flags.of, Some(true));
        assert_eq!(flags.zf, Some(true));
    }

    #[test]
    fn inc_preserves_carry() {
        let (result, flags) = Value::Byte(0xff).inc();
        assert_eq!(result, Value::Byte(0));
        assert_eq!(flags.cf, None);
        assert_eq!(flags.zf, Some(true));
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let (result, flags) = Value::Word(0xf0f0).and(Value::Word(0x0ff0));
        assert_eq!(result, Value::Word(0x00f0));
        assert_eq!(flags.cf, Some(false));
        assert_eq!(flags.of, Some(false));
        assert_eq!(flags.af, None);
    }

    #[test]
    fn shl_shifts_top_bit_into_carry() {
        let (result, flags) = Value::Byte(0x81).shl(1);
        assert_eq!(result, Value::Byte(0x02));
        assert_eq!(flags.cf, Some(true));
        assert_eq!(flags.of, Some(true));
        let (_, flags) = Value::Byte(0x41).shl(1);
        assert_eq!(flags.cf, Some(false));
        assert_eq!(flags.of, Some(true));
    }

    #[test]
    fn zero_count_leaves_flags_alone() {
        let (result, flags) = Value::Byte(0x55).shl(0);
        assert_eq!(result, Value::Byte(0x55));
        assert_eq!(flags.cf, None);
        assert_eq!(flags.zf, None);
    }

    #[test]
    fn sar_keeps_sign() {
        let (result, flags) = Value::Byte(0x82).sar(1);
        assert_eq!(result, Value::Byte(0xc1));
        assert_eq!(flags.cf, Some(false));
        let (result, _) = Value::Byte(0x82).sar(9);
        assert_eq!(result, Value::Byte(0xff));
    }

    #[test]
    fn rcl_rotates_through_carry() {
        let (result, flags) = Value::Byte(0x80).rcl(1, false);
        assert_eq!(result, Value::Byte(0x00));
        assert_eq!(flags.cf, Some(true));
        let (result, flags) = Value::Byte(0x00).rcl(1, true);
        assert_eq!(result, Value::Byte(0x01));
        assert_eq!(flags.cf, Some(false));
    }

    #[test]
    fn neg_of_zero_clears_carry() {
        let (result, flags) = Value::Byte(0).neg();
        assert_eq!(result, Value::Byte(0));
        assert_eq!(flags.cf, Some(false));
        let (result, flags) = Value::Byte(1).neg();
        assert_eq!(result, Value::Byte(0xff));
        assert_eq!(flags.cf, Some(true));
    }
}
