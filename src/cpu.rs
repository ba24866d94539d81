// The chip behind the NINTENDO GAME BOY: the sharp LR35902. One call to next() services at most one interrupt,
// executes at most one instruction, and reports the cost in machine cycles (4 clock cycles each).
//
// The decoder leans on the layout of the opcode byte: bits 5-3 and 2-0 select operands for the regular 8 bit
// load/ALU quadrants and for the whole 0xCB page, so those decode through field extraction rather than one arm per
// opcode.
use super::error::Error;
use super::memory::Memory;
use super::register::Flag::{C, H, N, Z};
use super::register::Register;

//  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
const OP_CYCLES: [u32; 256] = [
    1, 3, 2, 2, 1, 1, 2, 1, 5, 2, 2, 2, 1, 1, 2, 1, // 0
    1, 3, 2, 2, 1, 1, 2, 1, 3, 2, 2, 2, 1, 1, 2, 1, // 1
    2, 3, 2, 2, 1, 1, 2, 1, 2, 2, 2, 2, 1, 1, 2, 1, // 2
    2, 3, 2, 2, 3, 3, 3, 1, 2, 2, 2, 2, 1, 1, 2, 1, // 3
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 4
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 5
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 6
    2, 2, 2, 2, 2, 2, 1, 2, 1, 1, 1, 1, 1, 1, 2, 1, // 7
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 8
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // 9
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // a
    1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, // b
    2, 3, 3, 4, 3, 4, 2, 4, 2, 4, 3, 0, 3, 6, 2, 4, // c
    2, 3, 3, 0, 3, 4, 2, 4, 2, 4, 3, 0, 3, 0, 2, 4, // d
    3, 3, 2, 0, 0, 4, 2, 4, 4, 1, 4, 0, 0, 0, 2, 4, // e
    3, 3, 2, 1, 0, 4, 2, 4, 3, 2, 4, 1, 0, 0, 2, 4, // f
];

//  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
const CB_CYCLES: [u32; 256] = [
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 0
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 1
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 2
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 3
    2, 2, 2, 2, 2, 2, 3, 2, 2, 2, 2, 2, 2, 2, 3, 2, // 4
    2, 2, 2, 2, 2, 2, 3, 2, 2, 2, 2, 2, 2, 2, 3, 2, // 5
    2, 2, 2, 2, 2, 2, 3, 2, 2, 2, 2, 2, 2, 2, 3, 2, // 6
    2, 2, 2, 2, 2, 2, 3, 2, 2, 2, 2, 2, 2, 2, 3, 2, // 7
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 8
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // 9
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // a
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // b
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // c
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // d
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // e
    2, 2, 2, 2, 2, 2, 4, 2, 2, 2, 2, 2, 2, 2, 4, 2, // f
];

pub struct Cpu {
    pub reg: Register,
    pub halted: bool,
    pub stopped: bool,
    ime: bool,
    // EI takes effect after the instruction that follows it.
    ime_pending: bool,
}

impl Cpu {
    pub fn power_up() -> Self {
        Self {
            reg: Register::power_up(),
            halted: false,
            stopped: false,
            ime: true,
            ime_pending: false,
        }
    }

    fn imm(&mut self, mem: &mut dyn Memory) -> u8 {
        let v = mem.get(self.reg.pc);
        self.reg.pc = self.reg.pc.wrapping_add(1);
        v
    }

    fn imm_word(&mut self, mem: &mut dyn Memory) -> u16 {
        let v = mem.get_word(self.reg.pc);
        self.reg.pc = self.reg.pc.wrapping_add(2);
        v
    }

    fn stack_add(&mut self, mem: &mut dyn Memory, v: u16) {
        self.reg.sp = self.reg.sp.wrapping_sub(2);
        mem.set_word(self.reg.sp, v);
    }

    fn stack_pop(&mut self, mem: &mut dyn Memory) -> u16 {
        let r = mem.get_word(self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(2);
        r
    }

    // Operand field decode: 0-5 select B,C,D,E,H,L, 6 is the byte at (HL), 7 is A.
    fn get_r(&mut self, mem: &mut dyn Memory, i: u8) -> u8 {
        match i {
            0 => self.reg.b,
            1 => self.reg.c,
            2 => self.reg.d,
            3 => self.reg.e,
            4 => self.reg.h,
            5 => self.reg.l,
            6 => mem.get(self.reg.get_hl()),
            _ => self.reg.a,
        }
    }

    fn set_r(&mut self, mem: &mut dyn Memory, i: u8, v: u8) {
        match i {
            0 => self.reg.b = v,
            1 => self.reg.c = v,
            2 => self.reg.d = v,
            3 => self.reg.e = v,
            4 => self.reg.h = v,
            5 => self.reg.l = v,
            6 => mem.set(self.reg.get_hl(), v),
            _ => self.reg.a = v,
        }
    }

    // Register pair field for the 16 bit arithmetic and load groups.
    fn get_rp(&self, i: u8) -> u16 {
        match i {
            0 => self.reg.get_bc(),
            1 => self.reg.get_de(),
            2 => self.reg.get_hl(),
            _ => self.reg.sp,
        }
    }

    fn set_rp(&mut self, i: u8, v: u16) {
        match i {
            0 => self.reg.set_bc(v),
            1 => self.reg.set_de(v),
            2 => self.reg.set_hl(v),
            _ => self.reg.sp = v,
        }
    }

    // Condition field: NZ, Z, NC, C.
    fn cond(&self, i: u8) -> bool {
        match i {
            0 => !self.reg.get_flag(Z),
            1 => self.reg.get_flag(Z),
            2 => !self.reg.get_flag(C),
            _ => self.reg.get_flag(C),
        }
    }
}

// 8 bit and 16 bit arithmetic. Each helper owns its flag behaviour; callers only route operands.
impl Cpu {
    // ADD: Z set by result, N reset, H carry from bit 3, C carry from bit 7.
    fn alu_add(&mut self, n: u8) {
        let a = self.reg.a;
        let r = a.wrapping_add(n);
        self.reg.set_flag(C, u16::from(a) + u16::from(n) > 0xff);
        self.reg.set_flag(H, (a & 0x0f) + (n & 0x0f) > 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // ADC: as ADD, with the carry flag joining the sum.
    fn alu_adc(&mut self, n: u8) {
        let a = self.reg.a;
        let c = u8::from(self.reg.get_flag(C));
        let r = a.wrapping_add(n).wrapping_add(c);
        self.reg.set_flag(C, u16::from(a) + u16::from(n) + u16::from(c) > 0xff);
        self.reg.set_flag(H, (a & 0x0f) + (n & 0x0f) + c > 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // SUB: Z set by result, N set, H borrow from bit 4, C borrow.
    fn alu_sub(&mut self, n: u8) {
        let a = self.reg.a;
        let r = a.wrapping_sub(n);
        self.reg.set_flag(C, a < n);
        self.reg.set_flag(H, (a & 0x0f) < (n & 0x0f));
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // SBC: as SUB, with the carry flag joining the subtrahend.
    fn alu_sbc(&mut self, n: u8) {
        let a = self.reg.a;
        let c = u8::from(self.reg.get_flag(C));
        let r = a.wrapping_sub(n).wrapping_sub(c);
        self.reg.set_flag(C, u16::from(a) < u16::from(n) + u16::from(c));
        self.reg.set_flag(H, (a & 0x0f) < (n & 0x0f) + c);
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // AND: N and C reset, H set.
    fn alu_and(&mut self, n: u8) {
        let r = self.reg.a & n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // OR: N, H and C reset.
    fn alu_or(&mut self, n: u8) {
        let r = self.reg.a | n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // XOR: N, H and C reset.
    fn alu_xor(&mut self, n: u8) {
        let r = self.reg.a ^ n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // CP is SUB with the result thrown away.
    fn alu_cp(&mut self, n: u8) {
        let r = self.reg.a;
        self.alu_sub(n);
        self.reg.a = r;
    }

    // INC leaves C alone.
    fn alu_inc(&mut self, a: u8) -> u8 {
        let r = a.wrapping_add(1);
        self.reg.set_flag(H, (a & 0x0f) == 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // DEC leaves C alone.
    fn alu_dec(&mut self, a: u8) -> u8 {
        let r = a.wrapping_sub(1);
        self.reg.set_flag(H, (a & 0x0f) == 0x00);
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // ADD HL,rr: Z untouched, N reset, H carry at bit 11, C carry at bit 15.
    fn alu_add_hl(&mut self, n: u16) {
        let a = self.reg.get_hl();
        let r = a.wrapping_add(n);
        self.reg.set_flag(C, a > 0xffff - n);
        self.reg.set_flag(H, (a & 0x07ff) + (n & 0x07ff) > 0x07ff);
        self.reg.set_flag(N, false);
        self.reg.set_hl(r);
    }

    // SP plus a signed immediate. Z and N reset; H and C come from the low byte addition, as if the offset were
    // unsigned.
    fn alu_add_sp(&mut self, mem: &mut dyn Memory) -> u16 {
        let a = self.reg.sp;
        let b = i16::from(self.imm(mem) as i8) as u16;
        self.reg.set_flag(C, (a & 0x00ff) + (b & 0x00ff) > 0x00ff);
        self.reg.set_flag(H, (a & 0x000f) + (b & 0x000f) > 0x000f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, false);
        a.wrapping_add(b)
    }

    fn alu_swap(&mut self, a: u8) -> u8 {
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, a == 0x00);
        (a >> 4) | (a << 4)
    }

    // Decimal adjust after a BCD addition or subtraction, steered by the N, H and C left behind by that operation.
    fn alu_daa(&mut self) {
        let mut a = self.reg.a;
        let mut adjust = if self.reg.get_flag(C) { 0x60 } else { 0x00 };
        if self.reg.get_flag(H) {
            adjust |= 0x06;
        }
        if !self.reg.get_flag(N) {
            if a & 0x0f > 0x09 {
                adjust |= 0x06;
            }
            if a > 0x99 {
                adjust |= 0x60;
            }
            a = a.wrapping_add(adjust);
        } else {
            a = a.wrapping_sub(adjust);
        }
        self.reg.set_flag(C, adjust >= 0x60);
        self.reg.set_flag(H, false);
        self.reg.set_flag(Z, a == 0x00);
        self.reg.a = a;
    }

    fn alu_cpl(&mut self) {
        self.reg.a = !self.reg.a;
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, true);
    }

    fn alu_ccf(&mut self) {
        let v = !self.reg.get_flag(C);
        self.reg.set_flag(C, v);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
    }

    fn alu_scf(&mut self) {
        self.reg.set_flag(C, true);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
    }

    // Rotates and shifts: N and H reset, C takes the bit shifted out, Z set by the result. The four non-prefixed A
    // register forms clear Z instead; their callers do that.
    fn alu_rlc(&mut self, a: u8) -> u8 {
        let c = a & 0x80 != 0x00;
        let r = (a << 1) | u8::from(c);
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_rl(&mut self, a: u8) -> u8 {
        let c = a & 0x80 != 0x00;
        let r = (a << 1) | u8::from(self.reg.get_flag(C));
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_rrc(&mut self, a: u8) -> u8 {
        let c = a & 0x01 != 0x00;
        let r = if c { 0x80 | (a >> 1) } else { a >> 1 };
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_rr(&mut self, a: u8) -> u8 {
        let c = a & 0x01 != 0x00;
        let r = if self.reg.get_flag(C) { 0x80 | (a >> 1) } else { a >> 1 };
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_sla(&mut self, a: u8) -> u8 {
        let c = a & 0x80 != 0x00;
        let r = a << 1;
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_sra(&mut self, a: u8) -> u8 {
        let c = a & 0x01 != 0x00;
        let r = (a >> 1) | (a & 0x80);
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    fn alu_srl(&mut self, a: u8) -> u8 {
        let c = a & 0x01 != 0x00;
        let r = a >> 1;
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // BIT b: Z set when the bit is clear, N reset, H set, C untouched.
    fn alu_bit(&mut self, a: u8, b: u8) {
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, a & (1 << b) == 0x00);
    }

    // Relative jump by a signed byte, applied after the immediate is consumed.
    fn alu_jr(&mut self, mem: &mut dyn Memory) {
        let n = self.imm(mem) as i8;
        self.reg.pc = (i32::from(self.reg.pc) + i32::from(n)) as u16;
    }
}

impl Cpu {
    pub fn next(&mut self, mem: &mut dyn Memory) -> Result<u32, Error> {
        let c = self.handle_interrupts(mem);
        if c != 0 {
            return Ok(c);
        }
        if self.ime_pending {
            self.ime = true;
            self.ime_pending = false;
        }
        if self.halted || self.stopped {
            return Ok(1);
        }
        self.ex(mem)
    }

    // Service the lowest pending enabled interrupt: drop IME, clear the request, push PC and jump to the vector.
    // A pending interrupt always wakes a halted CPU, even with IME off, in which case nothing is serviced.
    fn handle_interrupts(&mut self, mem: &mut dyn Memory) -> u32 {
        if !self.ime && !self.halted && !self.stopped {
            return 0;
        }
        let intf = mem.get(0xff0f);
        let inte = mem.get(0xffff);
        let pending = intf & inte;
        if pending == 0x00 {
            return 0;
        }
        self.halted = false;
        self.stopped = false;
        if !self.ime {
            return 0;
        }
        self.ime = false;
        let n = pending.trailing_zeros();
        mem.set(0xff0f, intf & !(1 << n));
        self.stack_add(mem, self.reg.pc);
        self.reg.pc = 0x0040 | ((n as u16) << 3);
        5
    }

    fn ex(&mut self, mem: &mut dyn Memory) -> Result<u32, Error> {
        let opcode = self.imm(mem);
        // Extra machine cycles for taken conditional jumps, calls and returns.
        let mut ecycle = 0;
        match opcode {
            0x00 => {}
            // LD rr, d16
            0x01 | 0x11 | 0x21 | 0x31 => {
                let v = self.imm_word(mem);
                self.set_rp((opcode >> 4) & 0x03, v);
            }
            0x02 => mem.set(self.reg.get_bc(), self.reg.a),
            0x12 => mem.set(self.reg.get_de(), self.reg.a),
            0x0a => self.reg.a = mem.get(self.reg.get_bc()),
            0x1a => self.reg.a = mem.get(self.reg.get_de()),
            // INC rr / DEC rr, no flags
            0x03 | 0x13 | 0x23 | 0x33 => {
                let i = (opcode >> 4) & 0x03;
                self.set_rp(i, self.get_rp(i).wrapping_add(1));
            }
            0x0b | 0x1b | 0x2b | 0x3b => {
                let i = (opcode >> 4) & 0x03;
                self.set_rp(i, self.get_rp(i).wrapping_sub(1));
            }
            // INC r / DEC r / LD r, d8 over the full operand field, (HL) included
            0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x34 | 0x3c => {
                let i = (opcode >> 3) & 0x07;
                let v = self.get_r(mem, i);
                let v = self.alu_inc(v);
                self.set_r(mem, i, v);
            }
            0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x35 | 0x3d => {
                let i = (opcode >> 3) & 0x07;
                let v = self.get_r(mem, i);
                let v = self.alu_dec(v);
                self.set_r(mem, i, v);
            }
            0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x36 | 0x3e => {
                let v = self.imm(mem);
                self.set_r(mem, (opcode >> 3) & 0x07, v);
            }
            // Accumulator rotates; unlike their 0xCB twins these clear Z.
            0x07 => {
                self.reg.a = self.alu_rlc(self.reg.a);
                self.reg.set_flag(Z, false);
            }
            0x0f => {
                self.reg.a = self.alu_rrc(self.reg.a);
                self.reg.set_flag(Z, false);
            }
            0x17 => {
                self.reg.a = self.alu_rl(self.reg.a);
                self.reg.set_flag(Z, false);
            }
            0x1f => {
                self.reg.a = self.alu_rr(self.reg.a);
                self.reg.set_flag(Z, false);
            }
            0x08 => {
                let a = self.imm_word(mem);
                mem.set_word(a, self.reg.sp);
            }
            0x09 | 0x19 | 0x29 | 0x39 => self.alu_add_hl(self.get_rp((opcode >> 4) & 0x03)),
            0x10 => self.stopped = true,
            0x18 => self.alu_jr(mem),
            // JR cc, r8
            0x20 | 0x28 | 0x30 | 0x38 => {
                if self.cond((opcode >> 3) & 0x03) {
                    self.alu_jr(mem);
                    ecycle = 1;
                } else {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            // LDI / LDD through (HL)
            0x22 => {
                let a = self.reg.get_hl();
                mem.set(a, self.reg.a);
                self.reg.set_hl(a.wrapping_add(1));
            }
            0x2a => {
                let a = self.reg.get_hl();
                self.reg.a = mem.get(a);
                self.reg.set_hl(a.wrapping_add(1));
            }
            0x32 => {
                let a = self.reg.get_hl();
                mem.set(a, self.reg.a);
                self.reg.set_hl(a.wrapping_sub(1));
            }
            0x3a => {
                let a = self.reg.get_hl();
                self.reg.a = mem.get(a);
                self.reg.set_hl(a.wrapping_sub(1));
            }
            0x27 => self.alu_daa(),
            0x2f => self.alu_cpl(),
            0x37 => self.alu_scf(),
            0x3f => self.alu_ccf(),
            0x76 => self.halted = true,
            // LD r, r over both operand fields
            0x40..=0x7f => {
                let v = self.get_r(mem, opcode & 0x07);
                self.set_r(mem, (opcode >> 3) & 0x07, v);
            }
            // The ALU quadrant: operation in bits 5-3, operand in bits 2-0
            0x80..=0xbf => {
                let v = self.get_r(mem, opcode & 0x07);
                match (opcode >> 3) & 0x07 {
                    0 => self.alu_add(v),
                    1 => self.alu_adc(v),
                    2 => self.alu_sub(v),
                    3 => self.alu_sbc(v),
                    4 => self.alu_and(v),
                    5 => self.alu_xor(v),
                    6 => self.alu_or(v),
                    _ => self.alu_cp(v),
                }
            }
            // RET cc
            0xc0 | 0xc8 | 0xd0 | 0xd8 => {
                if self.cond((opcode >> 3) & 0x03) {
                    self.reg.pc = self.stack_pop(mem);
                    ecycle = 3;
                }
            }
            // POP rr (the fourth slot is AF, not SP)
            0xc1 | 0xd1 | 0xe1 => {
                let v = self.stack_pop(mem);
                self.set_rp((opcode >> 4) & 0x03, v);
            }
            0xf1 => {
                let v = self.stack_pop(mem);
                self.reg.set_af(v);
            }
            // JP cc, a16
            0xc2 | 0xca | 0xd2 | 0xda => {
                let pc = self.imm_word(mem);
                if self.cond((opcode >> 3) & 0x03) {
                    self.reg.pc = pc;
                    ecycle = 1;
                }
            }
            0xc3 => self.reg.pc = self.imm_word(mem),
            // CALL cc, a16
            0xc4 | 0xcc | 0xd4 | 0xdc => {
                let pc = self.imm_word(mem);
                if self.cond((opcode >> 3) & 0x03) {
                    self.stack_add(mem, self.reg.pc);
                    self.reg.pc = pc;
                    ecycle = 3;
                }
            }
            // PUSH rr
            0xc5 | 0xd5 | 0xe5 => self.stack_add(mem, self.get_rp((opcode >> 4) & 0x03)),
            0xf5 => self.stack_add(mem, self.reg.get_af()),
            // ALU with immediate operand
            0xc6 => {
                let v = self.imm(mem);
                self.alu_add(v);
            }
            0xce => {
                let v = self.imm(mem);
                self.alu_adc(v);
            }
            0xd6 => {
                let v = self.imm(mem);
                self.alu_sub(v);
            }
            0xde => {
                let v = self.imm(mem);
                self.alu_sbc(v);
            }
            0xe6 => {
                let v = self.imm(mem);
                self.alu_and(v);
            }
            0xee => {
                let v = self.imm(mem);
                self.alu_xor(v);
            }
            0xf6 => {
                let v = self.imm(mem);
                self.alu_or(v);
            }
            0xfe => {
                let v = self.imm(mem);
                self.alu_cp(v);
            }
            // RST: vector sits in bits 5-3 of the opcode
            0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => {
                self.stack_add(mem, self.reg.pc);
                self.reg.pc = u16::from(opcode & 0x38);
            }
            0xc9 => self.reg.pc = self.stack_pop(mem),
            0xd9 => {
                // RETI re-enables interrupts with no delay.
                self.reg.pc = self.stack_pop(mem);
                self.ime = true;
            }
            0xcb => return Ok(self.ex_cb(mem)),
            0xcd => {
                let pc = self.imm_word(mem);
                self.stack_add(mem, self.reg.pc);
                self.reg.pc = pc;
            }
            // High page loads: 0xff00 + immediate or + C
            0xe0 => {
                let a = 0xff00 | u16::from(self.imm(mem));
                mem.set(a, self.reg.a);
            }
            0xf0 => {
                let a = 0xff00 | u16::from(self.imm(mem));
                self.reg.a = mem.get(a);
            }
            0xe2 => mem.set(0xff00 | u16::from(self.reg.c), self.reg.a),
            0xf2 => self.reg.a = mem.get(0xff00 | u16::from(self.reg.c)),
            0xe8 => {
                let v = self.alu_add_sp(mem);
                self.reg.sp = v;
            }
            0xf8 => {
                let v = self.alu_add_sp(mem);
                self.reg.set_hl(v);
            }
            0xe9 => self.reg.pc = self.reg.get_hl(),
            0xf9 => self.reg.sp = self.reg.get_hl(),
            0xea => {
                let a = self.imm_word(mem);
                mem.set(a, self.reg.a);
            }
            0xfa => {
                let a = self.imm_word(mem);
                self.reg.a = mem.get(a);
            }
            0xf3 => {
                self.ime = false;
                self.ime_pending = false;
            }
            0xfb => self.ime_pending = true,
            0xd3 | 0xdb | 0xdd | 0xe3 | 0xe4 | 0xeb | 0xec | 0xed | 0xf4 | 0xfc | 0xfd => {
                return Err(Error::UnknownOpcode { opcode, pc: self.reg.pc.wrapping_sub(1) });
            }
        }
        Ok(OP_CYCLES[opcode as usize] + ecycle)
    }

    // The whole 0xCB page is regular: two selector fields and a two bit group.
    fn ex_cb(&mut self, mem: &mut dyn Memory) -> u32 {
        let cbcode = self.imm(mem);
        let i = cbcode & 0x07;
        let b = (cbcode >> 3) & 0x07;
        let v = self.get_r(mem, i);
        match cbcode >> 6 {
            // Rotates, shifts and SWAP
            0 => {
                let r = match b {
                    0 => self.alu_rlc(v),
                    1 => self.alu_rrc(v),
                    2 => self.alu_rl(v),
                    3 => self.alu_rr(v),
                    4 => self.alu_sla(v),
                    5 => self.alu_sra(v),
                    6 => self.alu_swap(v),
                    _ => self.alu_srl(v),
                };
                self.set_r(mem, i, r);
            }
            1 => self.alu_bit(v, b),
            2 => self.set_r(mem, i, v & !(1 << b)),
            _ => self.set_r(mem, i, v | (1 << b)),
        }
        CB_CYCLES[cbcode as usize]
    }
}
