//! The execution handler set: instruction semantics, flags, MEMPTR and
//! T-state accounting on top of the shared decoder.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::alu;
use crate::bus::Bus;
use crate::decoder::{
    AluOp, BlockLd, Condition, DecoderState, Host, IndexReg, Reg, RegPair, RegPair2, RotOp,
};
use crate::flags::{cf_ari, CF, HF, PF, SF, XF, YF, ZF};

use super::{disp_target, Z80};

impl<B: Bus> Z80<B> {
    fn do_alu(&mut self, k: AluOp, n: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        let result = match k {
            AluOp::Add => alu::add8(a, n),
            AluOp::Adc => alu::adc8(a, n, carry),
            AluOp::Sub => alu::sub8(a, n),
            AluOp::Sbc => alu::sbc8(a, n, carry),
            AluOp::And => alu::and8(a, n),
            AluOp::Xor => alu::xor8(a, n),
            AluOp::Or => alu::or8(a, n),
            AluOp::Cp => alu::cp8(a, n),
        };
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }

    fn push16(&mut self, value: u16) {
        let mut sp = self.regs.sp;
        sp = sp.wrapping_sub(1);
        self.write_cycle(sp, (value >> 8) as u8, 3);
        sp = sp.wrapping_sub(1);
        self.write_cycle(sp, value as u8, 3);
        self.regs.sp = sp;
    }

    fn pop16(&mut self) -> u16 {
        let mut sp = self.regs.sp;
        let lo = self.read_cycle(sp, 3);
        sp = sp.wrapping_add(1);
        let hi = self.read_cycle(sp, 3);
        sp = sp.wrapping_add(1);
        self.regs.sp = sp;
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn return_from(&mut self) {
        let pc = self.pop16();
        self.regs.wz = pc;
        self.regs.pc = pc;
    }

    /// Taken relative branch: 5T internal cycle, MEMPTR and PC move to
    /// the target.
    fn relative_jump(&mut self, d: u8) {
        self.exec_cycle(5);
        let target = disp_target(self.regs.pc, d);
        self.regs.wz = target;
        self.regs.pc = target;
    }
}

impl<B: Bus> Host for Z80<B> {
    fn decoder(&self) -> &DecoderState {
        self.decoder_state()
    }

    fn decoder_mut(&mut self) -> &mut DecoderState {
        self.decoder_state_mut()
    }

    fn fetch(&mut self) -> u8 {
        let pc = self.regs.pc;
        let op = self.fetch_cycle(pc);
        self.regs.pc = pc.wrapping_add(1);
        op
    }

    fn fetch_extra(&mut self, t: u32) {
        self.tick(t);
    }

    fn imm8(&mut self) -> u8 {
        let pc = self.regs.pc;
        let n = self.read_cycle(pc, 3);
        self.regs.pc = pc.wrapping_add(1);
        n
    }

    fn imm8_long(&mut self) -> u8 {
        let pc = self.regs.pc;
        let n = self.read_cycle(pc, 5);
        self.regs.pc = pc.wrapping_add(1);
        n
    }

    fn imm16(&mut self) -> u16 {
        let lo = self.imm8();
        let hi = self.imm8();
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn imm16_call(&mut self) -> u16 {
        let lo = self.imm8();
        let pc = self.regs.pc;
        let hi = self.read_cycle(pc, 4);
        self.regs.pc = pc.wrapping_add(1);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn disp_read(&mut self) -> u8 {
        self.imm8()
    }

    fn exec_cycle(&mut self, t: u32) {
        self.tick(t);
    }

    fn instr_addr(&self) -> u16 {
        self.last_read_addr()
    }

    fn set_next_index_rp(&mut self, irp: IndexReg) {
        self.decoder_state_mut().next_index_rp = irp;
        self.set_disable_int();
    }

    // === Unprefixed handlers ===

    fn nop(&mut self) {}

    fn halt(&mut self) {
        self.set_halted();
    }

    fn ld_r_r(&mut self, rd: Reg, rs: Reg, d: u8) {
        let value = self.get_r(rs, d, false);
        self.set_r(rd, d, value);
    }

    fn ld_r_n(&mut self, r: Reg, d: u8, n: u8) {
        self.set_r(r, d, n);
    }

    fn alu_r(&mut self, k: AluOp, r: Reg, d: u8) {
        let n = self.get_r(r, d, false);
        self.do_alu(k, n);
    }

    fn alu_n(&mut self, k: AluOp, n: u8) {
        self.do_alu(k, n);
    }

    fn inc_r(&mut self, r: Reg, d: u8) {
        let value = self.get_r(r, d, true);
        let result = alu::inc8(value);
        self.regs.f = (self.regs.f & CF) | result.flags;
        self.set_r(r, d, result.value);
    }

    fn dec_r(&mut self, r: Reg, d: u8) {
        let value = self.get_r(r, d, true);
        let result = alu::dec8(value);
        self.regs.f = (self.regs.f & CF) | result.flags;
        self.set_r(r, d, result.value);
    }

    fn ld_rp_nn(&mut self, rp: RegPair, nn: u16) {
        self.set_rp(rp, nn);
    }

    fn inc_rp(&mut self, rp: RegPair) {
        let value = self.get_rp(rp).wrapping_add(1);
        self.set_rp(rp, value);
    }

    fn dec_rp(&mut self, rp: RegPair) {
        let value = self.get_rp(rp).wrapping_sub(1);
        self.set_rp(rp, value);
    }

    fn add_irp_rp(&mut self, rp: RegPair) {
        let i = self.index_rp_value();
        let n = self.get_rp(rp);
        self.exec_cycle(4);
        self.exec_cycle(3);
        let (r, partial) = alu::add16(i, n);
        self.regs.f = (self.regs.f & (SF | ZF | PF)) | partial;
        self.regs.wz = i.wrapping_add(1);
        self.set_index_rp_value(r);
    }

    fn pop_rp(&mut self, rp: RegPair2) {
        let value = self.pop16();
        self.set_rp2(rp, value);
    }

    fn push_rp(&mut self, rp: RegPair2) {
        let value = self.get_rp2(rp);
        self.push16(value);
    }

    fn ex_af_af(&mut self) {
        self.regs.swap_af();
    }

    fn ex_de_hl(&mut self) {
        self.regs.ex_de_hl();
    }

    fn exx(&mut self) {
        self.regs.exx();
    }

    fn rrca(&mut self) {
        let a = self.regs.a.rotate_right(1);
        self.regs.a = a;
        self.regs.f =
            (self.regs.f & (SF | ZF | PF)) | (a & (YF | XF)) | cf_ari(a & 0x80 != 0);
    }

    fn scf(&mut self) {
        let a = self.regs.a;
        self.regs.f = (self.regs.f & (SF | ZF | PF)) | (a & (YF | XF)) | CF;
    }

    fn ccf(&mut self) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        self.regs.f = (self.regs.f & (SF | ZF | PF))
            | (a & (YF | XF))
            | if carry { HF } else { 0 }
            | cf_ari(!carry);
    }

    fn djnz(&mut self, d: u8) {
        let b = self.regs.b.wrapping_sub(1);
        self.regs.b = b;
        if b != 0 {
            self.relative_jump(d);
        }
    }

    fn jr(&mut self, d: u8) {
        self.relative_jump(d);
    }

    fn jr_cc(&mut self, cc: Condition, d: u8) {
        if self.condition(cc) {
            self.relative_jump(d);
        }
    }

    fn jp_nn(&mut self, nn: u16) {
        self.regs.wz = nn;
        self.regs.pc = nn;
    }

    fn jp_irp(&mut self) {
        self.regs.pc = self.index_rp_value();
    }

    fn call_nn(&mut self, nn: u16) {
        let pc = self.regs.pc;
        self.push16(pc);
        self.regs.wz = nn;
        self.regs.pc = nn;
    }

    fn ret(&mut self) {
        self.return_from();
    }

    fn ret_cc(&mut self, cc: Condition) {
        if self.condition(cc) {
            self.return_from();
        }
    }

    fn ld_at_nn_irp(&mut self, nn: u16) {
        let irp = self.index_rp_value();
        self.write_cycle(nn, irp as u8, 3);
        let nn = nn.wrapping_add(1);
        self.regs.wz = nn;
        self.write_cycle(nn, (irp >> 8) as u8, 3);
    }

    fn ld_irp_at_nn(&mut self, nn: u16) {
        let lo = self.read_cycle(nn, 3);
        let nn = nn.wrapping_add(1);
        self.regs.wz = nn;
        let hi = self.read_cycle(nn, 3);
        self.set_index_rp_value(u16::from(lo) | (u16::from(hi) << 8));
    }

    fn ld_at_nn_a(&mut self, nn: u16) {
        let a = self.regs.a;
        self.regs.wz = (u16::from(a) << 8) | u16::from((nn as u8).wrapping_add(1));
        self.write_cycle(nn, a, 3);
    }

    fn ld_a_at_nn(&mut self, nn: u16) {
        self.regs.wz = nn.wrapping_add(1);
        self.regs.a = self.read_cycle(nn, 3);
    }

    fn ld_sp_irp(&mut self) {
        self.regs.sp = self.index_rp_value();
    }

    fn out_n_a(&mut self, n: u8) {
        let a = self.regs.a;
        let port = (u16::from(a) << 8) | u16::from(n);
        self.output_cycle(port, a);
        self.regs.wz = (u16::from(a) << 8) | u16::from(n.wrapping_add(1));
    }

    fn di(&mut self) {
        self.regs.iff1 = false;
        self.regs.iff2 = false;
    }

    fn ei(&mut self) {
        self.regs.iff1 = true;
        self.regs.iff2 = true;
        self.set_disable_int();
    }

    // === CB handlers ===

    fn rot(&mut self, op: RotOp, r: Reg, d: u8) {
        let indexed = self.index_rp() != IndexReg::Hl;
        let access = if indexed { Reg::AtHl } else { r };
        let value = self.get_r(access, d, true);
        let carry = self.regs.f & CF != 0;
        let result = match op {
            RotOp::Rlc => alu::rlc8(value),
            RotOp::Rrc => alu::rrc8(value),
            RotOp::Rl => alu::rl8(value, carry),
            RotOp::Rr => alu::rr8(value, carry),
            RotOp::Sla => alu::sla8(value),
            RotOp::Sra => alu::sra8(value),
            RotOp::Sll => alu::sll8(value),
            RotOp::Srl => alu::srl8(value),
        };
        self.set_r(access, d, result.value);
        if indexed && r != Reg::AtHl {
            self.set_reg8(r, result.value);
        }
        self.regs.f = result.flags;
    }

    fn bit(&mut self, b: u8, r: Reg, d: u8) {
        let indexed = self.index_rp() != IndexReg::Hl;
        let access = if indexed { Reg::AtHl } else { r };
        let value = self.get_r(access, d, true);
        let mask = value & (1 << b);
        let mut f = (self.regs.f & CF) | HF | if mask != 0 { mask & SF } else { ZF | PF };
        // The undocumented bits come from MEMPTR's high byte whenever
        // the operand came from memory.
        let yx = if indexed || r == Reg::AtHl {
            (self.regs.wz >> 8) as u8
        } else {
            value
        };
        f |= yx & (YF | XF);
        self.regs.f = f;
    }

    fn res(&mut self, b: u8, r: Reg, d: u8) {
        let indexed = self.index_rp() != IndexReg::Hl;
        let access = if indexed { Reg::AtHl } else { r };
        let value = self.get_r(access, d, true) & !(1 << b);
        self.set_r(access, d, value);
        if indexed && r != Reg::AtHl {
            self.set_reg8(r, value);
        }
    }

    fn set(&mut self, b: u8, r: Reg, d: u8) {
        let indexed = self.index_rp() != IndexReg::Hl;
        let access = if indexed { Reg::AtHl } else { r };
        let value = self.get_r(access, d, true) | (1 << b);
        self.set_r(access, d, value);
        if indexed && r != Reg::AtHl {
            self.set_reg8(r, value);
        }
    }

    // === ED handlers ===

    fn adc_hl_rp(&mut self, rp: RegPair) {
        let hl = self.regs.hl();
        let n = self.get_rp(rp);
        let carry = self.regs.f & CF != 0;
        self.exec_cycle(4);
        self.exec_cycle(3);
        let (r, f) = alu::adc16(hl, n, carry);
        self.regs.wz = hl.wrapping_add(1);
        self.regs.set_hl(r);
        self.regs.f = f;
    }

    fn sbc_hl_rp(&mut self, rp: RegPair) {
        let hl = self.regs.hl();
        let n = self.get_rp(rp);
        let carry = self.regs.f & CF != 0;
        self.exec_cycle(4);
        self.exec_cycle(3);
        let (r, f) = alu::sbc16(hl, n, carry);
        self.regs.wz = hl.wrapping_add(1);
        self.regs.set_hl(r);
        self.regs.f = f;
    }

    fn ld_rp_at_nn(&mut self, rp: RegPair, nn: u16) {
        let lo = self.read_cycle(nn, 3);
        let nn = nn.wrapping_add(1);
        self.regs.wz = nn;
        let hi = self.read_cycle(nn, 3);
        self.set_rp(rp, u16::from(lo) | (u16::from(hi) << 8));
    }

    fn ld_at_nn_rp(&mut self, nn: u16, rp: RegPair) {
        let value = self.get_rp(rp);
        self.write_cycle(nn, value as u8, 3);
        let nn = nn.wrapping_add(1);
        self.regs.wz = nn;
        self.write_cycle(nn, (value >> 8) as u8, 3);
    }

    fn im(&mut self, mode: u8) {
        self.regs.im = mode;
    }

    fn block_ld(&mut self, k: BlockLd) {
        let mut bc = self.regs.bc();
        let mut de = self.regs.de();
        let mut hl = self.regs.hl();

        let byte = self.read_cycle(hl, 3);
        self.write_cycle(de, byte, 5);

        bc = bc.wrapping_sub(1);
        let t = byte.wrapping_add(self.regs.a);
        self.regs.f = (self.regs.f & (SF | ZF | CF))
            | ((t << 4) & YF)
            | (t & XF)
            | if bc != 0 { PF } else { 0 };

        if k.decrements() {
            hl = hl.wrapping_sub(1);
            de = de.wrapping_sub(1);
        } else {
            hl = hl.wrapping_add(1);
            de = de.wrapping_add(1);
        }

        self.regs.set_bc(bc);
        self.regs.set_de(de);
        self.regs.set_hl(hl);

        // The repeating forms rewind PC over both instruction bytes and
        // refetch themselves until BC runs out.
        if k.repeats() && bc != 0 {
            self.exec_cycle(5);
            let pc = self.regs.pc;
            self.regs.wz = pc.wrapping_add(1);
            self.regs.pc = pc.wrapping_sub(2);
        }
    }

    fn ld_i_a(&mut self) {
        self.regs.i = self.regs.a;
    }

    fn noni_ed(&mut self, _op: u8) {
        // No operation, and no interrupt accepted after it.
        self.set_disable_int();
    }
}
