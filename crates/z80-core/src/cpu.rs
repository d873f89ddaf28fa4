//! Z80 processor: the execution host around the shared decoder.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.
#![allow(clippy::cast_sign_loss)]

use crate::bus::Bus;
use crate::decoder::{self, Condition, DecoderState, IndexReg, Reg, RegPair, RegPair2};
use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;

/// Z80 CPU.
///
/// Owns its registers and the bus; every memory access goes through the
/// bus hooks, which is the single point where integrators inject their
/// own semantics (ROM protection, memory-mapped I/O, contention).
pub struct Z80<B: Bus> {
    /// The register file, open for inspection and test setup.
    pub regs: Registers,
    bus: B,
    state: DecoderState,
    halted: bool,
    disable_int: bool,
    last_read_addr: u16,
}

impl<B: Bus> Z80<B> {
    /// Create a processor in the reset state, owning `bus`.
    pub fn new(bus: B) -> Self {
        Self {
            regs: Registers::default(),
            bus,
            state: DecoderState::default(),
            halted: false,
            disable_int: false,
            last_read_addr: 0,
        }
    }

    /// Execute exactly one decode step.
    ///
    /// This is one complete instruction, except that a DD/FD prefix byte
    /// or a CB/ED prefix byte occupies a step of its own; the next step
    /// then decodes with the prefix applied. While halted, a step idles
    /// one 4T cycle.
    pub fn step(&mut self) {
        self.disable_int = false;
        if self.halted {
            self.bus.tick(4);
            return;
        }
        decoder::decode(self);
    }

    /// Return to the reset state. The bus is left untouched.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.state = DecoderState::default();
        self.halted = false;
        self.disable_int = false;
        self.last_read_addr = 0;
    }

    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// True after HALT until the integrator intervenes.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Leave the halt state without resetting anything else.
    pub fn resume(&mut self) {
        self.halted = false;
    }

    /// True for the one instruction following EI or a DD/FD prefix,
    /// during which interrupt acceptance is suppressed.
    #[must_use]
    pub fn int_disabled(&self) -> bool {
        self.disable_int
    }

    /// Address of the last byte read, for diagnostics.
    #[must_use]
    pub fn last_read_addr(&self) -> u16 {
        self.last_read_addr
    }

    pub(crate) fn set_disable_int(&mut self) {
        self.disable_int = true;
    }

    pub(crate) fn set_halted(&mut self) {
        self.halted = true;
    }

    pub(crate) fn decoder_state(&self) -> &DecoderState {
        &self.state
    }

    pub(crate) fn decoder_state_mut(&mut self) -> &mut DecoderState {
        &mut self.state
    }

    // === Bus cycles ===
    //
    // Each cycle sets the address bus, performs the untimed access, and
    // ticks its T-states. Reads record the address for diagnostics.

    /// M1 opcode fetch: 4T, with the address bus moving to IR midway.
    pub(crate) fn fetch_cycle(&mut self, addr: u16) -> u8 {
        self.bus.set_addr_bus(addr);
        let op = self.bus.read(addr);
        self.bus.tick(2);
        self.bus.set_addr_bus(self.regs.ir());
        self.bus.tick(2);
        self.last_read_addr = addr;
        op
    }

    pub(crate) fn read_cycle(&mut self, addr: u16, t_states: u32) -> u8 {
        self.bus.set_addr_bus(addr);
        let value = self.bus.read(addr);
        self.bus.tick(t_states);
        self.last_read_addr = addr;
        value
    }

    pub(crate) fn write_cycle(&mut self, addr: u16, value: u8, t_states: u32) {
        self.bus.set_addr_bus(addr);
        self.bus.write(addr, value);
        self.bus.tick(t_states);
    }

    pub(crate) fn output_cycle(&mut self, port: u16, value: u8) {
        self.bus.output(port, value);
        self.bus.tick(4);
    }

    pub(crate) fn tick(&mut self, t_states: u32) {
        self.bus.tick(t_states);
    }

    // === Operand access ===

    /// Plain 8-bit register access; `(HL)` never reaches here.
    pub(crate) fn get_reg8(&self, r: Reg) -> u8 {
        match r {
            Reg::B => self.regs.b,
            Reg::C => self.regs.c,
            Reg::D => self.regs.d,
            Reg::E => self.regs.e,
            Reg::H => self.regs.h,
            Reg::L => self.regs.l,
            Reg::A => self.regs.a,
            Reg::AtHl => unreachable!("(hl) operands go through bus cycles"),
        }
    }

    pub(crate) fn set_reg8(&mut self, r: Reg, value: u8) {
        match r {
            Reg::B => self.regs.b = value,
            Reg::C => self.regs.c = value,
            Reg::D => self.regs.d = value,
            Reg::E => self.regs.e = value,
            Reg::H => self.regs.h = value,
            Reg::L => self.regs.l = value,
            Reg::A => self.regs.a = value,
            Reg::AtHl => unreachable!("(hl) operands go through bus cycles"),
        }
    }

    /// 8-bit operand read with index substitution: `(HL)` becomes a
    /// displaced memory read, H/L become the index register halves.
    pub(crate) fn get_r(&mut self, r: Reg, d: u8, long_read: bool) -> u8 {
        match r {
            Reg::AtHl => self.read_at_disp(d, long_read),
            Reg::H if self.state.index_rp != IndexReg::Hl => (self.index_rp_value() >> 8) as u8,
            Reg::L if self.state.index_rp != IndexReg::Hl => self.index_rp_value() as u8,
            _ => self.get_reg8(r),
        }
    }

    /// 8-bit operand write, mirroring [`Self::get_r`].
    pub(crate) fn set_r(&mut self, r: Reg, d: u8, value: u8) {
        match r {
            Reg::AtHl => self.write_at_disp(d, value),
            Reg::H if self.state.index_rp != IndexReg::Hl => {
                let idx = self.index_rp_value();
                self.set_index_rp_value((idx & 0x00FF) | (u16::from(value) << 8));
            }
            Reg::L if self.state.index_rp != IndexReg::Hl => {
                let idx = self.index_rp_value();
                self.set_index_rp_value((idx & 0xFF00) | u16::from(value));
            }
            _ => self.set_reg8(r, value),
        }
    }

    /// Register pair read; the HL row resolves through the active index
    /// register pair, so `ADD IX, HL` means `ADD IX, IX`.
    pub(crate) fn get_rp(&self, rp: RegPair) -> u16 {
        match rp {
            RegPair::Bc => self.regs.bc(),
            RegPair::De => self.regs.de(),
            RegPair::Hl => self.index_rp_value(),
            RegPair::Sp => self.regs.sp,
        }
    }

    pub(crate) fn set_rp(&mut self, rp: RegPair, value: u16) {
        match rp {
            RegPair::Bc => self.regs.set_bc(value),
            RegPair::De => self.regs.set_de(value),
            RegPair::Hl => self.set_index_rp_value(value),
            RegPair::Sp => self.regs.sp = value,
        }
    }

    pub(crate) fn get_rp2(&self, rp: RegPair2) -> u16 {
        match rp {
            RegPair2::Bc => self.regs.bc(),
            RegPair2::De => self.regs.de(),
            RegPair2::Hl => self.index_rp_value(),
            RegPair2::Af => self.regs.af(),
        }
    }

    pub(crate) fn set_rp2(&mut self, rp: RegPair2, value: u16) {
        match rp {
            RegPair2::Bc => self.regs.set_bc(value),
            RegPair2::De => self.regs.set_de(value),
            RegPair2::Hl => self.set_index_rp_value(value),
            RegPair2::Af => self.regs.set_af(value),
        }
    }

    /// Value of the active index register pair (HL, IX or IY).
    pub(crate) fn index_rp_value(&self) -> u16 {
        match self.state.index_rp {
            IndexReg::Hl => self.regs.hl(),
            IndexReg::Ix => self.regs.ix,
            IndexReg::Iy => self.regs.iy,
        }
    }

    pub(crate) fn set_index_rp_value(&mut self, value: u16) {
        match self.state.index_rp {
            IndexReg::Hl => self.regs.set_hl(value),
            IndexReg::Ix => self.regs.ix = value,
            IndexReg::Iy => self.regs.iy = value,
        }
    }

    /// Read the displaced memory operand. Sets MEMPTR to the effective
    /// address in the indexed forms.
    pub(crate) fn read_at_disp(&mut self, d: u8, long_read: bool) -> u8 {
        let addr = disp_target(self.index_rp_value(), d);
        let t = if long_read { 4 } else { 3 };
        let value = self.read_cycle(addr, t);
        if self.state.index_rp != IndexReg::Hl {
            self.regs.wz = addr;
        }
        value
    }

    pub(crate) fn write_at_disp(&mut self, d: u8, value: u8) {
        let addr = disp_target(self.index_rp_value(), d);
        self.write_cycle(addr, value, 3);
        if self.state.index_rp != IndexReg::Hl {
            self.regs.wz = addr;
        }
    }

    /// Evaluate a branch condition against F.
    pub(crate) fn condition(&self, cc: Condition) -> bool {
        let f = self.regs.f;
        match cc {
            Condition::Nz => f & ZF == 0,
            Condition::Z => f & ZF != 0,
            Condition::Nc => f & CF == 0,
            Condition::C => f & CF != 0,
            Condition::Po => f & PF == 0,
            Condition::Pe => f & PF != 0,
            Condition::P => f & SF == 0,
            Condition::M => f & SF != 0,
        }
    }
}

/// Apply a signed 8-bit displacement to a base address.
pub(crate) fn disp_target(base: u16, d: u8) -> u16 {
    base.wrapping_add(i16::from(d as i8) as u16)
}

// The Host implementation lives in a separate file for readability.
mod execute;
