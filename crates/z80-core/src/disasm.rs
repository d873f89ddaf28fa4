//! The disassembly handler set: renders the decoder's instruction stream
//! as assembler text, one line per instruction.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

use std::fmt::Write;

use crate::decoder::{
    self, AluOp, BlockLd, Condition, DecoderState, Host, IndexReg, Reg, RegPair, RegPair2, RotOp,
};

/// Byte source feeding the disassembler.
pub trait InstrSource {
    /// Next byte of the instruction stream.
    fn read(&mut self) -> u8;

    /// Address of the byte about to be read, for diagnostics.
    fn instr_addr(&self) -> u16 {
        0
    }
}

/// An [`InstrSource`] over a byte slice. Reads past the end yield zero.
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: u16,
}

impl<'a> SliceSource<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8], base: u16) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

impl InstrSource for SliceSource<'_> {
    fn read(&mut self) -> u8 {
        let byte = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        byte
    }

    fn instr_addr(&self) -> u16 {
        self.base.wrapping_add(self.pos as u16)
    }
}

/// Typed arguments of the format mini-language. Each directive letter in
/// a format string consumes one argument and renders it by kind.
enum Arg {
    /// `R`: 8-bit register operand with index substitution.
    R(Reg, IndexReg, u8),
    /// `P`: register pair, HL resolving through the index register.
    P(RegPair, IndexReg),
    /// `G`: PUSH/POP register pair (AF instead of SP).
    G(RegPair2, IndexReg),
    /// `N`: 8-bit immediate.
    N(u8),
    /// `W`: 16-bit immediate.
    W(u16),
    /// `U`: small unsigned integer (bit numbers, interrupt modes).
    U(u32),
    /// `C`: branch condition.
    C(Condition),
    /// `D`: PC-relative branch target.
    D(i32),
    /// `A`: ALU mnemonic, including the `a,` of its two-operand forms.
    A(AluOp),
    /// `L`: block-load mnemonic.
    L(BlockLd),
}

/// Streaming disassembler over an [`InstrSource`].
///
/// Shares the decoder with the processor but never touches CPU state;
/// every handler formats text instead.
pub struct Disassembler<S: InstrSource> {
    src: S,
    state: DecoderState,
    line: String,
}

impl<S: InstrSource> Disassembler<S> {
    #[must_use]
    pub fn new(src: S) -> Self {
        Self {
            src,
            state: DecoderState::default(),
            line: String::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.src
    }

    /// Disassemble one instruction and return its line.
    ///
    /// Prefix bytes emit nothing on their own; decode steps are taken
    /// until a complete instruction has been rendered.
    pub fn disassemble(&mut self) -> &str {
        self.line.clear();
        while self.line.is_empty() {
            decoder::decode(self);
        }
        &self.line
    }

    /// The line produced by the last decode.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.line
    }

    /// Render `fmt`, replacing each uppercase directive letter with the
    /// next argument. All other characters pass through.
    fn format(&mut self, fmt: &str, args: &[Arg]) {
        let mut args = args.iter();
        self.line.clear();
        for ch in fmt.chars() {
            if ch.is_ascii_uppercase() {
                if let Some(arg) = args.next() {
                    self.render(arg);
                }
            } else {
                self.line.push(ch);
            }
        }
    }

    fn render(&mut self, arg: &Arg) {
        match *arg {
            Arg::R(r, irp, d) => self.render_reg(r, irp, d),
            Arg::P(rp, irp) => self.line.push_str(rp_name(rp, irp)),
            Arg::G(rp, irp) => self.line.push_str(rp2_name(rp, irp)),
            Arg::N(n) => {
                let _ = write!(self.line, "{n:#04x}");
            }
            Arg::W(w) => {
                let _ = write!(self.line, "{w:#06x}");
            }
            Arg::U(u) => {
                let _ = write!(self.line, "{u}");
            }
            Arg::C(cc) => self.line.push_str(condition_name(cc)),
            Arg::D(target) => {
                let _ = write!(self.line, "${target:+}");
            }
            Arg::A(k) => self.line.push_str(alu_name(k)),
            Arg::L(k) => self.line.push_str(block_ld_name(k)),
        }
    }

    fn render_reg(&mut self, r: Reg, irp: IndexReg, d: u8) {
        match r {
            Reg::AtHl if irp != IndexReg::Hl => {
                let _ = write!(self.line, "({}{:+})", index_name(irp), i32::from(d as i8));
            }
            Reg::H if irp == IndexReg::Ix => self.line.push_str("ixh"),
            Reg::H if irp == IndexReg::Iy => self.line.push_str("iyh"),
            Reg::L if irp == IndexReg::Ix => self.line.push_str("ixl"),
            Reg::L if irp == IndexReg::Iy => self.line.push_str("iyl"),
            _ => self.line.push_str(reg_name(r)),
        }
    }

    fn rot_mnemonic(&mut self, op: RotOp, r: Reg, d: u8) {
        let irp = self.index_rp();
        if irp == IndexReg::Hl || r == Reg::AtHl {
            let shown = if irp == IndexReg::Hl { r } else { Reg::AtHl };
            self.format(&format!("{} R", rot_name(op)), &[Arg::R(shown, irp, d)]);
        } else {
            // Undocumented indexed form with the register copy.
            self.format(
                &format!("{} R, R", rot_name(op)),
                &[Arg::R(Reg::AtHl, irp, d), Arg::R(r, IndexReg::Hl, 0)],
            );
        }
    }
}

fn reg_name(r: Reg) -> &'static str {
    match r {
        Reg::B => "b",
        Reg::C => "c",
        Reg::D => "d",
        Reg::E => "e",
        Reg::H => "h",
        Reg::L => "l",
        Reg::AtHl => "(hl)",
        Reg::A => "a",
    }
}

fn index_name(irp: IndexReg) -> &'static str {
    match irp {
        IndexReg::Hl => "hl",
        IndexReg::Ix => "ix",
        IndexReg::Iy => "iy",
    }
}

fn rp_name(rp: RegPair, irp: IndexReg) -> &'static str {
    match rp {
        RegPair::Bc => "bc",
        RegPair::De => "de",
        RegPair::Hl => index_name(irp),
        RegPair::Sp => "sp",
    }
}

fn rp2_name(rp: RegPair2, irp: IndexReg) -> &'static str {
    match rp {
        RegPair2::Bc => "bc",
        RegPair2::De => "de",
        RegPair2::Hl => index_name(irp),
        RegPair2::Af => "af",
    }
}

fn condition_name(cc: Condition) -> &'static str {
    match cc {
        Condition::Nz => "nz",
        Condition::Z => "z",
        Condition::Nc => "nc",
        Condition::C => "c",
        Condition::Po => "po",
        Condition::Pe => "pe",
        Condition::P => "p",
        Condition::M => "m",
    }
}

/// ALU mnemonics; ADD/ADC/SBC are written with their `a,` operand.
fn alu_name(k: AluOp) -> &'static str {
    match k {
        AluOp::Add => "add a,",
        AluOp::Adc => "adc a,",
        AluOp::Sub => "sub",
        AluOp::Sbc => "sbc a,",
        AluOp::And => "and",
        AluOp::Xor => "xor",
        AluOp::Or => "or",
        AluOp::Cp => "cp",
    }
}

fn rot_name(op: RotOp) -> &'static str {
    match op {
        RotOp::Rlc => "rlc",
        RotOp::Rrc => "rrc",
        RotOp::Rl => "rl",
        RotOp::Rr => "rr",
        RotOp::Sla => "sla",
        RotOp::Sra => "sra",
        RotOp::Sll => "sll",
        RotOp::Srl => "srl",
    }
}

fn block_ld_name(k: BlockLd) -> &'static str {
    match k {
        BlockLd::Ldi => "ldi",
        BlockLd::Ldd => "ldd",
        BlockLd::Ldir => "ldir",
        BlockLd::Lddr => "lddr",
    }
}

/// Branch target for the relative forms: displacement plus the two
/// instruction bytes, printed `$+n`.
fn rel_target(d: u8) -> i32 {
    i32::from(d as i8) + 2
}

impl<S: InstrSource> Host for Disassembler<S> {
    fn decoder(&self) -> &DecoderState {
        &self.state
    }

    fn decoder_mut(&mut self) -> &mut DecoderState {
        &mut self.state
    }

    fn fetch(&mut self) -> u8 {
        self.src.read()
    }

    fn fetch_extra(&mut self, _t: u32) {}

    fn imm8(&mut self) -> u8 {
        self.src.read()
    }

    fn imm8_long(&mut self) -> u8 {
        self.src.read()
    }

    fn imm16(&mut self) -> u16 {
        let lo = self.src.read();
        let hi = self.src.read();
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn imm16_call(&mut self) -> u16 {
        self.imm16()
    }

    fn disp_read(&mut self) -> u8 {
        self.src.read()
    }

    fn exec_cycle(&mut self, _t: u32) {}

    fn instr_addr(&self) -> u16 {
        self.src.instr_addr()
    }

    // === Unprefixed handlers ===

    fn nop(&mut self) {
        self.format("nop", &[]);
    }

    fn halt(&mut self) {
        self.format("halt", &[]);
    }

    fn ld_r_r(&mut self, rd: Reg, rs: Reg, d: u8) {
        let irp = self.index_rp();
        self.format("ld R, R", &[Arg::R(rd, irp, d), Arg::R(rs, irp, d)]);
    }

    fn ld_r_n(&mut self, r: Reg, d: u8, n: u8) {
        let irp = self.index_rp();
        self.format("ld R, N", &[Arg::R(r, irp, d), Arg::N(n)]);
    }

    fn alu_r(&mut self, k: AluOp, r: Reg, d: u8) {
        let irp = self.index_rp();
        self.format("A R", &[Arg::A(k), Arg::R(r, irp, d)]);
    }

    fn alu_n(&mut self, k: AluOp, n: u8) {
        self.format("A N", &[Arg::A(k), Arg::N(n)]);
    }

    fn inc_r(&mut self, r: Reg, d: u8) {
        let irp = self.index_rp();
        self.format("inc R", &[Arg::R(r, irp, d)]);
    }

    fn dec_r(&mut self, r: Reg, d: u8) {
        let irp = self.index_rp();
        self.format("dec R", &[Arg::R(r, irp, d)]);
    }

    fn ld_rp_nn(&mut self, rp: RegPair, nn: u16) {
        let irp = self.index_rp();
        self.format("ld P, W", &[Arg::P(rp, irp), Arg::W(nn)]);
    }

    fn inc_rp(&mut self, rp: RegPair) {
        let irp = self.index_rp();
        self.format("inc P", &[Arg::P(rp, irp)]);
    }

    fn dec_rp(&mut self, rp: RegPair) {
        let irp = self.index_rp();
        self.format("dec P", &[Arg::P(rp, irp)]);
    }

    fn add_irp_rp(&mut self, rp: RegPair) {
        let irp = self.index_rp();
        self.format(
            "add P, P",
            &[Arg::P(RegPair::Hl, irp), Arg::P(rp, irp)],
        );
    }

    fn pop_rp(&mut self, rp: RegPair2) {
        let irp = self.index_rp();
        self.format("pop G", &[Arg::G(rp, irp)]);
    }

    fn push_rp(&mut self, rp: RegPair2) {
        let irp = self.index_rp();
        self.format("push G", &[Arg::G(rp, irp)]);
    }

    fn ex_af_af(&mut self) {
        self.format("ex af, af'", &[]);
    }

    fn ex_de_hl(&mut self) {
        self.format("ex de, hl", &[]);
    }

    fn exx(&mut self) {
        self.format("exx", &[]);
    }

    fn rrca(&mut self) {
        self.format("rrca", &[]);
    }

    fn scf(&mut self) {
        self.format("scf", &[]);
    }

    fn ccf(&mut self) {
        self.format("ccf", &[]);
    }

    fn djnz(&mut self, d: u8) {
        self.format("djnz D", &[Arg::D(rel_target(d))]);
    }

    fn jr(&mut self, d: u8) {
        self.format("jr D", &[Arg::D(rel_target(d))]);
    }

    fn jr_cc(&mut self, cc: Condition, d: u8) {
        self.format("jr C, D", &[Arg::C(cc), Arg::D(rel_target(d))]);
    }

    fn jp_nn(&mut self, nn: u16) {
        self.format("jp W", &[Arg::W(nn)]);
    }

    fn jp_irp(&mut self) {
        let irp = self.index_rp();
        self.format("jp (P)", &[Arg::P(RegPair::Hl, irp)]);
    }

    fn call_nn(&mut self, nn: u16) {
        self.format("call W", &[Arg::W(nn)]);
    }

    fn ret(&mut self) {
        self.format("ret", &[]);
    }

    fn ret_cc(&mut self, cc: Condition) {
        self.format("ret C", &[Arg::C(cc)]);
    }

    fn ld_at_nn_irp(&mut self, nn: u16) {
        let irp = self.index_rp();
        self.format("ld (W), P", &[Arg::W(nn), Arg::P(RegPair::Hl, irp)]);
    }

    fn ld_irp_at_nn(&mut self, nn: u16) {
        let irp = self.index_rp();
        self.format("ld P, (W)", &[Arg::P(RegPair::Hl, irp), Arg::W(nn)]);
    }

    fn ld_at_nn_a(&mut self, nn: u16) {
        self.format("ld (W), a", &[Arg::W(nn)]);
    }

    fn ld_a_at_nn(&mut self, nn: u16) {
        self.format("ld a, (W)", &[Arg::W(nn)]);
    }

    fn ld_sp_irp(&mut self) {
        let irp = self.index_rp();
        self.format("ld sp, P", &[Arg::P(RegPair::Hl, irp)]);
    }

    fn out_n_a(&mut self, n: u8) {
        self.format("out (N), a", &[Arg::N(n)]);
    }

    fn di(&mut self) {
        self.format("di", &[]);
    }

    fn ei(&mut self) {
        self.format("ei", &[]);
    }

    // === CB handlers ===

    fn rot(&mut self, op: RotOp, r: Reg, d: u8) {
        self.rot_mnemonic(op, r, d);
    }

    fn bit(&mut self, b: u8, r: Reg, d: u8) {
        let irp = self.index_rp();
        let shown = if irp == IndexReg::Hl { r } else { Reg::AtHl };
        self.format("bit U, R", &[Arg::U(b.into()), Arg::R(shown, irp, d)]);
    }

    fn res(&mut self, b: u8, r: Reg, d: u8) {
        let irp = self.index_rp();
        if irp == IndexReg::Hl || r == Reg::AtHl {
            let shown = if irp == IndexReg::Hl { r } else { Reg::AtHl };
            self.format("res U, R", &[Arg::U(b.into()), Arg::R(shown, irp, d)]);
        } else {
            self.format(
                "res U, R, R",
                &[
                    Arg::U(b.into()),
                    Arg::R(Reg::AtHl, irp, d),
                    Arg::R(r, IndexReg::Hl, 0),
                ],
            );
        }
    }

    fn set(&mut self, b: u8, r: Reg, d: u8) {
        let irp = self.index_rp();
        if irp == IndexReg::Hl || r == Reg::AtHl {
            let shown = if irp == IndexReg::Hl { r } else { Reg::AtHl };
            self.format("set U, R", &[Arg::U(b.into()), Arg::R(shown, irp, d)]);
        } else {
            self.format(
                "set U, R, R",
                &[
                    Arg::U(b.into()),
                    Arg::R(Reg::AtHl, irp, d),
                    Arg::R(r, IndexReg::Hl, 0),
                ],
            );
        }
    }

    // === ED handlers ===

    fn adc_hl_rp(&mut self, rp: RegPair) {
        self.format("adc hl, P", &[Arg::P(rp, IndexReg::Hl)]);
    }

    fn sbc_hl_rp(&mut self, rp: RegPair) {
        self.format("sbc hl, P", &[Arg::P(rp, IndexReg::Hl)]);
    }

    fn ld_rp_at_nn(&mut self, rp: RegPair, nn: u16) {
        self.format("ld P, (W)", &[Arg::P(rp, IndexReg::Hl), Arg::W(nn)]);
    }

    fn ld_at_nn_rp(&mut self, nn: u16, rp: RegPair) {
        self.format("ld (W), P", &[Arg::W(nn), Arg::P(rp, IndexReg::Hl)]);
    }

    fn im(&mut self, mode: u8) {
        self.format("im U", &[Arg::U(mode.into())]);
    }

    fn block_ld(&mut self, k: BlockLd) {
        self.format("L", &[Arg::L(k)]);
    }

    fn ld_i_a(&mut self) {
        self.format("ld i, a", &[]);
    }

    fn noni_ed(&mut self, op: u8) {
        self.format("noni N, N", &[Arg::N(0xED), Arg::N(op)]);
    }
}

/// Disassemble a buffer to one line per instruction.
#[must_use]
pub fn disassemble(code: &[u8]) -> Vec<String> {
    let mut disasm = Disassembler::new(SliceSource::new(code, 0));
    let mut lines = Vec::new();
    while !disasm.source().at_end() {
        lines.push(disasm.disassemble().to_string());
    }
    lines
}
