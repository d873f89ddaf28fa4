//! The instruction decoder shared by execution and disassembly.
//!
//! The decoder walks the five-table opcode tree (unprefixed, CB, ED, and
//! the DD/FD index compositions) and drives a [`Host`]: every byte it
//! consumes and every handler it dispatches goes through the trait, so
//! the same tables serve both the processor and the disassembler.

/// 8-bit register operands, in encoding order. Code 6 is the `(HL)`
/// memory operand, which the index prefixes turn into `(IX+d)`/`(IY+d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    B,
    C,
    D,
    E,
    H,
    L,
    AtHl,
    A,
}

impl Reg {
    /// Decode a 3-bit register field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 7 {
            0 => Self::B,
            1 => Self::C,
            2 => Self::D,
            3 => Self::E,
            4 => Self::H,
            5 => Self::L,
            6 => Self::AtHl,
            _ => Self::A,
        }
    }
}

/// Register pairs of the `rp` table (SP in the last slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegPair {
    Bc,
    De,
    Hl,
    Sp,
}

impl RegPair {
    /// Decode a 2-bit register pair field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Sp,
        }
    }
}

/// Register pairs of the `rp2` table used by PUSH/POP (AF in the last slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegPair2 {
    Bc,
    De,
    Hl,
    Af,
}

impl RegPair2 {
    /// Decode a 2-bit register pair field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Af,
        }
    }
}

/// The index register pair in effect for the current instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexReg {
    #[default]
    Hl,
    Ix,
    Iy,
}

/// Branch conditions, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

impl Condition {
    /// Decode a 3-bit condition field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 7 {
            0 => Self::Nz,
            1 => Self::Z,
            2 => Self::Nc,
            3 => Self::C,
            4 => Self::Po,
            5 => Self::Pe,
            6 => Self::P,
            _ => Self::M,
        }
    }
}

/// Accumulator ALU operations, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    /// Decode a 3-bit ALU operation field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 7 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Cp,
        }
    }
}

/// CB rotate/shift row operations, in encoding order. `Sll` is the
/// undocumented shift that feeds a one into bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

impl RotOp {
    /// Decode a 3-bit rotate/shift field.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 7 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Rl,
            3 => Self::Rr,
            4 => Self::Sla,
            5 => Self::Sra,
            6 => Self::Sll,
            _ => Self::Srl,
        }
    }
}

/// Block load variants. Bit 0 selects the decrementing direction,
/// bit 1 the repeating form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLd {
    Ldi,
    Ldd,
    Ldir,
    Lddr,
}

impl BlockLd {
    /// Decode a block-load variant from `y - 4`.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 3 {
            0 => Self::Ldi,
            1 => Self::Ldd,
            2 => Self::Ldir,
            _ => Self::Lddr,
        }
    }

    pub(crate) fn decrements(self) -> bool {
        matches!(self, Self::Ldd | Self::Lddr)
    }

    pub(crate) fn repeats(self) -> bool {
        matches!(self, Self::Ldir | Self::Lddr)
    }
}

/// Table-selecting prefix carried between decode steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefix {
    #[default]
    None,
    Cb,
    Ed,
}

/// Decoding state a host carries between decode steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderState {
    pub(crate) prefix: Prefix,
    pub(crate) index_rp: IndexReg,
    pub(crate) next_index_rp: IndexReg,
}

impl DecoderState {
    /// The index register pair of the instruction being decoded.
    #[must_use]
    pub fn index_rp(&self) -> IndexReg {
        self.index_rp
    }

    /// The prefix in effect for the next decode step.
    #[must_use]
    pub fn prefix(&self) -> Prefix {
        self.prefix
    }
}

const X_MASK: u8 = 0xC0;
const Z_MASK: u8 = 0x07;
const Q_MASK: u8 = 0x08;

/// The capability bundle the decoder drives.
///
/// One implementation executes instructions against processor state, the
/// other renders them as text. Byte primitives carry the T-state contract
/// in their names: `fetch` is the 4T M1 cycle, `imm8`/`disp_read` are 3T
/// reads, `imm8_long` is the 5T immediate of the indexed `LD (i+d), n`
/// form, and `imm16_call` reads its high byte in 4T.
pub trait Host {
    /// Decoder state, read side.
    fn decoder(&self) -> &DecoderState;
    /// Decoder state, write side.
    fn decoder_mut(&mut self) -> &mut DecoderState;

    /// Fetch the next opcode byte (4T M1 cycle).
    fn fetch(&mut self) -> u8;
    /// Extend the fetch cycle just performed by `t` T-states.
    fn fetch_extra(&mut self, t: u32);
    /// Read an immediate byte (3T).
    fn imm8(&mut self) -> u8;
    /// Read an immediate byte in a long cycle (5T).
    fn imm8_long(&mut self) -> u8;
    /// Read an immediate word, low byte first (3T + 3T).
    fn imm16(&mut self) -> u16;
    /// Read an immediate word for CALL (3T + 4T).
    fn imm16_call(&mut self) -> u16;
    /// Read a signed displacement byte (3T).
    fn disp_read(&mut self) -> u8;
    /// Internal machine cycle of `t` T-states.
    fn exec_cycle(&mut self, t: u32);
    /// Address of the instruction being decoded, for diagnostics.
    fn instr_addr(&self) -> u16;

    /// The index register pair in effect for this instruction.
    fn index_rp(&self) -> IndexReg {
        self.decoder().index_rp
    }

    /// A CB prefix byte was fetched. The pending index kind is carried
    /// through so DD CB / FD CB compositions keep their index register.
    fn cb_prefix(&mut self) {
        let irp = self.decoder().index_rp;
        let state = self.decoder_mut();
        state.prefix = Prefix::Cb;
        state.next_index_rp = irp;
    }

    /// An ED prefix byte was fetched.
    fn ed_prefix(&mut self) {
        self.decoder_mut().prefix = Prefix::Ed;
    }

    /// A DD or FD prefix byte was fetched; the next instruction decodes
    /// with the given index register pair. The processor also suppresses
    /// interrupt acceptance for one instruction here.
    fn set_next_index_rp(&mut self, irp: IndexReg) {
        self.decoder_mut().next_index_rp = irp;
    }

    /// An opcode outside the implemented set. This is a simulator bug,
    /// not guest behavior; abort with the offending address.
    fn unknown_opcode(&mut self, op: u8) {
        panic!(
            "unknown opcode {op:#04x} at {:#06x}",
            self.instr_addr()
        );
    }

    // === Unprefixed handlers ===

    fn nop(&mut self);
    fn halt(&mut self);
    fn ld_r_r(&mut self, rd: Reg, rs: Reg, d: u8);
    fn ld_r_n(&mut self, r: Reg, d: u8, n: u8);
    fn alu_r(&mut self, k: AluOp, r: Reg, d: u8);
    fn alu_n(&mut self, k: AluOp, n: u8);
    fn inc_r(&mut self, r: Reg, d: u8);
    fn dec_r(&mut self, r: Reg, d: u8);
    fn ld_rp_nn(&mut self, rp: RegPair, nn: u16);
    fn inc_rp(&mut self, rp: RegPair);
    fn dec_rp(&mut self, rp: RegPair);
    fn add_irp_rp(&mut self, rp: RegPair);
    fn pop_rp(&mut self, rp: RegPair2);
    fn push_rp(&mut self, rp: RegPair2);
    fn ex_af_af(&mut self);
    fn ex_de_hl(&mut self);
    fn exx(&mut self);
    fn rrca(&mut self);
    fn scf(&mut self);
    fn ccf(&mut self);
    fn djnz(&mut self, d: u8);
    fn jr(&mut self, d: u8);
    fn jr_cc(&mut self, cc: Condition, d: u8);
    fn jp_nn(&mut self, nn: u16);
    fn jp_irp(&mut self);
    fn call_nn(&mut self, nn: u16);
    fn ret(&mut self);
    fn ret_cc(&mut self, cc: Condition);
    fn ld_at_nn_irp(&mut self, nn: u16);
    fn ld_irp_at_nn(&mut self, nn: u16);
    fn ld_at_nn_a(&mut self, nn: u16);
    fn ld_a_at_nn(&mut self, nn: u16);
    fn ld_sp_irp(&mut self);
    fn out_n_a(&mut self, n: u8);
    fn di(&mut self);
    fn ei(&mut self);

    // === CB handlers ===

    fn rot(&mut self, op: RotOp, r: Reg, d: u8);
    fn bit(&mut self, b: u8, r: Reg, d: u8);
    fn res(&mut self, b: u8, r: Reg, d: u8);
    fn set(&mut self, b: u8, r: Reg, d: u8);

    // === ED handlers ===

    fn adc_hl_rp(&mut self, rp: RegPair);
    fn sbc_hl_rp(&mut self, rp: RegPair);
    fn ld_rp_at_nn(&mut self, rp: RegPair, nn: u16);
    fn ld_at_nn_rp(&mut self, nn: u16, rp: RegPair);
    fn im(&mut self, mode: u8);
    fn block_ld(&mut self, k: BlockLd);
    fn ld_i_a(&mut self);
    fn noni_ed(&mut self, op: u8);
}

/// Read the indexed displacement if the operand needs one, together with
/// the 5T internal cycle that accompanies it. Returns zero otherwise.
fn disp_if<H: Host>(host: &mut H, needed: bool) -> u8 {
    if !needed || host.index_rp() == IndexReg::Hl {
        return 0;
    }
    let d = host.disp_read();
    host.exec_cycle(5);
    d
}

fn disp_for<H: Host>(host: &mut H, r: Reg) -> u8 {
    disp_if(host, r == Reg::AtHl)
}

fn disp_for2<H: Host>(host: &mut H, r1: Reg, r2: Reg) -> u8 {
    disp_if(host, r1 == Reg::AtHl || r2 == Reg::AtHl)
}

/// ED interrupt mode field: y maps to modes 0, 0, 1, 2.
fn int_mode(y: u8) -> u8 {
    let y = y & 3;
    if y < 2 {
        0
    } else {
        y - 1
    }
}

/// Run one decode step against the host.
///
/// Latches the pending index register pair, branches on the stored
/// prefix, and resets the prefix after a CB/ED table decode. A step that
/// only consumes a DD/FD prefix byte records the pending index and
/// returns; the next step decodes with it applied.
pub fn decode<H: Host>(host: &mut H) {
    let state = host.decoder_mut();
    state.index_rp = state.next_index_rp;
    state.next_index_rp = IndexReg::Hl;
    let prefix = state.prefix;

    match prefix {
        Prefix::None => decode_unprefixed(host),
        Prefix::Cb => {
            decode_cb(host);
            host.decoder_mut().prefix = Prefix::None;
        }
        Prefix::Ed => {
            decode_ed(host);
            host.decoder_mut().prefix = Prefix::None;
        }
    }
}

#[allow(clippy::too_many_lines)]
fn decode_unprefixed<H: Host>(host: &mut H) {
    let op = host.fetch();
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = (op >> 4) & 3;

    match op & X_MASK {
        0x40 => {
            // LD r[y], r[z]; the (HL),(HL) slot decodes as HALT
            let rd = Reg::from_code(y);
            let rs = Reg::from_code(z);
            if rd == Reg::AtHl && rs == Reg::AtHl {
                return host.halt();
            }
            let d = disp_for2(host, rd, rs);
            return host.ld_r_r(rd, rs, d);
        }
        0x80 => {
            // alu[y] r[z]
            let k = AluOp::from_code(y);
            let r = Reg::from_code(z);
            let d = disp_for(host, r);
            return host.alu_r(k, r, d);
        }
        _ => {}
    }

    match op & (X_MASK | Z_MASK) {
        0x04 => {
            let r = Reg::from_code(y);
            let d = disp_for(host, r);
            return host.inc_r(r, d);
        }
        0x05 => {
            let r = Reg::from_code(y);
            let d = disp_for(host, r);
            return host.dec_r(r, d);
        }
        0x06 => {
            // LD r[y], n; the indexed memory form reads the displacement
            // first and the immediate in a 5T cycle
            let r = Reg::from_code(y);
            if r != Reg::AtHl || host.index_rp() == IndexReg::Hl {
                let n = host.imm8();
                return host.ld_r_n(r, 0, n);
            }
            let d = host.disp_read();
            let n = host.imm8_long();
            return host.ld_r_n(r, d, n);
        }
        0xC0 => {
            // RET cc: 5T fetch
            host.fetch_extra(1);
            return host.ret_cc(Condition::from_code(y));
        }
        0xC6 => {
            let n = host.imm8();
            return host.alu_n(AluOp::from_code(y), n);
        }
        _ => {}
    }

    if op & 0xE7 == 0x20 {
        // JR cc[y-4], d
        let cc = Condition::from_code((op >> 3) & 3);
        let d = host.disp_read();
        return host.jr_cc(cc, d);
    }

    match op & (X_MASK | Z_MASK | Q_MASK) {
        0x01 => {
            let rp = RegPair::from_code(p);
            let nn = host.imm16();
            return host.ld_rp_nn(rp, nn);
        }
        0x03 => {
            // INC rp: 6T fetch
            host.fetch_extra(2);
            return host.inc_rp(RegPair::from_code(p));
        }
        0x09 => return host.add_irp_rp(RegPair::from_code(p)),
        0x0B => {
            host.fetch_extra(2);
            return host.dec_rp(RegPair::from_code(p));
        }
        0xC1 => return host.pop_rp(RegPair2::from_code(p)),
        0xC5 => {
            // PUSH rp2: 5T fetch
            host.fetch_extra(1);
            return host.push_rp(RegPair2::from_code(p));
        }
        _ => {}
    }

    match op {
        0x00 => host.nop(),
        0x08 => host.ex_af_af(),
        0x0F => host.rrca(),
        0x10 => {
            // DJNZ: 5T fetch, then the displacement
            host.fetch_extra(1);
            let d = host.disp_read();
            host.djnz(d);
        }
        0x18 => {
            let d = host.disp_read();
            host.jr(d);
        }
        0x22 => {
            let nn = host.imm16();
            host.ld_at_nn_irp(nn);
        }
        0x2A => {
            let nn = host.imm16();
            host.ld_irp_at_nn(nn);
        }
        0x32 => {
            let nn = host.imm16();
            host.ld_at_nn_a(nn);
        }
        0x37 => host.scf(),
        0x3A => {
            let nn = host.imm16();
            host.ld_a_at_nn(nn);
        }
        0x3F => host.ccf(),
        0xC3 => {
            let nn = host.imm16();
            host.jp_nn(nn);
        }
        0xC9 => host.ret(),
        0xCB => host.cb_prefix(),
        0xCD => {
            let nn = host.imm16_call();
            host.call_nn(nn);
        }
        0xD3 => {
            let n = host.imm8();
            host.out_n_a(n);
        }
        0xD9 => host.exx(),
        0xDD => host.set_next_index_rp(IndexReg::Ix),
        0xE9 => host.jp_irp(),
        0xEB => host.ex_de_hl(),
        0xED => host.ed_prefix(),
        0xF3 => host.di(),
        0xF9 => {
            // LD SP, HL: 6T fetch
            host.fetch_extra(2);
            host.ld_sp_irp();
        }
        0xFB => host.ei(),
        0xFD => host.set_next_index_rp(IndexReg::Iy),
        _ => host.unknown_opcode(op),
    }
}

fn decode_cb<H: Host>(host: &mut H) {
    // In the indexed compositions the displacement precedes the opcode,
    // and the opcode fetch stretches to 5T.
    let indexed = host.index_rp() != IndexReg::Hl;
    let d = if indexed { host.disp_read() } else { 0 };
    let op = host.fetch();
    if indexed {
        host.fetch_extra(1);
    }

    let y = (op >> 3) & 7;
    let r = Reg::from_code(op & 7);
    match op & X_MASK {
        0x00 => host.rot(RotOp::from_code(y), r, d),
        0x40 => host.bit(y, r, d),
        0x80 => host.res(y, r, d),
        _ => host.set(y, r, d),
    }
}

fn decode_ed<H: Host>(host: &mut H) {
    let op = host.fetch();
    let y = (op >> 3) & 7;
    let p = (op >> 4) & 3;

    match op & (X_MASK | Z_MASK) {
        0x42 => {
            let rp = RegPair::from_code(p);
            if op & Q_MASK != 0 {
                return host.adc_hl_rp(rp);
            }
            return host.sbc_hl_rp(rp);
        }
        0x43 => {
            let rp = RegPair::from_code(p);
            let nn = host.imm16();
            if op & Q_MASK != 0 {
                return host.ld_rp_at_nn(rp, nn);
            }
            return host.ld_at_nn_rp(nn, rp);
        }
        0x46 => return host.im(int_mode(y)),
        0x80 => {
            if y >= 4 {
                return host.block_ld(BlockLd::from_code(y - 4));
            }
            return host.noni_ed(op);
        }
        _ => {}
    }

    match op {
        0x47 => {
            // LD I, A: 5T second fetch
            host.fetch_extra(1);
            host.ld_i_a();
        }
        // Every other ED opcode is NONI: no operation, no interrupt
        _ => host.noni_ed(op),
    }
}
