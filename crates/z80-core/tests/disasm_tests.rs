//! Disassembly output tests.
//!
//! Each byte sequence must render to the canonical mnemonic strings.

use z80_core::disassemble;

fn one(code: &[u8]) -> String {
    let lines = disassemble(code);
    assert_eq!(lines.len(), 1, "expected a single instruction: {lines:?}");
    lines.into_iter().next().unwrap()
}

#[test]
fn basics() {
    assert_eq!(one(&[0x00]), "nop");
    assert_eq!(one(&[0x3E, 0x42]), "ld a, 0x42");
    assert_eq!(one(&[0xC3, 0x34, 0x12]), "jp 0x1234");
    assert_eq!(one(&[0x3C]), "inc a");
    assert_eq!(one(&[0x76]), "halt");
    assert_eq!(one(&[0xC9]), "ret");
    assert_eq!(one(&[0xC0]), "ret nz");
    assert_eq!(one(&[0xCD, 0x00, 0x40]), "call 0x4000");
}

#[test]
fn sixteen_bit_forms() {
    assert_eq!(
        disassemble(&[0x21, 0x00, 0x80, 0x29]),
        ["ld hl, 0x8000", "add hl, hl"]
    );
    assert_eq!(one(&[0x22, 0x34, 0x12]), "ld (0x1234), hl");
    assert_eq!(one(&[0x2A, 0x34, 0x12]), "ld hl, (0x1234)");
    assert_eq!(one(&[0x3A, 0x34, 0x12]), "ld a, (0x1234)");
    assert_eq!(one(&[0x32, 0x34, 0x12]), "ld (0x1234), a");
    assert_eq!(one(&[0x03]), "inc bc");
    assert_eq!(one(&[0x0B]), "dec bc");
    assert_eq!(one(&[0xF9]), "ld sp, hl");
    assert_eq!(one(&[0xF5]), "push af");
    assert_eq!(one(&[0xC1]), "pop bc");
}

#[test]
fn alu_spellings() {
    assert_eq!(one(&[0xC6, 0x12]), "add a, 0x12");
    assert_eq!(one(&[0xCE, 0x12]), "adc a, 0x12");
    assert_eq!(one(&[0xD6, 0x12]), "sub 0x12");
    assert_eq!(one(&[0xDE, 0x12]), "sbc a, 0x12");
    assert_eq!(one(&[0xE6, 0x0F]), "and 0x0f");
    assert_eq!(one(&[0xFE, 0x12]), "cp 0x12");
    assert_eq!(one(&[0x86]), "add a, (hl)");
    assert_eq!(one(&[0xBB]), "cp e");
}

#[test]
fn relative_branches() {
    assert_eq!(one(&[0x10, 0x02]), "djnz $+4");
    assert_eq!(one(&[0x18, 0xFC]), "jr $-2");
    assert_eq!(one(&[0x20, 0x00]), "jr nz, $+2");
    assert_eq!(one(&[0x38, 0x10]), "jr c, $+18");
}

#[test]
fn cb_table() {
    assert_eq!(one(&[0xCB, 0x47]), "bit 0, a");
    assert_eq!(one(&[0xCB, 0x5E]), "bit 3, (hl)");
    assert_eq!(one(&[0xCB, 0x00]), "rlc b");
    assert_eq!(one(&[0xCB, 0x36]), "sll (hl)");
    assert_eq!(one(&[0xCB, 0x87]), "res 0, a");
    assert_eq!(one(&[0xCB, 0xFE]), "set 7, (hl)");
}

#[test]
fn indexed_forms() {
    assert_eq!(one(&[0xDD, 0x7E, 0x05]), "ld a, (ix+5)");
    assert_eq!(one(&[0xFD, 0x7E, 0xFB]), "ld a, (iy-5)");
    assert_eq!(one(&[0xDD, 0x36, 0x05, 0x42]), "ld (ix+5), 0x42");
    assert_eq!(one(&[0xDD, 0x26, 0x42]), "ld ixh, 0x42");
    assert_eq!(one(&[0xFD, 0x6C]), "ld iyl, iyh"); // iy-substituted h and l
    assert_eq!(one(&[0xDD, 0x21, 0x34, 0x12]), "ld ix, 0x1234");
    assert_eq!(one(&[0xDD, 0x29]), "add ix, ix");
    assert_eq!(one(&[0xDD, 0xE9]), "jp (ix)");
    assert_eq!(one(&[0xDD, 0xE5]), "push ix");
    assert_eq!(one(&[0xDD, 0x34, 0x05]), "inc (ix+5)");
}

#[test]
fn indexed_cb_forms() {
    assert_eq!(one(&[0xDD, 0xCB, 0x05, 0x5E]), "bit 3, (ix+5)");
    assert_eq!(one(&[0xDD, 0xCB, 0x05, 0xC6]), "set 0, (ix+5)");
    assert_eq!(one(&[0xDD, 0xCB, 0x05, 0xC0]), "set 0, (ix+5), b");
    assert_eq!(one(&[0xDD, 0xCB, 0x05, 0x06]), "rlc (ix+5)");
    assert_eq!(one(&[0xDD, 0xCB, 0x05, 0x01]), "rlc (ix+5), c");
    assert_eq!(one(&[0xFD, 0xCB, 0xFE, 0x96]), "res 2, (iy-2)");
}

#[test]
fn ed_table() {
    assert_eq!(one(&[0xED, 0xB0]), "ldir");
    assert_eq!(one(&[0xED, 0xA8]), "ldd");
    assert_eq!(one(&[0xED, 0x4A]), "adc hl, bc");
    assert_eq!(one(&[0xED, 0x52]), "sbc hl, de");
    assert_eq!(one(&[0xED, 0x43, 0x34, 0x12]), "ld (0x1234), bc");
    assert_eq!(one(&[0xED, 0x7B, 0x34, 0x12]), "ld sp, (0x1234)");
    assert_eq!(one(&[0xED, 0x5E]), "im 2");
    assert_eq!(one(&[0xED, 0x47]), "ld i, a");
    assert_eq!(one(&[0xED, 0x00]), "noni 0xed, 0x00");
}

#[test]
fn exchanges_and_misc() {
    assert_eq!(one(&[0x08]), "ex af, af'");
    assert_eq!(one(&[0xEB]), "ex de, hl");
    assert_eq!(one(&[0xD9]), "exx");
    assert_eq!(one(&[0x0F]), "rrca");
    assert_eq!(one(&[0x37]), "scf");
    assert_eq!(one(&[0x3F]), "ccf");
    assert_eq!(one(&[0xF3]), "di");
    assert_eq!(one(&[0xFB]), "ei");
    assert_eq!(one(&[0xD3, 0xFE]), "out (0xfe), a");
    assert_eq!(one(&[0xE9]), "jp (hl)");
}

#[test]
fn streams_multiple_instructions() {
    let lines = disassemble(&[
        0x3E, 0x01, // ld a, 0x01
        0xDD, 0x77, 0x03, // ld (ix+3), a
        0xED, 0xB0, // ldir
        0x76, // halt
    ]);
    assert_eq!(lines, ["ld a, 0x01", "ld (ix+3), a", "ldir", "halt"]);
}
