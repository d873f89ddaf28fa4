//! Single-step test vector runner.
//!
//! Loads a JSON file of single-step vectors, drives each one through the
//! CPU until the vector's T-state count is spent, and diffs the full
//! machine state against the expected outcome. Exits nonzero if any
//! vector fails.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Deserialize;
use z80_core::{SimpleBus, Z80};

/// One test vector: a starting state, the expected final state, and the
/// per-T-state bus activity (only its length matters here).
#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    #[serde(default)]
    wz: u16,
    #[serde(rename = "af_")]
    af_alt: u16,
    #[serde(rename = "bc_")]
    bc_alt: u16,
    #[serde(rename = "de_")]
    de_alt: u16,
    #[serde(rename = "hl_")]
    hl_alt: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    ram: Vec<(u16, u8)>,
}

/// Build a CPU over a fresh bus from the vector's initial state.
fn setup(state: &CpuState) -> Z80<SimpleBus> {
    let mut bus = SimpleBus::new();
    for &(addr, value) in &state.ram {
        bus.load(addr, &[value]);
    }

    let mut cpu = Z80::new(bus);
    cpu.regs.a = state.a;
    cpu.regs.f = state.f;
    cpu.regs.b = state.b;
    cpu.regs.c = state.c;
    cpu.regs.d = state.d;
    cpu.regs.e = state.e;
    cpu.regs.h = state.h;
    cpu.regs.l = state.l;

    cpu.regs.a_alt = (state.af_alt >> 8) as u8;
    cpu.regs.f_alt = state.af_alt as u8;
    cpu.regs.b_alt = (state.bc_alt >> 8) as u8;
    cpu.regs.c_alt = state.bc_alt as u8;
    cpu.regs.d_alt = (state.de_alt >> 8) as u8;
    cpu.regs.e_alt = state.de_alt as u8;
    cpu.regs.h_alt = (state.hl_alt >> 8) as u8;
    cpu.regs.l_alt = state.hl_alt as u8;

    cpu.regs.ix = state.ix;
    cpu.regs.iy = state.iy;
    cpu.regs.sp = state.sp;
    cpu.regs.pc = state.pc;
    cpu.regs.i = state.i;
    cpu.regs.r = state.r;
    cpu.regs.wz = state.wz;

    cpu.regs.iff1 = state.iff1 != 0;
    cpu.regs.iff2 = state.iff2 != 0;
    cpu.regs.im = state.im;
    cpu
}

/// Compare the CPU and memory against the expected state, returning a
/// list of mismatches.
fn compare(cpu: &Z80<SimpleBus>, expected: &CpuState, expected_ticks: u64) -> Vec<String> {
    let mut errors = Vec::new();

    check_u8(&mut errors, "A", cpu.regs.a, expected.a);
    check_u8(&mut errors, "F", cpu.regs.f, expected.f);
    check_u8(&mut errors, "B", cpu.regs.b, expected.b);
    check_u8(&mut errors, "C", cpu.regs.c, expected.c);
    check_u8(&mut errors, "D", cpu.regs.d, expected.d);
    check_u8(&mut errors, "E", cpu.regs.e, expected.e);
    check_u8(&mut errors, "H", cpu.regs.h, expected.h);
    check_u8(&mut errors, "L", cpu.regs.l, expected.l);

    let af_alt = (u16::from(cpu.regs.a_alt) << 8) | u16::from(cpu.regs.f_alt);
    check_u16(&mut errors, "AF'", af_alt, expected.af_alt);
    let bc_alt = (u16::from(cpu.regs.b_alt) << 8) | u16::from(cpu.regs.c_alt);
    check_u16(&mut errors, "BC'", bc_alt, expected.bc_alt);
    let de_alt = (u16::from(cpu.regs.d_alt) << 8) | u16::from(cpu.regs.e_alt);
    check_u16(&mut errors, "DE'", de_alt, expected.de_alt);
    let hl_alt = (u16::from(cpu.regs.h_alt) << 8) | u16::from(cpu.regs.l_alt);
    check_u16(&mut errors, "HL'", hl_alt, expected.hl_alt);

    check_u16(&mut errors, "IX", cpu.regs.ix, expected.ix);
    check_u16(&mut errors, "IY", cpu.regs.iy, expected.iy);
    check_u16(&mut errors, "SP", cpu.regs.sp, expected.sp);
    check_u16(&mut errors, "PC", cpu.regs.pc, expected.pc);
    check_u8(&mut errors, "I", cpu.regs.i, expected.i);
    check_u8(&mut errors, "R", cpu.regs.r, expected.r);
    check_u16(&mut errors, "WZ", cpu.regs.wz, expected.wz);

    if cpu.regs.iff1 != (expected.iff1 != 0) {
        errors.push(format!("IFF1: got {}, want {}", cpu.regs.iff1, expected.iff1));
    }
    if cpu.regs.iff2 != (expected.iff2 != 0) {
        errors.push(format!("IFF2: got {}, want {}", cpu.regs.iff2, expected.iff2));
    }
    check_u8(&mut errors, "IM", cpu.regs.im, expected.im);

    if cpu.bus().ticks() != expected_ticks {
        errors.push(format!(
            "T-states: got {}, want {expected_ticks}",
            cpu.bus().ticks()
        ));
    }

    for &(addr, value) in &expected.ram {
        let actual = cpu.bus().peek(addr);
        if actual != value {
            errors.push(format!(
                "RAM[${addr:04X}]: got ${actual:02X}, want ${value:02X}"
            ));
        }
    }

    errors
}

fn check_u8(errors: &mut Vec<String>, name: &str, actual: u8, expected: u8) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:02X}, want ${expected:02X}"));
    }
}

fn check_u16(errors: &mut Vec<String>, name: &str, actual: u16, expected: u16) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:04X}, want ${expected:04X}"));
    }
}

/// Run one vector. Steps until the vector's T-state count is reached, so
/// prefix bytes and repeating block instructions are covered whole.
fn run_test(test: &TestCase) -> Result<(), String> {
    let expected_ticks = test.cycles.len() as u64;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut cpu = setup(&test.initial);
        while cpu.bus().ticks() < expected_ticks {
            cpu.step();
        }
        compare(&cpu, &test.final_state, expected_ticks)
    }));

    match outcome {
        Ok(errors) if errors.is_empty() => Ok(()),
        Ok(errors) => Err(errors.join(", ")),
        Err(cause) => {
            let msg = cause
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| cause.downcast_ref::<&str>().map(|s| (*s).to_string()))
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("PANIC: {msg}"))
        }
    }
}

fn run_file(path: &str) -> Result<u32> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("cannot read test vectors '{path}'"))?;
    let tests: Vec<TestCase> =
        serde_json::from_str(&data).with_context(|| format!("cannot parse '{path}'"))?;

    let mut passed = 0u32;
    let mut failed = 0u32;

    for test in &tests {
        match run_test(test) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                if failed <= 20 {
                    println!("[FAIL] {}: {e}", test.name);
                }
            }
        }
    }

    println!("{path}: {passed}/{} passed", passed + failed);
    Ok(failed)
}

fn main() -> Result<ExitCode> {
    let path = std::env::args()
        .nth(1)
        .context("usage: z80-test-runner <vectors.json>")?;

    let failed = run_file(&path)?;
    if failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOP_VECTOR: &str = r#"[{
        "name": "00 nop",
        "initial": {
            "pc": 0, "sp": 0, "a": 0, "b": 0, "c": 0, "d": 0, "e": 0,
            "f": 0, "h": 0, "l": 0, "i": 0, "r": 0, "ix": 0, "iy": 0,
            "wz": 0, "af_": 0, "bc_": 0, "de_": 0, "hl_": 0,
            "iff1": 0, "iff2": 0, "im": 0,
            "ram": [[0, 0]]
        },
        "final": {
            "pc": 1, "sp": 0, "a": 0, "b": 0, "c": 0, "d": 0, "e": 0,
            "f": 0, "h": 0, "l": 0, "i": 0, "r": 0, "ix": 0, "iy": 0,
            "wz": 0, "af_": 0, "bc_": 0, "de_": 0, "hl_": 0,
            "iff1": 0, "iff2": 0, "im": 0,
            "ram": [[0, 0]]
        },
        "cycles": [1, 2, 3, 4]
    }]"#;

    #[test]
    fn nop_vector_passes() {
        let tests: Vec<TestCase> = serde_json::from_str(NOP_VECTOR).unwrap();
        assert_eq!(tests.len(), 1);
        assert!(run_test(&tests[0]).is_ok());
    }

    #[test]
    fn mismatch_is_reported() {
        let mut tests: Vec<TestCase> = serde_json::from_str(NOP_VECTOR).unwrap();
        tests[0].final_state.a = 0x42;
        let err = run_test(&tests[0]).unwrap_err();
        assert!(err.contains("A:"), "unexpected report: {err}");
    }
}
