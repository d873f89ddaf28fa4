//! Memory, I/O and clock interface between the processor and its host.

/// The integration contract a processor host supplies.
///
/// `read`/`write` are untimed accesses; the processor wraps them in bus
/// cycles and reports the elapsed time through `tick`. The tick counter
/// belongs to the integrator: the processor only ever advances it, never
/// reads it back. `output` and `set_addr_bus` are optional hooks for
/// bus-accurate hosts.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, addr: u16, value: u8);

    /// Advance the T-state counter.
    fn tick(&mut self, t_states: u32);

    /// A byte driven onto an I/O port during an output cycle.
    fn output(&mut self, port: u16, value: u8) {
        let _ = (port, value);
    }

    /// The address bus changed. Called at the start of every memory
    /// cycle and again with IR during the refresh half of a fetch.
    fn set_addr_bus(&mut self, addr: u16) {
        let _ = addr;
    }
}

/// Flat 64 KiB RAM with a T-state counter. Enough bus for tests and
/// harnesses.
#[derive(Clone)]
pub struct SimpleBus {
    ram: [u8; 0x10000],
    ticks: u64,
}

impl SimpleBus {
    #[must_use]
    #[allow(clippy::large_stack_arrays)]
    pub fn new() -> Self {
        Self {
            ram: [0; 0x10000],
            ticks: 0,
        }
    }

    /// Copy bytes into RAM starting at `addr`, wrapping at the top.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.ram[addr.wrapping_add(i as u16) as usize] = byte;
        }
    }

    /// Read a byte without going through a bus cycle.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// T-states elapsed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }

    fn tick(&mut self, t_states: u32) {
        self.ticks += u64::from(t_states);
    }
}
