//! PIO blocks and state machines
//!
//! A [`Pio`] manages one of the RP2040's two PIO blocks. It loads
//! [`Program`]s into instruction memory, and hands out
//! [`StateMachine`]s. Like [`Dma`](crate::Dma), it's meant to live in a
//! `static`.

use core::cell::Cell;

use crate::program::{self, Program};
use crate::ral::{self, io, pio, Static};
use crate::{Error, Result};

/// One of the RP2040's PIO blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PioIndex {
    /// `PIO0`
    Pio0,
    /// `PIO1`
    Pio1,
}

impl PioIndex {
    fn funcsel(self) -> u32 {
        match self {
            PioIndex::Pio0 => io::FUNCSEL_PIO0,
            PioIndex::Pio1 => io::FUNCSEL_PIO1,
        }
    }

    pub(crate) fn dreq_base(self) -> u8 {
        match self {
            PioIndex::Pio0 => 4,
            PioIndex::Pio1 => 12,
        }
    }
}

/// A PIO driver.
pub struct Pio {
    index: PioIndex,
    registers: Static<pio::RegisterBlock>,
    io: Static<io::RegisterBlock>,
    /// One bit per claimed state machine
    claimed: critical_section::Mutex<Cell<u8>>,
    /// One bit per occupied instruction slot
    used: critical_section::Mutex<Cell<u32>>,
}

// Safety: OK to allocate a PIO driver in a static context.
unsafe impl Sync for Pio {}

impl Pio {
    /// Create the PIO driver.
    ///
    /// # Safety
    ///
    /// `pio` must point to the register block of the PIO named by `index`,
    /// and `io_bank0` must point to the user bank IO registers. There
    /// should only be one `Pio` for each block.
    pub const unsafe fn new(index: PioIndex, pio: *const (), io_bank0: *const ()) -> Self {
        Pio {
            index,
            registers: Static(pio.cast()),
            io: Static(io_bank0.cast()),
            claimed: critical_section::Mutex::new(Cell::new(0)),
            used: critical_section::Mutex::new(Cell::new(0)),
        }
    }

    /// Which PIO block this driver manages
    pub fn index(&self) -> PioIndex {
        self.index
    }

    /// Load `program` into instruction memory.
    ///
    /// Uses the highest offset that has room for the whole program, and
    /// returns that offset. Returns [`Error::ProgramSpaceExhausted`] if
    /// there's no room.
    pub fn add_program(&self, program: &Program) -> Result<u8> {
        let len = program.len();
        if len == 0 || len > pio::INSTRUCTION_MEMORY {
            return Err(Error::ProgramSpaceExhausted);
        }
        let mask = ((1u64 << len) - 1) as u32;
        let offset = critical_section::with(|cs| {
            let used = self.used.borrow(cs);
            let offset = (0..=pio::INSTRUCTION_MEMORY - len)
                .rev()
                .find(|&offset| used.get() & (mask << offset) == 0)?;
            used.set(used.get() | (mask << offset));
            Some(offset as u8)
        })
        .ok_or(Error::ProgramSpaceExhausted)?;

        for (slot, instr) in program.relocated(offset).enumerate() {
            self.registers.INSTR_MEM[offset as usize + slot].write(instr as u32);
        }
        log::debug!("loaded {len} instructions at {:?}[{offset}]", self.index);
        Ok(offset)
    }

    /// Free the instruction slots occupied by `program` at `offset`.
    ///
    /// The instructions stay in memory, but the next [`add_program`](Pio::add_program)
    /// may overwrite them.
    pub fn remove_program(&self, program: &Program, offset: u8) {
        if !program.fits_at(offset) {
            return;
        }
        let mask = ((1u64 << program.len()) - 1) as u32;
        critical_section::with(|cs| {
            let used = self.used.borrow(cs);
            used.set(used.get() & !(mask << offset));
        });
        log::debug!("freed {:?}[{offset}]", self.index);
    }

    /// Claim the lowest-numbered state machine that isn't in use.
    pub fn claim_unused_sm(&'static self) -> Result<StateMachine> {
        let index = critical_section::with(|cs| {
            let claimed = self.claimed.borrow(cs);
            let free = (0..pio::STATE_MACHINES as u8).find(|idx| claimed.get() & (1 << idx) == 0)?;
            claimed.set(claimed.get() | (1 << free));
            Some(free)
        })
        .ok_or(Error::StateMachinesExhausted)?;
        log::debug!("claimed {:?} state machine {index}", self.index);
        Ok(StateMachine { pio: self, index })
    }

    /// The number of state machines that can still be claimed
    pub fn free_state_machines(&self) -> usize {
        let claimed = critical_section::with(|cs| self.claimed.borrow(cs).get());
        pio::STATE_MACHINES - claimed.count_ones() as usize
    }

    /// Hand `pin` to this PIO block.
    pub fn set_pin_function(&self, pin: u8) -> Result<()> {
        let gpio = self.io.GPIO.get(pin as usize).ok_or(Error::InvalidPin(pin))?;
        ral::modify_reg!(crate::ral::io::gpio, gpio, CTRL, FUNCSEL: self.index.funcsel());
        Ok(())
    }

    fn release_sm(&self, index: u8) {
        critical_section::with(|cs| {
            let claimed = self.claimed.borrow(cs);
            claimed.set(claimed.get() & !(1 << index));
        });
        log::debug!("released {:?} state machine {index}", self.index);
    }
}

/// State machine settings.
///
/// Only what a sampling program needs: one SET pin group, one side-set
/// pin group, one IN pin, and the RX path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Integer part of the clock divider
    pub clock_divider: u16,
    /// Fractional part of the clock divider, in 1/256
    pub clock_divider_fraction: u8,
    /// Absolute address of the wrap target
    pub wrap_target: u8,
    /// Absolute address of the last instruction before wrapping
    pub wrap: u8,
    /// Side-set bits used by the program
    pub side_set: u8,
    /// Side-set bits are optional
    pub side_set_optional: bool,
    /// First side-set pin
    pub side_set_base: u8,
    /// First SET pin
    pub set_base: u8,
    /// Number of SET pins
    pub set_count: u8,
    /// First IN pin
    pub in_base: u8,
    /// Shift ISR to the left (MSB first)
    pub in_shift_left: bool,
    /// Give the TX FIFO's storage to the RX FIFO
    pub join_rx: bool,
}

/// A PIO state machine.
///
/// Dropping the state machine disables it, and returns it to its PIO block.
pub struct StateMachine {
    pio: &'static Pio,
    index: u8,
}

// Safety: a state machine owns its SM registers. The shared CTRL register
// is only modified in critical sections.
unsafe impl Send for StateMachine {}

impl StateMachine {
    /// The state machine's number within its block
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The block that owns this state machine
    pub fn pio(&self) -> PioIndex {
        self.pio.index
    }

    fn regs(&self) -> &pio::sm::RegisterBlock {
        &self.pio.registers.SM[self.index as usize]
    }

    /// Apply `configuration`. The state machine should be disabled.
    pub fn configure(&mut self, configuration: &Configuration) -> Result<()> {
        if configuration.clock_divider == 0 && configuration.clock_divider_fraction != 0 {
            return Err(Error::InvalidClockDivider);
        }
        let regs = self.regs();
        ral::write_reg!(
            crate::ral::pio::sm,
            regs,
            CLKDIV,
            INT: configuration.clock_divider as u32,
            FRAC: configuration.clock_divider_fraction as u32
        );
        ral::write_reg!(
            crate::ral::pio::sm,
            regs,
            EXECCTRL,
            WRAP_BOTTOM: configuration.wrap_target as u32,
            WRAP_TOP: configuration.wrap as u32,
            SIDE_EN: configuration.side_set_optional as u32
        );
        ral::write_reg!(
            crate::ral::pio::sm,
            regs,
            SHIFTCTRL,
            IN_SHIFTDIR: (!configuration.in_shift_left) as u32,
            OUT_SHIFTDIR: 1,
            FJOIN_RX: configuration.join_rx as u32
        );
        // The enable bit counts towards SIDESET_COUNT.
        let side_set_count = configuration.side_set + configuration.side_set_optional as u8;
        ral::write_reg!(
            crate::ral::pio::sm,
            regs,
            PINCTRL,
            SET_BASE: configuration.set_base as u32,
            SET_COUNT: configuration.set_count as u32,
            SIDESET_BASE: configuration.side_set_base as u32,
            SIDESET_COUNT: side_set_count as u32,
            IN_BASE: configuration.in_base as u32
        );
        log::trace!(
            "{:?} state machine {} wraps {}..={}",
            self.pio.index,
            self.index,
            configuration.wrap_target,
            configuration.wrap
        );
        Ok(())
    }

    /// Execute `instr` immediately
    pub fn exec(&mut self, instr: u16) {
        self.regs().INSTR.write(instr as u32);
    }

    /// Jump to `address`
    pub fn jump(&mut self, address: u8) {
        self.exec(program::jmp(address));
    }

    /// Set the direction of `pin`, one pin at a time through the SET pins.
    pub fn set_pindir(&mut self, pin: u8, output: bool) {
        self.with_set_pin(pin, program::set_pindirs(output as u8));
    }

    /// Drive `pin` to `level` through the SET pins.
    pub fn set_pin(&mut self, pin: u8, level: bool) {
        self.with_set_pin(pin, program::set_pins(level as u8));
    }

    fn with_set_pin(&mut self, pin: u8, instr: u16) {
        let pinctrl = self.regs().PINCTRL.read();
        let execctrl = self.regs().EXECCTRL.read();
        // Executed instructions have no side-set bits. Make them optional,
        // so the side-set pins hold their value.
        let regs = self.regs();
        ral::modify_reg!(crate::ral::pio::sm, regs, EXECCTRL, SIDE_EN: 1);
        ral::modify_reg!(crate::ral::pio::sm, regs, PINCTRL, SET_BASE: pin as u32, SET_COUNT: 1);
        self.exec(instr);
        self.regs().PINCTRL.write(pinctrl);
        self.regs().EXECCTRL.write(execctrl);
    }

    /// Start or stop the state machine
    pub fn set_enabled(&mut self, enabled: bool) {
        let ctrl = &self.pio.registers.CTRL;
        let bit = 1 << self.index;
        // CTRL is shared by all state machines.
        critical_section::with(|_| {
            let value = ctrl.read();
            ctrl.write(if enabled { value | bit } else { value & !bit });
        });
    }

    /// Returns `true` if the state machine is running
    pub fn is_enabled(&self) -> bool {
        let regs = &self.pio.registers;
        ral::read_reg!(crate::ral::pio, regs, CTRL, SM_ENABLE) & (1 << self.index) != 0
    }

    /// Clear the state machine's internal state: shift counters,
    /// delay, and stall
    pub fn restart(&mut self) {
        let ctrl = &self.pio.registers.CTRL;
        let bit = 1 << (self.index + pio::CTRL::SM_RESTART::offset as u8);
        critical_section::with(|_| ctrl.write(ctrl.read() | bit));
    }

    /// Empty both FIFOs
    pub fn clear_fifos(&mut self) {
        // Changing the FIFO join flushes the FIFOs.
        let regs = self.regs();
        let join = ral::read_reg!(crate::ral::pio::sm, regs, SHIFTCTRL, FJOIN_RX);
        ral::modify_reg!(crate::ral::pio::sm, regs, SHIFTCTRL, FJOIN_RX: join ^ 1);
        ral::modify_reg!(crate::ral::pio::sm, regs, SHIFTCTRL, FJOIN_RX: join);
        #[cfg(test)]
        crate::sim::record_flush(&self.pio.registers, self.index as usize);
    }

    /// The bus address of the RX FIFO
    pub fn rx_fifo_address(&self) -> u32 {
        ral::address_of(&self.pio.registers.RXF[self.index as usize])
    }

    /// The DMA request raised while the RX FIFO has data
    pub fn rx_dreq(&self) -> u8 {
        self.pio.index.dreq_base() + self.index
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        self.set_enabled(false);
        self.pio.release_sm(self.index);
    }
}
