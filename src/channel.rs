//! DMA channels
//!
//! A [`Channel`] is a handle to one of the DMA controller's channels. It
//! stores memory addresses independent of the memory lifetime, so the
//! low-level API is a set of register writes: program the addresses and the
//! transfer count, apply a [`Configuration`], then [`start`](Channel::start)
//! the channel.
//!
//! Configuration is always applied through the non-triggering control
//! alias. Channels only begin moving data when they're started, chained
//! to, or when some other master writes one of their trigger registers.

use crate::ral::{self, dma, Static};
use crate::IrqLine;

/// The size of each element moved by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSize {
    /// 8 bits
    Byte = 0,
    /// 16 bits
    HalfWord = 1,
    /// 32 bits
    Word = 2,
}

impl DataSize {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => DataSize::Byte,
            1 => DataSize::HalfWord,
            _ => DataSize::Word,
        }
    }
}

/// What paces a channel's transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Wait for the peripheral's data request (DREQ) before each transfer.
    Dreq(u8),
    /// Transfer as fast as possible.
    Unpaced,
}

impl Pace {
    fn treq(self) -> u32 {
        match self {
            Pace::Dreq(dreq) => dreq as u32,
            Pace::Unpaced => dma::TREQ_PERMANENT,
        }
    }

    fn from_treq(treq: u32) -> Self {
        if treq == dma::TREQ_PERMANENT {
            Pace::Unpaced
        } else {
            Pace::Dreq(treq as u8)
        }
    }
}

/// A channel's control settings.
///
/// The defaults match the controller's conventional defaults: 32-bit
/// elements, incrementing reads, fixed writes, unpaced, no chaining, and
/// an interrupt at the end of every transfer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Element size
    pub data_size: DataSize,
    /// Advance the read address after each element
    pub increment_read: bool,
    /// Advance the write address after each element
    pub increment_write: bool,
    /// Transfer pacing
    pub pace: Pace,
    /// Channel triggered when this channel completes
    ///
    /// `None` disables chaining.
    pub chain_to: Option<usize>,
    /// Suppress the completion interrupt
    pub quiet: bool,
    /// Respond to triggers
    pub enable: bool,
}

impl Configuration {
    /// The default configuration.
    pub const fn new() -> Self {
        Configuration {
            data_size: DataSize::Word,
            increment_read: true,
            increment_write: false,
            pace: Pace::Unpaced,
            chain_to: None,
            quiet: false,
            enable: true,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// A DMA channel
///
/// You should rely on [`Dma`](crate::Dma) to allocate `Channel`s.
///
/// The `Channel` stores memory addresses independent of the memory lifetime. You must make
/// sure that the channel's state is valid before starting a transfer!
pub struct Channel {
    /// Our channel number, expected to be between [0, 12)
    index: usize,
    /// Reference to the DMA registers
    registers: Static<dma::RegisterBlock>,
}

// Safety: a channel owns its channel registers. Registers shared between
// channels are only modified in critical sections.
unsafe impl Send for Channel {}

impl Channel {
    /// # Safety
    ///
    /// Caller makes sure that there's only one handle for `index`.
    pub(crate) unsafe fn new(index: usize, registers: Static<dma::RegisterBlock>) -> Self {
        Channel { index, registers }
    }

    /// Returns the channel's number
    pub fn channel(&self) -> usize {
        self.index
    }

    fn regs(&self) -> &dma::ch::RegisterBlock {
        &self.registers.CH[self.index]
    }

    /// Set the address the channel reads from
    ///
    /// # Safety
    ///
    /// `address` must stay valid for as long as the channel may transfer
    /// from it.
    pub unsafe fn set_read_address(&mut self, address: u32) {
        self.regs().READ_ADDR.write(address);
    }

    /// Set the address the channel writes to
    ///
    /// # Safety
    ///
    /// `address` must stay valid for as long as the channel may transfer
    /// into it.
    pub unsafe fn set_write_address(&mut self, address: u32) {
        self.regs().WRITE_ADDR.write(address);
    }

    /// Set the number of elements moved each time the channel is triggered
    pub fn set_transfer_count(&mut self, count: u32) {
        self.regs().TRANS_COUNT.write(count);
    }

    /// Apply a configuration without triggering the channel
    pub fn set_configuration(&mut self, configuration: Configuration) {
        // CHAIN_TO pointing at ourselves disables chaining.
        let chain_to = configuration.chain_to.unwrap_or(self.index) as u32;
        let regs = self.regs();
        ral::write_reg!(
            crate::ral::dma::ch,
            regs,
            AL1_CTRL,
            EN: configuration.enable as u32,
            DATA_SIZE: configuration.data_size as u32,
            INCR_READ: configuration.increment_read as u32,
            INCR_WRITE: configuration.increment_write as u32,
            CHAIN_TO: chain_to,
            TREQ_SEL: configuration.pace.treq(),
            IRQ_QUIET: configuration.quiet as u32
        );
    }

    /// Read back the channel's configuration
    pub fn configuration(&self) -> Configuration {
        let regs = self.regs();
        let (enable, data_size, increment_read, increment_write, chain_to, treq, quiet) = ral::read_reg!(
            crate::ral::dma::ch,
            regs,
            AL1_CTRL,
            EN,
            DATA_SIZE,
            INCR_READ,
            INCR_WRITE,
            CHAIN_TO,
            TREQ_SEL,
            IRQ_QUIET
        );
        let chain_to = chain_to as usize;
        Configuration {
            data_size: DataSize::from_raw(data_size),
            increment_read: increment_read != 0,
            increment_write: increment_write != 0,
            pace: Pace::from_treq(treq),
            chain_to: (chain_to != self.index).then_some(chain_to),
            quiet: quiet != 0,
            enable: enable != 0,
        }
    }

    /// The address of the register that reloads this channel's write
    /// address and triggers the channel
    ///
    /// Another channel that writes an address into this register restarts
    /// this channel at that address.
    pub fn write_address_trigger(&self) -> u32 {
        ral::address_of(&self.regs().AL2_WRITE_ADDR_TRIG)
    }

    /// Trigger the channel
    pub fn start(&mut self) {
        crate::memory_barrier();
        // Immutable write OK. MULTI_CHAN_TRIGGER only acts on set bits.
        self.registers.MULTI_CHAN_TRIGGER.write(1 << self.index);
    }

    /// Stop responding to triggers
    ///
    /// An in-flight transfer sequence pauses; it isn't cancelled. See
    /// [`abort`](Channel::abort).
    pub fn disable(&mut self) {
        let regs = self.regs();
        ral::modify_reg!(crate::ral::dma::ch, regs, AL1_CTRL, EN: 0);
    }

    /// Cancel any in-progress transfer sequence, and wait for the channel
    /// to go idle
    ///
    /// Aborting a channel with transfers in flight may still raise its
    /// completion interrupt (RP2040-E13). Disable the channel's interrupt
    /// before aborting, then clear its status afterwards.
    pub fn abort(&mut self) {
        // Immutable write OK. CHAN_ABORT only acts on set bits.
        self.registers.CHAN_ABORT.write(1 << self.index);
        #[cfg(test)]
        crate::sim::record_abort(&self.registers, self.index);
        while self.is_busy() {
            core::hint::spin_loop();
        }
    }

    /// Returns `true` if the channel has a transfer sequence in progress
    pub fn is_busy(&self) -> bool {
        let regs = self.regs();
        ral::read_reg!(crate::ral::dma::ch, regs, AL1_CTRL, BUSY == 1)
    }

    /// Route (or stop routing) the channel's completion interrupt to `line`
    pub fn set_interrupt_enable(&mut self, line: IrqLine, enable: bool) {
        let inte = match line {
            IrqLine::Dma0 => &self.registers.INTE0,
            IrqLine::Dma1 => &self.registers.INTE1,
        };
        // INTEn is shared by all channels.
        critical_section::with(|_| {
            let mask = 1 << self.index;
            let value = inte.read();
            inte.write(if enable { value | mask } else { value & !mask });
        });
    }

    /// Returns `true` if the channel's completion interrupt is asserted
    /// on `line`
    pub fn is_interrupt(&self, line: IrqLine) -> bool {
        let inte = match line {
            IrqLine::Dma0 => self.registers.INTE0.read(),
            IrqLine::Dma1 => self.registers.INTE1.read(),
        };
        self.registers.INTR.read() & inte & (1 << self.index) != 0
    }

    /// Clear the channel's interrupt on `line`
    pub fn clear_interrupt(&self, line: IrqLine) {
        // Immutable write OK. INTSn is write-one-to-clear.
        let ints = match line {
            IrqLine::Dma0 => &self.registers.INTS0,
            IrqLine::Dma1 => &self.registers.INTS1,
        };
        ints.write(1 << self.index);
    }
}
