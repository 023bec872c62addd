//! DMA interrupt lines and handler bindings

use core::cell::Cell;
use critical_section::Mutex;

/// A function invoked when a bound DMA interrupt fires.
///
/// The handler runs in interrupt context. It must clear the pending flag
/// of the channel that raised it, or the line fires again as soon as the
/// handler returns.
pub type Handler = fn();

/// The RP2040's DMA interrupt lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    /// `DMA_IRQ_0`, NVIC interrupt 11
    Dma0,
    /// `DMA_IRQ_1`, NVIC interrupt 12
    Dma1,
}

const DMA_IRQ_0: u16 = 11;
const DMA_IRQ_1: u16 = 12;

impl IrqLine {
    /// Index of this line's `INTEn` / `INTSn` register pair.
    pub(crate) const fn index(self) -> usize {
        match self {
            IrqLine::Dma0 => 0,
            IrqLine::Dma1 => 1,
        }
    }

    /// All DMA interrupt lines.
    pub const ALL: [IrqLine; 2] = [IrqLine::Dma0, IrqLine::Dma1];
}

impl TryFrom<u16> for IrqLine {
    type Error = crate::Error;
    fn try_from(irq: u16) -> crate::Result<Self> {
        match irq {
            DMA_IRQ_0 => Ok(IrqLine::Dma0),
            DMA_IRQ_1 => Ok(IrqLine::Dma1),
            _ => Err(crate::Error::InvalidInterruptLine(irq)),
        }
    }
}

// Safety: the numbers are the RP2040's DMA_IRQ_0 and DMA_IRQ_1.
unsafe impl cortex_m::interrupt::InterruptNumber for IrqLine {
    fn number(self) -> u16 {
        match self {
            IrqLine::Dma0 => DMA_IRQ_0,
            IrqLine::Dma1 => DMA_IRQ_1,
        }
    }
}

/// One line's handler, shared with the interrupt context.
pub(crate) type HandlerSlot = Mutex<Cell<Option<Handler>>>;

#[allow(clippy::declare_interior_mutable_const)] // Very convenient, and usage for static init deemed OK.
pub(crate) const NO_HANDLER: HandlerSlot = Mutex::new(Cell::new(None));
