//! Driver errors

use crate::IrqLine;

/// An error when acquiring hardware or configuring a stream.
///
/// None of these are retried by the driver. Resource exhaustion can't be
/// fixed by trying again, and the configuration errors are rejected before
/// the driver touches any hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Every DMA channel is already claimed.
    ChannelsExhausted,
    /// Every state machine in the PIO block is already claimed.
    StateMachinesExhausted,
    /// The PIO instruction memory has no room for the program.
    ProgramSpaceExhausted,
    /// A program can't be loaded, or reused, at this offset.
    InvalidProgramOffset(u8),
    /// The sample count is zero, or larger than the destination.
    InvalidSampleCount {
        /// Requested samples per cycle.
        requested: usize,
        /// Length of the destination buffer.
        capacity: usize,
    },
    /// An interrupt was requested without a handler.
    MissingHandler,
    /// The number doesn't name a DMA interrupt line.
    InvalidInterruptLine(u16),
    /// Another handler is bound to this interrupt line.
    LineInUse(IrqLine),
    /// The GPIO number is out of range.
    InvalidPin(u8),
    /// The same GPIO was assigned to two signals.
    PinConflict(u8),
    /// The clock divider is outside of what the PIO supports.
    InvalidClockDivider,
    /// The operation needs a configured stream.
    NotConfigured,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ChannelsExhausted => f.write_str("no unused DMA channel"),
            Error::StateMachinesExhausted => f.write_str("no unused PIO state machine"),
            Error::ProgramSpaceExhausted => f.write_str("no room in PIO instruction memory"),
            Error::InvalidProgramOffset(offset) => {
                write!(f, "program does not fit at offset {offset}")
            }
            Error::InvalidSampleCount {
                requested,
                capacity,
            } => write!(
                f,
                "sample count {requested} is not within 1..={capacity}"
            ),
            Error::MissingHandler => f.write_str("interrupt requested without a handler"),
            Error::InvalidInterruptLine(irq) => write!(f, "IRQ {irq} is not a DMA interrupt"),
            Error::LineInUse(line) => write!(f, "{line:?} already has a handler"),
            Error::InvalidPin(pin) => write!(f, "GPIO {pin} does not exist"),
            Error::PinConflict(pin) => write!(f, "GPIO {pin} assigned more than once"),
            Error::InvalidClockDivider => f.write_str("clock divider out of range"),
            Error::NotConfigured => f.write_str("stream is not configured"),
        }
    }
}
