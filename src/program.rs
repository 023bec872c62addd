//! PIO programs and instruction encoding
//!
//! The ADS70x9 family shifts out a conversion on POCI while CS is low,
//! one bit per SCK cycle. [`ADS7049`] holds CS high, drops it, clocks in 14
//! bits (two leading zeros, then the 12-bit result, MSB first) and pushes
//! the word into the RX FIFO. SCK is driven by side-set on every
//! instruction.
//!
//! ```text
//! .program ads7049
//! .side_set 1
//! .wrap_target
//!     set pins, 1         side 0  ; CS high, conversion
//!     set x, 13           side 0
//!     set pins, 0         side 0  ; CS low, start readout
//! bitloop:
//!     in pins, 1          side 1
//!     jmp x-- bitloop     side 0
//!     push noblock        side 0
//! .wrap
//! ```

use crate::ral::pio::INSTRUCTION_MEMORY;

/// A PIO program, assembled for offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Program {
    /// Encoded instructions
    pub code: &'static [u16],
    /// First instruction executed after the wrap
    pub wrap_target: u8,
    /// Last instruction before wrapping
    pub wrap: u8,
    /// Number of side-set bits, excluding the enable bit
    pub side_set: u8,
    /// Side-set bits are optional
    pub side_set_optional: bool,
}

impl Program {
    /// Number of instructions
    pub const fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns `true` if the program has no instructions
    pub const fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns `true` if the program fits at `offset` in instruction memory
    pub const fn fits_at(&self, offset: u8) -> bool {
        (offset as usize) + self.len() <= INSTRUCTION_MEMORY
    }

    /// The instructions relocated to `offset`.
    ///
    /// JMP targets are absolute, so they move with the program. Everything
    /// else is position independent.
    pub fn relocated(&self, offset: u8) -> impl Iterator<Item = u16> + '_ {
        self.code.iter().map(move |&instr| relocate(instr, offset))
    }
}

/// System clock cycles the ADS7049 program spends on one sample, at a
/// clock divider of 1.
pub const CYCLES_PER_SAMPLE: u32 = 32;

/// Samples an ADS7029, ADS7039 or ADS7049.
///
/// Pins: CS is the SET pin, SCK is the side-set pin, POCI is the IN pin.
/// Shift left, joined RX FIFO, no autopush.
pub const ADS7049: Program = Program {
    code: &[
        0xe001, // set pins, 1      side 0
        0xe02d, // set x, 13        side 0
        0xe000, // set pins, 0      side 0
        0x5001, // in pins, 1       side 1
        0x0043, // jmp x--, 3       side 0
        0x8000, // push noblock     side 0
    ],
    wrap_target: 0,
    wrap: 5,
    side_set: 1,
    side_set_optional: false,
};

const OPCODE_MASK: u16 = 0xe000;
const OPCODE_JMP: u16 = 0x0000;
const OPCODE_SET: u16 = 0xe000;
const JMP_ADDRESS: u16 = 0x001f;

const SET_DEST_PINS: u16 = 0b000 << 5;
const SET_DEST_PINDIRS: u16 = 0b100 << 5;

fn relocate(instr: u16, offset: u8) -> u16 {
    if instr & OPCODE_MASK == OPCODE_JMP {
        let target = ((instr & JMP_ADDRESS) + offset as u16) & JMP_ADDRESS;
        (instr & !JMP_ADDRESS) | target
    } else {
        instr
    }
}

/// `set pins, value`, no delay or side-set
pub const fn set_pins(value: u8) -> u16 {
    OPCODE_SET | SET_DEST_PINS | (value as u16 & 0x1f)
}

/// `set pindirs, value`, no delay or side-set
pub const fn set_pindirs(value: u8) -> u16 {
    OPCODE_SET | SET_DEST_PINDIRS | (value as u16 & 0x1f)
}

/// `jmp address`, unconditional
pub const fn jmp(address: u8) -> u16 {
    OPCODE_JMP | (address as u16 & JMP_ADDRESS)
}
