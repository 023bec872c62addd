//! User bank IO registers
//!
//! Only the pin function multiplexer is described. Pads keep their reset
//! configuration, which already enables the input buffers that the PIO
//! needs to sample POCI.

use super::RWRegister;

/// User bank GPIOs.
pub const PINS: usize = 30;

/// IO_BANK0 registers.
#[repr(C)]
pub struct RegisterBlock {
    pub GPIO: [gpio::RegisterBlock; PINS],
}

pub mod gpio {
    use super::RWRegister;

    #[repr(C)]
    pub struct RegisterBlock {
        /// GPIO status
        pub STATUS: RWRegister<u32>,
        /// GPIO control including function select and overrides
        pub CTRL: RWRegister<u32>,
    }

    pub mod CTRL {
        fields! {
            FUNCSEL: 0, 5;
            OUTOVER: 8, 2;
            OEOVER: 12, 2;
            INOVER: 16, 2;
            IRQOVER: 28, 2;
        }
    }
}

/// `FUNCSEL` value routing a pin to PIO0.
pub const FUNCSEL_PIO0: u32 = 6;
/// `FUNCSEL` value routing a pin to PIO1.
pub const FUNCSEL_PIO1: u32 = 7;
