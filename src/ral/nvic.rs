//! Cortex-M0+ NVIC enable and pending registers
//!
//! The M0+ supports 32 external interrupts, so each register bank is a
//! single word. The block starts at `cortex_m::peripheral::NVIC::PTR`.

use super::RWRegister;

#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt Set-Enable Register
    pub ISER: RWRegister<u32>,
    _reserved0: [u32; 31],
    /// Interrupt Clear-Enable Register
    pub ICER: RWRegister<u32>,
    _reserved1: [u32; 31],
    /// Interrupt Set-Pending Register
    pub ISPR: RWRegister<u32>,
    _reserved2: [u32; 31],
    /// Interrupt Clear-Pending Register
    pub ICPR: RWRegister<u32>,
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, ICER) == 0x080);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, ICPR) == 0x180);
