//! A RAL-like module to support DMA, PIO, IO and NVIC register access
//!
//! The RP2040 register blocks are small enough to describe by hand. The
//! DMA channels and the PIO state machines are clusters that we'd like to
//! index as arrays of structs, and the generated PACs don't give us that
//! while staying compatible with the RAL macros.
//!
//! Each register block sits next to one module per register. Those modules
//! hold the field descriptions (`offset`, `mask`) expected by the
//! `ral-registers` macros.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // Field constants follow RAL naming
    dead_code, // Blocks describe the hardware, not only what we touch
)]

/// Describes the fields of one register.
///
/// Expands to one module per field, each with the `offset` / `mask`
/// constants and the (empty) `R` / `W` / `RW` enumerated value modules
/// that `read_reg!`, `write_reg!` and `modify_reg!` import.
macro_rules! fields {
    ($($field:ident: $offset:expr, $width:expr;)+) => {
        $(
            pub mod $field {
                pub const offset: u32 = $offset;
                pub const mask: u32 = ((1u32 << $width) - 1) << offset;
                pub mod R {}
                pub mod W {}
                pub mod RW {}
            }
        )+
    };
}

pub mod dma;
pub mod io;
pub mod nvic;
pub mod pio;

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::RWRegister;

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

/// The 32-bit bus address of `register`.
///
/// DMA channels are programmed with bus addresses, so this is what a
/// channel needs to read from, or write to, a register.
pub(crate) fn address_of<R>(register: &R) -> u32 {
    register as *const R as usize as u32
}
