//! DMA register blocks and fields

use super::RWRegister;

/// Number of DMA channels on the RP2040.
pub const CHANNELS: usize = 12;

/// DMA controller registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Channel register clusters
    pub CH: [ch::RegisterBlock; CHANNELS],
    _reserved0: [u32; 64],
    /// Interrupt Status (raw)
    pub INTR: RWRegister<u32>,
    /// Interrupt Enables for IRQ 0
    pub INTE0: RWRegister<u32>,
    /// Force Interrupts for IRQ 0
    pub INTF0: RWRegister<u32>,
    /// Interrupt Status for IRQ 0 (write 1 to clear)
    pub INTS0: RWRegister<u32>,
    _reserved1: [u32; 1],
    /// Interrupt Enables for IRQ 1
    pub INTE1: RWRegister<u32>,
    /// Force Interrupts for IRQ 1
    pub INTF1: RWRegister<u32>,
    /// Interrupt Status for IRQ 1 (write 1 to clear)
    pub INTS1: RWRegister<u32>,
    /// Pacing timers
    pub TIMER: [RWRegister<u32>; 4],
    /// Trigger one or more channels simultaneously
    pub MULTI_CHAN_TRIGGER: RWRegister<u32>,
    /// Sniffer Control
    pub SNIFF_CTRL: RWRegister<u32>,
    /// Data accumulator for sniff hardware
    pub SNIFF_DATA: RWRegister<u32>,
    _reserved2: [u32; 1],
    /// Debug RAF, WAF, TDF levels
    pub FIFO_LEVELS: RWRegister<u32>,
    /// Abort an in-progress transfer sequence on one or more channels
    pub CHAN_ABORT: RWRegister<u32>,
    /// The number of channels this DMA instance is equipped with
    pub N_CHANNELS: RWRegister<u32>,
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, INTR) == 0x400);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, INTE1) == 0x414);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, MULTI_CHAN_TRIGGER) == 0x430);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CHAN_ABORT) == 0x444);

/// DMA channel representation.
///
/// Each channel register is visible through four aliases. Writing
/// the last register of an alias group (the `*_TRIG` registers) also
/// triggers the channel. The driver configures channels through the
/// non-triggering `READ_ADDR`, `WRITE_ADDR`, `TRANS_COUNT` and `AL1_CTRL`
/// registers, and starts them through `MULTI_CHAN_TRIGGER`.
pub mod ch {
    use super::RWRegister;

    #[repr(C)]
    pub struct RegisterBlock {
        pub READ_ADDR: RWRegister<u32>,
        pub WRITE_ADDR: RWRegister<u32>,
        pub TRANS_COUNT: RWRegister<u32>,
        pub CTRL_TRIG: RWRegister<u32>,
        pub AL1_CTRL: RWRegister<u32>,
        pub AL1_READ_ADDR: RWRegister<u32>,
        pub AL1_WRITE_ADDR: RWRegister<u32>,
        pub AL1_TRANS_COUNT_TRIG: RWRegister<u32>,
        pub AL2_CTRL: RWRegister<u32>,
        pub AL2_TRANS_COUNT: RWRegister<u32>,
        pub AL2_READ_ADDR: RWRegister<u32>,
        pub AL2_WRITE_ADDR_TRIG: RWRegister<u32>,
        pub AL3_CTRL: RWRegister<u32>,
        pub AL3_WRITE_ADDR: RWRegister<u32>,
        pub AL3_TRANS_COUNT: RWRegister<u32>,
        pub AL3_READ_ADDR_TRIG: RWRegister<u32>,
    }

    const _: () = assert!(core::mem::size_of::<RegisterBlock>() == 0x40);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, AL1_CTRL) == 0x10);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, AL2_WRITE_ADDR_TRIG) == 0x2c);

    /// Channel control and status, triggering alias.
    pub mod CTRL_TRIG {
        fields! {
            EN: 0, 1;
            HIGH_PRIORITY: 1, 1;
            DATA_SIZE: 2, 2;
            INCR_READ: 4, 1;
            INCR_WRITE: 5, 1;
            RING_SIZE: 6, 4;
            RING_SEL: 10, 1;
            CHAIN_TO: 11, 4;
            TREQ_SEL: 15, 6;
            IRQ_QUIET: 21, 1;
            BSWAP: 22, 1;
            SNIFF_EN: 23, 1;
            BUSY: 24, 1;
            WRITE_ERROR: 29, 1;
            READ_ERROR: 30, 1;
            AHB_ERROR: 31, 1;
        }
    }

    /// Channel control and status, non-triggering alias.
    pub mod AL1_CTRL {
        pub use super::CTRL_TRIG::*;
    }
}

/// `TREQ_SEL` value for an unpaced channel ("permanent request").
pub const TREQ_PERMANENT: u32 = 0x3f;
