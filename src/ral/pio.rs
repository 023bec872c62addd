//! PIO register blocks and fields

use super::RWRegister;

/// State machines per PIO block.
pub const STATE_MACHINES: usize = 4;
/// Instruction memory slots per PIO block.
pub const INSTRUCTION_MEMORY: usize = 32;

/// PIO block registers.
#[repr(C)]
pub struct RegisterBlock {
    /// PIO control register
    pub CTRL: RWRegister<u32>,
    /// FIFO status register
    pub FSTAT: RWRegister<u32>,
    /// FIFO debug register
    pub FDEBUG: RWRegister<u32>,
    /// FIFO levels
    pub FLEVEL: RWRegister<u32>,
    /// Direct write access to the TX FIFOs
    pub TXF: [RWRegister<u32>; STATE_MACHINES],
    /// Direct read access to the RX FIFOs
    pub RXF: [RWRegister<u32>; STATE_MACHINES],
    /// State machine IRQ flags
    pub IRQ: RWRegister<u32>,
    /// Writing a 1 to each of these bits will forcibly assert the corresponding IRQ
    pub IRQ_FORCE: RWRegister<u32>,
    /// GPIO input synchronizer bypass
    pub INPUT_SYNC_BYPASS: RWRegister<u32>,
    /// Read to sample the pad output values PIO is currently driving
    pub DBG_PADOUT: RWRegister<u32>,
    /// Read to sample the pad output enables PIO is currently driving
    pub DBG_PADOE: RWRegister<u32>,
    /// The PIO hardware has some free parameters that may vary between chip products
    pub DBG_CFGINFO: RWRegister<u32>,
    /// Write-only access to instruction memory
    pub INSTR_MEM: [RWRegister<u32>; INSTRUCTION_MEMORY],
    /// State machine register clusters
    pub SM: [sm::RegisterBlock; STATE_MACHINES],
    /// Raw interrupts
    pub INTR: RWRegister<u32>,
    pub IRQ0_INTE: RWRegister<u32>,
    pub IRQ0_INTF: RWRegister<u32>,
    pub IRQ0_INTS: RWRegister<u32>,
    pub IRQ1_INTE: RWRegister<u32>,
    pub IRQ1_INTF: RWRegister<u32>,
    pub IRQ1_INTS: RWRegister<u32>,
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, RXF) == 0x020);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, INSTR_MEM) == 0x048);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, SM) == 0x0c8);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, INTR) == 0x128);

/// PIO control register.
pub mod CTRL {
    fields! {
        SM_ENABLE: 0, 4;
        SM_RESTART: 4, 4;
        CLKDIV_RESTART: 8, 4;
    }
}

/// State machine representation.
pub mod sm {
    use super::RWRegister;

    #[repr(C)]
    pub struct RegisterBlock {
        /// Clock divisor register
        pub CLKDIV: RWRegister<u32>,
        /// Execution/behavioural settings
        pub EXECCTRL: RWRegister<u32>,
        /// Control behaviour of the input/output shift registers
        pub SHIFTCTRL: RWRegister<u32>,
        /// Current instruction address
        pub ADDR: RWRegister<u32>,
        /// Write to execute an instruction immediately
        pub INSTR: RWRegister<u32>,
        /// State machine pin control
        pub PINCTRL: RWRegister<u32>,
    }

    const _: () = assert!(core::mem::size_of::<RegisterBlock>() == 0x18);

    pub mod CLKDIV {
        fields! {
            FRAC: 8, 8;
            INT: 16, 16;
        }
    }

    pub mod EXECCTRL {
        fields! {
            STATUS_N: 0, 4;
            STATUS_SEL: 4, 1;
            WRAP_BOTTOM: 7, 5;
            WRAP_TOP: 12, 5;
            OUT_STICKY: 17, 1;
            INLINE_OUT_EN: 18, 1;
            OUT_EN_SEL: 19, 5;
            JMP_PIN: 24, 5;
            SIDE_PINDIR: 29, 1;
            SIDE_EN: 30, 1;
            EXEC_STALLED: 31, 1;
        }
    }

    pub mod SHIFTCTRL {
        fields! {
            AUTOPUSH: 16, 1;
            AUTOPULL: 17, 1;
            IN_SHIFTDIR: 18, 1;
            OUT_SHIFTDIR: 19, 1;
            PUSH_THRESH: 20, 5;
            PULL_THRESH: 25, 5;
            FJOIN_TX: 30, 1;
            FJOIN_RX: 31, 1;
        }
    }

    pub mod PINCTRL {
        fields! {
            OUT_BASE: 0, 5;
            SET_BASE: 5, 5;
            SIDESET_BASE: 10, 5;
            IN_BASE: 15, 5;
            OUT_COUNT: 20, 6;
            SET_COUNT: 26, 3;
            SIDESET_COUNT: 29, 3;
        }
    }
}
