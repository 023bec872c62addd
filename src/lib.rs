//! Continuous DMA streaming from ADS7029, ADS7039 and ADS7049 ADCs on the RP2040.
//!
//! `pio-ads7049` samples an ADS70x9 SPI ADC with a PIO state machine, and
//! streams the conversions into a caller-supplied buffer forever, without
//! any CPU involvement once the stream is running. It provides
//!
//! - a [`StreamController`] that sets up, starts and tears down a stream.
//! - a small [`Dma`] driver that allocates DMA [`Channel`](channel::Channel)s
//!   and routes DMA interrupts to handlers.
//! - a small [`Pio`] driver that loads PIO programs and allocates state
//!   machines.
//!
//! # How the stream works
//!
//! Two DMA channels cooperate. The *sample channel* moves `N` conversions
//! from the state machine's RX FIFO into the destination, paced by the
//! FIFO's data request. When it's done, it chains to the *control channel*.
//! The control channel copies the destination's start address into the
//! sample channel's write-address trigger register, which rewinds and
//! re-arms the sample channel. The destination is a circular buffer that's
//! overwritten every `N` samples, for as long as the stream runs.
//!
//! The sample channel can optionally raise a DMA interrupt every time it
//! fills the destination.
//!
//! # Getting started
//!
//! Assign a `Dma` and a `Pio` to statics. Then, construct a controller,
//! set up the stream, and start it.
//!
//! ```no_run
//! use core::sync::atomic::{AtomicU16, Ordering};
//! use pio_ads7049::{Dma, Pio, PioIndex, Pins, SourceConfig, StreamConfig, StreamController};
//!
//! // Safety: addresses are valid for the RP2040.
//! static DMA: Dma = unsafe { Dma::new(pio_ads7049::DMA_BASE, pio_ads7049::NVIC_BASE) };
//! static PIO0: Pio = unsafe {
//!     Pio::new(PioIndex::Pio0, pio_ads7049::PIO0_BASE, pio_ads7049::IO_BANK0_BASE)
//! };
//! static MEASUREMENT: [AtomicU16; 1] = [AtomicU16::new(0)];
//!
//! let config = SourceConfig::new(Pins { cs: 18, sck: 20, poci: 19 });
//! let mut adc = StreamController::new(&DMA, &PIO0, config, None).unwrap();
//! adc.setup(&MEASUREMENT, StreamConfig::new(1)).unwrap();
//! adc.start().unwrap();
//!
//! // Always the latest conversion.
//! let raw = MEASUREMENT[0].load(Ordering::Relaxed);
//! ```
//!
//! To be notified when the buffer fills, request an interrupt in the
//! [`StreamConfig`], and forward the line's vector to [`Dma::dispatch`].
//! The handler must call [`StreamController::clear_interrupt`].
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

pub mod channel;
mod error;
mod interrupt;
pub mod pio;
pub mod program;
mod ral;
#[cfg(test)]
mod sim;
mod source;
mod stream;

pub use error::Error;
pub use interrupt::{Handler, IrqLine};
pub use pio::{Pio, PioIndex};
pub use source::{ClockDivider, Pins, SourceConfig};
pub use stream::{State, StreamConfig, StreamController};

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use interrupt::{HandlerSlot, NO_HANDLER};

/// A driver result
pub type Result<T> = core::result::Result<T, Error>;

/// Number of DMA channels on the RP2040.
pub const CHANNEL_COUNT: usize = ral::dma::CHANNELS;

/// RP2040 DMA controller registers
pub const DMA_BASE: *const () = 0x5000_0000 as *const ();
/// RP2040 PIO0 registers
pub const PIO0_BASE: *const () = 0x5020_0000 as *const ();
/// RP2040 PIO1 registers
pub const PIO1_BASE: *const () = 0x5030_0000 as *const ();
/// RP2040 user bank IO registers
pub const IO_BANK0_BASE: *const () = 0x4001_4000 as *const ();
/// Cortex-M NVIC registers
pub const NVIC_BASE: *const () = cortex_m::peripheral::NVIC::PTR as *const ();

#[allow(clippy::declare_interior_mutable_const)] // Very convenient, and usage for static init deemed OK.
const NO_RELOAD: AtomicU32 = AtomicU32::new(0);

/// A DMA driver.
///
/// This DMA driver manages the DMA controller, and the NVIC lines for the
/// DMA interrupts. It's configured with pointers to both peripherals.
///
/// `Dma` allocates [`Channel`](channel::Channel)s, and it holds the state
/// that the hardware, or interrupt handlers, may access on behalf of a
/// channel for as long as the driver exists:
///
/// - one reload word per channel. A channel that restarts another channel
///   reads its new address from here.
/// - one handler per DMA interrupt line.
pub struct Dma {
    controller: ral::Static<ral::dma::RegisterBlock>,
    nvic: ral::Static<ral::nvic::RegisterBlock>,
    claimed: critical_section::Mutex<Cell<u32>>,
    reload: [AtomicU32; CHANNEL_COUNT],
    handlers: [HandlerSlot; 2],
}

// Safety: OK to allocate a DMA driver in a static context.
unsafe impl Sync for Dma {}

impl Dma {
    /// Create the DMA driver.
    ///
    /// Note that this can evaluate at compile time. Consider using this to
    /// expose a `Dma` through your higher-level API that you can use to
    /// allocate DMA channels.
    ///
    /// # Safety
    ///
    /// Caller must make sure that `controller` is a pointer to the start of the
    /// DMA controller register block. Caller must also make sure that
    /// `nvic` points to the NVIC's interrupt set-enable register. There should
    /// only be one `Dma` for a controller.
    pub const unsafe fn new(controller: *const (), nvic: *const ()) -> Self {
        Self {
            controller: ral::Static(controller.cast()),
            nvic: ral::Static(nvic.cast()),
            claimed: critical_section::Mutex::new(Cell::new(0)),
            reload: [NO_RELOAD; CHANNEL_COUNT],
            handlers: [NO_HANDLER; 2],
        }
    }

    /// Creates the DMA channel described by `index`.
    ///
    /// # Safety
    ///
    /// This will create a handle that may alias global, mutable state. You should only create
    /// one channel per index, and the index should not be claimed by
    /// [`claim_unused_channel`](Dma::claim_unused_channel).
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than or equal to the maximum number of channels.
    pub unsafe fn channel(&'static self, index: usize) -> channel::Channel {
        assert!(index < CHANNEL_COUNT);
        channel::Channel::new(index, self.controller)
    }

    /// Claim the lowest-numbered channel that isn't in use.
    ///
    /// Returns [`Error::ChannelsExhausted`] when there are no free channels.
    pub fn claim_unused_channel(&'static self) -> Result<channel::Channel> {
        let index = critical_section::with(|cs| {
            let claimed = self.claimed.borrow(cs);
            let free = (0..CHANNEL_COUNT).find(|idx| claimed.get() & (1 << idx) == 0)?;
            claimed.set(claimed.get() | (1 << free));
            Some(free)
        })
        .ok_or(Error::ChannelsExhausted)?;
        log::debug!("claimed DMA channel {index}");
        // Safety: the claim mask guarantees this is the only handle.
        Ok(unsafe { self.channel(index) })
    }

    /// Return a claimed channel to the driver.
    ///
    /// The channel should be idle. See [`Channel::abort`](channel::Channel::abort).
    pub fn release(&self, channel: channel::Channel) {
        let index = channel.channel();
        self.reload[index].store(0, Ordering::Relaxed);
        critical_section::with(|cs| {
            let claimed = self.claimed.borrow(cs);
            claimed.set(claimed.get() & !(1 << index));
        });
        log::debug!("released DMA channel {index}");
    }

    /// The number of channels that can still be claimed.
    pub fn free_channels(&self) -> usize {
        let claimed = critical_section::with(|cs| self.claimed.borrow(cs).get());
        CHANNEL_COUNT - claimed.count_ones() as usize
    }

    /// The reload word associated with `channel`.
    ///
    /// It lives as long as the driver, so its address is safe to hand
    /// to a DMA channel.
    pub(crate) fn reload_slot(&self, channel: &channel::Channel) -> &AtomicU32 {
        &self.reload[channel.channel()]
    }

    /// Bind `handler` to `line`, then unmask the line.
    ///
    /// Each line has at most one handler. Returns [`Error::LineInUse`] if
    /// `line` is already bound.
    pub fn bind(&self, line: IrqLine, handler: Handler) -> Result<()> {
        critical_section::with(|cs| {
            let slot = self.handlers[line.index()].borrow(cs);
            if slot.get().is_some() {
                return Err(Error::LineInUse(line));
            }
            slot.set(Some(handler));
            Ok(())
        })
        .inspect_err(|_| log::warn!("{line:?} is bound to another handler"))?;
        self.nvic.ISER.write(1 << nvic_bit(line));
        log::debug!("bound handler to {line:?}");
        Ok(())
    }

    /// Mask `line`, then drop its handler.
    pub fn unbind(&self, line: IrqLine) {
        self.nvic.ICER.write(1 << nvic_bit(line));
        self.nvic.ICPR.write(1 << nvic_bit(line));
        critical_section::with(|cs| self.handlers[line.index()].borrow(cs).set(None));
        log::debug!("unbound {line:?}");
    }

    /// Returns `true` if a handler is bound to `line`.
    pub fn is_bound(&self, line: IrqLine) -> bool {
        critical_section::with(|cs| self.handlers[line.index()].borrow(cs).get().is_some())
    }

    /// Run the handler bound to `line`, if any.
    ///
    /// Call this from the line's interrupt vector:
    ///
    /// ```ignore
    /// #[interrupt]
    /// fn DMA_IRQ_0() {
    ///     DMA.dispatch(IrqLine::Dma0);
    /// }
    /// ```
    pub fn dispatch(&self, line: IrqLine) {
        let handler = critical_section::with(|cs| self.handlers[line.index()].borrow(cs).get());
        if let Some(handler) = handler {
            handler();
        }
    }
}

fn nvic_bit(line: IrqLine) -> u32 {
    use cortex_m::interrupt::InterruptNumber;
    line.number() as u32
}

/// Make prior memory writes visible to the DMA controller.
pub(crate) fn memory_barrier() {
    use core::sync::atomic::compiler_fence;
    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "arm", target_os = "none"))] {
            cortex_m::asm::dsb();
            compiler_fence(Ordering::SeqCst);
        } else {
            compiler_fence(Ordering::SeqCst);
        }
    }
}
