//! Host-side hardware for tests
//!
//! [`Hardware`] leaks zeroed register blocks, and builds a [`Dma`] and a
//! [`Pio`] on top of them. That's enough to test register encodings.
//!
//! [`Simulator`] adds a model of the DMA controller and the PIO RX FIFOs
//! that moves data the way the RP2040 would. The model can't see register
//! writes as they happen. It looks at the strobe registers
//! (`MULTI_CHAN_TRIGGER`, `CHAN_ABORT`, `INTSn`, PIO `CTRL.SM_RESTART`)
//! when it runs, so run it after each driver call that strobes one of them.
//!
//! Some effects depend on register state at the moment of the write, which
//! RAM can't keep. Drivers report those writes with [`record_abort`] and
//! [`record_flush`], and the simulator replays them in order:
//!
//! - an abort of a channel with transfers in flight raises its completion
//!   interrupt (RP2040-E13), on the lines enabled when it was aborted.
//! - toggling `SHIFTCTRL.FJOIN_RX` empties the state machine's FIFO. A
//!   restart doesn't.
//!
//! Addresses are 32 bits wide on the RP2040, and on the host we truncate
//! pointers. The simulator maps truncated addresses back to the blocks and
//! buffers it knows about.

use std::cell::RefCell;
use std::collections::VecDeque;

use core::sync::atomic::AtomicU16;

use crate::ral::{dma, io, nvic, pio};
use crate::{Dma, IrqLine, Pio, PioIndex, CHANNEL_COUNT};

fn leak<T>() -> &'static T {
    // Safety: register blocks are plain integers; all zeros is their reset value
    // as far as these tests care.
    Box::leak(Box::new(unsafe { core::mem::zeroed::<T>() }))
}

fn base<T>(block: &T) -> *const () {
    block as *const T as *const ()
}

fn bus<T: ?Sized>(block: *const T) -> u32 {
    block as *const () as usize as u32
}

enum Event {
    Abort {
        dma: u32,
        channel: usize,
        inte: [u32; 2],
    },
    Flush {
        pio: u32,
        sm: usize,
    },
}

thread_local! {
    static EVENTS: RefCell<Vec<Event>> = const { RefCell::new(Vec::new()) };
}

/// `channel` was just aborted.
pub(crate) fn record_abort(regs: &dma::RegisterBlock, channel: usize) {
    let event = Event::Abort {
        dma: bus(regs),
        channel,
        inte: [regs.INTE0.read(), regs.INTE1.read()],
    };
    EVENTS.with_borrow_mut(|events| events.push(event));
}

/// State machine `sm` just toggled its FIFO join.
pub(crate) fn record_flush(regs: &pio::RegisterBlock, sm: usize) {
    let event = Event::Flush {
        pio: bus(regs),
        sm,
    };
    EVENTS.with_borrow_mut(|events| events.push(event));
}

/// RAM-backed peripherals, and drivers that use them.
#[derive(Clone, Copy)]
pub(crate) struct Hardware {
    pub dma_regs: &'static dma::RegisterBlock,
    pub pio_regs: &'static pio::RegisterBlock,
    pub io_regs: &'static io::RegisterBlock,
    pub nvic_regs: &'static nvic::RegisterBlock,
    pub dma: &'static Dma,
    pub pio: &'static Pio,
}

impl Hardware {
    pub fn new() -> Self {
        Self::with_pio(PioIndex::Pio0)
    }

    /// The [`Pio`] drives `index`.
    pub fn with_pio(index: PioIndex) -> Self {
        let dma_regs = leak::<dma::RegisterBlock>();
        let pio_regs = leak::<pio::RegisterBlock>();
        let io_regs = leak::<io::RegisterBlock>();
        let nvic_regs = leak::<nvic::RegisterBlock>();
        // Safety: each block is distinct, and lives forever.
        let dma = Box::leak(Box::new(unsafe { Dma::new(base(dma_regs), base(nvic_regs)) }));
        let pio = Box::leak(Box::new(unsafe {
            Pio::new(index, base(pio_regs), base(io_regs))
        }));
        Hardware {
            dma_regs,
            pio_regs,
            io_regs,
            nvic_regs,
            dma,
            pio,
        }
    }
}

#[derive(Clone, Copy)]
enum Region {
    Dma,
    Pio,
    Memory(*const u8),
}

#[derive(Default, Clone, Copy)]
struct ChannelState {
    busy: bool,
    remaining: u32,
    triggers: usize,
}

/// Runs the DMA controller and PIO FIFOs of some [`Hardware`].
pub(crate) struct Simulator {
    hw: Hardware,
    regions: Vec<(u32, usize, Region)>,
    channels: [ChannelState; CHANNEL_COUNT],
    fifos: [VecDeque<u32>; pio::STATE_MACHINES],
    /// Raw interrupt status, one bit per channel
    intr: u32,
    fired: [usize; 2],
    raised_by_abort: [usize; 2],
}

const CH_STRIDE: u32 = 0x40;
const CH_END: u32 = CH_STRIDE * CHANNEL_COUNT as u32;
const RXF: u32 = 0x20;

impl Simulator {
    pub fn new(hw: Hardware) -> Self {
        let regions = vec![
            (
                bus(hw.dma_regs),
                core::mem::size_of::<dma::RegisterBlock>(),
                Region::Dma,
            ),
            (
                bus(hw.pio_regs),
                core::mem::size_of::<pio::RegisterBlock>(),
                Region::Pio,
            ),
            (
                bus(hw.dma.reload.as_ptr()),
                core::mem::size_of_val(&hw.dma.reload),
                Region::Memory(hw.dma.reload.as_ptr().cast()),
            ),
        ];
        Simulator {
            hw,
            regions,
            channels: [ChannelState::default(); CHANNEL_COUNT],
            fifos: Default::default(),
            intr: 0,
            fired: [0; 2],
            raised_by_abort: [0; 2],
        }
    }

    /// Let DMA channels access `buffer`.
    pub fn map(&mut self, buffer: &'static [AtomicU16]) {
        self.regions.push((
            bus(buffer.as_ptr()),
            core::mem::size_of_val(buffer),
            Region::Memory(buffer.as_ptr().cast()),
        ));
    }

    /// How many times the bound handler for `line` ran.
    pub fn fired(&self, line: IrqLine) -> usize {
        self.fired[line.index()]
    }

    /// How many interrupts aborts raised on `line`, whether or not a
    /// handler ran.
    pub fn raised_by_abort(&self, line: IrqLine) -> usize {
        self.raised_by_abort[line.index()]
    }

    /// How many times `channel` was triggered.
    pub fn triggers(&self, channel: usize) -> usize {
        self.channels[channel].triggers
    }

    /// Words waiting in a state machine's RX FIFO.
    pub fn fifo_len(&self, sm: usize) -> usize {
        self.fifos[sm].len()
    }

    /// A state machine pushes `word` into its RX FIFO, then the DMA
    /// controller runs.
    ///
    /// Disabled state machines produce nothing. A full FIFO drops the word,
    /// like `push noblock`.
    pub fn produce(&mut self, sm: usize, word: u16) {
        self.strobes();
        let enabled = self.hw.pio_regs.CTRL.read() & (1 << sm) != 0;
        let joined = self.hw.pio_regs.SM[sm].SHIFTCTRL.read() & (1 << 31) != 0;
        let depth = if joined { 8 } else { 4 };
        if enabled && self.fifos[sm].len() < depth {
            self.fifos[sm].push_back(word as u32);
        }
        self.run();
    }

    /// Leave `word` in a state machine's RX FIFO, as an earlier user of the
    /// state machine might have.
    pub fn inject(&mut self, sm: usize, word: u32) {
        self.fifos[sm].push_back(word);
    }

    /// Handle strobes, deliver pending interrupts, and move data until no
    /// channel can make progress.
    pub fn run(&mut self) {
        self.strobes();
        self.deliver();
        loop {
            let mut progress = false;
            for channel in 0..CHANNEL_COUNT {
                if self.step(channel) {
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
    }

    fn strobes(&mut self) {
        self.replay();
        let regs = self.hw.dma_regs;

        let abort = regs.CHAN_ABORT.read();
        regs.CHAN_ABORT.write(0);
        for channel in bits(abort) {
            self.channels[channel].busy = false;
            self.channels[channel].remaining = 0;
        }

        let trigger = regs.MULTI_CHAN_TRIGGER.read();
        regs.MULTI_CHAN_TRIGGER.write(0);
        for channel in bits(trigger) {
            self.trigger(channel);
        }

        self.acknowledge();

        // Restarts leave the FIFOs alone.
        let ctrl = self.hw.pio_regs.CTRL.read();
        self.hw.pio_regs.CTRL.write(ctrl & !(0xf << 4));
    }

    /// Apply the recorded events that belong to our blocks.
    fn replay(&mut self) {
        let (dma_block, pio_block) = (bus(self.hw.dma_regs), bus(self.hw.pio_regs));
        let events = EVENTS.with_borrow_mut(|events| {
            let (ours, theirs): (Vec<_>, Vec<_>) =
                events.drain(..).partition(|event| match *event {
                    Event::Abort { dma, .. } => dma == dma_block,
                    Event::Flush { pio, .. } => pio == pio_block,
                });
            *events = theirs;
            ours
        });
        for event in events {
            match event {
                Event::Abort { channel, inte, .. } => self.abort_in_flight(channel, inte),
                Event::Flush { sm, .. } => self.fifos[sm].clear(),
            }
        }
    }

    fn abort_in_flight(&mut self, channel: usize, inte: [u32; 2]) {
        let state = self.channels[channel];
        let quiet = self.hw.dma_regs.CH[channel].AL1_CTRL.read() & (1 << 21) != 0;
        if !state.busy || state.remaining == 0 || quiet {
            return;
        }
        self.intr |= 1 << channel;
        self.hw.dma_regs.INTR.write(self.intr);
        for (line, inte) in inte.iter().enumerate() {
            if inte & (1 << channel) != 0 {
                self.raised_by_abort[line] += 1;
            }
        }
    }

    /// Apply write-one-to-clear writes to `INTS0` and `INTS1`.
    fn acknowledge(&mut self) {
        let regs = self.hw.dma_regs;
        for ints in [&regs.INTS0, &regs.INTS1] {
            self.intr &= !ints.read();
            ints.write(0);
        }
        regs.INTR.write(self.intr);
    }

    fn deliver(&mut self) {
        let regs = self.hw.dma_regs;
        for (line, inte) in [(IrqLine::Dma0, &regs.INTE0), (IrqLine::Dma1, &regs.INTE1)] {
            if self.intr & inte.read() != 0 && self.hw.dma.is_bound(line) {
                self.fired[line.index()] += 1;
                self.hw.dma.dispatch(line);
                self.acknowledge();
            }
        }
    }

    fn trigger(&mut self, channel: usize) {
        let state = &mut self.channels[channel];
        state.busy = true;
        state.remaining = self.hw.dma_regs.CH[channel].TRANS_COUNT.read();
        state.triggers += 1;
    }

    /// Move one element on `channel`, if it's ready. Returns `true` on
    /// progress.
    fn step(&mut self, channel: usize) -> bool {
        if !self.channels[channel].busy {
            return false;
        }
        let regs = self.hw.dma_regs;
        let ch = &regs.CH[channel];
        let ctrl = ch.AL1_CTRL.read();
        if ctrl & 1 == 0 {
            return false;
        }
        let treq = (ctrl >> 15) & 0x3f;
        if treq != dma::TREQ_PERMANENT && !self.dreq(treq) {
            return false;
        }

        let size = 1u32 << ((ctrl >> 2) & 0b11);
        let read = ch.READ_ADDR.read();
        let write = ch.WRITE_ADDR.read();
        let value = self.load(read, size);
        self.store(write, size, value);
        if ctrl & (1 << 4) != 0 {
            ch.READ_ADDR.write(read.wrapping_add(size));
        }
        if ctrl & (1 << 5) != 0 {
            ch.WRITE_ADDR.write(write.wrapping_add(size));
        }

        let state = &mut self.channels[channel];
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            state.busy = false;
            self.complete(channel, ctrl);
        }
        true
    }

    fn complete(&mut self, channel: usize, ctrl: u32) {
        if ctrl & (1 << 21) == 0 {
            self.intr |= 1 << channel;
            self.hw.dma_regs.INTR.write(self.intr);
        }
        let chain_to = ((ctrl >> 11) & 0xf) as usize;
        if chain_to != channel {
            self.trigger(chain_to);
        }
        self.deliver();
    }

    /// Our PIO's RX FIFOs have data.
    fn dreq(&self, treq: u32) -> bool {
        let base = self.hw.pio.index().dreq_base() as u32;
        match treq.checked_sub(base) {
            Some(sm @ 0..=3) => !self.fifos[sm as usize].is_empty(),
            _ => false,
        }
    }

    fn region(&self, address: u32) -> (u32, Region) {
        self.regions
            .iter()
            .find(|(base, len, _)| (address.wrapping_sub(*base) as usize) < *len)
            .map(|&(base, _, region)| (address.wrapping_sub(base), region))
            .unwrap_or_else(|| panic!("DMA access to unmapped address {address:#010x}"))
    }

    fn load(&mut self, address: u32, size: u32) -> u32 {
        match self.region(address) {
            (offset, Region::Pio) => {
                assert!((RXF..RXF + 16).contains(&offset), "PIO read at {offset:#x}");
                let sm = ((offset - RXF) / 4) as usize;
                self.fifos[sm].pop_front().unwrap_or(0)
            }
            (offset, Region::Dma) => {
                panic!("DMA read of DMA register {offset:#x}")
            }
            (offset, Region::Memory(host)) => unsafe {
                let ptr = host.add(offset as usize);
                match size {
                    1 => ptr.read_volatile() as u32,
                    2 => ptr.cast::<u16>().read_volatile() as u32,
                    _ => ptr.cast::<u32>().read_volatile(),
                }
            },
        }
    }

    fn store(&mut self, address: u32, size: u32, value: u32) {
        match self.region(address) {
            (offset, Region::Dma) => self.store_register(offset, value),
            (offset, Region::Pio) => panic!("DMA write of PIO register {offset:#x}"),
            (offset, Region::Memory(host)) => unsafe {
                let ptr = host.add(offset as usize).cast_mut();
                match size {
                    1 => ptr.write_volatile(value as u8),
                    2 => ptr.cast::<u16>().write_volatile(value as u16),
                    _ => ptr.cast::<u32>().write_volatile(value),
                }
            },
        }
    }

    /// A bus write to a channel register, through any of its aliases.
    fn store_register(&mut self, offset: u32, value: u32) {
        assert!(offset < CH_END, "DMA write of DMA register {offset:#x}");
        let channel = (offset / CH_STRIDE) as usize;
        let regs = self.hw.dma_regs;
        let ch = &regs.CH[channel];
        let target = match offset % CH_STRIDE {
            0x00 | 0x14 | 0x28 | 0x3c => &ch.READ_ADDR,
            0x04 | 0x18 | 0x2c | 0x34 => &ch.WRITE_ADDR,
            0x08 | 0x1c | 0x24 | 0x38 => &ch.TRANS_COUNT,
            _ => &ch.AL1_CTRL,
        };
        target.write(value);
        if matches!(offset % CH_STRIDE, 0x0c | 0x1c | 0x2c | 0x3c) {
            self.trigger(channel);
        }
    }
}

fn bits(mask: u32) -> impl Iterator<Item = usize> {
    (0..32).filter(move |bit| mask & (1 << bit) != 0)
}

#[cfg(test)]
mod tests {
    use super::{Hardware, Simulator};
    use crate::channel::{Configuration, DataSize};
    use crate::{ral, IrqLine};
    use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

    #[test]
    fn chain_rewrites_write_address() {
        let hw = Hardware::new();
        let buf: &'static [AtomicU16] = Box::leak(Box::new([
            AtomicU16::new(1),
            AtomicU16::new(2),
            AtomicU16::new(0),
            AtomicU16::new(0),
        ]));
        let mut sim = Simulator::new(hw);
        sim.map(buf);

        let mut copy = hw.dma.claim_unused_channel().unwrap();
        let mut rewind = hw.dma.claim_unused_channel().unwrap();
        let base = buf.as_ptr() as usize as u32;
        let slot = hw.dma.reload_slot(&rewind);
        slot.store(base, Ordering::Relaxed);
        unsafe {
            copy.set_read_address(base);
            copy.set_write_address(base + 4);
            rewind.set_read_address(slot as *const AtomicU32 as usize as u32);
            // Non-triggering alias
            rewind.set_write_address(ral::address_of(&hw.dma_regs.CH[0].AL1_WRITE_ADDR));
        }
        copy.set_transfer_count(2);
        copy.set_configuration(Configuration {
            data_size: DataSize::HalfWord,
            increment_write: true,
            chain_to: Some(rewind.channel()),
            ..Configuration::new()
        });
        rewind.set_transfer_count(1);
        rewind.set_configuration(Configuration {
            increment_read: false,
            quiet: true,
            ..Configuration::new()
        });

        copy.start();
        sim.run();
        let values: Vec<u16> = buf.iter().map(|s| s.load(Ordering::Relaxed)).collect();
        assert_eq!(values, [1, 2, 1, 2]);
        assert_eq!(hw.dma_regs.CH[0].WRITE_ADDR.read(), base);
        assert_eq!(hw.dma_regs.CH[0].READ_ADDR.read(), base + 4);
        assert_eq!((sim.triggers(0), sim.triggers(1)), (1, 1));
        // Only the loud channel raised its interrupt.
        assert_eq!(hw.dma_regs.INTR.read(), 0b01);
    }

    #[test]
    fn paced_channel_waits_for_fifo() {
        let hw = Hardware::new();
        let buf: &'static [AtomicU16] = Box::leak(Box::new([AtomicU16::new(0), AtomicU16::new(0)]));
        let mut sim = Simulator::new(hw);
        sim.map(buf);

        let mut sm = hw.pio.claim_unused_sm().unwrap();
        let mut channel = hw.dma.claim_unused_channel().unwrap();
        unsafe {
            channel.set_read_address(sm.rx_fifo_address());
            channel.set_write_address(buf.as_ptr() as usize as u32);
        }
        channel.set_transfer_count(2);
        channel.set_configuration(Configuration {
            data_size: DataSize::HalfWord,
            increment_read: false,
            increment_write: true,
            pace: crate::channel::Pace::Dreq(sm.rx_dreq()),
            ..Configuration::new()
        });
        channel.start();
        sim.run();
        assert_eq!(sim.triggers(0), 1);

        // Disabled state machines produce nothing.
        sim.produce(0, 5);
        assert_eq!(sim.fifo_len(0), 0);

        sm.set_enabled(true);
        sim.produce(0, 5);
        assert_eq!(buf[0].load(Ordering::Relaxed), 5);
        assert_eq!(buf[1].load(Ordering::Relaxed), 0);
        assert_eq!(hw.dma_regs.INTR.read(), 0);
        sim.produce(0, 6);
        assert_eq!(buf[1].load(Ordering::Relaxed), 6);
        assert_eq!(hw.dma_regs.INTR.read(), 0b1);

        // Nothing left to move it.
        sim.produce(0, 7);
        assert_eq!(sim.fifo_len(0), 1);
    }

    #[test]
    fn only_join_toggle_flushes_fifo() {
        let hw = Hardware::new();
        let mut sim = Simulator::new(hw);
        let mut sm = hw.pio.claim_unused_sm().unwrap();
        sim.inject(0, 1);
        sim.inject(0, 2);

        sm.restart();
        sim.run();
        assert_eq!(sim.fifo_len(0), 2);

        sm.clear_fifos();
        sim.run();
        assert_eq!(sim.fifo_len(0), 0);
    }

    #[test]
    fn abort_in_flight_raises_completion() {
        let hw = Hardware::new();
        let buf: &'static [AtomicU16] = Box::leak(Box::new([AtomicU16::new(0), AtomicU16::new(0)]));
        let mut sim = Simulator::new(hw);
        sim.map(buf);

        let mut sm = hw.pio.claim_unused_sm().unwrap();
        sm.set_enabled(true);
        let mut channel = hw.dma.claim_unused_channel().unwrap();
        let arm = |channel: &mut crate::channel::Channel| {
            unsafe {
                channel.set_read_address(sm.rx_fifo_address());
                channel.set_write_address(buf.as_ptr() as usize as u32);
            }
            channel.set_transfer_count(2);
            channel.set_configuration(Configuration {
                data_size: DataSize::HalfWord,
                increment_read: false,
                increment_write: true,
                pace: crate::channel::Pace::Dreq(sm.rx_dreq()),
                ..Configuration::new()
            });
            channel.start();
        };

        // Enabled while aborting.
        arm(&mut channel);
        channel.set_interrupt_enable(IrqLine::Dma0, true);
        sim.produce(0, 1);
        channel.abort();
        sim.run();
        assert_eq!(sim.raised_by_abort(IrqLine::Dma0), 1);
        assert_eq!(hw.dma_regs.INTR.read(), 0b1);
        channel.clear_interrupt(IrqLine::Dma0);

        // Masked before aborting.
        arm(&mut channel);
        sim.run();
        sim.produce(0, 2);
        channel.set_interrupt_enable(IrqLine::Dma0, false);
        channel.abort();
        sim.run();
        assert_eq!(sim.raised_by_abort(IrqLine::Dma0), 1);

        // Idle channels raise nothing.
        channel.set_interrupt_enable(IrqLine::Dma0, true);
        channel.abort();
        sim.run();
        assert_eq!(sim.raised_by_abort(IrqLine::Dma0), 1);
    }
}
