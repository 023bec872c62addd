//! The stream controller
//!
//! See the [crate documentation](crate) for how the two DMA channels keep
//! each other running.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::channel::{Channel, Configuration, DataSize, Pace};
use crate::pio::{Pio, StateMachine};
use crate::source::{Source, SourceConfig};
use crate::{Dma, Error, Handler, IrqLine, Result};

/// How a stream fills its destination.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Samples written before the destination wraps
    pub sample_count: usize,
    /// Raise an interrupt every time `sample_count` samples are written
    pub raise_interrupt: bool,
    /// The line that carries the interrupt
    pub interrupt_line: IrqLine,
    /// Invoked when the interrupt fires
    pub handler: Option<Handler>,
}

impl StreamConfig {
    /// Write `sample_count` samples per cycle, without interrupts.
    pub const fn new(sample_count: usize) -> Self {
        StreamConfig {
            sample_count,
            raise_interrupt: false,
            interrupt_line: IrqLine::Dma0,
            handler: None,
        }
    }

    /// Run `handler` on `line` after every cycle.
    pub const fn with_interrupt(mut self, line: IrqLine, handler: Handler) -> Self {
        self.raise_interrupt = true;
        self.interrupt_line = line;
        self.handler = Some(handler);
        self
    }

    fn validate(&self, capacity: usize) -> Result<()> {
        if self.sample_count == 0 || self.sample_count > capacity {
            return Err(Error::InvalidSampleCount {
                requested: self.sample_count,
                capacity,
            });
        }
        if self.raise_interrupt && self.handler.is_none() {
            return Err(Error::MissingHandler);
        }
        Ok(())
    }
}

/// Stream controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No DMA channels held
    Idle,
    /// DMA chain armed, ADC stopped
    Configured,
    /// ADC running
    Streaming,
}

/// The channels of a configured stream.
struct Stream {
    /// Moves samples from the RX FIFO into the destination
    sample: Channel,
    /// Rewinds and re-arms `sample`
    control: Channel,
    interrupt: Option<IrqLine>,
}

/// Streams ADC samples into memory.
///
/// A controller owns one state machine running the ADS7049 program. Once
/// [`setup`](StreamController::setup) it also owns two DMA channels.
/// Dropping the controller resets it, and returns the state machine.
pub struct StreamController {
    dma: &'static Dma,
    source: Source,
    stream: Option<Stream>,
    state: State,
}

impl StreamController {
    /// Prepare an ADC on the pins in `config`.
    ///
    /// Loads the ADS7049 program into `pio`, unless `existing_program` is
    /// the offset of a copy that's already loaded. Pass another
    /// controller's [`program_offset`](StreamController::program_offset)
    /// to share its program.
    pub fn new(
        dma: &'static Dma,
        pio: &'static Pio,
        config: SourceConfig,
        existing_program: Option<u8>,
    ) -> Result<Self> {
        Ok(StreamController {
            dma,
            source: Source::new(pio, config, existing_program)?,
            stream: None,
            state: State::Idle,
        })
    }

    /// Arm a stream into `destination`.
    ///
    /// Samples are written to `destination[..config.sample_count]`, over
    /// and over, once the stream is [started](StreamController::start).
    /// Any prior stream is [reset](StreamController::reset) first. If this
    /// returns an error before claiming channels, the prior stream is
    /// untouched.
    pub fn setup(&mut self, destination: &'static [AtomicU16], config: StreamConfig) -> Result<()> {
        config.validate(destination.len())?;
        let held = if self.stream.is_some() { 2 } else { 0 };
        if self.dma.free_channels() + held < 2 {
            return Err(Error::ChannelsExhausted);
        }
        if config.raise_interrupt
            && self.dma.is_bound(config.interrupt_line)
            && self.interrupt_line() != Some(config.interrupt_line)
        {
            return Err(Error::LineInUse(config.interrupt_line));
        }

        self.reset();
        self.source.quiesce();

        let sample = self.dma.claim_unused_channel()?;
        let control = match self.dma.claim_unused_channel() {
            Ok(control) => control,
            Err(err) => {
                self.dma.release(sample);
                return Err(err);
            }
        };
        let mut stream = Stream {
            sample,
            control,
            interrupt: None,
        };
        if let Err(err) = self.arm(&mut stream, destination, &config) {
            self.stream = Some(stream);
            self.reset();
            return Err(err);
        }
        log::debug!(
            "armed {} samples: sample channel {}, control channel {}, {:?}",
            config.sample_count,
            stream.sample.channel(),
            stream.control.channel(),
            stream.interrupt
        );
        self.stream = Some(stream);
        self.state = State::Configured;
        Ok(())
    }

    fn arm(
        &self,
        stream: &mut Stream,
        destination: &'static [AtomicU16],
        config: &StreamConfig,
    ) -> Result<()> {
        let Stream {
            sample,
            control,
            interrupt,
        } = stream;
        let start = destination.as_ptr() as usize as u32;

        // Safety: the RX FIFO and the destination are static.
        unsafe {
            sample.set_read_address(self.source.rx_fifo_address());
            sample.set_write_address(start);
        }
        sample.set_transfer_count(config.sample_count as u32);
        sample.set_configuration(Configuration {
            data_size: DataSize::HalfWord,
            increment_read: false,
            increment_write: true,
            pace: Pace::Dreq(self.source.dreq()),
            chain_to: Some(control.channel()),
            quiet: !config.raise_interrupt,
            enable: true,
        });

        if let (true, Some(handler)) = (config.raise_interrupt, config.handler) {
            self.dma.bind(config.interrupt_line, handler)?;
            *interrupt = Some(config.interrupt_line);
            sample.set_interrupt_enable(config.interrupt_line, true);
        }

        let retained: &AtomicU32 = self.dma.reload_slot(control);
        retained.store(start, Ordering::Relaxed);
        log::trace!("retained {start:#010x} at {:p}", retained);

        // Safety: the reload slot lives as long as the static DMA driver.
        // The trigger register is a DMA register.
        unsafe {
            control.set_read_address(retained as *const AtomicU32 as usize as u32);
            control.set_write_address(sample.write_address_trigger());
        }
        control.set_transfer_count(1);
        control.set_configuration(Configuration {
            data_size: DataSize::Word,
            increment_read: false,
            increment_write: false,
            pace: Pace::Unpaced,
            chain_to: None,
            quiet: true,
            enable: true,
        });
        // Arms the sample channel. It waits for the ADC.
        control.start();
        Ok(())
    }

    /// Start sampling.
    ///
    /// Returns [`Error::NotConfigured`] if there's no stream. Calling this
    /// while streaming restarts the ADC program, and leaves the DMA chain
    /// alone.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::NotConfigured);
        }
        self.source.start();
        self.state = State::Streaming;
        log::debug!(
            "streaming from state machine {}",
            self.source.state_machine().index()
        );
        Ok(())
    }

    /// Stop sampling, and release the stream's DMA channels and interrupt.
    ///
    /// Safe to call at any time, any number of times. Don't race this with
    /// the stream's interrupt handler.
    pub fn reset(&mut self) {
        self.source.stop();
        if let Some(Stream {
            mut sample,
            mut control,
            interrupt,
        }) = self.stream.take()
        {
            control.disable();
            sample.disable();
            // RP2040-E13: an abort may raise the completion IRQ. Mask,
            // abort, then clear.
            for line in IrqLine::ALL {
                sample.set_interrupt_enable(line, false);
            }
            control.abort();
            sample.abort();
            for line in IrqLine::ALL {
                sample.clear_interrupt(line);
            }
            if let Some(line) = interrupt {
                self.dma.unbind(line);
            }
            log::debug!(
                "released sample channel {}, control channel {}",
                sample.channel(),
                control.channel()
            );
            self.dma.release(sample);
            self.dma.release(control);
        }
        self.state = State::Idle;
    }

    /// Acknowledge the stream's interrupt.
    ///
    /// Call this from the interrupt handler. Does nothing if the stream
    /// doesn't raise interrupts.
    pub fn clear_interrupt(&self) {
        if let Some(Stream {
            sample,
            interrupt: Some(line),
            ..
        }) = &self.stream
        {
            sample.clear_interrupt(*line);
        }
    }

    /// Returns `true` if the stream's interrupt is waiting to be cleared.
    pub fn is_interrupt_pending(&self) -> bool {
        match &self.stream {
            Some(Stream {
                sample,
                interrupt: Some(line),
                ..
            }) => sample.is_interrupt(*line),
            _ => false,
        }
    }

    /// Where the ADS7049 program is loaded.
    pub fn program_offset(&self) -> u8 {
        self.source.program_offset()
    }

    /// The controller's state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The sample and control channel numbers, if there's a stream.
    pub fn channels(&self) -> (Option<usize>, Option<usize>) {
        match &self.stream {
            Some(stream) => (Some(stream.sample.channel()), Some(stream.control.channel())),
            None => (None, None),
        }
    }

    /// The line carrying the stream's interrupt, if it raises one.
    pub fn interrupt_line(&self) -> Option<IrqLine> {
        self.stream.as_ref().and_then(|stream| stream.interrupt)
    }

    /// The state machine running the ADC program.
    pub fn state_machine(&self) -> &StateMachine {
        self.source.state_machine()
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.reset();
    }
}
