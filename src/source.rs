//! The ADC source: the ADS7049 program running on one state machine

use crate::pio::{self, Pio, StateMachine};
use crate::program::{ADS7049, CYCLES_PER_SAMPLE};
use crate::ral::io::PINS;
use crate::{Error, Result};

/// The GPIOs wired to the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pins {
    /// Chip select, active low
    pub cs: u8,
    /// Serial clock
    pub sck: u8,
    /// Peripheral out, controller in
    pub poci: u8,
}

impl Pins {
    fn validate(&self) -> Result<()> {
        for pin in [self.cs, self.sck, self.poci] {
            if pin as usize >= PINS {
                return Err(Error::InvalidPin(pin));
            }
        }
        if self.cs == self.sck || self.cs == self.poci {
            return Err(Error::PinConflict(self.cs));
        }
        if self.sck == self.poci {
            return Err(Error::PinConflict(self.sck));
        }
        Ok(())
    }
}

/// The state machine clock divider, in 1/256 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider {
    /// Integer part, at least 1
    pub integer: u16,
    /// Fractional part
    pub fraction: u8,
}

impl ClockDivider {
    /// Divider for 2 MS/s from a 125 MHz system clock, the ADS7049's
    /// fastest rate at the RP2040's default clock.
    pub const DEFAULT: Self = ClockDivider {
        integer: 1,
        fraction: 244,
    };

    /// Compute the divider that samples at `sample_rate_hz` when the
    /// system clock runs at `system_clock_hz`.
    ///
    /// Rounds toward the slower rate. Returns
    /// [`Error::InvalidClockDivider`] when the rate is faster than the
    /// system clock allows, or too slow for the divider.
    pub fn from_sample_rate(system_clock_hz: u32, sample_rate_hz: u32) -> Result<Self> {
        let cycles = sample_rate_hz as u64 * CYCLES_PER_SAMPLE as u64;
        if cycles == 0 {
            return Err(Error::InvalidClockDivider);
        }
        let div_256 = (system_clock_hz as u64 * 256).div_ceil(cycles);
        let integer = div_256 >> 8;
        if integer == 0 || integer > u16::MAX as u64 {
            return Err(Error::InvalidClockDivider);
        }
        Ok(ClockDivider {
            integer: integer as u16,
            fraction: (div_256 & 0xff) as u8,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.integer == 0 {
            Err(Error::InvalidClockDivider)
        } else {
            Ok(())
        }
    }
}

impl Default for ClockDivider {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Source settings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceConfig {
    /// ADC wiring
    pub pins: Pins,
    /// Sample rate
    pub divider: ClockDivider,
}

impl SourceConfig {
    /// Sample on `pins` with the default divider.
    pub const fn new(pins: Pins) -> Self {
        SourceConfig {
            pins,
            divider: ClockDivider::DEFAULT,
        }
    }

    /// Use a different clock divider.
    pub const fn with_divider(mut self, divider: ClockDivider) -> Self {
        self.divider = divider;
        self
    }
}

/// A configured, stopped or running ADC sampler.
pub(crate) struct Source {
    sm: StateMachine,
    pins: Pins,
    offset: u8,
}

impl Source {
    pub(crate) fn new(
        pio: &'static Pio,
        config: SourceConfig,
        existing_program: Option<u8>,
    ) -> Result<Self> {
        config.pins.validate()?;
        config.divider.validate()?;
        let offset = match existing_program {
            Some(offset) if ADS7049.fits_at(offset) => offset,
            Some(offset) => return Err(Error::InvalidProgramOffset(offset)),
            None => pio.add_program(&ADS7049)?,
        };
        let sm = match pio.claim_unused_sm() {
            Ok(sm) => sm,
            Err(err) => {
                if existing_program.is_none() {
                    pio.remove_program(&ADS7049, offset);
                }
                return Err(err);
            }
        };

        let mut source = Source {
            sm,
            pins: config.pins,
            offset,
        };
        source.configure(pio, config.divider)?;
        log::debug!(
            "ADS7049 on {:?} state machine {}, program at {offset}",
            pio.index(),
            source.sm.index()
        );
        Ok(source)
    }

    fn configure(&mut self, pio: &Pio, divider: ClockDivider) -> Result<()> {
        let Pins { cs, sck, poci } = self.pins;
        for pin in [cs, sck, poci] {
            pio.set_pin_function(pin)?;
        }
        self.sm.configure(&pio::Configuration {
            clock_divider: divider.integer,
            clock_divider_fraction: divider.fraction,
            wrap_target: self.offset + ADS7049.wrap_target,
            wrap: self.offset + ADS7049.wrap,
            side_set: ADS7049.side_set,
            side_set_optional: ADS7049.side_set_optional,
            side_set_base: sck,
            set_base: cs,
            set_count: 1,
            in_base: poci,
            in_shift_left: true,
            join_rx: true,
        })?;
        self.sm.set_pindir(cs, true);
        self.sm.set_pindir(sck, true);
        self.sm.set_pindir(poci, false);
        self.sm.set_pin(cs, true);
        self.sm.jump(self.offset + ADS7049.wrap_target);
        Ok(())
    }

    /// Discard leftover samples and partial shifts.
    pub(crate) fn quiesce(&mut self) {
        self.sm.clear_fifos();
        self.sm.restart();
    }

    pub(crate) fn start(&mut self) {
        self.sm.restart();
        self.sm.set_enabled(true);
    }

    /// Stop sampling, release CS, and rewind to the program start.
    pub(crate) fn stop(&mut self) {
        self.sm.set_enabled(false);
        self.sm.set_pin(self.pins.cs, true);
        self.sm.jump(self.offset + ADS7049.wrap_target);
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.sm.is_enabled()
    }

    pub(crate) fn program_offset(&self) -> u8 {
        self.offset
    }

    pub(crate) fn dreq(&self) -> u8 {
        self.sm.rx_dreq()
    }

    pub(crate) fn rx_fifo_address(&self) -> u32 {
        self.sm.rx_fifo_address()
    }

    pub(crate) fn state_machine(&self) -> &StateMachine {
        &self.sm
    }
}
