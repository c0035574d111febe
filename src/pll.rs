/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::bus::{write_register, write_registers, RegisterBus};
use crate::ratio::Ratio;
use crate::registers::{Register, PLL};
use crate::search::{MAX_PLL_MULTIPLIER, MIN_PLL_MULTIPLIER};
use crate::{Error, Frequency};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PllInputSource {
    Crystal,
    Clkin,
}

impl Default for PllInputSource {
    fn default() -> Self {
        PllInputSource::Crystal
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PllState {
    /// No multiplier written yet.
    Unconfigured,
    /// A multiplier was written, but the PLL was not reset since.
    Configured,
    /// Reset after the last multiplier write.
    Running,
}

/// One of the two PLLs and the last multiplier successfully written to it.
#[derive(Debug, Clone)]
pub struct Pll {
    pll: PLL,
    input_source: PllInputSource,
    multiplier: Ratio,
    state: PllState,
}

impl Pll {
    pub(crate) fn new(pll: PLL) -> Self {
        Pll {
            pll,
            input_source: PllInputSource::default(),
            multiplier: Ratio::default(),
            state: PllState::Unconfigured,
        }
    }

    pub fn pll(&self) -> PLL {
        self.pll
    }

    pub fn input_source(&self) -> PllInputSource {
        self.input_source
    }

    pub fn multiplier(&self) -> Ratio {
        self.multiplier
    }

    pub fn state(&self) -> PllState {
        self.state
    }

    /// The PLL frequency for the given reference, 0 while unconfigured.
    pub fn frequency(&self, reference: Frequency) -> Frequency {
        self.multiplier.multiply(reference)
    }

    /// Writes the feedback Multisynth. The PLL needs a reset afterwards.
    pub(crate) fn set_multiplier<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        multiplier: Ratio,
    ) -> Result<(), Error> {
        let a = multiplier.a();
        if a < MIN_PLL_MULTIPLIER
            || a > MAX_PLL_MULTIPLIER
            || (a == MAX_PLL_MULTIPLIER && multiplier.b() != 0)
        {
            return Err(Error::InvalidParameter);
        }

        write_registers(
            bus,
            self.pll.multisynth().parameters_register(),
            &multiplier.to_register_bytes(),
        )?;
        self.multiplier = multiplier;
        self.state = PllState::Configured;
        Ok(())
    }

    pub(crate) fn reset<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<(), Error> {
        write_register(bus, Register::PLLReset, self.pll.reset_bits().bits())?;
        self.mark_reset();
        Ok(())
    }

    /// Records a reset strobe written on behalf of this PLL.
    pub(crate) fn mark_reset(&mut self) {
        if self.state == PllState::Configured {
            self.state = PllState::Running;
        }
    }

    pub(crate) fn commit_input_source(&mut self, input_source: PllInputSource) {
        self.input_source = input_source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;

    #[test]
    fn multiplier_is_written_to_feedback_multisynth() {
        let mut bus = MockBus::new();
        let mut pll = Pll::new(PLL::B);
        let ratio = Ratio::new(36, 1, 3).unwrap();

        pll.set_multiplier(&mut bus, ratio).unwrap();

        assert_eq!(bus.block(34), ratio.to_register_bytes());
        assert_eq!(pll.multiplier(), ratio);
        assert_eq!(pll.state(), PllState::Configured);
        assert_eq!(pll.frequency(25_000_000), 908_333_333);
    }

    #[test]
    fn reset_strobes_own_bit() {
        let mut bus = MockBus::new();
        let mut pll = Pll::new(PLL::A);
        pll.set_multiplier(&mut bus, Ratio::integer(36)).unwrap();
        pll.reset(&mut bus).unwrap();
        assert_eq!(bus.register(177), 0b0010_0000);
        assert_eq!(pll.state(), PllState::Running);

        let mut pll = Pll::new(PLL::B);
        pll.reset(&mut bus).unwrap();
        assert_eq!(bus.register(177), 0b1000_0000);
        assert_eq!(pll.state(), PllState::Unconfigured);
    }

    #[test]
    fn failed_write_keeps_previous_multiplier() {
        let mut bus = MockBus::failing_after(1);
        let mut pll = Pll::new(PLL::A);
        let first = Ratio::integer(36);
        pll.set_multiplier(&mut bus, first).unwrap();

        assert_eq!(
            pll.set_multiplier(&mut bus, Ratio::integer(24)),
            Err(Error::CommunicationError)
        );
        assert_eq!(pll.multiplier(), first);
        assert_eq!(pll.reset(&mut bus), Err(Error::CommunicationError));
        assert_eq!(pll.state(), PllState::Configured);
    }

    #[test]
    fn multiplier_range_is_checked_before_writing() {
        let mut bus = MockBus::new();
        let mut pll = Pll::new(PLL::A);
        assert_eq!(
            pll.set_multiplier(&mut bus, Ratio::integer(14)),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            pll.set_multiplier(&mut bus, Ratio::new(90, 1, 2).unwrap()),
            Err(Error::InvalidParameter)
        );
        assert!(bus.writes.is_empty());
        assert_eq!(pll.state(), PllState::Unconfigured);
    }
}
