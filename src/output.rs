/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::bus::{write_register, write_registers, RegisterBus};
use crate::ratio::{OutputDivider, Ratio};
use crate::registers::{ClockControlBits, ClockOutput, Multisynth, SimpleMultisynth, PLL};
use crate::search::{MAX_MS_DIVIDER, MIN_MS_DIVIDER};
use crate::Error;

/// What an output Multisynth divides.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockInputSource {
    Crystal,
    Clkin,
    /// The Multisynth of CLK0 (for CLK0-CLK3) or CLK4 (for CLK4-CLK7).
    GroupMultisynth,
    Multisynth,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDrive {
    Drive2mA,
    Drive4mA,
    Drive6mA,
    Drive8mA,
}

/// Level of an output while it is disabled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDisableState {
    Low = 0,
    High,
    HighZ,
    Never,
}

impl ClockInputSource {
    fn bits(&self) -> ClockControlBits {
        match *self {
            ClockInputSource::Crystal => ClockControlBits::CLK_SRC_XTAL,
            ClockInputSource::Clkin => ClockControlBits::CLK_SRC_CLKIN,
            ClockInputSource::GroupMultisynth => ClockControlBits::CLK_SRC_MS_ALT,
            ClockInputSource::Multisynth => ClockControlBits::CLK_SRC_MS,
        }
    }
}

impl OutputDrive {
    fn bits(&self) -> ClockControlBits {
        match *self {
            OutputDrive::Drive2mA => ClockControlBits::CLK_DRV_2,
            OutputDrive::Drive4mA => ClockControlBits::CLK_DRV_4,
            OutputDrive::Drive6mA => ClockControlBits::CLK_DRV_6,
            OutputDrive::Drive8mA => ClockControlBits::CLK_DRV_8,
        }
    }
}

impl OutputDisableState {
    pub(crate) fn bits(&self) -> u8 {
        *self as u8
    }
}

/// Complete content of an output's control register.
///
/// The register can only be written as a whole, so every change of a single
/// field goes through a full snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockControl {
    pub power_down: bool,
    pub integer_mode: bool,
    pub pll: PLL,
    pub invert: bool,
    pub input_source: ClockInputSource,
    pub drive: OutputDrive,
}

impl Default for ClockControl {
    /// Powered down, fractional mode, PLL A, crystal, 2 mA: the register value 0x80.
    fn default() -> Self {
        ClockControl {
            power_down: true,
            integer_mode: false,
            pll: PLL::A,
            invert: false,
            input_source: ClockInputSource::Crystal,
            drive: OutputDrive::Drive2mA,
        }
    }
}

impl ClockControl {
    pub fn bits(&self) -> u8 {
        let mut bits = self.input_source.bits() | self.drive.bits();
        if self.power_down {
            bits |= ClockControlBits::CLK_PDN;
        }
        if self.integer_mode {
            bits |= ClockControlBits::MS_INT;
        }
        if self.pll == PLL::B {
            bits |= ClockControlBits::MS_SRC;
        }
        if self.invert {
            bits |= ClockControlBits::CLK_INV;
        }
        bits.bits()
    }
}

/// Control state shared by all eight outputs.
#[derive(Debug, Clone)]
pub struct Output {
    clk: ClockOutput,
    control: ClockControl,
    disable_state: OutputDisableState,
}

impl Output {
    fn new(clk: ClockOutput) -> Self {
        Output {
            clk,
            control: ClockControl::default(),
            disable_state: OutputDisableState::Low,
        }
    }

    pub fn clock_output(&self) -> ClockOutput {
        self.clk
    }

    pub fn control(&self) -> ClockControl {
        self.control
    }

    pub fn disable_state(&self) -> OutputDisableState {
        self.disable_state
    }

    pub(crate) fn setup_control<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        control: ClockControl,
    ) -> Result<(), Error> {
        write_register(bus, self.clk.register(), control.bits())?;
        self.control = control;
        Ok(())
    }

    pub(crate) fn set_power_down<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        power_down: bool,
    ) -> Result<(), Error> {
        let control = ClockControl {
            power_down,
            ..self.control
        };
        self.setup_control(bus, control)
    }

    pub(crate) fn set_integer_mode<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        integer_mode: bool,
    ) -> Result<(), Error> {
        let control = ClockControl {
            integer_mode,
            ..self.control
        };
        self.setup_control(bus, control)
    }

    pub(crate) fn set_pll<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        pll: PLL,
    ) -> Result<(), Error> {
        let control = ClockControl { pll, ..self.control };
        self.setup_control(bus, control)
    }

    pub(crate) fn set_invert<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        invert: bool,
    ) -> Result<(), Error> {
        let control = ClockControl {
            invert,
            ..self.control
        };
        self.setup_control(bus, control)
    }

    pub(crate) fn set_input_source<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        input_source: ClockInputSource,
    ) -> Result<(), Error> {
        let control = ClockControl {
            input_source,
            ..self.control
        };
        self.setup_control(bus, control)
    }

    pub(crate) fn set_drive<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        drive: OutputDrive,
    ) -> Result<(), Error> {
        let control = ClockControl {
            drive,
            ..self.control
        };
        self.setup_control(bus, control)
    }

    /// Records a control value written by a bulk write of all control registers.
    pub(crate) fn commit_control(&mut self, control: ClockControl) {
        self.control = control;
    }

    pub(crate) fn commit_disable_state(&mut self, disable_state: OutputDisableState) {
        self.disable_state = disable_state;
    }
}

/// CLK0-CLK5: fractional Multisynth divider and phase offset.
#[derive(Debug, Clone)]
pub struct FractionalOutput {
    output: Output,
    ms: Multisynth,
    divider: Ratio,
    phase_shift: u8,
}

impl FractionalOutput {
    pub(crate) fn new(ms: Multisynth) -> Self {
        FractionalOutput {
            output: Output::new(ms.clock_output()),
            ms,
            divider: Ratio::default(),
            phase_shift: 0,
        }
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut Output {
        &mut self.output
    }

    pub fn multisynth(&self) -> Multisynth {
        self.ms
    }

    pub fn divider(&self) -> Ratio {
        self.divider
    }

    pub fn phase_shift(&self) -> u8 {
        self.phase_shift
    }

    pub(crate) fn setup_divider<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        divider: Ratio,
    ) -> Result<(), Error> {
        let a = divider.a();
        let valid = if divider.by4() {
            a == 4 && divider.b() == 0
        } else {
            a >= MIN_MS_DIVIDER && a <= MAX_MS_DIVIDER
        };
        if !valid {
            return Err(Error::InvalidParameter);
        }

        write_registers(
            bus,
            self.ms.parameters_register(),
            &divider.to_register_bytes(),
        )?;
        self.divider = divider;
        Ok(())
    }

    /// Writes the phase offset in units of a quarter PLL period; only 7 bits are kept.
    pub(crate) fn setup_phase_shift<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        phase_shift: u8,
    ) -> Result<(), Error> {
        let phase_shift = phase_shift & 0b0111_1111; // upper bit is reserved
        write_register(bus, self.ms.phase_register(), phase_shift)?;
        self.phase_shift = phase_shift;
        Ok(())
    }
}

/// CLK6 and CLK7: 8-bit integer divider followed by an R divider.
#[derive(Debug, Clone)]
pub struct IntegerOutput {
    output: Output,
    ms: SimpleMultisynth,
    divider: u8,
    r_div: OutputDivider,
}

impl IntegerOutput {
    pub(crate) fn new(ms: SimpleMultisynth) -> Self {
        IntegerOutput {
            output: Output::new(ms.clock_output()),
            ms,
            divider: 0,
            r_div: OutputDivider::Div1,
        }
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut Output {
        &mut self.output
    }

    pub fn multisynth(&self) -> SimpleMultisynth {
        self.ms
    }

    pub fn divider(&self) -> u8 {
        self.divider
    }

    pub fn r_div(&self) -> OutputDivider {
        self.r_div
    }

    /// The total division as a ratio, zero while unconfigured.
    pub fn ratio(&self) -> Ratio {
        Ratio::integer(self.divider as u32).with_divider(self.r_div)
    }

    /// Writes the Multisynth divider, an even value of 6..=254.
    pub(crate) fn setup_divider<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        divider: u8,
    ) -> Result<(), Error> {
        if divider < MIN_MS_DIVIDER as u8 || divider % 2 != 0 {
            return Err(Error::InvalidParameter);
        }
        write_register(bus, self.ms.parameters_register(), divider)?;
        self.divider = divider;
        Ok(())
    }

    /// The R divider field of this output in the shared CLK6/CLK7 divider register.
    pub(crate) fn r_div_bits(&self, r_div: OutputDivider) -> u8 {
        r_div.bits() << self.ms.r_div_offset()
    }

    pub(crate) fn commit_r_div(&mut self, r_div: OutputDivider) {
        self.r_div = r_div;
    }
}
