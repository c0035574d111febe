/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::bus::{read_registers, write_register, write_registers, RegisterBus};
use crate::output::{
    ClockControl, ClockInputSource, FractionalOutput, IntegerOutput, Output, OutputDisableState,
    OutputDrive,
};
use crate::pll::{Pll, PllInputSource};
use crate::ratio::{OutputDivider, Ratio, RegisterParameters};
use crate::registers::{
    ClockOutput, CrystalLoadBits, DeviceStatusBits, Multisynth, PLLInputSourceBits, PLLResetBits,
    Register, SimpleMultisynth, ALL_OUTPUTS_DISABLED, PLL,
};
use crate::search::{find_divider, find_multiplier, find_multiplier_with_integer_divider};
use crate::{Error, Frequency};
use core::convert::TryFrom;
use log::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

impl CrystalLoad {
    fn bits(&self) -> CrystalLoadBits {
        match *self {
            CrystalLoad::_6 => CrystalLoadBits::CL_6,
            CrystalLoad::_8 => CrystalLoadBits::CL_8,
            CrystalLoad::_10 => CrystalLoadBits::CL_10,
        }
    }
}

/// The reference crystal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Crystal {
    pub frequency: Frequency,
    pub load: CrystalLoad,
    /// Deviation of the actual crystal frequency, in parts per million.
    pub correction_ppm: i32,
}

pub const CRYSTAL_25MHZ: Crystal = Crystal {
    frequency: 25_000_000,
    load: CrystalLoad::_10,
    correction_ppm: 0,
};

pub const CRYSTAL_27MHZ: Crystal = Crystal {
    frequency: 27_000_000,
    load: CrystalLoad::_10,
    correction_ppm: 0,
};

impl Crystal {
    pub fn with_load(self, load: CrystalLoad) -> Self {
        Crystal { load, ..self }
    }

    pub fn with_correction(self, correction_ppm: i32) -> Self {
        Crystal {
            correction_ppm,
            ..self
        }
    }

    /// The nominal frequency shifted by the PPM correction.
    pub fn corrected_frequency(&self) -> Frequency {
        let base = self.frequency as i64;
        let corrected = base + base * self.correction_ppm as i64 / 1_000_000;
        Frequency::try_from(corrected.max(0)).unwrap_or(Frequency::MAX)
    }
}

/// Divider of the CLKIN input in front of the PLLs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClkinDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
}

impl Default for ClkinDivider {
    fn default() -> Self {
        ClkinDivider::Div1
    }
}

impl ClkinDivider {
    fn bits(&self) -> u8 {
        (*self as u8) << 6
    }
}

/// Progress of a configuration session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Outputs are disabled and powered down, PLLs and outputs may be configured.
    SetupStarted,
    /// PLLs were reset and outputs enabled.
    Active,
    Shutdown,
}

pub trait Si5351 {
    fn start_setup(&mut self) -> Result<(), Error>;
    fn finish_setup(&mut self) -> Result<(), Error>;
    fn shutdown(&mut self) -> Result<(), Error>;
    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error>;

    fn setup_pll_input_source(
        &mut self,
        clkin_divider: ClkinDivider,
        pll_a_source: PllInputSource,
        pll_b_source: PllInputSource,
    ) -> Result<(), Error>;
    fn setup_pll(&mut self, pll: PLL, freq: Frequency) -> Result<Frequency, Error>;
    fn setup_pll_raw(&mut self, pll: PLL, a: u32, b: u32, c: u32) -> Result<Frequency, Error>;

    fn setup_output_raw(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        invert: bool,
        input_source: ClockInputSource,
        drive: OutputDrive,
    ) -> Result<(), Error>;
    fn set_power_down(&mut self, clk: ClockOutput, power_down: bool) -> Result<(), Error>;
    /// Switches the output Multisynth in or out of integer mode. Only valid
    /// while its divider is an even integer.
    fn set_integer_mode(&mut self, clk: ClockOutput, integer_mode: bool) -> Result<(), Error>;
    fn select_clock_pll(&mut self, clk: ClockOutput, pll: PLL) -> Result<(), Error>;
    fn set_invert(&mut self, clk: ClockOutput, invert: bool) -> Result<(), Error>;
    fn set_input_source(
        &mut self,
        clk: ClockOutput,
        input_source: ClockInputSource,
    ) -> Result<(), Error>;
    fn set_drive(&mut self, clk: ClockOutput, drive: OutputDrive) -> Result<(), Error>;
    fn set_disable_state(
        &mut self,
        clk: ClockOutput,
        state: OutputDisableState,
    ) -> Result<(), Error>;

    fn set_output_frequency(&mut self, clk: ClockOutput, freq: Frequency)
        -> Result<Frequency, Error>;
    fn set_output_divider(
        &mut self,
        clk: ClockOutput,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<Frequency, Error>;
    fn setup_multisynth_raw(&mut self, clk: ClockOutput, a: u32, b: u32, c: u32)
        -> Result<(), Error>;
    fn setup_integer_output(
        &mut self,
        clk: ClockOutput,
        divider: u8,
        r_div: OutputDivider,
    ) -> Result<Frequency, Error>;
    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error>;

    fn setup_quadrature_output(
        &mut self,
        pll: PLL,
        clk_i: ClockOutput,
        clk_q: ClockOutput,
        freq: Frequency,
    ) -> Result<(Frequency, Frequency), Error>;

    fn pll_frequency(&self, pll: PLL) -> Frequency;
    fn output_frequency(&self, clk: ClockOutput) -> Frequency;
}

/// Si5351 driver
pub struct Si5351Device<B> {
    bus: B,
    crystal: Crystal,
    clkin_divider: ClkinDivider,
    plls: [Pll; 2],
    outputs: [FractionalOutput; 6],
    integer_outputs: [IntegerOutput; 2],
    state: SessionState,
}

impl<B: RegisterBus> Si5351Device<B> {
    /// Creates a new driver. Nothing is written before `start_setup`.
    pub fn new(bus: B, crystal: Crystal) -> Self {
        Si5351Device {
            bus,
            crystal,
            clkin_divider: ClkinDivider::default(),
            plls: [Pll::new(PLL::A), Pll::new(PLL::B)],
            outputs: [
                FractionalOutput::new(Multisynth::MS0),
                FractionalOutput::new(Multisynth::MS1),
                FractionalOutput::new(Multisynth::MS2),
                FractionalOutput::new(Multisynth::MS3),
                FractionalOutput::new(Multisynth::MS4),
                FractionalOutput::new(Multisynth::MS5),
            ],
            integer_outputs: [
                IntegerOutput::new(SimpleMultisynth::MS6),
                IntegerOutput::new(SimpleMultisynth::MS7),
            ],
            state: SessionState::Idle,
        }
    }

    /// The Adafruit breakout: 25 MHz crystal with 10 pF load.
    pub fn new_adafruit_module(bus: B) -> Self {
        Si5351Device::new(bus, CRYSTAL_25MHZ.with_load(CrystalLoad::_10))
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn crystal(&self) -> Crystal {
        self.crystal
    }

    pub fn clkin_divider(&self) -> ClkinDivider {
        self.clkin_divider
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The transport error latched by the bus, if any.
    pub fn error(&self) -> Option<Error> {
        self.bus.error()
    }

    pub fn pll(&self, pll: PLL) -> &Pll {
        &self.plls[pll.ix()]
    }

    pub fn fractional_output(&self, ms: Multisynth) -> &FractionalOutput {
        &self.outputs[ms.ix()]
    }

    pub fn integer_output(&self, ms: SimpleMultisynth) -> &IntegerOutput {
        &self.integer_outputs[ms.ix()]
    }

    pub fn output(&self, clk: ClockOutput) -> &Output {
        match Multisynth::try_from(clk) {
            Ok(ms) => self.outputs[ms.ix()].output(),
            Err(_) => self.integer_outputs[clk.ix() - 6].output(),
        }
    }

    /// Reads back the parameter block of a PLL.
    pub fn read_pll_parameters(&mut self, pll: PLL) -> Result<RegisterParameters, Error> {
        self.read_parameters(pll.multisynth().parameters_register())
    }

    /// Reads back the divider block of one of CLK0-CLK5.
    pub fn read_divider_parameters(
        &mut self,
        clk: ClockOutput,
    ) -> Result<RegisterParameters, Error> {
        let ms = Multisynth::try_from(clk)?;
        self.read_parameters(ms.parameters_register())
    }

    fn read_parameters(&mut self, reg: Register) -> Result<RegisterParameters, Error> {
        let mut bytes = [0u8; 8];
        read_registers(&mut self.bus, reg, &mut bytes)?;
        Ok(RegisterParameters::from_register_bytes(&bytes))
    }

    fn reference_frequency(&self) -> Frequency {
        self.crystal.corrected_frequency()
    }

    fn output_mut(&mut self, clk: ClockOutput) -> (&mut B, &mut Output) {
        let output = match Multisynth::try_from(clk) {
            Ok(ms) => self.outputs[ms.ix()].output_mut(),
            Err(_) => self.integer_outputs[clk.ix() - 6].output_mut(),
        };
        (&mut self.bus, output)
    }

    fn enable_all_outputs(&mut self, enabled: bool) -> Result<(), Error> {
        let value = if enabled { 0x00 } else { ALL_OUTPUTS_DISABLED };
        write_register(&mut self.bus, Register::OutputEnable, value)
    }

    fn power_down_all_outputs(&mut self) -> Result<(), Error> {
        let control = ClockControl::default();
        write_registers(&mut self.bus, Register::Clk0, &[control.bits(); 8])?;
        for output in self.outputs.iter_mut() {
            output.output_mut().commit_control(control);
        }
        for output in self.integer_outputs.iter_mut() {
            output.output_mut().commit_control(control);
        }
        Ok(())
    }

    fn reset_all_plls(&mut self) -> Result<(), Error> {
        write_register(
            &mut self.bus,
            Register::PLLReset,
            (PLLResetBits::PLLA_RST | PLLResetBits::PLLB_RST).bits(),
        )?;
        for pll in self.plls.iter_mut() {
            pll.mark_reset();
        }
        Ok(())
    }
}

impl<B: RegisterBus> Si5351 for Si5351Device<B> {
    /// Disables all outputs, powers down all output drivers and writes the
    /// crystal load. Must precede any PLL or output configuration.
    fn start_setup(&mut self) -> Result<(), Error> {
        self.enable_all_outputs(false)?;
        self.power_down_all_outputs()?;
        write_register(
            &mut self.bus,
            Register::CrystalLoad,
            (CrystalLoadBits::RESERVED | self.crystal.load.bits()).bits(),
        )?;
        self.state = SessionState::SetupStarted;
        Ok(())
    }

    /// Resets both PLLs and enables all outputs.
    fn finish_setup(&mut self) -> Result<(), Error> {
        self.reset_all_plls()?;
        self.enable_all_outputs(true)?;
        self.state = SessionState::Active;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        self.enable_all_outputs(false)?;
        self.power_down_all_outputs()?;
        self.state = SessionState::Shutdown;
        Ok(())
    }

    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error> {
        let mut status = [0u8; 1];
        read_registers(&mut self.bus, Register::DeviceStatus, &mut status)?;
        Ok(DeviceStatusBits::from_bits_truncate(status[0]))
    }

    fn setup_pll_input_source(
        &mut self,
        clkin_divider: ClkinDivider,
        pll_a_source: PllInputSource,
        pll_b_source: PllInputSource,
    ) -> Result<(), Error> {
        let mut bits = PLLInputSourceBits::from_bits_truncate(clkin_divider.bits());
        for &(pll, source) in [(PLL::A, pll_a_source), (PLL::B, pll_b_source)].iter() {
            if source == PllInputSource::Clkin {
                bits |= pll.input_source_bits();
            }
        }
        write_register(&mut self.bus, Register::PLLInputSource, bits.bits())?;

        self.clkin_divider = clkin_divider;
        self.plls[PLL::A.ix()].commit_input_source(pll_a_source);
        self.plls[PLL::B.ix()].commit_input_source(pll_b_source);
        Ok(())
    }

    /// Sets the PLL as close as possible to `freq` and resets it.
    /// Returns the frequency the PLL actually runs at.
    fn setup_pll(&mut self, pll: PLL, freq: Frequency) -> Result<Frequency, Error> {
        let reference = self.reference_frequency();
        let multiplier = find_multiplier(reference, freq)?;

        let p = &mut self.plls[pll.ix()];
        p.set_multiplier(&mut self.bus, multiplier)?;
        p.reset(&mut self.bus)?;

        let pll_freq = multiplier.multiply(reference);
        debug!("PLL {:?} @ {} Hz ({:?})", pll, pll_freq, multiplier);
        Ok(pll_freq)
    }

    fn setup_pll_raw(&mut self, pll: PLL, a: u32, b: u32, c: u32) -> Result<Frequency, Error> {
        let multiplier = Ratio::new(a, b, c)?;

        let p = &mut self.plls[pll.ix()];
        p.set_multiplier(&mut self.bus, multiplier)?;
        p.reset(&mut self.bus)?;

        Ok(multiplier.multiply(self.reference_frequency()))
    }

    /// Powers the output up with the given control settings.
    fn setup_output_raw(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        invert: bool,
        input_source: ClockInputSource,
        drive: OutputDrive,
    ) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        let control = ClockControl {
            power_down: false,
            integer_mode: false,
            pll,
            invert,
            input_source,
            drive,
        };
        output.setup_control(bus, control)
    }

    fn set_power_down(&mut self, clk: ClockOutput, power_down: bool) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_power_down(bus, power_down)
    }

    fn set_integer_mode(&mut self, clk: ClockOutput, integer_mode: bool) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_integer_mode(bus, integer_mode)
    }

    fn select_clock_pll(&mut self, clk: ClockOutput, pll: PLL) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_pll(bus, pll)
    }

    fn set_invert(&mut self, clk: ClockOutput, invert: bool) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_invert(bus, invert)
    }

    fn set_input_source(
        &mut self,
        clk: ClockOutput,
        input_source: ClockInputSource,
    ) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_input_source(bus, input_source)
    }

    fn set_drive(&mut self, clk: ClockOutput, drive: OutputDrive) -> Result<(), Error> {
        let (bus, output) = self.output_mut(clk);
        output.set_drive(bus, drive)
    }

    /// Writes the disable state register shared by the output's group of four.
    fn set_disable_state(
        &mut self,
        clk: ClockOutput,
        state: OutputDisableState,
    ) -> Result<(), Error> {
        let (reg, _) = clk.disable_state_register();
        let mut value = 0u8;
        for &other in ClockOutput::ALL.iter() {
            let (other_reg, offset) = other.disable_state_register();
            if other_reg != reg {
                continue;
            }
            let other_state = if other == clk {
                state
            } else {
                self.output(other).disable_state()
            };
            value |= other_state.bits() << offset;
        }
        write_register(&mut self.bus, reg, value)?;

        let (_, output) = self.output_mut(clk);
        output.commit_disable_state(state);
        Ok(())
    }

    /// Sets the output as close as possible to `freq`, using the PLL the
    /// output is associated with. Returns the effective output frequency.
    fn set_output_frequency(
        &mut self,
        clk: ClockOutput,
        freq: Frequency,
    ) -> Result<Frequency, Error> {
        let ms = Multisynth::try_from(clk)?;
        let pll = self.outputs[ms.ix()].output().control().pll;
        if self.plls[pll.ix()].multiplier().is_zero() {
            return Err(Error::InvalidParameter);
        }

        let pll_freq = self.pll_frequency(pll);
        let divider = find_divider(pll_freq, freq)?;
        self.outputs[ms.ix()].setup_divider(&mut self.bus, divider)?;

        let out_freq = divider.divide(pll_freq);
        debug!("{:?} @ {} Hz ({:?})", clk, out_freq, divider);
        Ok(out_freq)
    }

    fn set_output_divider(
        &mut self,
        clk: ClockOutput,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<Frequency, Error> {
        self.setup_multisynth_raw(clk, a, b, c)?;
        Ok(self.output_frequency(clk))
    }

    /// Writes the divider of one of CLK0-CLK5 as given. The R divider stays at 1.
    fn setup_multisynth_raw(
        &mut self,
        clk: ClockOutput,
        a: u32,
        b: u32,
        c: u32,
    ) -> Result<(), Error> {
        let ms = Multisynth::try_from(clk)?;
        let divider = Ratio::new(a, b, c)?;
        self.outputs[ms.ix()].setup_divider(&mut self.bus, divider)
    }

    /// Writes the integer divider of CLK6 or CLK7 and its R divider.
    /// Returns the effective output frequency.
    fn setup_integer_output(
        &mut self,
        clk: ClockOutput,
        divider: u8,
        r_div: OutputDivider,
    ) -> Result<Frequency, Error> {
        let ms = SimpleMultisynth::try_from(clk)?;
        self.integer_outputs[ms.ix()].setup_divider(&mut self.bus, divider)?;

        let value = self.integer_outputs.iter().fold(0u8, |value, output| {
            let r = if output.multisynth() == ms {
                r_div
            } else {
                output.r_div()
            };
            value | output.r_div_bits(r)
        });
        write_register(&mut self.bus, Register::Clk6_7OutputDivider, value)?;
        self.integer_outputs[ms.ix()].commit_r_div(r_div);

        Ok(self.output_frequency(clk))
    }

    /// Write the 7bit phase register. The phase is in units of
    /// VCO/4 period.
    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error> {
        let ms = Multisynth::try_from(clk)?;
        self.outputs[ms.ix()].setup_phase_shift(&mut self.bus, phase)
    }

    /// Sets up `pll` and the two outputs to generate the closest possible value
    /// of `freq`, with `clk_q` lagging `clk_i` by 90°. The PLL is reset last so
    /// both dividers start in phase. Returns the effective PLL and output
    /// frequencies.
    fn setup_quadrature_output(
        &mut self,
        pll: PLL,
        clk_i: ClockOutput,
        clk_q: ClockOutput,
        freq: Frequency,
    ) -> Result<(Frequency, Frequency), Error> {
        let ms_i = Multisynth::try_from(clk_i)?;
        let ms_q = Multisynth::try_from(clk_q)?;
        if ms_i == ms_q {
            return Err(Error::InvalidParameter);
        }

        let reference = self.reference_frequency();
        let (multiplier, divider) = find_multiplier_with_integer_divider(reference, freq)?;
        let pll_freq = multiplier.multiply(reference);
        let out_freq = divider.divide(pll_freq);

        for &ms in [ms_i, ms_q].iter() {
            let output = self.outputs[ms.ix()].output_mut();
            let control = ClockControl {
                pll,
                integer_mode: divider.is_integer(),
                ..output.control()
            };
            output.setup_control(&mut self.bus, control)?;
        }

        self.plls[pll.ix()].set_multiplier(&mut self.bus, multiplier)?;
        self.outputs[ms_i.ix()].setup_divider(&mut self.bus, divider)?;
        self.outputs[ms_q.ix()].setup_divider(&mut self.bus, divider)?;

        let shift = (divider.a() & 0xff) as u8;
        self.outputs[ms_i.ix()].setup_phase_shift(&mut self.bus, 0)?;
        self.outputs[ms_q.ix()].setup_phase_shift(&mut self.bus, shift)?;

        self.plls[pll.ix()].reset(&mut self.bus)?;

        debug!(
            "quadrature {:?}/{:?} @ {} Hz, PLL {:?} @ {} Hz, divider {:?}",
            clk_i, clk_q, out_freq, pll, pll_freq, divider
        );
        Ok((pll_freq, out_freq))
    }

    fn pll_frequency(&self, pll: PLL) -> Frequency {
        self.plls[pll.ix()].frequency(self.reference_frequency())
    }

    /// The frequency the output's divider produces from its PLL.
    fn output_frequency(&self, clk: ClockOutput) -> Frequency {
        let pll_freq = self.pll_frequency(self.output(clk).control().pll);
        match Multisynth::try_from(clk) {
            Ok(ms) => self.outputs[ms.ix()].divider().divide(pll_freq),
            Err(_) => self.integer_outputs[clk.ix() - 6].ratio().divide(pll_freq),
        }
    }
}
