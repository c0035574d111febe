/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Register map of the Si5351 and the register groups of its PLLs and outputs.

use crate::Error;
use core::convert::TryFrom;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PLL {
    A,
    B,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeedbackMultisynth {
    MSNA,
    MSNB,
}

/// The fractional output Multisynths, one per CLK0-CLK5.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Multisynth {
    MS0,
    MS1,
    MS2,
    MS3,
    MS4,
    MS5,
}

/// The integer-only output Multisynths of CLK6 and CLK7.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimpleMultisynth {
    MS6,
    MS7,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
    Clk3,
    Clk4,
    Clk5,
    Clk6,
    Clk7,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    DeviceStatus = 0,
    OutputEnable = 3,
    PLLInputSource = 15,
    Clk0 = 16,
    Clk1 = 17,
    Clk2 = 18,
    Clk3 = 19,
    Clk4 = 20,
    Clk5 = 21,
    Clk6 = 22,
    Clk7 = 23,
    Clk3_0DisableState = 24,
    Clk7_4DisableState = 25,
    MSNAParameters = 26,
    MSNBParameters = 34,
    MS0Parameters = 42,
    MS1Parameters = 50,
    MS2Parameters = 58,
    MS3Parameters = 66,
    MS4Parameters = 74,
    MS5Parameters = 82,
    MS6Parameters = 90,
    MS7Parameters = 91,
    Clk6_7OutputDivider = 92,
    Clk0PhaseOffset = 165,
    Clk1PhaseOffset = 166,
    Clk2PhaseOffset = 167,
    Clk3PhaseOffset = 168,
    Clk4PhaseOffset = 169,
    Clk5PhaseOffset = 170,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

/// Control registers of all eight outputs, in output order.
pub(crate) const CLK_REGS: [Register; 8] = [
    Register::Clk0,
    Register::Clk1,
    Register::Clk2,
    Register::Clk3,
    Register::Clk4,
    Register::Clk5,
    Register::Clk6,
    Register::Clk7,
];

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
    }
}

bitflags! {
    pub(crate) struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_MASK = 0b11_000000;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub(crate) struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MASK = 0b0000_1100;
        const CLK_SRC_XTAL = 0b0000_0000;
        const CLK_SRC_CLKIN = 0b0000_0100;
        const CLK_SRC_MS_ALT = 0b0000_1000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    pub(crate) struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

bitflags! {
    pub(crate) struct PLLInputSourceBits: u8 {
        const CLKIN_DIV_MASK = 0b1100_0000;
        const PLLB_SRC = 0b0000_1000;
        const PLLA_SRC = 0b0000_0100;
    }
}

/// Value of the output enable register that disables every output.
pub(crate) const ALL_OUTPUTS_DISABLED: u8 = 0xff;

impl PLL {
    pub fn multisynth(&self) -> FeedbackMultisynth {
        match *self {
            PLL::A => FeedbackMultisynth::MSNA,
            PLL::B => FeedbackMultisynth::MSNB,
        }
    }

    pub(crate) fn ix(&self) -> usize {
        match *self {
            PLL::A => 0,
            PLL::B => 1,
        }
    }

    pub(crate) fn reset_bits(&self) -> PLLResetBits {
        match *self {
            PLL::A => PLLResetBits::PLLA_RST,
            PLL::B => PLLResetBits::PLLB_RST,
        }
    }

    pub(crate) fn input_source_bits(&self) -> PLLInputSourceBits {
        match *self {
            PLL::A => PLLInputSourceBits::PLLA_SRC,
            PLL::B => PLLInputSourceBits::PLLB_SRC,
        }
    }
}

impl FeedbackMultisynth {
    pub fn parameters_register(&self) -> Register {
        match *self {
            FeedbackMultisynth::MSNA => Register::MSNAParameters,
            FeedbackMultisynth::MSNB => Register::MSNBParameters,
        }
    }
}

impl Multisynth {
    pub fn parameters_register(&self) -> Register {
        match *self {
            Multisynth::MS0 => Register::MS0Parameters,
            Multisynth::MS1 => Register::MS1Parameters,
            Multisynth::MS2 => Register::MS2Parameters,
            Multisynth::MS3 => Register::MS3Parameters,
            Multisynth::MS4 => Register::MS4Parameters,
            Multisynth::MS5 => Register::MS5Parameters,
        }
    }

    pub fn phase_register(&self) -> Register {
        match *self {
            Multisynth::MS0 => Register::Clk0PhaseOffset,
            Multisynth::MS1 => Register::Clk1PhaseOffset,
            Multisynth::MS2 => Register::Clk2PhaseOffset,
            Multisynth::MS3 => Register::Clk3PhaseOffset,
            Multisynth::MS4 => Register::Clk4PhaseOffset,
            Multisynth::MS5 => Register::Clk5PhaseOffset,
        }
    }

    pub fn clock_output(&self) -> ClockOutput {
        match *self {
            Multisynth::MS0 => ClockOutput::Clk0,
            Multisynth::MS1 => ClockOutput::Clk1,
            Multisynth::MS2 => ClockOutput::Clk2,
            Multisynth::MS3 => ClockOutput::Clk3,
            Multisynth::MS4 => ClockOutput::Clk4,
            Multisynth::MS5 => ClockOutput::Clk5,
        }
    }

    pub(crate) fn ix(&self) -> usize {
        self.clock_output().ix()
    }
}

impl SimpleMultisynth {
    pub fn parameters_register(&self) -> Register {
        match *self {
            SimpleMultisynth::MS6 => Register::MS6Parameters,
            SimpleMultisynth::MS7 => Register::MS7Parameters,
        }
    }

    /// Bit offset of this output's R divider in the shared CLK6/CLK7 divider register.
    pub(crate) fn r_div_offset(&self) -> u8 {
        match *self {
            SimpleMultisynth::MS6 => 0,
            SimpleMultisynth::MS7 => 4,
        }
    }

    pub fn clock_output(&self) -> ClockOutput {
        match *self {
            SimpleMultisynth::MS6 => ClockOutput::Clk6,
            SimpleMultisynth::MS7 => ClockOutput::Clk7,
        }
    }

    pub(crate) fn ix(&self) -> usize {
        match *self {
            SimpleMultisynth::MS6 => 0,
            SimpleMultisynth::MS7 => 1,
        }
    }
}

impl ClockOutput {
    pub(crate) const ALL: [ClockOutput; 8] = [
        ClockOutput::Clk0,
        ClockOutput::Clk1,
        ClockOutput::Clk2,
        ClockOutput::Clk3,
        ClockOutput::Clk4,
        ClockOutput::Clk5,
        ClockOutput::Clk6,
        ClockOutput::Clk7,
    ];

    pub fn register(self) -> Register {
        CLK_REGS[self.ix()]
    }

    pub(crate) fn ix(&self) -> usize {
        *self as usize
    }

    /// The shared disable state register and this output's bit offset in it.
    pub(crate) fn disable_state_register(&self) -> (Register, u8) {
        let ix = self.ix() as u8;
        if ix < 4 {
            (Register::Clk3_0DisableState, ix * 2)
        } else {
            (Register::Clk7_4DisableState, (ix - 4) * 2)
        }
    }
}

impl TryFrom<ClockOutput> for Multisynth {
    type Error = Error;

    fn try_from(clk: ClockOutput) -> Result<Self, Error> {
        match clk {
            ClockOutput::Clk0 => Ok(Multisynth::MS0),
            ClockOutput::Clk1 => Ok(Multisynth::MS1),
            ClockOutput::Clk2 => Ok(Multisynth::MS2),
            ClockOutput::Clk3 => Ok(Multisynth::MS3),
            ClockOutput::Clk4 => Ok(Multisynth::MS4),
            ClockOutput::Clk5 => Ok(Multisynth::MS5),
            _ => Err(Error::OutOfRange),
        }
    }
}

impl TryFrom<ClockOutput> for SimpleMultisynth {
    type Error = Error;

    fn try_from(clk: ClockOutput) -> Result<Self, Error> {
        match clk {
            ClockOutput::Clk6 => Ok(SimpleMultisynth::MS6),
            ClockOutput::Clk7 => Ok(SimpleMultisynth::MS7),
            _ => Err(Error::OutOfRange),
        }
    }
}
