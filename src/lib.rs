/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic Rust driver for the [Si5351] that computes the PLL and
Multisynth parameters for a requested frequency, based on the
[`embedded-hal`] traits.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator: two
fractional PLLs (A and B) multiply a crystal reference up to 600-900 MHz, and
eight output Multisynths divide one of them down again. CLK0-CLK5 have
fractional dividers and a phase offset register, CLK6 and CLK7 only have an
8-bit integer divider.

The device has an I²C interface. The synthesis code talks to it through the
[`RegisterBus`] trait; [`I2cBus`] implements it on top of an `embedded_hal`
blocking I²C peripheral.

## Usage

Wrap the I²C peripheral and instantiate the device:

```no_run
use si5351_synth::{CrystalLoad, I2cBus, Si5351Device, CRYSTAL_25MHZ};
# use embedded_hal::blocking::i2c::{Write, WriteRead};
# struct I2c;
# impl Write for I2c {
#     type Error = ();
#     fn write(&mut self, _: u8, _: &[u8]) -> Result<(), ()> { Ok(()) }
# }
# impl WriteRead for I2c {
#     type Error = ();
#     fn write_read(&mut self, _: u8, _: &[u8], _: &mut [u8]) -> Result<(), ()> { Ok(()) }
# }
# let i2c = I2c;

let bus = I2cBus::new(i2c, false);
let clock = Si5351Device::new(bus, CRYSTAL_25MHZ.with_load(CrystalLoad::_10));
```

Every configuration session is framed by `start_setup` and `finish_setup`:

```no_run
use si5351_synth::{ClockOutput, PLL, Si5351};
# use si5351_synth::{I2cBus, Si5351Device, CRYSTAL_25MHZ};
# use embedded_hal::blocking::i2c::{Write, WriteRead};
# struct I2c;
# impl Write for I2c {
#     type Error = ();
#     fn write(&mut self, _: u8, _: &[u8]) -> Result<(), ()> { Ok(()) }
# }
# impl WriteRead for I2c {
#     type Error = ();
#     fn write_read(&mut self, _: u8, _: &[u8], _: &mut [u8]) -> Result<(), ()> { Ok(()) }
# }
# fn main() -> Result<(), si5351_synth::Error> {
# let mut clock = Si5351Device::new(I2cBus::new(I2c, false), CRYSTAL_25MHZ);

clock.start_setup()?;
let pll_freq = clock.setup_pll(PLL::A, 900_000_000)?;
let out_freq = clock.set_output_frequency(ClockOutput::Clk0, 10_000_000)?;
clock.finish_setup()?;
# Ok(())
# }
```

Or generate a quadrature (90° phase shifted) pair on two outputs:

```no_run
use si5351_synth::{ClockOutput, PLL, Si5351};
# use si5351_synth::{I2cBus, Si5351Device, CRYSTAL_25MHZ};
# use embedded_hal::blocking::i2c::{Write, WriteRead};
# struct I2c;
# impl Write for I2c {
#     type Error = ();
#     fn write(&mut self, _: u8, _: &[u8]) -> Result<(), ()> { Ok(()) }
# }
# impl WriteRead for I2c {
#     type Error = ();
#     fn write_read(&mut self, _: u8, _: &[u8], _: &mut [u8]) -> Result<(), ()> { Ok(()) }
# }
# fn main() -> Result<(), si5351_synth::Error> {
# let mut clock = Si5351Device::new(I2cBus::new(I2c, false), CRYSTAL_25MHZ);

clock.start_setup()?;
let (pll_freq, out_freq) =
    clock.setup_quadrature_output(PLL::B, ClockOutput::Clk0, ClockOutput::Clk1, 7_074_000)?;
clock.finish_setup()?;
# Ok(())
# }
```

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/japaric/embedded-hal
*/
#![deny(warnings)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

mod bus;
mod device;
mod output;
mod pll;
mod ratio;
mod registers;
pub mod search;

use core::fmt;

pub use crate::bus::{I2cBus, RegisterBus, ADDRESS};
pub use crate::device::{
    ClkinDivider, Crystal, CrystalLoad, SessionState, Si5351, Si5351Device, CRYSTAL_25MHZ,
    CRYSTAL_27MHZ,
};
pub use crate::output::{
    ClockControl, ClockInputSource, FractionalOutput, IntegerOutput, Output, OutputDisableState,
    OutputDrive,
};
pub use crate::pll::{Pll, PllInputSource, PllState};
pub use crate::ratio::{OutputDivider, Ratio, RegisterParameters};
pub use crate::registers::{
    ClockOutput, DeviceStatusBits, FeedbackMultisynth, Multisynth, Register, SimpleMultisynth,
    PLL,
};

/// Frequency in Hz.
pub type Frequency = u32;

/// One kHz in [`Frequency`] units.
pub const KHZ: Frequency = 1_000;
/// One MHz in [`Frequency`] units.
pub const MHZ: Frequency = 1_000_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The register bus failed. Latched by the bus until it is replaced.
    CommunicationError,
    /// A fractional-only operation was addressed to CLK6 or CLK7.
    OutOfRange,
    /// Ratio components or frequencies outside what the chip accepts.
    InvalidParameter,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::CommunicationError => f.write_str("register bus communication failed"),
            Error::OutOfRange => f.write_str("only CLK0-CLK5 have fractional dividers"),
            Error::InvalidParameter => f.write_str("invalid parameter"),
        }
    }
}
