/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::registers::Register;
use crate::Error;
use log::{trace, warn};

/// I²C address of the Si5351 with the A0 pin low.
pub const ADDRESS: u8 = 0b0110_0000;

/// Largest block the driver ever writes in one transfer.
const MAX_WRITE_LEN: usize = 8;

/// Register level access to the Si5351.
///
/// Errors are sticky: once a transfer failed, `error` keeps reporting it and
/// the driver stops issuing transfers.
pub trait RegisterBus {
    /// Reads `buffer.len()` consecutive registers starting at `reg`.
    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Error>;
    /// Writes `values` to consecutive registers starting at `reg`.
    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Error>;
    /// The latched error, if any transfer failed so far.
    fn error(&self) -> Option<Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Error> {
        (**self).read_registers(reg, buffer)
    }

    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Error> {
        (**self).write_registers(reg, values)
    }

    fn error(&self) -> Option<Error> {
        (**self).error()
    }
}

pub(crate) fn write_register<B: RegisterBus + ?Sized>(
    bus: &mut B,
    reg: Register,
    byte: u8,
) -> Result<(), Error> {
    write_registers(bus, reg, &[byte])
}

/// Writes a register block unless the bus already latched an error.
pub(crate) fn write_registers<B: RegisterBus + ?Sized>(
    bus: &mut B,
    reg: Register,
    values: &[u8],
) -> Result<(), Error> {
    if let Some(err) = bus.error() {
        return Err(err);
    }
    bus.write_registers(reg.addr(), values)
}

pub(crate) fn read_registers<B: RegisterBus + ?Sized>(
    bus: &mut B,
    reg: Register,
    buffer: &mut [u8],
) -> Result<(), Error> {
    if let Some(err) = bus.error() {
        return Err(err);
    }
    bus.read_registers(reg.addr(), buffer)
}

/// [`RegisterBus`] over a blocking `embedded_hal` I²C peripheral.
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
    debug: bool,
    error: Option<Error>,
}

impl<I2C> I2cBus<I2C> {
    /// Creates a bus for the chip at 0x60, or 0x61 with `address_bit` set.
    pub fn new(i2c: I2C, address_bit: bool) -> Self {
        I2cBus {
            i2c,
            address: ADDRESS | if address_bit { 1 } else { 0 },
            debug: false,
            error: None,
        }
    }

    /// Traces every transfer at `trace` level.
    pub fn with_debug(self, debug: bool) -> Self {
        I2cBus { debug, ..self }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives the peripheral back, dropping any latched error.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn latch<E>(&mut self, _: E) -> Error {
        if self.error.is_none() {
            warn!("si5351 at {:#04x}: I2C transfer failed", self.address);
        }
        self.error = Some(Error::CommunicationError);
        Error::CommunicationError
    }
}

impl<I2C, E> RegisterBus for I2cBus<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let result = self.i2c.write_read(self.address, &[reg], buffer);
        result.map_err(|e| self.latch(e))?;
        if self.debug {
            trace!("si5351 read {:#04x}: {:02x?}", reg, buffer);
        }
        Ok(())
    }

    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if values.len() > MAX_WRITE_LEN {
            return Err(Error::InvalidParameter);
        }

        let mut buffer = [0u8; MAX_WRITE_LEN + 1];
        buffer[0] = reg;
        buffer[1..=values.len()].copy_from_slice(values);
        if self.debug {
            trace!("si5351 write {:#04x}: {:02x?}", reg, values);
        }
        let result = self.i2c.write(self.address, &buffer[..=values.len()]);
        result.map_err(|e| self.latch(e))
    }

    fn error(&self) -> Option<Error> {
        self.error
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::RegisterBus;
    use crate::Error;

    /// Register file with a write log; fails every transfer after `fail_after` writes.
    pub(crate) struct MockBus {
        pub registers: [u8; 256],
        pub writes: Vec<(u8, Vec<u8>)>,
        pub fail_after: Option<usize>,
        pub error: Option<Error>,
    }

    impl MockBus {
        pub fn new() -> Self {
            MockBus {
                registers: [0; 256],
                writes: Vec::new(),
                fail_after: None,
                error: None,
            }
        }

        pub fn failing_after(writes: usize) -> Self {
            MockBus {
                fail_after: Some(writes),
                ..MockBus::new()
            }
        }

        pub fn register(&self, reg: u8) -> u8 {
            self.registers[reg as usize]
        }

        pub fn block(&self, reg: u8) -> [u8; 8] {
            let mut block = [0; 8];
            block.copy_from_slice(&self.registers[reg as usize..reg as usize + 8]);
            block
        }

        pub fn written_registers(&self) -> Vec<u8> {
            self.writes.iter().map(|(reg, _)| *reg).collect()
        }
    }

    impl RegisterBus for MockBus {
        fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Error> {
            if let Some(err) = self.error {
                return Err(err);
            }
            let start = reg as usize;
            buffer.copy_from_slice(&self.registers[start..start + buffer.len()]);
            Ok(())
        }

        fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Error> {
            if let Some(err) = self.error {
                return Err(err);
            }
            if self.fail_after == Some(self.writes.len()) {
                self.error = Some(Error::CommunicationError);
                return Err(Error::CommunicationError);
            }
            let start = reg as usize;
            self.registers[start..start + values.len()].copy_from_slice(values);
            self.writes.push((reg, values.to_vec()));
            Ok(())
        }

        fn error(&self) -> Option<Error> {
            self.error
        }
    }
}
