/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::{Error, Frequency};
use core::convert::TryFrom;

/// Largest numerator or denominator the 20-bit P2/P3 fields can hold.
pub const MAX_DENOMINATOR: u32 = 0xfffff;

/// Largest integer part whose P1 still fits the 18-bit field with any fraction.
pub const MAX_INTEGER: u32 = 2051;

const MAX_P1: u32 = 0x3ffff;

/// The power-of-two R divider that follows a Multisynth.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl Default for OutputDivider {
    fn default() -> Self {
        OutputDivider::Div1
    }
}

impl OutputDivider {
    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn from_bits(bits: u8) -> OutputDivider {
        match bits & 0x07 {
            0 => OutputDivider::Div1,
            1 => OutputDivider::Div2,
            2 => OutputDivider::Div4,
            3 => OutputDivider::Div8,
            4 => OutputDivider::Div16,
            5 => OutputDivider::Div32,
            6 => OutputDivider::Div64,
            _ => OutputDivider::Div128,
        }
    }

    /// The next larger divider, `None` after `Div128`.
    pub fn next(&self) -> Option<OutputDivider> {
        match *self {
            OutputDivider::Div128 => None,
            other => Some(OutputDivider::from_bits(other.bits() + 1)),
        }
    }

    pub fn denominator(&self) -> u32 {
        1 << self.bits()
    }
}

/// A fractional ratio `a + b/c` followed by a power-of-two R divider.
///
/// Used as the feedback multiplier of a PLL and as the divider of an output
/// Multisynth. A denominator of zero marks an integer-only ratio, its
/// numerator is ignored. Ratios are values: every setter returns a new one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Ratio {
    a: u32,
    b: u32,
    c: u32,
    divider: OutputDivider,
    by4: bool,
}

/// The P1/P2/P3 parameters of a ratio as the chip stores them, together with
/// the R divider and divide-by-4 flag of the same register block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterParameters {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
    pub divider: OutputDivider,
    pub by4: bool,
}

impl Ratio {
    /// Creates `a + b/c`, rejecting fractions the registers cannot represent.
    pub fn new(a: u32, b: u32, c: u32) -> Result<Ratio, Error> {
        if a > MAX_INTEGER || c > MAX_DENOMINATOR || (c != 0 && b >= c) {
            return Err(Error::InvalidParameter);
        }
        Ok(Ratio {
            a,
            b: if c == 0 { 0 } else { b },
            c,
            ..Ratio::default()
        })
    }

    /// Creates a pure integer ratio, encoded with the P3 = 1 sentinel.
    ///
    /// `a` is not checked; above `MAX_INTEGER` the encoded P1 saturates.
    pub fn integer(a: u32) -> Ratio {
        Ratio {
            a,
            b: 0,
            c: 1,
            ..Ratio::default()
        }
    }

    pub fn with_divider(self, divider: OutputDivider) -> Ratio {
        Ratio { divider, ..self }
    }

    /// Selects the Multisynth divide-by-4 path used above 150 MHz.
    pub fn with_by4(self, by4: bool) -> Ratio {
        Ratio { by4, ..self }
    }

    pub fn a(&self) -> u32 {
        self.a
    }

    pub fn b(&self) -> u32 {
        if self.c == 0 {
            0
        } else {
            self.b
        }
    }

    pub fn c(&self) -> u32 {
        self.c
    }

    pub fn divider(&self) -> OutputDivider {
        self.divider
    }

    pub fn by4(&self) -> bool {
        self.by4
    }

    pub fn is_zero(&self) -> bool {
        self.a == 0 && self.b() == 0
    }

    /// `a + b/c` as the fraction `num / den`.
    fn fraction(&self) -> (u64, u64) {
        if self.c == 0 {
            (self.a as u64, 1)
        } else {
            (
                self.a as u64 * self.c as u64 + self.b as u64,
                self.c as u64,
            )
        }
    }

    /// `base * (a + b/c)`, rounded to the nearest Hz.
    pub fn multiply(&self, base: Frequency) -> Frequency {
        let (num, den) = self.fraction();
        saturate(div_round(base as u128 * num as u128, den as u128))
    }

    /// `base / ((a + b/c) * r)`, rounded to the nearest Hz. A zero ratio yields 0.
    pub fn divide(&self, base: Frequency) -> Frequency {
        let (num, den) = self.fraction();
        let total = num as u128 * self.divider.denominator() as u128;
        if total == 0 {
            return 0;
        }
        saturate(div_round(base as u128 * den as u128, total))
    }

    /// Whether the Multisynth may run in integer mode: even `a`, no fraction.
    pub fn is_integer(&self) -> bool {
        self.a % 2 == 0 && self.b() == 0
    }

    /// Computes P1, P2 and P3.
    ///
    /// ```text
    /// f  = floor(128 * b / c)
    /// P1 = 128 * a + f - 512
    /// P2 = 128 * b - c * f
    /// P3 = c
    /// ```
    ///
    /// An integer-only ratio uses `f = 0` and `P3 = 1`.
    pub fn encode(&self) -> (u32, u32, u32) {
        let (fraction, p3) = if self.c == 0 {
            (0, 1)
        } else {
            (128 * self.b / self.c, self.c)
        };
        let p1 = (128u32.saturating_mul(self.a) + fraction)
            .saturating_sub(512)
            .min(MAX_P1);
        let p2 = 128 * self.b() - self.c * fraction;
        (p1, p2, p3)
    }

    /// The 8-byte register image, starting at the block's base register.
    pub fn to_register_bytes(&self) -> [u8; 8] {
        let (p1, p2, p3) = self.encode();
        let mut bytes = [
            ((p3 & 0x0000_ff00) >> 8) as u8,
            p3 as u8,
            ((p1 & 0x0003_0000) >> 16) as u8 | (self.divider.bits() << 4),
            ((p1 & 0x0000_ff00) >> 8) as u8,
            p1 as u8,
            (((p3 & 0x000f_0000) >> 12) | ((p2 & 0x000f_0000) >> 16)) as u8,
            ((p2 & 0x0000_ff00) >> 8) as u8,
            p2 as u8,
        ];
        if self.by4 {
            bytes[2] |= 0x0c;
        }
        bytes
    }
}

impl RegisterParameters {
    /// Unpacks an 8-byte register image.
    pub fn from_register_bytes(bytes: &[u8; 8]) -> RegisterParameters {
        let p3 = ((bytes[5] as u32 & 0xf0) << 12) | ((bytes[0] as u32) << 8) | bytes[1] as u32;
        let p1 = ((bytes[2] as u32 & 0x03) << 16) | ((bytes[3] as u32) << 8) | bytes[4] as u32;
        let p2 = ((bytes[5] as u32 & 0x0f) << 16) | ((bytes[6] as u32) << 8) | bytes[7] as u32;
        RegisterParameters {
            p1,
            p2,
            p3,
            divider: OutputDivider::from_bits(bytes[2] >> 4),
            by4: bytes[2] & 0x0c == 0x0c,
        }
    }
}

impl From<Ratio> for RegisterParameters {
    fn from(ratio: Ratio) -> Self {
        let (p1, p2, p3) = ratio.encode();
        RegisterParameters {
            p1,
            p2,
            p3,
            divider: ratio.divider,
            by4: ratio.by4,
        }
    }
}

fn div_round(num: u128, den: u128) -> u128 {
    (num + den / 2) / den
}

fn saturate(value: u128) -> Frequency {
    Frequency::try_from(value).unwrap_or(Frequency::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by4_forces_bits_of_third_byte() {
        let ratio = Ratio::default().with_by4(true);
        assert_eq!(ratio.to_register_bytes()[2] & 0x0c, 0x0c);

        let ratio = ratio.with_by4(false);
        assert_eq!(ratio.to_register_bytes()[2] & 0x0c, 0);
    }

    #[test]
    fn by4_leaves_output_divider_bits_alone() {
        let ratio = Ratio::integer(4)
            .with_divider(OutputDivider::Div128)
            .with_by4(true);
        let bytes = ratio.to_register_bytes();
        assert_eq!(bytes[2] & 0x70, 0x70);
        assert_eq!(bytes[2] & 0x0c, 0x0c);
    }

    #[test]
    fn output_divider_sets_bits_4_to_6_of_third_byte() {
        let ratio = Ratio::default().with_divider(OutputDivider::Div16);
        assert_eq!(ratio.to_register_bytes()[2] & 0x70, 0x40);

        let ratio = Ratio::new(1800, 0xffffe, 0xfffff)
            .unwrap()
            .with_divider(OutputDivider::Div2);
        assert_eq!(ratio.to_register_bytes()[2] & 0x70, 0x10);
    }

    #[test]
    fn encode_matches_closed_form() {
        let cases = [
            (36, 0, 1),
            (35, 1, 3),
            (15, 524_287, 1_048_575),
            (90, 0, 0),
            (1800, 99_999, 100_003),
            (6, 1, 2),
        ];
        for &(a, b, c) in cases.iter() {
            let ratio = Ratio::new(a, b, c).unwrap();
            let (p1, p2, p3) = ratio.encode();
            let f = if c == 0 { 0 } else { 128 * b / c };
            let b = if c == 0 { 0 } else { b };
            assert_eq!(p1, 128 * a + f - 512);
            assert_eq!(p2, 128 * b - c * f);
            assert_eq!(p3, if c == 0 { 1 } else { c });
        }
    }

    #[test]
    fn register_image_unpacks_to_encoded_parameters() {
        let cases = [
            (4, 0, 1),
            (6, 1, 2),
            (15, 0, 1),
            (35, 654_321, 1_048_575),
            (36, 1, 3),
            (90, 0, 0),
            (126, 0xffffe, 0xfffff),
            (1800, 99_999, 100_003),
            (MAX_INTEGER, 0xffffe, 0xfffff),
            (MAX_INTEGER, 0, 1),
        ];
        let mut divider = Some(OutputDivider::Div1);
        while let Some(r) = divider {
            for &(a, b, c) in cases.iter() {
                let ratio = Ratio::new(a, b, c).unwrap().with_divider(r);
                let params = RegisterParameters::from_register_bytes(&ratio.to_register_bytes());
                assert_eq!(params, RegisterParameters::from(ratio), "{:?}", ratio);
                assert_eq!(params.divider, r);
                assert!(!params.by4);
            }
            divider = r.next();
        }

        let ratio = Ratio::integer(4).with_by4(true);
        let params = RegisterParameters::from_register_bytes(&ratio.to_register_bytes());
        assert_eq!(params, RegisterParameters::from(ratio));
        assert!(params.by4);
    }

    #[test]
    fn integer_ratio_uses_p3_sentinel() {
        assert_eq!(Ratio::integer(36).encode(), (128 * 36 - 512, 0, 1));
        assert_eq!(Ratio::new(36, 7, 0).unwrap().encode(), (128 * 36 - 512, 0, 1));
    }

    #[test]
    fn new_rejects_malformed_fractions() {
        assert_eq!(Ratio::new(20, 5, 5), Err(Error::InvalidParameter));
        assert_eq!(Ratio::new(20, 1, 0x100000), Err(Error::InvalidParameter));
        assert!(Ratio::new(20, 4, 5).is_ok());
        assert_eq!(Ratio::new(20, 9, 0).unwrap().b(), 0);
    }

    #[test]
    fn new_rejects_integer_part_beyond_p1_field() {
        assert_eq!(Ratio::new(40_000_000, 0, 0), Err(Error::InvalidParameter));
        assert_eq!(Ratio::new(MAX_INTEGER + 1, 0, 1), Err(Error::InvalidParameter));

        let ratio = Ratio::new(MAX_INTEGER, 0xffffe, 0xfffff).unwrap();
        let (p1, _, _) = ratio.encode();
        assert!(p1 <= MAX_P1);
        assert_eq!(p1, 128 * MAX_INTEGER + 127 - 512);
    }

    #[test]
    fn unchecked_integer_ratio_saturates_p1() {
        assert_eq!(Ratio::integer(40_000_000).encode(), (MAX_P1, 0, 1));
        let params = RegisterParameters::from_register_bytes(
            &Ratio::integer(40_000_000).to_register_bytes(),
        );
        assert_eq!(params.p1, MAX_P1);
    }

    #[test]
    fn multiply_and_divide_round_to_nearest() {
        let ratio = Ratio::new(36, 1, 3).unwrap();
        assert_eq!(ratio.multiply(25_000_000), 908_333_333);
        assert_eq!(ratio.divide(908_333_333), 25_000_000);

        let ratio = Ratio::new(2, 2, 3).unwrap();
        assert_eq!(ratio.multiply(1), 3);
    }

    #[test]
    fn divide_applies_output_divider() {
        let ratio = Ratio::integer(90).with_divider(OutputDivider::Div4);
        assert_eq!(ratio.divide(900_000_000), 2_500_000);
        let ratio = Ratio::new(90, 0, 0).unwrap().with_divider(OutputDivider::Div2);
        assert_eq!(ratio.divide(900_000_000), 5_000_000);
    }

    #[test]
    fn zero_ratio_divides_to_zero() {
        assert_eq!(Ratio::default().divide(900_000_000), 0);
        assert_eq!(Ratio::default().multiply(25_000_000), 0);
        assert!(Ratio::default().is_zero());
    }

    #[test]
    fn integer_mode_requires_even_integer() {
        assert!(Ratio::integer(36).is_integer());
        assert!(!Ratio::integer(35).is_integer());
        assert!(!Ratio::new(36, 1, 2).unwrap().is_integer());
    }

    #[test]
    fn output_divider_steps() {
        assert_eq!(OutputDivider::Div1.next(), Some(OutputDivider::Div2));
        assert_eq!(OutputDivider::Div64.next(), Some(OutputDivider::Div128));
        assert_eq!(OutputDivider::Div128.next(), None);
        assert_eq!(OutputDivider::Div32.denominator(), 32);
    }
}
