/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Selection of PLL multipliers and Multisynth dividers for a target frequency.
//!
//! All searches are single pass. The fraction `b/c` is the exact remainder
//! whenever it reduces to a denominator that fits the 20-bit registers, and
//! the remainder rounded to [`DENOMINATOR`] otherwise.

use crate::ratio::{OutputDivider, Ratio, MAX_DENOMINATOR};
use crate::{Error, Frequency, MHZ};

/// Denominator used when the exact fraction does not fit the registers.
pub const DENOMINATOR: u32 = 1_048_575;

pub const MIN_PLL_MULTIPLIER: u32 = 15;
pub const MAX_PLL_MULTIPLIER: u32 = 90;

pub const MIN_MS_DIVIDER: u32 = 6;
pub const MAX_MS_DIVIDER: u32 = 1800;

/// Largest Multisynth divider whose 90° phase offset fits the 7-bit register.
pub const MAX_QUADRATURE_DIVIDER: u32 = 126;

pub const MIN_PLL_FREQUENCY: Frequency = 600 * MHZ;
pub const MAX_PLL_FREQUENCY: Frequency = 900 * MHZ;

/// Highest output frequency reachable with a fractional Multisynth.
pub const MAX_FRACTIONAL_OUTPUT_FREQUENCY: Frequency = 150 * MHZ;
/// Highest output frequency, reachable through the divide-by-4 path only.
pub const MAX_OUTPUT_FREQUENCY: Frequency = 200 * MHZ;

/// Lowest quadrature frequency, where the PLL start point needs the divider
/// 126 behind the largest R divider.
pub const MIN_QUADRATURE_FREQUENCY: Frequency = 37_207;

/// Finds the PLL feedback ratio that multiplies `reference` closest to `target`.
///
/// The integer part is clamped to 15..=90; a clamped result is the bound itself.
pub fn find_multiplier(reference: Frequency, target: Frequency) -> Result<Ratio, Error> {
    find_ratio(target, reference, MIN_PLL_MULTIPLIER, MAX_PLL_MULTIPLIER)
}

/// Finds the Multisynth ratio that divides `pll_frequency` closest to `target`.
///
/// The integer part is clamped to 6..=1800; a clamped result is the bound itself.
pub fn find_divider(pll_frequency: Frequency, target: Frequency) -> Result<Ratio, Error> {
    find_ratio(pll_frequency, target, MIN_MS_DIVIDER, MAX_MS_DIVIDER)
}

/// Finds a PLL multiplier together with an even integer Multisynth divider.
///
/// The divider is chosen first, as a phase offset is only meaningful with an
/// integer divider: the PLL is aimed at a point of the 600-900 MHz band that
/// grows with `target`, the divider is the smallest even integer reaching it,
/// and the R divider advances until that divider fits into 126. The PLL then
/// gets the fractional ratio for exactly `target` times the total divider.
///
/// Targets between 150 and 200 MHz use the divide-by-4 path instead. Targets
/// outside [`MIN_QUADRATURE_FREQUENCY`]..=[`MAX_OUTPUT_FREQUENCY`] are rejected.
///
/// The quarter-integer flag is only set together with the divide-by-4
/// Multisynth (`a == 4`), never for an R divider of 4.
pub fn find_multiplier_with_integer_divider(
    reference: Frequency,
    target: Frequency,
) -> Result<(Ratio, Ratio), Error> {
    if reference == 0 || target < MIN_QUADRATURE_FREQUENCY || target > MAX_OUTPUT_FREQUENCY {
        return Err(Error::InvalidParameter);
    }

    if target > MAX_FRACTIONAL_OUTPUT_FREQUENCY {
        let multiplier = find_multiplier(reference, target * 4)?;
        return Ok((multiplier, Ratio::integer(4).with_by4(true)));
    }

    let target64 = target as u64;
    let band = (MAX_PLL_FREQUENCY - MIN_PLL_FREQUENCY) as u64;
    let start =
        MIN_PLL_FREQUENCY as u64 + band * target64 / MAX_FRACTIONAL_OUTPUT_FREQUENCY as u64;

    let mut r_div = OutputDivider::Div1;
    let div = loop {
        let step = target64 * r_div.denominator() as u64;
        let mut div = round_up_even(((start + step - 1) / step) as u32).max(MIN_MS_DIVIDER);
        // near 150 MHz the next even divider may overshoot the band, the one below still lands in it
        if r_div == OutputDivider::Div1
            && step * div as u64 > MAX_PLL_FREQUENCY as u64
            && div > MIN_MS_DIVIDER
        {
            div -= 2;
        }
        if div <= MAX_QUADRATURE_DIVIDER {
            break div;
        }
        r_div = r_div.next().ok_or(Error::InvalidParameter)?;
    };

    let pll_frequency = target64 * div as u64 * r_div.denominator() as u64;
    let multiplier = find_multiplier(reference, pll_frequency as Frequency)?;
    let divider = Ratio::integer(div).with_divider(r_div);

    Ok((multiplier, divider))
}

/// `numerator / denominator` as `a + b/c` with `a` clamped to `min..=max`.
fn find_ratio(
    numerator: Frequency,
    denominator: Frequency,
    min: u32,
    max: u32,
) -> Result<Ratio, Error> {
    if numerator == 0 || denominator == 0 {
        return Err(Error::InvalidParameter);
    }

    let a = numerator / denominator;
    if a < min {
        return Ok(Ratio::integer(min));
    }
    if a >= max {
        return Ok(Ratio::integer(max));
    }

    let (b, c) = fraction(numerator % denominator, denominator);
    if b == c {
        return Ok(Ratio::integer(a + 1));
    }
    Ratio::new(a, b, c)
}

/// `remainder / base` as `b/c`; `b == c` when the rounding carries into the integer part.
fn fraction(remainder: u32, base: u32) -> (u32, u32) {
    if remainder == 0 {
        return (0, 1);
    }
    let divisor = gcd(remainder, base);
    if base / divisor <= MAX_DENOMINATOR {
        return (remainder / divisor, base / divisor);
    }
    let b = (remainder as u64 * DENOMINATOR as u64 + base as u64 / 2) / base as u64;
    (b as u32, DENOMINATOR)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn round_up_even(n: u32) -> u32 {
    n + n % 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CRYSTAL_25MHZ;
    use crate::KHZ;

    fn assert_close(actual: Frequency, expected: Frequency, tolerance: Frequency) {
        let error = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            error <= tolerance,
            "{} Hz is {} Hz off {} Hz",
            actual,
            error,
            expected
        );
    }

    #[test]
    fn multiplier_hits_pll_band() {
        let reference = CRYSTAL_25MHZ.with_correction(30).corrected_frequency();
        for f in 600..=900 {
            let target = f * MHZ;
            let multiplier = find_multiplier(reference, target).unwrap();
            assert_close(multiplier.multiply(reference), target, 13);
        }
    }

    #[test]
    fn multiplier_with_odd_reference_uses_fixed_denominator() {
        let reference = 25_000_001;
        for &target in [600_000_017, 733_333_333, 899_999_999].iter() {
            let multiplier = find_multiplier(reference, target).unwrap();
            assert_close(multiplier.multiply(reference), target, 13);
        }
        let multiplier = find_multiplier(reference, 733_333_333).unwrap();
        assert_eq!(multiplier.c(), DENOMINATOR);
    }

    #[test]
    fn divider_hits_output_frequencies() {
        let pll_frequency = 900 * MHZ;
        for f in 1..=150 {
            let target = f * MHZ;
            let divider = find_divider(pll_frequency, target).unwrap();
            assert_close(divider.divide(pll_frequency), target, 9);
        }
    }

    #[test]
    fn exact_division_is_integer() {
        let divider = find_divider(900 * MHZ, 10 * MHZ).unwrap();
        assert_eq!(divider, Ratio::integer(90));
        assert!(divider.is_integer());
    }

    #[test]
    fn out_of_band_quotients_are_clamped() {
        assert_eq!(
            find_multiplier(25 * MHZ, 100 * MHZ).unwrap(),
            Ratio::integer(MIN_PLL_MULTIPLIER)
        );
        assert_eq!(
            find_multiplier(25 * MHZ, 3_000 * MHZ).unwrap(),
            Ratio::integer(MAX_PLL_MULTIPLIER)
        );
        assert_eq!(
            find_divider(900 * MHZ, 200 * MHZ).unwrap(),
            Ratio::integer(MIN_MS_DIVIDER)
        );
        assert_eq!(
            find_divider(900 * MHZ, 100 * KHZ).unwrap(),
            Ratio::integer(MAX_MS_DIVIDER)
        );
    }

    #[test]
    fn zero_frequencies_are_rejected() {
        assert_eq!(find_multiplier(0, 900 * MHZ), Err(Error::InvalidParameter));
        assert_eq!(find_multiplier(25 * MHZ, 0), Err(Error::InvalidParameter));
        assert_eq!(find_divider(0, 10 * MHZ), Err(Error::InvalidParameter));
        assert_eq!(
            find_multiplier_with_integer_divider(0, 10 * MHZ),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn integer_divider_hits_output_frequencies() {
        let reference = 25 * MHZ;
        for f in (1_000..=150_000).step_by(10) {
            let target = f * KHZ;
            let (multiplier, divider) =
                find_multiplier_with_integer_divider(reference, target).unwrap();
            assert_eq!(divider.b(), 0);
            assert!(divider.is_integer());
            assert!(divider.a() >= MIN_MS_DIVIDER && divider.a() <= MAX_QUADRATURE_DIVIDER);

            let pll_frequency = multiplier.multiply(reference);
            assert!(
                pll_frequency >= MIN_PLL_FREQUENCY && pll_frequency <= MAX_PLL_FREQUENCY,
                "PLL at {} Hz for {} Hz",
                pll_frequency,
                target
            );
            assert_close(divider.divide(pll_frequency), target, 3);
        }
    }

    #[test]
    fn low_frequencies_use_output_divider() {
        let (multiplier, divider) = find_multiplier_with_integer_divider(25 * MHZ, MHZ).unwrap();
        assert_eq!(divider.divider(), OutputDivider::Div8);
        assert_eq!(divider.a(), 76);
        assert_eq!(multiplier.multiply(25 * MHZ), 608 * MHZ);

        let (multiplier, divider) =
            find_multiplier_with_integer_divider(25 * MHZ, MIN_QUADRATURE_FREQUENCY).unwrap();
        assert_eq!(divider.divider(), OutputDivider::Div128);
        assert_close(divider.divide(multiplier.multiply(25 * MHZ)), MIN_QUADRATURE_FREQUENCY, 3);
    }

    #[test]
    fn high_frequencies_use_divide_by_4() {
        let (multiplier, divider) =
            find_multiplier_with_integer_divider(25 * MHZ, 175 * MHZ).unwrap();
        assert_eq!(divider.a(), 4);
        assert!(divider.by4());
        assert_eq!(multiplier.multiply(25 * MHZ), 700 * MHZ);
        assert_eq!(divider.divide(700 * MHZ), 175 * MHZ);
    }

    #[test]
    fn quadrature_band_is_enforced() {
        assert_eq!(
            find_multiplier_with_integer_divider(25 * MHZ, MIN_QUADRATURE_FREQUENCY - 1),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            find_multiplier_with_integer_divider(25 * MHZ, MAX_OUTPUT_FREQUENCY + 1),
            Err(Error::InvalidParameter)
        );
    }
}
