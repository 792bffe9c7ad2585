//! Exponentiation and logarithm with 18 decimal fixed point arguments, matching Balancer's
//! `LogExpMath` bit for bit (signed intermediate values, truncating division).

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};

use crate::simulation::errors::SimulationError;

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

fn one_18() -> BigInt {
    pow10(18)
}

fn one_20() -> BigInt {
    pow10(20)
}

fn one_36() -> BigInt {
    pow10(36)
}

fn max_natural_exponent() -> BigInt {
    BigInt::from(130) * one_18()
}

fn min_natural_exponent() -> BigInt {
    BigInt::from(-41) * one_18()
}

/// `x0 = 2^7` and `x1 = 2^6` in 18 decimals; their exponentials have no decimals.
fn x0() -> BigInt {
    BigInt::from(128) * one_18()
}

fn a0() -> BigInt {
    BigInt::from(388_770_840_599_459_509_222u128) * pow10(35)
}

fn x1() -> BigInt {
    BigInt::from(64) * one_18()
}

fn a1() -> BigInt {
    BigInt::from(623_514_908_081_161_688_291u128) * pow10(7)
}

/// `(x_n, e^x_n)` for n = 2..=11, both in 20 decimals.
fn terms() -> [(BigInt, BigInt); 10] {
    [
        (BigInt::from(3_200_000_000_000_000_000_000i128), BigInt::from(7_896_296_018_268_069_516_100_000_000_000_000i128)),
        (BigInt::from(1_600_000_000_000_000_000_000i128), BigInt::from(888_611_052_050_787_263_676_000_000i128)),
        (BigInt::from(800_000_000_000_000_000_000i128), BigInt::from(298_095_798_704_172_827_474_000i128)),
        (BigInt::from(400_000_000_000_000_000_000i128), BigInt::from(5_459_815_003_314_423_907_810i128)),
        (BigInt::from(200_000_000_000_000_000_000i128), BigInt::from(738_905_609_893_065_022_723i128)),
        (BigInt::from(100_000_000_000_000_000_000i128), BigInt::from(271_828_182_845_904_523_536i128)),
        (BigInt::from(50_000_000_000_000_000_000i128), BigInt::from(164_872_127_070_012_814_685i128)),
        (BigInt::from(25_000_000_000_000_000_000i128), BigInt::from(128_402_541_668_774_148_407i128)),
        (BigInt::from(12_500_000_000_000_000_000i128), BigInt::from(113_314_845_306_682_631_683i128)),
        (BigInt::from(6_250_000_000_000_000_000i128), BigInt::from(106_449_445_891_785_942_956i128)),
    ]
}

/// `x^y` for 18 decimal `x` and `y`.
pub fn pow(x: &BigUint, y: &BigUint) -> Result<BigUint, SimulationError> {
    if y.is_zero() {
        return Ok(BigUint::from(1_000_000_000_000_000_000u64));
    }
    if x.is_zero() {
        return Ok(BigUint::zero());
    }
    if x.bits() >= 255 {
        return Err(SimulationError::Math("pow base out of bounds".to_string()));
    }
    let mild_exponent_bound = (BigInt::one() << 254) / one_20();
    let x = BigInt::from(x.clone());
    let y = BigInt::from(y.clone());
    if y >= mild_exponent_bound {
        return Err(SimulationError::Math("pow exponent out of bounds".to_string()));
    }

    let ln_36_lower = one_18() - pow10(17);
    let ln_36_upper = one_18() + pow10(17);
    let mut logx_times_y = if ln_36_lower < x && x < ln_36_upper {
        let ln_36_x = ln_36(&x);
        (&ln_36_x / one_18()) * &y + ((&ln_36_x % one_18()) * &y) / one_18()
    } else {
        ln(&x)? * &y
    };
    logx_times_y /= one_18();

    if logx_times_y < min_natural_exponent() || logx_times_y > max_natural_exponent() {
        return Err(SimulationError::Math("pow product out of bounds".to_string()));
    }
    exp(&logx_times_y)?
        .to_biguint()
        .ok_or_else(|| SimulationError::Math("negative pow result".to_string()))
}

/// `e^x` for 18 decimal `x`.
pub fn exp(x: &BigInt) -> Result<BigInt, SimulationError> {
    if x < &min_natural_exponent() || x > &max_natural_exponent() {
        return Err(SimulationError::Math("exp argument out of bounds".to_string()));
    }
    if x.is_negative() {
        return Ok(one_18() * one_18() / exp(&-x)?);
    }

    let mut x = x.clone();
    let first_an = if x >= x0() {
        x -= x0();
        a0()
    } else if x >= x1() {
        x -= x1();
        a1()
    } else {
        BigInt::one()
    };

    // Switch to 20 decimals for the remaining terms.
    x *= 100;
    let one_20 = one_20();
    let mut product = one_20.clone();
    // x10 and x11 are not needed at this precision.
    for (x_n, a_n) in terms().iter().take(8) {
        if &x >= x_n {
            x -= x_n;
            product = product * a_n / &one_20;
        }
    }

    let mut series_sum = one_20.clone();
    let mut term = x.clone();
    series_sum += &term;
    for i in 2..=12 {
        term = term * &x / &one_20 / i;
        series_sum += &term;
    }

    Ok(((product * series_sum) / &one_20) * first_an / 100)
}

/// Natural logarithm of an 18 decimal `a`.
pub fn ln(a: &BigInt) -> Result<BigInt, SimulationError> {
    if !a.is_positive() {
        return Err(SimulationError::Math("ln of non positive value".to_string()));
    }
    let one_18 = one_18();
    if a < &one_18 {
        return Ok(-ln(&(&one_18 * &one_18 / a))?);
    }

    let mut a = a.clone();
    let mut sum = BigInt::zero();
    if a >= a0() * &one_18 {
        a /= a0();
        sum += x0();
    }
    if a >= a1() * &one_18 {
        a /= a1();
        sum += x1();
    }

    sum *= 100;
    a *= 100;
    let one_20 = one_20();
    for (x_n, a_n) in terms().iter() {
        if &a >= a_n {
            a = a * &one_20 / a_n;
            sum += x_n;
        }
    }

    let z = (&a - &one_20) * &one_20 / (&a + &one_20);
    let z_squared = &z * &z / &one_20;
    let mut num = z.clone();
    let mut series_sum = num.clone();
    for d in [3, 5, 7, 9, 11] {
        num = num * &z_squared / &one_20;
        series_sum += &num / d;
    }
    series_sum *= 2;

    Ok((sum + series_sum) / 100)
}

/// High precision `ln` for arguments close to one; result has 36 decimals.
fn ln_36(x: &BigInt) -> BigInt {
    let one_36 = one_36();
    let x = x * one_18();
    let z = (&x - &one_36) * &one_36 / (&x + &one_36);
    let z_squared = &z * &z / &one_36;
    let mut num = z.clone();
    let mut series_sum = num.clone();
    for d in [3, 5, 7, 9, 11, 13, 15] {
        num = num * &z_squared / &one_36;
        series_sum += &num / d;
    }
    series_sum * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: &BigInt, expected: &BigInt, tolerance: u64) -> bool {
        (actual - expected).abs() <= BigInt::from(tolerance)
    }

    #[test]
    fn test_exp() {
        let e = BigInt::from(2_718_281_828_459_045_235u64);

        assert!(close(&exp(&one_18()).unwrap(), &e, 1_000));
        assert_eq!(exp(&BigInt::zero()).unwrap(), one_18());
        assert!(close(
            &exp(&-one_18()).unwrap(),
            &BigInt::from(367_879_441_171_442_321u64),
            1_000
        ));
        assert!(exp(&(max_natural_exponent() + 1)).is_err());
    }

    #[test]
    fn test_ln() {
        let e = BigInt::from(2_718_281_828_459_045_235u64);

        assert!(close(&ln(&e).unwrap(), &one_18(), 1_000));
        assert_eq!(ln(&one_18()).unwrap(), BigInt::zero());
        assert!(ln(&BigInt::zero()).is_err());
    }

    #[test]
    fn test_pow() {
        let one = BigUint::from(1_000_000_000_000_000_000u64);
        let two = &one * 2u32;
        let half = &one / 2u32;

        // 2^0.5
        let root = pow(&two, &half).unwrap();
        let expected = BigUint::from(1_414_213_562_373_095_048u64);
        let diff = if root > expected { &root - &expected } else { &expected - &root };
        assert!(diff < BigUint::from(1_000u32));

        // close to one uses the 36 decimal logarithm
        let near_one = &one + &one / 100u32;
        let squared = pow(&near_one, &two).unwrap();
        let expected = BigUint::from(1_020_100_000_000_000_000u64);
        let diff = if squared > expected { &squared - &expected } else { &expected - &squared };
        assert!(diff < BigUint::from(1_000u32));

        assert_eq!(pow(&two, &BigUint::zero()).unwrap(), one);
    }
}
