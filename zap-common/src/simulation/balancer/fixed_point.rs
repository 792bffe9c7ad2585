//! 18 decimal fixed point arithmetic as done by the Balancer vault.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::log_exp_math;
use crate::simulation::errors::SimulationError;

/// Relative error bound of `pow`, 1e-14.
const MAX_POW_RELATIVE_ERROR: u64 = 10_000;

pub fn one() -> BigUint {
    BigUint::from(1_000_000_000_000_000_000u64)
}

pub fn mul_down(a: &BigUint, b: &BigUint) -> BigUint {
    a * b / one()
}

pub fn mul_up(a: &BigUint, b: &BigUint) -> BigUint {
    let product = a * b;
    if product.is_zero() {
        return product;
    }
    (product - BigUint::one()) / one() + BigUint::one()
}

pub fn div_down(a: &BigUint, b: &BigUint) -> Result<BigUint, SimulationError> {
    if b.is_zero() {
        return Err(SimulationError::Math("division by zero".to_string()));
    }
    Ok(a * one() / b)
}

pub fn div_up(a: &BigUint, b: &BigUint) -> Result<BigUint, SimulationError> {
    if b.is_zero() {
        return Err(SimulationError::Math("division by zero".to_string()));
    }
    if a.is_zero() {
        return Ok(BigUint::zero());
    }
    Ok((a * one() - BigUint::one()) / b + BigUint::one())
}

/// `1 - x`, floored at zero.
pub fn complement(x: &BigUint) -> BigUint {
    let one = one();
    if x < &one {
        one - x
    } else {
        BigUint::zero()
    }
}

pub fn pow_down(x: &BigUint, y: &BigUint) -> Result<BigUint, SimulationError> {
    if let Some(exact) = pow_exact(x, y) {
        return Ok(exact);
    }
    let raw = log_exp_math::pow(x, y)?;
    let max_error = mul_up(&raw, &BigUint::from(MAX_POW_RELATIVE_ERROR)) + BigUint::one();
    if raw < max_error {
        Ok(BigUint::zero())
    } else {
        Ok(raw - max_error)
    }
}

pub fn pow_up(x: &BigUint, y: &BigUint) -> Result<BigUint, SimulationError> {
    if let Some(exact) = pow_exact(x, y) {
        return Ok(exact);
    }
    let raw = log_exp_math::pow(x, y)?;
    let max_error = mul_up(&raw, &BigUint::from(MAX_POW_RELATIVE_ERROR)) + BigUint::one();
    Ok(raw + max_error)
}

/// Exponents 1, 2 and 4 are computed by multiplication.
fn pow_exact(x: &BigUint, y: &BigUint) -> Option<BigUint> {
    let one = one();
    if y == &one {
        Some(x.clone())
    } else if y == &(&one * 2u32) {
        Some(mul_down(x, x))
    } else if y == &(&one * 4u32) {
        let square = mul_down(x, x);
        Some(mul_down(&square, &square))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(v: u64) -> BigUint {
        BigUint::from(v) * one() / 100u32
    }

    #[test]
    fn test_rounding_directions() {
        let a = BigUint::from(1u32);
        let b = fp(50);

        assert_eq!(mul_down(&a, &b), BigUint::zero());
        assert_eq!(mul_up(&a, &b), BigUint::one());
        assert_eq!(div_down(&fp(100), &fp(300)).unwrap(), BigUint::from(333_333_333_333_333_333u64));
        assert_eq!(div_up(&fp(100), &fp(300)).unwrap(), BigUint::from(333_333_333_333_333_334u64));
        assert!(div_down(&a, &BigUint::zero()).is_err());
        assert_eq!(complement(&fp(150)), BigUint::zero());
        assert_eq!(complement(&fp(25)), fp(75));
    }

    #[test]
    fn test_pow_bounds() {
        // 4^0.5 = 2
        let x = fp(400);
        let y = fp(50);

        let down = pow_down(&x, &y).unwrap();
        let up = pow_up(&x, &y).unwrap();
        let two = fp(200);
        let tolerance = BigUint::from(1_000_000u64);

        assert!(down <= up);
        assert!(&down + &tolerance >= two && down <= &two + &tolerance);
        assert!(&up + &tolerance >= two && up <= &two + &tolerance);
        assert_eq!(pow_down(&x, &fp(200)).unwrap(), fp(1600));
    }
}
