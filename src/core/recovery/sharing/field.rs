//! Arithmetic in GF(2^8) with the AES reduction polynomial.
//!
//! Multiplication runs a fixed eight rounds with masks instead of
//! branches, so timing does not depend on operand values.

/// x^8 + x^4 + x^3 + x + 1, low byte.
const REDUCTION: u8 = 0x1b;

/// Addition and subtraction are both XOR.
#[inline]
pub(crate) fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

pub(crate) fn mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        product ^= a & 0u8.wrapping_sub(b & 1);
        let carry = 0u8.wrapping_sub(a >> 7);
        a = (a << 1) ^ (REDUCTION & carry);
        b >>= 1;
    }
    product
}

/// Multiplicative inverse via a^254. `inv(0)` is 0.
pub(crate) fn inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul(result, base);
        }
        base = mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate `coefficients[0] + coefficients[1]·x + ...` at `x` (Horner).
pub(crate) fn eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| add(mul(acc, x), c))
}

/// Lagrange interpolation of the polynomial through `points` at x = 0.
///
/// Callers guarantee the x coordinates are distinct and non-zero.
pub(crate) fn interpolate_at_zero(points: &[(u8, u8)]) -> u8 {
    let mut secret = 0u8;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut numerator = 1u8;
        let mut denominator = 1u8;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                numerator = mul(numerator, xj);
                denominator = mul(denominator, add(xi, xj));
            }
        }
        let basis = mul(numerator, inv(denominator));
        secret = add(secret, mul(yi, basis));
    }
    secret
}
