//! Shamir secret sharing over GF(256).
//!
//! Each byte of the secret is the constant term of its own random
//! polynomial of degree `threshold - 1`. Share `i` holds every polynomial
//! evaluated at `x = i`. Any `threshold` shares interpolate the constant
//! terms back; fewer reveal nothing about them.
//!
//! This layer only does the math. Serialization, key ids and consistency
//! checks between share files belong to the recovery module.

mod field;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{RecoveryError, Result};

/// One share: a non-zero x coordinate and one y value per secret byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    pub index: u8,
    pub data: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("len", &self.data.len())
            .finish()
    }
}

fn check_parameters(threshold: u8, num_shares: u8) -> Result<()> {
    if threshold < 2 {
        return Err(RecoveryError::InvalidParameters(
            "threshold must be at least 2".to_string(),
        )
        .into());
    }
    if threshold > num_shares {
        return Err(RecoveryError::InvalidParameters(format!(
            "threshold {} exceeds number of shares {}",
            threshold, num_shares
        ))
        .into());
    }
    Ok(())
}

/// Split `secret` into `num_shares` shares, any `threshold` of which
/// reconstruct it.
///
/// # Errors
///
/// Returns `RecoveryError::InvalidParameters` when `threshold < 2`,
/// `threshold > num_shares` or the secret is empty.
pub fn split(secret: &[u8], threshold: u8, num_shares: u8) -> Result<Vec<Share>> {
    check_parameters(threshold, num_shares)?;
    if secret.is_empty() {
        return Err(RecoveryError::InvalidParameters("secret is empty".to_string()).into());
    }

    let rng = SystemRandom::new();
    let mut shares: Vec<Share> = (1..=num_shares)
        .map(|index| Share {
            index,
            data: Zeroizing::new(Vec::with_capacity(secret.len())),
        })
        .collect();

    let mut coefficients = Zeroizing::new(vec![0u8; usize::from(threshold)]);
    for &byte in secret {
        coefficients[0] = byte;
        rng.fill(&mut coefficients[1..])
            .map_err(|_| RecoveryError::InvalidParameters("random source failure".to_string()))?;

        for share in &mut shares {
            share.data.push(field::eval(&coefficients, share.index));
        }
    }

    Ok(shares)
}

/// Reconstruct a secret from at least `threshold` shares.
///
/// Only the first `threshold` shares are used.
///
/// # Errors
///
/// Returns `RecoveryError::InsufficientShares` with fewer than `threshold`
/// shares, and `RecoveryError::InvalidParameters` for zero or duplicate
/// indices or shares of different lengths.
pub fn combine(shares: &[Share], threshold: u8) -> Result<Zeroizing<Vec<u8>>> {
    let needed = usize::from(threshold);
    if needed < 2 {
        return Err(RecoveryError::InvalidParameters(
            "threshold must be at least 2".to_string(),
        )
        .into());
    }
    if shares.len() < needed {
        return Err(RecoveryError::InsufficientShares {
            needed,
            provided: shares.len(),
        }
        .into());
    }

    let used = &shares[..needed];
    let len = used[0].data.len();
    for (i, share) in used.iter().enumerate() {
        if share.index == 0 {
            return Err(RecoveryError::InvalidParameters("share index 0".to_string()).into());
        }
        if share.data.len() != len {
            return Err(
                RecoveryError::InvalidParameters("shares differ in length".to_string()).into(),
            );
        }
        if used[..i].iter().any(|other| other.index == share.index) {
            return Err(RecoveryError::InvalidParameters(format!(
                "duplicate share index {}",
                share.index
            ))
            .into());
        }
    }

    let mut secret = Zeroizing::new(Vec::with_capacity(len));
    let mut points = vec![(0u8, 0u8); needed];
    for position in 0..len {
        for (point, share) in points.iter_mut().zip(used) {
            *point = (share.index, share.data[position]);
        }
        secret.push(field::interpolate_at_zero(&points));
    }
    points.fill((0, 0));
    Ok(secret)
}
