//! Shamir secret sharing over the raw DEK bytes.
//!
//! Shares are wrapped in a small self-describing envelope of
//! `[version, threshold, checksum, payload]`, so any `t` of them carry
//! enough metadata to combine without consulting the dealer, and a damaged
//! share is detected before it can poison reconstruction.

use rand::RngCore;
use sha2::{Digest, Sha256};
use sharks::{Share, Sharks};
use zeroize::Zeroize;

use coralkm_core::RandomSource;

use crate::dek::Dek;
use crate::error::{CryptoError, CryptoResult};

const SHARE_VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 4;
// Version + threshold + checksum.
const HEADER_LEN: usize = 2 + CHECKSUM_LEN;

/// Split a DEK into `count` shares, any `threshold` of which reconstruct it.
///
/// Requires `1 <= threshold <= count`.
pub fn split(
    rng: &dyn RandomSource,
    dek: &Dek,
    count: u8,
    threshold: u8,
) -> CryptoResult<Vec<Vec<u8>>> {
    if threshold == 0 || threshold > count {
        return Err(CryptoError::InvalidShareParameters { threshold, count });
    }
    let sharks = Sharks(threshold);
    let mut adapter = RngAdapter(rng);
    let dealer = sharks.dealer_rng(dek.as_bytes(), &mut adapter);
    Ok(dealer
        .take(count as usize)
        .map(|share| wrap(threshold, &Vec::from(&share)))
        .collect())
}

/// Reconstruct the DEK from a set of shares.
///
/// Fails with [`CryptoError::InsufficientShares`] below the threshold the
/// shares themselves declare, and [`CryptoError::CorruptShare`] on any
/// integrity failure (bad version, bad checksum, disagreeing thresholds,
/// duplicate points).
pub fn combine(shares: &[Vec<u8>]) -> CryptoResult<Dek> {
    let mut threshold = None;
    let mut parsed = Vec::with_capacity(shares.len());
    for share in shares {
        let (share_threshold, payload) = unwrap(share)?;
        match threshold {
            None => threshold = Some(share_threshold),
            Some(t) if t != share_threshold => return Err(CryptoError::CorruptShare),
            Some(_) => {}
        }
        parsed.push(Share::try_from(payload).map_err(|_| CryptoError::CorruptShare)?);
    }
    let threshold = threshold.ok_or(CryptoError::InsufficientShares {
        required: 1,
        provided: 0,
    })?;
    if shares.len() < threshold as usize {
        return Err(CryptoError::InsufficientShares {
            required: threshold as usize,
            provided: shares.len(),
        });
    }
    let mut secret = Sharks(threshold)
        .recover(&parsed)
        .map_err(|_| CryptoError::CorruptShare)?;
    let dek = Dek::from_bytes(&secret);
    secret.zeroize();
    dek
}

fn wrap(threshold: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(SHARE_VERSION);
    out.push(threshold);
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    out
}

fn unwrap(share: &[u8]) -> CryptoResult<(u8, &[u8])> {
    if share.len() <= HEADER_LEN || share[0] != SHARE_VERSION {
        return Err(CryptoError::CorruptShare);
    }
    let threshold = share[1];
    let payload = &share[HEADER_LEN..];
    if share[2..HEADER_LEN] != checksum(payload) {
        return Err(CryptoError::CorruptShare);
    }
    Ok((threshold, payload))
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

// sharks wants a `rand` generator; bridge the injected source.
struct RngAdapter<'a>(&'a dyn RandomSource);

impl RngCore for RngAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.0.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.0.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coralkm_core::OsRandomSource;
    use proptest::prelude::*;

    fn dek() -> Dek {
        Dek::generate(&OsRandomSource)
    }

    #[test]
    fn test_any_threshold_subset_recovers() {
        let dek = dek();
        let shares = split(&OsRandomSource, &dek, 3, 2).unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(combine(&shares[0..2]).unwrap(), dek);
        assert_eq!(combine(&shares[1..3]).unwrap(), dek);
        assert_eq!(combine(&[shares[0].clone(), shares[2].clone()]).unwrap(), dek);
        assert_eq!(combine(&shares).unwrap(), dek);
    }

    #[test]
    fn test_below_threshold_fails() {
        let shares = split(&OsRandomSource, &dek(), 3, 2).unwrap();
        assert_eq!(
            combine(&shares[0..1]),
            Err(CryptoError::InsufficientShares {
                required: 2,
                provided: 1
            })
        );
    }

    #[test]
    fn test_no_shares_fails() {
        assert!(matches!(
            combine(&[]),
            Err(CryptoError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_combine_is_idempotent() {
        let dek = dek();
        let shares = split(&OsRandomSource, &dek, 5, 3).unwrap();
        let subset = &shares[1..4];
        assert_eq!(combine(subset).unwrap(), combine(subset).unwrap());
        assert_eq!(combine(subset).unwrap(), dek);
    }

    #[test]
    fn test_invalid_parameters() {
        let dek = dek();
        assert_eq!(
            split(&OsRandomSource, &dek, 3, 0),
            Err(CryptoError::InvalidShareParameters {
                threshold: 0,
                count: 3
            })
        );
        assert_eq!(
            split(&OsRandomSource, &dek, 2, 3),
            Err(CryptoError::InvalidShareParameters {
                threshold: 3,
                count: 2
            })
        );
    }

    #[test]
    fn test_single_share_threshold_one() {
        let dek = dek();
        let shares = split(&OsRandomSource, &dek, 1, 1).unwrap();
        assert_eq!(combine(&shares).unwrap(), dek);
    }

    #[test]
    fn test_flipped_bit_is_corrupt() {
        let dek = dek();
        let mut shares = split(&OsRandomSource, &dek, 3, 2).unwrap();
        let last = shares[1].len() - 1;
        shares[1][last] ^= 0x01;
        assert_eq!(combine(&shares[0..2]), Err(CryptoError::CorruptShare));
    }

    #[test]
    fn test_bad_version_is_corrupt() {
        let mut shares = split(&OsRandomSource, &dek(), 2, 2).unwrap();
        shares[0][0] = 99;
        assert_eq!(combine(&shares), Err(CryptoError::CorruptShare));
    }

    #[test]
    fn test_disagreeing_thresholds_are_corrupt() {
        let dek = dek();
        let a = split(&OsRandomSource, &dek, 2, 2).unwrap();
        let b = split(&OsRandomSource, &dek, 3, 3).unwrap();
        assert_eq!(
            combine(&[a[0].clone(), b[0].clone()]),
            Err(CryptoError::CorruptShare)
        );
    }

    #[test]
    fn test_duplicate_share_is_rejected() {
        let shares = split(&OsRandomSource, &dek(), 3, 2).unwrap();
        assert_eq!(
            combine(&[shares[0].clone(), shares[0].clone()]),
            Err(CryptoError::CorruptShare)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_threshold_subsets_recover(count in 1u8..12, take_extra in 0u8..4) {
            let threshold = count.div_ceil(2).max(1);
            let dek = dek();
            let shares = split(&OsRandomSource, &dek, count, threshold).unwrap();
            let take = (threshold + take_extra).min(count) as usize;
            prop_assert_eq!(combine(&shares[..take]).unwrap(), dek);
        }
    }
}
