// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Keyed-hash utilities backing the FILS key hierarchy: plain HMAC and
//! hashing over multi-part messages, the IEEE 802.11 KDF, and the RFC 5295
//! PRF+ used for ERP re-authentication keys.
//!
//! These are pure functions over caller-owned buffers; no lock is ever held
//! across them.

use crate::akm::HashKind;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

/// HMAC over the concatenation of `parts`.
pub fn hmac_hash(hash: HashKind, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    match hash {
        HashKind::Sha256 => {
            // HMAC accepts keys of any length.
            let mut mac = HmacSha256::new_from_slice(key).expect("hmac key");
            for part in parts {
                mac.update(part);
            }
            mac.finalize().into_bytes().to_vec()
        }
        HashKind::Sha384 => {
            let mut mac = HmacSha384::new_from_slice(key).expect("hmac key");
            for part in parts {
                mac.update(part);
            }
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Unkeyed hash over the concatenation of `parts`.
pub fn hash(hash: HashKind, parts: &[&[u8]]) -> Vec<u8> {
    match hash {
        HashKind::Sha256 => {
            let mut digest = Sha256::new();
            for part in parts {
                digest.update(part);
            }
            digest.finalize().to_vec()
        }
        HashKind::Sha384 => {
            let mut digest = Sha384::new();
            for part in parts {
                digest.update(part);
            }
            digest.finalize().to_vec()
        }
    }
}

/// IEEE Std 802.11-2016, 12.7.1.7.2 KDF-Hash-Length.
///
/// Output blocks are `HMAC-Hash(key, i || label || context || length)` with
/// the 16-bit counter and the length (in bits) little-endian per the
/// standard.
pub fn kdf(hash: HashKind, key: &[u8], label: &[u8], context: &[&[u8]], out_len: usize) -> Vec<u8> {
    let hash_len = hash.output_len();
    let length_bits = (out_len as u16) * 8;
    let iterations = (out_len + hash_len - 1) / hash_len;
    let mut out = Vec::with_capacity(iterations * hash_len);
    for i in 1..=iterations as u16 {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(context.len() + 3);
        let counter = i.to_le_bytes();
        let length = length_bits.to_le_bytes();
        parts.push(&counter);
        parts.push(label);
        parts.extend_from_slice(context);
        parts.push(&length);
        out.extend_from_slice(&hmac_hash(hash, key, &parts));
    }
    out.truncate(out_len);
    out
}

/// RFC 5295 PRF+ (the KDF used by ERP, RFC 6696): `T(1) = HMAC(key,
/// seed || 0x01)`, `T(n) = HMAC(key, T(n-1) || seed || n)`.
pub fn prf_plus(hash: HashKind, key: &[u8], seed: &[u8], out_len: usize) -> Vec<u8> {
    let hash_len = hash.output_len();
    let mut out = Vec::with_capacity(out_len + hash_len);
    let mut prev: Vec<u8> = Vec::new();
    let mut counter = 1u8;
    while out.len() < out_len {
        let block = hmac_hash(hash, key, &[&prev, seed, &[counter]]);
        out.extend_from_slice(&block);
        prev = block;
        counter += 1;
    }
    out.truncate(out_len);
    out
}

/// Compares two byte strings without early exit. Used for every
/// authentication-tag and SIV check.
pub fn ct_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
