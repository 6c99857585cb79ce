// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! AES-SIV (RFC 5297) used to protect the FILS (Re)Association frames.
//!
//! The negotiated KEK is split in half: the first half keys S2V (CMAC), the
//! second keys the CTR encryption. Supported KEK widths are 32, 48 and 64
//! bytes, i.e. AES-128/192/256 underneath.

use crate::error::{Error, Result};
use crate::kdf::ct_compare;
use aes::{Aes128, Aes192, Aes256};
use cmac::{Cmac, Mac};
use ctr::cipher::{KeyIvInit, StreamCipher};

const BLOCK_LEN: usize = 16;

fn cmac_aes(key: &[u8], parts: &[&[u8]]) -> Result<[u8; BLOCK_LEN]> {
    macro_rules! run {
        ($cipher:ty) => {{
            let mut mac =
                <Cmac<$cipher>>::new_from_slice(key).map_err(|_| Error::InvalidKekLength(key.len() * 2))?;
            for part in parts {
                mac.update(part);
            }
            let out = mac.finalize().into_bytes();
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(&out);
            Ok(block)
        }};
    }
    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        n => Err(Error::InvalidKekLength(n * 2)),
    }
}

fn ctr_xor(key: &[u8], iv: &[u8; BLOCK_LEN], data: &mut [u8]) -> Result<()> {
    macro_rules! run {
        ($cipher:ty) => {{
            let mut ctr = <ctr::Ctr128BE<$cipher>>::new_from_slices(key, iv)
                .map_err(|_| Error::InvalidKekLength(key.len() * 2))?;
            ctr.apply_keystream(data);
            Ok(())
        }};
    }
    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        n => Err(Error::InvalidKekLength(n * 2)),
    }
}

// RFC 5297, 2.3: doubling in GF(2^128).
fn dbl(block: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let v = u128::from_be_bytes(*block);
    let mut shifted = v << 1;
    if v >> 127 == 1 {
        shifted ^= 0x87;
    }
    shifted.to_be_bytes()
}

fn xor_block(a: &[u8; BLOCK_LEN], b: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let mut out = [0u8; BLOCK_LEN];
    for i in 0..BLOCK_LEN {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// RFC 5297, 2.4: S2V over the associated data vector and the plaintext.
fn s2v(k1: &[u8], ads: &[&[u8]], plaintext: &[u8]) -> Result<[u8; BLOCK_LEN]> {
    let mut d = cmac_aes(k1, &[&[0u8; BLOCK_LEN]])?;
    for ad in ads {
        d = xor_block(&dbl(&d), &cmac_aes(k1, &[ad])?);
    }
    if plaintext.len() >= BLOCK_LEN {
        // xorend: xor D into the final block of the plaintext.
        let head_len = plaintext.len() - BLOCK_LEN;
        let mut tail = [0u8; BLOCK_LEN];
        tail.copy_from_slice(&plaintext[head_len..]);
        let tail = xor_block(&tail, &d);
        cmac_aes(k1, &[&plaintext[..head_len], &tail])
    } else {
        let mut padded = [0u8; BLOCK_LEN];
        padded[..plaintext.len()].copy_from_slice(plaintext);
        padded[plaintext.len()] = 0x80;
        cmac_aes(k1, &[&xor_block(&dbl(&d), &padded)])
    }
}

fn split_kek(kek: &[u8]) -> Result<(&[u8], &[u8])> {
    match kek.len() {
        32 | 48 | 64 => Ok(kek.split_at(kek.len() / 2)),
        n => Err(Error::InvalidKekLength(n)),
    }
}

fn siv_to_iv(siv: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let mut iv = *siv;
    // RFC 5297, 2.6: clear the 31st and 63rd bits before CTR.
    iv[8] &= 0x7f;
    iv[12] &= 0x7f;
    iv
}

/// Encrypts `plaintext` under `kek`, binding the `ads` vector. The output is
/// the 16-byte synthetic IV followed by the ciphertext.
pub fn aead_encrypt(kek: &[u8], ads: &[&[u8]], plaintext: &[u8]) -> Result<Vec<u8>> {
    let (k1, k2) = split_kek(kek)?;
    let siv = s2v(k1, ads, plaintext)?;
    let mut out = Vec::with_capacity(BLOCK_LEN + plaintext.len());
    out.extend_from_slice(&siv);
    out.extend_from_slice(plaintext);
    ctr_xor(k2, &siv_to_iv(&siv), &mut out[BLOCK_LEN..])?;
    Ok(out)
}

/// Decrypts `siv || ciphertext` and verifies the synthetic IV against the
/// `ads` vector. The plaintext is only returned once the IV has been
/// confirmed.
pub fn aead_decrypt(kek: &[u8], ads: &[&[u8]], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < BLOCK_LEN {
        return Err(Error::SivMismatch);
    }
    let (k1, k2) = split_kek(kek)?;
    let mut siv = [0u8; BLOCK_LEN];
    siv.copy_from_slice(&data[..BLOCK_LEN]);
    let mut plaintext = data[BLOCK_LEN..].to_vec();
    ctr_xor(k2, &siv_to_iv(&siv), &mut plaintext)?;
    let expected = s2v(k1, ads, &plaintext)?;
    if !ct_compare(&expected, &siv) {
        return Err(Error::SivMismatch);
    }
    Ok(plaintext)
}
