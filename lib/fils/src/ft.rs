// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fast BSS Transition key hierarchy rooted in the FILS-FT key, and the
//! RSNE rewrite that advertises the resulting PMKR1Name in the association
//! request.

use crate::akm::{FilsAkm, HashKind};
use crate::error::{Error, Result};
use crate::kdf::{hash, kdf};
use wlan_common::mac::MacAddr;
use zeroize::Zeroizing;

pub const PMKID_LEN: usize = 16;
pub const MDID_LEN: usize = 2;

const RSNE_ID: u8 = 48;
const SUITE_LEN: usize = 4;

/// PMK-R0 and the name identifying it.
pub struct PmkR0 {
    pub key: Zeroizing<Vec<u8>>,
    pub name: [u8; PMKID_LEN],
}

/// IEEE Std 802.11-2016, 12.7.1.7.3: derives PMK-R0 from the FILS-FT key.
///
/// The KDF output carries `Q` key bytes followed by a 128-bit salt; the salt
/// is hashed under the "FT-R0N" label to name the key.
pub fn derive_pmkr0(
    akm: FilsAkm,
    fils_ft: &[u8],
    ssid: &[u8],
    mdid: &[u8; MDID_LEN],
    r0kh_id: &[u8],
    sta_addr: &MacAddr,
) -> PmkR0 {
    let hash_kind = akm.hash();
    let q = akm.key_sizes().pmkr0;
    let context: [&[u8]; 6] =
        [&[ssid.len() as u8], ssid, mdid, &[r0kh_id.len() as u8], r0kh_id, sta_addr];
    let r0_key_data = kdf(hash_kind, fils_ft, b"FT-R0", &context, q + PMKID_LEN);
    let key = Zeroizing::new(r0_key_data[..q].to_vec());
    let salt = &r0_key_data[q..];
    let name_digest = hash(hash_kind, &[b"FT-R0N", salt]);
    let mut name = [0u8; PMKID_LEN];
    name.copy_from_slice(&name_digest[..PMKID_LEN]);
    PmkR0 { key, name }
}

/// IEEE Std 802.11-2016, 12.7.1.7.4: names the PMK-R1 held by `r1kh_id`
/// without deriving the key itself; the station only needs the name for its
/// association request.
pub fn derive_pmkr1_name(
    hash_kind: HashKind,
    pmkr0_name: &[u8; PMKID_LEN],
    r1kh_id: &[u8; 6],
    sta_addr: &MacAddr,
) -> [u8; PMKID_LEN] {
    let digest = hash(hash_kind, &[b"FT-R1N", pmkr0_name, r1kh_id, sta_addr]);
    let mut name = [0u8; PMKID_LEN];
    name.copy_from_slice(&digest[..PMKID_LEN]);
    name
}

/// Rewrites an RSN element so its PMKID list carries exactly `pmkid`.
///
/// The element is rebuilt into a fresh buffer rather than shifted in place,
/// so callers never need to reserve slack after the IE. Any bytes after the
/// PMKID list (the group management cipher suite) are preserved.
pub fn rsne_insert_pmkid(rsne: &[u8], pmkid: &[u8; PMKID_LEN]) -> Result<Vec<u8>> {
    if rsne.len() < 2 || rsne[0] != RSNE_ID {
        return Err(Error::MalformedRsne);
    }
    let body_len = rsne[1] as usize;
    if rsne.len() != 2 + body_len {
        return Err(Error::MalformedRsne);
    }
    let body = &rsne[2..];
    // Version and group data cipher suite are mandatory.
    if body.len() < 2 + SUITE_LEN {
        return Err(Error::MalformedRsne);
    }
    let mut offset = 2 + SUITE_LEN;
    // Pairwise cipher suite list, then AKM suite list.
    for _ in 0..2 {
        if body.len() < offset + 2 {
            return Err(Error::MalformedRsne);
        }
        let count = u16::from_le_bytes([body[offset], body[offset + 1]]) as usize;
        offset += 2 + count * SUITE_LEN;
        if body.len() < offset {
            return Err(Error::MalformedRsne);
        }
    }

    let mut out = Vec::with_capacity(rsne.len() + 2 + PMKID_LEN);
    out.extend_from_slice(&rsne[..2 + offset]);
    // RSN capabilities; synthesized as zero when the IE ends early.
    if body.len() >= offset + 2 {
        out.extend_from_slice(&body[offset..offset + 2]);
        offset += 2;
    } else {
        out.extend_from_slice(&[0, 0]);
    }
    // Replace any existing PMKID list with ours.
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(pmkid);
    if body.len() > offset {
        if body.len() < offset + 2 {
            return Err(Error::MalformedRsne);
        }
        let count = u16::from_le_bytes([body[offset], body[offset + 1]]) as usize;
        offset += 2 + count * PMKID_LEN;
        if body.len() < offset {
            return Err(Error::MalformedRsne);
        }
        // Trailing group management cipher suite survives the rewrite.
        out.extend_from_slice(&body[offset..]);
    }
    let new_body_len = out.len() - 2;
    if new_body_len > u8::MAX as usize {
        return Err(Error::MalformedRsne);
    }
    out[1] = new_body_len as u8;
    Ok(out)
}
