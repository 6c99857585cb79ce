// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Negotiated AKM suites and the key-size table they select.
//!
//! Several derivation steps depend on these lengths agreeing; they are
//! looked up from one table rather than computed at each call site.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sha256,
    Sha384,
}

impl HashKind {
    pub fn output_len(&self) -> usize {
        match self {
            HashKind::Sha256 => 32,
            HashKind::Sha384 => 48,
        }
    }
}

/// FILS AKM suites, IEEE Std 802.11ai-2016, Table 9-133.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilsAkm {
    FilsSha256,
    FilsSha384,
    FtFilsSha256,
    FtFilsSha384,
}

/// Pairwise cipher selecting the TK length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Ccmp128,
    Gcmp256,
}

impl Cipher {
    pub fn tk_len(&self) -> usize {
        match self {
            Cipher::Ccmp128 => 16,
            Cipher::Gcmp256 => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    pub ick: usize,
    pub kek: usize,
    pub pmk: usize,
    pub fils_ft: usize,
    pub pmkr0: usize,
}

// IEEE Std 802.11ai-2016, 12.12.2.5.3 (ICK/KEK) and 802.11r PMK-R0 widths.
const KEY_SIZE_TABLE: [(FilsAkm, HashKind, KeySizes); 4] = [
    (
        FilsAkm::FilsSha256,
        HashKind::Sha256,
        KeySizes { ick: 32, kek: 32, pmk: 32, fils_ft: 32, pmkr0: 32 },
    ),
    (
        FilsAkm::FilsSha384,
        HashKind::Sha384,
        KeySizes { ick: 48, kek: 64, pmk: 48, fils_ft: 48, pmkr0: 48 },
    ),
    (
        FilsAkm::FtFilsSha256,
        HashKind::Sha256,
        KeySizes { ick: 32, kek: 32, pmk: 32, fils_ft: 32, pmkr0: 32 },
    ),
    (
        FilsAkm::FtFilsSha384,
        HashKind::Sha384,
        KeySizes { ick: 48, kek: 64, pmk: 48, fils_ft: 48, pmkr0: 48 },
    ),
];

impl FilsAkm {
    pub fn hash(&self) -> HashKind {
        self.table_entry().1
    }

    pub fn key_sizes(&self) -> KeySizes {
        self.table_entry().2
    }

    pub fn is_ft(&self) -> bool {
        matches!(self, FilsAkm::FtFilsSha256 | FilsAkm::FtFilsSha384)
    }

    fn table_entry(&self) -> &'static (FilsAkm, HashKind, KeySizes) {
        KEY_SIZE_TABLE
            .iter()
            .find(|(akm, _, _)| akm == self)
            .expect("every AKM variant has a table entry")
    }
}
