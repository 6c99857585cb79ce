// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! FILS shared-key authentication for a station: ERP wrapped data, the FILS
//! key hierarchy (IEEE Std 802.11ai-2016), AES-SIV protection of the
//! association frames, and the FT hierarchy rooted in FILS-FT.

pub mod akm;
pub mod erp;
mod error;
pub mod ft;
pub mod kde;
pub mod session;
pub mod siv;

mod kdf;

pub use akm::{Cipher, FilsAkm, HashKind, KeySizes};
pub use error::{Error, Result};
pub use session::{ConnectionKeys, ErpCredentials, FilsSession, FILS_NONCE_LEN};
