// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// Failures of the FILS exchange. Cryptographic mismatches are fatal to the
/// association attempt; the caller reports association-refused and may
/// restart the whole exchange from idle.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("operation invalid in state {0}")]
    InvalidState(&'static str),
    #[error("malformed EAP re-auth packet: {0}")]
    MalformedErp(&'static str),
    #[error("EAP re-auth sequence {got} older than sent {sent}")]
    ErpSequenceStale { sent: u16, got: u16 },
    #[error("unsupported ERP cryptosuite {0}")]
    UnsupportedCryptosuite(u8),
    #[error("ERP authentication tag mismatch")]
    AuthTagMismatch,
    #[error("AP key confirmation mismatch")]
    KeyConfirmationMismatch,
    #[error("synthetic IV mismatch")]
    SivMismatch,
    #[error("KEK length {0} not one of 32/48/64")]
    InvalidKekLength(usize),
    #[error("malformed key delivery element: {0}")]
    MalformedKde(&'static str),
    #[error("association response carried no GTK")]
    MissingGtk,
    #[error("malformed RSN element")]
    MalformedRsne,
}

pub type Result<T> = std::result::Result<T, Error>;
