// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("no vdev with id {0}")]
    NoSuchVdev(u8),
    #[error("vdev {0} already attached")]
    VdevExists(u8),
    #[error("peer {0} not found")]
    PeerNotFound(String),
    #[error("duplicate peer {0} already attached")]
    DuplicatePeer(String),
    #[error("timed out waiting for deletion of duplicate peer {0}")]
    DuplicatePeerTimeout(String),
    #[error("pdev still has {0} attached vdevs")]
    PdevBusy(usize),
    #[error("hardware descriptor allocation failed at index {0}")]
    HwDescAlloc(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
