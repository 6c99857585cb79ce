// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WLAN transmit datapath core: the pdev → vdev → peer object graph with
//! reference-counted peer lifetime, a fixed-capacity local-peer-ID
//! allocator, and a credit-accounted TX descriptor pool.
//!
//! The firmware command surface is abstracted behind [`device::Device`];
//! all graph mutations are safe from non-blocking contexts except
//! [`pdev::Pdev::peer_attach`], which may block briefly waiting for a
//! duplicate peer's deletion to finish.

pub mod device;
pub mod error;
pub mod pdev;
pub mod peer;
pub mod peer_id;
pub mod pool;
pub mod vdev;

pub use error::{Error, Result};
pub use pdev::{Pdev, PdevConfig, VdevDetachState, PEER_DELETION_TIMEOUT};
pub use peer::{Peer, PeerState};
pub use vdev::Vdev;
