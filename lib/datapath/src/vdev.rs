// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Virtual (BSS) device objects. A `Vdev` itself is immutable identity; the
//! mutable relations (peer list, deferred-delete request, the weak
//! `last_real_peer` back-reference) live in the pdev's graph state so that
//! peer-reference transitions and structural removal share one critical
//! section.

use crate::device::OpMode;
use crate::peer::Peer;
use std::sync::Arc;
use wlan_common::mac::MacAddr;

/// One-shot callback invoked when a pending vdev deletion finalizes. Called
/// with the vdev id, outside the graph lock.
pub type VdevDeleteCallback = Box<dyn FnOnce(u8) + Send>;

pub struct Vdev {
    id: u8,
    mac: MacAddr,
    opmode: OpMode,
}

impl Vdev {
    pub(crate) fn new(id: u8, mac: MacAddr, opmode: OpMode) -> Self {
        Vdev { id, mac, opmode }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn mac(&self) -> &MacAddr {
        &self.mac
    }

    pub fn opmode(&self) -> OpMode {
        self.opmode
    }
}

/// Per-vdev graph state, guarded by the pdev peer-reference lock.
pub(crate) struct VdevEntry {
    pub(crate) vdev: Arc<Vdev>,
    /// Peers currently attached to this vdev. Membership is a list
    /// relation, not exclusive ownership; the MAC hash co-owns.
    pub(crate) peers: Vec<Arc<Peer>>,
    /// Weak back-reference to the most recent peer whose MAC differs from
    /// the vdev's own; fallback target for broadcast-key operations.
    pub(crate) last_real_peer: Option<MacAddr>,
    /// Deferred-delete request recorded when detach found peers attached.
    /// Finalized exactly once, when the peer list empties.
    pub(crate) delete_pending: Option<VdevDeleteCallback>,
    /// MAC of a mid-deletion duplicate some attach is blocked on. Reset on
    /// deletion completion or wait timeout.
    pub(crate) wait_on_peer_mac: Option<MacAddr>,
}

impl VdevEntry {
    pub(crate) fn new(vdev: Arc<Vdev>) -> Self {
        VdevEntry {
            vdev,
            peers: Vec::new(),
            last_real_peer: None,
            delete_pending: None,
            wait_on_peer_mac: None,
        }
    }
}
