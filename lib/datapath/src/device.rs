// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use wlan_common::mac::MacAddr;

/// Opaque handle to a hardware-visible transfer descriptor. Each pool entry
/// owns exactly one of these for the lifetime of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwDescHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    Sta,
    Ap,
    Monitor,
}

/// A `Device` is the firmware/hardware command surface the datapath drives:
/// descriptor allocation, vdev lifecycle, and per-peer QoS notifications.
///
/// Calls are synchronous and may be issued with datapath locks *not* held.
pub trait Device: Send + Sync {
    /// Allocate one hardware transfer descriptor. May fail; pool
    /// construction unwinds on failure.
    fn alloc_hw_descriptor(&self) -> Option<HwDescHandle>;
    fn free_hw_descriptor(&self, handle: HwDescHandle);
    /// Force-complete a frame still attached to `handle` with an error
    /// status. Called during pool teardown for outstanding descriptors.
    fn complete_with_error(&self, handle: HwDescHandle);

    fn vdev_attach(&self, vdev_id: u8, opmode: OpMode);
    fn vdev_detach(&self, vdev_id: u8);

    fn send_peer_qos_update(&self, peer_mac: &MacAddr, qos_capable: bool);
    fn send_peer_uapsd_mask(&self, peer_mac: &MacAddr, mask: u8);

    /// Blocks until the target confirms it will deliver no further tx
    /// completions. The descriptor pool may only be torn down afterwards.
    fn wait_tx_quiescence(&self);
}
