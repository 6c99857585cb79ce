// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Physical-device context: owns the vdev list, the MAC→peer hash, the
//! local-peer-ID table, and the TX descriptor pool.
//!
//! The peer reference protocol: a peer starts with two references (attach +
//! anticipated peer-map). `peer_unref_delete` decrements under the graph
//! lock; the decrement to zero and the structural removal from hash and
//! vdev list form one critical section, so concurrent lookups observe the
//! peer either fully present or fully absent. Deferred vdev finalization
//! runs outside the lock.

use crate::device::{Device, OpMode};
use crate::error::{Error, Result};
use crate::peer::{Peer, PeerState, RxProc, NUM_DATA_TIDS, NUM_TID_QUEUES};
use crate::peer_id::{LocalPeerIdTable, INVALID_LOCAL_PEER_ID};
use crate::pool::{DescId, PoolSizing, PoolStats, TxDescPool};
use crate::vdev::{Vdev, VdevDeleteCallback, VdevEntry};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wlan_common::mac::{MacAddr, MacFmt};

/// Bound on the wait for a mid-deletion duplicate peer during attach.
pub const PEER_DELETION_TIMEOUT: Duration = Duration::from_millis(500);

pub const NUM_LOCAL_PEER_IDS: u16 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdevDetachState {
    /// The vdev was freed and its callback invoked synchronously.
    Detached,
    /// Peers remain; deletion was recorded and will finalize when the last
    /// peer reference is released.
    Deferred,
}

pub struct PdevConfig {
    pub num_local_peer_ids: u16,
    pub sizing: PoolSizing,
    /// When set, entering `auth` pauses the QoS TID queues until ADDBA
    /// negotiation resumes them, leaving management queues running.
    pub host_addba: bool,
    pub peer_deletion_timeout: Duration,
}

impl Default for PdevConfig {
    fn default() -> Self {
        PdevConfig {
            num_local_peer_ids: NUM_LOCAL_PEER_IDS,
            sizing: PoolSizing::LatencyTolerant {
                throughput_mbps: 150,
                avg_frame_bytes: 1500,
                watermark_percent: None,
            },
            host_addba: false,
            peer_deletion_timeout: PEER_DELETION_TIMEOUT,
        }
    }
}

struct GraphInner {
    /// Ordered vdev list; order is attach order.
    vdevs: Vec<VdevEntry>,
    /// MAC→peer lookup. Buckets because distinct vdevs may carry the same
    /// remote MAC transiently.
    peer_hash: HashMap<MacAddr, Vec<Arc<Peer>>>,
}

impl GraphInner {
    fn vdev_entry_mut(&mut self, vdev_id: u8) -> Option<&mut VdevEntry> {
        self.vdevs.iter_mut().find(|e| e.vdev.id() == vdev_id)
    }

    fn hash_insert(&mut self, peer: Arc<Peer>) {
        self.peer_hash.entry(*peer.mac()).or_default().push(peer);
    }

    fn hash_remove(&mut self, peer: &Arc<Peer>) {
        if let Some(bucket) = self.peer_hash.get_mut(peer.mac()) {
            bucket.retain(|p| !Arc::ptr_eq(p, peer));
            if bucket.is_empty() {
                self.peer_hash.remove(peer.mac());
            }
        }
    }
}

pub struct Pdev<D: Device> {
    device: D,
    cfg: PdevConfig,
    graph: Mutex<GraphInner>,
    peer_del_cv: Condvar,
    local_ids: Mutex<LocalPeerIdTable<Arc<Peer>>>,
    pool: Mutex<Option<TxDescPool>>,
    target_tx_credit: AtomicI32,
}

impl<D: Device> Pdev<D> {
    /// Builds the descriptor pool and ID table. Pool construction failure
    /// is fatal; nothing is leaked on the unwind path.
    pub fn new(device: D, cfg: PdevConfig) -> Result<Arc<Self>> {
        let pool = TxDescPool::new(&cfg.sizing, &device)?;
        let local_ids = LocalPeerIdTable::new(cfg.num_local_peer_ids);
        Ok(Arc::new(Pdev {
            device,
            cfg,
            graph: Mutex::new(GraphInner { vdevs: Vec::new(), peer_hash: HashMap::new() }),
            peer_del_cv: Condvar::new(),
            local_ids: Mutex::new(local_ids),
            pool: Mutex::new(Some(pool)),
            target_tx_credit: AtomicI32::new(0),
        }))
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    // ---- vdev lifecycle ----

    pub fn vdev_attach(&self, vdev_id: u8, mac: MacAddr, opmode: OpMode) -> Result<Arc<Vdev>> {
        let vdev = Arc::new(Vdev::new(vdev_id, mac, opmode));
        {
            let mut graph = self.graph.lock();
            if graph.vdev_entry_mut(vdev_id).is_some() {
                return Err(Error::VdevExists(vdev_id));
            }
            graph.vdevs.push(VdevEntry::new(vdev.clone()));
        }
        self.device.vdev_attach(vdev_id, opmode);
        info!("vdev {} ({}) attached", vdev_id, mac.to_mac_str());
        Ok(vdev)
    }

    /// Requests vdev deletion. With peers still attached the request is
    /// recorded and finalized later by whichever `peer_unref_delete` call
    /// empties the peer list; otherwise the vdev is freed and the callback
    /// invoked synchronously.
    pub fn vdev_detach(
        &self,
        vdev_id: u8,
        callback: VdevDeleteCallback,
    ) -> Result<VdevDetachState> {
        {
            let mut graph = self.graph.lock();
            let index = graph
                .vdevs
                .iter()
                .position(|e| e.vdev.id() == vdev_id)
                .ok_or(Error::NoSuchVdev(vdev_id))?;
            if !graph.vdevs[index].peers.is_empty() {
                debug!(
                    "vdev {} detach deferred behind {} peers",
                    vdev_id,
                    graph.vdevs[index].peers.len()
                );
                graph.vdevs[index].delete_pending = Some(callback);
                return Ok(VdevDetachState::Deferred);
            }
            graph.vdevs.remove(index);
        }
        self.device.vdev_detach(vdev_id);
        callback(vdev_id);
        Ok(VdevDetachState::Detached)
    }

    // ---- peer lifecycle ----

    /// Creates a peer on `vdev_id`. A duplicate MAC mid-deletion is waited
    /// out (bounded by `peer_deletion_timeout`); a live duplicate fails the
    /// attach immediately. Local-ID exhaustion is tolerated: the peer is
    /// created carrying the invalid-ID sentinel.
    pub fn peer_attach(&self, vdev_id: u8, mac: MacAddr) -> Result<Arc<Peer>> {
        let mut graph = self.graph.lock();
        loop {
            let entry =
                graph.vdev_entry_mut(vdev_id).ok_or(Error::NoSuchVdev(vdev_id))?;
            let dup = entry.peers.iter().find(|p| p.mac() == &mac).cloned();
            match dup {
                None => break,
                Some(dup) => {
                    if !dup.delete_in_progress() {
                        return Err(Error::DuplicatePeer(mac.to_mac_str()));
                    }
                    debug!(
                        "peer {} attach waiting for in-progress deletion",
                        mac.to_mac_str()
                    );
                    entry.wait_on_peer_mac = Some(mac);
                    let timed_out = self
                        .peer_del_cv
                        .wait_for(&mut graph, self.cfg.peer_deletion_timeout)
                        .timed_out();
                    if timed_out {
                        // Reset the marker so a later attach is not blocked
                        // by this stale wait.
                        if let Some(entry) = graph.vdev_entry_mut(vdev_id) {
                            if entry.wait_on_peer_mac == Some(mac) {
                                entry.wait_on_peer_mac = None;
                            }
                        }
                        warn!("peer {} attach timed out", mac.to_mac_str());
                        return Err(Error::DuplicatePeerTimeout(mac.to_mac_str()));
                    }
                    // Woken: rescan, the duplicate may be gone.
                }
            }
        }
        let entry = graph.vdev_entry_mut(vdev_id).ok_or(Error::NoSuchVdev(vdev_id))?;
        let peer = Arc::new(Peer::new(mac, vdev_id));
        entry.peers.push(peer.clone());
        if &mac != entry.vdev.mac() {
            entry.last_real_peer = Some(mac);
        }
        graph.hash_insert(peer.clone());
        drop(graph);

        let local_id = self.local_ids.lock().alloc(peer.clone());
        peer.set_local_id(local_id);
        if local_id == INVALID_LOCAL_PEER_ID {
            // Degraded but functional: callers check for the sentinel.
            warn!("peer {} attached without a local id", mac.to_mac_str());
        }
        debug!("peer {} attached to vdev {}", mac.to_mac_str(), vdev_id);
        Ok(peer)
    }

    /// Begins deletion: data delivery switches to discard, the local ID is
    /// returned, back-references are cleared, and the attach reference is
    /// released. The peer is freed once the remaining references drain.
    pub fn peer_detach(&self, peer: &Arc<Peer>) {
        peer.set_rx_proc(RxProc::Discard);
        peer.invalidate();
        let local_id = peer.local_id();
        if local_id != INVALID_LOCAL_PEER_ID {
            self.local_ids.lock().free(local_id);
            peer.set_local_id(INVALID_LOCAL_PEER_ID);
        }
        {
            let mut graph = self.graph.lock();
            if let Some(entry) = graph.vdev_entry_mut(peer.vdev_id()) {
                if entry.last_real_peer.as_ref() == Some(peer.mac()) {
                    entry.last_real_peer = None;
                }
            }
            peer.delete_in_progress.store(true, Ordering::SeqCst);
        }
        self.peer_unref_delete(peer);
    }

    /// Takes an additional reference on behalf of an external holder (e.g.
    /// the firmware peer-map notification handler).
    pub fn peer_take_ref(&self, peer: &Arc<Peer>) {
        let _graph = self.graph.lock();
        peer.ref_cnt.fetch_add(1, Ordering::SeqCst);
    }

    /// Releases one reference. On the transition to zero the peer is
    /// removed from the hash and its vdev's list, queued frames are
    /// dropped, any attach blocked on this deletion is woken, and a
    /// pending vdev deletion finalizes (callback outside the lock).
    ///
    /// Releasing with a count of zero is a programming error: debug builds
    /// abort, release builds log and leave the graph untouched.
    pub fn peer_unref_delete(&self, peer: &Arc<Peer>) {
        let mut finalize: Option<(VdevDeleteCallback, u8)> = None;
        {
            let mut graph = self.graph.lock();
            let prev = peer.ref_cnt.load(Ordering::SeqCst);
            if prev == 0 {
                error!("peer {} reference underflow", peer.mac().to_mac_str());
                debug_assert!(false, "peer reference underflow");
                return;
            }
            peer.ref_cnt.store(prev - 1, Ordering::SeqCst);
            if prev != 1 {
                return;
            }
            graph.hash_remove(peer);
            let mut pending_vdev = None;
            if let Some(entry) = graph.vdev_entry_mut(peer.vdev_id()) {
                entry.peers.retain(|p| !Arc::ptr_eq(p, peer));
                if entry.wait_on_peer_mac.as_ref() == Some(peer.mac()) {
                    entry.wait_on_peer_mac = None;
                    self.peer_del_cv.notify_all();
                }
                if entry.peers.is_empty() {
                    if let Some(cb) = entry.delete_pending.take() {
                        pending_vdev = Some((cb, entry.vdev.id()));
                    }
                }
            }
            if let Some((cb, vdev_id)) = pending_vdev {
                graph.vdevs.retain(|e| e.vdev.id() != vdev_id);
                finalize = Some((cb, vdev_id));
            }
            peer.flush_tid_queues();
            debug!("peer {} deleted", peer.mac().to_mac_str());
        }
        if let Some((cb, vdev_id)) = finalize {
            self.device.vdev_detach(vdev_id);
            cb(vdev_id);
        }
    }

    // ---- peer lookup ----

    /// Looks up a peer by MAC and takes a reference. The caller must pair
    /// this with `peer_unref_delete`.
    pub fn peer_find(&self, mac: &MacAddr) -> Option<Arc<Peer>> {
        let graph = self.graph.lock();
        let peer = graph.peer_hash.get(mac)?.last()?.clone();
        peer.ref_cnt.fetch_add(1, Ordering::SeqCst);
        Some(peer)
    }

    /// Indexed lookup through the local-ID table; takes a reference like
    /// `peer_find`.
    pub fn peer_find_by_local_id(&self, local_id: u16) -> Option<Arc<Peer>> {
        let peer = self.local_ids.lock().lookup(local_id)?;
        let graph = self.graph.lock();
        // The ID may have been freed and the peer removed between the two
        // locks; only hand out peers still present in the hash.
        let present = graph
            .peer_hash
            .get(peer.mac())
            .map_or(false, |bucket| bucket.iter().any(|p| Arc::ptr_eq(p, &peer)));
        if !present {
            return None;
        }
        peer.ref_cnt.fetch_add(1, Ordering::SeqCst);
        Some(peer)
    }

    // ---- peer state ----

    /// Advances the peer state machine. Being handed the current state
    /// again is a no-op beyond dropping the lookup reference. Entering
    /// `auth` with host-managed ADDBA pauses the QoS TID queues and
    /// unpauses the management/non-QoS range until negotiation completes.
    pub fn peer_state_update(&self, mac: &MacAddr, state: PeerState) -> Result<()> {
        let peer =
            self.peer_find(mac).ok_or_else(|| Error::PeerNotFound(mac.to_mac_str()))?;
        let current = peer.state();
        if current == state {
            self.peer_unref_delete(&peer);
            return Ok(());
        }
        if state < current {
            warn!(
                "peer {} state moving backward: {} -> {}",
                mac.to_mac_str(),
                current.name(),
                state.name()
            );
        }
        if state == PeerState::Auth && self.cfg.host_addba {
            for tid in 0..NUM_DATA_TIDS {
                peer.pause_tid(tid);
            }
            for tid in NUM_DATA_TIDS..NUM_TID_QUEUES {
                peer.unpause_tid(tid);
            }
        }
        debug!("peer {} state {} -> {}", mac.to_mac_str(), current.name(), state.name());
        peer.set_state(state);
        self.device.send_peer_qos_update(peer.mac(), peer.qos_capable());
        self.peer_unref_delete(&peer);
        Ok(())
    }

    pub fn peer_update_qos_capable(&self, mac: &MacAddr, qos_capable: bool) -> Result<()> {
        let peer =
            self.peer_find(mac).ok_or_else(|| Error::PeerNotFound(mac.to_mac_str()))?;
        peer.set_qos_capable(qos_capable);
        self.device.send_peer_qos_update(peer.mac(), qos_capable);
        self.peer_unref_delete(&peer);
        Ok(())
    }

    pub fn peer_update_uapsd_mask(&self, mac: &MacAddr, mask: u8) -> Result<()> {
        let peer =
            self.peer_find(mac).ok_or_else(|| Error::PeerNotFound(mac.to_mac_str()))?;
        peer.set_uapsd_mask(mask);
        self.device.send_peer_uapsd_mask(peer.mac(), mask);
        self.peer_unref_delete(&peer);
        Ok(())
    }

    pub fn last_real_peer(&self, vdev_id: u8) -> Option<MacAddr> {
        let mut graph = self.graph.lock();
        graph.vdev_entry_mut(vdev_id).and_then(|e| e.last_real_peer)
    }

    // ---- descriptors & credit ----

    pub fn tx_desc_alloc(&self) -> Option<DescId> {
        self.pool.lock().as_mut()?.alloc()
    }

    pub fn tx_desc_free(&self, id: DescId) {
        if let Some(pool) = self.pool.lock().as_mut() {
            pool.free(id);
        }
    }

    pub fn tx_credit(&self) -> usize {
        self.pool.lock().as_ref().map_or(0, |p| p.num_free())
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.lock().as_ref().map(|p| p.stats())
    }

    /// Global target credit counter, updated from firmware credit reports.
    pub fn target_credit_update(&self, delta: i32) {
        self.target_tx_credit.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn target_credit(&self) -> i32 {
        self.target_tx_credit.load(Ordering::SeqCst)
    }

    // ---- teardown ----

    /// Tears down the pdev. Refuses while vdevs remain unless `force`, in
    /// which case remaining ("zombie") peers that never saw their unmap
    /// notification are erased directly. The descriptor pool is freed only
    /// after the device confirms tx quiescence.
    pub fn detach(&self, force: bool) -> Result<()> {
        {
            let mut graph = self.graph.lock();
            if !graph.vdevs.is_empty() {
                if !force {
                    debug_assert!(false, "pdev detach with {} vdevs attached", graph.vdevs.len());
                    return Err(Error::PdevBusy(graph.vdevs.len()));
                }
                let peers: Vec<Arc<Peer>> =
                    graph.peer_hash.values().flatten().cloned().collect();
                for peer in &peers {
                    warn!("erasing zombie peer {}", peer.mac().to_mac_str());
                    let local_id = peer.local_id();
                    if local_id != INVALID_LOCAL_PEER_ID {
                        self.local_ids.lock().free(local_id);
                    }
                    peer.flush_tid_queues();
                }
                graph.peer_hash.clear();
                graph.vdevs.clear();
            }
        }
        self.device.wait_tx_quiescence();
        if let Some(pool) = self.pool.lock().take() {
            pool.teardown(&self.device);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_utils::FakeDevice;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    const VDEV_MAC: MacAddr = [2, 0, 0, 0, 0, 0xAA];
    const PEER_MAC: MacAddr = [2, 0, 0, 0, 0, 1];

    fn test_config() -> PdevConfig {
        PdevConfig {
            sizing: PoolSizing::LowLatency { target_credits: 8 },
            peer_deletion_timeout: Duration::from_millis(20),
            ..PdevConfig::default()
        }
    }

    fn pdev_with_vdev() -> Arc<Pdev<FakeDevice>> {
        let pdev = Pdev::new(FakeDevice::new(), test_config()).expect("pdev");
        pdev.vdev_attach(0, VDEV_MAC, OpMode::Ap).expect("vdev");
        pdev
    }

    #[test]
    fn peer_attach_and_lookup() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        assert_eq!(peer.ref_cnt(), 2);
        assert_ne!(peer.local_id(), INVALID_LOCAL_PEER_ID);
        assert_eq!(pdev.last_real_peer(0), Some(PEER_MAC));

        let found = pdev.peer_find(&PEER_MAC).expect("lookup");
        assert!(Arc::ptr_eq(&found, &peer));
        assert_eq!(peer.ref_cnt(), 3);
        pdev.peer_unref_delete(&found);

        let by_id = pdev.peer_find_by_local_id(peer.local_id()).expect("lookup by id");
        assert!(Arc::ptr_eq(&by_id, &peer));
        pdev.peer_unref_delete(&by_id);
        assert_eq!(peer.ref_cnt(), 2);
    }

    #[test]
    fn duplicate_live_peer_fails_immediately() {
        let pdev = pdev_with_vdev();
        let _peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        assert_eq!(
            pdev.peer_attach(0, PEER_MAC).err(),
            Some(Error::DuplicatePeer(PEER_MAC.to_mac_str()))
        );
    }

    #[test]
    fn peer_freed_exactly_once_after_detach_and_unmap() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        let local_id = peer.local_id();
        pdev.peer_detach(&peer);
        // The anticipated map reference still holds the peer in the graph.
        assert_eq!(peer.ref_cnt(), 1);
        assert!(peer.delete_in_progress());
        assert!(pdev.peer_find_by_local_id(local_id).is_none());
        assert!(pdev.peer_find(&PEER_MAC).is_some_and_released(&pdev));

        // Simulated unmap notification releases the last reference.
        pdev.peer_unref_delete(&peer);
        assert_eq!(peer.ref_cnt(), 0);
        assert!(pdev.peer_find(&PEER_MAC).is_none());
        // Only the test's Arc keeps the struct alive now.
        assert_eq!(Arc::strong_count(&peer), 1);
    }

    // Helper so the mid-deletion lookup above reads naturally: a peer that
    // is mid-deletion is still findable until the last reference drops.
    trait FindAndRelease {
        fn is_some_and_released(self, pdev: &Pdev<FakeDevice>) -> bool;
    }
    impl FindAndRelease for Option<Arc<Peer>> {
        fn is_some_and_released(self, pdev: &Pdev<FakeDevice>) -> bool {
            match self {
                Some(peer) => {
                    pdev.peer_unref_delete(&peer);
                    true
                }
                None => false,
            }
        }
    }

    #[test]
    fn duplicate_attach_times_out_while_deletion_stalls() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        pdev.peer_detach(&peer);
        // Unmap never arrives: the duplicate attach waits, then fails.
        assert_eq!(
            pdev.peer_attach(0, PEER_MAC).err(),
            Some(Error::DuplicatePeerTimeout(PEER_MAC.to_mac_str()))
        );
        // The stale wait marker was reset; a later attach fails fast once
        // the deletion finally completes.
        pdev.peer_unref_delete(&peer);
        assert!(pdev.peer_attach(0, PEER_MAC).is_ok());
    }

    #[test]
    fn duplicate_attach_succeeds_once_deletion_completes() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        pdev.peer_detach(&peer);

        let attacher = {
            let pdev = pdev.clone();
            thread::spawn(move || pdev.peer_attach(0, PEER_MAC))
        };
        thread::sleep(Duration::from_millis(5));
        pdev.peer_unref_delete(&peer);
        let reattached = attacher.join().expect("join").expect("attach after deletion");
        assert_eq!(reattached.mac(), &PEER_MAC);
    }

    #[test]
    fn vdev_deferred_delete_fires_once_on_last_peer_release() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        let calls = Arc::new(AtomicU32::new(0));
        let cb_calls = calls.clone();
        let state = pdev
            .vdev_detach(
                0,
                Box::new(move |vdev_id| {
                    assert_eq!(vdev_id, 0);
                    cb_calls.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("detach request");
        assert_eq!(state, VdevDetachState::Deferred);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        pdev.peer_detach(&peer);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        pdev.peer_unref_delete(&peer);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pdev.device().vdevs_detached.lock().as_slice(), &[0]);
    }

    #[test]
    fn vdev_detach_without_peers_is_synchronous() {
        let pdev = pdev_with_vdev();
        let calls = Arc::new(AtomicU32::new(0));
        let cb_calls = calls.clone();
        let state = pdev
            .vdev_detach(0, Box::new(move |_| {
                cb_calls.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("detach");
        assert_eq!(state, VdevDetachState::Detached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn auth_with_host_addba_pauses_qos_tids_only() {
        let mut cfg = test_config();
        cfg.host_addba = true;
        let pdev = Pdev::new(FakeDevice::new(), cfg).expect("pdev");
        pdev.vdev_attach(0, VDEV_MAC, OpMode::Ap).expect("vdev");
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");

        pdev.peer_state_update(&PEER_MAC, PeerState::Disc).expect("disc");
        pdev.peer_state_update(&PEER_MAC, PeerState::Conn).expect("conn");
        pdev.peer_state_update(&PEER_MAC, PeerState::Auth).expect("auth");

        for tid in 0..NUM_DATA_TIDS {
            assert!(peer.tid_paused(tid), "QoS tid {} should be paused", tid);
        }
        for tid in NUM_DATA_TIDS..NUM_TID_QUEUES {
            assert!(!peer.tid_paused(tid), "mgmt tid {} should be unpaused", tid);
        }
        assert_eq!(peer.state(), PeerState::Auth);
    }

    #[test]
    fn same_state_update_is_a_noop() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        pdev.peer_state_update(&PEER_MAC, PeerState::Conn).expect("conn");
        let refs_before = peer.ref_cnt();
        pdev.peer_state_update(&PEER_MAC, PeerState::Conn).expect("conn again");
        // The lookup reference taken by the update was released.
        assert_eq!(peer.ref_cnt(), refs_before);
        assert_eq!(peer.state(), PeerState::Conn);
    }

    #[test]
    fn pdev_detach_refuses_with_vdevs_then_forces() {
        let pdev = pdev_with_vdev();
        let peer = pdev.peer_attach(0, PEER_MAC).expect("attach");
        // Leave the peer as a zombie (no detach, no unmap).
        if cfg!(not(debug_assertions)) {
            assert_eq!(pdev.detach(false).err(), Some(Error::PdevBusy(1)));
        }
        pdev.detach(true).expect("forced detach");
        assert!(pdev.peer_find(&PEER_MAC).is_none());
        assert!(pdev.tx_desc_alloc().is_none());
        // All 8 hardware descriptors were returned.
        assert_eq!(pdev.device().freed.lock().len(), 8);
        drop(peer);
    }

    #[test]
    fn local_id_exhaustion_degrades_gracefully() {
        let mut cfg = test_config();
        cfg.num_local_peer_ids = 2;
        let pdev = Pdev::new(FakeDevice::new(), cfg).expect("pdev");
        pdev.vdev_attach(0, VDEV_MAC, OpMode::Ap).expect("vdev");
        let a = pdev.peer_attach(0, [2, 0, 0, 0, 0, 1]).expect("a");
        let b = pdev.peer_attach(0, [2, 0, 0, 0, 0, 2]).expect("b");
        let c = pdev.peer_attach(0, [2, 0, 0, 0, 0, 3]).expect("c");
        assert_ne!(a.local_id(), INVALID_LOCAL_PEER_ID);
        assert_ne!(b.local_id(), INVALID_LOCAL_PEER_ID);
        assert_eq!(c.local_id(), INVALID_LOCAL_PEER_ID);
        // The id-less peer is still fully findable by MAC.
        assert!(pdev.peer_find(&[2, 0, 0, 0, 0, 3]).is_some_and_released(&pdev));
    }

    #[test]
    fn tx_descriptors_through_pdev() {
        let pdev = pdev_with_vdev();
        assert_eq!(pdev.tx_credit(), 8);
        let id = pdev.tx_desc_alloc().expect("desc");
        assert_eq!(pdev.tx_credit(), 7);
        pdev.tx_desc_free(id);
        assert_eq!(pdev.tx_credit(), 8);
        assert_eq!(pdev.pool_stats().unwrap().size, 8);

        pdev.target_credit_update(3);
        pdev.target_credit_update(-1);
        assert_eq!(pdev.target_credit(), 2);
    }
}
