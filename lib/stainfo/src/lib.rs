// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Host-side registry of per-station records, keyed by MAC address.
//!
//! Independent of the datapath peer graph but follows the same design:
//! explicit reference counts decide when a record is unlinked and its
//! cached buffers freed. In addition to the total count, every reference
//! is tagged with the call site that took it (a debug ID); the per-ID
//! counters exist purely for leak diagnosis.

use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use wlan_common::mac::{MacAddr, MacFmt};

/// Call sites that may hold station references. Over-releasing any one of
/// these is a bug the per-ID counters make attributable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum DbgId {
    Attach = 0,
    GetByMac = 1,
    ForEach = 2,
    Connect = 3,
    Disconnect = 4,
    SoftapTx = 5,
    SoftapRx = 6,
    GetStats = 7,
    AssocInd = 8,
}

pub const NUM_DBG_IDS: usize = 9;

/// Station crypto handshake progress, mirrored for the host driver layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CryptoPhase {
    None = 0,
    Connecting = 1,
    Authenticated = 2,
}

pub struct StaInfo {
    mac: MacAddr,
    is_attached: AtomicBool,
    ref_cnt: AtomicU32,
    ref_cnt_dbg: [AtomicU32; NUM_DBG_IDS],
    crypto_phase: AtomicU32,
    /// Association request IEs cached for later queries; freed exactly
    /// once, when the last reference drops.
    pub assoc_req_ies: Mutex<Option<Vec<u8>>>,
    pub tx_packets: AtomicU64,
    pub rx_packets: AtomicU64,
    pub tx_rate_kbps: AtomicU32,
    pub rx_rate_kbps: AtomicU32,
}

impl StaInfo {
    pub fn new(mac: MacAddr) -> Arc<Self> {
        Arc::new(StaInfo {
            mac,
            is_attached: AtomicBool::new(false),
            ref_cnt: AtomicU32::new(0),
            ref_cnt_dbg: Default::default(),
            crypto_phase: AtomicU32::new(CryptoPhase::None as u32),
            assoc_req_ies: Mutex::new(None),
            tx_packets: AtomicU64::new(0),
            rx_packets: AtomicU64::new(0),
            tx_rate_kbps: AtomicU32::new(0),
            rx_rate_kbps: AtomicU32::new(0),
        })
    }

    pub fn mac(&self) -> &MacAddr {
        &self.mac
    }

    pub fn is_attached(&self) -> bool {
        self.is_attached.load(Ordering::SeqCst)
    }

    pub fn ref_cnt(&self) -> u32 {
        self.ref_cnt.load(Ordering::SeqCst)
    }

    pub fn ref_cnt_dbg(&self, dbgid: DbgId) -> u32 {
        self.ref_cnt_dbg[dbgid as usize].load(Ordering::SeqCst)
    }

    pub fn crypto_phase(&self) -> CryptoPhase {
        match self.crypto_phase.load(Ordering::SeqCst) {
            1 => CryptoPhase::Connecting,
            2 => CryptoPhase::Authenticated,
            _ => CryptoPhase::None,
        }
    }

    pub fn set_crypto_phase(&self, phase: CryptoPhase) {
        self.crypto_phase.store(phase as u32, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct StaInfoContainer {
    list: Mutex<Vec<Arc<StaInfo>>>,
}

impl StaInfoContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.lock().is_empty()
    }

    /// Registers a station: takes the initial reference (tagged `Attach`),
    /// pushes to the front of the list, and marks it attached.
    pub fn attach(&self, info: Arc<StaInfo>) {
        let mut list = self.list.lock();
        info.ref_cnt.fetch_add(1, Ordering::SeqCst);
        info.ref_cnt_dbg[DbgId::Attach as usize].fetch_add(1, Ordering::SeqCst);
        info.is_attached.store(true, Ordering::SeqCst);
        list.insert(0, info);
    }

    /// Logical inverse of `attach`: clears the attached flag and releases
    /// the attach reference. Detaching an already-detached record is a
    /// logged no-op.
    pub fn detach(&self, info: &mut Option<Arc<StaInfo>>) {
        let mut list = self.list.lock();
        let attached = match info {
            Some(sta) => sta.is_attached.swap(false, Ordering::SeqCst),
            None => {
                warn!("detach called without a station reference");
                return;
            }
        };
        if !attached {
            warn!("station already detached");
            return;
        }
        self.put_ref_locked(&mut list, info, DbgId::Attach);
    }

    /// Linear scan by MAC under the container lock; on a match, takes a
    /// reference tagged with the caller's debug ID.
    pub fn get_by_mac(&self, mac: &MacAddr, dbgid: DbgId) -> Option<Arc<StaInfo>> {
        let list = self.list.lock();
        let sta = list.iter().find(|sta| sta.mac() == mac)?.clone();
        sta.ref_cnt.fetch_add(1, Ordering::SeqCst);
        sta.ref_cnt_dbg[dbgid as usize].fetch_add(1, Ordering::SeqCst);
        Some(sta)
    }

    /// Takes an additional reference. No lock needed: the caller already
    /// holds a valid reference, so the record cannot be destroyed
    /// concurrently.
    pub fn take_ref(&self, info: &Arc<StaInfo>, dbgid: DbgId) {
        info.ref_cnt.fetch_add(1, Ordering::SeqCst);
        info.ref_cnt_dbg[dbgid as usize].fetch_add(1, Ordering::SeqCst);
    }

    /// Releases one reference tagged `dbgid` and nulls the caller's
    /// pointer. On the transition to zero the record is unlinked, its
    /// cached association-request IEs freed, and its MAC logged.
    pub fn put_ref(&self, info: &mut Option<Arc<StaInfo>>, dbgid: DbgId) {
        let mut list = self.list.lock();
        self.put_ref_locked(&mut list, info, dbgid);
    }

    fn put_ref_locked(
        &self,
        list: &mut Vec<Arc<StaInfo>>,
        info: &mut Option<Arc<StaInfo>>,
        dbgid: DbgId,
    ) {
        let sta = match info.take() {
            Some(sta) => sta,
            None => {
                warn!("put_ref called without a station reference");
                return;
            }
        };
        let dbg = sta.ref_cnt_dbg[dbgid as usize].load(Ordering::SeqCst);
        if dbg == 0 {
            error!(
                "station {} over-released for debug id {:?}",
                sta.mac().to_mac_str(),
                dbgid
            );
            debug_assert!(false, "station reference over-release: {:?}", dbgid);
            return;
        }
        sta.ref_cnt_dbg[dbgid as usize].store(dbg - 1, Ordering::SeqCst);

        let total = sta.ref_cnt.load(Ordering::SeqCst);
        debug_assert!(total > 0, "total station reference underflow");
        sta.ref_cnt.store(total.saturating_sub(1), Ordering::SeqCst);
        if total == 1 {
            info!("station {} destroyed", sta.mac().to_mac_str());
            sta.assoc_req_ies.lock().take();
            list.retain(|p| !Arc::ptr_eq(p, &sta));
        }
    }

    /// Iterates with a reference held on every yielded record, so the
    /// caller may detach or release the current element mid-iteration.
    pub fn iter(&self, dbgid: DbgId) -> StaInfoIter<'_> {
        let list = self.list.lock();
        let snapshot: Vec<Arc<StaInfo>> = list.iter().cloned().collect();
        for sta in &snapshot {
            sta.ref_cnt.fetch_add(1, Ordering::SeqCst);
            sta.ref_cnt_dbg[dbgid as usize].fetch_add(1, Ordering::SeqCst);
        }
        StaInfoIter { container: self, snapshot, index: 0, next_unreleased: 0, dbgid }
    }
}

/// Iterator over a locked snapshot of the registry. A reference is held on
/// each element until the iterator advances past it (or is dropped), so
/// concurrent deletion of the current element is safe. Callers that keep a
/// yielded record beyond the iteration must `take_ref` it themselves.
pub struct StaInfoIter<'a> {
    container: &'a StaInfoContainer,
    snapshot: Vec<Arc<StaInfo>>,
    index: usize,
    next_unreleased: usize,
    dbgid: DbgId,
}

impl Iterator for StaInfoIter<'_> {
    type Item = Arc<StaInfo>;

    fn next(&mut self) -> Option<Arc<StaInfo>> {
        while self.next_unreleased < self.index {
            let mut prev = Some(self.snapshot[self.next_unreleased].clone());
            self.container.put_ref(&mut prev, self.dbgid);
            self.next_unreleased += 1;
        }
        let item = self.snapshot.get(self.index)?.clone();
        self.index += 1;
        Some(item)
    }
}

impl Drop for StaInfoIter<'_> {
    fn drop(&mut self) {
        while self.next_unreleased < self.snapshot.len() {
            let mut sta = Some(self.snapshot[self.next_unreleased].clone());
            self.container.put_ref(&mut sta, self.dbgid);
            self.next_unreleased += 1;
        }
    }
}
