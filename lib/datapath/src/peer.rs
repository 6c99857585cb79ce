// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Remote-station (peer) objects. Lifetime is governed by an explicit
//! reference-count protocol driven from [`crate::pdev::Pdev`]; per-TID
//! transmit queues pause and resume with peer authentication state.

use crate::peer_id::INVALID_LOCAL_PEER_ID;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};
use wlan_common::mac::MacAddr;

/// QoS TIDs 0..16 carry regular data traffic.
pub const NUM_DATA_TIDS: usize = 16;
/// Queues 16..24 carry management and non-QoS traffic.
pub const NUM_TID_QUEUES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PeerState {
    Invalid = 0,
    Disc = 1,
    Conn = 2,
    Auth = 3,
}

impl PeerState {
    fn from_u8(value: u8) -> PeerState {
        match value {
            1 => PeerState::Disc,
            2 => PeerState::Conn,
            3 => PeerState::Auth,
            _ => PeerState::Invalid,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PeerState::Invalid => "invalid",
            PeerState::Disc => "disc",
            PeerState::Conn => "conn",
            PeerState::Auth => "auth",
        }
    }
}

/// Disposition of received data destined for this peer. Switched to
/// `Discard` at detach so late rx completions are dropped instead of
/// delivered through a dying peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxProc {
    Deliver,
    Discard,
}

struct TidQueue {
    paused: AtomicBool,
    frames: Mutex<VecDeque<Vec<u8>>>,
}

impl TidQueue {
    fn new() -> Self {
        TidQueue { paused: AtomicBool::new(false), frames: Mutex::new(VecDeque::new()) }
    }
}

pub struct Peer {
    mac: MacAddr,
    vdev_id: u8,
    local_id: AtomicU16,
    pub(crate) ref_cnt: AtomicU32,
    state: AtomicU8,
    valid: AtomicBool,
    pub(crate) delete_in_progress: AtomicBool,
    qos_capable: AtomicBool,
    uapsd_mask: AtomicU8,
    rx_proc: AtomicU8,
    tid_queues: Vec<TidQueue>,
}

impl Peer {
    /// The initial count of 2 covers the caller's attach reference and the
    /// anticipated external peer-map notification.
    pub(crate) fn new(mac: MacAddr, vdev_id: u8) -> Self {
        Peer {
            mac,
            vdev_id,
            local_id: AtomicU16::new(INVALID_LOCAL_PEER_ID),
            ref_cnt: AtomicU32::new(2),
            state: AtomicU8::new(PeerState::Invalid as u8),
            valid: AtomicBool::new(true),
            delete_in_progress: AtomicBool::new(false),
            qos_capable: AtomicBool::new(false),
            uapsd_mask: AtomicU8::new(0),
            rx_proc: AtomicU8::new(RxProc::Deliver as u8),
            tid_queues: (0..NUM_TID_QUEUES).map(|_| TidQueue::new()).collect(),
        }
    }

    pub fn mac(&self) -> &MacAddr {
        &self.mac
    }

    pub fn vdev_id(&self) -> u8 {
        self.vdev_id
    }

    pub fn local_id(&self) -> u16 {
        self.local_id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_local_id(&self, id: u16) {
        self.local_id.store(id, Ordering::SeqCst);
    }

    pub fn state(&self) -> PeerState {
        PeerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: PeerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn ref_cnt(&self) -> u32 {
        self.ref_cnt.load(Ordering::SeqCst)
    }

    pub fn delete_in_progress(&self) -> bool {
        self.delete_in_progress.load(Ordering::SeqCst)
    }

    pub fn qos_capable(&self) -> bool {
        self.qos_capable.load(Ordering::SeqCst)
    }

    pub(crate) fn set_qos_capable(&self, qos: bool) {
        self.qos_capable.store(qos, Ordering::SeqCst);
    }

    pub fn uapsd_mask(&self) -> u8 {
        self.uapsd_mask.load(Ordering::SeqCst)
    }

    pub(crate) fn set_uapsd_mask(&self, mask: u8) {
        self.uapsd_mask.store(mask, Ordering::SeqCst);
    }

    pub fn rx_proc(&self) -> RxProc {
        if self.rx_proc.load(Ordering::SeqCst) == RxProc::Discard as u8 {
            RxProc::Discard
        } else {
            RxProc::Deliver
        }
    }

    pub(crate) fn set_rx_proc(&self, proc: RxProc) {
        self.rx_proc.store(proc as u8, Ordering::SeqCst);
    }

    pub fn tid_paused(&self, tid: usize) -> bool {
        self.tid_queues[tid].paused.load(Ordering::SeqCst)
    }

    pub fn pause_tid(&self, tid: usize) {
        self.tid_queues[tid].paused.store(true, Ordering::SeqCst);
    }

    pub fn unpause_tid(&self, tid: usize) {
        self.tid_queues[tid].paused.store(false, Ordering::SeqCst);
    }

    pub fn tid_enqueue(&self, tid: usize, frame: Vec<u8>) {
        self.tid_queues[tid].frames.lock().push_back(frame);
    }

    pub fn tid_queue_depth(&self, tid: usize) -> usize {
        self.tid_queues[tid].frames.lock().len()
    }

    /// Drops every queued frame. Run as part of final deletion.
    pub(crate) fn flush_tid_queues(&self) {
        for queue in &self.tid_queues {
            queue.frames.lock().clear();
        }
    }
}
