// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fixed-capacity allocator mapping peers to small integer IDs for O(1)
//! indexed lookup on the data path.
//!
//! The free list is intrusive: `free_list[i]` holds the index of the next
//! free slot, terminated by the capacity value itself. No heap allocation
//! happens after construction.

use log::warn;

/// Sentinel returned when the table is exhausted. Peers carrying this ID are
/// functional but cannot be looked up by index.
pub const INVALID_LOCAL_PEER_ID: u16 = 0xFFFF;

pub struct LocalPeerIdTable<T> {
    free_list: Vec<u16>,
    free_head: u16,
    map: Vec<Option<T>>,
}

impl<T: Clone> LocalPeerIdTable<T> {
    pub fn new(capacity: u16) -> Self {
        assert!(capacity < INVALID_LOCAL_PEER_ID);
        // Slot i links to i + 1; the last slot links to `capacity`, the
        // terminator.
        let free_list = (1..=capacity).collect();
        LocalPeerIdTable { free_list, free_head: 0, map: vec![None; capacity as usize] }
    }

    pub fn capacity(&self) -> u16 {
        self.free_list.len() as u16
    }

    /// Pops the head of the free list and records `value` for lookup.
    /// Returns `INVALID_LOCAL_PEER_ID` when the table is exhausted.
    pub fn alloc(&mut self, value: T) -> u16 {
        let id = self.free_head;
        if id == self.capacity() {
            return INVALID_LOCAL_PEER_ID;
        }
        self.free_head = self.free_list[id as usize];
        self.map[id as usize] = Some(value);
        id
    }

    /// Returns `id` to the free list. Freeing an ID that is out of range or
    /// not currently allocated is a no-op; it signals a logic bug upstream
    /// and is logged as such.
    pub fn free(&mut self, id: u16) {
        if id == INVALID_LOCAL_PEER_ID {
            return;
        }
        if id >= self.capacity() {
            warn!("local peer id {} out of range; ignoring free", id);
            debug_assert!(false, "freed out-of-range local peer id {}", id);
            return;
        }
        if self.map[id as usize].take().is_none() {
            warn!("local peer id {} double-freed", id);
            debug_assert!(false, "double free of local peer id {}", id);
            return;
        }
        self.free_list[id as usize] = self.free_head;
        self.free_head = id;
    }

    pub fn lookup(&self, id: u16) -> Option<T> {
        if id >= self.capacity() {
            return None;
        }
        self.map[id as usize].clone()
    }
}
