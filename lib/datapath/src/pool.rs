// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pre-sized pool of transmit descriptors with credit accounting.
//!
//! Each pool entry owns one hardware transfer descriptor for the lifetime of
//! the pool. `num_free` is the authoritative credit count: an external
//! flow-control collaborator compares it against the low/high watermarks to
//! pause or resume the OS transmit queue. The pool itself never makes that
//! decision.

use crate::device::{Device, HwDescHandle};
use crate::error::{Error, Result};
use log::{info, warn};

pub const MIN_POOL_SIZE: usize = 64;
pub const MAX_POOL_SIZE: usize = 4096;

/// Assumed end-to-end latency budget used by the latency-tolerant sizing
/// formula.
const LATENCY_BUDGET_MS: usize = 6;
const SIZING_SAFETY_FACTOR: usize = 8;

const LOW_WATERMARK_PERCENT: usize = 5;
const HIGH_WATERMARK_PERCENT: usize = 15;

#[derive(Debug, Clone)]
pub enum PoolSizing {
    /// Size from configured throughput and average frame size so that
    /// `LATENCY_BUDGET_MS` worth of frames (times a safety factor) fit,
    /// clamped to `[MIN_POOL_SIZE, MAX_POOL_SIZE]`.
    LatencyTolerant {
        throughput_mbps: usize,
        avg_frame_bytes: usize,
        /// Watermark percentages, separately tuned when a per-vdev pool
        /// variant is configured. `None` selects the 5%/15% defaults.
        watermark_percent: Option<(usize, usize)>,
    },
    /// Size to exactly the credit count the target advertises so the host
    /// never over-allocates versus hardware capacity. No watermark-based
    /// flow control in this mode.
    LowLatency { target_credits: usize },
}

impl PoolSizing {
    fn pool_size(&self) -> usize {
        match self {
            PoolSizing::LatencyTolerant { throughput_mbps, avg_frame_bytes, .. } => {
                // Multiply everything out before dividing; dividing at each
                // step truncates away frames that still fit in the budget.
                let in_flight = throughput_mbps * 1_000_000 * LATENCY_BUDGET_MS
                    * SIZING_SAFETY_FACTOR
                    / 8
                    / 1000
                    / (*avg_frame_bytes).max(1);
                in_flight.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
            }
            PoolSizing::LowLatency { target_credits } => *target_credits,
        }
    }

    fn watermarks(&self, size: usize) -> (usize, usize) {
        match self {
            PoolSizing::LatencyTolerant { watermark_percent, .. } => {
                let (low, high) =
                    watermark_percent.unwrap_or((LOW_WATERMARK_PERCENT, HIGH_WATERMARK_PERCENT));
                (size * low / 100, size * high / 100)
            }
            PoolSizing::LowLatency { .. } => (0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescId(usize);

struct Slot {
    hw: HwDescHandle,
    next_free: usize,
    outstanding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolStats {
    pub size: usize,
    pub num_free: usize,
    pub outstanding: usize,
}

pub struct TxDescPool {
    slots: Vec<Slot>,
    // Index of the first free slot; equals `slots.len()` when exhausted.
    free_head: usize,
    num_free: usize,
    low_watermark: usize,
    high_watermark: usize,
}

impl TxDescPool {
    /// Allocates the backing store and one hardware descriptor per entry.
    /// Any hardware allocation failure unwinds every previously allocated
    /// handle and fails construction; this is fatal and synchronous.
    pub fn new(sizing: &PoolSizing, device: &dyn Device) -> Result<Self> {
        let size = sizing.pool_size();
        let (low_watermark, high_watermark) = sizing.watermarks(size);
        let mut slots = Vec::with_capacity(size);
        for i in 0..size {
            match device.alloc_hw_descriptor() {
                Some(hw) => slots.push(Slot { hw, next_free: i + 1, outstanding: false }),
                None => {
                    warn!("hw descriptor alloc failed at {}/{}; unwinding pool", i, size);
                    for slot in &slots {
                        device.free_hw_descriptor(slot.hw);
                    }
                    return Err(Error::HwDescAlloc(i));
                }
            }
        }
        info!(
            "tx desc pool: {} entries, watermarks low={} high={}",
            size, low_watermark, high_watermark
        );
        Ok(TxDescPool { slots, free_head: 0, num_free: size, low_watermark, high_watermark })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn num_free(&self) -> usize {
        self.num_free
    }

    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }

    pub fn high_watermark(&self) -> usize {
        self.high_watermark
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.slots.len(),
            num_free: self.num_free,
            outstanding: self.slots.len() - self.num_free,
        }
    }

    /// Pops a descriptor from the freelist, or `None` when out of credit.
    pub fn alloc(&mut self) -> Option<DescId> {
        if self.free_head == self.slots.len() {
            return None;
        }
        let id = self.free_head;
        let slot = &mut self.slots[id];
        self.free_head = slot.next_free;
        slot.outstanding = true;
        self.num_free -= 1;
        Some(DescId(id))
    }

    /// Returns a descriptor to the freelist and restores one credit.
    pub fn free(&mut self, id: DescId) {
        let DescId(index) = id;
        let slot = &mut self.slots[index];
        if !slot.outstanding {
            warn!("tx descriptor {} freed while not outstanding", index);
            debug_assert!(false, "double free of tx descriptor {}", index);
            return;
        }
        slot.outstanding = false;
        slot.next_free = self.free_head;
        self.free_head = index;
        self.num_free += 1;
    }

    pub fn hw_handle(&self, id: DescId) -> HwDescHandle {
        self.slots[id.0].hw
    }

    /// Releases every hardware descriptor. Entries still attached to
    /// in-flight frames are force-completed with an error status first so
    /// no handle is ever leaked.
    pub fn teardown(self, device: &dyn Device) {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.outstanding {
                warn!("tx descriptor {} outstanding at teardown; forcing error completion", index);
                device.complete_with_error(slot.hw);
            }
            device.free_hw_descriptor(slot.hw);
        }
    }
}
