// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Common types shared by the WLAN datapath and security libraries: MAC
//! address helpers and length-checked buffer reading.

pub mod buffer_reader;
pub mod mac;

pub use buffer_reader::BufferReader;

/// Asserts that an expression matches a pattern and optionally runs a block
/// with the pattern's bindings.
///
/// # Examples
///
/// ```
/// use wlan_common::assert_variant;
///
/// let result: Result<u8, ()> = Ok(5);
/// assert_variant!(result, Ok(5));
/// assert_variant!(result, Ok(x) => assert_eq!(x, 5));
/// ```
#[macro_export]
macro_rules! assert_variant {
    ($test:expr, $variant:pat $( | $others:pat)*) => {
        match $test {
            $variant $(| $others)* => {}
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    ($test:expr, $variant:pat $( | $others:pat)* => $e:expr) => {
        match $test {
            $variant $(| $others)* => $e,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
}
