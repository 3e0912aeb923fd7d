// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! HyperLogLog sketch implementation for cardinality estimation.
//!
//! This module provides a probabilistic data structure for estimating the cardinality
//! (number of distinct elements) of large datasets with high accuracy and low memory usage.
//!
//! # Overview
//!
//! The sketch state is always a serialized image: a fixed preamble followed by a
//! mode-specific payload. Storage adapts to cardinality:
//!
//! - **List mode**: up to 8 coupons, stored in arrival order
//! - **Set mode**: an open-addressed hash table of coupons
//! - **HLL mode**: a dense register array
//!
//! Promotion from one mode to the next rewrites the image in place, so a
//! sketch wrapped around a caller buffer never leaves that buffer.
//!
//! # HLL Types
//!
//! Three target HLL types are supported, trading precision for memory:
//!
//! - [`HllType::Hll4`]: 4 bits per bucket (most compact)
//! - [`HllType::Hll6`]: 6 bits per bucket (balanced)
//! - [`HllType::Hll8`]: 8 bits per bucket (simplest)
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a value (6 bits).
//! The slot identifies which bucket to update, and the value represents the number of
//! leading zeros in the hash plus one.
//!
//! # Usage
//!
//! ```rust
//! use datasketches_hll::common::NumStdDev;
//! use datasketches_hll::hll::{HllSketch, HllType};
//!
//! let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(10, HllType::Hll6)];
//! let mut sketch = HllSketch::new_in(10, HllType::Hll6, &mut region).unwrap();
//! for i in 0..1000 {
//!     sketch.update(i).unwrap();
//! }
//! assert!(sketch.estimate() > 900.0);
//! assert!(sketch.lower_bound(NumStdDev::Two) <= sketch.estimate());
//!
//! // The caller buffer now holds an updatable image.
//! let restored = HllSketch::wrap(&region).unwrap();
//! assert_eq!(restored.estimate(), HllSketch::heapify(&region).unwrap().estimate());
//! ```

use std::hash::Hash;

use crate::error::Error;

mod array4;
mod array6;
mod array8;
mod aux_map;
mod container;
mod estimator;
mod hash_set;
mod iterator;
mod list;
mod mode;
mod preamble;
mod promotion;
mod serialization;
mod sketch;

pub use self::iterator::PairIterator;
pub use self::sketch::HllSketch;

/// Target HLL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HllType {
    Hll4 = 0,
    Hll6 = 1,
    Hll8 = 2,
}

impl HllType {
    pub(crate) fn from_id(id: u8) -> Result<Self, Error> {
        match id {
            0 => Ok(HllType::Hll4),
            1 => Ok(HllType::Hll6),
            2 => Ok(HllType::Hll8),
            _ => Err(Error::invalid_argument(format!("invalid HLL type: {id}"))),
        }
    }
}

/// Current representation of a sketch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurMode {
    List = 0,
    Set = 1,
    Hll = 2,
}

impl CurMode {
    pub(crate) fn from_id(id: u8) -> Result<Self, Error> {
        match id {
            0 => Ok(CurMode::List),
            1 => Ok(CurMode::Set),
            2 => Ok(CurMode::Hll),
            _ => Err(Error::invalid_argument(format!("invalid current mode: {id}"))),
        }
    }
}

/// Smallest supported lg_config_k
pub const MIN_LG_K: u8 = 4;
/// Largest supported lg_config_k
pub const MAX_LG_K: u8 = 21;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

/// Sentinel value indicating an empty coupon slot
const COUPON_EMPTY: u32 = 0;

const COUPON_RSE_FACTOR: f64 = 0.409; // at transition point not the asymptote
const COUPON_RSE: f64 = COUPON_RSE_FACTOR / (1 << 13) as f64;

/// LIST capacity is `1 << LG_INIT_LIST_SIZE` coupons
const LG_INIT_LIST_SIZE: u8 = 3;
/// A fresh SET table has `1 << LG_INIT_SET_SIZE` slots
const LG_INIT_SET_SIZE: u8 = 5;

// Resize at 3/4 = 75% load factor
const RESIZE_NUMER: u32 = 3;
const RESIZE_DENOM: u32 = 4;

/// Below this lg_config_k a full LIST goes straight to HLL
const LG_K_SET_THRESHOLD: u8 = 8;

#[inline]
fn check_lg_k(lg_config_k: u8) -> Result<(), Error> {
    if (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        Ok(())
    } else {
        Err(Error::invalid_lg_k(lg_config_k))
    }
}

/// Extract slot number (low 26 bits) from coupon
#[inline]
fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Hash a value into a coupon.
///
/// Uses MurmurHash3 x64/128 with the DataSketches default seed, so coupons
/// agree with other DataSketches implementations.
pub fn coupon<H: Hash>(v: H) -> u32 {
    const DEFAULT_SEED: u32 = 9001;

    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_SEED);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();

    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    value << KEY_BITS_26 | addr26
}
