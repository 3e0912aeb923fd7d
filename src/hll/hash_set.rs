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

//! Hash set mode: open-addressed coupon table
//!
//! Probing starts at `coupon & mask` and steps by an odd stride derived from
//! the key bits above the table size, so every cell is visited once per cycle.

use crate::codec::{Memory, get_u32, put_u32};
use crate::error::Error;
use crate::hll::container;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    HASH_SET_INT_ARR_START, extract_hash_set_count, extract_lg_arr, insert_hash_set_count,
};
use crate::hll::promotion;
use crate::hll::{
    COUPON_EMPTY, HllType, KEY_MASK_26, LG_INIT_SET_SIZE, RESIZE_DENOM, RESIZE_NUMER,
};

/// Bytes of an updatable SET image with 2^lg_arr cells
pub fn image_bytes(lg_arr: u8) -> usize {
    HASH_SET_INT_ARR_START + (4 << lg_arr)
}

/// Smallest table size holding `count` coupons below the resize threshold
pub fn lg_arr_for(count: u32) -> u8 {
    let mut lg_arr = LG_INIT_SET_SIZE;
    while RESIZE_DENOM * count > RESIZE_NUMER * (1u32 << lg_arr) {
        lg_arr += 1;
    }
    lg_arr
}

enum Probe {
    Found,
    Vacant(usize),
}

/// Search the table for `coupon`.
///
/// Returns `None` when a full cycle finds neither the coupon nor an empty cell.
fn find(bytes: &[u8], lg_arr: u8, coupon: u32) -> Option<Probe> {
    let arr_mask = (1u32 << lg_arr) - 1;
    let mut probe = coupon & arr_mask;
    let loop_index = probe;
    loop {
        let value = get_u32(bytes, HASH_SET_INT_ARR_START + ((probe as usize) << 2));
        if value == COUPON_EMPTY {
            return Some(Probe::Vacant(probe as usize));
        } else if value == coupon {
            return Some(Probe::Found);
        }
        let stride = ((coupon & KEY_MASK_26) >> lg_arr) | 1;
        probe = (probe + stride) & arr_mask;
        if probe == loop_index {
            return None;
        }
    }
}

/// Place coupons into a cleared table of 2^lg_arr cells and return how many
/// were stored.
///
/// `lg_arr` must leave room below the resize threshold (see [`lg_arr_for`]),
/// which guarantees every probe ends on a free cell. Duplicates are stored once.
pub fn fill(bytes: &mut [u8], lg_arr: u8, coupons: &[u32]) -> u32 {
    let mut count = 0;
    for &coupon in coupons {
        if let Some(Probe::Vacant(index)) = find(bytes, lg_arr, coupon) {
            put_u32(bytes, HASH_SET_INT_ARR_START + (index << 2), coupon);
            count += 1;
        }
    }
    count
}

/// Insert coupon into the set, ignoring duplicates
///
/// An insert that would cross 75% load grows the table or, once the table has
/// reached `lg_config_k - 3`, promotes to HLL. The triggering coupon goes into
/// the successor directly, so a transition that does not fit leaves the set
/// as it was.
pub fn update(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    coupon: u32,
) -> Result<Mode, Error> {
    let bytes = mem.as_slice();
    let lg_arr = extract_lg_arr(bytes);

    let index = match find(bytes, lg_arr, coupon) {
        Some(Probe::Found) => return Ok(Mode::Set),
        Some(Probe::Vacant(index)) => index,
        None => {
            return Err(Error::corrupt_state(
                "hash set has neither an empty cell nor the coupon",
            ));
        }
    };

    let count = extract_hash_set_count(bytes) + 1;
    if RESIZE_DENOM * count > RESIZE_NUMER * (1u32 << lg_arr) {
        let mut coupons = container::coupons(bytes, Mode::Set);
        coupons.push(coupon);
        return if lg_arr + 3 >= lg_config_k {
            promotion::to_hll(mem, lg_config_k, hll_type, &coupons)
        } else {
            promotion::grow_set(mem, lg_config_k, hll_type, lg_arr + 1, &coupons)
        };
    }

    let bytes = mem.as_mut_slice()?;
    put_u32(bytes, HASH_SET_INT_ARR_START + (index << 2), coupon);
    insert_hash_set_count(bytes, count);
    Ok(Mode::Set)
}
