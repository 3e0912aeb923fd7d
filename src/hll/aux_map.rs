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

//! Auxiliary exceptions table for HLL_4.
//!
//! Registers whose value no longer fits in a nibble above `cur_min` are kept
//! here as `pack_coupon(slot, value)` entries, in an open-addressed table
//! placed directly after the 4-bit register array. The table size is
//! `1 << lg_aux_arr` entries; `lg_aux_arr` lives in the `lg_arr` preamble byte
//! and the entry count in `aux_count`.
//!
//! A compact image stores exactly `aux_count` entries with no empty cells, so
//! lookups on it scan linearly.

use tracing::debug;

use crate::codec::{Memory, clear, get_u32, put_u32};
use crate::error::Error;
use crate::hll::preamble::{
    HLL_BYTE_ARR_START, extract_aux_count, extract_lg_arr, insert_aux_count, insert_lg_arr,
};
use crate::hll::{
    COUPON_EMPTY, RESIZE_DENOM, RESIZE_NUMER, array4, get_slot, get_value, pack_coupon,
};

/// Initial log2 size of the aux table, indexed by lg_config_k
pub const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

/// Byte offset of the aux table in an HLL_4 image
pub fn aux_start(lg_config_k: u8) -> usize {
    HLL_BYTE_ARR_START + array4::arr_bytes(lg_config_k)
}

pub fn aux_bytes(lg_aux_arr: u8) -> usize {
    4 << lg_aux_arr
}

/// Smallest table size able to hold `count` entries without crossing the
/// resize threshold.
pub fn lg_aux_for(lg_config_k: u8, count: u32) -> u8 {
    let mut lg_aux_arr = LG_AUX_ARR_INTS[lg_config_k as usize];
    while RESIZE_DENOM * count > RESIZE_NUMER * (1u32 << lg_aux_arr) {
        lg_aux_arr += 1;
    }
    lg_aux_arr
}

enum Probe {
    Found(u32),
    Vacant(u32),
}

/// Probe the updatable table for `slot`.
///
/// Returns `None` when a full cycle finds neither the slot nor an empty cell.
fn find(bytes: &[u8], lg_config_k: u8, lg_aux_arr: u8, slot: u32) -> Option<Probe> {
    let start = aux_start(lg_config_k);
    let aux_mask = (1u32 << lg_aux_arr) - 1;
    let config_k_mask = (1u32 << lg_config_k) - 1;

    let mut probe = slot & aux_mask;
    let loop_index = probe;
    loop {
        let entry = get_u32(bytes, start + ((probe as usize) << 2));
        if entry == COUPON_EMPTY {
            return Some(Probe::Vacant(probe));
        }
        if get_slot(entry) & config_k_mask == slot {
            return Some(Probe::Found(probe));
        }
        let stride = (slot >> lg_aux_arr) | 1;
        probe = (probe + stride) & aux_mask;
        if probe == loop_index {
            return None;
        }
    }
}

/// Look up the value stored for `slot`.
pub fn get(bytes: &[u8], lg_config_k: u8, compact: bool, slot: u32) -> Option<u8> {
    if compact {
        let start = aux_start(lg_config_k);
        let config_k_mask = (1u32 << lg_config_k) - 1;
        return (0..extract_aux_count(bytes) as usize)
            .map(|i| get_u32(bytes, start + (i << 2)))
            .find(|entry| get_slot(*entry) & config_k_mask == slot)
            .map(get_value);
    }

    let start = aux_start(lg_config_k);
    match find(bytes, lg_config_k, extract_lg_arr(bytes), slot)? {
        Probe::Found(index) => Some(get_value(get_u32(bytes, start + ((index as usize) << 2)))),
        Probe::Vacant(_) => None,
    }
}

/// Like [`get`] on an updatable table, but a missing slot is a broken invariant.
pub fn must_find(bytes: &[u8], lg_config_k: u8, slot: u32) -> Result<u8, Error> {
    get(bytes, lg_config_k, false, slot).ok_or_else(|| {
        Error::corrupt_state(format!("slot {slot} marked as exception but missing from aux table"))
    })
}

/// Add a new exception. The slot must not be present yet.
pub fn insert(bytes: &mut [u8], lg_config_k: u8, slot: u32, value: u8) -> Result<(), Error> {
    let lg_aux_arr = extract_lg_arr(bytes);
    match find(bytes, lg_config_k, lg_aux_arr, slot) {
        Some(Probe::Vacant(index)) => {
            let offset = aux_start(lg_config_k) + ((index as usize) << 2);
            put_u32(bytes, offset, pack_coupon(slot, value));
            insert_aux_count(bytes, extract_aux_count(bytes) + 1);
            Ok(())
        }
        Some(Probe::Found(_)) => Err(Error::corrupt_state(format!(
            "slot {slot} already present in aux table"
        ))),
        None => Err(Error::corrupt_state("aux table is full")),
    }
}

/// Overwrite the value of an existing exception.
pub fn replace(bytes: &mut [u8], lg_config_k: u8, slot: u32, value: u8) -> Result<(), Error> {
    let lg_aux_arr = extract_lg_arr(bytes);
    match find(bytes, lg_config_k, lg_aux_arr, slot) {
        Some(Probe::Found(index)) => {
            let offset = aux_start(lg_config_k) + ((index as usize) << 2);
            put_u32(bytes, offset, pack_coupon(slot, value));
            Ok(())
        }
        _ => Err(Error::corrupt_state(format!(
            "slot {slot} not found in aux table"
        ))),
    }
}

/// All `(slot, value)` entries of the table, compact or updatable.
pub fn entries(bytes: &[u8], lg_config_k: u8, compact: bool) -> Vec<(u32, u8)> {
    let start = aux_start(lg_config_k);
    let config_k_mask = (1u32 << lg_config_k) - 1;
    let len = if compact {
        extract_aux_count(bytes) as usize
    } else {
        1 << extract_lg_arr(bytes)
    };
    (0..len)
        .map(|i| get_u32(bytes, start + (i << 2)))
        .filter(|entry| *entry != COUPON_EMPTY)
        .map(|entry| (get_slot(entry) & config_k_mask, get_value(entry)))
        .collect()
}

/// Lay out a fresh table of `1 << lg_aux_arr` entries holding `entries`.
///
/// `lg_aux_arr` must leave room below the resize threshold (see [`lg_aux_for`]),
/// which guarantees every probe ends on a free cell. Repeated slots keep the
/// first entry.
pub fn rebuild(bytes: &mut [u8], lg_config_k: u8, lg_aux_arr: u8, entries: &[(u32, u8)]) {
    let start = aux_start(lg_config_k);
    clear(bytes, start, aux_bytes(lg_aux_arr));
    insert_lg_arr(bytes, lg_aux_arr);

    let mut count = 0;
    for &(slot, value) in entries {
        if let Some(Probe::Vacant(index)) = find(bytes, lg_config_k, lg_aux_arr, slot) {
            put_u32(bytes, start + ((index as usize) << 2), pack_coupon(slot, value));
            count += 1;
        }
    }
    insert_aux_count(bytes, count);
}

/// Make room for one more exception.
///
/// The table doubles once the next insert would cross 75% load. If the region
/// cannot hold the larger table the insert still proceeds while a free cell
/// remains; only a table that would become full fails, and it fails before
/// anything is written.
pub fn reserve(mem: &mut Memory<'_>, lg_config_k: u8) -> Result<(), Error> {
    let bytes = mem.as_slice();
    let lg_aux_arr = extract_lg_arr(bytes);
    let count = extract_aux_count(bytes);
    let size = 1u32 << lg_aux_arr;

    if RESIZE_DENOM * (count + 1) <= RESIZE_NUMER * size {
        return Ok(());
    }

    let required = aux_start(lg_config_k) + aux_bytes(lg_aux_arr + 1);
    match mem.ensure_capacity(required) {
        Ok(()) => {
            let bytes = mem.as_mut_slice()?;
            let current = entries(bytes, lg_config_k, false);
            debug!(
                lg_config_k,
                aux_count = count,
                lg_aux_arr = lg_aux_arr + 1,
                "growing HLL_4 aux table"
            );
            rebuild(bytes, lg_config_k, lg_aux_arr + 1, &current);
            Ok(())
        }
        Err(_) if count + 1 < size => Ok(()),
        Err(err) => Err(err),
    }
}
