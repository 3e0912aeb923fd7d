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

//! HLL_6 register array: 6 bits per slot.
//!
//! Slot `i` starts at bit `6 * i`. Reads and writes go through a 16-bit
//! little-endian window at byte `6 * i / 8`, so a value may straddle two bytes.
//! The array carries one trailing byte to keep the last window in bounds.

use crate::codec::{get_u16, put_u16};
use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::preamble::{HLL_BYTE_ARR_START, extract_num_at_cur_min, insert_num_at_cur_min};
use crate::hll::{get_slot, get_value};

const VAL_MASK_6: u16 = 0x3F;

/// Register area size for 2^lg_config_k slots: k * 3/4 bytes plus one for the window
pub fn arr_bytes(lg_config_k: u8) -> usize {
    let k = 1usize << lg_config_k;
    ((k * 3) >> 2) + 1
}

/// Get value from a slot (6-bit value)
#[inline]
pub fn get(bytes: &[u8], offset: usize, slot: u32) -> u8 {
    let start_bit = slot * 6;
    let byte_idx = offset + (start_bit >> 3) as usize;
    let shift = start_bit & 7;

    let two_bytes = get_u16(bytes, byte_idx);
    ((two_bytes >> shift) & VAL_MASK_6) as u8
}

/// Set value in a slot (6-bit value)
///
/// Read-modify-write on the 16-bit window preserves the neighbouring bits.
#[inline]
pub fn put(bytes: &mut [u8], offset: usize, slot: u32, value: u8) {
    debug_assert!(value <= 63, "6-bit value must be 0-63");

    let start_bit = slot * 6;
    let byte_idx = offset + (start_bit >> 3) as usize;
    let shift = start_bit & 7;

    let mut two_bytes = get_u16(bytes, byte_idx);
    two_bytes &= !(VAL_MASK_6 << shift);
    two_bytes |= ((value as u16) & VAL_MASK_6) << shift;
    put_u16(bytes, byte_idx, two_bytes);
}

/// Apply a coupon to the HLL_6 image in `bytes`.
pub fn update(bytes: &mut [u8], lg_config_k: u8, coupon: u32) -> Result<(), Error> {
    let mask = (1 << lg_config_k) - 1;
    let slot = get_slot(coupon) & mask;
    let new_value = get_value(coupon);

    let old_value = get(bytes, HLL_BYTE_ARR_START, slot);
    if new_value <= old_value {
        return Ok(());
    }

        // cur_min stays 0, so the counter tracks zeros
    let num_zeros = if old_value == 0 {
        Some(
            extract_num_at_cur_min(bytes)
                .checked_sub(1)
                .ok_or_else(|| Error::corrupt_state("num_at_cur_min underflow"))?,
        )
    } else {
        None
    };

    let mut estimator = HipEstimator::from_image(bytes);
    estimator.update(lg_config_k, old_value, new_value);
    estimator.write_to(bytes);

    put(bytes, HLL_BYTE_ARR_START, slot, new_value);
    if let Some(num_zeros) = num_zeros {
        insert_num_at_cur_min(bytes, num_zeros);
    }
    Ok(())
}
