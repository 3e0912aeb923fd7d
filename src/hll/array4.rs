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

//! HLL_4 register array: 4 bits per slot plus an exceptions table.
//!
//! Each nibble stores `value - cur_min`. Values that do not fit below
//! [`AUX_TOKEN`] are stored as the token, with the real value kept in the
//! aux table (see [`aux_map`]). Once no register remains at `cur_min`, the
//! whole array is shifted down by one and `cur_min` moves up, which keeps
//! the number of exceptions small.

use tracing::debug;

use crate::codec::Memory;
use crate::error::Error;
use crate::hll::aux_map;
use crate::hll::estimator::HipEstimator;
use crate::hll::preamble::{
    HLL_BYTE_ARR_START, extract_aux_count, extract_cur_min, extract_lg_arr,
    extract_num_at_cur_min, insert_cur_min, insert_num_at_cur_min,
};
use crate::hll::{get_slot, get_value};

/// Nibble marking a register whose value lives in the aux table
pub const AUX_TOKEN: u8 = 15;

const MAX_VALUE: u8 = 63;

/// Register area size for 2^lg_config_k slots
pub fn arr_bytes(lg_config_k: u8) -> usize {
    1 << (lg_config_k - 1)
}

/// Raw nibble for slot, not adjusted for cur_min
#[inline]
pub fn get_nibble(bytes: &[u8], offset: usize, slot: u32) -> u8 {
    let byte = bytes[offset + (slot >> 1) as usize];
    if slot & 1 == 0 {
        byte & 15 // low nibble for even slots
    } else {
        byte >> 4 // high nibble for odd slots
    }
}

#[inline]
pub fn put_nibble(bytes: &mut [u8], offset: usize, slot: u32, value: u8) {
    debug_assert!(value <= AUX_TOKEN);

    let byte_idx = offset + (slot >> 1) as usize;
    let old_byte = bytes[byte_idx];
    bytes[byte_idx] = if slot & 1 == 0 {
        (old_byte & 0xF0) | (value & 0x0F)
    } else {
        (old_byte & 0x0F) | (value << 4)
    };
}

/// Actual register value for slot (adjusted for cur_min and the aux table).
///
/// Images are validated by [`validate`] before they are read, so every token
/// resolves to an aux entry.
pub fn get(bytes: &[u8], lg_config_k: u8, compact: bool, slot: u32) -> u8 {
    let raw = get_nibble(bytes, HLL_BYTE_ARR_START, slot);
    let cur_min = extract_cur_min(bytes);
    if raw < AUX_TOKEN {
        raw + cur_min
    } else {
        aux_map::get(bytes, lg_config_k, compact, slot).unwrap_or(cur_min + AUX_TOKEN)
    }
}

/// Apply a coupon to the HLL_4 image held by `mem`.
///
/// A coupon that creates a new exception reserves aux space first, so a
/// capacity failure leaves the image unchanged.
pub fn update(mem: &mut Memory<'_>, lg_config_k: u8, coupon: u32) -> Result<(), Error> {
    let mask = (1 << lg_config_k) - 1;
    let slot = get_slot(coupon) & mask;
    let new_value = get_value(coupon);

    let bytes = mem.as_slice();
    let cur_min = extract_cur_min(bytes);

    // Quick rejection: nothing at or below cur_min can raise a register
    if new_value <= cur_min {
        return Ok(());
    }

    let raw_stored = get_nibble(bytes, HLL_BYTE_ARR_START, slot);
    let lower_bound = raw_stored + cur_min;
    if new_value <= lower_bound {
        return Ok(());
    }

    let old_value = if raw_stored < AUX_TOKEN {
        lower_bound
    } else {
        aux_map::must_find(bytes, lg_config_k, slot)?
    };
    if new_value <= old_value {
        return Ok(());
    }

    let shifted_new = new_value - cur_min;
    let new_exception = raw_stored < AUX_TOKEN && shifted_new >= AUX_TOKEN;
    if new_exception {
        aux_map::reserve(mem, lg_config_k)?;
    }

    let bytes = mem.as_mut_slice()?;

    let mut estimator = HipEstimator::from_image(bytes);
    estimator.update(lg_config_k, old_value, new_value);
    estimator.write_to(bytes);

    if raw_stored == AUX_TOKEN {
        aux_map::replace(bytes, lg_config_k, slot, new_value)?;
    } else if new_exception {
        put_nibble(bytes, HLL_BYTE_ARR_START, slot, AUX_TOKEN);
        aux_map::insert(bytes, lg_config_k, slot, new_value)?;
    } else {
        put_nibble(bytes, HLL_BYTE_ARR_START, slot, shifted_new);
    }

    if old_value == cur_min {
        let num_at_cur_min = extract_num_at_cur_min(bytes)
            .checked_sub(1)
            .ok_or_else(|| Error::corrupt_state("num_at_cur_min underflow"))?;
        insert_num_at_cur_min(bytes, num_at_cur_min);
        while extract_num_at_cur_min(bytes) == 0 {
            shift_to_bigger_cur_min(bytes, lg_config_k)?;
        }
    }

    Ok(())
}

/// Increment cur_min and adjust all values
///
/// Called when no slot remains at cur_min. Every stored nibble is decremented
/// by 1, and exceptions that fall back into the 4-bit range move out of the
/// aux table.
fn shift_to_bigger_cur_min(bytes: &mut [u8], lg_config_k: u8) -> Result<(), Error> {
    let new_cur_min = extract_cur_min(bytes) + 1;
    let k = 1u32 << lg_config_k;
    let mut num_at_new = 0;

    for slot in 0..k {
        let raw = get_nibble(bytes, HLL_BYTE_ARR_START, slot);
        if raw == 0 {
            return Err(Error::corrupt_state(format!(
                "slot {slot} still at cur_min while shifting"
            )));
        }
        if raw < AUX_TOKEN {
            let decremented = raw - 1;
            put_nibble(bytes, HLL_BYTE_ARR_START, slot, decremented);
            if decremented == 0 {
                num_at_new += 1;
            }
        }
    }

    if extract_aux_count(bytes) > 0 {
        let mut remaining = vec![];
        for (slot, value) in aux_map::entries(bytes, lg_config_k, false) {
            let new_shifted = value - new_cur_min;
            if new_shifted < AUX_TOKEN {
                put_nibble(bytes, HLL_BYTE_ARR_START, slot, new_shifted);
            } else {
                remaining.push((slot, value));
            }
        }
        let lg_aux_arr = extract_lg_arr(bytes);
        aux_map::rebuild(bytes, lg_config_k, lg_aux_arr, &remaining);
    }

    insert_cur_min(bytes, new_cur_min);
    insert_num_at_cur_min(bytes, num_at_new);

    debug!(
        lg_config_k,
        cur_min = new_cur_min,
        num_at_cur_min = num_at_new,
        "shifted HLL_4 cur_min"
    );
    Ok(())
}

/// Check the HLL_4 specific parts of an image: `cur_min`, and that every
/// exception token resolves to an aux entry above the nibble range.
pub fn validate(bytes: &[u8], lg_config_k: u8, compact: bool) -> Result<(), Error> {
    let k = 1u32 << lg_config_k;
    let cur_min = extract_cur_min(bytes);
    if cur_min > MAX_VALUE {
        return Err(Error::invalid_argument(format!(
            "cur_min {cur_min} exceeds the largest register value"
        )));
    }
    if extract_aux_count(bytes) > k {
        return Err(Error::invalid_argument(format!(
            "aux count {} exceeds {k} registers",
            extract_aux_count(bytes)
        )));
    }
    for (slot, value) in aux_map::entries(bytes, lg_config_k, compact) {
        if value < cur_min + AUX_TOKEN || value > MAX_VALUE {
            return Err(Error::invalid_argument(format!(
                "aux entry for slot {slot} holds {value}, outside the exception range"
            )));
        }
    }
    for slot in 0..k {
        if get_nibble(bytes, HLL_BYTE_ARR_START, slot) == AUX_TOKEN
            && aux_map::get(bytes, lg_config_k, compact, slot).is_none()
        {
            return Err(Error::invalid_argument(format!(
                "slot {slot} is an exception with no aux entry"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::aux_map::{LG_AUX_ARR_INTS, aux_bytes};
    use crate::hll::pack_coupon;
    use crate::hll::preamble::{insert_aux_count, insert_lg_arr};

    fn fresh_image(lg_config_k: u8) -> Vec<u8> {
        let lg_aux_arr = LG_AUX_ARR_INTS[lg_config_k as usize];
        let mut bytes = vec![0u8; aux_map::aux_start(lg_config_k) + aux_bytes(lg_aux_arr)];
        HipEstimator::new(lg_config_k).write_to(&mut bytes);
        insert_num_at_cur_min(&mut bytes, 1 << lg_config_k);
        insert_lg_arr(&mut bytes, lg_aux_arr);
        bytes
    }

    #[test]
    fn test_get_put_nibble() {
        let mut bytes = vec![0u8; 8];

        put_nibble(&mut bytes, 0, 0, 5);
        put_nibble(&mut bytes, 0, 1, 7);
        assert_eq!(bytes[0], 0x75); // 7 << 4 | 5
        assert_eq!(get_nibble(&bytes, 0, 0), 5);
        assert_eq!(get_nibble(&bytes, 0, 1), 7);

        put_nibble(&mut bytes, 0, 0, 15);
        assert_eq!(bytes[0], 0x7F);
        assert_eq!(get_nibble(&bytes, 0, 1), 7);
    }

    #[test]
    fn test_update_keeps_max() {
        let mut mem = Memory::Heap(fresh_image(4));

        update(&mut mem, 4, pack_coupon(0, 5)).unwrap();
        assert_eq!(get(mem.as_slice(), 4, false, 0), 5);

        update(&mut mem, 4, pack_coupon(0, 3)).unwrap();
        assert_eq!(get(mem.as_slice(), 4, false, 0), 5);

        update(&mut mem, 4, pack_coupon(0, 8)).unwrap();
        assert_eq!(get(mem.as_slice(), 4, false, 0), 8);
        assert_eq!(extract_num_at_cur_min(mem.as_slice()), 15);
    }

    #[test]
    fn test_large_values_go_to_aux() {
        let mut mem = Memory::Heap(fresh_image(10));

        update(&mut mem, 10, pack_coupon(3, 20)).unwrap();
        let bytes = mem.as_slice();
        assert_eq!(get_nibble(bytes, HLL_BYTE_ARR_START, 3), AUX_TOKEN);
        assert_eq!(extract_aux_count(bytes), 1);
        assert_eq!(get(bytes, 10, false, 3), 20);

        // exception to exception replaces in place
        update(&mut mem, 10, pack_coupon(3, 40)).unwrap();
        assert_eq!(get(mem.as_slice(), 10, false, 3), 40);
        assert_eq!(extract_aux_count(mem.as_slice()), 1);
    }

    #[test]
    fn test_cur_min_shift() {
        let lg_k = 4;
        let mut mem = Memory::Heap(fresh_image(lg_k));

        // every register but slot 0 at 2, slot 0 at 16 (an exception)
        update(&mut mem, lg_k, pack_coupon(0, 16)).unwrap();
        for slot in 1..16 {
            update(&mut mem, lg_k, pack_coupon(slot, 2)).unwrap();
        }

        // no register is left at zero, so cur_min moved up to 2
        let bytes = mem.as_slice();
        assert_eq!(extract_cur_min(bytes), 2);
        assert_eq!(extract_num_at_cur_min(bytes), 15);
        // 16 - 2 = 14 fits a nibble again
        assert_eq!(get_nibble(bytes, HLL_BYTE_ARR_START, 0), 14);
        assert_eq!(extract_aux_count(bytes), 0);
        for slot in 0..16 {
            let expected = if slot == 0 { 16 } else { 2 };
            assert_eq!(get(bytes, lg_k, false, slot), expected);
        }

        // at or below cur_min is a no-op
        let snapshot = bytes.to_vec();
        update(&mut mem, lg_k, pack_coupon(5, 2)).unwrap();
        assert_eq!(mem.as_slice(), &snapshot[..]);
    }

    #[test]
    fn test_insufficient_aux_space_leaves_image() {
        let lg_k = 4;
        let mut region = fresh_image(lg_k);
        let mut mem = Memory::Writable(&mut region);
        for slot in 0..3 {
            update(&mut mem, lg_k, pack_coupon(slot, 20)).unwrap();
        }
        let before = mem.as_slice().to_vec();
        let err = update(&mut mem, lg_k, pack_coupon(3, 20)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
        assert_eq!(mem.as_slice(), &before[..]);
    }

    #[test]
    fn test_validate_detects_dangling_token() {
        let lg_k = 6;
        let mut bytes = fresh_image(lg_k);
        assert!(validate(&bytes, lg_k, false).is_ok());

        put_nibble(&mut bytes, HLL_BYTE_ARR_START, 9, AUX_TOKEN);
        assert!(validate(&bytes, lg_k, false).is_err());

        insert_aux_count(&mut bytes, 1000);
        assert!(validate(&bytes, lg_k, false).is_err());
    }

    #[test]
    fn test_validate_checks_aux_values() {
        let lg_k = 6;
        let mut mem = Memory::Heap(fresh_image(lg_k));
        update(&mut mem, lg_k, pack_coupon(9, 30)).unwrap();
        assert!(validate(mem.as_slice(), lg_k, false).is_ok());

        let bytes = mem.as_mut_slice().unwrap();
        aux_map::replace(bytes, lg_k, 9, 7).unwrap();
        assert!(validate(bytes, lg_k, false).is_err());

        aux_map::replace(bytes, lg_k, 9, 30).unwrap();
        insert_cur_min(bytes, 200);
        assert!(validate(bytes, lg_k, false).is_err());
    }
}
