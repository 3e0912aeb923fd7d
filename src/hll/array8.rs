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

//! HLL_8 register array: one byte per slot.
//!
//! The simplest encoding. No cur_min tracking, so `num_at_cur_min` in the
//! preamble counts the registers still at zero.

use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::preamble::{HLL_BYTE_ARR_START, extract_num_at_cur_min, insert_num_at_cur_min};
use crate::hll::{get_slot, get_value};

/// Register area size for 2^lg_config_k slots
pub fn arr_bytes(lg_config_k: u8) -> usize {
    1 << lg_config_k
}

#[inline]
pub fn get(bytes: &[u8], offset: usize, slot: u32) -> u8 {
    bytes[offset + slot as usize]
}

#[inline]
pub fn put(bytes: &mut [u8], offset: usize, slot: u32, value: u8) {
    bytes[offset + slot as usize] = value;
}

/// Apply a coupon to the HLL_8 image in `bytes`.
pub fn update(bytes: &mut [u8], lg_config_k: u8, coupon: u32) -> Result<(), Error> {
    let mask = (1 << lg_config_k) - 1;
    let slot = get_slot(coupon) & mask;
    let new_value = get_value(coupon);

    let old_value = get(bytes, HLL_BYTE_ARR_START, slot);
    if new_value <= old_value {
        return Ok(());
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::pack_coupon;
    use crate::hll::preamble::extract_hip_accum;

    fn fresh_image(lg_config_k: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; HLL_BYTE_ARR_START + arr_bytes(lg_config_k)];
        HipEstimator::new(lg_config_k).write_to(&mut bytes);
        insert_num_at_cur_min(&mut bytes, 1 << lg_config_k);
        bytes
    }

    #[test]
    fn test_get_put() {
        let mut bytes = vec![0u8; 16];
        put(&mut bytes, 4, 3, 63);
        assert_eq!(bytes[7], 63);
        assert_eq!(get(&bytes, 4, 3), 63);
        assert_eq!(get(&bytes, 4, 2), 0);
        assert_eq!(get(&bytes, 4, 4), 0);
    }

    #[test]
    fn test_update_keeps_max() {
        let mut bytes = fresh_image(4);

        update(&mut bytes, 4, pack_coupon(0, 5)).unwrap();
        assert_eq!(get(&bytes, HLL_BYTE_ARR_START, 0), 5);

        update(&mut bytes, 4, pack_coupon(0, 3)).unwrap();
        assert_eq!(get(&bytes, HLL_BYTE_ARR_START, 0), 5);

        update(&mut bytes, 4, pack_coupon(0, 8)).unwrap();
        assert_eq!(get(&bytes, HLL_BYTE_ARR_START, 0), 8);
        assert_eq!(extract_num_at_cur_min(&bytes), 15);
    }

    #[test]
    fn test_slot_uses_low_bits_of_key() {
        let mut bytes = fresh_image(4);
        // key 17 lands on slot 1 when K = 16
        update(&mut bytes, 4, pack_coupon(17, 2)).unwrap();
        assert_eq!(get(&bytes, HLL_BYTE_ARR_START, 1), 2);
    }

    #[test]
    fn test_duplicate_is_noop() {
        let mut bytes = fresh_image(6);
        update(&mut bytes, 6, pack_coupon(9, 4)).unwrap();
        let snapshot = bytes.clone();
        update(&mut bytes, 6, pack_coupon(9, 4)).unwrap();
        assert_eq!(bytes, snapshot);
        assert_eq!(extract_hip_accum(&bytes), 1.0);
    }

    #[test]
    fn test_zero_counter_underflow_is_corrupt() {
        let mut bytes = fresh_image(4);
        insert_num_at_cur_min(&mut bytes, 0);
        let snapshot = bytes.clone();
        let err = update(&mut bytes, 4, pack_coupon(2, 7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptState);
        assert_eq!(bytes, snapshot);
    }
}
