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

//! Helpers shared by the LIST and SET coupon stores.
//!
//! Both keep a flat array of 4-byte coupons after their preamble; they differ
//! in where the array starts, where the count lives and how cells are chosen.

use crate::codec::get_u32_array;
use crate::common::NumStdDev;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    HASH_SET_INT_ARR_START, LIST_INT_ARR_START, extract_compact_flag, extract_hash_set_count,
    extract_lg_arr, extract_list_count,
};
use crate::hll::{COUPON_EMPTY, COUPON_RSE};

/// Byte offset of the coupon array
pub fn arr_start(mode: Mode) -> usize {
    match mode {
        Mode::Set => HASH_SET_INT_ARR_START,
        _ => LIST_INT_ARR_START,
    }
}

/// Number of stored coupons
pub fn coupon_count(bytes: &[u8], mode: Mode) -> u32 {
    match mode {
        Mode::Set => extract_hash_set_count(bytes),
        _ => extract_list_count(bytes),
    }
}

/// Number of 4-byte cells in the coupon array
pub fn arr_len(bytes: &[u8], mode: Mode) -> usize {
    if extract_compact_flag(bytes) {
        coupon_count(bytes, mode) as usize
    } else {
        1 << extract_lg_arr(bytes)
    }
}

/// Non-empty coupons in array order.
pub fn coupons(bytes: &[u8], mode: Mode) -> Vec<u32> {
    let mut coupons = get_u32_array(bytes, arr_start(mode), arr_len(bytes, mode));
    coupons.retain(|coupon| *coupon != COUPON_EMPTY);
    coupons
}

/// Below the HLL threshold every distinct coupon is kept, so the count is exact
pub fn estimate(count: u32) -> f64 {
    count as f64
}

pub fn upper_bound(count: u32, num_std_dev: NumStdDev) -> f64 {
    let count = count as f64;
    let bound = count / (1.0 - num_std_dev.as_f64() * COUPON_RSE);
    count.max(bound)
}

pub fn lower_bound(count: u32, _num_std_dev: NumStdDev) -> f64 {
    count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::put_u32;
    use crate::hll::preamble::{insert_compact_flag, insert_hash_set_count, insert_lg_arr};

    #[test]
    fn test_set_coupons_skip_empty_cells() {
        let mut bytes = vec![0u8; HASH_SET_INT_ARR_START + (4 << 5)];
        insert_lg_arr(&mut bytes, 5);
        put_u32(&mut bytes, HASH_SET_INT_ARR_START + 4 * 3, 0x0400_0003);
        put_u32(&mut bytes, HASH_SET_INT_ARR_START + 4 * 17, 0x0800_0011);
        insert_hash_set_count(&mut bytes, 2);

        assert_eq!(arr_len(&bytes, Mode::Set), 32);
        assert_eq!(coupons(&bytes, Mode::Set), vec![0x0400_0003, 0x0800_0011]);
        assert_eq!(coupon_count(&bytes, Mode::Set), 2);

        insert_compact_flag(&mut bytes, true);
        assert_eq!(arr_len(&bytes, Mode::Set), 2);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(estimate(7), 7.0);
        assert_eq!(lower_bound(7, NumStdDev::Three), 7.0);
        let ub = upper_bound(7, NumStdDev::One);
        assert!(ub > 7.0 && ub < 7.01);
        assert!(upper_bound(7, NumStdDev::Three) > ub);
    }
}
