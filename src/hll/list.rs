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

//! List mode: coupons stored in arrival order
//!
//! The first representation of every sketch. Coupons fill the array from the
//! front, so the occupied cells are always `0..list_count`.

use crate::codec::{Memory, clear, get_u32, put_u32};
use crate::error::Error;
use crate::hll::container;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    EMPTY_FLAG_MASK, LIST_INT_ARR_START, LIST_PREINTS, extract_lg_arr, extract_list_count,
    insert_common, insert_empty_flag, insert_list_count, insert_modes,
};
use crate::hll::promotion;
use crate::hll::{COUPON_EMPTY, CurMode, HllType, LG_INIT_LIST_SIZE, LG_K_SET_THRESHOLD};

/// Bytes of an updatable LIST image
pub fn image_bytes() -> usize {
    LIST_INT_ARR_START + (4 << LG_INIT_LIST_SIZE)
}

/// Write an empty LIST image at the start of `bytes`.
pub fn init(bytes: &mut [u8], lg_config_k: u8, hll_type: HllType) {
    clear(bytes, 0, image_bytes());
    insert_common(
        bytes,
        LIST_PREINTS,
        lg_config_k,
        LG_INIT_LIST_SIZE,
        EMPTY_FLAG_MASK,
    );
    insert_modes(bytes, CurMode::List, hll_type);
}

/// Insert coupon into the list, ignoring duplicates
///
/// The coupon that fills the list triggers promotion instead of being written
/// here, so a promotion that does not fit leaves the list as it was.
pub fn update(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    coupon: u32,
) -> Result<Mode, Error> {
    let bytes = mem.as_slice();
    let len = 1usize << extract_lg_arr(bytes);

    let mut vacant = None;
    for i in 0..len {
        let value = get_u32(bytes, LIST_INT_ARR_START + (i << 2));
        if value == COUPON_EMPTY {
            vacant = Some(i);
            break;
        } else if value == coupon {
            return Ok(Mode::List);
        }
    }

    let Some(index) = vacant else {
        return Err(Error::corrupt_state(
            "list has neither an empty cell nor the coupon",
        ));
    };

    let count = extract_list_count(bytes) + 1;
    if count as usize >= len {
        let mut coupons = container::coupons(bytes, Mode::List);
        coupons.push(coupon);
        return if lg_config_k < LG_K_SET_THRESHOLD {
            promotion::to_hll(mem, lg_config_k, hll_type, &coupons)
        } else {
            promotion::list_to_set(mem, lg_config_k, hll_type, &coupons)
        };
    }

    let bytes = mem.as_mut_slice()?;
    put_u32(bytes, LIST_INT_ARR_START + (index << 2), coupon);
    insert_list_count(bytes, count);
    insert_empty_flag(bytes, false);
    Ok(Mode::List)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::pack_coupon;
    use crate::hll::preamble::{check_preamble, extract_empty_flag};

    fn fresh(lg_config_k: u8) -> Memory<'static> {
        let mut bytes = vec![0u8; image_bytes()];
        init(&mut bytes, lg_config_k, HllType::Hll8);
        Memory::Heap(bytes)
    }

    #[test]
    fn test_init_layout() {
        let mem = fresh(12);
        let bytes = mem.as_slice();
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[..8], &[2, 1, 7, 12, 3, 4, 0, 2 << 2]);
        assert_eq!(check_preamble(bytes).unwrap(), Mode::List);
    }

    #[test]
    fn test_insert_in_order_and_dedup() {
        let mut mem = fresh(12);
        for slot in 0..3 {
            let mode = update(&mut mem, 12, HllType::Hll8, pack_coupon(slot, 1)).unwrap();
            assert_eq!(mode, Mode::List);
        }
        let snapshot = mem.as_slice().to_vec();
        update(&mut mem, 12, HllType::Hll8, pack_coupon(1, 1)).unwrap();
        assert_eq!(mem.as_slice(), &snapshot[..]);

        let bytes = mem.as_slice();
        assert_eq!(extract_list_count(bytes), 3);
        assert!(!extract_empty_flag(bytes));
        assert_eq!(
            container::coupons(bytes, Mode::List),
            vec![pack_coupon(0, 1), pack_coupon(1, 1), pack_coupon(2, 1)]
        );
    }

    #[test]
    fn test_full_list_promotes() {
        let mut small = fresh(7);
        let mut big = fresh(8);
        for slot in 0..7 {
            assert_eq!(
                update(&mut small, 7, HllType::Hll8, pack_coupon(slot, 2)).unwrap(),
                Mode::List
            );
            assert_eq!(
                update(&mut big, 8, HllType::Hll8, pack_coupon(slot, 2)).unwrap(),
                Mode::List
            );
        }
        let coupon = pack_coupon(7, 2);
        assert_eq!(update(&mut small, 7, HllType::Hll8, coupon).unwrap(), Mode::Array8);
        assert_eq!(update(&mut big, 8, HllType::Hll8, coupon).unwrap(), Mode::Set);
    }

    #[test]
    fn test_promotion_without_room_keeps_list() {
        let mut region = vec![0u8; image_bytes()];
        init(&mut region, 10, HllType::Hll6);
        let mut mem = Memory::Writable(&mut region);
        for slot in 0..7 {
            update(&mut mem, 10, HllType::Hll6, pack_coupon(slot, 1)).unwrap();
        }
        let before = mem.as_slice().to_vec();
        let err = update(&mut mem, 10, HllType::Hll6, pack_coupon(7, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
        assert_eq!(err.context_value("required"), Some("140"));
        assert_eq!(mem.as_slice(), &before[..]);
    }

    #[test]
    fn test_corrupt_list_is_detected() {
        let mut mem = fresh(12);
        {
            let bytes = mem.as_mut_slice().unwrap();
            for i in 0..8 {
                put_u32(bytes, LIST_INT_ARR_START + (i << 2), pack_coupon(i as u32, 1));
            }
        }
        let err = update(&mut mem, 12, HllType::Hll8, pack_coupon(100, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }
}
