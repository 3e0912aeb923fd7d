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

use datasketches_hll::error::ErrorKind;
use datasketches_hll::hll::{CurMode, HllSketch, HllType};
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;

fn coupon(slot: u32, value: u32) -> u32 {
    (value << 26) | slot
}

#[test]
fn test_direct_matches_heap() {
    for hll_type in [HllType::Hll6, HllType::Hll8] {
        let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(10, hll_type)];
        let mut direct = HllSketch::new_in(10, hll_type, &mut region).unwrap();
        let mut heap = HllSketch::new(10, hll_type);
        assert!(direct.is_direct());
        assert!(!heap.is_direct());

        for i in 0..5000 {
            direct.update(i).unwrap();
            heap.update(i).unwrap();
            if i % 997 == 0 {
                assert_eq!(direct.to_updatable_bytes(), heap.to_updatable_bytes());
            }
        }
        assert_eq!(direct.cur_mode(), CurMode::Hll);
        assert_eq!(direct.to_updatable_bytes(), heap.to_updatable_bytes());
        assert_that!(direct.estimate(), eq(heap.estimate()));
    }
}

#[test]
fn test_region_holds_updatable_image() {
    let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(12, HllType::Hll4)];
    let estimate = {
        let mut sketch = HllSketch::new_in(12, HllType::Hll4, &mut region).unwrap();
        for i in 0..20_000 {
            sketch.update(i).unwrap();
        }
        sketch.estimate()
    };

    let wrapped = HllSketch::wrap(&region).unwrap();
    assert!(wrapped.is_direct());
    assert!(wrapped.is_read_only());
    assert_eq!(wrapped.estimate(), estimate);

    let mut resumed = HllSketch::writable_wrap(&mut region).unwrap();
    assert!(!resumed.is_read_only());
    for i in 20_000..40_000 {
        resumed.update(i).unwrap();
    }
    assert!(resumed.estimate() > estimate);
}

#[test]
fn test_region_too_small_for_list() {
    let mut region = vec![0u8; 39];
    let err = HllSketch::new_in(10, HllType::Hll8, &mut region).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
    assert_eq!(err.context_value("required"), Some("40"));
    assert_eq!(err.context_value("available"), Some("39"));
}

#[test]
fn test_new_in_rejects_lg_k() {
    let mut region = vec![0u8; 1024];
    let err = HllSketch::new_in(22, HllType::Hll8, &mut region).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(region.iter().all(|b| *b == 0));
}

#[test]
fn test_promotion_without_room_keeps_region() {
    let mut region = vec![0u8; 40];
    let mut sketch = HllSketch::new_in(10, HllType::Hll8, &mut region).unwrap();
    for slot in 0..7 {
        sketch.update_coupon(coupon(slot, 1)).unwrap();
    }
    let before = sketch.to_updatable_bytes();

    let err = sketch.update_coupon(coupon(7, 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
    assert_eq!(err.context_value("required"), Some("140"));
    assert_eq!(err.context_value("available"), Some("40"));
    assert_eq!(sketch.to_updatable_bytes(), before);
    assert_eq!(sketch.cur_mode(), CurMode::List);

    // duplicates still work
    sketch.update_coupon(coupon(3, 1)).unwrap();
    assert_eq!(sketch.coupon_count(), 7);
}

#[test]
fn test_set_to_hll_without_room_keeps_region() {
    let mut region = vec![0u8; 12 + 4 * 128];
    let mut sketch = HllSketch::new_in(10, HllType::Hll8, &mut region).unwrap();
    let mut slot = 0;
    let err = loop {
        match sketch.update_coupon(coupon(slot, 2)) {
            Ok(()) => slot += 1,
            Err(err) => break err,
        }
    };
    assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
    assert_eq!(sketch.cur_mode(), CurMode::Set);
    // lg_arr 7 holds 96 coupons, the 97th needs the HLL image
    assert_eq!(slot, 96);
    assert_eq!(err.context_value("required"), Some("1064"));
}

#[test]
fn test_hll4_aux_full_in_fixed_region() {
    let size = HllSketch::max_updatable_serialization_bytes(4, HllType::Hll4);
    assert_eq!(size, 40 + 8 + 16);

    let mut region = vec![0u8; size];
    let mut sketch = HllSketch::new_in(4, HllType::Hll4, &mut region).unwrap();
    for slot in 0..8 {
        sketch.update_coupon(coupon(slot, 1)).unwrap();
    }
    for slot in 8..11 {
        sketch.update_coupon(coupon(slot, 12 + slot)).unwrap();
    }
    let before = sketch.to_updatable_bytes();

    let err = sketch.update_coupon(coupon(11, 30)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
    assert_eq!(sketch.to_updatable_bytes(), before);

    // the heap grows its table instead
    let mut heap = HllSketch::heapify(&before).unwrap();
    heap.update_coupon(coupon(11, 30)).unwrap();
    let values: Vec<_> = heap.iter().filter(|(slot, _)| *slot >= 8).collect();
    assert_eq!(values, vec![(8, 20), (9, 21), (10, 22), (11, 30)]);
}

#[test]
fn test_read_only_rejects_updates() {
    let mut sketch = HllSketch::new(10, HllType::Hll6);
    for i in 0..100 {
        sketch.update(i).unwrap();
    }
    let bytes = sketch.to_updatable_bytes();

    let mut wrapped = HllSketch::wrap(&bytes).unwrap();
    let err = wrapped.update(1000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnly);
    let err = wrapped.reset().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnly);
    assert_eq!(wrapped.to_updatable_bytes(), bytes);

    let mut view = sketch.as_read_only();
    assert!(view.is_read_only());
    assert_eq!(view.update(1000).unwrap_err().kind(), ErrorKind::ReadOnly);
    assert_eq!(view.estimate(), sketch.estimate());
}

#[test]
fn test_writable_wrap_rejects_compact() {
    let mut sketch = HllSketch::new(10, HllType::Hll8);
    for i in 0..10 {
        sketch.update(i).unwrap();
    }
    let mut compact = sketch.to_compact_bytes();
    let err = HllSketch::writable_wrap(&mut compact).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_that!(err.message(), contains_substring("compact"));
}

#[test]
fn test_writable_wrap_rejects_short_region() {
    let mut sketch = HllSketch::new(10, HllType::Hll8);
    for i in 0..1000 {
        sketch.update(i).unwrap();
    }
    let bytes = sketch.to_updatable_bytes();
    let mut short = bytes[..bytes.len() - 1].to_vec();
    let err = HllSketch::writable_wrap(&mut short).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
}

#[test]
fn test_copy_is_independent() {
    let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(8, HllType::Hll8)];
    let mut sketch = HllSketch::new_in(8, HllType::Hll8, &mut region).unwrap();
    for i in 0..50 {
        sketch.update(i).unwrap();
    }
    assert_eq!(sketch.cur_mode(), CurMode::Hll);
    let count = sketch.coupon_count();
    let before = sketch.to_updatable_bytes();

    let mut copy = sketch.copy();
    assert!(!copy.is_direct());
    for i in 50..500 {
        copy.update(i).unwrap();
    }
    assert_eq!(sketch.coupon_count(), count);
    assert_eq!(sketch.to_updatable_bytes(), before);
    assert!(copy.estimate() > sketch.estimate());
}
