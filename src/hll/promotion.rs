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

//! In-place mode transitions.
//!
//! Every transition receives a snapshot of the coupons to carry over, secures
//! the bytes for the successor image, and only then rewrites the region. A
//! region that is too small fails with
//! [`ErrorKind::InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity)
//! before the first byte changes; heap memory grows instead.

use tracing::debug;

use crate::codec::{Memory, clear};
use crate::error::Error;
use crate::hll::aux_map;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    HASH_SET_PREINTS, HLL_PREINTS, OUT_OF_ORDER_FLAG_MASK, insert_common, insert_hash_set_count,
    insert_hip_accum, insert_modes, insert_num_at_cur_min,
};
use crate::hll::serialization::hll_image_bytes;
use crate::hll::{CurMode, HllType, array4, get_value};

/// LIST → SET with the coupons of a full list.
pub fn list_to_set(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    coupons: &[u32],
) -> Result<Mode, Error> {
    let lg_arr = hash_set::lg_arr_for(coupons.len() as u32);
    write_set(mem, lg_config_k, hll_type, lg_arr, coupons)?;
    debug!(
        lg_config_k,
        lg_arr,
        coupon_count = coupons.len(),
        "promoted LIST to SET"
    );
    Ok(Mode::Set)
}

/// Rehash the set into a table of 2^lg_arr cells.
pub fn grow_set(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    lg_arr: u8,
    coupons: &[u32],
) -> Result<Mode, Error> {
    write_set(mem, lg_config_k, hll_type, lg_arr, coupons)?;
    debug!(
        lg_config_k,
        lg_arr,
        coupon_count = coupons.len(),
        "grew SET"
    );
    Ok(Mode::Set)
}

fn write_set(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    lg_arr: u8,
    coupons: &[u32],
) -> Result<(), Error> {
    let required = hash_set::image_bytes(lg_arr);
    mem.ensure_capacity(required)?;

    let bytes = mem.as_mut_slice()?;
    clear(bytes, 0, required);
    // table order differs from arrival order, so HIP no longer applies
    insert_common(
        bytes,
        HASH_SET_PREINTS,
        lg_config_k,
        lg_arr,
        OUT_OF_ORDER_FLAG_MASK,
    );
    insert_modes(bytes, CurMode::Set, hll_type);
    let count = hash_set::fill(bytes, lg_arr, coupons);
    insert_hash_set_count(bytes, count);
    Ok(())
}

/// {LIST, SET} → HLL, replaying the coupons into a zeroed register array.
///
/// The replay order is not the arrival order, so the HIP accumulator is reset
/// to the exact coupon count afterwards.
pub fn to_hll(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    coupons: &[u32],
) -> Result<Mode, Error> {
    let mode = write_hll(mem, lg_config_k, hll_type, coupons)?;
    debug!(
        lg_config_k,
        ?hll_type,
        coupon_count = coupons.len(),
        "promoted to HLL"
    );
    Ok(mode)
}

/// Lay out a fresh HLL image in `mem` holding `coupons`.
pub fn write_hll(
    mem: &mut Memory<'_>,
    lg_config_k: u8,
    hll_type: HllType,
    coupons: &[u32],
) -> Result<Mode, Error> {
    // cur_min stays 0 during the replay, so every large value is an exception
    let lg_aux_arr = match hll_type {
        HllType::Hll4 => {
            let exceptions = coupons
                .iter()
                .filter(|c| get_value(**c) >= array4::AUX_TOKEN)
                .count();
            aux_map::lg_aux_for(lg_config_k, exceptions as u32)
        }
        _ => 0,
    };
    let required = hll_image_bytes(lg_config_k, hll_type, lg_aux_arr);
    mem.ensure_capacity(required)?;

    let bytes = mem.as_mut_slice()?;
    clear(bytes, 0, required);
    insert_common(bytes, HLL_PREINTS, lg_config_k, lg_aux_arr, 0);
    insert_modes(bytes, CurMode::Hll, hll_type);
    HipEstimator::new(lg_config_k).write_to(bytes);
    insert_num_at_cur_min(bytes, 1 << lg_config_k);

    let mode = Mode::hll(hll_type);
    for &coupon in coupons {
        mode.update(mem, lg_config_k, hll_type, coupon)?;
    }
    insert_hip_accum(mem.as_mut_slice()?, coupons.len() as f64);
    Ok(mode)
}
