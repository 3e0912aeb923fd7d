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

//! Image sizes, validation and conversion between the two image forms.
//!
//! An updatable image is exactly what a sketch updates in place. A compact
//! image drops the empty cells of the coupon tables and of the HLL_4 aux
//! table and carries the compact flag; it is never updated.

use std::cmp::Ordering;

use crate::codec::{check_capacity, put_u32};
use crate::error::Error;
use crate::hll::iterator::PairIterator;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    HASH_SET_INT_ARR_START, HLL_BYTE_ARR_START, LIST_INT_ARR_START, check_preamble,
    extract_aux_count, extract_compact_flag, extract_cur_min, extract_lg_arr, extract_lg_k,
    extract_num_at_cur_min, insert_aux_count, insert_compact_flag, insert_hash_set_count,
    insert_lg_arr,
};
use crate::hll::{
    CurMode, HllType, LG_INIT_LIST_SIZE, LG_INIT_SET_SIZE, array4, array6, array8, aux_map, container,
    hash_set, list, pack_coupon,
};

/// Register area size for the given type
pub fn hll_arr_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    match hll_type {
        HllType::Hll4 => array4::arr_bytes(lg_config_k),
        HllType::Hll6 => array6::arr_bytes(lg_config_k),
        HllType::Hll8 => array8::arr_bytes(lg_config_k),
    }
}

/// Bytes of an updatable HLL image. `lg_aux_arr` only matters for HLL_4.
pub fn hll_image_bytes(lg_config_k: u8, hll_type: HllType, lg_aux_arr: u8) -> usize {
    let aux = match hll_type {
        HllType::Hll4 => aux_map::aux_bytes(lg_aux_arr),
        _ => 0,
    };
    HLL_BYTE_ARR_START + hll_arr_bytes(lg_config_k, hll_type) + aux
}

/// Largest updatable image a sketch needs before its aux table first grows.
pub fn max_updatable_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    hll_image_bytes(
        lg_config_k,
        hll_type,
        aux_map::LG_AUX_ARR_INTS[lg_config_k as usize],
    )
}

fn hll_type_of(mode: Mode) -> HllType {
    match mode {
        Mode::Array4 => HllType::Hll4,
        Mode::Array6 => HllType::Hll6,
        _ => HllType::Hll8,
    }
}

/// Bytes of the updatable form of the image, whichever form it is in now.
pub fn updatable_bytes(bytes: &[u8], mode: Mode) -> usize {
    let lg_config_k = extract_lg_k(bytes);
    let compact = extract_compact_flag(bytes);
    match mode {
        Mode::List => list::image_bytes(),
        Mode::Set if compact => {
            hash_set::image_bytes(hash_set::lg_arr_for(container::coupon_count(bytes, mode)))
        }
        Mode::Set => hash_set::image_bytes(extract_lg_arr(bytes)),
        Mode::Array4 if compact => hll_image_bytes(
            lg_config_k,
            HllType::Hll4,
            aux_map::lg_aux_for(lg_config_k, extract_aux_count(bytes)),
        ),
        Mode::Array4 => hll_image_bytes(lg_config_k, HllType::Hll4, extract_lg_arr(bytes)),
        Mode::Array6 | Mode::Array8 => hll_image_bytes(lg_config_k, hll_type_of(mode), 0),
    }
}

/// Bytes of the compact form of the image.
pub fn compact_bytes(bytes: &[u8], mode: Mode) -> usize {
    let lg_config_k = extract_lg_k(bytes);
    match mode {
        Mode::List | Mode::Set => {
            container::arr_start(mode) + 4 * container::coupon_count(bytes, mode) as usize
        }
        Mode::Array4 => {
            HLL_BYTE_ARR_START
                + array4::arr_bytes(lg_config_k)
                + 4 * extract_aux_count(bytes) as usize
        }
        Mode::Array6 | Mode::Array8 => hll_image_bytes(lg_config_k, hll_type_of(mode), 0),
    }
}

/// Bytes the image occupies in its current form.
pub fn image_bytes(bytes: &[u8], mode: Mode) -> usize {
    if extract_compact_flag(bytes) {
        compact_bytes(bytes, mode)
    } else {
        updatable_bytes(bytes, mode)
    }
}

/// Validate an image of either form and decode its mode.
///
/// Beyond the preamble this checks the table sizes and counts the payload
/// layout depends on, and that `bytes` holds the whole payload.
pub fn check_image(bytes: &[u8]) -> Result<Mode, Error> {
    let mode = check_preamble(bytes)?;
    let lg_config_k = extract_lg_k(bytes);
    let compact = extract_compact_flag(bytes);
    let lg_arr = extract_lg_arr(bytes);

    match mode {
        Mode::List => {
            if !compact && lg_arr != LG_INIT_LIST_SIZE {
                return Err(Error::invalid_argument(format!(
                    "LIST table must have lg_arr {LG_INIT_LIST_SIZE}, got {lg_arr}"
                )));
            }
            let count = container::coupon_count(bytes, mode);
            if count >= 1 << LG_INIT_LIST_SIZE {
                return Err(Error::invalid_argument(format!(
                    "LIST holds {count} coupons, more than it can before promotion"
                )));
            }
        }
        Mode::Set => {
            check_capacity(HASH_SET_INT_ARR_START, bytes.len())?;
            let count = container::coupon_count(bytes, mode);
            // a SET never grows past lg_config_k - 3 before promoting
            let max_lg_arr = LG_INIT_SET_SIZE.max(lg_config_k.saturating_sub(3));
            if count > 1 << lg_config_k || hash_set::lg_arr_for(count) > max_lg_arr {
                return Err(Error::invalid_argument(format!(
                    "SET holds {count} coupons, more than lg_config_k {lg_config_k} allows"
                )));
            }
            if !compact && (lg_arr < hash_set::lg_arr_for(count) || lg_arr > max_lg_arr) {
                return Err(Error::invalid_argument(format!(
                    "SET table lg_arr {lg_arr} cannot hold {count} coupons"
                )));
            }
        }
        Mode::Array4 => {
            check_capacity(HLL_BYTE_ARR_START, bytes.len())?;
            let count = extract_aux_count(bytes);
            if count > 1 << lg_config_k {
                return Err(Error::invalid_argument(format!(
                    "aux count {count} exceeds {} registers",
                    1u32 << lg_config_k
                )));
            }
            // a fixed region may fill its table past the resize threshold
            if !compact
                && (lg_arr < aux_map::LG_AUX_ARR_INTS[lg_config_k as usize]
                    || lg_arr > lg_config_k + 1
                    || count >= 1 << lg_arr)
            {
                return Err(Error::invalid_argument(format!(
                    "aux table lg_arr {lg_arr} cannot hold {count} entries"
                )));
            }
        }
        Mode::Array6 | Mode::Array8 => {}
    }

    check_capacity(image_bytes(bytes, mode), bytes.len())?;

    if mode == Mode::Array4 {
        array4::validate(bytes, lg_config_k, compact)?;
    }
    if mode.cur_mode() == CurMode::Hll {
        check_cur_min_count(bytes, lg_config_k, mode)?;
    }
    Ok(mode)
}

/// Registers must not sit below `cur_min`, and `num_at_cur_min` must match
/// the registers that sit on it.
fn check_cur_min_count(bytes: &[u8], lg_config_k: u8, mode: Mode) -> Result<(), Error> {
    let cur_min = extract_cur_min(bytes);
    if mode != Mode::Array4 && cur_min != 0 {
        return Err(Error::invalid_argument(format!(
            "cur_min must be 0 for {mode:?}, got {cur_min}"
        )));
    }

    let mut pairs = PairIterator::new(bytes, lg_config_k, mode);
    let mut at_cur_min = 0;
    while pairs.next_all() {
        match pairs.value().cmp(&cur_min) {
            Ordering::Less => {
                return Err(Error::invalid_argument(format!(
                    "slot {} is below cur_min {cur_min}",
                    pairs.slot()
                )));
            }
            Ordering::Equal => at_cur_min += 1,
            Ordering::Greater => {}
        }
    }

    let num_at_cur_min = extract_num_at_cur_min(bytes);
    if num_at_cur_min != at_cur_min {
        return Err(Error::invalid_argument(format!(
            "num_at_cur_min is {num_at_cur_min}, but {at_cur_min} registers are at cur_min"
        )));
    }
    Ok(())
}

/// Compact form of a validated image.
pub fn to_compact(bytes: &[u8], mode: Mode) -> Vec<u8> {
    if extract_compact_flag(bytes) {
        return bytes[..compact_bytes(bytes, mode)].to_vec();
    }

    let lg_config_k = extract_lg_k(bytes);
    let mut out = match mode {
        Mode::List | Mode::Set => {
            let start = container::arr_start(mode);
            let mut out = bytes[..start].to_vec();
            for coupon in container::coupons(bytes, mode) {
                out.extend_from_slice(&coupon.to_le_bytes());
            }
            out
        }
        Mode::Array4 => {
            let mut out = bytes[..aux_map::aux_start(lg_config_k)].to_vec();
            let entries = aux_map::entries(bytes, lg_config_k, false);
            for (slot, value) in &entries {
                out.extend_from_slice(&pack_coupon(*slot, *value).to_le_bytes());
            }
            insert_aux_count(&mut out, entries.len() as u32);
            out
        }
        Mode::Array6 | Mode::Array8 => bytes[..updatable_bytes(bytes, mode)].to_vec(),
    };
    insert_compact_flag(&mut out, true);
    out
}

/// Updatable form of a validated image.
///
/// Compact tables are rehashed into full-size tables.
pub fn to_updatable(bytes: &[u8], mode: Mode) -> Vec<u8> {
    let size = updatable_bytes(bytes, mode);
    if !extract_compact_flag(bytes) {
        return bytes[..size].to_vec();
    }

    let lg_config_k = extract_lg_k(bytes);
    let mut out = vec![0u8; size];
    match mode {
        Mode::List => {
            out[..LIST_INT_ARR_START].copy_from_slice(&bytes[..LIST_INT_ARR_START]);
            insert_lg_arr(&mut out, LG_INIT_LIST_SIZE);
            for (i, coupon) in container::coupons(bytes, mode).into_iter().enumerate() {
                put_u32(&mut out, LIST_INT_ARR_START + (i << 2), coupon);
            }
        }
        Mode::Set => {
            out[..HASH_SET_INT_ARR_START].copy_from_slice(&bytes[..HASH_SET_INT_ARR_START]);
            let lg_arr = hash_set::lg_arr_for(container::coupon_count(bytes, mode));
            insert_lg_arr(&mut out, lg_arr);
            let count = hash_set::fill(&mut out, lg_arr, &container::coupons(bytes, mode));
            insert_hash_set_count(&mut out, count);
        }
        Mode::Array4 => {
            let start = aux_map::aux_start(lg_config_k);
            out[..start].copy_from_slice(&bytes[..start]);
            let entries = aux_map::entries(bytes, lg_config_k, true);
            let lg_aux_arr = aux_map::lg_aux_for(lg_config_k, entries.len() as u32);
            aux_map::rebuild(&mut out, lg_config_k, lg_aux_arr, &entries);
        }
        Mode::Array6 | Mode::Array8 => out.copy_from_slice(&bytes[..size]),
    }
    insert_compact_flag(&mut out, false);
    out
}
