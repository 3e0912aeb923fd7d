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

//! Preamble layout of the HLL image.
//!
//! ```text
//! Byte   0        1       2        3     4       5      6                7
//!      pre_ints ser_ver family   lg_k  lg_arr  flags  list_cnt/cur_min  modes
//! LIST: coupons from byte 8
//! SET:  hash_set_count (u32) @8, table from byte 12
//! HLL:  hip_accum (f64) @8, kxq0 (f64) @16, kxq1 (f64) @24,
//!       num_at_cur_min (u32) @32, aux_count (u32) @36, registers from byte 40
//! ```
//!
//! Every accessor is a pure function of the image bytes and never allocates.

use crate::codec::family::Family;
use crate::codec::{get_f64, get_u32, put_f64, put_u32};
use crate::error::Error;
use crate::hll::mode::Mode;
use crate::hll::{CurMode, HllType, check_lg_k};

pub const SER_VER: u8 = 1;

pub const PREAMBLE_INTS_BYTE: usize = 0;
pub const SER_VER_BYTE: usize = 1;
pub const FAMILY_BYTE: usize = 2;
pub const LG_K_BYTE: usize = 3;
pub const LG_ARR_BYTE: usize = 4;
pub const FLAGS_BYTE: usize = 5;
pub const LIST_COUNT_BYTE: usize = 6;
pub const HLL_CUR_MIN_BYTE: usize = 6;
pub const MODE_BYTE: usize = 7;

pub const LIST_INT_ARR_START: usize = 8;
pub const HASH_SET_COUNT_INT: usize = 8;
pub const HASH_SET_INT_ARR_START: usize = 12;
pub const HIP_ACCUM_DOUBLE: usize = 8;
pub const KXQ0_DOUBLE: usize = 16;
pub const KXQ1_DOUBLE: usize = 24;
pub const CUR_MIN_COUNT_INT: usize = 32;
pub const AUX_COUNT_INT: usize = 36;
pub const HLL_BYTE_ARR_START: usize = 40;

pub const LIST_PREINTS: u8 = 2;
pub const HASH_SET_PREINTS: u8 = 3;
pub const HLL_PREINTS: u8 = 10;

pub const BIG_ENDIAN_FLAG_MASK: u8 = 1;
pub const EMPTY_FLAG_MASK: u8 = 4;
pub const COMPACT_FLAG_MASK: u8 = 8;
pub const OUT_OF_ORDER_FLAG_MASK: u8 = 16;

/// Bytes needed before any field can be decoded
pub const MIN_PREAMBLE_BYTES: usize = 8;

pub fn extract_pre_ints(bytes: &[u8]) -> u8 {
    bytes[PREAMBLE_INTS_BYTE] & 0x3F
}

pub fn insert_pre_ints(bytes: &mut [u8], pre_ints: u8) {
    bytes[PREAMBLE_INTS_BYTE] = pre_ints & 0x3F;
}

pub fn extract_ser_ver(bytes: &[u8]) -> u8 {
    bytes[SER_VER_BYTE]
}

pub fn insert_ser_ver(bytes: &mut [u8]) {
    bytes[SER_VER_BYTE] = SER_VER;
}

pub fn extract_family_id(bytes: &[u8]) -> u8 {
    bytes[FAMILY_BYTE]
}

pub fn insert_family_id(bytes: &mut [u8]) {
    bytes[FAMILY_BYTE] = Family::HLL.id;
}

pub fn extract_lg_k(bytes: &[u8]) -> u8 {
    bytes[LG_K_BYTE]
}

pub fn insert_lg_k(bytes: &mut [u8], lg_k: u8) {
    bytes[LG_K_BYTE] = lg_k;
}

pub fn extract_lg_arr(bytes: &[u8]) -> u8 {
    bytes[LG_ARR_BYTE]
}

pub fn insert_lg_arr(bytes: &mut [u8], lg_arr: u8) {
    bytes[LG_ARR_BYTE] = lg_arr;
}

pub fn extract_flags(bytes: &[u8]) -> u8 {
    bytes[FLAGS_BYTE]
}

pub fn insert_flags(bytes: &mut [u8], flags: u8) {
    bytes[FLAGS_BYTE] = flags;
}

fn insert_flag(bytes: &mut [u8], mask: u8, set: bool) {
    if set {
        bytes[FLAGS_BYTE] |= mask;
    } else {
        bytes[FLAGS_BYTE] &= !mask;
    }
}

pub fn extract_empty_flag(bytes: &[u8]) -> bool {
    extract_flags(bytes) & EMPTY_FLAG_MASK != 0
}

pub fn insert_empty_flag(bytes: &mut [u8], empty: bool) {
    insert_flag(bytes, EMPTY_FLAG_MASK, empty);
}

pub fn extract_compact_flag(bytes: &[u8]) -> bool {
    extract_flags(bytes) & COMPACT_FLAG_MASK != 0
}

pub fn insert_compact_flag(bytes: &mut [u8], compact: bool) {
    insert_flag(bytes, COMPACT_FLAG_MASK, compact);
}

pub fn extract_ooo_flag(bytes: &[u8]) -> bool {
    extract_flags(bytes) & OUT_OF_ORDER_FLAG_MASK != 0
}

pub fn insert_ooo_flag(bytes: &mut [u8], ooo: bool) {
    insert_flag(bytes, OUT_OF_ORDER_FLAG_MASK, ooo);
}

pub fn extract_list_count(bytes: &[u8]) -> u32 {
    bytes[LIST_COUNT_BYTE] as u32
}

pub fn insert_list_count(bytes: &mut [u8], count: u32) {
    debug_assert!(count <= u8::MAX as u32);
    bytes[LIST_COUNT_BYTE] = count as u8;
}

pub fn extract_cur_min(bytes: &[u8]) -> u8 {
    bytes[HLL_CUR_MIN_BYTE]
}

pub fn insert_cur_min(bytes: &mut [u8], cur_min: u8) {
    bytes[HLL_CUR_MIN_BYTE] = cur_min;
}

pub fn extract_cur_mode_id(bytes: &[u8]) -> u8 {
    bytes[MODE_BYTE] & 0x3
}

pub fn extract_tgt_hll_type_id(bytes: &[u8]) -> u8 {
    (bytes[MODE_BYTE] >> 2) & 0x3
}

/// Encode mode byte from current mode and target type
pub fn insert_modes(bytes: &mut [u8], cur_mode: CurMode, hll_type: HllType) {
    bytes[MODE_BYTE] = (cur_mode as u8 & 0x3) | ((hll_type as u8 & 0x3) << 2);
}

pub fn extract_hash_set_count(bytes: &[u8]) -> u32 {
    get_u32(bytes, HASH_SET_COUNT_INT)
}

pub fn insert_hash_set_count(bytes: &mut [u8], count: u32) {
    put_u32(bytes, HASH_SET_COUNT_INT, count);
}

pub fn extract_hip_accum(bytes: &[u8]) -> f64 {
    get_f64(bytes, HIP_ACCUM_DOUBLE)
}

pub fn insert_hip_accum(bytes: &mut [u8], hip_accum: f64) {
    put_f64(bytes, HIP_ACCUM_DOUBLE, hip_accum);
}

pub fn extract_kxq0(bytes: &[u8]) -> f64 {
    get_f64(bytes, KXQ0_DOUBLE)
}

pub fn insert_kxq0(bytes: &mut [u8], kxq0: f64) {
    put_f64(bytes, KXQ0_DOUBLE, kxq0);
}

pub fn extract_kxq1(bytes: &[u8]) -> f64 {
    get_f64(bytes, KXQ1_DOUBLE)
}

pub fn insert_kxq1(bytes: &mut [u8], kxq1: f64) {
    put_f64(bytes, KXQ1_DOUBLE, kxq1);
}

pub fn extract_num_at_cur_min(bytes: &[u8]) -> u32 {
    get_u32(bytes, CUR_MIN_COUNT_INT)
}

pub fn insert_num_at_cur_min(bytes: &mut [u8], num: u32) {
    put_u32(bytes, CUR_MIN_COUNT_INT, num);
}

pub fn extract_aux_count(bytes: &[u8]) -> u32 {
    get_u32(bytes, AUX_COUNT_INT)
}

pub fn insert_aux_count(bytes: &mut [u8], count: u32) {
    put_u32(bytes, AUX_COUNT_INT, count);
}

/// Fields shared by every freshly written preamble.
pub fn insert_common(bytes: &mut [u8], pre_ints: u8, lg_k: u8, lg_arr: u8, flags: u8) {
    insert_pre_ints(bytes, pre_ints);
    insert_ser_ver(bytes);
    insert_family_id(bytes);
    insert_lg_k(bytes, lg_k);
    insert_lg_arr(bytes, lg_arr);
    insert_flags(bytes, flags);
}

/// Validate a preamble and decode the representation it describes.
pub fn check_preamble(bytes: &[u8]) -> Result<Mode, Error> {
    if bytes.len() < MIN_PREAMBLE_BYTES {
        return Err(Error::insufficient_capacity(MIN_PREAMBLE_BYTES, bytes.len()));
    }

    Family::HLL.validate_id(extract_family_id(bytes))?;

    let ser_ver = extract_ser_ver(bytes);
    if ser_ver != SER_VER {
        return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
    }

    check_lg_k(extract_lg_k(bytes))?;

    if extract_flags(bytes) & BIG_ENDIAN_FLAG_MASK != 0 {
        return Err(Error::invalid_argument("big-endian images are not supported"));
    }

    let pre_ints = extract_pre_ints(bytes);
    Family::HLL.validate_pre_ints(pre_ints)?;

    let cur_mode = CurMode::from_id(extract_cur_mode_id(bytes))?;
    let hll_type = HllType::from_id(extract_tgt_hll_type_id(bytes))?;

    let expected = match cur_mode {
        CurMode::List => LIST_PREINTS,
        CurMode::Set => HASH_SET_PREINTS,
        CurMode::Hll => HLL_PREINTS,
    };
    if pre_ints != expected {
        return Err(Error::invalid_argument(format!(
            "{cur_mode:?} mode preamble: expected {expected} ints, got {pre_ints}"
        )));
    }

    Ok(Mode::of(cur_mode, hll_type))
}
