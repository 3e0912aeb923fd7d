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

use crate::codec::Memory;
use crate::error::Error;
use crate::hll::{CurMode, HllType, array4, array6, array8, hash_set, list};

/// Representation currently held by a sketch image.
///
/// Every variant addresses the same region; a transition rewrites the region and
/// yields the successor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    List,
    Set,
    Array4,
    Array6,
    Array8,
}

impl Mode {
    pub fn of(cur_mode: CurMode, hll_type: HllType) -> Self {
        match cur_mode {
            CurMode::List => Mode::List,
            CurMode::Set => Mode::Set,
            CurMode::Hll => Mode::hll(hll_type),
        }
    }

    pub fn hll(hll_type: HllType) -> Self {
        match hll_type {
            HllType::Hll4 => Mode::Array4,
            HllType::Hll6 => Mode::Array6,
            HllType::Hll8 => Mode::Array8,
        }
    }

    pub fn cur_mode(self) -> CurMode {
        match self {
            Mode::List => CurMode::List,
            Mode::Set => CurMode::Set,
            Mode::Array4 | Mode::Array6 | Mode::Array8 => CurMode::Hll,
        }
    }

    /// Apply a coupon to the image held by `mem` and return the resulting mode.
    ///
    /// The caller has already checked that the image is writable and updatable.
    pub fn update(
        self,
        mem: &mut Memory<'_>,
        lg_config_k: u8,
        hll_type: HllType,
        coupon: u32,
    ) -> Result<Mode, Error> {
        match self {
            Mode::List => list::update(mem, lg_config_k, hll_type, coupon),
            Mode::Set => hash_set::update(mem, lg_config_k, hll_type, coupon),
            Mode::Array4 => {
                array4::update(mem, lg_config_k, coupon)?;
                Ok(self)
            }
            Mode::Array6 => {
                array6::update(mem.as_mut_slice()?, lg_config_k, coupon)?;
                Ok(self)
            }
            Mode::Array8 => {
                array8::update(mem.as_mut_slice()?, lg_config_k, coupon)?;
                Ok(self)
            }
        }
    }
}
