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

use crate::codec::get_u32;
use crate::hll::mode::Mode;
use crate::hll::preamble::{HLL_BYTE_ARR_START, extract_compact_flag};
use crate::hll::{array4, array6, array8, container, get_slot, get_value, pack_coupon};

/// Lazy cursor over the `(slot, value)` pairs of a sketch image.
///
/// In LIST and SET mode the cursor walks the coupon array; in HLL mode it
/// walks the K registers in slot order. [`next_valid`](Self::next_valid)
/// skips empty cells and zero registers, [`next_all`](Self::next_all) does
/// not.
///
/// The [`Iterator`] implementation yields the valid pairs.
///
/// # Examples
///
/// ```
/// use datasketches_hll::hll::{HllSketch, HllType};
///
/// let mut sketch = HllSketch::new(4, HllType::Hll8);
/// sketch.update_coupon((3 << 26) | 5).unwrap();
///
/// let mut pairs = sketch.pair_iterator();
/// assert!(pairs.next_valid());
/// assert_eq!((pairs.slot(), pairs.value()), (5, 3));
/// assert!(!pairs.next_valid());
/// ```
#[derive(Debug, Clone)]
pub struct PairIterator<'a> {
    bytes: &'a [u8],
    lg_config_k: u8,
    mode: Mode,
    compact: bool,
    len: usize,
    next: usize,
    key: u32,
    value: u8,
}

impl<'a> PairIterator<'a> {
    pub(crate) fn new(bytes: &'a [u8], lg_config_k: u8, mode: Mode) -> Self {
        let len = match mode {
            Mode::List | Mode::Set => container::arr_len(bytes, mode),
            Mode::Array4 | Mode::Array6 | Mode::Array8 => 1 << lg_config_k,
        };
        Self {
            bytes,
            lg_config_k,
            mode,
            compact: extract_compact_flag(bytes),
            len,
            next: 0,
            key: 0,
            value: 0,
        }
    }

    /// Advance to the next position, empty or not.
    pub fn next_all(&mut self) -> bool {
        if self.next >= self.len {
            return false;
        }
        self.load(self.next);
        self.next += 1;
        true
    }

    /// Advance to the next position holding a non-zero value.
    pub fn next_valid(&mut self) -> bool {
        while self.next_all() {
            if self.value != 0 {
                return true;
            }
        }
        false
    }

    /// Array index of the current position
    pub fn index(&self) -> usize {
        self.next.saturating_sub(1)
    }

    /// Full 26-bit key in coupon modes, the slot in HLL mode
    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn slot(&self) -> u32 {
        self.key & ((1 << self.lg_config_k) - 1)
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Current position packed as a coupon
    pub fn pair(&self) -> u32 {
        pack_coupon(self.key, self.value)
    }

    fn load(&mut self, index: usize) {
        let slot = index as u32;
        match self.mode {
            Mode::List | Mode::Set => {
                let coupon = get_u32(self.bytes, container::arr_start(self.mode) + (index << 2));
                self.key = get_slot(coupon);
                self.value = get_value(coupon);
            }
            Mode::Array4 => {
                self.key = slot;
                self.value = array4::get(self.bytes, self.lg_config_k, self.compact, slot);
            }
            Mode::Array6 => {
                self.key = slot;
                self.value = array6::get(self.bytes, HLL_BYTE_ARR_START, slot);
            }
            Mode::Array8 => {
                self.key = slot;
                self.value = array8::get(self.bytes, HLL_BYTE_ARR_START, slot);
            }
        }
    }
}

impl Iterator for PairIterator<'_> {
    type Item = (u32, u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_valid() {
            Some((self.slot(), self.value))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::put_u32;
    use crate::hll::preamble::{LIST_INT_ARR_START, insert_lg_arr, insert_list_count};

    #[test]
    fn test_list_pairs() {
        let mut bytes = vec![0u8; 40];
        insert_lg_arr(&mut bytes, 3);
        put_u32(&mut bytes, LIST_INT_ARR_START, pack_coupon(1000, 4));
        put_u32(&mut bytes, LIST_INT_ARR_START + 4, pack_coupon(3, 1));
        insert_list_count(&mut bytes, 2);

        let mut it = PairIterator::new(&bytes, 4, Mode::List);
        assert!(it.next_valid());
        assert_eq!(it.index(), 0);
        assert_eq!(it.key(), 1000);
        assert_eq!(it.slot(), 1000 & 15);
        assert_eq!(it.value(), 4);
        assert_eq!(it.pair(), pack_coupon(1000, 4));
        assert!(it.next_valid());
        assert_eq!(it.index(), 1);
        assert!(!it.next_valid());

        let mut all = PairIterator::new(&bytes, 4, Mode::List);
        let mut positions = 0;
        while all.next_all() {
            positions += 1;
        }
        assert_eq!(positions, 8);
    }

    #[test]
    fn test_hll_pairs_in_slot_order() {
        let lg_k = 4;
        let mut bytes = vec![0u8; HLL_BYTE_ARR_START + array8::arr_bytes(lg_k)];
        array8::put(&mut bytes, HLL_BYTE_ARR_START, 9, 2);
        array8::put(&mut bytes, HLL_BYTE_ARR_START, 2, 7);

        let pairs: Vec<_> = PairIterator::new(&bytes, lg_k, Mode::Array8).collect();
        assert_eq!(pairs, vec![(2, 7), (9, 2)]);

        let mut all = PairIterator::new(&bytes, lg_k, Mode::Array8);
        let mut count = 0;
        while all.next_all() {
            assert_eq!(all.slot() as usize, all.index());
            count += 1;
        }
        assert_eq!(count, 16);
    }
}
