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

use std::hash::Hash;

use tracing::trace;

use crate::codec::{Memory, check_capacity};
use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::iterator::PairIterator;
use crate::hll::mode::Mode;
use crate::hll::preamble::{
    extract_compact_flag, extract_cur_min, extract_empty_flag, extract_lg_k,
    extract_num_at_cur_min, extract_ooo_flag, extract_tgt_hll_type_id, insert_modes,
    insert_ooo_flag,
};
use crate::hll::{
    CurMode, HllType, MAX_LG_K, MIN_LG_K, check_lg_k, container, coupon, get_value, list,
    promotion, serialization,
};

/// A HyperLogLog sketch whose state is a serialized image.
///
/// The image lives either in a heap buffer owned by the sketch or in a byte
/// region borrowed from the caller for `'a`. Both are read and updated the
/// same way; only heap sketches can grow past their initial capacity.
#[derive(Debug)]
pub struct HllSketch<'a> {
    lg_config_k: u8,
    hll_type: HllType,
    mode: Mode,
    mem: Memory<'a>,
}

impl HllSketch<'static> {
    /// Create an empty heap sketch.
    ///
    /// # Panics
    ///
    /// If lg_config_k is not in [4, 21].
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [4, 21], got {lg_config_k}"
        );

        let mut bytes = vec![0u8; list::image_bytes()];
        list::init(&mut bytes, lg_config_k, hll_type);
        Self {
            lg_config_k,
            hll_type,
            mode: Mode::List,
            mem: Memory::Heap(bytes),
        }
    }

    /// Deserialize an image of either form into an updatable heap sketch.
    ///
    /// Compact coupon tables and compact aux tables are rehashed into full
    /// tables.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(12, HllType::Hll4);
    /// sketch.update("apple").unwrap();
    ///
    /// let restored = HllSketch::heapify(&sketch.to_compact_bytes()).unwrap();
    /// assert_eq!(restored.estimate(), 1.0);
    /// assert!(!restored.is_compact());
    /// ```
    pub fn heapify(bytes: &[u8]) -> Result<Self, Error> {
        let mode = serialization::check_image(bytes)?;
        let hll_type = HllType::from_id(extract_tgt_hll_type_id(bytes))?;
        Ok(Self {
            lg_config_k: extract_lg_k(bytes),
            hll_type,
            mode,
            mem: Memory::Heap(serialization::to_updatable(bytes, mode)),
        })
    }

    /// Largest updatable image a sketch with these parameters needs, assuming
    /// the HLL_4 aux table keeps its initial size.
    ///
    /// A region of this size hosts a sketch through every mode transition.
    ///
    /// # Panics
    ///
    /// If lg_config_k is not in [4, 21].
    pub fn max_updatable_serialization_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [4, 21], got {lg_config_k}"
        );
        serialization::max_updatable_bytes(lg_config_k, hll_type)
    }
}

impl<'a> HllSketch<'a> {
    /// Create an empty sketch inside a caller region.
    ///
    /// The region must hold at least the 40-byte LIST image. It is never
    /// resized: a later transition that needs more room fails with
    /// [`ErrorKind::InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity)
    /// and leaves the region as it was.
    pub fn new_in(
        lg_config_k: u8,
        hll_type: HllType,
        region: &'a mut [u8],
    ) -> Result<Self, Error> {
        check_lg_k(lg_config_k)?;
        check_capacity(list::image_bytes(), region.len())?;

        list::init(region, lg_config_k, hll_type);
        trace!(
            lg_config_k,
            ?hll_type,
            capacity = region.len(),
            "initialized sketch region"
        );
        Ok(Self {
            lg_config_k,
            hll_type,
            mode: Mode::List,
            mem: Memory::Writable(region),
        })
    }

    /// Wrap an updatable image for further updates in place.
    ///
    /// Compact images cannot be updated and are rejected.
    pub fn writable_wrap(region: &'a mut [u8]) -> Result<Self, Error> {
        let mode = serialization::check_image(region)?;
        if extract_compact_flag(region) {
            return Err(Error::invalid_argument("cannot wrap a compact image for writing"));
        }
        let hll_type = HllType::from_id(extract_tgt_hll_type_id(region))?;
        Ok(Self {
            lg_config_k: extract_lg_k(region),
            hll_type,
            mode,
            mem: Memory::Writable(region),
        })
    }

    /// Wrap an image of either form for reading.
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let mode = serialization::check_image(bytes)?;
        let hll_type = HllType::from_id(extract_tgt_hll_type_id(bytes))?;
        Ok(Self {
            lg_config_k: extract_lg_k(bytes),
            hll_type,
            mode,
            mem: Memory::ReadOnly(bytes),
        })
    }

    /// Hash `value` and present the resulting coupon to the sketch.
    pub fn update<T: Hash>(&mut self, value: T) -> Result<(), Error> {
        self.update_coupon(coupon(value))
    }

    /// Present a coupon (`value << 26 | key`) to the sketch.
    ///
    /// Duplicates and values not above the current register leave the image
    /// unchanged. Any error leaves the image as it was before the call.
    pub fn update_coupon(&mut self, coupon: u32) -> Result<(), Error> {
        if self.is_read_only() {
            return Err(Error::read_only("update"));
        }
        if get_value(coupon) == 0 {
            return Err(Error::invalid_argument(format!(
                "coupon {coupon:#010x} has a zero value"
            )));
        }
        self.mode = self
            .mode
            .update(&mut self.mem, self.lg_config_k, self.hll_type, coupon)?;
        Ok(())
    }

    pub fn estimate(&self) -> f64 {
        match self.mode {
            Mode::List | Mode::Set => container::estimate(self.coupon_count()),
            _ => {
                let bytes = self.bytes();
                HipEstimator::from_image(bytes).estimate(
                    self.lg_config_k,
                    extract_cur_min(bytes),
                    extract_num_at_cur_min(bytes),
                )
            }
        }
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self.mode {
            Mode::List | Mode::Set => container::upper_bound(self.coupon_count(), num_std_dev),
            _ => {
                let bytes = self.bytes();
                HipEstimator::from_image(bytes).upper_bound(
                    self.lg_config_k,
                    extract_cur_min(bytes),
                    extract_num_at_cur_min(bytes),
                    num_std_dev,
                )
            }
        }
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self.mode {
            Mode::List | Mode::Set => container::lower_bound(self.coupon_count(), num_std_dev),
            _ => {
                let bytes = self.bytes();
                HipEstimator::from_image(bytes).lower_bound(
                    self.lg_config_k,
                    extract_cur_min(bytes),
                    extract_num_at_cur_min(bytes),
                    num_std_dev,
                )
            }
        }
    }

    /// Serialize to the compact form.
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        serialization::to_compact(self.bytes(), self.mode)
    }

    /// Serialize to the updatable form, which [`writable_wrap`](Self::writable_wrap) accepts.
    pub fn to_updatable_bytes(&self) -> Vec<u8> {
        serialization::to_updatable(self.bytes(), self.mode)
    }

    pub fn updatable_serialization_bytes(&self) -> usize {
        serialization::updatable_bytes(self.bytes(), self.mode)
    }

    pub fn compact_serialization_bytes(&self) -> usize {
        serialization::compact_bytes(self.bytes(), self.mode)
    }

    /// Iterate over the valid `(slot, value)` pairs.
    pub fn iter(&self) -> PairIterator<'_> {
        self.pair_iterator()
    }

    /// Cursor over every position of the current representation.
    pub fn pair_iterator(&self) -> PairIterator<'_> {
        PairIterator::new(self.bytes(), self.lg_config_k, self.mode)
    }

    /// Number of stored coupons in LIST and SET mode, the number of non-zero
    /// registers in HLL mode.
    pub fn coupon_count(&self) -> u32 {
        let bytes = self.bytes();
        match self.mode {
            Mode::List | Mode::Set => container::coupon_count(bytes, self.mode),
            _ => {
                let k = 1u32 << self.lg_config_k;
                if extract_cur_min(bytes) == 0 {
                    k - extract_num_at_cur_min(bytes)
                } else {
                    k
                }
            }
        }
    }

    pub fn cur_mode(&self) -> CurMode {
        self.mode.cur_mode()
    }

    pub fn hll_type(&self) -> HllType {
        self.hll_type
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn is_empty(&self) -> bool {
        extract_empty_flag(self.bytes())
    }

    pub fn is_compact(&self) -> bool {
        extract_compact_flag(self.bytes())
    }

    /// Whether updates stopped arriving in stream order, which disables the
    /// HIP estimator.
    pub fn is_out_of_order(&self) -> bool {
        extract_ooo_flag(self.bytes())
    }

    /// Whether the sketch rejects updates: a read-only wrap or a compact image.
    pub fn is_read_only(&self) -> bool {
        !self.mem.is_writable() || self.is_compact()
    }

    /// Whether the image lives in a caller region.
    pub fn is_direct(&self) -> bool {
        self.mem.is_direct()
    }

    /// Read-only view sharing this sketch's image.
    pub fn as_read_only(&self) -> HllSketch<'_> {
        HllSketch {
            lg_config_k: self.lg_config_k,
            hll_type: self.hll_type,
            mode: self.mode,
            mem: self.mem.as_read_only(),
        }
    }

    /// Owned, updatable copy on the heap.
    pub fn copy(&self) -> HllSketch<'static> {
        HllSketch {
            lg_config_k: self.lg_config_k,
            hll_type: self.hll_type,
            mode: self.mode,
            mem: Memory::Heap(self.to_updatable_bytes()),
        }
    }

    /// Owned, updatable copy with a different target type.
    ///
    /// Coupon modes only change the type recorded in the preamble. HLL mode
    /// re-encodes every register and carries the estimator state over.
    pub fn copy_as(&self, hll_type: HllType) -> Result<HllSketch<'static>, Error> {
        if hll_type == self.hll_type {
            return Ok(self.copy());
        }

        let lg_config_k = self.lg_config_k;
        match self.mode {
            Mode::List | Mode::Set => {
                let mut bytes = self.to_updatable_bytes();
                insert_modes(&mut bytes, self.mode.cur_mode(), hll_type);
                Ok(HllSketch {
                    lg_config_k,
                    hll_type,
                    mode: self.mode,
                    mem: Memory::Heap(bytes),
                })
            }
            _ => {
                let coupons = self.valid_coupons();
                let mut mem = Memory::Heap(vec![]);
                let mode = promotion::write_hll(&mut mem, lg_config_k, hll_type, &coupons)?;

                let source = self.bytes();
                let bytes = mem.as_mut_slice()?;
                HipEstimator::from_image(source).write_to(bytes);
                insert_ooo_flag(bytes, extract_ooo_flag(source));
                Ok(HllSketch {
                    lg_config_k,
                    hll_type,
                    mode,
                    mem,
                })
            }
        }
    }

    /// Return the sketch to the empty LIST state, keeping lg_config_k and the
    /// target type.
    pub fn reset(&mut self) -> Result<(), Error> {
        if self.is_read_only() {
            return Err(Error::read_only("reset"));
        }
        if let Memory::Heap(bytes) = &mut self.mem {
            bytes.resize(list::image_bytes(), 0);
        }
        list::init(self.mem.as_mut_slice()?, self.lg_config_k, self.hll_type);
        self.mode = Mode::List;
        Ok(())
    }

    fn valid_coupons(&self) -> Vec<u32> {
        let mut pairs = self.pair_iterator();
        let mut coupons = vec![];
        while pairs.next_valid() {
            coupons.push(pairs.pair());
        }
        coupons
    }

    fn bytes(&self) -> &[u8] {
        self.mem.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::pack_coupon;

    #[test]
    fn test_new_is_empty_list() {
        let sketch = HllSketch::new(12, HllType::Hll8);
        assert!(sketch.is_empty());
        assert_eq!(sketch.cur_mode(), CurMode::List);
        assert_eq!(sketch.estimate(), 0.0);
        assert!(!sketch.is_direct());
        assert!(!sketch.is_read_only());
        assert_eq!(sketch.updatable_serialization_bytes(), 40);
        assert_eq!(sketch.compact_serialization_bytes(), 8);
    }

    #[test]
    #[should_panic(expected = "lg_config_k must be in [4, 21]")]
    fn test_new_rejects_lg_k() {
        HllSketch::new(3, HllType::Hll4);
    }

    #[test]
    fn test_zero_value_coupon_is_rejected() {
        let mut sketch = HllSketch::new(10, HllType::Hll6);
        let err = sketch.update_coupon(1234).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(sketch.is_empty());
    }

    #[test]
    fn test_hll_coupon_count() {
        let mut sketch = HllSketch::new(4, HllType::Hll8);
        for slot in 0..10 {
            sketch.update_coupon(pack_coupon(slot, 2)).unwrap();
        }
        assert_eq!(sketch.cur_mode(), CurMode::Hll);
        assert_eq!(sketch.coupon_count(), 10);
        assert_eq!(sketch.iter().count(), 10);
    }

    #[test]
    fn test_register_summaries_track_registers() {
        for hll_type in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let mut sketch = HllSketch::new(6, hll_type);
            for i in 0..5000u32 {
                sketch.update(i).unwrap();

                if sketch.cur_mode() != CurMode::Hll || i % 50 != 0 {
                    continue;
                }
                let bytes = sketch.bytes();
                let cur_min = extract_cur_min(bytes);
                let mut pairs = sketch.pair_iterator();
                let mut kxq = 0.0;
                let mut at_cur_min = 0;
                while pairs.next_all() {
                    kxq += crate::hll::estimator::inv_pow2(pairs.value());
                    if pairs.value() == cur_min {
                        at_cur_min += 1;
                    }
                }
                let estimator = HipEstimator::from_image(bytes);
                assert!((estimator.kxq0() + estimator.kxq1() - kxq).abs() < 1e-9);
                assert_eq!(extract_num_at_cur_min(bytes), at_cur_min);
            }
        }
    }

    #[test]
    fn test_copy_as_keeps_registers_and_state() {
        let mut sketch = HllSketch::new(8, HllType::Hll8);
        for i in 0..2000u32 {
            sketch.update(i).unwrap();
        }
        assert_eq!(sketch.cur_mode(), CurMode::Hll);

        for hll_type in [HllType::Hll4, HllType::Hll6] {
            let copy = sketch.copy_as(hll_type).unwrap();
            assert_eq!(copy.hll_type(), hll_type);
            assert_eq!(copy.estimate(), sketch.estimate());
            assert!(copy.iter().eq(sketch.iter()));
        }
    }

    #[test]
    fn test_copy_as_in_coupon_mode() {
        let mut sketch = HllSketch::new(12, HllType::Hll8);
        for slot in 0..20 {
            sketch.update_coupon(pack_coupon(slot, 1)).unwrap();
        }
        let copy = sketch.copy_as(HllType::Hll4).unwrap();
        assert_eq!(copy.cur_mode(), CurMode::Set);
        assert_eq!(copy.hll_type(), HllType::Hll4);
        assert_eq!(copy.coupon_count(), 20);
    }

    #[test]
    fn test_reset_heap_and_region() {
        let mut sketch = HllSketch::new(5, HllType::Hll4);
        for i in 0..100u32 {
            sketch.update(i).unwrap();
        }
        sketch.reset().unwrap();
        assert!(sketch.is_empty());
        assert_eq!(sketch.to_updatable_bytes().len(), 40);

        let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(5, HllType::Hll4)];
        let mut direct = HllSketch::new_in(5, HllType::Hll4, &mut region).unwrap();
        for i in 0..100u32 {
            direct.update(i).unwrap();
        }
        direct.reset().unwrap();
        assert_eq!(direct.cur_mode(), CurMode::List);
        assert!(direct.is_empty());
    }
}
