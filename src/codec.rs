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

//! Byte region backing a sketch image.
//!
//! A sketch image lives either in a heap allocation owned by the sketch or in
//! a region borrowed from the caller. [`Memory`] hides the difference: every
//! accessor in the crate works on plain `&[u8]` / `&mut [u8]` slices obtained
//! from it, so owned and wrapped images are read and written identically.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::Error;

pub(crate) mod family;

/// The byte region behind a sketch.
#[derive(Debug)]
pub(crate) enum Memory<'a> {
    /// Owned by the sketch; grows on demand.
    Heap(Vec<u8>),
    /// Caller-owned and writable; capacity is fixed.
    Writable(&'a mut [u8]),
    /// Caller-owned, read-only.
    ReadOnly(&'a [u8]),
}

impl<'a> Memory<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Memory::Heap(bytes) => bytes,
            Memory::Writable(bytes) => bytes,
            Memory::ReadOnly(bytes) => bytes,
        }
    }

    /// Mutable view of the region.
    ///
    /// Fails with [`ErrorKind::ReadOnly`](crate::error::ErrorKind::ReadOnly) before any byte is
    /// touched when the region is not writable.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], Error> {
        match self {
            Memory::Heap(bytes) => Ok(bytes),
            Memory::Writable(bytes) => Ok(bytes),
            Memory::ReadOnly(_) => Err(Error::read_only("write to memory")),
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Memory::ReadOnly(_))
    }

    pub fn is_direct(&self) -> bool {
        !matches!(self, Memory::Heap(_))
    }

    /// Read-only projection borrowing this region.
    pub fn as_read_only(&self) -> Memory<'_> {
        Memory::ReadOnly(self.as_slice())
    }

    /// Make sure at least `required` bytes are addressable.
    ///
    /// Heap memory is extended with zeros; caller regions are never resized
    /// and report [`ErrorKind::InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity).
    pub fn ensure_capacity(&mut self, required: usize) -> Result<(), Error> {
        match self {
            Memory::Heap(bytes) => {
                if bytes.len() < required {
                    bytes.resize(required, 0);
                }
                Ok(())
            }
            Memory::Writable(bytes) => check_capacity(required, bytes.len()),
            Memory::ReadOnly(_) => Err(Error::read_only("grow memory")),
        }
    }
}

pub(crate) fn check_capacity(required: usize, available: usize) -> Result<(), Error> {
    if required > available {
        Err(Error::insufficient_capacity(required, available))
    } else {
        Ok(())
    }
}

#[inline]
pub(crate) fn get_u16(bytes: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&bytes[offset..offset + 2])
}

#[inline]
pub(crate) fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut bytes[offset..offset + 2], value);
}

#[inline]
pub(crate) fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&bytes[offset..offset + 4])
}

#[inline]
pub(crate) fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut bytes[offset..offset + 4], value);
}

#[inline]
pub(crate) fn get_f64(bytes: &[u8], offset: usize) -> f64 {
    LittleEndian::read_f64(&bytes[offset..offset + 8])
}

#[inline]
pub(crate) fn put_f64(bytes: &mut [u8], offset: usize, value: f64) {
    LittleEndian::write_f64(&mut bytes[offset..offset + 8], value);
}

/// Zero `len` bytes starting at `offset`.
#[inline]
pub(crate) fn clear(bytes: &mut [u8], offset: usize, len: usize) {
    bytes[offset..offset + len].fill(0);
}

/// Read `len` little-endian u32 values starting at `offset`.
pub(crate) fn get_u32_array(bytes: &[u8], offset: usize, len: usize) -> Vec<u32> {
    (0..len).map(|i| get_u32(bytes, offset + (i << 2))).collect()
}
