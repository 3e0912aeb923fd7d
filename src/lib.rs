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

//! HyperLogLog cardinality sketch over owned or caller-provided memory.
//!
//! The sketch keeps its whole state in a single serialized image. That image
//! either lives in a heap buffer owned by the sketch, or in a byte region the
//! caller hands in, so a sketch can be updated in place inside a larger buffer
//! (a page, a shared segment, a column value) without ever being copied out.
//!
//! See the [`hll`] module for the sketch itself.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod codec;

pub mod common;
pub mod error;
pub mod hll;
