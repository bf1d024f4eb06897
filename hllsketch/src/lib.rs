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

//! HyperLogLog cardinality sketches.
//!
//! The [`hll`] module holds the sketch, its union operator and the storage types that let a
//! sketch live either on the heap or inside caller-provided memory. The binary layout
//! follows the Apache DataSketches HLL format, so images can be exchanged with the Java and
//! C++ libraries.
//!
//! ```
//! use hllsketch::common::NumStdDev;
//! use hllsketch::hll::{HllSketch, HllType};
//!
//! let mut sketch = HllSketch::new(12, HllType::Hll8);
//! for i in 0..10_000u64 {
//!     sketch.update(i);
//! }
//! let estimate = sketch.estimate();
//! assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
//! assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod codec;

pub mod common;
pub mod error;
pub mod hll;
