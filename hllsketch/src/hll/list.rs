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

//! Simple list for storing unique coupons in order
//!
//! Provides sequential storage with linear search for duplicates.
//! Efficient for small numbers of coupons before transitioning to HashSet.

use crate::hll::COUPON_EMPTY;
use crate::hll::Storage;
use crate::hll::container::Container;
use crate::hll::preamble::LG_INIT_LIST_SIZE;
use crate::hll::preamble::LIST_INT_ARR_START;

/// List for sequential coupon storage with duplicate detection
#[derive(Debug)]
pub(super) struct List<S> {
    container: Container<S>,
}

impl<S: Storage> List<S> {
    pub fn new(storage: S) -> Self {
        Self {
            container: Container::new(storage, LIST_INT_ARR_START, LG_INIT_LIST_SIZE),
        }
    }

    /// Adopt a list image whose first `len` slots are populated.
    pub fn from_storage(storage: S, len: usize) -> Self {
        Self {
            container: Container::from_storage(storage, LIST_INT_ARR_START, LG_INIT_LIST_SIZE, len),
        }
    }

    /// Insert coupon into list, ignoring duplicates
    pub fn update(&mut self, coupon: u32) {
        for index in 0..self.container.capacity() {
            let value = self.container.get(index);
            if value == COUPON_EMPTY {
                // Found empty slot, insert new coupon
                self.container.set(index, coupon);
                self.container.inc_len();
                break;
            } else if value == coupon {
                // Duplicate found, nothing to do
                break;
            }
        }
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.container.storage_mut()
    }

    pub fn into_storage(self) -> S {
        self.container.into_storage()
    }
}

impl<S> List<S> {
    pub fn container(&self) -> &Container<S> {
        &self.container
    }
}

impl<S: AsRef<[u8]>> List<S> {
    pub fn transplant<T: Storage>(&self, storage: T) -> List<T> {
        List {
            container: self.container.transplant(storage),
        }
    }
}
