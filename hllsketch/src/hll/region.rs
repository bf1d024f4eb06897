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

//! Backing buffers for a sketch's working image.

mod sealed {
    pub trait Sealed {}

    impl Sealed for Vec<u8> {}
    impl Sealed for super::Region<'_> {}
}

/// A byte buffer holding a sketch's updatable image.
///
/// Implemented for `Vec<u8>` (heap sketches) and [`Region`] (sketches living in caller
/// memory). The trait is sealed.
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> + Default + sealed::Sealed {
    /// Whether the image must be a valid serialized sketch between calls.
    const WRITE_THROUGH: bool;

    /// Makes sure at least `len` bytes are addressable, growing the buffer if needed.
    fn reserve_len(&mut self, len: usize);

    /// Whether the bytes still live in memory owned by the caller.
    fn is_borrowed(&self) -> bool {
        false
    }
}

impl Storage for Vec<u8> {
    const WRITE_THROUGH: bool = false;

    fn reserve_len(&mut self, len: usize) {
        if self.len() < len {
            self.resize(len, 0);
        }
    }
}

/// Memory a direct sketch writes into.
///
/// A region starts out borrowed from the caller. If the sketch ever needs more bytes than
/// the borrowed slice holds, the contents move into an owned buffer and the caller's slice
/// is no longer updated.
#[derive(Debug)]
pub enum Region<'a> {
    /// Caller memory, updated in place.
    Borrowed(&'a mut [u8]),
    /// Heap memory the sketch migrated to.
    Owned(Vec<u8>),
}

impl<'a> From<&'a mut [u8]> for Region<'a> {
    fn from(bytes: &'a mut [u8]) -> Self {
        Region::Borrowed(bytes)
    }
}

impl Default for Region<'_> {
    fn default() -> Self {
        Region::Owned(Vec::new())
    }
}

impl AsRef<[u8]> for Region<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Region::Borrowed(bytes) => bytes,
            Region::Owned(bytes) => bytes,
        }
    }
}

impl AsMut<[u8]> for Region<'_> {
    fn as_mut(&mut self) -> &mut [u8] {
        match self {
            Region::Borrowed(bytes) => bytes,
            Region::Owned(bytes) => bytes,
        }
    }
}

impl Storage for Region<'_> {
    const WRITE_THROUGH: bool = true;

    fn reserve_len(&mut self, len: usize) {
        match self {
            Region::Borrowed(bytes) if bytes.len() < len => {
                tracing::debug!(
                    region_len = bytes.len(),
                    required = len,
                    "sketch outgrew its region; moving to heap memory"
                );
                let mut owned = bytes.to_vec();
                owned.resize(len, 0);
                *self = Region::Owned(owned);
            }
            Region::Borrowed(_) => {}
            Region::Owned(bytes) => bytes.reserve_len(len),
        }
    }

    fn is_borrowed(&self) -> bool {
        matches!(self, Region::Borrowed(_))
    }
}
