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

//! Read-only access to a serialized sketch without copying it.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllSketch;
use crate::hll::HllType;
use crate::hll::container::coupon_estimate;
use crate::hll::container::coupon_lower_bound;
use crate::hll::container::coupon_upper_bound;
use crate::hll::estimator::HipEstimator;
use crate::hll::serialization::Image;

#[derive(Debug)]
enum Summary {
    Coupons(usize),
    Hll {
        estimator: HipEstimator,
        num_zeros: u32,
    },
}

/// A read-only view over a compact or updatable sketch image.
///
/// The image is validated once by [`HllSketchView::wrap`]; afterwards every read is
/// answered from the borrowed bytes and a small summary computed at wrap time.
#[derive(Debug)]
pub struct HllSketchView<'a> {
    image: Image<'a>,
    summary: Summary,
}

impl<'a> HllSketchView<'a> {
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let image = Image::parse(bytes)?;
        let preamble = *image.preamble();
        let summary = match preamble.cur_mode {
            CurMode::List | CurMode::Set => Summary::Coupons(image.coupons().len()),
            CurMode::Hll => {
                let values = image.hll_values()?;
                let num_zeros = values.iter().filter(|&&v| v == 0).count() as u32;
                let estimator =
                    HipEstimator::from_values(image.hip_accum(), preamble.out_of_order, values);
                Summary::Hll {
                    estimator,
                    num_zeros,
                }
            }
        };
        Ok(Self { image, summary })
    }

    pub fn lg_config_k(&self) -> u8 {
        self.image.preamble().lg_config_k
    }

    pub fn target_type(&self) -> HllType {
        self.image.preamble().hll_type
    }

    pub fn current_mode(&self) -> CurMode {
        self.image.preamble().cur_mode
    }

    pub fn is_compact(&self) -> bool {
        self.image.preamble().compact
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.summary, Summary::Coupons(0))
    }

    pub fn is_out_of_order(&self) -> bool {
        match &self.summary {
            Summary::Coupons(_) => false,
            Summary::Hll { estimator, .. } => estimator.is_out_of_order(),
        }
    }

    pub fn estimate(&self) -> f64 {
        match &self.summary {
            Summary::Coupons(len) => coupon_estimate(*len),
            // a zero floor with `num_zeros` buckets on it describes every bucket width
            Summary::Hll {
                estimator,
                num_zeros,
            } => estimator.estimate(self.lg_config_k(), 0, *num_zeros),
        }
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match &self.summary {
            Summary::Coupons(len) => coupon_lower_bound(*len, num_std_dev.as_f64()),
            Summary::Hll {
                estimator,
                num_zeros,
            } => estimator.lower_bound(self.lg_config_k(), 0, *num_zeros, num_std_dev),
        }
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match &self.summary {
            Summary::Coupons(len) => coupon_upper_bound(*len, num_std_dev.as_f64()),
            Summary::Hll {
                estimator,
                num_zeros,
            } => estimator.upper_bound(self.lg_config_k(), 0, *num_zeros, num_std_dev),
        }
    }

    /// Copy the viewed image into an independent heap sketch.
    pub fn to_sketch(&self) -> Result<HllSketch, Error> {
        HllSketch::deserialize(self.image.bytes())
    }
}
