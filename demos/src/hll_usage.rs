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

//! Example demonstrating HLL sketch usage

use hllsketch::common::NumStdDev;
use hllsketch::hll::DirectHllSketch;
use hllsketch::hll::HllSketch;
use hllsketch::hll::HllSketchView;
use hllsketch::hll::HllType;
use hllsketch::hll::HllUnion;

fn main() {
    println!("=== HLL Sketch Example ===\n");

    // Example 1: Basic usage
    println!("1. Basic HLL Sketch Usage:");
    let mut sketch = HllSketch::new(12, HllType::Hll8);
    for i in 0..10_000u64 {
        sketch.update(i);
    }
    for i in 0..10_000u64 {
        sketch.update(i);
    }
    let estimate = sketch.estimate();
    println!("   Estimate: {estimate:.2} (actual 10000)");
    println!(
        "   95% bounds: [{:.2}, {:.2}]",
        sketch.lower_bound(NumStdDev::Two),
        sketch.upper_bound(NumStdDev::Two)
    );
    println!("   Mode: {:?}", sketch.current_mode());
    println!();

    // Example 2: Target types trade size for speed
    println!("2. Compact sizes per target type:");
    for hll_type in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
        let converted = sketch.copy_as(hll_type);
        println!(
            "   {hll_type:?}: {} bytes, estimate {:.2}",
            converted.compact_serialization_bytes(),
            converted.estimate()
        );
    }
    println!();

    // Example 3: Union of overlapping streams
    println!("3. Union:");
    let mut other = HllSketch::new(10, HllType::Hll4);
    for i in 5_000..15_000u64 {
        other.update(i);
    }
    let mut union = HllUnion::new(12);
    union.update(&sketch);
    union.update(&other);
    let result = union.get_result(HllType::Hll4);
    println!(
        "   Estimate: {:.2} (actual 15000) at lg_k {}",
        result.estimate(),
        result.lg_config_k()
    );
    println!();

    // Example 4: Serialization and read-only views
    println!("4. Serialization:");
    let bytes = sketch.serialize();
    let view = match HllSketchView::wrap(&bytes) {
        Ok(view) => view,
        Err(err) => {
            eprintln!("   failed to read image: {err}");
            return;
        }
    };
    println!("   {} compact bytes, view estimate {:.2}", bytes.len(), view.estimate());
    println!();

    // Example 5: A sketch living in caller-provided memory
    println!("5. Direct sketch:");
    let mut region = vec![0u8; HllSketch::max_updatable_serialization_bytes(11, HllType::Hll6)];
    match DirectHllSketch::new_in(11, HllType::Hll6, &mut region) {
        Ok(mut direct) => {
            for i in 0..3_000u64 {
                direct.update_str(&format!("user-{i}"));
            }
            println!(
                "   Estimate: {:.2} (actual 3000), still in region: {}",
                direct.estimate(),
                direct.is_direct()
            );
        }
        Err(err) => eprintln!("   failed to format region: {err}"),
    }
}
