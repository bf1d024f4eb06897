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

//! Harmonic numbers for the linear-counting half of the composite estimator.

const NUM_EXACT: usize = 25;
const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Exact harmonic numbers H(n) for n = 0..24
static EXACT_HARMONIC: [f64; NUM_EXACT] = [
    0.0,
    1.0,
    1.5,
    11.0 / 6.0,
    25.0 / 12.0,
    137.0 / 60.0,
    49.0 / 20.0,
    363.0 / 140.0,
    761.0 / 280.0,
    7129.0 / 2520.0,
    7381.0 / 2520.0,
    83711.0 / 27720.0,
    86021.0 / 27720.0,
    1145993.0 / 360360.0,
    1171733.0 / 360360.0,
    1195757.0 / 360360.0,
    2436559.0 / 720720.0,
    42142223.0 / 12252240.0,
    14274301.0 / 4084080.0,
    275295799.0 / 77597520.0,
    55835135.0 / 15519504.0,
    18858053.0 / 5173168.0,
    19093197.0 / 5173168.0,
    444316699.0 / 118982864.0,
    1347822955.0 / 356948592.0,
];

/// H(n) = 1 + 1/2 + ... + 1/n, from the table below 25 and the asymptotic series above.
fn harmonic_number(n: u32) -> f64 {
    if (n as usize) < NUM_EXACT {
        return EXACT_HARMONIC[n as usize];
    }

    let x = n as f64;
    let inv_sq = 1.0 / (x * x);
    let mut sum = x.ln() + EULER_MASCHERONI + (1.0 / (2.0 * x));

    let mut pow = inv_sq; // n^-2
    sum -= pow / 12.0;
    pow *= inv_sq; // n^-4
    sum += pow / 120.0;
    pow *= inv_sq; // n^-6
    sum -= pow / 252.0;
    pow *= inv_sq; // n^-8
    sum += pow / 240.0;

    sum
}

/// Expected number of distinct items that set `num_bits_set` of `bit_vector_length` bits.
pub(super) fn bitmap_estimate(bit_vector_length: u32, num_bits_set: u32) -> f64 {
    debug_assert!(num_bits_set <= bit_vector_length);
    let k = bit_vector_length;
    (k as f64) * (harmonic_number(k) - harmonic_number(k - num_bits_set))
}
