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

//! Four-point Lagrange interpolation over monotone tables.

/// Interpolate `y(x)` from the paired tables `x_arr` and `y_arr`.
///
/// Values beyond the last point are extrapolated along the line through the origin and the
/// last point.
pub(super) fn using_x_and_y_tables(x_arr: &[f64], y_arr: &[f64], x: f64) -> f64 {
    debug_assert!(x_arr.len() >= 4 && x_arr.len() == y_arr.len());
    debug_assert!(x >= x_arr[0], "x value out of range: {x}");

    let last = x_arr.len() - 1;
    if x >= x_arr[last] {
        return y_arr[last] * (x / x_arr[last]);
    }

    let offset = interpolation_offset(x_arr, x);
    cubic_interpolate(
        x_arr[offset],
        y_arr[offset],
        x_arr[offset + 1],
        y_arr[offset + 1],
        x_arr[offset + 2],
        y_arr[offset + 2],
        x_arr[offset + 3],
        y_arr[offset + 3],
        x,
    )
}

/// Interpolate `y(x)` where the y table is implicitly `i * y_stride`.
pub(super) fn using_x_arr_and_y_stride(x_arr: &[f64], y_stride: f64, x: f64) -> f64 {
    debug_assert!(x_arr.len() >= 4);
    debug_assert!(x >= x_arr[0] && x <= x_arr[x_arr.len() - 1]);

    let last = x_arr.len() - 1;
    if x == x_arr[last] {
        return y_stride * last as f64;
    }

    let offset = interpolation_offset(x_arr, x);
    let y = |i: usize| y_stride * i as f64;
    cubic_interpolate(
        x_arr[offset],
        y(offset),
        x_arr[offset + 1],
        y(offset + 1),
        x_arr[offset + 2],
        y(offset + 2),
        x_arr[offset + 3],
        y(offset + 3),
        x,
    )
}

/// First of the four points to interpolate through, keeping the window inside the table.
fn interpolation_offset(x_arr: &[f64], x: f64) -> usize {
    let straddle = find_straddle(x_arr, x);
    if straddle == 0 {
        0
    } else if straddle == x_arr.len() - 2 {
        straddle - 2
    } else {
        straddle - 1
    }
}

/// Index `i` such that `x_arr[i] <= x < x_arr[i + 1]`.
fn find_straddle(x_arr: &[f64], x: f64) -> usize {
    debug_assert!(x >= x_arr[0] && x < x_arr[x_arr.len() - 1]);
    // partition_point counts the entries <= x, and x_arr[0] <= x guarantees at least one
    x_arr.partition_point(|&v| v <= x) - 1
}

fn cubic_interpolate(
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    x3: f64,
    y3: f64,
    x: f64,
) -> f64 {
    let l0_numer = (x - x1) * (x - x2) * (x - x3);
    let l1_numer = (x - x0) * (x - x2) * (x - x3);
    let l2_numer = (x - x0) * (x - x1) * (x - x3);
    let l3_numer = (x - x0) * (x - x1) * (x - x2);

    let l0_denom = (x0 - x1) * (x0 - x2) * (x0 - x3);
    let l1_denom = (x1 - x0) * (x1 - x2) * (x1 - x3);
    let l2_denom = (x2 - x0) * (x2 - x1) * (x2 - x3);
    let l3_denom = (x3 - x0) * (x3 - x1) * (x3 - x2);

    let term0 = (y0 * l0_numer) / l0_denom;
    let term1 = (y1 * l1_numer) / l1_denom;
    let term2 = (y2 * l2_numer) / l2_denom;
    let term3 = (y3 * l3_numer) / l3_denom;

    term0 + term1 + term2 + term3
}
