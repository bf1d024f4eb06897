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

//! Coupon-count to cardinality mapping used while a sketch is in LIST or SET mode.
//!
//! Distinct items can collide on the same coupon, so the number of stored coupons slightly
//! undercounts the number of distinct items. `X_ARR` holds expected coupon counts and
//! `Y_ARR` the item counts that produce them; the estimator interpolates between them.

pub(super) static X_ARR: [f64; 40] = [
    0.0,
    1.0,
    20.0,
    400.0,
    8000.0,
    160000.0,
    300000.0,
    600000.0,
    900000.0,
    1200000.0,
    1500000.0,
    1800000.0,
    2100000.0,
    2400000.0,
    2700000.0,
    3000000.0,
    3300000.0,
    3600000.0,
    3900000.0,
    4200000.0,
    4500000.0,
    4800000.0,
    5100000.0,
    5400000.0,
    5700000.0,
    6000000.0,
    6300000.0,
    6600000.0,
    6900000.0,
    7200000.0,
    7500000.0,
    7800000.0,
    8100000.0,
    8400000.0,
    8700000.0,
    9000000.0,
    9300000.0,
    9600000.0,
    9900000.0,
    10200000.0,
];

pub(super) static Y_ARR: [f64; 40] = [
    0.0000000000,
    1.0000000000,
    20.0000009437,
    400.0003963713,
    8000.1589294602,
    160063.6067763760,
    300223.7071597662,
    600895.5933856170,
    902016.8065120957,
    1203588.4983199514,
    1505611.8245524736,
    1808087.9449319062,
    2111018.0231759353,
    2414403.2270142501,
    2718244.7282051891,
    3022543.7025524545,
    3327301.3299219087,
    3632518.7942584539,
    3938197.2836029688,
    4244337.9901093561,
    4550942.1100616492,
    4858010.8438911885,
    5165545.3961938974,
    5473546.9757476449,
    5782016.7955296505,
    6090956.0727340132,
    6400366.0287892967,
    6710247.8893761989,
    7020602.8844453152,
    7331432.2482349724,
    7642737.2192891482,
    7954519.0404754765,
    8266778.9590033460,
    8579518.2264420465,
    8892738.0987390466,
    9206439.8362383284,
    9520624.7036988288,
    9835293.9703129195,
    10150448.9097250290,
    10466090.8000503257,
];
