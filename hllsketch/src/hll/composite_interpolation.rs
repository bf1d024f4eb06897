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

//! Bias-correction tables for the composite (out-of-order) estimator.
//!
//! For each `lg_config_k` the table holds the mean raw HLL estimate after `i * y_stride`
//! distinct items, for `i` in `0..33`, with `y_stride = k / 4`. The last entry sits at
//! `8k` items, where the raw estimate has no measurable bias left, so estimates beyond the
//! table extrapolate linearly.

use crate::hll::MIN_LG_K;

const X_ARR_LENGTH: usize = 33;

static X_ARRS: [[f64; X_ARR_LENGTH]; 18] = [
    // lg_k = 4
    [
        10.7680000, 12.7682166, 15.0130384, 17.4992966,
        20.2169743, 23.1499033, 26.2770754, 29.5743500,
        33.0162844, 36.5778182, 40.2356159, 43.9689707,
        47.7602656, 51.5950597, 55.4619012, 59.3519731,
        63.2586639, 67.1771310, 71.1038993, 75.0365173,
        78.9732783, 82.9130029, 86.8548769, 90.7983335,
        94.7429708, 98.6884962, 102.6346891, 106.5813777,
        110.5284247, 114.4757188, 118.4231691, 122.3707028,
        126.3182627,
    ],
    // lg_k = 5
    [
        22.3040000, 26.3436315, 30.8601793, 35.8477224,
        41.2881874, 47.1524989, 53.4027121, 59.9948123,
        66.8817723, 74.0164587, 81.3540657, 88.8538900,
        96.4803983, 104.2036531, 111.9992276, 119.8477687,
        127.7343555, 135.6477754, 143.5798063, 151.5245603,
        159.4779173, 167.4370577, 175.4000932, 183.3657827,
        191.3333217, 199.3021910, 207.2720513, 215.2426725,
        223.2138878, 231.1855665, 239.1575985, 247.1298859,
        255.1023406,
    ],
    // lg_k = 6
    [
        45.3760000, 53.4917765, 62.5461851, 72.5266837,
        83.3980088, 95.1043901, 107.5734735, 120.7214016,
        134.4583512, 148.6938335, 163.3411986, 178.3210082,
        193.5631699, 209.0079178, 224.6058477, 240.3172689,
        256.1111311, 271.9637476, 287.8574817, 303.7795093,
        319.7207226, 335.6748046, 351.6374761, 367.6059052,
        383.5782576, 399.5533644, 415.5304850, 431.5091421,
        447.4890126, 463.4698586, 479.4514859, 495.4337220,
        511.4164064,
    ],
    // lg_k = 7
    [
        91.5546231, 107.8275799, 125.9618104, 145.9309284,
        167.6646883, 191.0534159, 215.9555925, 242.2075537,
        269.6340078, 298.0580993, 327.3100011, 357.2334090,
        387.6897326, 418.5601216, 449.7456953, 481.1664482,
        512.7593092, 544.4757674, 576.2793863, 608.1434270,
        640.0487157, 671.9818198, 703.9335472, 735.8977542,
        767.8704261, 799.8489896, 831.8318132, 863.8178564,
        895.8064313, 927.7970483, 959.7893216, 991.7829156,
        1023.7775193,
    ],
    // lg_k = 8
    [
        183.8777839, 216.4583922, 252.7440946, 292.6805216,
        336.1271936, 382.8664255, 432.6182714, 485.0594834,
        539.8439949, 596.6224956, 655.0591632, 714.8443612,
        775.7029018, 837.3981283, 899.7325095, 962.5456415,
        1025.7105696, 1089.1292261, 1152.7276107, 1216.4511483,
        1280.2604971, 1344.1279389, 1408.0343935, 1471.9670298,
        1535.9174125, 1599.8801063, 1663.8516543, 1727.8298542,
        1791.8132617, 1855.8008655, 1919.7918842, 1983.7856494,
        2047.7815465,
    ],
    // lg_k = 9
    [
        368.5289540, 433.7254217, 506.3143403, 586.1852176,
        673.0569520, 766.4957063, 865.9445951, 970.7611784,
        1080.2578783, 1193.7405713, 1310.5415851, 1430.0447829,
        1551.7019498, 1675.0409711, 1799.6671437, 1925.2593651,
        2051.5629781, 2178.3808367, 2305.5638224, 2433.0016785,
        2560.6147035, 2688.3465782, 2816.1584122, 2944.0239657,
        3071.9259312, 3199.8531219, 3327.7984074, 3455.7572435,
        3583.7266599, 3711.7045919, 3839.6894608, 3967.6799290,
        4095.6747735,
    ],
    // lg_k = 10
    [
        737.8337365, 868.2622031, 1013.4576912, 1173.1973848,
        1346.9188603, 1533.7559107, 1732.5977292, 1942.1634783,
        2161.0825770, 2387.9713246, 2621.4984192, 2860.4348059,
        3103.6863001, 3350.3099492, 3599.5167715, 3850.6643162,
        4103.2425544, 4356.8562009, 4611.2059054, 4866.0700433,
        5121.2881825, 5376.7467863, 5632.3673265, 5888.0967293,
        6143.8999267, 6399.7542155, 6655.6451068, 6911.5633632,
        7167.5029557, 7423.4597079, 7679.4304434, 7935.4124847,
        8191.4033908,
    ],
    // lg_k = 11
    [
        1476.4445271, 1737.3371322, 2027.7458281, 2347.2231118,
        2694.6438769, 3068.2771441, 3465.9042417, 3884.9675310,
        4322.7304349, 4776.4301223, 5243.4080679, 5721.2094217,
        6207.6481026, 6700.8395207, 7199.2061703, 7701.4629288,
        8206.5890402, 8713.7929492, 9222.4748453, 9732.1903650,
        10242.6176093, 10753.5285988, 11264.7655213, 11776.2216264,
        12287.8263174, 12799.5338512, 13311.3150157, 13823.1511835,
        14335.0302037, 14846.9436749, 15358.8852236, 15870.8494912,
        16382.8316005,
    ],
    // lg_k = 12
    [
        2953.6667223, 3475.4876746, 4056.3228207, 4695.2752634,
        5390.0945112, 6137.3200237, 6932.5173888, 7770.5753622,
        8646.0253795, 9553.3463608, 10487.2253516, 11442.7559331,
        12415.5682522, 13401.8944637, 14398.5800306, 15403.0544989,
        16413.2756667, 17427.6594431, 18445.0050981, 19464.4227892,
        20485.2676812, 21507.0829049, 22529.5520761, 23552.4610868,
        24575.6682789, 25599.0818261, 26622.6430671, 27646.3145919,
        28670.0720048, 29693.8984524, 30717.7811664, 31741.7094256,
        32765.6734805,
    ],
    // lg_k = 13
    [
        5908.1114198, 6951.7891021, 8113.4771657, 9391.3799159,
        10780.9960807, 12275.4059897, 13865.7437444, 15541.7908876,
        17292.6148826, 19107.1781587, 20974.8589115, 22885.8475948,
        24831.4068219, 26804.0022479, 28797.3252804, 30806.2348089,
        32826.6457442, 34855.3889262, 36890.0617866, 38928.8835243,
        40970.5634301, 43014.1868532, 45059.1202637, 47104.9348358,
        49151.3467869, 51198.1721222, 53245.2932812, 55292.6352870,
        57340.1492534, 59387.8014230, 61435.5662369, 63483.4222488,
        65531.3499644,
    ],
    // lg_k = 14
    [
        11817.0009686, 13904.3921284, 16227.7860357, 18783.5893954,
        21562.7993702, 24551.5780251, 27732.1964860, 31084.2218698,
        34585.7936959, 38214.8414147, 41950.1255271, 45772.0302371,
        49663.0830964, 53608.2167648, 57594.8145437, 61612.5940132,
        65653.3843106, 69710.8461392, 73780.1732542, 77857.8029370,
        81941.1527293, 86028.3924170, 90118.2541767, 94209.8797468,
        98302.7010941, 102396.3498865, 106490.5907638, 110585.2736151,
        114680.3005727, 118775.6040703, 122871.1329689, 126966.8443708,
        131062.6992921,
    ],
    // lg_k = 15
    [
        23634.7801429, 27809.5982667, 32456.4038657, 37568.0084417,
        43126.4060244, 49103.9221476, 55465.1019847, 62169.0837998,
        69172.1512259, 76430.1677567, 83900.6585062, 91544.3951812,
        99326.4352127, 107216.6452726, 115189.7924523, 123225.3117137,
        131306.8606490, 139421.7596885, 147560.3952344, 155715.6407333,
        163882.3302282, 172056.8023778, 180236.5207714, 188419.7682748,
        196605.4083538, 204792.7040006, 212981.1842557, 221170.5487396,
        229360.6016216, 237551.2077179, 245742.2647278, 253933.6868520,
        262125.3961274,
    ],
    // lg_k = 16
    [
        47270.3385301, 55620.0105861, 64913.6395707, 75136.8465781,
        86253.6193706, 98208.6104185, 110930.9129898, 124338.8076428,
        138344.8662375, 152860.8203560, 167801.7243383, 183089.1248991,
        198653.1392290, 214433.5020254, 230379.7479604, 246450.7467606,
        262613.8129287, 278843.5863487, 295120.8387174, 311431.3158112,
        327764.6846762, 344113.6217159, 360473.0533451, 376839.5446840,
        393210.8221957, 409585.4115216, 425962.3705027, 442341.0982229,
        458721.2029248, 475102.4141892, 491484.5273930, 507867.3709331,
        524250.7888875,
    ],
    // lg_k = 17
    [
        94541.4553237, 111240.8352463, 129828.1110032, 150274.5228726,
        172508.0460818, 196417.9869732, 221862.5350037, 248678.2553200,
        276690.2962366, 305722.1255119, 335603.8559395, 366178.5842496,
        397306.5471533, 428867.2153994, 460759.6588219, 492901.6166775,
        525227.7172893, 557687.2394498, 590241.7254445, 622862.6657098,
        655529.3932974, 688227.2601005, 720946.1181844, 753679.0971787,
        786421.6495409, 819170.8262100, 851924.7426286, 884682.1968065,
        917442.4051337, 950204.8267201, 982969.0522971, 1015734.7386544,
        1048501.5739527,
    ],
    // lg_k = 18
    [
        189083.6889205, 222482.4845774, 259657.0538795, 300549.8754726,
        345016.8995135, 392836.7400889, 443725.7790334, 497357.1506702,
        553381.1562228, 611444.7358025, 671208.1191105, 732357.5029082,
        794613.3629480, 857734.6420818, 921519.4804677, 985803.3564227,
        1050455.5259113, 1115374.5455423, 1180483.4987794, 1245725.3653784,
        1311058.8104023, 1376454.5367238, 1441892.2477093, 1507358.2020065,
        1572843.3040620, 1638341.6554100, 1703849.4866960, 1769364.3937822,
        1834884.8093527, 1900409.6515758, 1965938.1018921, 2031469.4738768,
        2097003.1438556,
    ],
    // lg_k = 19
    [
        378168.1561189, 444965.7832451, 519314.9396376, 601100.5806781,
        690034.6063816, 785674.2463237, 887452.2670938, 994714.9413685,
        1106762.8761891, 1222889.9563732, 1342416.6454366, 1464715.3402041,
        1589226.9945102, 1715469.4954137, 1843039.1237206, 1971606.8358689,
        2100911.1431057, 2230749.1576727, 2360967.0453894, 2491450.7646511,
        2622117.6445432, 2752909.0898973, 2883784.5066819, 3014716.4115811,
        3145686.6130193, 3276683.3137215, 3407698.9747388, 3538728.7876379,
        3669769.6176915, 3800819.3011844, 3931876.2009756, 4062938.9442113,
        4194006.2835474,
    ],
    // lg_k = 20
    [
        756337.0905181, 889932.3805830, 1038630.7111566, 1202201.9910918,
        1380070.0201202, 1571349.2587949, 1774905.2432152, 1989430.5227639,
        2213526.3161187, 2445780.3975092, 2684833.6980810, 2929431.0147852,
        3178454.2576212, 3430939.2020609, 3686078.4102070, 3943213.7947391,
        4201822.3774694, 4461498.3819060, 4721934.1385796, 4982901.5631644,
        5244235.3127908, 5505818.1962080, 5767569.0245888, 6029432.8306899,
        6291373.2308917, 6553366.6303002, 6815397.9507782, 7077457.5753015,
        7339539.2343192, 7601638.6003499, 7863752.3990893, 8125877.8848252,
        8388012.5628742,
    ],
    // lg_k = 21
    [
        1512674.9593177, 1779865.5752602, 2077262.2541961, 2404404.8119205,
        2760140.8475986, 3142699.2837380, 3549811.1954581, 3978861.6855543,
        4427053.1959764, 4891561.2797786, 5369667.8033658, 5858862.3639421,
        6356908.7838363, 6861878.6153473, 7372156.9831703, 7886427.7124685,
        8403644.8461846, 8922996.8303589, 9443868.3249451, 9965803.1601750,
        10488470.6492689, 11011636.4088110, 11535138.0603832, 12058865.6688873,
        12582746.4666153, 13106733.2634357, 13630795.9028342, 14154915.1506048,
        14679078.4675499, 15203277.1986553, 15727504.7952900, 16251755.7660256,
        16776025.1214992,
    ],
];

pub(super) fn get_x_arr(lg_config_k: u8) -> &'static [f64; X_ARR_LENGTH] {
    &X_ARRS[(lg_config_k - MIN_LG_K) as usize]
}

pub(super) fn get_x_arr_length() -> usize {
    X_ARR_LENGTH
}

pub(super) fn get_y_stride(lg_config_k: u8) -> u32 {
    1 << (lg_config_k - 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::MAX_LG_K;

    #[test]
    fn test_tables_are_strictly_increasing() {
        for lg_k in MIN_LG_K..=MAX_LG_K {
            let x_arr = get_x_arr(lg_k);
            assert!(
                x_arr.windows(2).all(|w| w[0] < w[1]),
                "x table for lg_k={lg_k} must be strictly increasing"
            );
        }
    }

    #[test]
    fn test_first_entry_is_empty_sketch_raw_estimate() {
        // with no items every bucket is zero, so the raw estimate is alpha * k
        let k = 1024.0;
        let alpha = 0.7213 / (1.0 + 1.079 / k);
        assert!((get_x_arr(10)[0] - alpha * k).abs() < 1e-6);
        assert_eq!(get_y_stride(4), 4);
        assert_eq!(get_y_stride(21), 1 << 19);
    }

    #[test]
    fn test_last_entry_is_unbiased() {
        for lg_k in MIN_LG_K..=MAX_LG_K {
            let last = get_x_arr_length() - 1;
            let x = get_x_arr(lg_k)[last];
            let y = (get_y_stride(lg_k) as usize * last) as f64;
            assert!(
                (x / y - 1.0).abs() < 0.02,
                "lg_k={lg_k}: raw {x} at {y} items"
            );
        }
    }
}
