#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use chrono::{Duration, TimeZone, Utc};
    use market_core::Bar;
    use rust_decimal::Decimal;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to create sample bars
    fn sample_bars() -> Vec<Bar> {
        let prices = vec![
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, 106.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
            (111.0, 113.0, 110.0, 112.0),
            (112.0, 114.0, 111.0, 113.0),
            (113.0, 115.0, 112.0, 114.0),
            (114.0, 116.0, 113.0, 115.0),
        ];

        prices
            .into_iter()
            .enumerate()
            .map(|(i, (open, high, low, close))| Bar {
                ts: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap()
                    + Duration::days(i as i64),
                open: Decimal::try_from(open).unwrap(),
                high: Decimal::try_from(high).unwrap(),
                low: Decimal::try_from(low).unwrap(),
                close: Decimal::try_from(close).unwrap(),
                volume: 1_000_000.0,
                amount: None,
            })
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), data.len());
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[3] - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
        assert!((result[4] - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
    }

    #[test]
    fn test_sma_equals_window_mean_everywhere() {
        let prices = sample_prices();
        let w = 5;
        let result = sma(&prices, w);
        for i in w - 1..prices.len() {
            let mean: f64 = prices[i + 1 - w..=i].iter().sum::<f64>() / w as f64;
            assert!((result[i] - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sma_oversized_window_is_all_nan() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_sma_zero_window_is_all_nan() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(sma(&data, 0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        let first_sma = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[2] - first_sma).abs() < 0.01);
    }

    #[test]
    fn test_ema_alpha() {
        let data = vec![10.0, 10.0, 10.0, 16.0];
        let result = ema(&data, 3);
        // alpha = 2/4 = 0.5; seed 10, then (16-10)*0.5 + 10 = 13
        assert!((result[3] - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_empty_data() {
        let data: Vec<f64> = vec![];
        assert_eq!(ema(&data, 5).len(), 0);
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = ema(&data, 3);

        for i in 3..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_rsi_bounds() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        for &value in result.iter().skip(14) {
            assert!((0.0..=100.0).contains(&value));
        }
        assert!(result[..14].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(rsi(&data, 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rsi_overbought_on_pure_uptrend() {
        let mut uptrend = vec![100.0];
        for i in 1..20 {
            uptrend.push(100.0 + i as f64);
        }

        let result = rsi(&uptrend, 14);
        assert!(*result.last().unwrap() > 70.0);
    }

    #[test]
    fn test_macd_histogram_identity() {
        let mut prices = sample_prices();
        // Extend so the slow EMA and signal line both warm up
        for i in 0..40 {
            prices.push(45.0 + (i as f64) * 0.3);
        }
        let result = macd(&prices, 12, 26, 9);

        assert_eq!(result.dif.len(), prices.len());
        assert_eq!(result.dea.len(), prices.len());
        assert_eq!(result.histogram.len(), prices.len());

        let mut checked = 0;
        for i in 0..prices.len() {
            if result.dif[i].is_finite() && result.dea[i].is_finite() {
                let expected = 2.0 * (result.dif[i] - result.dea[i]);
                assert!((result.histogram[i] - expected).abs() < 1e-9);
                checked += 1;
            } else {
                assert!(result.histogram[i].is_nan());
            }
        }
        assert!(checked > 10);
    }

    #[test]
    fn test_macd_warmup_alignment() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = macd(&prices, 12, 26, 9);
        // DIF needs the slow EMA: NaN before index 25
        assert!(result.dif[..25].iter().all(|v| v.is_nan()));
        assert!(result.dif[25].is_finite());
        // DEA needs 9 DIF values: NaN before index 33
        assert!(result.dea[..33].iter().all(|v| v.is_nan()));
        assert!(result.dea[33].is_finite());
    }

    #[test]
    fn test_bollinger_ordering() {
        let prices = sample_prices();
        let result = bollinger(&prices, 10, 2.0);

        for i in 9..prices.len() {
            assert!(result.upper[i] >= result.middle[i]);
            assert!(result.middle[i] >= result.lower[i]);
        }
        assert!(result.upper[..9].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_bollinger_constant_prices_collapse_bands() {
        let prices = vec![100.0; 20];
        let result = bollinger(&prices, 10, 2.0);

        for i in 9..prices.len() {
            assert!((result.upper[i] - result.lower[i]).abs() < 1e-9);
            assert!((result.middle[i] - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_atr_positive_after_warmup() {
        let bars = sample_bars();
        let result = atr(&bars, 5);

        assert_eq!(result.len(), bars.len());
        assert!(result[..5].iter().all(|v| v.is_nan()));
        for &value in result.iter().skip(5) {
            assert!(value > 0.0);
        }
    }

    #[test]
    fn test_atr_insufficient_data() {
        let bars = sample_bars()[..5].to_vec();
        assert!(atr(&bars, 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_atr_increases_with_volatility() {
        let bars = sample_bars();
        let normal_atr = atr(&bars, 5);

        let mut volatile_bars = sample_bars();
        for bar in &mut volatile_bars {
            bar.high += Decimal::from(10);
            bar.low -= Decimal::from(10);
        }
        let volatile_atr = atr(&volatile_bars, 5);

        assert!(volatile_atr[5] > normal_atr[5]);
    }

    #[test]
    fn test_kdj_j_identity_and_bounds() {
        let bars = sample_bars();
        let result = kdj(&bars, 9, 3, 3);

        assert_eq!(result.k.len(), bars.len());
        assert!(result.k[..8].iter().all(|v| v.is_nan()));
        for i in 8..bars.len() {
            assert!((result.j[i] - (3.0 * result.k[i] - 2.0 * result.d[i])).abs() < 1e-9);
            assert!((0.0..=100.0).contains(&result.k[i]));
            assert!((0.0..=100.0).contains(&result.d[i]));
        }
    }

    #[test]
    fn test_kdj_flat_channel_is_neutral() {
        let mut bars = sample_bars();
        for bar in &mut bars {
            bar.open = Decimal::from(100);
            bar.high = Decimal::from(100);
            bar.low = Decimal::from(100);
            bar.close = Decimal::from(100);
        }
        let result = kdj(&bars, 9, 3, 3);
        assert!((result.k[10] - 50.0).abs() < 1e-9);
        assert!((result.d[10] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_helpers() {
        let fast = vec![1.0, 2.0, 4.0, 3.0];
        let slow = vec![3.0, 3.0, 3.0, 3.5];
        assert!(!cross_over(&fast, &slow, 1));
        assert!(cross_over(&fast, &slow, 2));
        assert!(cross_under(&fast, &slow, 3));
        // NaN operands never cross
        let with_nan = vec![f64::NAN, 2.0, 4.0, 3.0];
        assert!(!cross_over(&with_nan, &slow, 1));
        // i = 0 never crosses
        assert!(!cross_over(&fast, &slow, 0));
    }

    #[test]
    fn test_determinism() {
        let prices = sample_prices();
        let a = macd(&prices, 12, 26, 9);
        let b = macd(&prices, 12, 26, 9);
        for i in 0..prices.len() {
            assert!(a.dif[i].is_nan() == b.dif[i].is_nan());
            if a.dif[i].is_finite() {
                assert_eq!(a.dif[i], b.dif[i]);
            }
        }
    }
}
