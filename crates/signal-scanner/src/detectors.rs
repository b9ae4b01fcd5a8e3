use std::sync::OnceLock;

use market_core::KLineSeries;
use technical_indicators::{
    bollinger, cross_over, cross_under, macd, rsi, sma, Bollinger, Macd,
};

use crate::models::{ProtoSignal, SignalKind};

/// Indicator arrays computed once per scan and shared by every detector.
/// All arrays are bar-aligned (NaN in warmup positions).
pub struct IndicatorSet {
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
    pub ma5: Vec<f64>,
    pub ma10: Vec<f64>,
    pub ma20: Vec<f64>,
    pub ma60: Vec<f64>,
    pub macd: Macd,
    pub rsi14: Vec<f64>,
    pub boll20: Bollinger,
    pub volume_ma20: Vec<f64>,
}

impl IndicatorSet {
    pub fn compute(series: &KLineSeries) -> Self {
        let closes = series.closes_f64();
        let volumes: Vec<f64> = series.volumes().collect();
        Self {
            ma5: sma(&closes, 5),
            ma10: sma(&closes, 10),
            ma20: sma(&closes, 20),
            ma60: sma(&closes, 60),
            macd: macd(&closes, 12, 26, 9),
            rsi14: rsi(&closes, 14),
            boll20: bollinger(&closes, 20, 2.0),
            volume_ma20: sma(&volumes, 20),
            closes,
            volumes,
        }
    }
}

/// A strategy detector evaluated at one bar. Implementations must return
/// `None` while any required indicator is NaN and must never read beyond
/// bar `i`.
pub trait SignalDetector: Send + Sync {
    fn id(&self) -> &'static str;

    /// Smallest bar index at which `detect` can fire.
    fn warmup(&self) -> usize;

    fn detect(&self, series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal>;
}

fn spread_pct(fast: f64, slow: f64) -> f64 {
    if slow != 0.0 {
        ((fast - slow) / slow * 100.0).abs()
    } else {
        0.0
    }
}

/// MA5 crossing above MA10.
struct MaGoldenCross;

impl SignalDetector for MaGoldenCross {
    fn id(&self) -> &'static str {
        "ma_golden_cross"
    }

    fn warmup(&self) -> usize {
        10
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_over(&ind.ma5, &ind.ma10, i).then(|| ProtoSignal {
            kind: SignalKind::Buy,
            strength: spread_pct(ind.ma5[i], ind.ma10[i]),
        })
    }
}

/// MA5 crossing below MA10.
struct MaDeathCross;

impl SignalDetector for MaDeathCross {
    fn id(&self) -> &'static str {
        "ma_death_cross"
    }

    fn warmup(&self) -> usize {
        10
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_under(&ind.ma5, &ind.ma10, i).then(|| ProtoSignal {
            kind: SignalKind::Sell,
            strength: spread_pct(ind.ma5[i], ind.ma10[i]),
        })
    }
}

/// DIF crossing above DEA.
struct MacdGoldenCross;

impl SignalDetector for MacdGoldenCross {
    fn id(&self) -> &'static str {
        "macd_golden_cross"
    }

    fn warmup(&self) -> usize {
        34
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_over(&ind.macd.dif, &ind.macd.dea, i).then(|| ProtoSignal {
            kind: SignalKind::Buy,
            strength: ind.macd.histogram[i].abs(),
        })
    }
}

/// DIF crossing below DEA.
struct MacdDeathCross;

impl SignalDetector for MacdDeathCross {
    fn id(&self) -> &'static str {
        "macd_death_cross"
    }

    fn warmup(&self) -> usize {
        34
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_under(&ind.macd.dif, &ind.macd.dea, i).then(|| ProtoSignal {
            kind: SignalKind::Sell,
            strength: ind.macd.histogram[i].abs(),
        })
    }
}

/// RSI entering the oversold zone (mean-reversion buy).
struct RsiOversold;

impl SignalDetector for RsiOversold {
    fn id(&self) -> &'static str {
        "rsi_oversold"
    }

    fn warmup(&self) -> usize {
        15
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        if i == 0 {
            return None;
        }
        let (prev, curr) = (*ind.rsi14.get(i - 1)?, *ind.rsi14.get(i)?);
        if prev.is_finite() && curr.is_finite() && prev >= 30.0 && curr < 30.0 {
            Some(ProtoSignal {
                kind: SignalKind::Buy,
                strength: 30.0 - curr,
            })
        } else {
            None
        }
    }
}

/// RSI entering the overbought zone (mean-reversion sell).
struct RsiOverbought;

impl SignalDetector for RsiOverbought {
    fn id(&self) -> &'static str {
        "rsi_overbought"
    }

    fn warmup(&self) -> usize {
        15
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        if i == 0 {
            return None;
        }
        let (prev, curr) = (*ind.rsi14.get(i - 1)?, *ind.rsi14.get(i)?);
        if prev.is_finite() && curr.is_finite() && prev <= 70.0 && curr > 70.0 {
            Some(ProtoSignal {
                kind: SignalKind::Sell,
                strength: curr - 70.0,
            })
        } else {
            None
        }
    }
}

/// Close breaking below the lower Bollinger band.
struct BollLowerBreak;

impl SignalDetector for BollLowerBreak {
    fn id(&self) -> &'static str {
        "boll_lower_break"
    }

    fn warmup(&self) -> usize {
        20
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_under(&ind.closes, &ind.boll20.lower, i).then(|| ProtoSignal {
            kind: SignalKind::Buy,
            strength: spread_pct(ind.boll20.lower[i], ind.closes[i]),
        })
    }
}

/// Close breaking above the upper Bollinger band.
struct BollUpperBreak;

impl SignalDetector for BollUpperBreak {
    fn id(&self) -> &'static str {
        "boll_upper_break"
    }

    fn warmup(&self) -> usize {
        20
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        cross_over(&ind.closes, &ind.boll20.upper, i).then(|| ProtoSignal {
            kind: SignalKind::Sell,
            strength: spread_pct(ind.closes[i], ind.boll20.upper[i]),
        })
    }
}

/// Volume above twice its 20-bar average on an up close.
struct VolumeBreakout;

impl SignalDetector for VolumeBreakout {
    fn id(&self) -> &'static str {
        "volume_breakout"
    }

    fn warmup(&self) -> usize {
        20
    }

    fn detect(&self, _series: &KLineSeries, i: usize, ind: &IndicatorSet) -> Option<ProtoSignal> {
        if i == 0 {
            return None;
        }
        let avg = *ind.volume_ma20.get(i)?;
        if !avg.is_finite() || avg <= 0.0 {
            return None;
        }
        let ratio = ind.volumes[i] / avg;
        if ratio > 2.0 && ind.closes[i] > ind.closes[i - 1] {
            Some(ProtoSignal {
                kind: SignalKind::Buy,
                strength: ratio,
            })
        } else {
            None
        }
    }
}

/// Immutable, process-wide detector registry.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn SignalDetector>>,
}

impl DetectorRegistry {
    fn builtin() -> Self {
        Self {
            detectors: vec![
                Box::new(MaGoldenCross),
                Box::new(MaDeathCross),
                Box::new(MacdGoldenCross),
                Box::new(MacdDeathCross),
                Box::new(RsiOversold),
                Box::new(RsiOverbought),
                Box::new(BollLowerBreak),
                Box::new(BollUpperBreak),
                Box::new(VolumeBreakout),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn SignalDetector> {
        self.detectors
            .iter()
            .find(|d| d.id() == id)
            .map(|d| d.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }
}

/// The shared registry, initialized on first use and immutable thereafter.
pub fn registry() -> &'static DetectorRegistry {
    static REGISTRY: OnceLock<DetectorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DetectorRegistry::builtin)
}
