//! Stateless indicator functions over `f64` arrays.
//!
//! Every function returns arrays of the SAME length as its input, with
//! `f64::NAN` in warmup positions, so callers can index indicator values by
//! bar position. Oversized or zero windows yield an all-NaN output of the
//! input length; nothing here panics on shape.

use market_core::Bar;
use rust_decimal::prelude::ToPrimitive;

fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// True when both operands at `i-1` and `i` are finite and `a` moved from
/// at-or-below `b` to above it.
pub fn cross_over(a: &[f64], b: &[f64], i: usize) -> bool {
    if i == 0 || i >= a.len() || i >= b.len() {
        return false;
    }
    let (pa, pb, ca, cb) = (a[i - 1], b[i - 1], a[i], b[i]);
    pa.is_finite() && pb.is_finite() && ca.is_finite() && cb.is_finite() && pa <= pb && ca > cb
}

/// Mirror of [`cross_over`] for downward crossings.
pub fn cross_under(a: &[f64], b: &[f64], i: usize) -> bool {
    if i == 0 || i >= a.len() || i >= b.len() {
        return false;
    }
    let (pa, pb, ca, cb) = (a[i - 1], b[i - 1], a[i], b[i]);
    pa.is_finite() && pb.is_finite() && ca.is_finite() && cb.is_finite() && pa >= pb && ca < cb
}

/// Simple Moving Average. Positions before `window - 1` are NaN.
pub fn sma(data: &[f64], window: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    if window == 0 || data.len() < window {
        return out;
    }
    let mut sum: f64 = data[..window].iter().sum();
    out[window - 1] = sum / window as f64;
    for i in window..data.len() {
        sum += data[i] - data[i - window];
        out[i] = sum / window as f64;
    }
    out
}

/// Exponential Moving Average, seeded with the SMA of the first full window;
/// `alpha = 2 / (window + 1)`. Leading NaNs in the input are skipped, which
/// lets MACD feed the NaN-prefixed DIF line straight back in.
pub fn ema(data: &[f64], window: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    if window == 0 {
        return out;
    }
    let start = match data.iter().position(|v| v.is_finite()) {
        Some(s) => s,
        None => return out,
    };
    if data.len() - start < window {
        return out;
    }
    let alpha = 2.0 / (window as f64 + 1.0);
    let seed_at = start + window - 1;
    let seed: f64 = data[start..=seed_at].iter().sum::<f64>() / window as f64;
    out[seed_at] = seed;
    for i in seed_at + 1..data.len() {
        out[i] = (data[i] - out[i - 1]) * alpha + out[i - 1];
    }
    out
}

/// Relative Strength Index with Wilder's smoothing. Values are in [0, 100]
/// after warmup; positions before `window` are NaN.
pub fn rsi(data: &[f64], window: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    if window == 0 || data.len() < window + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=window {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= window as f64;
    avg_loss /= window as f64;

    let rsi_at = |gain: f64, loss: f64| {
        if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };

    out[window] = rsi_at(avg_gain, avg_loss);
    for i in window + 1..data.len() {
        let change = data[i] - data[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (window as f64 - 1.0) + gain) / window as f64;
        avg_loss = (avg_loss * (window as f64 - 1.0) + loss) / window as f64;
        out[i] = rsi_at(avg_gain, avg_loss);
    }
    out
}

/// MACD lines. `dif = EMA(fast) − EMA(slow)`, `dea = EMA(dif, signal)`,
/// `histogram = 2 × (dif − dea)` (the A-share charting convention).
pub struct Macd {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let len = data.len();
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return Macd {
            dif: nan_vec(len),
            dea: nan_vec(len),
            histogram: nan_vec(len),
        };
    }
    let ema_fast = ema(data, fast);
    let ema_slow = ema(data, slow);
    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let dea = ema(&dif, signal);
    let histogram: Vec<f64> = dif.iter().zip(&dea).map(|(d, e)| 2.0 * (d - e)).collect();
    Macd {
        dif,
        dea,
        histogram,
    }
}

/// Bollinger Bands with population standard deviation over the trailing
/// window.
pub struct Bollinger {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(data: &[f64], window: usize, multiplier: f64) -> Bollinger {
    let len = data.len();
    let middle = sma(data, window);
    let mut upper = nan_vec(len);
    let mut lower = nan_vec(len);
    if window > 0 && len >= window {
        for i in window - 1..len {
            let slice = &data[i + 1 - window..=i];
            let mean = middle[i];
            let variance =
                slice.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / window as f64;
            let band = multiplier * variance.sqrt();
            upper[i] = mean + band;
            lower[i] = mean - band;
        }
    }
    Bollinger {
        upper,
        middle,
        lower,
    }
}

fn bar_f64(v: rust_decimal::Decimal) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Average True Range with Wilder's smoothing. Positions before `window`
/// are NaN (the first bar has no previous close).
pub fn atr(bars: &[Bar], window: usize) -> Vec<f64> {
    let mut out = nan_vec(bars.len());
    if window == 0 || bars.len() < window + 1 {
        return out;
    }
    let tr = |i: usize| {
        let high = bar_f64(bars[i].high);
        let low = bar_f64(bars[i].low);
        let prev_close = bar_f64(bars[i - 1].close);
        (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs())
    };
    let mut value: f64 = (1..=window).map(tr).sum::<f64>() / window as f64;
    out[window] = value;
    for i in window + 1..bars.len() {
        value = (value * (window as f64 - 1.0) + tr(i)) / window as f64;
        out[i] = value;
    }
    out
}

/// KDJ stochastic. RSV over an `n`-bar channel, then 1/3-2/3 smoothing for
/// K and D (both seeded at 50), `J = 3K − 2D`.
pub struct Kdj {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

pub fn kdj(bars: &[Bar], n: usize, k_smooth: usize, d_smooth: usize) -> Kdj {
    let len = bars.len();
    let mut k = nan_vec(len);
    let mut d = nan_vec(len);
    let mut j = nan_vec(len);
    if n == 0 || k_smooth == 0 || d_smooth == 0 || len < n {
        return Kdj { k, d, j };
    }

    let mut prev_k = 50.0;
    let mut prev_d = 50.0;
    for i in n - 1..len {
        let slice = &bars[i + 1 - n..=i];
        let highest = slice
            .iter()
            .map(|b| bar_f64(b.high))
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = slice
            .iter()
            .map(|b| bar_f64(b.low))
            .fold(f64::INFINITY, f64::min);
        let rsv = if highest == lowest {
            50.0
        } else {
            100.0 * (bar_f64(bars[i].close) - lowest) / (highest - lowest)
        };
        let k_val = ((k_smooth as f64 - 1.0) * prev_k + rsv) / k_smooth as f64;
        let d_val = ((d_smooth as f64 - 1.0) * prev_d + k_val) / d_smooth as f64;
        k[i] = k_val;
        d[i] = d_val;
        j[i] = 3.0 * k_val - 2.0 * d_val;
        prev_k = k_val;
        prev_d = d_val;
    }
    Kdj { k, d, j }
}
