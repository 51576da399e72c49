//! Adaptive Gauss-Kronrod quadrature over the positive half line.
//!
//! The half line is mapped onto `[0, 1)` with `x = s * t / (1 - t)`, which
//! puts the scale `s` (typically the forecast mean) in the middle of the unit
//! interval. The interval starts out as equal panels; the panel with the
//! largest error estimate is bisected until the summed estimate meets the
//! tolerance.

use crate::config::EngineConfig;
use crate::utils::error::{Error, Result};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

// 15-point Kronrod abscissae; odd indices are the 7-point Gauss abscissae.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_83,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Panels narrower than this are accepted as they are.
const MIN_PANEL_WIDTH: f64 = 1e-14;

/// Stopping rule for [`integrate_half_line`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub initial_panels: usize,
    pub max_subdivisions: usize,
}

impl From<&EngineConfig> for Tolerance {
    fn from(config: &EngineConfig) -> Self {
        Self {
            abs_tol: config.abs_tol,
            rel_tol: config.rel_tol,
            initial_panels: config.initial_panels.max(1),
            max_subdivisions: config.max_subdivisions,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Result of a converged integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrature {
    pub value: f64,
    pub error: f64,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy)]
struct Panel {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Panel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Panel {}

impl PartialOrd for Panel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Panel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        OrderedFloat(self.error).cmp(&OrderedFloat(other.error))
    }
}

/// One Gauss-Kronrod 7/15 step on `[a, b]`.
fn gauss_kronrod<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Result<Panel> {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let checked = |x: f64| {
        let y = f(x);
        if y.is_finite() {
            Ok(y)
        } else {
            Err(Error::Computation(format!("integrand is {} at t = {}", y, x)))
        }
    };

    let fc = checked(center)?;
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;
    for (i, (&x, &wk)) in XGK.iter().zip(WGK.iter()).take(7).enumerate() {
        let dx = half * x;
        let pair = checked(center - dx)? + checked(center + dx)?;
        kronrod += wk * pair;
        if i % 2 == 1 {
            gauss += WG[i / 2] * pair;
        }
    }
    Ok(Panel { a, b, value: kronrod * half, error: ((kronrod - gauss) * half).abs() })
}

/// Integrate `f` over `[0, inf)` using `scale` to place the bulk of the mass.
pub fn integrate_half_line<F>(f: F, scale: f64, tol: &Tolerance) -> Result<Quadrature>
where
    F: Fn(f64) -> f64,
{
    let s = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let mapped = |t: f64| {
        let u = 1.0 - t;
        f(s * t / u) * s / (u * u)
    };

    let n = tol.initial_panels.max(1);
    let width = 1.0 / n as f64;
    let mut heap = BinaryHeap::with_capacity(n + tol.max_subdivisions + 1);
    let mut settled = Vec::new();
    for i in 0..n {
        let a = i as f64 * width;
        let b = if i + 1 == n { 1.0 } else { (i + 1) as f64 * width };
        heap.push(gauss_kronrod(&mapped, a, b)?);
    }
    let mut evaluations = 15 * n;

    let mut splits = 0;
    loop {
        let value: f64 = heap.iter().chain(settled.iter()).map(|p: &Panel| p.value).sum();
        let error: f64 = heap.iter().chain(settled.iter()).map(|p: &Panel| p.error).sum();
        let target = tol.abs_tol.max(tol.rel_tol * value.abs());
        if error <= target {
            return Ok(Quadrature { value, error, evaluations });
        }

        let Some(worst) = heap.pop() else {
            return Err(Error::Computation(format!(
                "quadrature stalled with error {:e} above {:e}",
                error, target
            )));
        };
        if splits >= tol.max_subdivisions {
            return Err(Error::Computation(format!(
                "quadrature did not converge after {} subdivisions (error {:e}, target {:e})",
                splits, error, target
            )));
        }
        if worst.b - worst.a < MIN_PANEL_WIDTH {
            settled.push(worst);
            continue;
        }

        let mid = 0.5 * (worst.a + worst.b);
        heap.push(gauss_kronrod(&mapped, worst.a, mid)?);
        heap.push(gauss_kronrod(&mapped, mid, worst.b)?);
        evaluations += 30;
        splits += 1;
    }
}
