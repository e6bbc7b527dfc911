// Shared numerical helpers for the transport core

use nalgebra::Vector3;
use rand::Rng;

/// Evaluate a polynomial with ascending coefficients `c[0] + c[1]*x + ...`
/// by Horner's rule. An empty coefficient slice evaluates to zero.
pub fn poly_eval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Antiderivative of a polynomial with zero constant term.
///
/// Used to build the material update equation from the heat-capacity
/// polynomial: if `cv(T) = sum c_k T^k` then the returned coefficients
/// evaluate to `integral_0^T cv = sum c_k T^(k+1) / (k+1)`.
pub fn poly_antiderivative(coeffs: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(coeffs.len() + 1);
    out.push(0.0);
    for (k, &c) in coeffs.iter().enumerate() {
        out.push(c / (k as f64 + 1.0));
    }
    out
}

/// Bounded Newton iteration for `f(x) = 0` seeded at `x0`.
///
/// Returns `None` if the iteration cap is reached before `|f(x)|` drops
/// below `tol`, or if the derivative vanishes. The caller owns the error
/// reporting; this stays policy-free.
pub fn newton_solve<F, D>(f: F, df: D, x0: f64, tol: f64, max_iter: usize) -> Option<f64>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let mut x = x0;
    for _ in 0..max_iter {
        let fx = f(x);
        if fx.abs() < tol {
            return Some(x);
        }
        let dfx = df(x);
        if dfx == 0.0 || !dfx.is_finite() {
            return None;
        }
        x -= fx / dfx;
    }
    None
}

/// Bounded-retry combinator: call `f` up to `max_tries` times and return the
/// first `Some`, or `None` once the budget is spent.
///
/// Every iterative search in the core (rejection sampling, merge-candidate
/// selection) goes through this rather than hand-rolled loop counters, so
/// the cap is always explicit at the call site.
pub fn attempt<T, F>(max_tries: usize, mut f: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    for _ in 0..max_tries {
        if let Some(v) = f() {
            return Some(v);
        }
    }
    None
}

/// Sample an isotropic unit direction: mu = 2u - 1, phi = 2*pi*u.
pub fn sample_isotropic<R: Rng + ?Sized>(rng: &mut R) -> [f64; 3] {
    let mu = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
    let s = (1.0 - mu * mu).sqrt();
    [s * phi.cos(), s * phi.sin(), mu]
}

/// Rotate `u_old` to a new unit direction with cosine `mu` relative to the
/// original, azimuth sampled uniformly.
pub fn rotate_direction<R: Rng + ?Sized>(u_old: [f64; 3], mu: f64, rng: &mut R) -> [f64; 3] {
    let u = Vector3::new(u_old[0], u_old[1], u_old[2]);
    let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
    let perp = if u.x.abs() < 0.99 {
        Vector3::new(1.0, 0.0, 0.0).cross(&u).normalize()
    } else {
        Vector3::new(0.0, 1.0, 0.0).cross(&u).normalize()
    };
    let ortho = u.cross(&perp);
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
    let v = mu * u + sin_theta * phi.cos() * perp + sin_theta * phi.sin() * ortho;
    [v.x, v.y, v.z]
}
