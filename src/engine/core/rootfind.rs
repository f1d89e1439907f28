// ABOUTME: Bracketed Brent root finder used for surface-temperature energy-balance closure
// ABOUTME: Direct port of RootBrent.c's bisection + inverse-quadratic-interpolation algorithm

use crate::engine::error::{CoreError, CoreResult};

/// Bracket-expansion and iteration tuning (RootBrent.c's `brent.h` constants).
#[derive(Clone, Copy, Debug)]
pub struct RootFinderTolerances {
    /// Absolute tolerance term `T` added to the machine-epsilon scaled term.
    pub tolerance: f32,
    /// Step used to expand a non-bracketing interval, `TSTEP`.
    pub bracket_step: f32,
    /// Maximum bracket-expansion attempts, `MAXTRIES`.
    pub max_bracket_tries: u32,
    /// Maximum Brent iterations, `MAXITER`.
    pub max_iterations: u32,
}

impl Default for RootFinderTolerances {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            bracket_step: 5.0,
            max_bracket_tries: 10,
            max_iterations: 50,
        }
    }
}

/// Finds a root of `f` in `[lower, upper]` (expanding the bracket by
/// `tol.bracket_step` up to `tol.max_bracket_tries` times if `f(lower)` and
/// `f(upper)` share a sign) using Brent's method.
///
/// `params` is the captured-parameter struct the original C implementation
/// threaded through via a `va_list`; here it is passed explicitly to `f`
/// instead.
pub fn brent<P>(
    params: &P,
    f: impl Fn(f32, &P) -> f32,
    lower: f32,
    upper: f32,
    tol: &RootFinderTolerances,
) -> CoreResult<f32> {
    let mut a = lower;
    let mut b = upper;
    let mut fa = f(a, params);
    let mut fb = f(b, params);

    let mut tries = 0;
    while fa * fb >= 0.0 && tries < tol.max_bracket_tries {
        a -= tol.bracket_step;
        b += tol.bracket_step;
        fa = f(a, params);
        fb = f(b, params);
        tries += 1;
    }
    if fa * fb >= 0.0 {
        return Err(CoreError::RootBracketing);
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..tol.max_iterations {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tolerance = 2.0 * f32::EPSILON * b.abs() + tol.tolerance;
        let m = 0.5 * (c - b);

        if m.abs() <= tolerance || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() < tolerance || fa.abs() <= fb.abs() {
            d = m;
            e = d;
        } else {
            let s = fb / fa;
            let (mut p, mut q);
            if a == c {
                // linear interpolation
                p = 2.0 * m * s;
                q = 1.0 - s;
            } else {
                // inverse quadratic interpolation
                let qq = fa / fc;
                let r = fb / fc;
                p = s * (2.0 * m * qq * (qq - r) - (b - a) * (r - 1.0));
                q = (qq - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            let s_prev = e;
            e = d;
            if 2.0 * p < 3.0 * m * q - (tolerance * q).abs() && p < (0.5 * s_prev * q).abs() {
                d = p / q;
            } else {
                d = m;
                e = d;
            }
        }
        a = b;
        fa = fb;
        b += if d.abs() > tolerance {
            d
        } else if m > 0.0 {
            tolerance
        } else {
            -tolerance
        };
        fb = f(b, params);
    }

    Err(CoreError::RootMaxIter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_of_linear_function() {
        let tol = RootFinderTolerances::default();
        // f(x) = x - 3
        let root = brent(&(), |x, _| x - 3.0, -10.0, 10.0, &tol).unwrap();
        assert!((root - 3.0).abs() < 0.1);
    }

    #[test]
    fn finds_root_requiring_bracket_expansion() {
        let tol = RootFinderTolerances::default();
        // root at x=20, well outside the initial [-1, 1] bracket.
        let root = brent(&(), |x, _| x - 20.0, -1.0, 1.0, &tol).unwrap();
        assert!((root - 20.0).abs() < 0.1);
    }

    #[test]
    fn fails_to_bracket_when_function_never_changes_sign() {
        let tol = RootFinderTolerances {
            max_bracket_tries: 2,
            ..RootFinderTolerances::default()
        };
        let result = brent(&(), |x, _| x * x + 1.0, -1.0, 1.0, &tol);
        assert_eq!(result, Err(CoreError::RootBracketing));
    }

    #[test]
    fn uses_captured_parameter_struct() {
        struct Params {
            target: f32,
        }
        let p = Params { target: 42.0 };
        let tol = RootFinderTolerances::default();
        let root = brent(&p, |x, params| x - params.target, 0.0, 100.0, &tol).unwrap();
        assert!((root - 42.0).abs() < 0.1);
    }
}
