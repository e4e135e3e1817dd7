//! Cubic bezier easing curves.
//!
//! Every pair of adjacent keyframes defines an eased transition through a
//! cubic bezier from (0, 0) to (1, 1) with two control points. The x axis is
//! the elapsed-time fraction, the y axis the output fraction. Evaluating at a
//! time fraction requires inverting the x polynomial, which is done with
//! Newton's method the same way the host application does, so that results
//! are bit-compatible with motions it produced.

/// Convergence threshold for the Newton solve.
pub const EPS: f64 = 1e-6;

/// Polynomial coefficients `(a, b, c, d)` for a cubic bezier through the four
/// scalar control points, so that `P(t) = a*t^3 + b*t^2 + c*t + d`.
fn coefficients(p: [f64; 4]) -> (f64, f64, f64, f64) {
    let a = -p[0] + 3.0 * p[1] - 3.0 * p[2] + p[3];
    let b = 3.0 * p[0] - 6.0 * p[1] + 3.0 * p[2];
    let c = -3.0 * p[0] + 3.0 * p[1];
    let d = p[0];
    (a, b, c, d)
}

/// Evaluates the cubic bezier defined by four scalar control points at `t`.
pub fn bezier3(points: [f64; 4], t: f64) -> f64 {
    let (a, b, c, d) = coefficients(points);
    ((a * t + b) * t + c) * t + d
}

/// Derivative of [`bezier3`] with respect to `t`.
pub fn bezier3_dt(points: [f64; 4], t: f64) -> f64 {
    let (a, b, c, _) = coefficients(points);
    (3.0 * a * t + 2.0 * b) * t + c
}

/// Solves `bezier3(points, t) = x` for `t` by Newton's method from t = 0.5.
///
/// The control points of a VMD easing curve are monotonic in x, so the
/// iteration converges for every byte-grid curve the format can encode.
pub fn bezier3_x_to_t(points: [f64; 4], x: f64) -> f64 {
    let mut t = 0.5;
    loop {
        let fx = bezier3(points, t) - x;
        if fx.abs() < EPS {
            return t;
        }
        t -= fx / bezier3_dt(points, t);
    }
}

/// Maps a time fraction `x` in [0, 1] through the easing curve given by two
/// control points in curve space (coordinates already scaled to [0, 1]).
pub fn ease(c1: (f64, f64), c2: (f64, f64), x: f64) -> f64 {
    let t = bezier3_x_to_t([0.0, c1.0, c2.0, 1.0], x);
    bezier3([0.0, c1.1, c2.1, 1.0], t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        let points = [0.0, 0.3, 0.7, 1.0];
        assert_eq!(bezier3(points, 0.0), 0.0);
        assert_eq!(bezier3(points, 1.0), 1.0);
        assert!(bezier3_x_to_t(points, 0.0).abs() < 1e-3);
        assert!((bezier3_x_to_t(points, 1.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn linear_curve_is_identity() {
        // The byte-grid linear preset (20, 20)-(107, 107).
        let c = 20.0 / 127.0;
        let d = 107.0 / 127.0;
        for i in 0..=20 {
            let x = f64::from(i) / 20.0;
            let y = ease((c, c), (d, d), x);
            assert!((y - x).abs() < EPS, "x={x} y={y}");
        }
    }

    #[test]
    fn monotonic_in_x() {
        let c1 = (10.0 / 127.0, 100.0 / 127.0);
        let c2 = (30.0 / 127.0, 120.0 / 127.0);
        let mut prev = 0.0;
        for i in 0..=100 {
            let x = f64::from(i) / 100.0;
            let y = ease(c1, c2, x);
            assert!(y >= prev - EPS, "not monotonic at x={x}");
            prev = y;
        }
    }

    #[test]
    fn parabola_presets_match_squares() {
        // y = x^2, elevated to a cubic: control y values 0 and 1/3.
        let y = ease((1.0 / 3.0, 0.0), (2.0 / 3.0, 1.0 / 3.0), 0.5);
        assert!((y - 0.25).abs() < 1e-4);
        // y = x(2 - x): control y values 2/3 and 1.
        let y = ease((1.0 / 3.0, 2.0 / 3.0), (2.0 / 3.0, 1.0), 0.5);
        assert!((y - 0.75).abs() < 1e-4);
    }
}
