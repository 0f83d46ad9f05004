// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Modified Bessel functions of the second kind, `K_nu`, for fractional orders.

Synchrotron radiation needs `K_1/3`, `K_2/3` and integrals of `K_5/3`. We
evaluate them from the integral representations

```text
K_nu(x)            = ∫_0^∞ exp(-x cosh t) cosh(nu t) dt
∫_x^∞ K_nu(s) ds   = ∫_0^∞ exp(-x cosh t) cosh(nu t) / cosh(t) dt
```

which hold for any real order and `x > 0`. The integrands are smooth and
decay double-exponentially, so the semi-infinite adaptive integrator handles
arguments from ~1e-6 (where `K_nu` blows up like `x^-nu`) to several hundred
(where it underflows to zero). The exponentials are combined before they are
evaluated so that large `t` yields zero rather than `0 * ∞`.

*/

use crate::error::{FluxError, Result};
use crate::integrate::IntegrationWorkspace;

/// Relative tolerance used for all of the Bessel integrals.
const EPSREL: f64 = 1e-10;


fn check_argument(x: f64) -> Result<()> {
    if x > 0. && x.is_finite() {
        Ok(())
    } else {
        Err(FluxError::InvalidParameter {
            field: "bessel argument",
            requirement: "finite and positive",
            value: x,
        })
    }
}


/// Compute the modified Bessel function of the second kind, `K_nu(x)`.
///
/// The workspace is only used for scratch space; pass in one that lives
/// across calls when evaluating many points.
pub fn bessel_k(nu: f64, x: f64, ws: &mut IntegrationWorkspace) -> Result<f64> {
    check_argument(x)?;

    let r = ws.qagiu(|t| {
        let base = -x * t.cosh();
        0.5 * ((base + nu * t).exp() + (base - nu * t).exp())
    }, 0.)
        .tolerance(0., EPSREL)
        .compute()?;

    Ok(r.value)
}


/// Compute `∫_x^∞ K_nu(s) ds`.
pub fn bessel_k_integral(nu: f64, x: f64, ws: &mut IntegrationWorkspace) -> Result<f64> {
    check_argument(x)?;

    let r = ws.qagiu(|t| {
        let base = -x * t.cosh();
        0.5 * ((base + nu * t).exp() + (base - nu * t).exp()) / t.cosh()
    }, 0.)
        .tolerance(0., EPSREL)
        .compute()?;

    Ok(r.value)
}


/// The universal synchrotron function `G1(y) = y ∫_y^∞ K_5/3(s) ds`.
///
/// It peaks at `y ≈ 0.2858` with a value of about 0.918.
pub fn synchrotron_g1(y: f64, ws: &mut IntegrationWorkspace) -> Result<f64> {
    Ok(y * bessel_k_integral(5. / 3., y, ws)?)
}


#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use crate::integrate::IntegrationWorkspace;
    use super::*;

    #[test]
    fn half_order_closed_form() {
        let mut ws = IntegrationWorkspace::new(1000);

        for &x in &[0.01_f64, 0.3, 1., 4., 25.] {
            let exact = (PI / (2. * x)).sqrt() * (-x).exp();
            let k = bessel_k(0.5, x, &mut ws).unwrap();
            assert_approx_eq!(k, exact, 1e-8 * exact);
        }
    }

    /// K_{nu+1}(x) = K_{nu-1}(x) + (2 nu / x) K_nu(x), with K_{-nu} = K_nu.
    #[test]
    fn recurrence_links_synchrotron_orders() {
        let mut ws = IntegrationWorkspace::new(1000);

        for &x in &[0.05, 0.5, 2., 8.] {
            let k13 = bessel_k(1. / 3., x, &mut ws).unwrap();
            let k23 = bessel_k(2. / 3., x, &mut ws).unwrap();
            let k53 = bessel_k(5. / 3., x, &mut ws).unwrap();
            let expected = k13 + 4. / (3. * x) * k23;
            assert_approx_eq!(k53, expected, 1e-8 * expected);
        }
    }

    #[test]
    fn airy_connection() {
        // K_1/3(2/3) = pi sqrt(3) Ai(1)
        let mut ws = IntegrationWorkspace::new(1000);
        let k = bessel_k(1. / 3., 2. / 3., &mut ws).unwrap();
        assert_approx_eq!(k, 0.736179896082046, 1e-9);
    }

    #[test]
    fn integral_matches_quadrature_of_k() {
        let mut ws = IntegrationWorkspace::new(1000);
        let mut inner = IntegrationWorkspace::new(1000);
        let direct = ws.qagiu(|s| bessel_k(5. / 3., s, &mut inner).unwrap(), 1.)
            .tolerance(0., 1e-9)
            .compute()
            .unwrap()
            .value;
        let mut ws2 = IntegrationWorkspace::new(1000);
        let via_rep = bessel_k_integral(5. / 3., 1., &mut ws2).unwrap();
        assert_approx_eq!(direct, via_rep, 1e-8);
    }

    #[test]
    fn g1_peak() {
        let mut ws = IntegrationWorkspace::new(1000);
        assert_approx_eq!(synchrotron_g1(0.2858, &mut ws).unwrap(), 0.9180123329474486, 1e-8);
        assert_approx_eq!(synchrotron_g1(1., &mut ws).unwrap(), 0.6514228153553639, 1e-8);
    }

    #[test]
    fn far_tail_underflows_cleanly() {
        let mut ws = IntegrationWorkspace::new(1000);
        let k = bessel_k(2. / 3., 2000., &mut ws).unwrap();
        assert_eq!(k, 0.);
    }

    #[test]
    fn non_positive_argument_rejected() {
        let mut ws = IntegrationWorkspace::new(10);
        assert!(bessel_k(1. / 3., 0., &mut ws).is_err());
        assert!(bessel_k_integral(5. / 3., -1., &mut ws).is_err());
    }
}
