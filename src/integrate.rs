// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Numerical integration.

Two families of integrators live here. The adaptive Gauss-Kronrod routines
follow the QUADPACK design (as popularized by GSL): a workspace holds the
list of subintervals, the interval with the largest error estimate is
bisected until the global error estimate meets the requested tolerance, and
semi-infinite ranges are mapped onto `(0, 1]` with `x = a + (1 - t) / t`.
They are used for the special-function integrals, which must converge or
fail loudly.

Simpson's rule over sampled data is used everywhere that we integrate
something tabulated on a grid: spectra, angular densities, histograms. For
an even number of samples it averages the two "Simpson plus one trapezoid"
estimates.

*/

use std::f64;
use thiserror::Error;


/// Ways that an adaptive integration can fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IntegrationError {
    /// The subdivision limit of the workspace was reached.
    #[error("integral did not converge within {limit} subdivisions (estimated error {abserr:e})")]
    MaxSubdivisions {
        /// The workspace limit.
        limit: usize,
        /// The error estimate when we gave up.
        abserr: f64,
    },

    /// Round-off error prevents the requested tolerance from being reached.
    #[error("round-off error prevents reaching tolerance (estimated error {abserr:e})")]
    Roundoff {
        /// The error estimate when we gave up.
        abserr: f64,
    },

    /// A subinterval became too small to bisect further.
    #[error("integrand behaves badly near x = {x:e}")]
    BadIntegrand {
        /// Where the trouble is.
        x: f64,
    },

    /// The integrand returned NaN or an infinity.
    #[error("integrand is not finite at x = {x:e}")]
    NonFinite {
        /// The abscissa that produced the bad value.
        x: f64,
    },

    /// The tolerances cannot be achieved.
    #[error("invalid tolerance: epsabs = {epsabs:e}, epsrel = {epsrel:e}")]
    InvalidTolerance {
        /// Requested absolute tolerance.
        epsabs: f64,
        /// Requested relative tolerance.
        epsrel: f64,
    },
}


/// The result type for the adaptive integrators.
pub type IntegrationOutcome = Result<IntegrationResult, IntegrationError>;


#[derive(Clone, Copy, Debug, PartialEq)]
struct Interval {
    a: f64,
    b: f64,
    value: f64,
    abserr: f64,
}


/// Storage for the subintervals of an adaptive integration.
///
/// The size passed to `new` is the maximum number of subintervals. A
/// workspace can be reused for any number of integrations, which saves us
/// from reallocating in the inner loops.
#[derive(Debug)]
pub struct IntegrationWorkspace {
    limit: usize,
    intervals: Vec<Interval>,
}

impl IntegrationWorkspace {
    /// Create a workspace that allows up to `n` subintervals.
    pub fn new(n: usize) -> Self {
        IntegrationWorkspace {
            limit: n.max(1),
            intervals: Vec::with_capacity(n.max(1)),
        }
    }

    /// Integrate `f` over the semi-infinite range `[lower_bound, ∞)`.
    pub fn qagiu<'a, F>(&'a mut self, f: F, lower_bound: f64) -> IntegrationBuilder<'a, F> where F: FnMut(f64) -> f64 {
        IntegrationBuilder::new(self, f, Integrator::QAGIU, lower_bound, f64::INFINITY)
    }

    /// Integrate `f` over the finite range `[lower_bound, upper_bound]`.
    pub fn qag<'a, F>(&'a mut self, f: F, lower_bound: f64, upper_bound: f64) -> IntegrationBuilder<'a, F> where F: FnMut(f64) -> f64 {
        IntegrationBuilder::new(self, f, Integrator::QAG, lower_bound, upper_bound)
    }
}


/// A successful integration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationResult {
    /// The estimated value of the integral.
    pub value: f64,

    /// The estimated absolute error.
    pub abserr: f64,
}


/// The Gauss-Kronrod rule used on each subinterval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntegrationRule {
    /// 7-point Gauss, 15-point Kronrod.
    GaussKonrod15,

    /// 10-point Gauss, 21-point Kronrod.
    GaussKonrod21,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Integrator {
    QAG,
    QAGIU,
}


/// Configure and run one integration. Obtain one with
/// `IntegrationWorkspace::qag` or `IntegrationWorkspace::qagiu`.
pub struct IntegrationBuilder<'a, F: 'a> where F: FnMut(f64) -> f64 {
    workspace: &'a mut IntegrationWorkspace,
    function: F,
    kind: Integrator,
    rule: IntegrationRule,
    lower_bound: f64,
    upper_bound: f64,
    epsabs: f64,
    epsrel: f64,
}


impl<'a, F: 'a> IntegrationBuilder<'a, F> where F: FnMut(f64) -> f64 {
    fn new(ws: &'a mut IntegrationWorkspace, f: F, kind: Integrator,
           lower: f64, upper: f64) -> IntegrationBuilder<'a, F> {
        IntegrationBuilder {
            workspace: ws,
            function: f,
            kind,
            rule: IntegrationRule::GaussKonrod21,
            lower_bound: lower,
            upper_bound: upper,
            epsabs: 0.,
            epsrel: 1e-8,
        }
    }

    /// Set the absolute and relative tolerances.
    pub fn tolerance(mut self, epsabs: f64, epsrel: f64) -> Self {
        self.epsabs = epsabs;
        self.epsrel = epsrel;
        self
    }

    /// Set the rule used on each subinterval. Semi-infinite integrals always
    /// use the 15-point rule on the transformed range.
    pub fn rule(mut self, rule: IntegrationRule) -> Self {
        self.rule = rule;
        self
    }

    /// Run the integration.
    pub fn compute(self) -> IntegrationOutcome {
        let IntegrationBuilder { workspace, mut function, kind, rule, lower_bound, upper_bound, epsabs, epsrel } = self;

        if epsabs <= 0. && (epsrel < 50. * f64::EPSILON || epsrel < 0.5e-28) {
            return Err(IntegrationError::InvalidTolerance { epsabs, epsrel });
        }

        match kind {
            Integrator::QAG => {
                adaptive(workspace, &mut function, lower_bound, upper_bound, epsabs, epsrel, rule.nodes())
            },
            Integrator::QAGIU => {
                let a = lower_bound;
                let mut transformed = |t: f64| {
                    let x = a + (1. - t) / t;
                    function(x) / (t * t)
                };
                adaptive(workspace, &mut transformed, 0., 1., epsabs, epsrel, &GK15)
            },
        }
    }
}


struct KronrodNodes {
    xgk: &'static [f64],
    wgk: &'static [f64],
    wg: &'static [f64],
}

impl IntegrationRule {
    fn nodes(self) -> &'static KronrodNodes {
        match self {
            IntegrationRule::GaussKonrod15 => &GK15,
            IntegrationRule::GaussKonrod21 => &GK21,
        }
    }
}

static GK15: KronrodNodes = KronrodNodes {
    xgk: &[
        0.991455371120812639206854697526329,
        0.949107912342758524526189684047851,
        0.864864423359769072789712788640926,
        0.741531185599394439863864773280788,
        0.586087235467691130294144845693013,
        0.405845151377397166906606412076961,
        0.207784955007898467600689403773245,
        0.000000000000000000000000000000000,
    ],
    wgk: &[
        0.022935322010529224963732008058970,
        0.063092092629978553290700663189204,
        0.104790010322250183839876322541518,
        0.140653259715525918745189590510238,
        0.169004726639267902826583426598550,
        0.190350578064785409913256402421014,
        0.204432940075298892414161999234649,
        0.209482141084727828012999174891714,
    ],
    wg: &[
        0.129484966168869693270611432679082,
        0.279705391489276667901467771423780,
        0.381830050505118944950369775488975,
        0.417959183673469387755102040816327,
    ],
};

static GK21: KronrodNodes = KronrodNodes {
    xgk: &[
        0.995657163025808080735527280689003,
        0.973906528517171720077964012084452,
        0.930157491355708226001207180059508,
        0.865063366688984510732096688423493,
        0.780817726586416897063717578345042,
        0.679409568299024406234327365114874,
        0.562757134668604683339000099272694,
        0.433395394129247190799265943165784,
        0.294392862701460198131126603103866,
        0.148874338981631210884826001129720,
        0.000000000000000000000000000000000,
    ],
    wgk: &[
        0.011694638867371874278064396062192,
        0.032558162307964727478818972459390,
        0.054755896574351996031381300244580,
        0.075039674810919952767043140916190,
        0.093125454583697605535065465083366,
        0.109387158802297641899210590325805,
        0.123491976262065851077208707238620,
        0.134709217311473325928054001771707,
        0.142775938577060080797094273138717,
        0.147739104901338491374841515972068,
        0.149445554002916905664936468389821,
    ],
    wg: &[
        0.066671344308688137593568809893332,
        0.149451349150580593145776339657697,
        0.219086362515982043995534934228163,
        0.269266719309996355091226921569469,
        0.295524224714752870173892994651338,
    ],
};


struct RuleEvaluation {
    value: f64,
    abserr: f64,
    resabs: f64,
    resasc: f64,
}


fn eval<F>(f: &mut F, x: f64) -> Result<f64, IntegrationError> where F: FnMut(f64) -> f64 {
    let v = f(x);

    if v.is_finite() {
        Ok(v)
    } else {
        Err(IntegrationError::NonFinite { x })
    }
}


/// Apply one Gauss-Kronrod rule to `[a, b]`.
fn apply_rule<F>(f: &mut F, a: f64, b: f64, nodes: &KronrodNodes) -> Result<RuleEvaluation, IntegrationError>
    where F: FnMut(f64) -> f64
{
    let n = nodes.xgk.len();
    let center = 0.5 * (a + b);
    let half_length = 0.5 * (b - a);
    let abs_half_length = half_length.abs();
    let f_center = eval(f, center)?;

    let mut fv1 = [0_f64; 11];
    let mut fv2 = [0_f64; 11];

    let mut resg = if n % 2 == 0 { f_center * nodes.wg[n / 2 - 1] } else { 0. };
    let mut resk = f_center * nodes.wgk[n - 1];
    let mut resabs = resk.abs();

    for j in 0..(n - 1) / 2 {
        let jtw = 2 * j + 1;
        let abscissa = half_length * nodes.xgk[jtw];
        let fval1 = eval(f, center - abscissa)?;
        let fval2 = eval(f, center + abscissa)?;
        let fsum = fval1 + fval2;
        fv1[jtw] = fval1;
        fv2[jtw] = fval2;
        resg += nodes.wg[j] * fsum;
        resk += nodes.wgk[jtw] * fsum;
        resabs += nodes.wgk[jtw] * (fval1.abs() + fval2.abs());
    }

    for j in 0..n / 2 {
        let jtwm1 = 2 * j;
        let abscissa = half_length * nodes.xgk[jtwm1];
        let fval1 = eval(f, center - abscissa)?;
        let fval2 = eval(f, center + abscissa)?;
        fv1[jtwm1] = fval1;
        fv2[jtwm1] = fval2;
        resk += nodes.wgk[jtwm1] * (fval1 + fval2);
        resabs += nodes.wgk[jtwm1] * (fval1.abs() + fval2.abs());
    }

    let mean = 0.5 * resk;
    let mut resasc = nodes.wgk[n - 1] * (f_center - mean).abs();

    for j in 0..n - 1 {
        resasc += nodes.wgk[j] * ((fv1[j] - mean).abs() + (fv2[j] - mean).abs());
    }

    let resabs = resabs * abs_half_length;
    let resasc = resasc * abs_half_length;
    let abserr = rescale_error((resk - resg) * half_length, resabs, resasc);

    Ok(RuleEvaluation { value: resk * half_length, abserr, resabs, resasc })
}


fn rescale_error(err: f64, resabs: f64, resasc: f64) -> f64 {
    let mut err = err.abs();

    if resasc != 0. && err != 0. {
        let scale = (200. * err / resasc).powf(1.5);

        err = if scale < 1. { resasc * scale } else { resasc };
    }

    if resabs > f64::MIN_POSITIVE / (50. * f64::EPSILON) {
        let min_err = 50. * f64::EPSILON * resabs;

        if min_err > err {
            err = min_err;
        }
    }

    err
}


fn adaptive<F>(ws: &mut IntegrationWorkspace, f: &mut F, a: f64, b: f64,
               epsabs: f64, epsrel: f64, nodes: &KronrodNodes) -> IntegrationOutcome
    where F: FnMut(f64) -> f64
{
    ws.intervals.clear();

    let first = apply_rule(f, a, b, nodes)?;
    let tolerance = epsabs.max(epsrel * first.value.abs());
    let round_off = 50. * f64::EPSILON * first.resabs;

    ws.intervals.push(Interval { a, b, value: first.value, abserr: first.abserr });

    if first.abserr <= round_off && first.abserr > tolerance {
        return Err(IntegrationError::Roundoff { abserr: first.abserr });
    }

    if (first.abserr <= tolerance && first.abserr != first.resasc) || first.abserr == 0. {
        return Ok(IntegrationResult { value: first.value, abserr: first.abserr });
    }

    if ws.limit == 1 {
        return Err(IntegrationError::MaxSubdivisions { limit: ws.limit, abserr: first.abserr });
    }

    let mut area = first.value;
    let mut errsum = first.abserr;
    let mut roundoff_type1 = 0;
    let mut roundoff_type2 = 0;

    loop {
        // Bisect the interval with the largest error estimate.

        let (worst, _) = ws.intervals.iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, iv)| if iv.abserr > acc.1 { (i, iv.abserr) } else { acc });
        let current = ws.intervals[worst];
        let a1 = current.a;
        let b2 = current.b;
        let mid = 0.5 * (a1 + b2);

        let left = apply_rule(f, a1, mid, nodes)?;
        let right = apply_rule(f, mid, b2, nodes)?;

        let area12 = left.value + right.value;
        let error12 = left.abserr + right.abserr;

        errsum += error12 - current.abserr;
        area += area12 - current.value;

        if left.resasc != left.abserr && right.resasc != right.abserr {
            let delta = current.value - area12;

            if delta.abs() <= 1e-5 * area12.abs() && error12 >= 0.99 * current.abserr {
                roundoff_type1 += 1;
            }

            if ws.intervals.len() >= 10 && error12 > current.abserr {
                roundoff_type2 += 1;
            }
        }

        ws.intervals[worst] = Interval { a: a1, b: mid, value: left.value, abserr: left.abserr };
        ws.intervals.push(Interval { a: mid, b: b2, value: right.value, abserr: right.abserr });

        let tolerance = epsabs.max(epsrel * area.abs());

        if errsum <= tolerance {
            break;
        }

        if roundoff_type1 >= 6 || roundoff_type2 >= 20 {
            return Err(IntegrationError::Roundoff { abserr: errsum });
        }

        if ws.intervals.len() >= ws.limit {
            return Err(IntegrationError::MaxSubdivisions { limit: ws.limit, abserr: errsum });
        }

        let tmp = (1. + 100. * f64::EPSILON) * (mid.abs() + 1000. * f64::MIN_POSITIVE);

        if a1.abs() <= tmp && b2.abs() <= tmp {
            return Err(IntegrationError::BadIntegrand { x: mid });
        }
    }

    // Re-sum from scratch so that the running update doesn't leak round-off.
    let value = ws.intervals.iter().map(|iv| iv.value).sum();
    Ok(IntegrationResult { value, abserr: errsum })
}


// Simpson's rule on sampled data.

/// Integrate samples `y` tabulated at the abscissae `x` with Simpson's rule.
///
/// The abscissae need not be evenly spaced. With an even number of samples,
/// the result is the average of Simpson's rule on the first `N - 1` samples
/// plus a trapezoid on the last interval, and a trapezoid on the first
/// interval plus Simpson's rule on the last `N - 1` samples. Fewer than two
/// samples integrate to zero.
///
/// # Panics
///
/// Panics if `x` and `y` have different lengths.
pub fn simpson(y: &[f64], x: &[f64]) -> f64 {
    assert_eq!(y.len(), x.len(), "simpson: sample and abscissa lengths differ");
    simpson_with(y, |i| x[i + 1] - x[i])
}


/// Integrate evenly-spaced samples `y` with Simpson's rule. See `simpson`.
pub fn simpson_dx(y: &[f64], dx: f64) -> f64 {
    simpson_with(y, |_| dx)
}


/// `step(i)` is the spacing between sample `i` and sample `i + 1`.
fn simpson_with<S>(y: &[f64], step: S) -> f64 where S: Fn(usize) -> f64 {
    let n = y.len();

    if n < 2 {
        return 0.;
    }

    if n % 2 == 1 {
        return basic_simpson(y, &step, 0, n - 1);
    }

    let last = 0.5 * step(n - 2) * (y[n - 1] + y[n - 2]);
    let first = 0.5 * step(0) * (y[0] + y[1]);
    let val1 = basic_simpson(y, &step, 0, n - 2) + last;
    let val2 = first + basic_simpson(y, &step, 1, n - 1);
    0.5 * (val1 + val2)
}


/// Composite Simpson over the samples `start..=stop`, where `stop - start`
/// is even.
fn basic_simpson<S>(y: &[f64], step: &S, start: usize, stop: usize) -> f64 where S: Fn(usize) -> f64 {
    let mut total = 0.;
    let mut i = start;

    while i + 2 <= stop {
        let h0 = step(i);
        let h1 = step(i + 1);
        let hsum = h0 + h1;
        let hprod = h0 * h1;
        let h0divh1 = h0 / h1;

        total += hsum / 6. * (y[i] * (2. - 1. / h0divh1) +
                              y[i + 1] * hsum * hsum / hprod +
                              y[i + 2] * (2. - h0divh1));
        i += 2;
    }

    total
}


#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use super::*;

    #[test]
    fn qag_polynomial() {
        let mut ws = IntegrationWorkspace::new(100);
        let r = ws.qag(|x| 3. * x * x, 0., 2.)
            .tolerance(0., 1e-12)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 8., 1e-12);
    }

    #[test]
    fn qag_oscillatory_needs_subdivision() {
        let mut ws = IntegrationWorkspace::new(1000);
        let r = ws.qag(|x| (30. * x).sin() * x, 0., PI)
            .tolerance(0., 1e-10)
            .rule(IntegrationRule::GaussKonrod15)
            .compute()
            .unwrap();
        // ∫ x sin(30x) dx over [0, π] = -π cos(30π) / 30 = -π / 30
        assert_approx_eq!(r.value, -PI / 30., 1e-9);
    }

    #[test]
    fn qagiu_inverse_square() {
        let mut ws = IntegrationWorkspace::new(1000);
        let r = ws.qagiu(|x| 1. / (x * x), 0.5)
            .tolerance(0., 1e-10)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 2., 1e-9);
    }

    #[test]
    fn qagiu_gaussian_tail() {
        let mut ws = IntegrationWorkspace::new(1000);
        let r = ws.qagiu(|x| (-x * x).exp(), 0.)
            .tolerance(0., 1e-10)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 0.5 * PI.sqrt(), 1e-9);
    }

    #[test]
    fn nan_integrand_is_an_error() {
        let mut ws = IntegrationWorkspace::new(100);
        let r = ws.qag(|x| if x > 0.5 { f64::NAN } else { x }, 0., 1.).compute();
        match r {
            Err(IntegrationError::NonFinite { .. }) => {},
            other => panic!("expected NonFinite, got {:?}", other),
        }
    }

    #[test]
    fn subdivision_limit_is_an_error() {
        let mut ws = IntegrationWorkspace::new(3);
        let r = ws.qag(|x| (200. * x).sin().abs(), 0., 10.)
            .tolerance(0., 1e-12)
            .compute();
        match r {
            Err(IntegrationError::MaxSubdivisions { limit: 3, .. }) => {},
            other => panic!("expected MaxSubdivisions, got {:?}", other),
        }
    }

    #[test]
    fn impossible_tolerance_rejected() {
        let mut ws = IntegrationWorkspace::new(10);
        let r = ws.qag(|x| x, 0., 1.).tolerance(0., 0.).compute();
        assert!(matches!(r, Err(IntegrationError::InvalidTolerance { .. })));
    }

    #[test]
    fn simpson_exact_for_cubics() {
        let x: Vec<f64> = (0..11).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|x| x * x * x - x).collect();
        // ∫_0^2 (x^3 - x) dx = 4 - 2
        assert_approx_eq!(simpson(&y, &x), 2., 1e-12);
        assert_approx_eq!(simpson_dx(&y, 0.2), 2., 1e-12);
    }

    #[test]
    fn simpson_even_count_averages() {
        // Four unit-spaced samples of a line: every variant is exact.
        let y = [0., 1., 2., 3.];
        assert_approx_eq!(simpson_dx(&y, 1.), 4.5, 1e-12);

        // Non-linear data with an even count: average of the two schemes.
        let y = [1., 4., 9., 16.];
        let val1 = (1. + 16. + 9.) / 3. + 0.5 * (9. + 16.);
        let val2 = 0.5 * (1. + 4.) + (4. + 36. + 16.) / 3.;
        assert_approx_eq!(simpson_dx(&y, 1.), 0.5 * (val1 + val2), 1e-12);
    }

    #[test]
    fn simpson_degenerate() {
        assert_eq!(simpson_dx(&[], 1.), 0.);
        assert_eq!(simpson_dx(&[5.], 1.), 0.);
        assert_approx_eq!(simpson_dx(&[1., 3.], 0.5), 1.);
    }

    #[test]
    fn simpson_uneven_spacing() {
        let x = [0., 0.5, 2., 2.5, 4.];
        let y: Vec<f64> = x.iter().map(|x| 2. * x + 1.).collect();
        assert_approx_eq!(simpson(&y, &x), 20., 1e-12);
    }
}
