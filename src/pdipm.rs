//! Primal-dual interior point method for nonlinear programming.
//!
//! Solves problems of the form
//! ```text
//!     min f(x)
//!     s.t. h(x) = 0
//!          g(x) <= 0
//!          l <= A*x <= u
//!          xmin <= x <= xmax
//! ```
//! with callbacks supplying the cost, the nonlinear constraints and the
//! Hessian of the Lagrangian.

use crate::linsolve::LinearSolver;
use crate::math::{dot, max, norm, norm_inf};
use crate::opt::SolverOpts;
use crate::sparse::{from_triplets, spmv};
use log::info;
use sprs::CsMat;

const XI: f64 = 0.99995;
const SIGMA: f64 = 0.1;
const Z0: f64 = 1.0;
const ALPHA_MIN: f64 = 1e-8;
const RHO_MIN: f64 = 0.95;
const RHO_MAX: f64 = 1.05;
const MU_THRESHOLD: f64 = 1e-5;
const MAX_RED: usize = 20;

/// Bounds beyond this magnitude are treated as absent.
const BIGNUM: f64 = 1e10;

/// Nonlinear constraint values and Jacobians at a point. Jacobians are
/// stored with one sparse column per constraint.
pub struct NlConstraints {
    pub g: Vec<f64>,
    pub h: Vec<f64>,
    pub dg: CsMat<f64>,
    pub dh: CsMat<f64>,
}

/// Problem callbacks for the interior point method.
pub trait Nlp {
    /// Cost and its gradient at `x`.
    fn cost(&self, x: &[f64]) -> (f64, Vec<f64>);

    /// Nonlinear inequality `g(x) <= 0` and equality `h(x) = 0`
    /// constraints and their Jacobians at `x`.
    fn constraints(&self, x: &[f64]) -> NlConstraints;

    /// Hessian of the Lagrangian at `x`, scaled by the cost multiplier.
    fn hessian(&self, x: &[f64], lam: &[f64], mu: &[f64]) -> CsMat<f64>;
}

/// Multipliers on the constraints at the solution.
#[derive(Clone, Debug, Default)]
pub struct Lambda {
    /// Multipliers on the nonlinear equality constraints.
    pub eqnonlin: Vec<f64>,
    /// Multipliers on the nonlinear inequality constraints.
    pub ineqnonlin: Vec<f64>,
    /// Net multiplier on each linear constraint row, `mu_u - mu_l`.
    pub lam_lin: Vec<f64>,
    /// Lower (l) bound multipliers on the linear constraint rows.
    pub mu_l: Vec<f64>,
    /// Upper (u) bound multipliers on the linear constraint rows.
    pub mu_u: Vec<f64>,
    /// Lower bound multipliers on the variables.
    pub lower: Vec<f64>,
    /// Upper bound multipliers on the variables.
    pub upper: Vec<f64>,
}

/// Iteration count and the final convergence criteria values.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdipmOutput {
    pub iterations: usize,
    pub feascond: f64,
    pub gradcond: f64,
    pub compcond: f64,
    pub costcond: f64,
}

pub struct PdipmResult {
    pub x: Vec<f64>,
    pub f: f64,
    pub converged: bool,
    pub output: PdipmOutput,
    pub lambda: Lambda,
}

/// A sparse row or column stored as (index, value) pairs.
type SpVec = Vec<(usize, f64)>;

fn mat_cols(m: &CsMat<f64>) -> Vec<SpVec> {
    let mut cols = vec![Vec::new(); m.cols()];
    for (val, (row, col)) in m.iter() {
        cols[col].push((row, *val));
    }
    cols
}

fn sp_dot(row: &[(usize, f64)], x: &[f64]) -> f64 {
    row.iter().map(|&(j, v)| v * x[j]).sum()
}

struct Eval {
    f: f64,
    df: Vec<f64>,
    g: Vec<f64>,
    h: Vec<f64>,
    /// Combined inequality Jacobian, one sparse column per constraint.
    dg: Vec<SpVec>,
    /// Combined equality Jacobian, one sparse column per constraint.
    dh: Vec<SpVec>,
}

fn lagrangian_grad(ev: &Eval, lam: &[f64], mu: &[f64]) -> Vec<f64> {
    let mut lx = ev.df.clone();
    for (j, col) in ev.dh.iter().enumerate() {
        for &(r, v) in col {
            lx[r] += v * lam[j];
        }
    }
    for (j, col) in ev.dg.iter().enumerate() {
        for &(r, v) in col {
            lx[r] += v * mu[j];
        }
    }
    lx
}

/// Merit function used by the step-size control.
fn merit(ev: &Eval, lam: &[f64], mu: &[f64], z: &[f64], gamma: f64) -> f64 {
    let gz: f64 = ev
        .g
        .iter()
        .zip(mu)
        .zip(z)
        .map(|((&gj, &mj), &zj)| mj * (gj + zj))
        .sum();
    let barrier: f64 = z.iter().map(|&zj| zj.ln()).sum();
    ev.f + dot(lam, &ev.h) + gz - gamma * barrier
}

/// Solves a nonlinear program with the primal-dual interior point method.
///
/// Variable bounds and the two-sided linear constraints `l <= A*x <= u`
/// are merged into a single system and partitioned into equality rows,
/// one-sided rows and doubly bounded rows before iterating. Numerical
/// failure (NaN iterate, collapsed step length or barrier parameter out
/// of range) aborts the iteration with `converged` false.
#[allow(clippy::too_many_arguments)]
pub fn pdipm(
    nlp: &dyn Nlp,
    x0: &[f64],
    xmin: Option<&[f64]>,
    xmax: Option<&[f64]>,
    a_mat: Option<&CsMat<f64>>,
    l: &[f64],
    u: &[f64],
    opts: &SolverOpts,
    lin_solver: &dyn LinearSolver,
    cost_mult: f64,
) -> PdipmResult {
    let nx = x0.len();
    let na = a_mat.map(|a| a.rows()).unwrap_or(0);
    debug_assert_eq!(l.len(), na);
    debug_assert_eq!(u.len(), na);

    let feastol = opts.feasibility_tol;
    let gradtol = opts.absolute_tol;
    let comptol = opts.absolute_tol;
    let costtol = opts.relative_tol;

    let xmin = match xmin {
        Some(v) => v.to_vec(),
        None => vec![f64::NEG_INFINITY; nx],
    };
    let xmax = match xmax {
        Some(v) => v.to_vec(),
        None => vec![f64::INFINITY; nx],
    };

    // add var limits to linear constraints
    let mut rows: Vec<SpVec> = (0..nx).map(|j| vec![(j, 1.0)]).collect();
    if let Some(a) = a_mat {
        let mut a_rows = vec![Vec::new(); na];
        for (val, (r, c)) in a.iter() {
            a_rows[r].push((c, *val));
        }
        rows.append(&mut a_rows);
    }
    let ll: Vec<f64> = xmin.iter().chain(l).cloned().collect();
    let uu: Vec<f64> = xmax.iter().chain(u).cloned().collect();

    // split up linear constraints
    let mut ieq = Vec::new();
    let mut igt = Vec::new();
    let mut ilt = Vec::new();
    let mut ibx = Vec::new();
    for j in 0..rows.len() {
        if (uu[j] - ll[j]).abs() < f64::EPSILON {
            ieq.push(j);
        } else if uu[j] >= BIGNUM && ll[j] > -BIGNUM {
            igt.push(j);
        } else if ll[j] <= -BIGNUM && uu[j] < BIGNUM {
            ilt.push(j);
        } else if uu[j] < BIGNUM && ll[j] > -BIGNUM {
            ibx.push(j);
        }
    }
    let (nlt, ngt, nbx) = (ilt.len(), igt.len(), ibx.len());

    let neg = |row: &SpVec| -> SpVec { row.iter().map(|&(j, v)| (j, -v)).collect() };

    let ae: Vec<SpVec> = ieq.iter().map(|&j| rows[j].clone()).collect();
    let be: Vec<f64> = ieq.iter().map(|&j| uu[j]).collect();
    let mut ai: Vec<SpVec> = Vec::with_capacity(nlt + ngt + 2 * nbx);
    let mut bi: Vec<f64> = Vec::with_capacity(nlt + ngt + 2 * nbx);
    for &j in &ilt {
        ai.push(rows[j].clone());
        bi.push(uu[j]);
    }
    for &j in &igt {
        ai.push(neg(&rows[j]));
        bi.push(-ll[j]);
    }
    for &j in &ibx {
        ai.push(rows[j].clone());
        bi.push(uu[j]);
    }
    for &j in &ibx {
        ai.push(neg(&rows[j]));
        bi.push(-ll[j]);
    }

    let evaluate = |x: &[f64]| -> Eval {
        let (mut f, mut df) = nlp.cost(x);
        f *= cost_mult;
        df.iter_mut().for_each(|v| *v *= cost_mult);

        let nc = nlp.constraints(x);
        let mut g = nc.g;
        let mut h = nc.h;
        g.extend(ai.iter().zip(&bi).map(|(row, &b)| sp_dot(row, x) - b));
        h.extend(ae.iter().zip(&be).map(|(row, &b)| sp_dot(row, x) - b));

        let mut dg = mat_cols(&nc.dg);
        dg.extend(ai.iter().cloned());
        let mut dh = mat_cols(&nc.dh);
        dh.extend(ae.iter().cloned());

        Eval { f, df, g, h, dg, dh }
    };

    let mut x = x0.to_vec();
    let mut ev = evaluate(&x);

    let neq = ev.h.len();
    let niq = ev.g.len();
    let neqnln = neq - ae.len();
    let niqnln = niq - ai.len();

    // initialize gamma, lam, mu, z
    let mut gamma = 1.0;
    let mut lam = vec![0.0; neq];
    let mut z = vec![Z0; niq];
    for j in 0..niq {
        if ev.g[j] < -Z0 {
            z[j] = -ev.g[j];
        }
    }
    let mut mu = vec![Z0; niq];
    for j in 0..niq {
        if gamma / z[j] > Z0 {
            mu[j] = gamma / z[j];
        }
    }

    let mut i = 0;
    let mut converged = false;
    let mut f0 = ev.f;

    let mut lx = lagrangian_grad(&ev, &lam, &mu);
    let mut feascond =
        norm_inf(&ev.h).max(max(&ev.g)) / (1.0 + norm_inf(&x).max(norm_inf(&z)));
    let mut gradcond = norm_inf(&lx) / (1.0 + norm_inf(&lam).max(norm_inf(&mu)));
    let mut compcond = dot(&z, &mu) / (1.0 + norm_inf(&x));
    let mut costcond = (ev.f - f0).abs() / (1.0 + f0.abs());
    let mut l_merit = if opts.step_control {
        merit(&ev, &lam, &mu, &z, gamma)
    } else {
        0.0
    };

    if opts.show_progress {
        info!(" it    objective   step size   feascond     gradcond     compcond     costcond");
        info!("----  ------------ --------- ------------ ------------ ------------ ------------");
        info!(
            "{:3}  {:12.6}  {:>9} {:12.6e} {:12.6e} {:12.6e} {:12.6e}",
            i,
            ev.f / cost_mult,
            "",
            feascond,
            gradcond,
            compcond,
            costcond
        );
    }
    if feascond < feastol && gradcond < gradtol && compcond < comptol && costcond < costtol {
        converged = true;
        if opts.show_progress {
            info!("Converged!");
        }
    }

    // do Newton iterations
    while !converged && i < opts.max_iterations {
        i += 1;

        let lxx = nlp.hessian(&x, &lam[..neqnln], &mu[..niqnln]);

        // Schur-complement elimination of the inequality slacks:
        //   M = Lxx + dg * diag(mu/z) * dg'
        //   N = Lx + dg * (mu .* g + gamma) ./ z
        // then solve [M dh; dh' 0] [dx; dlam] = [-N; -h].
        let nkkt = nx + neq;
        let mut trip: Vec<(usize, usize, f64)> = Vec::new();
        for (val, (r, c)) in lxx.iter() {
            trip.push((r, c, *val));
        }
        for (j, col) in ev.dg.iter().enumerate() {
            let w = mu[j] / z[j];
            for &(r1, v1) in col {
                for &(r2, v2) in col {
                    trip.push((r1, r2, v1 * w * v2));
                }
            }
        }
        for (j, col) in ev.dh.iter().enumerate() {
            for &(r, v) in col {
                trip.push((r, nx + j, v));
                trip.push((nx + j, r, v));
            }
        }
        let kkt = from_triplets(nkkt, nkkt, trip);

        let mut n_vec = lx.clone();
        for (j, col) in ev.dg.iter().enumerate() {
            let w = (mu[j] * ev.g[j] + gamma) / z[j];
            for &(r, v) in col {
                n_vec[r] += v * w;
            }
        }
        let rhs: Vec<f64> = n_vec
            .iter()
            .map(|v| -v)
            .chain(ev.h.iter().map(|v| -v))
            .collect();

        let dxdlam = match lin_solver.solve(&kkt, &rhs) {
            Ok(sol) => sol,
            Err(_) => {
                if opts.show_progress {
                    info!("Numerically failed.");
                }
                break;
            }
        };
        let mut dx = dxdlam[..nx].to_vec();
        let mut dlam = dxdlam[nx..].to_vec();
        let mut dz: Vec<f64> = (0..niq)
            .map(|j| -ev.g[j] - z[j] - sp_dot(&ev.dg[j], &dx))
            .collect();
        let mut dmu: Vec<f64> = (0..niq)
            .map(|j| -mu[j] + (gamma - mu[j] * dz[j]) / z[j])
            .collect();

        // optional step-size control
        if opts.step_control {
            let x1: Vec<f64> = x.iter().zip(&dx).map(|(xj, dj)| xj + dj).collect();
            let ev1 = evaluate(&x1);
            let lx1 = lagrangian_grad(&ev1, &lam, &mu);
            let feascond1 = norm_inf(&ev1.h).max(max(&ev1.g))
                / (1.0 + norm_inf(&x1).max(norm_inf(&z)));
            let gradcond1 = norm_inf(&lx1) / (1.0 + norm_inf(&lam).max(norm_inf(&mu)));

            if feascond1 > feascond && gradcond1 > gradcond {
                let mut alpha = 1.0;
                for _ in 0..MAX_RED {
                    let dx1: Vec<f64> = dx.iter().map(|v| alpha * v).collect();
                    let x1: Vec<f64> = x.iter().zip(&dx1).map(|(xj, dj)| xj + dj).collect();
                    let ev1 = evaluate(&x1);
                    let l1 = merit(&ev1, &lam, &mu, &z, gamma);

                    let mut quad = dot(&lx, &dx1);
                    for (val, (r, c)) in lxx.iter() {
                        quad += 0.5 * dx1[r] * *val * dx1[c];
                    }
                    let rho = (l1 - l_merit) / quad;
                    if rho > RHO_MIN && rho < RHO_MAX {
                        break;
                    }
                    alpha /= 2.0;
                }
                dx.iter_mut().for_each(|v| *v *= alpha);
                dz.iter_mut().for_each(|v| *v *= alpha);
                dlam.iter_mut().for_each(|v| *v *= alpha);
                dmu.iter_mut().for_each(|v| *v *= alpha);
            }
        }

        // fraction-to-the-boundary step lengths, primal and dual
        let mut alphap = 1.0f64;
        for j in 0..niq {
            if dz[j] < 0.0 {
                alphap = alphap.min(XI * z[j] / -dz[j]);
            }
        }
        let mut alphad = 1.0f64;
        for j in 0..niq {
            if dmu[j] < 0.0 {
                alphad = alphad.min(XI * mu[j] / -dmu[j]);
            }
        }

        for j in 0..nx {
            x[j] += alphap * dx[j];
        }
        for j in 0..niq {
            z[j] += alphap * dz[j];
        }
        for j in 0..neq {
            lam[j] += alphad * dlam[j];
        }
        for j in 0..niq {
            mu[j] += alphad * dmu[j];
        }
        if niq > 0 {
            gamma = SIGMA * dot(&z, &mu) / niq as f64;
        }

        ev = evaluate(&x);
        lx = lagrangian_grad(&ev, &lam, &mu);
        feascond =
            norm_inf(&ev.h).max(max(&ev.g)) / (1.0 + norm_inf(&x).max(norm_inf(&z)));
        gradcond = norm_inf(&lx) / (1.0 + norm_inf(&lam).max(norm_inf(&mu)));
        compcond = dot(&z, &mu) / (1.0 + norm_inf(&x));
        costcond = (ev.f - f0).abs() / (1.0 + f0.abs());

        if opts.show_progress {
            info!(
                "{:3}  {:12.6} {:9.5} {:12.6e} {:12.6e} {:12.6e} {:12.6e}",
                i,
                ev.f / cost_mult,
                norm(&dx),
                feascond,
                gradcond,
                compcond,
                costcond
            );
        }
        if feascond < feastol && gradcond < gradtol && compcond < comptol && costcond < costtol
        {
            converged = true;
            if opts.show_progress {
                info!("Converged!");
            }
        } else {
            if x.iter().any(|v| v.is_nan())
                || alphap < ALPHA_MIN
                || alphad < ALPHA_MIN
                || gamma < f64::EPSILON
                || gamma > 1.0 / f64::EPSILON
            {
                if opts.show_progress {
                    info!("Numerically failed.");
                }
                break;
            }
            f0 = ev.f;
            if opts.step_control {
                l_merit = merit(&ev, &lam, &mu, &z, gamma);
            }
        }
    }

    if opts.show_progress && !converged {
        info!("Did not converge in {} iterations.", i);
    }

    // zero out multipliers on non-binding constraints
    for j in 0..niq {
        if ev.g[j] < -feastol && mu[j] < MU_THRESHOLD {
            mu[j] = 0.0;
        }
    }

    // un-scale cost and prices
    let f = ev.f / cost_mult;
    lam.iter_mut().for_each(|v| *v /= cost_mult);
    mu.iter_mut().for_each(|v| *v /= cost_mult);

    // re-package multipliers, splitting the merged rows back into lower
    // and upper bound multipliers on variables and linear rows
    let lam_rows = &lam[neqnln..];
    let mu_lin = &mu[niqnln..];
    let mut mu_l = vec![0.0; nx + na];
    let mut mu_u = vec![0.0; nx + na];
    for (k, &j) in ieq.iter().enumerate() {
        if lam_rows[k] < 0.0 {
            mu_l[j] = -lam_rows[k];
        } else if lam_rows[k] > 0.0 {
            mu_u[j] = lam_rows[k];
        }
    }
    for (k, &j) in ilt.iter().enumerate() {
        mu_u[j] = mu_lin[k];
    }
    for (k, &j) in igt.iter().enumerate() {
        mu_l[j] = mu_lin[nlt + k];
    }
    for (k, &j) in ibx.iter().enumerate() {
        mu_u[j] = mu_lin[nlt + ngt + k];
        mu_l[j] = mu_lin[nlt + ngt + nbx + k];
    }

    let lambda = Lambda {
        eqnonlin: lam[..neqnln].to_vec(),
        ineqnonlin: mu[..niqnln].to_vec(),
        lam_lin: (nx..nx + na).map(|j| mu_u[j] - mu_l[j]).collect(),
        mu_l: mu_l[nx..].to_vec(),
        mu_u: mu_u[nx..].to_vec(),
        lower: mu_l[..nx].to_vec(),
        upper: mu_u[..nx].to_vec(),
    };

    PdipmResult {
        x,
        f,
        converged,
        output: PdipmOutput {
            iterations: i,
            feascond,
            gradcond,
            compcond,
            costcond,
        },
        lambda,
    }
}

/// A quadratic program `min 0.5*x'Hx + c'x` expressed through the
/// nonlinear callbacks.
struct QuadraticCost<'a> {
    h: Option<&'a CsMat<f64>>,
    c: &'a [f64],
}

impl Nlp for QuadraticCost<'_> {
    fn cost(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let mut df = self.c.to_vec();
        let mut f = dot(self.c, x);
        if let Some(h) = self.h {
            let hx = spmv(h, x);
            f += 0.5 * dot(&hx, x);
            for (d, v) in df.iter_mut().zip(&hx) {
                *d += v;
            }
        }
        (f, df)
    }

    fn constraints(&self, x: &[f64]) -> NlConstraints {
        NlConstraints {
            g: Vec::new(),
            h: Vec::new(),
            dg: from_triplets(x.len(), 0, Vec::new()),
            dh: from_triplets(x.len(), 0, Vec::new()),
        }
    }

    fn hessian(&self, x: &[f64], _lam: &[f64], _mu: &[f64]) -> CsMat<f64> {
        match self.h {
            Some(h) => h.clone(),
            None => from_triplets(x.len(), x.len(), Vec::new()),
        }
    }
}

/// Solves a quadratic program with the interior point method.
///
/// The first `n_eq` rows of `A*x (<=|=) b` are treated as equalities,
/// the remainder as upper bounded inequalities.
#[allow(clippy::too_many_arguments)]
pub fn qps(
    h_mat: Option<&CsMat<f64>>,
    c: &[f64],
    a_mat: &CsMat<f64>,
    b: &[f64],
    n_eq: usize,
    xmin: Option<&[f64]>,
    xmax: Option<&[f64]>,
    x0: Option<&[f64]>,
    opts: &SolverOpts,
    lin_solver: &dyn LinearSolver,
) -> PdipmResult {
    let nx = c.len();

    let x0 = match x0 {
        Some(v) => v.to_vec(),
        None => {
            // bound-based starting point heuristic
            let mut x = vec![0.0; nx];
            for j in 0..nx {
                let lb = xmin.map(|v| v[j]).unwrap_or(f64::NEG_INFINITY);
                let ub = xmax.map(|v| v[j]).unwrap_or(f64::INFINITY);
                if ub < BIGNUM && lb > -BIGNUM {
                    x[j] = (lb + ub) / 2.0;
                } else if ub < BIGNUM {
                    x[j] = ub - 1.0;
                } else if lb > -BIGNUM {
                    x[j] = lb + 1.0;
                }
            }
            x
        }
    };

    let mut l = vec![f64::NEG_INFINITY; b.len()];
    l[..n_eq].copy_from_slice(&b[..n_eq]);

    let qp = QuadraticCost { h: h_mat, c };
    pdipm(
        &qp,
        &x0,
        xmin,
        xmax,
        Some(a_mat),
        &l,
        b,
        opts,
        lin_solver,
        1.0,
    )
}
