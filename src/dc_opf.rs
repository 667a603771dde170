//! DC optimal power flow.
//!
//! Minimizes polynomial generation cost subject to the linearized power
//! balance, the reference bus angle, generator capacity bounds and
//! optionally branch flow limits. The problem is a quadratic program
//! in the variables [bus angles (rad); generator outputs (p.u.)] solved
//! by the interior point method.

use crate::debug::format_f64_vec;
use crate::error::Error;
use crate::linsolve::LinearSolver;
use crate::network::{BusType, GenCost, Network};
use crate::opt::SolverOpts;
use crate::pdipm::{qps, PdipmOutput};
use crate::sparse::{from_triplets, from_triplets_csr, spmv};
use crate::susceptance::make_b_dc;
use log::debug;
use std::f64::consts::PI;

/// Outcome of a DC-OPF solve. Result fields on the network are only
/// written when `success` is true.
#[derive(Clone, Copy, Debug)]
pub struct DcOpfReport {
    pub success: bool,

    /// Objective value ($/hr), excluding constant cost terms.
    pub f: f64,

    pub output: PdipmOutput,
}

/// Solves a DC optimal power flow, writing angles, dispatch, flows and
/// shadow prices back to the network on success.
pub fn run_dc_opf(
    net: &mut Network,
    opts: &SolverOpts,
    lin_solver: &dyn LinearSolver,
) -> Result<DcOpfReport, Error> {
    let base_mva = net.base_mva;
    let nb = net.bus.len();
    let gens = net.online_gens();
    let ng = gens.len();
    let nx = nb + ng;

    check_cost_models(net, &gens)?;

    let (b_bus, b_src, pbusinj, pfinj) = make_b_dc(net);

    let ref_idx = net.ref_bus();
    let va_ref = net.bus[ref_idx].va * PI / 180.0;

    // Buses not reached by any in-service branch have an empty Bbus row
    // and a free angle. Their angles are pinned to the guess so the
    // system stays non-singular. Type NONE buses count as disconnected
    // regardless of topology.
    let mut connected = vec![false; nb];
    for br in net.branch.iter().filter(|b| b.status) {
        connected[net.bus_position(br.from_bus)] = true;
        connected[net.bus_position(br.to_bus)] = true;
    }
    for (i, bus) in net.bus.iter().enumerate() {
        if bus.bus_type == BusType::NONE {
            connected[i] = false;
        }
    }
    connected[ref_idx] = true;

    let mut has_gen = vec![false; nb];
    for &gi in &gens {
        has_gen[net.bus_position(net.gen[gi].bus)] = true;
    }

    // Equality block: reference angle row then one power balance row
    // per bus (B*Va - Cg*Pg = -(Pd + Gs)/base - Pbusinj). A
    // disconnected bus without generation has an all-zero balance row;
    // it is reused as the angle pin and any demand there is unservable
    // and dropped.
    let mut a_trip: Vec<(usize, usize, f64)> = Vec::new();
    let mut b_vec: Vec<f64> = Vec::new();

    a_trip.push((0, ref_idx, 1.0));
    b_vec.push(va_ref);

    for (val, (r, c)) in b_bus.iter() {
        a_trip.push((1 + r, c, *val));
    }
    for (k, &gi) in gens.iter().enumerate() {
        let p = net.bus_position(net.gen[gi].bus);
        a_trip.push((1 + p, nb + k, -1.0));
    }
    for (i, bus) in net.bus.iter().enumerate() {
        if !connected[i] && !has_gen[i] {
            a_trip.push((1 + i, i, 1.0));
            b_vec.push(bus.va * PI / 180.0);
        } else {
            b_vec.push(-(bus.pd + bus.gs) / base_mva - pbusinj[i]);
        }
    }
    // Disconnected buses with local generation keep their balance row
    // and get a separate angle pin.
    let mut n_eq = 1 + nb;
    for (i, bus) in net.bus.iter().enumerate() {
        if !connected[i] && has_gen[i] {
            a_trip.push((n_eq, i, 1.0));
            b_vec.push(bus.va * PI / 180.0);
            n_eq += 1;
        }
    }

    // Generator capacity bounds as two one-sided rows per generator.
    for (k, &gi) in gens.iter().enumerate() {
        a_trip.push((n_eq + k, nb + k, -1.0));
        b_vec.push(-net.gen[gi].pmin / base_mva);
    }
    for (k, &gi) in gens.iter().enumerate() {
        a_trip.push((n_eq + ng + k, nb + k, 1.0));
        b_vec.push(net.gen[gi].pmax / base_mva);
    }

    // Branch flow limits from Bsrc, one row per direction.
    let mut flow_rows: Vec<(usize, usize)> = Vec::new();
    if opts.flow_limits {
        let mut row = n_eq + 2 * ng;
        for (j, br) in net.branch.iter().enumerate() {
            if !br.status || br.rate_a <= 0.0 {
                continue;
            }
            let b_row = b_src.outer_view(j).expect("branch row");
            for (c, &v) in b_row.iter() {
                a_trip.push((row, c, v));
                a_trip.push((row + 1, c, -v));
            }
            b_vec.push(br.rate_a / base_mva - pfinj[j]);
            b_vec.push(br.rate_a / base_mva + pfinj[j]);
            flow_rows.push((j, row));
            row += 2;
        }
    }

    let n_rows = b_vec.len();
    let a_mat = from_triplets_csr(n_rows, nx, a_trip);

    // Objective 0.5*x'Hx + c'x over the generator block, in p.u.
    let mut h_trip: Vec<(usize, usize, f64)> = Vec::new();
    let mut c = vec![0.0; nx];
    for (k, &gi) in gens.iter().enumerate() {
        if let GenCost::Polynomial { c2, c1, .. } = net.gen[gi].cost {
            h_trip.push((nb + k, nb + k, 2.0 * c2 * base_mva * base_mva));
            c[nb + k] = c1 * base_mva;
        }
    }
    let h_mat = from_triplets(nx, nx, h_trip);

    let mut x0 = vec![0.0; nx];
    for (i, bus) in net.bus.iter().enumerate() {
        x0[i] = bus.va * PI / 180.0;
    }
    for (k, &gi) in gens.iter().enumerate() {
        x0[nb + k] = net.gen[gi].pg / base_mva;
    }

    debug!("DC OPF constraint rhs: {}", format_f64_vec(&b_vec));
    debug!("DC OPF initial point: {}", format_f64_vec(&x0));

    let sol = qps(
        Some(&h_mat),
        &c,
        &a_mat,
        &b_vec,
        n_eq,
        None,
        None,
        Some(&x0),
        opts,
        lin_solver,
    );

    if sol.converged {
        let theta = &sol.x[..nb];
        let lam = &sol.lambda;

        for (i, bus) in net.bus.iter_mut().enumerate() {
            bus.vm = 1.0;
            if i == ref_idx {
                // the reference angle is pinned to its guess
                bus.va = va_ref * 180.0 / PI;
            } else if connected[i] {
                bus.va = theta[i] * 180.0 / PI;
            }
            // pinned buses keep their angle guess; a reused balance row
            // carries no price
            bus.p_lambda = if connected[i] || has_gen[i] {
                lam.lam_lin[1 + i] / base_mva
            } else {
                0.0
            };
            bus.q_lambda = 0.0;
        }

        for (k, &gi) in gens.iter().enumerate() {
            let g = &mut net.gen[gi];
            g.pg = sol.x[nb + k] * base_mva;
            g.qg = 0.0;
            g.mu_pmin = lam.mu_u[n_eq + k] / base_mva;
            g.mu_pmax = lam.mu_u[n_eq + ng + k] / base_mva;
            g.mu_qmin = 0.0;
            g.mu_qmax = 0.0;
        }

        let p_src = spmv(&b_src, theta);
        for (j, br) in net.branch.iter_mut().enumerate() {
            br.pf = p_src[j] * base_mva;
            br.pt = -br.pf;
            br.qf = 0.0;
            br.qt = 0.0;
            br.mu_sf = 0.0;
            br.mu_st = 0.0;
        }
        for &(j, row) in &flow_rows {
            net.branch[j].mu_sf = lam.mu_u[row] / base_mva;
            net.branch[j].mu_st = lam.mu_u[row + 1] / base_mva;
        }

        // zero out-of-service entities
        for g in net.gen.iter_mut().filter(|g| !g.status) {
            g.pg = 0.0;
            g.qg = 0.0;
            g.mu_pmin = 0.0;
            g.mu_pmax = 0.0;
            g.mu_qmin = 0.0;
            g.mu_qmax = 0.0;
        }
        for br in net.branch.iter_mut().filter(|b| !b.status) {
            br.pf = 0.0;
            br.pt = 0.0;
            br.mu_sf = 0.0;
            br.mu_st = 0.0;
        }
    }

    Ok(DcOpfReport {
        success: sol.converged,
        f: sol.f,
        output: sol.output,
    })
}

/// Rejects unsupported cost model combinations. Converting between
/// polynomial and piecewise linear models is not implemented, nor is
/// the piecewise linear objective itself.
fn check_cost_models(net: &Network, gens: &[usize]) -> Result<(), Error> {
    let any_poly = gens
        .iter()
        .any(|&gi| matches!(net.gen[gi].cost, GenCost::Polynomial { .. }));
    let any_pwl = gens
        .iter()
        .any(|&gi| matches!(net.gen[gi].cost, GenCost::PwLinear(_)));
    if any_poly && any_pwl {
        return Err(Error::MixedCostModels);
    }
    if any_pwl {
        return Err(Error::PwlCostUnimplemented);
    }
    Ok(())
}

/// Builds the cost epigraph rows for piecewise linear generators: one
/// row `m*base*Pg - C <= -c` per segment, in the extended variables
/// [theta; Pg; C]. Returns the coefficient triplets and the rhs.
#[allow(dead_code)]
fn cost_constraints(
    pwl_points: &[&[(f64, f64)]],
    nb: usize,
    base_mva: f64,
) -> (Vec<(usize, usize, f64)>, Vec<f64>) {
    let ng = pwl_points.len();
    let mut trip = Vec::new();
    let mut rhs = Vec::new();
    let mut row = 0;
    for (g, points) in pwl_points.iter().enumerate() {
        for pair in points.windows(2) {
            let (x1, y1) = pair[0];
            let (x2, y2) = pair[1];
            let m = (y2 - y1) / (x2 - x1);
            let c = y1 - m * x1;
            trip.push((row, nb + g, m * base_mva));
            trip.push((row, nb + ng + g, -1.0));
            rhs.push(-c);
            row += 1;
        }
    }
    (trip, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linsolve::DenseLu;
    use crate::network::Network;
    use crate::tests::{branch, bus, gen, ref_bus, two_bus_case};

    fn solve(net: &mut Network) -> DcOpfReport {
        run_dc_opf(net, &SolverOpts::default(), &DenseLu::default()).unwrap()
    }

    #[test]
    fn test_two_bus_dispatch() {
        let mut net = two_bus_case();
        let report = solve(&mut net);

        assert!(report.success);
        assert!((report.f - 500.0).abs() < 0.01, "f = {}", report.f);
        assert!((net.gen[0].pg - 50.0).abs() < 0.01);
        assert!((net.branch[0].pf - 50.0).abs() < 0.01);
        assert!((net.branch[0].pt + 50.0).abs() < 0.01);
        assert_eq!(net.bus[0].va, 0.0);
        assert_eq!(net.bus[0].vm, 1.0);
        // marginal price is the linear cost coefficient at every bus
        assert!((net.bus[0].p_lambda - 10.0).abs() < 0.01);
        assert!((net.bus[1].p_lambda - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_power_balance_and_bounds() {
        let buses = vec![ref_bus(0), bus(1, 80.0), bus(2, 40.0)];
        let gens = vec![
            gen(0, 0.0, 100.0, 0.0, 10.0),
            gen(1, 0.0, 100.0, 0.02, 30.0),
        ];
        let branches = vec![branch(0, 1, 0.1), branch(1, 2, 0.1), branch(0, 2, 0.2)];
        let mut net = Network::new(100.0, buses, gens, branches).unwrap();
        let report = solve(&mut net);
        assert!(report.success);

        let dispatch: f64 = net.gen.iter().map(|g| g.pg).sum();
        let demand: f64 = net.bus.iter().map(|b| b.pd).sum();
        assert!((dispatch - demand).abs() < 1e-3);

        for g in &net.gen {
            assert!(g.pg >= g.pmin - 1e-3 && g.pg <= g.pmax + 1e-3);
        }
        assert_eq!(net.bus[0].va, 0.0);
    }

    #[test]
    fn test_flow_limit_binding() {
        let buses = vec![ref_bus(0), bus(1, 50.0)];
        let gens = vec![
            gen(0, 0.0, 100.0, 0.0, 10.0),
            gen(1, 0.0, 100.0, 0.0, 50.0),
        ];
        let mut line = branch(0, 1, 0.1);
        line.rate_a = 30.0;
        let mut net = Network::new(100.0, buses, gens, vec![line]).unwrap();

        let opts = SolverOpts {
            flow_limits: true,
            ..Default::default()
        };
        let report = run_dc_opf(&mut net, &opts, &DenseLu::default()).unwrap();
        assert!(report.success);

        assert!((net.gen[0].pg - 30.0).abs() < 0.01);
        assert!((net.gen[1].pg - 20.0).abs() < 0.01);
        assert!((net.branch[0].pf - 30.0).abs() < 0.01);
        assert!(net.branch[0].mu_sf > 1.0);
        assert!(net.branch[0].mu_st.abs() < 1e-4);
    }

    #[test]
    fn test_disconnected_bus_angle_pinned() {
        // a zero-demand bus reached only by an out-of-service branch
        // must not make the system singular
        let buses = vec![ref_bus(0), bus(1, 50.0), bus(2, 0.0)];
        let gens = vec![gen(0, 0.0, 100.0, 0.0, 10.0)];
        let mut dead = branch(1, 2, 0.1);
        dead.status = false;
        let branches = vec![branch(0, 1, 0.1), dead];
        let mut net = Network::new(100.0, buses, gens, branches).unwrap();
        net.bus[2].va = 7.0;

        let report = solve(&mut net);
        assert!(report.success);
        assert!((report.f - 500.0).abs() < 0.01);
        assert_eq!(net.bus[2].va, 7.0);
        assert_eq!(net.bus[2].p_lambda, 0.0);
        assert!((net.bus[1].p_lambda - 10.0).abs() < 0.01);
        assert_eq!(net.branch[1].pf, 0.0);
    }

    #[test]
    fn test_islanded_generation_serves_local_demand() {
        let buses = vec![ref_bus(0), bus(1, 50.0), bus(2, 20.0)];
        let gens = vec![
            gen(0, 0.0, 100.0, 0.0, 10.0),
            gen(2, 0.0, 100.0, 0.0, 5.0),
        ];
        let mut net = Network::new(100.0, buses, gens, vec![branch(0, 1, 0.1)]).unwrap();

        let report = solve(&mut net);
        assert!(report.success);
        assert!((net.gen[1].pg - 20.0).abs() < 0.01);
        assert!((report.f - 600.0).abs() < 0.01);
        // the island clears at its own marginal cost
        assert!((net.bus[2].p_lambda - 5.0).abs() < 0.01);
        assert!((net.bus[1].p_lambda - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_offline_gen_zeroed() {
        let buses = vec![ref_bus(0), bus(1, 50.0)];
        let mut expensive = gen(1, 0.0, 100.0, 0.0, 50.0);
        expensive.status = false;
        expensive.pg = 42.0;
        let gens = vec![gen(0, 0.0, 100.0, 0.0, 10.0), expensive];
        let mut net = Network::new(100.0, buses, gens, vec![branch(0, 1, 0.1)]).unwrap();
        let report = solve(&mut net);
        assert!(report.success);

        assert!((net.gen[0].pg - 50.0).abs() < 0.01);
        assert_eq!(net.gen[1].pg, 0.0);
        assert_eq!(net.gen[1].mu_pmin, 0.0);
        assert_eq!(net.gen[1].mu_pmax, 0.0);
    }

    #[test]
    fn test_binding_bound_multiplier() {
        // demand exceeds the cheap unit, the expensive one covers the
        // remainder and the cheap one's upper bound binds
        let buses = vec![ref_bus(0), bus(1, 50.0)];
        let gens = vec![
            gen(0, 0.0, 30.0, 0.0, 10.0),
            gen(1, 0.0, 100.0, 0.0, 50.0),
        ];
        let mut net = Network::new(100.0, buses, gens, vec![branch(0, 1, 0.1)]).unwrap();
        let report = solve(&mut net);
        assert!(report.success);

        assert!((net.gen[0].pg - 30.0).abs() < 0.01);
        assert!((net.gen[1].pg - 20.0).abs() < 0.01);
        // relaxing pmax of the cheap unit saves the cost difference
        assert!((net.gen[0].mu_pmax - 40.0).abs() < 0.1);
        assert!(net.gen[0].mu_pmin.abs() < 1e-4);
    }

    #[test]
    fn test_mixed_cost_models_rejected() {
        let buses = vec![ref_bus(0)];
        let mut pwl = gen(0, 0.0, 100.0, 0.0, 0.0);
        pwl.cost = crate::network::GenCost::PwLinear(vec![(0.0, 0.0), (100.0, 1000.0)]);
        let gens = vec![gen(0, 0.0, 100.0, 0.0, 10.0), pwl];
        let mut net = Network::new(100.0, buses, gens, vec![]).unwrap();
        let err = solve_err(&mut net);
        assert_eq!(err, Error::MixedCostModels);
    }

    #[test]
    fn test_pwl_objective_unimplemented() {
        let buses = vec![ref_bus(0)];
        let mut pwl = gen(0, 0.0, 100.0, 0.0, 0.0);
        pwl.cost = crate::network::GenCost::PwLinear(vec![(0.0, 0.0), (100.0, 1000.0)]);
        let mut net = Network::new(100.0, buses, vec![pwl], vec![]).unwrap();
        let err = solve_err(&mut net);
        assert_eq!(err, Error::PwlCostUnimplemented);
    }

    fn solve_err(net: &mut Network) -> Error {
        run_dc_opf(net, &SolverOpts::default(), &DenseLu::default()).unwrap_err()
    }

    #[test]
    fn test_cost_constraint_rows() {
        let points: &[(f64, f64)] = &[(0.0, 0.0), (50.0, 500.0), (100.0, 1500.0)];
        let (trip, rhs) = cost_constraints(&[points], 2, 100.0);

        // segment slopes 10 and 20 $/MWh scaled to p.u., cost variable
        // coefficient -1
        assert_eq!(rhs, vec![0.0, 500.0]);
        assert_eq!(trip[0], (0, 2, 1000.0));
        assert_eq!(trip[1], (0, 3, -1.0));
        assert_eq!(trip[2], (1, 2, 2000.0));
        assert_eq!(trip[3], (1, 3, -1.0));
    }
}
