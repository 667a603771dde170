//! Combined unit decommitment and optimal power flow for a single time
//! period, using an algorithm similar to dynamic programming. It
//! proceeds through a sequence of stages, where stage N has N
//! generators shut down, starting with N=0. In each stage it forms a
//! list of candidates (generators at their Pmin limits) and computes
//! the cost with each one of them shut down, selecting the least cost
//! configuration as the starting point for the next stage. It stops
//! when there are no more candidates or no more improvement can be
//! gained by shutting something down.

use crate::dc_opf::run_dc_opf;
use crate::error::Error;
use crate::linsolve::LinearSolver;
use crate::network::Network;
use crate::opt::SolverOpts;
use rand::seq::SliceRandom;
use rand::thread_rng;

use log::{debug, info};

/// Outcome of the decommitment procedure.
#[derive(Clone, Copy, Debug)]
pub struct UdOpfReport {
    pub success: bool,

    /// Total system cost of the best configuration ($/hr).
    pub f: f64,

    /// Number of decommitment stages used.
    pub stages: usize,
}

/// Solves the combined unit decommitment / optimal power flow problem.
///
/// Candidate trials within a stage are independent: each one restores
/// the stage's online snapshot, shuts down a single generator and
/// re-solves. Only the winning configuration is committed.
pub fn run_ud_opf(
    net: &mut Network,
    opts: &SolverOpts,
    lin_solver: &dyn LinearSolver,
) -> Result<UdOpfReport, Error> {
    let mut i_stage = 0;

    // Check for sum(pmin) > total load capacity, decommit as necessary
    // before attempting any OPF.
    let load_capacity = net.fixed_load() + net.dispatchable_load_capacity();
    loop {
        let online: Vec<usize> = net
            .online_gens()
            .into_iter()
            .filter(|&k| !net.gen[k].is_load())
            .collect();
        let pmin_total: f64 = online.iter().map(|&k| net.gen[k].pmin).sum();
        if pmin_total <= load_capacity {
            break;
        }

        i_stage += 1;
        debug!("Entered decommitment stage {}.", i_stage);

        // Shut down the unit with the highest average cost at Pmin.
        // Units with pmin <= 0 cannot reduce the excess.
        let avg_pmin_cost: Vec<f64> = online
            .iter()
            .map(|&k| {
                let g = &net.gen[k];
                if g.pmin > 0.0 {
                    g.total_cost(g.pmin) / g.pmin
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect();
        let Some((idx, value)) = fair_max(&avg_pmin_cost) else {
            break;
        };
        if value == f64::NEG_INFINITY {
            break;
        }

        info!(
            "Shutting down generator {} to satisfy all pmin limits.",
            online[idx]
        );
        net.gen[online[idx]].status = false;
    }

    // Solve a normal OPF and save the solution as the current best.
    let baseline = run_dc_opf(net, opts, lin_solver)?;
    if !baseline.success {
        info!("Non-convergent baseline OPF.");
        return Ok(UdOpfReport {
            success: false,
            f: baseline.f,
            stages: i_stage,
        });
    }

    let mut overall_online = net.online_status();
    let mut overall_cost = baseline.f;

    // Shut down at most one generator per stage.
    loop {
        // Candidates have a binding lower output bound. Multipliers are
        // often very small so round to four decimal places.
        let candidates: Vec<usize> = net
            .online_gens()
            .into_iter()
            .filter(|&k| {
                let g = &net.gen[k];
                (g.mu_pmin * 1e4).round() / 1e4 > 0.0 && g.pmin > 0.0
            })
            .collect();
        if candidates.is_empty() {
            break;
        }

        i_stage += 1;
        debug!("Entered decommitment stage {}.", i_stage);

        let stage_online = net.online_status();
        let stage_cost = overall_cost;

        for &candidate in &candidates {
            // Each trial starts from the stage best with only this
            // candidate shut down.
            net.set_online_status(&stage_online);
            net.gen[candidate].status = false;

            info!("Attempting OPF with generator {} shut down.", candidate);
            let trial = run_dc_opf(net, opts, lin_solver)?;

            if trial.success && trial.f < overall_cost {
                overall_online = net.online_status();
                overall_cost = trial.f;
            }
        }

        if overall_cost >= stage_cost {
            // Decommits at this stage did not help.
            break;
        }

        // Commit the winning configuration and refresh its result
        // fields so the next stage's candidates come from the winner,
        // not from whichever trial ran last.
        net.set_online_status(&overall_online);
        let refreshed = run_dc_opf(net, opts, lin_solver)?;
        if !refreshed.success {
            break;
        }
    }

    // Use the best overall configuration as the final solution.
    net.set_online_status(&overall_online);
    let fin = run_dc_opf(net, opts, lin_solver)?;

    info!(
        "Unit decommitment OPF used {} decommitment stage{}.",
        i_stage,
        if i_stage == 1 { "" } else { "s" }
    );

    Ok(UdOpfReport {
        success: fin.success,
        f: fin.f,
        stages: i_stage,
    })
}

/// Returns the index and value of the maximum element of `x`. Where the
/// maximum occurs at more than one position the index is chosen
/// uniformly at random among them.
pub fn fair_max(x: &[f64]) -> Option<(usize, f64)> {
    let value = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let maxima: Vec<usize> = x
        .iter()
        .enumerate()
        .filter(|(_, &v)| v == value)
        .map(|(i, _)| i)
        .collect();
    let idx = *maxima.choose(&mut thread_rng())?;
    Some((idx, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linsolve::DenseLu;
    use crate::tests::{branch, bus, gen, ref_bus};
    use std::collections::HashSet;

    #[test]
    fn test_fair_max_uniform_ties() {
        let x = [1.0, 3.0, 2.0, 3.0, 3.0];
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let (idx, value) = fair_max(&x).unwrap();
            assert_eq!(value, 3.0);
            assert!([1, 3, 4].contains(&idx));
            seen.insert(idx);
        }
        // all tied maxima observed over many trials
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_fair_max_empty() {
        assert!(fair_max(&[]).is_none());
    }

    #[test]
    fn test_decommits_expensive_unit() {
        // the expensive unit is pinned at pmin and shutting it down is
        // cheaper overall
        let buses = vec![ref_bus(0), bus(1, 100.0)];
        let cheap = gen(0, 0.0, 200.0, 0.0, 10.0);
        let costly = gen(1, 20.0, 100.0, 0.0, 50.0);
        let branches = vec![branch(0, 1, 0.1)];
        let mut net =
            crate::network::Network::new(100.0, buses, vec![cheap, costly], branches).unwrap();

        let opts = SolverOpts::default();
        let report = run_ud_opf(&mut net, &opts, &DenseLu::default()).unwrap();

        assert!(report.success);
        assert!(!net.gen[1].status);
        assert!((net.gen[0].pg - 100.0).abs() < 0.01);
        // all-online cost: 80*10 + 20*50 = 1800; decommitted: 1000
        assert!((report.f - 1000.0).abs() < 0.1, "f = {}", report.f);
        assert!(report.stages >= 1);
    }

    #[test]
    fn test_keeps_needed_unit() {
        // both units are required to cover demand, none decommitted
        let buses = vec![ref_bus(0), bus(1, 150.0)];
        let gens = vec![
            gen(0, 0.0, 100.0, 0.0, 10.0),
            gen(1, 0.0, 100.0, 0.0, 50.0),
        ];
        let mut net =
            crate::network::Network::new(100.0, buses, gens, vec![branch(0, 1, 0.1)]).unwrap();

        let report = run_ud_opf(&mut net, &SolverOpts::default(), &DenseLu::default()).unwrap();
        assert!(report.success);
        assert!(net.gen[0].status && net.gen[1].status);
        let dispatch: f64 = net.gen.iter().map(|g| g.pg).sum();
        assert!((dispatch - 150.0).abs() < 1e-2);
    }

    #[test]
    fn test_prepass_shuts_down_excess_pmin() {
        // total pmin of 160 MW exceeds the 50 MW load, the pre-pass
        // must shut the expensive unit down before any solve
        let buses = vec![ref_bus(0), bus(1, 50.0)];
        let mut cheap = gen(0, 0.0, 100.0, 0.0, 10.0);
        cheap.pmin = 40.0;
        let mut costly = gen(1, 0.0, 150.0, 0.0, 80.0);
        costly.pmin = 120.0;
        let branches = vec![branch(0, 1, 0.1)];
        let mut net =
            crate::network::Network::new(100.0, buses, vec![cheap, costly], branches).unwrap();

        let report = run_ud_opf(&mut net, &SolverOpts::default(), &DenseLu::default()).unwrap();
        assert!(report.success);
        assert!(net.gen[0].status);
        assert!(!net.gen[1].status);
        assert!((net.gen[0].pg - 50.0).abs() < 0.01);
        assert!(report.stages >= 1);
    }

    #[test]
    fn test_cost_non_increasing() {
        let buses = vec![ref_bus(0), bus(1, 100.0)];
        let cheap = gen(0, 0.0, 200.0, 0.0, 10.0);
        let costly = gen(1, 20.0, 100.0, 0.0, 50.0);
        let branches = vec![branch(0, 1, 0.1)];
        let mut net =
            crate::network::Network::new(100.0, buses, vec![cheap, costly], branches).unwrap();

        let all_online = run_dc_opf(&mut net, &SolverOpts::default(), &DenseLu::default())
            .unwrap()
            .f;

        let report = run_ud_opf(&mut net, &SolverOpts::default(), &DenseLu::default()).unwrap();
        assert!(report.success);
        assert!(report.f <= all_online + 1e-6);
    }
}
