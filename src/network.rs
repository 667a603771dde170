use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum BusType {
    /// Fixed active and reactive power.
    PQ = 0,
    /// Fixed voltage magnitude and active power.
    PV = 1,
    /// Reference voltage angle. Slack active and reactive power.
    REF = 2,
    /// Isolated bus.
    NONE = 3,
}

/// Bus is a node in the power system graph structure.
/// Static loads and shunts are included in the Bus definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Bus {
    /// Bus number.
    pub i: usize,

    pub bus_type: BusType,

    /// Real power demand (MW).
    pub pd: f64,

    /// Reactive power demand (MVAr).
    pub qd: f64,

    /// Shunt conductance (MW at V = 1.0 p.u.).
    pub gs: f64,

    /// Shunt susceptance (MVAr at V = 1.0 p.u.).
    pub bs: f64,

    /// Base voltage (kV).
    pub base_kv: f64,

    /// Voltage magnitude (p.u.).
    pub vm: f64,

    /// Voltage angle (degrees). Used as the initial guess on input and
    /// overwritten with the solved angle.
    pub va: f64,

    /// Lagrange multiplier on real power mismatch (u/MW).
    pub p_lambda: f64,

    /// Lagrange multiplier on reactive power mismatch (u/MVAr).
    pub q_lambda: f64,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            i: 0,
            bus_type: BusType::PQ,
            pd: 0.0,
            qd: 0.0,
            gs: 0.0,
            bs: 0.0,
            base_kv: 0.0,
            vm: 1.0,
            va: 0.0,
            p_lambda: 0.0,
            q_lambda: 0.0,
        }
    }
}

/// Gen is a generator or dispatchable load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Gen {
    /// Bus number.
    pub bus: usize,

    /// Real power output (MW).
    pub pg: f64,

    /// Reactive power output (MVAr).
    pub qg: f64,

    /// Maximum real power output (MW).
    pub pmax: f64,

    /// Minimum real power output (MW).
    pub pmin: f64,

    /// Maximum reactive power output (MVAr).
    pub qmax: f64,

    /// Minimum reactive power output (MVAr).
    pub qmin: f64,

    /// In-service flag.
    pub status: bool,

    /// Kuhn-Tucker multiplier on upper Pg limit (u/MW).
    pub mu_pmax: f64,

    /// Kuhn-Tucker multiplier on lower Pg limit (u/MW).
    pub mu_pmin: f64,

    /// Kuhn-Tucker multiplier on upper Qg limit (u/MVAr).
    pub mu_qmax: f64,

    /// Kuhn-Tucker multiplier on lower Qg limit (u/MVAr).
    pub mu_qmin: f64,

    /// Real power cost function.
    pub cost: GenCost,
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            bus: 0,
            pg: 0.0,
            qg: 0.0,
            pmax: 0.0,
            pmin: 0.0,
            qmax: 0.0,
            qmin: 0.0,
            status: true,
            mu_pmax: 0.0,
            mu_pmin: 0.0,
            mu_qmax: 0.0,
            mu_qmin: 0.0,
            cost: GenCost::default(),
        }
    }
}

impl Gen {
    /// Checks for dispatchable loads.
    pub fn is_load(&self) -> bool {
        self.pmin < 0.0 && self.pmax == 0.0
    }

    /// Total cost of operating at `p` MW ($/hr).
    pub fn total_cost(&self, p: f64) -> f64 {
        self.cost.total_cost(p)
    }
}

/// GenCost defines a generator cost function with units of
/// $/hr and MW.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GenCost {
    /// f(p) = c2*p^2 + c1*p + c0
    Polynomial { c2: f64, c1: f64, c0: f64 },

    /// End/break-point coordinates (p0,f0), ..., (pn,fn) of a piecewise
    /// linear cost function, with p0 < p1 < ... < pn.
    PwLinear(Vec<(f64, f64)>),
}

impl Default for GenCost {
    fn default() -> Self {
        GenCost::Polynomial {
            c2: 0.0,
            c1: 0.0,
            c0: 0.0,
        }
    }
}

impl GenCost {
    pub fn total_cost(&self, p: f64) -> f64 {
        match self {
            GenCost::Polynomial { c2, c1, c0 } => c2 * p * p + c1 * p + c0,
            GenCost::PwLinear(points) => pwl_cost(points, p),
        }
    }
}

/// Evaluates a piecewise linear cost curve at `p`, extrapolating with the
/// end segments outside the breakpoint range.
fn pwl_cost(points: &[(f64, f64)], p: f64) -> f64 {
    match points {
        [] => 0.0,
        [(_, f0)] => *f0,
        _ => {
            let ns = points.len() - 1;
            let mut k = 0;
            while k < ns - 1 && p > points[k + 1].0 {
                k += 1;
            }
            let (x1, y1) = points[k];
            let (x2, y2) = points[k + 1];
            let m = (y2 - y1) / (x2 - x1);
            y1 + m * (p - x1)
        }
    }
}

/// Branch represents either a transmission line/cable or a two winding
/// transformer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    /// From bus number.
    pub from_bus: usize,

    /// To bus number.
    pub to_bus: usize,

    /// Resistance (p.u.).
    pub r: f64,

    /// Reactance (p.u.).
    pub x: f64,

    /// Total line charging susceptance (p.u.).
    pub b: f64,

    /// MVA rating A (long term rating). Zero for unlimited.
    pub rate_a: f64,

    /// MVA rating B (short term rating).
    pub rate_b: f64,

    /// MVA rating C (emergency rating).
    pub rate_c: f64,

    /// Transformer phase shift angle (degrees).
    pub shift: f64,

    /// In-service flag.
    pub status: bool,

    /// Real power injected at "from" bus end (MW).
    pub pf: f64,

    /// Reactive power injected at "from" bus end (MVAr).
    pub qf: f64,

    /// Real power injected at "to" bus end (MW).
    pub pt: f64,

    /// Reactive power injected at "to" bus end (MVAr).
    pub qt: f64,

    /// Kuhn-Tucker multiplier on MVA limit at "from" bus (u/MVA).
    pub mu_sf: f64,

    /// Kuhn-Tucker multiplier on MVA limit at "to" bus (u/MVA).
    pub mu_st: f64,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            from_bus: 0,
            to_bus: 0,
            r: 0.0,
            x: 0.0,
            b: 0.0,
            rate_a: 0.0,
            rate_b: 0.0,
            rate_c: 0.0,
            shift: 0.0,
            status: true,
            pf: 0.0,
            qf: 0.0,
            pt: 0.0,
            qt: 0.0,
            mu_sf: 0.0,
            mu_st: 0.0,
        }
    }
}

/// Network models a power system as a directed graph structure.
///
/// Generators and branches reference buses by number. Cross-references
/// are validated and indexed once at construction time.
#[derive(Clone, Debug)]
pub struct Network {
    /// System MVA base used for converting power into per-unit quantities.
    pub base_mva: f64,

    /// Power system nodes, including static loads and shunts.
    pub bus: Vec<Bus>,

    /// Generators and dispatchable loads.
    pub gen: Vec<Gen>,

    /// Transmission lines/cables and transformers.
    pub branch: Vec<Branch>,

    bus_index: HashMap<usize, usize>,
    bus_gens: Vec<Vec<usize>>,
}

impl Network {
    pub fn new(
        base_mva: f64,
        bus: Vec<Bus>,
        gen: Vec<Gen>,
        branch: Vec<Branch>,
    ) -> Result<Self, Error> {
        if bus.is_empty() {
            return Err(Error::NoBuses);
        }
        if bus.iter().filter(|b| b.bus_type == BusType::REF).count() > 1 {
            return Err(Error::MultipleReferenceBuses);
        }

        let bus_index: HashMap<usize, usize> =
            bus.iter().enumerate().map(|(p, b)| (b.i, p)).collect();

        let mut bus_gens = vec![Vec::new(); bus.len()];
        for (k, g) in gen.iter().enumerate() {
            match bus_index.get(&g.bus) {
                Some(&p) => bus_gens[p].push(k),
                None => {
                    return Err(Error::BusNotFound {
                        kind: "generator",
                        index: k,
                        bus: g.bus,
                    })
                }
            }
        }
        for (k, br) in branch.iter().enumerate() {
            for bn in [br.from_bus, br.to_bus] {
                if !bus_index.contains_key(&bn) {
                    return Err(Error::BusNotFound {
                        kind: "branch",
                        index: k,
                        bus: bn,
                    });
                }
            }
        }

        Ok(Self {
            base_mva,
            bus,
            gen,
            branch,
            bus_index,
            bus_gens,
        })
    }

    /// Position of the angle reference bus: the bus flagged REF, or the
    /// first bus if none is flagged.
    pub fn ref_bus(&self) -> usize {
        self.bus
            .iter()
            .position(|b| b.bus_type == BusType::REF)
            .unwrap_or(0)
    }

    /// Position of the bus with number `i`.
    pub fn bus_position(&self, i: usize) -> usize {
        self.bus_index[&i]
    }

    /// Generator positions attached to the bus at position `p`.
    pub fn gens_at_bus(&self, p: usize) -> &[usize] {
        &self.bus_gens[p]
    }

    /// Positions of in-service generators.
    pub fn online_gens(&self) -> Vec<usize> {
        self.gen
            .iter()
            .enumerate()
            .filter(|(_, g)| g.status)
            .map(|(k, _)| k)
            .collect()
    }

    /// Positions of in-service branches.
    pub fn online_branches(&self) -> Vec<usize> {
        self.branch
            .iter()
            .enumerate()
            .filter(|(_, b)| b.status)
            .map(|(k, _)| k)
            .collect()
    }

    /// Total fixed (non-dispatchable) real power demand (MW).
    pub fn fixed_load(&self) -> f64 {
        self.bus.iter().map(|b| b.pd).sum()
    }

    /// Total capacity of in-service dispatchable loads (MW), as a
    /// positive quantity.
    pub fn dispatchable_load_capacity(&self) -> f64 {
        self.gen
            .iter()
            .filter(|g| g.status && g.is_load())
            .map(|g| -g.pmin)
            .sum()
    }

    /// Snapshot of generator in-service flags.
    pub fn online_status(&self) -> Vec<bool> {
        self.gen.iter().map(|g| g.status).collect()
    }

    /// Restores generator in-service flags from a snapshot.
    pub fn set_online_status(&mut self, status: &[bool]) {
        debug_assert_eq!(status.len(), self.gen.len());
        for (g, &s) in self.gen.iter_mut().zip(status) {
            g.status = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(i: usize) -> Bus {
        Bus {
            i,
            ..Default::default()
        }
    }

    #[test]
    fn test_ref_bus_defaults_to_first() {
        let net = Network::new(100.0, vec![bus(3), bus(7)], vec![], vec![]).unwrap();
        assert_eq!(net.ref_bus(), 0);
    }

    #[test]
    fn test_multiple_ref_buses_rejected() {
        let mut b0 = bus(0);
        let mut b1 = bus(1);
        b0.bus_type = BusType::REF;
        b1.bus_type = BusType::REF;
        let err = Network::new(100.0, vec![b0, b1], vec![], vec![]).unwrap_err();
        assert_eq!(err, Error::MultipleReferenceBuses);
    }

    #[test]
    fn test_empty_case_rejected() {
        let err = Network::new(100.0, vec![], vec![], vec![]).unwrap_err();
        assert_eq!(err, Error::NoBuses);
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let gen = Gen {
            bus: 9,
            ..Default::default()
        };
        let err = Network::new(100.0, vec![bus(0)], vec![gen], vec![]).unwrap_err();
        assert_eq!(
            err,
            Error::BusNotFound {
                kind: "generator",
                index: 0,
                bus: 9
            }
        );

        let br = Branch {
            from_bus: 0,
            to_bus: 5,
            ..Default::default()
        };
        let err = Network::new(100.0, vec![bus(0)], vec![], vec![br]).unwrap_err();
        assert_eq!(
            err,
            Error::BusNotFound {
                kind: "branch",
                index: 0,
                bus: 5
            }
        );
    }

    #[test]
    fn test_bus_gen_index() {
        let gens = vec![
            Gen {
                bus: 1,
                ..Default::default()
            },
            Gen {
                bus: 0,
                ..Default::default()
            },
            Gen {
                bus: 1,
                ..Default::default()
            },
        ];
        let net = Network::new(100.0, vec![bus(0), bus(1)], gens, vec![]).unwrap();
        assert_eq!(net.gens_at_bus(0), &[1]);
        assert_eq!(net.gens_at_bus(1), &[0, 2]);
    }

    #[test]
    fn test_pwl_cost() {
        let cost = GenCost::PwLinear(vec![(0.0, 0.0), (50.0, 500.0), (100.0, 1500.0)]);
        assert_eq!(cost.total_cost(25.0), 250.0);
        assert_eq!(cost.total_cost(50.0), 500.0);
        assert_eq!(cost.total_cost(75.0), 1000.0);
        // end segment extrapolation
        assert_eq!(cost.total_cost(110.0), 1700.0);
    }

    #[test]
    fn test_dispatchable_load() {
        let vload = Gen {
            pmin: -30.0,
            pmax: 0.0,
            ..Default::default()
        };
        assert!(vload.is_load());
        let net = Network::new(100.0, vec![bus(0)], vec![vload], vec![]).unwrap();
        assert_eq!(net.dispatchable_load_capacity(), 30.0);
    }
}
