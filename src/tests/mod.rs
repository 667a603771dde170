//! Case builders shared by the unit tests.

use crate::network::{Branch, Bus, BusType, Gen, GenCost, Network};

pub(crate) fn ref_bus(i: usize) -> Bus {
    Bus {
        i,
        bus_type: BusType::REF,
        ..Default::default()
    }
}

pub(crate) fn bus(i: usize, pd: f64) -> Bus {
    Bus {
        i,
        pd,
        ..Default::default()
    }
}

pub(crate) fn gen(bus: usize, pmin: f64, pmax: f64, c2: f64, c1: f64) -> Gen {
    Gen {
        bus,
        pmin,
        pmax,
        cost: GenCost::Polynomial { c2, c1, c0: 0.0 },
        ..Default::default()
    }
}

pub(crate) fn branch(from_bus: usize, to_bus: usize, x: f64) -> Branch {
    Branch {
        from_bus,
        to_bus,
        x,
        ..Default::default()
    }
}

/// Two buses joined by one line (x = 0.1 p.u., 100 MVA rating), 50 MW
/// of demand at the second bus and a 100 MW unit with linear cost
/// 10 $/MWh at the reference.
pub(crate) fn two_bus_case() -> Network {
    let buses = vec![ref_bus(0), bus(1, 50.0)];
    let gens = vec![gen(0, 0.0, 100.0, 0.0, 10.0)];
    let mut line = branch(0, 1, 0.1);
    line.rate_a = 100.0;
    Network::new(100.0, buses, gens, vec![line]).unwrap()
}
