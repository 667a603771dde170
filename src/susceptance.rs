use crate::network::{Branch, Network};
use sprs::{CsMat, TriMat};
use std::f64::consts::PI;

/// Reactance substituted for branches with x = 0 to keep the series
/// susceptance finite.
const X_SUBST: f64 = 1e12;

/// Builds the B matrices and phase shift injections for the DC
/// approximation.
///
/// The bus real power injections are related to bus voltage angles by
///     P = Bbus * Va + Pbusinj
/// The real power flows at the from end of the lines are related to the
/// bus voltage angles by
///     Pf = Bsrc * Va + Pfinj
/// Out-of-service branches contribute zero susceptance. Angles are in
/// radians and powers in p.u.
pub fn make_b_dc(net: &Network) -> (CsMat<f64>, CsMat<f64>, Vec<f64>, Vec<f64>) {
    let (nl, nb) = (net.branch.len(), net.bus.len());

    fn br_b(br: &Branch) -> f64 {
        if !br.status {
            return 0.0;
        }
        let x = if br.x != 0.0 { br.x } else { X_SUBST };
        1.0 / x
    }

    // Bsrc such that Bsrc * Va is the vector of real branch powers
    // injected at each branch's "from" bus.
    let mut b_src = TriMat::new((nl, nb));
    let mut b_bus = TriMat::new((nb, nb));
    let mut pfinj = vec![0.0; nl];
    let mut pbusinj = vec![0.0; nb];

    for (i, br) in net.branch.iter().enumerate() {
        let b = br_b(br);
        let (f, t) = (net.bus_position(br.from_bus), net.bus_position(br.to_bus));

        b_src.add_triplet(i, f, b);
        b_src.add_triplet(i, t, -b);

        b_bus.add_triplet(f, f, b);
        b_bus.add_triplet(f, t, -b);
        b_bus.add_triplet(t, f, -b);
        b_bus.add_triplet(t, t, b);

        // Phase shift injected at the from bus and extracted at the to bus.
        let inj = b * (-br.shift * PI / 180.0);
        pfinj[i] = inj;
        pbusinj[f] += inj;
        pbusinj[t] -= inj;
    }

    (b_bus.to_csr(), b_src.to_csr(), pbusinj, pfinj)
}
