mod dc_opf;
mod error;
mod linsolve;
mod loadcase;
mod math;
mod network;
mod opt;
mod pdipm;
mod sparse;
mod susceptance;
mod ud_opf;

pub mod debug;

pub use dc_opf::*;
pub use error::*;
pub use linsolve::*;
pub use loadcase::*;
pub use network::*;
pub use opt::*;
pub use pdipm::*;
pub use susceptance::*;
pub use ud_opf::*;

#[cfg(test)]
mod tests;
