use crate::network::{Branch, Bus, Gen, Network};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk representation of a case: the raw entity tables plus the
/// system MVA base.
#[derive(Serialize, Deserialize)]
pub struct Case {
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,

    pub bus: Vec<Bus>,

    #[serde(default)]
    pub gen: Vec<Gen>,

    #[serde(default)]
    pub branch: Vec<Branch>,
}

fn default_base_mva() -> f64 {
    100.0
}

/// Reads a JSON case file and assembles the validated network model.
pub fn load_case(case_path: &Path) -> Result<Network> {
    let contents = fs::read_to_string(case_path)?;
    let case: Case = serde_json::from_str(&contents)?;
    let net = Network::new(case.base_mva, case.bus, case.gen, case.branch)?;
    Ok(net)
}
