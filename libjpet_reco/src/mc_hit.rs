use serde::{Deserialize, Serialize};

use super::constants::{MEV_TO_KEV, MM_TO_CM, SECONDS_TO_PICOSECONDS};

/// One simulated energy deposition, already converted to ps, keV and cm
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMcInteraction {
    pub event_id: u64,
    pub sim_time: f64,
    pub energy: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub module_id: i32,
    pub sector_id: i32,
    pub crystal_id: i32,
}

impl RawMcInteraction {
    /// Build an interaction from GATE native units (s, MeV, mm)
    #[allow(clippy::too_many_arguments)]
    pub fn from_gate_units(
        event_id: u64,
        time_s: f64,
        energy_mev: f64,
        x_mm: f64,
        y_mm: f64,
        z_mm: f64,
        module_id: i32,
        sector_id: i32,
        crystal_id: i32,
    ) -> Self {
        Self {
            event_id,
            sim_time: time_s * SECONDS_TO_PICOSECONDS,
            energy: energy_mev * MEV_TO_KEV,
            x: x_mm * MM_TO_CM,
            y: y_mm * MM_TO_CM,
            z: z_mm * MM_TO_CM,
            module_id,
            sector_id,
            crystal_id,
        }
    }
}

/// A simulated interaction placed on the real detector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetectorHit {
    pub scin_id: i32,
    /// ps, relative to the enclosing time window
    pub time: f64,
    /// keV
    pub energy: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A RawDetectorHit after resolution smearing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconstructedHit {
    pub scin_id: i32,
    pub time: f64,
    pub energy: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The raw hit and, if it passed the energy threshold, its reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McHitPair {
    pub raw: RawDetectorHit,
    pub reco: Option<ReconstructedHit>,
}

/// All interactions of one simulated decay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct McEventPack {
    pub event_id: u64,
    pub interactions: Vec<RawMcInteraction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_conversion() {
        let int = RawMcInteraction::from_gate_units(1, 2.5e-9, 0.511, 100.0, -20.0, 5.0, 0, 1, 2);
        assert_relative_eq!(int.sim_time, 2500.0, epsilon = 1e-6);
        assert_relative_eq!(int.energy, 511.0, epsilon = 1e-9);
        assert_relative_eq!(int.x, 10.0);
        assert_relative_eq!(int.y, -2.0);
        assert_relative_eq!(int.z, 0.5);
    }
}
