use super::config::McConfig;
use super::error::{ConfigError, McBuilderError};
use super::geometry::{GateMapping, ScintillatorBank};
use super::mc_hit::{McEventPack, McHitPair, RawDetectorHit, RawMcInteraction};
use super::smearing::{is_hit_reconstructed, Smearer};
use super::time_window::{split_time, FlushPolicy, TimeWindow, WindowAccumulator};

/// McBuilder maps simulated interactions onto the detector, reconstructs them
/// and composes them into time windows.
#[derive(Debug)]
pub struct McBuilder {
    mapping: GateMapping,
    bank: Option<ScintillatorBank>,
    smearer: Smearer,
    accumulator: WindowAccumulator<McHitPair>,
    window_width: f64,
    energy_threshold: f64,
}

impl McBuilder {
    pub fn new(
        mapping: GateMapping,
        bank: Option<ScintillatorBank>,
        smearer: Smearer,
        policy: FlushPolicy,
        window_width: f64,
        energy_threshold: f64,
    ) -> Self {
        Self {
            mapping,
            bank,
            smearer,
            accumulator: WindowAccumulator::new(policy),
            window_width,
            energy_threshold,
        }
    }

    pub fn from_config(config: &McConfig) -> Result<Self, McBuilderError> {
        if !config.is_window_width_valid() {
            return Err(ConfigError::InvalidWindowWidth(config.window_width).into());
        }
        let bank = match &config.scintillator_bank_path {
            Some(path) => Some(ScintillatorBank::new(path)?),
            None => {
                log::warn!("No scintillator bank configured, reconstructed X/Y will be taken from the simulation");
                None
            }
        };
        Ok(Self::new(
            config.gate_mapping,
            bank,
            Smearer::new(&config.smearing)?,
            config.flush_policy(),
            config.window_width,
            config.energy_threshold,
        ))
    }

    /// Map and reconstruct one interaction at the given in-window time
    fn build_pair(
        &mut self,
        interaction: &RawMcInteraction,
        time: f64,
    ) -> Result<McHitPair, McBuilderError> {
        let scin_id = self
            .mapping
            .map(interaction.sector_id, interaction.crystal_id)?;
        let raw = RawDetectorHit {
            scin_id,
            time,
            energy: interaction.energy,
            x: interaction.x,
            y: interaction.y,
            z: interaction.z,
        };
        let (x, y) = match self.bank.as_ref().map(|bank| bank.get(scin_id)) {
            Some(Some(scin)) => (scin.center_x, scin.center_y),
            Some(None) => {
                log::warn!("Scintillator {scin_id} is not in the scintillator bank");
                (raw.x, raw.y)
            }
            None => (raw.x, raw.y),
        };
        let reco = self.smearer.reconstruct(&raw, x, y)?;
        Ok(McHitPair {
            raw,
            reco: is_hit_reconstructed(&reco, self.energy_threshold).then_some(reco),
        })
    }

    /// Process all interactions of one simulated event.
    ///
    /// Returns the windows completed by this event, in order.
    pub fn process_event_pack(
        &mut self,
        pack: &McEventPack,
    ) -> Result<Vec<TimeWindow<McHitPair>>, McBuilderError> {
        let mut completed = Vec::new();
        match self.accumulator.policy() {
            FlushPolicy::Boundary => {
                for interaction in pack.interactions.iter() {
                    let (index, time) = split_time(interaction.sim_time, self.window_width);
                    let pair = self.build_pair(interaction, time)?;
                    completed.extend(self.accumulator.append_hit(index, pair));
                }
            }
            FlushPolicy::Activity { .. } | FlushPolicy::SingleEvent => {
                // place the whole event at a random offset inside the window
                let start = pack
                    .interactions
                    .iter()
                    .map(|i| i.sim_time)
                    .fold(f64::INFINITY, f64::min);
                let end = pack
                    .interactions
                    .iter()
                    .map(|i| i.sim_time)
                    .fold(f64::NEG_INFINITY, f64::max);
                let span = (end - start).max(0.0);
                let shift = self.smearer.uniform(0.0, (self.window_width - span).max(0.0));
                for interaction in pack.interactions.iter() {
                    let time = shift + (interaction.sim_time - start);
                    if time >= self.window_width {
                        log::warn!(
                            "Interaction of event {} lies {} ps after the event start, outside the {} ps window, dropping it",
                            pack.event_id,
                            interaction.sim_time - start,
                            self.window_width
                        );
                        continue;
                    }
                    let pair = self.build_pair(interaction, time)?;
                    completed.extend(self.accumulator.append_hit(0, pair));
                }
            }
        }
        completed.extend(self.accumulator.end_event());
        Ok(completed)
    }

    /// Flush the window still open at the end of the input
    pub fn flush_final(&mut self) -> Option<TimeWindow<McHitPair>> {
        self.accumulator.flush_final()
    }
}
