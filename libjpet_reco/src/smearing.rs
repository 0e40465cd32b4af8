use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::error::SmearingError;
use super::mc_hit::{RawDetectorHit, ReconstructedHit};

/// Value of `limits` meaning the formula output is not clamped
pub const UNBOUNDED_LIMITS: [f64; 2] = [-1.0, -1.0];

/// A user supplied smearing formula.
///
/// The expression can use the variables `scin_id`, `z`, `energy`, `time`,
/// the parameters `p0..pN`, and the random draws `gauss` (N(0,1)) and
/// `uniform` (U(0,1)), each drawn fresh for every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaConfig {
    pub expression: String,
    #[serde(default)]
    pub parameters: Vec<f64>,
    #[serde(default)]
    pub limits: Option<[f64; 2]>,
}

/// Resolution model of one smeared quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmearingConfig {
    pub seed: u64,
    pub use_default_z: bool,
    pub use_default_time: bool,
    pub use_default_energy: bool,
    /// cm
    pub z_sigma: f64,
    /// ps
    pub time_sigma: f64,
    /// keV
    pub time_threshold_energy: f64,
    /// keV
    pub time_reference_energy: f64,
    pub energy_fraction: f64,
    pub z_formula: Option<FormulaConfig>,
    pub time_formula: Option<FormulaConfig>,
    pub energy_formula: Option<FormulaConfig>,
}

impl Default for SmearingConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            use_default_z: true,
            use_default_time: true,
            use_default_energy: true,
            z_sigma: 3.0,
            time_sigma: 220.0,
            time_threshold_energy: 200.0,
            time_reference_energy: 270.0,
            energy_fraction: 0.044,
            z_formula: None,
            time_formula: None,
            energy_formula: None,
        }
    }
}

/// A precompiled formula
#[derive(Debug, Clone)]
struct Formula {
    tree: Node,
    parameters: Vec<f64>,
    limits: Option<[f64; 2]>,
}

impl Formula {
    fn compile(config: &FormulaConfig) -> Result<Self, SmearingError> {
        let tree = build_operator_tree(&config.expression)
            .map_err(|e| SmearingError::BadFormula(config.expression.clone(), e))?;
        let limits = config.limits.filter(|l| *l != UNBOUNDED_LIMITS);
        Ok(Self {
            tree,
            parameters: config.parameters.clone(),
            limits,
        })
    }

    fn evaluate(&self, hit: &RawDetectorHit, rng: &mut StdRng) -> Result<f64, SmearingError> {
        let mut context = HashMapContext::new();
        context.set_value("scin_id".into(), Value::Float(hit.scin_id as f64))?;
        context.set_value("z".into(), Value::Float(hit.z))?;
        context.set_value("energy".into(), Value::Float(hit.energy))?;
        context.set_value("time".into(), Value::Float(hit.time))?;
        for (idx, par) in self.parameters.iter().enumerate() {
            context.set_value(format!("p{idx}"), Value::Float(*par))?;
        }
        context.set_value("gauss".into(), Value::Float(rng.sample(StandardNormal)))?;
        context.set_value("uniform".into(), Value::Float(rng.random::<f64>()))?;

        let value = self.tree.eval_number_with_context(&context)?;
        Ok(match self.limits {
            Some([low, high]) => value.max(low).min(high),
            None => value,
        })
    }
}

/// Smearer applies the detector resolution to simulated hits.
///
/// Owns the random stream of the MC pipeline; the same seed and input always
/// give the same reconstruction.
#[derive(Debug)]
pub struct Smearer {
    config: SmearingConfig,
    rng: StdRng,
    z_formula: Option<Formula>,
    time_formula: Option<Formula>,
    energy_formula: Option<Formula>,
}

impl Smearer {
    pub fn new(config: &SmearingConfig) -> Result<Self, SmearingError> {
        let compile = |use_default: bool, formula: &Option<FormulaConfig>| {
            match (use_default, formula) {
                (false, Some(f)) => Formula::compile(f).map(Some),
                _ => Ok(None),
            }
        };
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            z_formula: compile(config.use_default_z, &config.z_formula)?,
            time_formula: compile(config.use_default_time, &config.time_formula)?,
            energy_formula: compile(config.use_default_energy, &config.energy_formula)?,
            config: config.clone(),
        })
    }

    fn gauss(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Draw from U(low, high)
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..high)
    }

    pub fn smear_z(&mut self, hit: &RawDetectorHit) -> Result<f64, SmearingError> {
        match &self.z_formula {
            Some(formula) => formula.evaluate(hit, &mut self.rng),
            None => Ok(hit.z + self.config.z_sigma * self.gauss()),
        }
    }

    /// Time resolution degrades as `sqrt(E_ref/E)` below the threshold energy
    pub fn smear_time(&mut self, hit: &RawDetectorHit) -> Result<f64, SmearingError> {
        if let Some(formula) = &self.time_formula {
            return formula.evaluate(hit, &mut self.rng);
        }
        let threshold = self.config.time_threshold_energy;
        let sigma = if hit.energy >= threshold {
            self.config.time_sigma
        } else {
            let energy = if hit.energy > 0.0 {
                hit.energy
            } else {
                threshold
            };
            self.config.time_sigma * (self.config.time_reference_energy / energy).sqrt()
        };
        Ok(hit.time + sigma * self.gauss())
    }

    pub fn smear_energy(&mut self, hit: &RawDetectorHit) -> Result<f64, SmearingError> {
        match &self.energy_formula {
            Some(formula) => formula.evaluate(hit, &mut self.rng),
            None => Ok(hit.energy + self.config.energy_fraction * hit.energy * self.gauss()),
        }
    }

    /// Smear a raw hit. X and Y are taken as given.
    pub fn reconstruct(
        &mut self,
        hit: &RawDetectorHit,
        x: f64,
        y: f64,
    ) -> Result<ReconstructedHit, SmearingError> {
        Ok(ReconstructedHit {
            scin_id: hit.scin_id,
            time: self.smear_time(hit)?,
            energy: self.smear_energy(hit)?,
            x,
            y,
            z: self.smear_z(hit)?,
        })
    }
}

/// Hits are accepted when the reconstructed energy reaches the threshold
pub fn is_hit_reconstructed(hit: &ReconstructedHit, threshold: f64) -> bool {
    hit.energy >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw_hit() -> RawDetectorHit {
        RawDetectorHit {
            scin_id: 266,
            time: 1000.0,
            energy: 300.0,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = SmearingConfig {
            seed: 42,
            ..Default::default()
        };
        let mut a = Smearer::new(&config).unwrap();
        let mut b = Smearer::new(&config).unwrap();
        for _ in 0..10 {
            assert_eq!(
                a.reconstruct(&raw_hit(), 1.0, 2.0).unwrap(),
                b.reconstruct(&raw_hit(), 1.0, 2.0).unwrap()
            );
        }
    }

    #[test]
    fn test_zero_width_is_identity() {
        let config = SmearingConfig {
            z_sigma: 0.0,
            time_sigma: 0.0,
            energy_fraction: 0.0,
            ..Default::default()
        };
        let mut smearer = Smearer::new(&config).unwrap();
        let reco = smearer.reconstruct(&raw_hit(), 1.0, 2.0).unwrap();
        assert_relative_eq!(reco.z, 3.0);
        assert_relative_eq!(reco.time, 1000.0);
        assert_relative_eq!(reco.energy, 300.0);
    }

    #[test]
    fn test_custom_formula_with_limits() {
        let config = SmearingConfig {
            use_default_energy: false,
            energy_formula: Some(FormulaConfig {
                expression: "energy * p0 + p1".to_string(),
                parameters: vec![2.0, 10.0],
                limits: Some([0.0, 500.0]),
            }),
            use_default_z: false,
            z_formula: Some(FormulaConfig {
                expression: "z + scin_id".to_string(),
                parameters: vec![],
                limits: Some(UNBOUNDED_LIMITS),
            }),
            ..Default::default()
        };
        let mut smearer = Smearer::new(&config).unwrap();
        let hit = raw_hit();
        assert_relative_eq!(smearer.smear_energy(&hit).unwrap(), 500.0);
        assert_relative_eq!(smearer.smear_z(&hit).unwrap(), 269.0);
    }

    #[test]
    fn test_formula_ignored_when_default_requested() {
        let config = SmearingConfig {
            use_default_energy: true,
            energy_fraction: 0.0,
            energy_formula: Some(FormulaConfig {
                expression: "1.0".to_string(),
                parameters: vec![],
                limits: None,
            }),
            ..Default::default()
        };
        let mut smearer = Smearer::new(&config).unwrap();
        assert_relative_eq!(smearer.smear_energy(&raw_hit()).unwrap(), 300.0);
    }

    #[test]
    fn test_bad_formula() {
        let config = SmearingConfig {
            use_default_time: false,
            time_formula: Some(FormulaConfig {
                expression: "((time + 1)".to_string(),
                parameters: vec![],
                limits: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            Smearer::new(&config),
            Err(SmearingError::BadFormula(_, _))
        ));
    }

    #[test]
    fn test_threshold_acceptance() {
        let mut hit = ReconstructedHit {
            energy: 10.0,
            ..Default::default()
        };
        assert!(is_hit_reconstructed(&hit, 10.0));
        hit.energy = 9.0;
        assert!(!is_hit_reconstructed(&hit, 10.0));
    }
}
