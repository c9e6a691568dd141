//! Simulation configuration and validation.
//!
//! [`SimulationConfig`] is the single input describing a run. Its
//! [`Default`] reproduces the 2D Hodgkin-Huxley sheet: a 0.1 x 0.05 domain
//! of 25 x 13 bilinear elements, stimulated along half of the bottom edge
//! for 0.2 time units and then left to propagate until 0.7.
//! [`validate()`](SimulationConfig::validate) checks every constraint up
//! front; nothing is checked lazily during stepping.

use crate::stimulus::{StimulusProtocol, StimulusRegion};
use cardion_core::interval::exact_divisions;
use cardion_core::{ConfigError, TimeInterval};
use cardion_diffusion::SolverSettings;
use cardion_mesh::basis::MAX_GAUSS_POINTS;
use cardion_mesh::{Mesh, RectMeshBuilder};
use cardion_reaction::Scheme;
use serde::{Deserialize, Serialize};

// ── MeshConfig ─────────────────────────────────────────────────────

/// Rectangular domain, its discretisation and decomposition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Extent along x. Default: 0.1.
    pub width: f64,
    /// Extent along y. Default: 0.05.
    pub height: f64,
    /// Elements along x. Default: 25.
    pub elements_x: u32,
    /// Elements along y. Default: 13.
    pub elements_y: u32,
    /// Worker partitions. Default: 1.
    pub partitions: u32,
    /// Gauss points per reference direction. Default: 3.
    pub quadrature_points: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            width: 0.1,
            height: 0.05,
            elements_x: 25,
            elements_y: 13,
            partitions: 1,
            quadrature_points: 3,
        }
    }
}

impl MeshConfig {
    /// Generate the mesh.
    pub fn build_mesh(&self) -> Result<Mesh, ConfigError> {
        RectMeshBuilder::new(self.width, self.height, self.elements_x, self.elements_y).build()
    }
}

// ── MaterialConfig ─────────────────────────────────────────────────

/// Uniform tissue properties, written into the `materials` field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Surface-to-volume ratio. Default: 1936.
    pub am: f64,
    /// Membrane capacitance. Default: 1.4.
    pub cm: f64,
    /// Conductivity along x. Default: 1.0.
    pub sigma_11: f64,
    /// Conductivity along y. Default: 1.0.
    pub sigma_22: f64,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            am: 1936.0,
            cm: 1.4,
            sigma_11: 1.0,
            sigma_22: 1.0,
        }
    }
}

impl MaterialConfig {
    /// Component values in `materials` field order.
    pub fn components(&self) -> [f64; 4] {
        [self.am, self.cm, self.sigma_11, self.sigma_22]
    }
}

// ── TimeConfig ─────────────────────────────────────────────────────

/// Step sizes and phase boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Reaction sub-step. Default: 1e-5.
    ///
    /// `pde_step / ode_step` must evaluate to an exact integer in `f64`
    /// (see [`exact_divisions`](cardion_core::interval::exact_divisions)). Some decimal
    /// pairs that are integer multiples on paper are refused, e.g. `1e-2`
    /// over `1e-5` or `1e-3` over `1e-6`.
    pub ode_step: f64,
    /// Diffusion step. Default: 1e-3. Must be an exact multiple of
    /// `ode_step` as described there.
    pub pde_step: f64,
    /// Start time. Default: 0.
    pub start: f64,
    /// End of the stimulus phase. Default: 0.2.
    pub stimulus_stop: f64,
    /// End of the run. Default: 0.7.
    pub stop: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ode_step: 1e-5,
            pde_step: 1e-3,
            start: 0.0,
            stimulus_stop: 0.2,
            stop: 0.7,
        }
    }
}

// ── StimulusConfig ─────────────────────────────────────────────────

/// Stimulus value and the nodes it applies to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    /// Stimulus current during the first phase. Default: -5000.
    pub value: f64,
    /// Stimulated nodes. Default: bottom row, left half.
    pub region: StimulusRegion,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            value: -5000.0,
            region: StimulusRegion::BottomRowLeftHalf,
        }
    }
}

// ── CouplingConfig ─────────────────────────────────────────────────

/// A wanted reaction intermediate and the field it is copied into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedQuantity {
    /// Reaction variable name.
    pub variable: String,
    /// Destination field name.
    pub field: String,
}

/// Names of the reaction variables the fields are coupled to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    /// State variable coupled to `Vm`. Default: `membrane/V`.
    pub voltage: String,
    /// Parameter fed from the `stimulus` field. Default: `membrane/i_Stim`.
    pub stimulus: String,
    /// Parameter fed from the `Cm` material. Default: `membrane/Cm`.
    pub capacitance: String,
    /// Intermediates copied out after each reaction step.
    /// Default: `membrane/i_K` into `i_K`.
    pub wanted: Vec<WantedQuantity>,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            voltage: "membrane/V".into(),
            stimulus: "membrane/i_Stim".into(),
            capacitance: "membrane/Cm".into(),
            wanted: vec![WantedQuantity {
                variable: "membrane/i_K".into(),
                field: "i_K".into(),
            }],
        }
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Everything needed to set up and run a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Domain and decomposition.
    pub mesh: MeshConfig,
    /// Tissue properties.
    pub materials: MaterialConfig,
    /// Step sizes and phase boundaries.
    pub time: TimeConfig,
    /// Stimulus value and region.
    pub stimulus: StimulusConfig,
    /// Initial `Vm` everywhere. Default: -75.
    pub initial_voltage: f64,
    /// Snapshot every this many steps; 0 disables output. Default: 10.
    pub output_frequency: u64,
    /// Reaction scheme. Default: forward Euler.
    pub scheme: Scheme,
    /// Linear solver settings.
    pub solver: SolverSettings,
    /// Field to reaction variable names.
    pub coupling: CouplingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mesh: MeshConfig::default(),
            materials: MaterialConfig::default(),
            time: TimeConfig::default(),
            stimulus: StimulusConfig::default(),
            initial_voltage: -75.0,
            output_frequency: 10,
            scheme: Scheme::default(),
            solver: SolverSettings::default(),
            coupling: CouplingConfig::default(),
        }
    }
}

/// Field names reserved by the engine.
pub const RESERVED_FIELDS: [&str; 3] = ["Vm", "materials", "stimulus"];

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name: name.into(),
            value,
        })
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name: name.into(),
            value,
        })
    }
}

impl SimulationConfig {
    /// Check every constraint.
    ///
    /// # Errors
    ///
    /// The first violated constraint. PDE/ODE divisibility uses the exact
    /// rule, so `pde_step = 1.5e-4` with `ode_step = 1e-5` is refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mesh;
        positive("mesh.width", m.width)?;
        positive("mesh.height", m.height)?;
        if m.elements_x == 0 || m.elements_y == 0 {
            return Err(ConfigError::InvalidMesh {
                reason: format!("{} x {} elements", m.elements_x, m.elements_y),
            });
        }
        let elements = u64::from(m.elements_x) * u64::from(m.elements_y);
        if m.partitions == 0 || u64::from(m.partitions) > elements {
            return Err(ConfigError::InvalidDecomposition {
                reason: format!("{} partitions for {elements} elements", m.partitions),
            });
        }
        if !(1..=MAX_GAUSS_POINTS).contains(&m.quadrature_points) {
            return Err(ConfigError::InvalidParameter {
                name: "mesh.quadrature_points".into(),
                value: f64::from(m.quadrature_points),
            });
        }

        let mat = &self.materials;
        positive("materials.am", mat.am)?;
        positive("materials.cm", mat.cm)?;
        non_negative("materials.sigma_11", mat.sigma_11)?;
        non_negative("materials.sigma_22", mat.sigma_22)?;

        exact_divisions(self.time.pde_step, self.time.ode_step)?;
        self.protocol_intervals()?;

        if !self.initial_voltage.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "initial_voltage".into(),
                value: self.initial_voltage,
            });
        }
        if !self.stimulus.value.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "stimulus.value".into(),
                value: self.stimulus.value,
            });
        }
        self.solver.validate()?;
        self.validate_coupling()
    }

    fn protocol_intervals(&self) -> Result<(TimeInterval, TimeInterval), ConfigError> {
        let t = &self.time;
        Ok((
            TimeInterval::new(t.start, t.stimulus_stop, t.pde_step)?,
            TimeInterval::new(t.stimulus_stop, t.stop, t.pde_step)?,
        ))
    }

    fn validate_coupling(&self) -> Result<(), ConfigError> {
        let c = &self.coupling;
        for (usage, name) in [
            ("voltage", &c.voltage),
            ("stimulus", &c.stimulus),
            ("capacitance", &c.capacitance),
        ] {
            if name.is_empty() {
                return Err(ConfigError::InvalidVariableUsage {
                    name: name.clone(),
                    usage,
                });
            }
        }
        let mut seen: Vec<&str> = Vec::with_capacity(c.wanted.len());
        for w in &c.wanted {
            if w.field.is_empty() || RESERVED_FIELDS.contains(&w.field.as_str()) {
                return Err(ConfigError::InvalidField {
                    reason: format!("wanted quantity field name {:?} is reserved", w.field),
                });
            }
            if seen.contains(&w.field.as_str()) {
                return Err(ConfigError::DuplicateField {
                    name: w.field.clone(),
                });
            }
            seen.push(&w.field);
        }
        Ok(())
    }

    /// The stimulus on/off protocol for a mesh.
    ///
    /// # Errors
    ///
    /// Region resolution or interval errors.
    pub fn protocol(&self, mesh: &Mesh) -> Result<StimulusProtocol, ConfigError> {
        let t = &self.time;
        StimulusProtocol::on_off(
            self.stimulus.region.nodes(mesh)?,
            self.stimulus.value,
            t.start,
            t.stimulus_stop,
            t.stop,
            t.pde_step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.mesh.elements_x, 25);
        assert_eq!(config.materials.components(), [1936.0, 1.4, 1.0, 1.0]);
        assert_eq!(config.output_frequency, 10);
    }

    #[test]
    fn non_divisible_sub_step_is_refused() {
        let mut config = SimulationConfig::default();
        config.time.pde_step = 1.5e-4;
        config.time.stimulus_stop = 1.5e-3;
        config.time.stop = 3e-3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SubStepNotDivisible { .. })
        ));
    }

    #[test]
    fn invalid_ranges_are_refused() {
        let mut config = SimulationConfig::default();
        config.materials.cm = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.mesh.partitions = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecomposition { .. })
        ));

        let mut config = SimulationConfig::default();
        config.time.stimulus_stop = 0.25;
        config.time.stop = 0.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn wanted_fields_must_not_clash() {
        let mut config = SimulationConfig::default();
        config.coupling.wanted.push(WantedQuantity {
            variable: "membrane/i_Na".into(),
            field: "Vm".into(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidField { .. })));

        let mut config = SimulationConfig::default();
        config.coupling.wanted.push(config.coupling.wanted[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateField { .. })));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "mesh": { "elements_x": 8, "elements_y": 1, "partitions": 2 },
            "stimulus": { "region": "left_half" },
            "scheme": "runge_kutta4"
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.mesh.width, 0.1);
        assert_eq!(config.mesh.partitions, 2);
        assert_eq!(config.stimulus.region, StimulusRegion::LeftHalf);
        assert_eq!(config.scheme, Scheme::RungeKutta4);
        assert_eq!(config.time.pde_step, 1e-3);
    }

    #[test]
    fn protocol_uses_region_and_phases() {
        let config = SimulationConfig::default();
        let mesh = config.mesh.build_mesh().unwrap();
        let protocol = config.protocol(&mesh).unwrap();
        assert_eq!(protocol.nodes.len(), 13);
        assert_eq!(protocol.phases[0].value, -5000.0);
        assert_eq!(protocol.phases[0].interval.step_count().unwrap(), 200);
    }
}
