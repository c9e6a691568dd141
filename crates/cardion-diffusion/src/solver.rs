//! One backward-Euler diffusion step per call, with cached assembly.

use crate::assembly::{assemble, Materials};
use crate::cg::{self, CgError, SolveStats, SolverSettings};
use crate::sparse::CsrMatrix;
use cardion_core::{
    ConfigError, ExchangeError, FieldReader, FieldRef, FieldWriter, ParameterSet, StepError,
};
use cardion_exchange::PartitionExchange;
use cardion_field::FieldStore;
use cardion_mesh::{BilinearQuad, BoundaryConditions, Partition};
use thiserror::Error;

/// Field slots read and written by the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffusionFields {
    /// Transmembrane potential, current values.
    pub vm: FieldRef,
    /// Transmembrane potential at the start of the step.
    pub vm_previous: FieldRef,
    /// `Am`, `Cm`, `sigma_11`, `sigma_22`.
    pub materials: [FieldRef; 4],
}

impl DiffusionFields {
    /// Resolve the voltage and materials slots by field name.
    ///
    /// # Errors
    ///
    /// Any resolution error from the store, e.g. a voltage field registered
    /// without a previous-values set or a materials field with fewer than
    /// four components.
    pub fn resolve(store: &FieldStore, vm: &str, materials: &str) -> Result<Self, ConfigError> {
        let material = |c| store.resolve(materials, c, ParameterSet::Values);
        Ok(Self {
            vm: store.resolve(vm, 0, ParameterSet::Values)?,
            vm_previous: store.resolve(vm, 0, ParameterSet::PreviousValues)?,
            materials: [material(0)?, material(1)?, material(2)?, material(3)?],
        })
    }
}

/// Failure of a diffusion step.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DiffusionError {
    /// Invalid materials, step or field layout.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The linear solve failed.
    #[error(transparent)]
    Numerical(#[from] StepError),
    /// A halo update or reduction failed.
    #[error(transparent)]
    Communication(#[from] ExchangeError),
}

impl From<CgError> for DiffusionError {
    fn from(e: CgError) -> Self {
        match e {
            CgError::Numerical(e) => Self::Numerical(e),
            CgError::Communication(e) => Self::Communication(e),
        }
    }
}

/// Assembled operators for one materials version.
#[derive(Debug)]
struct Operators {
    materials_version: u64,
    mass: CsrMatrix,
    stiffness: CsrMatrix,
}

/// `Mw/dt + K` with Dirichlet rows and columns eliminated.
#[derive(Debug)]
struct System {
    dt: f64,
    matrix: CsrMatrix,
    inv_diag: Vec<f64>,
    /// `sum_j A_ij g_j` over eliminated Dirichlet columns, per owned row.
    lift: Vec<f64>,
}

/// Diffusion solver bound to one partition.
#[derive(Debug)]
pub struct DiffusionSolver {
    partition: Partition,
    fields: DiffusionFields,
    basis: BilinearQuad,
    settings: SolverSettings,
    /// Dirichlet value per local node.
    dirichlet: Vec<Option<f64>>,
    /// Integrated Neumann flux per owned row.
    neumann: Vec<f64>,
    operators: Option<Operators>,
    system: Option<System>,
    assemblies: u64,
}

impl DiffusionSolver {
    /// Bind a solver to a partition.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSolver`] for invalid settings.
    pub fn new(
        partition: &Partition,
        fields: DiffusionFields,
        boundary: &BoundaryConditions,
        basis: BilinearQuad,
        settings: SolverSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let dirichlet = partition
            .nodes()
            .iter()
            .map(|&n| boundary.dirichlet(n))
            .collect();
        let neumann = partition
            .owned()
            .iter()
            .map(|&n| boundary.neumann(n))
            .collect();
        Ok(Self {
            partition: partition.clone(),
            fields,
            basis,
            settings,
            dirichlet,
            neumann,
            operators: None,
            system: None,
            assemblies: 0,
        })
    }

    /// Slots this solver reads and writes.
    pub fn fields(&self) -> &DiffusionFields {
        &self.fields
    }

    /// Solver settings.
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Number of times the operators have been assembled.
    pub fn assembly_count(&self) -> u64 {
        self.assemblies
    }

    /// Assemble the system for step `dt` unless the cached one still applies.
    ///
    /// Operators are rebuilt when the `materials` field version changes; the
    /// system matrix additionally when `dt` changes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] for a non-positive step,
    /// [`ConfigError::InvalidMaterial`] or [`ConfigError::InvalidMesh`] from
    /// assembly.
    pub fn prepare(&mut self, store: &FieldStore, dt: f64) -> Result<(), ConfigError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "pde_step".into(),
                value: dt,
            });
        }
        let version = store.version(self.fields.materials[0].field);
        let stale = self
            .operators
            .as_ref()
            .is_none_or(|ops| ops.materials_version != version);
        if stale {
            let [am, cm, s11, s22] = self.fields.materials;
            let materials = Materials {
                am: store.get(am)?,
                cm: store.get(cm)?,
                sigma_11: store.get(s11)?,
                sigma_22: store.get(s22)?,
            };
            materials.validate(&self.partition)?;
            let (mass, stiffness) = assemble(&self.partition, &self.basis, &materials)?;
            self.assemblies += 1;
            tracing::debug!(
                partition = %self.partition.id(),
                nnz = mass.nnz(),
                version,
                "diffusion operators assembled"
            );
            self.operators = Some(Operators {
                materials_version: version,
                mass,
                stiffness,
            });
            self.system = None;
        }

        if self.system.as_ref().is_some_and(|s| s.dt == dt) {
            return Ok(());
        }
        let Some(ops) = self.operators.as_ref() else {
            return Ok(());
        };
        let mut matrix = ops
            .mass
            .combine(1.0 / dt, &ops.stiffness, 1.0)
            .ok_or_else(|| ConfigError::InvalidMesh {
                reason: "mass and stiffness patterns differ".into(),
            })?;
        let lift = self.eliminate(&mut matrix);
        let inv_diag = matrix.diagonal().iter().map(|d| 1.0 / d).collect();
        self.system = Some(System {
            dt,
            matrix,
            inv_diag,
            lift,
        });
        Ok(())
    }

    /// Zero Dirichlet columns in free rows and replace Dirichlet rows by the
    /// identity. Returns the eliminated column contributions.
    fn eliminate(&self, matrix: &mut CsrMatrix) -> Vec<f64> {
        let mut lift = vec![0.0; matrix.rows()];
        for (i, lifted) in lift.iter_mut().enumerate() {
            let fixed_row = self.dirichlet[i].is_some();
            let (cols, values) = matrix.row_mut(i);
            for (&j, v) in cols.iter().zip(values.iter_mut()) {
                if fixed_row {
                    *v = if j as usize == i { 1.0 } else { 0.0 };
                } else if let Some(g) = self.dirichlet[j as usize] {
                    *lifted += *v * g;
                    *v = 0.0;
                }
            }
        }
        lift
    }

    /// Advance `Vm` by one step of length `dt`.
    ///
    /// The current `Vm` is copied to its previous-values set, halo entries of
    /// the previous values are refreshed, and the solution is written to the
    /// owned entries of `Vm`. Halo entries of `Vm` are left for the caller's
    /// reconcile.
    pub fn solve_step(
        &mut self,
        store: &mut FieldStore,
        exchange: &mut PartitionExchange,
        dt: f64,
    ) -> Result<SolveStats, DiffusionError> {
        self.prepare(store, dt)?;
        let Some(system) = self.system.as_ref() else {
            return Err(ConfigError::InvalidSolver {
                reason: "system not assembled".into(),
            }
            .into());
        };
        let Some(ops) = self.operators.as_ref() else {
            return Err(ConfigError::InvalidSolver {
                reason: "operators not assembled".into(),
            }
            .into());
        };

        let DiffusionFields {
            vm, vm_previous, ..
        } = self.fields;
        store.copy_set(vm.field, ParameterSet::Values, ParameterSet::PreviousValues)?;
        let mut previous = store.get(vm_previous)?.to_vec();
        exchange.update_halo(&mut previous)?;
        if let Some(slot) = store.write(vm_previous) {
            slot.copy_from_slice(&previous);
        }

        let owned = self.partition.owned_count();
        let mut b = vec![0.0; owned];
        ops.mass.mul_vec(&previous, &mut b);
        for (i, bi) in b.iter_mut().enumerate() {
            *bi = match self.dirichlet[i] {
                Some(g) => g,
                None => *bi / dt + self.neumann[i] - system.lift[i],
            };
        }

        let mut x = previous;
        for (xi, g) in x.iter_mut().zip(&self.dirichlet) {
            if let Some(g) = g {
                *xi = *g;
            }
        }
        let stats = cg::solve(
            &system.matrix,
            &system.inv_diag,
            &b,
            &mut x,
            exchange,
            &self.settings,
        )?;

        let values = store.write(vm).ok_or_else(|| ConfigError::UnknownField {
            name: vm.to_string(),
        })?;
        values[..owned].copy_from_slice(&x[..owned]);
        tracing::trace!(
            partition = %self.partition.id(),
            iterations = stats.iterations,
            residual = stats.residual,
            "diffusion step solved"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardion_core::{FieldDef, NodeId, PartitionId};
    use cardion_exchange::LocalCommunicator;
    use cardion_mesh::{Decomposition, RectMeshBuilder};

    struct Fixture {
        partition: Partition,
        store: FieldStore,
        fields: DiffusionFields,
        exchange: PartitionExchange,
    }

    fn fixture(nx: u32, ny: u32) -> Fixture {
        let mesh = RectMeshBuilder::new(1.0, 0.5, nx, ny).build().unwrap();
        let dec = Decomposition::calculated(&mesh, 1).unwrap();
        let partition = dec.partition(&mesh, PartitionId(0)).unwrap();
        let mut store = FieldStore::new(partition.local_count());
        store.register(FieldDef::scalar("Vm").keep_previous()).unwrap();
        store.register(FieldDef::with_components("materials", 4)).unwrap();
        for (c, v) in [1.0, 1.0, 0.1, 0.1].into_iter().enumerate() {
            let slot = store.resolve("materials", c as u32, ParameterSet::Values).unwrap();
            store.fill(slot, v).unwrap();
        }
        let fields = DiffusionFields::resolve(&store, "Vm", "materials").unwrap();
        let exchange = PartitionExchange::new(&partition, Box::new(LocalCommunicator)).unwrap();
        Fixture {
            partition,
            store,
            fields,
            exchange,
        }
    }

    fn solver(f: &Fixture, boundary: &BoundaryConditions) -> DiffusionSolver {
        DiffusionSolver::new(
            &f.partition,
            f.fields,
            boundary,
            BilinearQuad::new(2).unwrap(),
            SolverSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn uniform_voltage_is_a_fixed_point() {
        let mut f = fixture(4, 2);
        f.store.fill(f.fields.vm, -75.0).unwrap();
        let mut s = solver(&f, &BoundaryConditions::zero_flux());
        s.solve_step(&mut f.store, &mut f.exchange, 1e-3).unwrap();
        for v in f.store.get(f.fields.vm).unwrap() {
            assert!((v + 75.0).abs() < 1e-8, "{v}");
        }
        assert!(f
            .store
            .get(f.fields.vm_previous)
            .unwrap()
            .iter()
            .all(|&v| v == -75.0));
    }

    #[test]
    fn zero_flux_conserves_weighted_charge() {
        let mut f = fixture(6, 3);
        let n = f.partition.local_count();
        let spike: Vec<f64> = (0..n).map(|l| if l == n / 2 { 10.0 } else { 0.0 }).collect();
        f.store.initialise(f.fields.vm, &spike).unwrap();
        let mut s = solver(&f, &BoundaryConditions::zero_flux());
        s.solve_step(&mut f.store, &mut f.exchange, 1e-2).unwrap();

        let ops = s.operators.as_ref().unwrap();
        let charge = |v: &[f64]| {
            let mut y = vec![0.0; n];
            ops.mass.mul_vec(v, &mut y);
            y.iter().sum::<f64>()
        };
        let after = f.store.get(f.fields.vm).unwrap().to_vec();
        assert!((charge(&after) - charge(&spike)).abs() < 1e-8);
        assert!(after[n / 2] < 10.0);
    }

    #[test]
    fn dirichlet_nodes_hold_their_value() {
        let mut f = fixture(3, 1);
        f.store.fill(f.fields.vm, 0.0).unwrap();
        let boundary = BoundaryConditions::zero_flux()
            .with_dirichlet(NodeId(0), 5.0)
            .with_dirichlet(NodeId(4), 5.0);
        let mut s = solver(&f, &boundary);
        // Consistent mass undershoots next to the jump on the first step;
        // from there the neighbour climbs steadily toward the held value.
        let mut neighbour = f64::NEG_INFINITY;
        for step in 0..200 {
            s.solve_step(&mut f.store, &mut f.exchange, 1e-2).unwrap();
            let vm = f.store.get(f.fields.vm).unwrap();
            assert!((vm[0] - 5.0).abs() < 1e-9, "step {step}");
            assert!((vm[4] - 5.0).abs() < 1e-9, "step {step}");
            assert!((vm[1] - vm[5]).abs() < 1e-8, "step {step}");
            assert!(vm[1] > neighbour, "step {step}: {} after {neighbour}", vm[1]);
            neighbour = vm[1];
        }
        assert!(neighbour > 2.5 && neighbour < 5.0, "{neighbour}");
    }

    #[test]
    fn operators_are_reassembled_only_when_materials_change() {
        let mut f = fixture(2, 2);
        f.store.fill(f.fields.vm, 1.0).unwrap();
        let mut s = solver(&f, &BoundaryConditions::zero_flux());
        s.solve_step(&mut f.store, &mut f.exchange, 1e-3).unwrap();
        s.solve_step(&mut f.store, &mut f.exchange, 5e-4).unwrap();
        assert_eq!(s.assembly_count(), 1);
        f.store.fill(f.fields.materials[2], 0.2).unwrap();
        s.solve_step(&mut f.store, &mut f.exchange, 5e-4).unwrap();
        assert_eq!(s.assembly_count(), 2);
    }

    #[test]
    fn invalid_material_is_a_config_error() {
        let mut f = fixture(2, 1);
        f.store.fill(f.fields.materials[0], -1.0).unwrap();
        let mut s = solver(&f, &BoundaryConditions::zero_flux());
        let err = s.solve_step(&mut f.store, &mut f.exchange, 1e-3).unwrap_err();
        assert!(matches!(
            err,
            DiffusionError::Config(ConfigError::InvalidMaterial { property: "Am", .. })
        ));
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let mut f = fixture(1, 1);
        let mut s = solver(&f, &BoundaryConditions::zero_flux());
        assert!(s.prepare(&f.store, 0.0).is_err());
        assert!(s.solve_step(&mut f.store, &mut f.exchange, -1.0).is_err());
    }
}
