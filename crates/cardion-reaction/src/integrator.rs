//! Parallel fixed-step integration of the reaction state.
//!
//! Every node is independent, so node records are distributed across the
//! rayon pool. Each node is integrated with exactly the same sequence of
//! floating-point operations regardless of which thread runs it, so the
//! result does not depend on the thread count.

use crate::environment::Environment;
use crate::model::{ReactionModel, VariableKind};
use crate::state::ReactionState;
use cardion_core::interval::span_divisions;
use cardion_core::{ConfigError, NodeId, StepError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

/// Explicit one-step scheme used for each sub-step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// First order.
    #[default]
    ForwardEuler,
    /// Second order (improved Euler).
    Heun,
    /// Classical fourth-order Runge-Kutta.
    RungeKutta4,
}

/// Failure of [`ReactionIntegrator::advance`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum AdvanceError {
    /// Refused before integrating.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A node's state became non-finite.
    #[error(transparent)]
    Numerical(#[from] StepError),
}

/// Integrates the reaction state of every owned node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReactionIntegrator {
    scheme: Scheme,
    dt_sub: f64,
}

type Buf = SmallVec<[f64; 16]>;

struct Scratch {
    k: [Buf; 4],
    tmp: Buf,
    inter: Buf,
}

impl Scratch {
    fn new(states: usize, intermediates: usize) -> Self {
        Self {
            k: [
                smallvec![0.0; states],
                smallvec![0.0; states],
                smallvec![0.0; states],
                smallvec![0.0; states],
            ],
            tmp: smallvec![0.0; states],
            inter: smallvec![0.0; intermediates],
        }
    }
}

/// Where and when a node first went non-finite.
struct NodeFailure {
    variable: usize,
    sub_step: u64,
}

impl ReactionIntegrator {
    /// An integrator with the given scheme and sub-step.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] if `dt_sub` is not finite and
    /// positive.
    pub fn new(scheme: Scheme, dt_sub: f64) -> Result<Self, ConfigError> {
        if !(dt_sub.is_finite() && dt_sub > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "ode_step".into(),
                value: dt_sub,
            });
        }
        Ok(Self { scheme, dt_sub })
    }

    /// The sub-step.
    pub fn dt_sub(&self) -> f64 {
        self.dt_sub
    }

    /// The scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Advance every node of `state` from `t_start` to `t_end`.
    ///
    /// `nodes` maps state rows to global node ids for error reporting.
    /// Returns the number of sub-steps taken. After the last sub-step the
    /// wanted intermediates are evaluated at the final state.
    ///
    /// # Errors
    ///
    /// [`AdvanceError::Config`] if `dt_sub` does not divide the span, before
    /// anything is modified. [`AdvanceError::Numerical`] if a state variable
    /// becomes non-finite; the lowest failing node is reported.
    pub fn advance(
        &self,
        env: &Environment,
        state: &mut ReactionState,
        nodes: &[NodeId],
        t_start: f64,
        t_end: f64,
    ) -> Result<u64, AdvanceError> {
        let span = t_end - t_start;
        let steps = span_divisions(span, self.dt_sub).map_err(|_| ConfigError::SubStepNotDivisible {
            pde_step: span,
            ode_step: self.dt_sub,
        })?;
        if nodes.len() < state.node_count() {
            return Err(ConfigError::FieldLengthMismatch {
                name: "reaction node ids".into(),
                expected: state.node_count(),
                actual: nodes.len(),
            }
            .into());
        }

        let (n_states, n_params, _) = state.layout();
        let stride = state.stride();
        let n_inter = env.intermediate_count();
        let wanted = env.wanted();
        let model = env.model();
        let scheme = self.scheme;
        let dt = self.dt_sub;

        let failure = state
            .data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .map_init(
                || Scratch::new(n_states, n_inter),
                |scratch, (row, record)| {
                    let (y, rest) = record.split_at_mut(n_states);
                    let (params, out) = rest.split_at_mut(n_params);
                    let result = integrate_node(model, scheme, t_start, dt, steps, y, params, scratch);
                    for (slot, &w) in out.iter_mut().zip(wanted) {
                        *slot = scratch.inter[w as usize];
                    }
                    result.err().map(|f| (row, f))
                },
            )
            .filter_map(|f| f)
            .min_by_key(|(row, _)| *row);

        if let Some((row, f)) = failure {
            let node = nodes[row];
            let variable = model
                .variables(VariableKind::State)
                .get(f.variable)
                .copied()
                .unwrap_or("?")
                .to_string();
            tracing::warn!(%node, %variable, sub_step = f.sub_step, "non-finite reaction state");
            return Err(StepError::NonFiniteState {
                node,
                variable,
                sub_step: f.sub_step,
            }
            .into());
        }
        tracing::trace!(nodes = state.node_count(), steps, t_start, t_end, "reaction advanced");
        Ok(steps)
    }
}

#[allow(clippy::too_many_arguments)]
fn integrate_node(
    model: &dyn ReactionModel,
    scheme: Scheme,
    t0: f64,
    dt: f64,
    steps: u64,
    y: &mut [f64],
    params: &[f64],
    s: &mut Scratch,
) -> Result<(), NodeFailure> {
    for k in 0..steps {
        let t = t0 + k as f64 * dt;
        let Scratch { k: ks, tmp, inter } = &mut *s;
        let [k1, k2, k3, k4] = ks;
        model.evaluate(t, y, params, k1, inter);
        match scheme {
            Scheme::ForwardEuler => {
                for (yi, ki) in y.iter_mut().zip(k1.iter()) {
                    *yi += dt * ki;
                }
            }
            Scheme::Heun => {
                for ((ti, yi), ki) in tmp.iter_mut().zip(y.iter()).zip(k1.iter()) {
                    *ti = yi + dt * ki;
                }
                model.evaluate(t + dt, tmp, params, k2, inter);
                for ((yi, a), b) in y.iter_mut().zip(k1.iter()).zip(k2.iter()) {
                    *yi += 0.5 * dt * (a + b);
                }
            }
            Scheme::RungeKutta4 => {
                let half = 0.5 * dt;
                for ((ti, yi), ki) in tmp.iter_mut().zip(y.iter()).zip(k1.iter()) {
                    *ti = yi + half * ki;
                }
                model.evaluate(t + half, tmp, params, k2, inter);
                for ((ti, yi), ki) in tmp.iter_mut().zip(y.iter()).zip(k2.iter()) {
                    *ti = yi + half * ki;
                }
                model.evaluate(t + half, tmp, params, k3, inter);
                for ((ti, yi), ki) in tmp.iter_mut().zip(y.iter()).zip(k3.iter()) {
                    *ti = yi + dt * ki;
                }
                model.evaluate(t + dt, tmp, params, k4, inter);
                for (i, yi) in y.iter_mut().enumerate() {
                    *yi += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
                }
            }
        }
        if let Some(variable) = y.iter().position(|v| !v.is_finite()) {
            return Err(NodeFailure {
                variable,
                sub_step: k + 1,
            });
        }
    }
    // Intermediates consistent with the final state.
    let [k1, ..] = &mut s.k;
    model.evaluate(t0 + steps as f64 * dt, y, params, k1, &mut s.inter);
    Ok(())
}
