//! Per-node reaction state.

use crate::environment::{Environment, ResolvedVariable};
use cardion_core::ConfigError;

/// State, parameters and wanted intermediates of every owned node.
///
/// Stored node-major in one flat buffer: each node's record is
/// `[states.., params.., wanted..]`, so a node's data is contiguous and
/// the integrator can hand disjoint records to worker threads.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionState {
    node_count: usize,
    states: usize,
    params: usize,
    wanted: usize,
    data: Vec<f64>,
}

impl ReactionState {
    /// Create state for `node_count` nodes from the model's defaults.
    ///
    /// Wanted intermediates start at zero until the first integration.
    pub fn new(env: &Environment, node_count: usize) -> Self {
        let states = env.state_count();
        let params = env.parameter_count();
        let wanted = env.wanted().len();
        let mut record = Vec::with_capacity(states + params + wanted);
        record.extend_from_slice(env.initial_state());
        record.extend_from_slice(env.default_parameters());
        record.resize(states + params + wanted, 0.0);

        let mut data = Vec::with_capacity(record.len() * node_count);
        for _ in 0..node_count {
            data.extend_from_slice(&record);
        }
        Self {
            node_count,
            states,
            params,
            wanted,
            data,
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Length of one node record.
    pub fn stride(&self) -> usize {
        self.states + self.params + self.wanted
    }

    pub(crate) fn layout(&self) -> (usize, usize, usize) {
        (self.states, self.params, self.wanted)
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn offset(&self, var: ResolvedVariable) -> usize {
        match var {
            ResolvedVariable::State(i) => i as usize,
            ResolvedVariable::Parameter(i) => self.states + i as usize,
            ResolvedVariable::Intermediate { slot, .. } => self.states + self.params + slot as usize,
        }
    }

    /// Value of a variable at one node.
    ///
    /// # Panics
    ///
    /// Panics if `node` is out of range or `var` was resolved against a
    /// different environment.
    pub fn get(&self, node: usize, var: ResolvedVariable) -> f64 {
        self.data[node * self.stride() + self.offset(var)]
    }

    /// The state vector of one node.
    pub fn states(&self, node: usize) -> &[f64] {
        let start = node * self.stride();
        &self.data[start..start + self.states]
    }

    /// Set a state variable or known parameter at one node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVariableUsage`] for intermediates.
    pub fn set(&mut self, node: usize, var: ResolvedVariable, value: f64) -> Result<(), ConfigError> {
        check_writable(var)?;
        let i = node * self.stride() + self.offset(var);
        self.data[i] = value;
        Ok(())
    }

    /// Copy `values[n]` into `var` of node `n`, for every node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVariableUsage`] for intermediates,
    /// [`ConfigError::FieldLengthMismatch`] if `values` is shorter than the
    /// node count. Nothing is written on error.
    pub fn set_all(&mut self, var: ResolvedVariable, values: &[f64]) -> Result<(), ConfigError> {
        check_writable(var)?;
        self.check_len(values.len())?;
        let (stride, offset) = (self.stride(), self.offset(var));
        for (record, &v) in self.data.chunks_exact_mut(stride).zip(values) {
            record[offset] = v;
        }
        Ok(())
    }

    /// Copy `var` of node `n` into `out[n]`, for every node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FieldLengthMismatch`] if `out` is shorter than the node
    /// count.
    pub fn get_all(&self, var: ResolvedVariable, out: &mut [f64]) -> Result<(), ConfigError> {
        self.check_len(out.len())?;
        let (stride, offset) = (self.stride(), self.offset(var));
        for (record, slot) in self.data.chunks_exact(stride).zip(out.iter_mut()) {
            *slot = record[offset];
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), ConfigError> {
        if len < self.node_count {
            return Err(ConfigError::FieldLengthMismatch {
                name: "reaction state".into(),
                expected: self.node_count,
                actual: len,
            });
        }
        Ok(())
    }
}

fn check_writable(var: ResolvedVariable) -> Result<(), ConfigError> {
    if let ResolvedVariable::Intermediate { model_index, .. } = var {
        return Err(ConfigError::InvalidVariableUsage {
            name: format!("intermediate #{model_index}"),
            usage: "a coupling target",
        });
    }
    Ok(())
}
