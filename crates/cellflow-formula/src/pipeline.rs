//! Compiled, callable formula pipelines

use crate::dispatcher::{Dispatcher, NodeId, Solution};
use crate::error::{FormulaError, FormulaResult};
use crate::value::FormulaValue;

/// A folded formula graph exposed as a function of its remaining inputs
///
/// The graph is frozen once compiled. Each call dispatches into a private
/// solution map, so a pipeline can be shared and called from several threads
/// at once.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    dsp: Dispatcher,
    output: NodeId,
    inputs: Vec<NodeId>,
}

impl CompiledPipeline {
    pub(crate) fn new(dsp: Dispatcher, output: NodeId, inputs: Vec<NodeId>) -> Self {
        Self {
            dsp,
            output,
            inputs,
        }
    }

    /// Pipeline name, `=` followed by the terminal node id
    pub fn name(&self) -> String {
        format!("={}", self.output)
    }

    /// Terminal node id
    pub fn output(&self) -> &NodeId {
        &self.output
    }

    /// Required inputs, in the order [`call`](Self::call) expects them
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Whether the formula folded down to a constant
    pub fn is_constant(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dsp
    }

    /// Evaluate with one value per required input, positionally
    pub fn call(&self, values: &[FormulaValue]) -> FormulaResult<FormulaValue> {
        if values.len() != self.inputs.len() {
            return Err(FormulaError::InputCount {
                expected: self.inputs.len(),
                actual: values.len(),
            });
        }
        let inputs: Solution = self
            .inputs
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect();
        self.run(&inputs)
    }

    /// Evaluate with a complete `input id → value` assignment
    pub fn call_named<K, I>(&self, values: I) -> FormulaResult<FormulaValue>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, FormulaValue)>,
    {
        let mut inputs = Solution::with_capacity(self.inputs.len());
        for (key, value) in values {
            let key = key.as_ref();
            let id = self
                .inputs
                .iter()
                .find(|id| id.as_str() == key)
                .ok_or_else(|| FormulaError::UnknownInput(key.to_string()))?;
            inputs.insert(id.clone(), value);
        }
        if let Some(missing) = self.inputs.iter().find(|id| !inputs.contains_key(*id)) {
            return Err(FormulaError::MissingInput(missing.to_string()));
        }
        self.run(&inputs)
    }

    fn run(&self, inputs: &Solution) -> FormulaResult<FormulaValue> {
        let mut solution = self.dsp.dispatch(inputs)?;
        solution
            .remove(&self.output)
            .ok_or_else(|| FormulaError::Unresolved(self.output.to_string()))
    }
}
