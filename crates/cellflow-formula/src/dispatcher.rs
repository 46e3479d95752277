//! Dataflow graph engine
//!
//! A [`Dispatcher`] holds two kinds of nodes:
//! - data nodes, addressed by [`NodeId`], optionally carrying a default value
//!   and output filters
//! - function nodes, which read a list of data nodes and write another
//!
//! Function ids live in their own namespace, so a function node never shadows
//! a data node of the same name.
//!
//! [`Dispatcher::dispatch`] evaluates synchronously: it seeds every default,
//! overrides them with the given inputs, then runs each function whose inputs
//! are all known and whose outputs are not, until nothing more can run.

use crate::error::{FormulaError, FormulaResult};
use crate::value::FormulaValue;
use ahash::AHashMap;
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::Arc;

/// Address of a node in the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        NodeId(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(Arc::from(id))
    }
}

/// Callable behind a function node: argument values in, one value per output
pub type NodeFunction =
    Arc<dyn Fn(&[FormulaValue]) -> FormulaResult<Vec<FormulaValue>> + Send + Sync>;

/// Transformation applied to every value written to a data node
pub type Filter = Arc<dyn Fn(FormulaValue) -> FormulaValue + Send + Sync>;

/// Solution of one dispatch: every data node that received a value
pub type Solution = AHashMap<NodeId, FormulaValue>;

/// Role of a function node, kept for introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Computes an operator or function token
    Compute,
    /// Forwards one data node to another
    Passthrough,
    /// Resolves a batch of defined names from the name table
    References,
}

/// Mutable attribute bag of a data node
#[derive(Clone, Default)]
pub struct NodeAttributes {
    pub default_value: Option<FormulaValue>,
    pub filters: Vec<Filter>,
}

impl NodeAttributes {
    fn filtered(&self, value: FormulaValue) -> FormulaValue {
        self.filters.iter().fold(value, |v, filter| filter(v))
    }
}

impl fmt::Debug for NodeAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeAttributes")
            .field("default_value", &self.default_value)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// A registered function node
#[derive(Clone)]
pub struct FunctionNode {
    pub kind: FunctionKind,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
    function: NodeFunction,
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Forward the single input unchanged
pub fn passthrough() -> NodeFunction {
    Arc::new(|args: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> { Ok(args.to_vec()) })
}

/// The dataflow graph
#[derive(Clone, Default)]
pub struct Dispatcher {
    data: AHashMap<NodeId, NodeAttributes>,
    data_order: Vec<NodeId>,
    functions: AHashMap<NodeId, FunctionNode>,
    function_order: Vec<NodeId>,
    /// Data node -> function nodes writing it
    producers: AHashMap<NodeId, Vec<NodeId>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data node, or update the default of an existing one
    ///
    /// Re-registering an id is idempotent: the node keeps its edges and
    /// filters, and only a supplied default replaces the stored one.
    pub fn add_data(&mut self, id: impl Into<NodeId>, default: Option<FormulaValue>) -> NodeId {
        let id = id.into();
        match self.data.get_mut(&id) {
            Some(attrs) => {
                if default.is_some() {
                    attrs.default_value = default;
                }
            }
            None => {
                self.data.insert(
                    id.clone(),
                    NodeAttributes {
                        default_value: default,
                        filters: Vec::new(),
                    },
                );
                self.data_order.push(id.clone());
            }
        }
        id
    }

    /// Register a function node reading `inputs` and writing `outputs`
    ///
    /// The function id is `seed` when free, else the first free id generated
    /// from `pattern`. Missing input and output data nodes are created.
    pub fn add_function(
        &mut self,
        seed: &str,
        pattern: &str,
        kind: FunctionKind,
        function: NodeFunction,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
    ) -> NodeId {
        let id = unused_id(seed, pattern, |candidate| {
            self.functions.contains_key(candidate)
        });

        for input in &inputs {
            self.add_data(input.clone(), None);
        }
        for output in &outputs {
            self.add_data(output.clone(), None);
            self.producers
                .entry(output.clone())
                .or_default()
                .push(id.clone());
        }

        tracing::trace!(function = %id, ?kind, ?inputs, ?outputs, "registered function node");
        self.functions.insert(
            id.clone(),
            FunctionNode {
                kind,
                inputs,
                outputs,
                function,
            },
        );
        self.function_order.push(id.clone());
        id
    }

    /// First data id not in use: `seed` itself, or `pattern` filled with a counter
    pub fn allocate_unique_id(&self, seed: &str, pattern: &str) -> NodeId {
        unused_id(seed, pattern, |candidate| self.data.contains_key(candidate))
    }

    /// Whether a data node with this id exists
    pub fn contains_data(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }

    /// Whether any node, data or function, has this id
    pub fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id) || self.functions.contains_key(id)
    }

    pub fn node_attributes(&self, id: &str) -> FormulaResult<&NodeAttributes> {
        self.data
            .get(id)
            .ok_or_else(|| FormulaError::UnknownNode(id.to_string()))
    }

    pub fn node_attributes_mut(&mut self, id: &str) -> FormulaResult<&mut NodeAttributes> {
        self.data
            .get_mut(id)
            .ok_or_else(|| FormulaError::UnknownNode(id.to_string()))
    }

    pub fn default_value(&self, id: &str) -> Option<&FormulaValue> {
        self.data.get(id).and_then(|attrs| attrs.default_value.as_ref())
    }

    /// Incoming edges: producing functions of a data node, inputs of a function node
    pub fn predecessors(&self, id: &str) -> &[NodeId] {
        if let Some(function) = self.functions.get(id) {
            return &function.inputs;
        }
        self.producers.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn function(&self, id: &str) -> Option<&FunctionNode> {
        self.functions.get(id)
    }

    /// Data node ids in registration order
    pub fn data_nodes(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.data_order.iter()
    }

    /// Function nodes in registration order
    pub fn function_nodes(&self) -> impl Iterator<Item = (&NodeId, &FunctionNode)> + '_ {
        self.function_order
            .iter()
            .filter_map(|id| self.functions.get_key_value(id))
    }

    pub fn node_count(&self) -> usize {
        self.data.len() + self.functions.len()
    }

    /// Evaluate everything reachable from the defaults and `inputs`
    ///
    /// Inputs naming no data node are ignored. A function runs once all its
    /// inputs are known, unless every one of its outputs already is.
    /// Errors raised by a function abort the dispatch unchanged.
    pub fn dispatch(&self, inputs: &Solution) -> FormulaResult<Solution> {
        let mut solution = Solution::with_capacity(self.data.len());
        for (id, attrs) in &self.data {
            if let Some(value) = &attrs.default_value {
                solution.insert(id.clone(), attrs.filtered(value.clone()));
            }
        }
        for (id, value) in inputs {
            match self.data.get(id) {
                Some(attrs) => {
                    solution.insert(id.clone(), attrs.filtered(value.clone()));
                }
                None => tracing::trace!(input = %id, "ignoring input for unknown node"),
            }
        }

        let mut pending: Vec<&NodeId> = self
            .function_order
            .iter()
            .filter(|id| {
                let node = &self.functions[*id];
                !node.outputs.iter().all(|out| solution.contains_key(out))
            })
            .collect();

        loop {
            let before = pending.len();
            let mut waiting = Vec::with_capacity(pending.len());
            for id in pending {
                let node = &self.functions[id];
                let args: Option<Vec<FormulaValue>> = node
                    .inputs
                    .iter()
                    .map(|input| solution.get(input).cloned())
                    .collect();
                let Some(args) = args else {
                    waiting.push(id);
                    continue;
                };

                tracing::trace!(function = %id, "running function node");
                let results = (node.function)(&args)?;
                if results.len() != node.outputs.len() {
                    return Err(FormulaError::Evaluation(format!(
                        "function node {} produced {} value(s) for {} output(s)",
                        id,
                        results.len(),
                        node.outputs.len()
                    )));
                }
                for (out, value) in node.outputs.iter().zip(results) {
                    if !solution.contains_key(out) {
                        let value = self.data[out].filtered(value);
                        solution.insert(out.clone(), value);
                    }
                }
            }
            pending = waiting;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        Ok(solution)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("data", &self.data_order)
            .field("functions", &self.function_order)
            .finish()
    }
}

fn unused_id(seed: &str, pattern: &str, taken: impl Fn(&str) -> bool) -> NodeId {
    if !taken(seed) {
        return NodeId::new(seed);
    }
    // A pattern without a counter would yield one candidate forever
    let pattern = if pattern.contains("{n}") {
        Cow::Borrowed(pattern)
    } else {
        Cow::Owned(format!("{}{{n}}", pattern))
    };
    let mut n: u64 = 0;
    loop {
        let candidate = pattern
            .replace("{seed}", seed)
            .replace("{n}", &n.to_string());
        if !taken(&candidate) {
            return NodeId::from(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn add_one() -> NodeFunction {
        Arc::new(|args: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> {
            Ok(vec![FormulaValue::Number(args[0].as_number().unwrap_or(0.0) + 1.0)])
        })
    }

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::new(n)).collect()
    }

    #[test]
    fn test_add_data_is_idempotent() {
        let mut dsp = Dispatcher::new();
        dsp.add_data("a", Some(1.0.into()));
        dsp.add_data("a", None);
        assert_eq!(dsp.default_value("a"), Some(&FormulaValue::Number(1.0)));
        dsp.add_data("a", Some(2.0.into()));
        assert_eq!(dsp.default_value("a"), Some(&FormulaValue::Number(2.0)));
        assert_eq!(dsp.data_nodes().count(), 1);
    }

    #[test]
    fn test_function_ids_are_unique_and_separate_from_data() {
        let mut dsp = Dispatcher::new();
        dsp.add_data("inc", None);
        let f1 = dsp.add_function("inc", "{seed}<{n}>", FunctionKind::Compute, add_one(), ids(&["a"]), ids(&["b"]));
        let f2 = dsp.add_function("inc", "{seed}<{n}>", FunctionKind::Compute, add_one(), ids(&["b"]), ids(&["c"]));
        assert_eq!(f1.as_str(), "inc");
        assert_eq!(f2.as_str(), "inc<0>");
        assert!(dsp.contains_data("inc"));
        assert_eq!(dsp.predecessors("c"), &ids(&["inc<0>"])[..]);
        assert_eq!(dsp.predecessors("inc<0>"), &ids(&["b"])[..]);
        assert!(dsp.predecessors("a").is_empty());
    }

    #[test]
    fn test_allocate_unique_id() {
        let mut dsp = Dispatcher::new();
        assert_eq!(dsp.allocate_unique_id("x", "c{n}>{seed}").as_str(), "x");
        dsp.add_data("x", None);
        dsp.add_data("c0>x", None);
        assert_eq!(dsp.allocate_unique_id("x", "c{n}>{seed}").as_str(), "c1>x");
    }

    #[test]
    fn test_allocate_unique_id_without_counter_in_pattern() {
        let mut dsp = Dispatcher::new();
        for _ in 0..4 {
            let id = dsp.allocate_unique_id("x", "{seed}'");
            dsp.add_data(id, None);
        }
        assert_eq!(
            dsp.data_nodes().map(NodeId::as_str).collect::<Vec<_>>(),
            vec!["x", "x'0", "x'1", "x'2"]
        );

        let f1 = dsp.add_function("f", "{seed}!", FunctionKind::Compute, add_one(), vec![], vec![]);
        let f2 = dsp.add_function("f", "{seed}!", FunctionKind::Compute, add_one(), vec![], vec![]);
        assert_eq!((f1.as_str(), f2.as_str()), ("f", "f!0"));
    }

    #[test]
    fn test_dispatch_chain() {
        let mut dsp = Dispatcher::new();
        dsp.add_function("f", "{seed}<{n}>", FunctionKind::Compute, add_one(), ids(&["a"]), ids(&["b"]));
        dsp.add_function("g", "{seed}<{n}>", FunctionKind::Compute, add_one(), ids(&["b"]), ids(&["c"]));

        let solution = dsp.dispatch(&Solution::default()).unwrap();
        assert!(solution.is_empty());

        let mut inputs = Solution::default();
        inputs.insert("a".into(), 1.0.into());
        inputs.insert("zzz".into(), 1.0.into());
        let solution = dsp.dispatch(&inputs).unwrap();
        assert_eq!(solution.get("c"), Some(&FormulaValue::Number(3.0)));
        assert!(!solution.contains_key("zzz"));
    }

    #[test]
    fn test_dispatch_skips_known_outputs_and_applies_filters() {
        let mut dsp = Dispatcher::new();
        dsp.add_function("f", "{seed}<{n}>", FunctionKind::Compute, add_one(), ids(&["a"]), ids(&["b"]));
        dsp.node_attributes_mut("b")
            .unwrap()
            .filters
            .push(Arc::new(|v: FormulaValue| FormulaValue::Number(v.as_number().unwrap_or(0.0) * 10.0)));

        let mut inputs = Solution::default();
        inputs.insert("a".into(), 1.0.into());
        assert_eq!(dsp.dispatch(&inputs).unwrap()["b"], FormulaValue::Number(20.0));

        inputs.insert("b".into(), 5.0.into());
        assert_eq!(dsp.dispatch(&inputs).unwrap()["b"], FormulaValue::Number(50.0));
    }

    #[test]
    fn test_dispatch_propagates_function_errors() {
        let mut dsp = Dispatcher::new();
        let failing: NodeFunction = Arc::new(|_: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> {
            Err(FormulaError::Evaluation("boom".into()))
        });
        dsp.add_function("f", "{seed}<{n}>", FunctionKind::Compute, failing, vec![], ids(&["out"]));
        assert_eq!(
            dsp.dispatch(&Solution::default()).unwrap_err(),
            FormulaError::Evaluation("boom".into())
        );
    }

    #[test]
    fn test_unknown_node_attributes() {
        let mut dsp = Dispatcher::new();
        assert_eq!(
            dsp.node_attributes_mut("nope").unwrap_err(),
            FormulaError::UnknownNode("nope".into())
        );
    }
}
