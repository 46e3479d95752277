//! Postfix token stream → dataflow graph
//!
//! [`GraphBuilder`] is a stack machine. Operands are pushed without touching
//! the graph; an operator or function pops its arguments, asks for their node
//! ids (registering leaves on demand) and registers one function node.
//!
//! Identical subexpressions share a derived id. The first occurrence gets the
//! compute node; every later one gets a passthrough alias under a fresh id, so
//! each token keeps its own node while the work is done once.
//!
//! Lifecycle: `append`* → `finish` → `compile`. `compile` consumes the
//! builder and folds every value it can compute into a constant.

use crate::dispatcher::{passthrough, Dispatcher, FunctionKind, NodeId, Solution};
use crate::error::{FormulaError, FormulaResult};
use crate::pipeline::CompiledPipeline;
use crate::references::ReferenceBatch;
use crate::settings::BuilderSettings;
use crate::token::{Operand, Token};
use crate::value::FormulaValue;
use std::sync::Arc;

/// Identity of one appended token
///
/// Two appends of equal tokens get distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey(pub(crate) usize);

impl TokenKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Registration state of an appended token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// Operand pushed, no node yet
    Pending,
    /// Backed by this node
    Registered(NodeId),
}

#[derive(Debug)]
struct Entry {
    token: Token,
    expression: String,
    arguments: Vec<TokenKey>,
    state: TokenState,
}

#[derive(Debug)]
enum Phase {
    Building,
    Finished { output: NodeId },
}

/// Builds the graph of one formula
#[derive(Debug)]
pub struct GraphBuilder {
    dsp: Dispatcher,
    settings: BuilderSettings,
    entries: Vec<Entry>,
    stack: Vec<TokenKey>,
    references: ReferenceBatch,
    phase: Phase,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::with_dispatcher(Dispatcher::new(), BuilderSettings::default())
    }

    pub fn with_settings(settings: BuilderSettings) -> Self {
        Self::with_dispatcher(Dispatcher::new(), settings)
    }

    /// Build into an existing graph
    pub fn with_dispatcher(dsp: Dispatcher, settings: BuilderSettings) -> Self {
        Self {
            dsp,
            settings,
            entries: Vec::new(),
            stack: Vec::new(),
            references: ReferenceBatch::new(),
            phase: Phase::Building,
        }
    }

    /// Append the next token of the postfix stream
    ///
    /// Fails with [`FormulaError::Arity`] when the stack holds fewer values
    /// than the token consumes; the graph is left untouched in that case.
    pub fn append(&mut self, token: Token) -> FormulaResult<TokenKey> {
        self.ensure_building()?;

        let function = match &token {
            Token::Operand(_) => None,
            Token::Operator(op) => Some(op.compile()),
            Token::Function(f) => Some(f.compile()?),
        };
        let Some(function) = function else {
            let expression = token.expression(&[]);
            tracing::trace!(%expression, "operand pushed");
            return Ok(self.push(token, expression, Vec::new(), TokenState::Pending));
        };

        let arity = token.arity();
        if self.stack.len() < arity {
            return Err(FormulaError::Arity {
                token: token.label(),
                expected: arity,
                available: self.stack.len(),
            });
        }
        let arguments = self.stack.split_off(self.stack.len() - arity);

        let inputs = arguments
            .iter()
            .map(|&key| self.get_node_id(key))
            .collect::<FormulaResult<Vec<_>>>()?;
        let expression = {
            let args: Vec<&str> = arguments
                .iter()
                .map(|key| self.entries[key.0].expression.as_str())
                .collect();
            token.expression(&args)
        };

        let node_id = if !self.dsp.contains_data(&expression) {
            let out = NodeId::new(&expression);
            let function_id = self.dsp.add_function(
                &token.label(),
                &self.settings.function_pattern,
                FunctionKind::Compute,
                function,
                inputs,
                vec![out.clone()],
            );
            tracing::debug!(node = %out, function = %function_id, "registered compute node");
            out
        } else {
            let existing = NodeId::new(&expression);
            let alias = self
                .dsp
                .allocate_unique_id(&expression, &self.settings.alias_pattern);
            self.dsp.add_function(
                "bypass",
                &self.settings.function_pattern,
                FunctionKind::Passthrough,
                passthrough(),
                vec![existing.clone()],
                vec![alias.clone()],
            );
            tracing::debug!(node = %alias, of = %existing, "aliased repeated subexpression");
            alias
        };

        Ok(self.push(token, expression, arguments, TokenState::Registered(node_id)))
    }

    /// Node id backing a token's value, registering a pending leaf on first use
    ///
    /// Repeated calls return the same id.
    pub fn get_node_id(&mut self, key: TokenKey) -> FormulaResult<NodeId> {
        let entry = self
            .entries
            .get(key.0)
            .ok_or(FormulaError::Misuse("token key from another builder"))?;

        let operand = match (&entry.state, &entry.token) {
            (TokenState::Registered(id), _) => return Ok(id.clone()),
            (TokenState::Pending, Token::Operand(operand)) => operand.clone(),
            (TokenState::Pending, _) => {
                return Err(FormulaError::Misuse("call token without a node"));
            }
        };

        let expression = entry.expression.clone();
        let id = match &operand {
            Operand::Name(name) => {
                let id = self.dsp.add_data(expression, None);
                self.references.push(key, name.clone(), id.clone());
                tracing::trace!(node = %id, "name queued for batch resolution");
                id
            }
            Operand::Literal(_) | Operand::Range(_) => {
                let id = self.dsp.add_data(expression, operand.compile());
                tracing::trace!(node = %id, "leaf registered");
                id
            }
        };

        self.entries[key.0].state = TokenState::Registered(id.clone());
        Ok(id)
    }

    /// Close the stream: register unused leaves, wire the name batch and
    /// attach the result filter to the terminal node
    ///
    /// Returns the terminal node id.
    pub fn finish(&mut self) -> FormulaResult<NodeId> {
        self.ensure_building()?;
        let Some(&last) = self.stack.last() else {
            return Err(FormulaError::EmptyStream);
        };
        if self.stack.len() > 1 {
            tracing::warn!(
                leftover = self.stack.len() - 1,
                "stream left extra values on the stack; using the last one"
            );
        }

        for key in self.pending_leaves() {
            self.get_node_id(key)?;
        }
        if !self.pending_leaves().is_empty() {
            return Err(FormulaError::Misuse("leaf left unregistered after finish"));
        }

        if !self.references.is_empty() {
            let names_input = NodeId::new(&self.settings.names_input);
            let function_id = self.dsp.add_function(
                "references",
                &self.settings.function_pattern,
                FunctionKind::References,
                self.references.compile(),
                vec![names_input],
                self.references.outputs(),
            );
            tracing::debug!(
                function = %function_id,
                names = self.references.len(),
                "registered name batch"
            );
        }

        let output = self.get_node_id(last)?;
        if self.settings.normalize_result {
            self.dsp
                .node_attributes_mut(output.as_str())?
                .filters
                .push(Arc::new(FormulaValue::normalize));
        }

        tracing::debug!(
            %output,
            tokens = self.entries.len(),
            nodes = self.dsp.node_count(),
            "finished formula graph"
        );
        self.phase = Phase::Finished {
            output: output.clone(),
        };
        Ok(output)
    }

    /// Compile with nothing known in advance
    pub fn compile(self) -> FormulaResult<CompiledPipeline> {
        self.compile_with(std::iter::empty::<(NodeId, FormulaValue)>())
    }

    /// Fold the graph against `known` inputs and wrap it as a pipeline
    ///
    /// Every node the dispatch reaches keeps its value as a permanent default.
    /// The pipeline's inputs are the data nodes left with neither a default
    /// nor a producer, sorted by id.
    pub fn compile_with<I, K>(mut self, known: I) -> FormulaResult<CompiledPipeline>
    where
        I: IntoIterator<Item = (K, FormulaValue)>,
        K: Into<NodeId>,
    {
        let Phase::Finished { output } = &self.phase else {
            return Err(FormulaError::Misuse("compile called before finish"));
        };
        let output = output.clone();

        let known: Solution = known.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let solution = self.dsp.dispatch(&known)?;
        let folded = solution.len();
        for (id, value) in solution {
            self.dsp.add_data(id, Some(value));
        }

        let mut inputs: Vec<NodeId> = self
            .dsp
            .data_nodes()
            .filter(|id| {
                self.dsp.default_value(id.as_str()).is_none()
                    && self.dsp.predecessors(id.as_str()).is_empty()
            })
            .cloned()
            .collect();
        inputs.sort();

        tracing::debug!(%output, folded, inputs = ?inputs, "compiled pipeline");
        Ok(CompiledPipeline::new(self.dsp, output, inputs))
    }

    /// The token appended under `key`
    pub fn token(&self, key: TokenKey) -> Option<&Token> {
        self.entries.get(key.0).map(|e| &e.token)
    }

    /// Derived id of the token appended under `key`
    pub fn expression(&self, key: TokenKey) -> Option<&str> {
        self.entries.get(key.0).map(|e| e.expression.as_str())
    }

    /// Arguments bound to an operator or function, left to right
    pub fn arguments(&self, key: TokenKey) -> &[TokenKey] {
        self.entries.get(key.0).map_or(&[], |e| &e.arguments)
    }

    pub fn state(&self, key: TokenKey) -> Option<&TokenState> {
        self.entries.get(key.0).map(|e| &e.state)
    }

    /// Node id of a token, if it is registered yet
    pub fn node_id(&self, key: TokenKey) -> Option<&NodeId> {
        match self.state(key)? {
            TokenState::Registered(id) => Some(id),
            TokenState::Pending => None,
        }
    }

    /// Operands pushed but not yet backed by a node, in append order
    pub fn pending_leaves(&self) -> Vec<TokenKey> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == TokenState::Pending)
            .map(|(i, _)| TokenKey(i))
            .collect()
    }

    pub fn references(&self) -> &ReferenceBatch {
        &self.references
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dsp
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    /// Values currently on the stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Terminal node id, once finished
    pub fn output(&self) -> Option<&NodeId> {
        match &self.phase {
            Phase::Finished { output } => Some(output),
            Phase::Building => None,
        }
    }

    fn push(
        &mut self,
        token: Token,
        expression: String,
        arguments: Vec<TokenKey>,
        state: TokenState,
    ) -> TokenKey {
        let key = TokenKey(self.entries.len());
        self.entries.push(Entry {
            token,
            expression,
            arguments,
            state,
        });
        self.stack.push(key);
        key
    }

    fn ensure_building(&self) -> FormulaResult<()> {
        match self.phase {
            Phase::Building => Ok(()),
            Phase::Finished { .. } => Err(FormulaError::Misuse("builder already finished")),
        }
    }
}

/// Append every token, finish, and compile against `known` inputs
pub fn compile_tokens<T, I, K>(tokens: T, known: I) -> FormulaResult<CompiledPipeline>
where
    T: IntoIterator<Item = Token>,
    I: IntoIterator<Item = (K, FormulaValue)>,
    K: Into<NodeId>,
{
    let mut builder = GraphBuilder::new();
    for token in tokens {
        builder.append(token)?;
    }
    builder.finish()?;
    builder.compile_with(known)
}
