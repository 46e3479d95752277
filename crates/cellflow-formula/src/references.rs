//! Batched resolution of defined names

use crate::builder::TokenKey;
use crate::dispatcher::{NodeFunction, NodeId};
use crate::error::{FormulaError, FormulaResult};
use crate::value::FormulaValue;
use std::sync::Arc;

/// Defined-name leaves collected while building, resolved by one node
///
/// Entries keep registration order; the batch node has one output per entry
/// in that same order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBatch {
    entries: Vec<BatchEntry>,
}

#[derive(Debug, Clone)]
struct BatchEntry {
    token: TokenKey,
    name: String,
    node: NodeId,
}

impl ReferenceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: TokenKey, name: impl Into<String>, node: NodeId) {
        self.entries.push(BatchEntry {
            token,
            name: name.into(),
            node,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Batched tokens, in registration order
    pub fn tokens(&self) -> Vec<TokenKey> {
        self.entries.iter().map(|e| e.token).collect()
    }

    /// Output node per batched token
    pub fn outputs(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.node.clone()).collect()
    }

    /// Callable mapping the name table to one value per batched token
    pub fn compile(&self) -> NodeFunction {
        let names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        Arc::new(
            move |args: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> {
                match args.first() {
                    Some(FormulaValue::Names(env)) => {
                        Ok(names.iter().map(|name| env.resolve(name)).collect())
                    }
                    other => Err(FormulaError::Evaluation(format!(
                        "expected a name table, got {:?}",
                        other
                    ))),
                }
            },
        )
    }
}
