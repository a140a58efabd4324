//! Debug annotation tree
//!
//! `annotate` walks a node and its children for the context's current
//! document and reports what each node sees: its candidate, whether it
//! matches, and the value it produces.

use serde::Serialize;

use crate::{DocId, Result, TERMINATED};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub operator: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parameters: String,
    /// Current candidate, `None` once the node is done
    pub candidate: Option<DocId>,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Annotation>,
}

impl Annotation {
    pub fn new(operator: &str, candidate: DocId, matched: bool) -> Self {
        Self {
            operator: operator.to_string(),
            parameters: String::new(),
            candidate: (candidate != TERMINATED).then_some(candidate),
            matched,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = parameters.into();
        self
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<Annotation>) -> Self {
        self.children = children;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Depth-first search by operator name
    pub fn find(&self, operator: &str) -> Option<&Annotation> {
        if self.operator == operator {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(operator))
    }
}
