//! Deduplicated, insertion-ordered store of output blocks.

use crate::error::InvariantViolation;
use std::collections::HashMap;

/// One uniquely identified block of output text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: String,
    pub content: String,
}

impl Declaration {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Holds every declaration of a run exactly once, in first-insertion order.
#[derive(Debug, Default)]
pub struct DeclarationRegistry {
    declarations: Vec<Declaration>,
    keys: HashMap<String, usize>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration. Resubmitting an id with identical content is a
    /// no-op; different content under a known id is a conflict.
    pub fn add(&mut self, declaration: Declaration) -> Result<(), InvariantViolation> {
        if let Some(&index) = self.keys.get(&declaration.id) {
            if self.declarations[index].content != declaration.content {
                return Err(InvariantViolation::DeclarationConflict { id: declaration.id });
            }
            return Ok(());
        }
        self.keys
            .insert(declaration.id.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.keys.get(id).map(|&i| &self.declarations[i])
    }

    pub fn list(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Contents in registry order, each followed by a newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for declaration in &self.declarations {
            out.push_str(&declaration.content);
            out.push('\n');
        }
        out
    }
}
