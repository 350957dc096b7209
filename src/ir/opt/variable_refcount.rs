//! Per-variable reference counts.

use std::collections::BTreeMap;

use crate::ir::{
    visit::{walk_statements, VisitAction, VisitCx, Visitor},
    Assignment, Shader, Statement, VarRef,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableEntry {
    /// A declaration of the variable lies inside the counted statements.
    pub declared: bool,
    /// Every dereference, reads and writes alike.
    pub referenced_count: u32,
    pub assigned_count: u32,
    /// Assignments made while every reference seen so far was itself a write, identified by
    /// their position among all assignments to the variable in traversal order.
    pub write_only_assignments: Vec<u32>,
}
impl VariableEntry {
    /// No reference reads the variable.
    pub const fn is_write_only(&self) -> bool {
        self.referenced_count == self.assigned_count
    }
}

#[derive(Debug, Default)]
pub struct VariableRefcount {
    pub entries: BTreeMap<VarRef, VariableEntry>,
}
impl VariableRefcount {
    /// Counts over `stmts`, descending into the bodies of any function statements among them.
    pub fn count(shader: &Shader, stmts: &[Statement]) -> Self {
        let mut counts = Self::default();
        walk_statements(&mut counts, stmts, VisitCx::new(shader));
        counts
    }

    pub fn get(&self, v: VarRef) -> Option<&VariableEntry> {
        self.entries.get(&v)
    }
}
impl Visitor for VariableRefcount {
    fn visit_declaration(&mut self, var: VarRef, _: VisitCx) -> VisitAction {
        self.entries.entry(var).or_default().declared = true;
        VisitAction::Continue
    }

    fn visit_variable(&mut self, var: VarRef, _: VisitCx) -> VisitAction {
        self.entries.entry(var).or_default().referenced_count += 1;
        VisitAction::Continue
    }

    fn leave_assignment(&mut self, a: &Assignment, _: VisitCx) -> VisitAction {
        if let Some(v) = a.lhs.variable_referenced() {
            let e = self.entries.entry(v).or_default();
            let ordinal = e.assigned_count;
            e.assigned_count += 1;
            debug_assert!(e.referenced_count >= e.assigned_count);
            if e.is_write_only() {
                e.write_only_assignments.push(ordinal);
            }
        }

        VisitAction::Continue
    }
}
