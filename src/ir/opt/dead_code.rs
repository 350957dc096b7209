//! Removal of variables that are written but never read.

use std::collections::{BTreeMap, BTreeSet};

use super::variable_refcount::VariableRefcount;
use crate::{
    ir::{Shader, Statement, VarRef},
    symbol::meta::{InterfacePacking, VariableFlags, VariableMode},
};

/// What one invocation deletes.
#[derive(Debug, Default)]
struct DeadPlan {
    /// Assignment ordinals (see [`VariableEntry::write_only_assignments`]) per variable.
    ///
    /// [`VariableEntry::write_only_assignments`]: super::variable_refcount::VariableEntry::write_only_assignments
    assignments: BTreeMap<VarRef, BTreeSet<u32>>,
    declarations: BTreeSet<VarRef>,
}
impl DeadPlan {
    fn new(shader: &Shader, counts: &VariableRefcount, uniform_locations_assigned: bool) -> Self {
        let mut plan = Self::default();

        for (&v, entry) in &counts.entries {
            // parameters and globals outside the counted scope are never declared here
            if !entry.declared || !entry.is_write_only() {
                continue;
            }
            let var = shader.var(v);
            if var.flags.contains(VariableFlags::ALWAYS_ACTIVE_IO) {
                continue;
            }

            let mut assignments_left = !entry.write_only_assignments.is_empty();
            if assignments_left
                && !matches!(
                    var.mode,
                    VariableMode::FunctionOut
                        | VariableMode::FunctionInout
                        | VariableMode::ShaderOut
                        | VariableMode::ShaderStorage
                )
            {
                log::debug!(
                    "[dead_code] removing {} assignment(s) to {}",
                    entry.write_only_assignments.len(),
                    var.name
                );
                plan.assignments
                    .insert(v, entry.write_only_assignments.iter().copied().collect());
                assignments_left = false;
            }
            if assignments_left {
                continue;
            }

            if matches!(var.mode, VariableMode::Uniform | VariableMode::ShaderStorage) {
                // still part of the program interface
                if uniform_locations_assigned || var.constant_initializer.is_some() {
                    continue;
                }
                if var.is_in_buffer_block()
                    && var.attribute.interface_packing != Some(InterfacePacking::Packed)
                {
                    continue;
                }
                if var.ty.without_array().is_subroutine() {
                    continue;
                }
            }

            log::debug!("[dead_code] removing declaration of {}", var.name);
            plan.declarations.insert(v);
        }

        plan
    }

    fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.declarations.is_empty()
    }

    /// Deletes the planned statements, walking in the same order the counts were taken.
    fn apply(&self, shader: &mut Shader, stmts: &mut Vec<Statement>, seen: &mut BTreeMap<VarRef, u32>) -> bool {
        let mut modified = false;
        for mut s in core::mem::take(stmts) {
            let keep = match &mut s {
                Statement::Declaration(v) => !self.declarations.contains(v),
                Statement::Assign(a) => match a.lhs.variable_referenced() {
                    Some(v) => {
                        let n = seen.entry(v).or_default();
                        let ordinal = *n;
                        *n += 1;
                        !self
                            .assignments
                            .get(&v)
                            .is_some_and(|dead| dead.contains(&ordinal))
                    }
                    None => true,
                },
                Statement::If(i) => {
                    modified |= self.apply(shader, &mut i.then_instructions, seen);
                    modified |= self.apply(shader, &mut i.else_instructions, seen);
                    true
                }
                Statement::Loop(body) => {
                    modified |= self.apply(shader, body, seen);
                    true
                }
                &mut Statement::Function(f) => {
                    for sig in shader.function(f).signatures.clone() {
                        modified |= shader.with_body(sig, |shader, body| self.apply(shader, body, seen));
                    }
                    true
                }
                _ => true,
            };

            if keep {
                stmts.push(s);
            } else {
                modified = true;
            }
        }

        modified
    }
}

/// Linked-program variant: counts over every global and every function body at once, so
/// unread globals are removed as well as locals.
pub fn do_dead_code(shader: &mut Shader, uniform_locations_assigned: bool) -> bool {
    let counts = VariableRefcount::count(shader, &shader.instructions);
    let plan = DeadPlan::new(shader, &counts, uniform_locations_assigned);
    if plan.is_empty() {
        return false;
    }

    let mut instructions = core::mem::take(&mut shader.instructions);
    let modified = plan.apply(shader, &mut instructions, &mut BTreeMap::new());
    shader.instructions = instructions;

    modified
}

/// Per-shader variant: each function body on its own, touching only variables declared in it.
pub fn do_dead_code_unlinked(shader: &mut Shader) -> bool {
    shader.for_each_body(|shader, _, body| {
        let counts = VariableRefcount::count(shader, body);
        let plan = DeadPlan::new(shader, &counts, false);
        !plan.is_empty() && plan.apply(shader, body, &mut BTreeMap::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader};

    fn main_body(shader: &Shader) -> &[Statement] {
        &shader
            .signature(shader.main_signature().expect("main"))
            .body
    }

    #[test]
    fn unread_local_and_its_assignments_go() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () float unused)
                (declare () float t)
                (assign (x) (var_ref unused) (constant float (1.0)))
                (assign (x) (var_ref t) (constant float (2.0)))
                (assign (x) (var_ref o) (var_ref t))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_dead_code_unlinked(&mut shader));
        let text = print_statements(&shader, main_body(&shader));
        assert!(!text.contains("unused"), "{text}");
        assert_eq!(main_body(&shader).len(), 3);
    }

    #[test]
    fn outputs_keep_their_assignments() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (assign (x) (var_ref o) (constant float (2.0)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(!do_dead_code(&mut shader, false));
        assert_eq!(main_body(&shader).len(), 1);
        assert_eq!(shader.global_variables().len(), 1);
    }

    #[test]
    fn linked_mode_drops_unused_uniforms_unless_pinned() {
        const SOURCE: &str = r#"
            (declare (uniform) float free)
            (declare (uniform location=0) float placed)
            (declare (uniform std140) float blocked)
            (declare (uniform) float initialized (constant float (1.0)))
            (function main (signature void (parameters) ()))
        "#;

        let mut shader = read_shader(SOURCE).expect("valid source");
        assert!(do_dead_code(&mut shader, false));
        let names = shader
            .global_variables()
            .into_iter()
            .map(|v| shader.var(v).name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, ["placed", "blocked", "initialized"]);

        let mut shader = read_shader(SOURCE).expect("valid source");
        assert!(!do_dead_code(&mut shader, true));
        assert_eq!(shader.global_variables().len(), 4);
    }

    #[test]
    fn always_active_survives() {
        let mut shader = read_shader(
            r#"
            (declare (shader_in always_active) vec4 v)
            (function main (signature void (parameters) ()))
            "#,
        )
        .expect("valid source");
        assert!(!do_dead_code(&mut shader, false));
    }

    #[test]
    fn write_after_last_read_is_removed() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () float t)
                (assign (x) (var_ref t) (constant float (1.0)))
                (assign (x) (var_ref o) (var_ref t))
                (assign (x) (var_ref t) (constant float (2.0)))
            )))
            "#,
        )
        .expect("valid source");

        // the trailing write comes after a read, so the variable is not write-only
        assert!(!do_dead_code_unlinked(&mut shader));
        assert_eq!(main_body(&shader).len(), 4);
    }

    #[test]
    fn a_chain_needs_one_run_per_link() {
        let mut shader = read_shader(
            r#"
            (function main (signature void (parameters) (
                (declare () float a)
                (declare () float b)
                (declare () float c)
                (assign (x) (var_ref a) (constant float (1.0)))
                (assign (x) (var_ref b) (var_ref a))
                (assign (x) (var_ref c) (var_ref b))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_dead_code_unlinked(&mut shader));
        assert_eq!(main_body(&shader).len(), 4);
        assert!(do_dead_code_unlinked(&mut shader));
        assert!(do_dead_code_unlinked(&mut shader));
        assert!(main_body(&shader).is_empty());
        assert!(!do_dead_code_unlinked(&mut shader));
    }
}
