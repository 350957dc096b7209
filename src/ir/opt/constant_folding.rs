//! Replaces r-values computable at compile time by their value.

use crate::ir::{
    visit::{for_each_block, rewrite_shader, RvalueRewriter},
    Rvalue, Shader, Statement,
};

struct Folding;
impl RvalueRewriter for Folding {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        in_assignee: bool,
        _pending: &mut Vec<Statement>,
    ) -> bool {
        if in_assignee || matches!(rv, Rvalue::Constant(_)) {
            return false;
        }
        let Some(c) = rv.constant_expression_value(shader) else {
            return false;
        };
        if c.ty.contains_opaque() || c.ty.without_array().is_subroutine() {
            // handles must stay dereferences
            return false;
        }

        *rv = Rvalue::Constant(c);
        true
    }
}

/// Drops conditions known to hold and assignments whose condition never holds.
fn fold_conditions(stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    stmts.retain_mut(|s| {
        let Statement::Assign(a) = s else {
            return true;
        };
        match a.condition.as_ref().and_then(Rvalue::as_constant).and_then(|c| c.as_bool()) {
            Some(true) => {
                a.condition = None;
                modified = true;
                true
            }
            Some(false) => {
                log::debug!("[constant_folding] removing assignment that never happens");
                modified = true;
                false
            }
            None => true,
        }
    });

    modified
}

/// Folds every constant r-value outside written locations, then simplifies the assignment
/// conditions that became constant.
pub fn do_constant_folding(shader: &mut Shader) -> bool {
    let mut modified = rewrite_shader(shader, &mut Folding);
    if modified {
        log::debug!("[constant_folding] folded constant expressions");
    }
    modified |= shader.for_each_body(|_, _, body| for_each_block(body, &mut fold_conditions));

    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader};

    #[test]
    fn expressions_and_const_variables_fold() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) float u)
            (declare (shader_out) vec2 o)
            (declare (shader_out) (array float 2) arr)
            (function main (signature void (parameters) (
                (declare (const) vec2 k (constant vec2 (1.0 2.0)))
                (assign (xy) (var_ref o) (expression vec2 * (var_ref k) (constant float (3.0))))
                (assign (x) (var_ref o) (expression float + (var_ref u) (swiz y (var_ref k))))
                (assign (x) (array_ref (var_ref arr) (expression int + (constant int (0)) (constant int (1)))) (var_ref u))
                (assign (expression bool == (constant int (1)) (constant int (1))) (x) (var_ref o) (var_ref u))
                (assign (expression bool == (constant int (1)) (constant int (2))) (x) (var_ref o) (var_ref u))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_constant_folding(&mut shader));
        let main = shader.main_signature().expect("main");
        assert_eq!(
            print_statements(&shader, &shader.signature(main).body),
            "\
(declare (const) vec2 k (constant vec2 (1.0 2.0)))
(assign (xy) (var_ref o) (constant vec2 (3.0 6.0)))
(assign (x) (var_ref o) (expression float + (var_ref u) (constant float (2.0))))
(assign (x) (array_ref (var_ref arr) (constant int (1))) (var_ref u))
(assign (x) (var_ref o) (var_ref u))
"
        );
        assert!(!do_constant_folding(&mut shader));
    }
}
