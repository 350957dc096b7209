//! Hoisting of selected sub-expressions into temporaries.

use crate::ir::{
    builder,
    visit::{rewrite_shader, RvalueRewriter},
    Deref, Rvalue, Shader, Statement, VarRef,
};

struct Flattener<P> {
    predicate: P,
}
impl<P: FnMut(&Rvalue, &Shader) -> bool> RvalueRewriter for Flattener<P> {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        in_assignee: bool,
        pending: &mut Vec<Statement>,
    ) -> bool {
        if in_assignee || matches!(rv, Rvalue::Deref(_)) || !(self.predicate)(rv, shader) {
            return false;
        }

        let value = core::mem::replace(rv, Rvalue::var(VarRef(usize::MAX)));
        let tmp = builder::store_temporary(shader, "flattening_tmp", value, pending);
        *rv = Rvalue::Deref(Deref::Variable(tmp));
        true
    }
}

/// Assigns every r-value matching `predicate` to a fresh `flattening_tmp` placed before its
/// statement and reads the temporary instead. Matching children are hoisted before their
/// parents.
pub fn do_expression_flattening(
    shader: &mut Shader,
    predicate: impl FnMut(&Rvalue, &Shader) -> bool,
) -> bool {
    let modified = rewrite_shader(shader, &mut Flattener { predicate });
    if modified {
        log::debug!("[expression_flattening] hoisted sub-expressions into temporaries");
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader, ExprOp};

    #[test]
    fn innermost_match_is_hoisted_first() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) float a)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (assign (x) (var_ref o)
                    (expression float + (expression float * (var_ref a) (var_ref a)) (var_ref a)))
            )))
            "#,
        )
        .expect("valid source");

        let is_mul = |rv: &Rvalue, _: &Shader| {
            matches!(rv, Rvalue::Expression(e) if e.op == ExprOp::Mul)
        };
        assert!(do_expression_flattening(&mut shader, is_mul));
        let main = shader.main_signature().expect("main");
        assert_eq!(
            print_statements(&shader, &shader.signature(main).body),
            "\
(declare (temporary) float flattening_tmp)
(assign (x) (var_ref flattening_tmp) (expression float * (var_ref a) (var_ref a)))
(assign (x) (var_ref o) (expression float + (var_ref flattening_tmp) (var_ref a)))
"
        );
    }
}
