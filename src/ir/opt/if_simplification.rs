//! Removal of trivial `if` statements.

use crate::ir::{builder, constant::Constant, visit::for_each_block, Rvalue, Shader, Statement};

fn simplify(shader: &Shader, stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    for s in core::mem::take(stmts) {
        let mut i = match s {
            Statement::If(i) => i,
            other => {
                stmts.push(other);
                continue;
            }
        };

        if i.then_instructions.is_empty() && i.else_instructions.is_empty() {
            log::debug!("[if_simplification] removing empty if");
            modified = true;
            continue;
        }

        if let Some(value) = i
            .condition
            .constant_expression_value(shader)
            .and_then(|c| c.as_bool())
        {
            log::debug!("[if_simplification] condition is always {value}");
            let mut taken = if value {
                i.then_instructions
            } else {
                i.else_instructions
            };
            stmts.append(&mut taken);
            modified = true;
            continue;
        }

        if i.then_instructions.is_empty() {
            let condition = core::mem::replace(&mut i.condition, Rvalue::Constant(Constant::bool(true)));
            i.condition = builder::logic_not(condition);
            core::mem::swap(&mut i.then_instructions, &mut i.else_instructions);
            modified = true;
        }
        stmts.push(Statement::If(i));
    }

    modified
}

/// Drops ifs with two empty branches, replaces ifs on constant conditions by the branch they
/// take, and turns `if (c) {} else { s }` into `if (!c) { s }`.
pub fn do_if_simplification(shader: &mut Shader) -> bool {
    shader.for_each_body(|shader, _, body| for_each_block(body, &mut |b| simplify(shader, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader};

    #[test]
    fn trivial_ifs_are_simplified() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) bool c)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (if (var_ref c) () ())
                (if (constant bool (1)) ((assign (x) (var_ref o) (constant float (1.0)))) ((discard)))
                (if (expression bool ! (constant bool (1))) ((discard)) ())
                (if (var_ref c) () ((assign (x) (var_ref o) (constant float (2.0)))))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_if_simplification(&mut shader));
        let main = shader.main_signature().expect("main");
        assert_eq!(
            print_statements(&shader, &shader.signature(main).body),
            "\
(assign (x) (var_ref o) (constant float (1.0)))
(if (expression bool ! (var_ref c)) (
  (assign (x) (var_ref o) (constant float (2.0)))
) ())
"
        );
        assert!(!do_if_simplification(&mut shader));
    }

    #[test]
    fn inner_blocks_are_simplified_first() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) bool c)
            (function main (signature void (parameters) (
                (if (var_ref c) ((if (var_ref c) () ())) ())
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_if_simplification(&mut shader));
        let main = shader.main_signature().expect("main");
        assert!(shader.signature(main).body.is_empty());
    }
}
