//! Removal of loop jumps that do not change control flow.

use crate::ir::{LoopJump, Shader, Statement};

fn block(stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    for s in core::mem::take(stmts) {
        match s {
            Statement::If(mut i) => {
                modified |= block(&mut i.then_instructions);
                modified |= block(&mut i.else_instructions);

                let jump = match (i.then_instructions.last(), i.else_instructions.last()) {
                    (Some(&Statement::LoopJump(a)), Some(&Statement::LoopJump(b))) if a == b => Some(a),
                    _ => None,
                };
                match jump {
                    Some(j) => {
                        log::debug!("[redundant_jumps] hoisting {j:?} out of both branches");
                        i.then_instructions.pop();
                        i.else_instructions.pop();
                        if !i.then_instructions.is_empty() || !i.else_instructions.is_empty() {
                            stmts.push(Statement::If(i));
                        }
                        stmts.push(Statement::LoopJump(j));
                        modified = true;
                    }
                    None => stmts.push(Statement::If(i)),
                }
            }
            Statement::Loop(mut body) => {
                modified |= block(&mut body);
                if matches!(body.last(), Some(Statement::LoopJump(LoopJump::Continue))) {
                    log::debug!("[redundant_jumps] removing trailing continue");
                    body.pop();
                    modified = true;
                }
                stmts.push(Statement::Loop(body));
            }
            other => stmts.push(other),
        }
    }

    modified
}

/// Moves a jump ending both branches of an `if` after it and drops a `continue` ending a
/// loop body.
pub fn optimize_redundant_jumps(shader: &mut Shader) -> bool {
    shader.for_each_body(|_, _, body| block(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader};

    #[test]
    fn common_jumps_are_hoisted_then_dropped() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) bool c)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (loop (
                    (if (var_ref c)
                        ((assign (x) (var_ref o) (constant float (1.0))) continue)
                        (continue))
                ))
                (loop (
                    (if (var_ref c) (break) (continue))
                ))
            )))
            "#,
        )
        .expect("valid source");

        assert!(optimize_redundant_jumps(&mut shader));
        let main = shader.main_signature().expect("main");
        assert_eq!(
            print_statements(&shader, &shader.signature(main).body),
            "\
(loop (
  (if (var_ref c) (
    (assign (x) (var_ref o) (constant float (1.0)))
  ) ())
))
(loop (
  (if (var_ref c) (
    break
  ) (
    continue
  ))
))
"
        );
        assert!(!optimize_redundant_jumps(&mut shader));
    }
}
