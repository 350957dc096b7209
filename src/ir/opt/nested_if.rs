//! `if (a) { if (b) { s } }` to `if (a && b) { s }`.

use crate::ir::{builder, constant::Constant, visit::for_each_block, Rvalue, Shader, Statement};

fn flatten(stmts: &mut [Statement]) -> bool {
    let mut modified = false;
    for s in stmts {
        let Statement::If(outer) = s else {
            continue;
        };
        let mergeable = outer.else_instructions.is_empty()
            && matches!(
                outer.then_instructions.as_slice(),
                [Statement::If(inner)] if inner.else_instructions.is_empty()
            );
        if !mergeable {
            continue;
        }
        let Some(Statement::If(inner)) = outer.then_instructions.pop() else {
            unreachable!("checked above");
        };

        log::debug!("[nested_if] merging nested if into its parent");
        let a = core::mem::replace(&mut outer.condition, Rvalue::Constant(Constant::bool(true)));
        outer.condition = builder::logic_and(a, inner.condition);
        outer.then_instructions = inner.then_instructions;
        modified = true;
    }

    modified
}

/// Innermost blocks are handled first, so a whole chain of nested ifs merges in one run.
pub fn opt_flatten_nested_if_blocks(shader: &mut Shader) -> bool {
    shader.for_each_body(|_, _, body| for_each_block(body, &mut |b| flatten(b)))
}
