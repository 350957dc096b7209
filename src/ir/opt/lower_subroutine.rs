//! Indirect subroutine calls to `if` ladders of direct calls.

use crate::{
    glsl_type::GlslType,
    ir::{
        builder,
        constant::Constant,
        Call, ExprOp, FunctionRef, IfStatement, Rvalue, Shader, Statement,
    },
    overload::exact_matching_signature,
};

/// Implementations of the subroutine type `type_name`, highest index first.
fn candidates(shader: &Shader, type_name: &str) -> Vec<(u32, FunctionRef)> {
    let mut found = shader
        .linked_functions()
        .into_iter()
        .filter_map(|f| {
            let function = shader.function(f);
            let index = function.subroutine_index?;
            function
                .subroutine_types
                .iter()
                .any(|t| t == type_name)
                .then_some((index, f))
        })
        .collect::<Vec<_>>();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found
}

fn ladder(shader: &Shader, call: &Call) -> Option<Statement> {
    let sub_var = call.sub_var.as_ref()?;
    let GlslType::Subroutine(type_name) = sub_var.ty(shader).without_array().clone() else {
        panic!("subroutine call through a non-subroutine value");
    };
    let types = call
        .actual_parameters
        .iter()
        .map(|a| a.ty(shader))
        .collect::<Vec<_>>();

    let mut last_branch: Option<Statement> = None;
    for (index, f) in candidates(shader, &type_name) {
        let Some(callee) = exact_matching_signature(shader, &shader.language, f, &types) else {
            log::trace!(
                "[lower_subroutine] {} has no signature matching the call",
                shader.function(f).name
            );
            continue;
        };
        let direct = Statement::Call(Call {
            callee,
            actual_parameters: call.actual_parameters.clone(),
            return_deref: call.return_deref.clone(),
            sub_var: None,
        });

        let selector = builder::unop(shader, ExprOp::SubroutineToInt, Rvalue::Deref(sub_var.clone()));
        let condition = builder::binop(
            shader,
            ExprOp::Equal,
            selector,
            Rvalue::Constant(Constant::int(index as i32)),
        );
        last_branch = Some(Statement::If(IfStatement {
            condition,
            then_instructions: vec![direct],
            else_instructions: last_branch.into_iter().collect(),
        }));
    }

    last_branch
}

fn lower_block(shader: &mut Shader, stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    for s in core::mem::take(stmts) {
        match s {
            Statement::Call(c) if c.sub_var.is_some() => {
                log::debug!(
                    "[lower_subroutine] lowering indirect call to {}",
                    shader.signature_name(c.callee)
                );
                stmts.extend(ladder(shader, &c));
                modified = true;
            }
            Statement::If(mut i) => {
                modified |= lower_block(shader, &mut i.then_instructions);
                modified |= lower_block(shader, &mut i.else_instructions);
                stmts.push(Statement::If(i));
            }
            Statement::Loop(mut body) => {
                modified |= lower_block(shader, &mut body);
                stmts.push(Statement::Loop(body));
            }
            other => stmts.push(other),
        }
    }

    modified
}

/// Replaces every call through a subroutine uniform with a chain of
/// `if (selector == index) call impl` tests over the compatible implementations. A selector
/// matching no implementation calls nothing.
pub fn lower_subroutine(shader: &mut Shader) -> bool {
    shader.for_each_body(|shader, _, body| lower_block(shader, body))
}
