//! Function inlining.

use std::collections::HashMap;

use crate::ir::{
    builder,
    clone::{substitute_statements, Cloner},
    Call, Deref, Rvalue, Shader, SignatureRef, Statement, VarRef,
};
use crate::symbol::meta::{VariableFlags, VariableMode};

fn count_returns(stmts: &[Statement]) -> usize {
    stmts
        .iter()
        .map(|s| match s {
            Statement::Return(_) => 1,
            Statement::If(i) => count_returns(&i.then_instructions) + count_returns(&i.else_instructions),
            Statement::Loop(body) => count_returns(body),
            _ => 0,
        })
        .sum()
}

/// The callee has a body whose only exit is its end: at most one `return`, and only as the
/// last statement.
pub fn can_inline(shader: &Shader, call: &Call) -> bool {
    let callee = shader.signature(call.callee);
    if !callee.is_defined || callee.is_builtin() {
        return false;
    }

    let mut returns = count_returns(&callee.body);
    if !matches!(callee.body.last(), Some(Statement::Return(_))) {
        // falling off the end
        returns += 1;
    }

    returns == 1
}

/// Moves every non-constant array index of the l-value `d` into a `saved_idx` temporary so
/// that writing back later targets the element chosen at call time.
fn save_lvalue(shader: &mut Shader, d: &mut Deref, out: &mut Vec<Statement>) {
    match d {
        Deref::Variable(_) => (),
        Deref::Array { array, index, .. } => {
            if !matches!(**index, Rvalue::Constant(_)) {
                let value = core::mem::replace(&mut **index, Rvalue::var(VarRef(usize::MAX)));
                let saved = builder::store_temporary(shader, "saved_idx", value, out);
                **index = Rvalue::var(saved);
            }
            if let Rvalue::Deref(inner) = &mut **array {
                save_lvalue(shader, inner, out);
            }
        }
        Deref::Record { record, .. } => {
            if let Rvalue::Deref(inner) = &mut **record {
                save_lvalue(shader, inner, out);
            }
        }
    }
}

/// Turns `return v` into an assignment to `result`; a bare `return` can only be the last
/// statement and simply goes away.
fn replace_returns(shader: &Shader, stmts: &mut Vec<Statement>, result: Option<&Deref>) {
    for s in core::mem::take(stmts) {
        match s {
            Statement::Return(Some(v)) => {
                if let Some(d) = result {
                    stmts.push(builder::assign(shader, d.clone(), v));
                }
            }
            Statement::Return(None) => (),
            Statement::If(mut i) => {
                replace_returns(shader, &mut i.then_instructions, result);
                replace_returns(shader, &mut i.else_instructions, result);
                stmts.push(Statement::If(i));
            }
            Statement::Loop(mut body) => {
                replace_returns(shader, &mut body, result);
                stmts.push(Statement::Loop(body));
            }
            other => stmts.push(other),
        }
    }
}

/// Statements replacing `call`: parameter temporaries with their copy-in, the cloned
/// callee body, then the copy-out of `out` and `inout` parameters in declaration order.
pub fn generate_inline(shader: &mut Shader, mut call: Call) -> Vec<Statement> {
    let params = shader.signature(call.callee).parameters.clone();
    debug_assert_eq!(params.len(), call.actual_parameters.len());

    let mut out = Vec::new();
    let mut temporaries = Vec::with_capacity(params.len());
    let mut var_map = HashMap::new();
    for (&param, actual) in params.iter().zip(call.actual_parameters.iter_mut()) {
        let formal = shader.var(param);
        let mode = formal.mode;
        if formal.ty.contains_opaque() {
            // the caller's dereference is substituted directly below
            temporaries.push(None);
            continue;
        }

        let mut copy = formal.clone();
        copy.mode = VariableMode::Temporary;
        copy.flags.remove(VariableFlags::READ_ONLY);
        let temp = shader.add_variable(copy);
        out.push(Statement::Declaration(temp));
        var_map.insert(param, temp);
        temporaries.push(Some(temp));

        match mode {
            VariableMode::FunctionIn | VariableMode::ConstIn => {
                out.push(builder::assign(shader, Deref::Variable(temp), actual.clone()));
            }
            VariableMode::FunctionOut | VariableMode::FunctionInout => {
                let Rvalue::Deref(d) = actual else {
                    panic!("`{}` argument is not an l-value", mode.keyword());
                };
                save_lvalue(shader, d, &mut out);
                if mode == VariableMode::FunctionInout {
                    out.push(builder::assign(shader, Deref::Variable(temp), actual.clone()));
                }
            }
            other => panic!("parameter declared as {}", other.keyword()),
        }
    }

    let callee_body = shader.signature(call.callee).body.clone();
    let mut body = Cloner::with_map(var_map).clone_statements(shader, &callee_body);
    replace_returns(shader, &mut body, call.return_deref.as_ref());

    let opaque = params
        .iter()
        .zip(&call.actual_parameters)
        .zip(&temporaries)
        .filter(|(_, t)| t.is_none())
        .map(|((&p, actual), _)| match actual {
            Rvalue::Deref(d) => (p, d.clone()),
            other => panic!("opaque argument is not a dereference: {other:?}"),
        })
        .collect::<HashMap<_, _>>();
    if !opaque.is_empty() {
        substitute_statements(&mut body, &mut |v| opaque.get(&v).cloned());
    }
    out.append(&mut body);

    for ((&param, actual), temp) in params.iter().zip(call.actual_parameters).zip(temporaries) {
        let (Some(temp), Rvalue::Deref(d)) = (temp, actual) else {
            continue;
        };
        if shader.var(param).mode.writes_back() {
            out.push(builder::assign(shader, d, Rvalue::var(temp)));
        }
    }

    out
}

fn inline_calls(shader: &mut Shader, current: SignatureRef, stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    for s in core::mem::take(stmts) {
        match s {
            // the body of `current` is moved out while it is being processed
            Statement::Call(c) if c.callee != current && c.sub_var.is_none() && can_inline(shader, &c) => {
                log::debug!("[inline] inlining call to {}", shader.signature_name(c.callee));
                let mut inlined = generate_inline(shader, c);
                stmts.append(&mut inlined);
                modified = true;
            }
            Statement::If(mut i) => {
                modified |= inline_calls(shader, current, &mut i.then_instructions);
                modified |= inline_calls(shader, current, &mut i.else_instructions);
                stmts.push(Statement::If(i));
            }
            Statement::Loop(mut body) => {
                modified |= inline_calls(shader, current, &mut body);
                stmts.push(Statement::Loop(body));
            }
            other => stmts.push(other),
        }
    }

    modified
}

/// Inlines every inlinable call once. Calls brought in by an inlined body wait for the next
/// run.
pub fn do_function_inlining(shader: &mut Shader) -> bool {
    shader.for_each_body(inline_calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader};

    fn main_text(shader: &Shader) -> String {
        let main = shader.main_signature().expect("main");
        print_statements(shader, &shader.signature(main).body)
    }

    #[test]
    fn inlinability() {
        let shader = read_shader(
            r#"
            (function early (signature float (parameters (declare (in) float x)) (
                (if (expression bool < (var_ref x) (constant float (0.0)))
                    ((return (constant float (0.0)))) ())
                (return (var_ref x)))))
            (function tail (signature float (parameters (declare (in) float x)) (
                (return (var_ref x)))))
            (function empty (signature void (parameters) ()))
            (function proto (signature void (parameters)))
            (function main (signature void (parameters) (
                (declare () float t)
                (call early (var_ref t) ((var_ref t)))
                (call tail (var_ref t) ((var_ref t)))
                (call empty ())
                (call proto ())
            )))
            "#,
        )
        .expect("valid source");
        let main = shader.main_signature().expect("main");
        let calls = shader.signature(main).body[1..]
            .iter()
            .map(|s| match s {
                Statement::Call(c) => can_inline(&shader, c),
                _ => panic!("expected call"),
            })
            .collect::<Vec<_>>();
        assert_eq!(calls, [false, true, true, false]);
    }

    #[test]
    fn in_out_and_result_are_copied() {
        let mut shader = read_shader(
            r#"
            (function scale (signature float (parameters (declare (in) float x) (declare (out) float y)) (
                (assign (x) (var_ref y) (expression float * (var_ref x) (constant float (2.0))))
                (return (var_ref x)))))
            (function main (signature void (parameters) (
                (declare () float a)
                (declare () float b)
                (declare () float r)
                (call scale (var_ref r) ((var_ref a) (var_ref b)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_function_inlining(&mut shader));
        let text = main_text(&shader);
        let expected = "\
(declare () float a)
(declare () float b)
(declare () float r)
(declare (temporary) float x)
(assign (x) (var_ref x) (var_ref a))
(declare (temporary) float y)
(assign (x) (var_ref y) (expression float * (var_ref x) (constant float (2.0))))
(assign (x) (var_ref r) (var_ref x))
(assign (x) (var_ref b) (var_ref y))
";
        assert_eq!(text, expected);
        assert!(!do_function_inlining(&mut shader));
    }

    #[test]
    fn dynamic_index_of_out_argument_is_saved() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) int start)
            (function bump (signature void (parameters (declare (inout) int v)) (
                (assign (x) (var_ref v) (expression int + (var_ref v) (constant int (1)))))))
            (function main (signature void (parameters) (
                (declare () (array int 4) arr)
                (declare () int i)
                (assign (x) (var_ref i) (var_ref start))
                (call bump ((array_ref (var_ref arr) (var_ref i))))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_function_inlining(&mut shader));
        let text = main_text(&shader);
        assert!(
            text.contains("(assign (x) (var_ref saved_idx) (var_ref i))"),
            "{text}"
        );
        assert!(
            text.contains("(assign (x) (array_ref (var_ref arr) (var_ref saved_idx)) (var_ref v))"),
            "{text}"
        );
    }

    #[test]
    fn sampler_arguments_are_substituted() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) sampler2D tex)
            (declare (shader_out) vec4 color)
            (function fetch (signature vec4 (parameters (declare (in) sampler2D s)) (
                (return (tex vec4 (var_ref s) (constant vec2 (0.5 0.5)) () () ())))))
            (function main (signature void (parameters) (
                (call fetch (var_ref color) ((var_ref tex)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_function_inlining(&mut shader));
        assert_eq!(
            main_text(&shader),
            "(assign (xyzw) (var_ref color) (tex vec4 (var_ref tex) (constant vec2 (0.5 0.5)) () () ()))\n"
        );
    }
}
