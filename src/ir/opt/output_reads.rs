//! Redirects reads of shader outputs to temporaries.
//!
//! Some targets cannot read back from output registers. Every output that is read somewhere
//! gets a temporary of the same name which takes over all of its reads and writes; the
//! temporary is copied to the real output before each `return`, before each `emit-vertex`
//! and at the end of `main`.

use std::collections::BTreeSet;

use crate::{
    ir::{
        builder,
        clone::{substitute_rvalue, substitute_statements},
        visit::{walk_shader, VisitAction, VisitCx, Visitor},
        Call, Deref, Rvalue, Shader, Statement, VarRef, Variable,
    },
    symbol::meta::{ShaderStage, VariableFlags, VariableMode},
};

#[derive(Default)]
struct ReadOutputs(BTreeSet<VarRef>);
impl Visitor for ReadOutputs {
    fn visit_variable(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        if !cx.in_assignee && cx.shader.var(var).mode == VariableMode::ShaderOut {
            self.0.insert(var);
        }
        VisitAction::Continue
    }

    fn enter_call(&mut self, c: &Call, cx: VisitCx) -> VisitAction {
        // `inout` arguments are written back but read first
        let params = &cx.shader.signature(c.callee).parameters;
        for (arg, &param) in c.actual_parameters.iter().zip(params) {
            if cx.shader.var(param).mode != VariableMode::FunctionInout {
                continue;
            }
            if let Some(v) = arg.variable_referenced() {
                if cx.shader.var(v).mode == VariableMode::ShaderOut {
                    self.0.insert(v);
                }
            }
        }
        VisitAction::Continue
    }
}

struct Shadowing {
    /// Output to temporary, in output order.
    table: Vec<(VarRef, VarRef)>,
}
impl Shadowing {
    /// Creates a temporary for every read output up front, so each copy-back point covers
    /// all of them regardless of which function touches an output first.
    fn new(shader: &mut Shader, read: &BTreeSet<VarRef>) -> Self {
        let table = read
            .iter()
            .map(|&output| {
                let var = shader.var(output);
                let mut temp =
                    Variable::new(var.name.clone(), var.ty.clone(), VariableMode::Temporary);
                temp.flags = var.flags & (VariableFlags::INVARIANT | VariableFlags::PRECISE);
                (output, shader.add_variable(temp))
            })
            .collect();
        Shadowing { table }
    }

    fn replacement(&self, v: VarRef) -> Option<Deref> {
        self.table
            .iter()
            .find(|(o, _)| *o == v)
            .map(|&(_, t)| Deref::Variable(t))
    }

    fn copies(&self, shader: &Shader) -> Vec<Statement> {
        self.table
            .iter()
            .map(|&(output, temp)| builder::assign(shader, Deref::Variable(output), Rvalue::var(temp)))
            .collect()
    }

    fn block(&self, shader: &Shader, stmts: &mut Vec<Statement>) {
        for mut s in core::mem::take(stmts) {
            match &mut s {
                Statement::If(i) => {
                    substitute_rvalue(&mut i.condition, &mut |v| self.replacement(v));
                    self.block(shader, &mut i.then_instructions);
                    self.block(shader, &mut i.else_instructions);
                }
                Statement::Loop(body) => self.block(shader, body),
                Statement::Return(value) => {
                    if let Some(v) = value {
                        substitute_rvalue(v, &mut |v| self.replacement(v));
                    }
                    stmts.extend(self.copies(shader));
                }
                Statement::EmitVertex => stmts.extend(self.copies(shader)),
                _ => {
                    substitute_statements(core::slice::from_mut(&mut s), &mut |v| {
                        self.replacement(v)
                    });
                }
            }
            stmts.push(s);
        }
    }
}

/// Shadows every shader output that is read somewhere. Tessellation control shaders may read
/// their outputs and are left alone.
pub fn lower_output_reads(shader: &mut Shader) -> bool {
    if shader.stage == ShaderStage::TessControl {
        return false;
    }

    let mut read = ReadOutputs::default();
    walk_shader(&mut read, shader);
    if read.0.is_empty() {
        return false;
    }

    let shadowing = Shadowing::new(shader, &read.0);
    for sig in shader.defined_signatures() {
        let is_main = shader.signature_name(sig) == "main";
        shader.with_body(sig, |shader, body| {
            shadowing.block(shader, body);
            if is_main {
                body.extend(shadowing.copies(shader));
            }
        });
    }

    for &(output, temp) in shadowing.table.iter().rev() {
        log::debug!("[output_reads] shadowing output {}", shader.var(output).name);
        shader.insert_global_after(Some(output), temp);
    }

    true
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
    fn read_output_is_shadowed_and_copied_back() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) vec4 color)
            (declare (shader_out) float depth)
            (function main (signature void (parameters) (
                (assign (xyzw) (var_ref color) (constant vec4 (1.0 0.0 0.0 1.0)))
                (assign (x) (var_ref color) (swiz y (var_ref color)))
                (assign (x) (var_ref depth) (constant float (0.5)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(lower_output_reads(&mut shader));
        let globals = shader.global_variables();
        assert_eq!(globals.len(), 3);
        assert_eq!(shader.var(globals[1]).mode, VariableMode::Temporary);
        assert_eq!(shader.var(globals[1]).name, "color");
        // names are handed out in first-seen order, so the temporary prints as `color`
        assert_eq!(
            main_text(&shader),
            "\
(assign (xyzw) (var_ref color) (constant vec4 (1.0 0.0 0.0 1.0)))
(assign (x) (var_ref color) (swiz y (var_ref color)))
(assign (x) (var_ref depth) (constant float (0.5)))
(assign (xyzw) (var_ref color@1) (var_ref color))
"
        );
        assert!(!lower_output_reads(&mut shader));
    }

    #[test]
    fn emit_vertex_copies_back() {
        let mut shader = read_shader(
            r#"
            (stage geometry)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (assign (x) (var_ref o) (constant float (1.0)))
                (assign (x) (var_ref o) (expression float + (var_ref o) (constant float (1.0))))
                (emit-vertex)
                (assign (x) (var_ref o) (expression float * (var_ref o) (constant float (2.0))))
                (emit-vertex)
            )))
            "#,
        )
        .expect("valid source");

        assert!(lower_output_reads(&mut shader));
        assert_eq!(shader.global_variables().len(), 2);
        let main = shader.main_signature().expect("main");
        let body = &shader.signature(main).body;
        // two copies before the emits and one at the end of main
        assert_eq!(body.len(), 8);
        assert!(matches!(body[2], Statement::Assign(_)));
        assert!(matches!(body[3], Statement::EmitVertex));
        assert!(matches!(body[5], Statement::Assign(_)));
        assert!(matches!(body[6], Statement::EmitVertex));
        assert!(matches!(body[7], Statement::Assign(_)));
    }

    fn copies_to(stmts: &[Statement], output: VarRef) -> usize {
        stmts
            .iter()
            .filter(|s| matches!(s, Statement::Assign(a) if a.lhs.as_variable() == Some(output)))
            .count()
    }

    #[test]
    fn outputs_touched_only_in_later_helpers_are_copied_back() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (call helper ())
            )))
            (function helper (signature void (parameters) (
                (assign (x) (var_ref o) (constant float (1.0)))
                (if (expression bool > (var_ref o) (constant float (0.0))) (
                    (assign (x) (var_ref o) (expression float + (var_ref o) (constant float (1.0))))
                    (return)
                ) ())
                (assign (x) (var_ref o) (constant float (5.0)))
            )))
            "#,
        )
        .expect("valid source");
        let output = shader.global_variables()[0];

        assert!(lower_output_reads(&mut shader));
        let main = shader.main_signature().expect("main");
        assert_eq!(copies_to(&shader.signature(main).body, output), 1);

        let helper = shader
            .defined_signatures()
            .into_iter()
            .find(|&s| shader.signature_name(s) == "helper")
            .expect("helper");
        let body = &shader.signature(helper).body;
        // the only writes to the real output are the copy before the return
        assert_eq!(copies_to(body, output), 0);
        let Statement::If(i) = &body[1] else {
            panic!("expected the if, got {body:?}")
        };
        assert_eq!(copies_to(&i.then_instructions, output), 1);
        assert!(matches!(i.then_instructions.last(), Some(Statement::Return(None))));
    }

    #[test]
    fn tess_control_is_untouched() {
        let mut shader = read_shader(
            r#"
            (stage tess_ctrl)
            (declare (shader_out) float o)
            (declare (shader_out) float p)
            (function main (signature void (parameters) (
                (assign (x) (var_ref p) (var_ref o))
            )))
            "#,
        )
        .expect("valid source");
        assert!(!lower_output_reads(&mut shader));
    }
}
