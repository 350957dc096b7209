//! Splits struct variables into one variable per field.

use super::splitting::{split_aggregates, Aggregate};
use crate::{
    glsl_type::GlslType,
    ir::{builder, Deref, Rvalue, Shader, VarRef},
};

struct Structures;
impl Aggregate for Structures {
    const PASS: &'static str = "structure_splitting";

    fn splittable_type(ty: &GlslType) -> bool {
        ty.is_struct()
    }

    fn component_access(shader: &Shader, d: &Deref) -> Option<(VarRef, i64)> {
        let Deref::Record { record, field, .. } = d else {
            return None;
        };
        let &Rvalue::Deref(Deref::Variable(v)) = record.as_ref() else {
            return None;
        };
        let index = shader.var(v).ty.struct_type()?.field_index(field)?;
        Some((v, index as i64))
    }

    fn components(ty: &GlslType) -> Vec<(String, GlslType)> {
        ty.struct_type()
            .map(|s| {
                s.fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn component(shader: &Shader, value: Deref, i: usize) -> Deref {
        let ty = value.ty(shader);
        let field = ty
            .struct_type()
            .and_then(|s| s.fields.get(i))
            .unwrap_or_else(|| panic!("field {i} of a non-struct value"));
        builder::record_deref(shader, value, &field.name)
    }
}

/// Replaces every local struct variable accessed only field by field with one variable per
/// field, named `struct_field`. Nested structs come apart over repeated runs.
pub fn do_structure_splitting(shader: &mut Shader, linked: bool) -> bool {
    split_aggregates::<Structures>(shader, linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_statements, reader::read_shader, Statement};

    fn main_text(shader: &Shader) -> String {
        let main = shader.main_signature().expect("main");
        print_statements(shader, &shader.signature(main).body)
    }

    #[test]
    fn field_accesses_become_variables() {
        let mut shader = read_shader(
            r#"
            (typedecl S ((vec2 uv) (float w)))
            (declare (uniform) S u)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () S s)
                (assign (xy) (record_ref (var_ref s) uv) (record_ref (var_ref u) uv))
                (assign (x) (record_ref (var_ref s) w) (constant float (2.0)))
                (assign (x) (var_ref o) (expression float * (swiz x (record_ref (var_ref s) uv)) (record_ref (var_ref s) w)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_structure_splitting(&mut shader, false));
        assert_eq!(
            main_text(&shader),
            "\
(declare () vec2 s_uv)
(declare () float s_w)
(assign (xy) (var_ref s_uv) (record_ref (var_ref u) uv))
(assign (x) (var_ref s_w) (constant float (2.0)))
(assign (x) (var_ref o) (expression float * (swiz x (var_ref s_uv)) (var_ref s_w)))
"
        );
        assert!(!do_structure_splitting(&mut shader, false));
    }

    #[test]
    fn whole_copies_are_unrolled() {
        let mut shader = read_shader(
            r#"
            (typedecl S ((vec2 uv) (float w)))
            (declare (uniform) S u)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () S s)
                (assign () (var_ref s) (var_ref u))
                (assign (x) (var_ref o) (record_ref (var_ref s) w))
            )))
            "#,
        )
        .expect("valid source");

        assert!(do_structure_splitting(&mut shader, false));
        assert_eq!(
            main_text(&shader),
            "\
(declare () vec2 s_uv)
(declare () float s_w)
(assign (xy) (var_ref s_uv) (record_ref (var_ref u) uv))
(assign (x) (var_ref s_w) (record_ref (var_ref u) w))
(assign (x) (var_ref o) (var_ref s_w))
"
        );
    }

    #[test]
    fn whole_uses_and_globals_are_kept() {
        let mut shader = read_shader(
            r#"
            (typedecl S ((float w)))
            (declare () S g)
            (function f (signature float (parameters (declare (in) S x)) (
                (return (record_ref (var_ref x) w)))))
            (function main (signature void (parameters) (
                (declare () S s)
                (declare () float r)
                (assign (x) (record_ref (var_ref s) w) (constant float (1.0)))
                (assign (x) (record_ref (var_ref g) w) (constant float (1.0)))
                (call f (var_ref r) ((var_ref s)))
            )))
            "#,
        )
        .expect("valid source");

        assert!(!do_structure_splitting(&mut shader, false));

        // once linked, the global may go
        assert!(do_structure_splitting(&mut shader, true));
        assert!(shader
            .instructions
            .iter()
            .any(|s| matches!(s, &Statement::Declaration(v) if shader.var(v).name == "g_w")));
    }
}
