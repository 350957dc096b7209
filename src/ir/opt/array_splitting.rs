//! Splits arrays and matrices indexed only by constants into one variable per element.
//!
//! Arrays of arrays are left alone: splitting one level would leave arrays behind and
//! multiply the variables without making any access cheaper.

use super::splitting::{split_aggregates, Aggregate};
use crate::{
    glsl_type::GlslType,
    ir::{builder, Deref, Rvalue, Shader, VarRef},
};

struct Arrays;
impl Aggregate for Arrays {
    const PASS: &'static str = "array_splitting";

    fn splittable_type(ty: &GlslType) -> bool {
        match ty {
            GlslType::Array { length, .. } => !ty.is_array_of_arrays() && length.is_some_and(|n| n > 0),
            _ => ty.is_matrix(),
        }
    }

    fn component_access(shader: &Shader, d: &Deref) -> Option<(VarRef, i64)> {
        let Deref::Array { array, index, .. } = d else {
            return None;
        };
        let &Rvalue::Deref(Deref::Variable(v)) = array.as_ref() else {
            return None;
        };
        if !Self::splittable_type(&shader.var(v).ty) {
            return None;
        }
        let index = index.as_constant()?.as_index()?;
        Some((v, index))
    }

    fn components(ty: &GlslType) -> Vec<(String, GlslType)> {
        let (Some(n), Some(element)) = (ty.indexable_length(), ty.element_type()) else {
            return Vec::new();
        };
        (0..n).map(|i| (i.to_string(), element.clone())).collect()
    }

    fn component(shader: &Shader, value: Deref, i: usize) -> Deref {
        builder::element_deref(shader, value, i as u32)
    }
}

/// Replaces every local array or matrix whose elements are only accessed through constant
/// indices with one variable per element, named `array_index`. Constant indices past the end
/// read an undefined temporary.
pub fn optimize_split_arrays(shader: &mut Shader, linked: bool) -> bool {
    split_aggregates::<Arrays>(shader, linked)
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
    fn constant_indexed_array_is_split() {
        let mut shader = read_shader(
            r#"
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () (array float 2) a)
                (assign (x) (array_ref (var_ref a) (constant int (0))) (constant float (1.0)))
                (assign (x) (array_ref (var_ref a) (constant int (1))) (constant float (2.0)))
                (assign (x) (var_ref o) (expression float + (array_ref (var_ref a) (constant int (0))) (array_ref (var_ref a) (constant int (5)))))
            )))
            "#,
        )
        .expect("valid source");

        assert!(optimize_split_arrays(&mut shader, false));
        assert_eq!(
            main_text(&shader),
            "\
(declare () float a_0)
(declare () float a_1)
(assign (x) (var_ref a_0) (constant float (1.0)))
(assign (x) (var_ref a_1) (constant float (2.0)))
(declare (temporary) float undef)
(assign (x) (var_ref o) (expression float + (var_ref a_0) (var_ref undef)))
"
        );
        assert!(!optimize_split_arrays(&mut shader, false));
    }

    #[test]
    fn dynamic_index_and_arrays_of_arrays_are_kept() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) int i)
            (declare (shader_out) float o)
            (function main (signature void (parameters) (
                (declare () (array float 2) a)
                (declare () (array (array float 2) 2) aa)
                (assign (x) (array_ref (var_ref a) (var_ref i)) (constant float (1.0)))
                (assign (x) (array_ref (array_ref (var_ref aa) (constant int (0))) (constant int (1))) (constant float (1.0)))
                (assign (x) (var_ref o) (array_ref (array_ref (var_ref aa) (constant int (0))) (constant int (1))))
            )))
            "#,
        )
        .expect("valid source");

        assert!(!optimize_split_arrays(&mut shader, false));
    }

    #[test]
    fn matrix_columns_are_split() {
        let mut shader = read_shader(
            r#"
            (declare (uniform) mat2 u)
            (declare (shader_out) vec2 o)
            (function main (signature void (parameters) (
                (declare () mat2 m)
                (assign () (var_ref m) (var_ref u))
                (assign (xy) (var_ref o) (array_ref (var_ref m) (constant int (1))))
            )))
            "#,
        )
        .expect("valid source");

        assert!(optimize_split_arrays(&mut shader, false));
        assert_eq!(
            main_text(&shader),
            "\
(declare () vec2 m_0)
(declare () vec2 m_1)
(assign (xy) (var_ref m_0) (array_ref (var_ref u) (constant int (0))))
(assign (xy) (var_ref m_1) (array_ref (var_ref u) (constant int (1))))
(assign (xy) (var_ref o) (var_ref m_1))
"
        );
    }
}
