//! Matrix arithmetic broken into column operations gives the same numbers.

mod common;

use common::{main_text, parse, run};
use glsl_ir_opt::{
    glsl_type::GlslType,
    ir::{
        constant::{Constant, Scalar},
        opt::do_mat_op_to_vec,
    },
};

fn matrix(ty: &str, values: impl IntoIterator<Item = f32>) -> Constant {
    let ty = GlslType::from_name(ty).expect("known type");
    Constant::from_scalars(ty, values.into_iter().map(Scalar::Float).collect())
}

fn floats(c: &Constant) -> Vec<f32> {
    c.scalars()
        .expect("basic value")
        .iter()
        .map(|x| x.as_f64() as f32)
        .collect()
}

/// Column-major `a * b` with `a` of `rows` x `inner` and `b` of `inner` x `cols`.
fn reference_product(a: &[f32], b: &[f32], rows: usize, inner: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0; rows * cols];
    for c in 0..cols {
        for r in 0..rows {
            out[c * rows + r] = (0..inner).map(|k| a[k * rows + r] * b[c * inner + k]).sum();
        }
    }
    out
}

fn lowered(source: &str) -> glsl_ir_opt::Shader {
    let mut shader = parse(source);
    assert!(do_mat_op_to_vec(&mut shader));
    let text = main_text(&shader);
    assert!(!text.contains("(expression mat"), "{text}");
    shader
}

#[test]
fn mat3_times_mat3() {
    let source = r#"
        (declare (uniform) mat3 a)
        (declare (uniform) mat3 b)
        (declare (shader_out) mat3 r)
        (function main
          (signature void (parameters)
            ((assign () (var_ref r) (expression mat3 * (var_ref a) (var_ref b))))))
        "#;
    let a = (1..=9).map(|x| x as f32).collect::<Vec<_>>();
    let b = [2.0, 0.0, 1.0, -1.0, 3.0, 0.0, 4.0, 1.0, -2.0];
    let inputs = [("a", matrix("mat3", a.clone())), ("b", matrix("mat3", b))];

    let expected = reference_product(&a, &b, 3, 3, 3);
    assert_eq!(floats(&run(&parse(source), &inputs, &["r"])[0]), expected);
    assert_eq!(floats(&run(&lowered(source), &inputs, &["r"])[0]), expected);
}

#[test]
fn mat4_times_vec4() {
    let source = r#"
        (declare (uniform) mat4 m)
        (declare (uniform) vec4 v)
        (declare (shader_out) vec4 o)
        (function main
          (signature void (parameters)
            ((assign (xyzw) (var_ref o) (expression vec4 * (var_ref m) (var_ref v))))))
        "#;
    let m = (0..16).map(|x| (x % 5) as f32 - 2.0).collect::<Vec<_>>();
    let v = [1.0, -2.0, 3.0, 0.5];
    let inputs = [("m", matrix("mat4", m.clone())), ("v", matrix("vec4", v))];

    let expected = reference_product(&m, &v, 4, 4, 1);
    assert_eq!(floats(&run(&lowered(source), &inputs, &["o"])[0]), expected);
}

#[test]
fn non_square_mat3x4_times_vec3() {
    let source = r#"
        (declare (uniform) mat3x4 m)
        (declare (uniform) vec3 v)
        (declare (shader_out) vec4 o)
        (function main
          (signature void (parameters)
            ((assign (xyzw) (var_ref o) (expression vec4 * (var_ref m) (var_ref v))))))
        "#;
    // three columns of four rows
    let m = (1..=12).map(|x| x as f32).collect::<Vec<_>>();
    let v = [1.0, 0.0, -1.0];
    let inputs = [("m", matrix("mat3x4", m.clone())), ("v", matrix("vec3", v))];

    let expected = reference_product(&m, &v, 4, 3, 1);
    assert_eq!(expected, [-8.0, -8.0, -8.0, -8.0]);
    assert_eq!(floats(&run(&parse(source), &inputs, &["o"])[0]), expected);
    assert_eq!(floats(&run(&lowered(source), &inputs, &["o"])[0]), expected);
}
