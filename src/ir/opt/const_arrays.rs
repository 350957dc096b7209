//! Moves constant arrays into uniforms.
//!
//! Indexing an array held in registers by a dynamic index is expensive on most targets,
//! while uniform storage can be indexed directly. Each array-typed constant used as a value
//! becomes a hidden read-only uniform initialized with that constant.

use crate::{
    ir::{
        visit::{rewrite_shader, RvalueRewriter},
        Rvalue, Shader, Statement, Variable,
    },
    symbol::meta::{ShaderStage, VariableFlags, VariableMode},
};

const PREFIX: &str = "constarray_";

struct Promotion {
    stage: ShaderStage,
    next_index: usize,
    free_slots: u32,
}
impl RvalueRewriter for Promotion {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        _in_assignee: bool,
        _pending: &mut Vec<Statement>,
    ) -> bool {
        let Rvalue::Constant(c) = rv else {
            return false;
        };
        if !c.ty.is_array() {
            return false;
        }
        let slots = c.ty.component_slots();
        if slots > self.free_slots {
            log::trace!("[const_arrays] no uniform space left for a {} constant", c.ty);
            return false;
        }
        self.free_slots -= slots;

        let name = format!("{PREFIX}{:x}_{}", self.next_index, self.stage.index());
        self.next_index += 1;
        let mut uniform = Variable::new(name, c.ty.clone(), VariableMode::Uniform);
        uniform.flags = VariableFlags::READ_ONLY | VariableFlags::HIDDEN;
        uniform.constant_initializer = Some(c.clone());
        log::debug!("[const_arrays] promoting {} constant to {}", c.ty, uniform.name);

        let v = shader.add_variable(uniform);
        shader.insert_global_after(None, v);
        *rv = Rvalue::var(v);
        true
    }
}

/// Replaces array constants by uniforms while the uniforms of the shader still fit in
/// `max_uniform_components` slots.
pub fn lower_const_arrays_to_uniforms(shader: &mut Shader, max_uniform_components: u32) -> bool {
    let globals = shader.global_variables();
    let used = globals
        .iter()
        .map(|&v| shader.var(v))
        .filter(|var| var.mode == VariableMode::Uniform)
        .map(|var| var.ty.component_slots())
        .sum::<u32>();
    let next_index = globals
        .iter()
        .filter(|&&v| shader.var(v).name.starts_with(PREFIX))
        .count();

    let mut promotion = Promotion {
        stage: shader.stage,
        next_index,
        free_slots: max_uniform_components.saturating_sub(used),
    };
    rewrite_shader(shader, &mut promotion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_shader, reader::read_shader};

    const SOURCE: &str = r#"
        (stage fragment)
        (declare (uniform) int i)
        (declare (shader_out) float o)
        (function main (signature void (parameters) (
            (assign (x) (var_ref o) (array_ref (constant (array float 2) ((constant float (0.5)) (constant float (1.5)))) (var_ref i)))
        )))
        "#;

    #[test]
    fn array_constant_becomes_hidden_uniform() {
        let mut shader = read_shader(SOURCE).expect("valid source");

        assert!(lower_const_arrays_to_uniforms(&mut shader, 16));
        assert_eq!(
            print_shader(&shader),
            "\
(declare (uniform read_only hidden) (array float 2) constarray_0_4 (constant (array float 2) ((constant float (0.5)) (constant float (1.5)))))
(declare (uniform) int i)
(declare (shader_out) float o)
(function main
  (signature void (parameters) (
    (assign (x) (var_ref o) (array_ref (var_ref constarray_0_4) (var_ref i)))
  ))
)
"
        );
        assert!(!lower_const_arrays_to_uniforms(&mut shader, 16));
    }

    #[test]
    fn uniform_budget_is_respected() {
        let mut shader = read_shader(SOURCE).expect("valid source");
        // `i` already takes one slot
        assert!(!lower_const_arrays_to_uniforms(&mut shader, 2));
        assert!(lower_const_arrays_to_uniforms(&mut shader, 3));
    }
}
