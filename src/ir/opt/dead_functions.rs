//! Removal of function signatures nothing calls.

use std::collections::BTreeSet;

use crate::ir::{
    visit::{walk_shader, VisitAction, VisitCx, Visitor},
    Call, Shader, SignatureRef, Statement,
};

#[derive(Default)]
struct CalledSignatures(BTreeSet<SignatureRef>);
impl Visitor for CalledSignatures {
    fn enter_call(&mut self, c: &Call, _: VisitCx) -> VisitAction {
        self.0.insert(c.callee);
        VisitAction::Continue
    }
}

/// Only valid on a linked program: a signature is kept when it belongs to `main` or to a
/// subroutine implementation, or when some call anywhere in the program targets it.
///
/// Calls made only from signatures removed by this run keep their callees alive until the
/// next run.
pub fn do_dead_functions(shader: &mut Shader) -> bool {
    let mut called = CalledSignatures::default();
    walk_shader(&mut called, shader);

    let mut modified = false;
    for f in shader.linked_functions() {
        let function = shader.function(f);
        if function.name == "main" || function.subroutine_index.is_some() {
            continue;
        }

        let (used, unused): (Vec<_>, Vec<_>) = function
            .signatures
            .iter()
            .copied()
            .partition(|s| called.0.contains(s));
        if unused.is_empty() {
            continue;
        }
        log::debug!(
            "[dead_functions] removing {} signature(s) of {}",
            unused.len(),
            function.name
        );
        shader.function_mut(f).signatures = used;
        modified = true;
    }

    let emptied = shader
        .linked_functions()
        .into_iter()
        .filter(|&f| shader.function(f).signatures.is_empty())
        .collect::<BTreeSet<_>>();
    if !emptied.is_empty() {
        shader
            .instructions
            .retain(|s| !matches!(s, Statement::Function(f) if emptied.contains(f)));
        modified = true;
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::reader::read_shader;

    const SOURCE: &str = r#"
        (function helper (signature float (parameters) ((return (constant float (1.0))))))
        (function unused_leaf (signature void (parameters) ()))
        (function unused_caller (signature void (parameters) ((call unused_leaf ()))))
        (function overloaded
            (signature void (parameters (declare (in) float x)) ())
            (signature void (parameters (declare (in) int x)) ()))
        (function impl (subroutine_index 0) (signature void (parameters) ()))
        (function main (signature void (parameters) (
            (declare () float t)
            (call helper (var_ref t) ())
            (call overloaded ((constant int (1))))
        )))
    "#;

    fn names(shader: &Shader) -> Vec<String> {
        shader
            .linked_functions()
            .into_iter()
            .map(|f| shader.function(f).name.clone())
            .collect()
    }

    #[test]
    fn removes_uncalled_and_cascades_across_runs() {
        let mut shader = read_shader(SOURCE).expect("valid source");

        assert!(do_dead_functions(&mut shader));
        assert_eq!(
            names(&shader),
            ["helper", "unused_leaf", "overloaded", "impl", "main"]
        );
        let overloaded = shader.find_function("overloaded").expect("kept");
        assert_eq!(shader.function(overloaded).signatures.len(), 1);

        assert!(do_dead_functions(&mut shader));
        assert_eq!(names(&shader), ["helper", "overloaded", "impl", "main"]);
        assert!(!do_dead_functions(&mut shader));
    }
}
