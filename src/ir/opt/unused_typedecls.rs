//! Removal of struct declarations nothing refers to.

use crate::{
    glsl_type::GlslType,
    ir::{
        visit::{walk_shader, VisitAction, VisitCx, Visitor},
        Deref, Expression, Shader, SignatureRef, Statement, Texture, VarRef,
    },
};

/// Every type a variable, signature or value of the program has. Struct types carry their
/// fields, so a struct only reachable through another used struct is found through it.
#[derive(Default)]
struct UsedTypes(Vec<GlslType>);
impl UsedTypes {
    fn add(&mut self, ty: &GlslType) {
        if ty.without_array().is_struct() && !self.0.contains(ty) {
            self.0.push(ty.clone());
        }
    }

    fn references(&self, name: &str) -> bool {
        self.0.iter().any(|t| t.references_struct(name))
    }
}
impl Visitor for UsedTypes {
    fn visit_declaration(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        self.add(&cx.shader.var(var).ty);
        VisitAction::Continue
    }

    fn enter_signature(&mut self, sig: SignatureRef, cx: VisitCx) -> VisitAction {
        let sig = cx.shader.signature(sig);
        self.add(&sig.return_type);
        for &p in &sig.parameters {
            self.add(&cx.shader.var(p).ty);
        }
        VisitAction::Continue
    }

    fn enter_expression(&mut self, e: &Expression, _cx: VisitCx) -> VisitAction {
        self.add(&e.ty);
        VisitAction::Continue
    }

    fn enter_texture(&mut self, t: &Texture, _cx: VisitCx) -> VisitAction {
        self.add(&t.ty);
        VisitAction::Continue
    }

    fn enter_array_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        self.add(&d.ty(cx.shader));
        VisitAction::Continue
    }

    fn enter_record_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        self.add(&d.ty(cx.shader));
        VisitAction::Continue
    }

    fn visit_variable(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        // variables declared by earlier passes without a statement are still in use
        self.add(&cx.shader.var(var).ty);
        VisitAction::Continue
    }
}

/// Drops every `typedecl` whose struct is not mentioned by any variable, signature or value.
pub fn do_remove_unused_typedecls(shader: &mut Shader) -> bool {
    let mut used = UsedTypes::default();
    walk_shader(&mut used, shader);

    let before = shader.instructions.len();
    shader.instructions.retain(|s| match s {
        Statement::TypeDecl(t) if !used.references(&t.name) => {
            log::debug!("[unused_typedecls] removing struct {}", t.name);
            false
        }
        _ => true,
    });

    shader.instructions.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::reader::read_shader;

    fn declared_structs(shader: &Shader) -> Vec<String> {
        shader
            .instructions
            .iter()
            .filter_map(|s| match s {
                Statement::TypeDecl(t) => Some(t.name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn only_reachable_structs_survive() {
        let mut shader = read_shader(
            r#"
            (typedecl Light ((vec3 position) (float intensity)))
            (typedecl Scene ((Light key) (Light fill)))
            (typedecl Unused ((int x)))
            (typedecl UsesUnused ((Unused u)))
            (declare (uniform) Scene scene)
            (function main (signature void (parameters) ()))
            "#,
        )
        .expect("valid source");

        assert!(do_remove_unused_typedecls(&mut shader));
        assert_eq!(declared_structs(&shader), ["Light", "Scene"]);
        assert!(!do_remove_unused_typedecls(&mut shader));
    }

    #[test]
    fn parameter_and_return_types_count() {
        let mut shader = read_shader(
            r#"
            (typedecl P ((float x)))
            (typedecl R ((float y)))
            (function f (signature R (parameters (declare (in) P p)) (
                (declare () R r)
                (assign (x) (record_ref (var_ref r) y) (record_ref (var_ref p) x))
                (return (var_ref r)))))
            (function main (signature void (parameters) ()))
            "#,
        )
        .expect("valid source");

        assert!(!do_remove_unused_typedecls(&mut shader));
        assert_eq!(declared_structs(&shader), ["P", "R"]);
    }
}
