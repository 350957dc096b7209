use meta::{VariableAttribute, VariableFlags, VariableMode};

use crate::{glsl_type::GlslType, ir::constant::Constant};

pub mod meta;

/// A named storage location. Owned by the shader's variable arena; statements refer to it
/// by [`VarRef`](crate::ir::VarRef).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: GlslType,
    pub mode: VariableMode,
    pub flags: VariableFlags,
    pub attribute: VariableAttribute,
    /// Value the variable is known to hold for its whole lifetime.
    pub constant_value: Option<Constant>,
    /// Initializer given at the declaration (uniforms and constants).
    pub constant_initializer: Option<Constant>,
}
impl Variable {
    pub fn new(name: impl Into<String>, ty: GlslType, mode: VariableMode) -> Self {
        Self {
            name: name.into(),
            ty,
            mode,
            flags: VariableFlags::empty(),
            attribute: VariableAttribute::default(),
            constant_value: None,
            constant_initializer: None,
        }
    }

    pub fn is_in_buffer_block(&self) -> bool {
        self.attribute.interface_packing.is_some()
            && matches!(self.mode, VariableMode::Uniform | VariableMode::ShaderStorage)
    }

    /// Constant value usable for folding; uniform initializers are not lifetime constants.
    pub fn foldable_value(&self) -> Option<&Constant> {
        if self.mode == VariableMode::Uniform {
            return None;
        }

        self.constant_value.as_ref()
    }
}
