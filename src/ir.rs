use std::sync::Arc;

use crate::{
    builtins::Availability,
    glsl_type::{GlslType, StructType},
    symbol::meta::{LanguageState, ShaderStage, VariableMode},
};

pub mod builder;
pub mod clone;
pub mod constant;
pub mod expression;
pub mod opt;
pub mod print;
pub mod reader;
pub mod visit;

use constant::Constant;
pub use crate::symbol::Variable;
pub use expression::ExprOp;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarRef(pub usize);
impl core::fmt::Debug for VarRef {
    #[inline(always)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FunctionRef(pub usize);
impl core::fmt::Debug for FunctionRef {
    #[inline(always)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SignatureRef(pub usize);
impl core::fmt::Debug for SignatureRef {
    #[inline(always)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sig#{}", self.0)
    }
}

/// A group of overloads sharing a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub signatures: Vec<SignatureRef>,
    /// This function declares a subroutine type.
    pub is_subroutine: bool,
    /// Index of a subroutine implementation, compared against selector values.
    pub subroutine_index: Option<u32>,
    /// Subroutine types this function implements.
    pub subroutine_types: Vec<String>,
}
impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signatures: Vec::new(),
            is_subroutine: false,
            subroutine_index: None,
            subroutine_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub function: FunctionRef,
    pub return_type: GlslType,
    pub parameters: Vec<VarRef>,
    pub body: Vec<Statement>,
    pub is_defined: bool,
    /// Set for signatures imported from the builtin table.
    pub builtin: Option<Availability>,
}
impl FunctionSignature {
    pub fn is_builtin(&self) -> bool {
        self.builtin.is_some()
    }

    pub fn is_builtin_available(&self, state: &LanguageState) -> bool {
        self.builtin.map_or(true, |a| a.is_available(state))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopJump {
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declaration(VarRef),
    Assign(Assignment),
    Call(Call),
    Return(Option<Rvalue>),
    /// Discard, optionally only when the condition holds.
    Discard(Option<Rvalue>),
    If(IfStatement),
    Loop(Vec<Statement>),
    LoopJump(LoopJump),
    EmitVertex,
    EndPrimitive,
    Function(FunctionRef),
    TypeDecl(Arc<StructType>),
    Precision(String),
}

/// `lhs = rhs` restricted to the channels of `write_mask`.
///
/// For a scalar or vector `lhs` the right hand side carries one component per enabled
/// channel, packed in channel order. Any other `lhs` type is written whole and uses a mask of 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub lhs: Deref,
    pub rhs: Rvalue,
    pub write_mask: u8,
    pub condition: Option<Rvalue>,
}
impl Assignment {
    /// Writes all of `rhs`'s components.
    pub fn new(lhs: Deref, rhs: Rvalue, shader: &Shader) -> Self {
        let write_mask = full_write_mask(&rhs.ty(shader));
        Self {
            lhs,
            rhs,
            write_mask,
            condition: None,
        }
    }

    pub fn with_mask(lhs: Deref, rhs: Rvalue, write_mask: u8) -> Self {
        Self {
            lhs,
            rhs,
            write_mask,
            condition: None,
        }
    }

    /// The variable written if this assignment replaces its whole value unconditionally.
    pub fn whole_variable_written(&self, shader: &Shader) -> Option<VarRef> {
        let Deref::Variable(v) = self.lhs else {
            return None;
        };
        if self.condition.is_some() {
            return None;
        }

        (self.write_mask == full_write_mask(&shader.var(v).ty)).then_some(v)
    }
}

/// Mask covering every channel of a scalar or vector, 0 for other types.
pub fn full_write_mask(ty: &GlslType) -> u8 {
    if ty.is_basic_vector() {
        ((1u32 << ty.vector_elements()) - 1) as u8
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: SignatureRef,
    pub actual_parameters: Vec<Rvalue>,
    pub return_deref: Option<Deref>,
    /// Subroutine uniform selecting the implementation of an indirect call.
    pub sub_var: Option<Deref>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Rvalue,
    pub then_instructions: Vec<Statement>,
    pub else_instructions: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Constant(Constant),
    Deref(Deref),
    Expression(Box<Expression>),
    Swizzle(Box<Swizzle>),
    Texture(Box<Texture>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Deref {
    Variable(VarRef),
    /// Array element, matrix column or vector component.
    Array {
        array: Box<Rvalue>,
        index: Box<Rvalue>,
        ty: GlslType,
    },
    Record {
        record: Box<Rvalue>,
        field: String,
        ty: GlslType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub op: ExprOp,
    pub ty: GlslType,
    pub operands: Vec<Rvalue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Swizzle {
    pub val: Rvalue,
    pub mask: [u8; 4],
    pub count: u8,
}
impl Swizzle {
    pub fn components(&self) -> &[u8] {
        &self.mask[..self.count as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexOp {
    Tex,
    Txb,
    Txl,
    Txd,
    Txf,
    Txs,
    Lod,
}
impl TexOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tex => "tex",
            Self::Txb => "txb",
            Self::Txl => "txl",
            Self::Txd => "txd",
            Self::Txf => "txf",
            Self::Txs => "txs",
            Self::Lod => "lod",
        }
    }

    pub fn from_name(x: &str) -> Option<Self> {
        [
            Self::Tex,
            Self::Txb,
            Self::Txl,
            Self::Txd,
            Self::Txf,
            Self::Txs,
            Self::Lod,
        ]
        .into_iter()
        .find(|op| op.name() == x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LodInfo {
    None,
    Bias(Rvalue),
    Lod(Rvalue),
    Grad { dpdx: Rvalue, dpdy: Rvalue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub op: TexOp,
    pub ty: GlslType,
    pub sampler: Deref,
    pub coordinate: Option<Rvalue>,
    pub projector: Option<Rvalue>,
    pub shadow_comparator: Option<Rvalue>,
    pub offset: Option<Rvalue>,
    pub lod_info: LodInfo,
}

impl Rvalue {
    #[inline(always)]
    pub const fn var(v: VarRef) -> Self {
        Self::Deref(Deref::Variable(v))
    }

    pub fn ty(&self, shader: &Shader) -> GlslType {
        match self {
            Self::Constant(c) => c.ty.clone(),
            Self::Deref(d) => d.ty(shader),
            Self::Expression(e) => e.ty.clone(),
            Self::Swizzle(s) => {
                let base = s
                    .val
                    .ty(shader)
                    .base_type()
                    .unwrap_or_else(|| panic!("swizzle of a non-vector value"));
                GlslType::vector(base, s.count)
            }
            Self::Texture(t) => t.ty.clone(),
        }
    }

    pub fn as_deref(&self) -> Option<&Deref> {
        match self {
            Self::Deref(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Self::Expression(e) => Some(e),
            _ => None,
        }
    }

    /// Variable at the root of a dereference chain.
    pub fn variable_referenced(&self) -> Option<VarRef> {
        self.as_deref().and_then(Deref::variable_referenced)
    }
}

impl Deref {
    pub fn ty(&self, shader: &Shader) -> GlslType {
        match self {
            &Self::Variable(v) => shader.var(v).ty.clone(),
            Self::Array { ty, .. } | Self::Record { ty, .. } => ty.clone(),
        }
    }

    pub fn variable_referenced(&self) -> Option<VarRef> {
        match self {
            &Self::Variable(v) => Some(v),
            Self::Array { array, .. } => array.variable_referenced(),
            Self::Record { record, .. } => record.variable_referenced(),
        }
    }

    pub fn as_variable(&self) -> Option<VarRef> {
        match self {
            &Self::Variable(v) => Some(v),
            _ => None,
        }
    }
}

/// Everything one compilation unit consists of.
///
/// Variables, functions and signatures live in arenas indexed by their handles and are never
/// freed individually: removing one from the program only unlinks the statement that
/// declares it. Dropping the shader frees everything at once.
#[derive(Debug, Clone)]
pub struct Shader {
    pub stage: ShaderStage,
    pub language: LanguageState,
    variables: Vec<Variable>,
    functions: Vec<Function>,
    signatures: Vec<FunctionSignature>,
    /// Global declarations, functions, type declarations and precision statements.
    pub instructions: Vec<Statement>,
}
impl Shader {
    pub fn new(stage: ShaderStage, language: LanguageState) -> Self {
        Self {
            stage,
            language,
            variables: Vec::new(),
            functions: Vec::new(),
            signatures: Vec::new(),
            instructions: Vec::new(),
        }
    }

    pub fn add_variable(&mut self, var: Variable) -> VarRef {
        self.variables.push(var);
        VarRef(self.variables.len() - 1)
    }

    pub fn new_temporary(&mut self, name: &str, ty: GlslType) -> VarRef {
        self.add_variable(Variable::new(name, ty, VariableMode::Temporary))
    }

    #[inline(always)]
    pub fn var(&self, v: VarRef) -> &Variable {
        &self.variables[v.0]
    }

    #[inline(always)]
    pub fn var_mut(&mut self, v: VarRef) -> &mut Variable {
        &mut self.variables[v.0]
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn add_function(&mut self, f: Function) -> FunctionRef {
        self.functions.push(f);
        FunctionRef(self.functions.len() - 1)
    }

    #[inline(always)]
    pub fn function(&self, f: FunctionRef) -> &Function {
        &self.functions[f.0]
    }

    #[inline(always)]
    pub fn function_mut(&mut self, f: FunctionRef) -> &mut Function {
        &mut self.functions[f.0]
    }

    /// Adds a signature and registers it with its function.
    pub fn add_signature(&mut self, sig: FunctionSignature) -> SignatureRef {
        let function = sig.function;
        self.signatures.push(sig);
        let r = SignatureRef(self.signatures.len() - 1);
        self.functions[function.0].signatures.push(r);
        r
    }

    #[inline(always)]
    pub fn signature(&self, s: SignatureRef) -> &FunctionSignature {
        &self.signatures[s.0]
    }

    #[inline(always)]
    pub fn signature_mut(&mut self, s: SignatureRef) -> &mut FunctionSignature {
        &mut self.signatures[s.0]
    }

    pub fn signature_name(&self, s: SignatureRef) -> &str {
        &self.function(self.signature(s).function).name
    }

    /// Functions linked into the program, in declaration order.
    pub fn linked_functions(&self) -> Vec<FunctionRef> {
        self.instructions
            .iter()
            .filter_map(|s| match s {
                &Statement::Function(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionRef> {
        self.linked_functions()
            .into_iter()
            .find(|&f| self.function(f).name == name)
    }

    /// Signatures with bodies, in declaration order.
    pub fn defined_signatures(&self) -> Vec<SignatureRef> {
        self.linked_functions()
            .into_iter()
            .flat_map(|f| self.function(f).signatures.clone())
            .filter(|&s| self.signature(s).is_defined)
            .collect()
    }

    pub fn main_signature(&self) -> Option<SignatureRef> {
        let main = self.find_function("main")?;
        self.function(main)
            .signatures
            .iter()
            .copied()
            .find(|&s| self.signature(s).parameters.is_empty() && self.signature(s).is_defined)
    }

    /// Runs `f` with the body of `sig` moved out of the shader, then puts it back.
    pub fn with_body<R>(
        &mut self,
        sig: SignatureRef,
        f: impl FnOnce(&mut Shader, &mut Vec<Statement>) -> R,
    ) -> R {
        let mut body = core::mem::take(&mut self.signature_mut(sig).body);
        let r = f(self, &mut body);
        self.signature_mut(sig).body = body;
        r
    }

    /// Runs `f` over every function body in turn, OR-ing the results.
    pub fn for_each_body(&mut self, mut f: impl FnMut(&mut Shader, SignatureRef, &mut Vec<Statement>) -> bool) -> bool {
        let mut modified = false;
        for sig in self.defined_signatures() {
            modified |= self.with_body(sig, |shader, body| f(shader, sig, body));
        }

        modified
    }

    /// Global variable declarations, in order.
    pub fn global_variables(&self) -> Vec<VarRef> {
        self.instructions
            .iter()
            .filter_map(|s| match s {
                &Statement::Declaration(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Inserts a global declaration after the declaration of `anchor` (or at the front).
    pub fn insert_global_after(&mut self, anchor: Option<VarRef>, v: VarRef) {
        let at = anchor
            .and_then(|a| {
                self.instructions
                    .iter()
                    .position(|s| matches!(s, &Statement::Declaration(x) if x == a))
            })
            .map_or(0, |p| p + 1);
        self.instructions.insert(at, Statement::Declaration(v));
    }
}
