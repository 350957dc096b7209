//! Process-wide table of built-in function prototypes.
//!
//! Built on first use and never mutated afterwards, so independent optimizer instances may
//! share it from any thread. Shaders copy what they call into their own arenas through
//! [`Shader::import_builtin`].

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    error::SymbolError,
    glsl_type::{BaseType, GlslType, SamplerDim},
    ir::{Function, FunctionRef, FunctionSignature, Shader},
    scope::SymbolTable,
    symbol::{
        meta::{Extensions, LanguageState, VariableMode},
        Variable,
    },
};

/// When a built-in is visible to a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Minimum desktop version; 0 means never on desktop.
    pub desktop: u32,
    /// Minimum ES version; 0 means never on ES.
    pub es: u32,
    /// Extensions making the function visible regardless of version.
    pub extensions: Extensions,
}
impl Availability {
    pub const ALWAYS: Self = Self::since(110, 100);

    pub const fn since(desktop: u32, es: u32) -> Self {
        Self {
            desktop,
            es,
            extensions: Extensions::empty(),
        }
    }

    pub const fn or_extension(self, extensions: Extensions) -> Self {
        Self { extensions, ..self }
    }

    pub const fn is_available(&self, state: &LanguageState) -> bool {
        state.is_version(self.desktop, self.es) || state.extensions.intersects(self.extensions)
    }
}

#[derive(Debug, Clone)]
pub struct BuiltinSignature {
    pub return_type: GlslType,
    pub parameters: Vec<(VariableMode, GlslType)>,
    pub availability: Availability,
}

pub type BuiltinTable = HashMap<&'static str, Vec<BuiltinSignature>>;

static BUILTINS: OnceLock<BuiltinTable> = OnceLock::new();

pub fn builtin_functions() -> &'static BuiltinTable {
    BUILTINS.get_or_init(build_table)
}

fn gen_types(base: BaseType) -> impl Iterator<Item = GlslType> {
    (1..=4).map(move |n| GlslType::vector(base, n))
}

struct TableBuilder(BuiltinTable);
impl TableBuilder {
    fn add(
        &mut self,
        name: &'static str,
        availability: Availability,
        return_type: GlslType,
        parameters: &[(VariableMode, GlslType)],
    ) {
        self.0.entry(name).or_default().push(BuiltinSignature {
            return_type,
            parameters: parameters.to_vec(),
            availability,
        });
    }

    /// `T name(T, ...)` for every vector width of `base`.
    fn component_wise(
        &mut self,
        name: &'static str,
        availability: Availability,
        base: BaseType,
        arity: usize,
    ) {
        for t in gen_types(base) {
            let params = vec![(VariableMode::FunctionIn, t.clone()); arity];
            self.add(name, availability, t, &params);
        }
    }

    /// `T name(T, scalar)` for vector widths 2 to 4.
    fn with_scalar_tail(&mut self, name: &'static str, availability: Availability, base: BaseType) {
        let scalar = GlslType::vector(base, 1);
        for t in gen_types(base).skip(1) {
            self.add(
                name,
                availability,
                t.clone(),
                &[
                    (VariableMode::FunctionIn, t),
                    (VariableMode::FunctionIn, scalar.clone()),
                ],
            );
        }
    }
}

fn build_table() -> BuiltinTable {
    use BaseType::*;
    use VariableMode::{FunctionIn as In, FunctionOut as Out};

    let always = Availability::ALWAYS;
    let v130 = Availability::since(130, 300);
    let fp64 = Availability::since(400, 0).or_extension(Extensions::GPU_SHADER_FP64);
    let shader5 = Availability::since(400, 320)
        .or_extension(Extensions::GPU_SHADER5.union(Extensions::SHADER_INTEGER_FUNCTIONS));

    let mut b = TableBuilder(HashMap::new());
    for name in [
        "radians",
        "degrees",
        "sin",
        "cos",
        "tan",
        "exp",
        "log",
        "exp2",
        "log2",
        "sqrt",
        "inversesqrt",
        "abs",
        "sign",
        "floor",
        "ceil",
        "fract",
        "normalize",
    ] {
        b.component_wise(name, always, Float, 1);
    }
    for name in ["abs", "sign"] {
        b.component_wise(name, v130, Int, 1);
    }
    for name in ["pow", "mod", "min", "max", "step"] {
        b.component_wise(name, always, Float, 2);
    }
    for name in ["mod", "min", "max"] {
        b.with_scalar_tail(name, always, Float);
    }
    for base in [Int, Uint] {
        b.component_wise("min", v130, base, 2);
        b.component_wise("max", v130, base, 2);
        b.component_wise("clamp", v130, base, 3);
    }
    b.component_wise("min", fp64, Double, 2);
    b.component_wise("max", fp64, Double, 2);
    b.component_wise("clamp", always, Float, 3);
    b.component_wise("mix", always, Float, 3);
    b.component_wise("fma", shader5, Float, 3);
    b.component_wise("fma", fp64, Double, 3);

    for t in gen_types(Float) {
        let float = GlslType::FLOAT;
        b.add("dot", always, float.clone(), &[(In, t.clone()), (In, t.clone())]);
        b.add("distance", always, float.clone(), &[(In, t.clone()), (In, t.clone())]);
        b.add("length", always, float, &[(In, t.clone())]);
        b.add(
            "frexp",
            shader5,
            t.clone(),
            &[(In, t.clone()), (Out, t.with_base(Int).unwrap_or(GlslType::INT))],
        );
    }
    for t in gen_types(Uint) {
        b.add(
            "uaddCarry",
            shader5,
            t.clone(),
            &[(In, t.clone()), (In, t.clone()), (Out, t)],
        );
    }
    let vec3 = GlslType::vector(Float, 3);
    b.add("cross", always, vec3.clone(), &[(In, vec3.clone()), (In, vec3)]);

    for n in 2..=4 {
        let m = GlslType::matrix(Float, n, n);
        b.add("transpose", Availability::since(120, 300), m.clone(), &[(In, m.clone())]);
        b.add("inverse", Availability::since(140, 300), m.clone(), &[(In, m.clone())]);
        b.add("determinant", Availability::since(150, 300), GlslType::FLOAT, &[(In, m)]);
    }

    let vec4 = GlslType::vector(Float, 4);
    for (dim, coord) in [
        (SamplerDim::Dim2D, 2),
        (SamplerDim::Dim3D, 3),
        (SamplerDim::Cube, 3),
    ] {
        let sampler = GlslType::Sampler {
            dim,
            shadow: false,
            array: false,
            base: Float,
        };
        b.add(
            "texture",
            v130,
            vec4.clone(),
            &[(In, sampler), (In, GlslType::vector(Float, coord))],
        );
    }
    let sampler2d = GlslType::Sampler {
        dim: SamplerDim::Dim2D,
        shadow: false,
        array: false,
        base: Float,
    };
    b.add(
        "texture2D",
        Availability::since(110, 100),
        vec4,
        &[(In, sampler2d), (In, GlslType::vector(Float, 2))],
    );

    b.0
}

impl Shader {
    /// Copies the built-in function `name` into this shader and makes it visible from every
    /// scope of `symbols`. Returns `None` when there is no built-in of that name.
    ///
    /// Signatures unavailable under the shader's language state are still imported; overload
    /// resolution skips them.
    pub fn import_builtin(
        &mut self,
        name: &str,
        symbols: &mut SymbolTable,
    ) -> Result<Option<FunctionRef>, SymbolError> {
        let Some((&static_name, signatures)) = builtin_functions().get_key_value(name) else {
            return Ok(None);
        };

        let f = self.add_function(Function::new(static_name));
        for sig in signatures {
            let parameters = sig
                .parameters
                .iter()
                .enumerate()
                .map(|(n, (mode, ty))| {
                    self.add_variable(Variable::new(format!("p{n}"), ty.clone(), *mode))
                })
                .collect();
            self.add_signature(FunctionSignature {
                function: f,
                return_type: sig.return_type.clone(),
                parameters,
                body: Vec::new(),
                is_defined: false,
                builtin: Some(sig.availability),
            });
        }
        symbols.add_global_function(static_name, f)?;
        log::trace!("[builtins] imported {static_name} ({} signatures)", signatures.len());

        Ok(Some(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_follows_version_and_extensions() {
        let fma = &builtin_functions()["fma"][0];
        let mut state = LanguageState::new(330, false);
        assert!(!fma.availability.is_available(&state));
        state.extensions |= Extensions::GPU_SHADER5;
        assert!(fma.availability.is_available(&state));
        assert!(fma
            .availability
            .is_available(&LanguageState::new(400, false)));
    }

    #[test]
    fn table_is_shared() {
        assert!(std::ptr::eq(builtin_functions(), builtin_functions()));
        assert!(builtin_functions()["max"].len() > 4);
    }
}
