#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}
impl ShaderStage {
    pub const fn index(self) -> u32 {
        match self {
            Self::Vertex => 0,
            Self::TessControl => 1,
            Self::TessEvaluation => 2,
            Self::Geometry => 3,
            Self::Fragment => 4,
            Self::Compute => 5,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "vertex" | "vert" => Some(Self::Vertex),
            "tess_ctrl" | "tesc" => Some(Self::TessControl),
            "tess_eval" | "tese" => Some(Self::TessEvaluation),
            "geometry" | "geom" => Some(Self::Geometry),
            "fragment" | "frag" => Some(Self::Fragment),
            "compute" | "comp" => Some(Self::Compute),
            _ => None,
        }
    }
}

/// Storage class of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableMode {
    /// Ordinary local or global declared by the program.
    Auto,
    /// Compiler-introduced temporary.
    Temporary,
    Uniform,
    ShaderStorage,
    ShaderIn,
    ShaderOut,
    FunctionIn,
    FunctionOut,
    FunctionInout,
    ConstIn,
    SystemValue,
}
impl VariableMode {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Temporary => "temporary",
            Self::Uniform => "uniform",
            Self::ShaderStorage => "buffer",
            Self::ShaderIn => "shader_in",
            Self::ShaderOut => "shader_out",
            Self::FunctionIn => "in",
            Self::FunctionOut => "out",
            Self::FunctionInout => "inout",
            Self::ConstIn => "const_in",
            Self::SystemValue => "system_value",
        }
    }

    pub fn from_keyword(x: &str) -> Option<Self> {
        Some(match x {
            "auto" => Self::Auto,
            "temporary" => Self::Temporary,
            "uniform" => Self::Uniform,
            "buffer" => Self::ShaderStorage,
            "shader_in" => Self::ShaderIn,
            "shader_out" => Self::ShaderOut,
            "in" => Self::FunctionIn,
            "out" => Self::FunctionOut,
            "inout" => Self::FunctionInout,
            "const_in" => Self::ConstIn,
            "system_value" => Self::SystemValue,
            _ => return None,
        })
    }

    pub const fn is_parameter(self) -> bool {
        matches!(
            self,
            Self::FunctionIn | Self::FunctionOut | Self::FunctionInout | Self::ConstIn
        )
    }

    /// Parameters whose final value flows back to the caller.
    pub const fn writes_back(self) -> bool {
        matches!(self, Self::FunctionOut | Self::FunctionInout)
    }

    /// Parameters whose initial value comes from the caller.
    pub const fn reads_in(self) -> bool {
        matches!(
            self,
            Self::FunctionIn | Self::ConstIn | Self::FunctionInout
        )
    }

    /// Part of the program's external interface: uniforms, buffers and varyings.
    pub const fn is_interface(self) -> bool {
        matches!(
            self,
            Self::Uniform | Self::ShaderStorage | Self::ShaderIn | Self::ShaderOut | Self::SystemValue
        )
    }
}

bitflags::bitflags! {
    #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
    pub struct VariableFlags : u32 {
        const READ_ONLY = 0x01;
        /// Stays active across a separable program boundary even when unused.
        const ALWAYS_ACTIVE_IO = 0x02;
        const INVARIANT = 0x04;
        const PRECISE = 0x08;
        const IMPLICIT_CONVERSION_PROHIBITED = 0x10;
        /// Introduced by the compiler, never written by the program.
        const HIDDEN = 0x20;
    }
}
impl VariableFlags {
    pub const KEYWORDS: [(&'static str, Self); 6] = [
        ("read_only", Self::READ_ONLY),
        ("always_active", Self::ALWAYS_ACTIVE_IO),
        ("invariant", Self::INVARIANT),
        ("precise", Self::PRECISE),
        ("no_implicit_conversion", Self::IMPLICIT_CONVERSION_PROHIBITED),
        ("hidden", Self::HIDDEN),
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfacePacking {
    Std140,
    Shared,
    Packed,
    Std430,
}
impl InterfacePacking {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Std140 => "std140",
            Self::Shared => "shared",
            Self::Packed => "packed",
            Self::Std430 => "std430",
        }
    }

    pub fn from_keyword(x: &str) -> Option<Self> {
        match x {
            "std140" => Some(Self::Std140),
            "shared" => Some(Self::Shared),
            "packed" => Some(Self::Packed),
            "std430" => Some(Self::Std430),
            _ => None,
        }
    }
}

/// Layout qualifiers carried by a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableAttribute {
    pub location: Option<i32>,
    pub binding: Option<i32>,
    /// Set when the variable is a member of an interface block with this layout.
    pub interface_packing: Option<InterfacePacking>,
}
impl Default for VariableAttribute {
    fn default() -> Self {
        Self {
            location: None,
            binding: None,
            interface_packing: None,
        }
    }
}
impl VariableAttribute {
    pub const fn is_empty(&self) -> bool {
        matches!(
            self,
            VariableAttribute {
                location: None,
                binding: None,
                interface_packing: None
            }
        )
    }
}

bitflags::bitflags! {
    #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
    pub struct Extensions : u32 {
        const GPU_SHADER5 = 0x01;
        const GPU_SHADER_FP64 = 0x02;
        const SHADER_INTEGER_FUNCTIONS = 0x04;
        const SHADER_SUBROUTINE = 0x08;
        const SHADER_IMPLICIT_CONVERSIONS = 0x10;
    }
}
impl Extensions {
    pub fn from_extension_name(name: &str) -> Option<Self> {
        match name {
            "GL_ARB_gpu_shader5" => Some(Self::GPU_SHADER5),
            "GL_ARB_gpu_shader_fp64" => Some(Self::GPU_SHADER_FP64),
            "GL_MESA_shader_integer_functions" => Some(Self::SHADER_INTEGER_FUNCTIONS),
            "GL_ARB_shader_subroutine" => Some(Self::SHADER_SUBROUTINE),
            "GL_EXT_shader_implicit_conversions" => Some(Self::SHADER_IMPLICIT_CONVERSIONS),
            _ => None,
        }
    }
}

/// Language version and enabled extensions of the shader being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageState {
    pub version: u32,
    pub es: bool,
    pub extensions: Extensions,
}
impl Default for LanguageState {
    fn default() -> Self {
        Self::new(460, false)
    }
}
impl LanguageState {
    pub const fn new(version: u32, es: bool) -> Self {
        Self {
            version,
            es,
            extensions: Extensions::empty(),
        }
    }

    /// A required version of 0 means "never" for that profile.
    pub const fn is_version(&self, desktop: u32, es: u32) -> bool {
        let required = if self.es { es } else { desktop };
        required != 0 && self.version >= required
    }

    pub const fn has_implicit_conversions(&self) -> bool {
        self.extensions
            .contains(Extensions::SHADER_IMPLICIT_CONVERSIONS)
            || self.is_version(120, 0)
    }

    pub const fn has_implicit_int_to_uint_conversion(&self) -> bool {
        self.is_version(400, 0)
            || self.extensions.intersects(
                Extensions::GPU_SHADER5.union(Extensions::SHADER_INTEGER_FUNCTIONS),
            )
    }

    pub const fn has_double(&self) -> bool {
        self.extensions.contains(Extensions::GPU_SHADER_FP64) || self.is_version(400, 0)
    }

    /// Whether several inexact overload candidates may be ranked against each other.
    pub const fn ranks_inexact_overloads(&self) -> bool {
        self.has_implicit_int_to_uint_conversion()
            || self
                .extensions
                .contains(Extensions::SHADER_IMPLICIT_CONVERSIONS)
    }
}
