use std::sync::Arc;

pub mod conversion_rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseType {
    Bool,
    Int,
    Uint,
    Float,
    Double,
}
impl BaseType {
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Uint)
    }

    /// Prefix used in vector/matrix type names (`ivec3`, `dmat2`, ...).
    const fn prefix(self) -> &'static str {
        match self {
            Self::Bool => "b",
            Self::Int => "i",
            Self::Uint => "u",
            Self::Float => "",
            Self::Double => "d",
        }
    }

    const fn scalar_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerDim {
    Dim1D,
    Dim2D,
    Dim3D,
    Cube,
    Rect,
    Buffer,
}
impl SamplerDim {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Dim1D => "1D",
            Self::Dim2D => "2D",
            Self::Dim3D => "3D",
            Self::Cube => "Cube",
            Self::Rect => "2DRect",
            Self::Buffer => "Buffer",
        }
    }

    /// Number of coordinate components addressing a texel.
    pub const fn coordinate_components(self) -> u8 {
        match self {
            Self::Dim1D | Self::Buffer => 1,
            Self::Dim2D | Self::Rect => 2,
            Self::Dim3D | Self::Cube => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: GlslType,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}
impl StructType {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Shape of a value flowing through the IR.
///
/// Matrices are column-major: `matrix_columns` columns of `vector_elements` rows each.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlslType {
    Void,
    Basic {
        base: BaseType,
        vector_elements: u8,
        matrix_columns: u8,
    },
    /// `length` is `None` for an array that has not been sized yet.
    Array {
        element: Box<GlslType>,
        length: Option<u32>,
    },
    Struct(Arc<StructType>),
    Sampler {
        dim: SamplerDim,
        shadow: bool,
        array: bool,
        base: BaseType,
    },
    Image {
        dim: SamplerDim,
        base: BaseType,
    },
    AtomicUint,
    /// A subroutine type, named by its declaring function.
    Subroutine(String),
}
impl GlslType {
    pub const BOOL: Self = Self::vector(BaseType::Bool, 1);
    pub const INT: Self = Self::vector(BaseType::Int, 1);
    pub const UINT: Self = Self::vector(BaseType::Uint, 1);
    pub const FLOAT: Self = Self::vector(BaseType::Float, 1);
    pub const DOUBLE: Self = Self::vector(BaseType::Double, 1);

    #[inline(always)]
    pub const fn vector(base: BaseType, vector_elements: u8) -> Self {
        Self::Basic {
            base,
            vector_elements,
            matrix_columns: 1,
        }
    }

    #[inline(always)]
    pub const fn matrix(base: BaseType, columns: u8, rows: u8) -> Self {
        Self::Basic {
            base,
            vector_elements: rows,
            matrix_columns: columns,
        }
    }

    pub fn array_of(element: GlslType, length: u32) -> Self {
        Self::Array {
            element: Box::new(element),
            length: Some(length),
        }
    }

    pub const fn base_type(&self) -> Option<BaseType> {
        match self {
            &Self::Basic { base, .. } => Some(base),
            _ => None,
        }
    }

    pub const fn vector_elements(&self) -> u8 {
        match self {
            &Self::Basic {
                vector_elements, ..
            } => vector_elements,
            _ => 0,
        }
    }

    pub const fn matrix_columns(&self) -> u8 {
        match self {
            &Self::Basic { matrix_columns, .. } => matrix_columns,
            _ => 0,
        }
    }

    /// Scalar component count of a basic type, 0 for anything else.
    pub const fn components(&self) -> u32 {
        self.vector_elements() as u32 * self.matrix_columns() as u32
    }

    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Basic {
                vector_elements: 1,
                matrix_columns: 1,
                ..
            }
        )
    }

    pub const fn is_vector(&self) -> bool {
        matches!(self, &Self::Basic { vector_elements, matrix_columns: 1, .. } if vector_elements > 1)
    }

    pub const fn is_matrix(&self) -> bool {
        matches!(self, &Self::Basic { matrix_columns, .. } if matrix_columns > 1)
    }

    /// Scalar or vector.
    pub const fn is_basic_vector(&self) -> bool {
        matches!(self, Self::Basic { matrix_columns: 1, .. })
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(
            self,
            Self::Basic {
                base: BaseType::Bool,
                ..
            }
        )
    }

    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            Self::Basic {
                base: BaseType::Float,
                ..
            }
        )
    }

    pub const fn is_double(&self) -> bool {
        matches!(
            self,
            Self::Basic {
                base: BaseType::Double,
                ..
            }
        )
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Basic {
                base: BaseType::Int | BaseType::Uint,
                ..
            }
        )
    }

    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub const fn is_unsized_array(&self) -> bool {
        matches!(self, Self::Array { length: None, .. })
    }

    pub fn is_array_of_arrays(&self) -> bool {
        matches!(self, Self::Array { element, .. } if element.is_array())
    }

    pub const fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }

    pub const fn is_sampler(&self) -> bool {
        matches!(self, Self::Sampler { .. })
    }

    pub const fn is_subroutine(&self) -> bool {
        matches!(self, Self::Subroutine(_))
    }

    /// Sampler, image or atomic counter: values that only name a binding.
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Sampler { .. } | Self::Image { .. } | Self::AtomicUint)
    }

    pub fn contains_opaque(&self) -> bool {
        match self {
            Self::Array { element, .. } => element.contains_opaque(),
            Self::Struct(s) => s.fields.iter().any(|f| f.ty.contains_opaque()),
            _ => self.is_opaque(),
        }
    }

    pub fn without_array(&self) -> &GlslType {
        match self {
            Self::Array { element, .. } => element.without_array(),
            _ => self,
        }
    }

    /// Vector type of one matrix column.
    pub const fn column_type(&self) -> Option<GlslType> {
        match self {
            &Self::Basic {
                base,
                vector_elements,
                matrix_columns,
            } if matrix_columns > 1 => Some(Self::vector(base, vector_elements)),
            _ => None,
        }
    }

    /// Type produced by indexing: array element, matrix column or vector component.
    pub fn element_type(&self) -> Option<GlslType> {
        match self {
            Self::Array { element, .. } => Some((**element).clone()),
            &Self::Basic {
                base,
                vector_elements,
                matrix_columns,
            } => match (vector_elements, matrix_columns) {
                (_, c) if c > 1 => Some(Self::vector(base, vector_elements)),
                (v, 1) if v > 1 => Some(Self::vector(base, 1)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Number of elements reachable by a constant index (array length, matrix columns,
    /// vector components).
    pub const fn indexable_length(&self) -> Option<u32> {
        match self {
            &Self::Array { length, .. } => length,
            &Self::Basic {
                vector_elements,
                matrix_columns,
                ..
            } => {
                if matrix_columns > 1 {
                    Some(matrix_columns as u32)
                } else if vector_elements > 1 {
                    Some(vector_elements as u32)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn struct_type(&self) -> Option<&Arc<StructType>> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.struct_type()
            .and_then(|s| s.fields.iter().find(|f| f.name == name))
    }

    /// Same shape with a different scalar base type.
    pub const fn with_base(&self, base: BaseType) -> Option<GlslType> {
        match self {
            &Self::Basic {
                vector_elements,
                matrix_columns,
                ..
            } => Some(Self::Basic {
                base,
                vector_elements,
                matrix_columns,
            }),
            _ => None,
        }
    }

    /// Uniform storage slots needed to hold a value of this type.
    pub fn component_slots(&self) -> u32 {
        match self {
            &Self::Basic { base, .. } => {
                self.components() * if base == BaseType::Double { 2 } else { 1 }
            }
            Self::Array { element, length } => length.unwrap_or(0) * element.component_slots(),
            Self::Struct(s) => s.fields.iter().map(|f| f.ty.component_slots()).sum(),
            Self::Sampler { .. } | Self::Image { .. } | Self::Subroutine(_) => 1,
            Self::AtomicUint | Self::Void => 0,
        }
    }

    /// true if a value of this type mentions the struct named `name` anywhere inside it.
    pub fn references_struct(&self, name: &str) -> bool {
        match self {
            Self::Struct(s) => s.name == name || s.fields.iter().any(|f| f.ty.references_struct(name)),
            Self::Array { element, .. } => element.references_struct(name),
            _ => false,
        }
    }

    /// Builtin type names understood by [`GlslType::from_name`].
    pub fn from_name(name: &str) -> Option<GlslType> {
        let scalar = match name {
            "void" => return Some(Self::Void),
            "bool" => Some(BaseType::Bool),
            "int" => Some(BaseType::Int),
            "uint" => Some(BaseType::Uint),
            "float" => Some(BaseType::Float),
            "double" => Some(BaseType::Double),
            "atomic_uint" => return Some(Self::AtomicUint),
            _ => None,
        };
        if let Some(base) = scalar {
            return Some(Self::vector(base, 1));
        }

        let (base, rest) = match name.as_bytes().first()? {
            b'b' => (BaseType::Bool, &name[1..]),
            b'i' if !name.starts_with("image") && !name.starts_with("isampler") && !name.starts_with("iimage") => {
                (BaseType::Int, &name[1..])
            }
            b'u' if !name.starts_with("usampler") && !name.starts_with("uimage") => {
                (BaseType::Uint, &name[1..])
            }
            b'd' => (BaseType::Double, &name[1..]),
            _ => (BaseType::Float, name),
        };
        if let Some(n) = rest.strip_prefix("vec") {
            return match n {
                "2" | "3" | "4" => Some(Self::vector(base, n.as_bytes()[0] - b'0')),
                _ => None,
            };
        }
        if let Some(n) = rest.strip_prefix("mat") {
            if !matches!(base, BaseType::Float | BaseType::Double) {
                return None;
            }
            let dim = |c: u8| matches!(c, b'2'..=b'4').then(|| c - b'0');
            return match n.as_bytes() {
                &[c] => dim(c).map(|c| Self::matrix(base, c, c)),
                &[c, b'x', r] => Some(Self::matrix(base, dim(c)?, dim(r)?)),
                _ => None,
            };
        }

        Self::opaque_from_name(name)
    }

    fn opaque_from_name(name: &str) -> Option<GlslType> {
        let (base, rest) = match name.as_bytes().first()? {
            b'i' if name.starts_with("isampler") || name.starts_with("iimage") => {
                (BaseType::Int, &name[1..])
            }
            b'u' => (BaseType::Uint, &name[1..]),
            _ => (BaseType::Float, name),
        };
        let (is_image, rest) = if let Some(r) = rest.strip_prefix("sampler") {
            (false, r)
        } else if let Some(r) = rest.strip_prefix("image") {
            (true, r)
        } else {
            return None;
        };
        let (rest, shadow) = match rest.strip_suffix("Shadow") {
            Some(r) => (r, true),
            None => (rest, false),
        };
        let (rest, array) = match rest.strip_suffix("Array") {
            Some(r) => (r, true),
            None => (rest, false),
        };
        let dim = [
            SamplerDim::Dim1D,
            SamplerDim::Dim2D,
            SamplerDim::Dim3D,
            SamplerDim::Cube,
            SamplerDim::Rect,
            SamplerDim::Buffer,
        ]
        .into_iter()
        .find(|d| d.suffix() == rest)?;

        if is_image {
            (!shadow && !array).then_some(Self::Image { dim, base })
        } else {
            Some(Self::Sampler {
                dim,
                shadow,
                array,
                base,
            })
        }
    }
}
impl std::fmt::Display for GlslType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            &Self::Basic {
                base,
                vector_elements,
                matrix_columns,
            } => match (vector_elements, matrix_columns) {
                (1, 1) => f.write_str(base.scalar_name()),
                (v, 1) => write!(f, "{}vec{v}", base.prefix()),
                (r, c) if r == c => write!(f, "{}mat{c}", base.prefix()),
                (r, c) => write!(f, "{}mat{c}x{r}", base.prefix()),
            },
            Self::Array { element, length } => match length {
                Some(n) => write!(f, "(array {element} {n})"),
                None => write!(f, "(array {element})"),
            },
            Self::Struct(s) => f.write_str(&s.name),
            &Self::Sampler {
                dim,
                shadow,
                array,
                base,
            } => write!(
                f,
                "{}sampler{}{}{}",
                match base {
                    BaseType::Int => "i",
                    BaseType::Uint => "u",
                    _ => "",
                },
                dim.suffix(),
                if array { "Array" } else { "" },
                if shadow { "Shadow" } else { "" }
            ),
            &Self::Image { dim, base } => write!(
                f,
                "{}image{}",
                match base {
                    BaseType::Int => "i",
                    BaseType::Uint => "u",
                    _ => "",
                },
                dim.suffix()
            ),
            Self::AtomicUint => f.write_str("atomic_uint"),
            Self::Subroutine(name) => write!(f, "(subroutine {name})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in [
            "float", "vec3", "ivec2", "uvec4", "bvec2", "dvec3", "mat3", "mat3x4", "dmat2",
            "sampler2D", "isampler3D", "sampler2DArrayShadow", "uimageBuffer",
        ] {
            let ty = GlslType::from_name(name).unwrap_or_else(|| panic!("{name}"));
            assert_eq!(ty.to_string(), name);
        }
        assert_eq!(GlslType::from_name("vec5"), None);
        assert_eq!(GlslType::from_name("imat2"), None);
    }

    #[test]
    fn matrix_shape_is_column_major() {
        let m = GlslType::from_name("mat3x4").unwrap();
        assert_eq!(m.matrix_columns(), 3);
        assert_eq!(m.vector_elements(), 4);
        assert_eq!(m.column_type(), Some(GlslType::vector(BaseType::Float, 4)));
        assert_eq!(m.indexable_length(), Some(3));
        assert_eq!(m.component_slots(), 12);
    }

    #[test]
    fn arrays_of_arrays_are_detected() {
        let inner = GlslType::array_of(GlslType::FLOAT, 2);
        assert!(!inner.is_array_of_arrays());
        assert!(GlslType::array_of(inner, 3).is_array_of_arrays());
    }

    #[test]
    fn opaque_members_are_found_through_aggregates() {
        let s = GlslType::Struct(Arc::new(StructType {
            name: "Material".into(),
            fields: vec![
                StructField {
                    name: "tint".into(),
                    ty: GlslType::vector(BaseType::Float, 4),
                },
                StructField {
                    name: "albedo".into(),
                    ty: GlslType::from_name("sampler2D").unwrap(),
                },
            ],
        }));
        assert!(s.contains_opaque());
        assert!(GlslType::array_of(s.clone(), 2).contains_opaque());
        assert!(s.references_struct("Material"));
    }
}
