use std::fmt;

/// Size in bytes of every scalar slot, both in memory and on the stack.
pub const SLOT_SIZE: u32 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Integer,
    Real,
    String,
    Boolean,
    Void,
    /// Result of an erroneous expression. Suppresses further diagnostics.
    Unknown,
}

impl ScalarType {
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::Real => "real",
            ScalarType::String => "string",
            ScalarType::Boolean => "boolean",
            ScalarType::Void => "void",
            ScalarType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar type plus the sizes of each array dimension, outermost first.
/// Scalars have no dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    scalar: ScalarType,
    dims: Vec<u32>,
}

impl Type {
    pub const UNKNOWN: Type = Type::scalar_of(ScalarType::Unknown);
    pub const VOID: Type = Type::scalar_of(ScalarType::Void);
    pub const INTEGER: Type = Type::scalar_of(ScalarType::Integer);
    pub const REAL: Type = Type::scalar_of(ScalarType::Real);
    pub const STRING: Type = Type::scalar_of(ScalarType::String);
    pub const BOOLEAN: Type = Type::scalar_of(ScalarType::Boolean);

    pub const fn scalar_of(scalar: ScalarType) -> Type {
        Type {
            scalar,
            dims: Vec::new(),
        }
    }

    pub fn array(scalar: ScalarType, dims: impl Into<Vec<u32>>) -> Type {
        Type {
            scalar,
            dims: dims.into(),
        }
    }

    pub fn scalar(&self) -> ScalarType {
        self.scalar
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    pub fn is_unknown(&self) -> bool {
        self.scalar == ScalarType::Unknown
    }

    /// Whether this is exactly the provided scalar type (not an array of it).
    pub fn is(&self, scalar: ScalarType) -> bool {
        self.scalar == scalar && self.dims.is_empty()
    }

    /// Whether a value of type `value` may be stored where `self` is expected.
    ///
    /// Types must match exactly, except that an integer scalar is implicitly
    /// converted into a real scalar.
    pub fn accepts(&self, value: &Type) -> bool {
        self == value || (self.is(ScalarType::Real) && value.is(ScalarType::Integer))
    }

    /// Type resulting from applying `n` subscripts.
    ///
    /// Panics if `n` exceeds the number of dimensions.
    #[must_use]
    pub fn strip_dims(&self, n: usize) -> Type {
        Type {
            scalar: self.scalar,
            dims: self.dims[n..].to_vec(),
        }
    }

    /// Number of bytes needed to hold a value of this type, or `None` if it
    /// does not fit in 32 bits.
    pub fn byte_size(&self) -> Option<u32> {
        slots_size(&self.dims)
    }

    /// Distance in bytes between consecutive elements along dimension `k`.
    ///
    /// Panics if the size overflows, which analysis rules out for every
    /// declared type.
    pub fn stride(&self, k: usize) -> u32 {
        slots_size(&self.dims[k + 1..]).expect("array size checked during analysis")
    }
}

fn slots_size(dims: &[u32]) -> Option<u32> {
    dims.iter().try_fold(SLOT_SIZE, |size, &dim| size.checked_mul(dim))
}

impl From<ScalarType> for Type {
    fn from(scalar: ScalarType) -> Self {
        Type::scalar_of(scalar)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scalar)?;
        if self.is_array() {
            f.write_str(" ")?;
            for dim in &self.dims {
                write!(f, "[{dim}]")?;
            }
        }
        Ok(())
    }
}
