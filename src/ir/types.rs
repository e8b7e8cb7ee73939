//! IR Types
//!
//! C type representations used by the generated glue.

use std::fmt;

/// Width of a fixed-size integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u8 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    /// Largest unsigned value of this width
    pub fn unsigned_max(self) -> u64 {
        match self {
            IntWidth::W64 => u64::MAX,
            width => (1u64 << width.bits()) - 1,
        }
    }
}

/// C types (only the ones the generators need)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Bool,
    Char,
    Int,
    UnsignedLongLong,
    Size,
    /// `uintN_t`
    Uint(IntWidth),
    /// `intN_t`
    Sint(IntWidth),
    Float,
    Double,
    /// `struct name`
    Struct(String),
    /// `enum name`
    Enum(String),
    /// A typedef name
    Named(String),
    /// `const T`
    Const(Box<CType>),
    /// `T*`
    Ptr(Box<CType>),
}

impl CType {
    pub fn ptr(inner: CType) -> Self {
        CType::Ptr(Box::new(inner))
    }

    pub fn constant(inner: CType) -> Self {
        CType::Const(Box::new(inner))
    }

    pub fn structure(name: impl Into<String>) -> Self {
        CType::Struct(name.into())
    }

    pub fn named(name: impl Into<String>) -> Self {
        CType::Named(name.into())
    }

    /// `void*`
    pub fn void_ptr() -> Self {
        CType::ptr(CType::Void)
    }

    /// `const void*`
    pub fn const_void_ptr() -> Self {
        CType::ptr(CType::constant(CType::Void))
    }

    /// `const char*`
    pub fn const_char_ptr() -> Self {
        CType::ptr(CType::constant(CType::Char))
    }

    /// Is this type a pointer?
    pub fn is_ptr(&self) -> bool {
        matches!(self, CType::Ptr(_))
    }

    /// Is this type an integer?
    pub fn is_int(&self) -> bool {
        match self {
            CType::Bool
            | CType::Char
            | CType::Int
            | CType::UnsignedLongLong
            | CType::Size
            | CType::Uint(_)
            | CType::Sint(_) => true,
            CType::Const(inner) => inner.is_int(),
            _ => false,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Bool => write!(f, "bool"),
            CType::Char => write!(f, "char"),
            CType::Int => write!(f, "int"),
            CType::UnsignedLongLong => write!(f, "unsigned long long"),
            CType::Size => write!(f, "size_t"),
            CType::Uint(width) => write!(f, "uint{}_t", width.bits()),
            CType::Sint(width) => write!(f, "int{}_t", width.bits()),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::Struct(name) => write!(f, "struct {}", name),
            CType::Enum(name) => write!(f, "enum {}", name),
            CType::Named(name) => write!(f, "{}", name),
            CType::Const(inner) => write!(f, "const {}", inner),
            CType::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spellings() {
        assert_eq!(CType::ptr(CType::constant(CType::Float)).to_string(), "const float*");
        assert_eq!(CType::Uint(IntWidth::W64).to_string(), "uint64_t");
        assert_eq!(CType::Sint(IntWidth::W8).to_string(), "int8_t");
        assert_eq!(CType::structure("blis_sgemm_arguments").to_string(), "struct blis_sgemm_arguments");
        assert_eq!(CType::const_void_ptr().to_string(), "const void*");
    }

    #[test]
    fn test_unsigned_max() {
        assert_eq!(IntWidth::W8.unsigned_max(), 255);
        assert_eq!(IntWidth::W32.unsigned_max(), u64::from(u32::MAX));
        assert_eq!(IntWidth::W64.unsigned_max(), u64::MAX);
    }
}
