//! Tagged type descriptors.
//!
//! A [`TypeDescriptor`] is the decoded form of a metadata type reference. It is
//! immutable value data: the mapping layer reads it, never rewrites it. Extra
//! per-use facts (a constant field, a raw-kind request) travel beside it in
//! [`DescriptorFlags`] through a borrowed [`Flagged`] view.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MetaError;

/// Primitive element codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveCode {
    Void,
    Bool,
    /// UTF-16 code unit.
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Signed pointer-sized integer.
    IntPtr,
    /// Unsigned pointer-sized integer.
    UIntPtr,
}

impl PrimitiveCode {
    /// Size in bytes, given the target word size in bits. `None` for void.
    pub fn size_bytes(&self, word_bits: u32) -> Option<u32> {
        match self {
            Self::Void => None,
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::Char | Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::IntPtr | Self::UIntPtr => Some(word_bits / 8),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::IntPtr
                | Self::UIntPtr
        )
    }

    pub fn is_pointer_sized(&self) -> bool {
        matches!(self, Self::IntPtr | Self::UIntPtr)
    }

    /// The keyword used for this primitive in type strings.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Char => "wchar_t",
            Self::I8 => "int8_t",
            Self::U8 => "uint8_t",
            Self::I16 => "int16_t",
            Self::U16 => "uint16_t",
            Self::I32 => "int32_t",
            Self::U32 => "uint32_t",
            Self::I64 => "int64_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::IntPtr => "intptr_t",
            Self::UIntPtr => "uintptr_t",
        }
    }
}

/// A reference to a declared entity, possibly in another metadata scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    /// Metadata scope that declares the entity, when not the local one.
    pub scope: Option<String>,
    /// Namespace, when the reference is qualified.
    pub namespace: Option<String>,
    /// Short name of the entity.
    pub name: String,
}

impl TypeRef {
    /// Build an unqualified reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            scope: None,
            namespace: None,
            name: name.into(),
        }
    }

    /// Build a namespace-qualified reference.
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: None,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parse `[scope:]Namespace.Name` or a bare `Name`.
    pub fn parse(text: &str) -> Self {
        let (scope, rest) = match text.split_once(':') {
            Some((scope, rest)) => (Some(scope.to_string()), rest),
            None => (None, text),
        };
        match rest.rsplit_once('.') {
            Some((ns, name)) => Self {
                scope,
                namespace: Some(ns.to_string()),
                name: name.to_string(),
            },
            None => Self {
                scope,
                namespace: None,
                name: rest.to_string(),
            },
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{scope}:")?;
        }
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}.")?;
        }
        write!(f, "{}", self.name)
    }
}

/// A decoded metadata type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    Primitive(PrimitiveCode),
    /// Pointer; `is_const` qualifies the pointee.
    Pointer {
        element: Box<TypeDescriptor>,
        is_const: bool,
    },
    /// Inline array; `length` is absent for open arrays (`T[]`).
    Array {
        element: Box<TypeDescriptor>,
        length: Option<u32>,
    },
    FunctionPointer {
        params: Vec<TypeDescriptor>,
        ret: Box<TypeDescriptor>,
    },
    /// Reference to a declared struct, enum, typedef, interface or callback.
    Handle(TypeRef),
}

impl TypeDescriptor {
    pub fn void() -> Self {
        Self::Primitive(PrimitiveCode::Void)
    }

    pub fn pointer_to(element: TypeDescriptor) -> Self {
        Self::Pointer {
            element: Box::new(element),
            is_const: false,
        }
    }

    pub fn const_pointer_to(element: TypeDescriptor) -> Self {
        Self::Pointer {
            element: Box::new(element),
            is_const: true,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Handle(TypeRef::named(name))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveCode::Void))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }

    /// Element of a pointer or array, if any.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match self {
            Self::Pointer { element, .. } | Self::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// The entity reference, if this descriptor names one.
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Self::Handle(r) => Some(r),
            _ => None,
        }
    }

    /// Count pointer indirections (`T**` is 2).
    pub fn pointer_depth(&self) -> usize {
        match self {
            Self::Pointer { element, .. } => 1 + element.pointer_depth(),
            _ => 0,
        }
    }

    /// Attach flags to a borrowed view of this descriptor.
    pub fn with_flags(&self, flags: DescriptorFlags) -> Flagged<'_> {
        Flagged {
            descriptor: self,
            flags,
        }
    }

    pub fn with_constant_field(&self) -> Flagged<'_> {
        self.with_flags(DescriptorFlags {
            constant_field: true,
            raw_kind: false,
        })
    }

    pub fn with_raw_kind(&self) -> Flagged<'_> {
        self.with_flags(DescriptorFlags {
            constant_field: false,
            raw_kind: true,
        })
    }
}

/// Per-use flags attached to a descriptor without mutating it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorFlags {
    /// The use site is a constant field (its pointer targets are read-only).
    pub constant_field: bool,
    /// Map to the raw native form even when a friendlier form exists.
    pub raw_kind: bool,
}

/// A descriptor together with use-site flags.
#[derive(Debug, Clone, Copy)]
pub struct Flagged<'a> {
    pub descriptor: &'a TypeDescriptor,
    pub flags: DescriptorFlags,
}

impl<'a> From<&'a TypeDescriptor> for Flagged<'a> {
    fn from(descriptor: &'a TypeDescriptor) -> Self {
        descriptor.with_flags(DescriptorFlags::default())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(code) => write!(f, "{}", code.keyword()),
            Self::Pointer { element, is_const } => {
                if *is_const {
                    if element.is_pointer() {
                        write!(f, "{element} const*")
                    } else {
                        write!(f, "const {element}*")
                    }
                } else {
                    write!(f, "{element}*")
                }
            }
            Self::Array { element, length } => match length {
                Some(n) => write!(f, "{element}[{n}]"),
                None => write!(f, "{element}[]"),
            },
            Self::FunctionPointer { params, ret } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Self::Handle(r) => write!(f, "{r}"),
        }
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = MetaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        crate::typestr::parse_type(&value)
    }
}

impl From<TypeDescriptor> for String {
    fn from(value: TypeDescriptor) -> Self {
        value.to_string()
    }
}
