//! Entity definitions as they appear in a metadata document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arch::Architecture;
use crate::descriptor::{PrimitiveCode, TypeDescriptor};
use crate::signature::{CharWidth, ParamFlags, ReturnAttributes};

fn void() -> TypeDescriptor {
    TypeDescriptor::void()
}

fn default_i32() -> TypeDescriptor {
    TypeDescriptor::Primitive(PrimitiveCode::I32)
}

/// A namespace and everything declared in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub constants: Vec<ConstantDef>,
    #[serde(default)]
    pub typedefs: Vec<TypedefDef>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDef>,
    #[serde(default)]
    pub callbacks: Vec<CallbackDef>,
    #[serde(default)]
    pub macros: Vec<MacroDef>,
}

/// Calling convention of a native function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingConvention {
    /// Platform default (stdcall on 32-bit Windows, C elsewhere).
    #[default]
    Winapi,
    Cdecl,
    Stdcall,
    Fastcall,
    Thiscall,
    Vectorcall,
}

/// A native function or interface method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionDef {
    pub name: String,
    /// Module exporting the function (e.g. "KERNEL32").
    #[serde(default)]
    pub library: String,
    #[serde(default = "void")]
    pub returns: TypeDescriptor,
    #[serde(default)]
    pub return_attrs: ReturnAttributes,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub calling_convention: CallingConvention,
    #[serde(default)]
    pub set_last_error: bool,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

impl Default for FunctionDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            library: String::new(),
            returns: void(),
            return_attrs: ReturnAttributes::default(),
            params: Vec::new(),
            calling_convention: CallingConvention::default(),
            set_last_error: false,
            architectures: Vec::new(),
        }
    }
}

/// A function, method or callback parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub flags: ParamFlags,
    /// Name of the parameter holding this array's element count.
    #[serde(default)]
    pub count_param: Option<String>,
    /// Fixed element count of this array.
    #[serde(default)]
    pub count_const: Option<u32>,
    /// This pointer is a null-terminated string of the given width.
    #[serde(default)]
    pub string: Option<CharWidth>,
}

/// Field layout of a struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Sequential,
    /// Fields overlap (unions and explicit-offset structs).
    Explicit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub pack: Option<u16>,
    /// The last field is a variable-length trailing array declared with length 1.
    #[serde(default)]
    pub flexible_array: bool,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default, rename = "const")]
    pub is_const: bool,
    #[serde(default)]
    pub string: Option<CharWidth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnumDef {
    pub name: String,
    #[serde(default = "default_i32")]
    pub underlying: TypeDescriptor,
    /// Members combine as bit flags.
    #[serde(default)]
    pub flags: bool,
    #[serde(default)]
    pub members: Vec<EnumMember>,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// Value of a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConstantDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub value: ConstantValue,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

/// What a native typedef wrapper stands for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypedefKind {
    /// A plain value (handles, BOOL, status codes).
    #[default]
    Plain,
    /// Read-only null-terminated narrow string pointer.
    NarrowString,
    /// Read-only null-terminated UTF-16 string pointer.
    WideString,
    /// Writable null-terminated narrow string buffer.
    NarrowBuffer,
    /// Writable null-terminated UTF-16 string buffer.
    WideBuffer,
}

impl TypedefKind {
    pub fn char_width(&self) -> Option<CharWidth> {
        match self {
            Self::Plain => None,
            Self::NarrowString | Self::NarrowBuffer => Some(CharWidth::Narrow),
            Self::WideString | Self::WideBuffer => Some(CharWidth::Wide),
        }
    }

    pub fn is_const_string(&self) -> bool {
        matches!(self, Self::NarrowString | Self::WideString)
    }

    pub fn is_string_buffer(&self) -> bool {
        matches!(self, Self::NarrowBuffer | Self::WideBuffer)
    }
}

/// A native typedef wrapper: a distinct named type over one underlying value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TypedefDef {
    pub name: String,
    pub underlying: TypeDescriptor,
    #[serde(default)]
    pub kind: TypedefKind,
    /// Function that releases a handle of this type.
    #[serde(default)]
    pub release_with: Option<String>,
    /// Values meaning "no resource".
    #[serde(default)]
    pub invalid_values: Vec<i64>,
    /// Another typedef this one converts to implicitly.
    #[serde(default)]
    pub also_usable_for: Option<String>,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default)]
    pub iid: Option<Uuid>,
    #[serde(default)]
    pub base: Option<TypeDescriptor>,
    #[serde(default)]
    pub methods: Vec<FunctionDef>,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

/// A native callback (function-pointer typedef).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CallbackDef {
    pub name: String,
    #[serde(default = "void")]
    pub returns: TypeDescriptor,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

/// A function-like macro expressed as a typed expression body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MacroDef {
    pub name: String,
    pub returns: TypeDescriptor,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    /// Expression over the parameter names.
    pub body: String,
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}
