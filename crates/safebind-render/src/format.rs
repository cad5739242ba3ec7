//! Shared formatting helpers: type, path and expression text.

use safebind_core::decl::{Expr, Visibility};
use safebind_core::mapping::{MarshalSpec, ParameterModifier, TypeExpr};
use safebind_meta::model::{CallingConvention, ConstantValue};
use safebind_meta::{PrimitiveCode, QualifiedName};

/// Module holding the declarations of one namespace.
///
/// `Windows.Win32.Foundation` becomes `windows_win32_foundation`.
pub fn module_name(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Path to a generated declaration.
pub fn path(name: &QualifiedName, qualified: bool) -> String {
    if qualified {
        format!("crate::{}::{}", module_name(&name.namespace), name.name)
    } else {
        name.name.clone()
    }
}

/// Path to the raw extern of a function.
pub fn raw_path(function: &QualifiedName) -> String {
    format!("crate::{}::raw::{}", module_name(&function.namespace), function.name)
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// A native name as a Rust identifier.
pub fn ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" | "_" => format!("{name}_"),
        _ if KEYWORDS.contains(&name) => format!("r#{name}"),
        _ => name.to_string(),
    }
}

pub fn visibility(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "pub ",
        Visibility::Internal => "pub(crate) ",
        Visibility::Private => "",
    }
}

pub fn abi(convention: CallingConvention) -> &'static str {
    match convention {
        CallingConvention::Winapi => "system",
        CallingConvention::Cdecl => "C",
        CallingConvention::Stdcall => "stdcall",
        CallingConvention::Fastcall => "fastcall",
        CallingConvention::Thiscall => "thiscall",
        CallingConvention::Vectorcall => "vectorcall",
    }
}

pub fn primitive(code: PrimitiveCode) -> &'static str {
    match code {
        PrimitiveCode::Void => "()",
        PrimitiveCode::Bool => "bool",
        PrimitiveCode::Char => "u16",
        PrimitiveCode::I8 => "i8",
        PrimitiveCode::U8 => "u8",
        PrimitiveCode::I16 => "i16",
        PrimitiveCode::U16 => "u16",
        PrimitiveCode::I32 => "i32",
        PrimitiveCode::U32 => "u32",
        PrimitiveCode::I64 => "i64",
        PrimitiveCode::U64 => "u64",
        PrimitiveCode::F32 => "f32",
        PrimitiveCode::F64 => "f64",
        PrimitiveCode::IntPtr => "isize",
        PrimitiveCode::UIntPtr => "usize",
    }
}

/// Rust text for a type expression.
pub fn type_text(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Primitive(code) => primitive(*code).to_string(),
        TypeExpr::NativeInt { signed: true } => "isize".to_string(),
        TypeExpr::NativeInt { signed: false } => "usize".to_string(),
        TypeExpr::Pointer { pointee, is_const } => pointer_text(pointee, *is_const),
        TypeExpr::Array(element) => format!("*mut {}", pointee_text(element)),
        TypeExpr::FixedArray { element, length } => {
            format!("[{}; {length}]", type_text(element))
        }
        TypeExpr::Named { name, qualified } => path(name, *qualified),
        TypeExpr::FunctionPointer { params, ret } => {
            let params: Vec<String> = params.iter().map(type_text).collect();
            format!(
                "Option<unsafe extern \"system\" fn({}){}>",
                params.join(", "),
                return_suffix(ret)
            )
        }
        TypeExpr::Interface(name) => format!("Option<{}>", path(name, true)),
        TypeExpr::String => "&str".to_string(),
        TypeExpr::Slice { element, mutable } => {
            let element = type_text(element);
            if *mutable {
                format!("&mut [{element}]")
            } else {
                format!("&[{element}]")
            }
        }
        TypeExpr::Nullable(inner) => format!("Option<{}>", type_text(inner)),
        TypeExpr::SafeHandle(name) => path(name, true),
        TypeExpr::AnySafeHandle => "&dyn SafeHandle".to_string(),
    }
}

fn pointee_text(pointee: &TypeExpr) -> String {
    if pointee.is_void() {
        "::core::ffi::c_void".to_string()
    } else {
        type_text(pointee)
    }
}

fn pointer_text(pointee: &TypeExpr, is_const: bool) -> String {
    let qualifier = if is_const { "const" } else { "mut" };
    format!("*{qualifier} {}", pointee_text(pointee))
}

/// `-> T`, or nothing for void.
pub fn return_suffix(ret: &TypeExpr) -> String {
    if ret.is_void() {
        String::new()
    } else {
        format!(" -> {}", type_text(ret))
    }
}

/// Type of a parameter in a safe signature.
pub fn param_text(ty: &TypeExpr, modifier: Option<ParameterModifier>) -> String {
    match modifier {
        None => type_text(ty),
        Some(ParameterModifier::In) => format!("&{}", type_text(ty)),
        Some(ParameterModifier::Out | ParameterModifier::Ref) => format!("&mut {}", type_text(ty)),
    }
}

/// Type of a value as it crosses the native boundary.
pub fn abi_type(
    ty: &TypeExpr,
    modifier: Option<ParameterModifier>,
    marshal: Option<MarshalSpec>,
) -> String {
    let base = match (marshal, ty) {
        (Some(MarshalSpec::WideString), _) => "*const u16".to_string(),
        (Some(MarshalSpec::NarrowString), _) => "*const u8".to_string(),
        (Some(MarshalSpec::Interface), _) => "*mut ::core::ffi::c_void".to_string(),
        (Some(MarshalSpec::ByValArray { length }), TypeExpr::Array(element)) => {
            format!("[{}; {length}]", type_text(element))
        }
        _ => type_text(ty),
    };
    match modifier {
        None => base,
        Some(ParameterModifier::In) => format!("*const {base}"),
        Some(ParameterModifier::Out | ParameterModifier::Ref) => format!("*mut {base}"),
    }
}

/// Short description of a boundary conversion, for comments.
pub fn marshal_note(marshal: MarshalSpec) -> String {
    match marshal {
        MarshalSpec::WideString => "UTF-16 string".to_string(),
        MarshalSpec::NarrowString => "narrow string".to_string(),
        MarshalSpec::Interface => "interface pointer".to_string(),
        MarshalSpec::Array {
            size_param: Some(index),
            ..
        } => format!("array sized by parameter {index}"),
        MarshalSpec::Array {
            size_const: Some(count),
            ..
        } => format!("array of {count}"),
        MarshalSpec::Array { .. } => "array".to_string(),
        MarshalSpec::ByValArray { length } => format!("inline array of {length}"),
        MarshalSpec::FunctionPointer => "function pointer".to_string(),
    }
}

/// Integer literal of the given type.
pub fn integer_literal(value: i64, ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Primitive(code) if fits(*code, value) => value.to_string(),
        TypeExpr::Primitive(_) | TypeExpr::NativeInt { .. } if value >= 0 => value.to_string(),
        TypeExpr::Primitive(_) | TypeExpr::NativeInt { .. } => {
            format!("{value}i64 as {}", type_text(ty))
        }
        TypeExpr::Named { .. } => format!("{}({})", type_text(ty), cast_literal(value)),
        TypeExpr::Pointer { .. } => format!("{value}isize as {}", type_text(ty)),
        _ => value.to_string(),
    }
}

fn cast_literal(value: i64) -> String {
    if value < 0 {
        format!("{value}i64 as _")
    } else {
        value.to_string()
    }
}

fn fits(code: PrimitiveCode, value: i64) -> bool {
    let (min, max): (i64, i64) = match code {
        PrimitiveCode::I8 => (i8::MIN.into(), i8::MAX.into()),
        PrimitiveCode::U8 => (0, u8::MAX.into()),
        PrimitiveCode::I16 => (i16::MIN.into(), i16::MAX.into()),
        PrimitiveCode::U16 | PrimitiveCode::Char => (0, u16::MAX.into()),
        PrimitiveCode::I32 => (i32::MIN.into(), i32::MAX.into()),
        PrimitiveCode::U32 => (0, u32::MAX.into()),
        PrimitiveCode::I64 | PrimitiveCode::IntPtr => (i64::MIN, i64::MAX),
        PrimitiveCode::U64 | PrimitiveCode::UIntPtr => (0, i64::MAX),
        _ => return false,
    };
    (min..=max).contains(&value)
}

pub fn constant_text(value: &ConstantValue, ty: &TypeExpr) -> String {
    match value {
        ConstantValue::Integer(n) => integer_literal(*n, ty),
        ConstantValue::Float(f) => format!("{f:?}"),
        ConstantValue::String(s) => format!("{s:?}"),
    }
}

/// Convert an `i64` expression into a value of `ty`.
pub fn from_i64(value: &str, ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named { .. } => format!("{}({value} as _)", type_text(ty)),
        TypeExpr::Pointer { .. } => format!("{value} as isize as {}", type_text(ty)),
        _ => format!("{value} as {}", type_text(ty)),
    }
}

/// Read a value of `ty` as an `i64` expression.
pub fn to_i64(value: &str, ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named { .. } => format!("{value}.0 as i64"),
        TypeExpr::Pointer { .. } => format!("{value} as isize as i64"),
        _ => format!("{value} as i64"),
    }
}

/// Rust text for an argument or return expression.
pub fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Param(name) | Expr::Local(name) => ident(name),
        Expr::Default => "Default::default()".to_string(),
        Expr::AddressOf(name) => format!("&mut {}", ident(name)),
        Expr::Length { of, ty } => {
            let of = ident(of);
            match ty {
                TypeExpr::Named { .. } => format!("{}({of}.len() as _)", type_text(ty)),
                _ => format!("{of}.len() as {}", type_text(ty)),
            }
        }
        Expr::Wrap { ty, value } => format!("{}({})", type_text(ty), expr_text(value)),
        Expr::NewHandleWrapper { wrapper, raw } => {
            format!("{}::from_raw({}, true)", path(wrapper, true), expr_text(raw))
        }
        Expr::OptionalRef { param, local, ty } => format!(
            "if {}.is_some() {{ &mut {} as *mut {} }} else {{ ::core::ptr::null_mut() }}",
            ident(param),
            ident(local),
            type_text(ty)
        ),
        Expr::ValueOrDefault(name) => format!("{}.unwrap_or_default()", ident(name)),
        Expr::Integer(value) => value.to_string(),
    }
}
