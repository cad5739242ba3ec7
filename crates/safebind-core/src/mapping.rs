//! Type mapping: metadata descriptors to target type expressions.
//!
//! [`map_type`] is a pure function of the descriptor, the per-call-site
//! [`MappingSettings`] and the parameter attributes. It only reads metadata;
//! the managed-struct cache it consults is memoized analysis of that same
//! read-only metadata.

use safebind_meta::descriptor::Flagged;
use safebind_meta::{
    ArrayLength, CharWidth, Direction, MetadataQuery, PrimitiveCode, QualifiedName,
    ResolvedType, TypeDescriptor, TypeEntity, TypeRef,
};
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};
use crate::managed::ManagedAnalysis;
use crate::options::GeneratorOptions;

/// A target-language type, independent of any concrete syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    Primitive(PrimitiveCode),
    /// Native-width integer (`isize`/`usize`-like).
    NativeInt { signed: bool },
    Pointer { pointee: Box<TypeExpr>, is_const: bool },
    /// Managed array marshaled to a native pointer.
    Array(Box<TypeExpr>),
    /// Inline fixed-length array (struct fields and raw signatures).
    FixedArray { element: Box<TypeExpr>, length: u32 },
    /// A generated declaration.
    Named { name: QualifiedName, qualified: bool },
    FunctionPointer { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    /// Marshaled reference to a COM-style interface object.
    Interface(QualifiedName),
    /// Host-language string.
    String,
    /// Contiguous range.
    Slice { element: Box<TypeExpr>, mutable: bool },
    /// Optional value.
    Nullable(Box<TypeExpr>),
    /// A generated owning handle wrapper.
    SafeHandle(QualifiedName),
    /// Any owning handle wrapper.
    AnySafeHandle,
}

impl TypeExpr {
    pub fn void() -> Self {
        Self::Primitive(PrimitiveCode::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveCode::Void))
    }

    pub fn named(name: QualifiedName) -> Self {
        Self::Named {
            name,
            qualified: true,
        }
    }

    pub fn pointer(pointee: TypeExpr, is_const: bool) -> Self {
        Self::Pointer {
            pointee: Box::new(pointee),
            is_const,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }

    pub fn pointee(&self) -> Option<&TypeExpr> {
        match self {
            Self::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    /// Name of the declaration this expression refers to, if any.
    pub fn declaration(&self) -> Option<&QualifiedName> {
        match self {
            Self::Named { name, .. } | Self::Interface(name) | Self::SafeHandle(name) => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Short identifier-safe key, used to name per-shape helper types.
    pub fn key(&self) -> String {
        match self {
            Self::Primitive(code) => primitive_key(*code).to_string(),
            Self::NativeInt { signed: true } => "nint".to_string(),
            Self::NativeInt { signed: false } => "nuint".to_string(),
            Self::Pointer { pointee, .. } => format!("ptr_{}", pointee.key()),
            Self::Array(element) => format!("arr_{}", element.key()),
            Self::FixedArray { element, length } => format!("{}_{length}", element.key()),
            Self::Named { name, .. } | Self::Interface(name) | Self::SafeHandle(name) => {
                name.name.clone()
            }
            Self::FunctionPointer { .. } => "fnptr".to_string(),
            Self::String => "string".to_string(),
            Self::Slice { element, .. } => format!("slice_{}", element.key()),
            Self::Nullable(inner) => format!("opt_{}", inner.key()),
            Self::AnySafeHandle => "handle".to_string(),
        }
    }
}

fn primitive_key(code: PrimitiveCode) -> &'static str {
    match code {
        PrimitiveCode::Void => "void",
        PrimitiveCode::Bool => "bool",
        PrimitiveCode::Char => "char",
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

/// How a parameter is passed when it is not passed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterModifier {
    /// Read-only reference.
    In,
    /// Write-only reference.
    Out,
    /// Read-write reference.
    Ref,
}

impl From<Direction> for ParameterModifier {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::In => Self::In,
            Direction::Out => Self::Out,
            Direction::InOut => Self::Ref,
        }
    }
}

/// Conversion applied at the native call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarshalSpec {
    /// Null-terminated UTF-16 string.
    WideString,
    /// Null-terminated narrow string.
    NarrowString,
    /// Interface object to native interface pointer.
    Interface,
    /// Managed array to native pointer.
    Array {
        size_param: Option<usize>,
        size_const: Option<u32>,
    },
    /// Inline array of marshaled elements.
    ByValArray { length: u32 },
    /// Delegate to native function pointer.
    FunctionPointer,
}

/// Per-call-site mapping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSettings {
    pub allow_marshaling: bool,
    pub prefer_native_int: bool,
    pub prefer_marshaled_types: bool,
    pub qualify_names: bool,
    pub is_field: bool,
    /// Map plain aliases (typedefs without release semantics) to their
    /// underlying type.
    pub avoid_root_alias: bool,
}

impl MappingSettings {
    pub fn field(options: &GeneratorOptions) -> Self {
        Self {
            allow_marshaling: options.allow_marshaling,
            prefer_native_int: options.capabilities.native_int,
            prefer_marshaled_types: false,
            qualify_names: true,
            is_field: true,
            avoid_root_alias: false,
        }
    }

    pub fn parameter(options: &GeneratorOptions) -> Self {
        Self {
            is_field: false,
            ..Self::field(options)
        }
    }

    /// Callbacks cross the boundary as raw function pointers.
    pub fn delegate(options: &GeneratorOptions) -> Self {
        Self {
            allow_marshaling: false,
            ..Self::parameter(options)
        }
    }

    pub fn com_signature(options: &GeneratorOptions) -> Self {
        Self {
            prefer_marshaled_types: options.allow_marshaling,
            ..Self::parameter(options)
        }
    }

    /// Constants and macros: aliases collapse so values stay usable as literals.
    pub fn constant(options: &GeneratorOptions) -> Self {
        Self {
            allow_marshaling: false,
            avoid_root_alias: true,
            ..Self::field(options)
        }
    }

    pub fn without_marshaling(self) -> Self {
        Self {
            allow_marshaling: false,
            prefer_marshaled_types: false,
            ..self
        }
    }
}

/// Parameter facts that influence mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingAttributes<'a> {
    /// Namespace used to resolve unqualified references.
    pub namespace: Option<&'a str>,
    pub direction: Option<Direction>,
    pub is_const: bool,
    pub string: Option<CharWidth>,
    pub array_length: Option<ArrayLength>,
}

/// Result of mapping one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedType {
    pub ty: TypeExpr,
    pub modifier: Option<ParameterModifier>,
    pub marshal: Option<MarshalSpec>,
}

impl MappedType {
    fn plain(ty: TypeExpr) -> Self {
        Self {
            ty,
            modifier: None,
            marshal: None,
        }
    }
}

/// Map a descriptor to a target type under the given settings.
pub fn map_type(
    query: &dyn MetadataQuery,
    managed: &mut ManagedAnalysis,
    descriptor: Flagged<'_>,
    settings: &MappingSettings,
    attrs: &MappingAttributes<'_>,
) -> Result<MappedType> {
    let flags = descriptor.flags;
    match descriptor.descriptor {
        TypeDescriptor::Primitive(code) => Ok(MappedType::plain(map_primitive(*code, settings))),

        TypeDescriptor::Pointer { element, is_const } => {
            let is_const = *is_const || flags.constant_field;
            map_pointer(query, managed, element, is_const, settings, attrs, flags.raw_kind)
        }

        TypeDescriptor::Array { element, length } => {
            let raw = settings.without_marshaling();
            let element_ty = map_inner(query, managed, element, &raw, attrs, flags.raw_kind)?;
            match length {
                None => Ok(MappedType::plain(TypeExpr::pointer(element_ty, false))),
                Some(n) if settings.is_field => {
                    let namespace = attrs.namespace.unwrap_or_default();
                    let marshal = (settings.allow_marshaling
                        && managed.descriptor_is_managed(query, element, namespace))
                    .then_some(MarshalSpec::ByValArray { length: *n });
                    Ok(MappedType {
                        ty: TypeExpr::FixedArray {
                            element: Box::new(element_ty),
                            length: *n,
                        },
                        modifier: None,
                        marshal,
                    })
                }
                Some(n) if settings.allow_marshaling => Ok(MappedType {
                    ty: TypeExpr::Array(Box::new(element_ty)),
                    modifier: None,
                    marshal: Some(MarshalSpec::Array {
                        size_param: None,
                        size_const: Some(*n),
                    }),
                }),
                // Outside a struct an array argument decays to a pointer.
                Some(_) => Ok(MappedType::plain(TypeExpr::pointer(element_ty, false))),
            }
        }

        TypeDescriptor::FunctionPointer { params, ret } => {
            let raw = settings.without_marshaling();
            let inner = MappingAttributes {
                namespace: attrs.namespace,
                ..Default::default()
            };
            let params = params
                .iter()
                .map(|p| map_inner(query, managed, p, &raw, &inner, flags.raw_kind))
                .collect::<Result<Vec<_>>>()?;
            let ret = map_inner(query, managed, ret, &raw, &inner, flags.raw_kind)?;
            Ok(MappedType::plain(TypeExpr::FunctionPointer {
                params,
                ret: Box::new(ret),
            }))
        }

        TypeDescriptor::Handle(reference) => {
            let resolved = resolve(query, reference, attrs.namespace)?;
            let name = resolved.name.clone();
            match resolved.entity {
                TypeEntity::Typedef(typedef) => {
                    let collapse = flags.raw_kind
                        || (settings.avoid_root_alias
                            && typedef.release_with.is_none()
                            && typedef.kind.char_width().is_none());
                    if collapse {
                        let inner = MappingAttributes {
                            namespace: Some(name.namespace.as_str()),
                            ..*attrs
                        };
                        let underlying = typedef.underlying.with_flags(flags);
                        return map_type(query, managed, underlying, settings, &inner);
                    }
                    Ok(MappedType::plain(named(name, settings)))
                }
                TypeEntity::Callback(_) if settings.allow_marshaling => Ok(MappedType {
                    ty: named(name, settings),
                    modifier: None,
                    marshal: Some(MarshalSpec::FunctionPointer),
                }),
                _ => Ok(MappedType::plain(named(name, settings))),
            }
        }
    }
}

fn map_inner(
    query: &dyn MetadataQuery,
    managed: &mut ManagedAnalysis,
    descriptor: &TypeDescriptor,
    settings: &MappingSettings,
    attrs: &MappingAttributes<'_>,
    raw_kind: bool,
) -> Result<TypeExpr> {
    let flagged = if raw_kind {
        descriptor.with_raw_kind()
    } else {
        descriptor.into()
    };
    Ok(map_type(query, managed, flagged, settings, attrs)?.ty)
}

fn map_primitive(code: PrimitiveCode, settings: &MappingSettings) -> TypeExpr {
    match code {
        PrimitiveCode::IntPtr if settings.prefer_native_int => TypeExpr::NativeInt { signed: true },
        PrimitiveCode::UIntPtr if settings.prefer_native_int => {
            TypeExpr::NativeInt { signed: false }
        }
        other => TypeExpr::Primitive(other),
    }
}

fn named(name: QualifiedName, settings: &MappingSettings) -> TypeExpr {
    TypeExpr::Named {
        name,
        qualified: settings.qualify_names,
    }
}

fn resolve<'q>(
    query: &'q dyn MetadataQuery,
    reference: &TypeRef,
    namespace: Option<&str>,
) -> Result<ResolvedType<'q>> {
    query
        .resolve_type(reference, namespace)
        .ok_or_else(|| GenerationError::UnresolvedReference {
            reference: reference.to_string(),
        })
}

fn map_pointer(
    query: &dyn MetadataQuery,
    managed: &mut ManagedAnalysis,
    element: &TypeDescriptor,
    is_const: bool,
    settings: &MappingSettings,
    attrs: &MappingAttributes<'_>,
    raw_kind: bool,
) -> Result<MappedType> {
    if raw_kind || !settings.allow_marshaling {
        return raw_pointer(query, managed, element, is_const, settings, attrs, raw_kind);
    }

    // Null-terminated input strings marshal to host strings.
    if let (Some(width), false) = (attrs.string, settings.is_field) {
        let is_char = matches!(
            element,
            TypeDescriptor::Primitive(PrimitiveCode::Char | PrimitiveCode::I8 | PrimitiveCode::U8)
        );
        let input_only = attrs.direction.map_or(is_const, |d| d == Direction::In);
        if is_char && input_only && (is_const || attrs.is_const) {
            let marshal = match width {
                CharWidth::Wide => MarshalSpec::WideString,
                CharWidth::Narrow => MarshalSpec::NarrowString,
            };
            return Ok(MappedType {
                ty: TypeExpr::String,
                modifier: None,
                marshal: Some(marshal),
            });
        }
    }

    // `IFoo*` is the interface reference itself; `IFoo**` passes one by reference.
    let (target, depth) = match element {
        TypeDescriptor::Pointer { element: inner, .. } => (inner.as_ref(), 2),
        other => (other, 1),
    };
    let Some(reference) = target.type_ref() else {
        return raw_pointer(query, managed, element, is_const, settings, attrs, raw_kind);
    };
    let Some(resolved) = query.resolve_type(reference, attrs.namespace) else {
        return Err(GenerationError::UnresolvedReference {
            reference: reference.to_string(),
        });
    };

    match resolved.entity {
        TypeEntity::Interface(_) if depth == 1 => Ok(MappedType {
            ty: TypeExpr::Interface(resolved.name),
            modifier: None,
            marshal: Some(MarshalSpec::Interface),
        }),
        TypeEntity::Interface(_) if settings.prefer_marshaled_types || !settings.is_field => {
            let modifier = match attrs.direction {
                Some(Direction::Out) => ParameterModifier::Out,
                _ => ParameterModifier::Ref,
            };
            Ok(MappedType {
                ty: TypeExpr::Interface(resolved.name),
                modifier: Some(modifier),
                marshal: Some(MarshalSpec::Interface),
            })
        }
        // Variable-length structs are only ever addressed through raw pointers.
        TypeEntity::Struct(def) if depth == 1 && !def.flexible_array => {
            if !managed.is_managed(query, &resolved.name) {
                return raw_pointer(query, managed, element, is_const, settings, attrs, raw_kind);
            }
            let element_ty = named(resolved.name, settings);
            if settings.is_field {
                return Ok(array_of_one(element_ty));
            }
            match (attrs.array_length, attrs.direction) {
                (Some(length), _) => {
                    let (size_param, size_const) = match length {
                        ArrayLength::CountParam(i) => (Some(i), None),
                        ArrayLength::CountConst(n) => (None, Some(n)),
                    };
                    Ok(MappedType {
                        ty: TypeExpr::Array(Box::new(element_ty)),
                        modifier: None,
                        marshal: Some(MarshalSpec::Array {
                            size_param,
                            size_const,
                        }),
                    })
                }
                (None, Some(direction)) => Ok(MappedType {
                    ty: element_ty,
                    modifier: Some(direction.into()),
                    marshal: None,
                }),
                (None, None) => Ok(array_of_one(element_ty)),
            }
        }
        _ => raw_pointer(query, managed, element, is_const, settings, attrs, raw_kind),
    }
}

fn raw_pointer(
    query: &dyn MetadataQuery,
    managed: &mut ManagedAnalysis,
    element: &TypeDescriptor,
    is_const: bool,
    settings: &MappingSettings,
    attrs: &MappingAttributes<'_>,
    raw_kind: bool,
) -> Result<MappedType> {
    let inner = MappingAttributes {
        namespace: attrs.namespace,
        ..Default::default()
    };
    let pointee = map_inner(
        query,
        managed,
        element,
        &settings.without_marshaling(),
        &inner,
        raw_kind,
    )?;
    Ok(MappedType::plain(TypeExpr::pointer(pointee, is_const)))
}

fn array_of_one(element: TypeExpr) -> MappedType {
    MappedType {
        ty: TypeExpr::Array(Box::new(element)),
        modifier: None,
        marshal: Some(MarshalSpec::Array {
            size_param: None,
            size_const: Some(1),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safebind_meta::typestr::parse_type;
    use safebind_meta::MetadataIndex;

    const TYPES: &str = r#"
[metadata]
scope = "test"

[[namespaces]]
name = "N"

[[namespaces.typedefs]]
name = "BOOL"
underlying = "int32_t"

[[namespaces.typedefs]]
name = "HANDLE"
underlying = "intptr_t"
release-with = "CloseHandle"

[[namespaces.typedefs]]
name = "PCWSTR"
underlying = "const wchar_t*"
kind = "wide-string"

[[namespaces.callbacks]]
name = "CALLBACK"

[[namespaces.interfaces]]
name = "IUnknown"

[[namespaces.structs]]
name = "POINT"

[[namespaces.structs.fields]]
name = "x"
type = "int32_t"

[[namespaces.structs]]
name = "HOOK"

[[namespaces.structs.fields]]
name = "proc"
type = "CALLBACK"

[[namespaces.structs]]
name = "VARIABLE"
flexible-array = true

[[namespaces.structs.fields]]
name = "proc"
type = "CALLBACK"
"#;

    fn qn(name: &str) -> QualifiedName {
        QualifiedName::new("N", name)
    }

    fn map(ty: &str, settings: MappingSettings, attrs: MappingAttributes<'_>) -> Result<MappedType> {
        let index = MetadataIndex::parse(TYPES).unwrap();
        let mut managed = ManagedAnalysis::new(settings.allow_marshaling);
        let descriptor = parse_type(ty).unwrap();
        map_type(&index, &mut managed, (&descriptor).into(), &settings, &attrs)
    }

    fn ns() -> MappingAttributes<'static> {
        MappingAttributes {
            namespace: Some("N"),
            ..Default::default()
        }
    }

    #[test]
    fn native_int_only_when_preferred() {
        let options = GeneratorOptions::default();
        let mut settings = MappingSettings::parameter(&options);
        assert_eq!(
            map("intptr_t", settings, ns()).unwrap().ty,
            TypeExpr::NativeInt { signed: true }
        );
        settings.prefer_native_int = false;
        assert_eq!(
            map("uintptr_t", settings, ns()).unwrap().ty,
            TypeExpr::Primitive(PrimitiveCode::UIntPtr)
        );
    }

    #[test]
    fn managed_struct_pointer_becomes_array_of_one() {
        let options = GeneratorOptions::default();
        let field = map("HOOK*", MappingSettings::field(&options), ns()).unwrap();
        assert_eq!(field.ty, TypeExpr::Array(Box::new(TypeExpr::named(qn("HOOK")))));
        assert_eq!(
            field.marshal,
            Some(MarshalSpec::Array {
                size_param: None,
                size_const: Some(1)
            })
        );

        let out = map(
            "HOOK*",
            MappingSettings::parameter(&options),
            MappingAttributes {
                direction: Some(Direction::Out),
                ..ns()
            },
        )
        .unwrap();
        assert_eq!(out.ty, TypeExpr::named(qn("HOOK")));
        assert_eq!(out.modifier, Some(ParameterModifier::Out));
    }

    #[test]
    fn blittable_and_flexible_structs_stay_raw() {
        let options = GeneratorOptions::default();
        let settings = MappingSettings::parameter(&options);
        assert_eq!(
            map("POINT*", settings, ns()).unwrap().ty,
            TypeExpr::pointer(TypeExpr::named(qn("POINT")), false)
        );
        assert_eq!(
            map("VARIABLE*", settings, ns()).unwrap().ty,
            TypeExpr::pointer(TypeExpr::named(qn("VARIABLE")), false)
        );
    }

    #[test]
    fn marshaling_disabled_keeps_raw_pointers() {
        let options = GeneratorOptions::default();
        let settings = MappingSettings::parameter(&options).without_marshaling();
        let mapped = map("HOOK*", settings, ns()).unwrap();
        assert_eq!(mapped.ty, TypeExpr::pointer(TypeExpr::named(qn("HOOK")), false));
        assert_eq!(mapped.marshal, None);
    }

    #[test]
    fn interface_pointers() {
        let options = GeneratorOptions::default();
        let settings = MappingSettings::com_signature(&options);
        let direct = map("IUnknown*", settings, ns()).unwrap();
        assert_eq!(direct.ty, TypeExpr::Interface(qn("IUnknown")));

        let out = map(
            "IUnknown**",
            settings,
            MappingAttributes {
                direction: Some(Direction::Out),
                ..ns()
            },
        )
        .unwrap();
        assert_eq!(out.ty, TypeExpr::Interface(qn("IUnknown")));
        assert_eq!(out.modifier, Some(ParameterModifier::Out));
    }

    #[test]
    fn const_string_parameter_marshals() {
        let options = GeneratorOptions::default();
        let mapped = map(
            "const wchar_t*",
            MappingSettings::parameter(&options),
            MappingAttributes {
                string: Some(CharWidth::Wide),
                direction: Some(Direction::In),
                ..ns()
            },
        )
        .unwrap();
        assert_eq!(mapped.ty, TypeExpr::String);
        assert_eq!(mapped.marshal, Some(MarshalSpec::WideString));

        // Fields never marshal strings.
        let field = map(
            "const wchar_t*",
            MappingSettings::field(&options),
            MappingAttributes {
                string: Some(CharWidth::Wide),
                ..ns()
            },
        )
        .unwrap();
        assert!(field.ty.is_pointer());
    }

    #[test]
    fn fixed_arrays() {
        let options = GeneratorOptions::default();
        let field = map("wchar_t[260]", MappingSettings::field(&options), ns()).unwrap();
        assert_eq!(
            field.ty,
            TypeExpr::FixedArray {
                element: Box::new(TypeExpr::Primitive(PrimitiveCode::Char)),
                length: 260
            }
        );
        assert_eq!(field.marshal, None);

        let managed = map("HOOK[4]", MappingSettings::field(&options), ns()).unwrap();
        assert_eq!(managed.marshal, Some(MarshalSpec::ByValArray { length: 4 }));

        let param = map("uint8_t[16]", MappingSettings::parameter(&options), ns()).unwrap();
        assert_eq!(param.ty, TypeExpr::Array(Box::new(TypeExpr::Primitive(PrimitiveCode::U8))));

        let raw = GeneratorOptions {
            allow_marshaling: false,
            ..Default::default()
        };
        let param = map("uint8_t[16]", MappingSettings::parameter(&raw), ns()).unwrap();
        assert_eq!(
            param.ty,
            TypeExpr::pointer(TypeExpr::Primitive(PrimitiveCode::U8), false)
        );
        assert_eq!(param.marshal, None);
    }

    #[test]
    fn aliases_collapse_for_constants_and_raw_kind() {
        let options = GeneratorOptions::default();
        let constant = map("BOOL", MappingSettings::constant(&options), ns()).unwrap();
        assert_eq!(constant.ty, TypeExpr::Primitive(PrimitiveCode::I32));

        // Handles keep their name even for constants.
        let handle = map("HANDLE", MappingSettings::constant(&options), ns()).unwrap();
        assert_eq!(handle.ty, TypeExpr::named(qn("HANDLE")));

        let index = MetadataIndex::parse(TYPES).unwrap();
        let mut managed = ManagedAnalysis::new(true);
        let descriptor = parse_type("HANDLE").unwrap();
        let raw = map_type(
            &index,
            &mut managed,
            descriptor.with_raw_kind(),
            &MappingSettings::parameter(&options),
            &ns(),
        )
        .unwrap();
        assert_eq!(raw.ty, TypeExpr::NativeInt { signed: true });
    }

    #[test]
    fn constant_field_makes_pointers_const() {
        let options = GeneratorOptions::default();
        let index = MetadataIndex::parse(TYPES).unwrap();
        let mut managed = ManagedAnalysis::new(true);
        let descriptor = parse_type("uint8_t*").unwrap();
        let mapped = map_type(
            &index,
            &mut managed,
            descriptor.with_constant_field(),
            &MappingSettings::field(&options),
            &ns(),
        )
        .unwrap();
        assert_eq!(
            mapped.ty,
            TypeExpr::pointer(TypeExpr::Primitive(PrimitiveCode::U8), true)
        );
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let options = GeneratorOptions::default();
        let err = map("MISSING", MappingSettings::parameter(&options), ns()).unwrap_err();
        assert!(matches!(err, GenerationError::UnresolvedReference { .. }));
    }
}
