//! Owning handle wrappers.
//!
//! A wrapper is built around a release function that takes exactly one
//! handle argument stored in a pointer-sized, 32-bit or 64-bit slot. It
//! starts out invalid, can adopt an existing raw value, reports every
//! registered sentinel as invalid and releases through the function,
//! interpreting its return value by the function's return type.

use safebind_meta::model::FunctionDef;
use safebind_meta::{MetadataQuery, PrimitiveCode, QualifiedName, TypeDescriptor, TypeEntity};

use crate::decl::{HandleWrapperSpec, ReleaseSuccess, WrapperMember};
use crate::error::{GenerationError, Result};
use crate::managed::ManagedAnalysis;
use crate::mapping::{map_type, MappingAttributes, MappingSettings};
use crate::options::GeneratorOptions;

const MAX_ALIAS_DEPTH: usize = 32;

/// Name of the sentinel constant emitted on every wrapper.
pub const SENTINEL_CONSTANT: &str = "INVALID_HANDLE_VALUE";

/// Name of the wrapper type generated for a release function.
pub fn wrapper_name(release: &QualifiedName) -> QualifiedName {
    QualifiedName::new(&release.namespace, format!("{}SafeHandle", release.name))
}

/// Width of a handle's storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    PointerSized,
    Bits32,
    Bits64,
}

/// The release function's single handle parameter, if it has a wrappable one.
fn handle_parameter<'q>(
    query: &'q dyn MetadataQuery,
    release: &QualifiedName,
) -> Option<(&'q FunctionDef, Storage)> {
    let function = query.function(release)?;
    let [param] = function.params.as_slice() else {
        return None;
    };
    let storage = storage_of(query, &param.ty, &release.namespace, 0)?;
    Some((function, storage))
}

fn storage_of(
    query: &dyn MetadataQuery,
    descriptor: &TypeDescriptor,
    namespace: &str,
    depth: usize,
) -> Option<Storage> {
    if depth > MAX_ALIAS_DEPTH {
        return None;
    }
    match descriptor {
        TypeDescriptor::Primitive(code) => match code {
            PrimitiveCode::IntPtr | PrimitiveCode::UIntPtr => Some(Storage::PointerSized),
            PrimitiveCode::I32 | PrimitiveCode::U32 => Some(Storage::Bits32),
            PrimitiveCode::I64 | PrimitiveCode::U64 => Some(Storage::Bits64),
            _ => None,
        },
        TypeDescriptor::Pointer { .. } => Some(Storage::PointerSized),
        TypeDescriptor::Handle(r) => {
            let resolved = query.resolve_type(r, Some(namespace))?;
            match resolved.entity {
                TypeEntity::Typedef(t) => {
                    storage_of(query, &t.underlying, &resolved.name.namespace, depth + 1)
                }
                _ => None,
            }
        }
        TypeDescriptor::Array { .. } | TypeDescriptor::FunctionPointer { .. } => None,
    }
}

/// Whether [`synthesize_wrapper`] would produce a wrapper for `release`.
pub fn can_wrap(query: &dyn MetadataQuery, release: &QualifiedName) -> bool {
    handle_parameter(query, release).is_some()
}

/// Release-success convention for a return type.
pub fn success_convention(
    query: &dyn MetadataQuery,
    descriptor: &TypeDescriptor,
    namespace: &str,
) -> Option<ReleaseSuccess> {
    let mut current = descriptor.clone();
    let mut namespace = namespace.to_string();
    for _ in 0..MAX_ALIAS_DEPTH {
        let (next, next_namespace) = match &current {
            TypeDescriptor::Primitive(code) => {
                return match code {
                    PrimitiveCode::Void => Some(ReleaseSuccess::Always),
                    PrimitiveCode::Bool => Some(ReleaseSuccess::True),
                    PrimitiveCode::I32 | PrimitiveCode::U32 => Some(ReleaseSuccess::Zero),
                    PrimitiveCode::I8 | PrimitiveCode::U8 => Some(ReleaseSuccess::NonZero),
                    _ => None,
                };
            }
            TypeDescriptor::Handle(r) => {
                let resolved = query.resolve_type(r, Some(&namespace))?;
                let TypeEntity::Typedef(t) = resolved.entity else {
                    return None;
                };
                // The Win32 four-byte BOOL is a boolean, not a status code.
                if resolved.name.name == "BOOL" {
                    return Some(ReleaseSuccess::True);
                }
                (t.underlying.clone(), resolved.name.namespace.clone())
            }
            _ => return None,
        };
        current = next;
        namespace = next_namespace;
    }
    None
}

/// Pick the sentinel new wrappers start with: all-bits-set when registered,
/// otherwise the first declared value.
pub fn preferred_sentinel(sentinels: &[i64], storage_bits: u32) -> Option<i64> {
    let all_ones = |v: i64| v == -1 || (storage_bits == 32 && v == i64::from(u32::MAX));
    sentinels
        .iter()
        .copied()
        .find(|v| all_ones(*v))
        .or_else(|| sentinels.first().copied())
}

/// Build the wrapper for `release`, or `None` when its signature cannot be
/// wrapped.
pub fn synthesize_wrapper(
    query: &dyn MetadataQuery,
    managed: &mut ManagedAnalysis,
    options: &GeneratorOptions,
    release: &QualifiedName,
) -> Result<Option<HandleWrapperSpec>> {
    let Some((function, storage)) = handle_parameter(query, release) else {
        return Ok(None);
    };
    let param = &function.params[0];

    let success = success_convention(query, &function.returns, &release.namespace)
        .ok_or_else(|| {
            GenerationError::unsupported(
                release,
                format!("cannot infer release success from return type '{}'", function.returns),
            )
        })?;

    let handle_type = param.ty.type_ref().and_then(|r| {
        query
            .resolve_type(r, Some(&release.namespace))
            .filter(|resolved| matches!(resolved.entity, TypeEntity::Typedef(_)))
            .map(|resolved| resolved.name)
    });
    let sentinels = handle_type
        .as_ref()
        .map(|h| query.invalid_sentinels(h))
        .unwrap_or_default();

    let bits = match storage {
        Storage::Bits32 => 32,
        Storage::Bits64 => 64,
        Storage::PointerSized => options.architecture.map_or(64, |a| a.word_bits()),
    };
    let initial = preferred_sentinel(&sentinels, bits).unwrap_or(0);

    let settings = MappingSettings::parameter(options).without_marshaling();
    let attrs = MappingAttributes {
        namespace: Some(release.namespace.as_str()),
        ..Default::default()
    };
    let raw = map_type(query, managed, (&param.ty).into(), &settings, &attrs)?.ty;

    Ok(Some(HandleWrapperSpec {
        release: release.clone(),
        handle_type,
        raw,
        sentinels: sentinels.clone(),
        members: vec![
            WrapperMember::SentinelConstant {
                name: SENTINEL_CONSTANT.to_string(),
                value: initial,
            },
            WrapperMember::DefaultConstructor { initial },
            WrapperMember::FromRaw { owns_handle: true },
            WrapperMember::IsInvalid { sentinels },
            WrapperMember::ReleaseOverride {
                function: release.clone(),
                success,
            },
        ],
    }))
}
