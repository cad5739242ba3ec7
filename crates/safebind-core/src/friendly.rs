//! Friendly overload synthesis.
//!
//! Each parameter of a raw extern signature is matched against
//! [`PARAMETER_RULES`] in order; the first rule that applies rewrites it.
//! The rewrites accumulate into one plan: the public parameter list, one
//! argument per original parameter, pre-call statements, pinned bindings,
//! post-call statements and cleanup. If any parameter changed, or the
//! return value becomes an owning handle wrapper, the plan becomes one
//! public overload.

use std::collections::BTreeMap;

use safebind_meta::model::TypedefDef;
use safebind_meta::{
    ArrayLength, CharWidth, Direction, MetadataQuery, MethodSignature, ParameterDescriptor,
    PrimitiveCode, QualifiedName, TypeDescriptor, TypeEntity,
};
use tracing::debug;

use crate::decl::{
    ArgumentRewrite, Expr, FixedBinding, FixedSource, FriendlyOverload, OverloadParam, ParamDecl,
    Statement, RESULT_LOCAL,
};
use crate::error::{GenerationError, Result};
use crate::mapping::{ParameterModifier, TypeExpr};
use crate::options::GeneratorOptions;
use crate::raii;

/// Supplies owning wrapper types, generating each on first use.
pub trait WrapperSource {
    /// The wrapper for handles released by `release`, or `None` if that
    /// function cannot back a wrapper.
    fn handle_wrapper(&mut self, release: &QualifiedName) -> Result<Option<QualifiedName>>;
}

/// Everything the synthesizer reads about one raw function.
pub struct FriendlyInput<'a> {
    pub query: &'a dyn MetadataQuery,
    pub options: &'a GeneratorOptions,
    pub method: &'a QualifiedName,
    pub signature: &'a MethodSignature,
    /// Extern parameters, in the same order as `signature.params`.
    pub params: &'a [ParamDecl],
    pub ret: &'a TypeExpr,
}

impl<'a> FriendlyInput<'a> {
    fn typedef(&self, descriptor: &TypeDescriptor) -> Option<(QualifiedName, &'a TypedefDef)> {
        let resolved = self
            .query
            .resolve_type(descriptor.type_ref()?, Some(&self.method.namespace))?;
        match resolved.entity {
            TypeEntity::Typedef(t) => Some((resolved.name, t)),
            _ => None,
        }
    }

    /// Release function of a handle typedef, unless it is the method being
    /// wrapped: a release call never receives a wrapper for its own handle.
    fn release_for(&self, descriptor: &TypeDescriptor) -> Option<(QualifiedName, QualifiedName)> {
        let (typedef, _) = self.typedef(descriptor)?;
        let release = self.query.release_method(&typedef)?;
        if &release == self.method || !raii::can_wrap(self.query, &release) {
            return None;
        }
        Some((typedef, release))
    }

    fn is_interface(&self, descriptor: &TypeDescriptor) -> bool {
        descriptor
            .type_ref()
            .and_then(|r| self.query.resolve_type(r, Some(&self.method.namespace)))
            .is_some_and(|resolved| matches!(resolved.entity, TypeEntity::Interface(_)))
    }
}

/// One parameter under classification.
pub struct ParamView<'a> {
    pub index: usize,
    pub meta: &'a ParameterDescriptor,
    pub raw: &'a ParamDecl,
}

impl ParamView<'_> {
    fn local(&self) -> String {
        format!("{}Local", self.meta.name)
    }

    /// Element of a pointer or fixed-size array parameter.
    fn element(&self) -> Option<&TypeDescriptor> {
        match &self.meta.ty {
            TypeDescriptor::Pointer { element, .. } => Some(element),
            TypeDescriptor::Array {
                element,
                length: Some(_),
            } => Some(element),
            _ => None,
        }
    }

    fn pointer_is_const(&self) -> bool {
        matches!(self.meta.ty, TypeDescriptor::Pointer { is_const: true, .. }) || self.meta.flags.is_const
    }

    /// Element type as the extern declaration exposes it, when the extern
    /// still takes a raw pointer or inline array.
    fn raw_element(&self) -> Option<&TypeExpr> {
        match (&self.raw.ty, &self.meta.ty) {
            (TypeExpr::Pointer { pointee, .. }, _) => Some(pointee),
            (TypeExpr::FixedArray { element, .. }, _) => Some(element),
            // A marshaled `T[N]` argument still crosses as a pointer to `T`.
            (TypeExpr::Array(element), TypeDescriptor::Array { length: Some(_), .. }) => {
                Some(element)
            }
            _ => None,
        }
    }

    /// Type of the raw pointer pinned for this parameter.
    fn pinned_type(&self) -> TypeExpr {
        match &self.raw.ty {
            TypeExpr::Array(element) | TypeExpr::FixedArray { element, .. } => {
                TypeExpr::pointer((**element).clone(), false)
            }
            other => other.clone(),
        }
    }

    fn fixed_count(&self) -> Option<u32> {
        match (self.meta.array_length, &self.meta.ty) {
            (Some(ArrayLength::CountConst(n)), _) => Some(n),
            (None, TypeDescriptor::Array { length: Some(n), .. }) => Some(*n),
            _ => None,
        }
    }
}

/// Rewrites accumulated for one overload.
struct Plan {
    params: Vec<Option<OverloadParam>>,
    arguments: Vec<ArgumentRewrite>,
    pre_call: Vec<Statement>,
    fixed: Vec<FixedBinding>,
    post_call: Vec<Statement>,
    cleanup: Vec<Statement>,
    /// Count parameter index to the first range parameter it measures.
    length_owner: BTreeMap<usize, String>,
    changed: bool,
}

impl Plan {
    fn new(params: &[ParamDecl]) -> Self {
        Self {
            params: params
                .iter()
                .map(|p| {
                    Some(OverloadParam {
                        name: p.name.clone(),
                        ty: p.ty.clone(),
                        modifier: p.modifier,
                    })
                })
                .collect(),
            arguments: params
                .iter()
                .map(|p| ArgumentRewrite {
                    original: p.name.clone(),
                    value: Expr::Param(p.name.clone()),
                })
                .collect(),
            pre_call: Vec::new(),
            fixed: Vec::new(),
            post_call: Vec::new(),
            cleanup: Vec::new(),
            length_owner: BTreeMap::new(),
            changed: false,
        }
    }

    fn replace(&mut self, view: &ParamView<'_>, ty: TypeExpr, modifier: Option<ParameterModifier>) {
        self.params[view.index] = Some(OverloadParam {
            name: view.meta.name.clone(),
            ty,
            modifier,
        });
        self.changed = true;
    }

    fn drop_param(&mut self, index: usize) {
        self.params[index] = None;
        self.changed = true;
    }

    fn argument(&mut self, index: usize, value: Expr) {
        self.arguments[index].value = value;
    }

    fn pin(&mut self, view: &ParamView<'_>, source: FixedSource) -> String {
        let local = view.local();
        self.fixed.push(FixedBinding {
            local: local.clone(),
            ty: view.pinned_type(),
            source,
        });
        local
    }

    /// Drop every count parameter that a range now supplies.
    fn merge_counts(&mut self, params: &[ParamDecl]) {
        let owners: Vec<(usize, String)> = self
            .length_owner
            .iter()
            .map(|(i, owner)| (*i, owner.clone()))
            .collect();
        for (index, owner) in owners {
            self.drop_param(index);
            self.argument(
                index,
                Expr::Length {
                    of: owner,
                    ty: params[index].ty.clone(),
                },
            );
        }
    }
}

type Applies = fn(&FriendlyInput<'_>, &ParamView<'_>) -> bool;
type Rewrite =
    fn(&mut Plan, &FriendlyInput<'_>, &ParamView<'_>, &mut dyn WrapperSource) -> Result<()>;

/// A parameter classification rule.
pub struct ParameterRule {
    pub name: &'static str,
    applies: Applies,
    rewrite: Rewrite,
}

/// Parameter rules in priority order; the first that applies wins.
pub const PARAMETER_RULES: &[ParameterRule] = &[
    ParameterRule {
        name: "reserved",
        applies: reserved_applies,
        rewrite: reserved_rewrite,
    },
    ParameterRule {
        name: "managed-by-reference",
        applies: managed_ref_applies,
        rewrite: managed_ref_rewrite,
    },
    ParameterRule {
        name: "out-handle",
        applies: out_handle_applies,
        rewrite: out_handle_rewrite,
    },
    ParameterRule {
        name: "in-handle",
        applies: in_handle_applies,
        rewrite: in_handle_rewrite,
    },
    ParameterRule {
        name: "range-with-count-param",
        applies: counted_range_applies,
        rewrite: counted_range_rewrite,
    },
    ParameterRule {
        name: "range-with-fixed-count",
        applies: fixed_range_applies,
        rewrite: fixed_range_rewrite,
    },
    ParameterRule {
        name: "string-pointer",
        applies: string_pointer_applies,
        rewrite: string_pointer_rewrite,
    },
    ParameterRule {
        name: "pointer-by-direction",
        applies: by_direction_applies,
        rewrite: by_direction_rewrite,
    },
    ParameterRule {
        name: "string-typedef",
        applies: string_typedef_applies,
        rewrite: string_typedef_rewrite,
    },
    ParameterRule {
        name: "string-buffer",
        applies: string_buffer_applies,
        rewrite: string_buffer_rewrite,
    },
    ParameterRule {
        name: "optional-value",
        applies: optional_value_applies,
        rewrite: optional_value_rewrite,
    },
];

fn reserved_applies(_: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    view.meta.flags.reserved && !view.meta.flags.output
}

fn reserved_rewrite(
    plan: &mut Plan,
    _: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    plan.drop_param(view.index);
    plan.argument(view.index, Expr::Default);
    Ok(())
}

fn managed_ref_applies(_: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    matches!(
        view.raw.modifier,
        Some(ParameterModifier::Out | ParameterModifier::Ref)
    )
}

fn managed_ref_rewrite(
    _: &mut Plan,
    _: &FriendlyInput<'_>,
    _: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    Ok(())
}

fn out_handle_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    let TypeDescriptor::Pointer { element, .. } = &view.meta.ty else {
        return false;
    };
    view.meta.flags.direction() == Direction::Out && input.release_for(element).is_some()
}

fn out_handle_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    wrappers: &mut dyn WrapperSource,
) -> Result<()> {
    let (typedef, release) = view
        .element()
        .and_then(|e| input.release_for(e))
        .ok_or_else(|| GenerationError::failed(input.method, "handle release lookup changed"))?;
    let wrapper = required_wrapper(input, wrappers, &release)?;

    let local = view.local();
    plan.pre_call.push(Statement::DeclareLocal {
        name: local.clone(),
        ty: TypeExpr::named(typedef),
        init: None,
    });
    plan.argument(view.index, Expr::AddressOf(local.clone()));
    plan.post_call.push(Statement::Assign {
        target: view.meta.name.clone(),
        value: Expr::NewHandleWrapper {
            wrapper: wrapper.clone(),
            raw: Box::new(Expr::Local(local)),
        },
    });
    plan.replace(
        view,
        TypeExpr::SafeHandle(wrapper),
        Some(ParameterModifier::Out),
    );
    Ok(())
}

fn in_handle_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    input.options.use_safe_handles
        && view.meta.flags.is_input_only()
        && input.release_for(&view.meta.ty).is_some()
}

fn in_handle_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let (typedef, _) = input
        .release_for(&view.meta.ty)
        .ok_or_else(|| GenerationError::failed(input.method, "handle release lookup changed"))?;
    let name = &view.meta.name;
    let added = format!("{name}AddRef");
    let local = view.local();
    let bits = input.options.architecture.map_or(64, |a| a.word_bits());
    let fallback = raii::preferred_sentinel(&input.query.invalid_sentinels(&typedef), bits)
        .unwrap_or(0);

    plan.pre_call.push(Statement::DeclareLocal {
        name: added.clone(),
        ty: TypeExpr::Primitive(PrimitiveCode::Bool),
        init: Some(Expr::Default),
    });
    plan.pre_call.push(Statement::DeclareLocal {
        name: local.clone(),
        ty: TypeExpr::named(typedef),
        init: None,
    });
    plan.pre_call.push(Statement::BorrowHandle {
        handle: name.clone(),
        added: added.clone(),
        local: local.clone(),
        fallback,
    });
    plan.cleanup.push(Statement::ReleaseHandle {
        handle: name.clone(),
        added,
    });
    plan.argument(view.index, Expr::Local(local));

    let ty = if view.meta.flags.optional {
        TypeExpr::Nullable(Box::new(TypeExpr::AnySafeHandle))
    } else {
        TypeExpr::AnySafeHandle
    };
    plan.replace(view, ty, None);
    Ok(())
}

/// Shared preconditions of the pointer and array rules.
fn pointer_rule_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    match (view.element(), view.raw_element()) {
        (Some(element), Some(_)) => !element.is_void() && !input.is_interface(element),
        _ => false,
    }
}

fn range_type(view: &ParamView<'_>) -> Option<TypeExpr> {
    let element = view.raw_element()?.clone();
    let mutable = view.meta.flags.is_output() && !view.pointer_is_const();
    Some(TypeExpr::Slice {
        element: Box::new(element),
        mutable,
    })
}

fn counted_range_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    let Some(ArrayLength::CountParam(count)) = view.meta.array_length else {
        return false;
    };
    let (Some(count_meta), Some(count_raw)) =
        (input.signature.params.get(count), input.params.get(count))
    else {
        return false;
    };
    let count_is_integer = matches!(
        count_raw.ty,
        TypeExpr::Primitive(code) if code.is_integer()
    ) || matches!(count_raw.ty, TypeExpr::NativeInt { .. });
    input.options.capabilities.slices
        && pointer_rule_applies(input, view)
        && count_is_integer
        && !count_meta.flags.output
}

fn counted_range_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let Some(ArrayLength::CountParam(count)) = view.meta.array_length else {
        return Err(GenerationError::failed(input.method, "count parameter vanished"));
    };
    let ty = range_type(view)
        .ok_or_else(|| GenerationError::failed(input.method, "range element vanished"))?;
    let name = view.meta.name.clone();

    match plan.length_owner.get(&count) {
        Some(owner) => {
            let check = Statement::CheckLengthsEqual {
                first: owner.clone(),
                second: name.clone(),
            };
            plan.pre_call.push(check);
        }
        None => {
            plan.length_owner.insert(count, name.clone());
        }
    }

    let local = plan.pin(view, FixedSource::Slice(name));
    plan.argument(view.index, Expr::Local(local));
    plan.replace(view, ty, None);
    Ok(())
}

fn fixed_range_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    input.options.capabilities.slices
        && view.fixed_count().is_some()
        && pointer_rule_applies(input, view)
}

fn fixed_range_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let min = view
        .fixed_count()
        .ok_or_else(|| GenerationError::failed(input.method, "fixed count vanished"))?;
    let ty = range_type(view)
        .ok_or_else(|| GenerationError::failed(input.method, "range element vanished"))?;
    let name = view.meta.name.clone();

    plan.pre_call.push(Statement::CheckMinLength {
        param: name.clone(),
        min,
    });
    let local = plan.pin(view, FixedSource::Slice(name));
    plan.argument(view.index, Expr::Local(local));
    plan.replace(view, ty, None);
    Ok(())
}

fn string_pointer_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    view.meta.string.is_some()
        && view.pointer_is_const()
        && view.meta.flags.is_input_only()
        && pointer_rule_applies(input, view)
}

fn string_pointer_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let width = view
        .meta
        .string
        .ok_or_else(|| GenerationError::failed(input.method, "string annotation vanished"))?;
    let local = pin_string(plan, view, width);
    plan.argument(view.index, Expr::Local(local));
    plan.replace(view, string_type(view), None);
    Ok(())
}

fn string_type(view: &ParamView<'_>) -> TypeExpr {
    if view.meta.flags.optional {
        TypeExpr::Nullable(Box::new(TypeExpr::String))
    } else {
        TypeExpr::String
    }
}

/// Pin a string argument as native characters; narrow strings are encoded
/// into a transient byte buffer first.
fn pin_string(plan: &mut Plan, view: &ParamView<'_>, width: CharWidth) -> String {
    let name = view.meta.name.clone();
    match width {
        CharWidth::Wide => plan.pin(view, FixedSource::Str(name)),
        CharWidth::Narrow => {
            let bytes = format!("{name}Bytes");
            plan.pre_call.push(Statement::EncodeNarrow {
                param: name,
                local: bytes.clone(),
            });
            plan.pin(view, FixedSource::Local(bytes))
        }
    }
}

fn by_direction_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    !view.meta.flags.optional
        && view.meta.ty.is_pointer()
        && pointer_rule_applies(input, view)
}

fn by_direction_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let element = view
        .raw_element()
        .cloned()
        .ok_or_else(|| GenerationError::failed(input.method, "pointer element vanished"))?;
    let modifier = ParameterModifier::from(view.meta.flags.direction());
    let local = plan.pin(view, FixedSource::Ref(view.meta.name.clone()));
    plan.argument(view.index, Expr::Local(local));
    plan.replace(view, element, Some(modifier));
    Ok(())
}

fn string_typedef_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    view.meta.flags.is_input_only()
        && input
            .typedef(&view.meta.ty)
            .is_some_and(|(_, t)| t.kind.is_const_string())
}

fn string_typedef_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let width = input
        .typedef(&view.meta.ty)
        .and_then(|(_, t)| t.kind.char_width())
        .ok_or_else(|| GenerationError::failed(input.method, "string typedef vanished"))?;
    let local = pin_string_typedef(plan, view, width);
    plan.argument(
        view.index,
        Expr::Wrap {
            ty: view.raw.ty.clone(),
            value: Box::new(Expr::Local(local)),
        },
    );
    plan.replace(view, string_type(view), None);
    Ok(())
}

fn char_type(width: CharWidth) -> TypeExpr {
    match width {
        CharWidth::Wide => TypeExpr::Primitive(PrimitiveCode::Char),
        CharWidth::Narrow => TypeExpr::Primitive(PrimitiveCode::U8),
    }
}

/// Like [`pin_string`], but the pinned local is a raw character pointer
/// rather than the typedef the extern takes.
fn pin_string_typedef(plan: &mut Plan, view: &ParamView<'_>, width: CharWidth) -> String {
    let name = view.meta.name.clone();
    let local = view.local();
    let source = match width {
        CharWidth::Wide => FixedSource::Str(name),
        CharWidth::Narrow => {
            let bytes = format!("{name}Bytes");
            plan.pre_call.push(Statement::EncodeNarrow {
                param: name,
                local: bytes.clone(),
            });
            FixedSource::Local(bytes)
        }
    };
    plan.fixed.push(FixedBinding {
        local: local.clone(),
        ty: TypeExpr::pointer(char_type(width), true),
        source,
    });
    local
}

fn string_buffer_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    input.options.capabilities.slices
        && view.meta.flags.direction() == Direction::InOut
        && input
            .typedef(&view.meta.ty)
            .is_some_and(|(_, t)| t.kind.is_string_buffer())
}

fn string_buffer_rewrite(
    plan: &mut Plan,
    input: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let width = input
        .typedef(&view.meta.ty)
        .and_then(|(_, t)| t.kind.char_width())
        .ok_or_else(|| GenerationError::failed(input.method, "buffer typedef vanished"))?;
    let name = view.meta.name.clone();
    let local = view.local();

    plan.pre_call.push(Statement::CheckTerminated {
        param: name.clone(),
    });
    plan.fixed.push(FixedBinding {
        local: local.clone(),
        ty: TypeExpr::pointer(char_type(width), false),
        source: FixedSource::Slice(name.clone()),
    });
    plan.argument(
        view.index,
        Expr::Wrap {
            ty: view.raw.ty.clone(),
            value: Box::new(Expr::Local(local)),
        },
    );
    plan.post_call.push(Statement::Reslice { param: name, width });
    // By reference so the shortened range reaches the caller.
    plan.replace(
        view,
        TypeExpr::Slice {
            element: Box::new(char_type(width)),
            mutable: true,
        },
        Some(ParameterModifier::Ref),
    );
    Ok(())
}

fn optional_value_applies(input: &FriendlyInput<'_>, view: &ParamView<'_>) -> bool {
    let value_type = view.raw.ty.declaration().is_some_and(|name| {
        matches!(
            input.query.type_by_name(name).map(|r| r.entity),
            Some(TypeEntity::Struct(_) | TypeEntity::Enum(_))
        )
    });
    input.options.capabilities.null_ref
        && view.meta.flags.optional
        && view.meta.flags.is_input_only()
        && view.raw.modifier == Some(ParameterModifier::In)
        && value_type
}

fn optional_value_rewrite(
    plan: &mut Plan,
    _: &FriendlyInput<'_>,
    view: &ParamView<'_>,
    _: &mut dyn WrapperSource,
) -> Result<()> {
    let name = view.meta.name.clone();
    let local = view.local();
    plan.pre_call.push(Statement::DeclareLocal {
        name: local.clone(),
        ty: view.raw.ty.clone(),
        init: Some(Expr::ValueOrDefault(name.clone())),
    });
    plan.argument(
        view.index,
        Expr::OptionalRef {
            param: name,
            local,
            ty: view.raw.ty.clone(),
        },
    );
    plan.replace(view, TypeExpr::Nullable(Box::new(view.raw.ty.clone())), None);
    Ok(())
}

fn required_wrapper(
    input: &FriendlyInput<'_>,
    wrappers: &mut dyn WrapperSource,
    release: &QualifiedName,
) -> Result<QualifiedName> {
    wrappers.handle_wrapper(release)?.ok_or_else(|| {
        GenerationError::failed(
            input.method,
            format!("no handle wrapper could be built around '{release}'"),
        )
    })
}

/// The wrapper a handle return value becomes, if any.
fn return_wrapper(
    input: &FriendlyInput<'_>,
    wrappers: &mut dyn WrapperSource,
) -> Result<Option<QualifiedName>> {
    if !input.options.use_safe_handles {
        return Ok(None);
    }
    let signature = input.signature;
    let release = match &signature.return_attrs.release_with {
        Some(text) => input
            .query
            .resolve_function(text, &input.method.namespace)
            .filter(|r| r != input.method && raii::can_wrap(input.query, r)),
        None => input.release_for(&signature.return_type).map(|(_, r)| r),
    };
    match release {
        Some(release) => required_wrapper(input, wrappers, &release).map(Some),
        None => Ok(None),
    }
}

/// Synthesize the friendly overloads of one raw function.
pub fn synthesize(
    input: &FriendlyInput<'_>,
    wrappers: &mut dyn WrapperSource,
) -> Result<Vec<FriendlyOverload>> {
    if !input.options.friendly_overloads.enabled {
        return Ok(Vec::new());
    }
    if input.signature.params.len() != input.params.len() {
        return Err(GenerationError::failed(
            input.method,
            "extern parameters do not match the signature",
        ));
    }

    let mut plan = Plan::new(input.params);
    for (index, (meta, raw)) in input.signature.params.iter().zip(input.params).enumerate() {
        let view = ParamView { index, meta, raw };
        if let Some(rule) = PARAMETER_RULES.iter().find(|r| (r.applies)(input, &view)) {
            debug!(method = %input.method, param = %meta.name, rule = rule.name, "parameter rule");
            (rule.rewrite)(&mut plan, input, &view, wrappers)?;
        }
    }
    plan.merge_counts(input.params);

    let wrapper = return_wrapper(input, wrappers)?;
    if !plan.changed && wrapper.is_none() {
        return Ok(Vec::new());
    }

    // A return-only change would collide with the raw signature.
    let name = if plan.changed {
        input.method.name.clone()
    } else {
        format!("{}_SafeHandle", input.method.name)
    };
    let result_local = (!input.ret.is_void()).then(|| RESULT_LOCAL.to_string());
    let (ret, returns) = match wrapper {
        Some(wrapper) => (
            TypeExpr::SafeHandle(wrapper.clone()),
            Some(Expr::NewHandleWrapper {
                wrapper,
                raw: Box::new(Expr::Local(RESULT_LOCAL.to_string())),
            }),
        ),
        None => (
            input.ret.clone(),
            result_local.as_ref().map(|l| Expr::Local(l.clone())),
        ),
    };

    Ok(vec![FriendlyOverload {
        name,
        target: input.method.name.clone(),
        params: plan.params.into_iter().flatten().collect(),
        ret,
        arguments: plan.arguments,
        pre_call: plan.pre_call,
        fixed: plan.fixed,
        post_call: plan.post_call,
        cleanup: plan.cleanup,
        result_local,
        returns,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::ManagedAnalysis;
    use crate::mapping::{map_type, MappingAttributes, MappingSettings};
    use safebind_meta::MetadataIndex;

    const API: &str = r#"
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
invalid-values = [-1]

[[namespaces.typedefs]]
name = "PCWSTR"
underlying = "const wchar_t*"
kind = "wide-string"

[[namespaces.typedefs]]
name = "PCSTR"
underlying = "const char*"
kind = "narrow-string"

[[namespaces.typedefs]]
name = "PWSTR"
underlying = "wchar_t*"
kind = "wide-buffer"

[[namespaces.callbacks]]
name = "HOOKPROC"

[[namespaces.structs]]
name = "POINT"

[[namespaces.structs.fields]]
name = "x"
type = "int32_t"

[[namespaces.structs]]
name = "HOOK"

[[namespaces.structs.fields]]
name = "proc"
type = "HOOKPROC"

[[namespaces.functions]]
name = "CloseHandle"
returns = "BOOL"

[[namespaces.functions.params]]
name = "hObject"
type = "HANDLE"
flags = ["in"]

[[namespaces.functions]]
name = "Write"

[[namespaces.functions.params]]
name = "data"
type = "const uint8_t*"
flags = ["in"]
count-param = "count"

[[namespaces.functions.params]]
name = "count"
type = "uint32_t"
flags = ["in"]

[[namespaces.functions]]
name = "Blend"

[[namespaces.functions.params]]
name = "a"
type = "const float*"
flags = ["in"]
count-param = "n"

[[namespaces.functions.params]]
name = "b"
type = "float*"
flags = ["out"]
count-param = "n"

[[namespaces.functions.params]]
name = "n"
type = "int32_t"
flags = ["in"]

[[namespaces.functions]]
name = "Scatter"

[[namespaces.functions.params]]
name = "h"
type = "HANDLE"
flags = ["in"]

[[namespaces.functions.params]]
name = "a"
type = "const float*"
flags = ["in"]
count-param = "n"

[[namespaces.functions.params]]
name = "b"
type = "float*"
flags = ["out"]
count-param = "n"

[[namespaces.functions.params]]
name = "n"
type = "int32_t"
flags = ["in"]

[[namespaces.functions]]
name = "Create"
returns = "BOOL"

[[namespaces.functions.params]]
name = "h"
type = "HANDLE*"
flags = ["out"]

[[namespaces.functions]]
name = "Open"
returns = "HANDLE"

[[namespaces.functions.params]]
name = "flags"
type = "uint32_t"
flags = ["in"]

[[namespaces.functions]]
name = "Use"
returns = "BOOL"

[[namespaces.functions.params]]
name = "h"
type = "HANDLE"
flags = ["in", "optional"]

[[namespaces.functions.params]]
name = "reserved"
type = "void*"
flags = ["in", "reserved"]

[[namespaces.functions]]
name = "Hook"

[[namespaces.functions.params]]
name = "p"
type = "const HOOK*"
flags = ["in", "optional"]

[[namespaces.functions]]
name = "Move"

[[namespaces.functions.params]]
name = "pt"
type = "POINT*"
flags = ["in", "out"]

[[namespaces.functions.params]]
name = "result"
type = "POINT*"
flags = ["out"]

[[namespaces.functions.params]]
name = "origin"
type = "const POINT*"
flags = ["in"]

[[namespaces.functions]]
name = "Digest"

[[namespaces.functions.params]]
name = "hash"
type = "uint8_t*"
flags = ["out"]
count-const = 32

[[namespaces.functions]]
name = "Digest16"

[[namespaces.functions.params]]
name = "hash"
type = "uint8_t[16]"
flags = ["out"]

[[namespaces.functions]]
name = "Print"

[[namespaces.functions.params]]
name = "wide"
type = "PCWSTR"
flags = ["in"]

[[namespaces.functions.params]]
name = "narrow"
type = "PCSTR"
flags = ["in"]

[[namespaces.functions]]
name = "Fill"

[[namespaces.functions.params]]
name = "buffer"
type = "PWSTR"
flags = ["in", "out"]

[[namespaces.functions]]
name = "Plain"
returns = "int32_t"

[[namespaces.functions.params]]
name = "x"
type = "int32_t"
flags = ["in"]
"#;

    struct Wrappers {
        requested: Vec<QualifiedName>,
    }

    impl WrapperSource for Wrappers {
        fn handle_wrapper(&mut self, release: &QualifiedName) -> Result<Option<QualifiedName>> {
            self.requested.push(release.clone());
            Ok(Some(raii::wrapper_name(release)))
        }
    }

    fn qn(name: &str) -> QualifiedName {
        QualifiedName::new("N", name)
    }

    fn synthesize_with(name: &str, options: &GeneratorOptions) -> (Vec<FriendlyOverload>, Vec<QualifiedName>) {
        let index = MetadataIndex::parse(API).unwrap();
        let method = qn(name);
        let function = index.function(&method).unwrap();
        let signature = MethodSignature::decode(function).unwrap();
        let mut managed = ManagedAnalysis::new(options.allow_marshaling);
        let settings = MappingSettings::parameter(options);

        let params: Vec<ParamDecl> = signature
            .params
            .iter()
            .map(|p| {
                let attrs = MappingAttributes {
                    namespace: Some("N"),
                    direction: Some(p.flags.direction()),
                    is_const: p.flags.is_const,
                    string: p.string,
                    array_length: p.array_length,
                };
                let mapped =
                    map_type(&index, &mut managed, (&p.ty).into(), &settings, &attrs).unwrap();
                ParamDecl {
                    name: p.name.clone(),
                    ty: mapped.ty,
                    modifier: mapped.modifier,
                    marshal: mapped.marshal,
                    optional: p.flags.optional,
                }
            })
            .collect();
        let attrs = MappingAttributes {
            namespace: Some("N"),
            ..Default::default()
        };
        let ret = map_type(
            &index,
            &mut managed,
            (&signature.return_type).into(),
            &settings,
            &attrs,
        )
        .unwrap()
        .ty;

        let input = FriendlyInput {
            query: &index,
            options,
            method: &method,
            signature: &signature,
            params: &params,
            ret: &ret,
        };
        let mut wrappers = Wrappers { requested: vec![] };
        let overloads = synthesize(&input, &mut wrappers).unwrap();
        (overloads, wrappers.requested)
    }

    fn synthesize_one(name: &str) -> FriendlyOverload {
        let (mut overloads, _) = synthesize_with(name, &GeneratorOptions::default());
        assert_eq!(overloads.len(), 1, "expected one overload for {name}");
        overloads.remove(0)
    }

    fn u8_ty() -> TypeExpr {
        TypeExpr::Primitive(PrimitiveCode::U8)
    }

    #[test]
    fn count_param_merges_into_range() {
        let overload = synthesize_one("Write");
        assert_eq!(overload.params.len(), 1);
        assert_eq!(overload.params[0].name, "data");
        assert_eq!(
            overload.params[0].ty,
            TypeExpr::Slice {
                element: Box::new(u8_ty()),
                mutable: false
            }
        );
        assert_eq!(overload.arguments.len(), 2);
        assert_eq!(
            overload.arguments[1].value,
            Expr::Length {
                of: "data".into(),
                ty: TypeExpr::Primitive(PrimitiveCode::U32)
            }
        );
        assert_eq!(overload.arguments[0].value, Expr::Local("dataLocal".into()));
    }

    #[test]
    fn shared_count_checks_lengths_before_call() {
        let overload = synthesize_one("Blend");
        assert_eq!(overload.params.len(), 2);
        assert!(matches!(
            &overload.params[1].ty,
            TypeExpr::Slice { mutable: true, .. }
        ));
        assert_eq!(
            overload.pre_call,
            vec![Statement::CheckLengthsEqual {
                first: "a".into(),
                second: "b".into()
            }]
        );
        assert_eq!(
            overload.arguments[2].value,
            Expr::Length {
                of: "a".into(),
                ty: TypeExpr::Primitive(PrimitiveCode::I32)
            }
        );
        // The check runs before anything is pinned or called.
        let body = overload.body();
        assert!(matches!(body[0], Statement::CheckLengthsEqual { .. }));
        assert!(matches!(body[1], Statement::Fixed { .. }));
    }

    #[test]
    fn length_check_precedes_handle_borrow() {
        let overload = synthesize_one("Scatter");
        let body = overload.body();
        assert_eq!(body.len(), 2);
        assert_eq!(
            body[0],
            Statement::CheckLengthsEqual {
                first: "a".into(),
                second: "b".into()
            }
        );
        let Statement::TryFinally { body: guarded, finally } = &body[1] else {
            panic!("expected try/finally after the length check");
        };
        assert!(guarded
            .iter()
            .any(|s| matches!(s, Statement::BorrowHandle { .. })));
        assert!(!guarded.iter().any(Statement::is_argument_check));
        assert_eq!(finally.len(), 1);
    }

    #[test]
    fn out_handle_becomes_wrapper() {
        let (overloads, requested) = synthesize_with("Create", &GeneratorOptions::default());
        assert_eq!(requested, vec![qn("CloseHandle")]);
        let overload = &overloads[0];
        let wrapper = qn("CloseHandleSafeHandle");
        assert_eq!(overload.params[0].ty, TypeExpr::SafeHandle(wrapper.clone()));
        assert_eq!(overload.params[0].modifier, Some(ParameterModifier::Out));
        assert_eq!(overload.arguments[0].value, Expr::AddressOf("hLocal".into()));
        assert_eq!(
            overload.post_call,
            vec![Statement::Assign {
                target: "h".into(),
                value: Expr::NewHandleWrapper {
                    wrapper,
                    raw: Box::new(Expr::Local("hLocal".into()))
                }
            }]
        );
    }

    #[test]
    fn release_function_keeps_raw_handle() {
        let (overloads, requested) = synthesize_with("CloseHandle", &GeneratorOptions::default());
        assert!(overloads.is_empty());
        assert!(requested.is_empty());
    }

    #[test]
    fn handle_return_gets_disambiguated_name() {
        let overload = synthesize_one("Open");
        assert_eq!(overload.name, "Open_SafeHandle");
        assert_eq!(overload.target, "Open");
        assert_eq!(overload.ret, TypeExpr::SafeHandle(qn("CloseHandleSafeHandle")));
        assert_eq!(overload.result_local.as_deref(), Some(RESULT_LOCAL));
        assert!(matches!(overload.returns, Some(Expr::NewHandleWrapper { .. })));
    }

    #[test]
    fn input_handle_borrows_and_releases() {
        let overload = synthesize_one("Use");
        // The reserved parameter is gone and passes its default.
        assert_eq!(overload.params.len(), 1);
        assert_eq!(overload.arguments[1].value, Expr::Default);
        assert_eq!(
            overload.params[0].ty,
            TypeExpr::Nullable(Box::new(TypeExpr::AnySafeHandle))
        );
        assert!(overload.pre_call.contains(&Statement::BorrowHandle {
            handle: "h".into(),
            added: "hAddRef".into(),
            local: "hLocal".into(),
            fallback: -1,
        }));
        let body = overload.body();
        let [Statement::TryFinally { finally, .. }] = body.as_slice() else {
            panic!("expected try/finally body");
        };
        assert_eq!(
            finally,
            &vec![Statement::ReleaseHandle {
                handle: "h".into(),
                added: "hAddRef".into()
            }]
        );
    }

    #[test]
    fn safe_handles_disabled_leaves_inputs_raw() {
        let options = GeneratorOptions {
            use_safe_handles: false,
            ..Default::default()
        };
        let (overloads, _) = synthesize_with("Use", &options);
        // Only the reserved parameter changes.
        assert_eq!(overloads[0].params[0].ty, TypeExpr::named(qn("HANDLE")));
    }

    #[test]
    fn optional_managed_value_becomes_nullable() {
        let overload = synthesize_one("Hook");
        let hook = TypeExpr::named(qn("HOOK"));
        assert_eq!(overload.params[0].ty, TypeExpr::Nullable(Box::new(hook.clone())));
        assert_eq!(
            overload.arguments[0].value,
            Expr::OptionalRef {
                param: "p".into(),
                local: "pLocal".into(),
                ty: hook
            }
        );
    }

    #[test]
    fn optional_value_needs_null_ref_capability() {
        let mut options = GeneratorOptions::default();
        options.capabilities.null_ref = false;
        let (overloads, _) = synthesize_with("Hook", &options);
        assert!(overloads.is_empty());
    }

    #[test]
    fn pointers_pass_by_reference_per_direction() {
        let overload = synthesize_one("Move");
        let modifiers: Vec<_> = overload.params.iter().map(|p| p.modifier).collect();
        assert_eq!(
            modifiers,
            vec![
                Some(ParameterModifier::Ref),
                Some(ParameterModifier::Out),
                Some(ParameterModifier::In)
            ]
        );
        assert_eq!(overload.fixed.len(), 3);
        assert_eq!(overload.params[0].ty, TypeExpr::named(qn("POINT")));
    }

    #[test]
    fn fixed_count_checks_minimum_length() {
        let overload = synthesize_one("Digest");
        assert_eq!(
            overload.pre_call,
            vec![Statement::CheckMinLength {
                param: "hash".into(),
                min: 32
            }]
        );
        assert!(matches!(
            &overload.params[0].ty,
            TypeExpr::Slice { mutable: true, .. }
        ));
    }

    #[test]
    fn fixed_size_array_parameter_becomes_checked_range() {
        for allow_marshaling in [true, false] {
            let options = GeneratorOptions {
                allow_marshaling,
                ..Default::default()
            };
            let (overloads, _) = synthesize_with("Digest16", &options);
            assert_eq!(overloads.len(), 1, "allow_marshaling = {allow_marshaling}");
            let overload = &overloads[0];
            assert_eq!(
                overload.params[0].ty,
                TypeExpr::Slice {
                    element: Box::new(u8_ty()),
                    mutable: true
                }
            );
            assert_eq!(
                overload.pre_call,
                vec![Statement::CheckMinLength {
                    param: "hash".into(),
                    min: 16
                }]
            );
            assert_eq!(overload.fixed[0].ty, TypeExpr::pointer(u8_ty(), false));
            assert_eq!(overload.fixed[0].source, FixedSource::Slice("hash".into()));
            assert_eq!(overload.arguments[0].value, Expr::Local("hashLocal".into()));
        }
    }

    #[test]
    fn string_typedefs_become_strings() {
        let overload = synthesize_one("Print");
        assert_eq!(overload.params[0].ty, TypeExpr::String);
        assert_eq!(overload.params[1].ty, TypeExpr::String);
        assert_eq!(
            overload.pre_call,
            vec![Statement::EncodeNarrow {
                param: "narrow".into(),
                local: "narrowBytes".into()
            }]
        );
        assert_eq!(overload.fixed[0].source, FixedSource::Str("wide".into()));
        assert_eq!(overload.fixed[1].source, FixedSource::Local("narrowBytes".into()));
        assert!(matches!(overload.arguments[0].value, Expr::Wrap { .. }));
    }

    #[test]
    fn string_buffer_becomes_mutable_range() {
        let overload = synthesize_one("Fill");
        assert_eq!(
            overload.params[0].ty,
            TypeExpr::Slice {
                element: Box::new(TypeExpr::Primitive(PrimitiveCode::Char)),
                mutable: true
            }
        );
        assert_eq!(overload.params[0].modifier, Some(ParameterModifier::Ref));
        assert_eq!(
            overload.pre_call,
            vec![Statement::CheckTerminated {
                param: "buffer".into()
            }]
        );
        assert_eq!(
            overload.post_call,
            vec![Statement::Reslice {
                param: "buffer".into(),
                width: CharWidth::Wide
            }]
        );
    }

    #[test]
    fn unchanged_signature_has_no_overload() {
        let (overloads, _) = synthesize_with("Plain", &GeneratorOptions::default());
        assert!(overloads.is_empty());
    }

    #[test]
    fn disabled_overloads_produce_nothing() {
        let mut options = GeneratorOptions::default();
        options.friendly_overloads.enabled = false;
        let (overloads, _) = synthesize_with("Write", &options);
        assert!(overloads.is_empty());
    }

    #[test]
    fn slices_capability_gates_ranges() {
        let mut options = GeneratorOptions::default();
        options.capabilities.slices = false;
        let (overloads, _) = synthesize_with("Write", &options);
        // Falls through to pass-by-reference of the first element.
        assert_eq!(overloads[0].params.len(), 2);
        assert_eq!(overloads[0].params[0].modifier, Some(ParameterModifier::In));
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<_> = PARAMETER_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names[0], "reserved");
        assert_eq!(names[2], "out-handle");
        assert_eq!(names.last(), Some(&"optional-value"));
        assert_eq!(names.len(), 11);
    }
}
