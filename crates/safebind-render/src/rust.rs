//! Rust source rendering.
//!
//! Declarations are grouped into one module per namespace. Raw externs live
//! in a nested `raw` module so friendly overloads can reuse the native name.
//! Pinned storage becomes nested blocks that bind raw pointers, and cleanup
//! statements run after the call block has produced its value.

use std::collections::{BTreeMap, HashMap, HashSet};

use safebind_core::decl::{
    CallbackDecl, ConstantDecl, Declaration, EnumDecl, FixedBinding, FixedSource,
    FriendlyOverload, FunctionDecl, HandleWrapperSpec, InlineArrayDecl, InterfaceDecl, Item,
    MacroDecl, ParamDecl, ReleaseSuccess, Statement, StructDecl, TypedefDecl, Visibility,
    WrapperMember,
};
use safebind_core::mapping::{ParameterModifier, TypeExpr};
use safebind_core::Bindings;
use safebind_meta::model::{Layout, TypedefKind};

use crate::format::{
    abi, abi_type, constant_text, expr_text, from_i64, ident, integer_literal, marshal_note,
    module_name, param_text, path, raw_path, return_suffix, to_i64, type_text, visibility,
};

const LINT_ALLOWS: &str =
    "#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]";

/// Render every declaration as Rust source.
pub fn render_bindings(bindings: &Bindings) -> String {
    let mut out = Writer::default();
    out.line("// Generated by safebind. Do not edit.");
    out.line(format!("// fingerprint: {}", bindings.fingerprint));
    out.line(LINT_ALLOWS);
    out.blank();
    render_handle_trait(&mut out);

    let mut namespaces: BTreeMap<&str, Vec<&Declaration>> = BTreeMap::new();
    for decl in &bindings.declarations {
        namespaces
            .entry(decl.name.namespace.as_str())
            .or_default()
            .push(decl);
    }
    for (namespace, decls) in namespaces {
        out.blank();
        render_namespace(&mut out, namespace, &decls);
    }
    out.finish()
}

fn render_handle_trait(out: &mut Writer) {
    out.line("/// An owning wrapper over a native handle.");
    out.open("pub trait SafeHandle {");
    out.line("fn raw(&self) -> i64;");
    out.blank();
    out.line("/// Take a reference for the duration of a call; true when one was taken.");
    out.open("fn add_ref(&self) -> bool {");
    out.line("true");
    out.close("}");
    out.blank();
    out.line("fn release_ref(&self) {}");
    out.close("}");
}

fn render_namespace(out: &mut Writer, namespace: &str, decls: &[&Declaration]) {
    out.open(format!("pub mod {} {{", module_name(namespace)));
    out.line("#[allow(unused_imports)]");
    out.line("use crate::SafeHandle;");

    let mut functions = Vec::new();
    for decl in decls {
        match &decl.item {
            Item::Function(function) => functions.push((*decl, function)),
            _ => {
                out.blank();
                render_declaration(out, decl);
            }
        }
    }

    for (decl, function) in &functions {
        for overload in &function.friendly {
            out.blank();
            render_overload(out, decl, overload);
        }
    }

    if !functions.is_empty() {
        out.blank();
        out.open("pub mod raw {");
        out.line("#[allow(unused_imports)]");
        out.line("use super::*;");
        for (decl, function) in &functions {
            out.blank();
            render_extern(out, decl, function);
        }
        out.close("}");
    }
    out.close("}");
}

/// Render a single declaration on its own. Functions show their friendly
/// overloads ahead of the raw extern.
pub fn render_standalone(decl: &Declaration) -> String {
    let mut out = Writer::default();
    match &decl.item {
        Item::Function(function) => {
            for overload in &function.friendly {
                render_overload(&mut out, decl, overload);
                out.blank();
            }
            render_extern(&mut out, decl, function);
        }
        _ => render_declaration(&mut out, decl),
    }
    out.finish()
}

/// Render one declaration in place.
pub fn render_declaration(out: &mut Writer, decl: &Declaration) {
    out.docs(decl.docs.as_deref());
    let vis = visibility(decl.visibility);
    let name = decl.name.name.as_str();
    match &decl.item {
        Item::Struct(s) => render_struct(out, vis, name, s),
        Item::Enum(e) => render_enum(out, vis, name, e),
        Item::Typedef(t) => render_typedef(out, vis, name, t),
        Item::InlineArray(a) => render_inline_array(out, vis, name, a),
        Item::Interface(i) => render_interface(out, vis, name, i),
        Item::Callback(c) => render_callback(out, vis, name, c),
        Item::Constant(c) => render_constant(out, vis, name, c),
        Item::Macro(m) => render_macro(out, vis, name, m),
        Item::HandleWrapper(w) => render_wrapper(out, vis, name, w),
        Item::Function(f) => render_extern(out, decl, f),
    }
}

fn render_struct(out: &mut Writer, vis: &str, name: &str, s: &StructDecl) {
    match s.pack {
        Some(pack) => out.line(format!("#[repr(C, packed({pack}))]")),
        None => out.line("#[repr(C)]"),
    }
    if !s.managed {
        out.line("#[derive(Clone, Copy)]");
    }
    let keyword = match s.layout {
        Layout::Explicit => "union",
        Layout::Sequential => "struct",
    };
    out.open(format!("{vis}{keyword} {name} {{"));
    let last = s.fields.len().saturating_sub(1);
    for (i, field) in s.fields.iter().enumerate() {
        if s.flexible_array && i == last {
            out.line("/// Variable-length; the declared length is a minimum.");
        }
        let note = field
            .marshal
            .map(|m| format!(" // {}", marshal_note(m)))
            .unwrap_or_default();
        out.line(format!(
            "pub {}: {},{note}",
            ident(&field.name),
            type_text(&field.ty)
        ));
    }
    out.close("}");

    if !s.managed {
        out.blank();
        out.open(format!("impl Default for {name} {{"));
        out.open("fn default() -> Self {");
        out.line("unsafe { ::core::mem::zeroed() }");
        out.close("}");
        out.close("}");
    }
}

fn render_enum(out: &mut Writer, vis: &str, name: &str, e: &EnumDecl) {
    out.line("#[repr(transparent)]");
    out.line("#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]");
    out.line(format!("{vis}struct {name}(pub {});", type_text(&e.underlying)));

    if !e.members.is_empty() || e.flags {
        out.blank();
        out.open(format!("impl {name} {{"));
        for member in &e.members {
            out.line(format!(
                "pub const {}: Self = Self({});",
                ident(&member.name),
                integer_literal(member.value, &e.underlying)
            ));
        }
        if e.flags {
            out.blank();
            out.open("pub const fn contains(self, other: Self) -> bool {");
            out.line("self.0 & other.0 == other.0");
            out.close("}");
        }
        out.close("}");
    }

    if e.flags {
        out.blank();
        out.open(format!("impl ::core::ops::BitOr for {name} {{"));
        out.line("type Output = Self;");
        out.blank();
        out.open("fn bitor(self, rhs: Self) -> Self {");
        out.line("Self(self.0 | rhs.0)");
        out.close("}");
        out.close("}");
    }
}

fn typedef_note(kind: TypedefKind) -> Option<&'static str> {
    match kind {
        TypedefKind::Plain => None,
        TypedefKind::NarrowString => Some("/// Read-only null-terminated narrow string."),
        TypedefKind::WideString => Some("/// Read-only null-terminated UTF-16 string."),
        TypedefKind::NarrowBuffer => Some("/// Writable null-terminated narrow string buffer."),
        TypedefKind::WideBuffer => Some("/// Writable null-terminated UTF-16 string buffer."),
    }
}

fn render_typedef(out: &mut Writer, vis: &str, name: &str, t: &TypedefDecl) {
    if let Some(note) = typedef_note(t.kind) {
        out.line(note);
    }
    let pointer = match &t.underlying {
        TypeExpr::Pointer { is_const, .. } => Some(*is_const),
        _ => None,
    };
    out.line("#[repr(transparent)]");
    if pointer.is_some() {
        out.line("#[derive(Clone, Copy, Debug, PartialEq)]");
    } else {
        out.line("#[derive(Clone, Copy, Debug, Default, PartialEq)]");
    }
    out.line(format!("{vis}struct {name}(pub {});", type_text(&t.underlying)));

    if let Some(is_const) = pointer {
        let null = if is_const { "null" } else { "null_mut" };
        out.blank();
        out.open(format!("impl Default for {name} {{"));
        out.open("fn default() -> Self {");
        out.line(format!("Self(::core::ptr::{null}())"));
        out.close("}");
        out.close("}");
    }

    if let Some(target) = &t.also_usable_for {
        out.blank();
        out.open(format!("impl From<{name}> for {} {{", path(target, true)));
        out.open(format!("fn from(value: {name}) -> Self {{"));
        out.line("Self(value.0 as _)");
        out.close("}");
        out.close("}");
    }
}

fn render_inline_array(out: &mut Writer, vis: &str, name: &str, a: &InlineArrayDecl) {
    let element = type_text(&a.element);
    let length = a.length;
    out.line("#[repr(transparent)]");
    out.line("#[derive(Clone, Copy)]");
    out.line(format!("{vis}struct {name}(pub [{element}; {length}]);"));
    out.blank();
    out.open(format!("impl {name} {{"));
    out.line(format!("pub const LENGTH: usize = {length};"));
    out.blank();
    out.open(format!("pub fn as_slice(&self) -> &[{element}] {{"));
    out.line("&self.0");
    out.close("}");
    out.blank();
    out.open(format!("pub fn as_mut_slice(&mut self) -> &mut [{element}] {{"));
    out.line("&mut self.0");
    out.close("}");
    out.close("}");
}

fn render_interface(out: &mut Writer, vis: &str, name: &str, i: &InterfaceDecl) {
    out.line("#[repr(C)]");
    out.open(format!("{vis}struct {name} {{"));
    out.line(format!("pub vtable: *const {name}Vtbl,"));
    out.close("}");

    if let Some(iid) = i.iid {
        out.blank();
        out.open(format!("impl {name} {{"));
        out.line(format!("pub const IID: &'static str = \"{iid}\";"));
        out.close("}");
    }

    out.blank();
    out.line("#[repr(C)]");
    out.open(format!("{vis}struct {name}Vtbl {{"));
    if let Some(base) = &i.base {
        out.line(format!("pub base: {}Vtbl,", path(base, true)));
    }
    for method in &i.methods {
        if !method.preserve_sig {
            out.line("/// A failure status is raised as an error.");
        }
        let mut params = vec!["this: *mut ::core::ffi::c_void".to_string()];
        params.extend(method.params.iter().map(abi_param));
        out.line(format!(
            "pub {}: unsafe extern \"system\" fn({}){},",
            ident(&method.name),
            params.join(", "),
            return_suffix(&method.ret)
        ));
    }
    out.close("}");
}

fn abi_param(param: &ParamDecl) -> String {
    format!(
        "{}: {}",
        ident(&param.name),
        abi_type(&param.ty, param.modifier, param.marshal)
    )
}

fn render_callback(out: &mut Writer, vis: &str, name: &str, c: &CallbackDecl) {
    let params: Vec<String> = c.params.iter().map(abi_param).collect();
    out.line(format!(
        "{vis}type {name} = Option<unsafe extern \"system\" fn({}){}>;",
        params.join(", "),
        return_suffix(&c.ret)
    ));
}

fn render_constant(out: &mut Writer, vis: &str, name: &str, c: &ConstantDecl) {
    out.line(format!(
        "{vis}const {name}: {} = {};",
        type_text(&c.ty),
        constant_text(&c.value, &c.ty)
    ));
}

fn render_macro(out: &mut Writer, vis: &str, name: &str, m: &MacroDecl) {
    let params: Vec<String> = m
        .params
        .iter()
        .map(|p| format!("{}: {}", ident(&p.name), param_text(&p.ty, p.modifier)))
        .collect();
    out.line("#[inline]");
    out.open(format!(
        "{vis}fn {name}({}){} {{",
        params.join(", "),
        return_suffix(&m.ret)
    ));
    for line in m.body.trim().lines() {
        out.line(line.trim());
    }
    out.close("}");
}

fn success_note(success: ReleaseSuccess) -> &'static str {
    match success {
        ReleaseSuccess::True => "Release succeeds when the call returns true.",
        ReleaseSuccess::Zero => "Release succeeds when the call returns zero.",
        ReleaseSuccess::NonZero => "Release succeeds when the call returns non-zero.",
        ReleaseSuccess::Always => "Release always succeeds.",
    }
}

fn render_wrapper(out: &mut Writer, vis: &str, name: &str, w: &HandleWrapperSpec) {
    let raw = type_text(&w.raw);
    let value = to_i64("self.handle", &w.raw);

    out.line(format!("/// Owns a handle released by `{}`.", w.release.name));
    out.open(format!("{vis}struct {name} {{"));
    out.line(format!("handle: {raw},"));
    out.line("owns_handle: bool,");
    out.close("}");
    out.blank();

    out.open(format!("impl {name} {{"));
    let mut first = true;
    for member in &w.members {
        if !first && !matches!(member, WrapperMember::SentinelConstant { .. }) {
            out.blank();
        }
        first = false;
        match member {
            WrapperMember::SentinelConstant { name, value } => {
                out.line(format!("pub const {name}: i64 = {value};"));
            }
            WrapperMember::DefaultConstructor { initial } => {
                out.open("pub fn new() -> Self {");
                out.open("Self {");
                out.line(format!("handle: {},", from_i64(&format!("{initial}i64"), &w.raw)));
                out.line("owns_handle: true,");
                out.close("}");
                out.close("}");
            }
            WrapperMember::FromRaw { owns_handle } => {
                out.line("/// # Safety");
                out.line("/// `handle` must be a live handle the caller may hand over.");
                out.open(format!(
                    "pub unsafe fn from_raw(handle: {raw}, owns_handle: bool) -> Self {{"
                ));
                if *owns_handle {
                    out.line("Self { handle, owns_handle }");
                } else {
                    out.line("let _ = owns_handle;");
                    out.line("Self { handle, owns_handle: false }");
                }
                out.close("}");
            }
            WrapperMember::IsInvalid { sentinels } => {
                out.open("pub fn is_invalid(&self) -> bool {");
                if sentinels.is_empty() {
                    out.line("false");
                } else {
                    let patterns: Vec<String> = sentinels.iter().map(i64::to_string).collect();
                    out.line(format!("matches!({value}, {})", patterns.join(" | ")));
                }
                out.close("}");
            }
            WrapperMember::ReleaseOverride { .. } => {}
        }
    }
    out.close("}");

    out.blank();
    out.open(format!("impl SafeHandle for {name} {{"));
    out.open("fn raw(&self) -> i64 {");
    out.line(value);
    out.close("}");
    out.close("}");

    let release = w.members.iter().find_map(|m| match m {
        WrapperMember::ReleaseOverride { function, success } => Some((function, *success)),
        _ => None,
    });
    if let Some((function, success)) = release {
        let check_invalid = w
            .members
            .iter()
            .any(|m| matches!(m, WrapperMember::IsInvalid { .. }));
        let condition = if check_invalid {
            "self.owns_handle && !self.is_invalid()"
        } else {
            "self.owns_handle"
        };
        out.blank();
        out.open(format!("impl Drop for {name} {{"));
        out.open("fn drop(&mut self) {");
        out.line(format!("// {}", success_note(success)));
        out.open(format!("if {condition} {{"));
        out.line(format!("let _ = unsafe {{ {}(self.handle) }};", raw_path(function)));
        out.close("}");
        out.close("}");
        out.close("}");
    }
}

fn link_name(library: &str) -> &str {
    match library.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("dll") => stem,
        _ => library,
    }
}

fn render_extern(out: &mut Writer, decl: &Declaration, function: &FunctionDecl) {
    let vis = match decl.visibility {
        Visibility::Private => "pub(super) ",
        other => visibility(other),
    };
    let params: Vec<String> = function.params.iter().map(abi_param).collect();
    let ret = if function.ret.is_void() {
        String::new()
    } else {
        format!(" -> {}", abi_type(&function.ret, None, function.ret_marshal))
    };

    out.line(format!("#[link(name = \"{}\")]", link_name(&function.library)));
    out.open(format!("extern \"{}\" {{", abi(function.calling_convention)));
    out.docs(decl.docs.as_deref());
    if function.set_last_error {
        out.line("// Sets the thread's last-error code.");
    }
    out.line(format!(
        "{vis}fn {}({}){ret};",
        decl.name.name,
        params.join(", ")
    ));
    out.close("}");
}

/// Per-overload facts the statement renderer needs.
struct BodyContext<'a> {
    params: HashMap<&'a str, (&'a TypeExpr, Option<ParameterModifier>)>,
    locals: HashMap<String, TypeExpr>,
    optional_locals: HashSet<String>,
    returns_value: bool,
}

impl<'a> BodyContext<'a> {
    fn new(overload: &'a FriendlyOverload) -> Self {
        Self {
            params: overload
                .params
                .iter()
                .map(|p| (p.name.as_str(), (&p.ty, p.modifier)))
                .collect(),
            locals: HashMap::new(),
            optional_locals: HashSet::new(),
            returns_value: !overload.ret.is_void(),
        }
    }

    fn is_optional(&self, param: &str) -> bool {
        matches!(self.params.get(param), Some((TypeExpr::Nullable(_), _)))
    }

    fn by_reference(&self, param: &str) -> bool {
        matches!(
            self.params.get(param),
            Some((_, Some(ParameterModifier::Out | ParameterModifier::Ref)))
        )
    }

    fn is_mutable_slice(&self, param: &str) -> bool {
        matches!(
            self.params.get(param),
            Some((TypeExpr::Slice { mutable: true, .. }, _))
        )
    }
}

fn render_overload(out: &mut Writer, decl: &Declaration, overload: &FriendlyOverload) {
    let params: Vec<String> = overload
        .params
        .iter()
        .map(|p| format!("{}: {}", ident(&p.name), param_text(&p.ty, p.modifier)))
        .collect();
    out.docs(decl.docs.as_deref());
    out.open(format!(
        "{}fn {}({}){} {{",
        visibility(decl.visibility),
        overload.name,
        params.join(", "),
        return_suffix(&overload.ret)
    ));
    let mut ctx = BodyContext::new(overload);
    render_block(out, &mut ctx, &overload.body());
    out.close("}");
}

fn render_block(out: &mut Writer, ctx: &mut BodyContext<'_>, statements: &[Statement]) {
    for (i, statement) in statements.iter().enumerate() {
        render_statement(out, ctx, statement, i + 1 == statements.len());
    }
}

fn render_statement(
    out: &mut Writer,
    ctx: &mut BodyContext<'_>,
    statement: &Statement,
    tail: bool,
) {
    match statement {
        Statement::DeclareLocal { name, ty, init } => {
            ctx.locals.insert(name.clone(), ty.clone());
            let init = init
                .as_ref()
                .map(expr_text)
                .unwrap_or_else(|| "Default::default()".to_string());
            out.line(format!("let mut {}: {} = {init};", ident(name), type_text(ty)));
        }
        Statement::CheckLengthsEqual { first, second } => {
            out.line(format!(
                "assert_eq!({}.len(), {}.len(), \"{first} and {second} must have the same length\");",
                ident(first),
                ident(second)
            ));
        }
        Statement::CheckMinLength { param, min } => {
            out.line(format!(
                "assert!({}.len() >= {min}, \"{param} must hold at least {min} elements\");",
                ident(param)
            ));
        }
        Statement::CheckTerminated { param } => {
            out.line(format!(
                "assert!({}.contains(&0), \"{param} must be null-terminated\");",
                ident(param)
            ));
        }
        Statement::EncodeNarrow { param, local } => {
            let param_ident = ident(param);
            // Native code stops reading at the first NUL, so the copy does too.
            if ctx.is_optional(param) {
                ctx.optional_locals.insert(local.clone());
                out.line(format!(
                    "let {local}: Option<Vec<u8>> = {param_ident}.map(|s| s.bytes().take_while(|&b| b != 0).chain(Some(0)).collect());"
                ));
            } else {
                out.line(format!(
                    "let {local}: Vec<u8> = {param_ident}.bytes().take_while(|&b| b != 0).chain(Some(0)).collect();"
                ));
            }
        }
        Statement::BorrowHandle {
            handle,
            added,
            local,
            fallback,
        } => {
            let ty = ctx
                .locals
                .get(local)
                .cloned()
                .unwrap_or(TypeExpr::NativeInt { signed: true });
            let handle_ident = ident(handle);
            if ctx.is_optional(handle) {
                out.open(format!("{local} = match {handle_ident} {{"));
                out.open("Some(handle) => {");
                out.line(format!("{added} = handle.add_ref();"));
                out.line(from_i64("handle.raw()", &ty));
                out.close("}");
                out.line(format!("None => {},", from_i64(&format!("{fallback}i64"), &ty)));
                out.close("};");
            } else {
                out.line(format!("{added} = {handle_ident}.add_ref();"));
                out.line(format!(
                    "{local} = {};",
                    from_i64(&format!("{handle_ident}.raw()"), &ty)
                ));
            }
        }
        Statement::ReleaseHandle { handle, added } => {
            let handle_ident = ident(handle);
            if ctx.is_optional(handle) {
                out.open(format!(
                    "if let (true, Some(handle)) = ({added}, {handle_ident}) {{"
                ));
                out.line("handle.release_ref();");
            } else {
                out.open(format!("if {added} {{"));
                out.line(format!("{handle_ident}.release_ref();"));
            }
            out.close("}");
        }
        Statement::Assign { target, value } => {
            let deref = if ctx.by_reference(target) { "*" } else { "" };
            out.line(format!("{deref}{} = {};", ident(target), expr_text(value)));
        }
        Statement::Reslice { param, .. } => {
            let p = ident(param);
            out.line(format!(
                "let {param}Length = {p}.iter().position(|&c| c == 0).unwrap_or({p}.len());"
            ));
            if ctx.by_reference(param) {
                out.line(format!("*{p} = &mut ::core::mem::take({p})[..{param}Length];"));
            } else {
                out.line(format!("let {p} = &mut {p}[..{param}Length];"));
            }
        }
        Statement::Call {
            result,
            function,
            args,
        } => {
            let args: Vec<String> = args.iter().map(expr_text).collect();
            let call = format!("unsafe {{ raw::{function}({}) }}", args.join(", "));
            match result {
                Some(local) => out.line(format!("let {local} = {call};")),
                None => out.line(format!("{call};")),
            }
        }
        Statement::Return(value) => match (value, tail) {
            (Some(expr), true) => out.line(expr_text(expr)),
            (Some(expr), false) => out.line(format!("return {};", expr_text(expr))),
            (None, true) => {}
            (None, false) => out.line("return;"),
        },
        Statement::Fixed { binding, body } => {
            out.open("{");
            render_binding(out, ctx, binding);
            render_block(out, ctx, body);
            out.close("}");
        }
        Statement::TryFinally { body, finally } => {
            let (hoisted, rest): (Vec<Statement>, Vec<Statement>) = body
                .iter()
                .cloned()
                .partition(|s| matches!(s, Statement::DeclareLocal { .. }));
            render_block(out, ctx, &hoisted);
            out.open("let __outcome = {");
            render_block(out, ctx, &rest);
            out.close("};");
            render_block(out, ctx, finally);
            if tail && ctx.returns_value {
                out.line("__outcome");
            }
        }
    }
}

fn render_binding(out: &mut Writer, ctx: &BodyContext<'_>, binding: &FixedBinding) {
    let is_const = !matches!(binding.ty, TypeExpr::Pointer { is_const: false, .. });
    let ty = match &binding.ty {
        TypeExpr::Pointer { .. } => type_text(&binding.ty),
        other => format!("*mut {}", type_text(other)),
    };
    let null = if is_const {
        "::core::ptr::null()"
    } else {
        "::core::ptr::null_mut()"
    };
    let local = &binding.local;
    match &binding.source {
        FixedSource::Slice(param) => {
            let p = ident(param);
            let method = if ctx.is_mutable_slice(param) {
                "as_mut_ptr"
            } else {
                "as_ptr"
            };
            out.line(format!(
                "let {local}: {ty} = if {p}.is_empty() {{ {null} }} else {{ {p}.{method}() as _ }};"
            ));
        }
        FixedSource::Str(param) => {
            let p = ident(param);
            if ctx.is_optional(param) {
                out.line(format!(
                    "let {local}Wide: Option<Vec<u16>> = {p}.map(|s| s.encode_utf16().chain(Some(0)).collect());"
                ));
                out.line(format!(
                    "let {local}: {ty} = {local}Wide.as_ref().map_or(::core::ptr::null(), |w| w.as_ptr()) as _;"
                ));
            } else {
                out.line(format!(
                    "let {local}Wide: Vec<u16> = {p}.encode_utf16().chain(Some(0)).collect();"
                ));
                out.line(format!("let {local}: {ty} = {local}Wide.as_ptr() as _;"));
            }
        }
        FixedSource::Ref(param) => {
            out.line(format!("let {local} = {} as *const _ as {ty};", ident(param)));
        }
        FixedSource::Local(source) => {
            if ctx.optional_locals.contains(source) {
                out.line(format!(
                    "let {local}: {ty} = {source}.as_ref().map_or(::core::ptr::null(), |c| c.as_ptr()) as _;"
                ));
            } else {
                out.line(format!("let {local}: {ty} = {source}.as_ptr() as _;"));
            }
        }
    }
}

/// Indenting line buffer.
#[derive(Debug, Default)]
pub struct Writer {
    lines: Vec<String>,
    depth: usize,
}

impl Writer {
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{text}", "    ".repeat(self.depth)));
        }
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Write a line and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent and write a closing line.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    pub fn docs(&mut self, docs: Option<&str>) {
        for line in docs.unwrap_or_default().lines() {
            let line = line.trim_end();
            if line.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {line}"));
            }
        }
    }

    pub fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safebind_core::decl::{
        ArgumentRewrite, Expr, FieldDecl, InterfaceMethod, OverloadParam, RESULT_LOCAL,
    };
    use safebind_core::mapping::MarshalSpec;
    use safebind_meta::model::{CallingConvention, ConstantValue, EnumMember};
    use safebind_meta::{CharWidth, PrimitiveCode, QualifiedName};

    const NS: &str = "Windows.Win32.Foundation";

    fn qn(name: &str) -> QualifiedName {
        QualifiedName::new(NS, name)
    }

    fn decl(name: &str, item: Item) -> Declaration {
        Declaration {
            name: qn(name),
            visibility: Visibility::Public,
            docs: None,
            item,
        }
    }

    fn render_one(decl: &Declaration) -> String {
        let mut out = Writer::default();
        render_declaration(&mut out, decl);
        out.finish()
    }

    fn prim(code: PrimitiveCode) -> TypeExpr {
        TypeExpr::Primitive(code)
    }

    #[test]
    fn writer_indents_blocks() {
        let mut out = Writer::default();
        out.open("fn f() {");
        out.line("x");
        out.close("}");
        assert_eq!(out.finish(), "fn f() {\n    x\n}\n");
    }

    #[test]
    fn sequential_and_explicit_structs() {
        let fields = vec![
            FieldDecl {
                name: "x".into(),
                ty: prim(PrimitiveCode::I32),
                marshal: None,
            },
            FieldDecl {
                name: "type".into(),
                ty: prim(PrimitiveCode::I32),
                marshal: None,
            },
        ];
        let point = decl(
            "POINT",
            Item::Struct(StructDecl {
                layout: Layout::Sequential,
                pack: None,
                fields: fields.clone(),
                flexible_array: false,
                managed: false,
            }),
        );
        let text = render_one(&point);
        assert!(text.contains("#[repr(C)]"));
        assert!(text.contains("pub struct POINT {"));
        assert!(text.contains("pub r#type: i32,"));
        assert!(text.contains("impl Default for POINT"));

        let overlay = decl(
            "OVERLAY",
            Item::Struct(StructDecl {
                layout: Layout::Explicit,
                pack: Some(1),
                fields,
                flexible_array: true,
                managed: false,
            }),
        );
        let text = render_one(&overlay);
        assert!(text.contains("#[repr(C, packed(1))]"));
        assert!(text.contains("pub union OVERLAY {"));
        assert!(text.contains("/// Variable-length"));
    }

    #[test]
    fn managed_struct_notes_marshaling() {
        let item = Item::Struct(StructDecl {
            layout: Layout::Sequential,
            pack: None,
            fields: vec![FieldDecl {
                name: "name".into(),
                ty: TypeExpr::String,
                marshal: Some(MarshalSpec::WideString),
            }],
            flexible_array: false,
            managed: true,
        });
        let text = render_one(&decl("INFO", item));
        assert!(text.contains("pub name: &str, // UTF-16 string"));
        assert!(!text.contains("derive(Clone, Copy)"));
        assert!(!text.contains("zeroed"));
    }

    #[test]
    fn flags_enum() {
        let item = Item::Enum(EnumDecl {
            underlying: prim(PrimitiveCode::U32),
            flags: true,
            members: vec![
                EnumMember {
                    name: "FILE_SHARE_READ".into(),
                    value: 1,
                },
                EnumMember {
                    name: "FILE_SHARE_ALL".into(),
                    value: -1,
                },
            ],
        });
        let text = render_one(&decl("FILE_SHARE_MODE", item));
        assert!(text.contains("pub struct FILE_SHARE_MODE(pub u32);"));
        assert!(text.contains("pub const FILE_SHARE_READ: Self = Self(1);"));
        assert!(text.contains("pub const FILE_SHARE_ALL: Self = Self(-1i64 as u32);"));
        assert!(text.contains("impl ::core::ops::BitOr for FILE_SHARE_MODE"));
    }

    #[test]
    fn string_typedef_and_conversion() {
        let item = Item::Typedef(TypedefDecl {
            underlying: TypeExpr::pointer(prim(PrimitiveCode::Char), true),
            kind: TypedefKind::WideString,
            also_usable_for: Some(qn("PCSTR_ANY")),
        });
        let text = render_one(&decl("PCWSTR", item));
        assert!(text.contains("/// Read-only null-terminated UTF-16 string."));
        assert!(text.contains("pub struct PCWSTR(pub *const u16);"));
        assert!(text.contains("Self(::core::ptr::null())"));
        assert!(text.contains(
            "impl From<PCWSTR> for crate::windows_win32_foundation::PCSTR_ANY {"
        ));
    }

    #[test]
    fn inline_array_helper() {
        let item = Item::InlineArray(InlineArrayDecl {
            element: prim(PrimitiveCode::Char),
            length: 260,
        });
        let mut d = decl("__char_260", item);
        d.name = QualifiedName::new("InlineArrays", "__char_260");
        let text = render_one(&d);
        assert!(text.contains("pub struct __char_260(pub [u16; 260]);"));
        assert!(text.contains("pub const LENGTH: usize = 260;"));
    }

    #[test]
    fn interface_vtable_chains_base() {
        let item = Item::Interface(InterfaceDecl {
            iid: None,
            base: Some(qn("IUnknown")),
            methods: vec![InterfaceMethod {
                name: "GetCount".into(),
                params: vec![],
                ret: prim(PrimitiveCode::U32),
                preserve_sig: false,
            }],
        });
        let text = render_one(&decl("IWidget", item));
        assert!(text.contains("pub vtable: *const IWidgetVtbl,"));
        assert!(text.contains("pub base: crate::windows_win32_foundation::IUnknownVtbl,"));
        assert!(text.contains(
            "pub GetCount: unsafe extern \"system\" fn(this: *mut ::core::ffi::c_void) -> u32,"
        ));
        assert!(text.contains("raised as an error"));
    }

    #[test]
    fn callbacks_constants_and_macros() {
        let callback = Item::Callback(CallbackDecl {
            params: vec![ParamDecl {
                name: "hwnd".into(),
                ty: prim(PrimitiveCode::IntPtr),
                modifier: None,
                marshal: None,
                optional: false,
            }],
            ret: prim(PrimitiveCode::Bool),
        });
        assert!(render_one(&decl("WNDENUMPROC", callback)).contains(
            "pub type WNDENUMPROC = Option<unsafe extern \"system\" fn(hwnd: isize) -> bool>;"
        ));

        let constant = Item::Constant(ConstantDecl {
            ty: prim(PrimitiveCode::U32),
            value: ConstantValue::Integer(260),
        });
        assert!(render_one(&decl("MAX_PATH", constant)).contains("pub const MAX_PATH: u32 = 260;"));

        let makeword = Item::Macro(MacroDecl {
            params: vec![ParamDecl {
                name: "low".into(),
                ty: prim(PrimitiveCode::U8),
                modifier: None,
                marshal: None,
                optional: false,
            }],
            ret: prim(PrimitiveCode::U16),
            body: "low as u16".into(),
        });
        let text = render_one(&decl("MAKEWORD", makeword));
        assert!(text.contains("pub fn MAKEWORD(low: u8) -> u16 {"));
        assert!(text.contains("    low as u16"));
    }

    fn close_handle_wrapper() -> HandleWrapperSpec {
        HandleWrapperSpec {
            release: qn("CloseHandle"),
            handle_type: Some(qn("HANDLE")),
            raw: TypeExpr::named(qn("HANDLE")),
            sentinels: vec![-1, 0],
            members: vec![
                WrapperMember::SentinelConstant {
                    name: "INVALID_HANDLE_VALUE".into(),
                    value: -1,
                },
                WrapperMember::DefaultConstructor { initial: -1 },
                WrapperMember::FromRaw { owns_handle: true },
                WrapperMember::IsInvalid {
                    sentinels: vec![-1, 0],
                },
                WrapperMember::ReleaseOverride {
                    function: qn("CloseHandle"),
                    success: ReleaseSuccess::True,
                },
            ],
        }
    }

    #[test]
    fn handle_wrapper_has_drop() {
        let d = decl(
            "CloseHandleSafeHandle",
            Item::HandleWrapper(close_handle_wrapper()),
        );
        let text = render_one(&d);
        assert!(text.contains("pub struct CloseHandleSafeHandle {"));
        assert!(text.contains("pub const INVALID_HANDLE_VALUE: i64 = -1;"));
        assert!(text.contains("handle: crate::windows_win32_foundation::HANDLE(-1i64 as _),"));
        assert!(text.contains("matches!(self.handle.0 as i64, -1 | 0)"));
        assert!(text.contains("impl Drop for CloseHandleSafeHandle"));
        assert!(text.contains("crate::windows_win32_foundation::raw::CloseHandle(self.handle)"));
        assert!(text.contains("returns true"));
    }

    #[test]
    fn wrapper_without_sentinels_is_never_invalid() {
        let mut spec = close_handle_wrapper();
        spec.sentinels.clear();
        spec.members = vec![
            WrapperMember::DefaultConstructor { initial: 0 },
            WrapperMember::IsInvalid { sentinels: vec![] },
            WrapperMember::ReleaseOverride {
                function: qn("CloseHandle"),
                success: ReleaseSuccess::Zero,
            },
        ];
        let text = render_one(&decl("W", Item::HandleWrapper(spec)));
        assert!(text.contains("pub fn is_invalid(&self) -> bool {\n        false"));
        assert!(text.contains("returns zero"));
    }

    fn write_file(overload: FriendlyOverload) -> Declaration {
        decl(
            "WriteFile",
            Item::Function(FunctionDecl {
                library: "KERNEL32.dll".into(),
                calling_convention: CallingConvention::Winapi,
                set_last_error: true,
                params: vec![
                    ParamDecl {
                        name: "buffer".into(),
                        ty: TypeExpr::pointer(prim(PrimitiveCode::U8), true),
                        modifier: None,
                        marshal: None,
                        optional: false,
                    },
                    ParamDecl {
                        name: "count".into(),
                        ty: prim(PrimitiveCode::U32),
                        modifier: None,
                        marshal: None,
                        optional: false,
                    },
                ],
                ret: prim(PrimitiveCode::Bool),
                ret_marshal: None,
                friendly: vec![overload],
            }),
        )
    }

    fn slice_overload() -> FriendlyOverload {
        FriendlyOverload {
            name: "WriteFile".into(),
            target: "WriteFile".into(),
            params: vec![OverloadParam {
                name: "buffer".into(),
                ty: TypeExpr::Slice {
                    element: Box::new(prim(PrimitiveCode::U8)),
                    mutable: false,
                },
                modifier: None,
            }],
            ret: prim(PrimitiveCode::Bool),
            arguments: vec![
                ArgumentRewrite {
                    original: "buffer".into(),
                    value: Expr::Local("bufferLocal".into()),
                },
                ArgumentRewrite {
                    original: "count".into(),
                    value: Expr::Length {
                        of: "buffer".into(),
                        ty: prim(PrimitiveCode::U32),
                    },
                },
            ],
            pre_call: vec![],
            fixed: vec![FixedBinding {
                local: "bufferLocal".into(),
                ty: TypeExpr::pointer(prim(PrimitiveCode::U8), true),
                source: FixedSource::Slice("buffer".into()),
            }],
            post_call: vec![],
            cleanup: vec![],
            result_local: Some(RESULT_LOCAL.into()),
            returns: Some(Expr::Local(RESULT_LOCAL.into())),
        }
    }

    #[test]
    fn extern_block_and_overload() {
        let bindings = Bindings {
            declarations: vec![write_file(slice_overload())],
            fingerprint: "abc".into(),
        };
        let text = render_bindings(&bindings);
        assert!(text.starts_with("// Generated by safebind."));
        assert!(text.contains("// fingerprint: abc"));
        assert!(text.contains("pub mod windows_win32_foundation {"));
        assert!(text.contains("pub fn WriteFile(buffer: &[u8]) -> bool {"));
        assert!(text.contains(
            "let bufferLocal: *const u8 = if buffer.is_empty() { ::core::ptr::null() } else { buffer.as_ptr() as _ };"
        ));
        assert!(text
            .contains("let __result = unsafe { raw::WriteFile(bufferLocal, buffer.len() as u32) };"));
        assert!(text.contains("pub mod raw {"));
        assert!(text.contains("#[link(name = \"KERNEL32\")]"));
        assert!(text.contains("extern \"system\" {"));
        assert!(text.contains("// Sets the thread's last-error code."));
        assert!(text.contains("pub fn WriteFile(buffer: *const u8, count: u32) -> bool;"));
        // The pinned block's tail is the returned value.
        assert!(text.contains("        __result\n"));
    }

    #[test]
    fn cleanup_runs_after_call_block() {
        let mut overload = slice_overload();
        overload.params = vec![OverloadParam {
            name: "file".into(),
            ty: TypeExpr::Nullable(Box::new(TypeExpr::AnySafeHandle)),
            modifier: None,
        }];
        overload.fixed.clear();
        overload.arguments = vec![ArgumentRewrite {
            original: "file".into(),
            value: Expr::Local("fileLocal".into()),
        }];
        overload.pre_call = vec![
            Statement::DeclareLocal {
                name: "fileAddRef".into(),
                ty: prim(PrimitiveCode::Bool),
                init: Some(Expr::Default),
            },
            Statement::DeclareLocal {
                name: "fileLocal".into(),
                ty: TypeExpr::named(qn("HANDLE")),
                init: None,
            },
            Statement::BorrowHandle {
                handle: "file".into(),
                added: "fileAddRef".into(),
                local: "fileLocal".into(),
                fallback: -1,
            },
        ];
        overload.cleanup = vec![Statement::ReleaseHandle {
            handle: "file".into(),
            added: "fileAddRef".into(),
        }];

        let mut out = Writer::default();
        let d = write_file(overload.clone());
        render_overload(&mut out, &d, &overload);
        let text = out.finish();

        let declare = text.find("let mut fileAddRef: bool").unwrap();
        let outcome = text.find("let __outcome = {").unwrap();
        let release = text.find("handle.release_ref();").unwrap();
        assert!(declare < outcome && outcome < release);
        assert!(text.contains("fileAddRef = handle.add_ref();"));
        assert!(text.contains("None => crate::windows_win32_foundation::HANDLE(-1i64 as _),"));
        assert!(text.contains("if let (true, Some(handle)) = (fileAddRef, file) {"));
        assert!(text.contains("    __outcome\n}"));
    }

    #[test]
    fn narrow_string_pins_encoded_bytes() {
        let overload = FriendlyOverload {
            name: "OutputDebugStringA".into(),
            target: "OutputDebugStringA".into(),
            params: vec![OverloadParam {
                name: "text".into(),
                ty: TypeExpr::Nullable(Box::new(TypeExpr::String)),
                modifier: None,
            }],
            ret: TypeExpr::void(),
            arguments: vec![ArgumentRewrite {
                original: "text".into(),
                value: Expr::Local("textLocal".into()),
            }],
            pre_call: vec![Statement::EncodeNarrow {
                param: "text".into(),
                local: "textBytes".into(),
            }],
            fixed: vec![FixedBinding {
                local: "textLocal".into(),
                ty: TypeExpr::pointer(prim(PrimitiveCode::U8), true),
                source: FixedSource::Local("textBytes".into()),
            }],
            post_call: vec![],
            cleanup: vec![],
            result_local: None,
            returns: None,
        };
        let d = decl("OutputDebugStringA", Item::Function(FunctionDecl {
            library: "kernel32.dll".into(),
            calling_convention: CallingConvention::Winapi,
            set_last_error: false,
            params: vec![],
            ret: TypeExpr::void(),
            ret_marshal: None,
            friendly: vec![],
        }));
        let mut out = Writer::default();
        render_overload(&mut out, &d, &overload);
        let text = out.finish();
        assert!(text.contains("pub fn OutputDebugStringA(text: Option<&str>) {"));
        assert!(text.contains(
            "let textBytes: Option<Vec<u8>> = text.map(|s| s.bytes().take_while(|&b| b != 0).chain(Some(0)).collect());"
        ));
        assert!(!text.contains("CString"));
        assert!(text.contains("textBytes.as_ref().map_or(::core::ptr::null(), |c| c.as_ptr())"));
        assert!(text.contains("unsafe { raw::OutputDebugStringA(textLocal) };"));
    }

    #[test]
    fn narrow_string_stops_at_first_nul() {
        let overload = FriendlyOverload {
            name: "Say".into(),
            target: "Say".into(),
            params: vec![OverloadParam {
                name: "text".into(),
                ty: TypeExpr::String,
                modifier: None,
            }],
            ret: TypeExpr::void(),
            arguments: vec![ArgumentRewrite {
                original: "text".into(),
                value: Expr::Local("textLocal".into()),
            }],
            pre_call: vec![Statement::EncodeNarrow {
                param: "text".into(),
                local: "textBytes".into(),
            }],
            fixed: vec![FixedBinding {
                local: "textLocal".into(),
                ty: TypeExpr::pointer(prim(PrimitiveCode::U8), true),
                source: FixedSource::Local("textBytes".into()),
            }],
            post_call: vec![],
            cleanup: vec![],
            result_local: None,
            returns: None,
        };
        let d = write_file(overload.clone());
        let mut out = Writer::default();
        render_overload(&mut out, &d, &overload);
        let text = out.finish();
        assert!(text.contains(
            "let textBytes: Vec<u8> = text.bytes().take_while(|&b| b != 0).chain(Some(0)).collect();"
        ));
        assert!(text.contains("let textLocal: *const u8 = textBytes.as_ptr() as _;"));

        // The emitted expression keeps the prefix a native reader would see.
        let encoded: Vec<u8> = "ab\0cd".bytes().take_while(|&b| b != 0).chain(Some(0)).collect();
        assert_eq!(encoded, b"ab\0");
    }

    #[test]
    fn string_buffer_reslice_reaches_caller() {
        let overload = FriendlyOverload {
            name: "Fill".into(),
            target: "Fill".into(),
            params: vec![OverloadParam {
                name: "buffer".into(),
                ty: TypeExpr::Slice {
                    element: Box::new(prim(PrimitiveCode::Char)),
                    mutable: true,
                },
                modifier: Some(ParameterModifier::Ref),
            }],
            ret: TypeExpr::void(),
            arguments: vec![ArgumentRewrite {
                original: "buffer".into(),
                value: Expr::Local("bufferLocal".into()),
            }],
            pre_call: vec![Statement::CheckTerminated {
                param: "buffer".into(),
            }],
            fixed: vec![FixedBinding {
                local: "bufferLocal".into(),
                ty: TypeExpr::pointer(prim(PrimitiveCode::Char), false),
                source: FixedSource::Slice("buffer".into()),
            }],
            post_call: vec![Statement::Reslice {
                param: "buffer".into(),
                width: CharWidth::Wide,
            }],
            cleanup: vec![],
            result_local: None,
            returns: None,
        };
        let d = write_file(overload.clone());
        let mut out = Writer::default();
        render_overload(&mut out, &d, &overload);
        let text = out.finish();
        assert!(text.contains("pub fn Fill(buffer: &mut &mut [u16]) {"));
        assert!(text.contains("buffer.as_mut_ptr() as _"));
        assert!(text.contains(
            "let bufferLength = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());"
        ));
        assert!(text.contains("*buffer = &mut ::core::mem::take(buffer)[..bufferLength];"));
        assert!(!text.contains("let buffer = "));
    }

    #[test]
    fn argument_checks_render_before_handle_borrow() {
        let mut overload = slice_overload();
        overload.params = vec![
            OverloadParam {
                name: "file".into(),
                ty: TypeExpr::AnySafeHandle,
                modifier: None,
            },
            OverloadParam {
                name: "a".into(),
                ty: TypeExpr::Slice {
                    element: Box::new(prim(PrimitiveCode::U8)),
                    mutable: false,
                },
                modifier: None,
            },
            OverloadParam {
                name: "b".into(),
                ty: TypeExpr::Slice {
                    element: Box::new(prim(PrimitiveCode::U8)),
                    mutable: false,
                },
                modifier: None,
            },
        ];
        overload.fixed.clear();
        overload.arguments = vec![ArgumentRewrite {
            original: "file".into(),
            value: Expr::Local("fileLocal".into()),
        }];
        overload.pre_call = vec![
            Statement::DeclareLocal {
                name: "fileAddRef".into(),
                ty: prim(PrimitiveCode::Bool),
                init: Some(Expr::Default),
            },
            Statement::DeclareLocal {
                name: "fileLocal".into(),
                ty: TypeExpr::named(qn("HANDLE")),
                init: None,
            },
            Statement::BorrowHandle {
                handle: "file".into(),
                added: "fileAddRef".into(),
                local: "fileLocal".into(),
                fallback: -1,
            },
            Statement::CheckLengthsEqual {
                first: "a".into(),
                second: "b".into(),
            },
        ];
        overload.cleanup = vec![Statement::ReleaseHandle {
            handle: "file".into(),
            added: "fileAddRef".into(),
        }];

        let d = write_file(overload.clone());
        let mut out = Writer::default();
        render_overload(&mut out, &d, &overload);
        let text = out.finish();

        let check = text.find("assert_eq!(a.len(), b.len()").unwrap();
        let borrow = text.find("fileAddRef = file.add_ref();").unwrap();
        let outcome = text.find("let __outcome = {").unwrap();
        assert!(check < outcome && outcome < borrow);
        assert!(text.contains("if fileAddRef {"));
        assert!(text.contains("file.release_ref();"));
    }

    #[test]
    fn out_handle_assigns_through_reference() {
        let overload = FriendlyOverload {
            name: "OpenThing".into(),
            target: "OpenThing".into(),
            params: vec![OverloadParam {
                name: "h".into(),
                ty: TypeExpr::SafeHandle(qn("CloseHandleSafeHandle")),
                modifier: Some(ParameterModifier::Out),
            }],
            ret: TypeExpr::void(),
            arguments: vec![ArgumentRewrite {
                original: "h".into(),
                value: Expr::AddressOf("hLocal".into()),
            }],
            pre_call: vec![Statement::DeclareLocal {
                name: "hLocal".into(),
                ty: TypeExpr::named(qn("HANDLE")),
                init: None,
            }],
            fixed: vec![],
            post_call: vec![Statement::Assign {
                target: "h".into(),
                value: Expr::NewHandleWrapper {
                    wrapper: qn("CloseHandleSafeHandle"),
                    raw: Box::new(Expr::Local("hLocal".into())),
                },
            }],
            cleanup: vec![],
            result_local: None,
            returns: None,
        };
        let d = write_file(overload.clone());
        let mut out = Writer::default();
        render_overload(&mut out, &d, &overload);
        let text = out.finish();
        assert!(text.contains(
            "pub fn OpenThing(h: &mut crate::windows_win32_foundation::CloseHandleSafeHandle) {"
        ));
        assert!(text.contains(
            "let mut hLocal: crate::windows_win32_foundation::HANDLE = Default::default();"
        ));
        assert!(text.contains("unsafe { raw::OpenThing(&mut hLocal) };"));
        assert!(text.contains(
            "*h = crate::windows_win32_foundation::CloseHandleSafeHandle::from_raw(hLocal, true);"
        ));
    }

    #[test]
    fn standalone_function_lists_overload_first() {
        let text = render_standalone(&write_file(slice_overload()));
        let overload = text.find("pub fn WriteFile(buffer: &[u8]) -> bool {").unwrap();
        let raw = text.find("extern \"system\" {").unwrap();
        assert!(overload < raw);
        assert!(!text.contains("pub mod"));
    }

    #[test]
    fn namespaces_render_in_order() {
        let mut later = decl(
            "B",
            Item::Constant(ConstantDecl {
                ty: prim(PrimitiveCode::I32),
                value: ConstantValue::Integer(1),
            }),
        );
        later.name = QualifiedName::new("Zeta", "B");
        let mut earlier = later.clone();
        earlier.name = QualifiedName::new("Alpha", "A");
        let bindings = Bindings {
            declarations: vec![later, earlier],
            fingerprint: String::new(),
        };
        let text = render_bindings(&bindings);
        let alpha = text.find("pub mod alpha {").unwrap();
        let zeta = text.find("pub mod zeta {").unwrap();
        assert!(alpha < zeta);
        assert!(!text.contains("pub mod raw"));
    }
}
