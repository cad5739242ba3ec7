//! Neutral declaration representation.
//!
//! Generators produce these values and renderers consume them. Types,
//! parameters and statements are plain data; nothing here depends on the
//! syntax of a target language.

use safebind_meta::model::{CallingConvention, ConstantValue, EnumMember, Layout, TypedefKind};
use safebind_meta::{CharWidth, QualifiedName};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mapping::{MarshalSpec, ParameterModifier, TypeExpr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Internal,
    Private,
}

/// One generated declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: QualifiedName,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum Item {
    Struct(StructDecl),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
    InlineArray(InlineArrayDecl),
    Interface(InterfaceDecl),
    Callback(CallbackDecl),
    Constant(ConstantDecl),
    Macro(MacroDecl),
    Function(FunctionDecl),
    HandleWrapper(HandleWrapperSpec),
}

impl Item {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Item::Struct(_) => "struct",
            Item::Enum(_) => "enum",
            Item::Typedef(_) => "typedef",
            Item::InlineArray(_) => "inline array",
            Item::Interface(_) => "interface",
            Item::Callback(_) => "callback",
            Item::Constant(_) => "constant",
            Item::Macro(_) => "macro",
            Item::Function(_) => "function",
            Item::HandleWrapper(_) => "handle wrapper",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub layout: Layout,
    pub pack: Option<u16>,
    pub fields: Vec<FieldDecl>,
    /// The last field is a variable-length trailing array.
    pub flexible_array: bool,
    /// Fields use managed representations.
    pub managed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub marshal: Option<MarshalSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub underlying: TypeExpr,
    pub flags: bool,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefDecl {
    pub underlying: TypeExpr,
    pub kind: TypedefKind,
    pub also_usable_for: Option<QualifiedName>,
}

/// Fixed-length inline buffer helper, shared by every field of one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineArrayDecl {
    pub element: TypeExpr,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub iid: Option<Uuid>,
    pub base: Option<QualifiedName>,
    pub methods: Vec<InterfaceMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: TypeExpr,
    /// The native status return is kept rather than turned into an error.
    pub preserve_sig: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackDecl {
    pub params: Vec<ParamDecl>,
    pub ret: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub ty: TypeExpr,
    pub value: ConstantValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDecl {
    pub params: Vec<ParamDecl>,
    pub ret: TypeExpr,
    pub body: String,
}

/// A raw extern function plus its friendly overloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub library: String,
    pub calling_convention: CallingConvention,
    pub set_last_error: bool,
    pub params: Vec<ParamDecl>,
    pub ret: TypeExpr,
    pub ret_marshal: Option<MarshalSpec>,
    pub friendly: Vec<FriendlyOverload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub modifier: Option<ParameterModifier>,
    pub marshal: Option<MarshalSpec>,
    pub optional: bool,
}

/// A safer signature layered over a raw extern call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendlyOverload {
    pub name: String,
    /// The raw function this overload calls.
    pub target: String,
    pub params: Vec<OverloadParam>,
    pub ret: TypeExpr,
    /// One entry per original parameter, in order.
    pub arguments: Vec<ArgumentRewrite>,
    pub pre_call: Vec<Statement>,
    pub fixed: Vec<FixedBinding>,
    pub post_call: Vec<Statement>,
    /// Runs whether or not the call completes.
    pub cleanup: Vec<Statement>,
    /// Local holding the raw call's result, when it has one.
    pub result_local: Option<String>,
    pub returns: Option<Expr>,
}

/// Name of the local holding a raw call's result.
pub const RESULT_LOCAL: &str = "__result";

impl FriendlyOverload {
    /// Assemble the overload body: argument checks, the remaining pre-call
    /// statements, nested fixed bindings around the call, post-call
    /// statements and the return. With cleanup statements everything after
    /// the argument checks runs inside a try/finally, so a rejected argument
    /// never leaves a borrowed handle behind.
    pub fn body(&self) -> Vec<Statement> {
        let mut core = vec![Statement::Call {
            result: self.result_local.clone(),
            function: self.target.clone(),
            args: self.arguments.iter().map(|a| a.value.clone()).collect(),
        }];
        core.extend(self.post_call.iter().cloned());
        core.push(Statement::Return(self.returns.clone()));

        for binding in self.fixed.iter().rev() {
            core = vec![Statement::Fixed {
                binding: binding.clone(),
                body: core,
            }];
        }

        let (mut checks, mut body): (Vec<Statement>, Vec<Statement>) = self
            .pre_call
            .iter()
            .cloned()
            .partition(Statement::is_argument_check);
        body.extend(core);
        if self.cleanup.is_empty() {
            checks.extend(body);
        } else {
            checks.push(Statement::TryFinally {
                body,
                finally: self.cleanup.clone(),
            });
        }
        checks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverloadParam {
    pub name: String,
    pub ty: TypeExpr,
    pub modifier: Option<ParameterModifier>,
}

/// The value passed for one original parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentRewrite {
    pub original: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// An overload parameter, passed unchanged.
    Param(String),
    Local(String),
    /// The language default value of the parameter's type.
    Default,
    AddressOf(String),
    /// Length of a range parameter, converted to `ty`.
    Length { of: String, ty: TypeExpr },
    /// Construct a typedef wrapper around a raw value.
    Wrap { ty: TypeExpr, value: Box<Expr> },
    /// A new owning wrapper over a raw handle.
    NewHandleWrapper { wrapper: QualifiedName, raw: Box<Expr> },
    /// Reference to `local` when `param` has a value, otherwise a
    /// non-dereferenceable reference to `ty`.
    OptionalRef { param: String, local: String, ty: TypeExpr },
    /// Value of an optional parameter, or the type's default.
    ValueOrDefault(String),
    Integer(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    DeclareLocal {
        name: String,
        ty: TypeExpr,
        init: Option<Expr>,
    },
    /// Raise an argument error unless both ranges have the same length.
    CheckLengthsEqual { first: String, second: String },
    /// Raise an argument error if the range is shorter than `min`.
    CheckMinLength { param: String, min: u32 },
    /// Raise an argument error unless the range contains a terminator.
    CheckTerminated { param: String },
    /// Encode a string into a transient narrow buffer.
    EncodeNarrow { param: String, local: String },
    /// Add a reference to an optional handle wrapper and copy its raw value
    /// into `local`, or store `fallback` when the wrapper is absent.
    BorrowHandle {
        handle: String,
        added: String,
        local: String,
        fallback: i64,
    },
    /// Release a reference taken by [`Statement::BorrowHandle`].
    ReleaseHandle { handle: String, added: String },
    Assign { target: String, value: Expr },
    /// Shrink a character range to the buffer's null-terminated length.
    Reslice { param: String, width: CharWidth },
    Call {
        result: Option<String>,
        function: String,
        args: Vec<Expr>,
    },
    Return(Option<Expr>),
    Fixed {
        binding: FixedBinding,
        body: Vec<Statement>,
    },
    TryFinally {
        body: Vec<Statement>,
        finally: Vec<Statement>,
    },
}

impl Statement {
    /// Validation that rejects a caller's arguments before any state changes.
    pub fn is_argument_check(&self) -> bool {
        matches!(
            self,
            Statement::CheckLengthsEqual { .. }
                | Statement::CheckMinLength { .. }
                | Statement::CheckTerminated { .. }
        )
    }
}

/// Storage pinned for the duration of the call, exposed as a raw pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedBinding {
    pub local: String,
    pub ty: TypeExpr,
    pub source: FixedSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedSource {
    /// First element of a range (null when empty).
    Slice(String),
    /// Characters of a string parameter (null when absent).
    Str(String),
    /// A by-reference parameter.
    Ref(String),
    /// A local buffer.
    Local(String),
}

/// Success convention of a release function's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseSuccess {
    /// Boolean; true means released.
    True,
    /// 32-bit status; zero means released.
    Zero,
    /// 8-bit status; non-zero means released.
    NonZero,
    /// No return value; release always succeeds.
    Always,
}

impl ReleaseSuccess {
    pub fn succeeded(&self, value: i64) -> bool {
        match self {
            Self::True | Self::NonZero => value != 0,
            Self::Zero => value == 0,
            Self::Always => true,
        }
    }
}

/// An owning wrapper type bound to one release function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleWrapperSpec {
    pub release: QualifiedName,
    /// Handle typedef the release function takes, if it takes one.
    pub handle_type: Option<QualifiedName>,
    /// Raw representation passed to the release function.
    pub raw: TypeExpr,
    /// Every registered sentinel, in declaration order.
    pub sentinels: Vec<i64>,
    pub members: Vec<WrapperMember>,
}

impl HandleWrapperSpec {
    /// Preferred sentinel: the value new wrappers start with.
    pub fn invalid_value(&self) -> i64 {
        self.members
            .iter()
            .find_map(|m| match m {
                WrapperMember::SentinelConstant { value, .. } => Some(*value),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Whether a raw value is one of the registered sentinels.
    pub fn is_invalid(&self, raw: i64) -> bool {
        self.sentinels.contains(&raw)
    }

    pub fn success(&self) -> Option<ReleaseSuccess> {
        self.members.iter().find_map(|m| match m {
            WrapperMember::ReleaseOverride { success, .. } => Some(*success),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperMember {
    SentinelConstant { name: String, value: i64 },
    /// Starts out holding the sentinel.
    DefaultConstructor { initial: i64 },
    FromRaw { owns_handle: bool },
    /// True for every listed sentinel; never true when the list is empty.
    IsInvalid { sentinels: Vec<i64> },
    ReleaseOverride {
        function: QualifiedName,
        success: ReleaseSuccess,
    },
}
