//! Parameter and method signature descriptors.
//!
//! Decoding turns the per-parameter annotations of a [`FunctionDef`] into a
//! [`MethodSignature`]: named count parameters become indices, sequence numbers
//! are assigned 1-based, and the whole signature is validated before the
//! generator ever sees it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;
use crate::error::{MetaError, Result};
use crate::model::{FunctionDef, ParamDef};

/// A single direction/shape annotation as written in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamFlag {
    In,
    Out,
    Optional,
    Const,
    Reserved,
    Retval,
    ComOutPtr,
}

/// Decoded parameter annotations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ParamFlag>", into = "Vec<ParamFlag>")]
pub struct ParamFlags {
    pub input: bool,
    pub output: bool,
    pub optional: bool,
    pub is_const: bool,
    pub reserved: bool,
    pub retval: bool,
    pub com_out_ptr: bool,
}

/// Effective data-flow direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl ParamFlags {
    /// Direction with defaulting applied: no explicit direction means both,
    /// unless the parameter is `const`, which means input-only.
    pub fn direction(&self) -> Direction {
        match (self.input, self.output) {
            (true, true) => Direction::InOut,
            (true, false) => Direction::In,
            (false, true) => Direction::Out,
            (false, false) if self.is_const => Direction::In,
            (false, false) => Direction::InOut,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self.direction(), Direction::In | Direction::InOut)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.direction(), Direction::Out | Direction::InOut)
    }

    pub fn is_input_only(&self) -> bool {
        self.direction() == Direction::In
    }
}

impl From<Vec<ParamFlag>> for ParamFlags {
    fn from(flags: Vec<ParamFlag>) -> Self {
        let mut out = ParamFlags::default();
        for flag in flags {
            match flag {
                ParamFlag::In => out.input = true,
                ParamFlag::Out => out.output = true,
                ParamFlag::Optional => out.optional = true,
                ParamFlag::Const => out.is_const = true,
                ParamFlag::Reserved => out.reserved = true,
                ParamFlag::Retval => out.retval = true,
                ParamFlag::ComOutPtr => out.com_out_ptr = true,
            }
        }
        out
    }
}

impl From<ParamFlags> for Vec<ParamFlag> {
    fn from(flags: ParamFlags) -> Self {
        let mut out = Vec::new();
        let pairs = [
            (flags.input, ParamFlag::In),
            (flags.output, ParamFlag::Out),
            (flags.optional, ParamFlag::Optional),
            (flags.is_const, ParamFlag::Const),
            (flags.reserved, ParamFlag::Reserved),
            (flags.retval, ParamFlag::Retval),
            (flags.com_out_ptr, ParamFlag::ComOutPtr),
        ];
        for (set, flag) in pairs {
            if set {
                out.push(flag);
            }
        }
        out
    }
}

/// Character width of a null-terminated string annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CharWidth {
    /// 8-bit code units.
    Narrow,
    /// UTF-16 code units.
    Wide,
}

/// Relationship between an array parameter and its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayLength {
    /// Zero-based index of the parameter holding the element count.
    CountParam(usize),
    /// Fixed compile-time element count.
    CountConst(u32),
}

/// A decoded parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// 1-based position; 0 is reserved for the return slot.
    pub sequence: u16,
    pub name: String,
    pub ty: TypeDescriptor,
    pub flags: ParamFlags,
    pub array_length: Option<ArrayLength>,
    /// Null-terminated string annotation.
    pub string: Option<CharWidth>,
}

impl ParameterDescriptor {
    /// Zero-based index into the parameter list.
    pub fn index(&self) -> usize {
        usize::from(self.sequence) - 1
    }
}

/// Attributes attached to the return slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReturnAttributes {
    pub is_const: bool,
    pub string: Option<CharWidth>,
    /// Release function for a returned handle that is not typed as a handle typedef.
    pub release_with: Option<String>,
}

/// A decoded method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub params: Vec<ParameterDescriptor>,
    pub return_type: TypeDescriptor,
    pub return_attrs: ReturnAttributes,
}

impl MethodSignature {
    /// Decode a function definition's parameters and annotations.
    pub fn decode(function: &FunctionDef) -> Result<Self> {
        let signature = Self {
            params: decode_params(&function.name, &function.params)?,
            return_type: function.returns.clone(),
            return_attrs: function.return_attrs.clone(),
        };
        signature.validate(&function.name)?;
        Ok(signature)
    }

    /// Check sequence numbering and count-parameter references.
    pub fn validate(&self, function: &str) -> Result<()> {
        for (i, param) in self.params.iter().enumerate() {
            if usize::from(param.sequence) != i + 1 {
                return Err(MetaError::InvalidSignature {
                    function: function.to_string(),
                    detail: format!(
                        "parameter '{}' has sequence {} but is at position {}",
                        param.name,
                        param.sequence,
                        i + 1
                    ),
                });
            }
            if let Some(ArrayLength::CountParam(idx)) = param.array_length {
                if idx >= self.params.len() || idx == i {
                    return Err(MetaError::InvalidSignature {
                        function: function.to_string(),
                        detail: format!(
                            "parameter '{}' names an invalid count parameter (index {idx})",
                            param.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameters that name `index` as their count parameter.
    pub fn arrays_counted_by(&self, index: usize) -> impl Iterator<Item = &ParameterDescriptor> {
        self.params
            .iter()
            .filter(move |p| p.array_length == Some(ArrayLength::CountParam(index)))
    }
}

/// Decode a parameter list (shared by functions, interface methods and callbacks).
pub fn decode_params(owner: &str, params: &[ParamDef]) -> Result<Vec<ParameterDescriptor>> {
    let positions: HashMap<&str, usize> = params
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.as_str(), i))
        .collect();

    let mut out = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let array_length = match (&param.count_param, param.count_const) {
            (Some(_), Some(_)) => {
                return Err(MetaError::InvalidSignature {
                    function: owner.to_string(),
                    detail: format!(
                        "parameter '{}' declares both count-param and count-const",
                        param.name
                    ),
                });
            }
            (Some(name), None) => {
                let idx = positions.get(name.as_str()).copied().ok_or_else(|| {
                    MetaError::InvalidSignature {
                        function: owner.to_string(),
                        detail: format!(
                            "parameter '{}' names unknown count parameter '{name}'",
                            param.name
                        ),
                    }
                })?;
                Some(ArrayLength::CountParam(idx))
            }
            (None, Some(n)) => Some(ArrayLength::CountConst(n)),
            (None, None) => None,
        };

        let sequence = u16::try_from(i + 1).map_err(|_| MetaError::InvalidSignature {
            function: owner.to_string(),
            detail: "too many parameters".to_string(),
        })?;

        out.push(ParameterDescriptor {
            sequence,
            name: param.name.clone(),
            ty: param.ty.clone(),
            flags: param.flags,
            array_length,
            string: param.string,
        });
    }
    Ok(out)
}
