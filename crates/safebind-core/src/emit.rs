//! Declaration emitters.
//!
//! One emitter per entity kind. Each maps its entity's types under the
//! settings for its call site, requests every declaration those types
//! refer to, and returns the neutral declaration.

use safebind_meta::model::{
    CallbackDef, CallingConvention, ConstantDef, EnumDef, FunctionDef, InterfaceDef, Layout,
    MacroDef, StructDef, TypedefDef,
};
use safebind_meta::signature::decode_params;
use safebind_meta::{ParameterDescriptor, QualifiedName, TypeDescriptor, TypeEntity, TypeRef};

use crate::decl::{
    CallbackDecl, ConstantDecl, Declaration, EnumDecl, FieldDecl, FunctionDecl, InlineArrayDecl,
    InterfaceDecl, InterfaceMethod, Item, MacroDecl, ParamDecl, StructDecl, TypedefDecl,
};
use crate::error::{GenerationError, Result};
use crate::friendly::{self, FriendlyInput};
use crate::generator::{Generator, INLINE_ARRAY_NAMESPACE};
use crate::mapping::{map_type, MappedType, MappingAttributes, MappingSettings, ParameterModifier, TypeExpr};
use crate::store::{self, EntityId};

impl Generator<'_> {
    pub(crate) fn emit_type(&mut self, name: &QualifiedName) -> Result<Declaration> {
        let query = self.query;
        let resolved = query
            .type_by_name(name)
            .ok_or_else(|| GenerationError::UnresolvedReference {
                reference: name.to_string(),
            })?;
        let item = match resolved.entity {
            TypeEntity::Struct(def) => Item::Struct(self.emit_struct(name, def)?),
            TypeEntity::Enum(def) => Item::Enum(self.emit_enum(name, def)?),
            TypeEntity::Typedef(def) => Item::Typedef(self.emit_typedef(name, def)?),
            TypeEntity::Interface(def) => Item::Interface(self.emit_interface(name, def)?),
            TypeEntity::Callback(def) => Item::Callback(self.emit_callback(name, def)?),
        };
        Ok(self.declaration_of(name.clone(), item))
    }

    fn emit_struct(&mut self, name: &QualifiedName, def: &StructDef) -> Result<StructDecl> {
        let query = self.query;
        let mut settings = MappingSettings::field(&self.options);
        // Overlapping fields cannot be marshaled.
        if def.layout == Layout::Explicit {
            settings = settings.without_marshaling();
        }
        let managed = self.managed.is_managed(query, name);

        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let descriptor = if field.is_const {
                field.ty.with_constant_field()
            } else {
                (&field.ty).into()
            };
            let attrs = MappingAttributes {
                namespace: Some(name.namespace.as_str()),
                is_const: field.is_const,
                string: field.string,
                ..Default::default()
            };
            let mapped = map_type(query, &mut self.managed, descriptor, &settings, &attrs)?;
            self.require_expr(&mapped.ty)?;
            let ty = match mapped.ty {
                TypeExpr::FixedArray { element, length } if mapped.marshal.is_none() => {
                    self.request_inline_array(*element, length)?
                }
                other => other,
            };
            fields.push(FieldDecl {
                name: field.name.clone(),
                ty,
                marshal: mapped.marshal,
            });
        }

        Ok(StructDecl {
            layout: def.layout,
            pack: def.pack,
            fields,
            flexible_array: def.flexible_array,
            managed,
        })
    }

    /// The shared helper type for one inline array shape.
    fn request_inline_array(&mut self, element: TypeExpr, length: u32) -> Result<TypeExpr> {
        let shape = TypeExpr::FixedArray {
            element: Box::new(element.clone()),
            length,
        };
        let name = QualifiedName::new(INLINE_ARRAY_NAMESPACE, format!("__{}", shape.key()));
        let id = EntityId::InlineArray {
            element: element.key(),
            length,
        };
        store::request(self, id, |g| {
            Ok(g.declaration_of(
                name.clone(),
                Item::InlineArray(InlineArrayDecl { element, length }),
            ))
        })?;
        Ok(TypeExpr::named(name))
    }

    fn emit_enum(&mut self, name: &QualifiedName, def: &EnumDef) -> Result<EnumDecl> {
        let settings = MappingSettings::constant(&self.options);
        let underlying = self.map_value(&name.namespace, &def.underlying, &settings)?;
        Ok(EnumDecl {
            underlying,
            flags: def.flags,
            members: def.members.clone(),
        })
    }

    fn emit_typedef(&mut self, name: &QualifiedName, def: &TypedefDef) -> Result<TypedefDecl> {
        let query = self.query;
        let settings = MappingSettings::field(&self.options).without_marshaling();
        let underlying = self.map_value(&name.namespace, &def.underlying, &settings)?;

        let also_usable_for = match &def.also_usable_for {
            Some(text) => {
                let resolved = query
                    .resolve_type(&TypeRef::parse(text), Some(&name.namespace))
                    .ok_or_else(|| GenerationError::UnresolvedReference {
                        reference: text.clone(),
                    })?;
                self.request_type(&resolved.name)?;
                Some(resolved.name)
            }
            None => None,
        };

        Ok(TypedefDecl {
            underlying,
            kind: def.kind,
            also_usable_for,
        })
    }

    fn emit_interface(&mut self, name: &QualifiedName, def: &InterfaceDef) -> Result<InterfaceDecl> {
        let query = self.query;
        let namespace = name.namespace.as_str();

        let base = match &def.base {
            Some(descriptor) => {
                let reference = descriptor.type_ref().ok_or_else(|| {
                    GenerationError::failed(name, "base interface must be a named type")
                })?;
                let resolved = query.resolve_type(reference, Some(namespace)).ok_or_else(|| {
                    GenerationError::UnresolvedReference {
                        reference: reference.to_string(),
                    }
                })?;
                if !matches!(resolved.entity, TypeEntity::Interface(_)) {
                    return Err(GenerationError::failed(
                        name,
                        format!("base '{}' is not an interface", resolved.name),
                    ));
                }
                self.request_type(&resolved.name)?;
                Some(resolved.name)
            }
            None => None,
        };

        let settings = MappingSettings::com_signature(&self.options);
        let mut methods = Vec::with_capacity(def.methods.len());
        for method in &def.methods {
            let owner = format!("{name}.{}", method.name);
            let signature = query
                .decode_signature(method)
                .map_err(|e| GenerationError::from_metadata(&owner, e))?;
            let preserve_sig =
                self.options
                    .com_interop
                    .preserves_sig(namespace, &name.name, &method.name);
            let mut params = self.map_params(namespace, &signature.params, &settings)?;
            let ret = self.map_return(namespace, &signature.return_type, &settings)?.ty;

            // Failing status codes surface as errors; a trailing retval
            // parameter becomes the return value.
            let ret = if preserve_sig || !is_status_code(&signature.return_type) {
                ret
            } else {
                match signature.params.last() {
                    Some(last) if last.flags.retval => match params.pop() {
                        Some(param) => retval_type(param),
                        None => TypeExpr::void(),
                    },
                    _ => TypeExpr::void(),
                }
            };

            methods.push(InterfaceMethod {
                name: method.name.clone(),
                params,
                ret,
                preserve_sig,
            });
        }

        Ok(InterfaceDecl {
            iid: def.iid,
            base,
            methods,
        })
    }

    fn emit_callback(&mut self, name: &QualifiedName, def: &CallbackDef) -> Result<CallbackDecl> {
        let params = decode_params(&def.name, &def.params)
            .map_err(|e| GenerationError::from_metadata(name, e))?;
        let settings = MappingSettings::delegate(&self.options);
        let params = self.map_params(&name.namespace, &params, &settings)?;
        let ret = self.map_return(&name.namespace, &def.returns, &settings)?.ty;
        Ok(CallbackDecl { params, ret })
    }

    pub(crate) fn emit_constant(
        &mut self,
        name: &QualifiedName,
        def: &ConstantDef,
    ) -> Result<Declaration> {
        let settings = MappingSettings::constant(&self.options);
        let ty = self.map_value(&name.namespace, &def.ty, &settings)?;
        let item = Item::Constant(ConstantDecl {
            ty,
            value: def.value.clone(),
        });
        Ok(self.declaration_of(name.clone(), item))
    }

    pub(crate) fn emit_macro(&mut self, name: &QualifiedName, def: &MacroDef) -> Result<Declaration> {
        let params = decode_params(&def.name, &def.params)
            .map_err(|e| GenerationError::from_metadata(name, e))?;
        let settings = MappingSettings::constant(&self.options);
        let params = self.map_params(&name.namespace, &params, &settings)?;
        let ret = self.map_value(&name.namespace, &def.returns, &settings)?;
        let item = Item::Macro(MacroDecl {
            params,
            ret,
            body: def.body.clone(),
        });
        Ok(self.declaration_of(name.clone(), item))
    }

    pub(crate) fn emit_function(
        &mut self,
        name: &QualifiedName,
        function: &FunctionDef,
    ) -> Result<Declaration> {
        let query = self.query;
        let namespace = name.namespace.as_str();
        if function.calling_convention == CallingConvention::Thiscall {
            return Err(GenerationError::unsupported(
                name,
                "thiscall is only valid for interface methods",
            ));
        }

        let signature = query
            .decode_signature(function)
            .map_err(|e| GenerationError::from_metadata(name, e))?;
        let settings = MappingSettings::parameter(&self.options);
        let params = self.map_params(namespace, &signature.params, &settings)?;
        let ret = self.map_return(namespace, &signature.return_type, &settings)?;

        let options = self.options.clone();
        let input = FriendlyInput {
            query,
            options: &options,
            method: name,
            signature: &signature,
            params: &params,
            ret: &ret.ty,
        };
        let friendly = friendly::synthesize(&input, self)?;

        let item = Item::Function(FunctionDecl {
            library: function.library.clone(),
            calling_convention: function.calling_convention,
            set_last_error: function.set_last_error,
            params,
            ret: ret.ty,
            ret_marshal: ret.marshal,
            friendly,
        });
        Ok(self.declaration_of(name.clone(), item))
    }

    /// Map a type in value position (no parameter attributes).
    fn map_value(
        &mut self,
        namespace: &str,
        descriptor: &TypeDescriptor,
        settings: &MappingSettings,
    ) -> Result<TypeExpr> {
        let attrs = MappingAttributes {
            namespace: Some(namespace),
            ..Default::default()
        };
        let mapped = map_type(self.query, &mut self.managed, descriptor.into(), settings, &attrs)?;
        self.require_expr(&mapped.ty)?;
        Ok(mapped.ty)
    }

    /// Return values pass by value; by-reference or array mappings fall back
    /// to the raw representation.
    fn map_return(
        &mut self,
        namespace: &str,
        descriptor: &TypeDescriptor,
        settings: &MappingSettings,
    ) -> Result<MappedType> {
        let attrs = MappingAttributes {
            namespace: Some(namespace),
            ..Default::default()
        };
        let mut mapped = map_type(self.query, &mut self.managed, descriptor.into(), settings, &attrs)?;
        if mapped.modifier.is_some() || matches!(mapped.ty, TypeExpr::Array(_)) {
            let raw = settings.without_marshaling();
            mapped = map_type(self.query, &mut self.managed, descriptor.into(), &raw, &attrs)?;
        }
        self.require_expr(&mapped.ty)?;
        Ok(mapped)
    }

    fn map_params(
        &mut self,
        namespace: &str,
        params: &[ParameterDescriptor],
        settings: &MappingSettings,
    ) -> Result<Vec<ParamDecl>> {
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let attrs = MappingAttributes {
                namespace: Some(namespace),
                direction: Some(param.flags.direction()),
                is_const: param.flags.is_const,
                string: param.string,
                array_length: param.array_length,
            };
            let mapped = map_type(self.query, &mut self.managed, (&param.ty).into(), settings, &attrs)?;
            self.require_expr(&mapped.ty)?;
            out.push(ParamDecl {
                name: param.name.clone(),
                ty: mapped.ty,
                modifier: mapped.modifier,
                marshal: mapped.marshal,
                optional: param.flags.optional,
            });
        }
        Ok(out)
    }
}

/// COM status return (`HRESULT`).
fn is_status_code(descriptor: &TypeDescriptor) -> bool {
    descriptor
        .type_ref()
        .is_some_and(|reference| reference.name == "HRESULT")
}

fn retval_type(param: ParamDecl) -> TypeExpr {
    match (param.modifier, param.ty) {
        (Some(ParameterModifier::Out | ParameterModifier::Ref), ty) => ty,
        (_, TypeExpr::Pointer { pointee, .. }) => *pointee,
        (_, TypeExpr::Array(element)) => *element,
        (_, ty) => ty,
    }
}
