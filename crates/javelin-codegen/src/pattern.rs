//! Array and object destructuring.
//!
//! Patterns are compiled against a value already on the operand stack.
//! Every variable a pattern binds is declared first; extraction code is
//! emitted in a second walk over the same tree.

use javelin_types::{class, desc, object_descriptor};
use swc_common::{Span, Spanned};
use swc_ecma_ast as ast;

use crate::context::MethodContext;
use crate::conversion;
use crate::error::{CodegenError, Result};
use crate::opcodes::*;
use crate::resolver::{element_annotation, prop_name, Resolver};

/// A variable introduced by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub descriptor: String,
    pub span: Span,
}

/// Variables bound by `pat`, left to right, depth-first. `annotation`
/// types the value being destructured when the pattern carries no
/// annotation of its own.
pub fn collect_bindings(
    resolver: &Resolver<'_>,
    pat: &ast::Pat,
    annotation: Option<&ast::TsType>,
) -> Result<Vec<Binding>> {
    let mut out = Vec::new();
    collect_into(resolver, pat, annotation, &mut out)?;
    Ok(out)
}

fn collect_into(
    resolver: &Resolver<'_>,
    pat: &ast::Pat,
    annotation: Option<&ast::TsType>,
    out: &mut Vec<Binding>,
) -> Result<()> {
    match pat {
        ast::Pat::Ident(binding) => {
            let descriptor = match (&binding.type_ann, annotation) {
                (Some(ann), _) => resolver.map_ts_type(&ann.type_ann),
                (None, Some(ann)) => resolver.map_ts_type(ann),
                (None, None) => desc::OBJECT.to_string(),
            };
            out.push(Binding {
                name: binding.id.sym.to_string(),
                descriptor,
                span: binding.id.span,
            });
        }
        ast::Pat::Assign(assign) => collect_into(resolver, &assign.left, annotation, out)?,
        ast::Pat::Array(array) => {
            let annotation = array.type_ann.as_deref().map(|a| &*a.type_ann).or(annotation);
            let element = annotation.and_then(element_annotation);
            for elem in array.elems.iter().flatten() {
                match elem {
                    ast::Pat::Rest(rest) => out.push(rest_binding(rest, desc::ARRAY_LIST)?),
                    other => collect_into(resolver, other, element, out)?,
                }
            }
        }
        ast::Pat::Object(object) => {
            let annotation = object.type_ann.as_deref().map(|a| &*a.type_ann).or(annotation);
            for prop in &object.props {
                match prop {
                    ast::ObjectPatProp::KeyValue(kv) => {
                        let key = prop_name(&kv.key);
                        let nested = annotation.and_then(|ann| property_annotation(ann, key.as_deref()));
                        collect_into(resolver, &kv.value, nested, out)?;
                    }
                    ast::ObjectPatProp::Assign(assign) => {
                        let name = assign.key.id.sym.to_string();
                        let descriptor = match &assign.key.type_ann {
                            Some(ann) => resolver.map_ts_type(&ann.type_ann),
                            None => annotation
                                .and_then(|ann| property_annotation(ann, Some(&name)))
                                .map(|t| resolver.map_ts_type(t))
                                .unwrap_or_else(|| desc::OBJECT.to_string()),
                        };
                        out.push(Binding {
                            name,
                            descriptor,
                            span: assign.key.id.span,
                        });
                    }
                    ast::ObjectPatProp::Rest(rest) => {
                        out.push(rest_binding(rest, desc::LINKED_HASH_MAP)?)
                    }
                }
            }
        }
        ast::Pat::Rest(rest) => out.push(rest_binding(rest, desc::ARRAY_LIST)?),
        ast::Pat::Expr(expr) => {
            return Err(CodegenError::unsupported_pattern("expression in binding position", expr.span()))
        }
        ast::Pat::Invalid(invalid) => {
            return Err(CodegenError::unsupported_pattern("invalid pattern", invalid.span))
        }
    }
    Ok(())
}

fn rest_binding(rest: &ast::RestPat, descriptor: &str) -> Result<Binding> {
    match &*rest.arg {
        ast::Pat::Ident(binding) => Ok(Binding {
            name: binding.id.sym.to_string(),
            descriptor: descriptor.to_string(),
            span: binding.id.span,
        }),
        _ => Err(CodegenError::InvalidRestTarget { span: rest.span }),
    }
}

/// Type of property `key` of a value annotated `ts_type`: the member's
/// annotation in a type literal, else the map value type.
fn property_annotation<'t>(ts_type: &'t ast::TsType, key: Option<&str>) -> Option<&'t ast::TsType> {
    if let (ast::TsType::TsTypeLit(lit), Some(key)) = (ts_type, key) {
        return lit.members.iter().find_map(|member| match member {
            ast::TsTypeElement::TsPropertySignature(sig) => match &*sig.key {
                ast::Expr::Ident(ident) if &*ident.sym == key => {
                    sig.type_ann.as_deref().map(|a| &*a.type_ann)
                }
                _ => None,
            },
            _ => None,
        });
    }
    element_annotation(ts_type)
}

impl MethodContext<'_> {
    /// Declare the variables of `pat`, then destructure the value on top of
    /// the stack into them.
    pub fn gen_pattern(&mut self, pat: &ast::Pat, annotation: Option<&ast::TsType>) -> Result<()> {
        let bindings = collect_bindings(&self.resolver(), pat, annotation)?;
        for binding in &bindings {
            self.locals.declare(&binding.name, &binding.descriptor);
        }
        log::trace!(
            "pattern binds [{}]",
            bindings.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.extract(pat)
    }

    fn extract(&mut self, pat: &ast::Pat) -> Result<()> {
        match pat {
            ast::Pat::Ident(binding) => self.store_extracted(&binding.id.sym, binding.id.span),
            ast::Pat::Assign(assign) => self.extract(&assign.left),
            ast::Pat::Array(array) => self.extract_array(array),
            ast::Pat::Object(object) => self.extract_object(object),
            ast::Pat::Rest(rest) => Err(CodegenError::unsupported_pattern("rest element outside of a pattern", rest.span)),
            ast::Pat::Expr(expr) => Err(CodegenError::unsupported_pattern("expression in binding position", expr.span())),
            ast::Pat::Invalid(invalid) => Err(CodegenError::unsupported_pattern("invalid pattern", invalid.span)),
        }
    }

    /// Value on the stack is an `Object` fresh out of a collection.
    fn store_extracted(&mut self, name: &str, span: Span) -> Result<()> {
        let local = self
            .locals
            .lookup(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnknownVariable {
                name: name.to_string(),
                span,
            })?;
        conversion::unbox_or_cast(&mut self.code, self.pool, &local.descriptor)?;
        self.code.store(&local.descriptor, local.slot);
        Ok(())
    }

    fn local_slot(&self, name: &str, span: Span) -> Result<u16> {
        self.locals
            .lookup(name)
            .map(|local| local.slot)
            .ok_or_else(|| CodegenError::UnknownVariable {
                name: name.to_string(),
                span,
            })
    }

    fn list_get(&mut self) -> Result<()> {
        self.invoke_interface(class::LIST, "get", "(I)Ljava/lang/Object;")
    }

    fn extract_array(&mut self, array: &ast::ArrayPat) -> Result<()> {
        self.checkcast(class::LIST);
        let list = self.locals.temp("tempList", desc::LIST);
        self.code.astore(list);

        for (index, elem) in array.elems.iter().enumerate() {
            let elem = match elem {
                Some(elem) => elem,
                None => continue,
            };
            if let ast::Pat::Rest(rest) = elem {
                self.extract_array_rest(list, index as i32, rest)?;
                continue;
            }
            self.code.aload(list);
            self.iconst(index as i32);
            self.list_get()?;
            self.extract(elem)?;
        }
        Ok(())
    }

    /// `rest = new ArrayList(); for (i = start; i < size; i++) rest.add(list.get(i))`
    fn extract_array_rest(&mut self, list: u16, start: i32, rest: &ast::RestPat) -> Result<()> {
        let target = rest_binding(rest, desc::ARRAY_LIST)?;
        let rest_slot = self.local_slot(&target.name, target.span)?;

        self.new_instance(class::ARRAY_LIST)?;
        self.code.astore(rest_slot);

        self.code.aload(list);
        self.invoke_interface(class::LIST, "size", "()I")?;
        let size = self.locals.temp("size", desc::INT);
        self.code.istore(size);
        self.iconst(start);
        let index = self.locals.temp("index", desc::INT);
        self.code.istore(index);

        let head = self.code.offset();
        self.code.iload(index);
        self.code.iload(size);
        let exit = self.code.branch(IF_ICMPGE);

        self.code.aload(rest_slot);
        self.code.aload(list);
        self.code.iload(index);
        self.list_get()?;
        self.invoke(INVOKEVIRTUAL, class::ARRAY_LIST, "add", "(Ljava/lang/Object;)Z")?;
        self.code.pop_value(desc::BOOLEAN);
        self.code.iinc(index, 1);
        self.code.goto_back(head);
        self.code.resolve(exit);
        Ok(())
    }

    fn extract_object(&mut self, object: &ast::ObjectPat) -> Result<()> {
        self.checkcast(class::MAP);
        let map = self.locals.temp("tempMap", desc::MAP);
        self.code.astore(map);

        let mut extracted: Vec<String> = Vec::new();
        for prop in &object.props {
            match prop {
                ast::ObjectPatProp::KeyValue(kv) => {
                    let key = prop_name(&kv.key).ok_or_else(|| {
                        CodegenError::unsupported_pattern("computed property key", kv.key.span())
                    })?;
                    self.map_get(map, &key)?;
                    extracted.push(key);
                    self.extract(&kv.value)?;
                }
                ast::ObjectPatProp::Assign(assign) => {
                    // The default value is not applied
                    let key = assign.key.id.sym.to_string();
                    self.map_get(map, &key)?;
                    self.store_extracted(&key, assign.key.id.span)?;
                    extracted.push(key);
                }
                ast::ObjectPatProp::Rest(rest) => self.extract_object_rest(map, &extracted, rest)?,
            }
        }
        Ok(())
    }

    fn map_get(&mut self, map: u16, key: &str) -> Result<()> {
        self.code.aload(map);
        self.ldc_string(key);
        self.invoke_interface(class::MAP, "get", "(Ljava/lang/Object;)Ljava/lang/Object;")
    }

    /// Copy every entry whose key was not extracted into a fresh
    /// `LinkedHashMap`, preserving iteration order.
    fn extract_object_rest(&mut self, map: u16, extracted: &[String], rest: &ast::RestPat) -> Result<()> {
        let target = rest_binding(rest, desc::LINKED_HASH_MAP)?;
        let rest_slot = self.local_slot(&target.name, target.span)?;

        self.new_instance(class::LINKED_HASH_MAP)?;
        self.code.astore(rest_slot);

        self.code.aload(map);
        self.invoke_interface(class::MAP, "entrySet", "()Ljava/util/Set;")?;
        self.invoke_interface(class::SET, "iterator", "()Ljava/util/Iterator;")?;
        let iterator = self.locals.temp("iterator", &object_descriptor(class::ITERATOR));
        self.code.astore(iterator);

        let head = self.code.offset();
        self.code.aload(iterator);
        self.invoke_interface(class::ITERATOR, "hasNext", "()Z")?;
        let exit = self.code.branch(IFEQ);

        self.code.aload(iterator);
        self.invoke_interface(class::ITERATOR, "next", "()Ljava/lang/Object;")?;
        self.checkcast(class::MAP_ENTRY);
        let entry = self.locals.temp("entry", &object_descriptor(class::MAP_ENTRY));
        self.code.astore(entry);

        self.code.aload(entry);
        self.invoke_interface(class::MAP_ENTRY, "getKey", "()Ljava/lang/Object;")?;
        let key = self.locals.temp("key", desc::OBJECT);
        self.code.astore(key);

        for name in extracted {
            self.code.aload(key);
            self.ldc_string(name);
            self.invoke(INVOKEVIRTUAL, class::OBJECT, "equals", "(Ljava/lang/Object;)Z")?;
            self.code.branch_back(IFNE, head);
        }

        self.code.aload(rest_slot);
        self.code.aload(key);
        self.code.aload(entry);
        self.invoke_interface(class::MAP_ENTRY, "getValue", "()Ljava/lang/Object;")?;
        self.invoke(
            INVOKEVIRTUAL,
            class::LINKED_HASH_MAP,
            "put",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
        )?;
        self.code.pop_value(desc::OBJECT);
        self.code.goto_back(head);
        self.code.resolve(exit);
        Ok(())
    }
}
