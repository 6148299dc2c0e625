//! Whole-module compilation.
//!
//! A module becomes one classfile per class declaration, interface and
//! anonymous class expression, plus a module class holding the free
//! functions and a `main` built from the top-level statements.
//!
//! Compilation runs in three passes over the module:
//! 1. every class name is registered, so annotations can refer to classes
//!    declared later in the file;
//! 2. full [`TypeInfo`]s (parents, fields, method descriptors) are built;
//!    this runs twice so return types inferred from calls see every
//!    member signature;
//! 3. each unit is emitted.

use std::collections::HashMap;
use std::path::PathBuf;

use javelin_types::{
    class, desc, internal_name_of, is_primitive, is_reference, object_descriptor, wrapper_of,
    MethodDescriptor, ReturnType,
};
use swc_common::{Span, Spanned};
use swc_ecma_ast as ast;

use crate::class_writer::{access, ClassWriter};
use crate::context::{ClassContext, MethodContext};
use crate::error::{CodegenError, Result};
use crate::opcodes::*;
use crate::options::CompilerOptions;
use crate::pattern::collect_bindings;
use crate::registry::{TypeInfo, TypeRegistry};
use crate::resolver::{prop_name, FunctionBody, Resolver};

const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// One generated class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub internal_name: String,
    pub bytes: Vec<u8>,
}

impl ClassFile {
    /// `com/example/Point` -> `com/example/Point.class`
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.internal_name.split('/').collect();
        path.set_extension("class");
        path
    }
}

/// A top-level statement of the module, or an exported declaration that
/// behaves like one.
#[derive(Debug, Clone, Copy)]
enum TopLevel<'m> {
    Stmt(&'m ast::Stmt),
    Decl(&'m ast::Decl),
}

impl TopLevel<'_> {
    fn to_stmt(self) -> ast::Stmt {
        match self {
            TopLevel::Stmt(stmt) => stmt.clone(),
            TopLevel::Decl(decl) => ast::Stmt::Decl(decl.clone()),
        }
    }
}

#[derive(Debug)]
enum UnitKind<'m> {
    Class(&'m ast::Class),
    Interface(&'m ast::TsInterfaceDecl),
    Module {
        functions: Vec<(String, &'m ast::Function)>,
        statements: Vec<TopLevel<'m>>,
    },
}

/// Something that becomes one classfile.
#[derive(Debug)]
struct Unit<'m> {
    internal_name: String,
    kind: UnitKind<'m>,
}

pub struct ModuleCompiler {
    options: CompilerOptions,
    registry: TypeRegistry,
}

impl ModuleCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            registry: TypeRegistry::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Compile every class of `module`. The first error aborts the whole
    /// module.
    pub fn compile_module(&mut self, module: &ast::Module) -> Result<Vec<ClassFile>> {
        let module_class = self.options.qualify(&self.options.module_class);
        let mut units = self.collect_units(module, &module_class)?;

        for unit in &units {
            let mut info = TypeInfo::new(&unit.internal_name);
            info.is_interface = matches!(unit.kind, UnitKind::Interface(_));
            self.registry.register(info);
        }

        let mut collector = ClassExprCollector {
            registry: &mut self.registry,
            found: Vec::new(),
        };
        for unit in &units {
            collector.unit(unit);
        }
        let anonymous = collector.found;
        units.extend(anonymous);

        for _ in 0..2 {
            for unit in &units {
                let info = self.build_type_info(unit, &module_class)?;
                self.registry.register(info);
            }
        }

        units.iter().map(|unit| self.emit(unit, &module_class)).collect()
    }

    // ---- collection ----

    fn collect_units<'m>(&self, module: &'m ast::Module, module_class: &str) -> Result<Vec<Unit<'m>>> {
        let mut units = Vec::new();
        let mut functions = Vec::new();
        let mut statements = Vec::new();

        for item in &module.body {
            match item {
                ast::ModuleItem::Stmt(ast::Stmt::Decl(decl)) => {
                    self.collect_decl(decl, &mut units, &mut functions, &mut statements)?
                }
                ast::ModuleItem::Stmt(ast::Stmt::Empty(_)) => {}
                ast::ModuleItem::Stmt(stmt) => statements.push(TopLevel::Stmt(stmt)),
                ast::ModuleItem::ModuleDecl(ast::ModuleDecl::ExportDecl(export)) => {
                    self.collect_decl(&export.decl, &mut units, &mut functions, &mut statements)?
                }
                ast::ModuleItem::ModuleDecl(ast::ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
                    ast::DefaultDecl::Class(class_expr) => {
                        let name = class_expr.ident.as_ref().ok_or_else(|| {
                            CodegenError::unsupported_statement("anonymous default export class", export.span)
                        })?;
                        units.push(Unit {
                            internal_name: self.options.qualify(&name.sym),
                            kind: UnitKind::Class(&class_expr.class),
                        });
                    }
                    ast::DefaultDecl::Fn(fn_expr) => {
                        let name = fn_expr.ident.as_ref().ok_or_else(|| {
                            CodegenError::unsupported_statement("anonymous default export function", export.span)
                        })?;
                        functions.push((name.sym.to_string(), &*fn_expr.function));
                    }
                    ast::DefaultDecl::TsInterfaceDecl(decl) => units.push(Unit {
                        internal_name: self.options.qualify(&decl.id.sym),
                        kind: UnitKind::Interface(decl),
                    }),
                },
                ast::ModuleItem::ModuleDecl(ast::ModuleDecl::ExportDefaultExpr(export)) => {
                    return Err(CodegenError::unsupported_statement(
                        "default export of an expression",
                        export.span,
                    ))
                }
                // Imports and re-exports carry no code
                ast::ModuleItem::ModuleDecl(_) => {}
            }
        }

        if !functions.is_empty() || !statements.is_empty() {
            units.push(Unit {
                internal_name: module_class.to_string(),
                kind: UnitKind::Module { functions, statements },
            });
        }
        Ok(units)
    }

    fn collect_decl<'m>(
        &self,
        decl: &'m ast::Decl,
        units: &mut Vec<Unit<'m>>,
        functions: &mut Vec<(String, &'m ast::Function)>,
        statements: &mut Vec<TopLevel<'m>>,
    ) -> Result<()> {
        match decl {
            ast::Decl::Class(class_decl) if !class_decl.declare => units.push(Unit {
                internal_name: self.options.qualify(&class_decl.ident.sym),
                kind: UnitKind::Class(&class_decl.class),
            }),
            ast::Decl::TsInterface(interface) if !interface.declare => units.push(Unit {
                internal_name: self.options.qualify(&interface.id.sym),
                kind: UnitKind::Interface(interface),
            }),
            // Overload signatures have no body
            ast::Decl::Fn(fn_decl) if !fn_decl.declare && fn_decl.function.body.is_some() => {
                functions.push((fn_decl.ident.sym.to_string(), &*fn_decl.function))
            }
            ast::Decl::Var(_) | ast::Decl::Using(_) => statements.push(TopLevel::Decl(decl)),
            ast::Decl::TsEnum(e) => return Err(CodegenError::unsupported_statement("enum declaration", e.span)),
            ast::Decl::TsModule(m) => {
                return Err(CodegenError::unsupported_statement("namespace declaration", m.span))
            }
            _ => {}
        }
        Ok(())
    }

    // ---- type information ----

    /// Internal name of a class named in `extends` or `implements`.
    /// Unknown names get a placeholder entry.
    fn parent_name(&mut self, expr: &ast::Expr) -> Result<String> {
        let name = expr_path(expr)
            .ok_or_else(|| CodegenError::unsupported_expression("computed parent class", expr.span()))?;
        if name == "Error" {
            return Ok(class::RUNTIME_EXCEPTION.to_string());
        }

        let empty = HashMap::new();
        let descriptor = Resolver::new(&self.registry, &empty).map_type_name(&name);
        match internal_name_of(&descriptor) {
            Some(internal) if internal != class::OBJECT || name == "Object" => Ok(internal.to_string()),
            _ => Ok(self.registry.resolve_or_placeholder(&name).internal_name.clone()),
        }
    }

    fn build_type_info(&mut self, unit: &Unit<'_>, module_class: &str) -> Result<TypeInfo> {
        let mut info = TypeInfo::new(&unit.internal_name);

        match &unit.kind {
            UnitKind::Class(class) => {
                let superclass = match &class.super_class {
                    Some(expr) => self.parent_name(expr)?,
                    None => self.options.default_super.clone(),
                };
                info.parents.push(superclass);
                for interface in &class.implements {
                    let parent = self.parent_name(&interface.expr)?;
                    info.parents.push(parent);
                }

                let empty = HashMap::new();
                let resolver = Resolver::new(&self.registry, &empty)
                    .with_class(&unit.internal_name)
                    .with_module_class(module_class);
                class_members(&resolver, class, &mut info)?;
            }
            UnitKind::Interface(decl) => {
                info.is_interface = true;
                for parent in &decl.extends {
                    let parent = self.parent_name(&parent.expr)?;
                    info.parents.push(parent);
                }

                let empty = HashMap::new();
                let resolver = Resolver::new(&self.registry, &empty).with_module_class(module_class);
                interface_members(&resolver, decl, &mut info)?;
            }
            UnitKind::Module { functions, statements } => {
                info.parents.push(class::OBJECT.to_string());

                let empty = HashMap::new();
                let resolver = Resolver::new(&self.registry, &empty)
                    .with_class(&unit.internal_name)
                    .with_module_class(module_class);
                for (name, function) in functions {
                    info.add_method(name.as_str(), method_descriptor(&resolver, function), true);
                }
                if let Some(first) = statements.first() {
                    if info.methods.iter().any(|m| m.name == "main") {
                        let span = match first {
                            TopLevel::Stmt(stmt) => stmt.span(),
                            TopLevel::Decl(decl) => decl.span(),
                        };
                        return Err(CodegenError::UnsupportedFeature {
                            message: "top-level statements conflict with a function named `main`".to_string(),
                            span,
                        });
                    }
                    info.add_method("main", MAIN_DESCRIPTOR, true);
                }
            }
        }
        Ok(info)
    }

    // ---- emission ----

    fn emit(&self, unit: &Unit<'_>, module_class: &str) -> Result<ClassFile> {
        log::debug!("emitting {}", unit.internal_name);
        let bytes = match &unit.kind {
            UnitKind::Class(class) => self.emit_class(unit, class, module_class)?,
            UnitKind::Interface(decl) => self.emit_interface(unit, decl)?,
            UnitKind::Module { functions, statements } => {
                self.emit_module_class(unit, functions, statements, module_class)?
            }
        };
        Ok(ClassFile {
            internal_name: unit.internal_name.clone(),
            bytes,
        })
    }

    fn unit_info(&self, unit: &Unit<'_>) -> Result<&TypeInfo> {
        self.registry
            .resolve_internal(&unit.internal_name)
            .ok_or_else(|| CodegenError::Internal(format!("{} was not registered", unit.internal_name)))
    }

    fn emit_class(&self, unit: &Unit<'_>, class: &ast::Class, module_class: &str) -> Result<Vec<u8>> {
        let info = self.unit_info(unit)?;
        let superclass = info.superclass().unwrap_or(&self.options.default_super).to_string();
        let class_ctx =
            ClassContext::new(&self.registry, &unit.internal_name, &superclass).with_module_class(module_class);

        let mut writer = ClassWriter::new(&unit.internal_name, &superclass, self.options.class_version);
        for interface in info.parents.iter().skip(1) {
            writer.add_interface(interface);
        }
        if class.is_abstract {
            writer.set_access(access::PUBLIC | access::SUPER | access::ABSTRACT);
        }
        if let Some(params) = &class.type_params {
            writer.set_signature(&self.class_signature(params, info));
        }

        emit_fields(&mut writer, info, class);
        emit_constructor(&class_ctx, &mut writer, class)?;

        for member in &class.body {
            match member {
                ast::ClassMember::Method(method) => {
                    let name = prop_name(&method.key)
                        .ok_or_else(|| CodegenError::unsupported_expression("computed method name", method.span))?;
                    if method.kind != ast::MethodKind::Method {
                        return Err(accessor_error(&name, method.span));
                    }
                    if method.function.body.is_none() && !method.is_abstract {
                        continue;
                    }
                    let flags = member_access(method.accessibility, false, method.is_static);
                    emit_method(&class_ctx, &mut writer, &name, &method.function, method.is_static, flags)?;
                }
                ast::ClassMember::PrivateMethod(method) => {
                    let name = method.key.name.to_string();
                    if method.kind != ast::MethodKind::Method {
                        return Err(accessor_error(&name, method.span));
                    }
                    let flags = member_access(None, true, method.is_static);
                    emit_method(&class_ctx, &mut writer, &name, &method.function, method.is_static, flags)?;
                }
                ast::ClassMember::AutoAccessor(accessor) => {
                    return Err(CodegenError::UnsupportedFeature {
                        message: "auto-accessor fields are not supported".to_string(),
                        span: accessor.span,
                    })
                }
                _ => {}
            }
        }

        emit_static_init(&class_ctx, &mut writer, class)?;
        writer.to_bytes()
    }

    fn emit_interface(&self, unit: &Unit<'_>, decl: &ast::TsInterfaceDecl) -> Result<Vec<u8>> {
        let info = self.unit_info(unit)?;
        let mut writer = ClassWriter::new(&unit.internal_name, class::OBJECT, self.options.class_version);
        writer.set_access(access::PUBLIC | access::INTERFACE | access::ABSTRACT);
        for parent in &info.parents {
            writer.add_interface(parent);
        }
        if let Some(params) = &decl.type_params {
            writer.set_signature(&self.class_signature(params, info));
        }
        for method in &info.methods {
            writer.add_abstract_method(access::PUBLIC, &method.name, &method.descriptor);
        }
        writer.to_bytes()
    }

    fn emit_module_class(
        &self,
        unit: &Unit<'_>,
        functions: &[(String, &ast::Function)],
        statements: &[TopLevel<'_>],
        module_class: &str,
    ) -> Result<Vec<u8>> {
        let class_ctx =
            ClassContext::new(&self.registry, &unit.internal_name, class::OBJECT).with_module_class(module_class);
        let mut writer = ClassWriter::new(&unit.internal_name, class::OBJECT, self.options.class_version);

        for (name, function) in functions {
            emit_method(
                &class_ctx,
                &mut writer,
                name,
                function,
                true,
                access::PUBLIC | access::STATIC,
            )?;
        }

        if !statements.is_empty() {
            let body: Vec<ast::Stmt> = statements.iter().map(|s| s.to_stmt()).collect();
            let mut ctx = class_ctx.method(writer.pool_mut(), true);
            ctx.locals.declare("args", "[Ljava/lang/String;");
            infer_locals(&mut ctx, &body);
            ctx.gen_body(&body)?;
            let (code, max_locals) = ctx.finish(MAIN_DESCRIPTOR)?;
            log::debug!("  main{} ({} bytes)", MAIN_DESCRIPTOR, code.bytes.len());
            writer.add_method(access::PUBLIC | access::STATIC, "main", MAIN_DESCRIPTOR, code, max_locals);
        }
        writer.to_bytes()
    }

    /// `<T:Ljava/lang/Object;>` followed by the superclass and interfaces.
    fn class_signature(&self, params: &ast::TsTypeParamDecl, info: &TypeInfo) -> String {
        let empty = HashMap::new();
        let resolver = Resolver::new(&self.registry, &empty);

        let mut signature = String::from("<");
        for param in &params.params {
            let bound = param
                .constraint
                .as_deref()
                .map(|c| resolver.map_ts_type(c))
                .filter(|d| d.starts_with('L'))
                .unwrap_or_else(|| desc::OBJECT.to_string());
            let interface_bound = internal_name_of(&bound)
                .and_then(|name| self.registry.resolve_internal(name))
                .map_or(false, |bound| bound.is_interface);

            signature.push_str(&param.name.sym);
            // Interface bounds go in the second slot
            signature.push_str(if interface_bound { "::" } else { ":" });
            signature.push_str(&bound);
        }
        signature.push('>');

        if info.is_interface {
            signature.push_str(desc::OBJECT);
        }
        for parent in &info.parents {
            signature.push_str(&object_descriptor(parent));
        }
        signature
    }
}

/// `a.b.C` for identifier and member chains.
fn expr_path(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Ident(ident) => Some(ident.sym.to_string()),
        ast::Expr::Member(member) => match &member.prop {
            ast::MemberProp::Ident(prop) => Some(format!("{}.{}", expr_path(&member.obj)?, prop.sym)),
            _ => None,
        },
        ast::Expr::Paren(paren) => expr_path(&paren.expr),
        _ => None,
    }
}

fn accessor_error(name: &str, span: Span) -> CodegenError {
    CodegenError::UnsupportedFeature {
        message: format!("accessor `{}` is not supported", name),
        span,
    }
}

fn member_access(accessibility: Option<ast::Accessibility>, is_private: bool, is_static: bool) -> u16 {
    let visibility = match accessibility {
        _ if is_private => access::PRIVATE,
        Some(ast::Accessibility::Private) => access::PRIVATE,
        Some(ast::Accessibility::Protected) => access::PROTECTED,
        _ => access::PUBLIC,
    };
    if is_static {
        visibility | access::STATIC
    } else {
        visibility
    }
}

// ---- member signatures ----

fn annotated(resolver: &Resolver<'_>, ann: Option<&ast::TsTypeAnn>) -> Option<String> {
    ann.map(|a| resolver.map_ts_type(&a.type_ann))
}

/// Declared type of a parameter. Absent arguments arrive as null, so a
/// parameter with a default of primitive type is boxed.
fn param_type(resolver: &Resolver<'_>, pat: &ast::Pat) -> String {
    match pat {
        ast::Pat::Ident(binding) => {
            annotated(resolver, binding.type_ann.as_deref()).unwrap_or_else(|| desc::OBJECT.to_string())
        }
        ast::Pat::Assign(assign) => {
            let declared = match &*assign.left {
                ast::Pat::Ident(binding) => annotated(resolver, binding.type_ann.as_deref())
                    .or_else(|| resolver.describe(&assign.right))
                    .unwrap_or_else(|| desc::OBJECT.to_string()),
                other => param_type(resolver, other),
            };
            if is_primitive(&declared) && declared != desc::VOID {
                wrapper_of(&declared).to_string()
            } else {
                declared
            }
        }
        ast::Pat::Array(array) => {
            annotated(resolver, array.type_ann.as_deref()).unwrap_or_else(|| desc::LIST.to_string())
        }
        ast::Pat::Object(object) => {
            annotated(resolver, object.type_ann.as_deref()).unwrap_or_else(|| desc::MAP.to_string())
        }
        ast::Pat::Rest(_) => desc::LIST.to_string(),
        _ => desc::OBJECT.to_string(),
    }
}

/// Variables a parameter brings into scope, for return type inference.
fn param_bindings(resolver: &Resolver<'_>, pat: &ast::Pat, descriptor: &str) -> Vec<(String, String)> {
    match pat {
        ast::Pat::Ident(binding) => vec![(binding.id.sym.to_string(), descriptor.to_string())],
        ast::Pat::Assign(assign) => match &*assign.left {
            ast::Pat::Ident(binding) => vec![(binding.id.sym.to_string(), descriptor.to_string())],
            other => param_bindings(resolver, other, descriptor),
        },
        other => collect_bindings(resolver, other, None)
            .map(|bindings| bindings.into_iter().map(|b| (b.name, b.descriptor)).collect())
            .unwrap_or_default(),
    }
}

fn signature_of(
    resolver: &Resolver<'_>,
    pats: &[&ast::Pat],
    body: Option<FunctionBody<'_>>,
    return_ann: Option<&ast::TsType>,
) -> String {
    let params: Vec<String> = pats.iter().map(|pat| param_type(resolver, pat)).collect();
    let mut scope = HashMap::new();
    for (pat, descriptor) in pats.iter().zip(&params) {
        scope.extend(param_bindings(resolver, pat, descriptor));
    }
    let ret = resolver.with_inferred(&scope).return_type_of(body, return_ann);
    MethodDescriptor::new(params, ret.descriptor()).to_string()
}

fn method_descriptor(resolver: &Resolver<'_>, function: &ast::Function) -> String {
    let pats: Vec<&ast::Pat> = function.params.iter().map(|p| &p.pat).collect();
    signature_of(
        resolver,
        &pats,
        function.body.as_ref().map(FunctionBody::Block),
        function.return_type.as_deref().map(|a| &*a.type_ann),
    )
}

/// Constructor parameters as plain patterns, paired with the field each
/// parameter property declares.
fn constructor_params(ctor: &ast::Constructor) -> Result<Vec<(ast::Pat, Option<String>)>> {
    ctor.params
        .iter()
        .map(|param| match param {
            ast::ParamOrTsParamProp::Param(param) => Ok((param.pat.clone(), None)),
            ast::ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                ast::TsParamPropParam::Ident(binding) => {
                    Ok((ast::Pat::Ident(binding.clone()), Some(binding.id.sym.to_string())))
                }
                ast::TsParamPropParam::Assign(assign) => match &*assign.left {
                    ast::Pat::Ident(binding) => {
                        Ok((ast::Pat::Assign(assign.clone()), Some(binding.id.sym.to_string())))
                    }
                    other => Err(CodegenError::unsupported_pattern(
                        "destructuring parameter property",
                        other.span(),
                    )),
                },
            },
        })
        .collect()
}

/// The constructor with a body; overload signatures are skipped.
fn constructor_of(class: &ast::Class) -> Option<&ast::Constructor> {
    class.body.iter().find_map(|member| match member {
        ast::ClassMember::Constructor(ctor) if ctor.body.is_some() => Some(ctor),
        _ => None,
    })
}

fn field_type(resolver: &Resolver<'_>, ann: Option<&ast::TsTypeAnn>, value: Option<&ast::Expr>) -> String {
    annotated(resolver, ann)
        .or_else(|| value.and_then(|v| resolver.describe(v)))
        .unwrap_or_else(|| desc::OBJECT.to_string())
}

fn class_members(resolver: &Resolver<'_>, class: &ast::Class, info: &mut TypeInfo) -> Result<()> {
    for member in &class.body {
        match member {
            ast::ClassMember::ClassProp(prop) => {
                let name = prop_name(&prop.key)
                    .ok_or_else(|| CodegenError::unsupported_expression("computed property name", prop.span))?;
                let descriptor = field_type(resolver, prop.type_ann.as_deref(), prop.value.as_deref());
                info.add_field(name, descriptor, prop.is_static);
            }
            ast::ClassMember::PrivateProp(prop) => {
                let descriptor = field_type(resolver, prop.type_ann.as_deref(), prop.value.as_deref());
                info.add_field(prop.key.name.to_string(), descriptor, prop.is_static);
            }
            ast::ClassMember::Method(method) if method.kind == ast::MethodKind::Method => {
                if method.function.body.is_none() && !method.is_abstract {
                    continue;
                }
                let name = prop_name(&method.key)
                    .ok_or_else(|| CodegenError::unsupported_expression("computed method name", method.span))?;
                info.add_method(name, method_descriptor(resolver, &method.function), method.is_static);
            }
            ast::ClassMember::PrivateMethod(method) if method.kind == ast::MethodKind::Method => {
                info.add_method(
                    method.key.name.to_string(),
                    method_descriptor(resolver, &method.function),
                    method.is_static,
                );
            }
            _ => {}
        }
    }

    let init = match constructor_of(class) {
        Some(ctor) => {
            let params = constructor_params(ctor)?;
            for (pat, field) in &params {
                if let Some(field) = field {
                    info.add_field(field.as_str(), param_type(resolver, pat), false);
                }
            }
            let pats: Vec<&ast::Pat> = params.iter().map(|(pat, _)| pat).collect();
            signature_of(resolver, &pats, None, None)
        }
        None => "()V".to_string(),
    };
    info.add_method("<init>", init, false);
    Ok(())
}

fn interface_members(resolver: &Resolver<'_>, decl: &ast::TsInterfaceDecl, info: &mut TypeInfo) -> Result<()> {
    for element in &decl.body.body {
        let method = match element {
            ast::TsTypeElement::TsMethodSignature(method) => method,
            // Interfaces have no instance state on the JVM
            _ => continue,
        };
        let name = match &*method.key {
            ast::Expr::Ident(ident) if !method.computed => ident.sym.to_string(),
            other => return Err(CodegenError::unsupported_expression("computed method name", other.span())),
        };
        let params: Vec<String> = method
            .params
            .iter()
            .map(|param| match param {
                ast::TsFnParam::Ident(binding) => annotated(resolver, binding.type_ann.as_deref()),
                ast::TsFnParam::Array(array) => annotated(resolver, array.type_ann.as_deref()),
                ast::TsFnParam::Object(object) => annotated(resolver, object.type_ann.as_deref()),
                ast::TsFnParam::Rest(_) => Some(desc::LIST.to_string()),
            }
            .unwrap_or_else(|| desc::OBJECT.to_string()))
            .collect();
        let ret = resolver.return_type_of(None, method.type_ann.as_deref().map(|a| &*a.type_ann));
        info.add_method(name, MethodDescriptor::new(params, ret.descriptor()).to_string(), false);
    }
    Ok(())
}

// ---- method bodies ----

fn infer_locals(ctx: &mut MethodContext<'_>, stmts: &[ast::Stmt]) {
    let mut types = ctx.inferred_types.clone();
    ctx.resolver().collect_variable_types(stmts, &mut types);
    ctx.inferred_types = types;
}

/// Give each parameter its slot, in order, then apply defaults and
/// destructure pattern parameters.
fn bind_params(ctx: &mut MethodContext<'_>, pats: &[&ast::Pat], descriptors: &[String]) -> Result<()> {
    let mut deferred = Vec::new();
    for (&pat, descriptor) in pats.iter().zip(descriptors) {
        match pat {
            ast::Pat::Ident(binding) => {
                ctx.locals.declare(&binding.id.sym, descriptor);
            }
            ast::Pat::Assign(assign) => {
                let slot = match &*assign.left {
                    ast::Pat::Ident(binding) => ctx.locals.declare(&binding.id.sym, descriptor),
                    _ => ctx.locals.temp("param", descriptor),
                };
                deferred.push((pat, slot, descriptor.as_str()));
            }
            ast::Pat::Array(_) | ast::Pat::Object(_) => {
                let slot = ctx.locals.temp("param", descriptor);
                deferred.push((pat, slot, descriptor.as_str()));
            }
            ast::Pat::Rest(rest) => return Err(CodegenError::unsupported_pattern("rest parameter", rest.span)),
            other => return Err(CodegenError::unsupported_pattern("parameter pattern", other.span())),
        }
    }

    for (pat, slot, descriptor) in deferred {
        let target = match pat {
            ast::Pat::Assign(assign) => {
                if is_reference(descriptor) {
                    ctx.code.load(descriptor, slot);
                    let present = ctx.code.branch(IFNONNULL);
                    let from = ctx.gen_expr(&assign.right)?;
                    ctx.coerce(&from, descriptor)?;
                    ctx.code.store(descriptor, slot);
                    ctx.code.resolve(present);
                }
                match &*assign.left {
                    ast::Pat::Ident(_) => continue,
                    left => left,
                }
            }
            other => other,
        };
        ctx.code.load(descriptor, slot);
        ctx.gen_pattern(target, None)?;
    }
    Ok(())
}

fn emit_method(
    class_ctx: &ClassContext<'_>,
    writer: &mut ClassWriter,
    name: &str,
    function: &ast::Function,
    is_static: bool,
    flags: u16,
) -> Result<()> {
    if function.is_async || function.is_generator {
        return Err(CodegenError::UnsupportedFeature {
            message: format!("async and generator functions are not supported: {}", name),
            span: function.span,
        });
    }
    let descriptor = class_ctx
        .info()
        .and_then(|info| info.methods.iter().find(|m| m.name == name && m.is_static == is_static))
        .map(|m| m.descriptor.clone())
        .ok_or_else(|| CodegenError::Internal(format!("method {} was not registered", name)))?;

    let body = match &function.body {
        Some(body) => body,
        None => {
            writer.add_abstract_method(flags, name, &descriptor);
            return Ok(());
        }
    };

    let md = MethodDescriptor::parse(&descriptor)?;
    let pats: Vec<&ast::Pat> = function.params.iter().map(|p| &p.pat).collect();

    let mut ctx = class_ctx.method(writer.pool_mut(), is_static);
    ctx.return_type = ReturnType::from_descriptor(&md.ret);
    bind_params(&mut ctx, &pats, &md.params)?;
    infer_locals(&mut ctx, &body.stmts);
    ctx.gen_body(&body.stmts)?;

    let (code, max_locals) = ctx.finish(&descriptor)?;
    log::debug!("  {}{} ({} bytes)", name, descriptor, code.bytes.len());
    writer.add_method(flags, name, &descriptor, code, max_locals);
    Ok(())
}

fn is_super_call(stmt: &ast::Stmt) -> bool {
    match stmt {
        ast::Stmt::Expr(expr) => matches!(
            &*expr.expr,
            ast::Expr::Call(ast::CallExpr {
                callee: ast::Callee::Super(_),
                ..
            })
        ),
        _ => false,
    }
}

/// `aload_0; <param>; putfield` for a parameter property.
fn store_param_property(ctx: &mut MethodContext<'_>, name: &str, span: Span) -> Result<()> {
    let (slot, from) = ctx
        .locals
        .lookup(name)
        .map(|local| (local.slot, local.descriptor.clone()))
        .ok_or_else(|| CodegenError::UnknownVariable {
            name: name.to_string(),
            span,
        })?;
    let field = ctx.resolve_own_field(name, span)?;

    ctx.code.aload(0);
    ctx.code.load(&from, slot);
    ctx.coerce(&from, &field.descriptor)?;
    let index = ctx.pool.add_field_ref(&field.owner, name, &field.descriptor);
    ctx.code.putfield(index, &field.descriptor);
    Ok(())
}

/// Declared constructor, or the implicit one: super constructor call,
/// parameter properties, instance field initializers, then the body.
fn emit_constructor(class_ctx: &ClassContext<'_>, writer: &mut ClassWriter, class: &ast::Class) -> Result<()> {
    let ctor = constructor_of(class);
    let descriptor = class_ctx
        .info()
        .and_then(|info| info.methods.iter().find(|m| m.name == "<init>"))
        .map(|m| m.descriptor.clone())
        .unwrap_or_else(|| "()V".to_string());
    let md = MethodDescriptor::parse(&descriptor)?;
    let params = match ctor {
        Some(ctor) => constructor_params(ctor)?,
        None => Vec::new(),
    };
    let body: &[ast::Stmt] = ctor
        .and_then(|c| c.body.as_ref())
        .map(|b| b.stmts.as_slice())
        .unwrap_or(&[]);

    let mut ctx = class_ctx.constructor(writer.pool_mut());
    let pats: Vec<&ast::Pat> = params.iter().map(|(pat, _)| pat).collect();
    bind_params(&mut ctx, &pats, &md.params)?;
    infer_locals(&mut ctx, body);

    let rest = match body.split_first() {
        Some((first, rest)) if is_super_call(first) => {
            ctx.gen_stmt(first)?;
            rest
        }
        _ => {
            ctx.code.aload(0);
            ctx.invoke(INVOKESPECIAL, &class_ctx.superclass, "<init>", "()V")?;
            body
        }
    };

    for (pat, field) in &params {
        if let Some(field) = field {
            store_param_property(&mut ctx, field, pat.span())?;
        }
    }
    for member in &class.body {
        match member {
            ast::ClassMember::ClassProp(prop) if !prop.is_static => {
                if let (Some(value), Some(name)) = (&prop.value, prop_name(&prop.key)) {
                    ctx.gen_this_write(&name, value, false, prop.span)?;
                }
            }
            ast::ClassMember::PrivateProp(prop) if !prop.is_static => {
                if let Some(value) = &prop.value {
                    ctx.gen_this_write(&prop.key.name, value, false, prop.span)?;
                }
            }
            _ => {}
        }
    }
    ctx.gen_body(rest)?;

    let (code, max_locals) = ctx.finish(&descriptor)?;
    log::debug!("  <init>{} ({} bytes)", descriptor, code.bytes.len());
    writer.add_method(access::PUBLIC, "<init>", &descriptor, code, max_locals);
    Ok(())
}

/// Fields in declaration order, parameter properties last.
fn emit_fields(writer: &mut ClassWriter, info: &TypeInfo, class: &ast::Class) {
    let descriptor_of = |name: &str| {
        info.field(name)
            .map(|f| f.descriptor.clone())
            .unwrap_or_else(|| desc::OBJECT.to_string())
    };

    for member in &class.body {
        match member {
            ast::ClassMember::ClassProp(prop) => {
                if let Some(name) = prop_name(&prop.key) {
                    let flags = member_access(prop.accessibility, false, prop.is_static);
                    writer.add_field(flags, &name, &descriptor_of(&name));
                }
            }
            ast::ClassMember::PrivateProp(prop) => {
                let name = prop.key.name.to_string();
                let flags = member_access(None, true, prop.is_static);
                writer.add_field(flags, &name, &descriptor_of(&name));
            }
            _ => {}
        }
    }

    if let Some(ctor) = constructor_of(class) {
        for param in &ctor.params {
            if let ast::ParamOrTsParamProp::TsParamProp(prop) = param {
                let name = match &prop.param {
                    ast::TsParamPropParam::Ident(binding) => binding.id.sym.to_string(),
                    ast::TsParamPropParam::Assign(assign) => match &*assign.left {
                        ast::Pat::Ident(binding) => binding.id.sym.to_string(),
                        _ => continue,
                    },
                };
                let flags = member_access(prop.accessibility, false, false);
                writer.add_field(flags, &name, &descriptor_of(&name));
            }
        }
    }
}

/// `<clinit>` for static field initializers and static blocks, in source
/// order. Nothing is emitted when the class has neither.
fn emit_static_init(class_ctx: &ClassContext<'_>, writer: &mut ClassWriter, class: &ast::Class) -> Result<()> {
    let needed = class.body.iter().any(|member| match member {
        ast::ClassMember::ClassProp(prop) => prop.is_static && prop.value.is_some(),
        ast::ClassMember::PrivateProp(prop) => prop.is_static && prop.value.is_some(),
        ast::ClassMember::StaticBlock(_) => true,
        _ => false,
    });
    if !needed {
        return Ok(());
    }

    let mut ctx = class_ctx.method(writer.pool_mut(), true);
    for member in &class.body {
        match member {
            ast::ClassMember::ClassProp(prop) if prop.is_static => {
                if let (Some(value), Some(name)) = (&prop.value, prop_name(&prop.key)) {
                    ctx.gen_this_write(&name, value, false, prop.span)?;
                }
            }
            ast::ClassMember::PrivateProp(prop) if prop.is_static => {
                if let Some(value) = &prop.value {
                    ctx.gen_this_write(&prop.key.name, value, false, prop.span)?;
                }
            }
            ast::ClassMember::StaticBlock(block) => {
                infer_locals(&mut ctx, &block.body.stmts);
                ctx.locals.enter_scope();
                ctx.gen_stmts(&block.body.stmts)?;
                ctx.locals.exit_scope();
            }
            _ => {}
        }
    }
    if !ctx.code.ends_with_terminal() {
        ctx.synthesize_return();
    }

    let (code, max_locals) = ctx.finish("()V")?;
    writer.add_method(access::STATIC, "<clinit>", "()V", code, max_locals);
    Ok(())
}

// ---- class expression discovery ----

/// Finds class expressions, names them `<Enclosing>$<n>` in source order
/// and registers the names. Classes nested in an anonymous class are
/// numbered under it.
struct ClassExprCollector<'m, 'r> {
    registry: &'r mut TypeRegistry,
    found: Vec<Unit<'m>>,
}

impl<'m> ClassExprCollector<'m, '_> {
    fn unit(&mut self, unit: &Unit<'m>) {
        match &unit.kind {
            UnitKind::Class(class) => self.class(class, &unit.internal_name),
            UnitKind::Interface(_) => {}
            UnitKind::Module { functions, statements } => {
                for (_, function) in functions {
                    self.function(function, &unit.internal_name);
                }
                for statement in statements {
                    match statement {
                        TopLevel::Stmt(stmt) => self.stmt(stmt, &unit.internal_name),
                        TopLevel::Decl(decl) => self.decl(decl, &unit.internal_name),
                    }
                }
            }
        }
    }

    fn class_expr(&mut self, class_expr: &'m ast::ClassExpr, enclosing: &str) {
        let name = self.registry.next_anonymous_name(enclosing);
        self.registry.bind_class_expr(class_expr.class.span.lo.0, name.clone());
        self.registry.register(TypeInfo::new(name.as_str()));
        self.found.push(Unit {
            internal_name: name.clone(),
            kind: UnitKind::Class(&class_expr.class),
        });
        self.class(&class_expr.class, &name);
    }

    fn class(&mut self, class: &'m ast::Class, enclosing: &str) {
        if let Some(parent) = &class.super_class {
            self.expr(parent, enclosing);
        }
        for member in &class.body {
            match member {
                ast::ClassMember::Constructor(ctor) => {
                    for param in &ctor.params {
                        if let ast::ParamOrTsParamProp::Param(param) = param {
                            self.pat(&param.pat, enclosing);
                        }
                    }
                    if let Some(body) = &ctor.body {
                        self.stmts(&body.stmts, enclosing);
                    }
                }
                ast::ClassMember::Method(method) => self.function(&method.function, enclosing),
                ast::ClassMember::PrivateMethod(method) => self.function(&method.function, enclosing),
                ast::ClassMember::ClassProp(prop) => {
                    if let Some(value) = &prop.value {
                        self.expr(value, enclosing);
                    }
                }
                ast::ClassMember::PrivateProp(prop) => {
                    if let Some(value) = &prop.value {
                        self.expr(value, enclosing);
                    }
                }
                ast::ClassMember::StaticBlock(block) => self.stmts(&block.body.stmts, enclosing),
                _ => {}
            }
        }
    }

    fn function(&mut self, function: &'m ast::Function, enclosing: &str) {
        for param in &function.params {
            self.pat(&param.pat, enclosing);
        }
        if let Some(body) = &function.body {
            self.stmts(&body.stmts, enclosing);
        }
    }

    fn pat(&mut self, pat: &'m ast::Pat, enclosing: &str) {
        if let ast::Pat::Assign(assign) = pat {
            self.expr(&assign.right, enclosing);
        }
    }

    fn stmts(&mut self, stmts: &'m [ast::Stmt], enclosing: &str) {
        for stmt in stmts {
            self.stmt(stmt, enclosing);
        }
    }

    fn decl(&mut self, decl: &'m ast::Decl, enclosing: &str) {
        if let ast::Decl::Var(var) = decl {
            for declarator in &var.decls {
                if let Some(init) = &declarator.init {
                    self.expr(init, enclosing);
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &'m ast::Stmt, enclosing: &str) {
        match stmt {
            ast::Stmt::Block(block) => self.stmts(&block.stmts, enclosing),
            ast::Stmt::Expr(expr) => self.expr(&expr.expr, enclosing),
            ast::Stmt::Decl(decl) => self.decl(decl, enclosing),
            ast::Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.expr(arg, enclosing);
                }
            }
            ast::Stmt::Throw(throw) => self.expr(&throw.arg, enclosing),
            ast::Stmt::If(if_stmt) => {
                self.expr(&if_stmt.test, enclosing);
                self.stmt(&if_stmt.cons, enclosing);
                if let Some(alt) = &if_stmt.alt {
                    self.stmt(alt, enclosing);
                }
            }
            ast::Stmt::While(w) => {
                self.expr(&w.test, enclosing);
                self.stmt(&w.body, enclosing);
            }
            ast::Stmt::DoWhile(w) => {
                self.stmt(&w.body, enclosing);
                self.expr(&w.test, enclosing);
            }
            ast::Stmt::For(f) => {
                match &f.init {
                    Some(ast::VarDeclOrExpr::VarDecl(var)) => {
                        for declarator in &var.decls {
                            if let Some(init) = &declarator.init {
                                self.expr(init, enclosing);
                            }
                        }
                    }
                    Some(ast::VarDeclOrExpr::Expr(expr)) => self.expr(expr, enclosing),
                    None => {}
                }
                for expr in f.test.iter().chain(&f.update) {
                    self.expr(expr, enclosing);
                }
                self.stmt(&f.body, enclosing);
            }
            ast::Stmt::ForOf(f) => {
                self.expr(&f.right, enclosing);
                self.stmt(&f.body, enclosing);
            }
            ast::Stmt::ForIn(f) => {
                self.expr(&f.right, enclosing);
                self.stmt(&f.body, enclosing);
            }
            ast::Stmt::Labeled(labeled) => self.stmt(&labeled.body, enclosing),
            _ => {}
        }
    }

    fn expr(&mut self, expr: &'m ast::Expr, enclosing: &str) {
        match expr {
            ast::Expr::Class(class_expr) => self.class_expr(class_expr, enclosing),
            ast::Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.expr(&elem.expr, enclosing);
                }
            }
            ast::Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ast::PropOrSpread::Spread(spread) => self.expr(&spread.expr, enclosing),
                        ast::PropOrSpread::Prop(prop) => {
                            if let ast::Prop::KeyValue(kv) = &**prop {
                                self.expr(&kv.value, enclosing);
                            }
                        }
                    }
                }
            }
            ast::Expr::Unary(unary) => self.expr(&unary.arg, enclosing),
            ast::Expr::Update(update) => self.expr(&update.arg, enclosing),
            ast::Expr::Bin(bin) => {
                self.expr(&bin.left, enclosing);
                self.expr(&bin.right, enclosing);
            }
            ast::Expr::Assign(assign) => self.expr(&assign.right, enclosing),
            ast::Expr::Member(member) => {
                self.expr(&member.obj, enclosing);
                if let ast::MemberProp::Computed(computed) = &member.prop {
                    self.expr(&computed.expr, enclosing);
                }
            }
            ast::Expr::Cond(cond) => {
                self.expr(&cond.test, enclosing);
                self.expr(&cond.cons, enclosing);
                self.expr(&cond.alt, enclosing);
            }
            ast::Expr::Call(call) => {
                if let ast::Callee::Expr(callee) = &call.callee {
                    self.expr(callee, enclosing);
                }
                for arg in &call.args {
                    self.expr(&arg.expr, enclosing);
                }
            }
            ast::Expr::New(new) => {
                self.expr(&new.callee, enclosing);
                for arg in new.args.iter().flatten() {
                    self.expr(&arg.expr, enclosing);
                }
            }
            ast::Expr::Seq(seq) => {
                for expr in &seq.exprs {
                    self.expr(expr, enclosing);
                }
            }
            ast::Expr::Tpl(tpl) => {
                for expr in &tpl.exprs {
                    self.expr(expr, enclosing);
                }
            }
            ast::Expr::Paren(paren) => self.expr(&paren.expr, enclosing),
            ast::Expr::TsAs(e) => self.expr(&e.expr, enclosing),
            ast::Expr::TsNonNull(e) => self.expr(&e.expr, enclosing),
            ast::Expr::TsTypeAssertion(e) => self.expr(&e.expr, enclosing),
            ast::Expr::TsConstAssertion(e) => self.expr(&e.expr, enclosing),
            ast::Expr::TsSatisfies(e) => self.expr(&e.expr, enclosing),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{branch_target, frame_offsets, instructions, parse_class, ParsedClass};

    fn compile_with(source: &str, options: CompilerOptions) -> Result<Vec<ClassFile>> {
        let module = javelin_parser::parse_typescript(source, "test.ts").unwrap();
        ModuleCompiler::new(options).compile_module(&module)
    }

    fn compile(source: &str) -> Vec<ParsedClass> {
        compile_with(source, CompilerOptions::default())
            .unwrap()
            .iter()
            .map(|class| {
                let parsed = parse_class(&class.bytes);
                assert_eq!(parsed.name, class.internal_name);
                parsed
            })
            .collect()
    }

    fn ops(code: &[u8]) -> Vec<u8> {
        instructions(code).into_iter().map(|(_, op)| op).collect()
    }

    #[test]
    fn test_class_with_fields_and_constructor() {
        let classes = compile(
            r#"
            class Point {
                x: number;
                y: number;
                constructor(x: number, y: number) {
                    this.x = x;
                    this.y = y;
                }
                norm(): number { return this.x * this.x + this.y * this.y; }
            }
            "#,
        );
        assert_eq!(classes.len(), 1);
        let point = &classes[0];
        assert_eq!(point.superclass, "java/lang/Object");
        assert_eq!(
            point.fields,
            vec![
                (access::PUBLIC, "x".to_string(), "D".to_string()),
                (access::PUBLIC, "y".to_string(), "D".to_string()),
            ]
        );

        let init = point.method("<init>");
        assert_eq!(init.descriptor, "(DD)V");
        assert_eq!(init.max_locals, 5);
        let init_ops = ops(init.code.as_deref().unwrap());
        assert_eq!(&init_ops[..2], &[ALOAD_0, INVOKESPECIAL]);
        assert_eq!(init_ops.last(), Some(&RETURN));

        let norm = point.method("norm");
        assert_eq!(norm.descriptor, "()D");
        assert_eq!(ops(norm.code.as_deref().unwrap()).last(), Some(&DRETURN));
    }

    #[test]
    fn test_field_initializers_and_super_access() {
        let classes = compile(
            r#"
            class Base { count: int = 1; }
            class Derived extends Base {
                read(): int { return super.count; }
            }
            "#,
        );
        let base = &classes[0];
        let init = base.method("<init>");
        assert_eq!(init.descriptor, "()V");
        assert_eq!(
            ops(init.code.as_deref().unwrap()),
            vec![ALOAD_0, INVOKESPECIAL, ALOAD_0, ICONST_0 + 1, PUTFIELD, RETURN]
        );

        let derived = &classes[1];
        assert_eq!(derived.superclass, "Base");
        let read = derived.method("read");
        assert_eq!(read.descriptor, "()I");
        assert_eq!(ops(read.code.as_deref().unwrap()), vec![ALOAD_0, GETFIELD, IRETURN]);
    }

    #[test]
    fn test_parameter_properties() {
        let classes = compile("class Temp { constructor(public celsius: number) {} }");
        let temp = &classes[0];
        assert_eq!(temp.fields, vec![(access::PUBLIC, "celsius".to_string(), "D".to_string())]);
        let init = temp.method("<init>");
        assert_eq!(init.descriptor, "(D)V");
        assert_eq!(
            ops(init.code.as_deref().unwrap()),
            vec![ALOAD_0, INVOKESPECIAL, ALOAD_0, DLOAD_0 + 1, PUTFIELD, RETURN]
        );
    }

    #[test]
    fn test_anonymous_class_expression() {
        let classes = compile(
            r#"
            class Shape { area(): number { return 0; } }
            function unit(): Shape {
                return new (class extends Shape { area(): number { return 1; } })();
            }
            "#,
        );
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Shape", "Main", "Main$1"]);
        assert_eq!(classes[2].superclass, "Shape");
        assert_eq!(classes[1].method("unit").descriptor, "()LShape;");
    }

    #[test]
    fn test_free_functions_and_main() {
        let classes = compile(
            r#"
            function twice(n: int): int { return n * 2; }
            let answer = twice(21);
            "#,
        );
        assert_eq!(classes.len(), 1);
        let main_class = &classes[0];
        assert_eq!(main_class.name, "Main");

        let twice = main_class.method("twice");
        assert_eq!(twice.access, access::PUBLIC | access::STATIC);
        assert_eq!(twice.descriptor, "(I)I");
        assert_eq!(ops(twice.code.as_deref().unwrap()), vec![ILOAD_0, ICONST_0 + 2, IMUL, IRETURN]);

        let main = main_class.method("main");
        assert_eq!(main.descriptor, MAIN_DESCRIPTOR);
        assert_eq!(main.max_locals, 2);
        assert_eq!(
            ops(main.code.as_deref().unwrap()),
            vec![BIPUSH, INVOKESTATIC, ISTORE_0 + 1, RETURN]
        );
    }

    #[test]
    fn test_interface_and_implementation() {
        let classes = compile(
            r#"
            interface Shape { area(): number; name: string; }
            class Square implements Shape {
                name: string = "square";
                area(): number { return 4; }
            }
            "#,
        );
        let shape = &classes[0];
        assert_eq!(shape.access, access::PUBLIC | access::INTERFACE | access::ABSTRACT);
        assert!(shape.fields.is_empty());
        let area = shape.method("area");
        assert_eq!(area.descriptor, "()D");
        assert_eq!(area.access, access::PUBLIC | access::ABSTRACT);
        assert!(area.code.is_none());

        let square = &classes[1];
        assert_eq!(square.superclass, "java/lang/Object");
        assert_eq!(square.interfaces, vec!["Shape".to_string()]);
    }

    #[test]
    fn test_default_parameters() {
        let classes = compile(
            r#"
            function greet(name: string = "world"): string { return name; }
            function bump(n = 1) { return n; }
            "#,
        );
        let main_class = &classes[0];
        let greet = main_class.method("greet");
        assert_eq!(greet.descriptor, "(Ljava/lang/String;)Ljava/lang/String;");
        assert_eq!(
            ops(greet.code.as_deref().unwrap()),
            vec![ALOAD_0, IFNONNULL, LDC, ASTORE_0, ALOAD_0, ARETURN]
        );
        assert_eq!(
            main_class.method("bump").descriptor,
            "(Ljava/lang/Integer;)Ljava/lang/Integer;"
        );
    }

    #[test]
    fn test_destructuring_parameter() {
        let classes = compile("function first([a, b]: List<int>): int { return a; }");
        let first = classes[0].method("first");
        assert_eq!(first.descriptor, "(Ljava/util/List;)I");
        // list parameter, a, b, then the pattern's scratch list
        assert_eq!(first.max_locals, 4);
    }

    #[test]
    fn test_branching_methods_carry_stack_maps() {
        let classes = compile(
            r#"
            class Shape {
                constructor(public sides: int) {}
            }
            function restOf([head, ...tail]: List<int>): int {
                if (head > 0) { return head; }
                return 0;
            }
            function fixed(): int { return 1; }
            "#,
        );
        let module = classes.iter().find(|c| c.name != "Shape").unwrap();

        let rest = module.method("restOf");
        let code = rest.code.as_deref().unwrap();
        let table = rest.stack_map.as_deref().expect("stack map for branching code");

        // A frame at every branch target and after every goto or return
        // that is followed by more code
        let mut expected: Vec<usize> = Vec::new();
        for (at, op) in instructions(code) {
            if is_branch(op) {
                expected.push(branch_target(code, at));
            }
            let next = at + instruction_length(code, at);
            if is_terminal(op) && next < code.len() {
                expected.push(next);
            }
        }
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(frame_offsets(table), expected);

        assert_eq!(module.method("fixed").stack_map, None);
        assert_eq!(classes[0].method("<init>").stack_map, None);
    }

    #[test]
    fn test_static_initializer() {
        let classes = compile("class Config { static retries: int = 3; }");
        let config = &classes[0];
        assert_eq!(
            config.fields,
            vec![(access::PUBLIC | access::STATIC, "retries".to_string(), "I".to_string())]
        );
        let clinit = config.method("<clinit>");
        assert_eq!(clinit.access, access::STATIC);
        assert_eq!(ops(clinit.code.as_deref().unwrap()), vec![ICONST_0 + 3, PUTSTATIC, RETURN]);
    }

    #[test]
    fn test_generic_class_signature() {
        let classes = compile("class Box<T> { value: T; }");
        let boxed = &classes[0];
        assert_eq!(
            boxed.signature.as_deref(),
            Some("<T:Ljava/lang/Object;>Ljava/lang/Object;")
        );
        assert_eq!(boxed.fields[0].2, "Ljava/lang/Object;");
    }

    #[test]
    fn test_package_prefix() {
        let options = CompilerOptions {
            package: Some("com.example".to_string()),
            ..Default::default()
        };
        let classes = compile_with("class Point {} let origin = new Point();", options).unwrap();
        let names: Vec<&str> = classes.iter().map(|c| c.internal_name.as_str()).collect();
        assert_eq!(names, vec!["com/example/Point", "com/example/Main"]);
        assert_eq!(classes[0].relative_path(), PathBuf::from("com/example/Point.class"));
    }

    #[test]
    fn test_unsupported_declarations() {
        let err = compile_with("enum Color { Red }", CompilerOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported statement: enum declaration");

        let err = compile_with(
            "class Box { get size(): int { return 1; } }",
            CompilerOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("accessor `size`"));
    }
}
