//! Static types of source expressions.
//!
//! [`Resolver`] answers "what descriptor does this expression produce"
//! without emitting anything. It borrows the registry, the variable types
//! known so far and, while a method body is being generated, its local
//! table.

use std::collections::HashMap;

use javelin_types::{
    common_type, desc, internal_name_of, is_primitive, is_wrapper, object_descriptor,
    primitive_of, widened, wrapper_of, ReturnType,
};
use swc_ecma_ast as ast;

use crate::locals::LocalTable;
use crate::registry::TypeRegistry;

/// Body of a function whose return type is being inferred.
#[derive(Debug, Clone, Copy)]
pub enum FunctionBody<'b> {
    Block(&'b ast::BlockStmt),
    Expr(&'b ast::Expr),
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pub registry: &'a TypeRegistry,
    /// Internal name of the class being generated
    pub current_class: Option<&'a str>,
    pub inferred: &'a HashMap<String, String>,
    pub locals: Option<&'a LocalTable>,
    /// Class holding the module's free functions
    pub module_class: Option<&'a str>,
}

/// Name of a TS type reference, `a.b.C` for qualified names.
pub fn entity_name(name: &ast::TsEntityName) -> String {
    match name {
        ast::TsEntityName::Ident(ident) => ident.sym.to_string(),
        ast::TsEntityName::TsQualifiedName(q) => format!("{}.{}", entity_name(&q.left), q.right.sym),
    }
}

/// Generic argument `index` of a type reference such as `List<int>`.
fn type_argument(ts_type: &ast::TsType, index: usize) -> Option<&ast::TsType> {
    match ts_type {
        ast::TsType::TsTypeRef(r) => r.type_params.as_ref()?.params.get(index).map(|p| &**p),
        ast::TsType::TsParenthesizedType(p) => type_argument(&p.type_ann, index),
        _ => None,
    }
}

/// Type of the elements a destructuring pattern pulls out of a value
/// annotated `ts_type`: `T[]`, `List<T>`/`Array<T>` give `T`, `Map<K, V>`
/// and `Record<K, V>` give `V`.
pub fn element_annotation(ts_type: &ast::TsType) -> Option<&ast::TsType> {
    match ts_type {
        ast::TsType::TsArrayType(arr) => Some(&*arr.elem_type),
        ast::TsType::TsParenthesizedType(p) => element_annotation(&p.type_ann),
        ast::TsType::TsTypeRef(r) => {
            let name = entity_name(&r.type_name);
            let simple = name.rsplit('.').next().unwrap_or(&name);
            match simple {
                "Map" | "HashMap" | "LinkedHashMap" | "Record" => type_argument(ts_type, 1),
                _ => type_argument(ts_type, 0),
            }
        }
        _ => None,
    }
}

/// Source name of a property key, for the key kinds that have one.
pub fn prop_name(key: &ast::PropName) -> Option<String> {
    match key {
        ast::PropName::Ident(ident) => Some(ident.sym.to_string()),
        ast::PropName::Str(s) => Some(s.value.as_str().unwrap_or("").to_string()),
        ast::PropName::Num(n) => Some(n.value.to_string()),
        ast::PropName::Computed(c) => match &*c.expr {
            ast::Expr::Lit(ast::Lit::Str(s)) => Some(s.value.as_str().unwrap_or("").to_string()),
            _ => None,
        },
        ast::PropName::BigInt(_) => None,
    }
}

/// `B -> S -> I -> J -> F -> D` and `C -> I`.
pub fn widens_to(from: &str, to: &str) -> bool {
    let targets: &[&str] = match from {
        "B" => &["S", "I", "J", "F", "D"],
        "S" | "C" => &["I", "J", "F", "D"],
        "I" => &["J", "F", "D"],
        "J" => &["F", "D"],
        "F" => &["D"],
        _ => &[],
    };
    targets.contains(&to)
}

fn is_numeric_primitive(d: &str) -> bool {
    matches!(d, "B" | "S" | "I" | "J" | "F" | "D")
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a TypeRegistry, inferred: &'a HashMap<String, String>) -> Self {
        Self {
            registry,
            current_class: None,
            inferred,
            locals: None,
            module_class: None,
        }
    }

    pub fn with_module_class(mut self, module_class: &'a str) -> Self {
        self.module_class = Some(module_class);
        self
    }

    pub fn with_class(mut self, class: &'a str) -> Self {
        self.current_class = Some(class);
        self
    }

    pub fn with_locals(mut self, locals: &'a LocalTable) -> Self {
        self.locals = Some(locals);
        self
    }

    /// Same resolver over a different variable type map.
    pub fn with_inferred<'t>(&self, inferred: &'t HashMap<String, String>) -> Resolver<'t>
    where
        'a: 't,
    {
        Resolver {
            registry: self.registry,
            current_class: self.current_class,
            inferred,
            locals: self.locals,
            module_class: self.module_class,
        }
    }

    fn current_class_descriptor(&self) -> String {
        self.current_class
            .map(object_descriptor)
            .unwrap_or_else(|| desc::OBJECT.to_string())
    }

    // ---- TS annotations ----

    pub fn map_ts_type(&self, ts_type: &ast::TsType) -> String {
        use ast::TsKeywordTypeKind::*;

        match ts_type {
            ast::TsType::TsKeywordType(kw) => match kw.kind {
                TsNumberKeyword => desc::DOUBLE,
                TsStringKeyword => desc::STRING,
                TsBooleanKeyword => desc::BOOLEAN,
                TsBigIntKeyword => desc::LONG,
                TsVoidKeyword | TsUndefinedKeyword => desc::VOID,
                _ => desc::OBJECT,
            }
            .to_string(),
            ast::TsType::TsArrayType(arr) => format!("[{}", self.map_ts_type(&arr.elem_type)),
            ast::TsType::TsTupleType(_) => desc::LIST.to_string(),
            ast::TsType::TsTypeLit(_) | ast::TsType::TsMappedType(_) => {
                desc::LINKED_HASH_MAP.to_string()
            }
            ast::TsType::TsParenthesizedType(p) => self.map_ts_type(&p.type_ann),
            ast::TsType::TsOptionalType(o) => self.map_ts_type(&o.type_ann),
            ast::TsType::TsTypePredicate(_) => desc::BOOLEAN.to_string(),
            ast::TsType::TsLitType(lit) => match &lit.lit {
                ast::TsLit::Number(n) if n.value.fract() == 0.0 => desc::INT,
                ast::TsLit::Number(_) => desc::DOUBLE,
                ast::TsLit::Str(_) | ast::TsLit::Tpl(_) => desc::STRING,
                ast::TsLit::Bool(_) => desc::BOOLEAN,
                ast::TsLit::BigInt(_) => desc::LONG,
            }
            .to_string(),
            ast::TsType::TsUnionOrIntersectionType(ast::TsUnionOrIntersectionType::TsUnionType(
                union,
            )) => {
                let members: Vec<&ast::TsType> = union
                    .types
                    .iter()
                    .map(|t| &**t)
                    .filter(|t| !is_nullish_type(t))
                    .collect();
                match members.as_slice() {
                    [single] => self.map_ts_type(single),
                    _ => desc::OBJECT.to_string(),
                }
            }
            ast::TsType::TsTypeRef(r) => match entity_name(&r.type_name).as_str() {
                "Array" => desc::LIST.to_string(),
                "Record" => desc::LINKED_HASH_MAP.to_string(),
                name => self.map_type_name(name),
            },
            _ => desc::OBJECT.to_string(),
        }
    }

    /// Descriptor for a bare type name as written in source.
    pub fn map_type_name(&self, name: &str) -> String {
        let known = match name {
            "int" => desc::INT,
            "long" => desc::LONG,
            "short" => desc::SHORT,
            "byte" => desc::BYTE,
            "char" => desc::CHAR,
            "float" => desc::FLOAT,
            "double" => desc::DOUBLE,
            "boolean" => desc::BOOLEAN,
            "void" => desc::VOID,
            "String" => desc::STRING,
            "Object" => desc::OBJECT,
            "Number" => desc::NUMBER,
            "Boolean" => desc::BOOLEAN_WRAPPER,
            "Byte" => desc::BYTE_WRAPPER,
            "Character" => desc::CHAR_WRAPPER,
            "Short" => desc::SHORT_WRAPPER,
            "Integer" => desc::INT_WRAPPER,
            "Long" => desc::LONG_WRAPPER,
            "Float" => desc::FLOAT_WRAPPER,
            "Double" => desc::DOUBLE_WRAPPER,
            "BigInteger" => desc::BIG_INTEGER,
            "List" => desc::LIST,
            "ArrayList" => desc::ARRAY_LIST,
            "Map" => desc::MAP,
            "HashMap" => desc::HASH_MAP,
            "LinkedHashMap" => desc::LINKED_HASH_MAP,
            "Set" => desc::SET,
            _ => "",
        };
        if !known.is_empty() {
            return known.to_string();
        }
        if let Some(info) = self.registry.resolve(name) {
            return info.descriptor();
        }
        if name.contains('.') {
            return object_descriptor(&name.replace('.', "/"));
        }
        // Type parameters and unknown bare names erase to Object
        desc::OBJECT.to_string()
    }

    // ---- expressions ----

    /// Static type of `expr`; `None` for the null literal.
    pub fn describe(&self, expr: &ast::Expr) -> Option<String> {
        let object = || Some(desc::OBJECT.to_string());

        match expr {
            ast::Expr::Lit(lit) => describe_lit(lit),
            ast::Expr::Tpl(_) => Some(desc::STRING.to_string()),
            ast::Expr::This(_) => Some(self.current_class_descriptor()),
            ast::Expr::Array(_) => Some(desc::ARRAY_LIST.to_string()),
            ast::Expr::Object(_) => Some(desc::LINKED_HASH_MAP.to_string()),
            ast::Expr::Ident(ident) => Some(self.variable_type(&ident.sym)),
            ast::Expr::Paren(p) => self.describe(&p.expr),
            ast::Expr::TsAs(a) => Some(self.map_ts_type(&a.type_ann)),
            ast::Expr::TsTypeAssertion(a) => Some(self.map_ts_type(&a.type_ann)),
            ast::Expr::TsNonNull(n) => self.describe(&n.expr),
            ast::Expr::TsConstAssertion(c) => self.describe(&c.expr),
            ast::Expr::TsSatisfies(s) => self.describe(&s.expr),
            ast::Expr::Bin(bin) => Some(self.describe_binary(bin)),
            ast::Expr::Unary(unary) => match unary.op {
                ast::UnaryOp::Bang | ast::UnaryOp::Delete => Some(desc::BOOLEAN.to_string()),
                ast::UnaryOp::TypeOf => Some(desc::STRING.to_string()),
                ast::UnaryOp::Void => object(),
                _ => self.describe(&unary.arg),
            },
            ast::Expr::Update(update) => self.describe(&update.arg),
            ast::Expr::Cond(cond) => common_type(
                self.describe(&cond.cons).as_deref(),
                self.describe(&cond.alt).as_deref(),
            ),
            ast::Expr::Assign(assign) => match &assign.left {
                ast::AssignTarget::Simple(ast::SimpleAssignTarget::Ident(ident)) => {
                    Some(self.variable_type(&ident.id.sym))
                }
                _ => self.describe(&assign.right),
            },
            ast::Expr::Member(member) => self.describe_member(member),
            ast::Expr::SuperProp(sp) => {
                let field = match &sp.prop {
                    ast::SuperProp::Ident(ident) => ident.sym.to_string(),
                    ast::SuperProp::Computed(c) => match &*c.expr {
                        ast::Expr::Lit(ast::Lit::Str(s)) => s.value.as_str().unwrap_or("").to_string(),
                        _ => return object(),
                    },
                };
                self.super_field_type(&field).or_else(object)
            }
            ast::Expr::Call(call) => self.describe_call(call),
            ast::Expr::New(new) => match new.callee.unwrap_parens() {
                ast::Expr::Ident(ident) => Some(self.map_type_name(&ident.sym)),
                ast::Expr::Class(class) => self
                    .registry
                    .class_expr_name(class.class.span.lo.0)
                    .map(object_descriptor)
                    .or_else(object),
                _ => object(),
            },
            _ => object(),
        }
    }

    /// Declared type of a variable: inferred map, then the local table,
    /// else Object.
    pub fn variable_type(&self, name: &str) -> String {
        if let Some(d) = self.inferred.get(name) {
            return d.clone();
        }
        if let Some(local) = self.locals.and_then(|l| l.lookup(name)) {
            return local.descriptor.clone();
        }
        desc::OBJECT.to_string()
    }

    fn describe_binary(&self, bin: &ast::BinExpr) -> String {
        use ast::BinaryOp::*;

        let left = self.describe(&bin.left);
        let right = self.describe(&bin.right);
        let l = left.as_deref().unwrap_or(desc::OBJECT);
        let r = right.as_deref().unwrap_or(desc::OBJECT);
        let either = |d: &str| l == d || r == d;

        match bin.op {
            Add if either(desc::STRING) => desc::STRING,
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor if either(desc::BIG_INTEGER) => {
                desc::BIG_INTEGER
            }
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor => widened(l, r),
            Exp if l == desc::BIG_INTEGER => desc::BIG_INTEGER,
            Exp => desc::DOUBLE,
            LShift | RShift | ZeroFillRShift if primitive_of(l) == desc::LONG => desc::LONG,
            LShift | RShift | ZeroFillRShift => desc::INT,
            NullishCoalescing => {
                return common_type(left.as_deref(), right.as_deref())
                    .unwrap_or_else(|| desc::OBJECT.to_string())
            }
            EqEq | NotEq | EqEqEq | NotEqEq | Lt | LtEq | Gt | GtEq | LogicalOr | LogicalAnd
            | In | InstanceOf => desc::BOOLEAN,
        }
        .to_string()
    }

    fn describe_member(&self, member: &ast::MemberExpr) -> Option<String> {
        let object = || Some(desc::OBJECT.to_string());

        if let ast::MemberProp::Computed(_) = &member.prop {
            let container = self.describe(&member.obj)?;
            return match container.strip_prefix('[') {
                Some(elem) => Some(elem.to_string()),
                None => object(),
            };
        }
        let name = match &member.prop {
            ast::MemberProp::Ident(ident) => ident.sym.to_string(),
            ast::MemberProp::PrivateName(p) => p.name.to_string(),
            ast::MemberProp::Computed(_) => return object(),
        };

        if let ast::Expr::This(_) = &*member.obj {
            return self
                .current_class
                .and_then(|class| self.registry.resolve_internal(class))
                .and_then(|info| self.registry.lookup_field(info, &name))
                .map(|found| found.descriptor)
                .or_else(object);
        }

        // Static field of a registered class
        if let ast::Expr::Ident(ident) = &*member.obj {
            if !self.is_variable(&ident.sym) {
                if let Some(info) = self.registry.resolve(&ident.sym) {
                    return self
                        .registry
                        .lookup_field(info, &name)
                        .map(|found| found.descriptor)
                        .or_else(object);
                }
            }
        }

        let owner = self.describe(&member.obj)?;
        if name == "length"
            && (owner.starts_with('[')
                || owner == desc::STRING
                || owner == desc::LIST
                || owner == desc::ARRAY_LIST)
        {
            return Some(desc::INT.to_string());
        }
        internal_name_of(&owner)
            .and_then(|internal| self.registry.resolve_internal(internal))
            .and_then(|info| self.registry.lookup_field(info, &name))
            .map(|found| found.descriptor)
            .or_else(object)
    }

    fn super_field_type(&self, field: &str) -> Option<String> {
        let superclass = self.registry.resolve_superclass(self.current_class?)?;
        let info = self.registry.resolve_internal(&superclass)?;
        self.registry
            .lookup_field(info, field)
            .map(|found| found.descriptor)
    }

    fn describe_call(&self, call: &ast::CallExpr) -> Option<String> {
        let object = || Some(desc::OBJECT.to_string());
        let callee = match &call.callee {
            ast::Callee::Expr(callee) => callee,
            _ => return object(),
        };
        let member = match &**callee {
            ast::Expr::Member(member) => member,
            ast::Expr::Ident(ident) => {
                return self
                    .module_class
                    .and_then(|module| self.registry.resolve_internal(module))
                    .and_then(|info| self.registry.lookup_method(info, &ident.sym))
                    .and_then(|m| javelin_types::MethodDescriptor::parse(&m.descriptor).ok())
                    .map(|md| md.ret)
                    .or_else(object)
            }
            _ => return object(),
        };
        let name = match &member.prop {
            ast::MemberProp::Ident(ident) => ident.sym.to_string(),
            _ => return object(),
        };

        let info = match &*member.obj {
            ast::Expr::This(_) => self
                .current_class
                .and_then(|class| self.registry.resolve_internal(class)),
            ast::Expr::Ident(ident) if !self.is_variable(&ident.sym) => {
                self.registry.resolve(&ident.sym)
            }
            other => {
                let owner = self.describe(other)?;
                internal_name_of(&owner).and_then(|n| self.registry.resolve_internal(n))
            }
        };
        info.and_then(|info| self.registry.lookup_method(info, &name))
            .and_then(|m| javelin_types::MethodDescriptor::parse(&m.descriptor).ok())
            .map(|md| md.ret)
            .or_else(object)
    }

    /// Whether `name` is a known variable rather than a class name.
    pub fn is_variable(&self, name: &str) -> bool {
        self.inferred.contains_key(name)
            || self.locals.map_or(false, |l| l.lookup(name).is_some())
    }

    // ---- functions ----

    /// Return type of a function: explicit annotation, else inferred from
    /// the body.
    pub fn return_type_of(
        &self,
        body: Option<FunctionBody<'_>>,
        annotation: Option<&ast::TsType>,
    ) -> ReturnType {
        if let Some(ts_type) = annotation {
            return ReturnType::from_descriptor(&self.map_ts_type(ts_type));
        }
        match body {
            None => ReturnType::Void,
            Some(FunctionBody::Expr(expr)) => value_return(self.describe(expr)),
            Some(FunctionBody::Block(block)) => {
                let mut types = self.inferred.clone();
                self.collect_variable_types(&block.stmts, &mut types);
                self.with_inferred(&types)
                    .first_return(&block.stmts)
                    .unwrap_or(ReturnType::Void)
            }
        }
    }

    /// First `return` in straight-line code or in an `if`'s direct
    /// children, consequent before alternate.
    fn first_return(&self, stmts: &[ast::Stmt]) -> Option<ReturnType> {
        stmts.iter().find_map(|stmt| match stmt {
            ast::Stmt::Return(ret) => Some(self.return_of(ret)),
            ast::Stmt::Block(block) => self.first_return(&block.stmts),
            ast::Stmt::If(if_stmt) => self
                .direct_return(&if_stmt.cons)
                .or_else(|| if_stmt.alt.as_deref().and_then(|alt| self.direct_return(alt))),
            _ => None,
        })
    }

    fn direct_return(&self, stmt: &ast::Stmt) -> Option<ReturnType> {
        match stmt {
            ast::Stmt::Return(ret) => Some(self.return_of(ret)),
            ast::Stmt::Block(block) => block.stmts.iter().find_map(|s| match s {
                ast::Stmt::Return(ret) => Some(self.return_of(ret)),
                _ => None,
            }),
            _ => None,
        }
    }

    fn return_of(&self, ret: &ast::ReturnStmt) -> ReturnType {
        match &ret.arg {
            None => ReturnType::Void,
            Some(arg) => value_return(self.describe(arg)),
        }
    }

    /// Collect the types of variables declared in `stmts`, recursing into
    /// blocks, `if` branches and loop bodies. Annotated declarations use
    /// the annotation, others the initializer's type.
    pub fn collect_variable_types(&self, stmts: &[ast::Stmt], types: &mut HashMap<String, String>) {
        for stmt in stmts {
            self.collect_in_stmt(stmt, types);
        }
    }

    fn collect_in_stmt(&self, stmt: &ast::Stmt, types: &mut HashMap<String, String>) {
        match stmt {
            ast::Stmt::Decl(ast::Decl::Var(var)) => {
                for declarator in &var.decls {
                    let found = {
                        let scoped = self.with_inferred(types);
                        scoped.declarator_types(declarator)
                    };
                    types.extend(found);
                }
            }
            ast::Stmt::Block(block) => self.collect_variable_types(&block.stmts, types),
            ast::Stmt::If(if_stmt) => {
                self.collect_in_stmt(&if_stmt.cons, types);
                if let Some(alt) = &if_stmt.alt {
                    self.collect_in_stmt(alt, types);
                }
            }
            ast::Stmt::While(w) => self.collect_in_stmt(&w.body, types),
            ast::Stmt::DoWhile(w) => self.collect_in_stmt(&w.body, types),
            ast::Stmt::For(f) => {
                if let Some(ast::VarDeclOrExpr::VarDecl(var)) = &f.init {
                    for declarator in &var.decls {
                        let found = self.with_inferred(types).declarator_types(declarator);
                        types.extend(found);
                    }
                }
                self.collect_in_stmt(&f.body, types);
            }
            ast::Stmt::ForOf(f) => self.collect_in_stmt(&f.body, types),
            ast::Stmt::ForIn(f) => self.collect_in_stmt(&f.body, types),
            ast::Stmt::Labeled(l) => self.collect_in_stmt(&l.body, types),
            _ => {}
        }
    }

    fn declarator_types(&self, declarator: &ast::VarDeclarator) -> Vec<(String, String)> {
        match &declarator.name {
            ast::Pat::Ident(binding) => {
                let descriptor = self.binding_type(binding, declarator.init.as_deref());
                vec![(binding.id.sym.to_string(), descriptor)]
            }
            pat => crate::pattern::collect_bindings(self, pat, None)
                .map(|bindings| {
                    bindings
                        .into_iter()
                        .map(|b| (b.name, b.descriptor))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Type of `let x: T = init`: the annotation, else the initializer's
    /// type, else Object.
    pub fn binding_type(&self, binding: &ast::BindingIdent, init: Option<&ast::Expr>) -> String {
        if let Some(ann) = &binding.type_ann {
            return self.map_ts_type(&ann.type_ann);
        }
        init.and_then(|e| self.describe(e))
            .unwrap_or_else(|| desc::OBJECT.to_string())
    }

    // ---- assignability ----

    /// Whether a value of type `from` may be stored where `to` is expected,
    /// allowing boxing, unboxing and primitive widening.
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        if is_primitive(from) && is_primitive(to) {
            return widens_to(from, to);
        }
        if is_primitive(from) {
            return to == desc::OBJECT
                || wrapper_of(from) == to
                || (to == desc::NUMBER && is_numeric_primitive(from));
        }
        if is_primitive(to) {
            let unboxed = primitive_of(from);
            return is_wrapper(from) && (unboxed == to || widens_to(unboxed, to));
        }

        if to == desc::OBJECT {
            return true;
        }
        if to == desc::NUMBER && is_wrapper(from) {
            return is_numeric_primitive(primitive_of(from));
        }
        match (from, to) {
            (desc::ARRAY_LIST, desc::LIST)
            | (desc::LINKED_HASH_MAP, desc::MAP)
            | (desc::HASH_MAP, desc::MAP)
            | (desc::LINKED_HASH_MAP, desc::HASH_MAP) => return true,
            _ => {}
        }
        internal_name_of(from)
            .and_then(|name| self.registry.resolve_internal(name))
            .map_or(false, |info| info.is_assignable_to(self.registry, to))
    }
}

fn describe_lit(lit: &ast::Lit) -> Option<String> {
    let d = match lit {
        ast::Lit::Num(n) => {
            let v = n.value;
            if v.is_finite() && v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
                desc::INT
            } else {
                desc::DOUBLE
            }
        }
        ast::Lit::Str(_) => desc::STRING,
        ast::Lit::Bool(_) => desc::BOOLEAN,
        ast::Lit::BigInt(_) => desc::BIG_INTEGER,
        ast::Lit::Null(_) => return None,
        _ => desc::OBJECT,
    };
    Some(d.to_string())
}

fn value_return(described: Option<String>) -> ReturnType {
    ReturnType::from_descriptor(described.as_deref().unwrap_or(desc::OBJECT))
}

fn is_nullish_type(ts_type: &ast::TsType) -> bool {
    matches!(
        ts_type,
        ast::TsType::TsKeywordType(kw)
            if matches!(kw.kind, ast::TsKeywordTypeKind::TsNullKeyword | ast::TsKeywordTypeKind::TsUndefinedKeyword)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeInfo;
    use javelin_parser::parse_typescript;

    fn first_expr(module: &ast::Module) -> &ast::Expr {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) => &e.expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    fn describe_src(src: &str, vars: &[(&str, &str)]) -> Option<String> {
        let module = parse_typescript(src, "test.ts").unwrap();
        let registry = TypeRegistry::new();
        let inferred: HashMap<String, String> = vars
            .iter()
            .map(|(n, d)| (n.to_string(), d.to_string()))
            .collect();
        Resolver::new(&registry, &inferred).describe(first_expr(&module))
    }

    fn first_function(module: &ast::Module) -> &ast::Function {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Fn(f))) => &f.function,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(describe_src("42;", &[]).as_deref(), Some("I"));
        assert_eq!(describe_src("4.5;", &[]).as_deref(), Some("D"));
        assert_eq!(describe_src("3000000000;", &[]).as_deref(), Some("D"));
        assert_eq!(describe_src("'a';", &[]).as_deref(), Some(desc::STRING));
        assert_eq!(describe_src("true;", &[]).as_deref(), Some("Z"));
        assert_eq!(describe_src("10n;", &[]).as_deref(), Some(desc::BIG_INTEGER));
        assert_eq!(describe_src("null;", &[]), None);
        assert_eq!(describe_src("[1, 2];", &[]).as_deref(), Some(desc::ARRAY_LIST));
        assert_eq!(describe_src("({a: 1});", &[]).as_deref(), Some(desc::LINKED_HASH_MAP));
    }

    #[test]
    fn test_binary_rules() {
        let vars = [("s", desc::STRING), ("l", "J"), ("b", desc::BIG_INTEGER), ("f", "F")];
        assert_eq!(describe_src("s + 1;", &vars).as_deref(), Some(desc::STRING));
        assert_eq!(describe_src("1 + l;", &vars).as_deref(), Some("J"));
        assert_eq!(describe_src("f * 2;", &vars).as_deref(), Some("F"));
        assert_eq!(describe_src("b - 1;", &vars).as_deref(), Some(desc::BIG_INTEGER));
        assert_eq!(describe_src("2 ** 3;", &vars).as_deref(), Some("D"));
        assert_eq!(describe_src("b ** 3;", &vars).as_deref(), Some(desc::BIG_INTEGER));
        assert_eq!(describe_src("l << 2;", &vars).as_deref(), Some("J"));
        assert_eq!(describe_src("1 << l;", &vars).as_deref(), Some("I"));
        assert_eq!(describe_src("1 < 2;", &vars).as_deref(), Some("Z"));
        assert_eq!(describe_src("s instanceof Object;", &vars).as_deref(), Some("Z"));
    }

    #[test]
    fn test_unary_and_conditional() {
        let vars = [("x", "J"), ("s", desc::STRING)];
        assert_eq!(describe_src("!x;", &vars).as_deref(), Some("Z"));
        assert_eq!(describe_src("typeof x;", &vars).as_deref(), Some(desc::STRING));
        assert_eq!(describe_src("void x;", &vars).as_deref(), Some(desc::OBJECT));
        assert_eq!(describe_src("-x;", &vars).as_deref(), Some("J"));
        assert_eq!(describe_src("true ? 1 : 2.5;", &vars).as_deref(), Some("D"));
        assert_eq!(describe_src("true ? s : null;", &vars).as_deref(), Some(desc::OBJECT));
        assert_eq!(describe_src("true ? null : null;", &vars), None);
    }

    #[test]
    fn test_identifiers_and_casts() {
        assert_eq!(describe_src("x;", &[("x", "J")]).as_deref(), Some("J"));
        assert_eq!(describe_src("y;", &[]).as_deref(), Some(desc::OBJECT));
        assert_eq!(describe_src("(y as int);", &[]).as_deref(), Some("I"));
        assert_eq!(describe_src("arr.length;", &[("arr", "[I")]).as_deref(), Some("I"));
        assert_eq!(describe_src("arr[0];", &[("arr", "[J")]).as_deref(), Some("J"));
    }

    #[test]
    fn test_this_field_through_hierarchy() {
        let module = parse_typescript("this.x;", "test.ts").unwrap();
        let mut registry = TypeRegistry::new();
        let mut base = TypeInfo::new("Base");
        base.add_field("x", "J", false);
        registry.register(base);
        let mut child = TypeInfo::new("Child");
        child.parents.push("Base".to_string());
        registry.register(child);

        let inferred = HashMap::new();
        let resolver = Resolver::new(&registry, &inferred).with_class("Child");
        assert_eq!(resolver.describe(first_expr(&module)).as_deref(), Some("J"));
    }

    #[test]
    fn test_map_ts_type() {
        let module = parse_typescript(
            "let a: number; let b: int[]; let c: Array<int>; let d: Record<string, int>; \
             let e: string | null; let f: string | int; let g: java.util.Date; let h: [int, int]; \
             let i: { k: int }; let j: boolean; let k: bigint;",
            "test.ts",
        )
        .unwrap();
        let registry = TypeRegistry::new();
        let inferred = HashMap::new();
        let resolver = Resolver::new(&registry, &inferred);

        let mapped: Vec<String> = module
            .body
            .iter()
            .map(|item| match item {
                ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Var(var))) => {
                    match &var.decls[0].name {
                        ast::Pat::Ident(b) => resolver.map_ts_type(&b.type_ann.as_ref().unwrap().type_ann),
                        _ => unreachable!(),
                    }
                }
                _ => unreachable!(),
            })
            .collect();

        assert_eq!(
            mapped,
            vec![
                "D",
                "[I",
                desc::LIST,
                desc::LINKED_HASH_MAP,
                desc::STRING,
                desc::OBJECT,
                "Ljava/util/Date;",
                desc::LIST,
                desc::LINKED_HASH_MAP,
                "Z",
                "J",
            ]
        );
    }

    #[test]
    fn test_return_type_inference() {
        let cases = [
            ("function f(): int { return 1; }", ReturnType::Int),
            ("function f() { const s = 'a'; return s; }", ReturnType::String),
            ("function f() { return; }", ReturnType::Void),
            ("function f() { if (true) { return 1.5; } else { return 2; } }", ReturnType::Double),
            ("function f() { if (true) foo(); else return true; }", ReturnType::Boolean),
            ("function f() { let x: long = 1; { return x; } }", ReturnType::Long),
            ("function f() { foo(); }", ReturnType::Void),
        ];
        let registry = TypeRegistry::new();
        let inferred = HashMap::new();
        let resolver = Resolver::new(&registry, &inferred);

        for (src, expected) in cases {
            let module = parse_typescript(src, "test.ts").unwrap();
            let function = first_function(&module);
            let body = function.body.as_ref().map(FunctionBody::Block);
            let annotation = function.return_type.as_ref().map(|t| &*t.type_ann);
            assert_eq!(resolver.return_type_of(body, annotation), expected, "{}", src);
        }
    }

    #[test]
    fn test_nested_return_is_not_scanned() {
        // Returns inside loops are outside the shallow scan
        let module = parse_typescript("function f() { while (true) { return 1; } }", "test.ts").unwrap();
        let registry = TypeRegistry::new();
        let inferred = HashMap::new();
        let function = first_function(&module);
        let body = function.body.as_ref().map(FunctionBody::Block);
        assert_eq!(
            Resolver::new(&registry, &inferred).return_type_of(body, None),
            ReturnType::Void
        );
    }

    #[test]
    fn test_collect_variable_types() {
        let module = parse_typescript(
            "function f() { let a = 1; if (a > 0) { let b: long = 2; } while (true) { const c = 'x' + a; } }",
            "test.ts",
        )
        .unwrap();
        let function = first_function(&module);
        let registry = TypeRegistry::new();
        let inferred = HashMap::new();
        let mut types = HashMap::new();
        Resolver::new(&registry, &inferred)
            .collect_variable_types(&function.body.as_ref().unwrap().stmts, &mut types);

        assert_eq!(types.get("a").map(String::as_str), Some("I"));
        assert_eq!(types.get("b").map(String::as_str), Some("J"));
        assert_eq!(types.get("c").map(String::as_str), Some(desc::STRING));
    }

    #[test]
    fn test_is_assignable() {
        let mut registry = TypeRegistry::new();
        let mut circle = TypeInfo::new("Circle");
        circle.parents.push("Shape".to_string());
        registry.register(TypeInfo::new("Shape"));
        registry.register(circle);
        let inferred = HashMap::new();
        let r = Resolver::new(&registry, &inferred);

        assert!(r.is_assignable("I", "I"));
        assert!(r.is_assignable("I", desc::OBJECT));
        assert!(r.is_assignable("I", desc::INT_WRAPPER));
        assert!(!r.is_assignable("I", desc::LONG_WRAPPER));
        assert!(r.is_assignable(desc::INT_WRAPPER, "J"));
        assert!(r.is_assignable("B", "S"));
        assert!(r.is_assignable("C", "I"));
        assert!(!r.is_assignable("S", "C"));
        assert!(!r.is_assignable("D", "F"));
        assert!(r.is_assignable(desc::DOUBLE_WRAPPER, desc::NUMBER));
        assert!(!r.is_assignable(desc::BOOLEAN_WRAPPER, desc::NUMBER));
        assert!(r.is_assignable(desc::ARRAY_LIST, desc::LIST));
        assert!(r.is_assignable(desc::LINKED_HASH_MAP, desc::MAP));
        assert!(r.is_assignable("LCircle;", "LShape;"));
        assert!(!r.is_assignable("LShape;", "LCircle;"));
    }

    #[test]
    fn test_element_annotation() {
        let module = parse_typescript("let a: Map<string, long>; let b: List<int>;", "test.ts").unwrap();
        let registry = TypeRegistry::new();
        let inferred = HashMap::new();
        let r = Resolver::new(&registry, &inferred);
        let ann = |i: usize| match &module.body[i] {
            ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Var(var))) => match &var.decls[0].name {
                ast::Pat::Ident(b) => b.type_ann.as_ref().unwrap().type_ann.clone(),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        assert_eq!(r.map_ts_type(element_annotation(&ann(0)).unwrap()), "J");
        assert_eq!(r.map_ts_type(element_annotation(&ann(1)).unwrap()), "I");
    }
}
