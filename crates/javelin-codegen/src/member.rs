//! Field access through `this` and `super`.

use swc_common::Span;
use swc_ecma_ast as ast;

use crate::context::MethodContext;
use crate::error::{CodegenError, Result};
use crate::registry::FieldLookup;

/// Name of a `super.x` / `super["x"]` property. Other computed keys are not
/// supported.
pub fn super_prop_name(sp: &ast::SuperPropExpr) -> Result<String> {
    match &sp.prop {
        ast::SuperProp::Ident(ident) => Ok(ident.sym.to_string()),
        ast::SuperProp::Computed(computed) => match &*computed.expr {
            ast::Expr::Lit(ast::Lit::Str(s)) => Ok(s.value.as_str().unwrap_or("").to_string()),
            _ => Err(CodegenError::UnsupportedFeature {
                message: "Computed super property expressions not yet supported".to_string(),
                span: computed.span,
            }),
        },
    }
}

impl MethodContext<'_> {
    /// Walk current class -> superclass -> type info -> field, failing with
    /// a distinct error at each step.
    fn resolve_super_field(&self, name: &str, action: &'static str, span: Span) -> Result<FieldLookup> {
        let class = match self.class_name {
            Some(class) if !self.is_static => class,
            _ => return Err(CodegenError::SuperOutsideClass { action, span }),
        };
        let superclass = self
            .registry
            .resolve_superclass(class)
            .ok_or_else(|| CodegenError::UnresolvedSuperclass {
                class: class.to_string(),
                span,
            })?;
        let info = self.registry.resolve_internal(&superclass).ok_or_else(|| {
            CodegenError::UnresolvedSuperclassInfo {
                superclass: superclass.clone(),
                span,
            }
        })?;
        self.registry
            .lookup_field(info, name)
            .ok_or_else(|| CodegenError::FieldNotFound {
                field: name.to_string(),
                scope: "super hierarchy".to_string(),
                span,
            })
    }

    /// `super.f`: `aload_0; getfield owner.f`, or `getstatic owner.f` when
    /// the inherited field is static.
    pub fn gen_super_read(&mut self, sp: &ast::SuperPropExpr) -> Result<String> {
        let name = super_prop_name(sp)?;
        let field = self.resolve_super_field(&name, "access", sp.span)?;
        log::trace!("super.{} -> {}.{}:{}", name, field.owner, name, field.descriptor);

        let index = self.pool.add_field_ref(&field.owner, &name, &field.descriptor);
        if field.is_static {
            self.code.getstatic(index, &field.descriptor);
        } else {
            self.code.aload(0);
            self.code.getfield(index, &field.descriptor);
        }
        Ok(field.descriptor)
    }

    /// `super.f = v`: `aload_0; v; coerce; dup_x1; putfield`, or
    /// `v; coerce; dup; putstatic` for a static field. The assigned value
    /// stays on the stack as the expression's result.
    pub fn gen_super_write(&mut self, sp: &ast::SuperPropExpr, value: &ast::Expr) -> Result<String> {
        let name = super_prop_name(sp)?;
        let field = self.resolve_super_field(&name, "assignment", sp.span)?;
        let index = self.pool.add_field_ref(&field.owner, &name, &field.descriptor);

        if field.is_static {
            let from = self.gen_expr(value)?;
            self.coerce(&from, &field.descriptor)?;
            self.code.dup_value(&field.descriptor);
            self.code.putstatic(index, &field.descriptor);
        } else {
            self.code.aload(0);
            let from = self.gen_expr(value)?;
            self.coerce(&from, &field.descriptor)?;
            self.dup_under_receiver(&field.descriptor);
            self.code.putfield(index, &field.descriptor);
        }
        Ok(field.descriptor)
    }

    /// Field `name` on the current class or one of its ancestors.
    pub(crate) fn resolve_own_field(&self, name: &str, span: Span) -> Result<FieldLookup> {
        let class = self.class_name.ok_or_else(|| CodegenError::UnsupportedFeature {
            message: format!("`this.{}` outside of a class", name),
            span,
        })?;
        self.current_type()
            .and_then(|info| self.registry.lookup_field(info, name))
            .ok_or_else(|| CodegenError::FieldNotFound {
                field: name.to_string(),
                scope: class.to_string(),
                span,
            })
    }

    /// `this.f`, or the class's own static field.
    pub fn gen_this_read(&mut self, name: &str, span: Span) -> Result<String> {
        let field = self.resolve_own_field(name, span)?;
        let index = self.pool.add_field_ref(&field.owner, name, &field.descriptor);
        if field.is_static {
            self.code.getstatic(index, &field.descriptor);
        } else {
            self.require_instance(span)?;
            self.code.aload(0);
            self.code.getfield(index, &field.descriptor);
        }
        Ok(field.descriptor)
    }

    /// `this.f = v`. With `keep_value` the assigned value is left on the
    /// stack.
    pub fn gen_this_write(&mut self, name: &str, value: &ast::Expr, keep_value: bool, span: Span) -> Result<String> {
        let field = self.resolve_own_field(name, span)?;
        let index = self.pool.add_field_ref(&field.owner, name, &field.descriptor);

        if field.is_static {
            let from = self.gen_expr(value)?;
            self.coerce(&from, &field.descriptor)?;
            if keep_value {
                self.code.dup_value(&field.descriptor);
            }
            self.code.putstatic(index, &field.descriptor);
        } else {
            self.require_instance(span)?;
            self.code.aload(0);
            let from = self.gen_expr(value)?;
            self.coerce(&from, &field.descriptor)?;
            if keep_value {
                self.dup_under_receiver(&field.descriptor);
            }
            self.code.putfield(index, &field.descriptor);
        }
        Ok(field.descriptor)
    }

    fn dup_under_receiver(&mut self, descriptor: &str) {
        if javelin_types::slot_width(descriptor) == 2 {
            self.code.dup2_x1();
        } else {
            self.code.dup_x1();
        }
    }

    pub(crate) fn require_instance(&self, span: Span) -> Result<()> {
        if self.is_static || self.class_name.is_none() {
            return Err(CodegenError::unsupported_expression("`this` in a static context", span));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::ConstantPool;
    use crate::opcodes::*;
    use crate::registry::{TypeInfo, TypeRegistry};

    fn first_expr(module: &ast::Module) -> &ast::Expr {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) => &e.expr,
            other => panic!("unexpected {:?}", other),
        }
    }

    /// `class Base { count: int; total: long; static limit: double }` and
    /// `class Child extends Base`.
    fn hierarchy() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        let mut base = TypeInfo::new("Base");
        base.add_field("count", "I", false);
        base.add_field("total", "J", false);
        base.add_field("limit", "D", true);
        registry.register(base);
        let mut child = TypeInfo::new("Child");
        child.parents.push("Base".to_string());
        registry.register(child);
        registry.register(TypeInfo::new("Orphan"));
        let mut dangling = TypeInfo::new("Dangling");
        dangling.parents.push("Missing".to_string());
        registry.register(dangling);
        registry
    }

    /// Parse `class X extends Y { m() { <body> } }` and return the super
    /// property expression of its first statement.
    fn with_super_prop<R>(src: &str, f: impl FnOnce(&ast::Expr) -> R) -> R {
        let module = javelin_parser::parse_typescript(
            &format!("class X extends Y {{ m() {{ {} }} }}", src),
            "t.ts",
        )
        .unwrap();
        let class = match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Class(c))) => &c.class,
            other => panic!("unexpected {:?}", other),
        };
        let method = match &class.body[0] {
            ast::ClassMember::Method(m) => m,
            other => panic!("unexpected {:?}", other),
        };
        let body = method.function.body.as_ref().unwrap();
        match &body.stmts[0] {
            ast::Stmt::Expr(e) => f(&e.expr),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_super_read_emits_getfield_on_owner() {
        let registry = hierarchy();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        with_super_prop("super.count;", |expr| {
            let sp = match expr {
                ast::Expr::SuperProp(sp) => sp,
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(ctx.gen_super_read(sp).unwrap(), "I");
        });
        let expected_field = ctx.pool.add_field_ref("Base", "count", "I").to_be_bytes();
        assert_eq!(ctx.code.bytes(), &[ALOAD_0, GETFIELD, expected_field[0], expected_field[1]]);
    }

    #[test]
    fn test_super_write_keeps_value() {
        let registry = hierarchy();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        with_super_prop("super.total = 5;", |expr| {
            let assign = match expr {
                ast::Expr::Assign(a) => a,
                other => panic!("unexpected {:?}", other),
            };
            let sp = match &assign.left {
                ast::AssignTarget::Simple(ast::SimpleAssignTarget::SuperProp(sp)) => sp,
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(ctx.gen_super_write(sp, &assign.right).unwrap(), "J");
        });
        let bytes = ctx.code.bytes();
        // aload_0; iconst_5; i2l; dup2_x1; putfield #
        assert_eq!(&bytes[..4], &[ALOAD_0, ICONST_0 + 5, I2L, DUP2_X1]);
        assert_eq!(bytes[4], PUTFIELD);
        assert_eq!(ctx.code.stack_depth(), 2);
    }

    #[test]
    fn test_static_super_field_uses_static_access() {
        let registry = hierarchy();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        with_super_prop("super.limit;", |expr| {
            let sp = match expr {
                ast::Expr::SuperProp(sp) => sp,
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(ctx.gen_super_read(sp).unwrap(), "D");
        });
        let field = ctx.pool.add_field_ref("Base", "limit", "D").to_be_bytes();
        assert_eq!(ctx.code.bytes(), &[GETSTATIC, field[0], field[1]]);
        assert_eq!(ctx.code.stack_depth(), 2);

        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        with_super_prop("super.limit = 2;", |expr| {
            let assign = match expr {
                ast::Expr::Assign(a) => a,
                other => panic!("unexpected {:?}", other),
            };
            let sp = match &assign.left {
                ast::AssignTarget::Simple(ast::SimpleAssignTarget::SuperProp(sp)) => sp,
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(ctx.gen_super_write(sp, &assign.right).unwrap(), "D");
        });
        let field = ctx.pool.add_field_ref("Base", "limit", "D").to_be_bytes();
        // iconst_2; i2d; dup2; putstatic #, with no receiver load
        assert_eq!(
            ctx.code.bytes(),
            &[ICONST_0 + 2, I2D, DUP2, PUTSTATIC, field[0], field[1]]
        );
        assert_eq!(ctx.code.stack_depth(), 2);
    }

    #[test]
    fn test_super_errors() {
        let registry = hierarchy();

        let cases: Vec<(Option<&str>, &str, &str)> = vec![
            (None, "super.count;", "super property access outside of class context"),
            (Some("Orphan"), "super.count;", "Cannot resolve superclass for Orphan"),
            (Some("Dangling"), "super.count;", "Cannot resolve superclass type info for Missing"),
            (Some("Child"), "super.nope;", "Field not found in super hierarchy: nope"),
            (Some("Child"), "super[key];", "Computed super property expressions not yet supported"),
        ];
        for (class, src, message) in cases {
            let mut pool = ConstantPool::new();
            let mut ctx = MethodContext::new(&registry, &mut pool, class, class.is_none());
            let err = with_super_prop(src, |expr| {
                let sp = match expr {
                    ast::Expr::SuperProp(sp) => sp,
                    other => panic!("unexpected {:?}", other),
                };
                ctx.gen_super_read(sp).unwrap_err()
            });
            assert_eq!(err.to_string(), message, "for {}", src);
        }
    }

    #[test]
    fn test_super_string_key_is_named_property() {
        let registry = hierarchy();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        with_super_prop("super['count'];", |expr| {
            let sp = match expr {
                ast::Expr::SuperProp(sp) => sp,
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(ctx.gen_super_read(sp).unwrap(), "I");
        });
    }

    #[test]
    fn test_this_field_read_and_write() {
        let registry = hierarchy();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Child"), false);
        let span = swc_common::DUMMY_SP;

        assert_eq!(ctx.gen_this_read("count", span).unwrap(), "I");
        assert_eq!(ctx.code.bytes()[..2], [ALOAD_0, GETFIELD]);

        let module = javelin_parser::parse_typescript("1;", "t.ts").unwrap();
        ctx.gen_this_write("count", first_expr(&module), false, span).unwrap();
        assert_eq!(ctx.code.stack_depth(), 1);

        let err = ctx.gen_this_read("nope", span).unwrap_err();
        assert_eq!(err.to_string(), "Field not found in Child: nope");
    }
}
