//! Flattened string concatenation through a single `StringBuilder`.

use javelin_types::{class, desc, is_wrapper, primitive_of};
use swc_ecma_ast as ast;

use crate::context::MethodContext;
use crate::error::Result;
use crate::opcodes::*;

/// `append` overload taking a value of type `descriptor` (after unboxing).
pub fn append_descriptor(descriptor: &str) -> &'static str {
    match descriptor {
        "Ljava/lang/String;" => "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        "I" | "B" | "S" => "(I)Ljava/lang/StringBuilder;",
        "C" => "(C)Ljava/lang/StringBuilder;",
        "J" => "(J)Ljava/lang/StringBuilder;",
        "F" => "(F)Ljava/lang/StringBuilder;",
        "D" => "(D)Ljava/lang/StringBuilder;",
        "Z" => "(Z)Ljava/lang/StringBuilder;",
        _ => "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
    }
}

fn strip_parens(expr: &ast::Expr) -> &ast::Expr {
    match expr {
        ast::Expr::Paren(p) => strip_parens(&p.expr),
        other => other,
    }
}

/// One operand of a flattened concatenation.
enum Piece<'e> {
    Text(String),
    Value(&'e ast::Expr),
}

impl MethodContext<'_> {
    /// Leaves of a `+` chain, left to right. A nested `+` is only opened up
    /// when it is itself a string concatenation; `"a" + (1 + 2)` keeps
    /// `1 + 2` as one numeric leaf.
    pub(crate) fn concat_operands<'e>(&self, expr: &'e ast::Expr, out: &mut Vec<&'e ast::Expr>) {
        let inner = strip_parens(expr);
        if let ast::Expr::Bin(bin) = inner {
            if bin.op == ast::BinaryOp::Add && self.describe(inner) == desc::STRING {
                self.concat_operands(&bin.left, out);
                self.concat_operands(&bin.right, out);
                return;
            }
        }
        out.push(expr);
    }

    /// `a + b + ...` whose static type is String.
    pub fn gen_string_concat(&mut self, bin: &ast::BinExpr) -> Result<String> {
        let mut operands = Vec::new();
        self.concat_operands(&bin.left, &mut operands);
        self.concat_operands(&bin.right, &mut operands);
        self.emit_builder(operands.into_iter().map(Piece::Value).collect())
    }

    /// Template literal: every non-empty quasi and every substitution, in
    /// source order.
    pub fn gen_template(&mut self, tpl: &ast::Tpl) -> Result<String> {
        let mut pieces = Vec::new();
        for (i, quasi) in tpl.quasis.iter().enumerate() {
            let text = quasi
                .cooked
                .as_ref()
                .and_then(|c| c.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| quasi.raw.to_string());
            if !text.is_empty() {
                pieces.push(Piece::Text(text));
            }
            if let Some(expr) = tpl.exprs.get(i) {
                pieces.push(Piece::Value(expr));
            }
        }
        if pieces.is_empty() {
            self.ldc_string("");
            return Ok(desc::STRING.to_string());
        }
        self.emit_builder(pieces)
    }

    fn emit_builder(&mut self, pieces: Vec<Piece<'_>>) -> Result<String> {
        log::trace!("string concatenation of {} operand(s)", pieces.len());
        self.new_instance(class::STRING_BUILDER)?;
        for piece in pieces {
            let descriptor = match piece {
                Piece::Text(text) => {
                    self.ldc_string(&text);
                    desc::STRING.to_string()
                }
                Piece::Value(expr) => self.gen_expr(expr)?,
            };
            self.append(&descriptor)?;
        }
        self.invoke(INVOKEVIRTUAL, class::STRING_BUILDER, "toString", "()Ljava/lang/String;")?;
        Ok(desc::STRING.to_string())
    }

    /// Typed `append` for the value on the stack. Wrappers are unboxed so
    /// that `Integer` goes through `append(I)`.
    pub(crate) fn append(&mut self, descriptor: &str) -> Result<()> {
        let mut value = descriptor;
        if is_wrapper(descriptor) {
            value = primitive_of(descriptor);
            self.coerce(descriptor, value)?;
        }
        self.invoke(INVOKEVIRTUAL, class::STRING_BUILDER, "append", append_descriptor(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::{Constant, ConstantPool};
    use crate::registry::TypeRegistry;

    fn first_expr(module: &ast::Module) -> &ast::Expr {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) => &e.expr,
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Names of the methods invoked, in order.
    fn invoked(pool: &ConstantPool, bytes: &[u8]) -> Vec<String> {
        let mut names = Vec::new();
        for window in bytes.windows(3) {
            if window[0] != INVOKEVIRTUAL && window[0] != INVOKESPECIAL {
                continue;
            }
            let index = u16::from_be_bytes([window[1], window[2]]);
            let nat = match pool.get(index) {
                Some(Constant::MethodRef(_, nat)) => *nat,
                _ => continue,
            };
            if let Some(Constant::NameAndType(name, ty)) = pool.get(nat) {
                if let (Some(Constant::Utf8(n)), Some(Constant::Utf8(t))) = (pool.get(*name), pool.get(*ty)) {
                    names.push(format!("{}{}", n, t));
                }
            }
        }
        names
    }

    #[test]
    fn test_append_overloads() {
        assert_eq!(append_descriptor("S"), "(I)Ljava/lang/StringBuilder;");
        assert_eq!(append_descriptor("C"), "(C)Ljava/lang/StringBuilder;");
        assert_eq!(append_descriptor(desc::LIST), "(Ljava/lang/Object;)Ljava/lang/StringBuilder;");
    }

    #[test]
    fn test_flattened_chain_uses_one_builder() {
        let module = javelin_parser::parse_typescript("'a' + n + 'b' + (1 + 2);", "t.ts").unwrap();
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("n", desc::INT_WRAPPER);

        let bin = match first_expr(&module) {
            ast::Expr::Bin(bin) => bin,
            other => panic!("unexpected {:?}", other),
        };
        let ty = ctx.gen_string_concat(bin).unwrap();
        assert_eq!(ty, desc::STRING);

        let bytes = ctx.code.bytes().to_vec();
        let calls = invoked(ctx.pool, &bytes);
        assert_eq!(
            calls,
            vec![
                "<init>()V",
                "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
                "intValue()I",
                "append(I)Ljava/lang/StringBuilder;",
                "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
                "append(I)Ljava/lang/StringBuilder;",
                "toString()Ljava/lang/String;",
            ]
        );
        assert_eq!(bytes.iter().filter(|b| **b == NEW).count(), 1);
        assert_eq!(ctx.code.stack_depth(), 1);
    }

    #[test]
    fn test_template_literal() {
        let module = javelin_parser::parse_typescript("`x=${x}!`;", "t.ts").unwrap();
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("x", "D");

        let tpl = match first_expr(&module) {
            ast::Expr::Tpl(tpl) => tpl,
            other => panic!("unexpected {:?}", other),
        };
        ctx.gen_template(tpl).unwrap();
        let bytes = ctx.code.bytes().to_vec();
        let calls = invoked(ctx.pool, &bytes);
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[2], "append(D)Ljava/lang/StringBuilder;");
    }
}
