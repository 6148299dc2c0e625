//! Expression generation.
//!
//! Every generator leaves the expression's value on the operand stack and
//! returns the descriptor of what it pushed. Callers that need a specific
//! type go through [`MethodContext::gen_expr_as`].

use javelin_types::{
    class, desc, internal_name_of, is_int_like, is_primitive, is_reference, is_wrapper,
    object_descriptor, primitive_of, slot_width, widened, MethodDescriptor,
};
use swc_common::{Span, Spanned};
use swc_ecma_ast as ast;

use crate::code::Patch;
use crate::context::MethodContext;
use crate::error::{CodegenError, Result};
use crate::opcodes::*;
use crate::resolver::prop_name;

/// Java methods reachable on values of well-known library types:
/// `(owner, name, descriptor)`. `List` and `Map` are interfaces.
const LIBRARY_METHODS: &[(&str, &str, &str)] = &[
    ("java/util/List", "add", "(Ljava/lang/Object;)Z"),
    ("java/util/List", "get", "(I)Ljava/lang/Object;"),
    ("java/util/List", "set", "(ILjava/lang/Object;)Ljava/lang/Object;"),
    ("java/util/List", "size", "()I"),
    ("java/util/List", "isEmpty", "()Z"),
    ("java/util/List", "contains", "(Ljava/lang/Object;)Z"),
    ("java/util/List", "indexOf", "(Ljava/lang/Object;)I"),
    ("java/util/Map", "get", "(Ljava/lang/Object;)Ljava/lang/Object;"),
    ("java/util/Map", "put", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"),
    ("java/util/Map", "containsKey", "(Ljava/lang/Object;)Z"),
    ("java/util/Map", "remove", "(Ljava/lang/Object;)Ljava/lang/Object;"),
    ("java/util/Map", "size", "()I"),
    ("java/util/Map", "isEmpty", "()Z"),
    ("java/util/Map", "keySet", "()Ljava/util/Set;"),
    ("java/lang/String", "length", "()I"),
    ("java/lang/String", "charAt", "(I)C"),
    ("java/lang/String", "substring", "(I)Ljava/lang/String;"),
    ("java/lang/String", "substring", "(II)Ljava/lang/String;"),
    ("java/lang/String", "indexOf", "(Ljava/lang/String;)I"),
    ("java/lang/String", "startsWith", "(Ljava/lang/String;)Z"),
    ("java/lang/String", "endsWith", "(Ljava/lang/String;)Z"),
    ("java/lang/String", "equals", "(Ljava/lang/Object;)Z"),
    ("java/lang/String", "isEmpty", "()Z"),
    ("java/lang/String", "trim", "()Ljava/lang/String;"),
    ("java/lang/String", "toUpperCase", "()Ljava/lang/String;"),
    ("java/lang/String", "toLowerCase", "()Ljava/lang/String;"),
];

/// Owner in [`LIBRARY_METHODS`] for a receiver of type `descriptor`.
fn library_owner(descriptor: &str) -> Option<&'static str> {
    match descriptor {
        desc::LIST | desc::ARRAY_LIST => Some(class::LIST),
        desc::MAP | desc::HASH_MAP | desc::LINKED_HASH_MAP => Some(class::MAP),
        desc::STRING => Some(class::STRING),
        _ => None,
    }
}

fn is_numeric(d: &str) -> bool {
    matches!(primitive_of(d), "B" | "S" | "C" | "I" | "J" | "F" | "D")
}

fn is_boolean(d: &str) -> bool {
    d == desc::BOOLEAN || d == desc::BOOLEAN_WRAPPER
}

/// Offset of the `L`/`F`/`D` variant of an `I` arithmetic opcode.
fn type_offset(d: &str) -> u8 {
    match d {
        "J" => 1,
        "F" => 2,
        "D" => 3,
        _ => 0,
    }
}

fn is_condition(op: ast::BinaryOp) -> bool {
    use ast::BinaryOp::*;
    matches!(
        op,
        EqEq | NotEq | EqEqEq | NotEqEq | Lt | LtEq | Gt | GtEq | LogicalAnd | LogicalOr
    )
}

fn is_null(expr: &ast::Expr) -> bool {
    match expr {
        ast::Expr::Lit(ast::Lit::Null(_)) => true,
        ast::Expr::Ident(ident) => &*ident.sym == "undefined",
        ast::Expr::Paren(p) => is_null(&p.expr),
        _ => false,
    }
}

/// Binary operator applied by a compound assignment.
pub(crate) fn compound_operator(op: ast::AssignOp) -> Option<ast::BinaryOp> {
    use ast::AssignOp::*;
    use ast::BinaryOp;
    Some(match op {
        AddAssign => BinaryOp::Add,
        SubAssign => BinaryOp::Sub,
        MulAssign => BinaryOp::Mul,
        DivAssign => BinaryOp::Div,
        ModAssign => BinaryOp::Mod,
        LShiftAssign => BinaryOp::LShift,
        RShiftAssign => BinaryOp::RShift,
        ZeroFillRShiftAssign => BinaryOp::ZeroFillRShift,
        BitOrAssign => BinaryOp::BitOr,
        BitXorAssign => BinaryOp::BitXor,
        BitAndAssign => BinaryOp::BitAnd,
        ExpAssign => BinaryOp::Exp,
        Assign | AndAssign | OrAssign | NullishAssign => return None,
    })
}

/// Short description of an expression kind for error messages.
fn expr_kind(expr: &ast::Expr) -> &'static str {
    match expr {
        ast::Expr::Fn(_) => "function expression",
        ast::Expr::Arrow(_) => "arrow function",
        ast::Expr::Class(_) => "class expression outside of `new`",
        ast::Expr::Await(_) => "await",
        ast::Expr::Yield(_) => "yield",
        ast::Expr::OptChain(_) => "optional chaining",
        ast::Expr::TaggedTpl(_) => "tagged template",
        ast::Expr::MetaProp(_) => "meta property",
        ast::Expr::Lit(ast::Lit::Regex(_)) => "regular expression literal",
        _ => "expression",
    }
}

impl MethodContext<'_> {
    pub fn gen_expr(&mut self, expr: &ast::Expr) -> Result<String> {
        match expr {
            ast::Expr::Lit(lit) => self.gen_lit(lit),
            ast::Expr::Tpl(tpl) => self.gen_template(tpl),
            ast::Expr::Ident(ident) => self.gen_ident(ident),
            ast::Expr::This(this) => {
                self.require_instance(this.span)?;
                self.code.aload(0);
                Ok(self
                    .class_name
                    .map(object_descriptor)
                    .unwrap_or_else(|| desc::OBJECT.to_string()))
            }
            ast::Expr::Paren(p) => self.gen_expr(&p.expr),
            ast::Expr::TsAs(a) => self.gen_cast(&a.expr, &a.type_ann),
            ast::Expr::TsTypeAssertion(a) => self.gen_cast(&a.expr, &a.type_ann),
            ast::Expr::TsNonNull(n) => self.gen_expr(&n.expr),
            ast::Expr::TsConstAssertion(c) => self.gen_expr(&c.expr),
            ast::Expr::TsSatisfies(s) => self.gen_expr(&s.expr),
            ast::Expr::Bin(bin) if is_condition(bin.op) => self.materialize(expr),
            ast::Expr::Unary(unary) if unary.op == ast::UnaryOp::Bang => self.materialize(expr),
            ast::Expr::Bin(bin) => self.gen_binary(expr, bin),
            ast::Expr::Unary(unary) => self.gen_unary(unary),
            ast::Expr::Update(update) => self.gen_update(update, true),
            ast::Expr::Assign(assign) => self.gen_assign(assign, true),
            ast::Expr::Cond(cond) => self.gen_cond(expr, cond),
            ast::Expr::Member(member) => self.gen_member(member),
            ast::Expr::SuperProp(sp) => self.gen_super_read(sp),
            ast::Expr::Call(call) => self.gen_call(call),
            ast::Expr::New(new) => self.gen_new(new),
            ast::Expr::Array(array) => self.gen_array_lit(array),
            ast::Expr::Object(object) => self.gen_object_lit(object),
            ast::Expr::Seq(seq) => {
                let (last, rest) = seq
                    .exprs
                    .split_last()
                    .ok_or_else(|| CodegenError::Internal("empty sequence expression".to_string()))?;
                for e in rest {
                    self.gen_expr_discard(e)?;
                }
                self.gen_expr(last)
            }
            other => Err(CodegenError::unsupported_expression(expr_kind(other), other.span())),
        }
    }

    /// Emit `expr` converted to `target`.
    pub fn gen_expr_as(&mut self, expr: &ast::Expr, target: &str) -> Result<()> {
        let from = self.gen_expr(expr)?;
        if from == desc::VOID {
            return Err(CodegenError::TypeMismatch {
                from: from.clone(),
                to: target.to_string(),
                span: expr.span(),
            });
        }
        self.coerce(&from, target)
    }

    /// Emit `expr` for its side effects only.
    pub fn gen_expr_discard(&mut self, expr: &ast::Expr) -> Result<()> {
        match expr {
            ast::Expr::Paren(p) => self.gen_expr_discard(&p.expr),
            ast::Expr::Assign(assign) => self.gen_assign(assign, false).map(|_| ()),
            ast::Expr::Update(update) => self.gen_update(update, false).map(|_| ()),
            _ => {
                let pushed = self.gen_expr(expr)?;
                self.code.pop_value(&pushed);
                Ok(())
            }
        }
    }

    // ---- leaves ----

    fn gen_lit(&mut self, lit: &ast::Lit) -> Result<String> {
        let descriptor = match lit {
            ast::Lit::Num(n) => {
                let v = n.value;
                if v.is_finite() && v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
                    self.iconst(v as i32);
                    desc::INT
                } else {
                    self.code.dconst(self.pool, v);
                    desc::DOUBLE
                }
            }
            ast::Lit::Str(s) => {
                self.ldc_string(s.value.as_str().unwrap_or(""));
                desc::STRING
            }
            ast::Lit::Bool(b) => {
                self.iconst(b.value as i32);
                desc::BOOLEAN
            }
            ast::Lit::Null(_) => {
                self.code.aconst_null();
                desc::OBJECT
            }
            ast::Lit::BigInt(b) => {
                let big_integer = internal_name_of(desc::BIG_INTEGER).unwrap_or("java/math/BigInteger");
                let class = self.pool.add_class(big_integer);
                self.code.new_object(class);
                self.code.dup();
                self.ldc_string(&b.value.to_string());
                self.invoke(INVOKESPECIAL, big_integer, "<init>", "(Ljava/lang/String;)V")?;
                desc::BIG_INTEGER
            }
            other => return Err(CodegenError::unsupported_expression("literal", other.span())),
        };
        Ok(descriptor.to_string())
    }

    fn gen_ident(&mut self, ident: &ast::Ident) -> Result<String> {
        if let Some(local) = self.locals.lookup(&ident.sym).cloned() {
            self.code.load(&local.descriptor, local.slot);
            return Ok(local.descriptor);
        }
        if &*ident.sym == "undefined" {
            self.code.aconst_null();
            return Ok(desc::OBJECT.to_string());
        }
        Err(CodegenError::UnknownVariable {
            name: ident.sym.to_string(),
            span: ident.span,
        })
    }

    /// `x as T`: conversions for primitives and wrappers, `checkcast` for
    /// reference narrowing.
    fn gen_cast(&mut self, expr: &ast::Expr, ts_type: &ast::TsType) -> Result<String> {
        let target = self.resolver().map_ts_type(ts_type);
        let from = self.gen_expr(expr)?;
        if is_reference(&from) && is_reference(&target) && !is_wrapper(&from) && !is_wrapper(&target) {
            if from != target && target != desc::OBJECT {
                if let Some(internal) = internal_name_of(&target) {
                    self.checkcast(internal);
                }
            }
        } else {
            self.coerce(&from, &target)?;
        }
        Ok(target)
    }

    // ---- conditions ----

    /// Push `1` or `0` for a boolean-valued expression.
    fn materialize(&mut self, expr: &ast::Expr) -> Result<String> {
        let base = self.code.stack_depth();
        let on_false = self.gen_jump(expr, false)?;
        self.iconst(1);
        let end = self.code.branch(GOTO);
        for patch in on_false {
            self.code.resolve(patch);
        }
        self.code.set_stack_depth(base);
        self.iconst(0);
        self.code.resolve(end);
        Ok(desc::BOOLEAN.to_string())
    }

    /// Emit a test of `expr` that jumps when its truth value equals `when`
    /// and falls through otherwise. Returns the jumps to patch.
    pub fn gen_jump(&mut self, expr: &ast::Expr, when: bool) -> Result<Vec<Patch>> {
        use ast::BinaryOp::*;

        match expr {
            ast::Expr::Paren(p) => self.gen_jump(&p.expr, when),
            ast::Expr::Unary(unary) if unary.op == ast::UnaryOp::Bang => self.gen_jump(&unary.arg, !when),
            ast::Expr::Lit(ast::Lit::Bool(b)) => {
                if b.value == when {
                    Ok(vec![self.code.branch(GOTO)])
                } else {
                    Ok(Vec::new())
                }
            }
            ast::Expr::Bin(bin) => match bin.op {
                LogicalAnd if !when => {
                    let mut jumps = self.gen_jump(&bin.left, false)?;
                    jumps.extend(self.gen_jump(&bin.right, false)?);
                    Ok(jumps)
                }
                LogicalAnd => {
                    let skip = self.gen_jump(&bin.left, false)?;
                    let jumps = self.gen_jump(&bin.right, true)?;
                    for patch in skip {
                        self.code.resolve(patch);
                    }
                    Ok(jumps)
                }
                LogicalOr if when => {
                    let mut jumps = self.gen_jump(&bin.left, true)?;
                    jumps.extend(self.gen_jump(&bin.right, true)?);
                    Ok(jumps)
                }
                LogicalOr => {
                    let skip = self.gen_jump(&bin.left, true)?;
                    let jumps = self.gen_jump(&bin.right, false)?;
                    for patch in skip {
                        self.code.resolve(patch);
                    }
                    Ok(jumps)
                }
                EqEq | NotEq | EqEqEq | NotEqEq | Lt | LtEq | Gt | GtEq => {
                    let op = self.gen_compare(bin)?;
                    let op = if when { op } else { negate_branch(op) };
                    Ok(vec![self.code.branch(op)])
                }
                _ => self.jump_on_value(expr, when),
            },
            _ => self.jump_on_value(expr, when),
        }
    }

    /// Truthiness of an arbitrary value: zero/false for numbers and
    /// booleans, null for references.
    fn jump_on_value(&mut self, expr: &ast::Expr, when: bool) -> Result<Vec<Patch>> {
        let mut ty = self.gen_expr(expr)?;
        if is_wrapper(&ty) {
            let primitive = primitive_of(&ty).to_string();
            self.coerce(&ty, &primitive)?;
            ty = primitive;
        }
        let op = match ty.as_str() {
            "J" => {
                self.code.lconst(self.pool, 0);
                self.code.simple(LCMP, 4, 1);
                IFNE
            }
            "F" => {
                self.code.fconst(self.pool, 0.0);
                self.code.simple(FCMPL, 2, 1);
                IFNE
            }
            "D" => {
                self.code.dconst(self.pool, 0.0);
                self.code.simple(DCMPL, 4, 1);
                IFNE
            }
            d if is_int_like(d) => IFNE,
            desc::VOID => {
                return Err(CodegenError::TypeMismatch {
                    from: ty.clone(),
                    to: desc::BOOLEAN.to_string(),
                    span: expr.span(),
                })
            }
            _ => IFNONNULL,
        };
        let op = if when { op } else { negate_branch(op) };
        Ok(vec![self.code.branch(op)])
    }

    /// Emit the operands of a comparison and return the branch opcode taken
    /// when the comparison holds.
    fn gen_compare(&mut self, bin: &ast::BinExpr) -> Result<u8> {
        use ast::BinaryOp::*;

        let equality = matches!(bin.op, EqEq | NotEq | EqEqEq | NotEqEq);
        let negated = matches!(bin.op, NotEq | NotEqEq);

        // x == null
        if equality && (is_null(&bin.left) || is_null(&bin.right)) {
            let other = if is_null(&bin.right) { &bin.left } else { &bin.right };
            let ty = self.gen_expr(other)?;
            if is_primitive(&ty) {
                // A primitive is never null: compare a constant instead
                self.code.pop_value(&ty);
                self.iconst(0);
                return Ok(if negated { IFEQ } else { IFNE });
            }
            return Ok(if negated { IFNONNULL } else { IFNULL });
        }

        let left = self.describe(&bin.left);
        let right = self.describe(&bin.right);
        let numeric = (is_numeric(&left) && is_numeric(&right))
            || (is_numeric(&left) && right == desc::OBJECT)
            || (left == desc::OBJECT && is_numeric(&right));

        if numeric {
            let ty = widened(&left, &right);
            self.gen_expr_as(&bin.left, ty)?;
            self.gen_expr_as(&bin.right, ty)?;
            let relation = match bin.op {
                Lt => (IF_ICMPLT, IFLT),
                LtEq => (IF_ICMPLE, IFLE),
                Gt => (IF_ICMPGT, IFGT),
                GtEq => (IF_ICMPGE, IFGE),
                NotEq | NotEqEq => (IF_ICMPNE, IFNE),
                _ => (IF_ICMPEQ, IFEQ),
            };
            return Ok(match ty {
                "I" => relation.0,
                "J" => {
                    self.code.simple(LCMP, 4, 1);
                    relation.1
                }
                // NaN must make `<` and `>` false: pick the comparison
                // variant that pushes the failing result
                "F" => {
                    let op = if matches!(bin.op, Lt | LtEq) { FCMPG } else { FCMPL };
                    self.code.simple(op, 2, 1);
                    relation.1
                }
                _ => {
                    let op = if matches!(bin.op, Lt | LtEq) { DCMPG } else { DCMPL };
                    self.code.simple(op, 4, 1);
                    relation.1
                }
            });
        }

        if equality && is_boolean(&left) && is_boolean(&right) {
            self.gen_expr_as(&bin.left, desc::BOOLEAN)?;
            self.gen_expr_as(&bin.right, desc::BOOLEAN)?;
            return Ok(if negated { IF_ICMPNE } else { IF_ICMPEQ });
        }

        if equality {
            self.gen_expr_as(&bin.left, desc::OBJECT)?;
            self.gen_expr_as(&bin.right, desc::OBJECT)?;
            self.invoke(
                INVOKESTATIC,
                "java/util/Objects",
                "equals",
                "(Ljava/lang/Object;Ljava/lang/Object;)Z",
            )?;
            return Ok(if negated { IFEQ } else { IFNE });
        }

        if left == desc::STRING && right == desc::STRING {
            self.gen_expr_as(&bin.left, desc::STRING)?;
            self.gen_expr_as(&bin.right, desc::STRING)?;
            self.invoke(INVOKEVIRTUAL, class::STRING, "compareTo", "(Ljava/lang/String;)I")?;
            return Ok(match bin.op {
                Lt => IFLT,
                LtEq => IFLE,
                Gt => IFGT,
                _ => IFGE,
            });
        }

        Err(CodegenError::TypeMismatch {
            from: left,
            to: right,
            span: bin.span,
        })
    }

    // ---- operators ----

    fn gen_binary(&mut self, expr: &ast::Expr, bin: &ast::BinExpr) -> Result<String> {
        use ast::BinaryOp::*;

        let ty = self.describe(expr);
        match bin.op {
            Add if ty == desc::STRING => self.gen_string_concat(bin),
            NullishCoalescing => self.gen_nullish(bin, &ty),
            InstanceOf => self.gen_instanceof(bin),
            In => {
                self.gen_expr_as(&bin.left, desc::OBJECT)?;
                let container = self.gen_expr(&bin.right)?;
                if container == desc::OBJECT {
                    self.checkcast(class::MAP);
                }
                self.invoke_interface(class::MAP, "containsKey", "(Ljava/lang/Object;)Z")?;
                Ok(desc::BOOLEAN.to_string())
            }
            _ if ty == desc::BIG_INTEGER => self.gen_big_integer(bin),
            _ => self.gen_arithmetic(bin, &ty),
        }
    }

    fn check_numeric_operand(&self, operand: &ast::Expr, result: &str) -> Result<()> {
        let ty = self.describe(operand);
        if is_numeric(&ty) || ty == desc::OBJECT || ty == desc::NUMBER {
            return Ok(());
        }
        Err(CodegenError::TypeMismatch {
            from: ty,
            to: result.to_string(),
            span: operand.span(),
        })
    }

    fn gen_arithmetic(&mut self, bin: &ast::BinExpr, ty: &str) -> Result<String> {
        use ast::BinaryOp::*;

        self.check_numeric_operand(&bin.left, ty)?;
        self.check_numeric_operand(&bin.right, ty)?;

        match bin.op {
            Exp => {
                self.gen_expr_as(&bin.left, desc::DOUBLE)?;
                self.gen_expr_as(&bin.right, desc::DOUBLE)?;
                self.invoke(INVOKESTATIC, "java/lang/Math", "pow", "(DD)D")?;
                Ok(desc::DOUBLE.to_string())
            }
            LShift | RShift | ZeroFillRShift => {
                let ty = if ty == desc::LONG { desc::LONG } else { desc::INT };
                self.gen_expr_as(&bin.left, ty)?;
                self.gen_expr_as(&bin.right, desc::INT)?;
                let base = match bin.op {
                    LShift => ISHL,
                    RShift => ISHR,
                    _ => IUSHR,
                };
                let width = slot_width(ty);
                self.code.simple(base + type_offset(ty), width + 1, width);
                Ok(ty.to_string())
            }
            BitAnd | BitOr | BitXor => {
                // Bitwise operators work on the integral value
                let ty = if ty == desc::LONG { desc::LONG } else { desc::INT };
                self.gen_expr_as(&bin.left, ty)?;
                self.gen_expr_as(&bin.right, ty)?;
                let base = match bin.op {
                    BitAnd => IAND,
                    BitOr => IOR,
                    _ => IXOR,
                };
                let width = slot_width(ty);
                self.code.simple(base + type_offset(ty), width * 2, width);
                Ok(ty.to_string())
            }
            Add | Sub | Mul | Div | Mod => {
                let ty = widened(ty, ty);
                self.gen_expr_as(&bin.left, ty)?;
                self.gen_expr_as(&bin.right, ty)?;
                let base = match bin.op {
                    Add => IADD,
                    Sub => ISUB,
                    Mul => IMUL,
                    Div => IDIV,
                    _ => IREM,
                };
                let width = slot_width(ty);
                self.code.simple(base + type_offset(ty), width * 2, width);
                Ok(ty.to_string())
            }
            _ => Err(CodegenError::unsupported_expression(
                format!("operator `{}`", bin.op.as_str()),
                bin.span,
            )),
        }
    }

    /// Operand converted to `BigInteger`.
    fn gen_big_integer_operand(&mut self, expr: &ast::Expr) -> Result<()> {
        let big_integer = internal_name_of(desc::BIG_INTEGER).unwrap_or("java/math/BigInteger");
        let ty = self.gen_expr(expr)?;
        if ty == desc::BIG_INTEGER {
            return Ok(());
        }
        if is_numeric(&ty) {
            self.coerce(&ty, desc::LONG)?;
            return self.invoke(INVOKESTATIC, big_integer, "valueOf", "(J)Ljava/math/BigInteger;");
        }
        self.checkcast(big_integer);
        Ok(())
    }

    fn gen_big_integer(&mut self, bin: &ast::BinExpr) -> Result<String> {
        use ast::BinaryOp::*;

        let big_integer = internal_name_of(desc::BIG_INTEGER).unwrap_or("java/math/BigInteger");
        self.gen_big_integer_operand(&bin.left)?;
        if bin.op == Exp {
            self.gen_expr_as(&bin.right, desc::INT)?;
            self.invoke(INVOKEVIRTUAL, big_integer, "pow", "(I)Ljava/math/BigInteger;")?;
            return Ok(desc::BIG_INTEGER.to_string());
        }
        self.gen_big_integer_operand(&bin.right)?;
        let method = match bin.op {
            Add => "add",
            Sub => "subtract",
            Mul => "multiply",
            Div => "divide",
            Mod => "remainder",
            BitAnd => "and",
            BitOr => "or",
            BitXor => "xor",
            other => {
                return Err(CodegenError::unsupported_expression(
                    format!("operator `{}` on bigint", other.as_str()),
                    bin.span,
                ))
            }
        };
        self.invoke(
            INVOKEVIRTUAL,
            big_integer,
            method,
            "(Ljava/math/BigInteger;)Ljava/math/BigInteger;",
        )?;
        Ok(desc::BIG_INTEGER.to_string())
    }

    /// `a ?? b`: `a; dup; ifnonnull end; pop; b; end:`
    fn gen_nullish(&mut self, bin: &ast::BinExpr, ty: &str) -> Result<String> {
        let left = self.gen_expr(&bin.left)?;
        self.coerce(&left, ty)?;
        if is_primitive(&left) {
            return Ok(ty.to_string());
        }
        self.code.dup();
        let end = self.code.branch(IFNONNULL);
        self.code.pop_value(ty);
        self.gen_expr_as(&bin.right, ty)?;
        self.code.resolve(end);
        Ok(ty.to_string())
    }

    fn gen_instanceof(&mut self, bin: &ast::BinExpr) -> Result<String> {
        let name = match &*bin.right {
            ast::Expr::Ident(ident) => ident.sym.to_string(),
            other => {
                return Err(CodegenError::unsupported_expression(
                    "instanceof with a non-class operand",
                    other.span(),
                ))
            }
        };
        let target = match name.as_str() {
            "Error" => object_descriptor(class::RUNTIME_EXCEPTION),
            _ => self.resolver().map_type_name(&name),
        };
        self.gen_expr_as(&bin.left, desc::OBJECT)?;
        let internal = internal_name_of(&target).unwrap_or(class::OBJECT).to_string();
        let class = self.pool.add_class(&internal);
        self.code.instanceof(class);
        Ok(desc::BOOLEAN.to_string())
    }

    fn gen_unary(&mut self, unary: &ast::UnaryExpr) -> Result<String> {
        use ast::UnaryOp::*;

        match unary.op {
            Minus => {
                let ty = self.gen_expr(&unary.arg)?;
                if ty == desc::BIG_INTEGER {
                    let big_integer = internal_name_of(desc::BIG_INTEGER).unwrap_or("java/math/BigInteger");
                    self.invoke(INVOKEVIRTUAL, big_integer, "negate", "()Ljava/math/BigInteger;")?;
                    return Ok(ty);
                }
                let ty = self.unboxed_numeric(ty, unary.span)?;
                let width = slot_width(&ty);
                self.code.simple(INEG + type_offset(&ty), width, width);
                Ok(ty)
            }
            Plus => {
                let ty = self.gen_expr(&unary.arg)?;
                self.unboxed_numeric(ty, unary.span)
            }
            Tilde => {
                let ty = self.gen_expr(&unary.arg)?;
                let operand = self.unboxed_numeric(ty, unary.span)?;
                let ty = if operand == desc::LONG { desc::LONG } else { desc::INT };
                self.coerce(&operand, ty)?;
                if ty == desc::LONG {
                    self.code.lconst(self.pool, -1);
                } else {
                    self.iconst(-1);
                }
                let width = slot_width(ty);
                self.code.simple(IXOR + type_offset(ty), width * 2, width);
                Ok(ty.to_string())
            }
            Void => {
                self.gen_expr_discard(&unary.arg)?;
                self.code.aconst_null();
                Ok(desc::OBJECT.to_string())
            }
            Bang => self.materialize(&ast::Expr::Unary(unary.clone())),
            TypeOf | Delete => Err(CodegenError::UnsupportedFeature {
                message: format!("`{}` is not supported", unary.op.as_str()),
                span: unary.span,
            }),
        }
    }

    /// Unbox a wrapper on the stack; fail for non-numeric types.
    fn unboxed_numeric(&mut self, ty: String, span: Span) -> Result<String> {
        if !is_numeric(&ty) {
            return Err(CodegenError::TypeMismatch {
                from: ty,
                to: desc::DOUBLE.to_string(),
                span,
            });
        }
        let primitive = primitive_of(&ty).to_string();
        self.coerce(&ty, &primitive)?;
        // Sub-int values compute as int
        Ok(if is_int_like(&primitive) { desc::INT.to_string() } else { primitive })
    }

    /// Push the constant `1` of type `ty` and add or subtract it.
    fn step(&mut self, ty: &str, op: ast::UpdateOp) {
        let arith = if is_int_like(ty) { desc::INT } else { ty };
        match arith {
            "J" => self.code.lconst(self.pool, 1),
            "F" => self.code.fconst(self.pool, 1.0),
            "D" => self.code.dconst(self.pool, 1.0),
            _ => self.iconst(1),
        }
        let base = if op == ast::UpdateOp::PlusPlus { IADD } else { ISUB };
        let width = slot_width(arith);
        self.code.simple(base + type_offset(arith), width * 2, width);
        crate::conversion::convert_primitive(&mut self.code, arith, ty);
    }

    /// `x++`, `--x`, `this.n++`. With `keep_value` the prefix or postfix
    /// value is left on the stack.
    pub fn gen_update(&mut self, update: &ast::UpdateExpr, keep_value: bool) -> Result<String> {
        let delta: i16 = if update.op == ast::UpdateOp::PlusPlus { 1 } else { -1 };

        match &*update.arg {
            ast::Expr::Ident(ident) => {
                let local = self.locals.lookup(&ident.sym).cloned().ok_or_else(|| {
                    CodegenError::UnknownVariable {
                        name: ident.sym.to_string(),
                        span: ident.span,
                    }
                })?;
                let ty = local.descriptor.as_str();
                if !is_numeric(ty) || !is_primitive(ty) {
                    return Err(CodegenError::TypeMismatch {
                        from: ty.to_string(),
                        to: desc::INT.to_string(),
                        span: update.span,
                    });
                }
                if ty == desc::INT {
                    if keep_value && !update.prefix {
                        self.code.iload(local.slot);
                    }
                    self.code.iinc(local.slot, delta);
                    if keep_value && update.prefix {
                        self.code.iload(local.slot);
                    }
                } else {
                    self.code.load(ty, local.slot);
                    if keep_value && !update.prefix {
                        self.code.dup_value(ty);
                    }
                    self.step(ty, update.op);
                    if keep_value && update.prefix {
                        self.code.dup_value(ty);
                    }
                    self.code.store(ty, local.slot);
                }
                Ok(local.descriptor.clone())
            }
            ast::Expr::Member(member) if matches!(&*member.obj, ast::Expr::This(_)) => {
                let name = match &member.prop {
                    ast::MemberProp::Ident(ident) => ident.sym.to_string(),
                    ast::MemberProp::PrivateName(p) => p.name.to_string(),
                    ast::MemberProp::Computed(c) => {
                        return Err(CodegenError::unsupported_expression("computed update target", c.span))
                    }
                };
                let field = self.resolve_own_field(&name, member.span)?;
                let ty = field.descriptor.as_str();
                if !is_numeric(ty) || !is_primitive(ty) || field.is_static {
                    return Err(CodegenError::unsupported_expression("update of a non-numeric field", update.span));
                }
                self.require_instance(member.span)?;
                let index = self.pool.add_field_ref(&field.owner, &name, ty);
                self.code.aload(0);
                self.code.dup();
                self.code.getfield(index, ty);
                let dup_under = |ctx: &mut Self| {
                    if slot_width(ty) == 2 {
                        ctx.code.dup2_x1();
                    } else {
                        ctx.code.dup_x1();
                    }
                };
                if keep_value && !update.prefix {
                    dup_under(self);
                }
                self.step(ty, update.op);
                if keep_value && update.prefix {
                    dup_under(self);
                }
                self.code.putfield(index, ty);
                Ok(field.descriptor.clone())
            }
            other => Err(CodegenError::unsupported_expression("update target", other.span())),
        }
    }

    /// Assignment to a local, `this.f`, `super.f` or a field of a typed
    /// object. With `keep_value` the assigned value is the result.
    pub fn gen_assign(&mut self, assign: &ast::AssignExpr, keep_value: bool) -> Result<String> {
        let target_expr = match &assign.left {
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::Ident(binding)) => {
                ast::Expr::Ident(binding.id.clone())
            }
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::Member(member)) => {
                ast::Expr::Member(member.clone())
            }
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::SuperProp(sp)) => {
                ast::Expr::SuperProp(sp.clone())
            }
            ast::AssignTarget::Pat(_) => {
                return Err(CodegenError::unsupported_expression("destructuring assignment", assign.span))
            }
            ast::AssignTarget::Simple(_) => {
                return Err(CodegenError::unsupported_expression("assignment target", assign.span))
            }
        };

        // `a op= b` is generated as `a = a op b`
        let combined;
        let value: &ast::Expr = match assign.op {
            ast::AssignOp::Assign => &assign.right,
            op => {
                let bin_op = compound_operator(op).ok_or_else(|| CodegenError::UnsupportedFeature {
                    message: format!("logical assignment `{}` is not supported", op.as_str()),
                    span: assign.span,
                })?;
                combined = ast::Expr::Bin(ast::BinExpr {
                    span: assign.span,
                    op: bin_op,
                    left: Box::new(target_expr),
                    right: assign.right.clone(),
                });
                &combined
            }
        };

        match &assign.left {
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::Ident(binding)) => {
                let local = self.locals.lookup(&binding.id.sym).cloned().ok_or_else(|| {
                    CodegenError::UnknownVariable {
                        name: binding.id.sym.to_string(),
                        span: binding.id.span,
                    }
                })?;
                self.gen_expr_as(value, &local.descriptor)?;
                if keep_value {
                    self.code.dup_value(&local.descriptor);
                }
                self.code.store(&local.descriptor, local.slot);
                Ok(local.descriptor)
            }
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::SuperProp(sp)) => {
                let ty = self.gen_super_write(sp, value)?;
                if !keep_value {
                    self.code.pop_value(&ty);
                }
                Ok(ty)
            }
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::Member(member)) => {
                self.gen_member_write(member, value, keep_value)
            }
            _ => Err(CodegenError::unsupported_expression("assignment target", assign.span)),
        }
    }

    fn gen_member_write(&mut self, member: &ast::MemberExpr, value: &ast::Expr, keep_value: bool) -> Result<String> {
        let name = match &member.prop {
            ast::MemberProp::Ident(ident) => ident.sym.to_string(),
            ast::MemberProp::PrivateName(p) => p.name.to_string(),
            ast::MemberProp::Computed(c) => {
                return Err(CodegenError::unsupported_expression("assignment to a computed member", c.span))
            }
        };
        if let ast::Expr::This(_) = &*member.obj {
            return self.gen_this_write(&name, value, keep_value, member.span);
        }

        let owner = self.describe(&member.obj);
        let field = internal_name_of(&owner)
            .and_then(|internal| self.registry.resolve_internal(internal))
            .and_then(|info| self.registry.lookup_field(info, &name))
            .ok_or_else(|| CodegenError::FieldNotFound {
                field: name.clone(),
                scope: owner.clone(),
                span: member.span,
            })?;
        if field.is_static {
            return Err(CodegenError::unsupported_expression("static field write through an instance", member.span));
        }
        self.gen_expr(&member.obj)?;
        self.gen_expr_as(value, &field.descriptor)?;
        if keep_value {
            if slot_width(&field.descriptor) == 2 {
                self.code.dup2_x1();
            } else {
                self.code.dup_x1();
            }
        }
        let index = self.pool.add_field_ref(&field.owner, &name, &field.descriptor);
        self.code.putfield(index, &field.descriptor);
        Ok(field.descriptor)
    }

    /// `test ? cons : alt`, both arms converted to their common type.
    fn gen_cond(&mut self, expr: &ast::Expr, cond: &ast::CondExpr) -> Result<String> {
        let ty = self.describe(expr);
        let base = self.code.stack_depth();
        let on_false = self.gen_jump(&cond.test, false)?;
        self.gen_expr_as(&cond.cons, &ty)?;
        let end = self.code.branch(GOTO);
        for patch in on_false {
            self.code.resolve(patch);
        }
        self.code.set_stack_depth(base);
        self.gen_expr_as(&cond.alt, &ty)?;
        self.code.resolve(end);
        Ok(ty)
    }

    // ---- members ----

    fn gen_member(&mut self, member: &ast::MemberExpr) -> Result<String> {
        let name = match &member.prop {
            ast::MemberProp::Ident(ident) => ident.sym.to_string(),
            ast::MemberProp::PrivateName(p) => p.name.to_string(),
            ast::MemberProp::Computed(computed) => return self.gen_index(member, computed),
        };

        if let ast::Expr::This(_) = &*member.obj {
            return self.gen_this_read(&name, member.span);
        }

        // Static field of a registered class
        if let ast::Expr::Ident(ident) = &*member.obj {
            if !self.resolver().is_variable(&ident.sym) {
                if let Some(info) = self.registry.resolve(&ident.sym) {
                    let field = self
                        .registry
                        .lookup_field(info, &name)
                        .filter(|f| f.is_static)
                        .ok_or_else(|| CodegenError::FieldNotFound {
                            field: name.clone(),
                            scope: info.internal_name.clone(),
                            span: member.span,
                        })?;
                    let index = self.pool.add_field_ref(&field.owner, &name, &field.descriptor);
                    self.code.getstatic(index, &field.descriptor);
                    return Ok(field.descriptor);
                }
            }
        }

        let owner = self.gen_expr(&member.obj)?;
        if name == "length" {
            if owner.starts_with('[') {
                self.code.simple(ARRAYLENGTH, 1, 1);
                return Ok(desc::INT.to_string());
            }
            if owner == desc::STRING {
                self.invoke(INVOKEVIRTUAL, class::STRING, "length", "()I")?;
                return Ok(desc::INT.to_string());
            }
            if owner == desc::LIST || owner == desc::ARRAY_LIST {
                self.invoke_interface(class::LIST, "size", "()I")?;
                return Ok(desc::INT.to_string());
            }
        }

        let field = internal_name_of(&owner)
            .and_then(|internal| self.registry.resolve_internal(internal))
            .and_then(|info| self.registry.lookup_field(info, &name));
        if let Some(field) = field {
            let index = self.pool.add_field_ref(&field.owner, &name, &field.descriptor);
            self.code.getfield(index, &field.descriptor);
            return Ok(field.descriptor);
        }

        // Plain objects are maps
        if matches!(owner.as_str(), desc::MAP | desc::HASH_MAP | desc::LINKED_HASH_MAP) {
            self.ldc_string(&name);
            self.invoke_interface(class::MAP, "get", "(Ljava/lang/Object;)Ljava/lang/Object;")?;
            return Ok(desc::OBJECT.to_string());
        }

        Err(CodegenError::unsupported_expression(
            format!("property `{}` of {}", name, owner),
            member.span,
        ))
    }

    /// `a[i]` on arrays and lists, `m[k]` on maps.
    fn gen_index(&mut self, member: &ast::MemberExpr, computed: &ast::ComputedPropName) -> Result<String> {
        let owner = self.gen_expr(&member.obj)?;

        if let Some(elem) = owner.strip_prefix('[') {
            self.gen_expr_as(&computed.expr, desc::INT)?;
            let op = match elem {
                "I" => IALOAD,
                "J" => LALOAD,
                "F" => FALOAD,
                "D" => DALOAD,
                "Z" | "B" => BALOAD,
                "C" => CALOAD,
                "S" => SALOAD,
                _ => AALOAD,
            };
            self.code.simple(op, 2, slot_width(elem));
            return Ok(elem.to_string());
        }

        let key = self.describe(&computed.expr);
        let as_list = owner == desc::LIST
            || owner == desc::ARRAY_LIST
            || (owner == desc::OBJECT && is_numeric(&key) && key != desc::CHAR);
        if as_list {
            if owner == desc::OBJECT {
                self.checkcast(class::LIST);
            }
            self.gen_expr_as(&computed.expr, desc::INT)?;
            self.invoke_interface(class::LIST, "get", "(I)Ljava/lang/Object;")?;
            return Ok(desc::OBJECT.to_string());
        }

        if !matches!(owner.as_str(), desc::MAP | desc::HASH_MAP | desc::LINKED_HASH_MAP) {
            if owner != desc::OBJECT {
                return Err(CodegenError::unsupported_expression(
                    format!("indexing a value of type {}", owner),
                    member.span,
                ));
            }
            self.checkcast(class::MAP);
        }
        self.gen_expr_as(&computed.expr, desc::OBJECT)?;
        self.invoke_interface(class::MAP, "get", "(Ljava/lang/Object;)Ljava/lang/Object;")?;
        Ok(desc::OBJECT.to_string())
    }

    // ---- calls ----

    /// Arguments converted to the parameter types of `descriptor`.
    fn gen_args(&mut self, args: &[ast::ExprOrSpread], descriptor: &MethodDescriptor, span: Span) -> Result<()> {
        if args.len() > descriptor.params.len() {
            return Err(CodegenError::unsupported_expression(
                format!("{} arguments for {} parameters", args.len(), descriptor.params.len()),
                span,
            ));
        }
        for (i, param) in descriptor.params.iter().enumerate() {
            match args.get(i) {
                Some(arg) if arg.spread.is_some() => {
                    return Err(CodegenError::unsupported_expression("spread argument", arg.expr.span()))
                }
                Some(arg) => self.gen_expr_as(&arg.expr, param)?,
                // Missing optional arguments
                None => self.push_default(param),
            }
        }
        Ok(())
    }

    /// Descriptor of a constructor call built from the argument types.
    fn descriptor_from_args(&self, args: &[ast::ExprOrSpread]) -> String {
        let params: String = args.iter().map(|arg| self.describe(&arg.expr)).collect();
        format!("({})V", params)
    }

    fn gen_call(&mut self, call: &ast::CallExpr) -> Result<String> {
        let callee = match &call.callee {
            ast::Callee::Expr(callee) => callee,
            ast::Callee::Super(_) => return self.gen_super_call(call),
            ast::Callee::Import(import) => {
                return Err(CodegenError::unsupported_expression("dynamic import", import.span))
            }
        };

        match &**callee {
            ast::Expr::Member(member) => {
                let name = match &member.prop {
                    ast::MemberProp::Ident(ident) => ident.sym.to_string(),
                    ast::MemberProp::PrivateName(p) => p.name.to_string(),
                    ast::MemberProp::Computed(c) => {
                        return Err(CodegenError::unsupported_expression("computed method call", c.span))
                    }
                };
                self.gen_method_call(call, member, &name)
            }
            ast::Expr::Ident(ident) => {
                let name = ident.sym.to_string();
                let found = self
                    .module_class
                    .and_then(|module| self.registry.resolve_internal(module))
                    .and_then(|info| self.registry.lookup_method(info, &name))
                    .filter(|m| m.is_static)
                    .ok_or_else(|| CodegenError::UnsupportedFeature {
                        message: format!("Function not found: {}", name),
                        span: ident.span,
                    })?;
                let md = MethodDescriptor::parse(&found.descriptor)?;
                self.gen_args(&call.args, &md, call.span)?;
                self.invoke(INVOKESTATIC, &found.owner, &name, &found.descriptor)?;
                Ok(md.ret)
            }
            other => Err(CodegenError::unsupported_expression("call of a computed callee", other.span())),
        }
    }

    fn gen_method_call(&mut self, call: &ast::CallExpr, member: &ast::MemberExpr, name: &str) -> Result<String> {
        match &*member.obj {
            ast::Expr::This(this) => {
                let found = self
                    .current_type()
                    .and_then(|info| self.registry.lookup_method(info, name))
                    .ok_or_else(|| CodegenError::UnsupportedFeature {
                        message: format!("Method not found: {}", name),
                        span: member.span,
                    })?;
                let md = MethodDescriptor::parse(&found.descriptor)?;
                if found.is_static {
                    self.gen_args(&call.args, &md, call.span)?;
                    self.invoke(INVOKESTATIC, &found.owner, name, &found.descriptor)?;
                } else {
                    self.require_instance(this.span)?;
                    self.code.aload(0);
                    self.gen_args(&call.args, &md, call.span)?;
                    self.invoke(INVOKEVIRTUAL, &found.owner, name, &found.descriptor)?;
                }
                return Ok(md.ret);
            }
            ast::Expr::Ident(ident) if &*ident.sym == "console" && !self.resolver().is_variable("console") => {
                return self.gen_console(call, name, member.span);
            }
            ast::Expr::Ident(ident) if !self.resolver().is_variable(&ident.sym) => {
                if let Some(info) = self.registry.resolve(&ident.sym) {
                    let found = self
                        .registry
                        .lookup_method(info, name)
                        .filter(|m| m.is_static)
                        .ok_or_else(|| CodegenError::UnsupportedFeature {
                            message: format!("Static method not found: {}.{}", ident.sym, name),
                            span: member.span,
                        })?;
                    let md = MethodDescriptor::parse(&found.descriptor)?;
                    self.gen_args(&call.args, &md, call.span)?;
                    self.invoke(INVOKESTATIC, &found.owner, name, &found.descriptor)?;
                    return Ok(md.ret);
                }
            }
            _ => {}
        }

        let receiver = self.gen_expr(&member.obj)?;

        // Method of a compiled class
        let info = internal_name_of(&receiver).and_then(|internal| self.registry.resolve_internal(internal));
        if let Some(info) = info {
            if let Some(found) = self.registry.lookup_method(info, name).filter(|m| !m.is_static) {
                let md = MethodDescriptor::parse(&found.descriptor)?;
                self.gen_args(&call.args, &md, call.span)?;
                let owner_is_interface = self
                    .registry
                    .resolve_internal(&found.owner)
                    .map_or(false, |owner| owner.is_interface);
                if owner_is_interface {
                    self.invoke_interface(&found.owner, name, &found.descriptor)?;
                } else {
                    self.invoke(INVOKEVIRTUAL, &found.owner, name, &found.descriptor)?;
                }
                return Ok(md.ret);
            }
        }

        // Java library method
        let library = library_owner(&receiver).and_then(|owner| {
            LIBRARY_METHODS.iter().find(|(o, n, d)| {
                *o == owner
                    && *n == name
                    && MethodDescriptor::parse(d).map_or(false, |md| md.params.len() == call.args.len())
            })
        });
        if let Some((owner, _, descriptor)) = library {
            let md = MethodDescriptor::parse(descriptor)?;
            self.gen_args(&call.args, &md, call.span)?;
            if *owner == class::STRING {
                self.invoke(INVOKEVIRTUAL, owner, name, descriptor)?;
            } else {
                self.invoke_interface(owner, name, descriptor)?;
            }
            return Ok(md.ret);
        }

        Err(CodegenError::UnsupportedFeature {
            message: format!("Method not found: {} on {}", name, receiver),
            span: member.span,
        })
    }

    /// `console.log(...)` and `console.error(...)` print through
    /// `System.out` / `System.err`; several arguments are joined by spaces.
    fn gen_console(&mut self, call: &ast::CallExpr, name: &str, span: Span) -> Result<String> {
        let stream = match name {
            "log" | "info" | "debug" => "out",
            "error" | "warn" => "err",
            _ => {
                return Err(CodegenError::UnsupportedFeature {
                    message: format!("console.{} is not supported", name),
                    span,
                })
            }
        };
        let field = self.pool.add_field_ref("java/lang/System", stream, "Ljava/io/PrintStream;");
        self.code.getstatic(field, "Ljava/io/PrintStream;");

        let printed = match call.args.as_slice() {
            [] => None,
            [single] => Some(self.gen_expr(&single.expr)?),
            many => {
                self.new_instance(class::STRING_BUILDER)?;
                for (i, arg) in many.iter().enumerate() {
                    if i > 0 {
                        self.ldc_string(" ");
                        self.append(desc::STRING)?;
                    }
                    let ty = self.gen_expr(&arg.expr)?;
                    self.append(&ty)?;
                }
                self.invoke(INVOKEVIRTUAL, class::STRING_BUILDER, "toString", "()Ljava/lang/String;")?;
                Some(desc::STRING.to_string())
            }
        };
        let descriptor = match printed.as_deref() {
            None => "()V".to_string(),
            Some(ty) => {
                let param = match ty {
                    "B" | "S" => "I",
                    d if is_primitive(d) || d == desc::STRING => d,
                    _ => desc::OBJECT,
                };
                format!("({})V", param)
            }
        };
        self.invoke(INVOKEVIRTUAL, "java/io/PrintStream", "println", &descriptor)?;
        Ok(desc::VOID.to_string())
    }

    /// `super(...)` inside a constructor.
    fn gen_super_call(&mut self, call: &ast::CallExpr) -> Result<String> {
        let superclass = self
            .superclass
            .filter(|_| !self.is_static)
            .ok_or_else(|| CodegenError::UnsupportedFeature {
                message: "`super(...)` outside of a constructor".to_string(),
                span: call.span,
            })?
            .to_string();
        let descriptor = self
            .registry
            .resolve_internal(&superclass)
            .and_then(|info| info.methods.iter().find(|m| m.name == "<init>"))
            .map(|m| m.descriptor.clone())
            .unwrap_or_else(|| self.descriptor_from_args(&call.args));
        let md = MethodDescriptor::parse(&descriptor)?;

        self.code.aload(0);
        self.gen_args(&call.args, &md, call.span)?;
        self.invoke(INVOKESPECIAL, &superclass, "<init>", &descriptor)?;
        Ok(desc::VOID.to_string())
    }

    fn gen_new(&mut self, new: &ast::NewExpr) -> Result<String> {
        let internal = match new.callee.unwrap_parens() {
            ast::Expr::Ident(ident) => match &*ident.sym {
                "Error" => class::RUNTIME_EXCEPTION.to_string(),
                name => {
                    let descriptor = self.resolver().map_type_name(name);
                    match internal_name_of(&descriptor) {
                        // Unknown names erase to Object
                        Some(class::OBJECT) if name != "Object" => {
                            return Err(CodegenError::UnsupportedFeature {
                                message: format!("Class not found: {}", name),
                                span: ident.span,
                            })
                        }
                        Some(internal) if !internal.starts_with('[') => internal.to_string(),
                        _ => {
                            return Err(CodegenError::unsupported_expression(
                                format!("`new` of {}", name),
                                ident.span,
                            ))
                        }
                    }
                }
            },
            ast::Expr::Class(class_expr) => self
                .registry
                .class_expr_name(class_expr.class.span.lo.0)
                .map(str::to_string)
                .ok_or_else(|| CodegenError::Internal("class expression was not registered".to_string()))?,
            other => return Err(CodegenError::unsupported_expression("`new` of a computed callee", other.span())),
        };

        let args: &[ast::ExprOrSpread] = new.args.as_deref().unwrap_or(&[]);
        let descriptor = self
            .registry
            .resolve_internal(&internal)
            .and_then(|info| info.methods.iter().find(|m| m.name == "<init>"))
            .map(|m| m.descriptor.clone())
            .unwrap_or_else(|| self.descriptor_from_args(args));
        let md = MethodDescriptor::parse(&descriptor)?;

        let class = self.pool.add_class(&internal);
        self.code.new_object(class);
        self.code.dup();
        self.gen_args(args, &md, new.span)?;
        self.invoke(INVOKESPECIAL, &internal, "<init>", &descriptor)?;
        Ok(object_descriptor(&internal))
    }

    // ---- literals ----

    /// `[a, , ...b]` as an `ArrayList`.
    fn gen_array_lit(&mut self, array: &ast::ArrayLit) -> Result<String> {
        self.new_instance(class::ARRAY_LIST)?;
        for elem in &array.elems {
            self.code.dup();
            match elem {
                None => {
                    self.code.aconst_null();
                    self.invoke(INVOKEVIRTUAL, class::ARRAY_LIST, "add", "(Ljava/lang/Object;)Z")?;
                }
                Some(elem) if elem.spread.is_some() => {
                    let ty = self.gen_expr(&elem.expr)?;
                    if ty != desc::LIST && ty != desc::ARRAY_LIST {
                        self.checkcast("java/util/Collection");
                    }
                    self.invoke(INVOKEVIRTUAL, class::ARRAY_LIST, "addAll", "(Ljava/util/Collection;)Z")?;
                }
                Some(elem) => {
                    self.gen_expr_as(&elem.expr, desc::OBJECT)?;
                    self.invoke(INVOKEVIRTUAL, class::ARRAY_LIST, "add", "(Ljava/lang/Object;)Z")?;
                }
            }
            self.code.pop_value(desc::BOOLEAN);
        }
        Ok(desc::ARRAY_LIST.to_string())
    }

    /// `{ a: 1, b, ...rest }` as a `LinkedHashMap`, keys in source order.
    fn gen_object_lit(&mut self, object: &ast::ObjectLit) -> Result<String> {
        self.new_instance(class::LINKED_HASH_MAP)?;
        for prop in &object.props {
            self.code.dup();
            let prop = match prop {
                ast::PropOrSpread::Spread(spread) => {
                    let ty = self.gen_expr(&spread.expr)?;
                    if !matches!(ty.as_str(), desc::MAP | desc::HASH_MAP | desc::LINKED_HASH_MAP) {
                        self.checkcast(class::MAP);
                    }
                    self.invoke(INVOKEVIRTUAL, class::LINKED_HASH_MAP, "putAll", "(Ljava/util/Map;)V")?;
                    continue;
                }
                ast::PropOrSpread::Prop(prop) => prop,
            };
            match &**prop {
                ast::Prop::Shorthand(ident) => {
                    self.ldc_string(&ident.sym);
                    self.gen_expr_as(&ast::Expr::Ident(ident.clone()), desc::OBJECT)?;
                }
                ast::Prop::KeyValue(kv) => {
                    match (prop_name(&kv.key), &kv.key) {
                        (Some(key), _) => self.ldc_string(&key),
                        (None, ast::PropName::Computed(computed)) => {
                            self.gen_expr_as(&computed.expr, desc::OBJECT)?
                        }
                        (None, key) => {
                            return Err(CodegenError::unsupported_expression("property key", key.span()))
                        }
                    }
                    self.gen_expr_as(&kv.value, desc::OBJECT)?;
                }
                other => {
                    return Err(CodegenError::unsupported_expression(
                        "accessor or method in an object literal",
                        other.span(),
                    ))
                }
            }
            self.invoke(
                INVOKEVIRTUAL,
                class::LINKED_HASH_MAP,
                "put",
                "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            )?;
            self.code.pop_value(desc::OBJECT);
        }
        Ok(desc::LINKED_HASH_MAP.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::ConstantPool;
    use crate::registry::{TypeInfo, TypeRegistry};
    use crate::frame::{Frame, VerificationType};
    use crate::testing::{branch_target, instructions};

    fn parse_expr(src: &str) -> ast::Module {
        javelin_parser::parse_typescript(src, "t.ts").unwrap()
    }

    fn expr_of(module: &ast::Module) -> &ast::Expr {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) => &e.expr,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn ops(ctx: &MethodContext<'_>) -> Vec<u8> {
        instructions(ctx.code.bytes()).into_iter().map(|(_, op)| op).collect()
    }

    #[test]
    fn test_int_arithmetic() {
        let module = parse_expr("a * 2 + b;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("a", "I");
        ctx.locals.declare("b", "I");

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "I");
        assert_eq!(ops(&ctx), vec![ILOAD_0, ICONST_0 + 2, IMUL, ILOAD_0 + 1, IADD]);
        assert_eq!(ctx.code.max_stack(), 2);
    }

    #[test]
    fn test_mixed_arithmetic_widens() {
        let module = parse_expr("n + 1;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("n", "D");

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "D");
        assert_eq!(ops(&ctx), vec![DLOAD_0, ICONST_0 + 1, I2D, IADD + 3]);
        assert_eq!(ctx.code.stack_depth(), 2);
    }

    #[test]
    fn test_comparison_materializes_boolean() {
        let module = parse_expr("a < b;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("a", "I");
        ctx.locals.declare("b", "I");

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "Z");
        assert_eq!(
            ops(&ctx),
            vec![ILOAD_0, ILOAD_0 + 1, IF_ICMPGE, ICONST_0 + 1, GOTO, ICONST_0]
        );
        assert_eq!(ctx.code.stack_depth(), 1);

        ctx.code.return_value("Z");
        let (code, _) = ctx.finish("(II)Z").unwrap();
        let map = code.stack_map.unwrap();
        // same_frame at the false branch, then the int result at the join
        assert_eq!(map.encode(&mut pool), vec![0, 2, 9, 64, 1]);
    }

    #[test]
    fn test_logical_and_short_circuits() {
        let module = parse_expr("x > 0 && y;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("x", "J");
        ctx.locals.declare("y", "Z");

        let jumps = ctx.gen_jump(expr_of(&module), false).unwrap();
        assert_eq!(jumps.len(), 2);
        let bytes = ctx.code.bytes().to_vec();
        for patch in jumps {
            ctx.code.resolve(patch);
        }
        let listed = instructions(&bytes);
        let kinds: Vec<u8> = listed.iter().map(|(_, op)| *op).collect();
        assert_eq!(kinds, vec![LLOAD_0, ICONST_0, I2L, LCMP, IFLE, ILOAD_0 + 2, IFEQ]);
        assert_eq!(branch_target(ctx.code.bytes(), listed[4].0), ctx.code.offset());
    }

    #[test]
    fn test_null_check() {
        let module = parse_expr("s != null;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("s", desc::STRING);

        let jumps = ctx.gen_jump(expr_of(&module), true).unwrap();
        for patch in jumps {
            ctx.code.resolve(patch);
        }
        assert_eq!(ops(&ctx), vec![ALOAD_0, IFNONNULL]);
    }

    #[test]
    fn test_conditional_joins_stack() {
        let module = parse_expr("flag ? 1 : 2.5;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("flag", "Z");

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "D");
        assert_eq!(ctx.code.stack_depth(), 2);
        assert_eq!(ctx.code.max_stack(), 2);

        ctx.code.return_value("D");
        let (code, _) = ctx.finish("(Z)D").unwrap();
        let map = code.stack_map.unwrap();
        let (_, join) = map.frames.last().unwrap();
        assert_eq!(join.stack, vec![VerificationType::Double, VerificationType::Top]);
    }

    #[test]
    fn test_local_assignment_and_update() {
        let module = parse_expr("i += 2; i++; x = i;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("i", "I");
        ctx.locals.declare("x", "J");

        for item in &module.body {
            if let ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) = item {
                ctx.gen_expr_discard(&e.expr).unwrap();
            }
        }
        assert_eq!(
            ops(&ctx),
            vec![ILOAD_0, ICONST_0 + 2, IADD, ISTORE_0, IINC, ILOAD_0, I2L, LSTORE_0 + 1]
        );
        assert_eq!(ctx.code.stack_depth(), 0);
    }

    #[test]
    fn test_unknown_variable() {
        let module = parse_expr("missing + 1;");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        let err = ctx.gen_expr(expr_of(&module)).unwrap_err();
        assert_eq!(err.to_string(), "Variable not found: missing");
    }

    #[test]
    fn test_array_and_object_literals() {
        let module = parse_expr("[1, 'two']; ({ a: 1, b });");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("b", desc::STRING);

        let exprs: Vec<&ast::Expr> = module
            .body
            .iter()
            .filter_map(|item| match item {
                ast::ModuleItem::Stmt(ast::Stmt::Expr(e)) => Some(&*e.expr),
                _ => None,
            })
            .collect();
        assert_eq!(ctx.gen_expr(exprs[0]).unwrap(), desc::ARRAY_LIST);
        assert_eq!(ctx.code.stack_depth(), 1);
        assert_eq!(ctx.gen_expr(exprs[1]).unwrap(), desc::LINKED_HASH_MAP);
        assert_eq!(ctx.code.stack_depth(), 2);

        let listed = ops(&ctx);
        assert_eq!(listed.iter().filter(|op| **op == NEW).count(), 2);
        // Both int values are boxed with Integer.valueOf
        assert_eq!(listed.iter().filter(|op| **op == INVOKESTATIC).count(), 2);
    }

    #[test]
    fn test_new_registered_class_uses_declared_constructor() {
        let module = parse_expr("new Point(1, 2);");
        let mut registry = TypeRegistry::new();
        let mut point = TypeInfo::new("geo/Point");
        point.add_method("<init>", "(DD)V", false);
        registry.register(point);
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "Lgeo/Point;");
        assert_eq!(
            ops(&ctx),
            vec![NEW, DUP, ICONST_0 + 1, I2D, ICONST_0 + 2, I2D, INVOKESPECIAL]
        );
        assert_eq!(ctx.code.stack_depth(), 1);
    }

    #[test]
    fn test_this_method_call() {
        let module = parse_expr("this.area(3);");
        let mut registry = TypeRegistry::new();
        let mut shape = TypeInfo::new("Shape");
        shape.add_method("area", "(I)D", false);
        registry.register(shape);
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, Some("Shape"), false);

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), "D");
        assert_eq!(ops(&ctx), vec![ALOAD_0, ICONST_0 + 3, INVOKEVIRTUAL]);
        assert_eq!(ctx.code.stack_depth(), 2);
    }

    #[test]
    fn test_nullish_coalescing() {
        let module = parse_expr("name ?? 'anon';");
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.locals.declare("name", desc::STRING);

        assert_eq!(ctx.gen_expr(expr_of(&module)).unwrap(), desc::STRING);
        assert_eq!(ops(&ctx), vec![ALOAD_0, DUP, IFNONNULL, POP, LDC]);
        assert_eq!(ctx.code.stack_depth(), 1);

        ctx.code.return_value(desc::STRING);
        let (code, _) = ctx.finish("(Ljava/lang/String;)Ljava/lang/String;").unwrap();
        let string = VerificationType::object("java/lang/String");
        assert_eq!(
            code.stack_map.unwrap().frames,
            vec![(
                8,
                Frame {
                    locals: vec![string.clone()],
                    stack: vec![string],
                }
            )]
        );
    }
}
