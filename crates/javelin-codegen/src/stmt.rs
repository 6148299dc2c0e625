//! Statement generation.

use javelin_types::{class, desc, slot_width};
use swc_common::Spanned;
use swc_ecma_ast as ast;

use crate::context::MethodContext;
use crate::control_flow::{block_can_fall_through, can_fall_through};
use crate::conversion;
use crate::error::{CodegenError, Result};
use crate::opcodes::*;

fn is_loop(stmt: &ast::Stmt) -> bool {
    matches!(
        stmt,
        ast::Stmt::While(_) | ast::Stmt::DoWhile(_) | ast::Stmt::For(_) | ast::Stmt::ForOf(_)
    )
}

fn stmt_kind(stmt: &ast::Stmt) -> &'static str {
    match stmt {
        ast::Stmt::Switch(_) => "switch",
        ast::Stmt::Try(_) => "try",
        ast::Stmt::ForIn(_) => "for-in",
        ast::Stmt::With(_) => "with",
        ast::Stmt::Debugger(_) => "debugger",
        ast::Stmt::Decl(ast::Decl::Fn(_)) => "nested function declaration",
        ast::Stmt::Decl(ast::Decl::Class(_)) => "nested class declaration",
        ast::Stmt::Decl(_) => "declaration",
        _ => "statement",
    }
}

impl MethodContext<'_> {
    pub fn gen_stmts(&mut self, stmts: &[ast::Stmt]) -> Result<()> {
        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn gen_stmt(&mut self, stmt: &ast::Stmt) -> Result<()> {
        match stmt {
            ast::Stmt::Block(block) => {
                self.locals.enter_scope();
                self.gen_stmts(&block.stmts)?;
                self.locals.exit_scope();
                Ok(())
            }
            ast::Stmt::Empty(_) => Ok(()),
            ast::Stmt::Expr(expr) => self.gen_expr_discard(&expr.expr),
            ast::Stmt::Decl(ast::Decl::Var(var)) => self.gen_var_decl(var),
            ast::Stmt::Return(ret) => self.gen_return(ret),
            ast::Stmt::If(if_stmt) => self.gen_if(if_stmt),
            ast::Stmt::While(while_stmt) => self.gen_while(while_stmt),
            ast::Stmt::DoWhile(do_while) => self.gen_do_while(do_while),
            ast::Stmt::For(for_stmt) => self.gen_for(for_stmt),
            ast::Stmt::ForOf(for_of) => self.gen_for_of(for_of),
            ast::Stmt::Break(brk) => self.gen_break(brk),
            ast::Stmt::Continue(cont) => self.gen_continue(cont),
            ast::Stmt::Labeled(labeled) => self.gen_labeled(labeled),
            ast::Stmt::Throw(throw) => {
                let ty = self.gen_expr(&throw.arg)?;
                if ty == desc::OBJECT || ty == desc::STRING {
                    // `throw "message"` becomes a RuntimeException
                    if ty == desc::STRING {
                        self.wrap_in_exception()?;
                    } else {
                        self.checkcast(class::THROWABLE);
                    }
                }
                self.code.athrow();
                Ok(())
            }
            other => Err(CodegenError::unsupported_statement(stmt_kind(other), other.span())),
        }
    }

    /// `String` on the stack -> `new RuntimeException(message)`.
    fn wrap_in_exception(&mut self) -> Result<()> {
        let message = self.locals.temp("message", desc::STRING);
        self.code.astore(message);
        let exception = self.pool.add_class(class::RUNTIME_EXCEPTION);
        self.code.new_object(exception);
        self.code.dup();
        self.code.aload(message);
        self.invoke(INVOKESPECIAL, class::RUNTIME_EXCEPTION, "<init>", "(Ljava/lang/String;)V")
    }

    fn gen_var_decl(&mut self, var: &ast::VarDecl) -> Result<()> {
        for declarator in &var.decls {
            match &declarator.name {
                ast::Pat::Ident(binding) => {
                    let name = binding.id.sym.to_string();
                    let ty = match &binding.type_ann {
                        Some(ann) => self.resolver().map_ts_type(&ann.type_ann),
                        None => match self.inferred_types.get(&name) {
                            Some(inferred) => inferred.clone(),
                            None => self.resolver().binding_type(binding, declarator.init.as_deref()),
                        },
                    };
                    // Initializer first: `let x = x + 1` reads the outer `x`
                    match &declarator.init {
                        Some(init) => self.gen_expr_as(init, &ty)?,
                        None => self.push_default(&ty),
                    }
                    let slot = self.locals.declare(&name, &ty);
                    log::trace!("local {} -> slot {} ({})", name, slot, ty);
                    self.code.store(&ty, slot);
                }
                pat => {
                    let init = declarator.init.as_ref().ok_or_else(|| {
                        CodegenError::unsupported_pattern("destructuring declaration without initializer", declarator.span)
                    })?;
                    let ty = self.gen_expr(init)?;
                    self.coerce(&ty, desc::OBJECT)?;
                    let annotation = match pat {
                        ast::Pat::Array(array) => array.type_ann.as_ref(),
                        ast::Pat::Object(object) => object.type_ann.as_ref(),
                        _ => None,
                    };
                    self.gen_pattern(pat, annotation.map(|ann| &*ann.type_ann))?;
                }
            }
        }
        Ok(())
    }

    fn gen_return(&mut self, ret: &ast::ReturnStmt) -> Result<()> {
        let return_type = self.return_type.descriptor().to_string();
        match &ret.arg {
            Some(arg) if self.return_type.is_void() => {
                self.gen_expr_discard(arg)?;
                self.code.return_value(desc::VOID);
            }
            Some(arg) => {
                self.gen_expr_as(arg, &return_type)?;
                self.code.return_value(&return_type);
            }
            None if self.return_type.is_void() => self.code.return_value(desc::VOID),
            None => {
                self.push_default(&return_type);
                self.code.return_value(&return_type);
            }
        }
        Ok(())
    }

    fn gen_if(&mut self, if_stmt: &ast::IfStmt) -> Result<()> {
        let base = self.code.stack_depth();
        let on_false = self.gen_jump(&if_stmt.test, false)?;
        self.gen_stmt(&if_stmt.cons)?;

        match &if_stmt.alt {
            None => {
                for patch in on_false {
                    self.code.resolve(patch);
                }
            }
            Some(alt) => {
                let skip_else = if can_fall_through(&if_stmt.cons) {
                    Some(self.code.branch(GOTO))
                } else {
                    None
                };
                for patch in on_false {
                    self.code.resolve(patch);
                }
                self.code.set_stack_depth(base);
                self.gen_stmt(alt)?;
                if let Some(patch) = skip_else {
                    self.code.resolve(patch);
                }
            }
        }
        Ok(())
    }

    fn gen_while(&mut self, while_stmt: &ast::WhileStmt) -> Result<()> {
        let head = self.code.offset();
        let exits = self.gen_jump(&while_stmt.test, false)?;
        self.push_loop(Some(head));
        self.gen_stmt(&while_stmt.body)?;
        let frame = self.pop_frame()?;
        self.code.goto_back(head);
        for patch in exits {
            self.code.resolve(patch);
        }
        self.close_frame(frame);
        Ok(())
    }

    fn gen_do_while(&mut self, do_while: &ast::DoWhileStmt) -> Result<()> {
        let head = self.code.offset();
        self.push_loop(None);
        self.gen_stmt(&do_while.body)?;
        let mut frame = self.pop_frame()?;
        self.resolve_continues(&mut frame);
        for patch in self.gen_jump(&do_while.test, true)? {
            self.code.resolve_to(patch, head);
        }
        self.close_frame(frame);
        Ok(())
    }

    fn gen_for(&mut self, for_stmt: &ast::ForStmt) -> Result<()> {
        self.locals.enter_scope();
        match &for_stmt.init {
            Some(ast::VarDeclOrExpr::VarDecl(var)) => self.gen_var_decl(var)?,
            Some(ast::VarDeclOrExpr::Expr(expr)) => self.gen_expr_discard(expr)?,
            None => {}
        }

        let head = self.code.offset();
        let exits = match &for_stmt.test {
            Some(test) => self.gen_jump(test, false)?,
            None => Vec::new(),
        };
        self.push_loop(None);
        self.gen_stmt(&for_stmt.body)?;
        let mut frame = self.pop_frame()?;
        self.resolve_continues(&mut frame);
        if let Some(update) = &for_stmt.update {
            self.gen_expr_discard(update)?;
        }
        self.code.goto_back(head);
        for patch in exits {
            self.code.resolve(patch);
        }
        self.close_frame(frame);
        self.locals.exit_scope();
        Ok(())
    }

    /// `for (const x of xs)` over an array or a `List`, as an index loop:
    ///
    /// ```text
    ///     xs; astore tmp; iconst_0; istore i
    /// head:
    ///     iload i; aload tmp; size; if_icmpge exit
    ///     aload tmp; iload i; get; <bind x>
    ///     body
    /// continue:
    ///     iinc i 1; goto head
    /// exit:
    /// ```
    fn gen_for_of(&mut self, for_of: &ast::ForOfStmt) -> Result<()> {
        if for_of.is_await {
            return Err(CodegenError::unsupported_statement("for await", for_of.span));
        }
        self.locals.enter_scope();

        let iterable = self.gen_expr(&for_of.right)?;
        let element = match iterable.strip_prefix('[') {
            Some(elem) => Some(elem.to_string()),
            None => {
                if iterable != desc::LIST && iterable != desc::ARRAY_LIST {
                    self.checkcast(class::LIST);
                }
                None
            }
        };
        let list = match &element {
            Some(_) => self.locals.temp("tempArray", &iterable),
            None => self.locals.temp("tempList", desc::LIST),
        };
        self.code.astore(list);
        let index = self.locals.temp("index", desc::INT);
        self.iconst(0);
        self.code.istore(index);

        let head = self.code.offset();
        self.code.iload(index);
        self.code.aload(list);
        match &element {
            Some(_) => self.code.simple(ARRAYLENGTH, 1, 1),
            None => self.invoke_interface(class::LIST, "size", "()I")?,
        }
        let exit = self.code.branch(IF_ICMPGE);

        self.code.aload(list);
        self.code.iload(index);
        let loaded = match &element {
            Some(elem) => {
                let op = match elem.as_str() {
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
                elem.clone()
            }
            None => {
                self.invoke_interface(class::LIST, "get", "(I)Ljava/lang/Object;")?;
                desc::OBJECT.to_string()
            }
        };
        self.bind_loop_element(&for_of.left, &loaded)?;

        self.push_loop(None);
        self.gen_stmt(&for_of.body)?;
        let mut frame = self.pop_frame()?;
        self.resolve_continues(&mut frame);
        self.code.iinc(index, 1);
        self.code.goto_back(head);
        self.code.resolve(exit);
        self.close_frame(frame);

        self.locals.exit_scope();
        Ok(())
    }

    /// Store the element on the stack into the loop variable(s).
    fn bind_loop_element(&mut self, head: &ast::ForHead, loaded: &str) -> Result<()> {
        let pat = match head {
            ast::ForHead::VarDecl(var) => match var.decls.as_slice() {
                [declarator] => &declarator.name,
                _ => return Err(CodegenError::unsupported_statement("for-of with several declarators", var.span)),
            },
            ast::ForHead::Pat(pat) => &**pat,
            ast::ForHead::UsingDecl(using) => {
                return Err(CodegenError::unsupported_statement("for-of with `using`", using.span))
            }
        };

        match pat {
            ast::Pat::Ident(binding) => {
                let ty = match &binding.type_ann {
                    Some(ann) => self.resolver().map_ts_type(&ann.type_ann),
                    None => loaded.to_string(),
                };
                let existing = match head {
                    ast::ForHead::Pat(_) => self.locals.lookup(&binding.id.sym).cloned(),
                    _ => None,
                };
                let (slot, ty) = match existing {
                    Some(local) => (local.slot, local.descriptor),
                    None => (self.locals.declare(&binding.id.sym, &ty), ty),
                };
                if loaded == desc::OBJECT {
                    conversion::unbox_or_cast(&mut self.code, self.pool, &ty)?;
                } else {
                    self.coerce(loaded, &ty)?;
                }
                self.code.store(&ty, slot);
                Ok(())
            }
            pat => {
                self.coerce(loaded, desc::OBJECT)?;
                self.gen_pattern(pat, None)
            }
        }
    }

    fn gen_break(&mut self, brk: &ast::BreakStmt) -> Result<()> {
        let label = brk.label.as_ref().map(|l| l.sym.to_string());
        if self.find_frame(label.as_deref(), false).is_none() {
            return Err(CodegenError::unsupported_statement(
                match &label {
                    Some(label) => format!("break to unknown label `{}`", label),
                    None => "break outside of a loop".to_string(),
                },
                brk.span,
            ));
        }
        let patch = self.code.branch(GOTO);
        if let Some(frame) = self.find_frame(label.as_deref(), false) {
            frame.breaks.push(patch);
        }
        Ok(())
    }

    fn gen_continue(&mut self, cont: &ast::ContinueStmt) -> Result<()> {
        let label = cont.label.as_ref().map(|l| l.sym.to_string());
        let target = match self.find_frame(label.as_deref(), true) {
            Some(frame) => frame.continue_target,
            None => {
                return Err(CodegenError::unsupported_statement(
                    match &label {
                        Some(label) => format!("continue to unknown loop label `{}`", label),
                        None => "continue outside of a loop".to_string(),
                    },
                    cont.span,
                ))
            }
        };
        match target {
            Some(head) => self.code.goto_back(head),
            None => {
                let patch = self.code.branch(GOTO);
                if let Some(frame) = self.find_frame(label.as_deref(), true) {
                    frame.continues.push(patch);
                }
            }
        }
        Ok(())
    }

    fn gen_labeled(&mut self, labeled: &ast::LabeledStmt) -> Result<()> {
        let label = labeled.label.sym.to_string();
        if is_loop(&labeled.body) {
            self.pending_label = Some(label);
            return self.gen_stmt(&labeled.body);
        }
        self.push_labeled(label);
        self.gen_stmt(&labeled.body)?;
        let frame = self.pop_frame()?;
        self.close_frame(frame);
        Ok(())
    }

    /// Generate a whole method body and append the terminal return when
    /// control can reach its end.
    pub fn gen_body(&mut self, stmts: &[ast::Stmt]) -> Result<()> {
        self.gen_stmts(stmts)?;
        if block_can_fall_through(stmts) || !self.code.ends_with_terminal() {
            self.synthesize_return();
        }
        Ok(())
    }

    /// `return` for void methods, default value + typed return otherwise.
    pub fn synthesize_return(&mut self) {
        let return_type = self.return_type.descriptor().to_string();
        if !self.return_type.is_void() {
            self.push_default(&return_type);
        }
        self.code.return_value(&return_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::ConstantPool;
    use crate::registry::TypeRegistry;
    use crate::testing::{branch_target, instructions};
    use javelin_types::ReturnType;

    fn body_of(module: &ast::Module) -> &[ast::Stmt] {
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Fn(f))) => &f.function.body.as_ref().unwrap().stmts,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn compile_body(src: &str, return_type: ReturnType) -> (Vec<u8>, u16) {
        let module = javelin_parser::parse_typescript(src, "t.ts").unwrap();
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        let descriptor = format!("(){}", return_type.descriptor());
        ctx.return_type = return_type;
        ctx.gen_body(body_of(&module)).unwrap();
        let (code, max_locals) = ctx.finish(&descriptor).unwrap();
        (code.bytes, max_locals)
    }

    fn opcodes(bytes: &[u8]) -> Vec<u8> {
        instructions(bytes).into_iter().map(|(_, op)| op).collect()
    }

    #[test]
    fn test_void_body_gets_return() {
        let (bytes, max_locals) = compile_body("function f() { let x: int = 1; }", ReturnType::Void);
        assert_eq!(bytes, vec![ICONST_0 + 1, ISTORE_0, RETURN]);
        assert_eq!(max_locals, 1);
    }

    #[test]
    fn test_explicit_return_is_not_duplicated() {
        let (bytes, _) = compile_body("function f() { return 2; }", ReturnType::Int);
        assert_eq!(bytes, vec![ICONST_0 + 2, IRETURN]);
    }

    #[test]
    fn test_if_else_both_returning() {
        let (bytes, _) = compile_body(
            "function f() { let b = true; if (b) { return 1; } else { return 2; } }",
            ReturnType::Int,
        );
        // No goto over the else branch and no synthesized return
        assert_eq!(
            opcodes(&bytes),
            vec![ICONST_0 + 1, ISTORE_0, ILOAD_0, IFEQ, ICONST_0 + 1, IRETURN, ICONST_0 + 2, IRETURN]
        );
    }

    #[test]
    fn test_if_without_else_falls_through() {
        let (bytes, _) = compile_body(
            "function f() { let n = 3; if (n > 2) { return 1; } }",
            ReturnType::Int,
        );
        let ops = opcodes(&bytes);
        assert_eq!(&ops[ops.len() - 2..], &[ICONST_0, IRETURN]);
    }

    #[test]
    fn test_while_loop_offsets() {
        let (bytes, _) = compile_body(
            "function f() { let i = 0; while (i < 10) { i++; } }",
            ReturnType::Void,
        );
        let listed = instructions(&bytes);
        let (exit_at, _) = listed.iter().copied().find(|(_, op)| *op == IF_ICMPGE).unwrap();
        let (back_at, _) = listed.iter().copied().find(|(_, op)| *op == GOTO).unwrap();
        let forward = branch_target(&bytes, exit_at) as isize - exit_at as isize;
        let backward = branch_target(&bytes, back_at) as isize - back_at as isize;
        assert!(forward > 0);
        assert!(backward < 0);
        assert_eq!(branch_target(&bytes, back_at), 2);
        assert_eq!(branch_target(&bytes, exit_at), back_at + 3);
    }

    #[test]
    fn test_break_and_continue() {
        let (bytes, _) = compile_body(
            "function f() { for (let i = 0; i < 5; i++) { if (i == 1) continue; if (i == 3) break; } }",
            ReturnType::Void,
        );
        let listed = instructions(&bytes);
        let iinc_at = listed.iter().find(|(_, op)| *op == IINC).unwrap().0;
        let gotos: Vec<usize> = listed.iter().filter(|(_, op)| *op == GOTO).map(|(at, _)| *at).collect();
        // continue, break, loop back edge
        assert_eq!(gotos.len(), 3);
        assert_eq!(branch_target(&bytes, gotos[0]), iinc_at);
        assert_eq!(branch_target(&bytes, gotos[1]), bytes.len() - 1);
        assert!(branch_target(&bytes, gotos[2]) < gotos[2]);
    }

    #[test]
    fn test_labeled_break_leaves_outer_loop() {
        let (bytes, _) = compile_body(
            "function f() { outer: while (true) { while (true) { break outer; } } }",
            ReturnType::Void,
        );
        let listed = instructions(&bytes);
        let first_goto = listed.iter().find(|(_, op)| *op == GOTO).unwrap().0;
        // The break lands on the synthesized return after both loops
        assert_eq!(branch_target(&bytes, first_goto), bytes.len() - 1);
        assert_eq!(*bytes.last().unwrap(), RETURN);
    }

    #[test]
    fn test_for_of_over_list() {
        let (bytes, max_locals) = compile_body(
            "function f() { let xs: List<int> = [1, 2]; let total = 0; for (const x of xs) { total += 1; } }",
            ReturnType::Void,
        );
        let ops = opcodes(&bytes);
        assert!(ops.contains(&INVOKEINTERFACE));
        assert!(ops.contains(&IF_ICMPGE));
        // xs, total, $tempList, $index, x
        assert_eq!(max_locals, 5);
    }

    #[test]
    fn test_unknown_label() {
        let module = javelin_parser::parse_typescript("function f() { while (true) { continue; } }", "t.ts").unwrap();
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.gen_body(body_of(&module)).unwrap();

        let module = javelin_parser::parse_typescript("function f() { break; }", "t.ts").unwrap();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        let err = ctx.gen_body(body_of(&module)).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported statement: break outside of a loop");
    }

    #[test]
    fn test_throw_string() {
        let (bytes, _) = compile_body("function f() { throw 'boom'; }", ReturnType::Void);
        let ops = opcodes(&bytes);
        assert_eq!(ops.last(), Some(&ATHROW));
        assert!(ops.contains(&NEW));
    }
}
