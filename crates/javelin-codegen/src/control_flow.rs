//! Fallthrough analysis.

use swc_ecma_ast as ast;

/// Whether control can reach the end of `stmt`.
///
/// Conservative in the "true" direction: loops, switches and `try` are
/// assumed to fall through, so at worst an unreachable return is emitted.
pub fn can_fall_through(stmt: &ast::Stmt) -> bool {
    match stmt {
        ast::Stmt::Return(_)
        | ast::Stmt::Throw(_)
        | ast::Stmt::Break(_)
        | ast::Stmt::Continue(_) => false,
        ast::Stmt::Block(block) => block_can_fall_through(&block.stmts),
        ast::Stmt::If(if_stmt) => match &if_stmt.alt {
            None => true,
            Some(alt) => can_fall_through(&if_stmt.cons) || can_fall_through(alt),
        },
        ast::Stmt::Labeled(labeled) => {
            can_fall_through(&labeled.body) || breaks_to(&labeled.body, &labeled.label.sym)
        }
        _ => true,
    }
}

/// Whether `stmt` contains a `break label`.
fn breaks_to(stmt: &ast::Stmt, label: &str) -> bool {
    match stmt {
        ast::Stmt::Break(b) => b.label.as_ref().map_or(false, |l| &*l.sym == label),
        ast::Stmt::Block(block) => block.stmts.iter().any(|s| breaks_to(s, label)),
        ast::Stmt::If(if_stmt) => {
            breaks_to(&if_stmt.cons, label)
                || if_stmt.alt.as_deref().map_or(false, |alt| breaks_to(alt, label))
        }
        ast::Stmt::Labeled(l) => breaks_to(&l.body, label),
        ast::Stmt::While(w) => breaks_to(&w.body, label),
        ast::Stmt::DoWhile(w) => breaks_to(&w.body, label),
        ast::Stmt::For(f) => breaks_to(&f.body, label),
        ast::Stmt::ForOf(f) => breaks_to(&f.body, label),
        ast::Stmt::ForIn(f) => breaks_to(&f.body, label),
        _ => false,
    }
}

/// A statement list falls through unless one of its statements does not.
pub fn block_can_fall_through(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().all(can_fall_through)
}

#[cfg(test)]
mod tests {
    use super::*;
    use javelin_parser::parse_typescript;

    fn body_falls_through(src: &str) -> bool {
        let module = parse_typescript(src, "test.ts").unwrap();
        match &module.body[0] {
            ast::ModuleItem::Stmt(ast::Stmt::Decl(ast::Decl::Fn(f))) => {
                block_can_fall_through(&f.function.body.as_ref().unwrap().stmts)
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_statements() {
        assert!(!body_falls_through("function f() { return 1; }"));
        assert!(!body_falls_through("function f() { throw new Error('x'); }"));
        assert!(!body_falls_through("function f() { while (true) { break; } return; }"));
        assert!(body_falls_through("function f() { while (true) { break; } }"));
    }

    #[test]
    fn test_empty_and_plain_blocks() {
        assert!(body_falls_through("function f() {}"));
        assert!(body_falls_through("function f() { let x = 1; x = 2; }"));
        assert!(!body_falls_through("function f() { { return; } }"));
    }

    #[test]
    fn test_if_statements() {
        assert!(body_falls_through("function f() { if (a) return 1; }"));
        assert!(!body_falls_through("function f() { if (a) return 1; else return 2; }"));
        assert!(body_falls_through("function f() { if (a) return 1; else b(); }"));
        assert!(body_falls_through("function f() { if (a) { b(); } else { return 2; } }"));
        assert!(!body_falls_through(
            "function f() { if (a) { return 1; } else if (b) { return 2; } else { throw x; } }"
        ));
    }

    #[test]
    fn test_labeled() {
        assert!(!body_falls_through("function f() { outer: { return 1; } }"));
        assert!(body_falls_through(
            "function f() { outer: { if (a) { break outer; } return 1; } }"
        ));
    }
}
