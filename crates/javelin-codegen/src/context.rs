//! Generation state threaded through the expression and statement
//! generators.
//!
//! [`ClassContext`] is the per-class view: which class is being emitted and
//! what it extends. [`MethodContext`] owns one method body's instruction
//! stream and locals and borrows the class's constant pool.

use std::collections::HashMap;

use javelin_types::{class, desc, MethodDescriptor, ReturnType};

use crate::code::{CodeBuffer, FinishedCode, Patch};
use crate::constant_pool::ConstantPool;
use crate::conversion;
use crate::error::{CodegenError, Result};
use crate::frame::{self, MethodShape};
use crate::locals::LocalTable;
use crate::opcodes::*;
use crate::registry::{TypeInfo, TypeRegistry};
use crate::resolver::Resolver;

/// The class whose members are being generated.
#[derive(Debug, Clone)]
pub struct ClassContext<'r> {
    pub registry: &'r TypeRegistry,
    pub internal_name: String,
    pub superclass: String,
    /// Class holding the module's free functions
    pub module_class: Option<String>,
}

impl<'r> ClassContext<'r> {
    pub fn new(registry: &'r TypeRegistry, internal_name: impl Into<String>, superclass: impl Into<String>) -> Self {
        Self {
            registry,
            internal_name: internal_name.into(),
            superclass: superclass.into(),
            module_class: None,
        }
    }

    pub fn with_module_class(mut self, module_class: impl Into<String>) -> Self {
        self.module_class = Some(module_class.into());
        self
    }

    pub fn info(&self) -> Option<&'r TypeInfo> {
        self.registry.resolve_internal(&self.internal_name)
    }

    /// Context for one method body of this class.
    pub fn method<'c>(&'c self, pool: &'c mut ConstantPool, is_static: bool) -> MethodContext<'c> {
        let mut ctx = MethodContext::new(self.registry, pool, Some(&self.internal_name), is_static);
        ctx.module_class = self.module_class.as_deref();
        ctx
    }

    /// Like [`method`](Self::method), with `super(...)` bound to the
    /// superclass constructor.
    pub fn constructor<'c>(&'c self, pool: &'c mut ConstantPool) -> MethodContext<'c> {
        let mut ctx = self.method(pool, false);
        ctx.superclass = Some(&self.superclass);
        ctx
    }
}

/// Jump targets of an enclosing loop or labeled statement.
#[derive(Debug)]
pub(crate) struct JumpFrame {
    pub label: Option<String>,
    pub is_loop: bool,
    /// Known continue target (loop head), or `None` when continues are
    /// patched once the increment step is emitted
    pub continue_target: Option<usize>,
    pub breaks: Vec<Patch>,
    pub continues: Vec<Patch>,
}

/// State for one method body.
pub struct MethodContext<'c> {
    pub registry: &'c TypeRegistry,
    pub pool: &'c mut ConstantPool,
    /// Internal name of the enclosing class; `None` for free functions
    pub class_name: Option<&'c str>,
    /// Superclass of the enclosing class, the target of `super(...)`
    pub superclass: Option<&'c str>,
    /// Class holding the module's free functions
    pub module_class: Option<&'c str>,
    pub code: CodeBuffer,
    pub locals: LocalTable,
    /// Variable types collected from the body before generation
    pub inferred_types: HashMap<String, String>,
    pub return_type: ReturnType,
    pub is_static: bool,
    pub(crate) frames: Vec<JumpFrame>,
    /// Label waiting to be claimed by the loop it is attached to
    pub(crate) pending_label: Option<String>,
}

impl<'c> MethodContext<'c> {
    pub fn new(
        registry: &'c TypeRegistry,
        pool: &'c mut ConstantPool,
        class_name: Option<&'c str>,
        is_static: bool,
    ) -> Self {
        Self {
            registry,
            pool,
            class_name,
            superclass: None,
            module_class: None,
            code: CodeBuffer::new(),
            locals: LocalTable::new(is_static),
            inferred_types: HashMap::new(),
            return_type: ReturnType::Void,
            is_static,
            frames: Vec::new(),
            pending_label: None,
        }
    }

    pub fn resolver(&self) -> Resolver<'_> {
        let mut resolver = Resolver::new(self.registry, &self.inferred_types).with_locals(&self.locals);
        if let Some(module) = self.module_class {
            resolver = resolver.with_module_class(module);
        }
        match self.class_name {
            Some(class) => resolver.with_class(class),
            None => resolver,
        }
    }

    /// Static type of `expr`, with the null literal typed as Object.
    pub fn describe(&self, expr: &swc_ecma_ast::Expr) -> String {
        self.resolver()
            .describe(expr)
            .unwrap_or_else(|| desc::OBJECT.to_string())
    }

    pub fn current_type(&self) -> Option<&'c TypeInfo> {
        self.class_name
            .and_then(|class| self.registry.resolve_internal(class))
    }

    /// Freeze the body of a method with `descriptor` and compute its
    /// verification frames.
    pub fn finish(self, descriptor: &str) -> Result<(FinishedCode, u16)> {
        let max_locals = self.locals.max_locals();
        let mut code = self.code.finish()?;
        let shape = MethodShape {
            class_name: self.class_name.unwrap_or(class::OBJECT),
            descriptor,
            is_static: self.is_static,
            is_constructor: self.superclass.is_some(),
        };
        frame::compute(&mut code, &shape, self.pool, self.registry)?;
        Ok((code, max_locals))
    }

    // ---- emission shortcuts ----

    pub fn coerce(&mut self, from: &str, to: &str) -> Result<()> {
        conversion::coerce(&mut self.code, self.pool, from, to)
    }

    pub fn checkcast(&mut self, internal_name: &str) {
        let class = self.pool.add_class(internal_name);
        self.code.checkcast(class);
    }

    pub fn ldc_string(&mut self, value: &str) {
        self.code.ldc_string(self.pool, value);
    }

    pub fn iconst(&mut self, value: i32) {
        self.code.iconst(self.pool, value);
    }

    /// `invokevirtual`, `invokespecial` or `invokestatic` on a class method.
    pub fn invoke(&mut self, op: u8, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let md = MethodDescriptor::parse(descriptor)?;
        let method = self.pool.add_method_ref(owner, name, descriptor);
        self.code.invoke(op, method, md.arg_slots(), md.ret_slots());
        Ok(())
    }

    pub fn invoke_interface(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let md = MethodDescriptor::parse(descriptor)?;
        let method = self.pool.add_interface_method_ref(owner, name, descriptor);
        self.code.invokeinterface(method, md.arg_slots(), md.ret_slots());
        Ok(())
    }

    /// `new C; dup; invokespecial C.<init>()V`
    pub fn new_instance(&mut self, internal_name: &str) -> Result<()> {
        let class = self.pool.add_class(internal_name);
        self.code.new_object(class);
        self.code.dup();
        self.invoke(INVOKESPECIAL, internal_name, "<init>", "()V")
    }

    /// Zero value of `descriptor`, used for uninitialized declarations and
    /// synthesized returns.
    pub fn push_default(&mut self, descriptor: &str) {
        match descriptor {
            "Z" | "B" | "C" | "S" | "I" => self.iconst(0),
            "J" => self.code.lconst(self.pool, 0),
            "F" => self.code.fconst(self.pool, 0.0),
            "D" => self.code.dconst(self.pool, 0.0),
            _ => self.code.aconst_null(),
        }
    }

    // ---- jump frames ----

    /// Enter a loop, claiming a label attached to it.
    pub(crate) fn push_loop(&mut self, continue_target: Option<usize>) {
        let label = self.pending_label.take();
        self.frames.push(JumpFrame {
            label,
            is_loop: true,
            continue_target,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    /// Enter a labeled statement that is not a loop; only `break label`
    /// can target it.
    pub(crate) fn push_labeled(&mut self, label: String) {
        self.frames.push(JumpFrame {
            label: Some(label),
            is_loop: false,
            continue_target: None,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    pub(crate) fn pop_frame(&mut self) -> Result<JumpFrame> {
        self.frames
            .pop()
            .ok_or_else(|| CodegenError::Internal("jump frame stack underflow".to_string()))
    }

    /// Resolve forward continues at the current offset (the loop's
    /// increment step).
    pub(crate) fn resolve_continues(&mut self, frame: &mut JumpFrame) {
        for patch in frame.continues.drain(..) {
            self.code.resolve(patch);
        }
    }

    /// Resolve every pending break of `frame` at the current offset.
    pub(crate) fn close_frame(&mut self, frame: JumpFrame) {
        for patch in frame.breaks {
            self.code.resolve(patch);
        }
    }

    pub(crate) fn find_frame(&mut self, label: Option<&str>, for_continue: bool) -> Option<&mut JumpFrame> {
        self.frames.iter_mut().rev().find(|frame| {
            let matches = match label {
                Some(label) => frame.label.as_deref() == Some(label),
                None => frame.is_loop,
            };
            matches && (!for_continue || frame.is_loop)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use javelin_types::ReturnType;

    #[test]
    fn test_describe_defaults_null_to_object() {
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let ctx = MethodContext::new(&registry, &mut pool, None, true);
        let module = javelin_parser::parse_typescript("null;", "t.ts").unwrap();
        let expr = match &module.body[0] {
            swc_ecma_ast::ModuleItem::Stmt(swc_ecma_ast::Stmt::Expr(e)) => &*e.expr,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(ctx.describe(expr), desc::OBJECT);
        assert_eq!(ctx.return_type, ReturnType::Void);
    }

    #[test]
    fn test_push_default_forms() {
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.push_default("I");
        ctx.push_default("J");
        ctx.push_default(desc::STRING);
        assert_eq!(ctx.code.bytes(), &[ICONST_0, LCONST_0, ACONST_NULL]);
        assert_eq!(ctx.code.stack_depth(), 4);
    }

    #[test]
    fn test_class_context_binds_constructor_superclass() {
        let mut registry = TypeRegistry::new();
        registry.register(TypeInfo::new("geo/Circle"));
        let class = ClassContext::new(&registry, "geo/Circle", "geo/Shape").with_module_class("geo/Main");
        assert_eq!(class.info().map(|i| i.simple_name.as_str()), Some("Circle"));

        let mut pool = ConstantPool::new();
        let method = class.method(&mut pool, true);
        assert_eq!(method.class_name, Some("geo/Circle"));
        assert_eq!(method.module_class, Some("geo/Main"));
        assert!(method.superclass.is_none());
        drop(method);

        let ctor = class.constructor(&mut pool);
        assert_eq!(ctor.superclass, Some("geo/Shape"));
        assert!(!ctor.is_static);
    }

    #[test]
    fn test_labeled_frames() {
        let registry = TypeRegistry::new();
        let mut pool = ConstantPool::new();
        let mut ctx = MethodContext::new(&registry, &mut pool, None, true);
        ctx.pending_label = Some("outer".to_string());
        ctx.push_loop(Some(0));
        ctx.push_labeled("block".to_string());
        assert!(ctx.pending_label.is_none());

        assert!(ctx.find_frame(Some("outer"), true).is_some());
        assert!(ctx.find_frame(Some("block"), false).is_some());
        assert!(ctx.find_frame(Some("block"), true).is_none());
        // An unlabeled break targets the innermost loop, not a labeled block
        assert_eq!(ctx.find_frame(None, false).map(|f| f.is_loop), Some(true));
        assert!(ctx.find_frame(Some("missing"), false).is_none());
    }
}
