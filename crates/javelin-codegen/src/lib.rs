//! JVM classfile generation for Javelin
//!
//! Compiles a TypeScript module (as parsed by SWC) into JVM classfiles.
//! The entry point is [`ModuleCompiler`]; the expression, statement and
//! pattern generators hang off [`context::MethodContext`].

pub mod class_writer;
pub mod code;
pub mod compiler;
pub mod constant_pool;
pub mod context;
pub mod control_flow;
pub mod conversion;
pub mod error;
pub mod expr;
pub mod frame;
pub mod locals;
pub mod member;
pub mod opcodes;
pub mod options;
pub mod pattern;
pub mod registry;
pub mod resolver;
pub mod stmt;
pub mod string_concat;

pub use compiler::{ClassFile, ModuleCompiler};
pub use error::{CodegenError, Result};
pub use options::CompilerOptions;
pub use registry::{TypeInfo, TypeRegistry};

/// Bytecode inspection helpers shared by the unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    use javelin_types::MethodDescriptor;

    use crate::constant_pool::{Constant, ConstantPool};
    use crate::opcodes::*;

    /// `(offset, opcode)` of every instruction.
    pub fn instructions(bytes: &[u8]) -> Vec<(usize, u8)> {
        let mut out = Vec::new();
        let mut at = 0;
        while at < bytes.len() {
            out.push((at, bytes[at]));
            at += instruction_length(bytes, at);
        }
        out
    }

    /// Absolute target of the branch instruction at `at`.
    pub fn branch_target(bytes: &[u8], at: usize) -> usize {
        let delta = i16::from_be_bytes([bytes[at + 1], bytes[at + 2]]);
        (at as isize + delta as isize) as usize
    }

    #[derive(Debug)]
    pub struct ParsedMethod {
        pub access: u16,
        pub name: String,
        pub descriptor: String,
        pub code: Option<Vec<u8>>,
        pub max_stack: u16,
        pub max_locals: u16,
        /// Body of the `StackMapTable` attribute
        pub stack_map: Option<Vec<u8>>,
    }

    #[derive(Debug)]
    pub struct ParsedClass {
        pub access: u16,
        pub name: String,
        pub superclass: String,
        pub interfaces: Vec<String>,
        /// `(access, name, descriptor)`
        pub fields: Vec<(u16, String, String)>,
        pub methods: Vec<ParsedMethod>,
        pub signature: Option<String>,
    }

    impl ParsedClass {
        pub fn method(&self, name: &str) -> &ParsedMethod {
            self.methods
                .iter()
                .find(|m| m.name == name)
                .unwrap_or_else(|| panic!("{} has no method {}", self.name, name))
        }
    }

    /// Offsets of the frames in a `StackMapTable` body.
    pub fn frame_offsets(table: &[u8]) -> Vec<usize> {
        fn skip_type(r: &mut Reader<'_>) {
            if matches!(r.u1(), 7 | 8) {
                r.u2();
            }
        }

        let mut r = Reader { bytes: table, at: 0 };
        let mut offsets = Vec::new();
        let mut previous: Option<usize> = None;
        for _ in 0..r.u2() {
            let kind = r.u1();
            let delta = match kind {
                0..=63 => kind as usize,
                64..=127 => {
                    skip_type(&mut r);
                    (kind - 64) as usize
                }
                247 => {
                    let delta = r.u2();
                    skip_type(&mut r);
                    delta as usize
                }
                248..=251 => r.u2() as usize,
                252..=254 => {
                    let delta = r.u2();
                    for _ in 0..kind - 251 {
                        skip_type(&mut r);
                    }
                    delta as usize
                }
                255 => {
                    let delta = r.u2();
                    for _ in 0..r.u2() {
                        skip_type(&mut r);
                    }
                    for _ in 0..r.u2() {
                        skip_type(&mut r);
                    }
                    delta as usize
                }
                other => panic!("reserved frame type {}", other),
            };
            let offset = previous.map_or(delta, |p| p + delta + 1);
            offsets.push(offset);
            previous = Some(offset);
        }
        assert_eq!(r.at, table.len(), "trailing bytes after the last frame");
        offsets
    }

    /// Runtime value of [`execute`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum Value {
        Null,
        /// Both `int` and `Integer`
        Int(i32),
        Str(String),
        List(Rc<RefCell<Vec<Value>>>),
        /// Insertion ordered
        Map(Rc<RefCell<Vec<(Value, Value)>>>),
        Iter(Rc<RefCell<VecDeque<Value>>>),
        Entry(Box<Value>, Box<Value>),
        /// Result of `new` before its constructor ran
        Uninit(String),
    }

    impl Value {
        pub fn list(items: Vec<Value>) -> Self {
            Value::List(Rc::new(RefCell::new(items)))
        }

        pub fn ints(items: &[i32]) -> Self {
            Value::list(items.iter().map(|&v| Value::Int(v)).collect())
        }

        pub fn map(entries: &[(&str, i32)]) -> Self {
            let entries = entries
                .iter()
                .map(|(k, v)| (Value::Str(k.to_string()), Value::Int(*v)))
                .collect();
            Value::Map(Rc::new(RefCell::new(entries)))
        }

        pub fn as_int(&self) -> i32 {
            match self {
                Value::Int(v) => *v,
                other => panic!("not an int: {:?}", other),
            }
        }

        pub fn as_ints(&self) -> Vec<i32> {
            match self {
                Value::List(items) => items.borrow().iter().map(Value::as_int).collect(),
                other => panic!("not a list: {:?}", other),
            }
        }

        /// `(key, int value)` pairs of a map with string keys.
        pub fn as_entries(&self) -> Vec<(String, i32)> {
            match self {
                Value::Map(entries) => entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| match k {
                        Value::Str(k) => (k.clone(), v.as_int()),
                        other => panic!("non-string key {:?}", other),
                    })
                    .collect(),
                other => panic!("not a map: {:?}", other),
            }
        }
    }

    fn construct(class: &str) -> Value {
        match class {
            "java/util/ArrayList" => Value::list(Vec::new()),
            "java/util/LinkedHashMap" | "java/util/HashMap" => Value::Map(Rc::new(RefCell::new(Vec::new()))),
            other => panic!("cannot construct {}", other),
        }
    }

    fn call(name: &str, receiver: &Value, mut args: Vec<Value>) -> Value {
        match (name, receiver) {
            ("valueOf", _) => args.remove(0),
            ("intValue", value) => value.clone(),
            ("equals", value) => Value::Int((*value == args[0]) as i32),
            ("size", Value::List(items)) => Value::Int(items.borrow().len() as i32),
            ("size", Value::Map(entries)) => Value::Int(entries.borrow().len() as i32),
            ("get", Value::List(items)) => {
                let item = items.borrow()[args[0].as_int() as usize].clone();
                item
            }
            ("get", Value::Map(entries)) => {
                let value = entries.borrow().iter().find(|(k, _)| *k == args[0]).map(|(_, v)| v.clone());
                value.unwrap_or(Value::Null)
            }
            ("add", Value::List(items)) => {
                items.borrow_mut().push(args.remove(0));
                Value::Int(1)
            }
            ("put", Value::Map(entries)) => {
                let value = args.pop().unwrap_or(Value::Null);
                let key = args.pop().unwrap_or(Value::Null);
                let mut entries = entries.borrow_mut();
                let previous = match entries.iter().position(|(k, _)| *k == key) {
                    Some(i) => std::mem::replace(&mut entries[i].1, value),
                    None => {
                        entries.push((key, value));
                        Value::Null
                    }
                };
                previous
            }
            ("entrySet", Value::Map(entries)) => Value::list(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::Entry(Box::new(k.clone()), Box::new(v.clone())))
                    .collect(),
            ),
            ("iterator", Value::List(items)) => Value::Iter(Rc::new(RefCell::new(items.borrow().iter().cloned().collect()))),
            ("hasNext", Value::Iter(queue)) => Value::Int(!queue.borrow().is_empty() as i32),
            ("next", Value::Iter(queue)) => {
                let next = queue.borrow_mut().pop_front();
                next.unwrap_or_else(|| panic!("iterator exhausted"))
            }
            ("getKey", Value::Entry(key, _)) => (**key).clone(),
            ("getValue", Value::Entry(_, value)) => (**value).clone(),
            (name, receiver) => panic!("no model for {} on {:?}", name, receiver),
        }
    }

    /// Interpret `bytes` over lists, maps, ints and strings, the values
    /// destructuring code moves around. Runs until a return or the end of
    /// the code and yields the returned value.
    pub fn execute(bytes: &[u8], pool: &ConstantPool, locals: &mut Vec<Value>) -> Option<Value> {
        fn store(locals: &mut Vec<Value>, slot: usize, value: Value) {
            if locals.len() <= slot {
                locals.resize(slot + 1, Value::Null);
            }
            locals[slot] = value;
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;
        for _ in 0..100_000 {
            if pc == bytes.len() {
                return None;
            }
            let op = bytes[pc];
            let mut next = pc + instruction_length(bytes, pc);
            let u1 = || bytes[pc + 1];
            let u2 = || u16::from_be_bytes([bytes[pc + 1], bytes[pc + 2]]);
            let mut pop = || stack.pop().unwrap_or_else(|| panic!("stack underflow at {}", pc));

            match op {
                NOP | CHECKCAST => {}
                ACONST_NULL => stack.push(Value::Null),
                _ if (ICONST_M1..LCONST_0).contains(&op) => stack.push(Value::Int(op as i32 - ICONST_0 as i32)),
                BIPUSH => stack.push(Value::Int(u1() as i8 as i32)),
                SIPUSH => stack.push(Value::Int(u2() as i16 as i32)),
                LDC | LDC_W => {
                    let index = if op == LDC { u1() as u16 } else { u2() };
                    let value = match pool.get(index) {
                        Some(Constant::Integer(v)) => Value::Int(*v),
                        Some(Constant::String(s)) => Value::Str(pool.utf8(*s).unwrap_or_default().to_string()),
                        other => panic!("cannot load {:?}", other),
                    };
                    stack.push(value);
                }
                ILOAD | ALOAD => stack.push(locals.get(u1() as usize).cloned().unwrap_or(Value::Null)),
                _ if (ILOAD_0..ILOAD_0 + 4).contains(&op) => stack.push(locals[(op - ILOAD_0) as usize].clone()),
                _ if (ALOAD_0..ALOAD_0 + 4).contains(&op) => stack.push(locals[(op - ALOAD_0) as usize].clone()),
                ISTORE | ASTORE => {
                    let value = pop();
                    store(locals, u1() as usize, value);
                }
                _ if (ISTORE_0..ISTORE_0 + 4).contains(&op) => {
                    let value = pop();
                    store(locals, (op - ISTORE_0) as usize, value);
                }
                _ if (ASTORE_0..ASTORE_0 + 4).contains(&op) => {
                    let value = pop();
                    store(locals, (op - ASTORE_0) as usize, value);
                }
                POP => {
                    pop();
                }
                DUP => {
                    let top = pop();
                    stack.push(top.clone());
                    stack.push(top);
                }
                IINC => {
                    let slot = u1() as usize;
                    let delta = bytes[pc + 2] as i8 as i32;
                    locals[slot] = Value::Int(locals[slot].as_int() + delta);
                }
                IFEQ | IFNE => {
                    let zero = pop().as_int() == 0;
                    if zero == (op == IFEQ) {
                        next = branch_target(bytes, pc);
                    }
                }
                IF_ICMPEQ..=IF_ICMPLE => {
                    let b = pop().as_int();
                    let a = pop().as_int();
                    let taken = match op {
                        IF_ICMPEQ => a == b,
                        IF_ICMPNE => a != b,
                        IF_ICMPLT => a < b,
                        IF_ICMPGE => a >= b,
                        IF_ICMPGT => a > b,
                        _ => a <= b,
                    };
                    if taken {
                        next = branch_target(bytes, pc);
                    }
                }
                IFNULL | IFNONNULL => {
                    let null = pop() == Value::Null;
                    if null == (op == IFNULL) {
                        next = branch_target(bytes, pc);
                    }
                }
                GOTO => next = branch_target(bytes, pc),
                NEW => {
                    let class = pool.class_name(u2()).unwrap_or_default().to_string();
                    stack.push(Value::Uninit(class));
                }
                INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                    let (owner, name, descriptor) = pool.member(u2()).unwrap_or_else(|| panic!("bad member at {}", pc));
                    let md = MethodDescriptor::parse(descriptor).unwrap();
                    let args = stack.split_off(stack.len() - md.params.len());
                    let receiver = if op == INVOKESTATIC { Value::Null } else { stack.pop().unwrap() };
                    if name == "<init>" {
                        let object = construct(owner);
                        for slot in stack.iter_mut() {
                            if *slot == receiver {
                                *slot = object.clone();
                            }
                        }
                    } else {
                        let result = call(name, &receiver, args);
                        if md.ret != "V" {
                            stack.push(result);
                        }
                    }
                }
                IRETURN | ARETURN => return stack.pop(),
                RETURN => return None,
                other => panic!("no model for opcode {:#04x} at {}", other, pc),
            }
            pc = next;
        }
        panic!("execution did not terminate")
    }

    struct Reader<'b> {
        bytes: &'b [u8],
        at: usize,
    }

    impl<'b> Reader<'b> {
        fn take(&mut self, n: usize) -> &'b [u8] {
            let slice = &self.bytes[self.at..self.at + n];
            self.at += n;
            slice
        }

        fn u1(&mut self) -> u8 {
            self.take(1)[0]
        }

        fn u2(&mut self) -> u16 {
            let b = self.take(2);
            u16::from_be_bytes([b[0], b[1]])
        }

        fn u4(&mut self) -> u32 {
            let b = self.take(4);
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        }
    }

    /// Decode the parts of a classfile the tests look at.
    pub fn parse_class(bytes: &[u8]) -> ParsedClass {
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        let mut r = Reader { bytes, at: 8 };

        let count = r.u2();
        let mut utf8 = HashMap::new();
        let mut classes = HashMap::new();
        let mut index = 1;
        while index < count {
            match r.u1() {
                1 => {
                    let len = r.u2() as usize;
                    utf8.insert(index, String::from_utf8_lossy(r.take(len)).into_owned());
                }
                7 => {
                    classes.insert(index, r.u2());
                }
                8 | 16 | 19 | 20 => {
                    r.u2();
                }
                15 => {
                    r.take(3);
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    r.take(4);
                }
                5 | 6 => {
                    r.take(8);
                    index += 1;
                }
                tag => panic!("unknown constant tag {}", tag),
            }
            index += 1;
        }
        let class_name = |i: u16| utf8[&classes[&i]].clone();

        let access = r.u2();
        let name = class_name(r.u2());
        let superclass = class_name(r.u2());
        let interfaces = (0..r.u2()).map(|_| class_name(r.u2())).collect();

        let mut fields = Vec::new();
        for _ in 0..r.u2() {
            let access = r.u2();
            let name = utf8[&r.u2()].clone();
            let descriptor = utf8[&r.u2()].clone();
            for _ in 0..r.u2() {
                r.u2();
                let len = r.u4() as usize;
                r.take(len);
            }
            fields.push((access, name, descriptor));
        }

        let mut methods = Vec::new();
        for _ in 0..r.u2() {
            let mut method = ParsedMethod {
                access: r.u2(),
                name: utf8[&r.u2()].clone(),
                descriptor: utf8[&r.u2()].clone(),
                code: None,
                max_stack: 0,
                max_locals: 0,
                stack_map: None,
            };
            for _ in 0..r.u2() {
                let attribute = utf8[&r.u2()].clone();
                let len = r.u4() as usize;
                if attribute == "Code" {
                    method.max_stack = r.u2();
                    method.max_locals = r.u2();
                    let code_len = r.u4() as usize;
                    method.code = Some(r.take(code_len).to_vec());
                    let handlers = r.u2() as usize;
                    r.take(handlers * 8);
                    for _ in 0..r.u2() {
                        let sub = utf8[&r.u2()].clone();
                        let sub_len = r.u4() as usize;
                        let body = r.take(sub_len);
                        if sub == "StackMapTable" {
                            method.stack_map = Some(body.to_vec());
                        }
                    }
                } else {
                    r.take(len);
                }
            }
            methods.push(method);
        }

        let mut signature = None;
        for _ in 0..r.u2() {
            let attribute = utf8[&r.u2()].clone();
            let len = r.u4() as usize;
            if attribute == "Signature" {
                signature = Some(utf8[&r.u2()].clone());
            } else {
                r.take(len);
            }
        }
        assert_eq!(r.at, bytes.len(), "trailing bytes after the class attributes");

        ParsedClass {
            access,
            name,
            superclass,
            interfaces,
            fields,
            methods,
            signature,
        }
    }
}
