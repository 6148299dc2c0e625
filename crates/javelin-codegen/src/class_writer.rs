//! Classfile serialization.

use crate::code::FinishedCode;
use crate::constant_pool::ConstantPool;
use crate::error::{CodegenError, Result};

pub const MAGIC: u32 = 0xCAFE_BABE;

pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
}

#[derive(Debug, Clone)]
struct FieldEntry {
    access: u16,
    name: u16,
    descriptor: u16,
}

#[derive(Debug, Clone)]
struct MethodEntry {
    access: u16,
    name: u16,
    descriptor: u16,
    /// `None` for abstract methods
    code: Option<CodeAttribute>,
}

#[derive(Debug, Clone)]
struct CodeAttribute {
    max_stack: u16,
    max_locals: u16,
    bytes: Vec<u8>,
    /// Encoded `StackMapTable` body
    stack_map: Option<Vec<u8>>,
}

/// First classfile version whose verifier requires `StackMapTable`.
const STACK_MAP_VERSION: u16 = 50;

/// One class being assembled. Owns the class's constant pool; method
/// bodies borrow it through [`ClassWriter::pool_mut`] while they are
/// generated.
#[derive(Debug)]
pub struct ClassWriter {
    pool: ConstantPool,
    major_version: u16,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldEntry>,
    methods: Vec<MethodEntry>,
    signature: Option<u16>,
}

impl ClassWriter {
    pub fn new(internal_name: &str, superclass: &str, major_version: u16) -> Self {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(internal_name);
        let super_class = pool.add_class(superclass);
        Self {
            pool,
            major_version,
            access: access::PUBLIC | access::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
        }
    }

    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    pub fn set_access(&mut self, flags: u16) {
        self.access = flags;
    }

    pub fn add_interface(&mut self, internal_name: &str) {
        let index = self.pool.add_class(internal_name);
        if !self.interfaces.contains(&index) {
            self.interfaces.push(index);
        }
    }

    /// Generic signature of the class, e.g. `<T:Ljava/lang/Object;>Ljava/lang/Object;`.
    pub fn set_signature(&mut self, signature: &str) {
        self.signature = Some(self.pool.add_utf8(signature));
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) {
        let name = self.pool.add_utf8(name);
        let descriptor = self.pool.add_utf8(descriptor);
        self.fields.push(FieldEntry {
            access,
            name,
            descriptor,
        });
    }

    pub fn add_method(&mut self, access: u16, name: &str, descriptor: &str, code: FinishedCode, max_locals: u16) {
        let name = self.pool.add_utf8(name);
        let descriptor = self.pool.add_utf8(descriptor);
        let stack_map = match &code.stack_map {
            Some(map) if self.major_version >= STACK_MAP_VERSION => Some(map.encode(&mut self.pool)),
            _ => None,
        };
        self.methods.push(MethodEntry {
            access,
            name,
            descriptor,
            code: Some(CodeAttribute {
                max_stack: code.max_stack,
                max_locals,
                bytes: code.bytes,
                stack_map,
            }),
        });
    }

    pub fn add_abstract_method(&mut self, access: u16, name: &str, descriptor: &str) {
        let name = self.pool.add_utf8(name);
        let descriptor = self.pool.add_utf8(descriptor);
        self.methods.push(MethodEntry {
            access: access | access::ABSTRACT,
            name,
            descriptor,
            code: None,
        });
    }

    /// Serialize the class. Fails if the constant pool overflowed, a string
    /// constant does not fit a `CONSTANT_Utf8` entry, or a method body
    /// exceeds the 64 KiB code limit.
    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        // Attribute names must be in the pool before it is written
        let code_name = self.pool.add_utf8("Code");
        let has_stack_maps = self
            .methods
            .iter()
            .any(|m| m.code.as_ref().map_or(false, |c| c.stack_map.is_some()));
        let stack_map_name = has_stack_maps.then(|| self.pool.add_utf8("StackMapTable"));
        let signature_name = self.signature.map(|_| self.pool.add_utf8("Signature"));
        if self.pool.overflowed() {
            return Err(CodegenError::Internal("constant pool exceeds 65535 entries".to_string()));
        }
        if let Some(length) = self.pool.oversized_utf8() {
            return Err(CodegenError::Internal(format!(
                "string constant of {} bytes exceeds the 65535-byte limit",
                length
            )));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.pool.write(&mut out);

        u2(&mut out, self.access);
        u2(&mut out, self.this_class);
        u2(&mut out, self.super_class);
        u2(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            u2(&mut out, *interface);
        }

        u2(&mut out, self.fields.len() as u16);
        for field in &self.fields {
            u2(&mut out, field.access);
            u2(&mut out, field.name);
            u2(&mut out, field.descriptor);
            u2(&mut out, 0);
        }

        u2(&mut out, self.methods.len() as u16);
        for method in &self.methods {
            u2(&mut out, method.access);
            u2(&mut out, method.name);
            u2(&mut out, method.descriptor);
            match &method.code {
                None => u2(&mut out, 0),
                Some(code) => {
                    if code.bytes.len() > u16::MAX as usize {
                        return Err(CodegenError::Internal(format!(
                            "method body of {} bytes exceeds the code size limit",
                            code.bytes.len()
                        )));
                    }
                    let frames = code.stack_map.as_ref().zip(stack_map_name);
                    u2(&mut out, 1);
                    u2(&mut out, code_name);
                    // max_stack, max_locals, code_length, code, exception table, attributes
                    let mut length = 2 + 2 + 4 + code.bytes.len() + 2 + 2;
                    if let Some((table, _)) = frames {
                        length += 2 + 4 + table.len();
                    }
                    out.extend_from_slice(&(length as u32).to_be_bytes());
                    u2(&mut out, code.max_stack);
                    u2(&mut out, code.max_locals);
                    out.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.bytes);
                    u2(&mut out, 0);
                    match frames {
                        Some((table, name)) => {
                            u2(&mut out, 1);
                            u2(&mut out, name);
                            out.extend_from_slice(&(table.len() as u32).to_be_bytes());
                            out.extend_from_slice(table);
                        }
                        None => u2(&mut out, 0),
                    }
                }
            }
        }

        match (signature_name, self.signature) {
            (Some(name), Some(signature)) => {
                u2(&mut out, 1);
                u2(&mut out, name);
                out.extend_from_slice(&2u32.to_be_bytes());
                u2(&mut out, signature);
            }
            _ => u2(&mut out, 0),
        }
        Ok(out)
    }
}

fn u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}
