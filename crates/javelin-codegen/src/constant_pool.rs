//! Deduplicating constant pool.
//!
//! Every `add_*` call interns its argument: asking twice for the same
//! (kind, owner, name, descriptor) tuple returns the index handed out the
//! first time. Index 0 is reserved by the classfile format and `long` /
//! `double` entries occupy two consecutive indices.

use std::collections::HashMap;

/// A constant pool entry as written to the classfile.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
}

impl Constant {
    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Constant::Utf8(value) => {
                let encoded = modified_utf8(value);
                out.push(tags::UTF8);
                out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                out.extend_from_slice(&encoded);
            }
            Constant::Integer(v) => {
                out.push(tags::INTEGER);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Constant::Float(v) => {
                out.push(tags::FLOAT);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Constant::Long(v) => {
                out.push(tags::LONG);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Constant::Double(v) => {
                out.push(tags::DOUBLE);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Constant::Class(name) => {
                out.push(tags::CLASS);
                out.extend_from_slice(&name.to_be_bytes());
            }
            Constant::String(utf8) => {
                out.push(tags::STRING);
                out.extend_from_slice(&utf8.to_be_bytes());
            }
            Constant::FieldRef(class, nat) => {
                out.push(tags::FIELDREF);
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&nat.to_be_bytes());
            }
            Constant::MethodRef(class, nat) => {
                out.push(tags::METHODREF);
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&nat.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class, nat) => {
                out.push(tags::INTERFACE_METHODREF);
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&nat.to_be_bytes());
            }
            Constant::NameAndType(name, descriptor) => {
                out.push(tags::NAME_AND_TYPE);
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&descriptor.to_be_bytes());
            }
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Encode a string in the JVM's modified UTF-8: NUL becomes two bytes and
/// supplementary characters are written as a surrogate pair.
pub fn modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(String),
    String(String),
    NameAndType(String, String),
    Member(MemberKind, String, String, String),
}

/// The symbol table of one class being generated.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Slot 0 and the upper half of wide entries are `None`
    entries: Vec<Option<Constant>>,
    lookup: HashMap<Key, u16>,
    overflowed: bool,
    /// Encoded length of the longest Utf8 entry over the 65535-byte limit
    oversized_utf8: Option<usize>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![None],
            lookup: HashMap::new(),
            overflowed: false,
            oversized_utf8: None,
        }
    }

    fn intern(&mut self, key: Key, make: impl FnOnce(&mut Self) -> Constant) -> u16 {
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }

        // Operands are interned before the entry that refers to them
        let constant = make(self);
        let index = match u16::try_from(self.entries.len()) {
            Ok(index) => index,
            Err(_) => {
                self.overflowed = true;
                u16::MAX
            }
        };
        log::trace!("constant #{} = {:?}", index, constant);

        let wide = constant.is_wide();
        self.entries.push(Some(constant));
        if wide {
            self.entries.push(None);
        }
        if self.entries.len() > u16::MAX as usize {
            self.overflowed = true;
        }
        self.lookup.insert(key, index);
        index
    }

    pub fn add_utf8(&mut self, value: &str) -> u16 {
        self.intern(Key::Utf8(value.to_string()), |pool| {
            let length = modified_utf8(value).len();
            if length > u16::MAX as usize {
                pool.oversized_utf8 = Some(pool.oversized_utf8.map_or(length, |l| l.max(length)));
            }
            Constant::Utf8(value.to_string())
        })
    }

    pub fn add_integer(&mut self, value: i32) -> u16 {
        self.intern(Key::Integer(value), |_| Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> u16 {
        self.intern(Key::Float(value.to_bits()), |_| Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> u16 {
        self.intern(Key::Long(value), |_| Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> u16 {
        self.intern(Key::Double(value.to_bits()), |_| Constant::Double(value))
    }

    /// `internal_name` is slash-separated (`java/util/List`) or an array
    /// descriptor (`[I`).
    pub fn add_class(&mut self, internal_name: &str) -> u16 {
        self.intern(Key::Class(internal_name.to_string()), |pool| {
            Constant::Class(pool.add_utf8(internal_name))
        })
    }

    pub fn add_string(&mut self, value: &str) -> u16 {
        self.intern(Key::String(value.to_string()), |pool| {
            Constant::String(pool.add_utf8(value))
        })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        self.intern(
            Key::NameAndType(name.to_string(), descriptor.to_string()),
            |pool| {
                let name = pool.add_utf8(name);
                let descriptor = pool.add_utf8(descriptor);
                Constant::NameAndType(name, descriptor)
            },
        )
    }

    fn add_member(&mut self, kind: MemberKind, owner: &str, name: &str, descriptor: &str) -> u16 {
        let key = Key::Member(
            kind,
            owner.to_string(),
            name.to_string(),
            descriptor.to_string(),
        );
        self.intern(key, |pool| {
            let class = pool.add_class(owner);
            let nat = pool.add_name_and_type(name, descriptor);
            match kind {
                MemberKind::Field => Constant::FieldRef(class, nat),
                MemberKind::Method => Constant::MethodRef(class, nat),
                MemberKind::InterfaceMethod => Constant::InterfaceMethodRef(class, nat),
            }
        })
    }

    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.add_member(MemberKind::Field, owner, name, descriptor)
    }

    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.add_member(MemberKind::Method, owner, name, descriptor)
    }

    pub fn add_interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.add_member(MemberKind::InterfaceMethod, owner, name, descriptor)
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)?.as_ref()
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Some(value),
            _ => None,
        }
    }

    /// Internal name behind a `Class` entry.
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => None,
        }
    }

    /// `(owner, name, descriptor)` of a field, method or interface method
    /// reference.
    pub fn member(&self, index: u16) -> Option<(&str, &str, &str)> {
        let (class, nat) = match self.get(index)? {
            Constant::FieldRef(class, nat)
            | Constant::MethodRef(class, nat)
            | Constant::InterfaceMethodRef(class, nat) => (*class, *nat),
            _ => return None,
        };
        match self.get(nat)? {
            Constant::NameAndType(name, descriptor) => {
                Some((self.class_name(class)?, self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => None,
        }
    }

    /// The `constant_pool_count` field: number of used indices plus one.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Set once more than 65535 indices have been requested.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Encoded length of a Utf8 entry too long for its u2 length prefix.
    pub fn oversized_utf8(&self) -> Option<usize> {
        self.oversized_utf8
    }

    /// Write `constant_pool_count` followed by every entry.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for constant in self.entries.iter().flatten() {
            constant.write(out);
        }
    }
}
