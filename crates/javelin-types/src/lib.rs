//! JVM type descriptors for Javelin
//!
//! Every type that flows through code generation is represented by its
//! canonical field descriptor string (`I`, `Ljava/lang/String;`, `[D`, ...).
//! Keeping exactly one spelling per type is what makes constant pool
//! deduplication work, so all well-known spellings live in [`desc`].

use thiserror::Error;

/// Canonical descriptor spellings.
pub mod desc {
    pub const VOID: &str = "V";
    pub const BOOLEAN: &str = "Z";
    pub const BYTE: &str = "B";
    pub const CHAR: &str = "C";
    pub const SHORT: &str = "S";
    pub const INT: &str = "I";
    pub const LONG: &str = "J";
    pub const FLOAT: &str = "F";
    pub const DOUBLE: &str = "D";

    pub const OBJECT: &str = "Ljava/lang/Object;";
    pub const STRING: &str = "Ljava/lang/String;";
    pub const CLASS: &str = "Ljava/lang/Class;";
    pub const NUMBER: &str = "Ljava/lang/Number;";
    pub const BIG_INTEGER: &str = "Ljava/math/BigInteger;";

    pub const BOOLEAN_WRAPPER: &str = "Ljava/lang/Boolean;";
    pub const BYTE_WRAPPER: &str = "Ljava/lang/Byte;";
    pub const CHAR_WRAPPER: &str = "Ljava/lang/Character;";
    pub const SHORT_WRAPPER: &str = "Ljava/lang/Short;";
    pub const INT_WRAPPER: &str = "Ljava/lang/Integer;";
    pub const LONG_WRAPPER: &str = "Ljava/lang/Long;";
    pub const FLOAT_WRAPPER: &str = "Ljava/lang/Float;";
    pub const DOUBLE_WRAPPER: &str = "Ljava/lang/Double;";

    pub const LIST: &str = "Ljava/util/List;";
    pub const ARRAY_LIST: &str = "Ljava/util/ArrayList;";
    pub const MAP: &str = "Ljava/util/Map;";
    pub const HASH_MAP: &str = "Ljava/util/HashMap;";
    pub const LINKED_HASH_MAP: &str = "Ljava/util/LinkedHashMap;";
    pub const SET: &str = "Ljava/util/Set;";
}

/// Internal (slash-separated) class names used by generated code.
pub mod class {
    pub const OBJECT: &str = "java/lang/Object";
    pub const STRING: &str = "java/lang/String";
    pub const STRING_BUILDER: &str = "java/lang/StringBuilder";
    pub const LIST: &str = "java/util/List";
    pub const ARRAY_LIST: &str = "java/util/ArrayList";
    pub const MAP: &str = "java/util/Map";
    pub const MAP_ENTRY: &str = "java/util/Map$Entry";
    pub const LINKED_HASH_MAP: &str = "java/util/LinkedHashMap";
    pub const SET: &str = "java/util/Set";
    pub const ITERATOR: &str = "java/util/Iterator";
    pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
    pub const THROWABLE: &str = "java/lang/Throwable";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed method descriptor `{0}`")]
    MalformedMethod(String),
}

/// Is `d` one of the eight primitive descriptors (void excluded)?
pub fn is_primitive(d: &str) -> bool {
    matches!(d, "Z" | "B" | "C" | "S" | "I" | "J" | "F" | "D")
}

/// Reference types: objects and arrays.
pub fn is_reference(d: &str) -> bool {
    d.starts_with('L') || d.starts_with('[')
}

/// Types that live in a single `int` stack slot.
pub fn is_int_like(d: &str) -> bool {
    matches!(d, "Z" | "B" | "C" | "S" | "I")
}

/// Number of local/stack slots a value of this type occupies.
pub fn slot_width(d: &str) -> u16 {
    match d {
        "V" => 0,
        "J" | "D" => 2,
        _ => 1,
    }
}

/// `Ljava/lang/Integer;` for `I`, and so on. Non-primitives map to themselves.
pub fn wrapper_of(d: &str) -> &str {
    match d {
        "Z" => desc::BOOLEAN_WRAPPER,
        "B" => desc::BYTE_WRAPPER,
        "C" => desc::CHAR_WRAPPER,
        "S" => desc::SHORT_WRAPPER,
        "I" => desc::INT_WRAPPER,
        "J" => desc::LONG_WRAPPER,
        "F" => desc::FLOAT_WRAPPER,
        "D" => desc::DOUBLE_WRAPPER,
        other => other,
    }
}

/// `I` for `Ljava/lang/Integer;`, and so on. Other types map to themselves.
pub fn primitive_of(d: &str) -> &str {
    match d {
        desc::BOOLEAN_WRAPPER => "Z",
        desc::BYTE_WRAPPER => "B",
        desc::CHAR_WRAPPER => "C",
        desc::SHORT_WRAPPER => "S",
        desc::INT_WRAPPER => "I",
        desc::LONG_WRAPPER => "J",
        desc::FLOAT_WRAPPER => "F",
        desc::DOUBLE_WRAPPER => "D",
        other => other,
    }
}

pub fn is_wrapper(d: &str) -> bool {
    primitive_of(d) != d
}

/// Binary numeric promotion of two operand types (wrappers are unwrapped).
pub fn widened(left: &str, right: &str) -> &'static str {
    let rank = |d: &str| match primitive_of(d) {
        "D" => 3,
        "F" => 2,
        "J" => 1,
        _ => 0,
    };
    match rank(left).max(rank(right)) {
        3 => desc::DOUBLE,
        2 => desc::FLOAT,
        1 => desc::LONG,
        _ => desc::INT,
    }
}

/// Type of a conditional whose arms have types `a` and `b`.
///
/// Both arms missing (null literals) yields `None`; one null arm or a
/// primitive/reference mix yields `Object`.
pub fn common_type(a: Option<&str>, b: Option<&str>) -> Option<String> {
    match (a, b) {
        (None, None) => None,
        (Some(a), Some(b)) if a == b => Some(a.to_string()),
        (Some(a), Some(b)) if is_primitive(a) && is_primitive(b) => Some(widened(a, b).to_string()),
        _ => Some(desc::OBJECT.to_string()),
    }
}

/// `Lcom/x/Foo;` -> `com/x/Foo`. Arrays keep their descriptor form.
pub fn internal_name_of(d: &str) -> Option<&str> {
    if d.starts_with('[') {
        return Some(d);
    }
    d.strip_prefix('L')?.strip_suffix(';')
}

/// `com/x/Foo` -> `Lcom/x/Foo;`
pub fn object_descriptor(internal_name: &str) -> String {
    format!("L{};", internal_name)
}

/// Split a single field descriptor off the front of `s`.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while bytes.get(i) == Some(&b'[') {
        i += 1;
    }
    let end = match bytes.get(i)? {
        b'Z' | b'B' | b'C' | b'S' | b'I' | b'J' | b'F' | b'D' => i + 1,
        b'L' => i + s[i..].find(';')? + 1,
        _ => return None,
    };
    Some(s.split_at(end))
}

/// A parsed method descriptor such as `(ILjava/lang/String;)V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<String>,
    pub ret: String,
}

impl MethodDescriptor {
    pub fn parse(s: &str) -> Result<Self, DescriptorError> {
        let malformed = || DescriptorError::MalformedMethod(s.to_string());
        let body = s.strip_prefix('(').ok_or_else(malformed)?;
        let close = body.find(')').ok_or_else(malformed)?;
        let (mut rest, ret) = (&body[..close], &body[close + 1..]);

        let mut params = Vec::new();
        while !rest.is_empty() {
            let (param, tail) = split_field(rest).ok_or_else(malformed)?;
            params.push(param.to_string());
            rest = tail;
        }
        if ret != "V" && split_field(ret) != Some((ret, "")) {
            return Err(malformed());
        }

        Ok(Self {
            params,
            ret: ret.to_string(),
        })
    }

    pub fn new(params: Vec<String>, ret: impl Into<String>) -> Self {
        Self {
            params,
            ret: ret.into(),
        }
    }

    /// Total slot width of the arguments (excluding any receiver).
    pub fn arg_slots(&self) -> u16 {
        self.params.iter().map(|p| slot_width(p)).sum()
    }

    pub fn ret_slots(&self) -> u16 {
        slot_width(&self.ret)
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}){}", self.params.concat(), self.ret)
    }
}

/// Classification of a method's return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Int,
    Boolean,
    Byte,
    Char,
    Short,
    Long,
    Float,
    Double,
    String,
    /// Any other reference, with its descriptor
    Object(String),
}

impl ReturnType {
    pub fn from_descriptor(d: &str) -> Self {
        match d {
            "V" => ReturnType::Void,
            "I" => ReturnType::Int,
            "Z" => ReturnType::Boolean,
            "B" => ReturnType::Byte,
            "C" => ReturnType::Char,
            "S" => ReturnType::Short,
            "J" => ReturnType::Long,
            "F" => ReturnType::Float,
            "D" => ReturnType::Double,
            desc::STRING => ReturnType::String,
            other => ReturnType::Object(other.to_string()),
        }
    }

    pub fn descriptor(&self) -> &str {
        match self {
            ReturnType::Void => desc::VOID,
            ReturnType::Int => desc::INT,
            ReturnType::Boolean => desc::BOOLEAN,
            ReturnType::Byte => desc::BYTE,
            ReturnType::Char => desc::CHAR,
            ReturnType::Short => desc::SHORT,
            ReturnType::Long => desc::LONG,
            ReturnType::Float => desc::FLOAT,
            ReturnType::Double => desc::DOUBLE,
            ReturnType::String => desc::STRING,
            ReturnType::Object(d) => d,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ReturnType::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_width() {
        assert_eq!(slot_width("J"), 2);
        assert_eq!(slot_width("D"), 2);
        assert_eq!(slot_width("I"), 1);
        assert_eq!(slot_width(desc::STRING), 1);
        assert_eq!(slot_width("[J"), 1);
        assert_eq!(slot_width("V"), 0);
    }

    #[test]
    fn test_wrappers() {
        assert_eq!(wrapper_of("I"), desc::INT_WRAPPER);
        assert_eq!(primitive_of(desc::CHAR_WRAPPER), "C");
        assert_eq!(wrapper_of(desc::STRING), desc::STRING);
        assert!(is_wrapper(desc::DOUBLE_WRAPPER));
        assert!(!is_wrapper(desc::OBJECT));
    }

    #[test]
    fn test_widening() {
        assert_eq!(widened("I", "J"), "J");
        assert_eq!(widened("B", "S"), "I");
        assert_eq!(widened("F", "J"), "F");
        assert_eq!(widened(desc::INT_WRAPPER, "D"), "D");
    }

    #[test]
    fn test_common_type() {
        assert_eq!(common_type(None, None), None);
        assert_eq!(common_type(Some("I"), None).as_deref(), Some(desc::OBJECT));
        assert_eq!(common_type(Some("I"), Some("D")).as_deref(), Some("D"));
        assert_eq!(
            common_type(Some(desc::STRING), Some(desc::STRING)).as_deref(),
            Some(desc::STRING)
        );
        assert_eq!(common_type(Some("I"), Some(desc::STRING)).as_deref(), Some(desc::OBJECT));
    }

    #[test]
    fn test_method_descriptor() {
        let md = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)Z").unwrap();
        assert_eq!(md.params, vec!["I", "J", "[Ljava/lang/String;", "D"]);
        assert_eq!(md.ret, "Z");
        assert_eq!(md.arg_slots(), 6);
        assert_eq!(md.to_string(), "(IJ[Ljava/lang/String;D)Z");

        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(MethodDescriptor::parse("()").is_err());
    }

    #[test]
    fn test_return_type() {
        assert_eq!(ReturnType::from_descriptor("I"), ReturnType::Int);
        assert_eq!(ReturnType::from_descriptor(desc::STRING), ReturnType::String);
        let list = ReturnType::from_descriptor(desc::LIST);
        assert_eq!(list, ReturnType::Object(desc::LIST.to_string()));
        assert_eq!(list.descriptor(), desc::LIST);
    }

    #[test]
    fn test_internal_name() {
        assert_eq!(internal_name_of("Lcom/x/Foo;"), Some("com/x/Foo"));
        assert_eq!(internal_name_of("[I"), Some("[I"));
        assert_eq!(internal_name_of("I"), None);
        assert_eq!(object_descriptor("com/x/Foo"), "Lcom/x/Foo;");
    }
}
