//! Class hierarchy registry.
//!
//! Every class the module declares (and every anonymous class expression)
//! gets a [`TypeInfo`]. Lookups accept either a dotted qualified name or a
//! bare simple name, qualified first.

use std::collections::{HashMap, HashSet};

use javelin_types::object_descriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeInfo {
    pub simple_name: String,
    /// Slash-separated, empty for the default package
    pub package: String,
    pub internal_name: String,
    /// Declaration order
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// Internal names: superclass first, then interfaces
    pub parents: Vec<String>,
    pub is_interface: bool,
}

/// Where a field was found: its descriptor and the class that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    pub descriptor: String,
    pub owner: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodLookup {
    pub descriptor: String,
    pub owner: String,
    pub is_static: bool,
}

impl TypeInfo {
    pub fn new(internal_name: impl Into<String>) -> Self {
        let internal_name = internal_name.into();
        let (package, simple_name) = match internal_name.rfind('/') {
            Some(i) => (internal_name[..i].to_string(), internal_name[i + 1..].to_string()),
            None => (String::new(), internal_name.clone()),
        };
        Self {
            simple_name,
            package,
            internal_name,
            ..Default::default()
        }
    }

    pub fn descriptor(&self) -> String {
        object_descriptor(&self.internal_name)
    }

    pub fn qualified_name(&self) -> String {
        self.internal_name.replace('/', ".")
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn add_field(&mut self, name: impl Into<String>, descriptor: impl Into<String>, is_static: bool) {
        self.fields.push(FieldInfo {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static,
        });
    }

    pub fn add_method(&mut self, name: impl Into<String>, descriptor: impl Into<String>, is_static: bool) {
        self.methods.push(MethodInfo {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static,
        });
    }

    pub fn superclass(&self) -> Option<&str> {
        if self.is_interface {
            return None;
        }
        self.parents.first().map(String::as_str)
    }

    /// Whether a value of this type can be stored where `descriptor` is
    /// expected: direct match, then each parent depth-first.
    pub fn is_assignable_to(&self, registry: &TypeRegistry, descriptor: &str) -> bool {
        let mut seen = HashSet::new();
        self.assignable_inner(registry, descriptor, &mut seen)
    }

    fn assignable_inner<'a>(
        &'a self,
        registry: &'a TypeRegistry,
        descriptor: &str,
        seen: &mut HashSet<&'a str>,
    ) -> bool {
        if !seen.insert(&self.internal_name) {
            return false;
        }
        if self.descriptor() == descriptor {
            return true;
        }
        self.parents.iter().any(|parent| match registry.resolve_internal(parent) {
            Some(info) => info.assignable_inner(registry, descriptor, seen),
            // Unregistered parents (library classes) still match by name
            None => object_descriptor(parent) == descriptor,
        })
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    aliases: HashMap<String, usize>,
    anonymous_counters: HashMap<String, u32>,
    /// Class expression start position -> internal name
    class_exprs: HashMap<u32, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under both the qualified and the simple name. A later
    /// registration of the same internal name replaces the earlier one.
    pub fn register(&mut self, info: TypeInfo) -> usize {
        let qualified = info.qualified_name();
        let simple = info.simple_name.clone();

        let index = match self.aliases.get(&qualified) {
            Some(&index) if self.types[index].internal_name == info.internal_name => {
                self.types[index] = info;
                index
            }
            _ => {
                self.types.push(info);
                self.types.len() - 1
            }
        };
        log::debug!("registered type {}", qualified);

        self.aliases.insert(qualified, index);
        self.aliases.entry(simple).or_insert(index);
        index
    }

    /// Qualified (dotted) name first, then the bare simple name.
    pub fn resolve(&self, name: &str) -> Option<&TypeInfo> {
        let index = self.aliases.get(name).or_else(|| {
            let simple = name.rsplit('.').next()?;
            self.aliases.get(simple)
        })?;
        self.types.get(*index)
    }

    /// Same as [`resolve`](Self::resolve) for a slash-separated name.
    pub fn resolve_internal(&self, internal_name: &str) -> Option<&TypeInfo> {
        self.resolve(&internal_name.replace('/', "."))
    }

    /// Resolve, or register an empty placeholder so that hierarchy queries
    /// on unknown types degrade to "no fields, no parents".
    pub fn resolve_or_placeholder(&mut self, name: &str) -> &TypeInfo {
        let index = match self.resolve(name) {
            Some(info) => self.aliases[&info.qualified_name()],
            None => {
                log::warn!("no type information for {}, using a placeholder", name);
                self.register(TypeInfo::new(name.replace('.', "/")))
            }
        };
        &self.types[index]
    }

    /// Superclass internal name of the class registered as
    /// `internal_name`.
    pub fn resolve_superclass(&self, internal_name: &str) -> Option<String> {
        self.resolve_internal(internal_name)?
            .superclass()
            .map(str::to_string)
    }

    /// Search `start` and then its parents, in declaration order,
    /// depth-first.
    pub fn lookup_field(&self, start: &TypeInfo, name: &str) -> Option<FieldLookup> {
        let mut seen = HashSet::new();
        self.lookup_field_inner(start, name, &mut seen)
    }

    fn lookup_field_inner<'a>(
        &'a self,
        info: &'a TypeInfo,
        name: &str,
        seen: &mut HashSet<&'a str>,
    ) -> Option<FieldLookup> {
        if !seen.insert(&info.internal_name) {
            return None;
        }
        if let Some(field) = info.field(name) {
            return Some(FieldLookup {
                descriptor: field.descriptor.clone(),
                owner: info.internal_name.clone(),
                is_static: field.is_static,
            });
        }
        info.parents.iter().find_map(|parent| {
            let parent = self.resolve_internal(parent)?;
            self.lookup_field_inner(parent, name, seen)
        })
    }

    /// Method lookup follows the same order as fields.
    pub fn lookup_method(&self, start: &TypeInfo, name: &str) -> Option<MethodLookup> {
        let mut seen = HashSet::new();
        let mut pending = vec![start];
        // Explicit stack, pushed in reverse to stay depth-first in order
        while let Some(info) = pending.pop() {
            if !seen.insert(info.internal_name.as_str()) {
                continue;
            }
            if let Some(m) = info.methods.iter().find(|m| m.name == name) {
                return Some(MethodLookup {
                    descriptor: m.descriptor.clone(),
                    owner: info.internal_name.clone(),
                    is_static: m.is_static,
                });
            }
            for parent in info.parents.iter().rev() {
                if let Some(parent) = self.resolve_internal(parent) {
                    pending.push(parent);
                }
            }
        }
        None
    }

    /// `<Enclosing>$<n>`, counting from 1 per enclosing class.
    pub fn next_anonymous_name(&mut self, enclosing: &str) -> String {
        let counter = self
            .anonymous_counters
            .entry(enclosing.to_string())
            .or_insert(0);
        *counter += 1;
        format!("{}${}", enclosing, counter)
    }

    /// Remember the synthetic name given to the class expression starting
    /// at `pos`.
    pub fn bind_class_expr(&mut self, pos: u32, internal_name: impl Into<String>) {
        self.class_exprs.insert(pos, internal_name.into());
    }

    pub fn class_expr_name(&self, pos: u32) -> Option<&str> {
        self.class_exprs.get(&pos).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
