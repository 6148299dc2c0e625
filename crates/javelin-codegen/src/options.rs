//! Compilation options.

use serde::{Deserialize, Serialize};

/// Settings shared by every class of a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Internal-name prefix of top-level classes, e.g. `com/example`
    pub package: Option<String>,
    /// Classfile major version
    pub class_version: u16,
    /// Superclass of classes without `extends`
    pub default_super: String,
    /// Simple name of the class holding the module's free functions
    pub module_class: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            package: None,
            class_version: 61,
            default_super: "java/lang/Object".to_string(),
            module_class: "Main".to_string(),
        }
    }
}

impl CompilerOptions {
    /// Internal name of a top-level class called `simple_name`.
    pub fn qualify(&self, simple_name: &str) -> String {
        match self.package.as_deref().map(|p| p.trim_matches('/')) {
            Some(package) if !package.is_empty() => format!("{}/{}", package.replace('.', "/"), simple_name),
            _ => simple_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.class_version, 61);
        assert_eq!(options.qualify("Point"), "Point");
    }

    #[test]
    fn test_package_prefix() {
        let options = CompilerOptions {
            package: Some("com.example/".to_string()),
            ..Default::default()
        };
        assert_eq!(options.qualify("Point"), "com/example/Point");
    }

    #[test]
    fn test_partial_json() {
        let options: CompilerOptions = serde_json::from_str(r#"{ "class_version": 52 }"#).unwrap();
        assert_eq!(options.class_version, 52);
        assert_eq!(options.default_super, "java/lang/Object");
    }
}
