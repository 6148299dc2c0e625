//! `javelin.toml` project configuration

use anyhow::{anyhow, Result};
use javelin_codegen::CompilerOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "javelin.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub build: BuildSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: Option<String>,
    /// Entry file or source directory
    pub entry: Option<PathBuf>,
    /// Java package of the generated classes, e.g. `com.example`
    pub package: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub out_dir: PathBuf,
    pub class_version: u16,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("build/classes"),
            class_version: CompilerOptions::default().class_version,
        }
    }
}

impl ProjectConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| anyhow!("Invalid {}: {}", CONFIG_FILE, e))
    }

    /// Look for `javelin.toml` in `start` and its ancestors.
    pub fn discover(start: &Path) -> Result<Option<(PathBuf, Self)>> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let text = fs::read_to_string(&candidate)?;
                log::debug!("using {}", candidate.display());
                return Ok(Some((candidate, Self::parse(&text)?)));
            }
        }
        Ok(None)
    }

    /// Codegen options for one source file. The module class is named after
    /// the file stem.
    pub fn compiler_options(&self, package: Option<&str>, source: &Path) -> CompilerOptions {
        let package = package.or(self.project.package.as_deref());
        CompilerOptions {
            package: package.map(|p| p.replace('.', "/")),
            class_version: self.build.class_version,
            module_class: module_class_name(source),
            ..Default::default()
        }
    }
}

/// `hello-world.ts` becomes `HelloWorld`.
pub fn module_class_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Main");

    let mut name = String::new();
    let mut upper = true;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '$' {
            if upper {
                name.extend(c.to_uppercase());
            } else {
                name.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }

    match name.chars().next() {
        None => "Main".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", name),
        Some(_) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = ProjectConfig::parse(
            r#"
[project]
name = "shapes"
entry = "src"
package = "com.example.shapes"

[build]
out_dir = "out"
class_version = 52
"#,
        )
        .unwrap();

        assert_eq!(config.project.name.as_deref(), Some("shapes"));
        assert_eq!(config.project.entry, Some(PathBuf::from("src")));
        assert_eq!(config.build.out_dir, PathBuf::from("out"));
        assert_eq!(config.build.class_version, 52);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = ProjectConfig::parse("[project]\nname = \"x\"\n").unwrap();
        assert_eq!(config.build.out_dir, PathBuf::from("build/classes"));
        assert_eq!(config.build.class_version, 61);
        assert!(config.project.package.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let err = ProjectConfig::parse("[build]\nclass_version = \"new\"\n").unwrap_err();
        assert!(err.to_string().starts_with("Invalid javelin.toml"));
    }

    #[test]
    fn test_flag_overrides_package() {
        let config = ProjectConfig::parse("[project]\npackage = \"com.example\"\n").unwrap();

        let options = config.compiler_options(None, Path::new("src/point.ts"));
        assert_eq!(options.package.as_deref(), Some("com/example"));
        assert_eq!(options.module_class, "Point");

        let options = config.compiler_options(Some("org.demo"), Path::new("src/point.ts"));
        assert_eq!(options.qualify("Point"), "org/demo/Point");
    }

    #[test]
    fn test_module_class_name() {
        assert_eq!(module_class_name(Path::new("main.ts")), "Main");
        assert_eq!(module_class_name(Path::new("src/hello-world.ts")), "HelloWorld");
        assert_eq!(module_class_name(Path::new("my_shapes.ts")), "MyShapes");
        assert_eq!(module_class_name(Path::new("2d.ts")), "_2d");
        assert_eq!(module_class_name(Path::new("-.ts")), "Main");
    }
}
