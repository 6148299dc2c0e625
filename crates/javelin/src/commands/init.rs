//! Init command - initialize a new javelin project

use anyhow::Result;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (default: current)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Java package of the generated classes
    #[arg(long)]
    pub package: Option<String>,
}

const DEFAULT_MAIN_TS: &str = r#"// Main entry point

class Greeter {
    constructor(private name: string) {}

    greet(): string {
        return "Hello, " + this.name + "!";
    }
}

const message = new Greeter("Javelin").greet();
"#;

const DEFAULT_CONFIG: &str = r#"# Javelin configuration

[project]
name = "{name}"
entry = "src"
{package}
[build]
out_dir = "build/classes"
class_version = 61
"#;

const DEFAULT_GITIGNORE: &str = r#"# Javelin build outputs
build/
*.class

# IDE
.vscode/
.idea/
"#;

/// Write `contents` to `path` unless it exists. Returns whether it was created.
fn create_file(path: &Path, contents: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, contents)?;
    Ok(true)
}

fn render_config(name: &str, package: Option<&str>) -> String {
    let package = package.map(|p| format!("package = \"{}\"\n", p)).unwrap_or_default();
    DEFAULT_CONFIG.replace("{name}", name).replace("{package}", &package)
}

pub fn run(args: InitArgs, format: OutputFormat, _use_color: bool) -> Result<()> {
    let project_path = args.path.canonicalize().unwrap_or(args.path.clone());

    let name = args.name.unwrap_or_else(|| {
        project_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-project")
            .to_string()
    });

    let src_dir = project_path.join("src");
    fs::create_dir_all(&src_dir)?;

    if let OutputFormat::Text = format {
        println!("Creating new javelin project '{}'...\n", name);
    }

    let files = [
        (project_path.join(CONFIG_FILE), CONFIG_FILE, render_config(&name, args.package.as_deref())),
        (src_dir.join("main.ts"), "src/main.ts", DEFAULT_MAIN_TS.to_string()),
        (project_path.join(".gitignore"), ".gitignore", DEFAULT_GITIGNORE.to_string()),
    ];
    let mut created = Vec::new();
    for (path, label, contents) in &files {
        let was_created = create_file(path, contents)?;
        if was_created {
            created.push(*label);
        }
        if let OutputFormat::Text = format {
            if was_created {
                println!("  Created {}", label);
            } else {
                println!("  Skipped {} (already exists)", label);
            }
        }
    }

    match format {
        OutputFormat::Text => {
            println!("\nDone! Next steps:");
            println!("  cd {}", project_path.display());
            println!("  javelin compile");
            println!("  java -cp build/classes Main");
        }
        OutputFormat::Json => {
            let result = serde_json::json!({
                "success": true,
                "project_name": name,
                "path": project_path.to_string_lossy(),
                "created": created,
            });
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn test_rendered_config_parses() {
        let config = ProjectConfig::parse(&render_config("shapes", Some("com.example"))).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("shapes"));
        assert_eq!(config.project.package.as_deref(), Some("com.example"));
        assert_eq!(config.project.entry, Some(PathBuf::from("src")));

        let config = ProjectConfig::parse(&render_config("shapes", None)).unwrap();
        assert!(config.project.package.is_none());
    }

    #[test]
    fn test_init_keeps_existing_files() {
        let dir = std::env::temp_dir().join(format!("javelin-init-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".gitignore"), "custom\n").unwrap();

        let args = InitArgs {
            path: dir.clone(),
            name: Some("demo".to_string()),
            package: None,
        };
        run(args, OutputFormat::Json, false).unwrap();

        assert!(dir.join("src/main.ts").is_file());
        assert_eq!(fs::read_to_string(dir.join(".gitignore")).unwrap(), "custom\n");
        let config = fs::read_to_string(dir.join(CONFIG_FILE)).unwrap();
        assert!(config.contains("name = \"demo\""));
        fs::remove_dir_all(&dir).unwrap();
    }
}
