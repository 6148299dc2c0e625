//! Explain command - explain diagnostic codes

use anyhow::{anyhow, Result};
use clap::Args;
use javelin_diagnostics::DiagnosticCode;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Diagnostic code to explain (e.g., U002, H004)
    pub code: String,
}

#[derive(Debug)]
struct ErrorExplanation {
    code: DiagnosticCode,
    title: &'static str,
    description: &'static str,
    example: Option<&'static str>,
    suggestion: Option<&'static str>,
    related: &'static [&'static str],
}

const ERROR_EXPLANATIONS: &[ErrorExplanation] = &[
    // Parse errors
    ErrorExplanation {
        code: DiagnosticCode::ParseError,
        title: "Parse Error",
        description: "The TypeScript parser encountered invalid syntax. Recoverable problems are reported as warnings; anything else stops compilation of the file.",
        example: Some("let x: number = ;  // Missing value"),
        suggestion: Some("Check for syntax errors like missing semicolons, brackets, or values."),
        related: &[],
    },
    // Class hierarchy
    ErrorExplanation {
        code: DiagnosticCode::SuperOutsideClass,
        title: "Super Outside Class",
        description: "A `super.x` read or write appears in code that does not belong to a class, so there is no superclass to search.",
        example: Some("function reset() { super.count = 0; }"),
        suggestion: Some("Move the code into a method of a class that extends the owner of the field."),
        related: &["H002"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnresolvedSuperclass,
        title: "Unresolved Superclass",
        description: "The enclosing class has no known superclass, so `super` members cannot be looked up.",
        example: None,
        suggestion: Some("Make sure the class declaration and its `extends` clause are part of the compiled module."),
        related: &["H001", "H003"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnresolvedSuperclassInfo,
        title: "Unresolved Superclass Type Info",
        description: "The superclass is named but none of its fields or methods are known to the compiler.\n\nClasses from other files or from the JDK are registered as empty placeholders.",
        example: Some("class Square extends Shape {  // Shape declared in another file\n  grow() { super.size = 2; }\n}"),
        suggestion: Some("Compile the superclass in the same module, or avoid `super` field access on external classes."),
        related: &["H002", "H004"],
    },
    ErrorExplanation {
        code: DiagnosticCode::FieldNotFound,
        title: "Field Not Found",
        description: "No class in the searched hierarchy declares a field with this name.",
        example: Some("class Base { x: number = 0; }\nclass Derived extends Base {\n  read(): number { return super.y; }\n}"),
        suggestion: Some("Declare the field with a type annotation in the superclass."),
        related: &["H003"],
    },
    // Unsupported
    ErrorExplanation {
        code: DiagnosticCode::UnsupportedExpression,
        title: "Unsupported Expression",
        description: "This expression form has no JVM translation yet, or it names a variable that is not in scope.",
        example: Some("const f = () => 1;  // arrow functions"),
        suggestion: Some("Rewrite the expression using classes, methods and plain operators."),
        related: &["U002", "U004"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnsupportedStatement,
        title: "Unsupported Statement",
        description: "This statement or declaration has no JVM translation yet.",
        example: Some("enum Color { Red, Green }"),
        suggestion: Some("Replace enums and namespaces with classes holding static fields."),
        related: &["U001", "U004"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnsupportedPattern,
        title: "Unsupported Pattern",
        description: "A destructuring pattern could not be compiled. Rest elements must bind a plain identifier.",
        example: Some("const [first, ...[second]] = items;"),
        suggestion: Some("Bind the rest element to a name and destructure it in a second statement."),
        related: &["U001"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnsupportedFeature,
        title: "Unsupported Feature",
        description: "This TypeScript feature is not yet supported by the classfile backend.",
        example: Some("class Box { get size(): int { return 1; } }  // accessors"),
        suggestion: Some("Use ordinary methods instead of accessors, async functions or generators."),
        related: &["U001", "U002"],
    },
    // Types
    ErrorExplanation {
        code: DiagnosticCode::TypeMismatch,
        title: "Type Mismatch",
        description: "A value of one JVM type cannot be converted to the type expected at this position.",
        example: Some("const n: number = \"hello\";  // String cannot become double"),
        suggestion: Some("Ensure the assigned value matches the declared type, or add an explicit cast."),
        related: &[],
    },
    // Internal
    ErrorExplanation {
        code: DiagnosticCode::InternalError,
        title: "Internal Error",
        description: "The compiler reached a state it cannot handle, such as a constant pool with more than 65535 entries or a method body over 64 KiB.",
        example: None,
        suggestion: Some("Split very large classes or methods. If the problem persists, report it with the input file."),
        related: &[],
    },
];

fn lookup(code: &str) -> Result<&'static ErrorExplanation> {
    let parsed = DiagnosticCode::parse(code).ok_or_else(|| anyhow!("Unknown error code: {}", code.to_uppercase()))?;
    ERROR_EXPLANATIONS
        .iter()
        .find(|e| e.code == parsed)
        .ok_or_else(|| anyhow!("No explanation for {}", parsed.as_str()))
}

pub fn run(args: ExplainArgs, format: OutputFormat, use_color: bool) -> Result<()> {
    let explanation = lookup(&args.code)?;
    let code = explanation.code.as_str();

    match format {
        OutputFormat::Text => {
            if use_color {
                println!(
                    "\n{}: {}\n{}",
                    console::style(code).bold().cyan(),
                    console::style(explanation.title).bold(),
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            } else {
                println!(
                    "\n{}: {}\n{}",
                    code,
                    explanation.title,
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            }

            println!("\n{}\n", explanation.description);

            if let Some(example) = explanation.example {
                if use_color {
                    println!("{}:", console::style("Example").bold());
                } else {
                    println!("Example:");
                }
                for line in example.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if let Some(suggestion) = explanation.suggestion {
                if use_color {
                    println!("{}:", console::style("Suggestion").bold().green());
                } else {
                    println!("Suggestion:");
                }
                for line in suggestion.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if !explanation.related.is_empty() {
                if use_color {
                    println!("{}: {}", console::style("Related").dim(), explanation.related.join(", "));
                } else {
                    println!("Related: {}", explanation.related.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "code": code,
                "title": explanation.title,
                "description": explanation.description,
                "example": explanation.example,
                "suggestion": explanation.suggestion,
                "related": explanation.related,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_is_explained() {
        for code in DiagnosticCode::ALL {
            assert!(
                ERROR_EXPLANATIONS.iter().any(|e| e.code == *code),
                "{} has no explanation",
                code.as_str()
            );
        }
    }

    #[test]
    fn test_related_codes_exist() {
        for explanation in ERROR_EXPLANATIONS {
            for related in explanation.related {
                assert!(DiagnosticCode::parse(related).is_some(), "{} is not a code", related);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("h004").unwrap().title, "Field Not Found");
        assert_eq!(lookup("X999").unwrap_err().to_string(), "Unknown error code: X999");
    }
}
