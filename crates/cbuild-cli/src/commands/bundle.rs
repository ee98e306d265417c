//! The bundling command: build, then report.

use cbuild_core::{build, extract_tree, Branch, BuildConfig};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

/// ANSI color used for module names in the dependency tree.
const TREE_COLOR: u8 = 36;

/// Bundle command action.
#[derive(Debug, Clone)]
pub struct BundleAction {
    /// Project directory.
    pub base: PathBuf,
    /// Entry source; the manifest entry when absent.
    pub source: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub out_config: Option<PathBuf>,
    pub include_configs: Vec<PathBuf>,
    pub map_packages: Vec<String>,
    /// Effective development mode.
    pub debug: bool,
    /// Whether `--debug` itself was given.
    pub debug_flag: bool,
    /// `NODE_ENV` as seen at startup.
    pub node_env: Option<String>,
    pub quiet: bool,
    pub verbose: bool,
    pub sfx: bool,
    pub json: bool,
}

impl BundleAction {
    fn build_config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(&self.base)
            .with_debug(self.debug)
            .with_sfx(self.sfx);
        config.source.clone_from(&self.source);
        config.bundle_out.clone_from(&self.out);
        config.config_out.clone_from(&self.out_config);
        config.include_configs.clone_from(&self.include_configs);
        config.map_packages.clone_from(&self.map_packages);
        config
    }

    fn banner(&self) -> String {
        format!(
            "Bundling for {} (NODE_ENV = {} and --debug {})",
            if self.debug { "development" } else { "production" },
            self.node_env.as_deref().unwrap_or("undefined"),
            if self.debug_flag { "set" } else { "not set" }
        )
    }
}

/// JSON output for the bundle command.
#[derive(Serialize)]
struct BundleResultJson {
    ok: bool,
    entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<String>,
    modules: Vec<String>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the bundle command. Returns whether the build succeeded.
pub async fn run(action: BundleAction) -> miette::Result<bool> {
    let start = Instant::now();
    let human = !action.quiet && !action.json;

    if human {
        println!("{}", action.banner());
    }

    let result = build(&action.build_config()).await;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let display = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());

    match result {
        Ok(output) => {
            if action.json {
                let json = BundleResultJson {
                    ok: true,
                    entry: Some(output.entry.clone()),
                    bundle: display(&action.out),
                    config: display(&action.out_config),
                    modules: output.result.modules(),
                    duration_ms,
                    error: None,
                };
                println!("{}", to_json(&json)?);
            } else if human {
                if action.verbose {
                    let color = std::io::stdout().is_terminal();
                    println!("\n{}", tree_lines(&extract_tree(&output.result), "", color).join("\n"));
                }
                println!("\nBuild complete!");
            }
            Ok(true)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "build failed");
            if action.json {
                let json = BundleResultJson {
                    ok: false,
                    entry: display(&action.source),
                    bundle: display(&action.out),
                    config: display(&action.out_config),
                    modules: Vec::new(),
                    duration_ms,
                    error: Some(e.to_string()),
                };
                println!("{}", to_json(&json)?);
            } else if !action.quiet {
                eprintln!("\nBuild error:");
                eprintln!("{:?}", miette::Report::msg(e.to_string()));
            }
            Ok(false)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> miette::Result<String> {
    serde_json::to_string(value).map_err(|e| miette::miette!("failed to encode JSON output: {e}"))
}

/// Render a dependency tree, two spaces of indentation per level.
fn tree_lines(root: &Branch, indent: &str, color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let child_indent = match &root.name {
        Some(name) => {
            lines.push(format!("{indent}{}", paint(name, TREE_COLOR, color)));
            format!("{indent}  ")
        }
        None => indent.to_string(),
    };

    for child in &root.children {
        lines.extend(tree_lines(child, &child_indent, color));
    }
    lines
}

fn paint(text: &str, color: u8, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{color}m{text}\x1b[39m")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str, children: Vec<Branch>) -> Branch {
        Branch {
            name: Some(name.to_string()),
            children,
        }
    }

    #[test]
    fn test_tree_lines_indent_per_level() {
        let root = Branch {
            name: None,
            children: vec![branch("main.js", vec![branch("a.js", vec![branch("b.js", vec![])])])],
        };

        assert_eq!(
            tree_lines(&root, "", false),
            vec!["main.js", "  a.js", "    b.js"]
        );
    }

    #[test]
    fn test_paint() {
        assert_eq!(paint("x", 36, true), "\x1b[36mx\x1b[39m");
        assert_eq!(paint("x", 36, false), "x");
    }

    #[test]
    fn test_banner() {
        let action = BundleAction {
            base: PathBuf::from("/p"),
            source: None,
            out: None,
            out_config: None,
            include_configs: Vec::new(),
            map_packages: Vec::new(),
            debug: true,
            debug_flag: false,
            node_env: Some("development".to_string()),
            quiet: false,
            verbose: false,
            sfx: false,
            json: false,
        };

        assert_eq!(
            action.banner(),
            "Bundling for development (NODE_ENV = development and --debug not set)"
        );
    }
}
