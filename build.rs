use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are linted.
const SOURCE_ROOTS: [&str; 3] = ["src", "tests", "benches"];

struct LintRule {
    label: &'static str,
    pattern: &'static str,
    remedy: &'static str,
}

const RULES: [LintRule; 2] = [
    LintRule {
        label: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        remedy: "Either use the code (removing the attribute) or remove it completely.",
    },
    LintRule {
        label: "#[ignore] test attributes",
        pattern: r"#\s*\[\s*ignore\s*\]",
        remedy: "Fix the test so it can run properly without being ignored.",
    },
];

// Collects every matching line of one file for a single rule.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(file_path: &Path) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self, rule: &LintRule) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            rule.label,
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {} are forbidden in this crate.\n", rule.label));
        error_msg.push_str(&format!("   {}\n", rule.remedy));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    if std::env::var("ARMIJO_BFGS_SKIP_LINT_CHECKS").is_ok() || std::env::var("DOCS_RS").is_ok() {
        return;
    }

    let source_files = collect_source_files();
    let mut all_violations = Vec::new();
    for rule in &RULES {
        all_violations.extend(scan_for_rule(rule, &source_files));
    }

    if !all_violations.is_empty() {
        eprintln!("\n❌ VALIDATION ERRORS");
        eprintln!("====================");
        let violation_count = all_violations.len();
        for violation in all_violations {
            eprintln!("{violation}");
            eprintln!("--------------------");
        }
        eprintln!(
            "\n⚠️ Found {} total code quality violations. Fix all issues before committing.",
            violation_count
        );
        std::process::exit(1);
    }
}

fn collect_source_files() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .filter(|root| Path::new(root).is_dir())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| !is_in_ignored_directory(e.path()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan_for_rule(rule: &LintRule, files: &[PathBuf]) -> Vec<String> {
    let matcher = match RegexMatcher::new_line_matcher(rule.pattern) {
        Ok(matcher) => matcher,
        Err(e) => return vec![format!("Error creating matcher for {}: {}", rule.label, e)],
    };
    let mut searcher = Searcher::new();
    let mut all_violations = Vec::new();

    for path in files {
        let mut collector = ViolationCollector::new(path);
        if searcher.search_path(&matcher, path, &mut collector).is_err() {
            continue;
        }
        if let Some(error_message) = collector.check_and_get_error_message(rule) {
            all_violations.push(error_message);
        }
    }
    all_violations
}

fn is_in_hidden_directory(path: impl AsRef<Path>) -> bool {
    path.as_ref().components().any(|component| {
        if let Component::Normal(name) = component {
            name.to_string_lossy().starts_with('.')
        } else {
            false
        }
    })
}

fn is_in_target_directory(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .components()
        .any(|component| matches!(component, Component::Normal(name) if name == "target"))
}

fn is_in_ignored_directory(path: impl AsRef<Path>) -> bool {
    is_in_target_directory(path.as_ref()) || is_in_hidden_directory(path.as_ref())
}
