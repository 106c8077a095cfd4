//! Ignore-pattern handling and language detection for file discovery

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Literal directory and file names that are never indexed.
static LITERAL_IGNORES: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    BTreeSet::from([
        // Directories
        "node_modules",
        "__pycache__",
        ".git",
        ".axon-pro",
        ".venv",
        "venv",
        ".env",
        "dist",
        "build",
        ".idea",
        ".vscode",
        ".mypy_cache",
        ".pytest_cache",
        ".ruff_cache",
        ".tox",
        "egg-info",
        ".eggs",
        "coverage",
        "htmlcov",
        "target",
        // Files (exact names)
        ".DS_Store",
        ".coverage",
        "package-lock.json",
        "yarn.lock",
        "uv.lock",
        "poetry.lock",
        "Cargo.lock",
    ])
});

/// Compiled-artifact and source-map globs, checked against every path
/// segment.
static GLOB_IGNORES: LazyLock<GlobSet> = LazyLock::new(|| {
    let patterns = [
        "*.pyc", "*.pyo", "*.so", "*.dylib", "*.min.js", "*.bundle.js", "*.map",
    ];
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().expect("static ignore globs compile")
});

/// Extension-to-language table for supported source files.
const SUPPORTED_EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("php", "php"),
    ("java", "java"),
    ("cs", "csharp"),
];

/// Detect the language tag for a path, or `None` when unsupported.
///
/// Blade templates (`*.blade.php`) are recognised before the plain `.php`
/// extension match.
pub fn get_language(path: &Path) -> Option<&'static str> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.ends_with(".blade.php") {
        return Some("blade");
    }
    let ext = path.extension()?.to_str()?;
    SUPPORTED_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

pub fn is_supported(path: &Path) -> bool {
    get_language(path).is_some()
}

/// Read `.gitignore` at the repository root and return its patterns.
///
/// Blank lines and `#` comments are stripped. Missing file yields an empty
/// list.
pub fn load_gitignore(repo_path: &Path) -> Vec<String> {
    let gitignore = repo_path.join(".gitignore");
    let Ok(text) = std::fs::read_to_string(&gitignore) else {
        return Vec::new();
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Compiled ignore rules: the fixed literal/glob sets plus optional
/// gitignore-style patterns.
pub struct IgnoreRules {
    gitignore: Option<Gitignore>,
}

impl IgnoreRules {
    /// Build rules from a pattern list (as returned by [`load_gitignore`]).
    pub fn from_patterns(patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return IgnoreRules { gitignore: None };
        }
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            // Malformed patterns are skipped, matching git's own leniency.
            let _ = builder.add_line(None, pattern);
        }
        IgnoreRules {
            gitignore: builder.build().ok(),
        }
    }

    /// Load rules for a repository root, reading its `.gitignore` if any.
    pub fn load(repo_path: &Path) -> Self {
        Self::from_patterns(&load_gitignore(repo_path))
    }

    /// Whether `relative` (a path relative to the repo root) should be
    /// skipped during discovery.
    pub fn should_ignore(&self, relative: &Path) -> bool {
        for component in relative.components() {
            if let Component::Normal(part) = component {
                let Some(part) = part.to_str() else {
                    return true;
                };
                if LITERAL_IGNORES.contains(part) {
                    return true;
                }
                if GLOB_IGNORES.is_match(Path::new(part)) {
                    return true;
                }
            }
        }
        if let Some(gitignore) = &self.gitignore {
            if gitignore
                .matched_path_or_any_parents(relative, false)
                .is_ignore()
            {
                return true;
            }
        }
        false
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        IgnoreRules { gitignore: None }
    }
}

/// Normalise a relative path into the forward-slash form used in node ids.
pub fn normalize_rel_path(path: &Path) -> String {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Return the parent directory of a forward-slash relative path, or `""`
/// for a top-level entry.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last path component of a forward-slash relative path.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_segments_are_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.should_ignore(Path::new("node_modules/pkg/index.js")));
        assert!(rules.should_ignore(Path::new("src/__pycache__/mod.pyc")));
        assert!(rules.should_ignore(Path::new(".git/config")));
        assert!(!rules.should_ignore(Path::new("src/main.py")));
    }

    #[test]
    fn glob_segments_are_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.should_ignore(Path::new("src/app.min.js")));
        assert!(rules.should_ignore(Path::new("lib/native.so")));
        assert!(rules.should_ignore(Path::new("dist2/app.js.map")));
    }

    #[test]
    fn gitignore_patterns_apply() {
        let rules = IgnoreRules::from_patterns(&["generated/".to_string(), "*.tmp".to_string()]);
        assert!(rules.should_ignore(Path::new("generated/models.py")));
        assert!(rules.should_ignore(Path::new("scratch/file.tmp")));
        assert!(!rules.should_ignore(Path::new("src/models.py")));
    }

    #[test]
    fn language_table() {
        assert_eq!(get_language(Path::new("src/app.py")), Some("python"));
        assert_eq!(get_language(Path::new("src/App.tsx")), Some("typescript"));
        assert_eq!(get_language(Path::new("lib/util.cjs")), Some("javascript"));
        assert_eq!(get_language(Path::new("Api.cs")), Some("csharp"));
        assert_eq!(
            get_language(Path::new("resources/views/home.blade.php")),
            Some("blade")
        );
        assert_eq!(get_language(Path::new("Main.java")), Some("java"));
        assert_eq!(get_language(Path::new("readme.md")), None);
        assert_eq!(get_language(Path::new("noext")), None);
    }

    #[test]
    fn path_helpers() {
        assert_eq!(parent_dir("src/auth/validate.py"), "src/auth");
        assert_eq!(parent_dir("main.py"), "");
        assert_eq!(base_name("src/auth/validate.py"), "validate.py");
        assert_eq!(base_name("main.py"), "main.py");
    }
}
