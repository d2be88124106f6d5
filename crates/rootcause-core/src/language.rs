//! Language detection and index filtering by file path.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::sync::OnceLock;

/// Paths that are never worth indexing: vendored dependencies, build
/// output, VCS metadata, minified bundles, lock files, and type stubs.
const EXCLUDED_GLOBS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/.next/**",
    "**/*.min.*",
    "**/*.d.ts",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/poetry.lock",
    "**/Gemfile.lock",
    "**/composer.lock",
    "**/go.sum",
    "**/*.lock",
];

fn excluded_set() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        for pattern in EXCLUDED_GLOBS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    })
}

/// Map a file path to a language name by extension.
///
/// Returns `None` for unknown or missing extensions. A bare extension
/// such as `".ts"` is accepted as well.
///
/// ```rust
/// use rootcause_core::language::detect_language;
///
/// assert_eq!(detect_language("src/app.ts"), Some("typescript"));
/// assert_eq!(detect_language("main.py"), Some("python"));
/// assert_eq!(detect_language("notes.unknown"), None);
/// ```
pub fn detect_language(file_path: &str) -> Option<&'static str> {
    let file_name = file_path.rsplit(['/', '\\']).next()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();

    let lang = match ext.as_str() {
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" | "pyi" => "python",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "vue" => "vue",
        "svelte" => "svelte",
        _ => return None,
    };
    Some(lang)
}

/// Whether a repository-relative path should be chunked and embedded.
pub fn should_index_file(file_path: &str) -> bool {
    let normalized = file_path.replace('\\', "/");
    if excluded_set().is_match(&normalized) {
        return false;
    }
    detect_language(&normalized).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_language(".ts"), Some("typescript"));
        assert_eq!(detect_language(".py"), Some("python"));
        assert_eq!(detect_language("a.ts"), Some("typescript"));
        assert_eq!(detect_language("a.TSX"), Some("typescript"));
        assert_eq!(detect_language("lib/x.cjs"), Some("javascript"));
        assert_eq!(detect_language("svc/main.go"), Some("go"));
        assert_eq!(detect_language("tool.py"), Some("python"));
        assert_eq!(detect_language("file.unknown"), None);
        assert_eq!(detect_language("Makefile"), None);
    }

    #[test]
    fn test_should_index() {
        assert!(should_index_file("src/app.ts"));
        assert!(should_index_file("pkg/server/handler.go"));
        assert!(!should_index_file("node_modules/x/index.js"));
        assert!(!should_index_file("web/node_modules/react/index.js"));
        assert!(!should_index_file("types.d.ts"));
        assert!(!should_index_file("src/types/global.d.ts"));
        assert!(!should_index_file("public/vendor.min.js"));
        assert!(!should_index_file("dist/bundle.js"));
        assert!(!should_index_file(".git/hooks/pre-commit.sh"));
        assert!(!should_index_file("README.md"));
        assert!(!should_index_file("package-lock.json"));
    }

    #[test]
    fn test_windows_separators() {
        assert!(!should_index_file("web\\node_modules\\lib\\a.js"));
        assert!(should_index_file("src\\app.ts"));
    }
}
