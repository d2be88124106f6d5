//! Source paths referenced by stack traces.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize_path;

static FRAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // at handler (src/api/handler.ts:10:5)
        r"\bat\s+(?:async\s+)?[^\s(]+(?:\s+\[as\s+[^\]]+\])?\s+\(([^()\s]+?):\d+(?::\d+)?\)",
        // at src/api/handler.ts:10:5
        r"\bat\s+(?:async\s+)?([^\s()]+?):\d+(?::\d+)?(?:\s|$)",
        // File: src/app.py  /  File "src/app.py", line 3
        r#"File(?::\s*|\s+")([^\s",]+)"#,
        // src/app.go:42
        r"([\w@~.\\/-]+\.[A-Za-z][A-Za-z0-9]{0,5}):\d+",
    ]
    .into_iter()
    .map(|src| Regex::new(src).unwrap())
    .collect()
});

/// Node core modules as they appear in frames from older runtimes,
/// e.g. `at emitOne (events.js:116:13)`.
const NODE_CORE_MODULES: &[&str] = &[
    "_http_agent",
    "_http_client",
    "_http_common",
    "_http_incoming",
    "_http_outgoing",
    "_http_server",
    "_stream_duplex",
    "_stream_passthrough",
    "_stream_readable",
    "_stream_transform",
    "_stream_writable",
    "_tls_wrap",
    "assert",
    "bootstrap_node",
    "buffer",
    "child_process",
    "cluster",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "node",
    "os",
    "path",
    "querystring",
    "readline",
    "stream",
    "timers",
    "tls",
    "url",
    "util",
    "vm",
    "zlib",
];

fn is_node_core_module(normalized: &str) -> bool {
    !normalized.contains('/')
        && normalized
            .strip_suffix(".js")
            .is_some_and(|name| NODE_CORE_MODULES.contains(&name))
}

/// Frames that point into runtimes or dependencies, never user code.
fn is_internal(raw: &str, normalized: &str) -> bool {
    normalized.is_empty()
        || raw.starts_with("node:")
        || raw.starts_with("internal/")
        || raw.contains('<')
        || raw == "native"
        || is_node_core_module(normalized)
        || normalized.split('/').any(|seg| seg == "node_modules")
}

/// Whether a frame location such as `node:internal/timers:95:5` or
/// `/app/src/a.ts:3:1` points outside user code.
pub(crate) fn is_internal_location(location: &str) -> bool {
    let path = location.trim_end_matches(|c: char| c.is_ascii_digit() || c == ':');
    is_internal(path, &normalize_path(path))
}

/// Collect the distinct, normalized file paths referenced by `traces`,
/// in order of first appearance.
///
/// Recognizes V8 frames (`at fn (path:line:col)`, `at path:line:col`),
/// Python frames (`File "path"`), `File: path` lines, and bare
/// `path.ext:line` references. Runtime internals, anonymous frames and
/// `node_modules` are skipped.
pub fn extract_paths_from_stack_traces<I, S>(traces: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for trace in traces {
        for line in trace.as_ref().lines() {
            for re in FRAME_PATTERNS.iter() {
                for caps in re.captures_iter(line) {
                    let Some(raw) = caps.get(1).map(|m| m.as_str()) else {
                        continue;
                    };
                    let normalized = normalize_path(raw);
                    if is_internal(raw, &normalized) {
                        continue;
                    }
                    if seen.insert(normalized.clone()) {
                        paths.push(normalized);
                    }
                }
            }
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_trace() {
        let trace = "TypeError: Cannot read properties of undefined (reading 'id')\n    at getUser (/app/src/services/user.ts:42:17)\n    at async Router.handle [as handle] (/app/src/api/router.ts:88:5)\n    at Module._compile (node:internal/modules/cjs/loader:1105:14)\n    at /app/node_modules/express/lib/router/index.js:284:7\n    at Object.<anonymous> (/app/src/index.ts:3:1)\n    at <anonymous>";
        assert_eq!(
            extract_paths_from_stack_traces([trace]),
            vec![
                "app/src/services/user.ts",
                "app/src/api/router.ts",
                "app/src/index.ts",
            ]
        );
    }

    #[test]
    fn test_legacy_node_core_frames_skipped() {
        let trace = "Error: boom\n    at handler (/app/src/handler.js:5:3)\n    at emitOne (events.js:116:13)\n    at Socket.onread (net.js:601:20)\n    at readableAddChunk (_stream_readable.js:250:11)\n    at /app/lib/events.js:4:1";
        assert_eq!(
            extract_paths_from_stack_traces([trace]),
            vec!["app/src/handler.js", "app/lib/events.js"]
        );
    }

    #[test]
    fn test_internal_location() {
        assert!(is_internal_location("node:internal/process/task_queues:95:5"));
        assert!(is_internal_location("events.js:116:13"));
        assert!(is_internal_location("/app/node_modules/express/index.js:1:1"));
        assert!(is_internal_location("<anonymous>"));
        assert!(!is_internal_location("/app/src/user.ts:42:17"));
        assert!(!is_internal_location("src/worker.js:12"));
    }

    #[test]
    fn test_bare_location_frame() {
        let paths = extract_paths_from_stack_traces(["    at src/worker.js:12:3"]);
        assert_eq!(paths, vec!["src/worker.js"]);
    }

    #[test]
    fn test_python_trace() {
        let trace = "Traceback (most recent call last):\n  File \"/srv/app/handlers.py\", line 21, in handle\n    result = compute(x)\n  File \"<frozen importlib._bootstrap>\", line 1\nZeroDivisionError: division by zero";
        assert_eq!(extract_paths_from_stack_traces([trace]), vec!["srv/app/handlers.py"]);
    }

    #[test]
    fn test_file_colon_and_generic() {
        let traces = vec![
            "File: services/billing.rb".to_string(),
            "panic: runtime error\n\tcmd/server/main.go:42 +0x1d".to_string(),
        ];
        assert_eq!(
            extract_paths_from_stack_traces(&traces),
            vec!["services/billing.rb", "cmd/server/main.go"]
        );
    }

    #[test]
    fn test_deduplicates_across_traces() {
        let a = "at f (./src/a.ts:1:1)";
        let b = "at g (src/a.ts:9:9)\nat h (src\\a.ts:2:2)";
        assert_eq!(extract_paths_from_stack_traces([a, b]), vec!["src/a.ts"]);
    }

    #[test]
    fn test_empty() {
        assert!(extract_paths_from_stack_traces(Vec::<String>::new()).is_empty());
        assert!(extract_paths_from_stack_traces(["no paths here"]).is_empty());
    }
}
