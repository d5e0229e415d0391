//! Artifact classification — the shared extension/keyword policy.
//!
//! Used twice: to pick the vector collection when indexing an artifact, and
//! to pick the downstream agent when routing a file-change event. The policy
//! is deterministic and total: every path classifies to exactly one class.

use crate::vector::Collection;

/// What kind of artifact a path looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactClass {
    Code,
    Test,
    Docs,
    Config,
    Architecture,
    Other,
}

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "h", "hpp", "rb", "php",
    "swift", "kt", "scala", "sh",
];

const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt", "adoc"];

const CONFIG_MARKERS: &[&str] = &[
    ".env", "dockerfile", "docker-compose", "makefile",
];
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json", "ini", "cfg", "conf", "lock"];

const TEST_MARKERS: &[&str] = &["test_", "_test", ".test.", ".spec.", "/tests/", "\\tests\\"];

const ARCHITECTURE_MARKERS: &[&str] = &["architecture", "design", "adr"];

/// Classify an artifact path.
///
/// Precedence: test markers beat code extensions (a `test_foo.py` is a test,
/// not code); architecture markers beat generic docs; config markers beat
/// everything matched later by extension alone.
pub fn classify_path(path: &str) -> ArtifactClass {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit(['/', '\\']).next().unwrap_or(&lower);
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    if TEST_MARKERS.iter().any(|m| lower.contains(m)) {
        return ArtifactClass::Test;
    }
    if ARCHITECTURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return ArtifactClass::Architecture;
    }
    if CONFIG_MARKERS.iter().any(|m| file_name.starts_with(m))
        || CONFIG_EXTENSIONS.contains(&extension)
    {
        return ArtifactClass::Config;
    }
    if CODE_EXTENSIONS.contains(&extension) {
        return ArtifactClass::Code;
    }
    if DOC_EXTENSIONS.contains(&extension) {
        return ArtifactClass::Docs;
    }
    ArtifactClass::Other
}

/// Map an artifact path to the vector collection it indexes into.
pub fn collection_for_path(path: &str) -> Collection {
    match classify_path(path) {
        ArtifactClass::Code => Collection::CodeSnippets,
        ArtifactClass::Test => Collection::TestPatterns,
        ArtifactClass::Architecture => Collection::ArchitecturePatterns,
        ArtifactClass::Docs | ArtifactClass::Config | ArtifactClass::Other => {
            Collection::ProjectPatterns
        }
    }
}
