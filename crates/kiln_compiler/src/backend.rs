//! Compiler backend abstraction.

use std::path::Path;

use crate::CompilerError;

/// Identifies a backend variant in logs, errors and build banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SCSS stylesheets.
    Scss,
    /// JavaScript run through an external transpiler process.
    Transpiler,
    /// JavaScript templates with embedded host code.
    EmbeddedScript,
}

impl BackendKind {
    /// Returns the stable tag of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Scss => "scss",
            BackendKind::Transpiler => "transpiler",
            BackendKind::EmbeddedScript => "embedded-script",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset family a backend produces artifacts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFamily {
    /// CSS output.
    Stylesheet,
    /// JavaScript output.
    Script,
}

impl AssetFamily {
    /// Opening and closing comment delimiters of the output language.
    pub fn comment_delimiters(&self) -> (&'static str, &'static str) {
        match self {
            AssetFamily::Stylesheet | AssetFamily::Script => ("/*", "*/"),
        }
    }
}

/// Static description of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDescriptor {
    /// Backend variant.
    pub kind: BackendKind,
    /// Compiler name shown in build banners.
    pub name: String,
    /// Compiler version shown in build banners.
    pub version: Option<String>,
    /// Handled source extension, without the leading dot (`scss`, `js.php`).
    pub extension: String,
    /// Family of the produced artifacts.
    pub family: AssetFamily,
}

impl CompilerDescriptor {
    /// Returns `name version`, or just the name when no version is known.
    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{} {}", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// Trait for compiler backends.
///
/// A backend turns one source file into output text. It has no knowledge of
/// artifact freshness or where the output ends up.
///
/// - `ScssBackend`: SCSS → CSS via grass
/// - `TranspilerBackend`: JS → JS via an external process
/// - `EmbeddedScriptBackend`: JS with embedded host code → JS
pub trait CompilerBackend: Send + Sync {
    /// Returns the backend descriptor.
    fn descriptor(&self) -> &CompilerDescriptor;

    /// Compiles the source file at `source`.
    ///
    /// # Returns
    ///
    /// The compiled output text, without a build banner.
    fn compile(&self, source: &Path) -> Result<String, CompilerError>;

    /// Maps a source file name to its artifact file name.
    fn artifact_name(&self, source_name: &str) -> String;

    /// Checks if this backend handles the given file.
    fn handles(&self, path: &Path) -> bool {
        let suffix = format!(".{}", self.descriptor().extension);
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.len() > suffix.len() && name.ends_with(&suffix))
    }
}

/// Replaces the last extension of `name` with `extension`.
///
/// A name without an extension gets `extension` appended.
pub fn replace_extension(name: &str, extension: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{}.{}", stem, extension),
        _ => format!("{}.{}", name, extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo.scss", "css", "foo.css")]
    #[case("foo.bar.scss", "css", "foo.bar.css")]
    #[case("app.js", "compiled.js", "app.compiled.js")]
    #[case("Makefile", "css", "Makefile.css")]
    #[case(".hidden", "css", ".hidden.css")]
    fn test_replace_extension(#[case] name: &str, #[case] ext: &str, #[case] expected: &str) {
        assert_eq!(replace_extension(name, ext), expected);
    }

    #[test]
    fn test_display_name() {
        let mut descriptor = CompilerDescriptor {
            kind: BackendKind::Scss,
            name: "grass".to_string(),
            version: Some("0.13".to_string()),
            extension: "scss".to_string(),
            family: AssetFamily::Stylesheet,
        };
        assert_eq!(descriptor.display_name(), "grass 0.13");

        descriptor.version = None;
        assert_eq!(descriptor.display_name(), "grass");
    }

    #[test]
    fn test_backend_kind_tags() {
        assert_eq!(BackendKind::Scss.to_string(), "scss");
        assert_eq!(BackendKind::Transpiler.as_str(), "transpiler");
        assert_eq!(BackendKind::EmbeddedScript.as_str(), "embedded-script");
    }
}
