//! Build banners prepended to artifacts.

use std::time::Duration;

use chrono::{DateTime, Local};
use kiln_compiler::CompilerDescriptor;

/// Renders the comment block placed at the top of every artifact.
///
/// ```text
/// /*
///  * Compiled with grass
///  * Build date: 2024-05-01
///  * Build time: 13:37:00
///  * Build duration: 0.042s
///  */
/// ```
pub fn render(descriptor: &CompilerDescriptor, built_at: DateTime<Local>, duration: Duration) -> String {
    let (open, close) = descriptor.family.comment_delimiters();

    format!(
        "{open}\n * Compiled with {}\n * Build date: {}\n * Build time: {}\n * Build duration: {:.3}s\n {close}\n",
        descriptor.display_name(),
        built_at.format("%Y-%m-%d"),
        built_at.format("%H:%M:%S"),
        duration.as_secs_f64(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kiln_compiler::{AssetFamily, BackendKind};
    use pretty_assertions::assert_eq;

    fn descriptor(version: Option<&str>) -> CompilerDescriptor {
        CompilerDescriptor {
            kind: BackendKind::Scss,
            name: "grass".to_string(),
            version: version.map(str::to_string),
            extension: "scss".to_string(),
            family: AssetFamily::Stylesheet,
        }
    }

    #[test]
    fn test_render() {
        let built_at = Local.with_ymd_and_hms(2024, 5, 1, 13, 37, 5).unwrap();

        let banner = render(&descriptor(Some("0.13")), built_at, Duration::from_millis(42));

        assert_eq!(
            banner,
            "/*\n * Compiled with grass 0.13\n * Build date: 2024-05-01\n * Build time: 13:37:05\n * Build duration: 0.042s\n */\n"
        );
    }

    #[test]
    fn test_render_without_version() {
        let built_at = Local.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();

        let banner = render(&descriptor(None), built_at, Duration::from_secs(2));

        assert!(banner.contains(" * Compiled with grass\n"));
        assert!(banner.contains(" * Build duration: 2.000s\n"));
    }
}
