//! Build command implementation

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use kiln_core::{BuildError, BuildReport};
use miette::{IntoDiagnostic, LabeledSpan, NamedSource, Report, Result};
use tracing::{error, warn};

use super::open_pipeline;
use crate::cli::Cli;

pub fn run_build(cli: &Cli, paths: &[PathBuf], force: bool) -> Result<bool> {
    let pipeline = open_pipeline(cli)?;
    let production = pipeline.config().is_production();

    let report = if paths.is_empty() {
        pipeline.build_all(force).into_diagnostic()?
    } else {
        pipeline.build_paths(paths, force)
    };

    // Production fails closed: no artifact paths once anything failed
    if production && report.has_failures() {
        for (source, err) in &report.failures {
            error!("Failed to build {}: {}", source.display(), err);
        }
        error!("Build failed ({} errors)", report.failures.len());
        return Ok(true);
    }

    output_report(&report);
    Ok(report.has_failures())
}

fn output_report(report: &BuildReport) {
    for built in &report.built {
        println!("{}", built.artifact.display());
    }

    for source in &report.skipped {
        warn!("Skipped {}", source.display());
    }

    for (source, err) in &report.failures {
        eprintln!("{:?}", failure_report(source, err));
    }

    println!();
    println!(
        "Built {} artifacts ({} compiled), {} skipped, {} failed",
        report.built.len(),
        report.compiled,
        report.skipped.len(),
        report.failures.len()
    );
}

/// Renders a build failure, with the offending source line when known.
fn failure_report(source: &Path, err: &BuildError) -> Report {
    let Some(compile) = err.as_compile_error() else {
        return miette::miette!("Failed to build {}: {}", source.display(), err);
    };

    let snippet = compile.line.and_then(|line| {
        let text = fs::read_to_string(&compile.path).ok()?;
        let span = line_span(&text, line)?;
        Some((text, span))
    });

    match snippet {
        Some((text, span)) => miette::miette!(
            labels = vec![LabeledSpan::at(span, "here")],
            "{}",
            compile.message
        )
        .with_source_code(NamedSource::new(compile.path.display().to_string(), text)),
        None => miette::miette!("{}", compile),
    }
}

/// Byte range of the 1-based `line` in `text`, without its terminator.
fn line_span(text: &str, line: usize) -> Option<Range<usize>> {
    let index = line.checked_sub(1)?;
    let mut offset = 0;

    for (i, content) in text.split_inclusive('\n').enumerate() {
        if i == index {
            let len = content.trim_end_matches(['\r', '\n']).len();
            return Some(offset..offset + len);
        }
        offset += content.len();
    }

    None
}
