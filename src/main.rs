//! a11ypub - EPUB accessibility fixer

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use a11ypub::{
    Error, Pipeline, PipelineOptions, ReviewSet, analyze, apply, nav, qualify, read_package,
    write_package,
};

#[derive(Parser)]
#[command(name = "a11ypub")]
#[command(version, about = "Accessibility fixer for EPUB books", long_about = None)]
#[command(after_help = "EXAMPLES:
    a11ypub process book.epub fixed.epub --review review.json
    a11ypub apply fixed.epub review.json final.epub
    a11ypub inspect book.epub")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fix a book and write the result
    Process {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Language to use when the book declares none (e.g. "en")
        #[arg(short, long)]
        language: Option<String>,

        /// Write the image review set to this JSON file
        #[arg(short, long, value_name = "FILE")]
        review: Option<PathBuf>,

        /// Do not add accessibility metadata to the package document
        #[arg(long)]
        no_metadata: bool,
    },
    /// Write reviewed image descriptions back into a book
    Apply {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "REVIEW")]
        review: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Show what processing would find, without writing anything
    Inspect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Process {
            input,
            output,
            language,
            review,
            no_metadata,
        } => process(&input, &output, language, review.as_deref(), !no_metadata),
        Command::Apply {
            input,
            review,
            output,
        } => apply_review(&input, &review, &output),
        Command::Inspect { input } => inspect(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_terminal() => {
            eprintln!("refusing to process: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn process(
    input: &Path,
    output: &Path,
    language: Option<String>,
    review: Option<&Path>,
    metadata: bool,
) -> Result<(), Error> {
    let mut package = read_package(input)?;

    let mut options = PipelineOptions::new().with_accessibility_metadata(metadata);
    if let Some(language) = language {
        options = options.with_language(language);
    }
    let report = Pipeline::new(options).run(&mut package)?;

    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.href, failure.error);
    }
    for warning in &report.warnings {
        eprintln!("warning {}: {}", warning.href, warning.warning);
    }

    write_package(&package, output)?;
    println!(
        "{}: {} documents processed, {} changed, {} skipped",
        output.display(),
        report.processed,
        report.changed,
        report.failures.len()
    );

    let pending = report.review.pending().count();
    if let Some(path) = review {
        std::fs::write(path, report.review.to_json()?)?;
        println!(
            "{}: {} images, {} without description",
            path.display(),
            report.review.len(),
            pending
        );
    } else if pending > 0 {
        println!("{pending} images need a description; use --review to export them");
    }

    Ok(())
}

fn apply_review(input: &Path, review: &Path, output: &Path) -> Result<(), Error> {
    let mut package = read_package(input)?;
    let review = ReviewSet::from_json(&std::fs::read_to_string(review)?)?;

    let report = apply(&mut package, &review);
    for stale in &report.stale {
        eprintln!("stale: {stale}");
    }

    write_package(&package, output)?;
    println!(
        "{}: {} descriptions applied, {} unchanged, {} stale",
        output.display(),
        report.applied,
        report.unchanged,
        report.stale.len()
    );
    Ok(())
}

fn inspect(input: &Path) -> Result<(), Error> {
    let mut package = read_package(input)?;

    println!("File: {}", input.display());
    if !package.metadata.title.is_empty() {
        println!("Title: {}", package.metadata.title);
    }
    if !package.metadata.identifier.is_empty() {
        println!("Identifier: {}", package.metadata.identifier);
    }
    println!("Version: {:?}", package.version);
    println!(
        "Accessibility metadata: {}",
        if package.metadata.has_accessibility_metadata { "present" } else { "missing" }
    );

    if let Err(d) = qualify::check(&package) {
        println!("Qualification: refused, {d}");
        return Ok(());
    }
    println!("Qualification: ok");

    // Analysis edits the in-memory package document only; nothing is written.
    let info = match analyze::analyze(&mut package, &analyze::AnalyzeOptions::new()) {
        Ok(info) => info,
        Err(Error::MissingLanguage) => {
            println!("Language: none declared");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    println!("Language: {}", info.language);
    println!("Nav document: {}", info.nav_href.as_deref().unwrap_or("none"));
    println!("NCX: {}", info.ncx_href.as_deref().unwrap_or("none"));

    let nav = nav::extract(&package, &info);
    let hrefs = package.text_hrefs();
    let landmarks = nav.values().filter(|entry| entry.landmark.is_some()).count();
    println!("Content documents: {}", hrefs.len());
    println!(
        "Navigation: {} titled, {} landmarks",
        hrefs
            .iter()
            .filter(|href| nav.get(*href).is_some_and(|e| e.title.is_some()))
            .count(),
        landmarks
    );

    let report = Pipeline::new(PipelineOptions::new()).run(&mut package)?;
    println!(
        "Images: {} ({} without description)",
        report.review.len(),
        report.review.pending().count()
    );
    for item in report.review.pending() {
        println!("  {} #{}: {}", item.record.document, item.record.index, item.record.src);
    }
    for failure in &report.failures {
        println!("Unreadable: {}: {}", failure.href, failure.error);
    }

    Ok(())
}
