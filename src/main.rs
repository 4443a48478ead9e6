use std::{path::Path, process::ExitCode, time::Duration};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream::Stderr};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    abbrev::Dictionary,
    cli::{Cli, Command},
    config::Settings,
    document::{Metadata, pdf::PdfDocument},
    identifier::Doi,
    render::Abbreviation,
    resolver::{HttpTransport, RecordFormat, Resolver},
};

mod abbrev;
mod cli;
mod config;
mod document;
mod identifier;
mod record;
mod render;
mod rename;
mod resolver;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,journaltk={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(args: Cli) -> anyhow::Result<ExitCode> {
    let settings = config::load(args.config.as_deref())?;
    let journals = args.journals.or_else(|| settings.custom_journals.clone());
    let spinner = args.verbose == 0;

    match args.command {
        Command::Bibtex {
            doi,
            no_abbreviate_journal,
            scorer,
        } => {
            let Some(text) = fetch(&settings, &doi, RecordFormat::Bibtex, spinner) else {
                error!("no BibTeX record found for {doi}");
                return Ok(ExitCode::FAILURE);
            };
            let Some(entry) = record::parse(&text).into_iter().next() else {
                error!("no BibTeX record found for {doi}");
                return Ok(ExitCode::FAILURE);
            };
            let dictionary = if no_abbreviate_journal {
                None
            } else {
                Some(Dictionary::load(journals.as_deref())?)
            };
            let abbreviation = dictionary
                .as_ref()
                .map(|d| Abbreviation::new(d, scorer.unwrap_or(settings.scorer)));
            print!("{}", render::citation_block(&entry, abbreviation));
        }
        Command::Fetch { doi, format } => {
            let Some(text) = fetch(&settings, &doi, format, spinner) else {
                error!("no {format} record found for {doi}");
                return Ok(ExitCode::FAILURE);
            };
            println!("{}", text.trim_end());
        }
        Command::PdfDoi { file } => {
            let document = PdfDocument::open(&file)?;
            let extraction = identifier::extract(&document)?;
            match extraction.doi() {
                Some(doi) => println!("{doi}"),
                None if extraction.metadata.is_empty() => {
                    error!("{} does not have metadata", file.display());
                    return Ok(ExitCode::FAILURE);
                }
                None => {
                    error!("could not find the DOI embedded in the file metadata");
                    dump_metadata(&extraction.metadata);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::PdfRename {
            file,
            doi,
            template,
            dry_run,
            scorer,
        } => {
            let Some(doi) = doi.map_or_else(|| doi_from_pdf(&file), |d| Ok(Some(d)))? else {
                error!("could not find the DOI embedded in {}", file.display());
                return Ok(ExitCode::FAILURE);
            };
            let Some(text) = fetch(&settings, &doi, RecordFormat::Bibtex, spinner) else {
                error!("no BibTeX record found for {doi}");
                return Ok(ExitCode::FAILURE);
            };
            let Some(entry) = record::parse(&text).pop() else {
                error!("no BibTeX record found for {doi}");
                return Ok(ExitCode::FAILURE);
            };
            let dictionary = Dictionary::load(journals.as_deref())?;
            let abbreviation = Abbreviation::new(&dictionary, scorer.unwrap_or(settings.scorer));
            let template = template.unwrap_or_else(|| settings.template.clone());
            let stem = render::filename_stem(&entry, &template, abbreviation)?;
            let target = rename::rename(&file, &stem, dry_run)?;
            info!(
                "{} -> {}{}",
                file.display(),
                target.display(),
                if dry_run { " (dry run)" } else { "" }
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn doi_from_pdf(file: &Path) -> anyhow::Result<Option<Doi>> {
    let document = PdfDocument::open(file)?;
    Ok(identifier::extract(&document)?
        .identifier
        .map(|(doi, _)| doi))
}

/// Resolve `doi`, showing a spinner on an interactive terminal while the services are queried.
fn fetch(settings: &Settings, doi: &Doi, format: RecordFormat, spinner: bool) -> Option<String> {
    let transport = HttpTransport::new(settings.connect_timeout, settings.timeout);
    let resolver = Resolver::new(transport, &settings.services);

    let progress = if spinner {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(format!("resolving {doi}"));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };
    let text = resolver.resolve(doi, format);
    progress.finish_and_clear();
    text
}

fn dump_metadata(metadata: &Metadata) {
    for (key, value) in metadata {
        eprintln!(
            "  {}: {}",
            key.if_supports_color(Stderr, |k| k.bold()),
            value
        );
    }
}
