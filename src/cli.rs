use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::{abbrev::Scorer, identifier::Doi, resolver::RecordFormat};

#[derive(Parser, Debug)]
#[command(version, about = "Resolve, cite and rename journal article PDFs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to <config dir>/journaltk/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON dictionary of journal names merged over the built-in one
    #[arg(long, global = true, value_name = "FILE")]
    pub journals: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get the BibTeX entry of a DOI
    Bibtex {
        #[arg(value_name = "DOI", value_parser = parse_doi)]
        doi: Doi,
        /// Keep the journal name as published instead of abbreviating it
        #[arg(long)]
        no_abbreviate_journal: bool,
        /// Similarity scorer used to match the journal name
        #[arg(long, value_name = "NAME")]
        scorer: Option<Scorer>,
    },
    /// Print the raw metadata record of a DOI
    Fetch {
        #[arg(value_name = "DOI", value_parser = parse_doi)]
        doi: Doi,
        /// Record format: bibtex or xml
        #[arg(long, default_value = "bibtex")]
        format: RecordFormat,
    },
    /// Get the DOI of a PDF file
    PdfDoi {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Rename a journal article PDF from its metadata
    PdfRename {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// DOI of the file; extracted from the file when omitted
        #[arg(long, value_parser = parse_doi)]
        doi: Option<Doi>,
        /// File name template using {year}, {authors} and {journal}
        #[arg(long = "fmt", value_name = "TEMPLATE")]
        template: Option<String>,
        /// Show the new name without renaming
        #[arg(long)]
        dry_run: bool,
        /// Similarity scorer used to match the journal name
        #[arg(long, value_name = "NAME")]
        scorer: Option<Scorer>,
    },
}

fn parse_doi(s: &str) -> Result<Doi, String> {
    Doi::from_input(s).ok_or_else(|| "DOI must not be empty".to_string())
}
