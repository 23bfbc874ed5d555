//! Command line.
//!
//! `-B`, `-S`, `-I`, `--no-include-following` and `-Q` are order sensitive:
//! `-I` and `-Q` apply to the source folders given after them.

use crate::config::SourceSpec;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use convenient_osgi::SourceKind;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ecabu")]
#[command(version, about = "Resolve Eclipse/OSGi bundles and build them in dependency order", long_about = None)]
pub struct Cli {
    /// Add a binary bundles FOLDER to the sources
    #[arg(short = 'B', long = "binary", value_name = "FOLDER")]
    pub binary: Vec<PathBuf>,

    /// Add a source bundles FOLDER to the sources
    #[arg(short = 'S', long = "source", value_name = "FOLDER")]
    pub source: Vec<PathBuf>,

    /// Include all bundles from the following sources into the build
    #[arg(short = 'I', long = "include-following", action = ArgAction::Count)]
    pub include_following: u8,

    /// Stop including bundles from the following sources
    #[arg(long = "no-include-following", action = ArgAction::Count)]
    pub no_include_following: u8,

    /// Replace the `qualifier` version token for the following sources
    #[arg(short = 'Q', long = "qualifier", value_name = "VALUE")]
    pub qualifier: Vec<String>,

    /// Include a bundle by symbolic name
    #[arg(short = 'b', long = "bundle", value_name = "NAME")]
    pub bundles: Vec<String>,

    /// YAML config file, overridden by command line flags
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Java compiler to run
    #[arg(long, value_name = "PATH")]
    pub javac: Option<PathBuf>,

    /// Report unresolved references as warnings and build anyway
    #[arg(long)]
    pub allow_unresolved: bool,

    /// Build fragments of this host before the host itself
    #[arg(long = "after-fragments", value_name = "NAME")]
    pub after_fragments: Vec<String>,

    /// Print the plan without building
    #[arg(long)]
    pub dry_run: bool,

    /// Print the build plan as JSON
    #[arg(long)]
    pub print_plan: bool,

    /// Debug logging for topics (manifest, resolve, build or a log target)
    #[arg(long, value_delimiter = ',', value_name = "x,y,z")]
    pub debug: Vec<String>,

    /// Run verbosely
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parsed command line with the source folders in command line order.
#[derive(Debug)]
pub struct CliInvocation {
    /// Flags as parsed
    pub cli: Cli,
    /// Source folders with the `-I` and `-Q` state in effect where they appeared
    pub sources: Vec<SourceSpec>,
}

enum SourceFlag {
    Folder(SourceKind, PathBuf),
    Include(bool),
    Qualifier(String),
}

impl Cli {
    /// Parse the process arguments.
    ///
    /// # Errors
    ///
    /// Returns clap's error for invalid flags; `--help` and `--version` also
    /// come back as errors, to be handled with [`clap::Error::exit`].
    pub fn parse_args<I, T>(args: I) -> Result<CliInvocation, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let cli = Self::from_arg_matches(&matches)?;
        let sources = ordered_sources(&matches);
        Ok(CliInvocation { cli, sources })
    }
}

fn indexed<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Vec<(usize, T)> {
    match (matches.indices_of(id), matches.get_many::<T>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.cloned()).collect(),
        _ => Vec::new(),
    }
}

fn flag_indices(matches: &ArgMatches, id: &str) -> Vec<usize> {
    matches
        .indices_of(id)
        .map(Iterator::collect)
        .unwrap_or_default()
}

fn ordered_sources(matches: &ArgMatches) -> Vec<SourceSpec> {
    let mut flags: Vec<(usize, SourceFlag)> = Vec::new();
    for (index, path) in indexed::<PathBuf>(matches, "binary") {
        flags.push((index, SourceFlag::Folder(SourceKind::Binary, path)));
    }
    for (index, path) in indexed::<PathBuf>(matches, "source") {
        flags.push((index, SourceFlag::Folder(SourceKind::Source, path)));
    }
    for (index, qualifier) in indexed::<String>(matches, "qualifier") {
        flags.push((index, SourceFlag::Qualifier(qualifier)));
    }
    for index in flag_indices(matches, "include_following") {
        flags.push((index, SourceFlag::Include(true)));
    }
    for index in flag_indices(matches, "no_include_following") {
        flags.push((index, SourceFlag::Include(false)));
    }
    flags.sort_by_key(|(index, _)| *index);

    let mut include = false;
    let mut qualifier = None;
    let mut sources = Vec::new();
    for (_, flag) in flags {
        match flag {
            SourceFlag::Include(value) => include = value,
            SourceFlag::Qualifier(value) => qualifier = Some(value),
            SourceFlag::Folder(kind, path) => sources.push(SourceSpec {
                kind,
                path,
                include,
                qualifier: qualifier.clone(),
            }),
        }
    }
    sources
}

/// `EnvFilter` directives for the given verbosity and debug topics.
pub fn log_filter(verbose: bool, debug: &[String]) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec![
        format!("ecabu={level}"),
        format!("convenient_osgi={level}"),
        format!("convenient_manifest={level}"),
    ];
    for topic in debug {
        let target = match topic.as_str() {
            "manifest" => "convenient_manifest",
            "resolve" => "convenient_osgi",
            "build" => "ecabu",
            other => other,
        };
        directives.push(format!("{target}=debug"));
    }
    directives.join(",")
}
