//! Ecabu - Eclipse bundle builder
//!
//! Builds a set of OSGi bundles in dependency order:
//! - **discovery**: finds bundles in binary and source folders
//! - **convenient-osgi**: selection, resolution, build planning and classpath propagation
//! - **materialize**: uses binary bundles in place and compiles source bundles with `javac`
//!
//! ## Usage
//!
//! ```no_run
//! use ecabu::{Cli, Options, run};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let invocation = Cli::parse_args(["ecabu", "-B", "target/plugins", "-I", "-S", "workspace"])?;
//! let options = Options::from_invocation(invocation)?;
//! let report = run(&options)?;
//! println!("{} bundles built", report.built);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod build_properties;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod materialize;
pub mod run;

pub use build_properties::BuildProperties;
pub use cli::{Cli, CliInvocation, log_filter};
pub use config::{ConfigFile, Options, SourceSpec};
pub use discovery::find_bundles;
pub use error::{ArchiveError, ConfigError, EcabuError};
pub use materialize::JavacMaterializer;
pub use run::{PlannedBundle, RunReport, run};
