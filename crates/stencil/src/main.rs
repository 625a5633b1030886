//! Stencil CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version)]
#[command(about = "Template-driven code generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OverwriteMode {
    /// Fail when a destination file already exists
    Fail,
    /// Keep existing files and silently discard generated content
    Keep,
    /// Replace existing files
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncodingName {
    Utf8,
    Utf16le,
    Utf16be,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a template against a JSON model and write the output files
    Generate {
        /// Template resource to load, relative to the template root
        resource: String,

        /// Name of the template to execute within the resource
        template: String,

        /// Directory containing template resources
        #[arg(short = 'r', long, default_value = ".")]
        templates: String,

        /// JSON file holding the model ('-' for stdin)
        #[arg(short = 'm', long)]
        model: String,

        /// Directory generated files are written to
        #[arg(short = 'o', long, default_value = ".")]
        output_dir: String,

        /// Suffix appended to every channel name when mapping to a file
        #[arg(long)]
        suffix: Option<String>,

        /// What to do when a destination file already exists
        #[arg(long, value_enum, default_value_t = OverwriteMode::Fail)]
        overwrite: OverwriteMode,

        /// Output file encoding
        #[arg(long, value_enum, default_value_t = EncodingName::Utf8)]
        encoding: EncodingName,

        /// Channel generated text outside any output block goes to
        #[arg(long)]
        default_channel: Option<String>,

        /// Also write an HTML provenance trace next to each generated file
        #[arg(long)]
        trace: bool,
    },

    /// Load a template resource and print its structure
    Show {
        /// Template resource to load, relative to the template root
        resource: String,

        /// Directory containing template resources
        #[arg(short = 'r', long, default_value = ".")]
        templates: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stencil=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            resource,
            template,
            templates,
            model,
            output_dir,
            suffix,
            overwrite,
            encoding,
            default_channel,
            trace,
        } => commands::generate::execute(commands::generate::GenerateArgs {
            resource,
            template,
            templates,
            model,
            output_dir,
            suffix,
            overwrite: match overwrite {
                OverwriteMode::Fail => stencil_engine::OverwritePolicy::FailIfExists,
                OverwriteMode::Keep => stencil_engine::OverwritePolicy::KeepExisting,
                OverwriteMode::Overwrite => stencil_engine::OverwritePolicy::Overwrite,
            },
            encoding: match encoding {
                EncodingName::Utf8 => stencil_engine::Encoding::Utf8,
                EncodingName::Utf16le => stencil_engine::Encoding::Utf16Le,
                EncodingName::Utf16be => stencil_engine::Encoding::Utf16Be,
            },
            default_channel,
            trace,
        }),
        Commands::Show { resource, templates } => commands::show::execute(&templates, &resource),
    }
}
