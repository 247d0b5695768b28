//! deploy-forge CLI - Command-line interface for deployment artifact generation
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to generation pipelines
//! - Handles external concerns like prompting, process exit codes, and terminal output
//! - Provides clean separation between user interface and generation logic

use clap::{Parser, Subcommand, ValueEnum};
use deploy_forge::{
    compose, envfile, Domain, EnvGenOptions, EnvironmentKind, ForgeResult, OutputFormat,
    ReportFormatter, DEFAULT_DOMAIN,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

/// deploy-forge - Deployment artifact generation
#[derive(Parser)]
#[command(name = "deploy-forge")]
#[command(version = "0.1.0")]
#[command(about = "Generate env files and the production compose manifest from templates")]
#[command(
    long_about = "deploy-forge derives every domain-dependent configuration value from a single base hostname, writes it into the checked-in env template, and rewrites the compose template for production. Templates are never mutated; regeneration is the only supported way to change generated artifacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate deployment artifacts from the checked-in templates
    Generate {
        #[command(subcommand)]
        target: GenerateCommands,
    },
}

#[derive(Subcommand)]
enum GenerateCommands {
    /// Generate an environment file
    Env {
        /// Environment to generate for
        kind: EnvironmentKindArg,

        /// Base domain; prompts interactively when omitted
        #[arg(long)]
        domain: Option<String>,

        /// Use the default domain without prompting
        #[arg(long)]
        use_default_domain: bool,

        /// Override file applied after the composed values
        #[arg(long)]
        override_file: Option<PathBuf>,

        /// Template to generate from
        #[arg(long, default_value = envfile::DEFAULT_ENV_TEMPLATE)]
        template: PathBuf,

        /// Output path; defaults to the fixed filename for the kind
        #[arg(long)]
        output: Option<PathBuf>,

        /// Summary output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Generate the production compose manifest
    Compose {
        /// Template to generate from
        #[arg(long, default_value = compose::DEFAULT_COMPOSE_TEMPLATE)]
        template: PathBuf,

        /// Output path
        #[arg(long, default_value = compose::DEFAULT_COMPOSE_OUTPUT)]
        output: PathBuf,

        /// Custom rule file; the built-in rules are used when omitted
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Summary output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum EnvironmentKindArg {
    Development,
    Production,
}

impl From<EnvironmentKindArg> for EnvironmentKind {
    fn from(arg: EnvironmentKindArg) -> Self {
        match arg {
            EnvironmentKindArg::Development => EnvironmentKind::Development,
            EnvironmentKindArg::Production => EnvironmentKind::Production,
        }
    }
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run the command and handle the result
    match run_command(cli) {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("❌ Error: {e}");
            process::exit(1);
        }
    }
}

fn run_command(cli: Cli) -> ForgeResult<i32> {
    match cli.command {
        Commands::Generate { target } => match target {
            GenerateCommands::Env {
                kind,
                domain,
                use_default_domain,
                override_file,
                template,
                output,
                format,
            } => run_generate_env(
                kind.into(),
                domain,
                use_default_domain,
                override_file,
                template,
                output,
                format.into(),
            ),
            GenerateCommands::Compose { template, output, rules, format } => {
                run_generate_compose(template, output, rules, format.into())
            }
        },
    }
}

fn run_generate_env(
    kind: EnvironmentKind,
    domain_arg: Option<String>,
    use_default_domain: bool,
    override_file: Option<PathBuf>,
    template: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> ForgeResult<i32> {
    let domain = resolve_domain(kind, domain_arg, use_default_domain)?;

    let mut options = EnvGenOptions::new(kind, domain);
    options.template_path = template;
    if let Some(output) = output {
        options.output_path = output;
    }
    options.override_path = override_file;

    let report = envfile::generate_env_file(&options)?;

    let formatted = ReportFormatter.format_report(&report, format)?;
    println!("{formatted}");

    Ok(0)
}

fn run_generate_compose(
    template: PathBuf,
    output: PathBuf,
    rules: Option<PathBuf>,
    format: OutputFormat,
) -> ForgeResult<i32> {
    let options = compose::ComposeGenOptions {
        template_path: template,
        output_path: output,
        rules_path: rules,
    };

    let report = compose::generate_compose_file(&options)?;

    let formatted = ReportFormatter.format_report(&report, format)?;
    println!("{formatted}");
    println!("💡 To use:");
    println!("   docker compose -f {} up -d", options.output_path.display());

    Ok(0)
}

/// Resolve the base domain from arguments or an interactive prompt
fn resolve_domain(
    kind: EnvironmentKind,
    domain_arg: Option<String>,
    use_default_domain: bool,
) -> ForgeResult<Domain> {
    if let Some(raw) = domain_arg {
        return Domain::parse(&raw);
    }
    if use_default_domain {
        println!("🌐 Using default domain: {DEFAULT_DOMAIN}");
        return Ok(Domain::default_domain());
    }
    prompt_for_domain(kind)
}

/// Interactive prompt-read-validate loop, retrying on invalid input
fn prompt_for_domain(kind: EnvironmentKind) -> ForgeResult<Domain> {
    match kind {
        EnvironmentKind::Development => println!("🏠 Configuring the DEVELOPMENT environment"),
        EnvironmentKind::Production => println!("🚀 Configuring the PRODUCTION environment"),
    }
    println!();
    println!("📍 Which base domain should be used?");
    println!("   Example: {DEFAULT_DOMAIN}");
    println!();
    println!("💡 The following subdomains are derived automatically:");
    println!("   • Frontend: https://YOUR_DOMAIN");
    println!("   • API: https://api.YOUR_DOMAIN");
    println!("   • Backend/Admin: https://backend-api.YOUR_DOMAIN");
    println!();

    loop {
        print!("Domain [{DEFAULT_DOMAIN}]: ");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes_read = io::stdin().read_line(&mut line)?;
        let raw = line.trim();

        // Empty input (or EOF) accepts the default
        if bytes_read == 0 || raw.is_empty() {
            println!("✅ Domain set: {DEFAULT_DOMAIN}");
            return Ok(Domain::default_domain());
        }

        match Domain::parse(raw) {
            Ok(domain) => {
                println!();
                println!("✅ Domain set: {domain}");
                println!("📍 URLs that will be configured:");
                println!("   • Frontend: https://{domain}");
                println!("   • API: https://api.{domain}");
                println!("   • Backend/Admin: https://backend-api.{domain}");
                println!();
                return Ok(domain);
            }
            Err(e) => {
                eprintln!("❌ {e}");
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
