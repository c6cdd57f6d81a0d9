use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use tally_lang::{
    cli::{self, CheckOptions, CheckResult, CliError},
    output::render_results,
};

#[derive(ClapParser)]
#[command(name = "tally")]
#[command(about = "Tally - evaluate business rules against a JSON environment")]
#[command(version)]
struct Cli {
    /// Log compilation and execution to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule and run it
    Check {
        /// The rule source
        rule: String,

        /// Environment as a JSON object (reads from stdin if not provided)
        #[arg(short, long)]
        env: Option<String>,

        /// Use float arithmetic instead of exact decimals
        #[arg(long)]
        float: bool,

        /// Name of the default result group
        #[arg(long)]
        result_key: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "tally_lang=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check {
            rule,
            env,
            float,
            result_key,
            pretty,
            syntax_only,
        } => run_check(
            CheckOptions {
                rule,
                env,
                float,
                result_key,
                syntax_only,
            },
            pretty,
        ),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(mut options: CheckOptions, pretty: bool) -> Result<(), CliError> {
    if options.env.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.env = Some(buffer);
    }

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success(results) => println!("{}", render_results(&results, pretty)),
    }
    Ok(())
}
