use binflow::cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("binflow=debug,info")
    } else {
        EnvFilter::new("binflow=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Configure(args) => {
            cli::configure::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::CallBin(args) => {
            cli::call_bin::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Consolidate(args) => {
            cli::consolidate::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::CountBases(args) => {
            cli::count_bases::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::ShowPlan(args) => {
            cli::show_plan::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
