use plugwright::build::BuildAction;
use plugwright::cli::commands::{CliArgs, Commands};
use plugwright::cli::handlers::{
    handle_check, handle_config, handle_context, handle_deps, handle_diagnose, handle_fix,
    handle_patch, handle_run,
};
use plugwright::util::logging::{init_logging, LoggingConfig};
use plugwright::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_args(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("plugwright v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Configure(run) => handle_run(BuildAction::Configure, run, args.quiet).await,
        Commands::Build(run) => handle_run(BuildAction::Build, run, args.quiet).await,
        Commands::Clean(run) => handle_run(BuildAction::Clean, run, args.quiet).await,
        Commands::Fix(fix) => handle_fix(fix, args.quiet).await,
        Commands::Diagnose(diagnose) => handle_diagnose(diagnose),
        Commands::Check(check) => handle_check(check),
        Commands::Deps(deps) => handle_deps(deps),
        Commands::Context(context) => handle_context(context),
        Commands::Patch(patch) => handle_patch(patch).await,
        Commands::Config(config) => handle_config(config),
    };

    std::process::exit(exit_code);
}
