use clap::Parser;
use tally::cli::{
    handle_completions, handle_config_init, handle_export, handle_status, run_reconcile, Cli,
    Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile(args) => run_reconcile(args).await.map(|output| {
            println!("{}", output);
        }),
        Commands::Status(args) => handle_status(&args).map(|output| {
            println!("{}", output);
        }),
        Commands::Export(args) => handle_export(&args).map(|output| {
            println!("{}", output);
        }),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
