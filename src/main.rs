use clap::Parser;
use fulcrum::cli::{
    handle_completions, handle_config_init, handle_config_validate, handle_status, Cli, Commands,
    ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => fulcrum::cli::serve::run_serve(args).await,
        Commands::Status(args) => match handle_status(&args).await {
            Ok(output) => {
                println!("{}", output);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
            ConfigCommands::Validate(args) => match handle_config_validate(&args) {
                Ok(summary) => {
                    println!("{}", summary);
                    Ok(())
                }
                Err(e) => Err(e),
            },
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
