// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Actions, Decrypt, Encrypt, Init, Probe, Run, Set, Version};

use cadmus_cli::logging::{init_logging, register_panic_logger};

command_enum! {
    (Actions, Actions),
    (Decrypt, Decrypt),
    (Encrypt, Encrypt),
    (Init, Init),
    (Probe, Probe),
    (Run, Run),
    (Set, Set),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = cli::op::load_config(args.config_path.clone());
    let log_guard = init_logging(config.log_level());
    register_panic_logger();

    // Resolve remote URL: explicit flag > config remote > built-in default
    let remote = cli::op::resolve_remote(args.remote, &config);

    let ctx = match cli::op::OpContext::new(remote, args.config_path, config, args.vault_secret)
    {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    let result = args.command.execute(&ctx).await;
    // process::exit skips destructors; flush buffered log lines first
    drop(log_guard);

    match result {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
