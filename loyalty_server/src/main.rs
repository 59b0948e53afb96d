use dotenvy::dotenv;
use log::info;
use loyalty_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();

    info!("🚀️ Starting loyalty points gateway with ledger at {}", config.database_url);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
