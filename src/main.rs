use clap::Parser;
use dotenv::dotenv;
use log::error;
use vision_chat::cli::Args;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = vision_chat::run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
