use clap::Parser;
use transform_cache::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(cli::parse_error_code(&e));
        }
    };

    let result = cli::run(cli).await;
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    std::process::exit(cli::exit_code_for(&result));
}
