use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the MCP gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3121")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register (or re-point) a backend under /<name>
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        backend: String,
    },
    /// Describe every registered backend
    Overview,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Register { name, backend } => {
            let res = client
                .post(format!("{}/register", base))
                .json(&json!({ "server_name": name, "server_url": backend }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Overview => {
            let res = client.get(format!("{}/overview", base)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Details: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
