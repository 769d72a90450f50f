use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Command line client for the platform relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:80")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the relay is alive
    Hello,
    /// List the platform's tags
    Tags,
    /// List every member of a tag
    Members {
        #[arg(long)]
        tag_id: u64,
    },
    /// Push a template message; the file holds the request JSON
    Push {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Hello => client.get(format!("{}/api/hello", base)).send().await?,
        Commands::Tags => client.get(format!("{}/api/tags", base)).send().await?,
        Commands::Members { tag_id } => {
            client
                .get(format!("{}/api/tag/users", base))
                .query(&[("tag_id", tag_id)])
                .send()
                .await?
        }
        Commands::Push { file } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            client
                .post(format!("{}/api/template/send", base))
                .json(&body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
