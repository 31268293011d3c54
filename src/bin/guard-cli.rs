use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the service guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List guarded resources with circuit state and in-flight calls
    Resources,
    /// Show one resource
    Resource { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let path = match &cli.command {
        Commands::Status => "/admin/status",
        Commands::Resources | Commands::Resource { .. } => "/admin/resources",
    };
    let res = client
        .get(format!("{}{path}", cli.url.trim_end_matches('/')))
        .headers(headers)
        .send()
        .await?;

    let Some(json) = read_json(res).await? else {
        return Ok(());
    };

    let output = match cli.command {
        Commands::Resource { name } => {
            let found = json
                .as_array()
                .and_then(|resources| resources.iter().find(|r| r["name"] == name.as_str()));
            match found {
                Some(resource) => resource.clone(),
                None => {
                    eprintln!("Error: resource '{name}' is not registered");
                    return Ok(());
                }
            }
        }
        _ => json,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }

    Ok(Some(res.json().await?))
}
