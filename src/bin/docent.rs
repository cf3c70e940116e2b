use clap::{ArgAction, Parser, Subcommand};
use docent::Store;

#[derive(Parser, Debug)]
#[command(name = "docent", version, about = "Docent CLI")]
struct Cli {
    /// Postgres connection string. Falls back to DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Entity tables to operate on (repeatable)
    #[arg(long = "table", action = ArgAction::Append)]
    tables: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create entity tables and containment indexes as needed
    Setup,

    /// Delete every row from the given entity tables
    Wipe,
}

#[tokio::main]
async fn main() -> docent::Result<()> {
    let cli = Cli::parse();

    let url = match cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
    {
        Some(u) => u,
        None => {
            eprintln!("error: pass --database-url or set DATABASE_URL");
            std::process::exit(2);
        }
    };
    if cli.tables.is_empty() {
        eprintln!("error: pass at least one --table");
        std::process::exit(2);
    }

    let store = Store::connect(&url).await?;
    for table in &cli.tables {
        let repo = store.repository::<serde_json::Value>(table);
        match &cli.command {
            Commands::Setup => {
                repo.create_table().await?.create_index().await?;
                println!("ready: {table}");
            }
            Commands::Wipe => {
                repo.delete_all().await?;
                println!("wiped: {table}");
            }
        }
    }
    Ok(())
}
