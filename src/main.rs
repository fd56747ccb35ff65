use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use trade_sql_bot::{
    monitoring,
    storage::{create_sqlite_pool, DataGenerator},
    types::AppConfig,
    web, App,
};

#[derive(Parser, Debug)]
#[command(name = "trade-sql-bot")]
#[command(about = "Ask questions about trade records in plain language", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seed the database and serve the web UI
    Serve {
        /// Override the bind address from the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Answer a single question and exit
    Ask {
        question: String,
        /// Print the rows without asking the model to phrase an answer
        #[arg(long)]
        raw: bool,
    },
    /// Create the trades table and insert random records
    Seed {
        #[arg(short, long)]
        records: Option<usize>,
    },
    /// Print the trades table schema
    Schema,
    /// Print every trade record
    Trades,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "trade_sql_bot=debug,chatbot=debug,info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    tracing::debug!(target: "chatbot", config = %cli.config, "loading config");

    let mut settings = if std::path::Path::new(&cli.config).exists() {
        AppConfig::from_file(&cli.config)?
    } else {
        tracing::warn!(target: "chatbot", config = %cli.config, "config file not found, using defaults");
        AppConfig::default()
    };
    settings.apply_env();

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.server.bind_addr = bind;
            }
            monitoring::logger::log_startup(&settings);

            let app = App::build(&settings).await?;
            if settings.database.seed_records > 0 {
                app.generator
                    .generate_records(settings.database.seed_records)
                    .await?;
            }
            if settings.server.metrics_log_secs > 0 {
                monitoring::dashboard::spawn_dashboard_task(Duration::from_secs(
                    settings.server.metrics_log_secs,
                ));
            }
            web::serve(&settings.server.bind_addr, app.web_state()).await?;
        }
        Commands::Ask { question, raw } => {
            if raw {
                settings.chat.format_response = false;
            }
            let app = App::build(&settings).await?;
            match app.agent.respond(&question).await {
                Ok(turn) => {
                    println!("SQL: {}", turn.sql.trim());
                    println!("Rows: {}", turn.outcome.raw_display());
                    if let Some(answer) = turn.answer {
                        println!("{answer}");
                    }
                }
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Seed { records } => {
            let generator = open_generator(&settings).await?;
            let inserted = generator
                .generate_records(records.unwrap_or(settings.database.seed_records))
                .await?;
            println!("inserted {inserted} trade records");
        }
        Commands::Schema => {
            let generator = open_generator(&settings).await?;
            for col in generator.table_schema().await? {
                println!(
                    "{}\t{}\t{}\tnotnull={}\tpk={}",
                    col.cid, col.name, col.data_type, col.notnull, col.pk
                );
            }
        }
        Commands::Trades => {
            let generator = open_generator(&settings).await?;
            for t in generator.all_trades().await? {
                println!("{}\t{}\t{}\t{:.2}", t.id, t.symbol, t.quantity, t.price);
            }
        }
    }

    Ok(())
}

async fn open_generator(settings: &AppConfig) -> anyhow::Result<DataGenerator> {
    let generator = DataGenerator::new(create_sqlite_pool(&settings.database).await?);
    generator.create_table().await?;
    Ok(generator)
}
