use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

use logstory::analysis::Analyzer;
use logstory::config::Config;
use logstory::output::{OutputFormat, OutputHandler};
use logstory::persistence::{AnalysisStore, SqliteAnalysisStore};
use logstory::recommend::Playbook;

/// Auth log analysis command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "logstory", about = "Turn SSH auth logs into findings and a narrative")]
struct Cli {
    /// Path to configuration file
    #[structopt(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Analyse an auth log file
    Analyze {
        /// Path to log file
        #[structopt(short, long)]
        file: PathBuf,
        /// Markdown playbook overriding the configured one
        #[structopt(short, long)]
        playbook: Option<PathBuf>,
        /// Do not record the analysis in history
        #[structopt(long)]
        no_store: bool,
    },
    /// List past analyses
    History {
        /// Maximum number of analyses to list
        #[structopt(short, long)]
        limit: Option<usize>,
    },
    /// Show one past analysis
    Show {
        /// Analysis id
        id: i64,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::from_args();

    if let Command::Config { output } = &cli.command {
        Config::default().to_file(output)?;
        println!("Default configuration written to: {:?}", output);
        return Ok(());
    }

    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Command::Analyze {
            file,
            playbook,
            no_store,
        } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }

            let mut analyzer = Analyzer::from_config(&config);
            if let Some(path) = playbook {
                analyzer = analyzer.with_playbook(Playbook::load_or_empty(path));
            }
            if !no_store {
                analyzer = analyzer.with_store(open_store(&config)?);
            }

            let report = analyzer.analyze_file(&file).await?;

            let mut output = OutputHandler::new(
                OutputFormat::parse(&config.output.format),
                config.output.file_path.clone(),
            )?;
            output.write_report(&report)?;
            output.flush()?;
        }
        Command::History { limit } => {
            let store = open_store(&config)?;
            let limit = limit.unwrap_or(config.storage.history_limit);
            let records = store.list_analyses(limit)?;

            println!("{} analysis record(s):\n", records.len());
            for record in records {
                println!(
                    "  #{} [{}] {}: {}",
                    record.id,
                    record.created_at,
                    record.source,
                    truncate(&record.narrative, 80)
                );
            }
        }
        Command::Show { id } => {
            let store = open_store(&config)?;
            match store.get_analysis(id)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => {
                    eprintln!("Analysis not found: {}", id);
                    std::process::exit(1);
                }
            }
        }
        Command::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn AnalysisStore>, Box<dyn std::error::Error>> {
    let store = SqliteAnalysisStore::new(&config.storage.db_path)?;
    log::debug!("Using history database {:?}", config.storage.db_path);
    Ok(Arc::new(store))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
