#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use chrono::Local;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use longmem::{
    period::{month_key, week_key, DATE_FORMAT},
    Config, MemoryEngine, RawRecord, ReindexScope, Role, RollupOutcome, SummaryKind,
};
#[cfg(feature = "cli")]
use tracing::{error, info};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "longmem", version, about = "Long-term conversational memory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Summarize one day (default: today)
    Daily(RollupArgs),
    /// Summarize one ISO week from its daily summaries (default: this week)
    Weekly(RollupArgs),
    /// Summarize one month from its weekly summaries (default: this month)
    Monthly(RollupArgs),
    /// Embed summaries that have no vector for the configured model
    Reindex {
        #[arg(default_value = "all")]
        scope: String,
    },
    /// Rank stored summaries by similarity to a query
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Answer a question from stored summaries
    Ask {
        #[arg(long)]
        refs: bool,
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// One chat turn with memory context
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Append one record to today's log
    Append {
        #[arg(long, default_value = "user")]
        role: String,
        #[arg(required = true)]
        content: Vec<String>,
    },
    /// Record an explicit fact about yourself
    Remember {
        fact: Vec<String>,
    },
    /// Retract an earlier fact
    Forget {
        fact: Vec<String>,
    },
    /// Archive summarized day logs past the retention window
    Sweep,
    /// Database statistics
    Stats,
}

#[cfg(feature = "cli")]
#[derive(clap::Args)]
struct RollupArgs {
    /// Period key (YYYY-MM-DD, YYYY-Www or YYYY-MM)
    #[arg(long)]
    key: Option<String>,
    /// Regenerate even if a summary exists
    #[arg(long)]
    force: bool,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    longmem::telemetry::init_tracing();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    cfg.print_config();

    let engine = MemoryEngine::open(cfg).context("failed to open memory store")?;
    let result = run(&engine, cli.command).await;
    engine.shutdown().await;

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}

#[cfg(feature = "cli")]
async fn run(engine: &MemoryEngine, command: Command) -> anyhow::Result<()> {
    let today = Local::now().date_naive();

    match command {
        Command::Daily(args) => {
            let key = args.key.unwrap_or_else(|| today.format(DATE_FORMAT).to_string());
            rollup(engine, SummaryKind::Daily, &key, args.force).await?;
        }
        Command::Weekly(args) => {
            let key = args.key.unwrap_or_else(|| week_key(today));
            rollup(engine, SummaryKind::Weekly, &key, args.force).await?;
        }
        Command::Monthly(args) => {
            let key = args.key.unwrap_or_else(|| month_key(today));
            rollup(engine, SummaryKind::Monthly, &key, args.force).await?;
        }
        Command::Reindex { scope } => {
            let scope: ReindexScope = scope.parse()?;
            let report = engine.reindex.reindex(scope).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Search { query } => {
            let hits = engine
                .search
                .search(&query.join(" "), engine.config.search_top_k, engine.config.search_min_score)
                .await?;
            if hits.is_empty() {
                println!("No matching summaries.");
            }
            for hit in hits {
                println!("[{:.3}] {} {}\n{}\n", hit.score, hit.period_key, hit.kind, hit.text);
            }
        }
        Command::Ask { refs, question } => {
            let mut input = question.join(" ");
            if refs {
                input.push_str(" --refs");
            }
            println!("{}", engine.assistant.ask(&input).await?);
        }
        Command::Chat { message } => {
            println!("{}", engine.assistant.chat(&message.join(" ")).await?);
        }
        Command::Append { role, content } => {
            let role = match role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                other => anyhow::bail!("unknown role: {}", other),
            };
            engine.log.append(&RawRecord::new(role, content.join(" "))).await?;
            info!("Appended {:?} record", role);
        }
        Command::Remember { fact } => {
            if !engine.assistant.remember(&fact.join(" ")).await? {
                println!("Nothing to remember.");
            }
        }
        Command::Forget { fact } => {
            if !engine.assistant.forget(&fact.join(" ")).await? {
                println!("Nothing to forget.");
            }
        }
        Command::Sweep => {
            let report = engine.archive.sweep(today)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stats => {
            let stats = engine.db.get_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
async fn rollup(engine: &MemoryEngine, kind: SummaryKind, key: &str, force: bool) -> anyhow::Result<()> {
    match engine.rollups.ensure(kind, key, force).await? {
        RollupOutcome::Existing => println!("{} summary {} already exists (use --force to regenerate)", kind, key),
        RollupOutcome::NoSource => println!("No source material for {} {}", kind, key),
        RollupOutcome::Created { id, chunks } => {
            println!("Created {} summary {} (id {}, {} chunk(s))", kind, key, id, chunks)
        }
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
