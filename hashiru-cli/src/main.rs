//! Command-line entry point for HASHIRU: wires config, registries, and the orchestrator, then
//! runs either one message passed on the command line or an interactive REPL.

use std::io::{self, BufRead, Write as _};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hashiru_core::{
    AgentRegistry, BudgetController, Conversation, HashiruConfig, Message, MemoryRetriever,
    MemoryStore, OpenAIEmbedder, OpenAiCompatibleFactory, OpenAiManagerFactory, Orchestrator,
    StreamWriter, ToolRegistry,
};

/// Run the HASHIRU manager loop.
#[derive(Parser, Debug)]
#[command(name = "hashiru", about = "HASHIRU: a budgeted, self-extending agent manager")]
struct Args {
    /// One-shot message to send. If omitted (and --interactive isn't given either), reads a
    /// single message from stdin.
    message: Option<String>,

    /// Remaining words of a multi-word message passed without quoting.
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Drop into a REPL after handling `message` (or instead of it, if none was given).
    #[arg(short, long)]
    interactive: bool,

    /// Directory for tool/agent/memory state. Defaults to the current directory.
    #[arg(long, default_value = ".")]
    base_dir: String,

    /// Model used for the manager's own reasoning.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = env_config::load_and_apply("hashiru", None) {
        tracing::warn!(error = %e, "no .env/XDG config found; continuing with process environment");
    }
    let config = HashiruConfig::from_env(&args.base_dir);

    let budget = Arc::new(BudgetController::new(config.total_expense_budget, config.vram_gb_override));

    let agents = Arc::new(AgentRegistry::open(
        &config.agent_catalog_path,
        budget.clone(),
        Arc::new(OpenAiCompatibleFactory::new()),
    )?);

    let memory = Arc::new(MemoryStore::open(&config.memory_store_path)?);

    let tools = Arc::new(ToolRegistry::new(
        config.default_tools_dir.clone(),
        config.user_tools_dir.clone(),
        budget.clone(),
        agents.clone(),
        memory.clone(),
    ));
    let report = tools.load().await;
    for (path, err) in &report.failed {
        tracing::warn!(path = %path.display(), error = %err, "tool failed to load");
    }

    let memory_retriever = if std::env::var("OPENAI_API_KEY").is_ok() {
        Some(Arc::new(MemoryRetriever::new(
            memory.clone(),
            Arc::new(OpenAIEmbedder::new("text-embedding-3-small")),
        )))
    } else {
        tracing::info!("OPENAI_API_KEY not set; memory retrieval disabled");
        None
    };

    let manager_factory = Arc::new(OpenAiManagerFactory::new(args.model.clone(), config.system_prompt.clone()));
    let orchestrator = Orchestrator::new(
        budget.clone(),
        tools.clone(),
        memory_retriever,
        manager_factory,
        1e-7,
        4e-7,
    );

    let writer = StreamWriter::noop();
    let mut conversation = Conversation::new();

    let first_message = args.message.map(|m| {
        if args.rest.is_empty() {
            m
        } else {
            format!("{m} {}", args.rest.join(" "))
        }
    });

    if let Some(text) = first_message {
        run_turn(&orchestrator, &mut conversation, &writer, &text).await?;
    }

    if args.interactive {
        let stdin = io::stdin();
        loop {
            print!("> ");
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/exit" || line == "/quit" {
                break;
            }
            run_turn(&orchestrator, &mut conversation, &writer, line).await?;
        }
    }

    Ok(())
}

async fn run_turn(
    orchestrator: &Orchestrator,
    conversation: &mut Conversation,
    writer: &StreamWriter,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    conversation.push(Message::user(text));
    orchestrator.run(conversation, writer).await?;
    if let Some(reply) = conversation.last() {
        println!("{}", reply.content);
    }
    Ok(())
}
