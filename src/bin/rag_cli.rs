use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use wikirag::config::{init_tracing, ServiceArgs};

#[derive(Parser, Debug)]
#[command(
    name = "wikirag",
    about = "Answer questions from Wikipedia pages, or run a single retrieval stage"
)]
struct RagCli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route a question exactly like the chat server does and print the reply
    Ask {
        /// Question to answer
        #[arg(long)]
        query: String,
    },
    /// Rank the passages of one page against a query (no chat model involved)
    Retrieve {
        /// Wikipedia page title, e.g. "New York"
        #[arg(long)]
        page: String,

        /// Phrase to look up within the page
        #[arg(long)]
        query: String,

        /// Print the ranked passages as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch the short summary of the page a query names
    Summary {
        /// Query such as "quick summary of the Eiffel Tower"
        #[arg(long)]
        query: String,
    },
}

fn main() -> Result<()> {
    let cli = RagCli::parse();
    init_tracing(cli.service.verbose);
    match &cli.command {
        Command::Ask { query } => {
            let router = cli.service.build_router()?;
            match router.handle(query) {
                Ok(reply) => println!("{}", reply.reply),
                Err(err) => bail!("{err}"),
            }
        }
        Command::Retrieve { page, query, json } => {
            let pipeline = cli.service.build_pipeline()?;
            let result = pipeline
                .retrieve(page, query, &cli.service.retrieval_settings())
                .with_context(|| format!("retrieval failed for page '{page}'"))?;
            if *json {
                let body = serde_json::to_string_pretty(&result)
                    .context("failed to encode retrieval result")?;
                println!("{body}");
            } else {
                println!("{}", result.render().trim_end());
            }
        }
        Command::Summary { query } => {
            let tool = cli.service.build_summary_tool()?;
            let config = cli.service.router_config().summary;
            let extract = tool
                .summarize(query, config.max_retries, config.timeout_ms)
                .context("summary lookup failed")?;
            println!("{extract}");
        }
    }
    Ok(())
}
