use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use newsdesk::ai::build_provider;
use newsdesk::config::Config;
use newsdesk::db::{Repository, Store};
use newsdesk::feed::FeedDiscovery;
use newsdesk::models::{NewPromptRule, NewSource, RuleKind, SelectorSet, Strategy};
use newsdesk::services::{
    AutoFlow, ContentFetcher, CredentialVault, OAuthService, Publisher, Runner, SuggestionService,
    XSettings,
};

#[derive(Debug, Parser)]
#[command(name = "newsdesk", version, about = "Scrape news, draft posts with AI, publish to X")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape every active source once
    RunAll,
    /// Scrape one source
    RunSite { source_id: i64 },
    /// Show what a source would yield without storing anything
    Preview {
        source_id: i64,
        #[arg(long, default_value_t = 10)]
        max: usize,
    },
    /// Find the feed URL of a site
    Discover { url: String },
    /// Analyze an account's new articles and create drafts
    Analyze {
        account_id: i64,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Create a draft for one article without analysis
    Suggest { article_id: i64 },
    /// Author and approve a pending draft
    Approve {
        draft_id: i64,
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// Reject a pending draft
    Reject {
        draft_id: i64,
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// Publish an approved draft
    Publish { draft_id: i64 },
    /// Print the X authorization URL for a user
    Connect { user_id: String },
    /// Finish the X authorization with the code and state from the redirect
    Callback { code: String, state: String },
    /// Revoke and remove a connected account
    Disconnect { account_id: i64 },
    /// Register a news source for an account
    AddSource {
        account_id: i64,
        name: String,
        url: String,
        #[arg(long, default_value = "auto", value_parser = parse_strategy)]
        strategy: Strategy,
        #[arg(long)]
        feed_url: Option<String>,
        #[arg(long)]
        auto_publish: bool,
        /// CSS selectors for the HTML strategy: article,title,summary,link
        #[arg(long, value_delimiter = ',', num_args = 4)]
        selectors: Option<Vec<String>>,
    },
    /// Add a custom prompt rule for an account
    AddRule {
        account_id: i64,
        #[arg(value_enum)]
        kind: RuleKindArg,
        name: String,
        prompt_text: String,
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// Scrape every active source on a fixed interval
    Schedule,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuleKindArg {
    Analysis,
    Publication,
}

impl From<RuleKindArg> for RuleKind {
    fn from(kind: RuleKindArg) -> Self {
        match kind {
            RuleKindArg::Analysis => RuleKind::Analysis,
            RuleKindArg::Publication => RuleKind::Publication,
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    Strategy::parse(s).ok_or_else(|| format!("unknown strategy '{s}' (feed, html, auto)"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Everything the commands need, wired once from config.
struct App {
    config: Config,
    repo: Arc<Repository>,
}

impl App {
    async fn new(config: Config) -> anyhow::Result<Self> {
        let repo = Repository::new(&config.db_path)
            .await
            .with_context(|| format!("opening database {}", config.db_path))?;
        Ok(Self {
            config,
            repo: Arc::new(repo),
        })
    }

    fn store(&self) -> Arc<dyn Store> {
        self.repo.clone()
    }

    fn vault(&self) -> anyhow::Result<CredentialVault> {
        CredentialVault::from_hex(&self.config.encryption_key).context("invalid encryption_key")
    }

    fn settings(&self) -> XSettings {
        XSettings::from_config(&self.config)
    }

    fn runner(&self) -> Runner {
        Runner::new(self.store(), self.config.feed_max_items)
    }

    fn publisher(&self) -> anyhow::Result<Publisher> {
        Ok(Publisher::new(self.store(), self.vault()?, self.settings()))
    }

    fn oauth(&self) -> anyhow::Result<OAuthService> {
        Ok(OAuthService::new(self.store(), self.vault()?, self.settings()))
    }

    fn suggestions(&self) -> anyhow::Result<SuggestionService> {
        self.config.validate()?;
        let provider = build_provider(&self.config)?;
        let auto_flow = AutoFlow::new(
            self.store(),
            provider.clone(),
            Arc::new(ContentFetcher::new()),
            self.publisher()?,
        );
        Ok(SuggestionService::new(self.store(), provider, auto_flow))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load()?,
    };

    let app = App::new(config).await?;

    match cli.command {
        Command::RunAll => print_json(&app.runner().run_all().await)?,
        Command::RunSite { source_id } => print_json(&app.runner().run_site(source_id).await)?,
        Command::Preview { source_id, max } => print_json(&app.runner().preview_site(source_id, max).await?)?,
        Command::Discover { url } => match FeedDiscovery::new().discover(&url).await {
            Some(feed_url) => println!("{feed_url}"),
            None => anyhow::bail!("no feed found for {url}"),
        },
        Command::Analyze { account_id, batch_size } => {
            let batch_size = batch_size.unwrap_or(app.config.batch_size);
            let report = app.suggestions()?.process_new_articles(account_id, batch_size).await?;
            print_json(&report)?;
        }
        Command::Suggest { article_id } => {
            print_json(&app.suggestions()?.suggest_for_article(article_id).await?)?;
        }
        Command::Approve { draft_id, reviewer } => {
            let draft = app.suggestions()?.approve_draft(draft_id, reviewer.as_deref()).await?;
            print_json(&draft)?;
        }
        Command::Reject { draft_id, reviewer } => {
            let draft = app.suggestions()?.reject_draft(draft_id, reviewer.as_deref()).await?;
            print_json(&draft)?;
        }
        Command::Publish { draft_id } => print_json(&app.publisher()?.publish_draft(draft_id).await?)?,
        Command::Connect { user_id } => {
            let request = app.oauth()?.authorization_url(&user_id).await?;
            println!("{}", request.url);
        }
        Command::Callback { code, state } => {
            let connected = app.oauth()?.handle_callback(&code, &state).await?;
            println!("Connected @{} as account {}", connected.username, connected.account_id);
        }
        Command::Disconnect { account_id } => {
            app.oauth()?.disconnect(account_id).await?;
            println!("Disconnected account {account_id}");
        }
        Command::AddSource {
            account_id,
            name,
            url,
            strategy,
            feed_url,
            auto_publish,
            selectors,
        } => {
            let mut source = NewSource::new(account_id, name, url, strategy);
            source.feed_url = feed_url;
            source.auto_publish = auto_publish;
            source.scrape_interval_hours = app.config.scrape_every_hours as u32;
            source.selectors = match selectors.as_deref() {
                Some([article, title, summary, link]) => Some(SelectorSet {
                    article: article.clone(),
                    title: title.clone(),
                    summary: summary.clone(),
                    link: link.clone(),
                }),
                Some(_) => anyhow::bail!("--selectors takes exactly four values"),
                None => None,
            };
            if strategy == Strategy::Html && source.selectors.is_none() {
                anyhow::bail!("the html strategy needs --selectors");
            }
            let id = app.repo.insert_source(source).await?;
            println!("Added source {id}");
        }
        Command::AddRule {
            account_id,
            kind,
            name,
            prompt_text,
            priority,
        } => {
            let id = app
                .repo
                .insert_prompt_rule(NewPromptRule {
                    account_id,
                    kind: kind.into(),
                    name,
                    prompt_text,
                    priority,
                })
                .await?;
            println!("Added rule {id}");
        }
        Command::Schedule => {
            let hours = app.config.scrape_every_hours.max(1);
            tracing::info!(every_hours = hours, "Scheduler started");
            let mut ticker = tokio::time::interval(Duration::from_secs(hours * 3600));
            let runner = app.runner();
            loop {
                ticker.tick().await;
                runner.run_all().await;
            }
        }
    }

    Ok(())
}
