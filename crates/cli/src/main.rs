//! scrapewright CLI entry point.
//!
//! Interactive loop: fetch a page, ask the model for a BeautifulSoup script
//! that extracts what the user wants, optionally save it. Logging goes to
//! stderr so prompts and the generated script on stdout stay readable.

use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use tracing_subscriber::EnvFilter;

use scrapewright_client::{
    ContentAcquirer, ConversationOrchestrator, FAILURE_MESSAGE, GeminiClient, TIMEOUT_MESSAGE,
};
use scrapewright_core::{AppConfig, HistoryStore, KvDb, SessionId};

mod script;

struct App {
    theme: ColorfulTheme,
    acquirer: ContentAcquirer,
    orchestrator: ConversationOrchestrator,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load()?;
    let model = Arc::new(GeminiClient::from_config(&config)?);

    let db = KvDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    match db.purge_expired().await {
        Ok(0) => {}
        Ok(n) => tracing::debug!("purged {n} expired history entries"),
        Err(e) => tracing::warn!("could not purge expired history: {e}"),
    }

    let history = HistoryStore::from_config(Arc::new(db), &config);
    let app = App {
        theme: ColorfulTheme::default(),
        acquirer: ContentAcquirer::from_config(&config)?,
        orchestrator: ConversationOrchestrator::from_config(model, history, &config),
    };

    tracing::info!("using model {}", config.model);

    loop {
        app.run_task().await?;

        let again = Confirm::with_theme(&app.theme)
            .with_prompt("Scrape another URL?")
            .default(false)
            .interact()?;
        if !again {
            break;
        }
    }

    Ok(())
}

impl App {
    /// One URL, one session.
    async fn run_task(&self) -> Result<()> {
        let url: String = Input::with_theme(&self.theme)
            .with_prompt("URL to scrape")
            .validate_with(|input: &String| -> Result<(), String> {
                url::Url::parse(input.trim()).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()?;
        let url = url.trim().to_string();

        let needs_js = Confirm::with_theme(&self.theme)
            .with_prompt("Does this page need JavaScript rendering?")
            .default(false)
            .interact()?;

        let request: String = Input::with_theme(&self.theme)
            .with_prompt("What data should the script extract?")
            .interact_text()?;

        let session = SessionId::new();
        tracing::debug!(%session, "starting task for {url}");

        let fetched =
            if needs_js { self.acquirer.acquire_rendered(&url).await } else { self.acquirer.acquire(&url).await };

        let Some(content) = fetched.content else {
            eprintln!("Could not fetch {url}. Check the URL or try again with JavaScript rendering.");
            return Ok(());
        };

        let reply = self
            .orchestrator
            .process(&session, &url, &content, fetched.rendered_by_browser, &request)
            .await;

        println!("\n{reply}\n");

        if reply == TIMEOUT_MESSAGE || reply == FAILURE_MESSAGE {
            return Ok(());
        }

        let save = Confirm::with_theme(&self.theme)
            .with_prompt("Save the script to a file?")
            .default(true)
            .interact()?;
        if save {
            let path: String = Input::with_theme(&self.theme)
                .with_prompt("File name")
                .default(script::DEFAULT_FILE_NAME.to_string())
                .interact_text()?;
            script::save(&path, &reply)?;
            println!("Saved to {path}");
        }

        Ok(())
    }
}
