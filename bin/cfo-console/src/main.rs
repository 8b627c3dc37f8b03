// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use counsel::{CsvAgent, GenAiClient, KnowledgeAdvisor, LlmClient};
use state::{AppConfig, AppState, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tally::{
    ChartEmitter, ChartRenderer, Dispatcher, DocumentAdvisor, SpecRenderer, StatsEngine,
    TabularAgent,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "cfo-console",
    about = "Conversational analytics console over uploaded CSV datasets"
)]
struct Cli {
    /// Delete and rebuild the advisor similarity index before serving.
    #[arg(long)]
    rebuild_index: bool,
    /// Address to bind the HTTP server on.
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.static_dir)?;

    let genai = GenAiClient::from_env();
    if !genai.is_configured() {
        warn!("GENAI_API_KEY is not set; model-backed collaborators will degrade");
    }
    let llm: Arc<dyn LlmClient> = Arc::new(genai);

    let advisor: Arc<dyn DocumentAdvisor> = Arc::new(KnowledgeAdvisor::initialise(
        llm.clone(),
        &config.knowledge_dir,
        &config.index_path,
        cli.rebuild_index,
    ));
    let agent: Arc<dyn TabularAgent> = Arc::new(CsvAgent::new(llm));
    let renderer: Arc<dyn ChartRenderer> =
        Arc::new(SpecRenderer::new(ChartEmitter::new(&config.static_dir)));
    let stats = StatsEngine::new(ChartEmitter::new(&config.static_dir));
    let dispatcher = Arc::new(Dispatcher::new(stats, renderer, agent, Some(advisor)));

    let app_state = AppState {
        dispatcher,
        sessions: Arc::new(SessionStore::default()),
        config: Arc::new(config),
    };
    let app = routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, "cfo-console listening");
    axum::serve(listener, app).await?;
    Ok(())
}
