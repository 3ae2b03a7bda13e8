use redirect_badges_rs::app_state::AppState;
use redirect_badges_rs::command_line::{get_bot_config, wiki_filter_from_args};
use redirect_badges_rs::processor::run_badge_bot;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let bot_config = get_bot_config();
    let app_state = Arc::new(AppState::new_from_config(&bot_config).await?);

    let wiki_filter = wiki_filter_from_args(std::env::args());
    run_badge_bot(app_state, &wiki_filter).await?;
    Ok(())
}
