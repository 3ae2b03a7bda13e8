use crate::database_manager::DatabaseManager;
use anyhow::{anyhow, Result};
use mysql_async as my;
use serde_json::Value;
use wikimisc::mediawiki::api::Api;
use wikimisc::site_matrix::SiteMatrix;

pub const WIKIDATA_API_URL: &str = "https://www.wikidata.org/w/api.php";

/// Per Wikimedia User-Agent policy: identify the tool and its version.
pub const USER_AGENT: &str = concat!(
    "redirect_badges_rs/",
    env!("CARGO_PKG_VERSION"),
    " (Wikidata sitelink-to-redirect badge maintenance bot)"
);

// ---------------------------------------------------------------------------
// AppState – top-level application state; delegates DB work to DatabaseManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AppState {
    db_manager: DatabaseManager,
    site_matrix: SiteMatrix,
    config: Value,
}

impl AppState {
    pub async fn new_from_config(config: &Value) -> Result<Self> {
        let wikidata_api = Api::new(WIKIDATA_API_URL)
            .await
            .map_err(|e| anyhow!("Can't talk to the Wikidata API: {e}"))?;

        let db_manager = DatabaseManager::new_from_config(config);

        Ok(Self {
            db_manager,
            site_matrix: SiteMatrix::new(&wikidata_api)
                .await
                .map_err(|e| anyhow!("Can't get site matrix: {e}"))?,
            config: config.to_owned(),
        })
    }

    // ------------------------------------------------------------------
    // Config accessors – run mode
    // ------------------------------------------------------------------

    /// Simulation is the default; live edits have to be enabled explicitly.
    pub fn simulate(&self) -> bool {
        self.config["simulate"].as_bool().unwrap_or(true)
    }

    /// Bot credentials for the Wikidata API (a bot-password pair).  Absent
    /// credentials force simulation mode.
    pub fn wikidata_credentials(&self) -> Option<(String, String)> {
        let user = self.config["wikidata_user"].as_str()?.to_string();
        let password = self.config["wikidata_password"].as_str()?.to_string();
        Some((user, password))
    }

    /// Milliseconds to wait between consecutive Wikidata edits.
    pub fn edit_delay_ms(&self) -> u64 {
        self.config["edit_delay_ms"].as_u64().unwrap_or(1000)
    }

    pub fn output_dir(&self) -> String {
        self.config["output_dir"]
            .as_str()
            .unwrap_or("output")
            .to_string()
    }

    // ------------------------------------------------------------------
    // Config accessors – per-category processing flags (all default off)
    // ------------------------------------------------------------------

    pub fn process_missing_s2r_badge(&self) -> bool {
        self.config["process_missing_s2r_badge"]
            .as_bool()
            .unwrap_or(false)
    }

    pub fn process_both_badge_situations(&self) -> bool {
        self.config["process_both_badge_situations"]
            .as_bool()
            .unwrap_or(false)
    }

    pub fn process_non_redirects(&self) -> bool {
        self.config["process_non_redirects"].as_bool().unwrap_or(false)
    }

    pub fn process_inexistent_targets(&self) -> bool {
        self.config["process_inexistent_targets"]
            .as_bool()
            .unwrap_or(false)
    }

    pub fn process_unconnected_targets(&self) -> bool {
        self.config["process_unconnected_targets"]
            .as_bool()
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Delegating accessors – database connections
    // ------------------------------------------------------------------

    pub async fn get_wiki_db_connection(&self, wiki: &str) -> Result<my::Conn> {
        self.db_manager.get_wiki_db_connection(wiki).await
    }

    pub async fn get_meta_db_connection(&self) -> Result<my::Conn> {
        self.db_manager.get_meta_db_connection().await
    }

    // ------------------------------------------------------------------
    // Per-wiki API resolution
    // ------------------------------------------------------------------

    pub async fn get_api_for_wiki(&self, wiki: String) -> Result<Api> {
        Ok(self.site_matrix.get_api_for_wiki(&wiki).await?)
    }

    pub const fn site_matrix(&self) -> &SiteMatrix {
        &self.site_matrix
    }

    /// Expose the underlying [`DatabaseManager`] for callers that need direct access.
    pub const fn db_manager(&self) -> &DatabaseManager {
        &self.db_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build an [`AppState`] seeded with the given config, without
    /// touching the network.
    fn state_with_config(config: Value) -> AppState {
        AppState {
            db_manager: DatabaseManager::new_from_config(&config),
            config,
            ..Default::default()
        }
    }

    #[test]
    fn test_simulate_defaults_on() {
        let state = state_with_config(json!({}));
        assert!(state.simulate());

        let state_off = state_with_config(json!({ "simulate": false }));
        assert!(!state_off.simulate());
    }

    #[test]
    fn test_processing_flags_default_off() {
        let state = state_with_config(json!({}));
        assert!(!state.process_missing_s2r_badge());
        assert!(!state.process_both_badge_situations());
        assert!(!state.process_non_redirects());
        assert!(!state.process_inexistent_targets());
        assert!(!state.process_unconnected_targets());
    }

    #[test]
    fn test_processing_flags_from_config() {
        let state = state_with_config(json!({
            "process_missing_s2r_badge": true,
            "process_inexistent_targets": true,
        }));
        assert!(state.process_missing_s2r_badge());
        assert!(state.process_inexistent_targets());
        assert!(!state.process_non_redirects());
    }

    #[test]
    fn test_wikidata_credentials() {
        let state = state_with_config(json!({}));
        assert_eq!(state.wikidata_credentials(), None);

        let state_with_creds = state_with_config(json!({
            "wikidata_user": "ExampleBot@task10",
            "wikidata_password": "hunter2",
        }));
        assert_eq!(
            state_with_creds.wikidata_credentials(),
            Some(("ExampleBot@task10".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn test_edit_delay_default() {
        let state = state_with_config(json!({}));
        assert_eq!(state.edit_delay_ms(), 1000);
        let state2 = state_with_config(json!({ "edit_delay_ms": 250 }));
        assert_eq!(state2.edit_delay_ms(), 250);
    }

    #[test]
    fn test_output_dir() {
        let state = state_with_config(json!({}));
        assert_eq!(state.output_dir(), "output");
        let state2 = state_with_config(json!({ "output_dir": "/data/project/out" }));
        assert_eq!(state2.output_dir(), "/data/project/out");
    }
}
