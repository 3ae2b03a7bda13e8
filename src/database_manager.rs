use anyhow::{anyhow, Result};
use mysql_async as my;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{instrument, trace};

/// The meta database carries the project list (`meta_p.wiki`); its replica
/// host follows the same naming pattern as the per-wiki hosts.
pub const META_DATABASE: &str = "meta";

// ---------------------------------------------------------------------------
// Credential source – toolforge (replica.my.cnf) or config.json fallback
// ---------------------------------------------------------------------------

/// A resolved user/password pair, obtained from either `~/replica.my.cnf`
/// (via the `toolforge` crate) or the legacy `config.json` fields.
#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    password: String,
}

// ---------------------------------------------------------------------------
// DatabaseManager – owns all replica-related state and logic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DatabaseManager {
    /// Full application config (used for the local-dev fallback credentials
    /// and port-mapping).
    config: Value,
    /// Port overrides for local SSH-tunnel testing.  Only populated when the
    /// config contains a `port_mapping` object.
    port_mapping: HashMap<String, u16>,
}

impl DatabaseManager {
    /// Initialise from the application config JSON value.
    ///
    /// On Toolforge, database credentials are supplied by `~/replica.my.cnf`
    /// (read on-demand by the `toolforge` crate).  When that file is absent
    /// (local development), the legacy `config["user"]` / `config["password"]`
    /// fields and `config["port_mapping"]` are used as a fallback so that
    /// existing SSH-tunnel workflows continue to work unchanged.
    pub fn new_from_config(config: &Value) -> Self {
        let port_mapping = config["port_mapping"]
            .as_object()
            .map(|x| x.to_owned())
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.as_i64().unwrap_or_default() as u16))
            .collect();

        Self {
            config: config.to_owned(),
            port_mapping,
        }
    }

    // ------------------------------------------------------------------
    // Test / minimal constructor
    // ------------------------------------------------------------------

    /// Create a [`DatabaseManager`] seeded with only a config value.
    /// Intended for unit tests that exercise config-derived logic without
    /// needing a real database connection.
    #[cfg(test)]
    pub(crate) fn with_config(config: Value) -> Self {
        Self {
            config,
            port_mapping: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Credential resolution
    // ------------------------------------------------------------------

    /// Resolve database credentials.
    ///
    /// Tries `~/replica.my.cnf` first (standard Toolforge setup).  When that
    /// file is absent – e.g. during local development – falls back to the
    /// `user` / `password` fields in the JSON config.
    fn credentials(&self) -> Result<Credentials> {
        // Attempt toolforge / replica.my.cnf first.
        if let Ok(info) = toolforge::connection_info!("enwiki") {
            return Ok(Credentials {
                user: info.user,
                password: info.password,
            });
        }

        // Fall back to config.json (local dev).
        let user = self.config["user"]
            .as_str()
            .ok_or_else(|| {
                anyhow!(
                    "No ~/replica.my.cnf found and no 'user' key in config – \
                     cannot resolve database credentials"
                )
            })?
            .to_string();
        let password = self.config["password"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Credentials { user, password })
    }

    // ------------------------------------------------------------------
    // Server / schema name resolution (credential-free helpers)
    // ------------------------------------------------------------------

    pub fn fix_wiki_name(&self, wiki: &str) -> String {
        match wiki {
            "be-taraskwiki" | "be-x-oldwiki" | "be_taraskwiki" | "be_x_oldwiki" => "be_x_oldwiki",
            other => other,
        }
        .to_string()
        .replace('-', "_")
    }

    /// Returns the canonical Toolforge host and `_p`-suffixed database name
    /// for a wiki replica, as a `(host, schema)` tuple.
    ///
    /// The bot runs against the analytics cluster; the host follows the
    /// standard Toolforge pattern `{wiki}.analytics.db.svc.wikimedia.cloud`.
    ///
    /// This method is credential-free; use [`Self::get_wiki_db_connection`]
    /// when you need an actual connection.
    pub fn db_host_and_schema_for_wiki(&self, wiki: &str) -> (String, String) {
        let wiki = self.fix_wiki_name(wiki);
        let host = format!("{wiki}.analytics.db.svc.wikimedia.cloud");
        let schema = format!("{wiki}_p");
        (host, schema)
    }

    // ------------------------------------------------------------------
    // Connection helpers
    // ------------------------------------------------------------------

    /// Build [`my::Opts`] for a wiki-replica connection.
    ///
    /// On Toolforge, credentials come from `~/replica.my.cnf` (via the
    /// `toolforge` crate).  Locally they fall back to `config["user"]` /
    /// `config["password"]`, and the port is taken from `port_mapping` (for
    /// SSH-tunnel setups) or `config["db_port"]`.
    fn get_mysql_opts_for_wiki(&self, wiki: &str) -> Result<my::Opts> {
        let creds = self.credentials()?;

        let (host, schema) = self.db_host_and_schema_for_wiki(wiki);

        // Port: prefer an explicit port_mapping entry (local SSH tunnels),
        // then fall back to config["db_port"], then the default 3306.
        let port: u16 = self
            .port_mapping
            .get(wiki)
            .copied()
            .unwrap_or_else(|| self.config["db_port"].as_u64().unwrap_or(3306) as u16);

        // When running locally (host = 127.0.0.1 in config), always bind to
        // 127.0.0.1 regardless of what db_host_and_schema_for_wiki computed.
        let effective_host = if self.config["host"].as_str() == Some("127.0.0.1") {
            "127.0.0.1".to_string()
        } else {
            host
        };

        Ok(my::OptsBuilder::default()
            .ip_or_hostname(effective_host)
            .db_name(Some(schema))
            .user(Some(creds.user))
            .pass(Some(creds.password))
            .tcp_port(port)
            .into())
    }

    #[instrument(skip(self), err)]
    pub async fn get_wiki_db_connection(&self, wiki: &str) -> Result<my::Conn> {
        let opts = self.get_mysql_opts_for_wiki(wiki)?;

        trace!(user = opts.user());
        let conn;
        loop {
            match my::Conn::new(opts.to_owned())
                .await
                .map_err(|e| format!("{e:?}"))
            {
                Ok(conn2) => {
                    conn = conn2;
                    break;
                }
                Err(s) => {
                    // Retry when the per-user connection limit is momentarily exceeded.
                    if s.contains("max_user_connections") {
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                        continue;
                    }
                    return Err(anyhow!(s));
                }
            }
        }
        Ok(conn)
    }

    /// Connects to the meta database holding the project list.
    pub async fn get_meta_db_connection(&self) -> Result<my::Conn> {
        self.get_wiki_db_connection(META_DATABASE).await
    }
}
