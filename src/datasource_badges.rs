use crate::app_state::{USER_AGENT, WIKIDATA_API_URL};
use crate::case::{is_valid_qid, Badge, BadgeRow, QID_I2R, QID_S2R};
use crate::site_list::Project;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time;
use wikimisc::mediawiki::api::Api;

/// All sitelinks of a project that currently carry one of the two redirect
/// badges, from the Wikidata Query Service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceBadges {}

impl SourceBadges {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn run(&self, project: &Project) -> Result<Vec<BadgeRow>> {
        let sparql = Self::sparql_for_project(project);

        let timeout = time::Duration::from_secs(120);
        let builder = reqwest::ClientBuilder::new().timeout(timeout);
        let api = Api::new_from_builder(WIKIDATA_API_URL, builder)
            .await
            .map_err(|e| anyhow!("Can't talk to the Wikidata API: {e}"))?;
        let sparql_url = api.get_site_info_string("general", "wikibase-sparql")?;
        let mut params: HashMap<String, String> = HashMap::new();
        params.insert("query".to_string(), sparql);
        params.insert("format".to_string(), "json".to_string());

        let response = api
            .client()
            .post(sparql_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&params)
            .send()
            .await?;
        let response = response.text().await?;
        let json: Value = serde_json::from_str(&response)
            .map_err(|e| anyhow!("Invalid SPARQL response for {}: {e}", project.dbname))?;

        Self::rows_from_bindings(&json)
    }

    fn sparql_for_project(project: &Project) -> String {
        format!(
            "SELECT ?item ?sitelink ?name ?badge WHERE {{\n  VALUES ?badge {{ wd:{QID_S2R} wd:{QID_I2R} }}\n  ?sitelink schema:about ?item; schema:isPartOf <{}>; schema:name ?name; wikibase:badge ?badge .\n}}",
            project.schema_is_part_of()
        )
    }

    /// Entity URIs come back as `http://www.wikidata.org/entity/Q42`.
    fn entity_qid(uri: &str) -> Option<String> {
        let qid = uri.rsplit('/').next()?;
        if is_valid_qid(qid) {
            Some(qid.to_string())
        } else {
            None
        }
    }

    fn rows_from_bindings(json: &Value) -> Result<Vec<BadgeRow>> {
        let bindings = json["results"]["bindings"]
            .as_array()
            .ok_or_else(|| anyhow!("No bindings in SPARQL result"))?;

        let mut ret: Vec<BadgeRow> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let item_uri = match binding["item"]["value"].as_str() {
                Some(uri) => uri,
                None => continue,
            };
            let qid = match Self::entity_qid(item_uri) {
                Some(qid) => qid,
                None => continue,
            };
            let badge = match binding["badge"]["value"]
                .as_str()
                .and_then(Self::entity_qid)
                .as_deref()
                .and_then(Badge::new_from_qid)
            {
                Some(badge) => badge,
                None => continue, // not one of the two redirect badges
            };
            let sitelink_url = binding["sitelink"]["value"].as_str().unwrap_or_default();
            let page_name = binding["name"]["value"].as_str().unwrap_or_default();
            ret.push(BadgeRow {
                qid,
                sitelink_url: sitelink_url.to_string(),
                page_name: page_name.to_string(),
                badge,
            });
        }
        Ok(ret)
    }
}
