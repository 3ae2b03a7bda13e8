use crate::app_state::{AppState, USER_AGENT, WIKIDATA_API_URL};
use crate::case::Badge;
use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::{info, instrument};
use wikimisc::mediawiki::api::Api;

/// Appended to every edit summary, linking edits back to the bot task.
pub const EDIT_SUMMARY_APPENDIX: &str = " #msynbotTask10";

//________________________________________________________________________________________________________________________

/// A sitelink as currently stored on the item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemSitelink {
    pub title: String,
    pub badges: Vec<String>,
}

impl ItemSitelink {
    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.iter().any(|b| b == badge.qid())
    }
}

/// Outcome of looking up an item's sitelink for one wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// The item page does not exist (deleted since the replica snapshot).
    Missing,
    /// The item page itself is a redirect (merged items).
    ItemRedirect,
    /// The item exists but has no sitelink for the wiki.
    NoSitelink,
    Sitelink(ItemSitelink),
}

//________________________________________________________________________________________________________________________

/// Performs all writes against the Wikidata API.  With `simulate` on, edits
/// are logged but never sent.
#[derive(Debug)]
pub struct Editor {
    api: Api,
    simulate: bool,
}

impl Editor {
    pub async fn new_from_state(state: &AppState) -> Result<Self> {
        let mut api = Api::new(WIKIDATA_API_URL)
            .await
            .map_err(|e| anyhow!("Can't talk to the Wikidata API: {e}"))?;
        api.set_user_agent(USER_AGENT);
        api.set_maxlag(Some(5));
        api.set_edit_delay(Some(state.edit_delay_ms()));

        let simulate = state.simulate();
        if !simulate {
            let (user, password) = state
                .wikidata_credentials()
                .ok_or_else(|| anyhow!("Live run requested but no Wikidata credentials in config"))?;
            api.login(user, password)
                .await
                .map_err(|e| anyhow!("Wikidata login failed: {e}"))?;
        }

        Ok(Self { api, simulate })
    }

    pub const fn simulate(&self) -> bool {
        self.simulate
    }

    // ------------------------------------------------------------------
    // Item state lookup
    // ------------------------------------------------------------------

    pub async fn item_state(&self, qid: &str, dbname: &str) -> Result<ItemState> {
        let params = self.api.params_into(&[
            ("action", "wbgetentities"),
            ("ids", qid),
            ("props", "info|sitelinks"),
            ("sitefilter", dbname),
        ]);
        let result = self
            .api
            .get_query_api_json(&params)
            .await
            .map_err(|e| anyhow!("wbgetentities for {qid} failed: {e}"))?;
        item_state_from_entities(&result, qid, dbname)
    }

    // ------------------------------------------------------------------
    // Sitelink mutations
    // ------------------------------------------------------------------

    #[instrument(skip(self, sitelink), err)]
    pub async fn add_badge(
        &mut self,
        qid: &str,
        dbname: &str,
        sitelink: &ItemSitelink,
        badge: Badge,
        edit_summary: &str,
    ) -> Result<()> {
        let new_badges = badges_with(&sitelink.badges, badge).ok_or_else(|| {
            anyhow!(
                "Badge to add {} already set for {dbname} sitelink in {qid}",
                badge.qid()
            )
        })?;
        self.set_sitelink(qid, dbname, &sitelink.title, &new_badges, edit_summary)
            .await?;
        info!("Added badge {} to {dbname} sitelink in {qid}", badge.qid());
        Ok(())
    }

    #[instrument(skip(self, sitelink), err)]
    pub async fn remove_badge(
        &mut self,
        qid: &str,
        dbname: &str,
        sitelink: &ItemSitelink,
        badge: Badge,
        edit_summary: &str,
    ) -> Result<()> {
        let new_badges = badges_without(&sitelink.badges, badge).ok_or_else(|| {
            anyhow!(
                "Badge to remove {} not found on {dbname} sitelink in {qid}",
                badge.qid()
            )
        })?;
        self.set_sitelink(qid, dbname, &sitelink.title, &new_badges, edit_summary)
            .await?;
        info!(
            "Removed badge {} from {dbname} sitelink in {qid}",
            badge.qid()
        );
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn remove_sitelink(
        &mut self,
        qid: &str,
        dbname: &str,
        edit_summary: &str,
    ) -> Result<()> {
        // An empty linktitle removes the sitelink
        self.set_sitelink(qid, dbname, "", &[], edit_summary).await?;
        info!("Removed sitelink for {dbname} in {qid}");
        Ok(())
    }

    async fn set_sitelink(
        &mut self,
        qid: &str,
        dbname: &str,
        title: &str,
        badges: &[String],
        edit_summary: &str,
    ) -> Result<()> {
        let summary = format!("{edit_summary}{EDIT_SUMMARY_APPENDIX}");
        let badges_joined = badges.join("|");

        if self.simulate {
            info!("SIMULATE wbsetsitelink {qid} {dbname} '{title}' badges=[{badges_joined}] summary='{summary}'");
            return Ok(());
        }

        let token = self
            .api
            .get_edit_token()
            .await
            .map_err(|e| anyhow!("Cannot get edit token: {e}"))?;
        let params = self.api.params_into(&[
            ("action", "wbsetsitelink"),
            ("id", qid),
            ("linksite", dbname),
            ("linktitle", title),
            ("badges", &badges_joined),
            ("summary", &summary),
            ("bot", "1"),
            ("token", &token),
        ]);
        let result = self
            .api
            .post_query_api_json(&params)
            .await
            .map_err(|e| anyhow!("wbsetsitelink for {qid}/{dbname} failed: {e}"))?;
        if let Some(error) = result["error"]["info"].as_str() {
            return Err(anyhow!("wbsetsitelink for {qid}/{dbname} failed: {error}"));
        }
        Ok(())
    }
}

//________________________________________________________________________________________________________________________

/// `None` when the badge is already present.
pub(crate) fn badges_with(badges: &[String], badge: Badge) -> Option<Vec<String>> {
    if badges.iter().any(|b| b == badge.qid()) {
        return None;
    }
    let mut ret = badges.to_vec();
    ret.push(badge.qid().to_string());
    Some(ret)
}

/// `None` when the badge is not present.
pub(crate) fn badges_without(badges: &[String], badge: Badge) -> Option<Vec<String>> {
    let ret: Vec<String> = badges.iter().filter(|b| *b != badge.qid()).cloned().collect();
    if ret.len() == badges.len() {
        return None;
    }
    Some(ret)
}

/// Interprets a `wbgetentities` response.  Redirected items come back under
/// the target QID, so a mismatched entity id means the item page is a
/// redirect.
pub fn item_state_from_entities(result: &Value, qid: &str, dbname: &str) -> Result<ItemState> {
    let entities = result["entities"]
        .as_object()
        .ok_or_else(|| anyhow!("wbgetentities: no entities in response for {qid}"))?;
    let entity = entities
        .get(qid)
        .or_else(|| entities.values().next())
        .ok_or_else(|| anyhow!("wbgetentities: empty entity list for {qid}"))?;

    if entity.get("missing").is_some() {
        return Ok(ItemState::Missing);
    }
    if entity["id"].as_str() != Some(qid) {
        return Ok(ItemState::ItemRedirect);
    }

    let sitelink = &entity["sitelinks"][dbname];
    let title = match sitelink["title"].as_str() {
        Some(title) => title.to_string(),
        None => return Ok(ItemState::NoSitelink),
    };
    let badges = sitelink["badges"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|b| b.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Ok(ItemState::Sitelink(ItemSitelink { title, badges }))
}

//________________________________________________________________________________________________________________________

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{QID_I2R, QID_S2R};

    #[test]
    fn test_badges_with() {
        let current = vec![QID_I2R.to_string()];
        let new = badges_with(&current, Badge::SitelinkToRedirect).expect("badge add failed");
        assert_eq!(new, vec![QID_I2R.to_string(), QID_S2R.to_string()]);

        // Already present
        assert_eq!(badges_with(&new, Badge::SitelinkToRedirect), None);
    }

    #[test]
    fn test_badges_without() {
        let current = vec![QID_S2R.to_string(), QID_I2R.to_string()];
        let new = badges_without(&current, Badge::SitelinkToRedirect).expect("badge remove failed");
        assert_eq!(new, vec![QID_I2R.to_string()]);

        // Not present
        assert_eq!(badges_without(&new, Badge::SitelinkToRedirect), None);

        // Other badges are preserved untouched
        let mixed = vec!["Q17437796".to_string(), QID_S2R.to_string()];
        let cleaned = badges_without(&mixed, Badge::SitelinkToRedirect).expect("remove failed");
        assert_eq!(cleaned, vec!["Q17437796".to_string()]);
    }

    #[test]
    fn test_item_state_sitelink() {
        let result = json!({
            "entities": { "Q42": {
                "type": "item",
                "id": "Q42",
                "sitelinks": { "enwiki": {
                    "site": "enwiki",
                    "title": "Some redirect",
                    "badges": [QID_S2R]
                } }
            } }
        });
        let state = item_state_from_entities(&result, "Q42", "enwiki").expect("parse failed");
        match state {
            ItemState::Sitelink(sitelink) => {
                assert_eq!(sitelink.title, "Some redirect");
                assert!(sitelink.has_badge(Badge::SitelinkToRedirect));
                assert!(!sitelink.has_badge(Badge::IntentionalSitelinkToRedirect));
            }
            other => panic!("Expected sitelink, got {other:?}"),
        }
    }

    #[test]
    fn test_item_state_missing() {
        let result = json!({
            "entities": { "Q42": { "id": "Q42", "missing": "" } }
        });
        assert_eq!(
            item_state_from_entities(&result, "Q42", "enwiki").expect("parse failed"),
            ItemState::Missing
        );
    }

    #[test]
    fn test_item_state_item_redirect() {
        // Redirected items are resolved and keyed by their target QID
        let result = json!({
            "entities": { "Q100": {
                "type": "item",
                "id": "Q100",
                "sitelinks": {}
            } }
        });
        assert_eq!(
            item_state_from_entities(&result, "Q42", "enwiki").expect("parse failed"),
            ItemState::ItemRedirect
        );
    }

    #[test]
    fn test_item_state_no_sitelink() {
        let result = json!({
            "entities": { "Q42": {
                "type": "item",
                "id": "Q42",
                "sitelinks": {}
            } }
        });
        assert_eq!(
            item_state_from_entities(&result, "Q42", "enwiki").expect("parse failed"),
            ItemState::NoSitelink
        );
    }

    #[test]
    fn test_item_state_no_entities_is_error() {
        let result = json!({ "error": { "code": "no-such-entity" } });
        assert!(item_state_from_entities(&result, "Q42", "enwiki").is_err());
    }
}
