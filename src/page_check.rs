use anyhow::{anyhow, Result};
use serde_json::Value;
use wikimisc::mediawiki::api::Api;

//________________________________________________________________________________________________________________________

/// Current state of a page on a client wiki, as reported by its API.  The
/// replica lags behind the live site, so every mutation re-checks reality
/// through here first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageFacts {
    pub exists: bool,
    pub is_redirect: bool,
    pub length: u64,
    /// The QID of the item the page is connected to, if any.
    pub wikibase_item: Option<String>,
}

pub async fn page_facts(api: &Api, title: &str) -> Result<PageFacts> {
    let params = api.params_into(&[
        ("action", "query"),
        ("prop", "info|pageprops"),
        ("ppprop", "wikibase_item"),
        ("titles", title),
    ]);
    let result = api
        .get_query_api_json(&params)
        .await
        .map_err(|e| anyhow!("page_facts: API query for '{title}' failed: {e}"))?;
    facts_from_query_result(&result, title)
}

pub fn facts_from_query_result(result: &Value, title: &str) -> Result<PageFacts> {
    let pages = result["query"]["pages"]
        .as_object()
        .ok_or_else(|| anyhow!("page_facts: no pages in API response for '{title}'"))?;
    let page = pages
        .values()
        .next()
        .ok_or_else(|| anyhow!("page_facts: empty page list in API response for '{title}'"))?;

    Ok(PageFacts {
        exists: page.get("missing").is_none() && page.get("invalid").is_none(),
        is_redirect: page.get("redirect").is_some(),
        length: page["length"].as_u64().unwrap_or(0),
        wikibase_item: page["pageprops"]["wikibase_item"]
            .as_str()
            .map(str::to_string),
    })
}

//________________________________________________________________________________________________________________________

/// Resolves the redirect target of `title`, one hop.  `Ok(None)` means the
/// page is not a redirect (or its target cannot be determined); an error
/// means a circular redirect.
pub async fn redirect_target(api: &Api, title: &str) -> Result<Option<String>> {
    let params = api.params_into(&[("action", "query"), ("titles", title), ("redirects", "1")]);
    let result = api
        .get_query_api_json(&params)
        .await
        .map_err(|e| anyhow!("redirect_target: API query for '{title}' failed: {e}"))?;
    target_from_query_result(&result, title)
}

pub fn target_from_query_result(result: &Value, title: &str) -> Result<Option<String>> {
    let redirects = match result["query"]["redirects"].as_array() {
        Some(redirects) => redirects,
        None => return Ok(None),
    };

    // The API may normalise the queried title; fall back to the first hop.
    let entry = redirects
        .iter()
        .find(|r| r["from"].as_str() == Some(title))
        .or_else(|| redirects.first());
    let target = match entry.and_then(|e| e["to"].as_str()) {
        Some(target) => target,
        None => return Ok(None),
    };

    if target == title {
        return Err(anyhow!("Circular redirect detected for '{title}'"));
    }
    Ok(Some(target.to_string()))
}

//________________________________________________________________________________________________________________________
