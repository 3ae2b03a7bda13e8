use crate::app_state::AppState;
use anyhow::{anyhow, Result};
use mysql_async::from_row;
use mysql_async::prelude::Queryable;
use tracing::warn;
use url::Url;

//________________________________________________________________________________________________________________________

/// One Wikimedia project connected to Wikidata, as listed in `meta_p.wiki`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub dbname: String,
    pub url: String,
}

impl Project {
    pub fn new(dbname: &str, url: &str) -> Self {
        Self {
            dbname: dbname.to_string(),
            url: url.to_string(),
        }
    }

    /// The `schema:isPartOf` object used by WDQS: the server URL with exactly
    /// one trailing slash.
    pub fn schema_is_part_of(&self) -> String {
        format!("{}/", self.url.trim_end_matches('/'))
    }
}

//________________________________________________________________________________________________________________________

/// All open projects that have Wikidata support, optionally restricted to the
/// dbnames given on the command line.
pub async fn fetch_projects(state: &AppState, wiki_filter: &[String]) -> Result<Vec<Project>> {
    let sql = "SELECT dbname,url FROM wiki WHERE is_closed=0 AND has_wikidata=1";
    let mut conn = state.get_wiki_db_connection("meta").await?;
    let rows = conn
        .exec_iter(sql, ())
        .await
        .map_err(|e| anyhow!("fetch_projects query failed: {e}"))?
        .map_and_drop(from_row::<(Vec<u8>, Option<Vec<u8>>)>)
        .await
        .map_err(|e| anyhow!("fetch_projects row conversion failed: {e}"))?;
    conn.disconnect().await?;

    let projects = rows
        .iter()
        .filter_map(|(dbname, url)| {
            let dbname = String::from_utf8_lossy(dbname).into_owned();
            let url = String::from_utf8_lossy(url.as_deref()?).into_owned();
            if Url::parse(&url).is_err() {
                warn!("Skipping {dbname}: invalid server URL '{url}'");
                return None;
            }
            Some(Project { dbname, url })
        })
        .collect();

    Ok(apply_wiki_filter(projects, wiki_filter))
}

pub fn apply_wiki_filter(projects: Vec<Project>, wiki_filter: &[String]) -> Vec<Project> {
    if wiki_filter.is_empty() {
        return projects;
    }
    projects
        .into_iter()
        .filter(|p| wiki_filter.iter().any(|w| *w == p.dbname))
        .collect()
}

//________________________________________________________________________________________________________________________

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_part_of() {
        let p = Project::new("enwiki", "https://en.wikipedia.org");
        assert_eq!(p.schema_is_part_of(), "https://en.wikipedia.org/");
        let p2 = Project::new("dewiki", "https://de.wikipedia.org/");
        assert_eq!(p2.schema_is_part_of(), "https://de.wikipedia.org/");
    }

    #[test]
    fn test_apply_wiki_filter_empty_keeps_all() {
        let projects = vec![
            Project::new("enwiki", "https://en.wikipedia.org"),
            Project::new("dewiki", "https://de.wikipedia.org"),
        ];
        assert_eq!(apply_wiki_filter(projects.clone(), &[]), projects);
    }

    #[test]
    fn test_apply_wiki_filter_restricts() {
        let projects = vec![
            Project::new("enwiki", "https://en.wikipedia.org"),
            Project::new("dewiki", "https://de.wikipedia.org"),
            Project::new("frwiktionary", "https://fr.wiktionary.org"),
        ];
        let filter = vec!["dewiki".to_string(), "frwiktionary".to_string()];
        let filtered = apply_wiki_filter(projects, &filter);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.dbname != "enwiki"));
    }
}
