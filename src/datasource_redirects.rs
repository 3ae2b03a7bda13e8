use crate::app_state::AppState;
use crate::case::RedirectRow;
use anyhow::{anyhow, Result};
use mysql_async::from_row;
use mysql_async::prelude::Queryable;

/// Raw replica row: redirect page joined to its target page and both pages'
/// `wikibase_item` page props. LEFT-JOINed columns are nullable.
type RedirectDbRow = (
    u64,             // redirect_id
    i64,             // redirect_namespace
    Vec<u8>,         // redirect_title
    Vec<u8>,         // redirect_qid
    Option<i64>,     // target_namespace
    Option<Vec<u8>>, // target_title
    Option<Vec<u8>>, // target_fragment
    Option<Vec<u8>>, // target_interwiki
    Option<u64>,     // target_id
    Option<Vec<u8>>, // target_qid
);

/// All redirect pages of a project that are connected to a Wikidata item,
/// from the wiki replica database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRedirects {}

impl SourceRedirects {
    pub fn new() -> Self {
        Self {}
    }

    const SQL: &'static str = r"SELECT
  redirect_page.page_id AS redirect_id,
  redirect_page.page_namespace AS redirect_namespace,
  redirect_page.page_title AS redirect_title,
  redirect_pp.pp_value AS redirect_qid,
  rd_namespace AS target_namespace,
  rd_title AS target_title,
  rd_fragment AS target_fragment,
  rd_interwiki AS target_interwiki,
  target_page.page_id AS target_id,
  target_pp.pp_value AS target_qid
FROM
  page AS redirect_page
    JOIN page_props AS redirect_pp ON (redirect_page.page_id=redirect_pp.pp_page AND redirect_pp.pp_propname='wikibase_item')
    LEFT JOIN redirect ON redirect_page.page_id=rd_from
      LEFT JOIN page AS target_page ON (redirect.rd_namespace=target_page.page_namespace AND redirect.rd_title=target_page.page_title)
        LEFT JOIN page_props AS target_pp ON (target_page.page_id=target_pp.pp_page AND target_pp.pp_propname='wikibase_item')
WHERE
  redirect_page.page_is_redirect=1";

    pub async fn run(&self, state: &AppState, dbname: &str) -> Result<Vec<RedirectRow>> {
        let mut conn = state.get_wiki_db_connection(dbname).await?;
        let rows = conn
            .exec_iter(Self::SQL, ())
            .await
            .map_err(|e| anyhow!("SourceRedirects::run query failed for {dbname}: {e}"))?
            .map_and_drop(from_row::<RedirectDbRow>)
            .await
            .map_err(|e| anyhow!("SourceRedirects::run row conversion failed for {dbname}: {e}"))?;
        conn.disconnect().await?;
        Ok(rows.into_iter().map(Self::row_from_db).collect())
    }

    fn row_from_db(row: RedirectDbRow) -> RedirectRow {
        let (
            redirect_id,
            redirect_namespace,
            redirect_title,
            redirect_qid,
            target_namespace,
            target_title,
            target_fragment,
            target_interwiki,
            target_id,
            target_qid,
        ) = row;
        RedirectRow {
            redirect_id,
            redirect_namespace,
            redirect_title: String::from_utf8_lossy(&redirect_title).into_owned(),
            redirect_qid: String::from_utf8_lossy(&redirect_qid).into_owned(),
            target_namespace,
            target_title: target_title.map(|v| String::from_utf8_lossy(&v).into_owned()),
            target_fragment: target_fragment.map(|v| String::from_utf8_lossy(&v).into_owned()),
            target_interwiki: target_interwiki.map(|v| String::from_utf8_lossy(&v).into_owned()),
            target_id,
            target_qid: target_qid.map(|v| String::from_utf8_lossy(&v).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_db_full() {
        let row: RedirectDbRow = (
            123,
            0,
            b"Some_redirect".to_vec(),
            b"Q42".to_vec(),
            Some(0),
            Some(b"Target_page".to_vec()),
            Some(b"Section".to_vec()),
            Some(b"".to_vec()),
            Some(456),
            Some(b"Q100".to_vec()),
        );
        let parsed = SourceRedirects::row_from_db(row);
        assert_eq!(parsed.redirect_id, 123);
        assert_eq!(parsed.redirect_title, "Some_redirect");
        assert_eq!(parsed.redirect_qid, "Q42");
        assert_eq!(parsed.target_title.as_deref(), Some("Target_page"));
        assert_eq!(parsed.target_interwiki.as_deref(), Some(""));
        assert!(parsed.target_in_replica());
        assert!(parsed.target_connected());
        assert!(!parsed.is_interwiki());
    }

    #[test]
    fn test_row_from_db_broken_redirect() {
        // page_is_redirect=1 but no row in the redirect table
        let row: RedirectDbRow = (
            77,
            4,
            b"Project_redirect".to_vec(),
            b"Q77".to_vec(),
            None,
            None,
            None,
            None,
            None,
            None,
        );
        let parsed = SourceRedirects::row_from_db(row);
        assert!(!parsed.target_in_replica());
        assert!(!parsed.target_connected());
        assert_eq!(parsed.target_title, None);
    }

    #[test]
    fn test_sql_shape() {
        assert!(SourceRedirects::SQL.contains("page_is_redirect=1"));
        assert!(SourceRedirects::SQL.contains("pp_propname='wikibase_item'"));
        assert!(SourceRedirects::SQL.contains("LEFT JOIN redirect"));
    }
}
