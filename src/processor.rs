use crate::app_state::AppState;
use crate::case::{Badge, SitelinkCase, QID_S2R, REDIRECT_LENGTH_CUTOFF};
use crate::case_list::CaseList;
use crate::datasource_badges::SourceBadges;
use crate::datasource_redirects::SourceRedirects;
use crate::editor::{Editor, ItemSitelink, ItemState};
use crate::page_check;
use crate::page_check::PageFacts;
use crate::report::Reports;
use crate::site_list::{fetch_projects, Project};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wikimisc::mediawiki::api::Api;

/// Pause between projects, as a courtesy to replicas and APIs.
const PROJECT_PAUSE: Duration = Duration::from_secs(1);

//________________________________________________________________________________________________________________________

/// One full bot run: enumerate projects, process each, finish the reports.
pub async fn run_badge_bot(state: Arc<AppState>, wiki_filter: &[String]) -> Result<()> {
    let reports = Reports::new(state.output_dir())?;
    let mut editor = Editor::new_from_state(&state).await?;
    if editor.simulate() {
        info!("Running in simulation mode, no edits will be performed");
    }

    let projects = fetch_projects(&state, wiki_filter).await?;
    info!("Found {} projects with database names", projects.len());

    for project in &projects {
        let mut processor = ProjectProcessor::new(state.clone(), project.clone());
        if let Err(e) = processor.run(&mut editor, &reports).await {
            warn!("Cannot process project {}: {e}", project.dbname);
        }
        tokio::time::sleep(PROJECT_PAUSE).await;
    }

    reports.finish()?;
    Ok(())
}

//________________________________________________________________________________________________________________________

/// Processes one project: builds the master case list from replica and WDQS,
/// writes reports, and runs whichever badge-maintenance passes are enabled.
#[derive(Debug)]
pub struct ProjectProcessor {
    state: Arc<AppState>,
    project: Project,
    cases: CaseList,
}

impl ProjectProcessor {
    pub fn new(state: Arc<AppState>, project: Project) -> Self {
        Self {
            state,
            project,
            cases: CaseList::default(),
        }
    }

    pub async fn run(&mut self, editor: &mut Editor, reports: &Reports) -> Result<()> {
        self.gather().await?;
        let dbname = self.project.dbname.clone();

        let stats = self.cases.stats();
        info!("{}", stats.as_log_line(&dbname));
        reports.append_cases(&dbname, &self.cases.redirects())?;
        reports.append_stats(&dbname, &stats)?;

        if self.state.process_missing_s2r_badge() {
            self.process_redirects_without_badge(editor).await;
        }
        if self.state.process_both_badge_situations() {
            self.process_redirects_with_both_badges(editor).await;
        }
        if self.state.process_non_redirects() {
            self.process_non_redirects_with_badges(editor).await;
        }
        if self.state.process_inexistent_targets() {
            self.process_redirects_with_inexistent_target(editor).await;
        }
        if self.state.process_unconnected_targets() {
            reports.append_unconnected(&dbname, &self.cases.redirects_with_unconnected_target())?;
        }

        Ok(())
    }

    async fn gather(&mut self) -> Result<()> {
        let redirect_rows = SourceRedirects::new()
            .run(&self.state, &self.project.dbname)
            .await?;
        let badge_rows = SourceBadges::new().run(&self.project).await?;
        self.cases = CaseList::new_from_rows(&self.project.dbname, redirect_rows, badge_rows);
        Ok(())
    }

    async fn client_api(&self) -> Option<Api> {
        match self
            .state
            .get_api_for_wiki(self.project.dbname.clone())
            .await
        {
            Ok(api) => Some(api),
            Err(e) => {
                warn!("No API for {}: {e}", self.project.dbname);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Per-case live checks
    // ------------------------------------------------------------------

    /// Looks up the current sitelink on the item, logging the skip reason
    /// when the case has become stale since the replica snapshot.
    async fn checked_sitelink(&self, editor: &Editor, qid: &str) -> Option<ItemSitelink> {
        let dbname = &self.project.dbname;
        match editor.item_state(qid, dbname).await {
            Ok(ItemState::Sitelink(sitelink)) => Some(sitelink),
            Ok(ItemState::Missing) => {
                info!("Skip {qid} (item page does not exist)");
                None
            }
            Ok(ItemState::ItemRedirect) => {
                info!("Skip {qid} (item page is a redirect)");
                None
            }
            Ok(ItemState::NoSitelink) => {
                warn!("Skip {qid}: no sitelink found for {dbname}");
                None
            }
            Err(e) => {
                warn!("Skip {qid}, {dbname} sitelink: {e}");
                None
            }
        }
    }

    /// The sitelink plus live page facts, required to be a redirect.
    async fn redirect_sitelink(
        &self,
        editor: &Editor,
        api: &Api,
        qid: &str,
    ) -> Option<(ItemSitelink, PageFacts)> {
        let dbname = &self.project.dbname;
        let sitelink = self.checked_sitelink(editor, qid).await?;
        let facts = match page_check::page_facts(api, &sitelink.title).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!("Skip {qid}, {dbname} sitelink: {e}");
                return None;
            }
        };
        if !facts.is_redirect {
            info!("Skip {qid}, {dbname} sitelink (sitelink to non-redirect, expect redirect)");
            return None;
        }
        Some((sitelink, facts))
    }

    /// Live facts of the redirect target of `title`, logging skips.
    async fn live_target_facts(&self, api: &Api, qid: &str, title: &str) -> Option<PageFacts> {
        let dbname = &self.project.dbname;
        let target = match page_check::redirect_target(api, title).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!("Skip {qid}, {dbname} sitelink: cannot determine redirect target");
                return None;
            }
            Err(e) => {
                warn!("Skip {qid}, {dbname} sitelink: {e}");
                return None;
            }
        };
        match page_check::page_facts(api, &target).await {
            Ok(facts) => Some(facts),
            Err(e) => {
                warn!("Skip {qid}, {dbname} sitelink: {e}");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Processing passes
    // ------------------------------------------------------------------

    /// Adds the S2R badge to unbadged sitelinks to redirects whose target
    /// exists and is connected.
    async fn process_redirects_without_badge(&self, editor: &mut Editor) {
        let dbname = self.project.dbname.clone();
        let Some(api) = self.client_api().await else {
            return;
        };
        for qid in candidate_qids(&self.cases, SitelinkCase::is_s2r_candidate) {
            let Some((sitelink, _facts)) = self.redirect_sitelink(editor, &api, &qid).await else {
                continue;
            };
            let Some(target_facts) = self.live_target_facts(&api, &qid, &sitelink.title).await
            else {
                continue;
            };
            if !target_facts.exists {
                info!("Skip {qid}, {dbname} sitelink (sitelink target does not exist, expect exist)");
                continue;
            }
            if target_facts.wikibase_item.is_none() {
                info!(
                    "Skip {qid}, {dbname} sitelink (sitelink target is not connected, expect connected)"
                );
                continue;
            }
            let summary = format!(
                "add badge [[{QID_S2R}]] to {dbname} sitelink; see [[Wikidata:Sitelinks to redirects]] for details"
            );
            if let Err(e) = editor
                .add_badge(&qid, &dbname, &sitelink, Badge::SitelinkToRedirect, &summary)
                .await
            {
                warn!("Edit failed in {qid}, {dbname} sitelink: {e}");
            }
        }
    }

    /// Removes the S2R badge where both badges are set; I2R wins.
    async fn process_redirects_with_both_badges(&self, editor: &mut Editor) {
        let dbname = self.project.dbname.clone();
        let Some(api) = self.client_api().await else {
            return;
        };
        for qid in candidate_qids(&self.cases, SitelinkCase::is_both_badges_candidate) {
            let Some((sitelink, _facts)) = self.redirect_sitelink(editor, &api, &qid).await else {
                continue;
            };
            let Some(target_facts) = self.live_target_facts(&api, &qid, &sitelink.title).await
            else {
                continue;
            };
            if !target_facts.exists {
                info!("Skip {qid}, {dbname} sitelink (sitelink target does not exist, expect exist)");
                continue;
            }
            if target_facts.wikibase_item.is_none() {
                info!(
                    "Skip {qid}, {dbname} sitelink (sitelink target is not connected, expect connected)"
                );
                continue;
            }
            if !sitelink.has_badge(Badge::IntentionalSitelinkToRedirect) {
                info!("Skip {qid}, {dbname} sitelink (sitelink does not have I2R badge, expect has)");
                continue;
            }
            let summary = format!(
                "remove badge [[{QID_S2R}]] from {dbname} sitelink; [[Wikidata:Sitelinks to redirects|sitelinks to redirect pages]] should not carry both sitelink badges"
            );
            if let Err(e) = editor
                .remove_badge(&qid, &dbname, &sitelink, Badge::SitelinkToRedirect, &summary)
                .await
            {
                warn!("Edit failed in {qid}, {dbname} sitelink: {e}");
            }
        }
    }

    /// Removes badges from sitelinks that no longer point to a redirect.
    async fn process_non_redirects_with_badges(&self, editor: &mut Editor) {
        let dbname = self.project.dbname.clone();
        let Some(api) = self.client_api().await else {
            return;
        };
        for (badge, qid) in badge_removal_candidates(&self.cases) {
            let Some(sitelink) = self.checked_sitelink(editor, &qid).await else {
                continue;
            };
            let facts = match page_check::page_facts(&api, &sitelink.title).await {
                Ok(facts) => facts,
                Err(e) => {
                    warn!("Skip {qid}, {dbname} sitelink: {e}");
                    continue;
                }
            };
            if facts.is_redirect {
                info!("Skip {qid}, {dbname} sitelink (sitelink to redirect, expect non-redirect)");
                continue;
            }
            let summary = format!(
                "remove badge [[{}]] from {dbname} sitelink; sitelink points to a non-redirect page",
                badge.qid()
            );
            if let Err(e) = editor
                .remove_badge(&qid, &dbname, &sitelink, badge, &summary)
                .await
            {
                warn!("Edit failed in {qid}, {dbname} sitelink: {e}");
            }
        }
    }

    /// Redirects whose target page does not exist: substantial pages get the
    /// S2R badge, stub redirects lose their sitelink.
    async fn process_redirects_with_inexistent_target(&self, editor: &mut Editor) {
        let dbname = self.project.dbname.clone();
        let Some(api) = self.client_api().await else {
            return;
        };
        for qid in candidate_qids(&self.cases, SitelinkCase::is_inexistent_target_candidate) {
            let Some((sitelink, facts)) = self.redirect_sitelink(editor, &api, &qid).await else {
                continue;
            };
            let target_exists = match page_check::redirect_target(&api, &sitelink.title).await {
                Ok(Some(target)) => match page_check::page_facts(&api, &target).await {
                    Ok(target_facts) => target_facts.exists,
                    Err(e) => {
                        warn!("Skip {qid}, {dbname} sitelink: {e}");
                        continue;
                    }
                },
                Ok(None) => false,
                Err(e) => {
                    warn!("Skip {qid}, {dbname} sitelink: {e}");
                    continue;
                }
            };
            if target_exists {
                info!("Skip {qid}, {dbname} sitelink (sitelink target does exist, expect non-exist)");
                continue;
            }

            if facts.length > REDIRECT_LENGTH_CUTOFF {
                let summary = format!(
                    "add badge [[{QID_S2R}]] to {dbname} sitelink; see [[Wikidata:Sitelinks to redirects]] for details"
                );
                if let Err(e) = editor
                    .add_badge(&qid, &dbname, &sitelink, Badge::SitelinkToRedirect, &summary)
                    .await
                {
                    warn!("Edit failed in {qid}, {dbname} sitelink: {e}");
                }
            } else if let Err(e) = editor
                .remove_sitelink(
                    &qid,
                    &dbname,
                    "remove sitelink to redirect page with non-existent target page on client wiki",
                )
                .await
            {
                warn!("Edit failed in {qid}, {dbname} sitelink: {e}");
            }
        }
    }
}

//________________________________________________________________________________________________________________________

pub(crate) fn candidate_qids<F>(cases: &CaseList, filter: F) -> Vec<String>
where
    F: Fn(&SitelinkCase) -> bool,
{
    cases
        .cases()
        .iter()
        .filter(|c| filter(c))
        .filter_map(|c| c.qid().map(str::to_string))
        .collect()
}

/// Badge/QID pairs for the non-redirect cleanup pass: all stray S2R badges
/// first, then all stray I2R badges.
pub(crate) fn badge_removal_candidates(cases: &CaseList) -> Vec<(Badge, String)> {
    let mut ret: Vec<(Badge, String)> = vec![];
    for case in cases.cases() {
        if case.is_redirect() {
            continue;
        }
        if let Some(row) = &case.s2r {
            ret.push((Badge::SitelinkToRedirect, row.qid.clone()));
        }
    }
    for case in cases.cases() {
        if case.is_redirect() {
            continue;
        }
        if let Some(row) = &case.i2r {
            ret.push((Badge::IntentionalSitelinkToRedirect, row.qid.clone()));
        }
    }
    ret
}

//________________________________________________________________________________________________________________________

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{BadgeRow, RedirectRow};

    fn redirect_row(qid: &str, target_id: Option<u64>, target_qid: Option<&str>) -> RedirectRow {
        RedirectRow {
            redirect_id: 1,
            redirect_namespace: 0,
            redirect_title: format!("Redirect_for_{qid}"),
            redirect_qid: qid.to_string(),
            target_id,
            target_qid: target_qid.map(str::to_string),
            ..Default::default()
        }
    }

    fn badge_row(qid: &str, badge: Badge) -> BadgeRow {
        BadgeRow {
            qid: qid.to_string(),
            sitelink_url: format!("https://en.wikipedia.org/wiki/Page_{qid}"),
            page_name: format!("Page {qid}"),
            badge,
        }
    }

    fn make_case_list() -> CaseList {
        let redirect_rows = vec![
            redirect_row("Q1", Some(10), Some("Q100")), // S2R candidate
            redirect_row("Q2", None, None),             // inexistent target
            redirect_row("Q3", Some(30), Some("Q300")), // both badges
        ];
        let badge_rows = vec![
            badge_row("Q3", Badge::SitelinkToRedirect),
            badge_row("Q3", Badge::IntentionalSitelinkToRedirect),
            badge_row("Q4", Badge::SitelinkToRedirect),
            badge_row("Q5", Badge::IntentionalSitelinkToRedirect),
        ];
        CaseList::new_from_rows("enwiki", redirect_rows, badge_rows)
    }

    #[test]
    fn test_candidate_qids_s2r() {
        let cases = make_case_list();
        assert_eq!(
            candidate_qids(&cases, SitelinkCase::is_s2r_candidate),
            vec!["Q1".to_string()]
        );
    }

    #[test]
    fn test_candidate_qids_inexistent_target() {
        let cases = make_case_list();
        assert_eq!(
            candidate_qids(&cases, SitelinkCase::is_inexistent_target_candidate),
            vec!["Q2".to_string()]
        );
    }

    #[test]
    fn test_candidate_qids_both_badges() {
        let cases = make_case_list();
        assert_eq!(
            candidate_qids(&cases, SitelinkCase::is_both_badges_candidate),
            vec!["Q3".to_string()]
        );
    }

    #[test]
    fn test_badge_removal_candidates_order() {
        let cases = make_case_list();
        assert_eq!(
            badge_removal_candidates(&cases),
            vec![
                (Badge::SitelinkToRedirect, "Q4".to_string()),
                (Badge::IntentionalSitelinkToRedirect, "Q5".to_string()),
            ]
        );
    }
}
