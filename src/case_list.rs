use crate::case::{Badge, BadgeRow, RedirectRow, SitelinkCase};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

//________________________________________________________________________________________________________________________

/// The master table for one project: all redirect pages connected to an item,
/// outer-merged with all currently badged sitelinks, keyed on the item QID.
#[derive(Debug, Clone, Default)]
pub struct CaseList {
    wiki: String,
    cases: Vec<SitelinkCase>,
}

impl CaseList {
    pub fn new_from_rows(
        wiki: &str,
        redirect_rows: Vec<RedirectRow>,
        badge_rows: Vec<BadgeRow>,
    ) -> Self {
        let mut s2r_by_qid: HashMap<String, BadgeRow> = HashMap::new();
        let mut i2r_by_qid: HashMap<String, BadgeRow> = HashMap::new();
        for row in badge_rows {
            match row.badge {
                Badge::SitelinkToRedirect => s2r_by_qid.insert(row.qid.clone(), row),
                Badge::IntentionalSitelinkToRedirect => i2r_by_qid.insert(row.qid.clone(), row),
            };
        }

        let mut cases: Vec<SitelinkCase> = Vec::with_capacity(redirect_rows.len());
        let mut matched: HashSet<String> = HashSet::new();
        for row in redirect_rows {
            let s2r = s2r_by_qid.get(&row.redirect_qid).cloned();
            let i2r = i2r_by_qid.get(&row.redirect_qid).cloned();
            matched.insert(row.redirect_qid.clone());
            cases.push(SitelinkCase {
                redirect: Some(row),
                s2r,
                i2r,
            });
        }

        // Badge rows without a matching redirect page become non-redirect
        // cases; an item can be left over in both maps.
        let mut leftovers: HashMap<String, SitelinkCase> = HashMap::new();
        for (qid, row) in s2r_by_qid {
            if matched.contains(&qid) {
                continue;
            }
            leftovers.entry(qid).or_default().s2r = Some(row);
        }
        for (qid, row) in i2r_by_qid {
            if matched.contains(&qid) {
                continue;
            }
            leftovers.entry(qid).or_default().i2r = Some(row);
        }
        let mut leftovers: Vec<SitelinkCase> = leftovers.into_values().collect();
        leftovers.sort_by(|a, b| a.qid().cmp(&b.qid()));
        cases.append(&mut leftovers);

        Self {
            wiki: wiki.to_string(),
            cases,
        }
    }

    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    pub fn cases(&self) -> &[SitelinkCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    //____________________________________________________________________________________________________________________
    // Case subsets, matching the columns of the project statistics

    pub fn redirects(&self) -> Vec<&SitelinkCase> {
        self.filtered(SitelinkCase::is_redirect)
    }

    pub fn redirects_with_inexistent_target(&self) -> Vec<&SitelinkCase> {
        self.filtered(SitelinkCase::has_inexistent_target)
    }

    pub fn redirects_with_unconnected_target(&self) -> Vec<&SitelinkCase> {
        self.filtered(SitelinkCase::has_unconnected_target)
    }

    pub fn redirects_with_any_badge(&self) -> Vec<&SitelinkCase> {
        self.filtered(|c| c.is_redirect() && c.has_any_badge())
    }

    pub fn redirects_with_s2r_badge(&self) -> Vec<&SitelinkCase> {
        self.filtered(|c| c.is_redirect() && c.has_s2r_badge())
    }

    pub fn redirects_with_i2r_badge(&self) -> Vec<&SitelinkCase> {
        self.filtered(|c| c.is_redirect() && c.has_i2r_badge())
    }

    pub fn redirects_without_badge(&self) -> Vec<&SitelinkCase> {
        self.filtered(SitelinkCase::is_redirect_without_badge)
    }

    pub fn redirects_with_both_badges(&self) -> Vec<&SitelinkCase> {
        self.filtered(|c| c.is_redirect() && c.has_both_badges())
    }

    pub fn non_redirects_with_badges(&self) -> Vec<&SitelinkCase> {
        self.filtered(SitelinkCase::is_non_redirect_with_badge)
    }

    fn filtered<F>(&self, filter: F) -> Vec<&SitelinkCase>
    where
        F: Fn(&SitelinkCase) -> bool + Sync,
    {
        self.cases.par_iter().filter(|c| filter(c)).collect()
    }

    pub fn stats(&self) -> ProjectStats {
        ProjectStats {
            all_redirects: self.redirects().len(),
            with_any_badge: self.redirects_with_any_badge().len(),
            with_s2r_badge: self.redirects_with_s2r_badge().len(),
            with_i2r_badge: self.redirects_with_i2r_badge().len(),
            without_badge: self.redirects_without_badge().len(),
            with_both_badges: self.redirects_with_both_badges().len(),
            non_redirects_with_badges: self.non_redirects_with_badges().len(),
            with_inexistent_target: self.redirects_with_inexistent_target().len(),
            with_unconnected_target: self.redirects_with_unconnected_target().len(),
        }
    }
}

//________________________________________________________________________________________________________________________

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub all_redirects: usize,
    pub with_any_badge: usize,
    pub with_s2r_badge: usize,
    pub with_i2r_badge: usize,
    pub without_badge: usize,
    pub with_both_badges: usize,
    pub non_redirects_with_badges: usize,
    pub with_inexistent_target: usize,
    pub with_unconnected_target: usize,
}

impl ProjectStats {
    pub fn as_tsv_row(&self, dbname: &str) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            dbname,
            self.all_redirects,
            self.with_any_badge,
            self.with_s2r_badge,
            self.with_i2r_badge,
            self.without_badge,
            self.with_both_badges,
            self.non_redirects_with_badges,
            self.with_inexistent_target,
            self.with_unconnected_target
        )
    }

    pub fn as_log_line(&self, dbname: &str) -> String {
        format!(
            "{dbname: <20}: {:6} redirects; {:6} w/ any badge; {:6} w/ s2r badge; {:6} w/ i2r badge; {:6} w/o badge; {:6} w/ both badges; {:6} non-redirects w/ any badge; {:6} w/ inexistent target; {:6} w/ unconnected target",
            self.all_redirects,
            self.with_any_badge,
            self.with_s2r_badge,
            self.with_i2r_badge,
            self.without_badge,
            self.with_both_badges,
            self.non_redirects_with_badges,
            self.with_inexistent_target,
            self.with_unconnected_target
        )
    }
}

//________________________________________________________________________________________________________________________
