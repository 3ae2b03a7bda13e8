use lazy_static::lazy_static;
use regex::Regex;

/// Badge item "sitelink to redirect".
pub const QID_S2R: &str = "Q70893996";
/// Badge item "intentional sitelink to redirect".
pub const QID_I2R: &str = "Q70894304";

/// Redirect pages longer than this are treated as substantial even if their
/// target page does not exist.
pub const REDIRECT_LENGTH_CUTOFF: u64 = 100; // bytes

lazy_static! {
    static ref RE_QID: Regex = Regex::new(r"^Q\d+$").expect("RE_QID: invalid regex");
}

pub fn is_valid_qid(qid: &str) -> bool {
    RE_QID.is_match(qid)
}

//________________________________________________________________________________________________________________________

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Badge {
    SitelinkToRedirect,
    IntentionalSitelinkToRedirect,
}

impl Badge {
    pub const fn qid(&self) -> &'static str {
        match self {
            Self::SitelinkToRedirect => QID_S2R,
            Self::IntentionalSitelinkToRedirect => QID_I2R,
        }
    }

    pub fn new_from_qid(qid: &str) -> Option<Self> {
        match qid {
            QID_S2R => Some(Self::SitelinkToRedirect),
            QID_I2R => Some(Self::IntentionalSitelinkToRedirect),
            _ => None,
        }
    }
}

//________________________________________________________________________________________________________________________

/// One redirect page on a client wiki that is connected to a Wikidata item,
/// joined to its target page where the target could be resolved on the
/// replica. Produced by `SourceRedirects`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectRow {
    pub redirect_id: u64,
    pub redirect_namespace: i64,
    pub redirect_title: String,
    pub redirect_qid: String,
    pub target_namespace: Option<i64>,
    pub target_title: Option<String>,
    pub target_fragment: Option<String>,
    pub target_interwiki: Option<String>,
    pub target_id: Option<u64>,
    pub target_qid: Option<String>,
}

impl RedirectRow {
    /// The target page exists on the replica.
    pub const fn target_in_replica(&self) -> bool {
        self.target_id.is_some()
    }

    /// The target page is itself connected to a Wikidata item.
    pub const fn target_connected(&self) -> bool {
        self.target_qid.is_some()
    }

    /// The redirect points to another wiki. Interwiki redirects never have a
    /// local target page, so they are excluded from inexistent-target
    /// processing.
    pub fn is_interwiki(&self) -> bool {
        self.target_interwiki
            .as_deref()
            .map_or(false, |iw| !iw.is_empty())
    }
}

//________________________________________________________________________________________________________________________

/// One badged sitelink as returned by the Wikidata Query Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeRow {
    pub qid: String,
    pub sitelink_url: String,
    pub page_name: String,
    pub badge: Badge,
}

//________________________________________________________________________________________________________________________

/// One row of the per-project master table: a redirect page, a badged
/// sitelink, or both (outer-merged on the item QID).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SitelinkCase {
    pub redirect: Option<RedirectRow>,
    pub s2r: Option<BadgeRow>,
    pub i2r: Option<BadgeRow>,
}

impl SitelinkCase {
    pub fn qid(&self) -> Option<&str> {
        self.redirect
            .as_ref()
            .map(|r| r.redirect_qid.as_str())
            .or_else(|| self.s2r.as_ref().map(|b| b.qid.as_str()))
            .or_else(|| self.i2r.as_ref().map(|b| b.qid.as_str()))
    }

    pub const fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub const fn has_s2r_badge(&self) -> bool {
        self.s2r.is_some()
    }

    pub const fn has_i2r_badge(&self) -> bool {
        self.i2r.is_some()
    }

    pub const fn has_any_badge(&self) -> bool {
        self.has_s2r_badge() || self.has_i2r_badge()
    }

    pub const fn has_both_badges(&self) -> bool {
        self.has_s2r_badge() && self.has_i2r_badge()
    }

    /// Redirect page whose target does not exist on the replica.
    pub fn has_inexistent_target(&self) -> bool {
        self.redirect
            .as_ref()
            .map_or(false, |r| !r.target_in_replica())
    }

    /// Redirect page whose target exists but is not connected to any item.
    pub fn has_unconnected_target(&self) -> bool {
        self.redirect
            .as_ref()
            .map_or(false, |r| r.target_in_replica() && !r.target_connected())
    }

    /// Redirect page with neither badge on its sitelink.
    pub fn is_redirect_without_badge(&self) -> bool {
        self.is_redirect() && !self.has_any_badge()
    }

    /// Badged sitelink whose page is not a redirect on the replica.
    pub fn is_non_redirect_with_badge(&self) -> bool {
        !self.is_redirect() && self.has_any_badge()
    }

    /// Candidate for adding the S2R badge: an unbadged redirect whose target
    /// exists and is connected.
    pub fn is_s2r_candidate(&self) -> bool {
        self.is_redirect_without_badge()
            && self
                .redirect
                .as_ref()
                .map_or(false, |r| r.target_in_replica() && r.target_connected())
    }

    /// Candidate for inexistent-target processing: a redirect with no local
    /// target page and no interwiki component.
    pub fn is_inexistent_target_candidate(&self) -> bool {
        self.redirect
            .as_ref()
            .map_or(false, |r| !r.target_in_replica() && !r.is_interwiki())
    }

    /// Candidate for removing the S2R badge: a connected redirect that
    /// carries both badges.
    pub fn is_both_badges_candidate(&self) -> bool {
        self.has_both_badges()
            && self
                .redirect
                .as_ref()
                .map_or(false, |r| r.target_in_replica() && r.target_connected())
    }
}

//________________________________________________________________________________________________________________________

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect_row(target_id: Option<u64>, target_qid: Option<&str>) -> RedirectRow {
        RedirectRow {
            redirect_id: 123,
            redirect_namespace: 0,
            redirect_title: "Some_redirect".to_string(),
            redirect_qid: "Q42".to_string(),
            target_id,
            target_qid: target_qid.map(str::to_string),
            ..Default::default()
        }
    }

    fn badge_row(qid: &str, badge: Badge) -> BadgeRow {
        BadgeRow {
            qid: qid.to_string(),
            sitelink_url: format!("https://en.wikipedia.org/wiki/{qid}"),
            page_name: qid.to_string(),
            badge,
        }
    }

    #[test]
    fn test_badge_qid_roundtrip() {
        assert_eq!(Badge::new_from_qid(QID_S2R), Some(Badge::SitelinkToRedirect));
        assert_eq!(
            Badge::new_from_qid(QID_I2R),
            Some(Badge::IntentionalSitelinkToRedirect)
        );
        assert_eq!(Badge::new_from_qid("Q42"), None);
        assert_eq!(Badge::SitelinkToRedirect.qid(), QID_S2R);
        assert_eq!(Badge::IntentionalSitelinkToRedirect.qid(), QID_I2R);
    }

    #[test]
    fn test_is_valid_qid() {
        assert!(is_valid_qid("Q1"));
        assert!(is_valid_qid("Q70893996"));
        assert!(!is_valid_qid("P31"));
        assert!(!is_valid_qid("Q"));
        assert!(!is_valid_qid("q42"));
        assert!(!is_valid_qid("Q42x"));
    }

    #[test]
    fn test_interwiki_detection() {
        let mut row = redirect_row(None, None);
        assert!(!row.is_interwiki());
        row.target_interwiki = Some(String::new());
        assert!(!row.is_interwiki());
        row.target_interwiki = Some("de".to_string());
        assert!(row.is_interwiki());
    }

    #[test]
    fn test_case_qid_preference() {
        let case = SitelinkCase {
            redirect: Some(redirect_row(Some(1), Some("Q100"))),
            s2r: Some(badge_row("Q99", Badge::SitelinkToRedirect)),
            i2r: None,
        };
        // The redirect page's own QID wins over the badge rows
        assert_eq!(case.qid(), Some("Q42"));

        let badge_only = SitelinkCase {
            redirect: None,
            s2r: None,
            i2r: Some(badge_row("Q7", Badge::IntentionalSitelinkToRedirect)),
        };
        assert_eq!(badge_only.qid(), Some("Q7"));

        assert_eq!(SitelinkCase::default().qid(), None);
    }

    #[test]
    fn test_s2r_candidate() {
        let ok = SitelinkCase {
            redirect: Some(redirect_row(Some(456), Some("Q100"))),
            ..Default::default()
        };
        assert!(ok.is_s2r_candidate());

        // Unconnected target: no candidate
        let unconnected = SitelinkCase {
            redirect: Some(redirect_row(Some(456), None)),
            ..Default::default()
        };
        assert!(!unconnected.is_s2r_candidate());
        assert!(unconnected.has_unconnected_target());

        // Already badged: no candidate
        let badged = SitelinkCase {
            redirect: Some(redirect_row(Some(456), Some("Q100"))),
            s2r: Some(badge_row("Q42", Badge::SitelinkToRedirect)),
            ..Default::default()
        };
        assert!(!badged.is_s2r_candidate());
    }

    #[test]
    fn test_inexistent_target_candidate() {
        let local = SitelinkCase {
            redirect: Some(redirect_row(None, None)),
            ..Default::default()
        };
        assert!(local.has_inexistent_target());
        assert!(local.is_inexistent_target_candidate());

        let mut interwiki_row = redirect_row(None, None);
        interwiki_row.target_interwiki = Some("fr".to_string());
        let interwiki = SitelinkCase {
            redirect: Some(interwiki_row),
            ..Default::default()
        };
        assert!(interwiki.has_inexistent_target());
        assert!(!interwiki.is_inexistent_target_candidate());
    }

    #[test]
    fn test_both_badges_candidate() {
        let case = SitelinkCase {
            redirect: Some(redirect_row(Some(456), Some("Q100"))),
            s2r: Some(badge_row("Q42", Badge::SitelinkToRedirect)),
            i2r: Some(badge_row("Q42", Badge::IntentionalSitelinkToRedirect)),
        };
        assert!(case.has_both_badges());
        assert!(case.is_both_badges_candidate());

        let single = SitelinkCase {
            redirect: Some(redirect_row(Some(456), Some("Q100"))),
            s2r: Some(badge_row("Q42", Badge::SitelinkToRedirect)),
            i2r: None,
        };
        assert!(!single.is_both_badges_candidate());
    }

    #[test]
    fn test_non_redirect_with_badge() {
        let case = SitelinkCase {
            redirect: None,
            s2r: Some(badge_row("Q42", Badge::SitelinkToRedirect)),
            i2r: None,
        };
        assert!(case.is_non_redirect_with_badge());
        assert!(!case.is_redirect_without_badge());
    }
}
