use crate::case::SitelinkCase;
use crate::case_list::ProjectStats;
use anyhow::{Context, Result};
use chrono::prelude::*;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CASES_FILE: &str = "cases.tsv";
pub const STATS_FILE: &str = "project_stats.tsv";
pub const UNCONNECTED_BODY_FILE: &str = "unconnected_wikitable_body.txt";
pub const UNCONNECTED_FILE: &str = "unconnected_wikitable.txt";

//________________________________________________________________________________________________________________________

/// Run artifacts: the per-case TSV, the per-project statistics TSV, and the
/// wikitext report of redirects with unconnected targets.  All files live in
/// one output directory and are truncated when a run starts.
#[derive(Debug, Clone)]
pub struct Reports {
    dir: PathBuf,
}

impl Reports {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let ret = Self {
            dir: dir.as_ref().to_path_buf(),
        };
        fs::create_dir_all(&ret.dir)
            .with_context(|| format!("Cannot create output directory {:?}", ret.dir))?;
        for file in [CASES_FILE, STATS_FILE, UNCONNECTED_BODY_FILE] {
            fs::write(ret.path(file), "")
                .with_context(|| format!("Cannot truncate report file {file}"))?;
        }
        Ok(ret)
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn append(&self, file: &str, content: &str) -> Result<()> {
        let mut handle = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path(file))
            .with_context(|| format!("Cannot open report file {file}"))?;
        handle
            .write_all(content.as_bytes())
            .with_context(|| format!("Cannot append to report file {file}"))?;
        Ok(())
    }

    pub fn append_cases(&self, dbname: &str, cases: &[&SitelinkCase]) -> Result<()> {
        if cases.is_empty() {
            return Ok(());
        }
        let rows: String = cases.iter().map(|c| case_tsv_row(dbname, c)).collect();
        self.append(CASES_FILE, &rows)
    }

    pub fn append_stats(&self, dbname: &str, stats: &ProjectStats) -> Result<()> {
        self.append(STATS_FILE, &format!("{}\n", stats.as_tsv_row(dbname)))
    }

    pub fn append_unconnected(&self, dbname: &str, cases: &[&SitelinkCase]) -> Result<()> {
        if cases.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for case in cases {
            let redirect = match &case.redirect {
                Some(redirect) => redirect,
                None => continue,
            };
            body += "|-\n";
            body += &format!(
                "| {{{{Q|{}}}}} || {} || {} || {}\n",
                redirect.redirect_qid,
                dbname,
                redirect.redirect_title,
                redirect.target_title.as_deref().unwrap_or_default()
            );
        }
        self.append(UNCONNECTED_BODY_FILE, &body)?;
        info!(
            "Added unconnected target cases to report for {dbname} ({} entries)",
            cases.len()
        );
        Ok(())
    }

    /// Wraps the accumulated body rows into a complete wikitable.
    pub fn finish(&self) -> Result<()> {
        let body = fs::read_to_string(self.path(UNCONNECTED_BODY_FILE))
            .with_context(|| format!("Cannot read {UNCONNECTED_BODY_FILE}"))?;

        let utc: DateTime<Utc> = Utc::now();
        let mut table = format!("Last updated on {}.\n", utc.to_rfc2822());
        table += "{| class=\"wikitable\"\n";
        table += "|-\n";
        table += "! item !! project !! redirect !! unconnected target\n";
        table += &body;
        table += "|}";
        fs::write(self.path(UNCONNECTED_FILE), table)
            .with_context(|| format!("Cannot write {UNCONNECTED_FILE}"))?;

        info!("Finished up report for unconnected redirect target cases");
        Ok(())
    }
}

//________________________________________________________________________________________________________________________

/// One line of `cases.tsv`; optional columns render as empty cells.
pub(crate) fn case_tsv_row(dbname: &str, case: &SitelinkCase) -> String {
    let redirect = case.redirect.as_ref();
    let opt_u64 = |v: Option<u64>| v.map(|x| x.to_string()).unwrap_or_default();
    let opt_i64 = |v: Option<i64>| v.map(|x| x.to_string()).unwrap_or_default();
    let opt_str = |v: Option<&str>| v.unwrap_or_default().to_string();

    let columns: Vec<String> = vec![
        dbname.to_string(),
        opt_str(redirect.map(|r| r.redirect_qid.as_str())),
        opt_u64(redirect.map(|r| r.redirect_id)),
        opt_i64(redirect.map(|r| r.redirect_namespace)),
        opt_str(redirect.map(|r| r.redirect_title.as_str())),
        opt_u64(redirect.and_then(|r| r.target_id)),
        opt_i64(redirect.and_then(|r| r.target_namespace)),
        opt_str(redirect.and_then(|r| r.target_title.as_deref())),
        opt_str(redirect.and_then(|r| r.target_fragment.as_deref())),
        opt_str(redirect.and_then(|r| r.target_interwiki.as_deref())),
        opt_str(redirect.and_then(|r| r.target_qid.as_deref())),
        opt_str(case.s2r.as_ref().map(|b| b.sitelink_url.as_str())),
        opt_str(case.s2r.as_ref().map(|b| b.page_name.as_str())),
        opt_str(case.s2r.as_ref().map(|b| b.badge.qid())),
        opt_str(case.i2r.as_ref().map(|b| b.sitelink_url.as_str())),
        opt_str(case.i2r.as_ref().map(|b| b.page_name.as_str())),
        opt_str(case.i2r.as_ref().map(|b| b.badge.qid())),
    ];
    columns.join("\t") + "\n"
}

//________________________________________________________________________________________________________________________
