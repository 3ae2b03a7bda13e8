use serde_json::Value;
use std::env;
use std::fs::File;

/// Restricts a run to the dbnames given on the command line; no arguments
/// means all projects.  Flag-style arguments are ignored.
pub fn wiki_filter_from_args<I: Iterator<Item = String>>(args: I) -> Vec<String> {
    args.skip(1) // the actual command
        .filter(|arg| !arg.starts_with('-'))
        .collect()
}

/// # Panics
/// Panics if the config file can not be opened or parsed.
pub fn get_bot_config() -> Value {
    let basedir = env::current_dir()
        .expect("Can't get CWD")
        .to_str()
        .expect("Can't convert CWD to_str")
        .to_string();
    let path = basedir.to_owned() + "/config.json";
    let file =
        File::open(&path).unwrap_or_else(|_| panic!("Can not open config file at {}", &path));
    let bot_config: Value =
        serde_json::from_reader(file).expect("Can not parse JSON from config file");
    bot_config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|s| s.to_string())
            .collect::<Vec<String>>()
            .into_iter()
    }

    #[test]
    fn test_wiki_filter_empty() {
        assert!(wiki_filter_from_args(args(&["redirect_badges_rs"])).is_empty());
    }

    #[test]
    fn test_wiki_filter_dbnames() {
        assert_eq!(
            wiki_filter_from_args(args(&["redirect_badges_rs", "enwiki", "dewiki"])),
            vec!["enwiki".to_string(), "dewiki".to_string()]
        );
    }

    #[test]
    fn test_wiki_filter_skips_flags() {
        assert_eq!(
            wiki_filter_from_args(args(&["redirect_badges_rs", "--verbose", "enwiki"])),
            vec!["enwiki".to_string()]
        );
    }
}
