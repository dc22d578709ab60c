//! Minimal CLI parsing for the query runner.

use std::env;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    /// Entity to query, by table or entity name
    pub entity: Option<String>,
    /// Query string, e.g. `page=1&pageSize=5&sort[price]=DESC`
    pub query: String,
    /// Look up a single record instead of listing
    pub id: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = || inline.clone().or_else(|| args.next());
            match flag.as_str() {
                "--entity" | "-e" => options.entity = value(),
                "--query" | "-q" => options.query = value().unwrap_or_default(),
                "--id" => options.id = value(),
                _ => {}
            }
        }
        options
    }
}
