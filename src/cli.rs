use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "routemap",
    version,
    about = "Endpoint catalog extractor",
    after_help = r#"Examples:
  routemap ./webapp
  routemap -framework=spring ./service
  routemap -json ./site.war
  routemap -path-list-file=projects.txt -simple
"#
)]
pub struct Args {
    /// Project directory or source archive to catalog.
    pub target: Option<PathBuf>,

    /// File naming one target per line; `#` starts a comment.
    #[arg(long)]
    pub path_list_file: Option<PathBuf>,

    /// Framework: jsp, spring, rails, django, mvc, webforms, struts, detect.
    #[arg(long, default_value = "detect")]
    pub framework: String,

    /// Raise the log level to debug.
    #[arg(long)]
    pub debug: bool,

    /// Emit the endpoint catalog as JSON.
    #[arg(long)]
    pub json: bool,

    /// Expand variants inline with per-parameter detail.
    #[arg(long)]
    pub lint: bool,

    /// Print `METHOD path` lines only.
    #[arg(long)]
    pub simple: bool,
}

const SINGLE_DASH_FLAGS: &[&str] = &[
    "-framework",
    "-path-list-file",
    "-debug",
    "-json",
    "-lint",
    "-simple",
];

/// Accepts the historical single-dash flag spelling (`-framework=spring`)
/// alongside the conventional double-dash form.
pub fn normalize_args(argv: impl IntoIterator<Item = String>) -> Vec<String> {
    argv.into_iter()
        .map(|arg| {
            let known = SINGLE_DASH_FLAGS.iter().any(|flag| {
                arg == *flag || arg.starts_with(&format!("{flag}="))
            });
            if known { format!("-{arg}") } else { arg }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Vec<String> {
        let mut full = vec!["routemap".to_string()];
        full.extend(argv.iter().map(|s| s.to_string()));
        normalize_args(full)
    }

    #[test]
    fn single_dash_flags_are_accepted() {
        let parsed = Args::parse_from(args(&["-framework=rails", "-debug", "app"]));
        assert_eq!(parsed.framework, "rails");
        assert!(parsed.debug);
        assert_eq!(parsed.target.unwrap().to_string_lossy(), "app");
    }

    #[test]
    fn double_dash_flags_still_work() {
        let parsed = Args::parse_from(args(&["--framework", "jsp", "--json", "site"]));
        assert_eq!(parsed.framework, "jsp");
        assert!(parsed.json);
    }

    #[test]
    fn unknown_single_dash_is_untouched() {
        let normalized = args(&["-unknown"]);
        assert!(normalized.contains(&"-unknown".to_string()));
    }
}
