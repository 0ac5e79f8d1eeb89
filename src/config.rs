use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Run configuration, loadable from a JSON file.
///
/// Every key is optional in the file. Values given on the command line win
/// over file values (see [`Config::merge`]). The legacy key names
/// `copyright_` and `desc` are accepted as aliases.
///
/// # Loading
///
/// ```rust,no_run
/// use seo_meta::config::Config;
///
/// let config = Config::load("seo-meta.json".as_ref()).unwrap();
/// let record = config.metadata_record().unwrap();
/// println!("Writing '{}' by {}", record.title(), record.author());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files or directories to process.
    pub inputs: Vec<PathBuf>,
    pub author: Option<String>,
    #[serde(alias = "copyright_")]
    pub copyright: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "desc")]
    pub description: Option<String>,
    pub keywords: Option<Keywords>,
    /// Descend into sub-directories.
    pub recursive: bool,
    /// Output directory (default: `output/` next to each source).
    pub outdir: Option<PathBuf>,
    /// Replace the source files in place.
    pub overwrite: bool,
    /// Worker count (default: available cores).
    pub workers: Option<usize>,
}

/// Keywords as either a JSON list or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    List(Vec<String>),
    Joined(String),
}

impl Keywords {
    /// Trimmed, non-empty keywords in their original order.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(list) => list
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            Self::Joined(joined) => joined
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Config {
    /// Load config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// A starter file for `--init`: every key present, metadata left blank.
    pub fn template() -> Self {
        Self {
            inputs: vec![PathBuf::from(".")],
            author: Some(String::new()),
            copyright: Some(String::new()),
            title: Some(String::new()),
            description: Some(String::new()),
            keywords: Some(Keywords::List(Vec::new())),
            recursive: false,
            outdir: None,
            overwrite: false,
            workers: Some(default_workers()),
        }
    }

    /// Layer `overrides` (usually the command line) on top of `self`.
    ///
    /// Options present in `overrides` replace ours; flags are OR-ed, so a
    /// flag set in either place stays set.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            inputs: if overrides.inputs.is_empty() { self.inputs } else { overrides.inputs },
            author: overrides.author.or(self.author),
            copyright: overrides.copyright.or(self.copyright),
            title: overrides.title.or(self.title),
            description: overrides.description.or(self.description),
            keywords: overrides.keywords.or(self.keywords),
            recursive: self.recursive || overrides.recursive,
            outdir: overrides.outdir.or(self.outdir),
            overwrite: self.overwrite || overrides.overwrite,
            workers: overrides.workers.or(self.workers),
        }
    }

    /// Validate the five metadata fields and build the record.
    pub fn metadata_record(&self) -> Result<MetadataRecord> {
        MetadataRecord::new(
            self.author.clone().unwrap_or_default(),
            self.copyright.clone().unwrap_or_default(),
            self.title.clone().unwrap_or_default(),
            self.description.clone().unwrap_or_default(),
            self.keywords.as_ref().map(Keywords::to_vec).unwrap_or_default(),
        )
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            output_dir: self.outdir.clone(),
            overwrite: self.overwrite,
            workers: self.workers.unwrap_or_else(default_workers).max(1),
        }
    }
}

/// The metadata stamped into every image of a run.
///
/// All five fields are guaranteed non-empty; build one through
/// [`MetadataRecord::new`] or [`Config::metadata_record`].
///
/// ```rust
/// use seo_meta::config::MetadataRecord;
///
/// let record = MetadataRecord::new(
///     "Ada",
///     "© Ada",
///     "Harbour at dusk",
///     "Boats moored in the old harbour",
///     vec!["harbour".into(), "dusk".into()],
/// )
/// .unwrap();
/// assert_eq!(record.keywords().join(";"), "harbour;dusk");
///
/// assert!(MetadataRecord::new("", "©", "t", "d", vec![]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    author: String,
    copyright: String,
    title: String,
    description: String,
    keywords: Vec<String>,
}

impl MetadataRecord {
    pub fn new(
        author: impl Into<String>,
        copyright: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        keywords: Vec<String>,
    ) -> Result<Self> {
        let record = Self {
            author: author.into(),
            copyright: copyright.into(),
            title: title.into(),
            description: description.into(),
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        };

        let mut missing = Vec::new();
        for (name, value) in [
            ("author", &record.author),
            ("copyright", &record.copyright),
            ("title", &record.title),
            ("description", &record.description),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if record.keywords.is_empty() {
            missing.push("keywords");
        }
        if !missing.is_empty() {
            anyhow::bail!("Missing required metadata: {}", missing.join(", "));
        }

        Ok(record)
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn copyright(&self) -> &str {
        &self.copyright
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Per-run options shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Output directory (default: `output/` next to each source).
    pub output_dir: Option<PathBuf>,
    /// Replace each source with its rewritten copy.
    pub overwrite: bool,
    /// Upper bound on files processed at once.
    pub workers: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            overwrite: false,
            workers: default_workers(),
        }
    }
}

/// Number of available cores, at least 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn full() -> Config {
        Config {
            inputs: vec![PathBuf::from("photos")],
            author: Some("Ada".into()),
            copyright: Some("© Ada".into()),
            title: Some("Lake".into()),
            description: Some("A lake".into()),
            keywords: Some(Keywords::Joined("lake, water".into())),
            ..Config::default()
        }
    }

    #[test]
    fn keywords_from_string_are_split_and_trimmed() {
        let kw = Keywords::Joined(" lake, ,山水 ,water ".into());
        assert_eq!(kw.to_vec(), vec!["lake", "山水", "water"]);
    }

    #[test]
    fn keywords_from_list_drop_blanks() {
        let kw = Keywords::List(vec!["a".into(), " ".into(), " b ".into()]);
        assert_eq!(kw.to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn parses_list_or_string_keywords_and_legacy_keys() {
        let json = r#"{
            "inputs": ["a", "b"],
            "author": "Ada",
            "copyright_": "© Ada",
            "title": "T",
            "desc": "D",
            "keywords": ["x", "y"],
            "recursive": true,
            "workers": 3
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.copyright.as_deref(), Some("© Ada"));
        assert_eq!(config.description.as_deref(), Some("D"));
        assert_eq!(config.keywords, Some(Keywords::List(vec!["x".into(), "y".into()])));
        assert!(config.recursive);
        assert_eq!(config.workers, Some(3));

        let config: Config = serde_json::from_str(r#"{"keywords": "x, y"}"#).unwrap();
        assert_eq!(config.keywords, Some(Keywords::Joined("x, y".into())));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overrides_win_and_flags_accumulate() {
        let file = Config { recursive: true, workers: Some(2), ..full() };
        let cli = Config {
            title: Some("From CLI".into()),
            overwrite: true,
            ..Config::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.title.as_deref(), Some("From CLI"));
        assert_eq!(merged.author.as_deref(), Some("Ada"));
        assert_eq!(merged.inputs, vec![PathBuf::from("photos")]);
        assert!(merged.recursive);
        assert!(merged.overwrite);
        assert_eq!(merged.workers, Some(2));
    }

    #[test]
    fn cli_inputs_replace_file_inputs() {
        let cli = Config { inputs: vec![PathBuf::from("x.jpg")], ..Config::default() };
        assert_eq!(full().merge(cli).inputs, vec![PathBuf::from("x.jpg")]);
    }

    #[test]
    fn metadata_record_reports_every_missing_field() {
        let config = Config {
            author: Some("Ada".into()),
            title: Some("   ".into()),
            keywords: Some(Keywords::Joined(" , ".into())),
            ..Config::default()
        };
        let err = config.metadata_record().unwrap_err().to_string();
        assert_eq!(
            err,
            "Missing required metadata: copyright, title, description, keywords"
        );
    }

    #[test]
    fn record_drops_blank_keywords() {
        let record =
            MetadataRecord::new("Ada", "© Ada", "T", "D", vec!["a".into(), " ".into(), " b ".into()])
                .unwrap();
        assert_eq!(record.keywords().join(";"), "a;b");
    }

    #[test]
    fn metadata_record_from_full_config() {
        let record = full().metadata_record().unwrap();
        assert_eq!(record.author(), "Ada");
        assert_eq!(record.keywords(), &["lake".to_string(), "water".to_string()]);
    }

    #[test]
    fn run_options_clamp_workers() {
        let options = Config { workers: Some(0), ..full() }.run_options();
        assert_eq!(options.workers, 1);
        assert!(full().run_options().workers >= 1);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seo-meta.json");
        let config = full();
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(&dir.path().join("absent.json")).is_err());
    }
}
