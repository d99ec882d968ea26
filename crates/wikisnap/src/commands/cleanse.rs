//! Cleanse command

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use wikisnap_backup::{DeleteRules, PathEnumerator, TraversalOptions};
use wikisnap_core::{BackupConfig, ConfigFile};

use crate::output;

#[derive(Args, Debug)]
pub struct CleanseArgs {
    /// Root to cleanse (defaults to the configured wiki)
    pub path: Option<Utf8PathBuf>,

    /// Traversal options file (YAML or JSON) with `path`, `ignore` and `delete` keys
    #[arg(long, conflicts_with = "path")]
    pub options: Option<Utf8PathBuf>,

    /// Delete files with this extension (repeatable)
    #[arg(short, long = "ext")]
    pub extensions: Vec<String>,

    /// Delete files whose root-relative path matches this glob (repeatable)
    #[arg(short, long = "pattern")]
    pub patterns: Vec<String>,

    /// Skip paths starting with this prefix (repeatable)
    #[arg(short, long)]
    pub ignore: Vec<String>,

    /// Only list what would be deleted
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

fn load_options(path: &Utf8Path) -> Result<PathEnumerator> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path))?;
    let value: serde_json::Value = if path.extension() == Some("json") {
        serde_json::from_str(&text)?
    } else {
        serde_yaml_ng::from_str(&text)?
    };
    Ok(PathEnumerator::from_value(&value)?)
}

pub async fn run(args: CleanseArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let mut enumerator = match &args.options {
        Some(file) => load_options(file)?,
        None => {
            let root = match args.path {
                Some(path) => path,
                None => {
                    BackupConfig::load(config_path, ConfigFile::default())
                        .context("Failed to load configuration")?
                        .src
                }
            };
            let rules = DeleteRules {
                extensions: args.extensions.clone(),
                patterns: args.patterns.clone(),
            };
            PathEnumerator::new(
                TraversalOptions::new(root.into_std_path_buf())
                    .with_ignore(args.ignore.clone())
                    .with_delete_rules(rules),
            )?
        }
    };

    output::header("Cleanse");
    output::kv("Root", &enumerator.root().display().to_string());
    if enumerator.options().delete_rules.is_empty() {
        output::warning("No delete rules given; nothing to do");
        return Ok(());
    }
    if args.dry_run {
        output::warning("DRY RUN MODE - no files will be deleted");
    }

    let report = enumerator.cleanse(args.dry_run)?;
    for path in &report.deleted {
        println!("  {}", console::style(path.display()).dim());
    }
    for failure in &report.failures {
        output::warning(&format!("{}: {}", failure.path.display(), failure.reason));
    }

    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    output::success(&format!("{} {} files", verb, report.deleted.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("diary")).unwrap();
        fs::write(root.join("index.wiki"), "index").unwrap();
        fs::write(root.join("index.wiki.bak"), "old").unwrap();
        fs::write(root.join("diary").join("notes.bak"), "old").unwrap();
        (temp, root)
    }

    fn args(path: Option<Utf8PathBuf>) -> CleanseArgs {
        CleanseArgs {
            path,
            options: None,
            extensions: vec!["bak".to_string()],
            patterns: vec![],
            ignore: vec![],
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn test_cleanse_by_extension() {
        let (_temp, root) = tree();
        run(args(Some(root.clone())), None).await.unwrap();

        assert!(root.join("index.wiki").exists());
        assert!(!root.join("index.wiki.bak").exists());
        assert!(!root.join("diary").join("notes.bak").exists());
    }

    #[tokio::test]
    async fn test_dry_run_keeps_files() {
        let (_temp, root) = tree();
        let mut args = args(Some(root.clone()));
        args.dry_run = true;
        run(args, None).await.unwrap();

        assert!(root.join("index.wiki.bak").exists());
    }

    #[tokio::test]
    async fn test_options_file() {
        let (temp, root) = tree();
        let options = Utf8PathBuf::try_from(temp.path().join("cleanse.yaml")).unwrap();
        fs::write(
            &options,
            format!("path: {}\nignore:\n  - {}/diary\ndelete:\n  filetype: [bak]\n", root, root),
        )
        .unwrap();

        let args = CleanseArgs {
            path: None,
            options: Some(options),
            extensions: vec![],
            patterns: vec![],
            ignore: vec![],
            dry_run: false,
        };
        run(args, None).await.unwrap();

        assert!(!root.join("index.wiki.bak").exists());
        assert!(root.join("diary").join("notes.bak").exists());
    }
}
