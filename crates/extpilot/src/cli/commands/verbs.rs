//! status, insert, update, publish and sign
//!
//! Each verb only offers the stores that implement it.

use clap::{Args, Subcommand};
use tracing::info;

use extpilot_stores::Verb;

use super::stores::{run_verb, ChromeArgs, EdgeArgs, FirefoxArgs, StoreTarget};
use crate::cli::Cli;

/// Show the current store listing
#[derive(Debug, Args)]
pub struct StatusCommand {
    #[command(subcommand)]
    pub store: StatusStore,
}

#[derive(Debug, Subcommand)]
pub enum StatusStore {
    /// Chrome Web Store draft item
    Chrome(ChromeArgs),
    /// addons.mozilla.org add-on details
    Firefox(FirefoxArgs),
}

impl StatusCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.store {
            StatusStore::Chrome(args) => StoreTarget::Chrome(args),
            StatusStore::Firefox(args) => StoreTarget::Firefox(args),
        };
        info!(store = %target.kind(), "executing status command");
        run_verb(cli, Verb::Status, target)
    }
}

/// Upload a package as a new item
#[derive(Debug, Args)]
pub struct InsertCommand {
    #[command(subcommand)]
    pub store: InsertStore,
}

#[derive(Debug, Subcommand)]
pub enum InsertStore {
    /// Create a Chrome Web Store item from a zip
    Chrome(ChromeArgs),
    /// Create an add-on, wait for validation and attach its source
    Firefox(FirefoxArgs),
}

impl InsertCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.store {
            InsertStore::Chrome(args) => StoreTarget::Chrome(args),
            InsertStore::Firefox(args) => StoreTarget::Firefox(args),
        };
        info!(store = %target.kind(), "executing insert command");
        run_verb(cli, Verb::Insert, target)
    }
}

/// Upload a new version of an existing item
#[derive(Debug, Args)]
pub struct UpdateCommand {
    #[command(subcommand)]
    pub store: UpdateStore,
}

#[derive(Debug, Subcommand)]
pub enum UpdateStore {
    /// Replace the Chrome Web Store draft package
    Chrome(ChromeArgs),
    /// Upload a draft package and wait for Edge to process it
    Edge(EdgeArgs),
    /// Upload a version, wait for validation and attach its source
    Firefox(FirefoxArgs),
}

impl UpdateCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.store {
            UpdateStore::Chrome(args) => StoreTarget::Chrome(args),
            UpdateStore::Edge(args) => StoreTarget::Edge(args),
            UpdateStore::Firefox(args) => StoreTarget::Firefox(args),
        };
        info!(store = %target.kind(), "executing update command");
        run_verb(cli, Verb::Update, target)
    }
}

/// Submit the uploaded draft for publication
#[derive(Debug, Args)]
pub struct PublishCommand {
    #[command(subcommand)]
    pub store: PublishStore,
}

#[derive(Debug, Subcommand)]
pub enum PublishStore {
    /// Publish the Chrome Web Store draft
    Chrome(ChromeArgs),
    /// Submit the Edge draft for certification
    Edge(EdgeArgs),
}

impl PublishCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.store {
            PublishStore::Chrome(args) => StoreTarget::Chrome(args),
            PublishStore::Edge(args) => StoreTarget::Edge(args),
        };
        info!(store = %target.kind(), "executing publish command");
        run_verb(cli, Verb::Publish, target)
    }
}

/// Have a package signed and download it
#[derive(Debug, Args)]
pub struct SignCommand {
    #[command(subcommand)]
    pub store: SignStore,
}

#[derive(Debug, Subcommand)]
pub enum SignStore {
    /// Sign an unlisted add-on through addons.mozilla.org
    Firefox(FirefoxArgs),
}

impl SignCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let target = match &self.store {
            SignStore::Firefox(args) => StoreTarget::Firefox(args),
        };
        info!(store = %target.kind(), "executing sign command");
        run_verb(cli, Verb::Sign, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_chrome_update_flags() {
        let cli = parse(&[
            "extpilot",
            "update",
            "chrome",
            "-a",
            "abcdefghijklmnop",
            "-f",
            "dist/ext.zip",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--refresh-token",
            "refresh",
        ])
        .unwrap();

        let Commands::Update(UpdateCommand {
            store: UpdateStore::Chrome(args),
        }) = cli.command
        else {
            panic!("expected chrome update");
        };
        assert_eq!(args.package.app.as_deref(), Some("abcdefghijklmnop"));
        assert_eq!(args.package.file, Some(PathBuf::from("dist/ext.zip")));
        assert_eq!(args.package.source, None);
        assert_eq!(args.refresh_token, "refresh");
    }

    #[test]
    fn test_firefox_long_flags() {
        let cli = parse(&[
            "extpilot",
            "insert",
            "firefox",
            "--file",
            "ext.zip",
            "--source",
            "src.zip",
            "--client-id",
            "user:1",
            "--client-secret",
            "secret",
        ])
        .unwrap();

        let Commands::Insert(InsertCommand {
            store: InsertStore::Firefox(args),
        }) = cli.command
        else {
            panic!("expected firefox insert");
        };
        assert_eq!(args.package.source, Some(PathBuf::from("src.zip")));
        assert_eq!(args.download_dir, None);
    }

    #[test]
    fn test_verbs_only_offer_supporting_stores() {
        let creds = ["--client-id", "id", "--client-secret", "secret"];

        let mut edge_status = vec!["extpilot", "status", "edge", "-a", "x"];
        edge_status.extend(creds);
        assert!(parse(&edge_status).is_err());

        let mut firefox_publish = vec!["extpilot", "publish", "firefox", "-a", "x"];
        firefox_publish.extend(creds);
        assert!(parse(&firefox_publish).is_err());

        let mut chrome_sign = vec!["extpilot", "sign", "chrome", "-f", "x.zip"];
        chrome_sign.extend(creds);
        assert!(parse(&chrome_sign).is_err());

        let mut edge_publish = vec![
            "extpilot",
            "publish",
            "edge",
            "-a",
            "x",
            "--access-token-url",
            "https://login.test/token",
        ];
        edge_publish.extend(creds);
        assert!(parse(&edge_publish).is_ok());
    }

    #[test]
    fn test_missing_credentials_is_a_usage_error() {
        let err = parse(&[
            "extpilot",
            "sign",
            "firefox",
            "-f",
            "ext.zip",
            "--client-id",
            "user:1",
        ]);
        // FIREFOX_CLIENT_SECRET may be set in the environment running the tests
        if std::env::var_os("FIREFOX_CLIENT_SECRET").is_none() {
            let err = err.unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        }
    }
}
