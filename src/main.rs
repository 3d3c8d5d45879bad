use clap::Parser;
use msix_release_uploader::config::{Options, REPOSITORY_ENV, TOKEN_ENV};
use msix_release_uploader::upload::upload;

/// msix-release-uploader - Microsoft Store packages to GitHub releases
///
/// Finds the latest MSIX packages of a Microsoft Store app and uploads the ones
/// missing from the GitHub release whose tag matches the package version.
///
/// Examples:
///   msix-release-uploader --store-id 9NF7JTB3B17P --token $GITHUB_TOKEN
///   msix-release-uploader --store-id 9NF7JTB3B17P --asset-name-pattern "App_{version}_{arch}"
#[derive(Parser, Debug)]
#[command(author, version = env!("MSIX_UPLOADER_VERSION"), about)]
struct Cli {
    /// The ID of the Microsoft Store app to upload, e.g. "9NF7JTB3B17P"
    #[arg(long = "store-id", value_name = "ID")]
    store_id: String,

    /// The GitHub token to use
    #[arg(long, env = TOKEN_ENV, hide_env_values = true, value_name = "TOKEN")]
    token: String,

    /// Do not perform the actual upload. For testing
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Asset name without file extension, may contain "{version}" and "{arch}".
    /// For "AppName_{version}_{arch}" an asset can be named "AppName_1.2.3.0_x64.Msix"
    #[arg(long = "asset-name-pattern", value_name = "PATTERN")]
    asset_name_pattern: Option<String>,

    /// The GitHub repository in the format "owner/repo"
    #[arg(long, env = REPOSITORY_ENV, value_name = "OWNER/REPO")]
    repository: Option<String>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", hide = true)]
    api_url: Option<String>,

    /// Store display catalog URL
    #[arg(long = "catalog-url", value_name = "URL", hide = true)]
    catalog_url: Option<String>,

    /// Store delivery service URL
    #[arg(long = "delivery-url", value_name = "URL", hide = true)]
    delivery_url: Option<String>,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Options {
            store_id: cli.store_id,
            token: Some(cli.token),
            repository: cli.repository,
            asset_name_pattern: cli.asset_name_pattern,
            dry_run: cli.dry_run,
            api_url: cli.api_url,
            catalog_url: cli.catalog_url,
            delivery_url: cli.delivery_url,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = msix_release_uploader::runtime::RealRuntime;

    if cli.dry_run {
        println!("This is a dry run, so the files won't be uploaded.");
        println!();
    }

    if let Err(e) = upload(runtime, cli.into()).await {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
