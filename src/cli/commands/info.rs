use anyhow::{Context, Result};

use crate::config::Config;
use crate::fetch::info::fetch_info;
use crate::fetch::{CredentialSource, DownloadIntent};
use crate::ui::{report, Spinner};

/// Print title, uploader and duration; nothing is downloaded
pub async fn execute(intent: &DownloadIntent, config: &Config) -> Result<()> {
    let credential = match (&intent.cookies_file, intent.browser) {
        (Some(path), _) => Some(CredentialSource::CookieFile(path.clone())),
        (None, Some(browser)) => Some(CredentialSource::Browser(browser)),
        (None, None) => None,
    };

    let spinner = Spinner::new(config.redraw_interval());
    spinner.start("Getting media information...");
    let result = fetch_info(
        &config.binary,
        &intent.url,
        credential.as_ref(),
        config.inactivity_window(),
    )
    .await;

    let info = match result {
        Ok(info) => {
            spinner.stop(true, Some("Media information received"));
            info
        }
        Err(e) => {
            spinner.stop(false, None);
            return Err(e).context("Could not get media information");
        }
    };

    report::heading("Media Information");
    report::field("Title", &info.title);
    report::field("Author", info.uploader.as_deref().unwrap_or("unknown"));
    if let Some(duration) = info.duration_label() {
        report::field("Duration", duration);
    }
    println!();
    Ok(())
}
