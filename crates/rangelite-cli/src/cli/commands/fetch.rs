//! `rangelite fetch <url>` – one probe, progressive fetch and composite cycle.

use anyhow::{bail, Context, Result};
use rangelite_core::compositor::{decode_data_uri, extension_for};
use rangelite_core::config::LiteConfig;
use rangelite_core::fetch::{forward, CurlOptions, CurlTransport};
use rangelite_core::intercept::{InterceptedRequest, ResourceType};
use rangelite_core::page::StaticPage;
use rangelite_core::session::{ImageState, Session};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Flags that override config for this run.
#[derive(Debug, Clone, Default)]
pub struct FetchOverrides {
    pub fraction: Option<f64>,
    pub no_reflect: bool,
    pub no_rewrite: bool,
}

impl FetchOverrides {
    pub fn apply(&self, cfg: &mut LiteConfig) {
        if let Some(fraction) = self.fraction {
            cfg.fraction = fraction;
        }
        if self.no_reflect {
            cfg.reflect = false;
        }
        if self.no_rewrite {
            cfg.rewrite = false;
        }
    }
}

/// Runs the full pipeline for `url` against a one-element page. The image URL
/// doubles as the navigation URL, so an error status fails the run.
pub async fn run_fetch(
    mut cfg: LiteConfig,
    url: &str,
    overrides: FetchOverrides,
    out: Option<&Path>,
) -> Result<()> {
    overrides.apply(&mut cfg);
    cfg.validate()?;
    // A single image is always intercepted, whatever the config says.
    cfg.intercept = true;

    let page = Arc::new(StaticPage::new());
    let img = page.insert_img(url);
    let transport = Arc::new(CurlTransport::new(CurlOptions {
        connect_timeout: Some(Duration::from_secs(30)),
        max_redirections: Some(10),
    }));
    let session = Session::new(url, cfg, transport.clone(), page.clone());

    let request = InterceptedRequest::new(url, "GET", ResourceType::Image);
    let decision = session.on_request(&request);
    let response = forward(transport.as_ref(), &request, &decision)
        .await
        .context("probe request")?;
    println!("probe: HTTP {}", response.status);
    session.on_response(&response);
    session.settle().await;

    let report = session.finish()?;
    let record = report
        .records
        .first()
        .context("image request was not intercepted")?;
    println!(
        "fetch: {} target={} state={:?}",
        record.replaced_url,
        record
            .target_bytes
            .map(|t| format!("bytes=0-{}", t))
            .unwrap_or_else(|| "-".to_string()),
        record.state
    );
    if record.state != ImageState::Applied {
        bail!("image was not applied (state {:?})", record.state);
    }

    let src = page
        .attribute(img, "src")
        .context("element lost its src attribute")?;
    let (mime, bytes) = decode_data_uri(&src)?;
    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("reflection.{}", extension_for(&mime))));
    fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {} ({} bytes, {})", path.display(), bytes.len(), mime);
    Ok(())
}
