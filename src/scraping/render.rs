//! Headless render fallback for script-heavy pages that serve too little
//! static HTML. Launches a Chromium-family browser, navigates with a light
//! stealth profile, nudges lazy content with a couple of scrolls, and runs
//! the captured DOM through the same text pipeline as static fetches.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Browser;
use futures::StreamExt;
use rand::prelude::*;
use tracing::{error, info, warn};

use crate::core::config::REQUEST_TIMEOUT_SECS;
use crate::core::types::{now_rfc3339, PageExtract};
use crate::scraping::fetch::random_user_agent;
use crate::scraping::parse;

/// Hide the automation flag and plant a minimal `chrome` runtime so naive
/// bot checks see a regular browser.
const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', {get: () => false});
window.navigator.chrome = { runtime: {} };
"#;

/// Find a usable Chromium-family browser executable.
///
/// Resolution order: `CHROME_EXECUTABLE` env var, PATH scan, then
/// OS-specific well-known install locations.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

fn build_render_config(exe: &str) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: 1280,
            height: 800,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(1280, 800)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--ignore-certificate-errors")
        .arg(format!("--user-agent={}", random_user_agent()))
        .build()
        .map_err(|e| anyhow!("failed to build browser config: {}", e))
}

/// Re-fetch `url` through a headless browser and extract its settled content.
///
/// The browser is disposed on every exit path; callers treat any error as a
/// content-quality skip.
pub async fn fetch_with_js(url: &str) -> Result<PageExtract> {
    let exe = find_chrome_executable().ok_or_else(|| {
        anyhow!("no browser found; install Chromium or set CHROME_EXECUTABLE")
    })?;

    info!(url, browser = %exe, "render fallback starting");

    let config = build_render_config(&exe)?;
    let (mut browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow!("failed to launch browser ({}): {}", exe, e))?;

    let _handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                error!("browser handler error: {}", e);
            }
        }
    });

    let result: Result<PageExtract> = async {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open page: {}", e))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_INIT_SCRIPT,
        ))
        .await
        .map_err(|e| anyhow!("failed to inject init script: {}", e))?;

        tokio::time::timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            page.goto(url),
        )
        .await
        .map_err(|_| anyhow!("navigation timed out"))?
        .map_err(|e| anyhow!("navigation failed: {}", e))?;

        // Jittered settle time, then two small scrolls to trigger lazy loads.
        let settle_ms = rand::rng().random_range(1000..3000);
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;

        page.evaluate("window.scrollBy(0, 500)")
            .await
            .map_err(|e| anyhow!("scroll failed: {}", e))?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        page.evaluate("window.scrollBy(0, 1000)")
            .await
            .map_err(|e| anyhow!("scroll failed: {}", e))?;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let html = page
            .content()
            .await
            .map_err(|e| anyhow!("failed to capture page content: {}", e))?;

        let (title, text, language) = parse::extract_rendered(&html);
        Ok(PageExtract {
            title,
            text,
            language,
            timestamp: now_rfc3339(),
        })
    }
    .await;

    if let Err(e) = browser.close().await {
        warn!("browser close error (non-fatal): {}", e);
    }

    result
}
