//! Browser-driven evidence capture for one pass
//!
//! One Chrome instance per pass, released exactly once after the whole
//! dataset has been iterated. Each row gets a fresh page: navigate, wait a
//! fixed settle delay, then either screenshot the viewport (with an in-page
//! URL banner and a zoom-out so more content is visible) or serialize the
//! fully rendered markup verbatim.

use crate::{
    create_browser_config, utils, CaptureError, Config, DatasetKind, DeviceProfile, MasterRecord,
    OutputMode,
};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

pub struct CaptureSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    profile: DeviceProfile,
    mode: OutputMode,
    discriminator: Option<&'static str>,
    output_dir: PathBuf,
    mobile_user_agent: String,
    viewport: crate::Viewport,
    capture_timeout: Duration,
    settle_delay: Duration,
    relayout_delay: Duration,
    zoom_percent: u32,
}

impl CaptureSession {
    /// Launch the browser for one capture pass
    ///
    /// A launch failure is fatal for the pass; everything after this point is
    /// per-row and isolated.
    pub async fn launch(
        config: &Config,
        profile: DeviceProfile,
        mode: OutputMode,
        kind: DatasetKind,
        output_dir: PathBuf,
        pass_label: &str,
    ) -> Result<Self, CaptureError> {
        let browser_config = create_browser_config(config, profile, pass_label)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler stream carries Chrome DevTools Protocol traffic and
        // must be polled for the browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser handler error: {}", e);
                    break;
                }
            }
            debug!("Browser handler stream ended");
        });

        info!("Browser launched for pass {}", pass_label);

        Ok(Self {
            browser,
            handler_task,
            profile,
            mode,
            discriminator: kind.discriminator(),
            output_dir,
            mobile_user_agent: config.mobile_user_agent.clone(),
            viewport: config.viewport(profile).clone(),
            capture_timeout: config.capture_timeout,
            settle_delay: config.settle_delay,
            relayout_delay: config.relayout_delay,
            zoom_percent: config.zoom_percent,
        })
    }

    /// Capture one row; any error here is per-row, never pass-fatal
    ///
    /// The page handle is held outside the row timeout and closed on every
    /// branch. Dropping the handle does not close the browser target, so a
    /// timed-out row would otherwise leave a live tab in the shared browser
    /// for the rest of the pass.
    pub async fn capture_row(&self, record: &MasterRecord) -> Result<PathBuf, CaptureError> {
        let page = self
            .browser
            .new_page(record.url.as_str())
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;

        let result = match timeout(self.capture_timeout, self.render_and_save(&page, record)).await
        {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Timeout(self.capture_timeout)),
        };

        let _ = page.close().await;
        result
    }

    async fn render_and_save(
        &self,
        page: &Page,
        record: &MasterRecord,
    ) -> Result<PathBuf, CaptureError> {
        self.apply_device_profile(page).await?;

        // Fixed-wait policy: target pages are adversarial, a readiness
        // signal could be evaded
        sleep(self.settle_delay).await;

        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        let path = self.output_dir.join(self.output_filename(record, &title));

        match self.mode {
            OutputMode::Screenshot => {
                self.inject_url_banner(page, &record.url).await?;
                self.apply_zoom(page).await?;
                sleep(self.relayout_delay).await;

                let params = ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build();
                let data = page
                    .screenshot(params)
                    .await
                    .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
                tokio::fs::write(&path, &data).await?;
            }
            OutputMode::Html => {
                // Rendered DOM after script execution, verbatim
                let markup = page
                    .content()
                    .await
                    .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
                tokio::fs::write(&path, markup).await?;
            }
        }

        debug!("Saved {}", path.display());
        Ok(path)
    }

    async fn apply_device_profile(&self, page: &Page) -> Result<(), CaptureError> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.viewport.width as i64)
            .height(self.viewport.height as i64)
            .device_scale_factor(self.viewport.device_scale_factor)
            .mobile(self.viewport.mobile)
            .build()
            .map_err(CaptureError::PageError)?;
        page.execute(metrics)
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;

        if self.profile == DeviceProfile::Mobile {
            let user_agent = SetUserAgentOverrideParams::builder()
                .user_agent(self.mobile_user_agent.clone())
                .build()
                .map_err(CaptureError::PageError)?;
            page.execute(user_agent)
                .await
                .map_err(|e| CaptureError::PageError(e.to_string()))?;
        }

        Ok(())
    }

    /// Fixed-position banner showing the literal URL, for evidentiary
    /// traceability
    ///
    /// This is the single banner strategy in use; there is no post-capture
    /// composite step, so evidence is never double-annotated.
    async fn inject_url_banner(&self, page: &Page, url: &str) -> Result<(), CaptureError> {
        // Serialize as a JSON string so arbitrary URLs cannot break out of
        // the script literal
        let url_literal = serde_json::to_string(url)?;
        let script = format!(
            r#"
            var urlBanner = document.createElement('div');
            urlBanner.style.position = 'fixed';
            urlBanner.style.top = '0';
            urlBanner.style.left = '0';
            urlBanner.style.width = '100%';
            urlBanner.style.padding = '10px';
            urlBanner.style.backgroundColor = '#f0f0f0';
            urlBanner.style.color = '#000';
            urlBanner.style.zIndex = '999999';
            urlBanner.style.fontSize = '20px';
            urlBanner.style.fontWeight = 'bold';
            urlBanner.style.fontFamily = 'sans-serif';
            urlBanner.style.boxShadow = '0 2px 5px rgba(0,0,0,0.2)';
            urlBanner.style.textAlign = 'center';
            urlBanner.innerText = {url_literal};
            document.body.appendChild(urlBanner);
            "#
        );

        page.evaluate(script)
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;
        Ok(())
    }

    async fn apply_zoom(&self, page: &Page) -> Result<(), CaptureError> {
        let script = format!("document.body.style.zoom='{}%'", self.zoom_percent);
        page.evaluate(script)
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;
        Ok(())
    }

    /// `{timestamp}_{safe(domain)}_{safe(title)}.{ext}`, with an extra
    /// discriminator segment for the domain-oriented dataset so both dataset
    /// variants can share one output folder
    fn output_filename(&self, record: &MasterRecord, title: &str) -> String {
        let stamp = utils::evidence_timestamp();
        let safe_domain = utils::sanitize_filename(&record.domain);
        let safe_title = utils::sanitize_filename(title);
        let ext = self.mode.extension();

        match self.discriminator {
            Some(tag) => format!("{stamp}_{tag}_{safe_domain}_{safe_title}.{ext}"),
            None => format!("{stamp}_{safe_domain}_{safe_title}.{ext}"),
        }
    }

    /// Release the browser; called exactly once per pass, after the whole
    /// dataset has been iterated
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            error!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        info!("Browser released");
    }
}
