//! Playwright browser automation
//!
//! A long-lived Node.js process hosts Playwright and keeps one page open.
//! The harness talks to it over stdin/stdout with newline-delimited JSON:
//! every request carries an `id`, and the matching response echoes it.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{BrowserLauncher, ElementProbe, PageDriver, ScreenshotRequest};
use crate::config::{BrowserConfig, Viewport};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::StageStep;

/// Environment variable carrying the launch options to the driver script
const CONFIG_ENV: &str = "MOCKCHECK_DRIVER_CONFIG";

/// How long `close` waits for the driver to exit on its own
const CLOSE_GRACE: Duration = Duration::from_secs(5);

const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

const DRIVER_SCRIPT: &str = r#"
const readline = require('readline');

const config = JSON.parse(process.env.MOCKCHECK_DRIVER_CONFIG || '{}');
let browser;
let page;

function send(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function classify(err) {
  if (err && err.name === 'TimeoutError') return 'timeout';
  const message = err && err.message ? err.message : String(err);
  if (/is not a valid selector|Unexpected token|Unexpected end|while parsing|SyntaxError/.test(message)) return 'selector';
  return 'driver';
}

const UNRENDERED = 'script, style, noscript, template';

function visible(el) {
  if (!el.isConnected) return false;
  const style = window.getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
}

const handlers = {
  async set_viewport({ width, height }) {
    await page.setViewportSize({ width, height });
    return null;
  },

  async navigate({ url, timeoutMs }) {
    let response;
    try {
      response = await page.goto(url, { waitUntil: 'load', timeout: timeoutMs });
    } catch (err) {
      err.kind = 'navigation';
      throw err;
    }
    if (response && !response.ok() && response.status() !== 0) {
      const err = new Error(`HTTP ${response.status()} for ${url}`);
      err.kind = 'navigation';
      throw err;
    }
    return null;
  },

  async wait_for({ selector, timeoutMs }) {
    await page.waitForSelector(selector, { state: 'visible', timeout: timeoutMs });
    return null;
  },

  async probe({ selector }) {
    return page.locator(selector).evaluateAll((nodes, visibleSrc) => {
      const visible = new Function('return ' + visibleSrc)();
      return { matched: nodes.length, visible: nodes.filter(visible).length };
    }, visible.toString());
  },

  async style({ selector, property }) {
    const values = await page.locator(selector).evaluateAll((nodes, property) =>
      nodes.slice(0, 1).map((el) => window.getComputedStyle(el).getPropertyValue(property)),
    property);
    return values.length ? values[0] : null;
  },

  async text({ text, exact, caseSensitive }) {
    return page.evaluate(([text, exact, caseSensitive, visibleSrc, unrendered]) => {
      const visible = new Function('return ' + visibleSrc)();
      const norm = (s) => {
        const collapsed = (s || '').replace(/\s+/g, ' ').trim();
        return caseSensitive ? collapsed : collapsed.toLowerCase();
      };
      const needle = norm(text);
      for (const el of document.body ? document.body.querySelectorAll('*') : []) {
        // innerText falls back to raw textContent for unrendered elements
        if (el.closest(unrendered) || !visible(el)) continue;
        const rendered = norm(el.innerText);
        if (exact ? rendered === needle : rendered.includes(needle)) return true;
      }
      return false;
    }, [text, exact, caseSensitive, visible.toString(), UNRENDERED]);
  },

  async stage({ step }) {
    const target = step.action === 'insert' ? step.anchor : step.selector;
    const applied = await page.locator(target).evaluateAll((els, step) => {
      switch (step.action) {
        case 'set_style':
          els.forEach((el) => el.style.setProperty(step.property, step.value));
          return els.length;
        case 'set_text':
          els.forEach((el) => { el.textContent = step.text; });
          return els.length;
        case 'add_class':
          els.forEach((el) => el.classList.add(step.class));
          return els.length;
        case 'remove_class':
          els.forEach((el) => el.classList.remove(step.class));
          return els.length;
        case 'remove':
          els.forEach((el) => el.remove());
          return els.length;
        case 'insert': {
          const anchor = els[0];
          if (!anchor) return 0;
          const el = document.createElement(step.tag);
          if (step.class) el.className = step.class;
          if (step.text) el.textContent = step.text;
          if (step.style) el.style.cssText = step.style;
          if (step.position === 'before') anchor.before(el);
          else if (step.position === 'append') anchor.append(el);
          else anchor.after(el);
          return 1;
        }
        default:
          throw new Error('unknown stage action ' + step.action);
      }
    }, step);
    if (applied === 0) {
      throw new Error(`no element matches ${target}`);
    }
    return applied;
  },

  async screenshot({ fullPage, selector, timeoutMs }) {
    const buffer = selector
      ? await page.locator(selector).first().screenshot({ type: 'png', timeout: timeoutMs })
      : await page.screenshot({ type: 'png', fullPage, timeout: timeoutMs });
    return buffer.toString('base64');
  },

  async close() {
    if (browser) await browser.close();
    browser = undefined;
    return null;
  },
};

async function main() {
  try {
    const playwright = require('playwright');
    browser = await playwright[config.browser || 'chromium'].launch({ headless: config.headless !== false });
    const contextOptions = config.viewport ? { viewport: config.viewport } : {};
    const context = await browser.newContext(contextOptions);
    page = await context.newPage();
    send({ ready: true });
  } catch (err) {
    send({ ready: false, error: err && err.message ? err.message : String(err) });
    process.exit(1);
  }

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const request = JSON.parse(line);
    try {
      const value = await handlers[request.op](request);
      send({ id: request.id, ok: true, value });
    } catch (err) {
      send({
        id: request.id,
        ok: false,
        kind: err.kind || classify(err),
        error: err && err.message ? err.message : String(err),
      });
    }
    if (request.op === 'close') break;
  }
  if (browser) await browser.close();
  process.exit(0);
}

main();
"#;

/// Launch options handed to the driver script
#[derive(Debug, Serialize)]
struct DriverLaunchConfig<'a> {
    browser: &'a str,
    headless: bool,
    viewport: Option<Viewport>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op<'a> {
    SetViewport {
        width: u32,
        height: u32,
    },
    Navigate {
        url: &'a str,
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },
    WaitFor {
        selector: &'a str,
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },
    Probe {
        selector: &'a str,
    },
    Style {
        selector: &'a str,
        property: &'a str,
    },
    Text {
        text: &'a str,
        exact: bool,
        #[serde(rename = "caseSensitive")]
        case_sensitive: bool,
    },
    Stage {
        step: &'a StageStep,
    },
    Screenshot {
        #[serde(rename = "fullPage")]
        full_page: bool,
        selector: Option<&'a str>,
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },
    Close,
}

impl Op<'_> {
    fn name(&self) -> &'static str {
        match self {
            Op::SetViewport { .. } => "set_viewport",
            Op::Navigate { .. } => "navigate",
            Op::WaitFor { .. } => "wait_for",
            Op::Probe { .. } => "probe",
            Op::Style { .. } => "style",
            Op::Text { .. } => "text",
            Op::Stage { .. } => "stage",
            Op::Screenshot { .. } => "screenshot",
            Op::Close => "close",
        }
    }

    /// Selector the request is about, for error reporting
    fn selector(&self) -> Option<&str> {
        match self {
            Op::WaitFor { selector, .. } | Op::Probe { selector } | Op::Style { selector, .. } => {
                Some(*selector)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    op: &'a Op<'a>,
}

#[derive(Debug, Deserialize)]
struct Ready {
    ready: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Launches Playwright driver processes
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher;

impl PlaywrightLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Check that node and the playwright package are reachable
    pub async fn check_installed(node_command: &str) -> HarnessResult<String> {
        let version = Command::new(node_command)
            .arg("--version")
            .output()
            .await
            .map_err(|e| map_spawn_error(e, node_command))?;
        if !version.status.success() {
            return Err(HarnessError::SessionLaunch(format!(
                "'{} --version' exited with {}",
                node_command, version.status
            )));
        }

        let check = Command::new(node_command)
            .arg("-e")
            .arg(PLAYWRIGHT_CHECK_SCRIPT)
            .output()
            .await?;
        if !check.status.success() || check.stdout != b"ok" {
            return Err(HarnessError::SessionLaunch(
                "Playwright npm package is missing; install with `npm install playwright && npx playwright install`"
                    .to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&version.stdout).trim().to_string())
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, config: &BrowserConfig) -> HarnessResult<Box<dyn PageDriver>> {
        let driver = PlaywrightDriver::spawn(config).await?;
        Ok(Box::new(driver))
    }
}

/// One driver process with one page
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
}

impl PlaywrightDriver {
    pub async fn spawn(config: &BrowserConfig) -> HarnessResult<Self> {
        let launch = DriverLaunchConfig {
            browser: config.kind.as_str(),
            headless: config.headless,
            viewport: config.viewport,
        };

        let mut cmd = Command::new(&config.node_command);
        cmd.arg("-e")
            .arg(DRIVER_SCRIPT)
            .env(CONFIG_ENV, serde_json::to_string(&launch)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| map_spawn_error(e, &config.node_command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HarnessError::SessionLaunch("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::SessionLaunch("driver stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mockcheck::driver", "{}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            closed: false,
        };

        let timeout = Duration::from_millis(config.launch_timeout_ms);
        match tokio::time::timeout(timeout, driver.read_ready()).await {
            Ok(Ok(())) => {
                info!(
                    "Playwright {} driver ready (pid: {:?})",
                    config.kind.as_str(),
                    driver.child.id()
                );
                Ok(driver)
            }
            Ok(Err(e)) => {
                driver.terminate().await;
                Err(e)
            }
            Err(_) => {
                driver.terminate().await;
                Err(HarnessError::SessionLaunch(format!(
                    "driver did not become ready within {} ms",
                    config.launch_timeout_ms
                )))
            }
        }
    }

    async fn read_ready(&mut self) -> HarnessResult<()> {
        let line = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| HarnessError::SessionLaunch("driver exited before ready".into()))?;
        let ready: Ready = serde_json::from_str(&line).map_err(|_| {
            HarnessError::SessionLaunch(format!("unexpected driver output: {}", line.trim()))
        })?;
        if ready.ready {
            Ok(())
        } else {
            Err(HarnessError::SessionLaunch(map_launch_message(
                ready.error.as_deref().unwrap_or("unknown error"),
            )))
        }
    }

    async fn request(&mut self, op: &Op<'_>) -> HarnessResult<serde_json::Value> {
        if self.closed {
            return Err(HarnessError::SessionReleased);
        }

        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&Request { id, op })?;
        line.push('\n');

        debug!("driver request #{} {}", id, op.name());
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| HarnessError::Driver(format!("driver stdin closed: {}", e)))?;
        self.stdin.flush().await?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| HarnessError::Driver("driver process exited".into()))?;
            let response: Response = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(_) => {
                    debug!(target: "mockcheck::driver", "{}", line);
                    continue;
                }
            };
            if response.id != id {
                // left over from a request whose caller was cancelled
                debug!("discarding stale driver response #{}", response.id);
                continue;
            }
            if response.ok {
                return Ok(response.value);
            }
            return Err(map_driver_error(op, response));
        }
    }

    /// SIGTERM, then kill, then reap
    async fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
            }
        }

        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()> {
        self.request(&Op::SetViewport {
            width: viewport.width,
            height: viewport.height,
        })
        .await?;
        Ok(())
    }

    async fn navigate(&mut self, uri: &str, timeout: Duration) -> HarnessResult<()> {
        self.request(&Op::Navigate {
            url: uri,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
        .map_err(|e| match e {
            e @ HarnessError::Navigation { .. } => e,
            other => HarnessError::Navigation {
                uri: uri.to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> HarnessResult<()> {
        self.request(&Op::WaitFor {
            selector,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn probe(&mut self, selector: &str) -> HarnessResult<ElementProbe> {
        let value = self.request(&Op::Probe { selector }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn computed_style(
        &mut self,
        selector: &str,
        property: &str,
    ) -> HarnessResult<Option<String>> {
        let value = self.request(&Op::Style { selector, property }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn text_present(
        &mut self,
        text: &str,
        exact: bool,
        case_sensitive: bool,
    ) -> HarnessResult<bool> {
        let value = self
            .request(&Op::Text {
                text,
                exact,
                case_sensitive,
            })
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn stage(&mut self, step: &StageStep) -> HarnessResult<()> {
        self.request(&Op::Stage { step }).await?;
        Ok(())
    }

    async fn screenshot(&mut self, request: &ScreenshotRequest) -> HarnessResult<Vec<u8>> {
        let value = self.request(&screenshot_op(request)).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| HarnessError::Driver("screenshot response was not a string".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| HarnessError::Driver(format!("screenshot payload: {}", e)))
    }

    async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = tokio::time::timeout(CLOSE_GRACE, self.request(&Op::Close)).await;
        self.closed = true;

        match result {
            Ok(Ok(_)) => {
                if tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await.is_err() {
                    warn!("Driver did not exit after close; terminating");
                    self.terminate().await;
                }
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Driver close failed: {}; terminating", e);
                self.terminate().await;
                Ok(())
            }
            Err(_) => {
                warn!("Driver close timed out; terminating");
                self.terminate().await;
                Ok(())
            }
        }
    }
}

fn map_spawn_error(err: std::io::Error, command: &str) -> HarnessError {
    if err.kind() == std::io::ErrorKind::NotFound {
        HarnessError::SessionLaunch(format!(
            "Unable to spawn Playwright driver; '{}' was not found on PATH",
            command
        ))
    } else {
        HarnessError::SessionLaunch(format!("Failed to spawn {}: {}", command, err))
    }
}

fn map_launch_message(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        "Playwright npm package is missing; install with `npm install playwright`".to_string()
    } else if lower.contains("executable doesn't exist") {
        "Browser binaries are missing; install with `npx playwright install`".to_string()
    } else {
        message.to_string()
    }
}

/// Playwright reads a zero timeout as "wait forever"
fn screenshot_op(request: &ScreenshotRequest) -> Op<'_> {
    Op::Screenshot {
        full_page: request.full_page,
        selector: request.selector.as_deref(),
        timeout_ms: (request.timeout.as_millis() as u64).max(1),
    }
}

fn map_driver_error(op: &Op<'_>, response: Response) -> HarnessError {
    let message = response.error.unwrap_or_else(|| "unknown driver error".to_string());
    match (response.kind.as_deref(), op) {
        (Some("selector"), _) if op.selector().is_some() => HarnessError::InvalidSelector {
            selector: op.selector().unwrap_or_default().to_string(),
            reason: message,
        },
        (Some("navigation"), Op::Navigate { url, .. }) => HarnessError::Navigation {
            uri: url.to_string(),
            reason: message,
        },
        (Some("timeout"), Op::WaitFor { selector, timeout_ms }) => HarnessError::Timeout {
            what: format!("selector {}", selector),
            timeout_ms: *timeout_ms,
        },
        _ => HarnessError::Driver(format!("{} failed: {}", op.name(), message)),
    }
}
