use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use nightshift_types::UsageReading;
use regex::Regex;
use serde::Deserialize;

use crate::error::{UsageReadError, UsageResult};

fn clamp_pct(pct: f64) -> UsageResult<f64> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(UsageReadError::OutOfRange(pct));
    }
    Ok(pct)
}

#[async_trait]
pub trait UsageAdapter: Send + Sync {
    fn provider(&self) -> &str;

    /// Upper bound the oracle should place on `fetch`. `None` means
    /// unbounded — a pure local file read that never blocks on an external
    /// process or network call.
    fn timeout(&self) -> Option<std::time::Duration> {
        None
    }

    async fn fetch(&self) -> UsageResult<UsageReading>;
}

/// Returns a fixed reading (or a fixed error) on every call. Used for tests
/// and for the Budget Governor's own test doubles further up the stack.
pub struct CannedAdapter {
    provider: String,
    result: Result<UsageReading, UsageReadError>,
}

impl CannedAdapter {
    pub fn ok(provider: impl Into<String>, reading: UsageReading) -> Self {
        Self {
            provider: provider.into(),
            result: Ok(reading),
        }
    }

    pub fn err(provider: impl Into<String>, error: UsageReadError) -> Self {
        Self {
            provider: provider.into(),
            result: Err(error),
        }
    }
}

#[async_trait]
impl UsageAdapter for CannedAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn fetch(&self) -> UsageResult<UsageReading> {
        self.result.clone()
    }
}

// -- Claude-style: per-session JSON transcripts + optional TUI scrape -------

#[derive(Debug, Deserialize)]
struct TranscriptMessage {
    #[serde(default)]
    usage: Option<TranscriptUsage>,
}

#[derive(Debug, Deserialize)]
struct TranscriptUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Parses per-session JSON transcript files under `transcripts_dir` for local
/// token totals, and optionally consults a TUI scrape result (obtained by an
/// injected function that launches/polls a terminal-multiplexer session
/// running the "/usage" slash command) for the server-reported weekly
/// percentage and reset label.
pub struct ClaudeAdapter {
    pub provider: String,
    pub transcripts_dir: PathBuf,
    pub scrape: Option<Box<dyn Fn() -> UsageResult<ScrapeResult> + Send + Sync>>,
}

pub struct ScrapeResult {
    pub weekly_pct: f64,
    pub weekly_reset: Option<DateTime<Utc>>,
}

impl ClaudeAdapter {
    pub fn new(provider: impl Into<String>, transcripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider: provider.into(),
            transcripts_dir: transcripts_dir.into(),
            scrape: None,
        }
    }

    async fn local_totals(&self) -> UsageResult<(u64, u64)> {
        if !self.transcripts_dir.exists() {
            return Err(UsageReadError::FileNotFound("transcripts directory".into()));
        }
        let mut entries = tokio::fs::read_dir(&self.transcripts_dir)
            .await
            .map_err(|e| UsageReadError::FileRead(e.to_string()))?;

        let mut daily = 0u64;
        let mut weekly = 0u64;
        let today = Utc::now().date_naive();
        let week_start = today - chrono::Duration::days(today.weekday().num_days_from_monday() as i64);

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| UsageReadError::FileRead(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);
            let Some(modified) = modified else { continue };
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| UsageReadError::FileRead(e.to_string()))?;
            let messages: Vec<TranscriptMessage> = serde_json::from_str(&raw)
                .map_err(|e| UsageReadError::Parse(e.to_string()))?;
            let tokens: u64 = messages
                .iter()
                .filter_map(|m| m.usage.as_ref())
                .map(|u| u.input_tokens + u.output_tokens)
                .sum();

            if modified.date_naive() >= week_start {
                weekly += tokens;
            }
            if modified.date_naive() == today {
                daily += tokens;
            }
        }

        Ok((daily, weekly))
    }
}

#[async_trait]
impl UsageAdapter for ClaudeAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    /// 45s when a TUI scrape is configured (launching and polling a
    /// terminal-multiplexer session); unbounded when `fetch` only reads
    /// local transcript files.
    fn timeout(&self) -> Option<std::time::Duration> {
        self.scrape.is_some().then(|| std::time::Duration::from_secs(45))
    }

    async fn fetch(&self) -> UsageResult<UsageReading> {
        let (local_daily, local_weekly) = self.local_totals().await?;

        let (weekly_pct, weekly_reset) = match &self.scrape {
            Some(scrape) => {
                let result = scrape()?;
                (clamp_pct(result.weekly_pct)?, result.weekly_reset)
            }
            None => (0.0, None),
        };

        Ok(UsageReading {
            provider: self.provider.clone(),
            session_pct: weekly_pct,
            weekly_pct,
            local_weekly,
            local_daily,
            session_reset: weekly_reset,
            weekly_reset,
        })
    }
}

// -- Codex-style: JSONL event stream with rate_limits objects ---------------

#[derive(Debug, Deserialize)]
struct CodexEvent {
    #[serde(default)]
    rate_limits: Option<CodexRateLimits>,
}

#[derive(Debug, Deserialize)]
struct CodexRateLimits {
    primary: CodexWindow,
    secondary: CodexWindow,
}

#[derive(Debug, Deserialize)]
struct CodexWindow {
    used_percent: f64,
    #[serde(default)]
    #[allow(dead_code)]
    window_minutes: u64,
    resets_at: i64,
}

/// Parses a JSONL event log, taking the most recent `rate_limits` object.
/// `primary` is the 5h session window, `secondary` the weekly window.
pub struct CodexAdapter {
    pub provider: String,
    pub jsonl_path: PathBuf,
}

impl CodexAdapter {
    pub fn new(provider: impl Into<String>, jsonl_path: impl Into<PathBuf>) -> Self {
        Self {
            provider: provider.into(),
            jsonl_path: jsonl_path.into(),
        }
    }
}

#[async_trait]
impl UsageAdapter for CodexAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn fetch(&self) -> UsageResult<UsageReading> {
        if !self.jsonl_path.exists() {
            return Err(UsageReadError::FileNotFound("rate limit log".into()));
        }
        let raw = tokio::fs::read_to_string(&self.jsonl_path)
            .await
            .map_err(|e| UsageReadError::FileRead(e.to_string()))?;

        let mut latest: Option<CodexRateLimits> = None;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: CodexEvent = serde_json::from_str(line)
                .map_err(|e| UsageReadError::Parse(e.to_string()))?;
            if let Some(limits) = event.rate_limits {
                latest = Some(limits);
            }
        }

        let Some(limits) = latest else {
            return Err(UsageReadError::Parse("no rate_limits event found".into()));
        };

        let session_pct = clamp_pct(limits.primary.used_percent)?;
        let weekly_pct = clamp_pct(limits.secondary.used_percent)?;

        Ok(UsageReading {
            provider: self.provider.clone(),
            session_pct,
            weekly_pct,
            local_weekly: 0,
            local_daily: 0,
            session_reset: Utc.timestamp_opt(limits.primary.resets_at, 0).single(),
            weekly_reset: Utc.timestamp_opt(limits.secondary.resets_at, 0).single(),
        })
    }
}

// -- Ollama-style: authenticated HTML scrape --------------------------------

/// Scrapes a settings page HTML body for usage percentage and reset date,
/// authenticating with cookies read from a Netscape cookies file. The cookie
/// file path and its contents are never surfaced in error text.
pub struct OllamaAdapter {
    pub provider: String,
    pub settings_url: String,
    pub cookies_path: PathBuf,
    pub client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new(provider: impl Into<String>, settings_url: impl Into<String>, cookies_path: impl Into<PathBuf>) -> Self {
        Self {
            provider: provider.into(),
            settings_url: settings_url.into(),
            cookies_path: cookies_path.into(),
            client: reqwest::Client::new(),
        }
    }

    fn read_cookie_header(path: &Path) -> UsageResult<String> {
        let raw = std::fs::read_to_string(path).map_err(|_| UsageReadError::FileRead("cookie jar".into()))?;
        let pairs: Vec<String> = raw
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .filter_map(|l| {
                let fields: Vec<&str> = l.split('\t').collect();
                if fields.len() >= 7 {
                    Some(format!("{}={}", fields[5], fields[6]))
                } else {
                    None
                }
            })
            .collect();
        Ok(pairs.join("; "))
    }
}

#[async_trait]
impl UsageAdapter for OllamaAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn timeout(&self) -> Option<std::time::Duration> {
        Some(std::time::Duration::from_secs(30))
    }

    async fn fetch(&self) -> UsageResult<UsageReading> {
        let cookie_header = Self::read_cookie_header(&self.cookies_path)?;

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            self.client
                .get(&self.settings_url)
                .header("Cookie", cookie_header)
                .send(),
        )
        .await
        .map_err(|_| UsageReadError::Timeout(std::time::Duration::from_secs(30)))?
        .map_err(|_| UsageReadError::Http("request failed".into()))?;

        let body = response
            .text()
            .await
            .map_err(|_| UsageReadError::Http("body read failed".into()))?;

        let pct_re = Regex::new(r"(\d{1,3}(?:\.\d+)?)\s*%").unwrap();
        let reset_re = Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:Z|[+-]\d{2}:\d{2})").unwrap();

        let pct = pct_re
            .captures(&body)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .ok_or_else(|| UsageReadError::Parse("no percentage found".into()))?;
        let pct = clamp_pct(pct)?;

        let reset = reset_re
            .find(&body)
            .and_then(|m| DateTime::parse_from_rfc3339(m.as_str()).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(UsageReading {
            provider: self.provider.clone(),
            session_pct: pct,
            weekly_pct: pct,
            local_weekly: 0,
            local_daily: 0,
            session_reset: reset,
            weekly_reset: reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_types::BudgetMode;

    #[tokio::test]
    async fn canned_adapter_returns_fixed_reading() {
        let reading = UsageReading {
            provider: "claude".into(),
            session_pct: 10.0,
            weekly_pct: 20.0,
            local_weekly: 500,
            local_daily: 50,
            session_reset: None,
            weekly_reset: None,
        };
        let adapter = CannedAdapter::ok("claude", reading);
        let fetched = adapter.fetch().await.unwrap();
        assert_eq!(fetched.pct_for(BudgetMode::Weekly), 20.0);
    }

    #[test]
    fn clamp_pct_rejects_out_of_range() {
        assert!(clamp_pct(101.0).is_err());
        assert!(clamp_pct(-1.0).is_err());
        assert!(clamp_pct(50.0).is_ok());
    }
}
