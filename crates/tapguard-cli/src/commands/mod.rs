//! CLI command handlers
//!
//! Each handler writes its report to the supplied writer so it can be exercised against an
//! in-memory buffer.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use tapguard_attendance::{
    AttendanceAuthenticator, DecisionSummary, Page, PageRenderer, PlainTextRenderer,
    TapCounterLedger, TapRequest,
};
use tapguard_core::{LockScope, ScanFailurePolicy, TagIdentity, TapGuardConfig};
use tapguard_effects::{JsonlAttendanceLog, SystemClock};
use tracing::info;

/// Arguments for `tap`
#[derive(Args, Debug, Clone)]
pub struct TapArgs {
    /// Full URL emitted by the tag
    #[arg(long, conflicts_with_all = ["data", "cmac"])]
    pub url: Option<String>,

    /// Hex ciphertext from the `data` parameter
    #[arg(long)]
    pub data: Option<String>,

    /// Integrity code from the `cmac` parameter
    #[arg(long, requires = "data")]
    pub cmac: Option<String>,

    /// Print the page and decision as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `history`
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Tag identity, 14 hex digits
    #[arg(long)]
    pub uid: String,
}

#[derive(Serialize)]
struct TapReport<'a> {
    page: &'a Page,
    decision: Option<DecisionSummary>,
}

/// `check-config`: print a redacted summary of a validated configuration
pub fn check_config(config: &TapGuardConfig, out: &mut impl Write) -> Result<()> {
    let scope = match config.locks.scope {
        LockScope::Global => "global",
        LockScope::PerTag => "per-tag",
    };
    let policy = match config.ledger.scan_failure {
        ScanFailurePolicy::FailClosed => "fail-closed",
        ScanFailurePolicy::FailOpen => "fail-open",
    };
    writeln!(out, "configuration ok")?;
    writeln!(out, "  secret_key      <redacted>")?;
    writeln!(
        out,
        "  integrity code  {}",
        if config.enforces_integrity() { "enforced" } else { "stored unverified" }
    )?;
    writeln!(out, "  log             {}", config.log.path.display())?;
    writeln!(out, "  lock scope      {scope}")?;
    writeln!(out, "  lock wait       {} ms", config.locks.wait_ms)?;
    writeln!(out, "  scan failure    {policy}")?;
    if config.ledger.scan_failure == ScanFailurePolicy::FailOpen {
        writeln!(out, "  warning: fail-open admits replays while the log is unreadable")?;
    }
    Ok(())
}

/// `tap`: authenticate one tap against the configured log
pub async fn tap(config: &TapGuardConfig, args: &TapArgs, out: &mut impl Write) -> Result<()> {
    let request = match (&args.url, &args.data) {
        (Some(url), _) => TapRequest::from_url(url),
        (None, Some(data)) => {
            let mut pairs = vec![("data", data.as_str())];
            if let Some(cmac) = &args.cmac {
                pairs.push(("cmac", cmac.as_str()));
            }
            TapRequest::from_query(pairs)
        }
        (None, None) => bail!("either --url or --data is required"),
    };

    let (page, decision) = match request {
        Ok(request) => {
            let log = JsonlAttendanceLog::new(&config.log.path);
            let authenticator =
                AttendanceAuthenticator::from_config(config, log, SystemClock::new());
            let decision = authenticator.authenticate(&request).await;
            (Page::for_decision(&decision), Some(decision.summary()))
        }
        Err(e) => (Page::for_request_error(&e), None),
    };

    if args.json {
        let report = TapReport {
            page: &page,
            decision,
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", PlainTextRenderer.render(&page))?;
    }
    Ok(())
}

/// `history`: list a tag's records ordered by counter
pub async fn history(
    config: &TapGuardConfig,
    args: &HistoryArgs,
    out: &mut impl Write,
) -> Result<()> {
    let uid = TagIdentity::parse(&args.uid).context("invalid --uid")?;
    let ledger = TapCounterLedger::new(
        JsonlAttendanceLog::new(&config.log.path),
        config.ledger.scan_failure,
    );
    let records = ledger.history(&uid).await?;

    writeln!(out, "{uid}: {} record(s)", records.len())?;
    for record in &records {
        let auth_tag = if record.auth_tag.is_empty() { "-" } else { record.auth_tag.as_str() };
        writeln!(
            out,
            "  {:>8}  {}  {}  {}",
            record.counter.value(),
            record.recorded_at.to_rfc3339(),
            record.record_id,
            auth_tag
        )?;
    }
    Ok(())
}

/// `rebuild`: rescan the log and print every tag's high-water mark
pub async fn rebuild(config: &TapGuardConfig, out: &mut impl Write) -> Result<()> {
    let ledger = TapCounterLedger::new(
        JsonlAttendanceLog::new(&config.log.path),
        config.ledger.scan_failure,
    );
    let marks = ledger.rebuild().await?;
    info!(tags = marks.len(), path = %config.log.path.display(), "Ledger rebuilt");

    for (uid, counter) in &marks {
        writeln!(out, "{uid}  {counter}")?;
    }
    writeln!(out, "{} tag(s)", marks.len())?;
    Ok(())
}
