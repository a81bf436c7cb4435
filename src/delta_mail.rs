//! Continuously email delta reports for tagged scan tasks.
//!
//! Every cycle: list tasks carrying the configured tag; for each task,
//! take its two newest finished reports, render the delta (new findings
//! only) as CSV, mail it, and mark the newest report with the sent tag.
//! A task that cannot be processed is logged and skipped; the loop keeps
//! running either way.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gvmops_gmp::transport::GmpTransport;
use gvmops_gmp::types::{CSV_RESULTS_FORMAT_ID, Task};
use gvmops_gmp::GmpClient;
use gvmops_smtp::types::{Attachment, SmtpResult};
use gvmops_smtp::{MessageBuilder, SmtpClient};
use tracing::{debug, info, warn};

use crate::config::MailerSettings;
use crate::error::ToolError;

const REPORT_ATTACHMENT_NAME: &str = "delta_report.csv";
const DELTA_FILTER: &str = "delta_states=n";

/// What happened to one task in one cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Delta mailed and the newest report tagged.
    Sent { report_id: String },
    /// Fewer than two finished reports; nothing to diff.
    SkippedFewReports,
    /// The newest report already carries the sent tag.
    SkippedAlreadySent,
    /// Something failed; the task is retried on a later cycle.
    Failed(String),
}

/// Seam for the actual mail submission, so the cycle logic can be
/// exercised without a relay.
#[async_trait]
pub trait ReportMailer: Send {
    async fn send_report(&mut self, csv: &[u8]) -> SmtpResult<()>;
}

/// Production mailer: one SMTP session per report.
pub struct SmtpReportMailer<'a> {
    settings: &'a MailerSettings,
}

impl<'a> SmtpReportMailer<'a> {
    pub fn new(settings: &'a MailerSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ReportMailer for SmtpReportMailer<'_> {
    async fn send_report(&mut self, csv: &[u8]) -> SmtpResult<()> {
        let mut builder = MessageBuilder::new()
            .from(self.settings.from.clone())
            .subject(self.settings.subject.clone())
            .text("See the attached delta report.")
            .attachment(Attachment::new(
                REPORT_ATTACHMENT_NAME,
                "application/octet-stream",
                csv,
            ));
        for addr in &self.settings.to {
            builder = builder.to(addr.clone());
        }
        let message = builder.build()?;

        let mut client = SmtpClient::new(self.settings.smtp.smtp_config());
        client.establish(&self.settings.smtp.credentials()).await?;
        client.send_message(&message).await?;
        client.quit().await?;
        Ok(())
    }
}

/// Run one cycle over all tagged tasks.
pub async fn run_cycle<T: GmpTransport, M: ReportMailer>(
    gmp: &mut GmpClient<T>,
    mailer: &mut M,
    settings: &MailerSettings,
) -> Result<Vec<(Task, TaskOutcome)>, ToolError> {
    debug!("retrieving task list");
    let tasks = gmp.get_tasks(&format!("tag={}", settings.task_tag)).await?;
    info!(
        "found {} task(s) with tag {:?}",
        tasks.len(),
        settings.task_tag
    );

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        info!("processing task {:?} ({})", task.name, task.id);
        let outcome = process_task(gmp, mailer, settings, &task).await;
        match &outcome {
            TaskOutcome::Sent { report_id } => {
                info!("  delta for report {} has been mailed", report_id)
            }
            TaskOutcome::SkippedFewReports => {
                info!("  delta reporting requires at least 2 finished reports")
            }
            TaskOutcome::SkippedAlreadySent => {
                info!("  delta for the latest finished report was already sent")
            }
            TaskOutcome::Failed(reason) => warn!("  skipping task: {}", reason),
        }
        outcomes.push((task, outcome));
    }
    Ok(outcomes)
}

/// Process a single task; every failure is folded into the outcome.
pub async fn process_task<T: GmpTransport, M: ReportMailer>(
    gmp: &mut GmpClient<T>,
    mailer: &mut M,
    settings: &MailerSettings,
    task: &Task,
) -> TaskOutcome {
    let filter = format!("task_id={} and status=Done sort-reverse=date", task.id);
    let reports = match gmp.get_reports(&filter).await {
        Ok(reports) => reports,
        Err(e) => return TaskOutcome::Failed(format!("listing reports: {}", e)),
    };
    debug!("  found {} finished report(s)", reports.len());

    if reports.len() < 2 {
        return TaskOutcome::SkippedFewReports;
    }
    if reports[0].has_tag(&settings.sent_tag) {
        return TaskOutcome::SkippedAlreadySent;
    }

    let csv = match gmp
        .get_delta_report(
            &reports[0].id,
            &reports[1].id,
            DELTA_FILTER,
            CSV_RESULTS_FORMAT_ID,
        )
        .await
    {
        Ok(csv) => csv,
        Err(e) => return TaskOutcome::Failed(format!("fetching delta report: {}", e)),
    };

    if let Err(e) = mailer.send_report(&csv).await {
        return TaskOutcome::Failed(format!("sending email: {}", e));
    }

    // Not transactional with the send: a crash right here re-sends this
    // delta on the next cycle.
    match gmp
        .create_tag(
            &settings.sent_tag,
            "report",
            &reports[0].id,
            &Utc::now().to_rfc3339(),
        )
        .await
    {
        Ok(_) => TaskOutcome::Sent {
            report_id: reports[0].id.clone(),
        },
        Err(e) => TaskOutcome::Failed(format!("tagging report as sent: {}", e)),
    }
}

/// The forever loop: run a cycle, wait the configured interval, repeat.
/// Drift accumulates by execution time; there is no wall-clock alignment.
pub async fn run<T: GmpTransport, M: ReportMailer>(
    gmp: &mut GmpClient<T>,
    mailer: &mut M,
    settings: &MailerSettings,
) -> Result<(), ToolError> {
    info!(
        "entering loop with interval {} minutes",
        settings.interval_minutes
    );
    loop {
        if let Err(e) = run_cycle(gmp, mailer, settings).await {
            warn!("cycle failed: {}", e);
        }
        info!(
            "check will be repeated in {} minutes",
            settings.interval_minutes
        );
        tokio::time::sleep(Duration::from_secs(settings.interval_minutes * 60)).await;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
