//! Delivery report consumer.
//!
//! Drains the forwarder's report stream until it closes. Failures are logged
//! at error level; successes are only counted.

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument, Span};

use crate::telemetry::Stats;

use super::item::Report;
use super::Reports;

/// Totals seen by a consumer over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub delivered: u64,
    pub failed: u64,
}

pub struct ReportConsumer {
    reports: Reports,
    stats: Arc<Stats>,
    span: Span,
}

impl ReportConsumer {
    pub fn new(reports: Reports, stats: Arc<Stats>) -> Self {
        Self {
            reports,
            stats,
            span: info_span!("reports"),
        }
    }

    /// Consume reports until the forwarder closes the stream.
    pub async fn run(mut self) -> ReportSummary {
        let span = self.span.clone();

        async move {
            let mut summary = ReportSummary::default();

            while let Some(report) = self.reports.recv().await {
                self.handle(&report, &mut summary);
            }

            info!(
                delivered = summary.delivered,
                failed = summary.failed,
                "report stream closed"
            );
            summary
        }
        .instrument(span)
        .await
    }

    fn handle(&self, report: &Report, summary: &mut ReportSummary) {
        if report.is_success() {
            summary.delivered += 1;
            self.stats.inc_delivered();
        } else {
            summary.failed += 1;
            self.stats.inc_failed();
            error!(code = report.code, "{}", report.status);
        }
    }
}
