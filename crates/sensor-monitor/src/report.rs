//! Plain-text reports for the operator CLI.

use acquisition::{
    AttackReport, ConfidenceSource, ConsensusResult, Explanation, HealthStatus, HistoryStats,
    StreamHealth, Threshold,
};

pub fn format_health(health: &HealthStatus) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Backend: {}", health.status));
    match health.models {
        Some(models) => {
            let flag = |up: bool| if up { "loaded" } else { "missing" };
            lines.push(format!("  SVM: {}", flag(models.svm)));
            lines.push(format!("  LSTM: {}", flag(models.lstm)));
            lines.push(format!("  Battery: {}", flag(models.battery)));
        }
        None => lines.push("  Models: not reported".to_string()),
    }
    lines.join("\n")
}

pub fn format_stats(stats: Option<&HistoryStats>, threshold: Threshold) -> String {
    let Some(stats) = stats else {
        return "No data available for analysis".to_string();
    };

    let mut lines = Vec::new();
    lines.push("=== History ===".to_string());
    lines.push(format!(
        "  Samples: {}  Anomalies: {}  Normal: {}",
        stats.total_readings, stats.anomaly_count, stats.normal_count
    ));
    lines.push(format!(
        "  Detection rate: {:.1}%  Avg score: {:.2}  Threshold: {}",
        stats.detection_rate,
        stats.avg_score,
        threshold.value()
    ));
    lines.push(String::new());

    lines.push("-- Channels --".to_string());
    for c in &stats.channels {
        lines.push(format!(
            "  {:<20} min {:>10.3}  max {:>10.3}  avg {:>10.3}  range {:>10.3}",
            c.channel.to_string(),
            c.min,
            c.max,
            c.avg,
            c.range
        ));
    }
    lines.push(format!("  Most volatile: {}", stats.most_volatile));

    lines.join("\n")
}

pub fn format_stream_health(health: &StreamHealth) -> String {
    let mut line = format!(
        "Stream: {} ({} cycles, {} failed, {:.0}% failure rate)",
        health.level,
        health.total_cycles,
        health.total_failures,
        health.failure_rate() * 100.0
    );
    if let Some(err) = &health.last_error {
        line.push_str(&format!("\n  Last error: {err}"));
    }
    line
}

pub fn format_consensus(result: &ConsensusResult) -> String {
    let mut lines = Vec::new();
    lines.push("=== Model Comparison ===".to_string());
    lines.push(format!(
        "Completed: {}",
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(format!(
        "Window: readings #{}..#{} ({} readings)",
        result.window.first_sequence, result.window.last_sequence, result.window.len
    ));
    lines.push(String::new());

    for v in &result.verdicts {
        let marker = match v.confidence_source {
            ConfidenceSource::Native => "",
            ConfidenceSource::Placeholder => "*",
        };
        lines.push(format!(
            "  {:<22} {:<8} score {:>8.2}  confidence {:>5.1}%{}  {:<16} {} (took {}ms)",
            v.label,
            if v.is_anomaly { "ANOMALY" } else { "normal" },
            v.normalized_score,
            v.confidence,
            marker,
            v.method,
            v.nominal_response_time,
            v.observed_latency.as_millis()
        ));
    }
    lines.push(String::new());

    let verdict = if result.is_confirmed_anomaly() {
        "all models agree: ANOMALY"
    } else if result.agreement {
        "all models agree: normal"
    } else {
        "conflicting verdicts"
    };
    lines.push(format!(
        "Votes: {}/{}  ({})",
        result.anomaly_votes,
        result.verdicts.len(),
        verdict
    ));
    if result
        .verdicts
        .iter()
        .any(|v| v.confidence_source == ConfidenceSource::Placeholder)
    {
        lines.push("* fixed placeholder confidence, not computed by the model".to_string());
    }

    lines.join("\n")
}

pub fn format_explanation(explanation: &Explanation) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== Anomaly #{} ===", explanation.sequence));
    lines.push(format!(
        "  Score: {:.1}  Confidence: {:.1}%",
        explanation.anomaly_score, explanation.confidence
    ));

    if explanation.is_unexplained() {
        lines.push("  No feature attribution reported".to_string());
        return lines.join("\n");
    }

    lines.push("-- Top contributing sensors --".to_string());
    for c in &explanation.top {
        let a = &c.attribution;
        lines.push(format!(
            "  #{} {:<20} value {:>10.2}  {:>5.1}%{}  z {:>6.2}",
            c.rank,
            a.feature,
            a.value,
            a.contribution,
            if c.high { " (high)" } else { "" },
            a.z_score
        ));
    }
    if !explanation.remaining.is_empty() {
        let rest: Vec<String> = explanation
            .remaining
            .iter()
            .map(|a| format!("{}={:.1}%", a.feature, a.contribution))
            .collect();
        lines.push(format!("  Others: {}", rest.join(", ")));
    }

    lines.join("\n")
}

pub fn format_attack(report: &AttackReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== Attack comparison: {} ===", report.kind.label()));
    lines.push(format!(
        "  Attack samples: {}  Normal samples: {}",
        report.attack_samples, report.normal_samples
    ));
    lines.push(format!(
        "  SVM detected {}/{} ({:.0}%)",
        report.detected,
        report.classified,
        report.detection_rate()
    ));
    if report.failed > 0 {
        lines.push(format!(
            "  {} classification(s) failed and counted as missed",
            report.failed
        ));
    }
    lines.push(String::new());

    lines.push("-- Channel averages (normal → attack) --".to_string());
    for c in &report.channels {
        let ratio = c
            .ratio()
            .map(|r| format!("x{r:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "  {:<20} {:>10.3} → {:>10.3}  {}",
            c.channel.to_string(),
            c.normal,
            c.attack,
            ratio
        ));
    }

    lines.join("\n")
}
