//! Human-readable rendering of run results and plans.

use retention_core::types::{RetentionPlan, RetentionResult};

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Format a byte count with a binary unit, e.g. `1.50 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Render a completed run.
pub fn render(result: &RetentionResult) -> String {
    let mut lines = vec![
        "Backup retention report".to_string(),
        "=======================".to_string(),
        format!("Kept:        {}", result.kept.len()),
        format!("Deleted:     {}", result.deleted.len()),
        format!("Failed:      {}", result.errors.len()),
    ];
    if !result.skipped.is_empty() {
        lines.push(format!("Skipped:     {} (run cancelled)", result.skipped.len()));
    }
    lines.push(format!(
        "Size before: {} ({} bytes)",
        format_bytes(result.total_size_before),
        result.total_size_before
    ));
    lines.push(format!(
        "Size after:  {} ({} bytes)",
        format_bytes(result.total_size_after),
        result.total_size_after
    ));
    lines.push(format!(
        "Reclaimed:   {} ({} bytes)",
        format_bytes(result.space_saved_bytes()),
        result.space_saved_bytes()
    ));

    if !result.errors.is_empty() {
        lines.push(String::new());
        lines.push("Failures:".to_string());
        for error in &result.errors {
            lines.push(format!("  - {}: {}", error.key, error.message));
        }
    }

    lines.join("\n")
}

/// Render a dry-run plan.
pub fn render_plan(plan: &RetentionPlan) -> String {
    let mut lines = vec![
        "Backup retention plan (dry run)".to_string(),
        "===============================".to_string(),
        format!("Would keep:    {}", plan.kept.len()),
        format!("Would delete:  {}", plan.to_delete.len()),
        format!(
            "Would reclaim: {} ({} bytes)",
            format_bytes(plan.space_to_reclaim()),
            plan.space_to_reclaim()
        ),
    ];

    if !plan.to_delete.is_empty() {
        lines.push(String::new());
        lines.push("Deletion candidates:".to_string());
        for candidate in &plan.to_delete {
            lines.push(format!(
                "  - {} ({}, {}, {})",
                candidate.backup.file_name,
                candidate.backup.created_at.format("%Y-%m-%d %H:%M UTC"),
                format_bytes(candidate.backup.size_bytes),
                candidate.reason
            ));
        }
    }

    lines.join("\n")
}
