use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::filter::{FilterDimension, FilterState};
use crate::format::{format_count, format_number, format_percent, ratio};
use crate::pipeline::DashboardSnapshot;

fn dimension_label(dimension: FilterDimension) -> &'static str {
    match dimension {
        FilterDimension::Module => "modules",
        FilterDimension::Presentation => "presentations",
        FilterDimension::Region => "regions",
        FilterDimension::AgeBand => "age bands",
        FilterDimension::Education => "education levels",
        FilterDimension::Gender => "genders",
        FilterDimension::Disability => "disability",
    }
}

pub fn describe_filters(filters: &FilterState) -> String {
    let mut parts: Vec<String> = FilterDimension::ALL
        .iter()
        .filter(|dimension| !filters.values(**dimension).is_empty())
        .map(|dimension| {
            let values: Vec<&str> = filters.values(*dimension).iter().map(String::as_str).collect();
            format!("{}: {}", dimension_label(*dimension), values.join(", "))
        })
        .collect();

    if let Some(range) = filters.week_range {
        parts.push(format!("weeks {}", range));
    }

    if parts.is_empty() {
        "all students".to_string()
    } else {
        parts.join("; ")
    }
}

pub fn build_report(generated_at: DateTime<Utc>, snapshot: &DashboardSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Learning Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} for {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        describe_filters(&snapshot.filters)
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Overview");
    for line in &snapshot.insights.overview {
        let _ = writeln!(output, "- {}", line);
    }
    let _ = writeln!(
        output,
        "- 90th percentile: {} clicks, score {}",
        format_number(snapshot.percentiles.clicks_p90),
        format_number(snapshot.percentiles.scores_p90)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Module Outcomes");
    let _ = writeln!(output, "{}", snapshot.insights.modules);
    if !snapshot.module_outcome.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "| Module | Presentation | Pass | Fail | Withdrawn | Distinction | Pass rate |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for row in &snapshot.module_outcome {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} |",
                row.code_module,
                row.code_presentation,
                row.pass,
                row.fail,
                row.withdrawn,
                row.distinction,
                format_percent(ratio(row.pass + row.distinction, row.total()))
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Activity");
    let _ = writeln!(output, "{}", snapshot.insights.activity);
    if !snapshot.activity_by_week.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "| Week | Clicks | Students | Avg score |");
        let _ = writeln!(output, "|---|---|---|---|");
        for row in &snapshot.activity_by_week {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                row.week,
                format_count(row.sum_clicks),
                format_count(row.students_count),
                format_number(row.avg_final_score)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    let _ = writeln!(output, "{}", snapshot.insights.grades);
    for row in &snapshot.grade_distribution {
        let _ = writeln!(
            output,
            "- {}+: {} students",
            row.band,
            format_count(row.students)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Demographics");
    let _ = writeln!(output, "{}", snapshot.insights.demographics);
    for row in &snapshot.outcome_by_demographic {
        let _ = writeln!(
            output,
            "- {} / {}: {} pass, {} fail, {} withdrawn, {} distinction",
            row.demographic, row.category, row.pass, row.fail, row.withdrawn, row.distinction
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Regions");
    let _ = writeln!(output, "{}", snapshot.insights.regions);
    for row in &snapshot.region_choropleth {
        let _ = writeln!(
            output,
            "- {}: {} students, average score {}",
            row.region,
            format_count(row.students),
            format_number(row.average_score)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students At Risk");
    let _ = writeln!(output, "{}", snapshot.insights.engagement);
    for student in snapshot.at_risk.iter().take(10) {
        let _ = writeln!(
            output,
            "- {} ({} {}) score {} with {} clicks",
            student.id_student,
            student.code_module,
            student.code_presentation,
            format_number(student.final_score),
            format_count(student.total_clicks)
        );
    }

    output
}
