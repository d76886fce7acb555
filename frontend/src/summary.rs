//! Rendering helpers for the weekly summary panel.

use taskdeck_shared::DateRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    Item(String),
}

/// Splits the model's markdown-ish reply into headings, list items and
/// paragraphs. Emphasis markers are dropped.
pub fn blocks(summary: &str) -> Vec<Block> {
    summary
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let plain = line.replace("**", "");
            if let Some(heading) = plain.strip_prefix('#') {
                Block::Heading(heading.trim_start_matches('#').trim().to_string())
            } else if let Some(item) = plain.strip_prefix("- ").or_else(|| plain.strip_prefix("* ")) {
                Block::Item(item.to_string())
            } else {
                Block::Paragraph(plain)
            }
        })
        .collect()
}

pub fn date_range(range: &DateRange) -> String {
    format!(
        "{} - {}",
        range.start.format("%b %-d"),
        range.end.format("%b %-d")
    )
}

pub fn task_count(count: usize) -> String {
    if count == 1 {
        "1 task completed".to_string()
    } else {
        format!("{count} tasks completed")
    }
}
