//! Presets command handler

use crate::commands::PresetsArgs;
use crate::error::{CliError, CliResult};
use std::fmt::Write as _;
use typemotion::presets::{
    styles_in_category, StylePreset, STYLE_CATEGORIES, STYLE_PRESETS, TYPOGRAPHY_SUGGESTIONS,
};

/// List styles or typography suggestions on stdout
pub fn execute_presets(args: &PresetsArgs) -> CliResult<()> {
    let output = if args.typography {
        if args.json {
            serde_json::to_string_pretty(&TYPOGRAPHY_SUGGESTIONS)?
        } else {
            render_typography()
        }
    } else {
        let styles = selected_styles(args.category.as_deref())?;
        if args.json {
            serde_json::to_string_pretty(&styles)?
        } else {
            render_styles(&styles)
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn selected_styles(category: Option<&str>) -> CliResult<Vec<&'static StylePreset>> {
    let Some(category) = category else {
        return Ok(STYLE_PRESETS.iter().collect());
    };
    let matched = STYLE_CATEGORIES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(category))
        .ok_or_else(|| {
            CliError::invalid_argument(format!(
                "unknown category '{category}' (expected one of: {})",
                STYLE_CATEGORIES.join(", ")
            ))
        })?;
    Ok(styles_in_category(matched).collect())
}

/// Styles grouped under their category headings
#[must_use]
pub fn render_styles(styles: &[&StylePreset]) -> String {
    let mut out = String::new();
    for category in STYLE_CATEGORIES {
        let mut in_category = styles.iter().filter(|s| s.category == category).peekable();
        if in_category.peek().is_none() {
            continue;
        }
        let _ = writeln!(out, "{category}");
        for style in in_category {
            let _ = writeln!(out, "  {:<12} {:<12} {}", style.id, style.label, style.prompt);
        }
    }
    out
}

/// Typography suggestions, one per line
#[must_use]
pub fn render_typography() -> String {
    let mut out = String::new();
    for suggestion in &TYPOGRAPHY_SUGGESTIONS {
        let _ = writeln!(
            out,
            "{:<12} {:<16} {}",
            suggestion.id, suggestion.label, suggestion.prompt
        );
    }
    out
}
