//! CSV rendering of analysis results.

use chrono::{DateTime, SecondsFormat, Utc};
use tonepipe_core::{AnalysisResult, Dimension};

const HEADERS: [&str; 9] = [
    "URL",
    "Label",
    "Formality",
    "Seriousness",
    "Enthusiasm",
    "Respectfulness",
    "Dominant_Traits",
    "Analysis_Mode",
    "Timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvExport {
    generated_at: DateTime<Utc>,
}

fn escape_cell(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|c| escape_cell(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

impl CsvExport {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Header plus one row per scored result. Error results have no tone data and are skipped;
    /// `None` when nothing was scored.
    pub fn render(&self, results: &[AnalysisResult]) -> Option<String> {
        let timestamp = self
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut lines = vec![row(HEADERS)];
        for r in results {
            let Some(a) = r.analysis() else {
                continue;
            };
            let mut cells = vec![r.url().to_string(), r.label().to_string()];
            cells.extend(
                Dimension::ALL
                    .iter()
                    .map(|d| a.profile.dimension(*d).score.to_string()),
            );
            cells.push(
                a.profile
                    .tone_dimensions
                    .iter()
                    .map(|d| d.dominant_term)
                    .collect::<Vec<_>>()
                    .join("; "),
            );
            cells.push(r.mode().as_str().to_string());
            cells.push(timestamp.clone());
            lines.push(row(cells));
        }
        (lines.len() > 1).then(|| lines.join("\n"))
    }

    /// `tone-analysis-comparison-YYYY-MM-DD.csv` for multi-URL runs, `...-single-...` otherwise.
    pub fn file_name(&self, comparison: bool) -> String {
        let kind = if comparison { "comparison" } else { "single" };
        format!(
            "tone-analysis-{kind}-{}.csv",
            self.generated_at.format("%Y-%m-%d")
        )
    }
}
