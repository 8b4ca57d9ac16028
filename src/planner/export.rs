use std::path::Path;

use crate::{
    Res,
    error::SyncError,
    types::{EvidenceKind, Plan},
};

const CSV_HEADER: &str = "kind,item_id,artist_id,label,title,year";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Picks the format from a file extension; anything but `.csv` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Writes `plan` to `path`, as CSV or pretty JSON depending on the extension.
pub async fn export_plan(plan: &Plan, path: &Path) -> Res<ExportFormat> {
    let format = ExportFormat::from_path(path);
    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(plan)?,
        ExportFormat::Csv => plan_to_csv(plan),
    };

    async_fs::write(path, content)
        .await
        .map_err(|e| SyncError::Storage {
            message: format!("failed to write {}: {}", path.display(), e),
        })?;
    Ok(format)
}

/// One row per evidence entry.
pub fn plan_to_csv(plan: &Plan) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for e in &plan.evidence {
        let kind = match e.kind {
            EvidenceKind::TrackArtist => "track_artist",
            EvidenceKind::TrackLabel => "track_label",
            EvidenceKind::AlbumArtist => "album_artist",
            EvidenceKind::AlbumLabel => "album_label",
        };
        let row = [
            kind,
            e.item_id.as_str(),
            e.artist_id.as_deref().unwrap_or(""),
            e.label.as_deref().unwrap_or(""),
            e.title.as_str(),
            e.year.as_deref().unwrap_or(""),
        ]
        .map(csv_field)
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
