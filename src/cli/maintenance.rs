use tabled::Table;

use crate::{
    info, success,
    types::{HistoryTableRow, OperationStatus},
    warning,
};

use super::{fail, open_session};

pub async fn forget(name: &str) {
    let session = open_session().await;
    match session.forget(name).await {
        Ok(true) => success!("Forgot the decision for \"{}\"", name),
        Ok(false) => warning!("No decision stored for \"{}\"", name),
        Err(e) => fail("Cannot update local state", e),
    }
}

pub async fn cache_clear() {
    open_session().await.clear_cache().await;
    success!("Read cache cleared");
}

pub async fn logout() {
    open_session().await.logout().await;
    success!("Logged out; token and read cache removed");
}

pub async fn history() {
    let entries = match open_session().await.history().await {
        Ok(entries) => entries,
        Err(e) => fail("Cannot read local state", e),
    };

    if entries.is_empty() {
        info!("No apply runs recorded yet.");
        return;
    }

    let rows: Vec<HistoryTableRow> = entries
        .iter()
        .rev()
        .map(|e| HistoryTableRow {
            started: e.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            status: match e.status {
                OperationStatus::Running => "running",
                OperationStatus::Completed => "completed",
                OperationStatus::Failed => "failed",
            }
            .to_string(),
            unfollowed: e.unfollowed,
            tracks: e.tracks_removed,
            albums: e.albums_removed,
            error: e.error.clone().unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows));
}
