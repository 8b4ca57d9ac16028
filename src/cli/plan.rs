use std::path::Path;

use tabled::Table;

use crate::{
    info,
    planner::{PlanOptions, PlanProgress, export_plan},
    resolver::{HighestPopularity, ResolveOutcome},
    session::Session,
    success,
    types::{ItemKind, Plan, PlanTableRow, RemovalReason},
    utils, warning,
};

use super::{BarObserver, fail, open_session, read_input, resolve::print_outcome, spinner};

/// Resolves the list in `source` without prompting and builds the plan.
pub(crate) async fn build_from_input(
    session: &Session,
    source: &str,
    include_albums: bool,
    strict_primary: bool,
) -> (Plan, ResolveOutcome) {
    let items = utils::parse_pasted_items(&read_input(source).await);
    if items.is_empty() {
        warning!("Nothing to plan in {}", source);
        std::process::exit(1);
    }

    let pb = spinner("Resolving artists...");
    let observer = BarObserver(&pb);
    let outcome = match session
        .resolve_artists(&items, Some(&HighestPopularity), &observer)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            pb.finish_and_clear();
            fail("Resolution failed", e)
        }
    };

    let options = PlanOptions {
        banned_artist_ids: outcome
            .resolved
            .iter()
            .map(|r| r.external_id.clone())
            .collect(),
        banned_labels: items
            .iter()
            .filter(|i| i.kind == ItemKind::Label)
            .map(|i| i.name.clone())
            .collect(),
        include_albums,
        strict_primary,
    };

    let on_progress = |p: PlanProgress| {
        let message = match p.total {
            Some(total) => format!("Loading {} ({}/{})...", p.stage.as_str(), p.loaded, total),
            None => format!("Loading {} ({})...", p.stage.as_str(), p.loaded),
        };
        pb.set_message(message);
    };
    let plan = match session.build_plan(&options, &on_progress, &observer).await {
        Ok(plan) => plan,
        Err(e) => {
            pb.finish_and_clear();
            fail("Planning failed", e)
        }
    };
    pb.finish_and_clear();

    (plan, outcome)
}

pub(crate) fn print_plan(session: &Session, plan: &Plan, outcome: &ResolveOutcome) {
    if let Some(totals) = session.totals() {
        info!(
            "Library: {} followed artists, {} liked tracks, {} saved albums",
            totals.following, totals.liked, totals.saved
        );
    }

    let mut rows: Vec<PlanTableRow> = plan
        .artists_to_unfollow
        .iter()
        .map(|id| PlanTableRow {
            kind: "unfollow".to_string(),
            name: outcome
                .resolved
                .iter()
                .find(|r| &r.external_id == id)
                .map(|r| r.display_name.clone())
                .unwrap_or_else(|| id.clone()),
            artists: String::new(),
            reasons: String::new(),
        })
        .collect();
    rows.extend(plan.tracks_to_remove.iter().map(|t| PlanTableRow {
        kind: "track".to_string(),
        name: t.name.clone(),
        artists: t.artists.join(", "),
        reasons: describe_reasons(&t.reasons),
    }));
    rows.extend(plan.albums_to_remove.iter().map(|a| PlanTableRow {
        kind: "album".to_string(),
        name: a.name.clone(),
        artists: a.artists.join(", "),
        reasons: describe_reasons(&a.reasons),
    }));

    if !rows.is_empty() {
        println!("{}", Table::new(rows));
    }
    info!(
        "Plan: unfollow {} artist(s), remove {} track(s), remove {} album(s)",
        plan.artists_to_unfollow.len(),
        plan.track_ids_to_remove.len(),
        plan.album_ids_to_remove.len()
    );
}

fn describe_reasons(reasons: &[RemovalReason]) -> String {
    reasons
        .iter()
        .map(|r| match r {
            RemovalReason::Artist { name, .. } => format!("artist: {}", name),
            RemovalReason::Label { label } => format!("label: {}", label),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn plan(source: &str, include_albums: bool, strict_primary: bool, export: Option<&Path>) {
    let session = open_session().await;
    let (plan, outcome) = build_from_input(&session, source, include_albums, strict_primary).await;

    print_outcome(&outcome);
    print_plan(&session, &plan, &outcome);

    if let Some(path) = export {
        match export_plan(&plan, path).await {
            Ok(format) => success!("Plan exported to {} ({:?})", path.display(), format),
            Err(e) => fail("Export failed", e),
        }
    }
}
