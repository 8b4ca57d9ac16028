use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::{
    info, success,
    types::{ApplyPhase, ApplyProgressEvent},
};

use super::{
    fail, open_session,
    plan::{build_from_input, print_plan},
    resolve::{print_outcome, prompt},
};

fn phase_bar(progress: &MultiProgress, phase: ApplyPhase, total: usize) -> ProgressBar {
    let pb = progress.add(ProgressBar::new(total as u64));
    pb.set_style(
        ProgressStyle::with_template("{prefix:>9.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(phase.as_str());
    pb
}

pub async fn apply(source: &str, include_albums: bool, strict_primary: bool, yes: bool) {
    let session = open_session().await;
    let (plan, outcome) = build_from_input(&session, source, include_albums, strict_primary).await;

    print_outcome(&outcome);
    print_plan(&session, &plan, &outcome);

    if plan.is_empty() {
        success!("Nothing to remove.");
        return;
    }

    if !yes {
        let answer = prompt("Apply this plan? [y/N] ").await;
        if !matches!(answer.as_deref().map(str::trim), Some("y") | Some("Y") | Some("yes")) {
            info!("Aborted, nothing was changed.");
            return;
        }
    }

    let progress = MultiProgress::new();
    let bars = [
        phase_bar(&progress, ApplyPhase::Unfollow, plan.artists_to_unfollow.len()),
        phase_bar(&progress, ApplyPhase::Tracks, plan.track_ids_to_remove.len()),
        phase_bar(&progress, ApplyPhase::Albums, plan.album_ids_to_remove.len()),
    ];

    let on_progress = |event: ApplyProgressEvent| {
        let pb = match event.phase {
            ApplyPhase::Unfollow => &bars[0],
            ApplyPhase::Tracks => &bars[1],
            ApplyPhase::Albums => &bars[2],
        };
        pb.set_length(event.total as u64);
        pb.set_position(event.done as u64);
        match event.retry_after {
            Some(secs) => pb.set_message(format!("rate limited, waiting {}s", secs)),
            None if event.retries > 0 => pb.set_message(format!("{} retries", event.retries)),
            None => pb.set_message(""),
        }
        if event.done == event.total {
            pb.finish();
        }
    };

    match session.run_plan(Some(&plan), &on_progress).await {
        Ok(report) => success!(
            "Unfollowed {} artist(s), removed {} track(s) and {} album(s)",
            report.unfollowed,
            report.tracks_removed,
            report.albums_removed
        ),
        Err(e) => {
            for pb in &bars {
                pb.abandon();
            }
            fail(
                "Apply stopped; completed phases stay applied, see `spurge history`",
                e,
            )
        }
    }
}
