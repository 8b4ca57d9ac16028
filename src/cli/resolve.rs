use async_trait::async_trait;
use tabled::Table;

use crate::{
    info,
    resolver::{AmbiguityResolver, Decision, HighestPopularity, ResolveOutcome},
    success,
    types::{Artist, CandidateTableRow, ItemKind, ResolvedTableRow},
    utils, warning,
};

use super::{BarObserver, fail, open_session, read_input, spinner};

/// Asks on the terminal which candidate a name means.
struct PromptResolver;

#[async_trait]
impl AmbiguityResolver for PromptResolver {
    async fn resolve(&self, input: &str, candidates: &[Artist]) -> Decision {
        let rows: Vec<CandidateTableRow> = candidates
            .iter()
            .enumerate()
            .map(|(i, a)| CandidateTableRow {
                index: i + 1,
                name: a.name.clone(),
                popularity: a.popularity,
                followers: format_followers(a.follower_count()),
                id: a.id.clone(),
            })
            .collect();
        println!("\"{}\" matches several artists:\n{}", input, Table::new(rows));

        loop {
            let answer = prompt(&format!(
                "Pick 1-{}, [s]kip or [c]ancel: ",
                candidates.len()
            ))
            .await;

            match answer.as_deref().map(str::trim) {
                None | Some("c") | Some("C") => return Decision::Cancel,
                Some("s") | Some("S") => return Decision::Skip,
                Some(choice) => match choice.parse::<usize>() {
                    Ok(n) if (1..=candidates.len()).contains(&n) => {
                        return Decision::Accept(candidates[n - 1].clone());
                    }
                    _ => warning!("Invalid choice: {}", choice),
                },
            }
        }
    }
}

/// Reads one line from the terminal. `None` on end of input.
pub(crate) async fn prompt(question: &str) -> Option<String> {
    use std::io::Write;

    print!("{}", question);
    let _ = std::io::stdout().flush();

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

pub(crate) fn format_followers(count: Option<u64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

pub async fn resolve(source: &str, auto: bool) {
    let items = utils::parse_pasted_items(&read_input(source).await);
    if items.is_empty() {
        warning!("Nothing to resolve in {}", source);
        return;
    }

    let session = open_session().await;
    // Stdin already carries the list, so it cannot answer prompts.
    let interactive = !auto && source != "-";
    let ambiguity: &dyn AmbiguityResolver = if interactive {
        &PromptResolver
    } else {
        &HighestPopularity
    };

    let pb = spinner("Resolving artists...");
    let outcome = if interactive {
        // The spinner would overwrite the prompts.
        pb.finish_and_clear();
        session.resolve_artists(&items, Some(ambiguity), &()).await
    } else {
        let observer = BarObserver(&pb);
        let outcome = session
            .resolve_artists(&items, Some(ambiguity), &observer)
            .await;
        pb.finish_and_clear();
        outcome
    };

    match outcome {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => fail("Resolution failed", e),
    }

    let labels = items.iter().filter(|i| i.kind == ItemKind::Label).count();
    if labels > 0 {
        info!("{} label(s) are matched by name when planning.", labels);
    }
}

pub(crate) fn print_outcome(outcome: &ResolveOutcome) {
    if !outcome.resolved.is_empty() {
        let rows: Vec<ResolvedTableRow> = outcome
            .resolved
            .iter()
            .map(|r| ResolvedTableRow {
                input: r.input_name.clone(),
                artist: r.display_name.clone(),
                id: r.external_id.clone(),
                followers: format_followers(r.followers),
            })
            .collect();
        println!("{}", Table::new(rows));
        success!("Resolved {} artist(s)", outcome.resolved.len());
    }

    if !outcome.skipped.is_empty() {
        let names: Vec<&str> = outcome.skipped.iter().map(|i| i.name.as_str()).collect();
        warning!("Skipped: {}", names.join(", "));
    }
    if !outcome.unresolved.is_empty() {
        let names: Vec<&str> = outcome.unresolved.iter().map(|i| i.name.as_str()).collect();
        warning!("Unresolved: {}", names.join(", "));
    }
    if outcome.cancelled {
        warning!("Resolution was cancelled; earlier decisions were kept.");
    }
}
