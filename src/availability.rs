use crate::models::{Round, Verdict};

/// A round is online when at least one host answered. Only when every host
/// fails is the connection considered down.
///
/// Empty rounds classify as offline here; callers skip them via
/// [`Round::is_degenerate`] before classifying.
pub(crate) fn classify(round: &Round) -> Verdict {
    let online = round.results.iter().any(|r| r.success);
    let failed_hosts = round
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.host.clone())
        .collect();

    Verdict {
        online,
        failed_hosts,
    }
}
