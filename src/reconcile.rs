use crate::remote::Remote;

/// Compute which previously active tunnels must be re-established after a
/// client reconnects with a newly declared set.
///
/// Multiset subtraction over tunnel identity keys: each new declaration
/// consumes at most one old tunnel with an equal key, and whatever remains
/// unconsumed is returned, in the old set's order. New declarations with no
/// old counterpart are simply not consumers; establishing them is the
/// caller's job.
pub fn tunnels_to_reestablish(old: &[Remote], new: &[Remote]) -> Vec<Remote> {
    let mut consumed = vec![false; old.len()];
    for declared in new {
        let key = declared.key();
        if let Some(i) = (0..old.len()).find(|&i| !consumed[i] && old[i].key() == key) {
            consumed[i] = true;
        }
    }
    old.iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(t, _)| t.clone())
        .collect()
}
