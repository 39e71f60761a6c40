//! Competition-ranked scoreboard computation
//!
//! Players are ordered by cumulative score descending. Tied scores share a
//! rank number, and the rank of the next distinct score is its 1-based
//! position in the sorted sequence, so a tie group leaves a gap behind it:
//! scores [10,10,7] rank as [1,1,3]. Ties are ordered username-ascending so
//! the broadcast is deterministic.

use shared::ScoreboardEntry;

/// Computes the ranked scoreboard from (username, score) pairs.
pub fn compute(mut scores: Vec<(String, u32)>) -> Vec<ScoreboardEntry> {
    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut entries = Vec::with_capacity(scores.len());
    let mut current_rank = 0;
    let mut prev_score = None;

    for (idx, (username, score)) in scores.into_iter().enumerate() {
        // The rank only advances when the score strictly drops, to the
        // 1-based position at which the new score first appears.
        if prev_score.map_or(true, |prev| score < prev) {
            current_rank = idx + 1;
            prev_score = Some(score);
        }
        entries.push(ScoreboardEntry {
            rank: current_rank,
            username,
            score,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(scores: &[(&str, u32)]) -> Vec<(String, u32)> {
        scores
            .iter()
            .map(|(name, score)| (name.to_string(), *score))
            .collect()
    }

    #[test]
    fn test_empty_scoreboard() {
        assert!(compute(Vec::new()).is_empty());
    }

    #[test]
    fn test_single_player() {
        let entries = compute(named(&[("alice", 5)]));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].username, "alice");
        assert_eq!(entries[0].score, 5);
    }

    #[test]
    fn test_distinct_scores_rank_consecutively() {
        let entries = compute(named(&[("alice", 1), ("bob", 3), ("carol", 2)]));
        let ranked: Vec<(usize, &str, u32)> = entries
            .iter()
            .map(|e| (e.rank, e.username.as_str(), e.score))
            .collect();
        assert_eq!(
            ranked,
            vec![(1, "bob", 3), (2, "carol", 2), (3, "alice", 1)]
        );
    }

    #[test]
    fn test_competition_ranking_with_ties() {
        // Scores [10,10,7,5,5,5] must rank [1,1,3,4,4,4]: ties share a rank
        // and the next distinct score's rank equals its 1-based position.
        let entries = compute(named(&[
            ("p1", 10),
            ("p2", 10),
            ("p3", 7),
            ("p4", 5),
            ("p5", 5),
            ("p6", 5),
        ]));
        let ranks: Vec<usize> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3, 4, 4, 4]);
        assert_eq!(entries[0].username, "p1");
        assert_eq!(entries[1].username, "p2");
        assert_eq!(entries[2].username, "p3");
    }

    #[test]
    fn test_all_tied_share_rank_one() {
        let entries = compute(named(&[("a", 2), ("b", 2), ("c", 2)]));
        assert!(entries.iter().all(|e| e.rank == 1));
    }

    #[test]
    fn test_ties_are_username_ordered() {
        let entries = compute(named(&[("zoe", 4), ("amy", 4)]));
        assert_eq!(entries[0].username, "amy");
        assert_eq!(entries[1].username, "zoe");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].rank, 1);
    }

    #[test]
    fn test_deterministic_for_fixed_scores() {
        let input = named(&[("d", 3), ("a", 1), ("c", 3), ("b", 2)]);
        assert_eq!(compute(input.clone()), compute(input));
    }
}
