//! Poll lifecycle and vote aggregation.
//!
//! Polls never close: the "active" poll is just a per-group pointer to the
//! most recently created one, used as the default target of a result query.
//! Votes are keyed by voter and replaced on resubmit, and the whole poll book
//! is written through the store on every mutation so results survive a
//! process restart.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{GroupId, PollId, UserId},
    errors::Error,
    ports::{StateStore, TransportPort},
    Result,
};

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 12;
const SAMPLE_VOTERS: usize = 3;
const POLLS_DOC: &str = "polls";

/// A question with a fixed option list, open to votes indefinitely.
///
/// Invariants: `options.len() >= 2`; every value in `votes` is a valid index
/// into `options`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub group: GroupId,
    pub question: String,
    pub options: Vec<String>,
    /// voter -> selected option index; one current vote per voter.
    pub votes: BTreeMap<UserId, usize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PollBook {
    polls: HashMap<PollId, Poll>,
    active: HashMap<GroupId, PollId>,
}

/// Per-option projection of a poll's votes.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionTally {
    pub label: String,
    pub count: usize,
    /// `count / total * 100`, rounded to one decimal; 0.0 when nobody voted.
    /// Percentages are rounded independently and need not sum to 100.0.
    pub percent: f64,
    /// Up to three voters shown as examples.
    pub sample_voters: Vec<UserId>,
    /// How many further voters picked this option.
    pub more_voters: usize,
}

#[derive(Clone, Debug)]
pub struct PollResult {
    pub question: String,
    pub total_votes: usize,
    pub options: Vec<OptionTally>,
}

/// Owns every poll and the per-group active pointer.
///
/// All mutations run under one lock, which gives the single-writer discipline
/// vote recording needs for last-write-wins per voter.
pub struct PollAggregator {
    transport: Arc<dyn TransportPort>,
    store: Arc<dyn StateStore>,
    book: Mutex<PollBook>,
}

impl PollAggregator {
    pub fn load(transport: Arc<dyn TransportPort>, store: Arc<dyn StateStore>) -> Result<Self> {
        let book = match store.load(POLLS_DOC)? {
            Some(value) => serde_json::from_value(value)?,
            None => PollBook::default(),
        };
        Ok(Self {
            transport,
            store,
            book: Mutex::new(book),
        })
    }

    /// Create a poll: clean the options, emit it to the platform, then
    /// record it. A poll that never reached the platform is not recorded.
    pub async fn create_poll(
        &self,
        group_id: &GroupId,
        question: &str,
        options: Vec<String>,
    ) -> Result<PollId> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Validation("the poll needs a question".to_string()));
        }

        let mut options: Vec<String> = options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < MIN_OPTIONS {
            return Err(Error::Validation(format!(
                "a poll needs at least {MIN_OPTIONS} options"
            )));
        }
        options.truncate(MAX_OPTIONS);

        let id = self.transport.send_poll(group_id, question, &options).await?;

        let mut book = self.book.lock().await;
        book.polls.insert(
            id.clone(),
            Poll {
                id: id.clone(),
                group: group_id.clone(),
                question: question.to_string(),
                options,
                votes: BTreeMap::new(),
                created_at: Utc::now(),
            },
        );
        book.active.insert(group_id.clone(), id.clone());
        self.persist(&book);

        Ok(id)
    }

    /// Upsert one voter's choice. Votes for unknown polls (e.g. created by a
    /// previous deployment) and out-of-range indices are routine and dropped
    /// silently.
    pub async fn record_vote(&self, poll_id: &PollId, voter: &UserId, selected: usize) {
        let mut book = self.book.lock().await;
        let Some(poll) = book.polls.get_mut(poll_id) else {
            tracing::debug!("vote from {voter} for unknown poll {poll_id} dropped");
            return;
        };
        if selected >= poll.options.len() {
            tracing::debug!("vote from {voter} with out-of-range option {selected} dropped");
            return;
        }

        poll.votes.insert(voter.clone(), selected);
        self.persist(&book);
    }

    /// Project the current tallies. With no explicit id the group's active
    /// poll is used, falling back to the latest poll ever created there; no
    /// poll at all yields `None`, not an error.
    pub async fn compute_result(
        &self,
        group_id: &GroupId,
        poll_id: Option<&PollId>,
    ) -> Option<PollResult> {
        let book = self.book.lock().await;
        let poll = match poll_id {
            Some(id) => book.polls.get(id).filter(|p| &p.group == group_id),
            None => book
                .active
                .get(group_id)
                .and_then(|id| book.polls.get(id))
                .or_else(|| {
                    book.polls
                        .values()
                        .filter(|p| &p.group == group_id)
                        .max_by_key(|p| p.created_at)
                }),
        };

        poll.map(tally)
    }

    fn persist(&self, book: &PollBook) {
        match serde_json::to_value(book) {
            Ok(value) => {
                if let Err(e) = self.store.save(POLLS_DOC, &value) {
                    tracing::warn!("poll state write failed, keeping in-memory value: {e}");
                }
            }
            Err(e) => tracing::warn!("poll state serialize failed: {e}"),
        }
    }
}

fn tally(poll: &Poll) -> PollResult {
    let total = poll.votes.len();

    let options = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let voters: Vec<&UserId> = poll
                .votes
                .iter()
                .filter(|(_, &selected)| selected == index)
                .map(|(voter, _)| voter)
                .collect();
            let count = voters.len();
            let percent = if total == 0 {
                0.0
            } else {
                (count as f64 * 1000.0 / total as f64).round() / 10.0
            };

            OptionTally {
                label: label.clone(),
                count,
                percent,
                sample_voters: voters
                    .iter()
                    .take(SAMPLE_VOTERS)
                    .map(|&voter| voter.clone())
                    .collect(),
                more_voters: count.saturating_sub(SAMPLE_VOTERS),
            }
        })
        .collect();

    PollResult {
        question: poll.question.clone(),
        total_votes: total,
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{group, user, FakeTransport, MemoryStore};
    use std::sync::atomic::Ordering;

    fn aggregator() -> (PollAggregator, Arc<FakeTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(FakeTransport::default());
        let store = Arc::new(MemoryStore::default());
        let polls = PollAggregator::load(transport.clone(), store.clone()).unwrap();
        (polls, transport, store)
    }

    fn opts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_rejects_too_few_options() {
        let (polls, _, _) = aggregator();
        let g = group("g1");

        let none = polls.create_poll(&g, "q?", opts(&[])).await;
        assert!(matches!(none, Err(Error::Validation(_))));

        let one = polls.create_poll(&g, "q?", opts(&["only"])).await;
        assert!(matches!(one, Err(Error::Validation(_))));

        // Whitespace-only options do not count.
        let blank = polls.create_poll(&g, "q?", opts(&["a", "  "])).await;
        assert!(matches!(blank, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn create_caps_options_at_twelve() {
        let (polls, _, _) = aggregator();
        let g = group("g1");

        let labels: Vec<String> = (0..13).map(|i| format!("opt{i}")).collect();
        let id = polls.create_poll(&g, "q?", labels).await.unwrap();

        let result = polls.compute_result(&g, Some(&id)).await.unwrap();
        assert_eq!(result.options.len(), MAX_OPTIONS);
        assert_eq!(result.options[0].label, "opt0");
        assert_eq!(result.options[11].label, "opt11");
    }

    #[tokio::test]
    async fn failed_emission_records_nothing() {
        let (polls, transport, store) = aggregator();
        let g = group("g1");

        transport.fail_send_poll.store(true, Ordering::SeqCst);
        let err = polls.create_poll(&g, "q?", opts(&["a", "b"])).await;
        assert!(matches!(err, Err(Error::Transport(_))));

        assert!(polls.compute_result(&g, None).await.is_none());
        assert!(store.docs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn revote_replaces_and_last_write_wins() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b", "c"])).await.unwrap();

        polls.record_vote(&id, &user("alice"), 0).await;
        polls.record_vote(&id, &user("alice"), 2).await;
        polls.record_vote(&id, &user("alice"), 0).await;

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.total_votes, 1);
        assert_eq!(result.options[0].count, 1);
        assert_eq!(result.options[2].count, 0);
    }

    #[tokio::test]
    async fn counts_partition_the_vote_map() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b", "c"])).await.unwrap();

        for (voter, choice) in [("v1", 0), ("v2", 1), ("v3", 1), ("v4", 2), ("v5", 1)] {
            polls.record_vote(&id, &user(voter), choice).await;
        }

        let result = polls.compute_result(&g, None).await.unwrap();
        let summed: usize = result.options.iter().map(|o| o.count).sum();
        assert_eq!(summed, result.total_votes);
        assert_eq!(result.total_votes, 5);
        assert_eq!(result.options[1].count, 3);
        assert_eq!(result.options[1].percent, 60.0);
        assert_eq!(result.options[0].percent, 20.0);
    }

    #[tokio::test]
    async fn zero_votes_yields_zero_percent_everywhere() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.total_votes, 0);
        assert!(result.options.iter().all(|o| o.percent == 0.0 && o.count == 0));
    }

    #[tokio::test]
    async fn votes_from_different_voters_commute() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        polls.record_vote(&id, &user("bob"), 1).await;
        polls.record_vote(&id, &user("alice"), 0).await;

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.options[0].count, 1);
        assert_eq!(result.options[1].count, 1);
        assert_eq!(result.total_votes, 2);
    }

    #[tokio::test]
    async fn unknown_poll_and_bad_index_are_dropped_silently() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        polls
            .record_vote(&PollId("ghost".to_string()), &user("alice"), 0)
            .await;
        polls.record_vote(&id, &user("alice"), 5).await;

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.total_votes, 0);
    }

    #[tokio::test]
    async fn result_without_polls_is_none_not_an_error() {
        let (polls, _, _) = aggregator();
        assert!(polls.compute_result(&group("empty"), None).await.is_none());
    }

    #[tokio::test]
    async fn newest_poll_becomes_the_active_target() {
        let (polls, _, _) = aggregator();
        let g = group("g1");

        let first = polls.create_poll(&g, "first?", opts(&["a", "b"])).await.unwrap();
        let _second = polls.create_poll(&g, "second?", opts(&["x", "y"])).await.unwrap();

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.question, "second?");

        // The older poll stays open and queryable by id.
        polls.record_vote(&first, &user("alice"), 0).await;
        let old = polls.compute_result(&g, Some(&first)).await.unwrap();
        assert_eq!(old.question, "first?");
        assert_eq!(old.total_votes, 1);
    }

    #[tokio::test]
    async fn polls_are_independent_across_groups() {
        let (polls, _, _) = aggregator();
        let ga = group("a");
        let gb = group("b");

        let pa = polls.create_poll(&ga, "a?", opts(&["1", "2"])).await.unwrap();
        let pb = polls.create_poll(&gb, "b?", opts(&["1", "2"])).await.unwrap();

        polls.record_vote(&pa, &user("alice"), 0).await;
        polls.record_vote(&pb, &user("alice"), 1).await;

        assert_eq!(polls.compute_result(&ga, None).await.unwrap().question, "a?");
        assert_eq!(
            polls.compute_result(&ga, None).await.unwrap().options[0].count,
            1
        );
        assert_eq!(
            polls.compute_result(&gb, None).await.unwrap().options[1].count,
            1
        );
    }

    #[tokio::test]
    async fn voter_samples_truncate_with_a_remainder() {
        let (polls, _, _) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        for voter in ["v1", "v2", "v3", "v4", "v5"] {
            polls.record_vote(&id, &user(voter), 0).await;
        }

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.options[0].sample_voters.len(), 3);
        assert_eq!(result.options[0].more_voters, 2);
        assert_eq!(result.options[1].sample_voters.len(), 0);
        assert_eq!(result.options[1].more_voters, 0);
    }

    #[tokio::test]
    async fn every_vote_is_written_through_the_store() {
        let (polls, _, store) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        polls.record_vote(&id, &user("alice"), 1).await;

        let doc = store.docs.lock().unwrap().get("polls").cloned().unwrap();
        let stored: serde_json::Value = doc;
        let votes = &stored["polls"][&id.0]["votes"];
        assert_eq!(votes["alice"], 1);
    }

    #[tokio::test]
    async fn polls_survive_a_reload_through_the_store() {
        let transport = Arc::new(FakeTransport::default());
        let store = Arc::new(MemoryStore::default());
        let g = group("g1");

        let id = {
            let polls = PollAggregator::load(transport.clone(), store.clone()).unwrap();
            let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();
            polls.record_vote(&id, &user("alice"), 0).await;
            id
        };

        let reloaded = PollAggregator::load(transport, store).unwrap();
        let result = reloaded.compute_result(&g, Some(&id)).await.unwrap();
        assert_eq!(result.total_votes, 1);
        assert_eq!(result.options[0].count, 1);
    }

    #[tokio::test]
    async fn failed_vote_persistence_keeps_the_in_memory_vote() {
        let (polls, _, store) = aggregator();
        let g = group("g1");
        let id = polls.create_poll(&g, "q?", opts(&["a", "b"])).await.unwrap();

        store.fail_saves.store(true, Ordering::SeqCst);
        polls.record_vote(&id, &user("alice"), 0).await;

        let result = polls.compute_result(&g, None).await.unwrap();
        assert_eq!(result.total_votes, 1);
    }
}
