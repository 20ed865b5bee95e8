use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::visitor::VisitorId;

pub(crate) type ItemId = String;

#[derive(Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[serde(rename_all = "lowercase")]
pub(crate) enum VoteValue {
    Like,
    Dislike,
}

impl FromStr for VoteValue {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(VoteValue::Like),
            "dislike" => Ok(VoteValue::Dislike),
            _ => Err(CommandError::InvalidValue),
        }
    }
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Copy, Clone, Debug)]
#[serde(default)]
pub(crate) struct VoteTally {
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) likes: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) dislikes: u64,
}

impl VoteTally {
    fn counter(&mut self, value: VoteValue) -> &mut u64 {
        match value {
            VoteValue::Like => &mut self.likes,
            VoteValue::Dislike => &mut self.dislikes,
        }
    }

    fn increment(&mut self, value: VoteValue) {
        *self.counter(value) += 1;
    }

    fn decrement(&mut self, value: VoteValue) {
        let counter = self.counter(value);
        *counter = counter.saturating_sub(1);
    }
}

#[derive(thiserror::Error, PartialEq, Eq, Debug)]
pub(crate) enum CommandError {
    #[error("{0} required")]
    MissingField(&'static str),
    #[error("value must be 'like' or 'dislike'")]
    InvalidValue,
}

/// The whole counter state. Loaded once, mutated by the handlers, and
/// written back in full after every change.
#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Store {
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) total_visits: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) today_visits: u64,
    pub(crate) today_date: Option<NaiveDate>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) game_clicks: BTreeMap<ItemId, u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) game_votes: BTreeMap<ItemId, VoteTally>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) votes_by_visitor: BTreeMap<VisitorId, BTreeMap<ItemId, VoteValue>>,
    #[serde(rename = "uniqueVisitorsSet", deserialize_with = "null_as_default")]
    pub(crate) unique_visitors: BTreeSet<VisitorId>,
}

/// Snapshot fields may be `null`; treat that like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Serialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Summary {
    pub(crate) total_visits: u64,
    pub(crate) unique_visitors: usize,
    pub(crate) today_visits: u64,
    pub(crate) game_clicks: BTreeMap<ItemId, u64>,
    pub(crate) game_votes: BTreeMap<ItemId, VoteTally>,
}

/// Outcome of a mutating command. `changed` is false only for a vote that
/// repeats the visitor's current vote, in which case nothing needs saving.
#[derive(PartialEq, Eq, Debug)]
pub(crate) struct Receipt {
    pub(crate) visitor: VisitorId,
    pub(crate) changed: bool,
}

fn require_item(item: Option<ItemId>) -> Result<ItemId, CommandError> {
    match item {
        Some(item) if !item.is_empty() => Ok(item),
        _ => Err(CommandError::MissingField("gameId")),
    }
}

impl Store {
    /// Resets the daily counter when `today` differs from the stored date.
    /// Returns true if a reset happened.
    pub(crate) fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.today_date == Some(today) {
            return false;
        }
        self.today_date = Some(today);
        self.today_visits = 0;
        true
    }

    pub(crate) fn record_visit(&mut self, visitor: Option<String>, today: NaiveDate) -> Receipt {
        self.roll_over(today);
        let visitor = VisitorId::resolve(visitor);
        self.register(&visitor);

        self.total_visits += 1;
        self.today_visits += 1;

        Receipt { visitor, changed: true }
    }

    pub(crate) fn record_click(
        &mut self,
        visitor: Option<String>,
        item: Option<ItemId>,
        today: NaiveDate,
    ) -> Result<Receipt, CommandError> {
        let item = require_item(item)?;

        self.roll_over(today);
        let visitor = VisitorId::resolve(visitor);
        self.register(&visitor);

        *self.game_clicks.entry(item).or_insert(0) += 1;

        Ok(Receipt { visitor, changed: true })
    }

    pub(crate) fn record_vote(
        &mut self,
        visitor: Option<String>,
        item: Option<ItemId>,
        value: Option<&str>,
        today: NaiveDate,
    ) -> Result<Receipt, CommandError> {
        let item = require_item(item)?;
        let value: VoteValue = value.ok_or(CommandError::InvalidValue)?.parse()?;

        self.roll_over(today);
        let visitor = VisitorId::resolve(visitor);
        let registered = self.register(&visitor);

        let previous = self.vote_of(&visitor, &item);
        if previous == Some(value) {
            return Ok(Receipt {
                visitor,
                changed: registered,
            });
        }

        let tally = self.game_votes.entry(item.clone()).or_default();
        if let Some(previous) = previous {
            tally.decrement(previous);
        }
        tally.increment(value);

        self.votes_by_visitor
            .entry(visitor.clone())
            .or_default()
            .insert(item, value);

        Ok(Receipt { visitor, changed: true })
    }

    pub(crate) fn vote_of(&self, visitor: &VisitorId, item: &str) -> Option<VoteValue> {
        self.votes_by_visitor
            .get(visitor)
            .and_then(|votes| votes.get(item))
            .copied()
    }

    pub(crate) fn votes_of(&self, visitor: &VisitorId) -> BTreeMap<ItemId, VoteValue> {
        self.votes_by_visitor.get(visitor).cloned().unwrap_or_default()
    }

    pub(crate) fn summary(&mut self, today: NaiveDate) -> Summary {
        self.roll_over(today);
        Summary {
            total_visits: self.total_visits,
            unique_visitors: self.unique_visitor_count(),
            today_visits: self.today_visits,
            game_clicks: self.game_clicks.clone(),
            game_votes: self.game_votes.clone(),
        }
    }
}
