//! Ability stratification for DIF analysis.
//!
//! Respondents are ordered by total score and cut into strata of roughly
//! equal frequency. A group of tied scores is never split across two strata,
//! so highly discrete score distributions may yield fewer strata than asked
//! for, or uneven ones.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::RespondentId;

/// Which side of the comparison a respondent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFlag {
    Focal,
    Reference,
}

/// A respondent's ability proxy and group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentData {
    pub respondent_id: RespondentId,
    pub total_score: Decimal,
    pub group: GroupFlag,
}

/// Respondents of similar total score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityStratum {
    pub min_score: Decimal,
    pub max_score: Decimal,
    pub members: Vec<RespondentData>,
}

impl AbilityStratum {
    fn from_members(members: Vec<RespondentData>) -> Option<Self> {
        let min_score = members.iter().map(|m| m.total_score).min()?;
        let max_score = members.iter().map(|m| m.total_score).max()?;
        Some(Self {
            min_score,
            max_score,
            members,
        })
    }

    fn absorb(&mut self, members: Vec<RespondentData>) {
        for member in members {
            self.min_score = self.min_score.min(member.total_score);
            self.max_score = self.max_score.max(member.total_score);
            self.members.push(member);
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Fewest members a stratum needs to enter the Mantel-Haenszel sums.
const MIN_STRATUM_SIZE: usize = 2;

/// Partitions respondents into at most `target` strata by total score.
///
/// Score groups are taken in ascending order. The current stratum closes,
/// between score groups only, once it holds its equal share of the
/// respondents not yet placed (`remaining / strata_left`). Recomputing the
/// share after every close means a large tie group that overshoots one
/// boundary does not leave the following strata nearly empty. A stratum
/// closes with at least two members, and a single leftover respondent joins
/// the stratum below.
pub fn stratify(respondents: &[RespondentData], target: usize) -> Vec<AbilityStratum> {
    let target = target.max(1);

    let mut by_score: BTreeMap<Decimal, Vec<RespondentData>> = BTreeMap::new();
    for respondent in respondents {
        by_score
            .entry(respondent.total_score)
            .or_default()
            .push(*respondent);
    }

    let mut strata: Vec<AbilityStratum> = Vec::with_capacity(target);
    let mut current = Vec::new();
    let mut remaining = respondents.len();

    for (_, group) in by_score {
        current.extend(group);

        let strata_left = target - strata.len();
        if strata_left > 1
            && current.len() >= MIN_STRATUM_SIZE
            && current.len() * strata_left >= remaining
        {
            remaining -= current.len();
            strata.extend(AbilityStratum::from_members(std::mem::take(&mut current)));
        }
    }

    match strata.last_mut() {
        Some(last) if current.len() < MIN_STRATUM_SIZE => last.absorb(current),
        _ => strata.extend(AbilityStratum::from_members(current)),
    }

    strata
}
