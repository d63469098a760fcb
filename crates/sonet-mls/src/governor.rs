//! Group size governor.
//!
//! Classifies groups into size bands and refreshes derived key material
//! for larger groups. The bands, with the default thresholds:
//!
//! | Status       | Members     |
//! |--------------|-------------|
//! | `OPTIMAL`    | 0..=150     |
//! | `GOOD`       | 151..=300   |
//! | `WARNING`    | 301..500    |
//! | `AT_LIMIT`   | 500         |
//! | `OVER_LIMIT` | more than 500 |

use serde::{Deserialize, Serialize};

use crate::codec::serialize_group;
use crate::config::SizeThresholds;
use crate::protocol::MlsProtocol;
use crate::Result;

/// Size band of a group relative to its capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeStatus {
    Optimal,
    Good,
    Warning,
    AtLimit,
    OverLimit,
}

/// Classify `members` against the thresholds and the member cap.
pub fn classify(members: usize, thresholds: &SizeThresholds, max_members: u32) -> SizeStatus {
    let max = max_members as usize;
    if members <= thresholds.optimal_max as usize {
        SizeStatus::Optimal
    } else if members <= thresholds.good_max as usize {
        SizeStatus::Good
    } else if members < max {
        SizeStatus::Warning
    } else if members == max {
        SizeStatus::AtLimit
    } else {
        SizeStatus::OverLimit
    }
}

impl MlsProtocol {
    /// Number of occupied leaves in the group's tree.
    pub fn member_count(&self, group_id: &[u8]) -> Result<usize> {
        self.store.read(group_id, |group| group.member_count())
    }

    /// Whether one more member would fit.
    pub fn can_add_member(&self, group_id: &[u8]) -> Result<bool> {
        let count = self.member_count(group_id)?;
        Ok(count < self.config.max_group_members as usize)
    }

    pub fn size_status(&self, group_id: &[u8]) -> Result<SizeStatus> {
        let count = self.member_count(group_id)?;
        Ok(classify(
            count,
            &self.config.size_thresholds,
            self.config.max_group_members,
        ))
    }

    /// Refresh derived key material for groups above the `OPTIMAL` band.
    ///
    /// Re-derives the sender ratchet key from the epoch secret and
    /// recomputes the tree hash. Membership and epoch are unchanged.
    /// Returns the group's encoding.
    pub fn optimize(&self, group_id: &[u8]) -> Result<Vec<u8>> {
        self.store.with_entry(group_id, |entry| {
            let current = entry.group();
            let status = classify(
                current.member_count(),
                &self.config.size_thresholds,
                self.config.max_group_members,
            );
            if status == SizeStatus::Optimal {
                return Ok(serialize_group(current));
            }

            let mut next = current.clone();
            next.secrets.refresh_sender_ratchet_key()?;
            next.context.tree_hash = next.tree.compute_tree_hash(self.config.tree_hash);

            tracing::debug!(
                group_id = %next.group_id,
                epoch = next.epoch,
                members = next.member_count(),
                status = ?status,
                "optimized MLS group"
            );
            let encoded = serialize_group(&next);
            entry.replace(next, self.config.epoch_secret_retention);
            Ok(encoded)
        })
    }
}
