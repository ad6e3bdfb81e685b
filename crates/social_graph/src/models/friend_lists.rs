use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Snapshot of a user's confirmed friends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendList {
    pub user_id: Uuid,
    pub friends: Vec<Uuid>,
}

impl FriendList {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.friends.contains(&user_id)
    }

    pub fn count(&self) -> usize {
        self.friends.len()
    }
}

/// Result of checking one user's friend list against the lists of their friends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendListAudit {
    pub user_id: Uuid,
    pub friend_count: usize,
    /// Listed friends whose own list does not contain the user.
    pub one_sided: Vec<Uuid>,
}

impl FriendListAudit {
    pub fn is_symmetric(&self) -> bool {
        self.one_sided.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_list_lookups() {
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let list = FriendList {
            user_id: owner,
            friends: vec![friend],
        };

        assert!(list.contains(friend));
        assert!(!list.contains(owner));
        assert_eq!(list.count(), 1);
    }
}
