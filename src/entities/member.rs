// 👤 Member Entity - canonical roster row

use serde::{Deserialize, Serialize};

use super::ids::MemberId;

/// One sitting member, normalized from the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub list_as: String,

    /// Canonical party name (merges already applied)
    pub party: String,

    pub party_id: String,
    pub constituency: String,
    pub gender: String,
}

impl Member {
    /// Minimal member, used by tests and fixtures
    pub fn new(id: u64, name: &str, party: &str) -> Self {
        Member {
            id: MemberId(id),
            name: name.to_string(),
            list_as: String::new(),
            party: party.to_string(),
            party_id: String::new(),
            constituency: String::new(),
            gender: String::new(),
        }
    }
}
