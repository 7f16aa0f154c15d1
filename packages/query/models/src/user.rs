//! Account types: users and the groups they share queries with.

use serde::{Deserialize, Serialize};

/// A PAIRS account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    /// Account identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Names of the groups the user belongs to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// A named group of users.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Group {
    /// Group identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Members.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferObject as _;
    use serde_json::json;

    #[test]
    fn group_round_trips_with_members() {
        let value = json!({
            "id": "7",
            "name": "research",
            "users": [{"id": "1", "name": "a", "email": "a@example.com", "groups": ["research"]}],
        });
        let group = Group::from_value(value.clone()).unwrap();
        assert_eq!(group.users.len(), 1);
        assert_eq!(group.to_value().unwrap(), value);
        assert_eq!(Group::from_json(&group.to_json().unwrap()).unwrap(), group);
    }
}
