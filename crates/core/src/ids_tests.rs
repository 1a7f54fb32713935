// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn user_id_equality_against_str() {
    let id = UserId::new("u-123");
    assert_eq!(id, "u-123");
    assert_eq!(id, *&"u-123");
}

#[test]
fn session_key_display_joins_user_and_project() {
    let key = SessionKey::new(UserId::new("u1"), ProjectId::new("p1"));
    assert_eq!(key.to_string(), "u1/p1");
}

#[test]
fn session_key_hashable_for_map_keys() {
    use std::collections::HashMap;
    let mut map: HashMap<SessionKey, u32> = HashMap::new();
    map.insert(SessionKey::new(UserId::new("u1"), ProjectId::new("p1")), 1);
    assert_eq!(map.get(&SessionKey::new(UserId::new("u1"), ProjectId::new("p1"))), Some(&1));
}
