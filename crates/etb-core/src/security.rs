use crate::domain::UserId;

// ============== Authorization ==============

/// An empty allow-list leaves the bot open to everyone who can reach it.
pub fn is_authorized(user_id: UserId, allowed_users: &[i64]) -> bool {
    allowed_users.is_empty() || allowed_users.contains(&user_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_admits_everyone() {
        assert!(is_authorized(UserId(7), &[]));
    }

    #[test]
    fn allow_list_is_enforced() {
        assert!(is_authorized(UserId(7), &[1, 7]));
        assert!(!is_authorized(UserId(8), &[1, 7]));
    }
}
