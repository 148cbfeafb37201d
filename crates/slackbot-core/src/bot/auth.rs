use std::collections::HashSet;

/// Decides which users may talk to the bot.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    allowed: HashSet<String>,
}

impl Authorizer {
    /// An empty list allows everyone.
    pub fn new<I, S>(allowed_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed_users.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, user: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_allows_everyone() {
        let auth = Authorizer::default();
        assert!(auth.is_allowed("U1"));
    }

    #[test]
    fn test_allow_list() {
        let auth = Authorizer::new(["U1", "U2"]);
        assert!(auth.is_allowed("U2"));
        assert!(!auth.is_allowed("U3"));
    }
}
