use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub started_at: String,
}

impl Session {
    pub fn start(user: String, role: Role) -> Self {
        Self {
            user,
            role,
            started_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Requests in flight and handled so far. Only drives a busy indicator.
#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub pending: u32,
    pub handled: u64,
}

impl Activity {
    pub fn begin(&mut self) {
        self.pending += 1;
    }

    pub fn end(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.handled += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_counts_never_underflow() {
        let mut a = Activity::default();
        a.begin();
        a.end();
        a.end();
        assert_eq!(a.pending, 0);
        assert_eq!(a.handled, 2);
        a.reset();
        assert_eq!(a.handled, 0);
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("staff"), Some(Role::Staff));
        assert_eq!(Role::parse("student"), None);
    }
}
