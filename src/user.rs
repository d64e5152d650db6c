//! Current-user collaborator.

use crate::model::CustomerInfo;

/// Supplies the customer details attached to quotes the current user creates.
pub trait UserInfoProvider: Send + Sync {
    fn customer_info(&self) -> CustomerInfo;
}

/// Provider returning the same details every time.
#[derive(Clone, Debug, Default)]
pub struct StaticUserInfo {
    info: CustomerInfo,
}

impl StaticUserInfo {
    pub fn new(info: CustomerInfo) -> Self {
        StaticUserInfo { info }
    }

    /// Set one field, e.g. `.with("name", "Ada")`.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.info.insert(key.to_string(), value.into());
        self
    }
}

impl UserInfoProvider for StaticUserInfo {
    fn customer_info(&self) -> CustomerInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_user_info() {
        let provider = StaticUserInfo::default()
            .with("name", "O'Brien")
            .with("country", "IE");
        let info = provider.customer_info();
        assert_eq!(info["name"], "O'Brien");
        assert_eq!(info.len(), 2);
    }
}
