/// Build version; `APP_VERSION` at compile time overrides the crate version.
pub const VERSION: &str = match option_env!("APP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// `User-Agent` sent to the Hypixel and Mojang APIs.
pub fn user_agent() -> String {
    format!("{}/{VERSION}", env!("CARGO_PKG_NAME"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(user_agent(), format!("hypixel-watch/{VERSION}"));
    }
}
