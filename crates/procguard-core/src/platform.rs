use strum::{Display, EnumString};

/// Operating system family the agent is running on.
///
/// Platform specific behaviour (default ignore lists, executable locking) is
/// selected at runtime from this value instead of being scattered across
/// `cfg` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    /// Returns the platform this binary was built for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_platform_matches_target() {
        let platform = Platform::current();
        if cfg!(target_os = "linux") {
            assert_eq!(platform, Platform::Linux);
        }
        assert_eq!("windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!(Platform::MacOs.to_string(), "macos");
    }
}
