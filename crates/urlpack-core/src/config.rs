use std::fmt;
use std::str::FromStr;

/// Release channel; each channel keeps its own cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Stable,
    Nightly,
    Dev,
}

impl Channel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Nightly => "nightly",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    /// Case-insensitive channel name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "nightly" => Ok(Self::Nightly),
            "dev" => Ok(Self::Dev),
            _ => Err(format!("unknown channel '{s}' (expected stable, nightly or dev)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_str() {
        assert_eq!("stable".parse(), Ok(Channel::Stable));
        assert_eq!("NIGHTLY".parse(), Ok(Channel::Nightly));
        assert_eq!("dev".parse(), Ok(Channel::Dev));
        assert!("beta".parse::<Channel>().unwrap_err().contains("beta"));
    }
}
