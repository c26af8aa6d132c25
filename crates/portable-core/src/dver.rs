use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Enterprise Linux major versions that tarballs can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dver {
    El8,
    El9,
    El10,
}

impl Dver {
    pub const ALL: [Dver; 3] = [Dver::El8, Dver::El9, Dver::El10];

    pub fn as_str(self) -> &'static str {
        match self {
            Dver::El8 => "el8",
            Dver::El9 => "el9",
            Dver::El10 => "el10",
        }
    }

    /// Comma-separated list of every supported value, for help and error text.
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Dver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dver {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidDver(s.to_owned()))
    }
}

/// Which OSG repository set the image build pulls packages from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsgRepo {
    Production,
    Osg,
    #[default]
    Testing,
    Development,
}

impl OsgRepo {
    /// Repositories enabled on top of the release repos.
    pub fn extra_repos(self) -> &'static [&'static str] {
        match self {
            OsgRepo::Production | OsgRepo::Osg => &[],
            OsgRepo::Testing => &["osg-testing"],
            OsgRepo::Development => &["osg-development"],
        }
    }

    /// Package manager flags that enable [`Self::extra_repos`].
    pub fn yum_flags(self) -> Vec<String> {
        self.extra_repos()
            .iter()
            .map(|repo| format!("--enablerepo={repo}"))
            .collect()
    }
}

impl fmt::Display for OsgRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OsgRepo::Production => "production",
            OsgRepo::Osg => "osg",
            OsgRepo::Testing => "testing",
            OsgRepo::Development => "development",
        })
    }
}

impl FromStr for OsgRepo {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(OsgRepo::Production),
            "osg" => Ok(OsgRepo::Osg),
            "testing" => Ok(OsgRepo::Testing),
            "development" => Ok(OsgRepo::Development),
            other => Err(crate::Error::InvalidRepo(other.to_owned())),
        }
    }
}
