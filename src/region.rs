//! Region descriptors parsed from the regions file.
//!
//! Each non-empty line describes one region:
//!
//! ```text
//! RWR;13.10;562a90ee-fe27-40ef-ad1a-01463bf45662:1000000;AS_,AF_,AN_,SA_,OC_,EU_;
//! ```
//!
//! Fields are `NAME;VERSION;BRANCH:TRANSACTION_VERSION;SUBREGIONS;` where the
//! sub-region list is optional.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use uuid::Uuid;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum RegionParseError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("region name is empty")]
    EmptyName,

    #[error("region name '{0}' may only contain letters, digits, '_' and '-'")]
    InvalidName(String),

    #[error("expected BRANCH:TRANSACTION_VERSION, got '{0}'")]
    BranchAndVersion(String),

    #[error("invalid branch id '{value}': {source}")]
    Branch { value: String, source: uuid::Error },

    #[error("invalid transaction version '{value}': {source}")]
    TransactionVersion {
        value: String,
        source: std::num::ParseIntError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum RegionsFileError {
    #[error("failed to read regions file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Line {
        path: PathBuf,
        line: usize,
        source: RegionParseError,
    },

    #[error("duplicate region '{name}' in {path}")]
    Duplicate { path: PathBuf, name: String },

    #[error("regions file {0} does not list any region")]
    Empty(PathBuf),
}

// =============================================================================
// RegionDescriptor
// =============================================================================

/// One geographic region to push through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDescriptor {
    name: String,
    version: String,
    branch: Uuid,
    transaction_version: u64,
    subregions: Vec<String>,
}

impl RegionDescriptor {
    /// Parse a single line of the regions file.
    pub fn parse(line: &str) -> Result<Self, RegionParseError> {
        let mut fields = line.trim().split(';');

        let name = fields
            .next()
            .map(str::trim)
            .ok_or(RegionParseError::MissingField("name"))?
            .to_uppercase();
        if name.is_empty() {
            return Err(RegionParseError::EmptyName);
        }
        // The name becomes a directory name under every stage root
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RegionParseError::InvalidName(name));
        }

        let version = fields
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(RegionParseError::MissingField("version"))?
            .to_string();

        let branch_and_version = fields
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(RegionParseError::MissingField("branch"))?;
        let (branch, transaction_version) = branch_and_version
            .split_once(':')
            .ok_or_else(|| RegionParseError::BranchAndVersion(branch_and_version.to_string()))?;

        let branch = Uuid::parse_str(branch.trim()).map_err(|e| RegionParseError::Branch {
            value: branch.to_string(),
            source: e,
        })?;
        let transaction_version = transaction_version.trim().parse::<u64>().map_err(|e| {
            RegionParseError::TransactionVersion {
                value: transaction_version.to_string(),
                source: e,
            }
        })?;

        let subregions = fields
            .next()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name,
            version,
            branch,
            transaction_version,
            subregions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn branch(&self) -> Uuid {
        self.branch
    }

    pub fn transaction_version(&self) -> u64 {
        self.transaction_version
    }

    pub fn subregions(&self) -> &[String] {
        &self.subregions
    }

    /// The `<branch>:<transaction version>` token passed to the external tools.
    pub fn branch_and_version(&self) -> String {
        format!("{}:{}", self.branch, self.transaction_version)
    }
}

impl FromStr for RegionDescriptor {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.branch_and_version())
    }
}

/// Load every region from a regions file.
///
/// Blank lines and lines starting with `#` are ignored. Any malformed line
/// fails the whole load, since a partially read region list would silently
/// drop work.
pub fn load_regions(path: &Path) -> Result<Vec<RegionDescriptor>, RegionsFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| RegionsFileError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut regions: Vec<RegionDescriptor> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let region = RegionDescriptor::parse(trimmed).map_err(|e| RegionsFileError::Line {
            path: path.to_path_buf(),
            line: index + 1,
            source: e,
        })?;

        if regions.iter().any(|r| r.name == region.name) {
            return Err(RegionsFileError::Duplicate {
                path: path.to_path_buf(),
                name: region.name,
            });
        }
        regions.push(region);
    }

    if regions.is_empty() {
        return Err(RegionsFileError::Empty(path.to_path_buf()));
    }

    Ok(regions)
}
