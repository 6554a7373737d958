//! Hierarchical derivation path parsing, serialization and arithmetic.
//!
//! Paths have the `m / purpose' / coin_type' / account' / change / index`
//! shape, with any number of segments. The trailing-index increment is the
//! primitive behind sibling-account derivation (stake-account sub-wallets).

use std::fmt;
use std::str::FromStr;

use crate::core::errors::SignerError;

/// One path segment; hardened segments carry the `'` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    pub index: u32,
    pub hardened: bool,
}

impl PathSegment {
    /// BIP-32 child number (hardened bit folded in).
    pub fn child_number(&self) -> u32 {
        if self.hardened {
            0x8000_0000 | self.index
        } else {
            self.index
        }
    }
}

/// A parsed derivation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    segments: Vec<PathSegment>,
}

impl DerivationPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Child numbers with the hardened bit applied, master excluded.
    pub fn child_numbers(&self) -> Vec<u32> {
        self.segments.iter().map(PathSegment::child_number).collect()
    }

    /// Whether every segment is hardened (required by SLIP-0010 ed25519).
    pub fn all_hardened(&self) -> bool {
        self.segments.iter().all(|s| s.hardened)
    }

    /// Same path with `offset` added to the trailing index. The hardened
    /// marker and every preceding segment are preserved.
    pub fn increment(&self, offset: u32) -> Result<DerivationPath, SignerError> {
        let mut segments = self.segments.clone();
        let last = segments
            .last_mut()
            .ok_or_else(|| SignerError::KeyDerivation("cannot increment the master path".into()))?;
        last.index = last.index.checked_add(offset).ok_or_else(|| {
            SignerError::KeyDerivation(format!("path index overflow: {} + {}", last.index, offset))
        })?;
        if last.index >= 0x8000_0000 {
            return Err(SignerError::KeyDerivation(format!(
                "path index out of range after increment: {}",
                last.index
            )));
        }
        Ok(DerivationPath { segments })
    }
}

impl FromStr for DerivationPath {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => {
                return Err(SignerError::KeyDerivation(format!(
                    "derivation path must start with 'm/': {s}"
                )))
            }
        }

        let mut segments = Vec::new();
        for part in parts {
            if part.is_empty() {
                return Err(SignerError::KeyDerivation(format!(
                    "empty segment in derivation path: {s}"
                )));
            }
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h'))
            {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits.parse().map_err(|_| {
                SignerError::KeyDerivation(format!("invalid path segment '{part}' in {s}"))
            })?;
            if index >= 0x8000_0000 {
                return Err(SignerError::KeyDerivation(format!(
                    "path index out of range: {part}"
                )));
            }
            segments.push(PathSegment { index, hardened });
        }

        if segments.is_empty() {
            return Err(SignerError::KeyDerivation(format!(
                "derivation path has no segments: {s}"
            )));
        }
        Ok(DerivationPath { segments })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for segment in &self.segments {
            if segment.hardened {
                write!(f, "/{}'", segment.index)?;
            } else {
                write!(f, "/{}", segment.index)?;
            }
        }
        Ok(())
    }
}

/// String-in, string-out trailing-index increment.
pub fn increment_derivation_path(path: &str, offset: u32) -> Result<String, SignerError> {
    let parsed: DerivationPath = path.parse()?;
    Ok(parsed.increment(offset)?.to_string())
}
