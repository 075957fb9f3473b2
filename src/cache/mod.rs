//! Tiered thumbnail cache: memory, then disk, then network.
//!
//! Thumbnails are identified by a [`CacheKey`]: the [`Fingerprint`] of the
//! thumbnail's path on the media center plus the requested size [`Tier`].
//! [`TieredCache`] resolves a key through three worker loops:
//!
//! ```text
//! memcache loop   memory tier hit ───────────────────────────► Memory
//!       │ miss
//! diskcache loop  disk tier hit ──► repopulate memory ───────► Disk
//!       │ miss
//!                 known unavailable ─────────────────────────► Placeholder
//!                 download pending ──► join, same outcome
//!       │ otherwise
//! download loop   fetch ──► decode, fit to tier ──► disk + memory ► Network
//!                       └─► empty/failed/undecodable ──► mark unavailable ► Placeholder
//! ```
//!
//! At most one download per key is in flight; a key marked unavailable is
//! never downloaded again for the lifetime of the cache.
//!
//! The memory tier is a count-bounded LRU per tier, so eviction is
//! deterministic rather than driven by memory pressure.

mod disk;
mod memory;
mod thumbnail;
mod tiered;

use std::{fmt, str::FromStr};

pub use disk::{DiskStore, FsDiskStore};
pub use memory::MemoryTier;
pub use thumbnail::Thumbnail;
pub use tiered::{CacheStats, TieredCache};

use crate::error::{Error, Result};

/// Checksum identifying a thumbnail independent of its size variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u32);

impl Fingerprint {
    #[must_use]
    pub const fn new(checksum: u32) -> Self {
        Self(checksum)
    }

    /// Computes the fingerprint of a thumbnail reference.
    ///
    /// References are compared case-insensitively, as the media center's
    /// paths are.
    #[must_use]
    pub fn of(reference: &str) -> Self {
        let mut crc = flate2::Crc::new();
        crc.update(reference.to_lowercase().as_bytes());
        Self(crc.sum())
    }

    #[must_use]
    pub const fn checksum(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    /// Parses a hexadecimal checksum, with or without an `fp:` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.strip_prefix("fp:").unwrap_or(s);
        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|e| Error::invalid_argument(format!("invalid fingerprint {s:?}: {e}")))
    }
}

/// Requested size variant of a thumbnail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// List entries.
    #[default]
    Small,
    /// Detail views.
    Medium,
    /// Original size, as downloaded.
    Big,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Big];

    /// Largest width or height stored for this tier, if bounded.
    #[must_use]
    pub const fn bound(self) -> Option<u32> {
        match self {
            Self::Small => Some(96),
            Self::Medium => Some(256),
            Self::Big => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Big => "big",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_argument(format!("unknown tier {s:?}")))
    }
}

/// Identifies one cached thumbnail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub tier: Tier,
}

impl CacheKey {
    #[must_use]
    pub const fn new(fingerprint: Fingerprint, tier: Tier) -> Self {
        Self { fingerprint, tier }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fp:{}/{}", self.fingerprint, self.tier)
    }
}

/// A thumbnail that can be downloaded from the media center.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cover {
    pub fingerprint: Fingerprint,
    /// Path of the thumbnail on the media center.
    pub reference: String,
}

impl Cover {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            fingerprint: Fingerprint::of(&reference),
            reference,
        }
    }

    /// Creates a cover with a known fingerprint.
    pub fn with_fingerprint(fingerprint: Fingerprint, reference: impl Into<String>) -> Self {
        Self {
            fingerprint,
            reference: reference.into(),
        }
    }

    #[must_use]
    pub fn key(&self, tier: Tier) -> CacheKey {
        CacheKey::new(self.fingerprint, tier)
    }
}

/// Where a resolved thumbnail came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Memory,
    Disk,
    Network,
    /// The thumbnail is known to be unavailable; a default image stands in.
    Placeholder,
}

/// A thumbnail handed to the caller.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub thumbnail: Thumbnail,
    pub source: Source,
}

impl Resolution {
    #[must_use]
    pub fn new(thumbnail: Thumbnail, source: Source) -> Self {
        Self { thumbnail, source }
    }

    #[must_use]
    pub fn placeholder(tier: Tier) -> Self {
        Self::new(Thumbnail::placeholder(tier), Source::Placeholder)
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.source == Source::Placeholder
    }
}
