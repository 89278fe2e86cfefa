//! Memory map parsing for address-to-module resolution
//!
//! This module parses the `/proc/pid/maps` text attached to a crash report
//! into a [`MemoryMapTable`], which turns raw (ASLR-randomized) return
//! addresses into stable `module + offset` pairs.

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{MapParseError, MappedRegion};

/// Addresses below this are debugger artifacts, never real code.
pub const MIN_CODE_ADDRESS: u64 = 0x1000;

/// `start-end perms offset dev inode   path`
///
/// Library paths can contain single spaces, but the kernel pads the inode
/// column so the path is always preceded by two or more spaces.
static MAPS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]+)-([0-9a-fA-F]+).*\s{2,}(\S.*)$").unwrap());

/// Range only, for anonymous mappings and lines whose path can't be located.
static MAPS_RANGE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]+)-([0-9a-fA-F]+)(?:\s|$)").unwrap());

/// Ordered table of mapped regions for one report.
///
/// Built once per report and borrowed by the signature builder; there is no
/// process-wide cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryMapTable {
    regions: Vec<MappedRegion>,
}

impl MemoryMapTable {
    /// Parse maps text into a table.
    ///
    /// Lines whose path can't be identified become range-only entries; lines
    /// without even a hex range are dropped.
    ///
    /// # Errors
    /// Returns [`MapParseError::NoValidLines`] if no line yielded a range.
    pub fn build(maps_text: &str) -> Result<Self, MapParseError> {
        let mut regions = Vec::new();
        let mut examined = 0usize;

        for line in maps_text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            examined += 1;

            match parse_map_line(line) {
                Some(region) => regions.push(region),
                None => debug!("Skipping unparsable maps line: {line:?}"),
            }
        }

        if regions.is_empty() {
            return Err(MapParseError::NoValidLines { lines: examined });
        }

        let unknown = regions.iter().filter(|r| r.module.is_none()).count();
        info!("Parsed {} memory regions ({unknown} without module)", regions.len());

        Ok(Self { regions })
    }

    /// Resolve an address to `(module, offset from region start)`.
    ///
    /// Returns `None` for addresses below [`MIN_CODE_ADDRESS`], addresses
    /// outside every region, and range-only regions.
    #[must_use]
    pub fn resolve(&self, addr: u64) -> Option<(&str, u64)> {
        if addr < MIN_CODE_ADDRESS {
            return None;
        }

        // Regions come in kernel order (ascending start) so the first hit wins
        let region = self.regions.iter().find(|r| r.contains(addr))?;
        let module = region.module.as_deref()?;
        Some((module, addr - region.start))
    }

    /// All parsed regions in input order.
    #[must_use]
    pub fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Parse a single maps line, falling back to a range-only entry.
fn parse_map_line(line: &str) -> Option<MappedRegion> {
    if let Some(caps) = MAPS_LINE.captures(line) {
        let start = u64::from_str_radix(&caps[1], 16).ok()?;
        let end = u64::from_str_radix(&caps[2], 16).ok()?;
        let module = caps[3].trim_end().to_string();
        return Some(MappedRegion { start, end, module: Some(module) });
    }

    let caps = MAPS_RANGE_ONLY.captures(line)?;
    let start = u64::from_str_radix(&caps[1], 16).ok()?;
    let end = u64::from_str_radix(&caps[2], 16).ok()?;
    Some(MappedRegion { start, end, module: None })
}
