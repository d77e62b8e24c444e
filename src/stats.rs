//! User statistics header.
//!
//! Formats the `/api/v1/user/stats` payload the way the site's navbar shows
//! it: transfer volumes in binary units, ratio to three decimals.

use std::fmt;

use crate::model::UserStats;

const PREFIXES: [&str; 9] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];

/// Humanize a byte count with binary prefixes.
///
/// Below 1 KiB the count is printed whole (`512 B`); above it, with two
/// decimals (`1.50 KiB`). The sign is preserved, and `Yi` is the largest unit.
pub fn data_size(amount: i64) -> String {
    let negative = amount < 0;
    let mut value = (amount as f64).abs();
    let mut prefix = 0;

    while value >= 1024.0 && prefix < PREFIXES.len() - 1 {
        value /= 1024.0;
        prefix += 1;
    }

    if negative {
        value = -value;
    }

    if prefix == 0 {
        format!("{value:.0} B")
    } else {
        format!("{value:.2} {}B", PREFIXES[prefix])
    }
}

/// Display-ready user stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsHeader {
    pub name: String,
    pub downloads: String,
    pub downloaded: String,
    pub uploads: String,
    pub uploaded: String,
    pub ratio: String,
}

impl From<&UserStats> for StatsHeader {
    fn from(stats: &UserStats) -> Self {
        StatsHeader {
            name: stats.name.clone(),
            downloads: stats.downloads.to_string(),
            downloaded: data_size(stats.downloaded),
            uploads: stats.uploads.to_string(),
            uploaded: data_size(stats.uploaded),
            ratio: format!("{:.3}", stats.ratio),
        }
    }
}

impl fmt::Display for StatsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | down {} ({}) | up {} ({}) | ratio {}",
            self.name, self.downloads, self.downloaded, self.uploads, self.uploaded, self.ratio
        )
    }
}
