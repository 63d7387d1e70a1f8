use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Loop nesting used to order relevant precincts.
///
/// Letters name the loops from outermost to innermost: Tile, Resolution,
/// Component, Precinct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionOrder {
    #[default]
    Trcp,
    Tcrp,
    Tcpr,
    Trpc,
    Tpcr,
}

impl ProgressionOrder {
    pub const ALL: [ProgressionOrder; 5] = [
        ProgressionOrder::Trcp,
        ProgressionOrder::Tcrp,
        ProgressionOrder::Tcpr,
        ProgressionOrder::Trpc,
        ProgressionOrder::Tpcr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressionOrder::Trcp => "TRCP",
            ProgressionOrder::Tcrp => "TCRP",
            ProgressionOrder::Tcpr => "TCPR",
            ProgressionOrder::Trpc => "TRPC",
            ProgressionOrder::Tpcr => "TPCR",
        }
    }
}

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
