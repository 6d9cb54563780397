use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    Ethics,
    Assessment,
    Interventions,
    Communication,
}

// Checked in order, first hit wins.
const PREFIXES: [(&str, Domain); 7] = [
    ("ethic", Domain::Ethics),
    ("assess", Domain::Assessment),
    ("interv", Domain::Interventions),
    ("treat", Domain::Interventions),
    ("therap", Domain::Interventions),
    ("commun", Domain::Communication),
    ("comms", Domain::Communication),
];

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Ethics,
        Domain::Assessment,
        Domain::Interventions,
        Domain::Communication,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::Ethics => "Ethics",
            Domain::Assessment => "Assessment",
            Domain::Interventions => "Interventions",
            Domain::Communication => "Communication",
        }
    }

    /// Maps free text onto the closed vocabulary by case-insensitive prefix.
    /// Returns `None` for anything that does not fit, which leaves the record unlabeled.
    pub fn canonicalize(raw: &str) -> Option<Domain> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        PREFIXES
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix))
            .map(|(_, domain)| *domain)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which domains a quiz draws from. An empty list, or any entry spelling "all", selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    requested: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(requested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DomainFilter {
            requested: requested
                .into_iter()
                .map(|s| {
                    let s: String = s.into();
                    s.trim().to_owned()
                })
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.requested.is_empty() || self.requested.iter().any(|d| d.eq_ignore_ascii_case("all"))
    }

    /// Unlabeled records only pass an "all" filter.
    pub fn accepts(&self, domain: Option<Domain>) -> bool {
        if self.is_all() {
            return true;
        }
        let Some(domain) = domain else {
            return false;
        };
        self.requested.iter().any(|requested| {
            requested.eq_ignore_ascii_case(domain.label())
                || Domain::canonicalize(requested) == Some(domain)
        })
    }
}
