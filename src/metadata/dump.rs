use serde::Serialize;
use std::{collections::BTreeMap, fmt};

use crate::key_store::DynamicKeyType;

/// Namespaces enumerated by a full dump, `"default"` being all keys.
pub const NAMESPACES: [&str; 8] = [
    "default",
    "ls",
    "geography",
    "mars",
    "parameter",
    "statistics",
    "time",
    "vertical",
];

/// Namespace shown first when a dump is displayed.
const SELECTED: &str = "parameter";

/// Namespaces included in a dump.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DumpSelection {
    /// All namespaces of the metadata.
    #[default]
    All,
    /// The default namespace, holding every key.
    Default,
    One(String),
    Many(Vec<String>),
}

impl DumpSelection {
    pub(crate) fn resolve(&self, all: &[&str]) -> Vec<String> {
        match self {
            DumpSelection::All => all.iter().map(|ns| (*ns).to_owned()).collect(),
            DumpSelection::Default => vec!["default".to_owned()],
            DumpSelection::One(ns) => vec![ns.clone()],
            DumpSelection::Many(namespaces) => namespaces.clone(),
        }
    }
}

/// Keys of one namespace in a [`NamespaceDump`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamespaceSection {
    pub title: String,
    pub tooltip: String,
    pub data: BTreeMap<String, DynamicKeyType>,
}

/// Keys and values grouped by namespace.
///
/// Empty namespaces are not included. `Display` prints one table per namespace,
/// starting with the selected one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamespaceDump {
    pub sections: Vec<NamespaceSection>,
    pub selected: Option<String>,
    pub details: String,
}

impl NamespaceDump {
    pub(crate) fn new(details: &str) -> Self {
        Self {
            sections: vec![],
            selected: None,
            details: details.to_owned(),
        }
    }

    pub(crate) fn push(&mut self, namespace: &str, data: BTreeMap<String, DynamicKeyType>) {
        if data.is_empty() {
            return;
        }

        let title = if namespace.is_empty() {
            "default"
        } else {
            namespace
        };

        if title == SELECTED {
            self.selected = Some(title.to_owned());
        }

        self.sections.push(NamespaceSection {
            title: title.to_owned(),
            tooltip: format!("Keys in the ecCodes {title} namespace"),
            data,
        });
    }

    pub fn titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    pub fn section(&self, title: &str) -> Option<&NamespaceSection> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl fmt::Display for NamespaceDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selected = self
            .selected
            .as_deref()
            .and_then(|title| self.section(title));

        let rest = self
            .sections
            .iter()
            .filter(|s| Some(s.title.as_str()) != self.selected.as_deref());

        for section in selected.into_iter().chain(rest) {
            writeln!(f, "[{}]", section.title)?;
            let width = section.data.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in &section.data {
                writeln!(f, "  {key:<width$}  {value}")?;
            }
        }
        Ok(())
    }
}
