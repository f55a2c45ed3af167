//! Composite document format - four bracketed sections in a fixed order.
//!
//! The byte layout produced by [`assemble`] is the wire contract with the
//! remote renderer and the on-disk format of stored filters:
//!
//! ```text
//! [VARS]
//! <vars>
//!
//! [FILTERS]
//! <filters>
//!
//! [COMPOSITION]
//! <composition>
//!
//! [LAYERS]
//! <layers>
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four named sections of a composite document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Vars,
    Filters,
    Composition,
    Layers,
}

impl Section {
    /// All sections in document order.
    pub const ALL: [Section; 4] = [
        Section::Vars,
        Section::Filters,
        Section::Composition,
        Section::Layers,
    ];

    /// The header name, as written between brackets.
    pub fn name(self) -> &'static str {
        match self {
            Section::Vars => "VARS",
            Section::Filters => "FILTERS",
            Section::Composition => "COMPOSITION",
            Section::Layers => "LAYERS",
        }
    }

    /// Parse a section name (case-sensitive, as in headers).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Recognize a header line such as `[VARS]`.
    ///
    /// Surrounding whitespace (including the line terminator) is ignored.
    /// Brackets around anything outside the closed set are not a header.
    pub fn from_header(line: &str) -> Option<Self> {
        let name = line.trim().strip_prefix('[')?.strip_suffix(']')?;
        Self::from_name(name)
    }

    fn index(self) -> usize {
        match self {
            Section::Vars => 0,
            Section::Filters => 1,
            Section::Composition => 2,
            Section::Layers => 3,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Join four section bodies into one document.
pub fn assemble(vars: &str, filters: &str, composition: &str, layers: &str) -> String {
    let mut out = String::with_capacity(
        vars.len() + filters.len() + composition.len() + layers.len() + 48,
    );
    out.push_str("[VARS]\n");
    out.push_str(vars);
    out.push_str("\n\n[FILTERS]\n");
    out.push_str(filters);
    out.push_str("\n\n[COMPOSITION]\n");
    out.push_str(composition);
    out.push_str("\n\n[LAYERS]\n");
    out.push_str(layers);
    out.push('\n');
    out
}

/// Sections recovered from a document by [`split`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSections {
    bodies: [Option<String>; 4],
}

impl SplitSections {
    /// Body of a section, if its header was present.
    pub fn get(&self, section: Section) -> Option<&str> {
        self.bodies[section.index()].as_deref()
    }

    /// Body of a section, only if present and non-empty.
    pub fn non_empty(&self, section: Section) -> Option<&str> {
        self.get(section).filter(|body| !body.is_empty())
    }

    /// Number of sections whose header was present.
    pub fn len(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Present sections in document order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        Section::ALL
            .into_iter()
            .filter_map(|s| self.get(s).map(|body| (s, body)))
    }

    fn set(&mut self, section: Section, body: &str) {
        self.bodies[section.index()] = Some(body.to_string());
    }
}

/// Split a document back into its sections.
///
/// Each body runs from the line after its header to the next header line (or
/// end of text) and is trimmed. A repeated header overrides the earlier body.
pub fn split(text: &str) -> SplitSections {
    let mut out = SplitSections::default();
    let mut current: Option<(Section, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if let Some(section) = Section::from_header(line) {
            if let Some((open, start)) = current.take() {
                out.set(open, text[start..offset].trim());
            }
            current = Some((section, offset + line.len()));
        }
        offset += line.len();
    }

    if let Some((open, start)) = current {
        out.set(open, text[start..].trim());
    }

    out
}

/// The four editable buffers of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBuffers {
    pub vars: String,
    pub filters: String,
    pub composition: String,
    pub layers: String,
}

impl SectionBuffers {
    /// Build buffers from a document, leaving absent sections empty.
    pub fn from_document(text: &str) -> Self {
        let mut buffers = Self::default();
        buffers.apply(&split(text));
        buffers
    }

    pub fn get(&self, section: Section) -> &str {
        match section {
            Section::Vars => &self.vars,
            Section::Filters => &self.filters,
            Section::Composition => &self.composition,
            Section::Layers => &self.layers,
        }
    }

    pub fn set(&mut self, section: Section, text: impl Into<String>) {
        let slot = match section {
            Section::Vars => &mut self.vars,
            Section::Filters => &mut self.filters,
            Section::Composition => &mut self.composition,
            Section::Layers => &mut self.layers,
        };
        *slot = text.into();
    }

    /// The composite document for the current buffer contents.
    pub fn assemble(&self) -> String {
        assemble(&self.vars, &self.filters, &self.composition, &self.layers)
    }

    /// Overwrite buffers with the non-empty sections of `split`.
    ///
    /// Returns the sections that were replaced, in document order.
    pub fn apply(&mut self, split: &SplitSections) -> Vec<Section> {
        let mut replaced = Vec::new();
        for section in Section::ALL {
            if let Some(body) = split.non_empty(section) {
                self.set(section, body);
                replaced.push(section);
            }
        }
        replaced
    }
}
