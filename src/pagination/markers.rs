//! Marker registry for running headers and footers.
//!
//! Blocks declare `fo:marker` children keyed by class name; static content
//! pulls them back with `fo:retrieve-marker`. The registry tracks, per class
//! and per page, the first and last markers whose blocks start or end on the
//! page, plus the carryover from earlier pages. Static regions are laid out
//! after the page's flow content precisely so this registry is complete when
//! they ask.

use std::collections::BTreeMap;

use crate::fo::NodeId;
use crate::properties::RetrievePosition;

#[derive(Debug, Clone, Copy, Default)]
struct ClassEntry {
    /// Marker in effect when the page began (last marker of earlier pages).
    carryover: Option<NodeId>,
    first_starting: Option<NodeId>,
    last_starting: Option<NodeId>,
    last_ending: Option<NodeId>,
}

/// Per-page marker state for one page sequence.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    classes: BTreeMap<String, ClassEntry>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new page: the last marker seen becomes the carryover and the
    /// per-page firsts and lasts reset.
    pub fn start_page(&mut self) {
        for entry in self.classes.values_mut() {
            let effective = entry
                .last_ending
                .or(entry.last_starting)
                .or(entry.carryover);
            *entry = ClassEntry { carryover: effective, ..ClassEntry::default() };
        }
    }

    /// A block carrying this marker *starts* on the current page.
    pub fn block_started(&mut self, class: &str, marker: NodeId) {
        let entry = self.classes.entry(class.to_string()).or_default();
        if entry.first_starting.is_none() {
            entry.first_starting = Some(marker);
        }
        entry.last_starting = Some(marker);
    }

    /// A block carrying this marker *ends* on the current page. A block that
    /// carries over contributes here only on the page where it finishes.
    pub fn block_ended(&mut self, class: &str, marker: NodeId) {
        let entry = self.classes.entry(class.to_string()).or_default();
        entry.last_ending = Some(marker);
    }

    /// Resolve a retrieve-marker for the current page.
    pub fn retrieve(&self, class: &str, position: RetrievePosition) -> Option<NodeId> {
        let entry = self.classes.get(class)?;
        match position {
            RetrievePosition::FirstStartingWithinPage => entry.first_starting,
            RetrievePosition::FirstIncludingCarryover => {
                entry.carryover.or(entry.first_starting)
            }
            RetrievePosition::LastStartingWithinPage => entry.last_starting,
            RetrievePosition::LastEndingWithinPage => entry.last_ending,
        }
    }
}
