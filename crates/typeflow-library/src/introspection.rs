//! Element identification and querying.
//!
//! Querying and counting are fundamentally tied to layout: an element's
//! position relative to others is only known once the document has been
//! paginated, and Typeflow resolves this with a multi-pass, converging
//! introspector. The evaluator in this crate never lays anything out, so the
//! [`Introspector`] here is a flat, single-pass stand-in: it answers queries
//! against whatever content has been registered with it so far, in document
//! order, and does not converge. A host that adds real layout is expected to
//! replace it with one that does.

use std::fmt::{self, Debug, Formatter};

use ecow::{eco_format, EcoVec};

use crate::diag::{bail, HintedStrResult};
use crate::foundations::{ty, Content, Repr, Selector};

/// Marks an element as locatable.
///
/// Only locatable elements can be used with [`query`] and as counter/state
/// keys, since only they carry a [`Location`] once placed into the document.
pub trait Locatable {}

/// Marks an element as excluded from locatability checks even though it is
/// otherwise a normal element (used for elements that are locatable in
/// principle but should not be selected directly, e.g. internal markers).
pub trait Unqueriable {}

/// Identifies an element in the document.
///
/// A location is always tied to an element's position, which is only
/// guaranteed to be meaningful once the document has passed through layout.
/// In the evaluator alone, locations only serve to give content identity and
/// a stable hash.
#[ty]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Location(u128);

impl Location {
    /// Create a new location from a unique hash.
    pub fn new(hash: u128) -> Self {
        Self(hash)
    }

    /// Extract the raw hash.
    pub fn hash(self) -> u128 {
        self.0
    }

    /// Produces a well-known variant of this location, with a different
    /// `n` producing different, but stable, locations.
    ///
    /// This is used for elements that are synthesized from another element,
    /// and need their own identity derived from the original location.
    pub fn variant(self, n: usize) -> Self {
        Self(typeflow_utils::hash128(&(self.0, n)))
    }
}

impl Debug for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Location({:x})", self.0)
    }
}

impl Repr for Location {
    fn repr(&self) -> ecow::EcoString {
        eco_format!("..")
    }
}

/// Tracks locatable content that has been registered with it, in document
/// order.
///
/// Real Typeflow layout converges this over multiple passes; the evaluator
/// only ever sees a single, append-only pass, so queries here reflect
/// exactly what has been pushed so far, not the final document.
#[derive(Default, Clone)]
pub struct Introspector {
    items: EcoVec<Content>,
}

impl Introspector {
    /// Register a piece of located content for later querying.
    pub fn push(&mut self, content: Content) {
        self.items.push(content);
    }
}

#[comemo::track]
impl Introspector {
    /// Whether the introspector carries any information at all.
    pub fn init(&self) -> bool {
        !self.items.is_empty()
    }

    /// All elements matching the selector, in document order.
    pub fn query(&self, selector: &Selector) -> EcoVec<Content> {
        self.items.iter().filter(|c| selector.matches(c, None)).cloned().collect()
    }

    /// The first element matching the selector.
    pub fn query_first(&self, selector: &Selector) -> Option<Content> {
        self.items.iter().find(|c| selector.matches(c, None)).cloned()
    }

    /// The single element matching the selector; errors if there isn't
    /// exactly one match.
    pub fn query_unique(&self, selector: &Selector) -> HintedStrResult<Content> {
        let mut matches = self.items.iter().filter(|c| selector.matches(c, None));
        let Some(first) = matches.next() else {
            bail!("selector does not match any element")
        };
        if matches.next().is_some() {
            bail!("selector matches multiple elements")
        }
        Ok(first.clone())
    }
}

mod counter;
mod state;

pub use self::counter::{Counter, CounterKey};
pub use self::state::State;
