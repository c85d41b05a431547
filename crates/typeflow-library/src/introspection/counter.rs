use std::num::NonZeroUsize;
use std::str::FromStr;

use comemo::Tracked;
use ecow::{eco_format, EcoString};
use smallvec::{smallvec, SmallVec};

use crate::diag::{bail, At, HintedStrResult, SourceResult};
use crate::engine::Engine;
use crate::foundations::{
    cast, elem, func, scope, ty, Args, Array, Construct, Content, Context, Func,
    IntoValue, Label, LocatableSelector, NativeElement, Repr, Selector, Smart, Str, Value,
};
use crate::introspection::{Locatable, Location};
use crate::model::{Numbering, NumberingPattern};

/// Counts through elements and custom keys across the document.
///
/// Since a counter's value changes as content is produced, its current
/// value is _contextual_: reading it requires a [context] or a location.
///
/// Counter updates (`step`, `update`) take effect wherever the content they
/// return ends up in the document. This crate evaluates code but never lays
/// documents out, so `get`, `at`, and `final` answer against whatever
/// updates have been registered with the introspector so far, in the order
/// they were produced — a host that adds real layout determines that order
/// by page position instead.
#[ty(scope)]
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Counter(CounterKey);

impl Counter {
    /// Create a new counter identified by a key.
    pub fn new(key: CounterKey) -> Counter {
        Self(key)
    }

    /// Selects all counter updates for any counter.
    pub fn select_any() -> Selector {
        CounterUpdateElem::elem().select()
    }

    /// The selector relevant for this counter's updates.
    pub fn select(&self) -> Selector {
        CounterUpdateElem::elem().select()
    }

    /// Folds every registered update for this counter, in document order,
    /// stopping once `bound` is reached (exclusive) if given.
    fn sequence(
        &self,
        engine: &mut Engine,
        bound: Option<Location>,
    ) -> SourceResult<CounterState> {
        let mut state = CounterState::init();
        for content in engine.introspector.query(&self.select()) {
            if bound.is_some_and(|loc| content.location() == Some(loc)) {
                break;
            }
            let Some(packed) = content.to_packed::<CounterUpdateElem>() else { continue };
            if packed.key != self.0 {
                continue;
            }
            state.update(engine, packed.update.clone())?;
        }
        Ok(state)
    }
}

#[scope]
impl Counter {
    /// Create a new counter identified by a key.
    #[func(constructor)]
    pub fn construct(
        /// The key that identifies this counter globally.
        ///
        /// - If it is a string, creates a custom counter only affected by
        ///   manual updates.
        /// - If it is a [selector], counts through elements that match it.
        key: CounterKey,
    ) -> Counter {
        Self::new(key)
    }

    /// Retrieves the value of the counter at the current location.
    #[func(contextual)]
    pub fn get(
        &self,
        engine: &mut Engine,
        context: Tracked<Context>,
        span: typeflow_syntax::Span,
    ) -> SourceResult<CounterState> {
        let loc = context.location().at(span)?;
        self.sequence(engine, Some(loc))
    }

    /// Displays the value of the counter with a numbering.
    #[func(contextual)]
    pub fn display(
        self,
        engine: &mut Engine,
        context: Tracked<Context>,
        span: typeflow_syntax::Span,
        /// How to format the counter's value. Defaults to `{"1.1"}`.
        #[default]
        numbering: Smart<Numbering>,
    ) -> SourceResult<Value> {
        let loc = context.location().at(span)?;
        let state = self.sequence(engine, Some(loc))?;
        let numbering = numbering
            .custom()
            .unwrap_or_else(|| NumberingPattern::from_str("1.1").unwrap().into());
        state.display(&numbering).at(span)
    }

    /// Retrieves the value of the counter at the given location.
    #[func(contextual)]
    pub fn at(
        &self,
        engine: &mut Engine,
        context: Tracked<Context>,
        span: typeflow_syntax::Span,
        /// The place at which the counter's value should be retrieved.
        selector: LocatableSelector,
    ) -> SourceResult<CounterState> {
        let loc = selector.resolve_unique(engine.introspector, context).at(span)?;
        self.sequence(engine, Some(loc))
    }

    /// Retrieves the value of the counter at the end of the document.
    #[func(contextual)]
    pub fn final_(
        &self,
        engine: &mut Engine,
        context: Tracked<Context>,
        span: typeflow_syntax::Span,
    ) -> SourceResult<CounterState> {
        context.introspect().at(span)?;
        self.sequence(engine, None)
    }

    /// Increases the value of the counter by one.
    #[func]
    pub fn step(
        self,
        span: typeflow_syntax::Span,
        /// The depth at which to step the counter. Defaults to `{1}`.
        #[named]
        #[default(NonZeroUsize::ONE)]
        level: NonZeroUsize,
    ) -> Content {
        self.update(span, CounterUpdate::Step(level))
    }

    /// Updates the value of the counter.
    #[func]
    pub fn update(
        self,
        span: typeflow_syntax::Span,
        /// If given an integer or array of integers, sets the counter to
        /// that value. If given a function, it receives the previous state
        /// and must return the new one.
        update: CounterUpdate,
    ) -> Content {
        CounterUpdateElem::new(self.0, update).pack().spanned(span)
    }
}

impl Repr for Counter {
    fn repr(&self) -> EcoString {
        eco_format!("counter({})", self.0.repr())
    }
}

/// Identifies a counter.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum CounterKey {
    /// Counts elements matching the given selector. Only works for
    /// [locatable]($location/#locatable) elements or labels.
    Selector(Selector),
    /// Counts through manual counters with the same key.
    Str(Str),
}

cast! {
    CounterKey,
    self => match self {
        Self::Selector(v) => v.into_value(),
        Self::Str(v) => v.into_value(),
    },
    v: Str => Self::Str(v),
    v: Label => Self::Selector(Selector::Label(v)),
    v: LocatableSelector => Self::Selector(v.0),
}

impl Repr for CounterKey {
    fn repr(&self) -> EcoString {
        match self {
            Self::Selector(selector) => selector.repr(),
            Self::Str(str) => str.repr(),
        }
    }
}

/// An update to perform on a counter.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum CounterUpdate {
    /// Set the counter to the specified state.
    Set(CounterState),
    /// Increase the number for the given level by one.
    Step(NonZeroUsize),
    /// Apply the given function to the counter's state.
    Func(Func),
}

cast! {
    CounterUpdate,
    v: CounterState => Self::Set(v),
    v: Func => Self::Func(v),
}

/// The value of a counter, as a sequence of numbers for each level.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct CounterState(pub SmallVec<[u64; 3]>);

impl CounterState {
    /// The initial, zeroed-out counter state.
    pub fn init() -> Self {
        Self(smallvec![0])
    }

    /// Advance the counter.
    pub fn update(&mut self, engine: &mut Engine, update: CounterUpdate) -> SourceResult<()> {
        match update {
            CounterUpdate::Set(state) => *self = state,
            CounterUpdate::Step(level) => self.step(level, 1),
            CounterUpdate::Func(func) => {
                *self = func
                    .call(engine, Context::none().track(), self.0.iter().copied())?
                    .cast()
                    .at(func.span())?
            }
        }
        Ok(())
    }

    /// Advance the number of the given level by the specified amount.
    pub fn step(&mut self, level: NonZeroUsize, by: u64) {
        let level = level.get();
        while self.0.len() < level {
            self.0.push(0);
        }
        self.0[level - 1] = self.0[level - 1].saturating_add(by);
        self.0.truncate(level);
    }

    /// Display the counter state with a numbering.
    pub fn display(&self, numbering: &Numbering) -> HintedStrResult<Value> {
        numbering.apply(&self.0)
    }
}

cast! {
    CounterState,
    self => Value::Array(self.0.into_iter().map(IntoValue::into_value).collect()),
    num: u64 => Self(smallvec![num]),
    array: Array => Self(array
        .into_iter()
        .map(Value::cast)
        .collect::<HintedStrResult<_>>()?),
}

/// Executes an update of a counter. Produced by [`Counter::step`] and
/// [`Counter::update`]; carries no visible content of its own.
#[elem(Construct, Locatable)]
pub struct CounterUpdateElem {
    /// The key that identifies the counter.
    #[required]
    key: CounterKey,
    /// The update to perform on the counter.
    #[required]
    #[internal]
    update: CounterUpdate,
}

impl Construct for CounterUpdateElem {
    fn construct(_: &mut Engine, args: &mut Args) -> SourceResult<Content> {
        bail!(args.span, "cannot be constructed manually");
    }
}
