use ecow::{eco_format, EcoString};

use crate::diag::{bail, At, SourceResult};
use crate::engine::Engine;
use crate::foundations::{
    cast, elem, func, scope, ty, Args, Construct, Content, Context, Func,
    LocatableSelector, NativeElement, Repr, Selector, Str, Value,
};
use crate::introspection::{Locatable, Location};

/// Manages stateful parts of your document.
///
/// Calling `state` with an identifying string key and an optional initial
/// value gives a handle that can be read with [`get`]($state.get) from a
/// [context] and advanced with [`update`]($state.update). Updates take
/// effect wherever the content they return ends up in the document, not in
/// evaluation order.
///
/// This crate never lays documents out, so `get`, `at`, and `final` fold
/// the updates that have been registered with the introspector so far, in
/// the order they were produced, rather than in final layout order.
#[ty(scope)]
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct State {
    /// The key that identifies the state.
    key: Str,
    /// The initial value of the state.
    init: Value,
}

impl State {
    /// Create a new state identified by a key.
    pub fn new(key: Str, init: Value) -> State {
        Self { key, init }
    }

    /// Selects all updates for any state.
    pub fn select_any() -> Selector {
        StateUpdateElem::elem().select()
    }

    /// The selector for this state's updates.
    fn select(&self) -> Selector {
        StateUpdateElem::elem().select()
    }

    /// Folds every registered update for this state, in document order,
    /// stopping once `bound` is reached (exclusive) if given.
    fn sequence(
        &self,
        engine: &mut Engine,
        bound: Option<Location>,
    ) -> SourceResult<Value> {
        let mut state = self.init.clone();
        for content in engine.introspector.query(&self.select()) {
            if bound.is_some_and(|loc| content.location() == Some(loc)) {
                break;
            }
            let Some(packed) = content.to_packed::<StateUpdateElem>() else { continue };
            if packed.key != self.key {
                continue;
            }
            match &packed.update {
                StateUpdate::Set(value) => state = value.clone(),
                StateUpdate::Func(func) => {
                    state = func.call(engine, Context::none().track(), [state])?
                }
            }
        }
        Ok(state)
    }
}

#[scope]
impl State {
    /// Create a new state.
    #[func(constructor)]
    pub fn construct(
        /// The key that identifies this state.
        key: Str,
        /// The initial value of the state.
        #[default]
        init: Value,
    ) -> State {
        Self::new(key, init)
    }

    /// Retrieves the value of the state at the current location.
    #[func(contextual)]
    pub fn get(
        &self,
        engine: &mut Engine,
        context: comemo::Tracked<Context>,
        span: typeflow_syntax::Span,
    ) -> SourceResult<Value> {
        let loc = context.location().at(span)?;
        self.sequence(engine, Some(loc))
    }

    /// Retrieves the value of the state at the given selector's unique match.
    #[func(contextual)]
    pub fn at(
        &self,
        engine: &mut Engine,
        context: comemo::Tracked<Context>,
        span: typeflow_syntax::Span,
        /// The place at which the state's value should be retrieved.
        selector: LocatableSelector,
    ) -> SourceResult<Value> {
        let loc = selector.resolve_unique(engine.introspector, context).at(span)?;
        self.sequence(engine, Some(loc))
    }

    /// Retrieves the value of the state at the end of the document.
    #[func(contextual)]
    pub fn final_(
        &self,
        engine: &mut Engine,
        context: comemo::Tracked<Context>,
        span: typeflow_syntax::Span,
    ) -> SourceResult<Value> {
        context.introspect().at(span)?;
        self.sequence(engine, None)
    }

    /// Update the value of the state.
    #[func]
    pub fn update(
        self,
        span: typeflow_syntax::Span,
        /// If given a non-function value, sets the state to that value. If
        /// given a function, that function receives the previous state and
        /// has to return the new state.
        update: StateUpdate,
    ) -> Content {
        StateUpdateElem::new(self.key, update).pack().spanned(span)
    }
}

impl Repr for State {
    fn repr(&self) -> EcoString {
        eco_format!("state({}, {})", self.key.repr(), self.init.repr())
    }
}

/// An update to perform on a state.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum StateUpdate {
    /// Set the state to the specified value.
    Set(Value),
    /// Apply the given function to the state.
    Func(Func),
}

cast! {
    StateUpdate,
    v: Func => Self::Func(v),
    v: Value => Self::Set(v),
}

/// Executes an update of a state. Produced by [`State::update`]; carries no
/// visible content of its own.
#[elem(Construct, Locatable)]
pub struct StateUpdateElem {
    /// The key that identifies the state.
    #[required]
    key: Str,
    /// The update to perform on the state.
    #[required]
    #[internal]
    update: StateUpdate,
}

impl Construct for StateUpdateElem {
    fn construct(_: &mut Engine, args: &mut Args) -> SourceResult<Content> {
        bail!(args.span, "cannot be constructed manually");
    }
}
