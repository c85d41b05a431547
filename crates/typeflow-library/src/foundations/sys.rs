//! System-related things.

use crate::foundations::{Dict, Module, Scope, Version};

/// A module with system-related things.
///
/// # Panics
///
/// If any version component of the Typeflow version overflows the numeric range of the respective
/// [`Version`] component here.
pub fn module(inputs: Dict) -> Module {
    let typeflow_version = typeflow_utils::TypeflowVersion::new();
    let version = Version::from_iter([
        typeflow_version.major(),
        typeflow_version.minor(),
        typeflow_version.patch(),
    ]);

    let mut scope = Scope::deduplicating();
    scope.define("version", version);
    scope.define("inputs", inputs);
    Module::new("sys", scope)
}
