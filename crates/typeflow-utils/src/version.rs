//! Typeflow version information.

/// Returns the version of typeflow.
///
/// The information is read from the following sources:
///
/// - For the version number: The `TYPEFLOW_VERSION` environment variable
/// - For the commit hash: The `TYPEFLOW_COMMIT_SHA` environment variable
///
/// Build tooling can set these environment variables to configure the exposed
/// information. If the environment variables are left unset, the values are
/// populated via `build.rs` from the Cargo package manifest version and the git
/// hash in the current repository (if any).
///
/// # Panics
/// If the `TYPEFLOW_VERSION` environment variable holds a version string that
/// doesn't conform to SemVer.
pub fn version() -> TypeflowVersion {
    *crate::singleton!(TypeflowVersion, {
        let raw = env!("TYPEFLOW_VERSION");
        let commit = option_env!("TYPEFLOW_COMMIT_SHA");
        match semver::Version::parse(raw) {
            Ok(version) => {
                return TypeflowVersion {
                    major: version.major.try_into().unwrap(),
                    minor: version.minor.try_into().unwrap(),
                    patch: version.patch.try_into().unwrap(),
                    raw,
                    commit,
                };
            }
            Err(err) => {
                panic!("failed to parse {raw:?} as semantic version number: {err:?}")
            }
        }
    })
}

/// Typeflow version definition.
///
/// This structure contains the current Typeflow version. To query the precise
/// version number, refer to the [`TypeflowVersion::major()`],
/// [`TypeflowVersion::minor()`] and [`TypeflowVersion::patch()`] functions. You can
/// read the underlying, raw version string (e.g., for CLI output) with
/// [`TypeflowVersion::raw`].
///
/// Optionally, this may also contain the hash value of the Git commit from
/// which typeflow was built. However, this field may be unpopulated.
#[derive(Debug, Clone, Copy)]
pub struct TypeflowVersion {
    /// Typeflow major version number.
    major: u32,
    /// Typeflow minor version number.
    minor: u32,
    /// Typeflow patch version number.
    patch: u32,
    /// Raw, unmodified version string.
    raw: &'static str,
    /// The raw commit hash.
    commit: Option<&'static str>,
}

impl TypeflowVersion {
    /// Returns the Typeflow major version.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Returns the Typeflow minor version.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns the Typeflow patch version.
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Returns the raw, unparsed version string.
    ///
    /// Guaranteed to conform to SemVer.
    pub fn raw(&self) -> &'static str {
        self.raw
    }

    /// Returns the commit typeflow was built from, if known.
    pub fn commit(&self) -> Option<&'static str> {
        self.commit
    }
}
