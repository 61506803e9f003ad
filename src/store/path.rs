use std::fmt;

/// Position of a module in the module tree; empty for the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path one level below this one.
    pub fn join(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

impl<S: Into<String>> From<Vec<S>> for ModulePath {
    fn from(segments: Vec<S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String> + Clone> From<&[S]> for ModulePath {
    fn from(segments: &[S]) -> Self {
        Self(segments.iter().cloned().map(Into::into).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for ModulePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
