//! Editor configuration — the bundle a host hands to [`Driver::build`].
//!
//! | Field           | Effect                                                   | Default |
//! |-----------------|----------------------------------------------------------|---------|
//! | `value`         | markdown source parsed once at build time                | `""`    |
//! | `disabled`      | initial disabled flag                                    | `false` |
//! | `placeholder`   | text shown while the document is empty                   | none    |
//! | `on_input`      | called with the serialized document after every dispatch | none    |
//! | `on_submit`     | called when the submit binding (`Mod-Enter`) fires       | none    |
//! | `class_names`   | presentation classes applied to the mounted surface      | empty   |
//! | `history_depth` | maximum number of undo events kept                       | 100     |
//! | `generation`    | host remount counter, reported back unchanged            | 0       |
//!
//! [`Driver::build`]: crate::Driver::build

use std::fmt;

/// Receives the serialized document after each dispatched transaction.
pub type InputCallback = Box<dyn FnMut(&str)>;

/// Invoked by the submit key binding.
pub type SubmitCallback = Box<dyn FnMut()>;

/// Default number of undo events kept by the history plugin.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

pub struct EditorConfig {
    pub value: String,
    pub disabled: bool,
    pub placeholder: Option<String>,
    pub on_input: Option<InputCallback>,
    pub on_submit: Option<SubmitCallback>,
    pub class_names: Vec<String>,
    pub history_depth: usize,
    pub generation: u64,
}

impl EditorConfig {
    /// A configuration starting from `value`, with every other field at its
    /// default.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    #[must_use]
    pub fn with_on_input(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.on_input = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_submit(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_submit = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    #[must_use]
    pub const fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            value: String::new(),
            disabled: false,
            placeholder: None,
            on_input: None,
            on_submit: None,
            class_names: Vec::new(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            generation: 0,
        }
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("value", &self.value)
            .field("disabled", &self.disabled)
            .field("placeholder", &self.placeholder)
            .field("on_input", &self.on_input.is_some())
            .field("on_submit", &self.on_submit.is_some())
            .field("class_names", &self.class_names)
            .field("history_depth", &self.history_depth)
            .field("generation", &self.generation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.value, "");
        assert!(!config.disabled);
        assert!(config.placeholder.is_none());
        assert!(config.on_input.is_none());
        assert_eq!(config.history_depth, DEFAULT_HISTORY_DEPTH);
        assert_eq!(config.generation, 0);
    }

    #[test]
    fn builder_chain() {
        let config = EditorConfig::new("# hi")
            .with_disabled(true)
            .with_placeholder("Say something")
            .with_class_names(["composer", "dark"])
            .with_history_depth(5)
            .with_generation(3)
            .with_on_input(|_| {});
        assert_eq!(config.value, "# hi");
        assert!(config.disabled);
        assert_eq!(config.placeholder.as_deref(), Some("Say something"));
        assert_eq!(config.class_names, vec!["composer", "dark"]);
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.generation, 3);
        assert!(config.on_input.is_some());
    }

    #[test]
    fn debug_hides_callbacks() {
        let config = EditorConfig::new("x").with_on_submit(|| {});
        let shown = format!("{config:?}");
        assert!(shown.contains("on_submit: true"));
        assert!(shown.contains("on_input: false"));
    }
}
