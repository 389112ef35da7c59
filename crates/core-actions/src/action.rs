//! The action request type and its dotted-name parsing rules.

use std::collections::HashMap;

/// Arguments carried by an action: two well-known fields the built-in
/// handlers read constantly, plus a free-form string bag for everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs {
    pub search_pattern: Option<String>,
    pub text: Option<String>,
    extra: HashMap<String, String>,
}

impl ActionArgs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra.insert(key.into(), value.into());
    }

    /// True when the named flag is present and set to `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }
}

/// A named intent to mutate editor state.
///
/// `count == 0` means unspecified; the dispatcher substitutes the default of
/// 1 when building the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub count: i32,
    pub args: ActionArgs,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            args: ActionArgs::default(),
        }
    }

    pub fn with_count(mut self, count: i32) -> Self {
        self.count = count;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.args.search_pattern = Some(pattern.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.args.text = Some(text.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.set(key, value);
        self
    }

    /// Namespace prefix of the action name (empty when the name has no dot or
    /// starts with one).
    pub fn namespace(&self) -> &str {
        split_name(&self.name).0
    }

    /// Local part of the action name.
    pub fn local(&self) -> &str {
        split_name(&self.name).1
    }
}

/// Split a dotted action name into `(namespace, local)`.
///
/// - `"a.b.c"` -> `("a", "b.c")`
/// - `"simple"` -> `("", "simple")`
/// - `".leading"` -> `("", "leading")`
/// - `""` -> `("", "")`
pub fn split_name(name: &str) -> (&str, &str) {
    match name.find('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => ("", name),
    }
}
