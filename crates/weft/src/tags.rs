//! Tag definitions and resolution.
//!
//! The attribute-schema subsystem is an external collaborator; the compiler
//! only needs to know, for a native tag, whether it is void and whether it
//! hosts single-child collapsing, and for a custom tag, the input shape its
//! compiled template declares.

use rustc_hash::FxHashMap;

/// Input shape a custom tag's compiled template exports.
#[derive(Clone, Debug, Default)]
pub struct TagShape {
    /// Declared input props, in declaration order. Attributes not listed
    /// here are unused by the child and their references get dropped.
    pub props: Vec<String>,
    /// Attr-tag names grouped by the prop they feed, with a repeated flag
    /// (`@row` appearing many times accumulates into an `AttrSeq`).
    pub attr_tags: Vec<AttrTagDef>,
    /// True when the child declares a `body` prop for nested content.
    pub takes_body: bool,
}

#[derive(Clone, Debug)]
pub struct AttrTagDef {
    pub name: String,
    pub repeated: bool,
}

impl TagShape {
    pub fn with_props<S: Into<String>>(props: impl IntoIterator<Item = S>) -> Self {
        Self {
            props: props.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn accepts_prop(&self, name: &str) -> bool {
        self.props.iter().any(|p| p == name)
    }

    pub fn attr_tag(&self, name: &str) -> Option<&AttrTagDef> {
        self.attr_tags.iter().find(|t| t.name == name)
    }
}

/// Maps tag names to their definitions. Lookups are synchronous; any file
/// loading behind this trait happened before compilation.
pub trait TagResolver {
    fn resolve_custom(&self, name: &str) -> Option<&TagShape>;

    /// Native (HTML) tags are known statically; anything lowercase without
    /// a custom definition and listed here renders as a plain element.
    fn is_void(&self, name: &str) -> bool {
        VOID_ELEMENTS.contains(&name)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

/// In-memory resolver used by tests and by hosts that preload tag shapes.
#[derive(Debug, Default)]
pub struct TagRegistry {
    custom: FxHashMap<String, TagShape>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, shape: TagShape) {
        self.custom.insert(name.into(), shape);
    }
}

impl TagResolver for TagRegistry {
    fn resolve_custom(&self, name: &str) -> Option<&TagShape> {
        self.custom.get(name)
    }
}
