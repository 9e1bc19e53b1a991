//! Well-known namespace URIs.

pub const XHTML: &str = "http://www.w3.org/1999/xhtml";

/// Attributes in these namespaces are passed through to the rendered markup.
pub const PASSTHROUGH_ATTRIBUTES: &[&str] = &[
    "jakarta.faces.passthrough",
    "http://xmlns.jcp.org/jsf/passthrough",
    "http://java.sun.com/jsf/passthrough",
];

/// Attributes in these namespaces mark a plain element as a framework component.
pub const PASSTHROUGH_ELEMENTS: &[&str] =
    &["jakarta.faces", "http://xmlns.jcp.org/jsf", "http://java.sun.com/jsf"];

pub const HTML: &str = "jakarta.faces.html";

pub const COMPONENT: &str = "jakarta.faces.component";

/// Namespace prefixes under which composite component libraries live.
pub const COMPOSITE_LIBRARY_PREFIXES: &[&str] = &[
    "jakarta.faces.composite",
    "http://xmlns.jcp.org/jsf/composite",
    "http://java.sun.com/jsf/composite",
];

/// Pass-through attribute naming the element a converted tag renders as.
pub const ELEMENT_NAME: &str = "elementName";

/// Canonical pass-through attribute namespace.
pub fn passthrough_attributes() -> &'static str {
    PASSTHROUGH_ATTRIBUTES[0]
}

pub fn is_passthrough_attributes(namespace: &str) -> bool {
    PASSTHROUGH_ATTRIBUTES.contains(&namespace)
}

pub fn is_passthrough_elements(namespace: &str) -> bool {
    PASSTHROUGH_ELEMENTS.contains(&namespace)
}

/// Name of the composite library addressed by `namespace`, e.g. `ui` for
/// `jakarta.faces.composite/ui`.
pub fn composite_library_name(namespace: &str) -> Option<&str> {
    COMPOSITE_LIBRARY_PREFIXES.iter().find_map(|prefix| {
        let marker = format!("{prefix}/");
        namespace
            .find(&marker)
            .map(|index| &namespace[index + marker.len()..])
            .filter(|name| !name.is_empty())
    })
}
