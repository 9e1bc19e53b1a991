//! Tag decorators: rewrite plain markup carrying framework attributes into component tags.

use std::collections::BTreeMap;
use std::sync::Arc;

use tagforge_core::namespaces::{self, ELEMENT_NAME};
use tagforge_core::{FaceletError, Tag, TagAttribute, TagAttributes, TagError};

/// Rewrites a tag before resolution. `Ok(None)` leaves it to the next decorator.
pub trait TagDecorator: Send + Sync {
    fn decorate(&self, tag: &Arc<Tag>) -> Result<Option<Arc<Tag>>, FaceletError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Html,
    Element,
}

impl Target {
    fn namespace(self) -> &'static str {
        match self {
            Target::Html => namespaces::HTML,
            Target::Element => namespaces::PASSTHROUGH_ELEMENTS[0],
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Target::Html => "h",
            Target::Element => "faces",
        }
    }
}

/// Attribute whose value picks the target tag.
#[derive(Debug, Clone, Copy)]
enum Arbiter {
    Plain(&'static str),
    Faces(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct ElementConverter {
    target: Target,
    local_name: &'static str,
    arbiter: Option<Arbiter>,
    mappings: &'static [(&'static str, &'static str)],
    id_attribute: Option<&'static str>,
}

impl ElementConverter {
    const fn html(local_name: &'static str) -> Self {
        Self { target: Target::Html, local_name, arbiter: None, mappings: &[], id_attribute: None }
    }

    const fn arbiter(mut self, arbiter: Arbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    const fn mapped(mut self, mappings: &'static [(&'static str, &'static str)]) -> Self {
        self.mappings = mappings;
        self
    }

    const fn id(mut self, attribute: &'static str) -> Self {
        self.id_attribute = Some(attribute);
        self
    }

    fn convert(&self, tag: &Arc<Tag>) -> Result<Option<Arc<Tag>>, FaceletError> {
        let Some(arbiter) = self.arbiter else {
            return convert_tag(tag, self, self.local_name).map(Some);
        };
        let found = match arbiter {
            Arbiter::Plain(name) => tag.attributes().get_local(name),
            Arbiter::Faces(name) => namespaces::PASSTHROUGH_ELEMENTS
                .iter()
                .find_map(|namespace| tag.attributes().get(namespace, name)),
        };
        let Some(found) = found else {
            return Ok(None);
        };
        let local_name = self
            .mappings
            .iter()
            .find(|(value, _)| *value == found.value())
            .map_or(self.local_name, |(_, mapped)| *mapped);
        convert_tag(tag, self, local_name).map(Some)
    }
}

const INPUT_TYPES: &[(&str, &str)] = &[
    ("hidden", "inputHidden"),
    ("password", "inputSecret"),
    ("number", "inputText"),
    ("search", "inputText"),
    ("email", "inputText"),
    ("datetime", "inputText"),
    ("date", "inputText"),
    ("month", "inputText"),
    ("week", "inputText"),
    ("time", "inputText"),
    ("datetime-local", "inputText"),
    ("range", "inputText"),
    ("color", "inputText"),
    ("url", "inputText"),
    ("checkbox", "selectBooleanCheckbox"),
    ("file", "inputFile"),
    ("submit", "commandButton"),
    ("reset", "commandButton"),
    ("button", "button"),
];

/// Converters per plain element name, tried in order.
const CONVERTERS: &[(&str, &[ElementConverter])] = &[
    (
        "a",
        &[
            ElementConverter::html("commandLink").arbiter(Arbiter::Faces("action")),
            ElementConverter::html("commandLink").arbiter(Arbiter::Faces("actionListener")),
            ElementConverter::html("outputLink").arbiter(Arbiter::Faces("value")),
            ElementConverter::html("link").arbiter(Arbiter::Faces("outcome")),
        ],
    ),
    ("img", &[ElementConverter::html("graphicImage")]),
    ("body", &[ElementConverter::html("body")]),
    ("head", &[ElementConverter::html("head")]),
    ("label", &[ElementConverter::html("outputLabel")]),
    ("script", &[ElementConverter::html("outputScript")]),
    ("link", &[ElementConverter::html("outputStylesheet")]),
    ("form", &[ElementConverter::html("form")]),
    ("textarea", &[ElementConverter::html("inputTextarea")]),
    (
        "button",
        &[
            ElementConverter::html("button").arbiter(Arbiter::Faces("outcome")),
            ElementConverter::html("commandButton"),
        ],
    ),
    (
        "select",
        &[
            ElementConverter::html("selectManyListbox").arbiter(Arbiter::Plain("multiple")).id("name"),
            ElementConverter::html("selectOneListbox").id("name"),
        ],
    ),
    (
        "input",
        &[ElementConverter::html("inputText")
            .arbiter(Arbiter::Plain("type"))
            .mapped(INPUT_TYPES)
            .id("name")],
    ),
];

const GENERIC_ELEMENT: ElementConverter = ElementConverter {
    target: Target::Element,
    local_name: "element",
    arbiter: None,
    mappings: &[],
    id_attribute: None,
};

fn convert_tag(
    tag: &Arc<Tag>,
    converter: &ElementConverter,
    local_name: &str,
) -> Result<Arc<Tag>, FaceletError> {
    let mut attributes: BTreeMap<String, Arc<TagAttribute>> = BTreeMap::new();

    let element_name = TagAttribute::new(
        tag.location().clone(),
        namespaces::passthrough_attributes(),
        ELEMENT_NAME,
        format!("p:{ELEMENT_NAME}"),
        tag.local_name(),
    )?;
    attributes.insert(element_name.qname().to_owned(), Arc::new(element_name));

    for attribute in tag.attributes().all() {
        let converted = convert_attribute(tag, attribute, converter.id_attribute)?;
        attributes.insert(converted.qname().to_owned(), converted);
    }

    let namespace = converter.target.namespace();
    let qname = format!("{}:{local_name}", converter.target.prefix());
    tracing::debug!(from = tag.qname(), to = %qname, "decorated tag");
    Ok(Tag::new(
        tag.location().clone(),
        namespace,
        local_name,
        qname,
        TagAttributes::from_shared(attributes.into_values().collect()),
    ))
}

fn convert_attribute(
    tag: &Tag,
    attribute: &Arc<TagAttribute>,
    id_attribute: Option<&str>,
) -> Result<Arc<TagAttribute>, FaceletError> {
    let local_name = attribute.local_name();
    let (namespace, qname) = if namespaces::is_passthrough_elements(attribute.namespace()) {
        ("", local_name.to_owned())
    } else if !attribute.namespace().is_empty() && attribute.namespace() != tag.namespace() {
        return Ok(Arc::clone(attribute));
    } else if id_attribute == Some(local_name) {
        return Ok(Arc::new(TagAttribute::new(
            attribute.location().clone(),
            "",
            "id",
            "id",
            attribute.value(),
        )?));
    } else {
        (namespaces::passthrough_attributes(), format!("p:{local_name}"))
    };
    Ok(Arc::new(TagAttribute::new(
        attribute.location().clone(),
        namespace,
        local_name,
        qname,
        attribute.value(),
    )?))
}

/// Converts plain HTML elements that carry attributes in a framework element
/// namespace into the matching component tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTagDecorator;

impl DefaultTagDecorator {
    fn has_faces_attribute(tag: &Tag) -> bool {
        tag.attributes()
            .namespaces()
            .iter()
            .any(|namespace| namespaces::is_passthrough_elements(namespace))
    }
}

impl TagDecorator for DefaultTagDecorator {
    fn decorate(&self, tag: &Arc<Tag>) -> Result<Option<Arc<Tag>>, FaceletError> {
        if !Self::has_faces_attribute(tag) {
            return Ok(None);
        }
        let namespace = tag.namespace();
        if !(namespace.is_empty() || namespace == namespaces::XHTML) {
            let faces = namespaces::PASSTHROUGH_ELEMENTS[0];
            return Err(TagError::new(
                tag,
                format!(
                    "Elements with namespace {namespace} may not have attributes in namespace {faces}. \
                     Namespace {faces} is intended for otherwise non-JSF-aware markup, such as \
                     <input type=\"text\" faces:id >. It is not valid to have <h:commandButton faces:id=\"button\" />."
                ),
            )
            .into());
        }

        match CONVERTERS.iter().find(|(element, _)| *element == tag.local_name()) {
            Some((_, converters)) => {
                for converter in *converters {
                    if let Some(converted) = converter.convert(tag)? {
                        return Ok(Some(converted));
                    }
                }
                Ok(None)
            }
            None => GENERIC_ELEMENT.convert(tag),
        }
    }
}

/// Built-in conversion followed by pluggable decorators.
#[derive(Default)]
pub struct CompositeTagDecorator {
    builtin: DefaultTagDecorator,
    decorators: Vec<Arc<dyn TagDecorator>>,
}

impl CompositeTagDecorator {
    pub fn new(decorators: Vec<Arc<dyn TagDecorator>>) -> Self {
        Self { builtin: DefaultTagDecorator, decorators }
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn TagDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Never yields "nothing": without a rewrite the (possibly built-in converted) tag is returned.
    pub fn decorate(&self, tag: &Arc<Tag>) -> Result<Arc<Tag>, FaceletError> {
        let base = self.builtin.decorate(tag)?.unwrap_or_else(|| Arc::clone(tag));
        for decorator in &self.decorators {
            if let Some(decorated) = decorator.decorate(&base)? {
                return Ok(decorated);
            }
        }
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tagforge_core::Location;

    const FACES: &str = "jakarta.faces";
    const P: &str = "jakarta.faces.passthrough";

    fn attribute(namespace: &str, qname: &str, value: &str) -> TagAttribute {
        let local = qname.split_once(':').map_or(qname, |(_, local)| local);
        TagAttribute::new(Location::new("page.xhtml", 7, 4), namespace, local, qname, value)
            .expect("valid attribute")
    }

    fn element(name: &str, attributes: Vec<TagAttribute>) -> Arc<Tag> {
        Tag::new(
            Location::new("page.xhtml", 7, 1),
            namespaces::XHTML,
            name,
            name,
            TagAttributes::new(attributes),
        )
    }

    fn qnames(tag: &Tag) -> Vec<&str> {
        let mut names: Vec<_> = tag.attributes().all().iter().map(|a| a.qname()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn plain_markup_is_left_alone() {
        let tag = element("input", vec![attribute("", "type", "text")]);
        assert!(DefaultTagDecorator.decorate(&tag).unwrap().is_none());
    }

    #[rstest]
    #[case("password", "inputSecret")]
    #[case("checkbox", "selectBooleanCheckbox")]
    #[case("text", "inputText")]
    #[case("submit", "commandButton")]
    fn input_type_selects_component(#[case] input_type: &str, #[case] expected: &str) {
        let tag = element(
            "input",
            vec![attribute("", "type", input_type), attribute(FACES, "faces:value", "#{bean.v}")],
        );
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        assert_eq!(converted.namespace(), namespaces::HTML);
        assert_eq!(converted.local_name(), expected);
        assert_eq!(converted.qname(), format!("h:{expected}"));
    }

    #[test]
    fn input_attributes_are_relocated() {
        let tag = element(
            "input",
            vec![
                attribute("", "type", "password"),
                attribute(FACES, "faces:value", "#{bean.secret}"),
                attribute("", "name", "pw"),
                attribute("", "class", "wide"),
            ],
        );
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        assert_eq!(qnames(&converted), ["id", "p:class", "p:elementName", "p:type", "value"]);

        let attributes = converted.attributes();
        assert_eq!(attributes.get_local("id").map(|a| a.value()), Some("pw"));
        assert!(!attributes.get_local("value").expect("value").is_literal());
        assert_eq!(attributes.get(P, "elementName").map(|a| a.value()), Some("input"));
        assert_eq!(attributes.get(P, "type").map(|a| a.value()), Some("password"));
        let value = attributes.get_local("value").expect("value");
        assert!(Arc::ptr_eq(&value.tag().expect("owner"), &converted));
    }

    #[test]
    fn input_without_type_declines() {
        let tag = element("input", vec![attribute(FACES, "faces:id", "x")]);
        assert!(DefaultTagDecorator.decorate(&tag).unwrap().is_none());
    }

    #[rstest]
    #[case("faces:action", "commandLink")]
    #[case("faces:actionListener", "commandLink")]
    #[case("faces:value", "outputLink")]
    #[case("faces:outcome", "link")]
    fn anchor_picks_first_matching_arbiter(#[case] arbiter: &str, #[case] expected: &str) {
        let tag = element("a", vec![attribute(FACES, arbiter, "go")]);
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        assert_eq!(converted.local_name(), expected);
    }

    #[test]
    fn unknown_element_becomes_generic_element() {
        let tag = element("section", vec![attribute(FACES, "faces:id", "main")]);
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        assert_eq!(converted.qname(), "faces:element");
        assert_eq!(converted.namespace(), FACES);
        assert_eq!(
            converted.attributes().get(P, "elementName").map(|a| a.value()),
            Some("section")
        );
    }

    #[test]
    fn foreign_attributes_are_preserved() {
        let tag = element(
            "form",
            vec![attribute(FACES, "faces:id", "f"), attribute("urn:x", "x:hint", "h")],
        );
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        let hint = converted.attributes().get("urn:x", "hint").expect("preserved");
        assert_eq!(hint.qname(), "x:hint");
        assert!(Arc::ptr_eq(&hint.tag().expect("owner"), &converted));
    }

    #[test]
    fn duplicates_collapse_by_qname() {
        let tag = element(
            "select",
            vec![attribute(FACES, "faces:id", "first"), attribute("", "name", "second")],
        );
        let converted = DefaultTagDecorator.decorate(&tag).unwrap().expect("converted");
        assert_eq!(converted.local_name(), "selectOneListbox");
        let ids: Vec<_> = converted.attributes().all().iter().filter(|a| a.qname() == "id").collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].value(), "second");
    }

    #[test]
    fn component_namespace_with_markers_is_an_error() {
        let tag = Tag::new(
            Location::new("page.xhtml", 9, 1),
            namespaces::HTML,
            "commandButton",
            "h:commandButton",
            TagAttributes::new(vec![attribute(FACES, "faces:id", "button")]),
        );
        let err = DefaultTagDecorator.decorate(&tag).unwrap_err();
        let FaceletError::Tag(err) = err else { panic!("expected tag error, got {err:?}") };
        assert_eq!(err.qname, "h:commandButton");
        assert!(err.message.starts_with("Elements with namespace jakarta.faces.html may not have attributes"));
    }

    struct Rename(&'static str, &'static str);

    impl TagDecorator for Rename {
        fn decorate(&self, tag: &Arc<Tag>) -> Result<Option<Arc<Tag>>, FaceletError> {
            if tag.local_name() != self.0 {
                return Ok(None);
            }
            let attributes = TagAttributes::from_shared(tag.attributes().all().to_vec());
            Ok(Some(Tag::new(tag.location().clone(), tag.namespace(), self.1, self.1, attributes)))
        }
    }

    #[test]
    fn pluggable_decorators_see_builtin_result_and_first_wins() {
        let chain = CompositeTagDecorator::default()
            .with_decorator(Arc::new(Rename("form", "never")))
            .with_decorator(Arc::new(Rename("inputText", "first")))
            .with_decorator(Arc::new(Rename("inputText", "second")));

        let tag = element("input", vec![attribute("", "type", "text"), attribute(FACES, "faces:id", "n")]);
        assert_eq!(chain.decorate(&tag).unwrap().local_name(), "first");

        let untouched = element("span", vec![attribute("", "class", "c")]);
        assert!(Arc::ptr_eq(&chain.decorate(&untouched).unwrap(), &untouched));
    }
}
