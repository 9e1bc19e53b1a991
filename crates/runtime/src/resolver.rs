use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tagforge_core::{
    Diagnostic, DiagnosticCode, FaceletError, Function, Severity, Tag, TagAttributes, TagError,
    namespaces,
};

use crate::decorator::CompositeTagDecorator;
use crate::handler::{TagConfig, TagEnvironment, TagHandler};
use crate::library::TagLibrary;

/// Outcome of pushing one tag.
pub enum Resolution {
    /// A library claimed the tag.
    Handler { tag: Arc<Tag>, tag_id: String, handler: Arc<dyn TagHandler> },
    /// Nobody claimed it; the tag is emitted as markup.
    Markup(Arc<Tag>),
}

impl Resolution {
    pub fn tag(&self) -> &Arc<Tag> {
        match self {
            Resolution::Handler { tag, .. } | Resolution::Markup(tag) => tag,
        }
    }

    pub fn handler(&self) -> Option<&Arc<dyn TagHandler>> {
        match self {
            Resolution::Handler { handler, .. } => Some(handler),
            Resolution::Markup(_) => None,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Resolution::Markup(_))
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Handler { tag, tag_id, .. } => f
                .debug_struct("Handler")
                .field("tag", &tag.qname())
                .field("tag_id", tag_id)
                .finish_non_exhaustive(),
            Resolution::Markup(tag) => f.debug_tuple("Markup").field(&tag.qname()).finish(),
        }
    }
}

/// Resolves the tags of one document against a tag library.
pub struct TagResolver {
    library: Arc<dyn TagLibrary>,
    decorator: CompositeTagDecorator,
    environment: Arc<TagEnvironment>,
    namespaces: Vec<(String, String)>,
    reported: HashSet<String>,
    alias_hash: i32,
    next_id: i32,
}

impl TagResolver {
    pub fn new(library: Arc<dyn TagLibrary>, environment: Arc<TagEnvironment>) -> Self {
        Self {
            library,
            decorator: CompositeTagDecorator::default(),
            environment,
            namespaces: Vec::new(),
            reported: HashSet::new(),
            alias_hash: 0,
            next_id: 0,
        }
    }

    pub fn with_decorator(mut self, decorator: CompositeTagDecorator) -> Self {
        self.decorator = decorator;
        self
    }

    /// Document alias that generated tag ids are derived from.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias_hash = alias
            .chars()
            .fold(0_i32, |hash, c| hash.wrapping_mul(31).wrapping_add_unsigned(u32::from(c)));
        self
    }

    pub fn environment(&self) -> &Arc<TagEnvironment> {
        &self.environment
    }

    /// Binds `prefix` to `namespace` until the matching [`pop_namespace`](Self::pop_namespace).
    ///
    /// In development mode a namespace no library supports is reported once.
    pub fn push_namespace(&mut self, prefix: &str, namespace: &str) {
        tracing::debug!(prefix, namespace, "namespace pushed");
        self.namespaces.push((prefix.to_owned(), namespace.to_owned()));

        if !self.environment.options().is_development()
            || namespace == namespaces::XHTML
            || self.library.contains_namespace(namespace)
            || !self.reported.insert(namespace.to_owned())
        {
            return;
        }
        let message = format!(
            "This page calls for XML namespace {namespace} declared with prefix {prefix} but no taglibrary exists for that namespace."
        );
        tracing::warn!(prefix, namespace, "{message}");
        self.environment.diagnostics().report(Diagnostic::new(
            prefix,
            DiagnosticCode::UnknownNamespace,
            Severity::Warning,
            message,
        ));
    }

    pub fn pop_namespace(&mut self, prefix: &str) {
        if let Some(index) = self.namespaces.iter().rposition(|(bound, _)| bound == prefix) {
            self.namespaces.remove(index);
        }
    }

    /// Namespace currently bound to `prefix`.
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .rev()
            .find(|(bound, _)| bound == prefix)
            .map(|(_, namespace)| namespace.as_str())
    }

    /// Function `name` from the library behind `prefix`.
    pub fn function(&self, prefix: &str, name: &str) -> Option<Function> {
        let namespace = self.namespace(prefix)?;
        self.library.create_function(namespace, name)
    }

    pub fn push_tag(&mut self, tag: &Arc<Tag>) -> Result<Resolution, FaceletError> {
        tracing::debug!(tag = %tag, "tag pushed");
        let decorated = self.decorator.decorate(tag)?;
        let decorated = self.trim_namespace_declarations(decorated);
        let namespace = decorated.namespace();
        let local_name = decorated.local_name();

        if self.library.contains_tag_handler(namespace, local_name) {
            let tag_id = self.next_tag_id();
            let config = TagConfig::new(Arc::clone(&decorated), tag_id.clone(), Arc::clone(&self.environment));
            if let Some(handler) = self.library.create_tag_handler(namespace, local_name, config)? {
                return Ok(Resolution::Handler { tag: decorated, tag_id, handler });
            }
        }

        if self.library.contains_namespace(namespace) {
            return Err(TagError::new(
                &decorated,
                format!(
                    "Tag Library supports namespace: {namespace}, but no tag was defined for name: {local_name}"
                ),
            )
            .into());
        }
        Ok(Resolution::Markup(decorated))
    }

    /// Drops `xmlns` declarations of namespaces a library handles.
    fn trim_namespace_declarations(&self, tag: Arc<Tag>) -> Arc<Tag> {
        let all = tag.attributes().all();
        let kept: Vec<_> = all
            .iter()
            .filter(|attribute| {
                !(attribute.qname().starts_with("xmlns")
                    && self.library.contains_namespace(attribute.value()))
            })
            .cloned()
            .collect();
        if kept.len() == all.len() {
            return tag;
        }
        Tag::new(
            tag.location().clone(),
            tag.namespace(),
            tag.local_name(),
            tag.qname(),
            TagAttributes::from_shared(kept),
        )
    }

    fn next_tag_id(&mut self) -> String {
        let seed = self.alias_hash ^ self.next_id.wrapping_mul(13);
        self.next_id = self.next_id.wrapping_add(1);
        format!("{:x}", seed.unsigned_abs())
    }
}

impl fmt::Debug for TagResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagResolver")
            .field("namespaces", &self.namespaces)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::SimpleTagLibrary;
    use crate::options::{EngineOptions, ProjectStage};
    use rstest::{fixture, rstest};
    use tagforge_core::{DiagnosticLog, DiagnosticSink, Location, TagAttribute};

    const APP: &str = "urn:app";

    struct Harness {
        resolver: TagResolver,
        log: Arc<DiagnosticLog>,
    }

    fn harness(stage: ProjectStage) -> Harness {
        let mut app = SimpleTagLibrary::new(APP);
        app.add_component("panel", "app.Panel", None).add_function(Function::new("id", |args| {
            Ok(args.first().cloned().unwrap_or_default())
        }));
        let mut html = SimpleTagLibrary::new(namespaces::HTML);
        html.add_component("inputText", "jakarta.faces.HtmlInputText", Some("jakarta.faces.Text"));
        let library: Arc<dyn TagLibrary> =
            Arc::new(crate::library::CompositeTagLibrary::new(vec![Arc::new(app), Arc::new(html)]));

        let log = Arc::new(DiagnosticLog::new());
        let options = EngineOptions::builder().with_project_stage(stage).build().expect("options");
        let environment = Arc::new(
            TagEnvironment::new(options).with_diagnostics(Arc::clone(&log) as Arc<dyn DiagnosticSink>),
        );
        Harness { resolver: TagResolver::new(library, environment).with_alias("/page.xhtml"), log }
    }

    #[fixture]
    fn dev() -> Harness {
        harness(ProjectStage::Development)
    }

    fn tag(namespace: &str, qname: &str, attributes: Vec<TagAttribute>) -> Arc<Tag> {
        let local = qname.split_once(':').map_or(qname, |(_, local)| local);
        Tag::new(Location::new("page.xhtml", 1, 1), namespace, local, qname, TagAttributes::new(attributes))
    }

    fn attribute(namespace: &str, qname: &str, value: &str) -> TagAttribute {
        let local = qname.split_once(':').map_or(qname, |(_, local)| local);
        TagAttribute::new(Location::new("page.xhtml", 1, 5), namespace, local, qname, value)
            .expect("valid attribute")
    }

    #[rstest]
    fn unknown_namespace_is_reported_once_in_development(mut dev: Harness) {
        dev.resolver.push_namespace("m", "urn:missing");
        dev.resolver.push_namespace("m", "urn:missing");
        dev.resolver.push_namespace("", namespaces::XHTML);
        dev.resolver.push_namespace("a", APP);

        let entries = dev.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "m");
        assert_eq!(entries[0].code, DiagnosticCode::UnknownNamespace);
        assert_eq!(entries[0].severity, Severity::Warning);
    }

    #[test]
    fn production_mode_reports_nothing() {
        let mut prod = harness(ProjectStage::Production);
        prod.resolver.push_namespace("m", "urn:missing");
        assert!(prod.log.is_empty());
    }

    #[rstest]
    fn namespaces_nest_by_prefix(mut dev: Harness) {
        dev.resolver.push_namespace("a", APP);
        dev.resolver.push_namespace("a", "urn:inner");
        assert_eq!(dev.resolver.namespace("a"), Some("urn:inner"));
        dev.resolver.pop_namespace("a");
        assert_eq!(dev.resolver.namespace("a"), Some(APP));
        assert!(dev.resolver.function("a", "id").is_some());
        dev.resolver.pop_namespace("a");
        assert_eq!(dev.resolver.namespace("a"), None);
        assert!(dev.resolver.function("a", "id").is_none());
    }

    #[rstest]
    fn claimed_tags_resolve_to_handlers_with_distinct_ids(mut dev: Harness) {
        let first = dev.resolver.push_tag(&tag(APP, "a:panel", Vec::new())).unwrap();
        let second = dev.resolver.push_tag(&tag(APP, "a:panel", Vec::new())).unwrap();
        let (Resolution::Handler { tag_id: a, .. }, Resolution::Handler { tag_id: b, .. }) = (&first, &second)
        else {
            panic!("expected handlers, got {first:?} and {second:?}");
        };
        assert_ne!(a, b);
        assert_eq!(first.handler().map(|handler| handler.tag().qname()), Some("a:panel"));
    }

    #[rstest]
    fn supported_namespace_without_tag_is_an_error(mut dev: Harness) {
        let err = dev.resolver.push_tag(&tag(APP, "a:ghost", Vec::new())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "page.xhtml @1,1 <a:ghost> Tag Library supports namespace: urn:app, but no tag was defined for name: ghost"
        );
    }

    #[rstest]
    fn undefined_decorated_tag_error_names_the_decorated_tag(mut dev: Harness) {
        let input = tag(
            namespaces::XHTML,
            "input",
            vec![
                attribute("", "type", "password"),
                attribute("jakarta.faces", "faces:value", "#{bean.secret}"),
            ],
        );
        let err = dev.resolver.push_tag(&input).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "page.xhtml @1,1 <h:inputSecret> Tag Library supports namespace: {}, but no tag was defined for name: inputSecret",
                namespaces::HTML
            )
        );
    }

    #[rstest]
    fn unclaimed_markup_passes_through(mut dev: Harness) {
        let div = tag(namespaces::XHTML, "div", vec![attribute("", "class", "c")]);
        let resolution = dev.resolver.push_tag(&div).unwrap();
        assert!(resolution.is_markup());
        assert!(Arc::ptr_eq(resolution.tag(), &div));
    }

    #[rstest]
    fn decorated_markup_resolves_to_component(mut dev: Harness) {
        let input = tag(
            namespaces::XHTML,
            "input",
            vec![attribute("", "type", "text"), attribute("jakarta.faces", "faces:value", "#{bean.name}")],
        );
        let resolution = dev.resolver.push_tag(&input).unwrap();
        assert_eq!(resolution.tag().qname(), "h:inputText");
        assert!(resolution.handler().is_some());
    }

    #[rstest]
    fn library_namespace_declarations_are_trimmed(mut dev: Harness) {
        let div = tag(
            namespaces::XHTML,
            "div",
            vec![
                attribute("", "xmlns:a", APP),
                attribute("", "xmlns:o", "urn:other"),
                attribute("", "id", "root"),
            ],
        );
        let resolution = dev.resolver.push_tag(&div).unwrap();
        let names: Vec<_> = resolution.tag().attributes().all().iter().map(|a| a.qname()).collect();
        assert_eq!(names, ["xmlns:o", "id"]);
    }
}
