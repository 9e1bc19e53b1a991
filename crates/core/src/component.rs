//! Link-time registration of components that should be creatable as tags.

/// Declares that `component_type` is available as `<tag_name>` in `namespace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentTagRegistration {
    pub namespace: &'static str,
    pub tag_name: &'static str,
    pub component_type: &'static str,
    pub renderer_type: Option<&'static str>,
}

inventory::collect!(ComponentTagRegistration);

/// Iterate over every registered component tag.
pub fn component_tag_registrations() -> impl Iterator<Item = &'static ComponentTagRegistration> {
    inventory::iter::<ComponentTagRegistration>.into_iter()
}

/// Register a component for tag creation under a namespace.
#[macro_export]
macro_rules! register_component_tag {
    ($namespace:expr, $tag_name:expr, $component_type:expr) => {
        $crate::register_component_tag!($namespace, $tag_name, $component_type, None);
    };
    ($namespace:expr, $tag_name:expr, $component_type:expr, $renderer_type:expr) => {
        inventory::submit! {
            $crate::component::ComponentTagRegistration {
                namespace: $namespace,
                tag_name: $tag_name,
                component_type: $component_type,
                renderer_type: $renderer_type,
            }
        }
    };
}

pub use register_component_tag;

#[cfg(test)]
mod tests {
    use super::*;

    register_component_tag!("urn:test:widgets", "gauge", "test.Gauge", Some("test.GaugeRenderer"));

    #[test]
    fn registrations_are_discoverable() {
        let found = component_tag_registrations()
            .find(|entry| entry.namespace == "urn:test:widgets" && entry.tag_name == "gauge")
            .expect("registered");
        assert_eq!(found.component_type, "test.Gauge");
        assert_eq!(found.renderer_type, Some("test.GaugeRenderer"));
    }
}
