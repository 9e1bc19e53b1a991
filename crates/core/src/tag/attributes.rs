use std::sync::Arc;

use super::TagAttribute;

/// All attributes of one tag occurrence, partitioned by namespace.
#[derive(Debug, Default)]
pub struct TagAttributes {
    attributes: Vec<Arc<TagAttribute>>,
    namespaces: Vec<String>,
    partitions: Vec<Vec<Arc<TagAttribute>>>,
}

impl TagAttributes {
    pub fn new(attributes: Vec<TagAttribute>) -> Self {
        Self::from_shared(attributes.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(attributes: Vec<Arc<TagAttribute>>) -> Self {
        let mut namespaces: Vec<String> =
            attributes.iter().map(|attribute| attribute.namespace().to_owned()).collect();
        namespaces.sort();
        namespaces.dedup();

        let partitions = namespaces
            .iter()
            .map(|namespace| {
                attributes
                    .iter()
                    .filter(|attribute| attribute.namespace() == namespace)
                    .cloned()
                    .collect()
            })
            .collect();

        Self { attributes, namespaces, partitions }
    }

    /// Every attribute in source order.
    pub fn all(&self) -> &[Arc<TagAttribute>] {
        &self.attributes
    }

    /// Distinct namespaces, sorted.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn all_in(&self, namespace: &str) -> &[Arc<TagAttribute>] {
        match self.namespaces.binary_search_by(|candidate| candidate.as_str().cmp(namespace)) {
            Ok(index) => &self.partitions[index],
            Err(_) => &[],
        }
    }

    pub fn get(&self, namespace: &str, local_name: &str) -> Option<&Arc<TagAttribute>> {
        self.all_in(namespace).iter().find(|attribute| attribute.local_name() == local_name)
    }

    /// Attribute without namespace.
    pub fn get_local(&self, local_name: &str) -> Option<&Arc<TagAttribute>> {
        self.get("", local_name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
