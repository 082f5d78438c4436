//! Context enumeration for the current workspace.

use tracing::debug;

use tabharvest_shared::{Context, Result};

use crate::ContextHost;

/// Snapshot of the contexts open in the current workspace.
///
/// Enumeration is always fresh; a snapshot is never reused across phases
/// because contexts may open or close in between.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    contexts: Vec<Context>,
}

impl Workspace {
    /// Enumerate the host's contexts.
    pub async fn enumerate(host: &dyn ContextHost) -> Result<Self> {
        let contexts = host.list_contexts().await?;
        debug!(
            total = contexts.len(),
            scriptable = contexts.iter().filter(|c| c.is_scriptable()).count(),
            "enumerated workspace"
        );
        Ok(Self { contexts })
    }

    pub fn from_contexts(contexts: Vec<Context>) -> Self {
        Self { contexts }
    }

    /// The context that was active at enumeration time, if any.
    pub fn active(&self) -> Option<&Context> {
        self.contexts.iter().find(|c| c.active)
    }

    /// Scriptable contexts in enumeration order.
    pub fn scriptable(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter().filter(|c| c.is_scriptable())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabharvest_shared::ContextId;

    fn ctx(id: u64, address: &str, active: bool) -> Context {
        Context {
            id: ContextId(id),
            address: address.into(),
            active,
        }
    }

    #[test]
    fn scriptable_keeps_order_and_skips_system_pages() {
        let ws = Workspace::from_contexts(vec![
            ctx(1, "chrome://settings", false),
            ctx(2, "http://b.example", true),
            ctx(3, "", false),
            ctx(4, "http://c.example", false),
        ]);

        let ids: Vec<_> = ws.scriptable().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(ws.active().map(|c| c.id), Some(ContextId(2)));
        assert_eq!(ws.len(), 4);
    }

    #[test]
    fn active_may_be_missing() {
        let ws = Workspace::from_contexts(vec![ctx(1, "http://a.example", false)]);
        assert!(ws.active().is_none());
    }
}
