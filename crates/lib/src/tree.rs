//! The page tree: pages nested under parent pages, ordered among siblings.
//!
//! The container key is the parent page id, `None` for top-level pages.
//! Because a container here is itself an item, every move is checked for
//! cycles: a page can never be dropped into its own subtree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::OrderedCollection;
use crate::constants::{DEFAULT_PAGE_ICON, DEFAULT_PAGE_TITLE};
use crate::item::{ItemId, ItemPatch, OrderedItem, Payload};
use crate::pipeline::{Intent, Placement};
use crate::resolver::DropTarget;

/// Container key of the page tree: the parent page, or `None` for the root.
pub type PageParent = Option<ItemId>;

/// The page tree collection.
pub type PageTree = OrderedCollection<PageParent, Page>;

/// A page in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub icon: String,
    /// Editor document; opaque to the engine
    #[serde(default)]
    pub content: Value,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: DEFAULT_PAGE_ICON.to_string(),
            content: Value::Null,
        }
    }

    /// A page as created from the sidebar.
    pub fn untitled() -> Self {
        Self::new(DEFAULT_PAGE_TITLE)
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Partial update of a [`Page`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagePatch {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub content: Option<Value>,
}

impl PagePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }
}

impl Payload for Page {
    type Patch = PagePatch;

    fn apply(&mut self, patch: &PagePatch) {
        if let Some(title) = &patch.title
            && !title.trim().is_empty()
        {
            self.title = title.trim().to_string();
        }
        if let Some(icon) = &patch.icon {
            let icon = icon.trim();
            self.icon = if icon.is_empty() {
                DEFAULT_PAGE_ICON.to_string()
            } else {
                icon.to_string()
            };
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
    }

    fn coalesce(pending: &mut PagePatch, newer: PagePatch) {
        if newer.title.is_some() {
            pending.title = newer.title;
        }
        if newer.icon.is_some() {
            pending.icon = newer.icon;
        }
        if newer.content.is_some() {
            pending.content = newer.content;
        }
    }
}

/// Create a page as the last child of `parent`.
pub fn create_page(parent: PageParent, page: Page) -> Intent<PageParent, Page> {
    Intent::Create {
        container: parent,
        payload: page,
        placement: Placement::Tail,
    }
}

/// Drop a page onto another page, making it that page's last child.
pub fn move_page_into(id: impl Into<ItemId>, target: impl Into<ItemId>) -> Intent<PageParent, Page> {
    Intent::Move {
        id: id.into(),
        target: DropTarget::ContainerEnd(Some(target.into())),
    }
}

/// Drop a page between the children of `parent`, at `index`.
pub fn move_page_between(
    id: impl Into<ItemId>,
    parent: PageParent,
    index: usize,
) -> Intent<PageParent, Page> {
    Intent::Move {
        id: id.into(),
        target: DropTarget::Index {
            container: parent,
            index,
        },
    }
}

pub fn update_page(id: impl Into<ItemId>, patch: PagePatch) -> Intent<PageParent, Page> {
    Intent::Update {
        id: id.into(),
        patch: ItemPatch::payload(patch),
    }
}

/// Delete a page together with its subtree.
pub fn delete_page(id: impl Into<ItemId>) -> Intent<PageParent, Page> {
    Intent::Delete { id: id.into() }
}

/// Pages above `id`, nearest first.
pub fn ancestors(tree: &PageTree, id: &ItemId) -> Vec<ItemId> {
    tree.container_of(id)
        .map(|parent| tree.ancestors(parent))
        .unwrap_or_default()
}

/// Every page below `id`.
pub fn descendants(tree: &PageTree, id: &ItemId) -> Vec<ItemId> {
    tree.descendants(id)
}

/// True if `candidate` lies somewhere below `ancestor`.
pub fn is_descendant(tree: &PageTree, candidate: &ItemId, ancestor: &ItemId) -> bool {
    ancestors(tree, candidate).contains(ancestor)
}

/// Pages in sidebar order with their depth.
///
/// Children are listed right after their parent, but only for parents in
/// `expanded`.
pub fn flatten<'a>(tree: &'a PageTree, expanded: &HashSet<ItemId>) -> Vec<(&'a OrderedItem<PageParent, Page>, usize)> {
    let mut rows = Vec::new();
    let mut stack: Vec<(&OrderedItem<PageParent, Page>, usize)> =
        tree.partition(&None).iter().rev().map(|page| (page, 0)).collect();

    while let Some((page, depth)) = stack.pop() {
        rows.push((page, depth));
        if expanded.contains(&page.id) {
            let children = tree.partition(&Some(page.id.clone()));
            stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
        }
    }
    rows
}
