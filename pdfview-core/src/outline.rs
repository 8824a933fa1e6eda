use crate::{Destination, OutlineNode};

/// Child indices leading from the roots to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OutlinePath(pub Vec<usize>);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Pending,
    Resolved(Option<usize>),
}

#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub title: String,
    pub destination: Option<Destination>,
    pub expanded: bool,
    resolution: Resolution,
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    fn from_node(node: OutlineNode) -> Self {
        let resolution = if node.destination.is_some() {
            Resolution::Pending
        } else {
            Resolution::Resolved(None)
        };
        Self {
            title: node.title,
            destination: node.destination,
            expanded: false,
            resolution,
            children: node
                .children
                .into_iter()
                .map(OutlineEntry::from_node)
                .collect(),
        }
    }

    /// 1-based page number, once resolved.
    pub fn page_number(&self) -> Option<usize> {
        match self.resolution {
            Resolution::Resolved(page) => page,
            Resolution::Pending => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }
}

/// One displayed line of the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    pub path: OutlinePath,
    pub depth: usize,
    pub title: String,
    pub page_number: Option<usize>,
    pub has_children: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OutlineTree {
    roots: Vec<OutlineEntry>,
}

impl OutlineTree {
    pub fn new(nodes: Vec<OutlineNode>) -> Self {
        Self {
            roots: nodes.into_iter().map(OutlineEntry::from_node).collect(),
        }
    }

    pub fn entry(&self, path: &OutlinePath) -> Option<&OutlineEntry> {
        let (first, rest) = path.0.split_first()?;
        let mut entry = self.roots.get(*first)?;
        for index in rest {
            entry = entry.children.get(*index)?;
        }
        Some(entry)
    }

    fn entry_mut(&mut self, path: &OutlinePath) -> Option<&mut OutlineEntry> {
        let (first, rest) = path.0.split_first()?;
        let mut entry = self.roots.get_mut(*first)?;
        for index in rest {
            entry = entry.children.get_mut(*index)?;
        }
        Some(entry)
    }

    /// Rows currently displayed: the roots plus the children of every
    /// expanded entry, depth first.
    pub fn rows(&self) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        let mut path = Vec::new();
        collect_rows(&self.roots, 0, &mut path, &mut rows);
        rows
    }

    /// Flips the expanded state. Returns the new state, or `None` for an
    /// unknown path.
    pub fn toggle(&mut self, path: &OutlinePath) -> Option<bool> {
        let entry = self.entry_mut(path)?;
        entry.expanded = !entry.expanded;
        Some(entry.expanded)
    }

    /// Displayed entries whose destination has not been looked up yet.
    pub fn pending_resolutions(&self) -> Vec<(OutlinePath, Destination)> {
        self.rows()
            .into_iter()
            .filter_map(|row| {
                let entry = self.entry(&row.path)?;
                if entry.is_resolved() {
                    return None;
                }
                entry
                    .destination
                    .clone()
                    .map(|destination| (row.path, destination))
            })
            .collect()
    }

    /// Caches the lookup result for `path`. Later results are ignored.
    pub fn set_resolution(&mut self, path: &OutlinePath, page_index: Option<usize>) {
        if let Some(entry) = self.entry_mut(path) {
            if !entry.is_resolved() {
                entry.resolution = Resolution::Resolved(page_index.map(|index| index + 1));
            }
        }
    }
}

fn collect_rows(
    entries: &[OutlineEntry],
    depth: usize,
    path: &mut Vec<usize>,
    rows: &mut Vec<OutlineRow>,
) {
    for (index, entry) in entries.iter().enumerate() {
        path.push(index);
        rows.push(OutlineRow {
            path: OutlinePath(path.clone()),
            depth,
            title: entry.title.clone(),
            page_number: entry.page_number(),
            has_children: !entry.children.is_empty(),
            expanded: entry.expanded,
        });
        if entry.expanded {
            collect_rows(&entry.children, depth + 1, path, rows);
        }
        path.pop();
    }
}
