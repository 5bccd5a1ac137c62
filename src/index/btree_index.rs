use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{MiniError, PageId, Result, RowId};

use super::btree_page::{internal_capacity, leaf_capacity, BTreeNode, BTreeNodeRef};
use super::{BTreeRangeIter, KeyCodec};

/// Descent path entry: an internal page and the child index taken in it.
type PathEntry = (PageId, usize);

/// Disk-resident B+Tree mapping fixed-width composite keys to RowIds.
///
/// Leaves are chained for range scans. Splits copy the separator up from a
/// leaf and push the median up from an internal node; deletions redistribute
/// from the richer sibling before coalescing into the left one. No parent
/// pointers are stored: every mutation descends root-to-leaf and remembers
/// its path, pinning at most a handful of pages at a time and unpinning in
/// reverse order as guards leave scope.
pub struct BTreeIndex {
    bpm: Arc<BufferPoolManager>,
    codec: KeyCodec,
    root_page_id: PageId,
    unique: bool,
}

impl BTreeIndex {
    /// Creates an empty tree whose root is a single empty leaf.
    pub fn create(bpm: Arc<BufferPoolManager>, codec: KeyCodec, unique: bool) -> Result<Self> {
        let key_size = codec.key_size();
        if leaf_capacity(key_size) < 4 || internal_capacity(key_size) < 4 {
            return Err(MiniError::SchemaViolation(format!(
                "index key of {key_size} bytes is too large for the page size"
            )));
        }

        let root_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.fetch_write(root_page_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), key_size);
            node.init_leaf(root_page_id);
        }
        Ok(Self {
            bpm,
            codec,
            root_page_id,
            unique,
        })
    }

    /// Opens an existing tree rooted at `root_page_id`.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        codec: KeyCodec,
        root_page_id: PageId,
        unique: bool,
    ) -> Self {
        Self {
            bpm,
            codec,
            root_page_id,
            unique,
        }
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    fn key_size(&self) -> usize {
        self.codec.key_size()
    }

    fn leaf_min(&self) -> usize {
        leaf_capacity(self.key_size()) / 2
    }

    fn internal_min(&self) -> usize {
        internal_capacity(self.key_size()) / 2
    }

    /// Descends to the leaf for `key`, recording the internal path.
    fn find_leaf(&self, key: &[u8]) -> Result<(PageId, Vec<PathEntry>)> {
        let mut path = Vec::new();
        let mut current = self.root_page_id;
        loop {
            let child = {
                let guard = self.bpm.fetch_read(current)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                if node.is_leaf() {
                    return Ok((current, path));
                }
                let index = node.internal_child_index(key, &self.codec);
                path.push((current, index));
                node.child(index)
            };
            current = child;
        }
    }

    /// Leftmost leaf of the tree.
    fn first_leaf(&self) -> Result<PageId> {
        let mut current = self.root_page_id;
        loop {
            let child = {
                let guard = self.bpm.fetch_read(current)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                if node.is_leaf() {
                    return Ok(current);
                }
                node.child(0)
            };
            current = child;
        }
    }

    /// Point lookup of an exact key.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<RowId>> {
        let (leaf_id, _) = self.find_leaf(key)?;
        let guard = self.bpm.fetch_read(leaf_id)?;
        let node = BTreeNodeRef::new(guard.data(), self.key_size());

        let pos = node.leaf_lower_bound(key, &self.codec);
        if pos < node.key_count()
            && self.codec.compare(node.leaf_key(pos), key) == std::cmp::Ordering::Equal
        {
            Ok(Some(node.leaf_row_id(pos)))
        } else {
            Ok(None)
        }
    }

    /// Inserts a (key, RowId) entry. On a unique tree an equal key fails
    /// with `DuplicateKey` before anything is touched.
    pub fn insert(&mut self, key: &[u8], row_id: RowId) -> Result<()> {
        let (leaf_id, path) = self.find_leaf(key)?;

        let (pos, is_full) = {
            let guard = self.bpm.fetch_read(leaf_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            let lower = node.leaf_lower_bound(key, &self.codec);
            let exact = lower < node.key_count()
                && self.codec.compare(node.leaf_key(lower), key) == std::cmp::Ordering::Equal;
            if exact && self.unique {
                return Err(MiniError::DuplicateKey);
            }
            let pos = if exact {
                node.leaf_upper_bound(key, &self.codec)
            } else {
                lower
            };
            (pos, node.key_count() >= leaf_capacity(self.key_size()))
        };

        if !is_full {
            let mut guard = self.bpm.fetch_write(leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.leaf_insert(pos, key, row_id);
            return Ok(());
        }

        self.split_leaf_insert(leaf_id, pos, key, row_id, path)
    }

    /// Splits a full leaf around a pending insert and propagates the copy-up
    /// separator into the parent chain.
    fn split_leaf_insert(
        &mut self,
        leaf_id: PageId,
        pos: usize,
        key: &[u8],
        row_id: RowId,
        path: Vec<PathEntry>,
    ) -> Result<()> {
        let (mut entries, next) = {
            let guard = self.bpm.fetch_read(leaf_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            let count = node.key_count();
            let mut entries = Vec::with_capacity(count + 1);
            for i in 0..count {
                entries.push((node.leaf_key(i).to_vec(), node.leaf_row_id(i)));
            }
            (entries, node.next_leaf())
        };
        entries.insert(pos, (key.to_vec(), row_id));

        let left_count = (entries.len() + 1) / 2;
        let right_entries = entries.split_off(left_count);
        let separator = right_entries[0].0.clone();

        let new_leaf_id = self.bpm.new_page()?;
        {
            let mut guard = self.bpm.fetch_write(new_leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.init_leaf(new_leaf_id);
            node.leaf_write_all(&right_entries);
            node.set_prev_leaf(Some(leaf_id));
            node.set_next_leaf(next);
        }
        {
            let mut guard = self.bpm.fetch_write(leaf_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.leaf_write_all(&entries);
            node.set_next_leaf(Some(new_leaf_id));
        }
        if let Some(next_id) = next {
            let mut guard = self.bpm.fetch_write(next_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.set_prev_leaf(Some(new_leaf_id));
        }

        self.insert_into_parent(path, separator, leaf_id, new_leaf_id)
    }

    /// Walks the recorded path upward inserting separators, splitting full
    /// internal nodes push-up style, and growing a new root when the path
    /// runs out.
    fn insert_into_parent(
        &mut self,
        mut path: Vec<PathEntry>,
        mut separator: Vec<u8>,
        mut left_id: PageId,
        mut right_id: PageId,
    ) -> Result<()> {
        loop {
            let Some((parent_id, child_idx)) = path.pop() else {
                // The root split: a new root with two children.
                let new_root = self.bpm.new_page()?;
                {
                    let mut guard = self.bpm.fetch_write(new_root)?;
                    let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                    node.init_internal(new_root);
                    node.internal_write_all(&[separator], &[left_id, right_id]);
                }
                self.root_page_id = new_root;
                return Ok(());
            };

            let is_full = {
                let guard = self.bpm.fetch_read(parent_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                node.key_count() >= internal_capacity(self.key_size())
            };

            if !is_full {
                let mut guard = self.bpm.fetch_write(parent_id)?;
                let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                node.internal_insert(child_idx, &separator, right_id);
                return Ok(());
            }

            // Push-up split of the parent.
            let (mut keys, mut children) = {
                let guard = self.bpm.fetch_read(parent_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                let count = node.key_count();
                let mut keys = Vec::with_capacity(count + 1);
                let mut children = Vec::with_capacity(count + 2);
                for i in 0..count {
                    keys.push(node.internal_key(i).to_vec());
                }
                for i in 0..=count {
                    children.push(node.child(i));
                }
                (keys, children)
            };
            keys.insert(child_idx, separator);
            children.insert(child_idx + 1, right_id);

            let mid = keys.len() / 2;
            let right_keys = keys.split_off(mid + 1);
            let pushed = keys.pop().expect("split of a non-empty internal node");
            let right_children = children.split_off(mid + 1);

            let new_internal = self.bpm.new_page()?;
            {
                let mut guard = self.bpm.fetch_write(new_internal)?;
                let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                node.init_internal(new_internal);
                node.internal_write_all(&right_keys, &right_children);
            }
            {
                let mut guard = self.bpm.fetch_write(parent_id)?;
                let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                node.internal_write_all(&keys, &children);
            }

            separator = pushed;
            left_id = parent_id;
            right_id = new_internal;
        }
    }

    /// Removes the first entry matching `key`, rebalancing on underflow.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let (leaf_id, path) = self.find_leaf(key)?;

        let underflow = {
            let mut guard = self.bpm.fetch_write(leaf_id)?;
            let pos = {
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                let pos = node.leaf_lower_bound(key, &self.codec);
                if pos >= node.key_count()
                    || self.codec.compare(node.leaf_key(pos), key) != std::cmp::Ordering::Equal
                {
                    return Err(MiniError::NotFound);
                }
                pos
            };
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.leaf_remove(pos);
            leaf_id != self.root_page_id && node.key_count() < self.leaf_min()
        };

        if underflow {
            self.rebalance(leaf_id, path)?;
        }
        Ok(())
    }

    /// Removes the entry matching both `key` and `row_id`.
    ///
    /// Descent lands on the rightmost leaf that can hold `key`, so on a
    /// non-unique tree an equal-key run extends leftward through `prev_leaf`
    /// links. A removal from a leaf left of the descent leaf has no recorded
    /// path and skips rebalancing; the node stays valid, just sparse.
    pub fn remove_entry(&mut self, key: &[u8], row_id: RowId) -> Result<()> {
        let (leaf_id, path) = self.find_leaf(key)?;

        let (found, lower, prev) = {
            let guard = self.bpm.fetch_read(leaf_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            let lower = node.leaf_lower_bound(key, &self.codec);
            let mut found = None;
            let mut pos = lower;
            while pos < node.key_count()
                && self.codec.compare(node.leaf_key(pos), key) == std::cmp::Ordering::Equal
            {
                if node.leaf_row_id(pos) == row_id {
                    found = Some(pos);
                    break;
                }
                pos += 1;
            }
            (found, lower, node.prev_leaf())
        };

        if let Some(pos) = found {
            let underflow = {
                let mut guard = self.bpm.fetch_write(leaf_id)?;
                let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                node.leaf_remove(pos);
                leaf_id != self.root_page_id && node.key_count() < self.leaf_min()
            };
            if underflow {
                self.rebalance(leaf_id, path)?;
            }
            return Ok(());
        }

        // The run starts inside the descent leaf: the entry does not exist.
        if lower > 0 {
            return Err(MiniError::NotFound);
        }

        let mut current = prev;
        while let Some(page_id) = current {
            let (found, run_continues, prev) = {
                let guard = self.bpm.fetch_read(page_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                let count = node.key_count();
                let mut found = None;
                let mut i = count;
                while i > 0
                    && self.codec.compare(node.leaf_key(i - 1), key)
                        == std::cmp::Ordering::Equal
                {
                    if node.leaf_row_id(i - 1) == row_id {
                        found = Some(i - 1);
                        break;
                    }
                    i -= 1;
                }
                (found, i == 0, node.prev_leaf())
            };

            if let Some(pos) = found {
                let mut guard = self.bpm.fetch_write(page_id)?;
                let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
                node.leaf_remove(pos);
                return Ok(());
            }
            if !run_continues {
                return Err(MiniError::NotFound);
            }
            current = prev;
        }
        Err(MiniError::NotFound)
    }

    /// Fixes an underflowing node by borrowing from the richer sibling or
    /// coalescing into the left one, walking upward while parents underflow.
    fn rebalance(&mut self, mut node_id: PageId, mut path: Vec<PathEntry>) -> Result<()> {
        while let Some((parent_id, child_idx)) = path.pop() {
            let is_leaf = {
                let guard = self.bpm.fetch_read(node_id)?;
                BTreeNodeRef::new(guard.data(), self.key_size()).is_leaf()
            };
            let min = if is_leaf {
                self.leaf_min()
            } else {
                self.internal_min()
            };

            let (left_id, right_id, parent_count) = {
                let guard = self.bpm.fetch_read(parent_id)?;
                let parent = BTreeNodeRef::new(guard.data(), self.key_size());
                let count = parent.key_count();
                let left = (child_idx > 0).then(|| parent.child(child_idx - 1));
                let right = (child_idx < count).then(|| parent.child(child_idx + 1));
                (left, right, count)
            };

            let count_of = |id: PageId| -> Result<usize> {
                let guard = self.bpm.fetch_read(id)?;
                Ok(BTreeNodeRef::new(guard.data(), self.key_size()).key_count())
            };
            let left_count = left_id.map(&count_of).transpose()?.unwrap_or(0);
            let right_count = right_id.map(&count_of).transpose()?.unwrap_or(0);

            // Redistribute from the sibling with more slack, left on ties.
            let can_left = left_id.is_some() && left_count > min;
            let can_right = right_id.is_some() && right_count > min;
            if can_left || can_right {
                let from_left = can_left && (!can_right || left_count >= right_count);
                if is_leaf {
                    if from_left {
                        self.leaf_borrow_left(
                            parent_id,
                            child_idx,
                            left_id.expect("left sibling present"),
                            node_id,
                        )?;
                    } else {
                        self.leaf_borrow_right(
                            parent_id,
                            child_idx,
                            node_id,
                            right_id.expect("right sibling present"),
                        )?;
                    }
                } else if from_left {
                    self.internal_borrow_left(
                        parent_id,
                        child_idx,
                        left_id.expect("left sibling present"),
                        node_id,
                    )?;
                } else {
                    self.internal_borrow_right(
                        parent_id,
                        child_idx,
                        node_id,
                        right_id.expect("right sibling present"),
                    )?;
                }
                return Ok(());
            }

            // Coalesce, preferring the left sibling as the survivor.
            if let Some(left_id) = left_id {
                if is_leaf {
                    self.leaf_merge(parent_id, child_idx - 1, left_id, node_id)?;
                } else {
                    self.internal_merge(parent_id, child_idx - 1, left_id, node_id)?;
                }
            } else {
                let right_id = right_id.expect("a non-root node has at least one sibling");
                if is_leaf {
                    self.leaf_merge(parent_id, child_idx, node_id, right_id)?;
                } else {
                    self.internal_merge(parent_id, child_idx, node_id, right_id)?;
                }
            }

            let parent_count_after = parent_count - 1;
            if path.is_empty() {
                // The parent is the root; an empty internal root collapses
                // into its only child.
                if parent_count_after == 0 {
                    let only_child = {
                        let guard = self.bpm.fetch_read(parent_id)?;
                        BTreeNodeRef::new(guard.data(), self.key_size()).child(0)
                    };
                    self.root_page_id = only_child;
                    self.bpm.delete_page(parent_id)?;
                }
                return Ok(());
            }
            if parent_count_after >= self.internal_min() {
                return Ok(());
            }
            node_id = parent_id;
        }
        Ok(())
    }

    /// Moves the left sibling's last entry to the front of `node_id` and
    /// refreshes the separator.
    fn leaf_borrow_left(
        &mut self,
        parent_id: PageId,
        child_idx: usize,
        left_id: PageId,
        node_id: PageId,
    ) -> Result<()> {
        let (key, row_id) = {
            let mut guard = self.bpm.fetch_write(left_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let last = node.key_count() - 1;
            let entry = (node.leaf_key(last).to_vec(), node.leaf_row_id(last));
            node.leaf_remove(last);
            entry
        };
        {
            let mut guard = self.bpm.fetch_write(node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.leaf_insert(0, &key, row_id);
        }
        let mut guard = self.bpm.fetch_write(parent_id)?;
        let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
        parent.set_internal_key(child_idx - 1, &key);
        Ok(())
    }

    /// Moves the right sibling's first entry to the back of `node_id` and
    /// refreshes the separator.
    fn leaf_borrow_right(
        &mut self,
        parent_id: PageId,
        child_idx: usize,
        node_id: PageId,
        right_id: PageId,
    ) -> Result<()> {
        let (key, row_id, right_new_first) = {
            let mut guard = self.bpm.fetch_write(right_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let entry = (node.leaf_key(0).to_vec(), node.leaf_row_id(0));
            node.leaf_remove(0);
            let new_first = node.leaf_key(0).to_vec();
            (entry.0, entry.1, new_first)
        };
        {
            let mut guard = self.bpm.fetch_write(node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let count = node.key_count();
            node.leaf_insert(count, &key, row_id);
        }
        let mut guard = self.bpm.fetch_write(parent_id)?;
        let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
        parent.set_internal_key(child_idx, &right_new_first);
        Ok(())
    }

    /// Rotates the parent separator down into `node_id` and the left
    /// sibling's last key up into the parent.
    fn internal_borrow_left(
        &mut self,
        parent_id: PageId,
        child_idx: usize,
        left_id: PageId,
        node_id: PageId,
    ) -> Result<()> {
        let separator = {
            let guard = self.bpm.fetch_read(parent_id)?;
            BTreeNodeRef::new(guard.data(), self.key_size())
                .internal_key(child_idx - 1)
                .to_vec()
        };
        let (left_last_key, left_last_child) = {
            let mut guard = self.bpm.fetch_write(left_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let last = node.key_count() - 1;
            let key = node.internal_key(last).to_vec();
            let child = node.child(last + 1);
            node.internal_remove(last);
            (key, child)
        };
        {
            let mut guard = self.bpm.fetch_write(node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.internal_insert_front(&separator, left_last_child);
        }
        let mut guard = self.bpm.fetch_write(parent_id)?;
        let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
        parent.set_internal_key(child_idx - 1, &left_last_key);
        Ok(())
    }

    /// Rotates the parent separator down into `node_id` and the right
    /// sibling's first key up into the parent.
    fn internal_borrow_right(
        &mut self,
        parent_id: PageId,
        child_idx: usize,
        node_id: PageId,
        right_id: PageId,
    ) -> Result<()> {
        let separator = {
            let guard = self.bpm.fetch_read(parent_id)?;
            BTreeNodeRef::new(guard.data(), self.key_size())
                .internal_key(child_idx)
                .to_vec()
        };
        let (right_first_key, right_first_child) = {
            let mut guard = self.bpm.fetch_write(right_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let key = node.internal_key(0).to_vec();
            let child = node.child(0);
            node.internal_remove_front();
            (key, child)
        };
        {
            let mut guard = self.bpm.fetch_write(node_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let count = node.key_count();
            node.internal_insert(count, &separator, right_first_child);
        }
        let mut guard = self.bpm.fetch_write(parent_id)?;
        let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
        parent.set_internal_key(child_idx, &right_first_key);
        Ok(())
    }

    /// Merges `right_id` into `left_id`, fixes the leaf chain, drops the
    /// separator at `sep_idx` from the parent, and frees the emptied page.
    fn leaf_merge(
        &mut self,
        parent_id: PageId,
        sep_idx: usize,
        left_id: PageId,
        right_id: PageId,
    ) -> Result<()> {
        let (entries, right_next) = {
            let guard = self.bpm.fetch_read(right_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            let count = node.key_count();
            let mut entries = Vec::with_capacity(count);
            for i in 0..count {
                entries.push((node.leaf_key(i).to_vec(), node.leaf_row_id(i)));
            }
            (entries, node.next_leaf())
        };
        {
            let mut guard = self.bpm.fetch_write(left_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.leaf_append_all(&entries);
            node.set_next_leaf(right_next);
        }
        if let Some(next_id) = right_next {
            let mut guard = self.bpm.fetch_write(next_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            node.set_prev_leaf(Some(left_id));
        }
        {
            let mut guard = self.bpm.fetch_write(parent_id)?;
            let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
            parent.internal_remove(sep_idx);
        }
        self.bpm.delete_page(right_id)
    }

    /// Merges `right_id` into `left_id` with the parent separator between
    /// them, drops that separator, and frees the emptied page.
    fn internal_merge(
        &mut self,
        parent_id: PageId,
        sep_idx: usize,
        left_id: PageId,
        right_id: PageId,
    ) -> Result<()> {
        let separator = {
            let guard = self.bpm.fetch_read(parent_id)?;
            BTreeNodeRef::new(guard.data(), self.key_size())
                .internal_key(sep_idx)
                .to_vec()
        };
        let (right_keys, right_children) = {
            let guard = self.bpm.fetch_read(right_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            let count = node.key_count();
            let mut keys = Vec::with_capacity(count);
            let mut children = Vec::with_capacity(count + 1);
            for i in 0..count {
                keys.push(node.internal_key(i).to_vec());
            }
            for i in 0..=count {
                children.push(node.child(i));
            }
            (keys, children)
        };
        {
            let mut guard = self.bpm.fetch_write(left_id)?;
            let mut node = BTreeNode::new(guard.data_mut(), self.key_size());
            let count = node.key_count();
            let mut keys: Vec<Vec<u8>> = Vec::with_capacity(count + 1 + right_keys.len());
            let mut children = Vec::with_capacity(count + 2 + right_children.len());
            for i in 0..count {
                keys.push(node.internal_key(i).to_vec());
            }
            for i in 0..=count {
                children.push(node.child(i));
            }
            keys.push(separator);
            keys.extend(right_keys);
            children.extend(right_children);
            node.internal_write_all(&keys, &children);
        }
        {
            let mut guard = self.bpm.fetch_write(parent_id)?;
            let mut parent = BTreeNode::new(guard.data_mut(), self.key_size());
            parent.internal_remove(sep_idx);
        }
        self.bpm.delete_page(right_id)
    }

    /// Range scan between optional bounds. The iterator pins one page per
    /// pull and holds nothing between pulls.
    pub fn range(
        &self,
        lo: Option<&[u8]>,
        lo_inclusive: bool,
        hi: Option<&[u8]>,
        hi_inclusive: bool,
    ) -> Result<BTreeRangeIter> {
        let (start_page, start_index) = match lo {
            None => (self.first_leaf()?, 0),
            Some(lo_key) => {
                let (leaf_id, _) = self.find_leaf(lo_key)?;
                let guard = self.bpm.fetch_read(leaf_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                let pos = if lo_inclusive {
                    node.leaf_lower_bound(lo_key, &self.codec)
                } else {
                    node.leaf_upper_bound(lo_key, &self.codec)
                };
                (leaf_id, pos)
            }
        };

        Ok(BTreeRangeIter::new(
            Arc::clone(&self.bpm),
            self.codec.clone(),
            start_page,
            start_index,
            hi.map(|k| k.to_vec()),
            hi_inclusive,
        ))
    }

    /// Frees every page of the tree. The index is unusable afterwards.
    pub fn destroy(self) -> Result<()> {
        let mut stack = vec![self.root_page_id];
        let mut pages = Vec::new();
        while let Some(page_id) = stack.pop() {
            {
                let guard = self.bpm.fetch_read(page_id)?;
                let node = BTreeNodeRef::new(guard.data(), self.key_size());
                if !node.is_leaf() {
                    for i in 0..=node.key_count() {
                        stack.push(node.child(i));
                    }
                }
            }
            pages.push(page_id);
        }
        for page_id in pages {
            self.bpm.delete_page(page_id)?;
        }
        Ok(())
    }

    /// Number of leaf pages, walking the chain left to right.
    pub fn leaf_page_count(&self) -> Result<usize> {
        let mut count = 0;
        let mut current = Some(self.first_leaf()?);
        while let Some(page_id) = current {
            let guard = self.bpm.fetch_read(page_id)?;
            let node = BTreeNodeRef::new(guard.data(), self.key_size());
            count += 1;
            current = node.next_leaf();
        }
        Ok(count)
    }
}
