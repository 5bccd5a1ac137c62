use parking_lot::Mutex;

use crate::common::FrameId;

const NIL: u32 = u32::MAX;

/// Node in the intrusive recency list. Frame IDs are dense, so the list
/// links live in a flat array indexed by frame ID.
#[derive(Clone, Copy)]
struct Node {
    prev: u32,
    next: u32,
    in_list: bool,
}

struct LruList {
    /// Least recently used end; victims come from here.
    head: u32,
    /// Most recently used end; unpinned frames append here.
    tail: u32,
    nodes: Vec<Node>,
    len: usize,
}

impl LruList {
    fn unlink(&mut self, idx: u32) {
        let node = self.nodes[idx as usize];
        if node.prev != NIL {
            self.nodes[node.prev as usize].next = node.next;
        } else {
            self.head = node.next;
        }
        if node.next != NIL {
            self.nodes[node.next as usize].prev = node.prev;
        } else {
            self.tail = node.prev;
        }
        self.nodes[idx as usize] = Node {
            prev: NIL,
            next: NIL,
            in_list: false,
        };
        self.len -= 1;
    }

    fn push_tail(&mut self, idx: u32) {
        self.nodes[idx as usize] = Node {
            prev: self.tail,
            next: NIL,
            in_list: true,
        };
        if self.tail != NIL {
            self.nodes[self.tail as usize].next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
        self.len += 1;
    }
}

/// LRU victim policy over unpinned frames.
///
/// A frame is in the replacer iff its pin count is zero. All three
/// operations are O(1): the membership test is a flag lookup and the list
/// surgery touches at most two neighbors.
pub struct LruReplacer {
    list: Mutex<LruList>,
}

impl LruReplacer {
    pub fn new(max_frames: usize) -> Self {
        Self {
            list: Mutex::new(LruList {
                head: NIL,
                tail: NIL,
                nodes: vec![
                    Node {
                        prev: NIL,
                        next: NIL,
                        in_list: false,
                    };
                    max_frames
                ],
                len: 0,
            }),
        }
    }

    /// Removes and returns the least recently used frame, if any.
    pub fn victim(&self) -> Option<FrameId> {
        let mut list = self.list.lock();
        if list.head == NIL {
            return None;
        }
        let idx = list.head;
        list.unlink(idx);
        Some(FrameId::new(idx))
    }

    /// Removes the frame from the candidate set (its pin count went above
    /// zero). No-op if it is not in the set.
    pub fn pin(&self, frame_id: FrameId) {
        let mut list = self.list.lock();
        let idx = frame_id.0;
        if (idx as usize) < list.nodes.len() && list.nodes[idx as usize].in_list {
            list.unlink(idx);
        }
    }

    /// Appends the frame as most recently used (its pin count reached zero).
    pub fn unpin(&self, frame_id: FrameId) {
        let mut list = self.list.lock();
        let idx = frame_id.0;
        if (idx as usize) >= list.nodes.len() || list.nodes[idx as usize].in_list {
            return;
        }
        list.push_tail(idx);
    }

    /// Number of eviction candidates.
    pub fn len(&self) -> usize {
        self.list.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
