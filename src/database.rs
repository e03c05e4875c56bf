//! C4: the attribute database — an ordered collection of groupings within a handle range, handle
//! allocation, ranged/filtered iteration, and queued-write execution.

use std::cmp::Ordering;
use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::attribute::{Attribute, AttributeGrouping, PeerId};
use crate::error::ErrorCode;
use crate::security::{self, LinkSecurity, Operation};
use crate::{Handle, Uuid, MAX_ATTRIBUTE_VALUE_LENGTH};

/// One entry of a Prepare Write queue, as accumulated by a caller and handed to
/// [`Database::execute_write_queue`] on Execute Write Request.
pub struct QueuedWrite {
    pub handle: Handle,
    pub offset: u16,
    pub bytes: Bytes,
}

/// A handle-indexed collection of [`AttributeGrouping`]s, ordered by `start_handle`, confined to
/// `[range_start, range_end]`.
pub struct Database {
    range_start: Handle,
    range_end: Handle,
    groupings: Vec<AttributeGrouping>,
}

impl Database {
    /// `range_start` and `range_end` are inclusive and must satisfy `1 <= start <= end <= 0xFFFF`.
    pub fn new(range_start: Handle, range_end: Handle) -> Self {
        assert!(range_start >= 1, "handle 0 is reserved");
        assert!(range_start <= range_end, "empty or inverted database range");
        Database { range_start, range_end, groupings: Vec::new() }
    }

    pub fn range(&self) -> (Handle, Handle) {
        (self.range_start, self.range_end)
    }

    /// Reserve `attr_count + 1` contiguous handles (the declaration plus `attr_count` member
    /// attributes) for a new grouping and install it.
    ///
    /// Placement policy: first-fit scan of the ordered grouping list in ascending handle order —
    /// the gap before the first grouping, then each interior gap, then the gap after the last
    /// grouping — returning the first gap large enough. This naturally favors the lowest available
    /// handles without a separate tie-break pass.
    pub fn new_grouping(&mut self, ty: Uuid, attr_count: usize, decl_value: Bytes) -> Option<&mut AttributeGrouping> {
        let needed = attr_count as u32 + 1;
        let span = self.range_end as u32 - self.range_start as u32 + 1;
        if needed == 0 || needed > span {
            return None;
        }

        let mut cursor = self.range_start as u32;
        let mut insert_at = self.groupings.len();
        let mut chosen_start = None;

        for (i, g) in self.groupings.iter().enumerate() {
            let gap_end = g.start_handle() as u32;
            if gap_end > cursor && gap_end - cursor >= needed {
                chosen_start = Some(cursor as u16);
                insert_at = i;
                break;
            }
            cursor = g.end_handle() as u32 + 1;
        }

        if chosen_start.is_none() {
            let tail_end = self.range_end as u32 + 1;
            if tail_end > cursor && tail_end - cursor >= needed {
                chosen_start = Some(cursor as u16);
                insert_at = self.groupings.len();
            }
        }

        let start = chosen_start?;
        let grouping = AttributeGrouping::new(ty, start, attr_count, decl_value);
        self.groupings.insert(insert_at, grouping);
        self.groupings.get_mut(insert_at)
    }

    /// Remove the grouping starting at `start_handle`. Returns `false` if none exists there.
    pub fn remove_grouping(&mut self, start_handle: Handle) -> bool {
        match self.groupings.binary_search_by_key(&start_handle, |g| g.start_handle()) {
            Ok(idx) => {
                self.groupings.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn grouping_index_containing(&self, handle: Handle) -> Option<usize> {
        self.groupings
            .binary_search_by(|g| {
                if handle < g.start_handle() {
                    Ordering::Greater
                } else if handle > g.end_handle() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
    }

    /// Look up an attribute by absolute handle. Returns `None` if no grouping covers the handle,
    /// or the grouping that does is inactive or incomplete.
    pub fn find_attribute(&mut self, handle: Handle) -> Option<&mut Attribute> {
        let idx = self.grouping_index_containing(handle)?;
        let grouping = &mut self.groupings[idx];
        if !grouping.is_active() {
            return None;
        }
        grouping.attribute_mut(handle)
    }

    pub fn groupings(&self) -> &[AttributeGrouping] {
        &self.groupings
    }

    pub fn grouping_mut(&mut self, start_handle: Handle) -> Option<&mut AttributeGrouping> {
        let idx = self.groupings.binary_search_by_key(&start_handle, |g| g.start_handle()).ok()?;
        Some(&mut self.groupings[idx])
    }

    /// Iterate attributes (or, with `groups_only`, just declaration attributes) whose handle lies
    /// in `[start, end]`, optionally filtered to a single attribute type. Any mutation of `self`
    /// after this call is rejected by the borrow checker for as long as the iterator lives, which
    /// is how "mutation invalidates live iterators" is enforced here.
    pub fn iter(&self, start: Handle, end: Handle, type_filter: Option<Uuid>, groups_only: bool) -> Iter<'_> {
        Iter { groupings: self.groupings.iter(), current: None, start, end, type_filter, groups_only }
    }

    /// Execute a queued-write batch (from Prepare Write / Execute Write) against this database.
    ///
    /// See the module-level contract: writes are dispatched in FIFO order without waiting on
    /// earlier completions, but a local validation failure (missing handle, oversized value,
    /// denied permission, or a dynamic attribute with no write handler) aborts dispatch of any
    /// later entry. The reported outcome prefers an error from an *already-dispatched* write over
    /// one from the aborting entry, since the former is earlier in FIFO order; within dispatched
    /// writes the first one (by queue position, not by completion wall-clock time — this
    /// implementation does not race completions) to report an error wins.
    pub async fn execute_write_queue(
        &mut self,
        peer: PeerId,
        mut queue: VecDeque<QueuedWrite>,
        link_security: LinkSecurity,
    ) -> Result<(), (Handle, ErrorCode)> {
        if queue.is_empty() {
            return Ok(());
        }

        let mut dispatched: Vec<(Handle, oneshot::Receiver<Result<(), ErrorCode>>)> = Vec::with_capacity(queue.len());
        let mut local_error: Option<(Handle, ErrorCode)> = None;

        while let Some(write) = queue.pop_front() {
            let attr = match self.find_attribute(write.handle) {
                Some(attr) => attr,
                None => {
                    local_error = Some((write.handle, ErrorCode::InvalidHandle));
                    break;
                }
            };

            if write.bytes.len() > MAX_ATTRIBUTE_VALUE_LENGTH {
                local_error = Some((write.handle, ErrorCode::InvalidAttributeValueLength));
                break;
            }

            if let Some(code) = security::check(attr.write_requirements(), link_security, Operation::Write) {
                local_error = Some((write.handle, code));
                break;
            }

            let (tx, rx) = oneshot::channel();
            if !attr.write_async(peer, write.offset, write.bytes, link_security, tx) {
                local_error = Some((write.handle, ErrorCode::WriteNotPermitted));
                break;
            }
            dispatched.push((write.handle, rx));
        }

        let mut handler_error: Option<(Handle, ErrorCode)> = None;
        for (handle, rx) in dispatched {
            let outcome = rx.await;
            if handler_error.is_some() {
                continue;
            }
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(code)) => handler_error = Some((handle, code)),
                Err(_) => handler_error = Some((handle, ErrorCode::UnlikelyError)),
            }
        }

        match handler_error.or(local_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Iterator over a [`Database`]'s attributes, produced by [`Database::iter`].
pub struct Iter<'a> {
    groupings: std::slice::Iter<'a, AttributeGrouping>,
    current: Option<std::slice::Iter<'a, Attribute>>,
    start: Handle,
    end: Handle,
    type_filter: Option<Uuid>,
    groups_only: bool,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Attribute;

    fn next(&mut self) -> Option<Self::Item> {
        if self.groups_only {
            loop {
                let g = self.groupings.next()?;
                if !g.is_active() {
                    continue;
                }
                let decl = g.declaration();
                if decl.handle() < self.start || decl.handle() > self.end {
                    continue;
                }
                if let Some(filter) = self.type_filter {
                    if decl.attribute_type() != filter {
                        continue;
                    }
                }
                return Some(decl);
            }
        }

        loop {
            if let Some(cur) = &mut self.current {
                for attr in cur {
                    if attr.handle() < self.start || attr.handle() > self.end {
                        continue;
                    }
                    if let Some(filter) = self.type_filter {
                        if attr.attribute_type() != filter {
                            continue;
                        }
                    }
                    return Some(attr);
                }
                self.current = None;
            }

            loop {
                let g = self.groupings.next()?;
                if !g.is_active() {
                    continue;
                }
                if g.end_handle() < self.start || g.start_handle() > self.end {
                    continue;
                }
                self.current = Some(g.attributes().iter());
                break;
            }
        }
    }
}
