//! Keyed Children Diff
//!
//! Reconciles two ordered child lists with four pointers: the start and end
//! of the unprocessed old range and of the unprocessed new range. Each step
//! tries, in order:
//!
//! ```text
//!   (a) new start == old start   patch, advance both starts
//!   (b) new start == old end     patch, move old end before old start
//!   (c) new end   == old start   patch, move old start after old end
//!   (d) new end   == old end     patch, retreat both ends
//! ```
//!
//! When none match, the old range is scanned linearly for the new start: a
//! hit is patched and moved, a miss is created. Once either range is empty,
//! leftover new nodes are inserted and leftover old nodes removed.
//!
//! Prepends, appends, swaps and reversals cost one move or create per
//! affected node. Arbitrary permutations fall back to the linear scan, so
//! the edit script is not globally minimal.

use super::patch::Patcher;
use super::target::Handle;
use super::vnode::{same_vnode, VNode};

impl Patcher {
    /// Reconcile `old` into `new` under `parent`. Both lists are non-empty.
    pub(crate) fn update_children(&mut self, parent: Handle, old: Vec<VNode>, new: &mut [VNode]) {
        // Matched old nodes are taken out, leaving `None` behind.
        let mut old: Vec<Option<VNode>> = old.into_iter().map(Some).collect();

        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new.len());

        while old_start < old_end && new_start < new_end {
            if old[old_start].is_none() {
                old_start += 1;
                continue;
            }
            if old[old_end - 1].is_none() {
                old_end -= 1;
                continue;
            }

            if matches(&old[old_start], &new[new_start]) {
                self.patch_slot(&mut old[old_start], &mut new[new_start]);
                old_start += 1;
                new_start += 1;
            } else if matches(&old[old_end - 1], &new[new_start]) {
                let reference = handle_of(&old[old_start]);
                self.patch_slot(&mut old[old_end - 1], &mut new[new_start]);
                self.move_before(parent, &new[new_start], reference);
                old_end -= 1;
                new_start += 1;
            } else if matches(&old[old_start], &new[new_end - 1]) {
                // With one old node left it is already after itself.
                let moves = old_start + 1 < old_end;
                let reference = handle_of(&old[old_end - 1])
                    .and_then(|end| self.target().borrow().next_sibling(end));
                self.patch_slot(&mut old[old_start], &mut new[new_end - 1]);
                if moves {
                    self.move_before(parent, &new[new_end - 1], reference);
                }
                old_start += 1;
                new_end -= 1;
            } else if matches(&old[old_end - 1], &new[new_end - 1]) {
                self.patch_slot(&mut old[old_end - 1], &mut new[new_end - 1]);
                old_end -= 1;
                new_end -= 1;
            } else {
                let reference = handle_of(&old[old_start]);
                let found = (old_start..old_end).find(|&i| matches(&old[i], &new[new_start]));
                match found {
                    Some(i) => {
                        self.patch_slot(&mut old[i], &mut new[new_start]);
                        self.move_before(parent, &new[new_start], reference);
                    }
                    None => self.create_elm(&mut new[new_start], Some(parent), reference),
                }
                new_start += 1;
            }
        }

        if old_start >= old_end {
            // Everything past `new_end` is already in place.
            let reference = new.get(new_end).and_then(VNode::handle);
            for vnode in &mut new[new_start..new_end] {
                self.create_elm(vnode, Some(parent), reference);
            }
        } else if new_start >= new_end {
            for vnode in old.drain(old_start..old_end).flatten() {
                self.remove_vnode(vnode);
            }
        }
    }

    fn patch_slot(&mut self, slot: &mut Option<VNode>, new: &mut VNode) {
        if let Some(old) = slot.take() {
            self.patch_vnode(old, new);
        }
    }

    fn move_before(&mut self, parent: Handle, vnode: &VNode, reference: Option<Handle>) {
        let Some(handle) = vnode.handle() else {
            return;
        };
        tracing::debug!(%handle, ?reference, "moving node");
        self.insert(parent, handle, reference);
    }
}

fn matches(old: &Option<VNode>, new: &VNode) -> bool {
    old.as_ref().map_or(false, |old| same_vnode(old, new))
}

fn handle_of(slot: &Option<VNode>) -> Option<Handle> {
    slot.as_ref().and_then(VNode::handle)
}
