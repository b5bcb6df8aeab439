use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a render target. Survives resizes, unlike the texture ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// The window surface (or whatever view the frame is presented into).
    pub const BACKBUFFER: TargetId = TargetId(0);

    pub fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a binding is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindMode {
    /// The target's attachments receive draws (a render pass is open on them).
    Write,
    /// The target's colour attachment is the source of a copy.
    Read,
}

/// Bookkeeping for bind/unbind pairs.
///
/// Targets must be released in the reverse order they were bound, and only one
/// target may be bound for writing at a time. Breaking either rule corrupts the
/// draws of every later pass, so it panics instead of returning an error.
#[derive(Debug, Default)]
pub struct TargetStack {
    bound: Vec<(TargetId, BindMode)>,
    binds_this_frame: usize,
}

impl TargetStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, id: TargetId, mode: BindMode) {
        if mode == BindMode::Write {
            if let Some((open, _)) = self.bound.iter().find(|(_, m)| *m == BindMode::Write) {
                panic!("target {id:?} bound for writing while {open:?} is still bound");
            }
        }
        log::trace!("bind {id:?} for {mode:?}");
        self.bound.push((id, mode));
        self.binds_this_frame += 1;
    }

    pub fn unbind(&mut self, id: TargetId) {
        match self.bound.pop() {
            Some((top, _)) if top == id => log::trace!("unbind {id:?}"),
            Some((top, _)) => panic!("unbind of {id:?} out of order, {top:?} is bound on top"),
            None => panic!("unbind of {id:?} with nothing bound"),
        }
    }

    pub fn current(&self) -> Option<(TargetId, BindMode)> {
        self.bound.last().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.bound.is_empty()
    }

    /// Number of binds since the last [`TargetStack::end_frame`].
    pub fn binds_this_frame(&self) -> usize {
        self.binds_this_frame
    }

    /// Closes the frame. Every target has to be unbound by now.
    pub fn end_frame(&mut self) -> usize {
        assert!(
            self.bound.is_empty(),
            "frame ended with targets still bound: {:?}",
            self.bound
        );
        std::mem::take(&mut self.binds_this_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_read_inside_write_unwinds_lifo() {
        let mut stack = TargetStack::new();
        let a = TargetId::next();
        let b = TargetId::next();
        stack.bind(a, BindMode::Write);
        stack.bind(b, BindMode::Read);
        assert_eq!(stack.current(), Some((b, BindMode::Read)));
        stack.unbind(b);
        stack.unbind(a);
        assert!(stack.is_idle());
        assert_eq!(stack.end_frame(), 2);
        assert_eq!(stack.binds_this_frame(), 0);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn unbinding_out_of_order_panics() {
        let mut stack = TargetStack::new();
        let a = TargetId::next();
        let b = TargetId::next();
        stack.bind(a, BindMode::Write);
        stack.bind(b, BindMode::Read);
        stack.unbind(a);
    }

    #[test]
    #[should_panic(expected = "still bound")]
    fn second_write_binding_panics() {
        let mut stack = TargetStack::new();
        stack.bind(TargetId::next(), BindMode::Write);
        stack.bind(TargetId::next(), BindMode::Write);
    }

    #[test]
    #[should_panic(expected = "frame ended")]
    fn ending_a_frame_with_open_target_panics() {
        let mut stack = TargetStack::new();
        stack.bind(TargetId::BACKBUFFER, BindMode::Write);
        stack.end_frame();
    }
}
