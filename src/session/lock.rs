//! Caller-supplied critical section.

/// Enter/leave hooks wrapped around every state-mutating session operation.
///
/// The session never synchronizes on its own. A caller sharing one session
/// between tasks or threads supplies hooks backed by its platform mutex.
pub trait CriticalSection {
    fn enter(&mut self);
    fn leave(&mut self);
}

/// Holds a [`CriticalSection`] entered until dropped.
pub struct SectionGuard<'a> {
    lock: Option<&'a mut (dyn CriticalSection + 'static)>,
}

impl<'a> SectionGuard<'a> {
    /// Enters `lock`, if there is one.
    pub fn enter(mut lock: Option<&'a mut (dyn CriticalSection + 'static)>) -> Self {
        if let Some(lock) = lock.as_deref_mut() {
            lock.enter();
        }
        Self { lock }
    }
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.as_deref_mut() {
            lock.leave();
        }
    }
}

impl core::fmt::Debug for SectionGuard<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SectionGuard")
            .field("held", &self.lock.is_some())
            .finish()
    }
}
