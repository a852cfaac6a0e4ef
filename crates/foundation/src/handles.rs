/// Generational handle: `(index, generation)`.
///
/// A handle stays unique for the lifetime of its arena: once a slot is freed
/// its generation is bumped, so stale handles never alias a newer value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32, u32);

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        self.1
    }
}
