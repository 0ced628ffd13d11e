//! Single-threaded recursive schedule

use crate::error::Result;
use crate::walker::paired::PairedWalker;
use crate::walker::queue::WorkItem;
use crate::walker::Schedule;

/// Visit every item depth-first on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Schedule for Sequential {
    fn drive(&self, walker: &PairedWalker, root: WorkItem) -> Result<()> {
        walk(walker, &root)
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

fn walk(walker: &PairedWalker, item: &WorkItem) -> Result<()> {
    for child in walker.visit(item)? {
        walk(walker, &child)?;
    }
    Ok(())
}
