//! gitsave unlock command implementation

use super::Context;
use crate::error::Result;
use crate::lock;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct UnlockReport {
    lock: String,
    removed: bool,
}

pub(crate) fn run(ctx: &Context) -> Result<()> {
    let ws = ctx.open()?;
    let removed = lock::break_lock(&ws)?;
    let report = UnlockReport {
        lock: ws.config().lock.ref_name.clone(),
        removed,
    };

    let header = if removed {
        format!("gitsave unlock: removed {}", report.lock)
    } else {
        "gitsave unlock: not locked".to_string()
    };
    let human = HumanOutput::new(header);
    emit_success(ctx.output(), "unlock", &report, Some(&human))
}
